use std::{sync::mpsc::Sender, time::Instant};

use egui_plot::PlotPoint;
use plotarm_motion::{
    arm::{ArmCommand, SimArm},
    config::{HOME_X_MM, HOME_Y_MM},
    drawing::Drawing,
    motion::{Player, PlotterState},
};

use crate::plotting::PlotMessage;

/// A simulated arm that reports every move to the plots
pub fn plotting_arm(state: &PlotterState, tx: Sender<PlotMessage>, realtime: bool) -> SimArm {
    let start = Instant::now();
    let safe_z = state.safe_z();

    SimArm::new()
        .with_realtime(realtime)
        .with_observer(move |command| {
            let time = start.elapsed().as_secs_f64();
            let message = match command {
                ArmCommand::Move(target) => {
                    tx.send(PlotMessage::Height(PlotPoint::new(time, target.z)))
                        .ok();
                    PlotMessage::Path {
                        point: PlotPoint::new(target.horizontal.value(), target.y),
                        pen_down: target.z < safe_z,
                    }
                }
                ArmCommand::Home => PlotMessage::Path {
                    point: PlotPoint::new(HOME_X_MM, HOME_Y_MM),
                    pen_down: false,
                },
                _ => return,
            };
            // The window may already be closed
            tx.send(message).ok();
        })
}

/// Play `drawing` on `arm` and report the outcome as the last message
pub fn replay(mut arm: SimArm, drawing: &Drawing, state: &PlotterState, tx: &Sender<PlotMessage>) {
    let status = match Player::new(&mut arm).play_drawing(drawing, state) {
        Ok(report) => format!(
            "Drawing completed: {} strokes, {} commands",
            report.strokes_drawn, report.commands
        ),
        Err(err) => {
            log::error!("Replay failed: {}", err);
            format!("Drawing failed: {}", err)
        }
    };

    log::info!("{}", status);
    tx.send(PlotMessage::Finished(status)).ok();
}

#[cfg(test)]
mod tests {
    use super::*;
    use plotarm_motion::{
        arm::Arm,
        drawing::{Point, Stroke},
    };
    use std::sync::mpsc;

    #[test]
    fn test_replay_reports_path_and_heights() {
        let (tx, rx) = mpsc::channel();
        let state = PlotterState::new();
        let drawing = Drawing::new(vec![Stroke::new(vec![
            Point::new(10.0, 250.0, 0.0, 0.5),
            Point::new(20.0, 250.0, 0.0, 0.5),
        ])]);

        let arm = plotting_arm(&state, tx.clone(), false);
        replay(arm, &drawing, &state, &tx);
        drop(tx);

        let mut pen = Vec::new();
        let mut heights = 0;
        let mut finished = None;
        for message in rx.iter() {
            match message {
                PlotMessage::Path { pen_down, .. } => pen.push(pen_down),
                PlotMessage::Height(_) => heights += 1,
                PlotMessage::Finished(status) => finished = Some(status),
            }
        }

        // lift, travel, two points, lift, home
        assert_eq!(pen, vec![false, false, true, true, false, false]);
        assert_eq!(heights, 5);
        assert!(finished.unwrap().starts_with("Drawing completed"));
    }

    #[test]
    fn test_stop_before_replay_starts_is_kept() {
        let (tx, rx) = mpsc::channel();
        let state = PlotterState::new();
        let drawing = Drawing::new(vec![Stroke::new(vec![Point::new(10.0, 250.0, 0.0, 0.5)])]);

        let arm = plotting_arm(&state, tx.clone(), false);
        arm.stop_handle().trigger().unwrap();
        replay(arm, &drawing, &state, &tx);
        drop(tx);

        let messages: Vec<PlotMessage> = rx.iter().collect();
        assert_eq!(messages.len(), 1);
        let PlotMessage::Finished(status) = &messages[0] else {
            panic!("the arm should not have moved");
        };
        assert!(status.starts_with("Drawing failed: Emergency stop"));
    }
}
