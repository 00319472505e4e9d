use std::fmt;

use log::{debug, warn};

use super::{Polyline, plotter_state::AxisMode, plotter_state::PlotterState};
use crate::{
    arm::{ArmMove, Duration},
    config::{MAX_PRESSURE, MIN_PRESSURE},
    utils::saturate_range_checked,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlaybackPhase {
    #[default]
    Idle,
    LiftBeforeStroke,
    TravelToFirst,
    Drawing,
    LiftAfterStroke,
    Done,
    ParkHome,
}

/// Where in a playback or calibration a command was issued
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepLocation {
    // Index of the stroke in the drawing
    Stroke(usize),
    Park,
    Calibration,
}

impl fmt::Display for StepLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StepLocation::Stroke(index) => write!(f, "stroke {}", index + 1),
            StepLocation::Park => write!(f, "final park"),
            StepLocation::Calibration => write!(f, "calibration"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum MotionStep {
    /// Move straight up (or down) to `z` at the horizontal position the arm reports
    Lift {
        stroke: usize,
        phase: PlaybackPhase,
        z: f64,
        axis: AxisMode,
    },
    Travel {
        stroke: usize,
        target: ArmMove,
    },
    Draw {
        stroke: usize,
        point: usize,
        target: ArmMove,
    },
    Settle {
        stroke: usize,
        phase: PlaybackPhase,
        duration: Duration,
    },
    Home,
}

impl MotionStep {
    pub fn phase(&self) -> PlaybackPhase {
        match self {
            MotionStep::Lift { phase, .. } | MotionStep::Settle { phase, .. } => *phase,
            MotionStep::Travel { .. } => PlaybackPhase::TravelToFirst,
            MotionStep::Draw { .. } => PlaybackPhase::Drawing,
            MotionStep::Home => PlaybackPhase::ParkHome,
        }
    }

    pub fn location(&self) -> StepLocation {
        match self {
            MotionStep::Lift { stroke, .. }
            | MotionStep::Travel { stroke, .. }
            | MotionStep::Draw { stroke, .. }
            | MotionStep::Settle { stroke, .. } => StepLocation::Stroke(*stroke),
            MotionStep::Home => StepLocation::Park,
        }
    }
}

/// The full command script of one drawing, ready to be played
#[derive(Debug, Clone, PartialEq, Default)]
pub struct MotionProgram {
    pub steps: Vec<MotionStep>,
    // Strokes that produce motion
    pub strokes: usize,
    // Indices of the empty strokes
    pub skipped: Vec<usize>,
}

impl MotionProgram {
    /// The moves whose target is known before playback
    pub fn moves(&self) -> impl Iterator<Item = &ArmMove> {
        self.steps.iter().filter_map(|step| match step {
            MotionStep::Travel { target, .. } | MotionStep::Draw { target, .. } => Some(target),
            _ => None,
        })
    }
}

/// Turn polylines into the lift, travel, draw, lift script of each stroke
///
/// The axis mode is read once so every move of the program uses the same channel.
/// Pressures outside 0 to 1 are clamped before they are mapped to a depth.
pub fn compile(polylines: &[Polyline], state: &PlotterState) -> MotionProgram {
    let axis = state.axis_mode();
    let safe_z = state.safe_z();
    let settle = state.settle();

    let mut program = MotionProgram::default();

    for (stroke, polyline) in polylines.iter().enumerate() {
        let Some(first) = polyline.first() else {
            debug!("Skipping empty stroke {}", stroke + 1);
            program.skipped.push(stroke);
            continue;
        };

        program.steps.push(MotionStep::Lift {
            stroke,
            phase: PlaybackPhase::LiftBeforeStroke,
            z: safe_z,
            axis,
        });
        program.steps.push(MotionStep::Travel {
            stroke,
            target: axis.target(first.x, first.y, safe_z),
        });

        for (point, target) in polyline.iter().enumerate() {
            let (pressure, clamped) =
                saturate_range_checked(target.pressure, MIN_PRESSURE, MAX_PRESSURE);
            if clamped {
                warn!(
                    "Pressure {} of point {} in stroke {} limited to {}",
                    target.pressure,
                    point + 1,
                    stroke + 1,
                    pressure
                );
            }

            program.steps.push(MotionStep::Draw {
                stroke,
                point,
                target: axis.target(target.x, target.y, state.depth_for(pressure)),
            });
            program.steps.push(MotionStep::Settle {
                stroke,
                phase: PlaybackPhase::Drawing,
                duration: settle,
            });
        }

        program.steps.push(MotionStep::Lift {
            stroke,
            phase: PlaybackPhase::LiftAfterStroke,
            z: safe_z,
            axis,
        });
        program.steps.push(MotionStep::Settle {
            stroke,
            phase: PlaybackPhase::LiftAfterStroke,
            duration: settle,
        });

        program.strokes += 1;
    }

    program.steps.push(MotionStep::Home);
    program
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::drawing::Point;

    fn stroke(points: &[(f64, f64, f64)]) -> Polyline {
        points
            .iter()
            .map(|&(x, y, p)| Point::new(x, y, 0.0, p))
            .collect()
    }

    #[test]
    fn test_empty_drawing_only_parks() {
        let program = compile(&[], &PlotterState::new());
        assert_eq!(program.steps, vec![MotionStep::Home]);
        assert_eq!(program.strokes, 0);
    }

    #[test]
    fn test_stroke_script_order() {
        let state = PlotterState::new();
        let program = compile(&[stroke(&[(1.0, 2.0, 0.0), (3.0, 4.0, 1.0)])], &state);

        let phases: Vec<PlaybackPhase> = program.steps.iter().map(MotionStep::phase).collect();
        assert_eq!(
            phases,
            vec![
                PlaybackPhase::LiftBeforeStroke,
                PlaybackPhase::TravelToFirst,
                PlaybackPhase::Drawing,
                PlaybackPhase::Drawing,
                PlaybackPhase::Drawing,
                PlaybackPhase::Drawing,
                PlaybackPhase::LiftAfterStroke,
                PlaybackPhase::LiftAfterStroke,
                PlaybackPhase::ParkHome,
            ]
        );

        // Travel happens at the safe height, not at drawing depth
        assert_eq!(
            program.steps[1],
            MotionStep::Travel {
                stroke: 0,
                target: ArmMove::new(
                    crate::arm::Horizontal::X(1.0),
                    2.0,
                    state.safe_z()
                ),
            }
        );
    }

    #[test]
    fn test_empty_strokes_are_skipped() {
        let polylines = vec![Vec::new(), stroke(&[(1.0, 1.0, 0.5)]), Vec::new()];
        let program = compile(&polylines, &PlotterState::new());

        assert_eq!(program.strokes, 1);
        assert_eq!(program.skipped, vec![0, 2]);
        assert!(
            program
                .steps
                .iter()
                .all(|step| matches!(step.location(), StepLocation::Stroke(1) | StepLocation::Park))
        );
    }

    #[test]
    fn test_pressure_is_clamped_before_mapping() {
        let state = PlotterState::new()
            .with_paper_z(-50.0)
            .with_pressure_factor(-5.0);
        let program = compile(&[stroke(&[(0.0, 0.0, 1.7), (0.0, 0.0, -0.2)])], &state);

        let depths: Vec<f64> = program
            .steps
            .iter()
            .filter_map(|step| match step {
                MotionStep::Draw { target, .. } => Some(target.z),
                _ => None,
            })
            .collect();
        assert_eq!(depths, vec![-55.0, -50.0]);
    }

    #[test]
    fn test_location_display_is_one_based() {
        assert_eq!(StepLocation::Stroke(0).to_string(), "stroke 1");
        assert_eq!(StepLocation::Park.to_string(), "final park");
    }
}
