use log::{debug, error, info};

use super::{
    extract_polylines,
    plotter_state::PlotterState,
    program::{MotionProgram, MotionStep, PlaybackPhase, StepLocation, compile},
};
use crate::{
    arm::{Arm, ArmError, StopSignal},
    drawing::Drawing,
};

#[derive(Debug, thiserror::Error)]
pub enum PlayError {
    #[error("No arm is connected")]
    NotConnected,
    #[error("Motion failed during {location}: {source}")]
    Motion {
        location: StepLocation,
        #[source]
        source: ArmError,
    },
    #[error("Emergency stop during {location}")]
    Stopped { location: StepLocation },
    #[error("A drawing is already playing")]
    Busy,
    #[error("The {name} must be a number, got {value}")]
    InvalidSetting { name: &'static str, value: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PlaybackReport {
    pub strokes_drawn: usize,
    pub strokes_skipped: usize,
    // Every call made on the arm, position queries included
    pub commands: usize,
}

/// Drives an arm through a motion program, one blocking command at a time
///
/// There is no retry and no recovery. A failing command ends the playback with
/// the pen wherever the arm left it.
pub struct Player<'a, A: Arm> {
    arm: &'a mut A,
    signal: StopSignal,
    phase: PlaybackPhase,
    commands: usize,
}

impl<'a, A: Arm> Player<'a, A> {
    pub fn new(arm: &'a mut A) -> Self {
        let signal = arm.stop_handle().signal().clone();

        Self {
            arm,
            signal,
            phase: PlaybackPhase::Idle,
            commands: 0,
        }
    }

    pub fn phase(&self) -> PlaybackPhase {
        self.phase
    }

    pub fn play_drawing(
        &mut self,
        drawing: &Drawing,
        state: &PlotterState,
    ) -> Result<PlaybackReport, PlayError> {
        let polylines = extract_polylines(drawing);
        let program = compile(&polylines, state);
        self.play(&program)
    }

    /// Play a program from the start
    ///
    /// A raised stop signal ends the playback before its next command, including
    /// one raised before this call. Whoever starts a new playback clears it first.
    pub fn play(&mut self, program: &MotionProgram) -> Result<PlaybackReport, PlayError> {
        self.phase = PlaybackPhase::Idle;
        self.commands = 0;

        if !self.arm.is_connected() {
            error!("Cannot play a drawing without an arm");
            return Err(PlayError::NotConnected);
        }

        info!(
            "Playing {} strokes ({} empty skipped)",
            program.strokes,
            program.skipped.len()
        );

        for step in &program.steps {
            let location = step.location();

            if self.signal.is_raised() {
                error!("Playback stopped during {}", location);
                self.phase = PlaybackPhase::Idle;
                return Err(PlayError::Stopped { location });
            }

            if matches!(step, MotionStep::Home) {
                self.enter(PlaybackPhase::Done, location);
            }
            self.enter(step.phase(), location);

            self.execute(step).map_err(|source| {
                error!("Motion failed during {}: {}", location, source);
                PlayError::Motion { location, source }
            })?;
        }

        info!("Drawing finished after {} commands", self.commands);

        Ok(PlaybackReport {
            strokes_drawn: program.strokes,
            strokes_skipped: program.skipped.len(),
            commands: self.commands,
        })
    }

    fn enter(&mut self, phase: PlaybackPhase, location: StepLocation) {
        if self.phase != phase {
            debug!("{:?} -> {:?} ({})", self.phase, phase, location);
            if phase == PlaybackPhase::LiftBeforeStroke {
                info!("Starting {}", location);
            }
            self.phase = phase;
        }
    }

    fn execute(&mut self, step: &MotionStep) -> Result<(), ArmError> {
        match step {
            MotionStep::Lift { z, axis, .. } => {
                let pose = self.arm.current_position()?;
                self.commands += 1;
                self.arm
                    .move_to(&axis.target(axis.reported(&pose), pose.y, *z))?;
            }
            MotionStep::Travel { target, .. } | MotionStep::Draw { target, .. } => {
                self.arm.move_to(target)?;
            }
            MotionStep::Settle { duration, .. } => self.arm.delay(*duration)?,
            MotionStep::Home => self.arm.go_home()?,
        }

        self.commands += 1;
        Ok(())
    }
}
