//! Operator calibration moves
//!
//! All positions are taken at the home horizontal position on the channel of the
//! current axis mode. A failing command leaves the caller's state untouched.

use log::info;

use super::{
    player::PlayError,
    plotter_state::{AxisMode, PlotterState},
    program::StepLocation,
};
use crate::{
    arm::{Arm, ArmError, ArmPose, Duration, ModuleType},
    config::{CONNECT_CLEARANCE_MM, PROBE_DELAY_MS},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PenPosition {
    #[default]
    Lifted,
    AtPaper,
}

impl PenPosition {
    pub fn toggled(self) -> Self {
        match self {
            PenPosition::Lifted => PenPosition::AtPaper,
            PenPosition::AtPaper => PenPosition::Lifted,
        }
    }
}

fn calibration_error(source: ArmError) -> PlayError {
    match source {
        ArmError::NotConnected => PlayError::NotConnected,
        source => PlayError::Motion {
            location: StepLocation::Calibration,
            source,
        },
    }
}

fn ensure_connected<A: Arm>(arm: &A) -> Result<(), PlayError> {
    if arm.is_connected() {
        Ok(())
    } else {
        Err(PlayError::NotConnected)
    }
}

fn ensure_finite(name: &'static str, value: f64) -> Result<(), PlayError> {
    if value.is_finite() {
        Ok(())
    } else {
        Err(PlayError::InvalidSetting { name, value })
    }
}

fn move_at_home<A: Arm>(arm: &mut A, state: &PlotterState, z: f64) -> Result<(), PlayError> {
    let target = state
        .axis_mode()
        .target(state.home_x(), state.home_y(), z);
    arm.move_to(&target).map_err(calibration_error)
}

/// Put the pen on the paper so the operator can adjust it
pub fn touch_paper<A: Arm>(arm: &mut A, state: &PlotterState) -> Result<PenPosition, PlayError> {
    ensure_connected(arm)?;
    move_at_home(arm, state, state.base_z())?;
    info!("Pen at paper height {}", state.base_z());
    Ok(PenPosition::AtPaper)
}

pub fn lift_from_paper<A: Arm>(
    arm: &mut A,
    state: &PlotterState,
) -> Result<PenPosition, PlayError> {
    ensure_connected(arm)?;
    move_at_home(arm, state, state.safe_z())?;
    info!("Pen lifted to {}", state.safe_z());
    Ok(PenPosition::Lifted)
}

pub fn toggle_pen<A: Arm>(
    arm: &mut A,
    state: &PlotterState,
    current: PenPosition,
) -> Result<PenPosition, PlayError> {
    match current.toggled() {
        PenPosition::AtPaper => touch_paper(arm, state),
        PenPosition::Lifted => lift_from_paper(arm, state),
    }
}

/// Apply a new paper offset and show the resulting height
pub fn set_z_offset<A: Arm>(
    arm: &mut A,
    state: PlotterState,
    offset: f64,
) -> Result<PlotterState, PlayError> {
    ensure_connected(arm)?;
    ensure_finite("z offset", offset)?;

    let state = state.with_z_offset(offset);
    move_at_home(arm, &state, state.base_z())?;

    info!("Z: {}, offset: {}", state.base_z(), state.z_offset());
    Ok(state)
}

/// Apply a new pressure value and probe both ends of the depth range
pub fn set_pressure_factor<A: Arm>(
    arm: &mut A,
    state: PlotterState,
    value: f64,
) -> Result<PlotterState, PlayError> {
    ensure_connected(arm)?;
    ensure_finite("pressure value", value)?;

    let state = state.with_pressure_value(value);
    let base_z = state.base_z();
    let factor = state.pressure_factor();
    let pause = Duration::millis(PROBE_DELAY_MS);

    move_at_home(arm, &state, base_z + factor)?;
    arm.delay(pause).map_err(calibration_error)?;
    move_at_home(arm, &state, base_z - factor)?;
    arm.delay(pause).map_err(calibration_error)?;
    move_at_home(arm, &state, base_z)?;

    info!("Pressure factor: {}", factor);
    Ok(state)
}

/// Pure setter for the axis mode, no motion
pub fn set_axis_mode(state: PlotterState, mode: AxisMode) -> PlotterState {
    info!("Axis mode: {:?}", mode);
    state.with_axis_mode(mode)
}

/// Home and initialise the sliding rail, then draw through it
pub fn init_slider<A: Arm>(arm: &mut A, state: PlotterState) -> Result<PlotterState, PlayError> {
    ensure_connected(arm)?;

    arm.go_home().map_err(calibration_error)?;
    arm.sliding_rail_init().map_err(calibration_error)?;

    info!("Sliding rail initialised");
    Ok(state.with_axis_mode(AxisMode::Slider))
}

/// First moves after connecting: home, select the pen module, clear the paper, home
pub fn initialise_arm<A: Arm>(arm: &mut A, state: &PlotterState) -> Result<ArmPose, PlayError> {
    ensure_connected(arm)?;

    arm.go_home().map_err(calibration_error)?;
    arm.set_module_type(ModuleType::Pen)
        .map_err(calibration_error)?;
    move_at_home(arm, state, state.safe_z() + CONNECT_CLEARANCE_MM)?;
    arm.go_home().map_err(calibration_error)?;

    let pose = arm.current_position().map_err(calibration_error)?;
    info!("Arm ready at {}", pose);
    Ok(pose)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::arm::{ArmCommand, ArmMove, Horizontal, SimArm};

    #[test]
    fn test_pen_toggle_alternates() {
        let mut arm = SimArm::new();
        let state = PlotterState::new();

        let pen = toggle_pen(&mut arm, &state, PenPosition::default()).unwrap();
        assert_eq!(pen, PenPosition::AtPaper);
        let pen = toggle_pen(&mut arm, &state, pen).unwrap();
        assert_eq!(pen, PenPosition::Lifted);

        let heights: Vec<f64> = arm.moves().map(|m| m.z).collect();
        assert_eq!(heights, vec![state.base_z(), state.safe_z()]);
    }

    #[test]
    fn test_z_offset_moves_to_new_height() {
        let mut arm = SimArm::new();
        let state = set_z_offset(&mut arm, PlotterState::new(), 2.0).unwrap();
        let state = set_z_offset(&mut arm, state, 1.0).unwrap();

        assert_eq!(state.base_z(), state.paper_z() + 1.0);
        assert_eq!(arm.moves().last().map(|m| m.z), Some(state.base_z()));
    }

    #[test]
    fn test_non_finite_settings_are_refused() {
        let mut arm = SimArm::new();
        let state = PlotterState::new().with_z_offset(2.0);

        assert!(matches!(
            set_z_offset(&mut arm, state, f64::NAN),
            Err(PlayError::InvalidSetting { name: "z offset", .. })
        ));
        assert!(matches!(
            set_pressure_factor(&mut arm, state, f64::INFINITY),
            Err(PlayError::InvalidSetting { name: "pressure value", .. })
        ));
        assert!(arm.commands().is_empty());
    }

    #[test]
    fn test_pressure_probe_sequence() {
        let mut arm = SimArm::new();
        let state = PlotterState::new().with_paper_z(-50.0);
        let state = set_pressure_factor(&mut arm, state, 5.0).unwrap();

        assert_eq!(state.pressure_factor(), -5.0);

        let pause = Duration::millis(PROBE_DELAY_MS);
        let at = |z| {
            ArmCommand::Move(ArmMove::new(
                Horizontal::X(state.home_x()),
                state.home_y(),
                z,
            ))
        };
        assert_eq!(
            arm.commands(),
            &[
                at(-55.0),
                ArmCommand::Delay(pause),
                at(-45.0),
                ArmCommand::Delay(pause),
                at(-50.0),
            ]
        );
    }

    #[test]
    fn test_calibration_follows_slider_mode() {
        let mut arm = SimArm::new();
        let state = init_slider(&mut arm, PlotterState::new()).unwrap();
        assert_eq!(state.axis_mode(), AxisMode::Slider);
        assert_eq!(arm.commands(), &[ArmCommand::Home, ArmCommand::RailInit]);

        touch_paper(&mut arm, &state).unwrap();
        let touch = arm.moves().last().copied().unwrap();
        assert_eq!(touch.e(), Some(state.home_x()));
        assert_eq!(touch.x(), None);
    }

    #[test]
    fn test_initialise_arm_sequence() {
        let mut arm = SimArm::new();
        let state = PlotterState::new();
        let pose = initialise_arm(&mut arm, &state).unwrap();

        assert_eq!(pose.y, state.home_y());
        assert_eq!(
            arm.commands(),
            &[
                ArmCommand::Home,
                ArmCommand::SetModule(ModuleType::Pen),
                ArmCommand::Move(ArmMove::new(
                    Horizontal::X(state.home_x()),
                    state.home_y(),
                    state.safe_z() + CONNECT_CLEARANCE_MM,
                )),
                ArmCommand::Home,
                ArmCommand::QueryPosition,
            ]
        );
    }

    #[test]
    fn test_calibration_without_arm() {
        let mut arm = SimArm::disconnected();
        let state = PlotterState::new();

        assert!(matches!(
            touch_paper(&mut arm, &state),
            Err(PlayError::NotConnected)
        ));
        assert!(matches!(
            set_pressure_factor(&mut arm, state, 3.0),
            Err(PlayError::NotConnected)
        ));
        assert!(arm.commands().is_empty());
    }
}
