use log::warn;
use serde::{Deserialize, Serialize};

use crate::{
    arm::{ArmMove, ArmPose, Duration, Horizontal},
    config::{
        HOME_X_MM, HOME_Y_MM, MAX_PRESSURE_VALUE, MAX_Z_OFFSET_MM, MIN_PRESSURE_VALUE,
        MIN_Z_OFFSET_MM, PAPER_Z_MM, PRESSURE_FACTOR, SAFE_Z_MM, SETTLE_DELAY_MS,
    },
    utils::saturate_range_checked,
};

/// `value` when it is a real number, `current` otherwise
fn finite_or(name: &str, value: f64, current: f64) -> f64 {
    if value.is_finite() {
        value
    } else {
        warn!("Ignoring {} {}, keeping {}", name, value, current);
        current
    }
}

/// Which channel carries the horizontal coordinate of every move
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AxisMode {
    #[default]
    Cartesian,
    // The sliding rail stands in for X
    Slider,
}

impl AxisMode {
    pub fn horizontal(self, value: f64) -> Horizontal {
        match self {
            AxisMode::Cartesian => Horizontal::X(value),
            AxisMode::Slider => Horizontal::E(value),
        }
    }

    /// The horizontal coordinate of a reported pose on this channel
    pub fn reported(self, pose: &ArmPose) -> f64 {
        match self {
            AxisMode::Cartesian => pose.x,
            AxisMode::Slider => pose.e,
        }
    }

    pub fn target(self, horizontal: f64, y: f64, z: f64) -> ArmMove {
        ArmMove::new(self.horizontal(horizontal), y, z)
    }
}

/// Calibration the compiler and the calibration routines work against
///
/// Setters consume the state and return the updated copy.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PlotterState {
    paper_z: f64,
    z_offset: f64,
    safe_z: f64,
    pressure_factor: f64,
    axis_mode: AxisMode,
    home_x: f64,
    home_y: f64,
    settle: Duration,
}

impl Default for PlotterState {
    fn default() -> Self {
        Self {
            paper_z: PAPER_Z_MM,
            z_offset: 0.0,
            safe_z: SAFE_Z_MM,
            pressure_factor: PRESSURE_FACTOR,
            axis_mode: AxisMode::Cartesian,
            home_x: HOME_X_MM,
            home_y: HOME_Y_MM,
            settle: Duration::millis(SETTLE_DELAY_MS),
        }
    }
}

impl PlotterState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn paper_z(&self) -> f64 {
        self.paper_z
    }

    pub fn z_offset(&self) -> f64 {
        self.z_offset
    }

    /// Paper height with the user offset applied
    pub fn base_z(&self) -> f64 {
        self.paper_z + self.z_offset
    }

    pub fn safe_z(&self) -> f64 {
        self.safe_z
    }

    pub fn pressure_factor(&self) -> f64 {
        self.pressure_factor
    }

    /// The pressure factor as the positive value the operator sets
    pub fn pressure_value(&self) -> f64 {
        -self.pressure_factor
    }

    pub fn axis_mode(&self) -> AxisMode {
        self.axis_mode
    }

    pub fn home_x(&self) -> f64 {
        self.home_x
    }

    pub fn home_y(&self) -> f64 {
        self.home_y
    }

    pub fn settle(&self) -> Duration {
        self.settle
    }

    /// Pen height for a pressure, `base_z + pressure * pressure_factor`
    pub fn depth_for(&self, pressure: f64) -> f64 {
        self.base_z() + pressure * self.pressure_factor
    }

    /// Replaces the offset. Offsets never accumulate
    ///
    /// Non-finite values leave every setter's field unchanged.
    pub fn with_z_offset(mut self, offset: f64) -> Self {
        let offset = finite_or("z offset", offset, self.z_offset);
        let (offset, clamped) = saturate_range_checked(offset, MIN_Z_OFFSET_MM, MAX_Z_OFFSET_MM);
        if clamped {
            warn!(
                "Z offset limited to {} ({} to {} mm)",
                offset, MIN_Z_OFFSET_MM, MAX_Z_OFFSET_MM
            );
        }
        self.z_offset = offset;
        self
    }

    /// Set from the operator's pressure value. A larger value presses harder
    pub fn with_pressure_value(mut self, value: f64) -> Self {
        let value = finite_or("pressure value", value, self.pressure_value());
        let (value, clamped) =
            saturate_range_checked(value, MIN_PRESSURE_VALUE, MAX_PRESSURE_VALUE);
        if clamped {
            warn!(
                "Pressure value limited to {} ({} to {})",
                value, MIN_PRESSURE_VALUE, MAX_PRESSURE_VALUE
            );
        }
        self.pressure_factor = -value;
        self
    }

    /// Set the signed factor directly, without the operator range
    pub fn with_pressure_factor(mut self, factor: f64) -> Self {
        self.pressure_factor = finite_or("pressure factor", factor, self.pressure_factor);
        self
    }

    pub fn with_axis_mode(mut self, axis_mode: AxisMode) -> Self {
        self.axis_mode = axis_mode;
        self
    }

    pub fn with_paper_z(mut self, paper_z: f64) -> Self {
        self.paper_z = finite_or("paper z", paper_z, self.paper_z);
        self
    }

    pub fn with_safe_z(mut self, safe_z: f64) -> Self {
        self.safe_z = finite_or("safe z", safe_z, self.safe_z);
        self
    }

    pub fn with_home(mut self, x: f64, y: f64) -> Self {
        self.home_x = finite_or("home x", x, self.home_x);
        self.home_y = finite_or("home y", y, self.home_y);
        self
    }

    pub fn with_settle(mut self, settle: Duration) -> Self {
        self.settle = settle;
        self
    }
}
