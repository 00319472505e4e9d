pub mod calibration;
pub mod player;
pub mod plotter_state;
pub mod program;

pub use calibration::{
    PenPosition, init_slider, initialise_arm, lift_from_paper, set_axis_mode,
    set_pressure_factor, set_z_offset, toggle_pen, touch_paper,
};
pub use player::{PlayError, PlaybackReport, Player};
pub use plotter_state::{AxisMode, PlotterState};
pub use program::{MotionProgram, MotionStep, PlaybackPhase, StepLocation, compile};

use crate::drawing::{Drawing, Point};

/// The arm-ready form of a stroke
pub type Polyline = Vec<Point>;

/// One polyline per stroke, in stroke order and point order
///
/// Points are passed through as stored. Empty strokes give empty polylines.
pub fn extract_polylines(drawing: &Drawing) -> Vec<Polyline> {
    drawing
        .strokes
        .iter()
        .map(|stroke| stroke.points.clone())
        .collect()
}
