pub mod canvas;
pub mod store;

use serde::{Deserialize, Serialize};

pub use canvas::{CanvasTransform, drawing_from_canvas_paths, stroke_from_canvas_path};
pub use store::{
    DrawingStore, StoreError, default_boundary_drawing, load_from_path, parse, save_text_to_path,
    save_to_path, serialize,
};

/// One recorded sample of a stroke
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
    // Tool orientation in degrees. Kept in the file, not used for motion
    #[serde(rename = "a")]
    pub heading: f64,
    // Pen pressure. Nominally 0 to 1
    #[serde(rename = "p")]
    pub pressure: f64,
}

impl Point {
    pub fn new(x: f64, y: f64, heading: f64, pressure: f64) -> Self {
        Self {
            x,
            y,
            heading,
            pressure,
        }
    }

    pub fn is_finite(&self) -> bool {
        [self.x, self.y, self.heading, self.pressure]
            .iter()
            .all(|value| value.is_finite())
    }
}

/// One continuous pen-down motion. Point order is draw order
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Stroke {
    pub points: Vec<Point>,
}

impl Stroke {
    pub fn new(points: Vec<Point>) -> Self {
        Self { points }
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }
}

impl From<Vec<Point>> for Stroke {
    fn from(points: Vec<Point>) -> Self {
        Self { points }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub strokes: Vec<Stroke>,
}

impl Drawing {
    pub fn new(strokes: Vec<Stroke>) -> Self {
        Self { strokes }
    }

    pub fn point_count(&self) -> usize {
        self.strokes.iter().map(Stroke::len).sum()
    }

    /// Stroke and point index of the first point JSON cannot hold
    pub fn first_non_finite(&self) -> Option<(usize, usize)> {
        self.strokes.iter().enumerate().find_map(|(s, stroke)| {
            stroke
                .points
                .iter()
                .position(|point| !point.is_finite())
                .map(|p| (s, p))
        })
    }
}
