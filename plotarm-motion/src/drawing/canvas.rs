use serde::{Deserialize, Serialize};

use super::{Drawing, Point, Stroke, StoreError};
use crate::config::{CANVAS_SCALE, CANVAS_X_OFFSET_MM, CANVAS_Y_OFFSET_MM};

/// Maps canvas pixels to paper millimetres
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CanvasTransform {
    // Pixels per mm
    pub scale: f64,
    pub x_offset: f64,
    pub y_offset: f64,
}

impl Default for CanvasTransform {
    fn default() -> Self {
        Self {
            scale: CANVAS_SCALE,
            x_offset: CANVAS_X_OFFSET_MM,
            y_offset: CANVAS_Y_OFFSET_MM,
        }
    }
}

impl CanvasTransform {
    pub fn apply(&self, px: f64, py: f64) -> (f64, f64) {
        (px / self.scale + self.x_offset, py / self.scale + self.y_offset)
    }
}

/// Convert one open path drawn on the canvas, e.g. `M10,20L30,40L50,60`
///
/// The canvas has no pressure or heading so both are recorded as 0.
pub fn stroke_from_canvas_path(path: &str, transform: &CanvasTransform) -> Result<Stroke, StoreError> {
    if transform.scale == 0.0 {
        return Err(StoreError::Format("Canvas scale cannot be 0".to_string()));
    }
    if ![transform.scale, transform.x_offset, transform.y_offset]
        .iter()
        .all(|value| value.is_finite())
    {
        return Err(StoreError::Format(format!(
            "Canvas transform must be finite: {:?}",
            transform
        )));
    }

    let coordinates = path
        .split(|c: char| matches!(c, ',' | 'M' | 'L' | 'Z') || c.is_whitespace())
        .filter(|token| !token.is_empty())
        .map(|token| {
            token
                .parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .ok_or_else(|| StoreError::Format(format!("Bad canvas coordinate `{}`", token)))
        })
        .collect::<Result<Vec<f64>, StoreError>>()?;

    if coordinates.len() % 2 != 0 {
        return Err(StoreError::Format(format!(
            "Canvas path has an odd number of coordinates: {}",
            path
        )));
    }

    let points = coordinates
        .chunks_exact(2)
        .map(|pair| {
            let (x, y) = transform.apply(pair[0], pair[1]);
            Point::new(x, y, 0.0, 0.0)
        })
        .collect();

    Ok(Stroke::new(points))
}

/// One stroke per canvas path, in the order the paths were drawn
pub fn drawing_from_canvas_paths<I, S>(
    paths: I,
    transform: &CanvasTransform,
) -> Result<Drawing, StoreError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let strokes = paths
        .into_iter()
        .map(|path| stroke_from_canvas_path(path.as_ref(), transform))
        .collect::<Result<Vec<Stroke>, StoreError>>()?;

    Ok(Drawing::new(strokes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_canvas_path_is_scaled_and_offset() {
        let transform = CanvasTransform::default();
        let stroke = stroke_from_canvas_path("M250,500L500,750", &transform).unwrap();

        assert_eq!(
            stroke.points,
            vec![
                Point::new(10.0, 270.0, 0.0, 0.0),
                Point::new(20.0, 280.0, 0.0, 0.0),
            ]
        );
    }

    #[test]
    fn test_canvas_path_separators() {
        let transform = CanvasTransform {
            scale: 1.0,
            x_offset: 0.0,
            y_offset: 0.0,
        };
        let stroke = stroke_from_canvas_path("M 1.5, -2 L3 4 L5e1,6Z", &transform).unwrap();
        let xy: Vec<(f64, f64)> = stroke.points.iter().map(|p| (p.x, p.y)).collect();
        assert_eq!(xy, vec![(1.5, -2.0), (3.0, 4.0), (50.0, 6.0)]);
    }

    #[test]
    fn test_canvas_path_errors() {
        let transform = CanvasTransform::default();
        assert!(stroke_from_canvas_path("M1,2L3", &transform).is_err());
        assert!(stroke_from_canvas_path("M1,2Lx,4", &transform).is_err());

        let broken = CanvasTransform {
            scale: 0.0,
            ..Default::default()
        };
        assert!(stroke_from_canvas_path("M1,2", &broken).is_err());
    }

    #[test]
    fn test_canvas_rejects_non_finite_numbers() {
        let transform = CanvasTransform::default();
        for path in ["M inf,1", "M1,NaN", "M infinity,2 L3,4", "M1,2L-inf,4"] {
            assert!(
                matches!(
                    stroke_from_canvas_path(path, &transform),
                    Err(StoreError::Format(_))
                ),
                "accepted {path}"
            );
        }

        let broken = CanvasTransform {
            scale: f64::NAN,
            ..Default::default()
        };
        assert!(stroke_from_canvas_path("M1,2", &broken).is_err());
        let broken = CanvasTransform {
            y_offset: f64::INFINITY,
            ..Default::default()
        };
        assert!(drawing_from_canvas_paths(["M1,2"], &broken).is_err());
    }

    #[test]
    fn test_drawing_from_paths_keeps_order() {
        let transform = CanvasTransform::default();
        let drawing =
            drawing_from_canvas_paths(["M0,0L25,0", "", "M50,50"], &transform).unwrap();

        assert_eq!(drawing.strokes.len(), 3);
        assert_eq!(drawing.strokes[0].len(), 2);
        assert!(drawing.strokes[1].is_empty());
        assert_eq!(drawing.strokes[2].points[0].x, 2.0);
    }
}
