use std::iter;

use egui_plot::PlotPoint;

pub enum PlotMessage {
    // Tool position in the paper plane
    Path { point: PlotPoint, pen_down: bool },
    // Pen height over the replay time
    Height(PlotPoint),
    Finished(String),
}

/// Tool positions split into pen-down and travel runs
///
/// Each run starts at the last point of the previous one so the path stays connected.
#[derive(Default)]
pub struct ToolPath {
    pub segments: Vec<(bool, Vec<PlotPoint>)>,
}

impl ToolPath {
    pub fn push(&mut self, point: PlotPoint, pen_down: bool) {
        if let Some((down, points)) = self.segments.last_mut() {
            if *down == pen_down {
                points.push(point);
                return;
            }
        }

        let start = self
            .segments
            .last()
            .and_then(|(_, points)| points.last().copied());
        self.segments
            .push((pen_down, start.into_iter().chain(iter::once(point)).collect()));
    }

    pub fn clear(&mut self) {
        self.segments.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tool_path_runs_stay_connected() {
        let mut path = ToolPath::default();
        path.push(PlotPoint::new(0.0, 0.0), false);
        path.push(PlotPoint::new(1.0, 0.0), false);
        path.push(PlotPoint::new(1.0, 0.0), true);
        path.push(PlotPoint::new(2.0, 0.0), true);
        path.push(PlotPoint::new(2.0, 1.0), false);

        let runs: Vec<(bool, usize)> = path
            .segments
            .iter()
            .map(|(down, points)| (*down, points.len()))
            .collect();
        assert_eq!(runs, vec![(false, 2), (true, 3), (false, 2)]);
        assert_eq!(path.segments[2].1[0], PlotPoint::new(2.0, 0.0));
    }
}
