use std::sync::mpsc::{Receiver, Sender};

use egui::Color32;
use egui_plot::{Legend, Line, Plot, PlotPoint, PlotPoints};
use plotarm_motion::{
    arm::{Arm, EmergencyStop},
    config::{
        DEFAULT_DRAWING_PATH, MAX_PRESSURE_VALUE, MAX_Z_OFFSET_MM, MIN_PRESSURE_VALUE,
        MIN_Z_OFFSET_MM, PRESSURE_FACTOR,
    },
    drawing::{Drawing, default_boundary_drawing, load_from_path},
    motion::{AxisMode, PlotterState},
};
use serde::{Deserialize, Serialize};
use tokio::{runtime::Handle, task::JoinHandle};

use crate::{
    plotting::{PlotMessage, ToolPath},
    replay::{plotting_arm, replay},
};

/// We derive Deserialize/Serialize so we can persist app state on shutdown.
#[derive(Deserialize, Serialize)]
#[serde(default)] // if we add new fields, give them default values when deserializing old state
pub struct PlotarmSim {
    #[serde(skip)]
    runtime: Option<Handle>,

    #[serde(skip)]
    tx: Option<Sender<PlotMessage>>,

    #[serde(skip)]
    rx: Option<Receiver<PlotMessage>>,

    drawing_path: String,

    z_offset: f64,

    pressure: f64,

    slider: bool,

    #[serde(skip)]
    drawing: Drawing,

    #[serde(skip)]
    status: String,

    #[serde(skip)]
    stop: Option<EmergencyStop>,

    #[serde(skip)]
    replay: Option<JoinHandle<()>>,

    #[serde(skip)]
    tool_path: ToolPath,

    #[serde(skip)]
    heights: Vec<PlotPoint>,
}

impl Default for PlotarmSim {
    fn default() -> Self {
        Self {
            runtime: None,
            tx: None,
            rx: None,
            drawing_path: DEFAULT_DRAWING_PATH.to_string(),
            z_offset: 0.0,
            pressure: -PRESSURE_FACTOR,
            slider: false,
            drawing: default_boundary_drawing(),
            status: String::new(),
            stop: None,
            replay: None,
            tool_path: ToolPath::default(),
            heights: Vec::new(),
        }
    }
}

impl PlotarmSim {
    /// Called once before the first frame.
    pub fn new(
        cc: &eframe::CreationContext<'_>,
        runtime: Handle,
        tx: Sender<PlotMessage>,
        rx: Receiver<PlotMessage>,
    ) -> Self {
        // Load previous app state (if any).
        // Note that you must enable the `persistence` feature for this to work.
        let mut app: PlotarmSim = cc
            .storage
            .and_then(|storage| eframe::get_value(storage, eframe::APP_KEY))
            .unwrap_or_default();

        app.runtime = Some(runtime);
        app.tx = Some(tx);
        app.rx = Some(rx);
        app.load_drawing();

        app
    }

    fn plotter_state(&self) -> PlotterState {
        let axis_mode = if self.slider {
            AxisMode::Slider
        } else {
            AxisMode::Cartesian
        };

        PlotterState::new()
            .with_z_offset(self.z_offset)
            .with_pressure_value(self.pressure)
            .with_axis_mode(axis_mode)
    }

    fn is_replaying(&self) -> bool {
        self.replay
            .as_ref()
            .is_some_and(|replay| !replay.is_finished())
    }

    fn load_drawing(&mut self) {
        match load_from_path(&self.drawing_path) {
            Ok(drawing) => {
                self.status = format!(
                    "Loaded {} strokes from {}",
                    drawing.strokes.len(),
                    self.drawing_path
                );
                self.drawing = drawing;
            }
            Err(err) => {
                log::warn!("{}", err);
                self.status = err.to_string();
            }
        }
    }

    fn start_replay(&mut self) {
        let (Some(runtime), Some(tx)) = (&self.runtime, &self.tx) else {
            return;
        };

        self.tool_path.clear();
        self.heights.clear();

        let state = self.plotter_state();
        let arm = plotting_arm(&state, tx.clone(), true);
        self.stop = Some(arm.stop_handle());

        let drawing = self.drawing.clone();
        let tx = tx.clone();
        self.replay = Some(runtime.spawn_blocking(move || replay(arm, &drawing, &state, &tx)));
        self.status = format!("Drawing {} strokes", self.drawing.strokes.len());
    }

    fn draw_plots(&mut self, ui: &mut egui::Ui) {
        ui.horizontal(|ui| {
            ui.vertical(|ui| {
                ui.label("Drawing");
                Plot::new("drawing")
                    .width(480.0)
                    .height(360.0)
                    .data_aspect(1.0)
                    .show(ui, |plot_ui| {
                        for stroke in &self.drawing.strokes {
                            let points: PlotPoints =
                                stroke.points.iter().map(|point| [point.x, point.y]).collect();
                            plot_ui.add(Line::new("stroke", points).color(Color32::LIGHT_BLUE));
                        }
                    });
            });
            ui.vertical(|ui| {
                ui.label("Tool path");
                Plot::new("tool_path")
                    .width(480.0)
                    .height(360.0)
                    .data_aspect(1.0)
                    .legend(Legend::default())
                    .show(ui, |plot_ui| {
                        for (pen_down, points) in &self.tool_path.segments {
                            let (name, color) = if *pen_down {
                                ("pen down", Color32::GREEN)
                            } else {
                                ("travel", Color32::GRAY)
                            };
                            plot_ui.add(Line::new(name, points.as_slice()).color(color));
                        }
                    });
            });
        });

        ui.label("Pen height");
        Plot::new("height")
            .height(200.0)
            .show(ui, |plot_ui| {
                plot_ui.add(Line::new("z", self.heights.as_slice()).color(Color32::RED));
            });
    }
}

impl eframe::App for PlotarmSim {
    /// Called by the framework to save state before shutdown.
    fn save(&mut self, storage: &mut dyn eframe::Storage) {
        eframe::set_value(storage, eframe::APP_KEY, self);
    }

    /// Called each time the UI needs repainting, which may be many times per second.
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        if let Some(rx) = &self.rx {
            for message in rx.try_iter() {
                match message {
                    PlotMessage::Path { point, pen_down } => self.tool_path.push(point, pen_down),
                    PlotMessage::Height(point) => self.heights.push(point),
                    PlotMessage::Finished(status) => self.status = status,
                }
            }
        }

        egui::TopBottomPanel::top("top_panel").show(ctx, |ui| {
            egui::MenuBar::new().ui(ui, |ui| {
                ui.menu_button("File", |ui| {
                    if ui.button("Quit").clicked() {
                        ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                    }
                });
                ui.add_space(16.0);

                egui::widgets::global_theme_preference_buttons(ui);
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("PLOTARM-SIM");

            let replaying = self.is_replaying();

            ui.horizontal(|ui| {
                ui.label("Drawing file");
                ui.text_edit_singleline(&mut self.drawing_path);
                if ui
                    .add_enabled(!replaying, egui::Button::new("Load"))
                    .clicked()
                {
                    self.load_drawing();
                }
            });

            ui.add_enabled(
                !replaying,
                egui::Slider::new(&mut self.z_offset, MIN_Z_OFFSET_MM..=MAX_Z_OFFSET_MM)
                    .text("Z offset"),
            );
            ui.add_enabled(
                !replaying,
                egui::Slider::new(&mut self.pressure, MIN_PRESSURE_VALUE..=MAX_PRESSURE_VALUE)
                    .text("Pressure"),
            );
            ui.add_enabled(
                !replaying,
                egui::Checkbox::new(&mut self.slider, "Slider"),
            );

            ui.horizontal(|ui| {
                if ui
                    .add_enabled(!replaying, egui::Button::new("Draw"))
                    .clicked()
                {
                    self.start_replay();
                }
                if ui.add_enabled(replaying, egui::Button::new("Stop")).clicked() {
                    if let Some(stop) = &self.stop {
                        if let Err(err) = stop.trigger() {
                            self.status = err.to_string();
                        }
                    }
                }
                ui.label(&self.status);
            });

            ui.separator();

            if replaying {
                ui.ctx().request_repaint();
            }
            self.draw_plots(ui);
        });
    }
}
