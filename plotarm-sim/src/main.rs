mod app;
mod plotting;
mod replay;

use std::sync::mpsc;

use crate::app::PlotarmSim;

#[tokio::main]
async fn main() -> eframe::Result {
    env_logger::init();

    let (tx, rx) = mpsc::channel();
    let runtime = tokio::runtime::Handle::current();

    let native_options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1100.0, 800.0])
            .with_min_inner_size([600.0, 400.0]),
        ..Default::default()
    };

    eframe::run_native(
        "plotarm-sim",
        native_options,
        Box::new(|cc| Ok(Box::new(PlotarmSim::new(cc, runtime, tx, rx)))),
    )
}
