mod config;
mod console;
mod session;

use std::{
    env, io,
    path::{Path, PathBuf},
};

use log::info;
use plotarm_motion::{
    drawing::{load_from_path, DrawingStore},
    motion::{compile, extract_polylines},
};

use crate::{
    config::AppConfig,
    session::{Backend, Session},
};

type DynError = Box<dyn std::error::Error>;

fn version() -> &'static str {
    option_env!("VERGEN_GIT_DESCRIBE").unwrap_or(env!("CARGO_PKG_VERSION"))
}

/// Flags that can appear anywhere after the task
struct Options {
    config: Option<PathBuf>,
    port: Option<String>,
    simulate: bool,
}

impl Options {
    /// Remove the flags from `args`, leaving the task and its arguments
    fn take_from(args: &mut Vec<String>) -> Result<Self, DynError> {
        let mut options = Options {
            config: None,
            port: None,
            simulate: false,
        };

        let mut rest = Vec::new();
        let mut iter = args.drain(..);
        while let Some(arg) = iter.next() {
            match arg.as_str() {
                "--sim" => options.simulate = true,
                "--config" => match iter.next() {
                    Some(path) => options.config = Some(PathBuf::from(path)),
                    None => Err("--config needs a file")?,
                },
                "--port" => match iter.next() {
                    Some(port) => options.port = Some(port),
                    None => Err("--port needs a device path")?,
                },
                x if x.starts_with("--") => Err(format!("Unknown option: {}", x))?,
                _ => rest.push(arg),
            }
        }
        drop(iter);

        *args = rest;
        Ok(options)
    }

    fn backend(&self) -> Backend {
        if self.simulate {
            Backend::Simulated { realtime: true }
        } else {
            Backend::Serial
        }
    }

    fn app_config(&self) -> Result<AppConfig, DynError> {
        let mut config = AppConfig::load(self.config.as_deref())?;
        if let Some(port) = &self.port {
            config.port = port.clone();
        }
        Ok(config)
    }
}

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    if let Err(e) = try_main() {
        eprintln!("{}", e);
        std::process::exit(-1);
    }
}

fn try_main() -> Result<(), DynError> {
    let mut args: Vec<String> = env::args().skip(1).collect();
    let options = Options::take_from(&mut args)?;

    info!("plotarm {}", version());

    match args.first().map(String::as_str) {
        Some("console") => run_console(&options)?,
        Some("draw") => match args.get(1) {
            Some(file) => draw_file(&options, Path::new(file))?,
            None => Err("Drawing file not given")?,
        },
        Some("check") => match args.get(1) {
            Some(file) => check_file(&options, Path::new(file))?,
            None => Err("Drawing file not given")?,
        },
        Some("reset") => reset(&options)?,
        _ => print_help(),
    }
    Ok(())
}

fn print_help() {
    eprintln!(
        "
Available Tasks:
console: interactive operator console
draw <file>: play a drawing file and exit
check <file>: validate a drawing file and show its motion
reset: replace the stored drawing with the page boundary, even a malformed one

Options:
--config <file>: settings file (default plotarm.toml)
--port <path>: serial device of the arm
--sim: use the simulated arm
"
    )
}

fn run_console(options: &Options) -> Result<(), DynError> {
    let mut session = Session::new(options.app_config()?, options.backend())?;
    console::run(&mut session, io::stdin().lock(), io::stdout())?;

    if session.is_connected() {
        session.disconnect()?;
    }
    Ok(())
}

fn draw_file(options: &Options, file: &Path) -> Result<(), DynError> {
    let mut session = Session::new(options.app_config()?, options.backend())?;

    println!("{}", session.load(file)?);
    println!("{}", session.connect()?);
    println!("{}", session.draw()?);

    let report = session.wait_for_playback();
    // Park and close even when the drawing failed
    println!("{}", session.disconnect()?);

    let report = report?;
    println!(
        "Drew {} strokes ({} empty) with {} commands",
        report.strokes_drawn, report.strokes_skipped, report.commands
    );
    Ok(())
}

fn check_file(options: &Options, file: &Path) -> Result<(), DynError> {
    let config = options.app_config()?;
    let drawing = load_from_path(file)?;
    let program = compile(&extract_polylines(&drawing), &config.plotter.to_state());

    println!(
        "{}: {} strokes, {} points",
        file.display(),
        drawing.strokes.len(),
        drawing.point_count()
    );
    println!(
        "{} strokes to draw, {} empty, {} steps, {} planned moves",
        program.strokes,
        program.skipped.len(),
        program.steps.len(),
        program.moves().count()
    );
    Ok(())
}

fn reset(options: &Options) -> Result<(), DynError> {
    let config = options.app_config()?;
    // Also recovers a file that no longer parses
    let store = DrawingStore::create(&config.drawing_path)?;
    println!("Reset {}", store.path().display());
    Ok(())
}
