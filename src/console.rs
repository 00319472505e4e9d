use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    str::FromStr,
};

use enum_iterator::{all, Sequence};
use log::debug;

use crate::session::{Session, SliderAction};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Sequence)]
pub enum CommandKind {
    Connect,
    Disconnect,
    Port,
    Load,
    Canvas,
    Draw,
    Clear,
    Touch,
    ZOffset,
    Pressure,
    Slider,
    Stop,
    Status,
    Help,
    Quit,
}

impl CommandKind {
    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Connect => "connect",
            CommandKind::Disconnect => "disconnect",
            CommandKind::Port => "port",
            CommandKind::Load => "load",
            CommandKind::Canvas => "canvas",
            CommandKind::Draw => "draw",
            CommandKind::Clear => "clear",
            CommandKind::Touch => "touch",
            CommandKind::ZOffset => "z",
            CommandKind::Pressure => "pressure",
            CommandKind::Slider => "slider",
            CommandKind::Stop => "stop",
            CommandKind::Status => "status",
            CommandKind::Help => "help",
            CommandKind::Quit => "quit",
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            CommandKind::Connect => "connect: open the arm and home it",
            CommandKind::Disconnect => "disconnect: park and close the arm",
            CommandKind::Port => "port <path>: serial device used by the next connect",
            CommandKind::Load => "load <file>: replace the drawing with a JSON file",
            CommandKind::Canvas => "canvas <path>...: replace the drawing with canvas paths (M0,0L10,10)",
            CommandKind::Draw => "draw: play the drawing",
            CommandKind::Clear => "clear: reset the drawing to the page boundary",
            CommandKind::Touch => "touch: put the pen on the paper or lift it again",
            CommandKind::ZOffset => "z <mm>: paper height offset, -5 to 5",
            CommandKind::Pressure => "pressure <value>: pressure depth range, 0 to 20",
            CommandKind::Slider => "slider on|off|init: draw through the sliding rail",
            CommandKind::Stop => "stop: emergency stop",
            CommandKind::Status => "status: show the arm, drawing and calibration",
            CommandKind::Help => "help: list the commands",
            CommandKind::Quit => "quit: leave the console",
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        all::<CommandKind>().find(|kind| kind.name() == name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Connect,
    Disconnect,
    Port(String),
    Load(PathBuf),
    Canvas(Vec<String>),
    Draw,
    Clear,
    Touch,
    ZOffset(f64),
    Pressure(f64),
    Slider(SliderAction),
    Stop,
    Status,
    Help,
    Quit,
}

#[derive(Debug, PartialEq, thiserror::Error)]
pub enum CommandError {
    #[error("Unknown command `{0}`. Try `help`")]
    Unknown(String),
    #[error("Usage: {0}")]
    Usage(&'static str),
}

/// A real number. `nan` and `inf` parse as floats but are no use to the arm
fn parse_finite(value: &str) -> Option<f64> {
    value.parse::<f64>().ok().filter(|value| value.is_finite())
}

impl FromStr for Command {
    type Err = CommandError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut words = s.split_whitespace();
        let name = words.next().unwrap_or_default();
        let kind =
            CommandKind::from_name(name).ok_or_else(|| CommandError::Unknown(name.to_string()))?;
        let args: Vec<&str> = words.collect();
        let usage = CommandError::Usage(kind.usage());

        let command = match (kind, args.as_slice()) {
            (CommandKind::Connect, []) => Command::Connect,
            (CommandKind::Disconnect, []) => Command::Disconnect,
            (CommandKind::Port, [port]) => Command::Port(port.to_string()),
            (CommandKind::Load, [file]) => Command::Load(PathBuf::from(file)),
            (CommandKind::Canvas, paths) if !paths.is_empty() => {
                Command::Canvas(paths.iter().map(|path| path.to_string()).collect())
            }
            (CommandKind::Draw, []) => Command::Draw,
            (CommandKind::Clear, []) => Command::Clear,
            (CommandKind::Touch, []) => Command::Touch,
            (CommandKind::ZOffset, [value]) => Command::ZOffset(parse_finite(value).ok_or(usage)?),
            (CommandKind::Pressure, [value]) => {
                Command::Pressure(parse_finite(value).ok_or(usage)?)
            }
            (CommandKind::Slider, ["on"]) => Command::Slider(SliderAction::On),
            (CommandKind::Slider, ["off"]) => Command::Slider(SliderAction::Off),
            (CommandKind::Slider, ["init"]) => Command::Slider(SliderAction::Init),
            (CommandKind::Stop, []) => Command::Stop,
            (CommandKind::Status, []) => Command::Status,
            (CommandKind::Help, []) => Command::Help,
            (CommandKind::Quit, []) => Command::Quit,
            _ => return Err(usage),
        };

        Ok(command)
    }
}

pub fn help() -> String {
    all::<CommandKind>()
        .map(CommandKind::usage)
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run one command and describe the outcome. Failures are reported, never raised
pub fn execute(session: &mut Session, command: Command) -> String {
    debug!("Console command {:?}", command);

    let result = match command {
        Command::Connect => session.connect(),
        Command::Disconnect => session.disconnect(),
        Command::Port(port) => Ok(session.set_port(&port)),
        Command::Load(path) => session.load(&path),
        Command::Canvas(paths) => session.load_canvas(paths.as_slice()),
        Command::Draw => session.draw(),
        Command::Clear => session.clear(),
        Command::Touch => session.touch(),
        Command::ZOffset(offset) => session.z_offset(offset),
        Command::Pressure(value) => session.pressure(value),
        Command::Slider(action) => session.slider(action),
        Command::Stop => session.stop(),
        Command::Status => Ok(session.status()),
        Command::Help => Ok(help()),
        Command::Quit => Ok("Bye".to_string()),
    };

    result.unwrap_or_else(|err| format!("Error: {}", err))
}

/// Read commands until `quit` or the end of the input
pub fn run<R: BufRead, W: Write>(
    session: &mut Session,
    input: R,
    mut output: W,
) -> io::Result<()> {
    writeln!(output, "Type `help` for the commands")?;
    write!(output, "> ")?;
    output.flush()?;

    for line in input.lines() {
        let line = line?;

        if let Some(status) = session.poll() {
            writeln!(output, "{}", status)?;
        }

        if !line.trim().is_empty() {
            match line.parse::<Command>() {
                Ok(Command::Quit) => break,
                Ok(command) => writeln!(output, "{}", execute(session, command))?,
                Err(err) => writeln!(output, "{}", err)?,
            }
        }

        write!(output, "> ")?;
        output.flush()?;
    }

    if session.is_playing() {
        writeln!(output, "Waiting for the drawing to finish")?;
        if let Err(err) = session.wait_for_playback() {
            writeln!(output, "Drawing failed: {}", err)?;
        }
    }

    Ok(())
}
