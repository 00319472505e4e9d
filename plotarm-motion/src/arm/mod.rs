pub mod dexarm;
pub mod sim;
pub mod timer;

use std::{
    fmt, io,
    io::Write,
    sync::{
        Arc, Mutex,
        atomic::{AtomicBool, Ordering},
    },
};

use log::warn;

pub use dexarm::Dexarm;
pub use sim::{ArmCommand, SimArm};
pub use timer::Duration;

/// The horizontal channel of a move
///
/// Either the cartesian X axis or the sliding rail, never both
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Horizontal {
    X(f64),
    E(f64),
}

impl Horizontal {
    pub fn value(self) -> f64 {
        match self {
            Horizontal::X(value) | Horizontal::E(value) => value,
        }
    }
}

/// One absolute move of the tool
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ArmMove {
    pub horizontal: Horizontal,
    pub y: f64,
    pub z: f64,
    // Wait for the arm to acknowledge the move before returning
    pub wait: bool,
}

impl ArmMove {
    pub fn new(horizontal: Horizontal, y: f64, z: f64) -> Self {
        Self {
            horizontal,
            y,
            z,
            wait: true,
        }
    }

    pub fn x(&self) -> Option<f64> {
        match self.horizontal {
            Horizontal::X(x) => Some(x),
            Horizontal::E(_) => None,
        }
    }

    pub fn e(&self) -> Option<f64> {
        match self.horizontal {
            Horizontal::E(e) => Some(e),
            Horizontal::X(_) => None,
        }
    }
}

/// Position as reported by the arm
/// x, y, z and the rail e in mm. a, b and c are the joint angles
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct ArmPose {
    pub x: f64,
    pub y: f64,
    pub z: f64,
    pub e: f64,
    pub a: f64,
    pub b: f64,
    pub c: f64,
}

impl fmt::Display for ArmPose {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "x: {}, y: {}, z: {}, e: {}, a: {}, b: {}, c: {}",
            self.x, self.y, self.z, self.e, self.a, self.b, self.c
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ModuleType {
    Pen = 0,
}

#[derive(Debug, thiserror::Error)]
pub enum ArmError {
    #[error("No arm is connected")]
    NotConnected,
    #[error("Connection closed by the arm")]
    Disconnected,
    #[error("Transport error: {0}")]
    Io(#[from] io::Error),
    #[error("Could not open the serial port: {0}")]
    Serial(#[from] serialport::Error),
    #[error("The arm rejected `{command}`: {reply}")]
    Rejected { command: String, reply: String },
    #[error("Could not understand the arm reply `{0}`")]
    BadReply(String),
    #[error("Simulated fault on move #{0}")]
    Injected(usize),
}

/// Shared flag raised by an emergency stop
///
/// Playback checks it between commands and gives up once it is raised
#[derive(Debug, Clone, Default)]
pub struct StopSignal(Arc<AtomicBool>);

impl StopSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn raise(&self) {
        self.0.store(true, Ordering::Release);
    }

    pub fn clear(&self) {
        self.0.store(false, Ordering::Release);
    }

    pub fn is_raised(&self) -> bool {
        self.0.load(Ordering::Acquire)
    }
}

pub type HaltLine = Arc<Mutex<Box<dyn Write + Send>>>;

// Marlin quick stop. Drops everything in the planner
pub const HALT_COMMAND: &str = "M410";

/// Halts the arm without going through whoever currently drives it
#[derive(Clone)]
pub struct EmergencyStop {
    signal: StopSignal,
    line: Option<HaltLine>,
}

impl EmergencyStop {
    pub fn new(signal: StopSignal, line: Option<HaltLine>) -> Self {
        Self { signal, line }
    }

    pub fn signal(&self) -> &StopSignal {
        &self.signal
    }

    /// Raise the stop signal and send the halt command straight to the transport
    pub fn trigger(&self) -> Result<(), ArmError> {
        self.signal.raise();
        warn!("Emergency stop");

        if let Some(line) = &self.line {
            let mut writer = line.lock().map_err(|_| ArmError::Disconnected)?;
            writer.write_all(HALT_COMMAND.as_bytes())?;
            writer.write_all(dexarm::LINE_END.as_bytes())?;
            writer.flush()?;
        }

        Ok(())
    }
}

impl fmt::Debug for EmergencyStop {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EmergencyStop")
            .field("raised", &self.signal.is_raised())
            .field("has_line", &self.line.is_some())
            .finish()
    }
}

#[enum_dispatch::enum_dispatch(AnyArm)]
pub trait Arm {
    fn is_connected(&self) -> bool;

    /// Absolute move. Blocks until acknowledged when `target.wait` is set
    fn move_to(&mut self, target: &ArmMove) -> Result<(), ArmError>;

    fn current_position(&mut self) -> Result<ArmPose, ArmError>;

    fn go_home(&mut self) -> Result<(), ArmError>;

    fn set_module_type(&mut self, module: ModuleType) -> Result<(), ArmError>;

    fn sliding_rail_init(&mut self) -> Result<(), ArmError>;

    /// Dwell on the arm side
    fn delay(&mut self, duration: Duration) -> Result<(), ArmError>;

    fn emergency_stop(&mut self) -> Result<(), ArmError>;

    /// A handle that can stop the arm from another thread
    fn stop_handle(&self) -> EmergencyStop;
}

#[enum_dispatch::enum_dispatch]
pub enum AnyArm {
    Dexarm,
    SimArm,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_horizontal_channels_are_exclusive() {
        let cartesian = ArmMove::new(Horizontal::X(12.0), 300.0, -50.0);
        assert_eq!(cartesian.x(), Some(12.0));
        assert_eq!(cartesian.e(), None);

        let rail = ArmMove::new(Horizontal::E(12.0), 300.0, -50.0);
        assert_eq!(rail.x(), None);
        assert_eq!(rail.e(), Some(12.0));
        assert_eq!(rail.horizontal.value(), 12.0);
    }

    #[test]
    fn test_emergency_stop_raises_signal_and_writes_halt() {
        let buf = SharedBuf::default();
        let line: HaltLine = Arc::new(Mutex::new(Box::new(buf.clone())));
        let signal = StopSignal::new();
        let stop = EmergencyStop::new(signal.clone(), Some(line));

        stop.trigger().unwrap();

        assert!(signal.is_raised());
        let written = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert_eq!(written, "M410\r");
    }

    #[test]
    fn test_stop_signal_clear() {
        let signal = StopSignal::new();
        let other = signal.clone();
        other.raise();
        assert!(signal.is_raised());
        signal.clear();
        assert!(!other.is_raised());
    }
}
