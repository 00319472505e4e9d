use std::{
    io::{self, BufRead, BufReader, Read, Write},
    sync::{Arc, Mutex},
    time,
};

use log::{debug, error, info};

use super::{
    Arm, ArmError, ArmMove, ArmPose, Duration, EmergencyStop, HALT_COMMAND, HaltLine, Horizontal,
    ModuleType, StopSignal,
};
use crate::config::{MOVE_FEEDRATE, SERIAL_POLL_MS};

pub const LINE_END: &str = "\r";

/// Rotrics DexArm driven with its G-code dialect over a byte stream
///
/// Every command is acknowledged with a line starting with `ok`.
/// There is no timeout on the acknowledgement, a silent arm blocks forever.
pub struct Dexarm {
    reader: Box<dyn BufRead + Send>,
    writer: HaltLine,
    signal: StopSignal,
    connected: bool,
    feedrate: u32,
}

impl Dexarm {
    pub fn new<R, W>(reader: R, writer: W) -> Self
    where
        R: Read + Send + 'static,
        W: Write + Send + 'static,
    {
        Self {
            reader: Box::new(BufReader::new(reader)),
            writer: Arc::new(Mutex::new(Box::new(writer))),
            signal: StopSignal::new(),
            connected: true,
            feedrate: MOVE_FEEDRATE,
        }
    }

    /// Open the serial device of the arm, e.g. `/dev/ttyACM0`, in raw mode
    pub fn open(port: &str, baud_rate: u32) -> Result<Self, ArmError> {
        let device = serialport::new(port, baud_rate)
            .timeout(time::Duration::from_millis(SERIAL_POLL_MS))
            .open()?;
        let reader = device.try_clone()?;

        info!("Opened arm on {} at {} baud", port, baud_rate);

        Ok(Self::new(reader, device))
    }

    pub fn with_feedrate(mut self, feedrate: u32) -> Self {
        self.feedrate = feedrate;
        self
    }

    /// Stop talking to the arm. Later commands fail with `NotConnected`
    pub fn close(&mut self) {
        self.connected = false;
    }

    fn write_line(&mut self, command: &str) -> Result<(), ArmError> {
        let mut writer = self.writer.lock().map_err(|_| ArmError::Disconnected)?;
        writer.write_all(command.as_bytes())?;
        writer.write_all(LINE_END.as_bytes())?;
        writer.flush()?;
        Ok(())
    }

    /// Send one command and collect the reply lines before the `ok`
    fn send(&mut self, command: &str, wait: bool) -> Result<Vec<String>, ArmError> {
        if !self.connected {
            return Err(ArmError::NotConnected);
        }

        debug!("-> {}", command);
        self.write_line(command)?;

        if !wait {
            return Ok(Vec::new());
        }

        let mut replies = Vec::new();
        let mut rejection = None;
        let mut line = String::new();
        loop {
            line.clear();
            let read = loop {
                // A timed out read keeps what it got so far in `line`
                match self.reader.read_line(&mut line) {
                    Ok(read) => break read,
                    Err(err) if err.kind() == io::ErrorKind::TimedOut => continue,
                    Err(err) => {
                        self.connected = false;
                        return Err(err.into());
                    }
                }
            };
            if read == 0 {
                self.connected = false;
                error!("Arm closed the connection while waiting for `{}`", command);
                return Err(ArmError::Disconnected);
            }

            let line = line.trim();
            if line.is_empty() {
                continue;
            }
            debug!("<- {}", line);

            if line.starts_with("ok") {
                break;
            }

            // Marlin still sends the `ok` after an error so keep reading until then
            if line.starts_with("Error") || line.contains("Unknown command") {
                rejection = Some(line.to_string());
            } else {
                replies.push(line.to_string());
            }
        }

        match rejection {
            Some(reply) => Err(ArmError::Rejected {
                command: command.to_string(),
                reply,
            }),
            None => Ok(replies),
        }
    }
}

pub fn format_move(target: &ArmMove, feedrate: u32) -> String {
    let (axis, value) = match target.horizontal {
        Horizontal::X(x) => ('X', x),
        Horizontal::E(e) => ('E', e),
    };

    format!(
        "G1 F{} {}{:.3} Y{:.3} Z{:.3}",
        feedrate, axis, value, target.y, target.z
    )
}

/// Read `L:value` pairs up to the `Count` section of a position report
fn labeled_values(line: &str) -> Vec<(&str, f64)> {
    line.split_whitespace()
        .take_while(|token| *token != "Count")
        .filter_map(|token| {
            let (label, value) = token.split_once(':')?;
            Some((label, value.parse::<f64>().ok()?))
        })
        .collect()
}

/// Parse the reply of `M114`
///
/// ```text
/// X:0.00 Y:300.00 Z:0.00 E:0.00 Count X:0 Y:0 Z:0
/// DEXARM Theta A:0.00  B:0.00  C:0.00
/// ```
pub fn parse_position(lines: &[String]) -> Result<ArmPose, ArmError> {
    let mut pose = ArmPose::default();
    let mut found = [false; 3];

    for line in lines {
        if line.starts_with("X:") {
            for (label, value) in labeled_values(line) {
                match label {
                    "X" => {
                        pose.x = value;
                        found[0] = true;
                    }
                    "Y" => {
                        pose.y = value;
                        found[1] = true;
                    }
                    "Z" => {
                        pose.z = value;
                        found[2] = true;
                    }
                    "E" => pose.e = value,
                    _ => {}
                }
            }
        } else if line.starts_with("DEXARM Theta") {
            for (label, value) in labeled_values(line) {
                match label {
                    "A" => pose.a = value,
                    "B" => pose.b = value,
                    "C" => pose.c = value,
                    _ => {}
                }
            }
        }
    }

    if found.iter().all(|f| *f) {
        Ok(pose)
    } else {
        Err(ArmError::BadReply(lines.join(" | ")))
    }
}

impl Arm for Dexarm {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn move_to(&mut self, target: &ArmMove) -> Result<(), ArmError> {
        let command = format_move(target, self.feedrate);
        self.send(&command, target.wait)?;
        Ok(())
    }

    fn current_position(&mut self) -> Result<ArmPose, ArmError> {
        let replies = self.send("M114", true)?;
        parse_position(&replies)
    }

    fn go_home(&mut self) -> Result<(), ArmError> {
        self.send("M1112", true)?;
        Ok(())
    }

    fn set_module_type(&mut self, module: ModuleType) -> Result<(), ArmError> {
        self.send(&format!("M888 P{}", module as u8), true)?;
        Ok(())
    }

    fn sliding_rail_init(&mut self) -> Result<(), ArmError> {
        self.send("M2005", true)?;
        Ok(())
    }

    fn delay(&mut self, duration: Duration) -> Result<(), ArmError> {
        self.send(&format!("G4 P{}", duration.to_millis()), true)?;
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), ArmError> {
        self.signal.raise();
        self.send(HALT_COMMAND, false)?;
        Ok(())
    }

    fn stop_handle(&self) -> EmergencyStop {
        EmergencyStop::new(self.signal.clone(), Some(self.writer.clone()))
    }
}
