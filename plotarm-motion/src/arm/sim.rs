use std::thread;

use log::debug;

use super::{
    Arm, ArmError, ArmMove, ArmPose, Duration, EmergencyStop, Horizontal, ModuleType, StopSignal,
    timer,
};
use crate::config::{HOME_X_MM, HOME_Y_MM};

/// Everything the simulated arm was asked to do, in order
#[derive(Debug, Clone, PartialEq)]
pub enum ArmCommand {
    Move(ArmMove),
    QueryPosition,
    Home,
    SetModule(ModuleType),
    RailInit,
    Delay(Duration),
    EmergencyStop,
}

type Observer = Box<dyn FnMut(&ArmCommand) + Send>;

/// An arm without hardware
///
/// Records the command log and tracks the pose the real arm would report.
pub struct SimArm {
    connected: bool,
    pose: ArmPose,
    home: ArmPose,
    log: Vec<ArmCommand>,
    moves: usize,
    fail_on_move: Option<usize>,
    realtime: bool,
    observer: Option<Observer>,
    signal: StopSignal,
}

impl Default for SimArm {
    fn default() -> Self {
        let home = ArmPose {
            x: HOME_X_MM,
            y: HOME_Y_MM,
            z: 0.0,
            ..Default::default()
        };

        Self {
            connected: true,
            pose: home,
            home,
            log: Vec::new(),
            moves: 0,
            fail_on_move: None,
            realtime: false,
            observer: None,
            signal: StopSignal::new(),
        }
    }
}

impl SimArm {
    pub fn new() -> Self {
        Self::default()
    }

    /// An arm that reports itself as not connected
    pub fn disconnected() -> Self {
        Self {
            connected: false,
            ..Default::default()
        }
    }

    /// Fail the nth move (counting from 1) with `ArmError::Injected`
    pub fn with_failure_on_move(mut self, move_number: usize) -> Self {
        self.fail_on_move = Some(move_number);
        self
    }

    /// Actually sleep on delays
    pub fn with_realtime(mut self, realtime: bool) -> Self {
        self.realtime = realtime;
        self
    }

    pub fn with_pose(mut self, pose: ArmPose) -> Self {
        self.pose = pose;
        self
    }

    /// Called with every command after it was accepted
    pub fn with_observer<F>(mut self, observer: F) -> Self
    where
        F: FnMut(&ArmCommand) + Send + 'static,
    {
        self.observer = Some(Box::new(observer));
        self
    }

    pub fn set_connected(&mut self, connected: bool) {
        self.connected = connected;
    }

    pub fn commands(&self) -> &[ArmCommand] {
        &self.log
    }

    pub fn moves(&self) -> impl Iterator<Item = &ArmMove> {
        self.log.iter().filter_map(|command| match command {
            ArmCommand::Move(target) => Some(target),
            _ => None,
        })
    }

    pub fn pose(&self) -> ArmPose {
        self.pose
    }

    pub fn clear_log(&mut self) {
        self.log.clear();
        self.moves = 0;
    }

    fn ensure_connected(&self) -> Result<(), ArmError> {
        if self.connected {
            Ok(())
        } else {
            Err(ArmError::NotConnected)
        }
    }

    fn record(&mut self, command: ArmCommand) {
        debug!("Sim arm: {:?}", command);
        if let Some(observer) = self.observer.as_mut() {
            observer(&command);
        }
        self.log.push(command);
    }
}

impl Arm for SimArm {
    fn is_connected(&self) -> bool {
        self.connected
    }

    fn move_to(&mut self, target: &ArmMove) -> Result<(), ArmError> {
        self.ensure_connected()?;

        self.moves += 1;
        if self.fail_on_move == Some(self.moves) {
            return Err(ArmError::Injected(self.moves));
        }

        match target.horizontal {
            Horizontal::X(x) => self.pose.x = x,
            Horizontal::E(e) => self.pose.e = e,
        }
        self.pose.y = target.y;
        self.pose.z = target.z;

        self.record(ArmCommand::Move(*target));
        Ok(())
    }

    fn current_position(&mut self) -> Result<ArmPose, ArmError> {
        self.ensure_connected()?;
        self.record(ArmCommand::QueryPosition);
        Ok(self.pose)
    }

    fn go_home(&mut self) -> Result<(), ArmError> {
        self.ensure_connected()?;
        self.pose = self.home;
        self.record(ArmCommand::Home);
        Ok(())
    }

    fn set_module_type(&mut self, module: ModuleType) -> Result<(), ArmError> {
        self.ensure_connected()?;
        self.record(ArmCommand::SetModule(module));
        Ok(())
    }

    fn sliding_rail_init(&mut self) -> Result<(), ArmError> {
        self.ensure_connected()?;
        self.pose.e = 0.0;
        self.record(ArmCommand::RailInit);
        Ok(())
    }

    fn delay(&mut self, duration: Duration) -> Result<(), ArmError> {
        self.ensure_connected()?;
        if self.realtime {
            thread::sleep(timer::to_std(duration));
        }
        self.record(ArmCommand::Delay(duration));
        Ok(())
    }

    fn emergency_stop(&mut self) -> Result<(), ArmError> {
        self.signal.raise();
        self.record(ArmCommand::EmergencyStop);
        Ok(())
    }

    fn stop_handle(&self) -> EmergencyStop {
        EmergencyStop::new(self.signal.clone(), None)
    }
}
