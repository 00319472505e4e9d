use std::{
    path::Path,
    sync::{Arc, Mutex, PoisonError},
    thread::{self, JoinHandle},
};

use log::{error, info, warn};
use plotarm_motion::{
    arm::{AnyArm, Arm, ArmError, Dexarm, EmergencyStop, SimArm},
    drawing::{drawing_from_canvas_paths, DrawingStore, StoreError},
    motion::{
        init_slider, initialise_arm, set_axis_mode, set_pressure_factor, set_z_offset, toggle_pen,
        AxisMode, PenPosition, PlayError, PlaybackReport, Player, PlotterState,
    },
};

use crate::config::AppConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Backend {
    Serial,
    Simulated { realtime: bool },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliderAction {
    On,
    Off,
    Init,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    #[error(transparent)]
    Store(#[from] StoreError),
    #[error(transparent)]
    Play(#[from] PlayError),
    #[error(transparent)]
    Arm(#[from] ArmError),
    #[error("Playback thread panicked")]
    Panicked,
    #[error("Nothing is playing")]
    NotPlaying,
}

type Playback = JoinHandle<Result<PlaybackReport, PlayError>>;

/// Everything one operator works with: the drawing, the calibration and the arm
///
/// Playback runs on its own thread holding the arm. While it runs every other
/// arm command is refused, only the emergency stop gets through.
pub struct Session {
    config: AppConfig,
    backend: Backend,
    store: DrawingStore,
    state: PlotterState,
    pen: PenPosition,
    arm: Arc<Mutex<Option<AnyArm>>>,
    stop: Option<EmergencyStop>,
    playback: Option<Playback>,
}

impl Session {
    pub fn new(config: AppConfig, backend: Backend) -> Result<Self, SessionError> {
        let store = DrawingStore::open(&config.drawing_path)?;
        let state = config.plotter.to_state();

        Ok(Self {
            config,
            backend,
            store,
            state,
            pen: PenPosition::default(),
            arm: Arc::new(Mutex::new(None)),
            stop: None,
            playback: None,
        })
    }

    pub fn state(&self) -> &PlotterState {
        &self.state
    }

    pub fn store(&self) -> &DrawingStore {
        &self.store
    }

    pub fn is_playing(&self) -> bool {
        self.playback
            .as_ref()
            .is_some_and(|playback| !playback.is_finished())
    }

    pub fn is_connected(&self) -> bool {
        self.arm
            .try_lock()
            .map(|arm| arm.as_ref().is_some_and(|arm| arm.is_connected()))
            // Only a playback holds the lock
            .unwrap_or(true)
    }

    /// Run `action` on the connected arm unless a playback owns it
    fn with_arm<T>(
        &self,
        action: impl FnOnce(&mut AnyArm) -> Result<T, PlayError>,
    ) -> Result<T, SessionError> {
        if self.is_playing() {
            return Err(PlayError::Busy.into());
        }

        let mut arm = self.arm.lock().unwrap_or_else(PoisonError::into_inner);
        let arm = arm.as_mut().ok_or(PlayError::NotConnected)?;
        Ok(action(arm)?)
    }

    pub fn connect(&mut self) -> Result<String, SessionError> {
        if self.is_connected() {
            return Ok("Already connected".to_string());
        }

        let mut arm: AnyArm = match self.backend {
            Backend::Serial => Dexarm::open(&self.config.port, self.config.baud_rate)?
                .with_feedrate(self.config.feedrate)
                .into(),
            Backend::Simulated { realtime } => SimArm::new().with_realtime(realtime).into(),
        };

        let pose = initialise_arm(&mut arm, &self.state)?;

        self.stop = Some(arm.stop_handle());
        self.pen = PenPosition::Lifted;
        *self.arm.lock().unwrap_or_else(PoisonError::into_inner) = Some(arm);

        Ok(format!("Connected: {}", pose))
    }

    pub fn disconnect(&mut self) -> Result<String, SessionError> {
        if self.is_playing() {
            return Err(PlayError::Busy.into());
        }

        let arm = self
            .arm
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        self.stop = None;

        let Some(mut arm) = arm else {
            return Ok("No arm is available".to_string());
        };

        if arm.is_connected() {
            if let Err(err) = arm.go_home() {
                warn!("Could not park before disconnecting: {}", err);
            }
        }
        if let AnyArm::Dexarm(dexarm) = &mut arm {
            dexarm.close();
        }

        info!("Arm disconnected");
        Ok("Disconnected".to_string())
    }

    /// Used by the next `connect`
    pub fn set_port(&mut self, port: &str) -> String {
        self.config.port = port.to_string();
        format!("Port: {}", port)
    }

    pub fn load(&mut self, path: &Path) -> Result<String, SessionError> {
        let drawing = self.store.load_file(path)?;
        Ok(format!(
            "Loaded {} strokes from {}",
            drawing.strokes.len(),
            path.display()
        ))
    }

    pub fn load_canvas<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<String, SessionError> {
        let drawing = drawing_from_canvas_paths(paths, &self.config.canvas)?;
        let drawing = self.store.replace(drawing)?;
        Ok(format!("Saved {} canvas strokes", drawing.strokes.len()))
    }

    pub fn clear(&mut self) -> Result<String, SessionError> {
        self.store.reset()?;
        Ok("Canvas cleared".to_string())
    }

    /// Start playing the current drawing in the background
    pub fn draw(&mut self) -> Result<String, SessionError> {
        if self.is_playing() {
            return Err(PlayError::Busy.into());
        }
        if let Some(status) = self.poll() {
            info!("Previous playback: {}", status);
        }
        if !self.is_connected() {
            return Err(PlayError::NotConnected.into());
        }

        // Cleared here so a stop sent right after this call is not lost
        if let Some(stop) = &self.stop {
            stop.signal().clear();
        }

        let arm = self.arm.clone();
        let drawing = self.store.drawing().clone();
        let state = self.state;
        let strokes = drawing.strokes.len();

        self.playback = Some(thread::spawn(move || {
            let mut arm = arm.lock().unwrap_or_else(PoisonError::into_inner);
            let arm = arm.as_mut().ok_or(PlayError::NotConnected)?;
            Player::new(arm).play_drawing(&drawing, &state)
        }));

        Ok(format!("Drawing {} strokes", strokes))
    }

    /// Status of a playback that has finished since the last call
    pub fn poll(&mut self) -> Option<String> {
        if self.is_playing() {
            return None;
        }
        let playback = self.playback.take()?;

        Some(match Self::join(playback) {
            Ok(report) => format!(
                "Drawing completed: {} strokes, {} commands",
                report.strokes_drawn, report.commands
            ),
            Err(err) => format!("Drawing failed: {}", err),
        })
    }

    pub fn wait_for_playback(&mut self) -> Result<PlaybackReport, SessionError> {
        let playback = self.playback.take().ok_or(SessionError::NotPlaying)?;
        Self::join(playback)
    }

    fn join(playback: Playback) -> Result<PlaybackReport, SessionError> {
        match playback.join() {
            Ok(result) => Ok(result?),
            Err(_) => {
                error!("Playback thread panicked");
                Err(SessionError::Panicked)
            }
        }
    }

    pub fn touch(&mut self) -> Result<String, SessionError> {
        let state = self.state;
        let pen = self.pen;
        self.pen = self.with_arm(|arm| toggle_pen(arm, &state, pen))?;

        Ok(match self.pen {
            PenPosition::AtPaper => "Adjust the marker".to_string(),
            PenPosition::Lifted => "Pen lifted".to_string(),
        })
    }

    pub fn z_offset(&mut self, offset: f64) -> Result<String, SessionError> {
        let state = self.state;
        self.state = self.with_arm(|arm| set_z_offset(arm, state, offset))?;
        Ok(format!(
            "Z: {}, Offset: {}",
            self.state.base_z(),
            self.state.z_offset()
        ))
    }

    pub fn pressure(&mut self, value: f64) -> Result<String, SessionError> {
        let state = self.state;
        self.state = self.with_arm(|arm| set_pressure_factor(arm, state, value))?;
        Ok(format!("Pressure: {}", self.state.pressure_factor()))
    }

    pub fn slider(&mut self, action: SliderAction) -> Result<String, SessionError> {
        if self.is_playing() {
            return Err(PlayError::Busy.into());
        }

        match action {
            SliderAction::On => {
                self.state = set_axis_mode(self.state, AxisMode::Slider);
                Ok("Slider in use".to_string())
            }
            SliderAction::Off => {
                self.state = set_axis_mode(self.state, AxisMode::Cartesian);
                Ok("Slider not in use".to_string())
            }
            SliderAction::Init => {
                let state = self.state;
                self.state = self.with_arm(|arm| init_slider(arm, state))?;
                Ok("Slider is initiated and in use".to_string())
            }
        }
    }

    /// Halt the arm now, whether or not a drawing is playing
    ///
    /// A playback holds the arm, so its stop goes out through the shared handle.
    pub fn stop(&self) -> Result<String, SessionError> {
        let Some(stop) = &self.stop else {
            return Ok("No arm is available".to_string());
        };

        if self.is_playing() {
            stop.trigger()?;
        } else {
            let mut arm = self.arm.lock().unwrap_or_else(PoisonError::into_inner);
            match arm.as_mut() {
                Some(arm) => arm.emergency_stop()?,
                None => stop.trigger()?,
            }
        }

        Ok("Emergency stop sent".to_string())
    }

    pub fn status(&self) -> String {
        let drawing = self.store.drawing();
        let arm = if self.is_playing() {
            "drawing"
        } else if self.is_connected() {
            "connected"
        } else {
            "not connected"
        };

        format!(
            "Arm: {} ({}), drawing: {} strokes / {} points, z: {}, pressure: {}, axis: {:?}, pen: {:?}",
            arm,
            self.config.port,
            drawing.strokes.len(),
            drawing.point_count(),
            self.state.base_z(),
            self.state.pressure_factor(),
            self.state.axis_mode(),
            self.pen
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::{
        path::PathBuf,
        sync::atomic::{AtomicUsize, Ordering},
    };

    use plotarm_motion::{arm::ArmCommand, drawing::default_boundary_drawing};

    fn scratch_dir(name: &str) -> PathBuf {
        static COUNTER: AtomicUsize = AtomicUsize::new(0);
        let n = COUNTER.fetch_add(1, Ordering::Relaxed);
        std::env::temp_dir().join(format!(
            "plotarm-session-{}-{}-{}",
            std::process::id(),
            n,
            name
        ))
    }

    fn session(name: &str, realtime: bool) -> (Session, PathBuf) {
        let dir = scratch_dir(name);
        let mut config = AppConfig::default();
        config.drawing_path = dir.join("path_data.json");
        // Six settle delays for the boundary drawing
        config.plotter.settle_ms = 50;

        let session = Session::new(config, Backend::Simulated { realtime }).unwrap();
        (session, dir)
    }

    #[test]
    fn test_motion_needs_an_arm() {
        let (mut session, dir) = session("no-arm", false);

        assert!(matches!(
            session.draw(),
            Err(SessionError::Play(PlayError::NotConnected))
        ));
        assert!(matches!(
            session.touch(),
            Err(SessionError::Play(PlayError::NotConnected))
        ));
        assert_eq!(session.stop().unwrap(), "No arm is available");
        assert_eq!(session.disconnect().unwrap(), "No arm is available");

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_draw_runs_to_completion() {
        let (mut session, dir) = session("draw", false);
        assert!(session.connect().unwrap().starts_with("Connected"));
        assert_eq!(session.connect().unwrap(), "Already connected");

        session.draw().unwrap();
        let report = session.wait_for_playback().unwrap();
        assert_eq!(report.strokes_drawn, 1);

        assert_eq!(session.disconnect().unwrap(), "Disconnected");
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_second_draw_is_refused_while_playing() {
        let (mut session, dir) = session("busy", true);
        session.connect().unwrap();

        session.draw().unwrap();
        assert!(matches!(
            session.draw(),
            Err(SessionError::Play(PlayError::Busy))
        ));
        assert!(matches!(
            session.z_offset(1.0),
            Err(SessionError::Play(PlayError::Busy))
        ));

        session.wait_for_playback().unwrap();
        assert!(session.poll().is_none());
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_stop_aborts_playback() {
        let (mut session, dir) = session("stop", true);
        session.connect().unwrap();

        session.draw().unwrap();
        thread::sleep(std::time::Duration::from_millis(100));
        assert!(session.is_playing());
        session.stop().unwrap();

        assert!(matches!(
            session.wait_for_playback(),
            Err(SessionError::Play(PlayError::Stopped { .. }))
        ));

        // Restarting plays the whole drawing again
        session.draw().unwrap();
        assert_eq!(session.wait_for_playback().unwrap().strokes_drawn, 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_stop_right_after_draw_is_kept() {
        let (mut session, dir) = session("stop-early", true);
        session.connect().unwrap();

        for _ in 0..5 {
            session.draw().unwrap();
            session.stop().unwrap();

            assert!(matches!(
                session.wait_for_playback(),
                Err(SessionError::Play(PlayError::Stopped { .. }))
            ));
        }
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_stop_while_idle_goes_through_the_arm() {
        let (mut session, dir) = session("stop-idle", false);
        session.connect().unwrap();

        assert_eq!(session.stop().unwrap(), "Emergency stop sent");
        {
            let arm = session.arm.lock().unwrap();
            let Some(AnyArm::SimArm(sim)) = arm.as_ref() else {
                panic!("expected the simulated arm");
            };
            assert_eq!(sim.commands().last(), Some(&ArmCommand::EmergencyStop));
        }

        // The next draw starts from a cleared stop
        session.draw().unwrap();
        assert_eq!(session.wait_for_playback().unwrap().strokes_drawn, 1);
        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_calibration_updates_state() {
        let (mut session, dir) = session("calibrate", false);
        session.connect().unwrap();

        assert_eq!(session.touch().unwrap(), "Adjust the marker");
        assert_eq!(session.touch().unwrap(), "Pen lifted");

        session.z_offset(2.0).unwrap();
        assert_eq!(session.state().z_offset(), 2.0);

        assert_eq!(session.pressure(6.0).unwrap(), "Pressure: -6");
        assert_eq!(session.slider(SliderAction::Init).unwrap(), "Slider is initiated and in use");
        assert_eq!(session.state().axis_mode(), AxisMode::Slider);
        session.slider(SliderAction::Off).unwrap();
        assert_eq!(session.state().axis_mode(), AxisMode::Cartesian);

        std::fs::remove_dir_all(dir).ok();
    }

    #[test]
    fn test_canvas_and_clear_replace_the_drawing() {
        let (mut session, dir) = session("canvas", false);

        session.load_canvas(&["M0,0L25,25", "M50,0L50,50"]).unwrap();
        assert_eq!(session.store().drawing().strokes.len(), 2);

        // A bad path leaves the drawing alone
        assert!(session.load_canvas(&["M0,0L1"]).is_err());
        assert_eq!(session.store().drawing().strokes.len(), 2);

        session.clear().unwrap();
        assert_eq!(session.store().drawing(), &default_boundary_drawing());
        std::fs::remove_dir_all(dir).ok();
    }
}
