// ---- Plotter parameters ----
// The height of the paper surface in mm before any user offset
pub const PAPER_Z_MM: f64 = -50.0;
// The height the pen travels at between strokes
pub const SAFE_Z_MM: f64 = -25.0;
// Extra clearance above SAFE_Z_MM for the first move after connecting
pub const CONNECT_CLEARANCE_MM: f64 = 10.0;
// Pen depth per unit of pressure
// Negative values press the pen harder into the paper
pub const PRESSURE_FACTOR: f64 = -5.0;
// The horizontal position used for the calibration moves
pub const HOME_X_MM: f64 = 0.0;
pub const HOME_Y_MM: f64 = 300.0;

// ---- Calibration ranges ----
pub const MIN_Z_OFFSET_MM: f64 = -5.0;
pub const MAX_Z_OFFSET_MM: f64 = 5.0;
// The pressure value is stored negated as the pressure factor
pub const MIN_PRESSURE_VALUE: f64 = 0.0;
pub const MAX_PRESSURE_VALUE: f64 = 20.0;
pub const MIN_PRESSURE: f64 = 0.0;
pub const MAX_PRESSURE: f64 = 1.0;

// ---- Timing ----
// Lets the arm stop oscillating before the pressure of the next point is applied
pub const SETTLE_DELAY_MS: u64 = 100;
// Pause between the steps of the pressure probe
pub const PROBE_DELAY_MS: u64 = 500;

// ---- DexArm protocol ----
// In mm/min
pub const MOVE_FEEDRATE: u32 = 2000;
pub const BAUD_RATE: u32 = 115_200;
// Read timeout of the serial port. Replies are still awaited without a limit
pub const SERIAL_POLL_MS: u64 = 100;

// ---- Drawing store ----
pub const DEFAULT_DRAWING_PATH: &str = "./data/path_data.json";

// ---- Canvas ----
// Canvas pixels per mm
pub const CANVAS_SCALE: f64 = 25.0;
pub const CANVAS_X_OFFSET_MM: f64 = 0.0;
pub const CANVAS_Y_OFFSET_MM: f64 = 250.0;
