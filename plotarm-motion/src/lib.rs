pub mod arm;
pub mod config;
pub mod drawing;
pub mod motion;
pub mod utils;
