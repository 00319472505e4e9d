pub type TimerDuration = fugit::Duration<u64, 1, 1_000_000>;

pub use TimerDuration as Duration;

/// Convert to a std duration for blocking sleeps on the host
pub fn to_std(duration: Duration) -> std::time::Duration {
    std::time::Duration::from_micros(duration.to_micros())
}
