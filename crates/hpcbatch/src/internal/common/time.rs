use std::time::Duration;

/// Simulated instant, measured as the offset from the start of the simulation.
pub type SimTime = Duration;

/// Parses a non-negative number of seconds, fractional values allowed.
pub fn parse_seconds(value: &str) -> Option<Duration> {
    let secs: f64 = value.trim().parse().ok()?;
    Duration::try_from_secs_f64(secs).ok()
}

/// Formats a simulated instant for log messages.
pub fn fmt_time(time: SimTime) -> String {
    format!("{:.3}s", time.as_secs_f64())
}
