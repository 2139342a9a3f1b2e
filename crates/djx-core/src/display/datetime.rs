//! Timestamp and duration formatting for display.

use std::fmt;

use jiff::{tz::TimeZone, Timestamp};

/// Formats a timestamp in the system timezone as `YYYY-MM-DD HH:MM:SS TZ`.
pub struct LocalDateTime<'a>(pub &'a Timestamp);

impl fmt::Display for LocalDateTime<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}",
            self.0
                .to_zoned(TimeZone::system())
                .strftime("%Y-%m-%d %H:%M:%S %Z")
        )
    }
}

/// Formats a run duration: milliseconds below one second, then seconds,
/// then minutes and seconds.
pub struct Seconds(pub f64);

impl fmt::Display for Seconds {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let secs = self.0.max(0.0);
        if secs < 1.0 {
            write!(f, "{:.0}ms", secs * 1000.0)
        } else if secs < 60.0 {
            write!(f, "{secs:.2}s")
        } else {
            let whole = secs.round() as u64;
            write!(f, "{}m {:02}s", whole / 60, whole % 60)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_seconds_ranges() {
        assert_eq!(Seconds(0.25).to_string(), "250ms");
        assert_eq!(Seconds(1.5).to_string(), "1.50s");
        assert_eq!(Seconds(125.0).to_string(), "2m 05s");
        assert_eq!(Seconds(-3.0).to_string(), "0ms");
    }
}
