use chrono::{DateTime, TimeDelta, Utc};

/// Seconds since the Unix epoch at 2001-01-01T00:00:00 UTC, the EBML date origin.
const EBML_EPOCH: i64 = 978_307_200;

/// Formats a duration as `HH:MM:SS.mmm`.
pub fn time_str(sec: f64) -> String {
    let ms = sec * 1000f64;
    let hours = (ms / 3600000f64) as u64;
    let minutes = ((ms % 3600000f64) / 60000f64) as u64;
    let seconds = ((ms % 60000f64) / 1000f64) as u64;
    let milliseconds = (ms % 1000f64) as u64;

    format!(
        "{hours:0width$}:{minutes:02}:{seconds:02}.{milliseconds:03}",
        width = if hours >= 100 { 0 } else { 2 }
    )
}

/// Formats an EBML date (nanoseconds since 2001-01-01 UTC).
pub fn date_str(ns: i64) -> String {
    DateTime::<Utc>::from_timestamp(EBML_EPOCH, 0)
        .and_then(|origin| origin.checked_add_signed(TimeDelta::nanoseconds(ns)))
        .map(|date| date.format("%Y-%m-%d %H:%M:%S UTC").to_string())
        .unwrap_or_else(|| format!("{ns} ns after 2001-01-01"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn durations() {
        assert_eq!(time_str(0.0), "00:00:00.000");
        assert_eq!(time_str(3725.5), "01:02:05.500");
    }

    #[test]
    fn ebml_dates() {
        assert_eq!(date_str(0), "2001-01-01 00:00:00 UTC");
        assert_eq!(date_str(86_400_000_000_000), "2001-01-02 00:00:00 UTC");
        assert_eq!(date_str(-1_000_000_000), "2000-12-31 23:59:59 UTC");
    }
}
