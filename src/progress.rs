//! Progress extraction from ffmpeg status output.
//!
//! ffmpeg reports its position as `time=HH:MM:SS.ms` on stderr. Dividing that
//! by the probed duration gives a completion fraction.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::Serialize;

use crate::probe::ProbeResult;

static TIME_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"time=\s*(\d+):(\d{1,2}):(\d{1,2}(?:\.\d+)?)").expect("time pattern is valid")
});

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProgressEvent {
    /// Completion in [0, 1]
    pub fraction: f64,
    /// Position reported by ffmpeg, in seconds
    pub elapsed_secs: f64,
}

impl ProgressEvent {
    pub fn percent(&self) -> f64 {
        self.fraction * 100.0
    }
}

/// Parse an `HH:MM:SS(.ms)` timestamp into seconds.
pub fn parse_timestamp(hours: &str, minutes: &str, seconds: &str) -> Option<f64> {
    let hours: f64 = hours.parse().ok()?;
    let minutes: f64 = minutes.parse().ok()?;
    let seconds: f64 = seconds.parse().ok()?;
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ProgressParser {
    duration: Option<f64>,
}

impl ProgressParser {
    pub fn new(duration: Option<f64>) -> Self {
        Self { duration }
    }

    pub fn from_probe(probe: &ProbeResult) -> Self {
        Self::new(probe.duration())
    }

    pub fn duration(&self) -> Option<f64> {
        self.duration.filter(|d| d.is_finite() && *d > 0.0)
    }

    /// Extract a progress event from one line of output. Lines without a
    /// `time=` marker, and every line when the duration is unknown, yield `None`.
    pub fn parse_line(&self, line: &str) -> Option<ProgressEvent> {
        let total = self.duration()?;
        let caps = TIME_PATTERN.captures(line)?;
        let elapsed_secs = parse_timestamp(&caps[1], &caps[2], &caps[3])?;

        Some(ProgressEvent {
            fraction: (elapsed_secs / total).clamp(0.0, 1.0),
            elapsed_secs,
        })
    }

    /// Lazily map a line source onto progress events. The iterator ends when
    /// the line source does.
    pub fn events<I, S>(self, lines: I) -> ProgressEvents<I::IntoIter>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        ProgressEvents {
            parser: self,
            lines: lines.into_iter(),
        }
    }
}

pub struct ProgressEvents<I> {
    parser: ProgressParser,
    lines: I,
}

impl<I, S> Iterator for ProgressEvents<I>
where
    I: Iterator<Item = S>,
    S: AsRef<str>,
{
    type Item = ProgressEvent;

    fn next(&mut self) -> Option<Self::Item> {
        let parser = self.parser;
        self.lines.find_map(|line| parser.parse_line(line.as_ref()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const STATUS: &str = "frame= 1234 fps= 48 q=28.0 size=   10240kB time=00:01:30.50 bitrate= 926.9kbits/s speed=1.93x";

    #[test]
    fn test_parse_line() {
        let parser = ProgressParser::new(Some(181.0));
        let event = parser.parse_line(STATUS).unwrap();

        assert_eq!(event.elapsed_secs, 90.5);
        assert!((event.fraction - 0.5).abs() < 1e-9);
        assert!((event.percent() - 50.0).abs() < 1e-9);
    }

    #[test]
    fn test_non_matching_lines_are_ignored() {
        let parser = ProgressParser::new(Some(100.0));
        assert_eq!(parser.parse_line("Stream #0:0: Video: h264"), None);
        assert_eq!(parser.parse_line(""), None);
        assert_eq!(parser.parse_line("time=N/A bitrate=N/A"), None);
    }

    #[test]
    fn test_fraction_is_clamped() {
        let parser = ProgressParser::new(Some(60.0));
        let event = parser.parse_line("time=01:00:00.00").unwrap();
        assert_eq!(event.fraction, 1.0);
    }

    #[test]
    fn test_unknown_duration_emits_nothing() {
        assert_eq!(ProgressParser::new(None).parse_line(STATUS), None);
        assert_eq!(ProgressParser::new(Some(0.0)).parse_line(STATUS), None);
    }

    #[test]
    fn test_events_are_lazy() {
        let parser = ProgressParser::new(Some(100.0));
        let lines = vec![
            "Input #0, matroska,webm, from 'in.mkv':",
            "time=00:00:10.00 speed=2x",
            "garbage",
            "time=00:00:50.00 speed=2x",
            "time=00:01:40.00 speed=2x",
        ];

        let fractions: Vec<f64> = parser.events(lines).map(|e| e.fraction).collect();
        assert_eq!(fractions, vec![0.1, 0.5, 1.0]);

        // An endless source only yields as far as it is read
        let endless = std::iter::repeat("time=00:00:25.00");
        let first_two: Vec<_> = parser.events(endless).take(2).collect();
        assert_eq!(first_two.len(), 2);
        assert_eq!(first_two[0].fraction, 0.25);
    }

    #[test]
    fn test_parse_timestamp() {
        assert_eq!(parse_timestamp("01", "01", "01.5"), Some(3661.5));
        assert_eq!(parse_timestamp("x", "0", "0"), None);
    }
}
