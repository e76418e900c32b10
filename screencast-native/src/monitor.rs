//! Parsing of the codec engine's two diagnostic streams.
//!
//! `-progress pipe:1` writes `key=value` blocks to stdout, each closed by a
//! `progress=continue|end` line. The input duration needed to turn output
//! time into a ratio only appears in the stderr banner:
//! ```text
//!   Duration: 00:01:02.50, start: 0.000000, bitrate: 2310 kb/s
//! ```

/// Running state of one `-progress` stream.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ProgressState {
    pub out_time_secs: f64,
    pub complete: bool,
}

impl ProgressState {
    /// Apply one `key=value` line. Returns true when the line closes a block.
    pub fn update(&mut self, line: &str) -> bool {
        let Some((key, value)) = line.trim().split_once('=') else {
            return false;
        };
        let value = value.trim();
        match key.trim() {
            // Despite the name, out_time_ms is reported in microseconds.
            "out_time_us" | "out_time_ms" => {
                if let Ok(us) = value.parse::<f64>() {
                    self.out_time_secs = us / 1_000_000.0;
                }
                false
            }
            "out_time" => {
                if let Some(secs) = parse_timestamp(value) {
                    self.out_time_secs = secs;
                }
                false
            }
            "progress" => {
                self.complete = value == "end";
                true
            }
            _ => false,
        }
    }

    /// Raw ratio for the block just closed. Unknown durations report nothing
    /// until the stream ends.
    pub fn ratio(&self, duration_secs: Option<f64>) -> Option<f64> {
        if self.complete {
            return Some(1.0);
        }
        match duration_secs {
            Some(d) if d > 0.0 => Some(self.out_time_secs / d),
            _ => None,
        }
    }
}

/// `HH:MM:SS(.frac)` to seconds.
pub fn parse_timestamp(value: &str) -> Option<f64> {
    let mut parts = value.trim().split(':');
    let hours: f64 = parts.next()?.parse().ok()?;
    let minutes: f64 = parts.next()?.parse().ok()?;
    let seconds: f64 = parts.next()?.parse().ok()?;
    if parts.next().is_some() || hours < 0.0 || minutes < 0.0 || seconds < 0.0 {
        return None;
    }
    Some(hours * 3600.0 + minutes * 60.0 + seconds)
}

/// Input duration from a stderr banner line, if the line carries one.
pub fn parse_duration_line(line: &str) -> Option<f64> {
    let value = extract_value(line, "Duration:")?;
    parse_timestamp(value.trim_end_matches(','))
}

/// Whitespace-delimited value following `key` in `line`.
fn extract_value<'a>(line: &'a str, key: &str) -> Option<&'a str> {
    let start = line.find(key)?;
    let after_key = line[start + key.len()..].trim_start();
    let end = after_key.find(char::is_whitespace).unwrap_or(after_key.len());
    let value = &after_key[..end];
    (!value.is_empty()).then_some(value)
}
