//! Trailing time-window expressions ("24h", "30m", "7d", "90s").
//!
//! The externally-facing query layer accepts a window string and needs an
//! unambiguous error signal for malformed input, so parsing lives here
//! with a dedicated error type rather than being folded into a generic
//! "bad request" at the HTTP boundary.

use chrono::Duration;
use thiserror::Error;

/// A window expression that could not be parsed.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum WindowError {
    #[error("empty window expression")]
    Empty,

    #[error("unknown window unit '{0}'")]
    UnknownUnit(char),

    #[error("malformed window expression: {0}")]
    Malformed(String),
}

/// Parse a trailing-window expression into a [`Duration`].
///
/// Supported components: `Xd` (days), `Xh` (hours), `Xm` (minutes),
/// `Xs` (seconds). Components can be combined ("1h30m"). A bare number
/// is read as minutes ("30" == "30m").
pub fn parse_window(s: &str) -> Result<Duration, WindowError> {
    let s = s.trim();
    if s.is_empty() {
        return Err(WindowError::Empty);
    }

    let mut total_secs: i64 = 0;
    let mut num_buf = String::new();
    let mut found_unit = false;

    for ch in s.chars() {
        if ch.is_ascii_digit() {
            num_buf.push(ch);
        } else {
            if num_buf.is_empty() {
                return Err(WindowError::Malformed(s.to_string()));
            }
            let n: i64 = num_buf
                .parse()
                .map_err(|_| WindowError::Malformed(s.to_string()))?;
            num_buf.clear();
            match ch {
                'd' => total_secs += n * 86_400,
                'h' => total_secs += n * 3_600,
                'm' => total_secs += n * 60,
                's' => total_secs += n,
                other => return Err(WindowError::UnknownUnit(other)),
            }
            found_unit = true;
        }
    }

    if !num_buf.is_empty() {
        if found_unit {
            // Ambiguous: "1h30" -- refuse trailing digits.
            return Err(WindowError::Malformed(s.to_string()));
        }
        let n: i64 = num_buf
            .parse()
            .map_err(|_| WindowError::Malformed(s.to_string()))?;
        total_secs += n * 60;
    }

    Ok(Duration::seconds(total_secs))
}

// ── Tests ─────────────────────────────────────────────────────
