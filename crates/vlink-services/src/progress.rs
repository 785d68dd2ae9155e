//! Human-readable transfer progress.

use std::fmt;

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// Progress derived from a pair of byte counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    /// Whole percent, rounded down. None for an empty transfer.
    pub percentage: Option<u8>,
    pub transferred: u64,
    pub total: u64,
}

impl Progress {
    pub fn new(transferred: u64, total: u64) -> Self {
        let percentage = if total == 0 {
            None
        } else {
            let pct = (transferred as u128 * 100 / total as u128).min(100);
            Some(pct as u8)
        };
        Self {
            percentage,
            transferred,
            total,
        }
    }

    pub fn transferred_text(&self) -> String {
        format_size(self.transferred)
    }

    pub fn total_text(&self) -> String {
        format_size(self.total)
    }

    /// Complete when every announced byte has moved. An empty transfer is
    /// complete from the start.
    pub fn is_complete(&self) -> bool {
        self.transferred == self.total
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.percentage {
            Some(p) => write!(f, "{p}% ({}/{})", self.transferred_text(), self.total_text()),
            None => write!(f, "{}/{}", self.transferred_text(), self.total_text()),
        }
    }
}

/// Format a byte count in base-1024 units, rounded to two decimals.
/// Trailing zeros are dropped: `1024` is `1 KB`, `150000` is `146.48 KB`.
pub fn format_size(bytes: u64) -> String {
    if bytes == 0 {
        return "0 B".to_string();
    }
    let mut exp = 0;
    let mut scale: u64 = 1;
    while exp + 1 < UNITS.len() && bytes / scale >= 1024 {
        scale *= 1024;
        exp += 1;
    }
    let value = bytes as f64 / scale as f64;
    let rounded = (value * 100.0).round() / 100.0;
    format!("{rounded} {}", UNITS[exp])
}
