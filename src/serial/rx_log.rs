//! Capped in-memory log of received lines, kept for diagnostics

/// Log is trimmed once it grows past this many characters
pub const RX_LOG_CAPACITY: usize = 100_000;

/// Characters kept (the most recent ones) after a trim
pub const RX_LOG_TRIM_TO: usize = 98_000;

/// Received-line log with NUL bytes stripped
#[derive(Debug, Clone, Default)]
pub struct RxLog {
    text: String,
    chars: usize,
}

impl RxLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one received line followed by a newline
    pub fn append(&mut self, line: &str) {
        for c in line.chars().filter(|&c| c != '\0') {
            self.text.push(c);
            self.chars += 1;
        }
        self.text.push('\n');
        self.chars += 1;

        if self.chars > RX_LOG_CAPACITY {
            self.trim();
        }
    }

    fn trim(&mut self) {
        let drop = self.chars - RX_LOG_TRIM_TO;
        let cut = self
            .text
            .char_indices()
            .nth(drop)
            .map_or(self.text.len(), |(index, _)| index);
        self.text.drain(..cut);
        self.chars = RX_LOG_TRIM_TO;
    }

    pub fn as_str(&self) -> &str {
        &self.text
    }

    /// Length in characters
    pub fn len(&self) -> usize {
        self.chars
    }

    pub fn is_empty(&self) -> bool {
        self.chars == 0
    }

    pub fn clear(&mut self) {
        self.text.clear();
        self.chars = 0;
    }
}
