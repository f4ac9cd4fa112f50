//! Character-at-a-time pattern cursors.
//!
//! Each cursor advances over the stream one character per `feed` and reports
//! a completed match; mismatches reset it (restarting at position 1 when the
//! offending character could itself begin the pattern).

#[derive(Debug, Clone)]
pub struct PatternCursor {
    pattern: Vec<char>,
    position: usize,
    is_active: bool,
}

impl PatternCursor {
    pub fn new(pattern: &str) -> Self {
        Self {
            pattern: pattern.chars().collect(),
            position: 0,
            is_active: true,
        }
    }

    pub fn pattern(&self) -> String {
        self.pattern.iter().collect()
    }

    pub fn set_active(&mut self, active: bool) {
        self.is_active = active;
        if !active {
            self.position = 0;
        }
    }

    pub fn reset(&mut self) {
        self.position = 0;
    }

    /// Feed one character; true when the full pattern just matched.
    pub fn feed(&mut self, ch: char) -> bool {
        if !self.is_active || self.pattern.is_empty() {
            return false;
        }
        if ch == self.pattern[self.position] {
            self.position += 1;
            if self.position == self.pattern.len() {
                self.position = 0;
                return true;
            }
            return false;
        }
        self.position = if ch == self.pattern[0] { 1 } else { 0 };
        self.position == self.pattern.len()
    }
}
