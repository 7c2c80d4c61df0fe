//! Navigation history for a browsing session
//!
//! Visited locations are kept oldest-first; the cursor counts back from the
//! newest entry (0 = newest). Going back moves the cursor toward older
//! entries, going forward toward newer ones, and visiting a brand-new
//! location drops everything newer than the cursor before appending.

/// Ordered sequence of visited remote locations plus a cursor
#[derive(Debug, Default, Clone)]
pub struct NavigationHistory {
    /// Visited locations (oldest first)
    entries: Vec<String>,
    /// Offset back from the newest entry (0 = newest)
    cursor: usize,
}

impl NavigationHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Visit a brand-new location: truncate everything newer than the
    /// cursor, append, and reset the cursor to the new entry.
    pub fn goto(&mut self, location: impl Into<String>) {
        let keep = self.entries.len() - self.cursor;
        self.entries.truncate(keep);
        self.entries.push(location.into());
        self.cursor = 0;
    }

    /// Move one entry toward the oldest location.
    /// Returns whether the cursor moved (false at the oldest entry).
    pub fn back(&mut self) -> bool {
        self.back_by(1) > 0
    }

    /// Move one entry toward the newest location.
    /// Returns whether the cursor moved (false at the newest entry).
    pub fn forward(&mut self) -> bool {
        self.forward_by(1) > 0
    }

    /// Move up to `steps` entries toward the oldest location, clamping at
    /// the end. Returns the number of entries actually moved.
    pub fn back_by(&mut self, steps: usize) -> usize {
        let oldest = self.entries.len().saturating_sub(1);
        let target = (self.cursor + steps).min(oldest);
        let moved = target - self.cursor;
        self.cursor = target;
        moved
    }

    /// Move up to `steps` entries toward the newest location, clamping at
    /// the start. Returns the number of entries actually moved.
    pub fn forward_by(&mut self, steps: usize) -> usize {
        let moved = self.cursor.min(steps);
        self.cursor -= moved;
        moved
    }

    /// The location under the cursor
    pub fn current(&self) -> Option<&str> {
        let index = self.entries.len().checked_sub(1 + self.cursor)?;
        self.entries.get(index).map(String::as_str)
    }

    /// Locations strictly older than the cursor, nearest first
    pub fn back_candidates(&self) -> Vec<&str> {
        let upto = self.entries.len().saturating_sub(1 + self.cursor);
        self.entries[..upto]
            .iter()
            .rev()
            .map(String::as_str)
            .collect()
    }

    /// Locations strictly newer than the cursor, nearest first
    pub fn forward_candidates(&self) -> Vec<&str> {
        let from = self.entries.len() - self.cursor;
        self.entries[from..].iter().map(String::as_str).collect()
    }

    /// Number of recorded locations
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Drop all recorded locations (session reconnect)
    pub fn clear(&mut self) {
        self.entries.clear();
        self.cursor = 0;
    }
}
