// Copyright (c) 2025 Varshith Gudur. Licensed under AGPLv3.
//! Auto-incrementing read position used by `read_next`.

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct ReadCursor {
    next: u32,
}

impl ReadCursor {
    pub fn position(&self) -> u32 {
        self.next
    }

    /// Moves to the next logical index, back to 0 past `count`.
    pub fn advance(&mut self, count: u32) {
        self.next += 1;
        if self.next >= count {
            self.next = 0;
        }
    }

    pub fn reset(&mut self) {
        self.next = 0;
    }
}
