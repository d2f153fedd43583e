//! Round-robin rotation cursor.

/// Cursor over `len` slots. Always in `[0, len)`.
#[derive(Debug, Clone)]
pub struct RoundRobin {
    cursor: usize,
    len: usize,
}

impl RoundRobin {
    /// `len` must be non-zero; the pool checks this before building a cursor.
    pub fn new(len: usize) -> Self {
        debug_assert!(len > 0);
        Self { cursor: 0, len }
    }

    /// Return the current slot and advance, wrapping from the last slot to the first.
    pub fn advance(&mut self) -> usize {
        let index = self.cursor;
        self.cursor = (self.cursor + 1) % self.len;
        index
    }

    /// The slot the next call to `advance` returns.
    #[cfg(test)]
    pub fn peek(&self) -> usize {
        self.cursor
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_robin() {
        let mut rr = RoundRobin::new(3);
        let picks: Vec<usize> = (0..7).map(|_| rr.advance()).collect();
        assert_eq!(picks, vec![0, 1, 2, 0, 1, 2, 0]);
        assert_eq!(rr.peek(), 1);
    }

    #[test]
    fn single_slot_always_zero() {
        let mut rr = RoundRobin::new(1);
        assert_eq!(rr.advance(), 0);
        assert_eq!(rr.advance(), 0);
        assert_eq!(rr.peek(), 0);
    }
}
