//! Cumulative size accounting against a decompression budget.
//!
//! Accounting always uses the declared uncompressed size of an entry, never
//! its compressed size.

/// Adding an entry would push the running total past the limit.
#[derive(Clone, Copy, Debug, PartialEq, Eq, thiserror::Error)]
#[error("{would_be} bytes exceeds limit {limit}")]
pub struct Overflow {
    pub limit: u64,
    /// Saturates at `u64::MAX` when the sum itself overflows.
    pub would_be: u64,
}

/// Add `delta` to `current`, failing the moment the sum exceeds `max`.
pub fn accumulate(current: u64, delta: u64, max: u64) -> Result<u64, Overflow> {
    match current.checked_add(delta) {
        Some(total) if total <= max => Ok(total),
        Some(total) => Err(Overflow {
            limit: max,
            would_be: total,
        }),
        None => Err(Overflow {
            limit: max,
            would_be: u64::MAX,
        }),
    }
}

/// Running total for one extraction.
#[derive(Clone, Copy, Debug)]
pub struct SizeAccountant {
    total: u64,
    max: u64,
}

impl SizeAccountant {
    pub fn new(max: u64) -> Self {
        Self { total: 0, max }
    }

    /// Count one more entry. On overflow the total is left untouched.
    pub fn accumulate(&mut self, delta: u64) -> Result<u64, Overflow> {
        self.total = accumulate(self.total, delta, self.max)?;
        Ok(self.total)
    }

    pub fn total(&self) -> u64 {
        self.total
    }

    pub fn max(&self) -> u64 {
        self.max
    }
}
