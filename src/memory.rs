// Copyright (c) 2026 the rawjpeg contributors
// SPDX-License-Identifier: GPL-3.0-only

//! Decode-scoped allocation accounting.
//!
//! Every large buffer reservation (coefficient grids, Huffman value buffers,
//! quantization tables, sample planes, the output pixel buffer) is announced
//! to a [`MemoryBudget`] before the allocation happens. The budget is owned
//! by a single decode call, so concurrent decodes never share a counter.

use crate::error::{JpegError, Result};

/// Cumulative allocation counter with a hard ceiling.
#[derive(Debug, Clone)]
pub struct MemoryBudget {
    used: usize,
    ceiling: usize,
}

impl MemoryBudget {
    /// Create a fresh budget with the given ceiling in bytes.
    pub fn new(ceiling_bytes: usize) -> Self {
        Self {
            used: 0,
            ceiling: ceiling_bytes,
        }
    }

    /// Reset the counter to zero and install a new ceiling.
    pub fn reset(&mut self, ceiling_bytes: usize) {
        self.used = 0;
        self.ceiling = ceiling_bytes;
    }

    /// Account for an upcoming allocation of `bytes`.
    ///
    /// Fails with [`JpegError::MemoryLimitExceeded`] if the cumulative total
    /// would pass the ceiling; the excess is reported in whole megabytes.
    pub fn request(&mut self, bytes: usize) -> Result<()> {
        let total = self.used.saturating_add(bytes);
        if total > self.ceiling {
            let excess = (total - self.ceiling) as u64;
            return Err(JpegError::MemoryLimitExceeded {
                excess_mb: excess.div_ceil(1 << 20),
            });
        }
        self.used = total;
        Ok(())
    }

    /// Bytes accounted for so far.
    pub fn used(&self) -> usize {
        self.used
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accumulates_until_ceiling() {
        let mut budget = MemoryBudget::new(100);
        assert!(budget.request(60).is_ok());
        assert!(budget.request(40).is_ok());
        assert_eq!(budget.used(), 100);
        assert!(matches!(
            budget.request(1),
            Err(JpegError::MemoryLimitExceeded { excess_mb: 1 })
        ));
        // A failed request does not change the counter.
        assert_eq!(budget.used(), 100);
    }

    #[test]
    fn excess_reported_in_whole_megabytes() {
        let mut budget = MemoryBudget::new(1 << 20);
        let err = budget.request(4 << 20).unwrap_err();
        assert_eq!(err, JpegError::MemoryLimitExceeded { excess_mb: 3 });
    }

    #[test]
    fn reset_clears_counter() {
        let mut budget = MemoryBudget::new(10);
        budget.request(10).unwrap();
        budget.reset(10);
        assert_eq!(budget.used(), 0);
        assert!(budget.request(10).is_ok());
    }
}
