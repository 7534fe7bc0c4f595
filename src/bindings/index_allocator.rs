// SPDX-License-Identifier: Parity-7.0.0 OR PolyForm-Noncommercial-1.0.0
/*!
A monotonic allocator of contiguous index ranges.

Ranges are handed out from a fixed-capacity pool by bumping a cursor.  Nothing is ever
freed, so two ranges can never overlap for the allocator's lifetime.
*/

use std::sync::atomic::{AtomicU32, Ordering};

/// Returned when the pool cannot satisfy a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Exhausted {
    pub requested: u32,
    pub available: u32,
}

#[derive(Debug)]
pub struct IndexAllocator {
    cursor: AtomicU32,
    capacity: u32,
}

impl IndexAllocator {
    pub const fn new(capacity: u32) -> Self {
        Self {
            cursor: AtomicU32::new(0),
            capacity,
        }
    }

    /**
    Reserves `n` consecutive indices and returns the first.

    A zero-length request returns the current cursor without advancing it.
    */
    pub fn allocate_contiguous(&self, n: u32) -> Result<u32, Exhausted> {
        let capacity = self.capacity;
        self.cursor
            .fetch_update(Ordering::AcqRel, Ordering::Acquire, |cursor| {
                cursor.checked_add(n).filter(|end| *end <= capacity)
            })
            .map_err(|cursor| Exhausted {
                requested: n,
                available: capacity - cursor,
            })
    }

    /// Number of indices handed out so far.
    pub fn allocated(&self) -> u32 {
        self.cursor.load(Ordering::Acquire)
    }

    pub const fn capacity(&self) -> u32 {
        self.capacity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn ranges_are_consecutive() {
        let allocator = IndexAllocator::new(10);
        assert_eq!(allocator.allocate_contiguous(3), Ok(0));
        assert_eq!(allocator.allocate_contiguous(0), Ok(3));
        assert_eq!(allocator.allocate_contiguous(2), Ok(3));
        assert_eq!(allocator.allocated(), 5);
    }

    #[test]
    fn overflow_is_reported() {
        let allocator = IndexAllocator::new(4);
        assert_eq!(allocator.allocate_contiguous(3), Ok(0));
        assert_eq!(
            allocator.allocate_contiguous(2),
            Err(Exhausted {
                requested: 2,
                available: 1
            })
        );
        //a failed request does not move the cursor
        assert_eq!(allocator.allocate_contiguous(1), Ok(3));
        assert_eq!(
            allocator.allocate_contiguous(u32::MAX),
            Err(Exhausted {
                requested: u32::MAX,
                available: 0
            })
        );
    }

    #[test]
    fn concurrent_ranges_never_overlap() {
        let allocator = Arc::new(IndexAllocator::new(4 * 1000));
        let threads: Vec<_> = (0..4)
            .map(|_| {
                let allocator = allocator.clone();
                std::thread::spawn(move || {
                    (0..250)
                        .map(|_| allocator.allocate_contiguous(4).unwrap())
                        .collect::<Vec<_>>()
                })
            })
            .collect();
        let mut bases: Vec<u32> = threads
            .into_iter()
            .flat_map(|t| t.join().unwrap())
            .collect();
        bases.sort();
        for pair in bases.windows(2) {
            assert!(pair[1] >= pair[0] + 4);
        }
        assert_eq!(allocator.allocated(), 4000);
    }
}
