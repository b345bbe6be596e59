// Mon Feb 9 2026 - Alex

use std::fmt;

use crate::memory::Address;

/// A half-open `[start, end)` range of addresses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct MemoryRange {
    pub start: Address,
    pub end: Address,
}

impl MemoryRange {
    pub fn new(start: Address, end: Address) -> Self {
        Self { start, end }
    }

    pub fn with_len(start: Address, len: u64) -> Self {
        Self { start, end: start + len }
    }

    pub fn len(&self) -> u64 {
        self.end.as_u64().saturating_sub(self.start.as_u64())
    }

    pub fn is_empty(&self) -> bool {
        self.end <= self.start
    }

    pub fn contains(&self, addr: Address) -> bool {
        addr.is_within_range(self.start, self.end)
    }

    pub fn contains_range(&self, other: &MemoryRange) -> bool {
        other.start >= self.start && other.end <= self.end
    }

    pub fn intersects(&self, other: &MemoryRange) -> bool {
        self.start < other.end && other.start < self.end
    }

    pub fn intersection(&self, other: &MemoryRange) -> Option<MemoryRange> {
        let start = self.start.max(other.start);
        let end = self.end.min(other.end);
        if start < end {
            Some(MemoryRange { start, end })
        } else {
            None
        }
    }
}

impl fmt::Display for MemoryRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {})", self.start, self.end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_containment() {
        let r = MemoryRange::with_len(Address::new(0x1000), 0x100);
        assert!(r.contains(Address::new(0x1000)));
        assert!(r.contains(Address::new(0x10ff)));
        assert!(!r.contains(Address::new(0x1100)));
        assert_eq!(r.len(), 0x100);
    }

    #[test]
    fn test_intersection() {
        let a = MemoryRange::with_len(Address::new(0x1000), 0x100);
        let b = MemoryRange::with_len(Address::new(0x1080), 0x100);
        let c = a.intersection(&b).unwrap();
        assert_eq!(c.start, Address::new(0x1080));
        assert_eq!(c.end, Address::new(0x1100));
        assert!(a.intersection(&MemoryRange::with_len(Address::new(0x2000), 8)).is_none());
    }
}
