use std::sync::atomic::{AtomicU64, Ordering};

/// Process-unique numeric id.
///
/// Ids are never reused within a process, so a stale id can never alias a
/// newer object.
#[derive(Copy, Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Id(u64);

impl Id {
    pub fn new(n: u64) -> Self {
        Id(n)
    }

    pub fn get(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic id source, safe to share between tasks.
#[derive(Debug)]
pub struct IdAllocator {
    next: AtomicU64,
}

impl IdAllocator {
    pub const fn new() -> Self {
        Self {
            next: AtomicU64::new(1),
        }
    }

    pub fn next_id(&self) -> Id {
        Id(self.next.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for IdAllocator {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::{Id, IdAllocator};

    #[test]
    fn ids_are_monotonic_and_start_at_one() {
        let ids = IdAllocator::new();
        assert_eq!(ids.next_id(), Id::new(1));
        assert_eq!(ids.next_id(), Id::new(2));
        assert!(ids.next_id() > Id::new(2));
    }

    #[test]
    fn display_is_prefixed() {
        assert_eq!(Id::new(7).to_string(), "#7");
    }
}
