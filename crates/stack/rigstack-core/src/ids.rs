//! Component instance keys and their allocator.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Opaque per-stack instance key. Never reused within one stack, so a stale id held after
/// `remove_component` simply fails to resolve.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ComponentId(pub u32);

impl fmt::Display for ComponentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Monotonic allocator for ComponentId.
#[derive(Default, Debug)]
pub struct IdAllocator {
    next: u32,
}

impl IdAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn alloc(&mut self) -> ComponentId {
        let id = ComponentId(self.next);
        self.next = self.next.wrapping_add(1);
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn alloc_monotonic() {
        let mut alloc = IdAllocator::new();
        assert_eq!(alloc.alloc(), ComponentId(0));
        assert_eq!(alloc.alloc(), ComponentId(1));
        assert_eq!(ComponentId(7).to_string(), "#7");
    }
}
