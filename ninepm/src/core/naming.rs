//! Unique display ids for suites and cases.
//!
//! The same case file can be referenced from several suites, and the same
//! suite can be passed several times on the command line. Each reference gets
//! its own node, so names alone cannot identify nodes; a run-wide sequence
//! number prefix does.

/// Hands out `NNNN-label` ids in creation order.
///
/// One allocator lives for a whole run and is threaded through the loader by
/// `&mut`. Call [`NameAllocator::allocate`] exactly once per node, at creation
/// time: the call order is visible in the rendered names.
#[derive(Debug, Default)]
pub struct NameAllocator {
    next: u32,
}

impl NameAllocator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn allocate(&mut self, label: &str) -> String {
        let id = format!("{:04}-{}", self.next, label);
        self.next += 1;
        id
    }

    /// Number of ids handed out so far.
    pub fn allocated(&self) -> u32 {
        self.next
    }
}
