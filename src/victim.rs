/// Per-processor staging area for prefetched blocks, kept in insertion order
/// (oldest at the front).
#[derive(Debug, Clone)]
pub struct VictimBuffer {
    entries: Vec<(u64, usize)>, // (tag, index)
    capacity: usize,
}

impl VictimBuffer {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: Vec::with_capacity(capacity + 1),
            capacity,
        }
    }

    /// Add a block as the most recent entry, dropping the oldest entries once
    /// the buffer is over capacity.
    pub fn insert(&mut self, tag: u64, index: usize) {
        self.remove(tag, index);
        self.entries.push((tag, index));
        if self.entries.len() > self.capacity {
            let excess = self.entries.len() - self.capacity;
            self.entries.drain(..excess);
        }
    }

    pub fn remove(&mut self, tag: u64, index: usize) {
        self.entries.retain(|entry| *entry != (tag, index));
    }

    /// Consume a block if present. Entries are single use.
    pub fn take(&mut self, tag: u64, index: usize) -> bool {
        if let Some(pos) = self.entries.iter().position(|entry| *entry == (tag, index)) {
            self.entries.remove(pos);
            return true;
        }
        false
    }

    pub fn contains(&self, tag: u64, index: usize) -> bool {
        self.entries.contains(&(tag, index))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &(u64, usize)> {
        self.entries.iter()
    }
}
