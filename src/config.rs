use crate::Cycles;

/// Number of processors on the ring.
pub const PROCESSORS: usize = 4;

#[derive(Debug, Clone)]
pub struct SimConfig {
    pub victim_entries: usize,  // blocks per victim buffer
    pub prefetch_blocks: usize, // extra blocks pushed on each memory access, at most 3
    pub probe: Cycles,
    pub state_update: Cycles,
    pub completion: Cycles,
    pub victim_access: Cycles,
    pub ring_hop: Cycles,
    pub directory_lookup: Cycles,
    pub directory_forward: Cycles,
    pub memory_access: Cycles, // memory fetch plus directory forwarding
}

impl Default for SimConfig {
    fn default() -> Self {
        Self {
            victim_entries: 21,
            prefetch_blocks: 3,
            probe: 1,
            state_update: 1,
            completion: 1,
            victim_access: 2,
            ring_hop: 3,
            directory_lookup: 6,
            directory_forward: 5,
            memory_access: 20,
        }
    }
}

impl SimConfig {
    /// Cost of a reply travelling forward from `from` until it reaches `host`.
    pub fn return_path(&self, host: usize, from: usize) -> Cycles {
        let hops = (host + PROCESSORS - from) % PROCESSORS;
        hops as Cycles * self.ring_hop
    }
}
