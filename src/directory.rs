use std::collections::HashMap;

use log::{debug, trace};

use crate::{
    Cycles,
    address::{self, CACHE_LINES},
    cache::LineState,
    config::{PROCESSORS, SimConfig},
    stats::{AccessClassifier, AccessLevel},
    victim::VictimBuffer,
};

/// Line state of one block in every processor, indexed by processor id.
pub type SharerVector = [LineState; PROCESSORS];

const UNTOUCHED: SharerVector = [LineState::Invalid; PROCESSORS];

/// Outcome of a directory lookup on a miss.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Resolution {
    pub no_sharers: bool, // no processor besides the requester holds the block
    pub cost: Cycles,
}

/// Central sharer tracking. One slot per cache index, each mapping tags to
/// their sharer vector. Entries are created on first update and never
/// removed, so memory grows with the number of distinct blocks touched.
#[derive(Debug, Clone)]
pub struct Directory {
    lines: Vec<HashMap<u64, SharerVector>>,
}

impl Directory {
    pub fn new() -> Self {
        Self {
            lines: vec![HashMap::new(); CACHE_LINES],
        }
    }

    pub fn sharers(&self, index: usize, tag: u64) -> SharerVector {
        self.lines[index].get(&tag).copied().unwrap_or(UNTOUCHED)
    }

    /// Known blocks at `index` and their sharer vectors.
    pub fn entries(&self, index: usize) -> impl Iterator<Item = (u64, &SharerVector)> {
        self.lines[index].iter().map(|(tag, sharers)| (*tag, sharers))
    }

    pub fn on_state_change(&mut self, index: usize, tag: u64, processor: usize, state: LineState) {
        self.lines[index].entry(tag).or_insert(UNTOUCHED)[processor] = state;
    }

    fn no_sharers(&self, index: usize, tag: u64, requester: usize) -> bool {
        self.sharers(index, tag)
            .iter()
            .enumerate()
            .all(|(processor, state)| processor == requester || !state.is_valid())
    }

    pub fn resolve_read(
        &self,
        index: usize,
        tag: u64,
        requester: usize,
        config: &SimConfig,
        classifier: &mut AccessClassifier,
        victims: &mut [VictimBuffer; PROCESSORS],
    ) -> Resolution {
        let cost = config.directory_lookup;
        if !self.no_sharers(index, tag, requester) {
            return Resolution {
                no_sharers: false,
                cost: cost + config.directory_forward,
            };
        }
        self.fetch_from_memory(index, tag, requester, config, classifier, victims);
        Resolution {
            no_sharers: true,
            cost: cost + config.memory_access,
        }
    }

    pub fn resolve_write(
        &self,
        index: usize,
        tag: u64,
        requester: usize,
        previous: LineState,
        config: &SimConfig,
        classifier: &mut AccessClassifier,
        victims: &mut [VictimBuffer; PROCESSORS],
    ) -> Resolution {
        let no_sharers = self.no_sharers(index, tag, requester);
        let mut slowest = config.directory_forward;
        // data only has to come from memory if nobody, requester included, has it
        if no_sharers && previous == LineState::Invalid {
            self.fetch_from_memory(index, tag, requester, config, classifier, victims);
            slowest = slowest.max(config.memory_access);
        }
        Resolution {
            no_sharers,
            cost: config.directory_lookup + slowest,
        }
    }

    fn fetch_from_memory(
        &self,
        index: usize,
        tag: u64,
        requester: usize,
        config: &SimConfig,
        classifier: &mut AccessClassifier,
        victims: &mut [VictimBuffer; PROCESSORS],
    ) {
        classifier.observe(AccessLevel::OffChip);
        debug!("memory access for tag {tag} index {index} by P{requester}");

        let mut target = requester;
        for (ptag, pindex) in self.prefetch_candidates(index, tag, config.prefetch_blocks) {
            target = (target + PROCESSORS - 1) % PROCESSORS;
            trace!(
                "prefetch block {:#x} (tag {ptag} index {pindex}) into P{target}",
                address::encode(pindex, ptag)
            );
            victims[target].insert(ptag, pindex);
        }
    }

    /// The next `count` blocks after (index, tag) that no processor has
    /// touched.
    pub fn prefetch_candidates(&self, index: usize, tag: u64, count: usize) -> Vec<(u64, usize)> {
        let mut extra = Vec::with_capacity(count);
        let mut n = 1;
        while extra.len() < count {
            let next = index + n;
            let ptag = tag + (next / CACHE_LINES) as u64;
            let pindex = next % CACHE_LINES;
            if self.sharers(pindex, ptag) == UNTOUCHED {
                extra.push((ptag, pindex));
            }
            n += 1;
        }
        extra
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffers() -> [VictimBuffer; PROCESSORS] {
        std::array::from_fn(|_| VictimBuffer::new(21))
    }

    #[test]
    fn read_without_sharers_goes_to_memory() {
        let directory = Directory::new();
        let config = SimConfig::default();
        let mut classifier = AccessClassifier::default();
        let mut victims = buffers();

        let res = directory.resolve_read(10, 4, 0, &config, &mut classifier, &mut victims);
        assert_eq!(res, Resolution { no_sharers: true, cost: 26 });
        assert_eq!(classifier.current(), AccessLevel::OffChip);
        // pushed backwards around the ring from the requester
        assert!(victims[3].contains(4, 11));
        assert!(victims[2].contains(4, 12));
        assert!(victims[1].contains(4, 13));
        assert!(victims[0].is_empty());
    }

    #[test]
    fn read_with_sharer_is_forwarded() {
        let mut directory = Directory::new();
        directory.on_state_change(10, 4, 2, LineState::Shared);
        let config = SimConfig::default();
        let mut classifier = AccessClassifier::default();
        let mut victims = buffers();

        let res = directory.resolve_read(10, 4, 0, &config, &mut classifier, &mut victims);
        assert_eq!(res, Resolution { no_sharers: false, cost: 11 });
        assert_eq!(classifier.current(), AccessLevel::Private);
        assert!(victims.iter().all(VictimBuffer::is_empty));
    }

    #[test]
    fn requester_own_copy_is_not_a_sharer() {
        let mut directory = Directory::new();
        directory.on_state_change(10, 4, 1, LineState::Shared);
        let config = SimConfig::default();
        let mut classifier = AccessClassifier::default();
        let mut victims = buffers();

        let res = directory.resolve_write(
            10,
            4,
            1,
            LineState::Shared,
            &config,
            &mut classifier,
            &mut victims,
        );
        assert_eq!(res, Resolution { no_sharers: true, cost: 11 });
        assert_eq!(classifier.current(), AccessLevel::Private);
    }

    #[test]
    fn cold_write_fetches_and_prefetches() {
        let directory = Directory::new();
        let config = SimConfig::default();
        let mut classifier = AccessClassifier::default();
        let mut victims = buffers();

        let res = directory.resolve_write(
            0,
            0,
            2,
            LineState::Invalid,
            &config,
            &mut classifier,
            &mut victims,
        );
        assert_eq!(res, Resolution { no_sharers: true, cost: 26 });
        assert_eq!(classifier.current(), AccessLevel::OffChip);
        assert!(victims[1].contains(0, 1));
        assert!(victims[0].contains(0, 2));
        assert!(victims[3].contains(0, 3));
        assert!(victims[2].is_empty());
    }

    #[test]
    fn prefetch_skips_touched_blocks_and_wraps_into_next_tag() {
        let mut directory = Directory::new();
        directory.on_state_change(511, 7, 3, LineState::Shared);
        directory.on_state_change(1, 8, 0, LineState::Modified);
        // invalid everywhere again counts as untouched
        directory.on_state_change(2, 8, 0, LineState::Shared);
        directory.on_state_change(2, 8, 0, LineState::Invalid);

        let picked = directory.prefetch_candidates(510, 7, 3);
        assert_eq!(picked, vec![(8, 0), (8, 2), (8, 3)]);
    }

    #[test]
    fn state_changes_update_single_slot() {
        let mut directory = Directory::new();
        assert_eq!(directory.sharers(0, 0), UNTOUCHED);
        directory.on_state_change(0, 0, 2, LineState::Modified);
        assert_eq!(
            directory.sharers(0, 0),
            [LineState::Invalid, LineState::Invalid, LineState::Modified, LineState::Invalid]
        );
        assert_eq!(directory.entries(0).count(), 1);
    }
}
