//! Forwarding of miss requests around the unidirectional ring.
//!
//! A message from `host` visits `host+1`, `host+2`, `host+3` and stops when it
//! is back at `host`. Each node forwards before it inspects its own line, so
//! results are folded from the far end of the ring back towards the host.

use log::trace;

use crate::{Cycles, cache::LineState, config::PROCESSORS, simulator::SimulationContext};

impl SimulationContext {
    /// Find a supplying copy for a read miss of `host`, starting at its
    /// successor. Modified sharers are downgraded to Shared.
    ///
    /// The sharer nearest to the host in ring order decides the latency, even
    /// when a sharer further along could answer sooner: its reply has to keep
    /// travelling forward to get back to the host.
    pub fn forward_request(&mut self, index: usize, tag: u64, host: usize) -> Cycles {
        let mut cost = 0;
        for offset in (1..PROCESSORS).rev() {
            let node = (host + offset) % PROCESSORS;
            cost += self.config.ring_hop;

            let line = *self.caches[node].line(index);
            if !line.shares(tag) {
                continue;
            }
            if line.state == LineState::Modified {
                self.stats.coherence_writebacks += 1;
                self.set_state(node, index, tag, LineState::Shared);
            }
            cost = self.config.return_path(host, node) + 1;
            trace!("P{node} supplies tag {tag} index {index} to P{host}, cost {cost}");
        }
        cost
    }

    /// Invalidate every copy other than the host's for a write miss. The
    /// slowest sharer bounds the latency. `need_data` adds a cycle for sending
    /// the block back when the host had no valid copy.
    pub fn forward_invalidate(
        &mut self,
        index: usize,
        tag: u64,
        host: usize,
        need_data: bool,
    ) -> Cycles {
        let mut cost = 0;
        for offset in (1..PROCESSORS).rev() {
            let node = (host + offset) % PROCESSORS;
            cost += self.config.ring_hop;

            if !self.caches[node].line(index).shares(tag) {
                continue;
            }
            self.stats.invalidations_sent += 1;
            let update = self.set_state(node, index, tag, LineState::Invalid);
            let local = update + self.config.return_path(host, node) + Cycles::from(need_data);
            trace!("P{node} invalidated tag {tag} index {index} for P{host}, cost {local}");
            cost = cost.max(local);
        }
        cost
    }
}

#[cfg(test)]
mod tests {
    use crate::{cache::LineState, config::SimConfig, simulator::SimulationContext};

    fn context_with(holders: &[(usize, LineState)]) -> SimulationContext {
        let mut ctx = SimulationContext::new(SimConfig::default());
        for &(processor, state) in holders {
            ctx.set_state(processor, 0, 5, state);
        }
        ctx
    }

    #[test]
    fn request_without_sharers_walks_whole_ring() {
        let mut ctx = context_with(&[]);
        // three hops back to the host
        assert_eq!(ctx.forward_request(0, 5, 0), 9);
    }

    #[test]
    fn nearest_sharer_overrides_farther_ones() {
        // P3 would answer in 4 cycles, but P1 sits first after the host and
        // its reply needs 3 more hops to come back around.
        let mut ctx = context_with(&[(1, LineState::Shared), (3, LineState::Shared)]);
        assert_eq!(ctx.forward_request(0, 5, 0), 10);
    }

    #[test]
    fn sharer_result_is_relayed_by_later_nodes() {
        // P3 answers with 4 cycles, then P2 and P1 each relay it, adding a hop.
        let mut ctx = context_with(&[(3, LineState::Shared)]);
        assert_eq!(ctx.forward_request(0, 5, 0), 10);
        // P2 answers with 2 * 3 + 1 = 7, relayed once by P1
        let mut ctx = context_with(&[(2, LineState::Shared)]);
        assert_eq!(ctx.forward_request(0, 5, 0), 10);
    }

    #[test]
    fn modified_supplier_is_downgraded() {
        let mut ctx = context_with(&[(2, LineState::Modified)]);
        ctx.forward_request(0, 5, 1);
        assert_eq!(ctx.caches[2].line(0).state, LineState::Shared);
        assert_eq!(ctx.directory.sharers(0, 5)[2], LineState::Shared);
        assert_eq!(ctx.stats.coherence_writebacks, 1);
    }

    #[test]
    fn invalidate_takes_slowest_sharer() {
        let mut ctx = context_with(&[(1, LineState::Shared), (3, LineState::Shared)]);
        // P3 costs 1 + 3 = 4, relayed to 10 at P1; P1 itself costs 1 + 9 = 10
        assert_eq!(ctx.forward_invalidate(0, 5, 0, false), 10);
        assert_eq!(ctx.stats.invalidations_sent, 2);
        assert!(!ctx.caches[1].line(0).state.is_valid());
        assert!(!ctx.caches[3].line(0).state.is_valid());
    }

    #[test]
    fn invalidate_adds_data_cycle() {
        let mut ctx = context_with(&[(1, LineState::Modified)]);
        assert_eq!(ctx.forward_invalidate(0, 5, 0, true), 11);
        assert_eq!(ctx.directory.sharers(0, 5), [LineState::Invalid; 4]);
    }

    #[test]
    fn mismatched_tags_are_not_sharers() {
        let mut ctx = context_with(&[]);
        ctx.set_state(2, 0, 6, LineState::Modified);
        assert_eq!(ctx.forward_invalidate(0, 5, 0, false), 9);
        assert_eq!(ctx.stats.invalidations_sent, 0);
        assert_eq!(ctx.caches[2].line(0).state, LineState::Modified);
    }
}
