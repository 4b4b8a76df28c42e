use std::io::Write;

use anyhow::{Context, Result, bail};
use log::{debug, info};

use crate::{
    Cycles,
    address::{self, CACHE_LINES},
    cache::{CacheLine, LineState, ProcessorCache},
    config::{PROCESSORS, SimConfig},
    directory::{Directory, SharerVector},
    stats::{AccessClassifier, AccessLevel, Statistics, Summary, format_float},
    trace::{AccessKind, TraceEntry, TraceFile},
    victim::VictimBuffer,
};

/// All state of the simulated system. Only one operation is ever in flight,
/// so every component is plain mutable state.
#[derive(Debug, Clone)]
pub struct SimulationContext {
    pub(crate) config: SimConfig,
    pub(crate) caches: [ProcessorCache; PROCESSORS],
    pub(crate) victims: [VictimBuffer; PROCESSORS],
    pub(crate) directory: Directory,
    pub(crate) classifier: AccessClassifier,
    pub(crate) stats: Statistics,
    operations: u64,
}

impl SimulationContext {
    pub fn new(config: SimConfig) -> Self {
        let victims = std::array::from_fn(|_| VictimBuffer::new(config.victim_entries));
        Self {
            caches: std::array::from_fn(ProcessorCache::new),
            victims,
            directory: Directory::new(),
            classifier: AccessClassifier::default(),
            stats: Statistics::default(),
            operations: 0,
            config,
        }
    }

    pub fn cache(&self, processor: usize) -> &ProcessorCache {
        &self.caches[processor]
    }

    pub fn victims(&self, processor: usize) -> &VictimBuffer {
        &self.victims[processor]
    }

    pub fn directory(&self) -> &Directory {
        &self.directory
    }

    pub fn stats(&self) -> &Statistics {
        &self.stats
    }

    pub fn last_level(&self) -> AccessLevel {
        self.classifier.current()
    }

    /// Run one memory operation and account it in the statistics.
    pub fn access(&mut self, processor: usize, kind: AccessKind, address: u64) -> Cycles {
        self.classifier.reset();
        let (index, tag) = address::decode(address);
        let latency = match kind {
            AccessKind::Read => self.read(processor, index, tag),
            AccessKind::Write => self.write(processor, index, tag),
        };
        let level = self.classifier.current();
        debug!("P{processor} {kind} {address}: {latency} cycles ({level:?})");
        self.stats.record(level, latency, kind == AccessKind::Write);
        self.operations += 1;
        latency
    }

    pub fn finish(&self) -> Summary {
        self.stats.finish(self.operations)
    }

    /// Look up `tag` at `index`. A different block bound to the line is
    /// evicted in favour of `tag`, which then reads as Invalid.
    pub fn probe(&mut self, processor: usize, index: usize, tag: u64) -> (LineState, Cycles) {
        let state = match self.caches[processor].line(index).state_for(tag) {
            Some(state) => state,
            None => {
                self.set_state(processor, index, tag, LineState::Invalid);
                LineState::Invalid
            }
        };
        (state, self.config.probe)
    }

    /// Bind `tag` to the line in `state`, evicting whatever was there, and
    /// keep the directory in step.
    pub fn set_state(
        &mut self,
        processor: usize,
        index: usize,
        tag: u64,
        state: LineState,
    ) -> Cycles {
        let line = *self.caches[processor].line(index);
        if line.tag != Some(tag) {
            if let Some(evicted) = line.tag.filter(|_| line.state.is_valid()) {
                self.directory
                    .on_state_change(index, evicted, processor, LineState::Invalid);
                if line.state == LineState::Modified {
                    self.stats.replacement_writebacks += 1;
                }
                debug!("P{processor} evicts tag {evicted} from line {index} ({})", line.state);
            }
        }
        *self.caches[processor].line_mut(index) = CacheLine {
            state,
            tag: Some(tag),
        };
        self.directory.on_state_change(index, tag, processor, state);
        self.config.state_update
    }

    pub fn read(&mut self, processor: usize, index: usize, tag: u64) -> Cycles {
        let (state, mut clock) = self.probe(processor, index, tag);
        if state.is_valid() {
            self.classifier.observe(AccessLevel::Private);
            return clock + self.config.completion;
        }

        self.classifier.observe(AccessLevel::Remote);
        let buffered = self.victims[processor].take(tag, index);
        clock += self.config.victim_access;
        if buffered {
            debug!("P{processor} victim buffer hit for tag {tag} index {index}");
        } else {
            let resolution = self.directory.resolve_read(
                index,
                tag,
                processor,
                &self.config,
                &mut self.classifier,
                &mut self.victims,
            );
            // directory and ring run side by side
            let mut slowest = clock + resolution.cost;
            if !resolution.no_sharers {
                let forwarded = self.config.ring_hop + self.forward_request(index, tag, processor);
                slowest = slowest.max(clock + forwarded);
            }
            clock = slowest;
        }
        clock += self.set_state(processor, index, tag, LineState::Shared);
        clock + self.config.completion
    }

    pub fn write(&mut self, processor: usize, index: usize, tag: u64) -> Cycles {
        let (state, clock) = self.probe(processor, index, tag);
        if state == LineState::Modified {
            self.classifier.observe(AccessLevel::Private);
            return clock + self.config.completion;
        }

        self.classifier.observe(AccessLevel::Remote);
        let resolution = self.directory.resolve_write(
            index,
            tag,
            processor,
            state,
            &self.config,
            &mut self.classifier,
            &mut self.victims,
        );
        let mut slowest = clock + resolution.cost;

        // buffered copies anywhere on chip are stale once the block is written
        for buffer in &mut self.victims {
            buffer.remove(tag, index);
        }
        slowest = slowest.max(clock + self.config.victim_access);

        if !resolution.no_sharers {
            let need_data = state == LineState::Invalid;
            let invalidated =
                self.config.ring_hop + self.forward_invalidate(index, tag, processor, need_data);
            slowest = slowest.max(clock + invalidated);
        }
        let clock = slowest + self.set_state(processor, index, tag, LineState::Modified);
        clock + self.config.completion
    }

    /// Check that the directory mirrors every cache, that no block has more
    /// than one Modified copy, and that buffered blocks are not also cached
    /// by their owner.
    pub fn verify_coherence(&self) -> Result<()> {
        for index in 0..CACHE_LINES {
            for (tag, sharers) in self.directory.entries(index) {
                let owners = sharers
                    .iter()
                    .filter(|state| **state == LineState::Modified)
                    .count();
                if owners > 1 {
                    bail!("tag {tag} index {index} is Modified in {owners} caches");
                }
                let holders = sharers.iter().filter(|state| state.is_valid()).count();
                if owners == 1 && holders > 1 {
                    bail!("tag {tag} index {index} is Modified in one cache and valid in another");
                }
                for (processor, expected) in sharers.iter().enumerate() {
                    let actual = self.caches[processor]
                        .line(index)
                        .state_for(tag)
                        .unwrap_or(LineState::Invalid);
                    if actual != *expected {
                        bail!(
                            "directory has tag {tag} index {index} as {expected} in P{processor}, cache has {actual}"
                        );
                    }
                }
            }
            for cache in &self.caches {
                let line = cache.line(index);
                if let Some(tag) = line.tag.filter(|_| line.state.is_valid()) {
                    let recorded = self.directory.sharers(index, tag)[cache.id()];
                    if recorded != line.state {
                        bail!(
                            "P{} holds tag {tag} index {index} as {}, directory has {recorded}",
                            cache.id(),
                            line.state
                        );
                    }
                }
            }
        }
        for (processor, buffer) in self.victims.iter().enumerate() {
            for &(tag, index) in buffer.iter() {
                if self.caches[processor].line(index).shares(tag) {
                    bail!("P{processor} buffers tag {tag} index {index} while caching it");
                }
            }
        }
        Ok(())
    }
}

/// Replays traces against a [`SimulationContext`], handling the control
/// lines of the trace format.
#[derive(Debug)]
pub struct Simulator {
    ctx: SimulationContext,
    verbose: bool,
    check: bool,
}

impl Simulator {
    pub fn new(config: SimConfig) -> Self {
        Self {
            ctx: SimulationContext::new(config),
            verbose: false,
            check: false,
        }
    }

    pub fn with_verbose(mut self, verbose: bool) -> Self {
        self.verbose = verbose;
        self
    }

    /// Verify coherence invariants after every operation.
    pub fn with_checks(mut self, check: bool) -> Self {
        self.check = check;
        self
    }

    pub fn is_verbose(&self) -> bool {
        self.verbose
    }

    pub fn run(&mut self, trace: &TraceFile, out: &mut impl Write) -> Result<Summary> {
        info!("replaying {} ({} operations)", trace.name, trace.operations());
        for (n, entry) in trace.entries.iter().enumerate() {
            self.step(entry, out)
                .with_context(|| format!("{}: entry {}", trace.name, n + 1))?;
        }
        Ok(self.ctx.finish())
    }

    /// Apply one trace entry. Returns the latency for memory operations.
    pub fn step(&mut self, entry: &TraceEntry, out: &mut impl Write) -> Result<Option<Cycles>> {
        match *entry {
            TraceEntry::ToggleVerbose => {
                self.verbose = !self.verbose;
                Ok(None)
            }
            TraceEntry::PrintCaches => {
                for cache in &self.ctx.caches {
                    writeln!(out, "{cache}")?;
                }
                Ok(None)
            }
            TraceEntry::HitRate => {
                match self.ctx.stats.hit_rate() {
                    Some(rate) => writeln!(out, "Hit-Rate: {}%", format_float(rate))?,
                    None => writeln!(out, "Hit-Rate: 100%")?,
                }
                Ok(None)
            }
            TraceEntry::Access {
                processor,
                kind,
                address,
            } => {
                let (index, tag) = address::decode(address);
                let before = self.ctx.directory.sharers(index, tag);
                let latency = self.ctx.access(processor, kind, address);
                if self.verbose {
                    writeln!(
                        out,
                        "{}",
                        narrate(processor, kind, address, index, tag, &before)
                    )?;
                }
                if self.check {
                    self.ctx.verify_coherence()?;
                }
                Ok(Some(latency))
            }
        }
    }
}

fn narrate(
    processor: usize,
    kind: AccessKind,
    address: u64,
    index: usize,
    tag: u64,
    before: &SharerVector,
) -> String {
    let mut line = format!(
        "A {} by processor P{processor} to word {address} looked for tag {tag} in cacheline/block {index}, was found in state {} in this cache",
        kind.verb(),
        before[processor].describe()
    );
    let others = move || (0..PROCESSORS).filter(move |p| *p != processor);
    if let Some(owner) = others().find(|p| before[*p] == LineState::Modified) {
        line.push_str(&format!(
            " and found in state Modified in the cache of P{owner}"
        ));
    } else {
        let sharers: Vec<String> = others()
            .filter(|p| before[*p] == LineState::Shared)
            .map(|p| format!("P{p}"))
            .collect();
        if !sharers.is_empty() {
            line.push_str(" and found in state Shared in the cache of ");
            line.push_str(&join_names(&sharers));
        }
    }
    line
}

// "P1", "P1 and P2", "P1, P2 and P3"
fn join_names(names: &[String]) -> String {
    match names.split_last() {
        Some((last, [])) => last.clone(),
        Some((last, rest)) => format!("{} and {last}", rest.join(", ")),
        None => String::new(),
    }
}
