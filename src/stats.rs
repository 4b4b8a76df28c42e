use std::{collections::BTreeSet, fmt};

use crate::Cycles;

/// How far an operation had to go to complete, in increasing severity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessLevel {
    #[default]
    Private,
    Remote,
    OffChip,
}

/// Tracks the most severe access level reached by the operation in flight.
#[derive(Debug, Clone, Default)]
pub struct AccessClassifier {
    level: AccessLevel,
}

impl AccessClassifier {
    /// Raise the level; never lowers it.
    pub fn observe(&mut self, level: AccessLevel) {
        self.level = self.level.max(level);
    }

    pub fn current(&self) -> AccessLevel {
        self.level
    }

    pub fn reset(&mut self) {
        self.level = AccessLevel::Private;
    }
}

#[derive(Debug, Clone, Default)]
pub struct Statistics {
    pub private_accesses: u64,
    pub remote_accesses: u64,
    pub off_chip_accesses: u64,
    pub replacement_writebacks: u64,
    pub coherence_writebacks: u64,
    pub invalidations_sent: u64,
    pub private_latency: Cycles,
    pub remote_latency: Cycles,
    pub off_chip_latency: Cycles,
    pub total_latency: Cycles,
    pub off_chip_write_latencies: BTreeSet<Cycles>, // diagnostics only
}

impl Statistics {
    pub fn record(&mut self, level: AccessLevel, latency: Cycles, is_write: bool) {
        match level {
            AccessLevel::Private => {
                self.private_accesses += 1;
                self.private_latency += latency;
            }
            AccessLevel::Remote => {
                self.remote_accesses += 1;
                self.remote_latency += latency;
            }
            AccessLevel::OffChip => {
                self.off_chip_accesses += 1;
                self.off_chip_latency += latency;
                if is_write {
                    self.off_chip_write_latencies.insert(latency);
                }
            }
        }
        self.total_latency += latency;
    }

    pub fn total_accesses(&self) -> u64 {
        self.private_accesses + self.remote_accesses + self.off_chip_accesses
    }

    /// Percentage of accesses served by the local cache so far, `None`
    /// before any access.
    pub fn hit_rate(&self) -> Option<f64> {
        let total = self.total_accesses();
        (total > 0).then(|| self.private_accesses as f64 * 100.0 / total as f64)
    }

    /// Derive the end-of-run report. `operations` is the number of memory
    /// operations replayed.
    pub fn finish(&self, operations: u64) -> Summary {
        Summary {
            private_accesses: self.private_accesses,
            remote_accesses: self.remote_accesses,
            off_chip_accesses: self.off_chip_accesses,
            total_accesses: self.total_accesses(),
            replacement_writebacks: self.replacement_writebacks,
            coherence_writebacks: self.coherence_writebacks,
            invalidations_sent: self.invalidations_sent,
            average_latency: average(self.total_latency, operations),
            private_average_latency: average(self.private_latency, self.private_accesses),
            remote_average_latency: average(self.remote_latency, self.remote_accesses),
            off_chip_average_latency: average(self.off_chip_latency, self.off_chip_accesses),
            total_latency: self.total_latency,
        }
    }
}

fn average(sum: Cycles, count: u64) -> f64 {
    if count == 0 {
        0.0
    } else {
        sum as f64 / count as f64
    }
}

/// Final statistics of one run.
#[derive(Debug, Clone, PartialEq)]
pub struct Summary {
    pub private_accesses: u64,
    pub remote_accesses: u64,
    pub off_chip_accesses: u64,
    pub total_accesses: u64,
    pub replacement_writebacks: u64,
    pub coherence_writebacks: u64,
    pub invalidations_sent: u64,
    pub average_latency: f64,
    pub private_average_latency: f64,
    pub remote_average_latency: f64,
    pub off_chip_average_latency: f64,
    pub total_latency: Cycles,
}

/// Print a float with at least one decimal digit (`29.0`, `14.5`).
pub fn format_float(value: f64) -> String {
    if value.is_finite() && value.fract() == 0.0 {
        format!("{value:.1}")
    } else {
        format!("{value}")
    }
}

impl fmt::Display for Summary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "Private-accesses: {}", self.private_accesses)?;
        writeln!(f, "Remote-accesses: {}", self.remote_accesses)?;
        writeln!(f, "Off-chip-accesses: {}", self.off_chip_accesses)?;
        writeln!(f, "Total-accesses: {}", self.total_accesses)?;
        writeln!(f, "Replacement-writebacks: {}", self.replacement_writebacks)?;
        writeln!(f, "Coherence-writebacks: {}", self.coherence_writebacks)?;
        writeln!(f, "Invalidations-sent: {}", self.invalidations_sent)?;
        writeln!(f, "Average-latency: {}", format_float(self.average_latency))?;
        writeln!(
            f,
            "Priv-average-latency: {}",
            format_float(self.private_average_latency)
        )?;
        writeln!(
            f,
            "Rem-average-latency: {}",
            format_float(self.remote_average_latency)
        )?;
        writeln!(
            f,
            "Off-chip-average-latency: {}",
            format_float(self.off_chip_average_latency)
        )?;
        writeln!(f, "Total-latency: {}", self.total_latency)
    }
}
