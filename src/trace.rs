use std::{fmt, fs, path::Path};

use anyhow::{Context, Result, bail};

use crate::config::PROCESSORS;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessKind {
    Read,
    Write,
}

impl AccessKind {
    pub fn verb(self) -> &'static str {
        match self {
            AccessKind::Read => "read",
            AccessKind::Write => "write",
        }
    }
}

impl fmt::Display for AccessKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AccessKind::Read => write!(f, "R"),
            AccessKind::Write => write!(f, "W"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TraceEntry {
    Access {
        processor: usize,
        kind: AccessKind,
        address: u64,
    },
    ToggleVerbose,
    PrintCaches,
    HitRate,
}

impl TraceEntry {
    pub fn is_access(&self) -> bool {
        matches!(self, TraceEntry::Access { .. })
    }
}

#[derive(Debug, Clone)]
pub struct TraceFile {
    pub name: String,
    pub entries: Vec<TraceEntry>,
}

impl TraceFile {
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)
            .with_context(|| format!("Unable to open trace file {}", path.display()))?;
        let name = path
            .file_name()
            .map(|f| f.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        Self::parse(name, &text).with_context(|| format!("Invalid trace {}", path.display()))
    }

    pub fn parse(name: impl Into<String>, text: &str) -> Result<Self> {
        let mut entries = Vec::new();
        for (idx, line) in text.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            let entry = parse_line(trimmed)
                .with_context(|| format!("Trace line {}: '{}'", idx + 1, trimmed))?;
            entries.push(entry);
        }
        Ok(Self {
            name: name.into(),
            entries,
        })
    }

    /// Number of memory operations, control lines excluded.
    pub fn operations(&self) -> usize {
        self.entries.iter().filter(|entry| entry.is_access()).count()
    }
}

fn parse_line(line: &str) -> Result<TraceEntry> {
    let mut parts = line.split_whitespace();
    let first = parts.next().context("missing processor")?;

    match first.to_ascii_lowercase().as_str() {
        "v" => return Ok(TraceEntry::ToggleVerbose),
        "p" => return Ok(TraceEntry::PrintCaches),
        "h" => return Ok(TraceEntry::HitRate),
        _ => {}
    }

    let processor = parse_processor(first)?;
    let op = parts.next().context("missing operation")?;
    let address = parts.next().context("missing address")?;
    if parts.next().is_some() {
        bail!("extra tokens");
    }
    let kind = match op {
        "R" => AccessKind::Read,
        "W" => AccessKind::Write,
        _ => bail!("invalid operation '{op}'"),
    };
    let address = address
        .parse::<u64>()
        .with_context(|| format!("invalid address literal '{address}'"))?;
    Ok(TraceEntry::Access {
        processor,
        kind,
        address,
    })
}

fn parse_processor(token: &str) -> Result<usize> {
    let Some(digits) = token.strip_prefix(['P', 'p']) else {
        bail!("invalid processor '{token}'");
    };
    let processor = digits
        .parse::<usize>()
        .with_context(|| format!("invalid processor '{token}'"))?;
    if processor >= PROCESSORS {
        bail!("processor {processor} out of range, only P0-P{} exist", PROCESSORS - 1);
    }
    Ok(processor)
}
