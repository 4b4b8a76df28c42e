use std::fmt;

use crate::address::CACHE_LINES;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LineState {
    #[default]
    Invalid,
    Shared,
    Modified,
}

impl LineState {
    pub fn is_valid(self) -> bool {
        self != LineState::Invalid
    }

    /// Long form used by the verbose narration.
    pub fn describe(self) -> &'static str {
        match self {
            LineState::Invalid => "Invalid (cache miss)",
            LineState::Shared => "Shared",
            LineState::Modified => "Modified",
        }
    }
}

impl fmt::Display for LineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LineState::Invalid => write!(f, "I"),
            LineState::Shared => write!(f, "S"),
            LineState::Modified => write!(f, "M"),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheLine {
    pub state: LineState,
    pub tag: Option<u64>, // None until a block is first bound to the line
}

impl CacheLine {
    /// State of this line for `tag`, or `None` if another block (or nothing)
    /// is bound here.
    pub fn state_for(&self, tag: u64) -> Option<LineState> {
        (self.tag == Some(tag)).then_some(self.state)
    }

    /// True if the line holds a valid copy of `tag`.
    pub fn shares(&self, tag: u64) -> bool {
        self.state.is_valid() && self.tag == Some(tag)
    }
}

/// Direct-mapped private cache of one processor.
#[derive(Debug, Clone)]
pub struct ProcessorCache {
    id: usize,
    lines: Vec<CacheLine>,
}

impl ProcessorCache {
    pub fn new(id: usize) -> Self {
        Self {
            id,
            lines: vec![CacheLine::default(); CACHE_LINES],
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn line(&self, index: usize) -> &CacheLine {
        &self.lines[index]
    }

    pub fn line_mut(&mut self, index: usize) -> &mut CacheLine {
        &mut self.lines[index]
    }

    pub fn valid_lines(&self) -> impl Iterator<Item = (usize, &CacheLine)> {
        self.lines
            .iter()
            .enumerate()
            .filter(|(_, line)| line.state.is_valid())
    }
}

impl fmt::Display for ProcessorCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "P{}", self.id)?;
        for (index, line) in self.valid_lines() {
            let tag = line.tag.unwrap_or_default();
            writeln!(f, "cache-line: {index}  {{state: {}, tag: {tag}}}", line.state)?;
        }
        Ok(())
    }
}
