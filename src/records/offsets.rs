//! # Offsets Array
//!
//! The offsets array is the reusable descriptor produced by one header parse.
//! It records, per **physical** field, the cumulative end offset of the field's
//! data relative to the record origin, with the top bits reserved for flags.
//! After it is computed every field access is O(1).
//!
//! ## Entry Layout
//!
//! ```text
//!  31    30    29    28    27 ............................. 0
//! +-----+-----+-----+-----+-----------------------------------+
//! |NULL | EXT | DEF | DROP|  end offset (masked, non-decreasing)|
//! +-----+-----+-----+-----+-----------------------------------+
//! ```
//!
//! NULL, EXT and DEF are mutually exclusive. DROP marks a column that is gone
//! in the view the array was computed for; it may be physically present.
//! A field that occupies no bytes (NULL in the compact format, DEFAULT,
//! physically absent DROP) repeats the previous end offset.
//!
//! ## Header Word
//!
//! ```text
//!  31        30            29 ...................... 0
//! +---------+-------------+---------------------------+
//! | COMPACT | ANY_EXTERNAL|  extra size (header bytes)|
//! +---------+-------------+---------------------------+
//! ```
//!
//! ## Storage
//!
//! Entries live in an inline array of `REC_OFFS_NORMAL_SIZE` slots. Wider
//! indexes spill into a caller-provided [`ScratchArena`]; the spilled slice is
//! kept and reused, so the arena grows at most once per distinct field count.

use eyre::{bail, Result};
use tracing::debug;

use crate::config::{REC_OFFS_MASK, REC_OFFS_NORMAL_SIZE};
use crate::memory::ScratchArena;
use crate::records::version::InsertState;

pub mod flags {
    pub const SQL_NULL: u32 = 1 << 31;
    pub const EXTERNAL: u32 = 1 << 30;
    pub const DEFAULT: u32 = 1 << 29;
    pub const DROPPED: u32 = 1 << 28;
    pub const ALL: u32 = SQL_NULL | EXTERNAL | DEFAULT | DROPPED;

    pub const HEADER_COMPACT: u32 = 1 << 31;
    pub const HEADER_ANY_EXTERNAL: u32 = 1 << 30;
    pub const HEADER_SIZE_MASK: u32 = (1 << 30) - 1;
}

/// State of one field as recorded in the offsets array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldState {
    Data,
    External,
    Null,
    Default,
    Dropped,
}

pub struct RecOffsets<'a> {
    inline: [u32; REC_OFFS_NORMAL_SIZE],
    spill: Option<&'a mut [u32]>,
    arena: Option<&'a ScratchArena>,
    n_fields: usize,
    header: u32,
    row_version: Option<u8>,
    state: Option<InsertState>,
}

impl std::fmt::Debug for RecOffsets<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RecOffsets")
            .field("n_fields", &self.n_fields)
            .field("extra_size", &self.extra_size())
            .field("compact", &self.is_compact())
            .field("row_version", &self.row_version)
            .field("entries", &self.entries())
            .finish()
    }
}

impl Default for RecOffsets<'_> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'a> RecOffsets<'a> {
    /// Offsets backed only by inline storage.
    pub fn new() -> Self {
        Self {
            inline: [0; REC_OFFS_NORMAL_SIZE],
            spill: None,
            arena: None,
            n_fields: 0,
            header: 0,
            row_version: None,
            state: None,
        }
    }

    /// Offsets that may spill into `arena` for indexes wider than the inline
    /// capacity.
    pub fn with_arena(arena: &'a ScratchArena) -> Self {
        Self {
            arena: Some(arena),
            ..Self::new()
        }
    }

    pub fn capacity(&self) -> usize {
        self.spill
            .as_ref()
            .map_or(REC_OFFS_NORMAL_SIZE, |spill| spill.len().max(REC_OFFS_NORMAL_SIZE))
    }

    /// Makes room for `n_fields` entries and clears the previous contents.
    pub(crate) fn prepare(&mut self, n_fields: usize) -> Result<()> {
        if n_fields > REC_OFFS_NORMAL_SIZE {
            let fits = self.spill.as_ref().is_some_and(|s| s.len() >= n_fields);
            if !fits {
                let Some(arena) = self.arena else {
                    bail!(
                        "offsets for {} fields exceed the inline capacity of {} \
                         and no arena was supplied",
                        n_fields,
                        REC_OFFS_NORMAL_SIZE
                    );
                };
                debug!(
                    target: "pagerec::offsets",
                    n_fields,
                    previous = self.spill.as_ref().map_or(0, |s| s.len()),
                    "growing offsets array into arena"
                );
                let words = arena.allocate_words(n_fields);
                if let Some(old) = self.spill.take() {
                    let keep = old.len().min(words.len());
                    words[..keep].copy_from_slice(&old[..keep]);
                }
                self.spill = Some(words);
            }
        }
        self.n_fields = n_fields;
        self.header = 0;
        self.row_version = None;
        self.state = None;
        Ok(())
    }

    fn slots(&self) -> &[u32] {
        match &self.spill {
            Some(spill) if self.n_fields > REC_OFFS_NORMAL_SIZE => &spill[..self.n_fields],
            _ => &self.inline[..self.n_fields],
        }
    }

    fn slots_mut(&mut self) -> &mut [u32] {
        let n = self.n_fields;
        match &mut self.spill {
            Some(spill) if n > REC_OFFS_NORMAL_SIZE => &mut spill[..n],
            _ => &mut self.inline[..n],
        }
    }

    pub(crate) fn set_entry(&mut self, phys: usize, value: u32) {
        self.slots_mut()[phys] = value;
    }

    pub(crate) fn set_header(&mut self, extra_size: usize, compact: bool, any_external: bool) {
        let mut header = extra_size as u32 & flags::HEADER_SIZE_MASK;
        if compact {
            header |= flags::HEADER_COMPACT;
        }
        if any_external {
            header |= flags::HEADER_ANY_EXTERNAL;
        }
        self.header = header;
    }

    pub(crate) fn set_layout(&mut self, state: InsertState, row_version: Option<u8>) {
        self.state = Some(state);
        self.row_version = row_version;
    }

    pub fn n_fields(&self) -> usize {
        self.n_fields
    }

    pub fn entries(&self) -> &[u32] {
        self.slots()
    }

    pub fn raw(&self, phys: usize) -> u32 {
        self.slots()[phys]
    }

    pub fn header_word(&self) -> u32 {
        self.header
    }

    pub fn is_compact(&self) -> bool {
        self.header & flags::HEADER_COMPACT != 0
    }

    pub fn any_external(&self) -> bool {
        self.header & flags::HEADER_ANY_EXTERNAL != 0
    }

    /// Bytes before the origin that belong to this record.
    pub fn extra_size(&self) -> usize {
        (self.header & flags::HEADER_SIZE_MASK) as usize
    }

    pub fn data_size(&self) -> usize {
        self.slots()
            .last()
            .map_or(0, |&last| (last & REC_OFFS_MASK) as usize)
    }

    pub fn total_size(&self) -> usize {
        self.extra_size() + self.data_size()
    }

    pub fn row_version(&self) -> Option<u8> {
        self.row_version
    }

    pub fn insert_state(&self) -> Option<InsertState> {
        self.state
    }

    pub fn end(&self, phys: usize) -> usize {
        (self.raw(phys) & REC_OFFS_MASK) as usize
    }

    pub fn start(&self, phys: usize) -> usize {
        if phys == 0 {
            0
        } else {
            self.end(phys - 1)
        }
    }

    /// Bytes the field occupies in the data region.
    pub fn stored_len(&self, phys: usize) -> usize {
        self.end(phys) - self.start(phys)
    }

    pub fn state(&self, phys: usize) -> FieldState {
        let raw = self.raw(phys);
        if raw & flags::DROPPED != 0 {
            FieldState::Dropped
        } else if raw & flags::SQL_NULL != 0 {
            FieldState::Null
        } else if raw & flags::DEFAULT != 0 {
            FieldState::Default
        } else if raw & flags::EXTERNAL != 0 {
            FieldState::External
        } else {
            FieldState::Data
        }
    }

    pub fn is_null(&self, phys: usize) -> bool {
        self.raw(phys) & flags::SQL_NULL != 0
    }

    pub fn is_external(&self, phys: usize) -> bool {
        self.raw(phys) & flags::EXTERNAL != 0
    }

    pub fn is_default(&self, phys: usize) -> bool {
        self.raw(phys) & flags::DEFAULT != 0
    }

    pub fn is_dropped(&self, phys: usize) -> bool {
        self.raw(phys) & flags::DROPPED != 0
    }

    pub fn n_external(&self) -> usize {
        if !self.any_external() {
            return 0;
        }
        self.slots()
            .iter()
            .filter(|&&e| e & flags::EXTERNAL != 0)
            .count()
    }

    pub fn any_null(&self) -> bool {
        self.slots().iter().any(|&e| e & flags::SQL_NULL != 0)
    }

    /// Whether masked end offsets never decrease.
    pub fn is_monotonic(&self) -> bool {
        self.slots()
            .windows(2)
            .all(|w| (w[0] & REC_OFFS_MASK) <= (w[1] & REC_OFFS_MASK))
    }

    /// Whether every entry carries at most one of NULL/EXTERNAL/DEFAULT.
    pub fn flags_exclusive(&self) -> bool {
        self.slots().iter().all(|&e| {
            let exclusive = e & (flags::SQL_NULL | flags::EXTERNAL | flags::DEFAULT);
            exclusive.count_ones() <= 1
        })
    }
}
