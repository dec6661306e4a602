//! # Record Header ("Extra Bytes") Layouts
//!
//! Every record is addressed by its **origin**: the first byte of field data.
//! The fixed header sits immediately before the origin and is read backwards.
//! Both layouts are big-endian and modelled as `zerocopy` structs so they can be
//! read in place from a page buffer.
//!
//! ## Compact Header (5 bytes)
//!
//! ```text
//! origin-5        origin-4 .. origin-3          origin-2 .. origin-1
//! +-------------+-----------------------------+-------------------------+
//! | info | own  | heap_no (13) | status (3)   | next (relative, i16)    |
//! | 4b   | 4b   |              |              |                         |
//! +-------------+-----------------------------+-------------------------+
//! ```
//!
//! ## Redundant Header (6 bytes)
//!
//! ```text
//! origin-6        origin-5 .. origin-3 (24 bits)             origin-2 .. origin-1
//! +-------------+------------------------------------------+------------------+
//! | info | own  | heap_no (13) | n_fields (10) | short (1) | next (absolute)  |
//! +-------------+------------------------------------------+------------------+
//! ```
//!
//! ## Info Bits
//!
//! | Bit | Name | Meaning |
//! |-----|------|---------|
//! | 0x10 | MIN_REC | leftmost node pointer on a non-leaf level |
//! | 0x20 | DELETED | delete-marked |
//! | 0x40 | VERSIONED | a row-version byte precedes the null bitmap / offsets |
//! | 0x80 | INSTANT | a legacy field-count prefix precedes the null bitmap |
//!
//! VERSIONED and INSTANT are mutually exclusive.

use eyre::{eyre, Result};
use zerocopy::big_endian::U16;
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::{REC_N_NEW_EXTRA_BYTES, REC_N_OLD_EXTRA_BYTES};
use crate::records::record::{RecordMut, RecordRef};

pub mod info_bits {
    pub const MIN_REC: u8 = 0x10;
    pub const DELETED: u8 = 0x20;
    pub const VERSIONED: u8 = 0x40;
    pub const INSTANT: u8 = 0x80;
    pub const MASK: u8 = 0xF0;
}

const N_OWNED_MASK: u8 = 0x0F;
const HEAP_NO_SHIFT: u32 = 3;
const STATUS_MASK: u16 = 0x07;
pub const MAX_HEAP_NO: u16 = (1 << 13) - 1;

#[repr(u8)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordStatus {
    Ordinary = 0,
    NodePointer = 1,
    Infimum = 2,
    Supremum = 3,
}

impl RecordStatus {
    pub fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(RecordStatus::Ordinary),
            1 => Some(RecordStatus::NodePointer),
            2 => Some(RecordStatus::Infimum),
            3 => Some(RecordStatus::Supremum),
            _ => None,
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct CompactHeader {
    info_owned: u8,
    heap_status: U16,
    next: U16,
}

const _: () = assert!(std::mem::size_of::<CompactHeader>() == REC_N_NEW_EXTRA_BYTES);

impl CompactHeader {
    be_accessors! {
        next: u16,
    }

    pub fn read<'a>(rec: &RecordRef<'a>) -> Result<&'a Self> {
        let bytes = rec.header_tail(REC_N_NEW_EXTRA_BYTES)?;
        Self::ref_from_bytes(bytes).map_err(|e| eyre!("failed to parse compact header: {:?}", e))
    }

    pub fn read_mut<'r>(rec: &'r mut RecordMut<'_>) -> Result<&'r mut Self> {
        let bytes = rec.header_tail_mut(REC_N_NEW_EXTRA_BYTES)?;
        Self::mut_from_bytes(bytes).map_err(|e| eyre!("failed to parse compact header: {:?}", e))
    }

    pub fn new(info_bits: u8, status: RecordStatus) -> Self {
        Self {
            info_owned: info_bits & info_bits::MASK,
            heap_status: U16::new(status as u16),
            next: U16::new(0),
        }
    }

    pub fn info_bits(&self) -> u8 {
        self.info_owned & info_bits::MASK
    }

    pub fn set_info_bits(&mut self, bits: u8) {
        self.info_owned = (self.info_owned & N_OWNED_MASK) | (bits & info_bits::MASK);
    }

    pub fn n_owned(&self) -> u8 {
        self.info_owned & N_OWNED_MASK
    }

    pub fn set_n_owned(&mut self, n: u8) {
        self.info_owned = (self.info_owned & info_bits::MASK) | (n & N_OWNED_MASK);
    }

    pub fn heap_no(&self) -> u16 {
        self.heap_status.get() >> HEAP_NO_SHIFT
    }

    pub fn set_heap_no(&mut self, heap_no: u16) {
        let status = self.heap_status.get() & STATUS_MASK;
        self.heap_status = U16::new((heap_no.min(MAX_HEAP_NO) << HEAP_NO_SHIFT) | status);
    }

    pub fn status(&self) -> Option<RecordStatus> {
        RecordStatus::from_bits((self.heap_status.get() & STATUS_MASK) as u8)
    }

    /// Offset of the next record's origin relative to this one.
    pub fn next_relative(&self) -> i16 {
        self.next.get() as i16
    }

    pub fn is_delete_marked(&self) -> bool {
        self.info_owned & info_bits::DELETED != 0
    }

    pub fn set_delete_marked(&mut self, marked: bool) {
        if marked {
            self.info_owned |= info_bits::DELETED;
        } else {
            self.info_owned &= !info_bits::DELETED;
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned)]
pub struct RedundantHeader {
    info_owned: u8,
    packed: [u8; 3],
    next: U16,
}

const _: () = assert!(std::mem::size_of::<RedundantHeader>() == REC_N_OLD_EXTRA_BYTES);

impl RedundantHeader {
    be_accessors! {
        next: u16,
    }

    pub fn read<'a>(rec: &RecordRef<'a>) -> Result<&'a Self> {
        let bytes = rec.header_tail(REC_N_OLD_EXTRA_BYTES)?;
        Self::ref_from_bytes(bytes)
            .map_err(|e| eyre!("failed to parse redundant header: {:?}", e))
    }

    pub fn read_mut<'r>(rec: &'r mut RecordMut<'_>) -> Result<&'r mut Self> {
        let bytes = rec.header_tail_mut(REC_N_OLD_EXTRA_BYTES)?;
        Self::mut_from_bytes(bytes)
            .map_err(|e| eyre!("failed to parse redundant header: {:?}", e))
    }

    pub fn new(info_bits: u8, n_fields: u16, one_byte_offsets: bool) -> Self {
        let mut header = Self {
            info_owned: info_bits & info_bits::MASK,
            packed: [0; 3],
            next: U16::new(0),
        };
        header.set_n_fields(n_fields);
        header.set_one_byte_offsets(one_byte_offsets);
        header
    }

    fn packed_bits(&self) -> u32 {
        u32::from_be_bytes([0, self.packed[0], self.packed[1], self.packed[2]])
    }

    fn set_packed_bits(&mut self, bits: u32) {
        let [_, b0, b1, b2] = bits.to_be_bytes();
        self.packed = [b0, b1, b2];
    }

    pub fn info_bits(&self) -> u8 {
        self.info_owned & info_bits::MASK
    }

    pub fn set_info_bits(&mut self, bits: u8) {
        self.info_owned = (self.info_owned & N_OWNED_MASK) | (bits & info_bits::MASK);
    }

    pub fn n_owned(&self) -> u8 {
        self.info_owned & N_OWNED_MASK
    }

    pub fn set_n_owned(&mut self, n: u8) {
        self.info_owned = (self.info_owned & info_bits::MASK) | (n & N_OWNED_MASK);
    }

    pub fn heap_no(&self) -> u16 {
        (self.packed_bits() >> 11) as u16
    }

    pub fn set_heap_no(&mut self, heap_no: u16) {
        let bits = (self.packed_bits() & 0x7FF) | ((heap_no.min(MAX_HEAP_NO) as u32) << 11);
        self.set_packed_bits(bits);
    }

    pub fn n_fields(&self) -> u16 {
        ((self.packed_bits() >> 1) & 0x3FF) as u16
    }

    pub fn set_n_fields(&mut self, n: u16) {
        let bits = (self.packed_bits() & !0x7FE) | (((n & 0x3FF) as u32) << 1);
        self.set_packed_bits(bits);
    }

    /// Whether the end-offset table uses 1-byte slots.
    pub fn one_byte_offsets(&self) -> bool {
        self.packed[2] & 0x01 != 0
    }

    pub fn set_one_byte_offsets(&mut self, short: bool) {
        if short {
            self.packed[2] |= 0x01;
        } else {
            self.packed[2] &= !0x01;
        }
    }

    pub fn is_delete_marked(&self) -> bool {
        self.info_owned & info_bits::DELETED != 0
    }

    pub fn set_delete_marked(&mut self, marked: bool) {
        if marked {
            self.info_owned |= info_bits::DELETED;
        } else {
            self.info_owned &= !info_bits::DELETED;
        }
    }
}
