//! # External Field References
//!
//! A field stored off-record keeps a local prefix in the record followed by a
//! fixed 20-byte reference to the overflow chain. The codec never dereferences
//! the reference; it only accounts for its width and exposes it to callers.
//!
//! ```text
//! +-----------+-----------+-----------+---------------------------------+
//! | space_id  | page_no   | offset    | flags (1) | external length (7) |
//! | u32 BE    | u32 BE    | u32 BE    | u64 BE                          |
//! +-----------+-----------+-----------+---------------------------------+
//! ```
//!
//! | Flag | Meaning |
//! |------|---------|
//! | 0x80 | this record owns the overflow chain |
//! | 0x40 | the chain was inherited from an earlier version of the row |

use eyre::{ensure, eyre, Result};
use zerocopy::big_endian::{U32, U64};
use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout, Unaligned};

use crate::config::EXTERN_FIELD_REF_SIZE;

const OWNER_FLAG: u64 = 0x80 << 56;
const INHERITED_FLAG: u64 = 0x40 << 56;
const LENGTH_MASK: u64 = (1 << 56) - 1;

#[repr(C)]
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, FromBytes, IntoBytes, Immutable, KnownLayout, Unaligned,
)]
pub struct ExternRef {
    space_id: U32,
    page_no: U32,
    offset: U32,
    length: U64,
}

const _: () = assert!(std::mem::size_of::<ExternRef>() == EXTERN_FIELD_REF_SIZE);

impl ExternRef {
    be_accessors! {
        space_id: u32,
        page_no: u32,
        offset: u32,
    }

    pub fn new(space_id: u32, page_no: u32, offset: u32, external_len: u64) -> Self {
        Self {
            space_id: U32::new(space_id),
            page_no: U32::new(page_no),
            offset: U32::new(offset),
            length: U64::new((external_len & LENGTH_MASK) | OWNER_FLAG),
        }
    }

    /// The reference at the end of an externally stored field value.
    pub fn read(value: &[u8]) -> Result<&Self> {
        ensure!(
            value.len() >= EXTERN_FIELD_REF_SIZE,
            "external field of {} bytes is shorter than its {}-byte reference",
            value.len(),
            EXTERN_FIELD_REF_SIZE
        );
        let tail = &value[value.len() - EXTERN_FIELD_REF_SIZE..];
        Self::ref_from_bytes(tail).map_err(|e| eyre!("failed to parse external reference: {:?}", e))
    }

    /// Bytes of the value kept in the record ahead of the reference.
    pub fn local_prefix(value: &[u8]) -> &[u8] {
        &value[..value.len().saturating_sub(EXTERN_FIELD_REF_SIZE)]
    }

    pub fn external_len(&self) -> u64 {
        self.length.get() & LENGTH_MASK
    }

    pub fn is_owner(&self) -> bool {
        self.length.get() & OWNER_FLAG != 0
    }

    pub fn is_inherited(&self) -> bool {
        self.length.get() & INHERITED_FLAG != 0
    }

    pub fn set_inherited(&mut self, inherited: bool) {
        let length = self.length.get();
        let length = if inherited {
            length | INHERITED_FLAG
        } else {
            length & !INHERITED_FLAG
        };
        self.length = U64::new(length);
    }

    /// Builds an externally stored value: `prefix` followed by this reference.
    pub fn with_prefix(&self, prefix: &[u8]) -> Vec<u8> {
        let mut value = Vec::with_capacity(prefix.len() + EXTERN_FIELD_REF_SIZE);
        value.extend_from_slice(prefix);
        value.extend_from_slice(self.as_bytes());
        value
    }
}
