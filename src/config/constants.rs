//! # Record Format Constants
//!
//! This module centralizes every constant that shapes the physical record
//! layout. Most of them are fixed by on-disk compatibility: changing one of them
//! makes existing pages unreadable, so they are grouped with the values they
//! depend on and the relationships are enforced by compile-time assertions.
//!
//! ## Dependency Graph
//!
//! ```text
//! PAGE_SIZE (16384 bytes)
//!       │
//!       ├─> MAX_RECORD_SIZE (half a page, a B-tree page must hold two records)
//!       │     │
//!       │     └─> REC_2BYTE_OFFS_LIMIT (14-bit end offsets must cover it)
//!       │
//!       └─> REC_OFFS_MASK (offsets-array payload bits must cover a page)
//!
//! REC_MAX_N_FIELDS (1023)
//!       │
//!       └─> redundant header n_fields is a 10-bit field
//!
//! MAX_ROW_VERSION (64)
//!       │
//!       └─> stored in a single version byte
//! ```
//!
//! ## Critical Invariants
//!
//! 1. `MAX_RECORD_SIZE <= REC_2BYTE_OFFS_LIMIT` (redundant 2-byte slots address any record)
//! 2. `REC_MAX_N_FIELDS < 1 << 10` (fits the redundant header)
//! 3. `PAGE_SIZE <= REC_OFFS_MASK` (flag bits never collide with offsets)
//! 4. `REC_N_FIELDS_ONE_BYTE_MAX < 0x80` (the continuation bit stays free)

// ============================================================================
// PAGE AND RECORD SIZE LIMITS
// ============================================================================

/// Size of an index page in bytes. Bounds every record buffer.
pub const PAGE_SIZE: usize = 16384;

/// Largest record (extra bytes + data) that may be placed on a page.
pub const MAX_RECORD_SIZE: usize = PAGE_SIZE / 2 - 200;

/// Maximum number of fields in one index record.
pub const REC_MAX_N_FIELDS: usize = 1023;

const _: () = assert!(
    REC_MAX_N_FIELDS < 1 << 10,
    "REC_MAX_N_FIELDS must fit the 10-bit redundant header field"
);

// ============================================================================
// HEADER ("EXTRA BYTES") SIZES
// ============================================================================

/// Fixed header bytes preceding the origin of a compact record.
pub const REC_N_NEW_EXTRA_BYTES: usize = 5;

/// Fixed header bytes preceding the origin of a redundant record.
pub const REC_N_OLD_EXTRA_BYTES: usize = 6;

/// Width of the row version byte stored by versioned records.
pub const ROW_VERSION_SIZE: usize = 1;

// ============================================================================
// LENGTH AND OFFSET ENCODING
// ============================================================================

/// Largest data size that lets a redundant record use 1-byte end offsets.
pub const REC_1BYTE_OFFS_LIMIT: usize = 0x7F;

/// Largest end offset a redundant 2-byte slot can express.
pub const REC_2BYTE_OFFS_LIMIT: usize = 0x3FFF;

/// Largest variable length stored in the compact 1-byte length form when the
/// column may hold more than 255 bytes.
pub const REC_1BYTE_LEN_MAX: usize = 127;

/// Largest variable length describable by the compact 2-byte length form.
pub const REC_2BYTE_LEN_MAX: usize = 0x3FFF;

/// Columns with a declared maximum length above this always use the
/// 2-byte length form once the value reaches 128 bytes.
pub const SMALL_COLUMN_MAX_LEN: usize = 255;

/// Field counts up to this value use the 1-byte legacy field-count prefix.
pub const REC_N_FIELDS_ONE_BYTE_MAX: usize = 0x7F;

/// Continuation bit of the 2-byte legacy field-count prefix.
pub const REC_N_FIELDS_TWO_BYTES_FLAG: u8 = 0x80;

const _: () = assert!(MAX_RECORD_SIZE <= REC_2BYTE_OFFS_LIMIT);
const _: () = assert!(REC_N_FIELDS_ONE_BYTE_MAX < REC_N_FIELDS_TWO_BYTES_FLAG as usize);
const _: () = assert!(REC_MAX_N_FIELDS < 1 << 15);

// ============================================================================
// INSTANT DDL
// ============================================================================

/// Highest row version a table may reach before it must be rebuilt.
pub const MAX_ROW_VERSION: u8 = 64;

// ============================================================================
// EXTERNALLY STORED FIELDS
// ============================================================================

/// Width of the reference placeholder left in the record for a field whose
/// value lives in overflow storage.
pub const EXTERN_FIELD_REF_SIZE: usize = 20;

// ============================================================================
// OFFSETS ARRAY
// ============================================================================

/// Number of field slots an offsets array holds without touching the arena.
pub const REC_OFFS_NORMAL_SIZE: usize = 100;

/// Bits of an offsets-array entry that carry the end offset.
pub const REC_OFFS_MASK: u32 = (1 << 28) - 1;

const _: () = assert!(PAGE_SIZE <= REC_OFFS_MASK as usize);
const _: () = assert!(REC_OFFS_NORMAL_SIZE >= 16);
