//! # Physical Record Codec
//!
//! This module translates between logical tuples and the exact byte layout of
//! a record on an index page, and computes the offsets array that makes every
//! later field access O(1).
//!
//! ## Record Anatomy
//!
//! ```text
//!                      origin
//!                         |
//!   +---------------------+------------------------------+
//!   | header (read <-)    | field data (physical order)  |
//!   +---------------------+------------------------------+
//! ```
//!
//! | Format | Fixed header | Per-field header | NULL storage |
//! |--------|--------------|------------------|--------------|
//! | Compact | 5 bytes | null bitmap + reverse length table | none |
//! | Redundant | 6 bytes | end-offset table (1 or 2 byte slots) | zero-filled fixed width |
//!
//! ## Schema Evolution
//!
//! Columns can be added or dropped without rewriting rows. Each row records
//! enough in its header (info bits plus a version byte or a field count) for
//! the decoder to know which columns it stores. Columns a row predates decode
//! as DEFAULT; columns dropped before the row was written decode as DROPPED.
//!
//! ## Typical Flow
//!
//! ```ignore
//! let size = converted_size(&schema, &tuple, version)?;
//! let mut buf = vec![0u8; size.total()];
//! let enc = encode(&schema, &tuple, version, &mut buf)?;
//!
//! let mut offsets = RecOffsets::new();
//! compute_offsets(enc.record(&buf)?, &schema, &mut offsets);
//! let name = get(enc.record(&buf)?, &schema, &offsets, 1);
//! ```
//!
//! ## Module Structure
//!
//! - `schema`: field definitions and the index snapshot
//! - `header`: fixed extra-byte layouts of both formats
//! - `version`: insert-state classifier and row layouts
//! - `offsets`: the offsets array
//! - `record`: buffer + origin handles
//! - `tuple`: caller-built logical tuples
//! - `external`: off-record reference placeholder
//! - `compact` / `redundant`: the two formats
//! - `codec`: format dispatch and public entry points
//! - `access`: field get/set
//! - `validate`: non-aborting checks
//! - `dump`: diagnostic output

pub mod access;
pub mod codec;
pub mod compact;
pub mod dump;
pub mod external;
pub mod header;
pub mod offsets;
pub mod record;
mod redundant;
pub mod schema;
pub mod tuple;
pub mod validate;
pub mod version;

#[cfg(test)]
mod tests;

pub use access::{copy_record, extern_ref, get, get_physical, is_external, set, Field};
pub use codec::{
    codec_for, compute_offsets, compute_offsets_as_of, converted_size, encode, is_corruption,
    try_compute_offsets, CompactCodec, RecordCodec, RedundantCodec,
};
pub use compact::{compute_offsets_temp, encode_temp, temp_size};
pub use dump::RecordDump;
pub use external::ExternRef;
pub use header::{info_bits, CompactHeader, RecordStatus, RedundantHeader};
pub use offsets::{FieldState, RecOffsets};
pub use record::{EncodedRecord, RecordMut, RecordRef, RecordSize};
pub use schema::{FieldDef, IndexSchema, Presence, RecordFormat};
pub use tuple::{FieldValue, Tuple};
pub use validate::validate_record;
pub use version::{classify, HeaderAffix, InsertState};
