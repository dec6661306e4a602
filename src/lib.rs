//! # pagerec - Physical Record Codec
//!
//! pagerec is the record layer of a B-tree storage engine. It turns a logical
//! tuple into the bytes stored on an index page and back, in two on-disk
//! formats, while tables evolve through instant ADD/DROP COLUMN:
//!
//! - **Zero-copy access**: records are read in place from page buffers
//! - **One parse per record**: an offsets array makes every field O(1)
//! - **Self-describing rows**: each row carries what its decoder needs to
//!   know which schema version wrote it
//!
//! ## Quick Start
//!
//! ```ignore
//! use pagerec::records::*;
//!
//! let schema = IndexSchema::new(
//!     1,
//!     "PRIMARY",
//!     RecordFormat::Compact,
//!     vec![
//!         FieldDef::fixed("id", 4),
//!         FieldDef::variable("name", 100).nullable(),
//!     ],
//! )?;
//!
//! let tuple = Tuple::from(vec![FieldValue::Data(&7u32.to_be_bytes()), FieldValue::Null]);
//! let mut buf = [0u8; 64];
//! let enc = encode(&schema, &tuple, 0, &mut buf)?;
//!
//! let mut offsets = RecOffsets::new();
//! compute_offsets(enc.record(&buf)?, &schema, &mut offsets);
//! assert_eq!(get(enc.record(&buf)?, &schema, &offsets, 1), Field::Null);
//! ```
//!
//! ## Layering
//!
//! ```text
//! ┌─────────────────────────────────────┐
//! │  Callers: B-tree, bulk load, zip    │
//! ├─────────────────────────────────────┤
//! │  access: get / set / copy           │
//! ├─────────────────────────────────────┤
//! │  codec: encode / compute_offsets    │
//! ├──────────────────┬──────────────────┤
//! │  compact         │  redundant       │
//! ├──────────────────┴──────────────────┤
//! │  version classifier · schema        │
//! └─────────────────────────────────────┘
//! ```
//!
//! ## Module Overview
//!
//! - [`config`]: on-disk format constants
//! - [`memory`]: caller-owned scratch arena
//! - [`records`]: schema snapshot, headers, offsets, encoders, accessors
//!
//! ## Concurrency
//!
//! Nothing here locks or blocks. Callers hold a page latch while a record and
//! the offsets computed from it are in use, and give each thread its own
//! offsets array and arena.

#[macro_use]
mod macros;

pub mod config;
pub mod memory;
pub mod records;
