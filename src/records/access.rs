//! # Field Accessor Layer
//!
//! O(1) field access over a record whose offsets were computed once. Field
//! numbers are **logical**; they are translated to physical slots only when
//! the table has row versions.
//!
//! ## Contract
//!
//! Asking for a field number past the index width, or overwriting a field with
//! a value of different length, is a programmer error and panics with the
//! index identity and the requested vs available field count. Records whose
//! size must change are re-encoded by the caller.
//!
//! ## NULL Transitions
//!
//! | Format | Value -> NULL | NULL -> value |
//! |--------|---------------|---------------|
//! | Redundant | fixed fields only: zero-filled, NULL flag set | same width required |
//! | Compact | panics | panics |

use tracing::error;

use crate::memory::ScratchArena;
use crate::records::external::ExternRef;
use crate::records::offsets::{flags, FieldState, RecOffsets};
use crate::records::record::{RecordMut, RecordRef};
use crate::records::schema::IndexSchema;

/// A field as seen through the offsets array.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field<'a> {
    /// Stored bytes. For an external field this is the local prefix followed
    /// by the 20-byte reference.
    Data(&'a [u8]),
    Null,
    /// Not stored in this row; carries the schema default (`None` = NULL).
    Default(Option<&'a [u8]>),
    Dropped,
}

impl<'a> Field<'a> {
    /// The value a reader sees, with defaults resolved.
    pub fn value(&self) -> Option<&'a [u8]> {
        match *self {
            Field::Data(bytes) => Some(bytes),
            Field::Default(default) => default,
            Field::Null | Field::Dropped => None,
        }
    }
}

fn contract_violation(schema: &IndexSchema, message: std::fmt::Arguments<'_>) -> ! {
    error!(
        target: "pagerec::access",
        index = schema.name(),
        table_id = schema.table_id(),
        n_fields = schema.n_fields(),
        "{}",
        message
    );
    panic!(
        "index {} (table {}): {}",
        schema.name(),
        schema.table_id(),
        message
    );
}

fn physical_slot(schema: &IndexSchema, offsets: &RecOffsets<'_>, n: usize) -> usize {
    let available = offsets.n_fields().min(schema.n_fields());
    if n >= available {
        contract_violation(
            schema,
            format_args!(
                "field {} requested, record has {} fields",
                n, available
            ),
        );
    }
    schema.physical_pos(n)
}

fn stored_bytes<'a>(
    rec: RecordRef<'a>,
    schema: &IndexSchema,
    offsets: &RecOffsets<'_>,
    phys: usize,
) -> &'a [u8] {
    match rec.data_range(offsets.start(phys), offsets.end(phys)) {
        Ok(bytes) => bytes,
        Err(err) => contract_violation(
            schema,
            format_args!("offsets do not describe this record: {}", err),
        ),
    }
}

/// Field at physical position `phys`.
pub fn get_physical<'a>(
    rec: RecordRef<'a>,
    schema: &'a IndexSchema,
    offsets: &RecOffsets<'_>,
    phys: usize,
) -> Field<'a> {
    if phys >= offsets.n_fields().min(schema.n_fields()) {
        contract_violation(
            schema,
            format_args!(
                "physical field {} requested, record has {} fields",
                phys,
                offsets.n_fields()
            ),
        );
    }
    match offsets.state(phys) {
        FieldState::Data | FieldState::External => {
            Field::Data(stored_bytes(rec, schema, offsets, phys))
        }
        FieldState::Null => Field::Null,
        FieldState::Default => Field::Default(schema.physical_field(phys).default_value()),
        FieldState::Dropped => Field::Dropped,
    }
}

/// Logical field `n`.
pub fn get<'a>(
    rec: RecordRef<'a>,
    schema: &'a IndexSchema,
    offsets: &RecOffsets<'_>,
    n: usize,
) -> Field<'a> {
    let phys = physical_slot(schema, offsets, n);
    get_physical(rec, schema, offsets, phys)
}

pub fn is_external(schema: &IndexSchema, offsets: &RecOffsets<'_>, n: usize) -> bool {
    offsets.is_external(physical_slot(schema, offsets, n))
}

pub fn is_null(schema: &IndexSchema, offsets: &RecOffsets<'_>, n: usize) -> bool {
    offsets.is_null(physical_slot(schema, offsets, n))
}

/// Bytes logical field `n` occupies in the record.
pub fn stored_len(schema: &IndexSchema, offsets: &RecOffsets<'_>, n: usize) -> usize {
    offsets.stored_len(physical_slot(schema, offsets, n))
}

/// The external reference of logical field `n`, if it is stored externally.
pub fn extern_ref<'a>(
    rec: RecordRef<'a>,
    schema: &'a IndexSchema,
    offsets: &RecOffsets<'_>,
    n: usize,
) -> Option<&'a ExternRef> {
    let phys = physical_slot(schema, offsets, n);
    if !offsets.is_external(phys) {
        return None;
    }
    ExternRef::read(stored_bytes(rec, schema, offsets, phys)).ok()
}

/// Overwrites logical field `n` in place. `None` writes SQL NULL.
///
/// The new value must occupy exactly the bytes the field occupies now; see the
/// module docs for NULL transitions.
pub fn set(
    rec: &mut RecordMut<'_>,
    schema: &IndexSchema,
    offsets: &mut RecOffsets<'_>,
    n: usize,
    value: Option<&[u8]>,
) {
    let phys = physical_slot(schema, offsets, n);
    let field = schema.physical_field(phys);
    let state = offsets.state(phys);
    if matches!(state, FieldState::Default | FieldState::Dropped) {
        contract_violation(
            schema,
            format_args!("field {} ({:?}) is not stored in the record", field.name, state),
        );
    }

    let (start, end) = (offsets.start(phys), offsets.end(phys));
    if let Some(bytes) = value {
        if bytes.len() != end - start {
            contract_violation(
                schema,
                format_args!(
                    "field {} occupies {} bytes, new value has {}",
                    field.name,
                    end - start,
                    bytes.len()
                ),
            );
        }
    }
    let was_null = state == FieldState::Null;
    let transition = was_null != value.is_none();
    if transition {
        if value.is_none() && end - start != field.sql_null_size() {
            contract_violation(
                schema,
                format_args!(
                    "field {} occupies {} bytes, NULL needs {}",
                    field.name,
                    end - start,
                    field.sql_null_size()
                ),
            );
        }
        if let Err(err) = schema
            .codec()
            .set_null_bit(rec, schema, offsets, phys, value.is_none())
        {
            contract_violation(schema, format_args!("{}", err));
        }
    }

    let target = &mut rec.data_mut()[start..end];
    match value {
        Some(bytes) => target.copy_from_slice(bytes),
        None => target.fill(0),
    }

    if transition {
        let mut entry = offsets.raw(phys) & !flags::ALL;
        if value.is_none() {
            entry |= flags::SQL_NULL;
        }
        offsets.set_entry(phys, entry);
    }
}

/// Copies the record (header and data) into `arena`.
pub fn copy_record<'arena>(
    rec: RecordRef<'_>,
    offsets: &RecOffsets<'_>,
    arena: &'arena ScratchArena,
) -> RecordRef<'arena> {
    let extra = offsets.extra_size();
    let origin = rec.origin();
    let bytes = &rec.buf()[origin - extra..origin + offsets.data_size()];
    let copy: &'arena [u8] = arena.copy_bytes(bytes);
    RecordRef::from_parts(copy, extra)
}
