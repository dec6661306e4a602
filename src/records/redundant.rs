//! # Redundant Record Format
//!
//! The old on-disk format keeps an explicit end-offset table in the header,
//! one slot per stored field, read backwards from the origin:
//!
//! ```text
//!  lower addresses                                          origin
//!  +----------------------------+---------+-----------------+---------+
//!  | end offsets (slot n .. 0)  | version | extra (6 bytes) | data... |
//!  +----------------------------+---------+-----------------+---------+
//! ```
//!
//! ## Slots
//!
//! | Width | NULL | EXTERNAL | End offset mask |
//! |-------|------|----------|-----------------|
//! | 1 byte | 0x80 | n/a | 0x7F |
//! | 2 bytes | 0x8000 | 0x4000 | 0x3FFF |
//!
//! One-byte slots are used when the record has no external fields and its
//! data fits in 127 bytes; the header's short flag says which width a record
//! uses. Two-byte slots are big-endian, the high byte farther from the origin.
//!
//! A NULL field still occupies its SQL-NULL width in the data region: fixed
//! fields are zero-filled to their declared length, variable fields take no
//! bytes. This is what lets a fixed field switch between NULL and a value in
//! place.
//!
//! The header's field count is the number of stored slots. Instantly added
//! fields missing from the row and fields dropped before the row was written
//! have no slot, so the slot of a stored field is its physical position minus
//! the absent fields before it.

use eyre::{bail, ensure, eyre, Result};
use zerocopy::IntoBytes;

use crate::config::{
    EXTERN_FIELD_REF_SIZE, REC_1BYTE_OFFS_LIMIT, REC_2BYTE_OFFS_LIMIT, REC_N_OLD_EXTRA_BYTES,
    ROW_VERSION_SIZE,
};
use crate::records::codec::{check_record_size, check_value, stored_fields};
use crate::records::header::RedundantHeader;
use crate::records::offsets::{flags, RecOffsets};
use crate::records::record::{EncodedRecord, RecordMut, RecordRef, RecordSize};
use crate::records::schema::{IndexSchema, Presence};
use crate::records::tuple::{FieldValue, Tuple};
use crate::records::version::{classify, RowLayout};

const SHORT_NULL: u8 = 0x80;
const SHORT_END_MASK: u8 = 0x7F;
const LONG_NULL: u16 = 0x8000;
const LONG_EXTERNAL: u16 = 0x4000;
const LONG_END_MASK: u16 = 0x3FFF;

/// Distance from the origin of slot 0.
fn table_back(versioned: bool) -> usize {
    REC_N_OLD_EXTRA_BYTES + 1 + if versioned { ROW_VERSION_SIZE } else { 0 }
}

fn slot_width(short: bool) -> usize {
    if short {
        1
    } else {
        2
    }
}

/// Data bytes and whether any stored value is external.
fn body_size(
    schema: &IndexSchema,
    layout: &RowLayout<'_>,
    tuple: &Tuple<'_>,
) -> Result<(usize, usize, bool)> {
    let stored = stored_fields(schema, layout, tuple);
    let mut data = 0;
    let mut any_external = false;
    for &(field, value) in &stored {
        check_value(schema, field, value)?;
        data += match value {
            FieldValue::Null => field.sql_null_size(),
            other => other.bytes().map_or(0, <[u8]>::len),
        };
        any_external |= matches!(value, FieldValue::External(_));
    }
    Ok((stored.len(), data, any_external))
}

fn uses_short_slots(data: usize, any_external: bool) -> bool {
    !any_external && data <= REC_1BYTE_OFFS_LIMIT
}

/// Slot count, slot width and size of the record `tuple` encodes to.
struct Sizing {
    n_stored: usize,
    short: bool,
    size: RecordSize,
}

fn sizing(schema: &IndexSchema, layout: &RowLayout<'_>, tuple: &Tuple<'_>) -> Result<Sizing> {
    let (n_stored, data, any_external) = body_size(schema, layout, tuple)?;
    ensure!(
        data <= REC_2BYTE_OFFS_LIMIT,
        "record data of {} bytes exceeds the redundant offset limit {}",
        data,
        REC_2BYTE_OFFS_LIMIT
    );
    let short = uses_short_slots(data, any_external);
    let size = RecordSize {
        extra: table_back(layout.state().has_version_byte()) - 1 + n_stored * slot_width(short),
        data,
    };
    Ok(Sizing {
        n_stored,
        short,
        size: check_record_size(schema, size)?,
    })
}

pub(crate) fn converted_size(
    schema: &IndexSchema,
    tuple: &Tuple<'_>,
    version: u8,
) -> Result<RecordSize> {
    let layout = RowLayout::plan(schema, tuple, version)?;
    Ok(sizing(schema, &layout, tuple)?.size)
}

pub(crate) fn encode(
    schema: &IndexSchema,
    tuple: &Tuple<'_>,
    version: u8,
    buf: &mut [u8],
) -> Result<EncodedRecord> {
    let layout = RowLayout::plan(schema, tuple, version)?;
    let Sizing {
        n_stored,
        short,
        size,
    } = sizing(schema, &layout, tuple)?;
    let versioned = layout.state().has_version_byte();
    let back = table_back(versioned);
    let origin = size.extra;
    let total = size.total();
    ensure!(
        total <= buf.len(),
        "record of {} bytes does not fit in a {}-byte buffer",
        total,
        buf.len()
    );

    let header = RedundantHeader::new(layout.state().info_bits(), n_stored as u16, short);
    buf[origin - REC_N_OLD_EXTRA_BYTES..origin].copy_from_slice(header.as_bytes());
    if versioned {
        buf[origin - REC_N_OLD_EXTRA_BYTES - 1] = layout.row_version().unwrap_or(0);
    }

    let mut end = 0usize;
    for (slot, &(field, value)) in stored_fields(schema, &layout, tuple).iter().enumerate() {
        let start = origin + end;
        match value {
            FieldValue::Null => {
                let width = field.sql_null_size();
                buf[start..start + width].fill(0);
                end += width;
            }
            other => {
                let bytes = other.bytes().unwrap_or_default();
                buf[start..start + bytes.len()].copy_from_slice(bytes);
                end += bytes.len();
            }
        }
        if short {
            let mut entry = end as u8;
            if value.is_null() {
                entry |= SHORT_NULL;
            }
            buf[origin - (back + slot)] = entry;
        } else {
            let mut entry = end as u16;
            if value.is_null() {
                entry |= LONG_NULL;
            }
            if matches!(value, FieldValue::External(_)) {
                entry |= LONG_EXTERNAL;
            }
            let [high, low] = entry.to_be_bytes();
            buf[origin - (back + 2 * slot + 1)] = high;
            buf[origin - (back + 2 * slot)] = low;
        }
    }
    debug_assert_eq!(origin + end, total);
    Ok(EncodedRecord { origin, len: total })
}

/// End offset, NULL flag and EXTERNAL flag of a slot.
fn read_slot(
    rec: &RecordRef<'_>,
    back: usize,
    short: bool,
    slot: usize,
) -> Result<(usize, bool, bool)> {
    if short {
        let entry = rec.byte_before(back + slot)?;
        Ok(((entry & SHORT_END_MASK) as usize, entry & SHORT_NULL != 0, false))
    } else {
        let high = rec.byte_before(back + 2 * slot + 1)?;
        let low = rec.byte_before(back + 2 * slot)?;
        let entry = u16::from_be_bytes([high, low]);
        Ok((
            (entry & LONG_END_MASK) as usize,
            entry & LONG_NULL != 0,
            entry & LONG_EXTERNAL != 0,
        ))
    }
}

pub(crate) fn compute_offsets(
    rec: RecordRef<'_>,
    schema: &IndexSchema,
    offsets: &mut RecOffsets<'_>,
    view: Option<u8>,
) -> Result<()> {
    let header = RedundantHeader::read(&rec)?;
    let bits = header.info_bits();
    let state = classify(bits, schema).ok_or_else(|| {
        eyre!(
            "corrupt record: info bits {:#04x} impossible for index {}",
            bits,
            schema.name()
        )
    })?;

    let versioned = state.has_version_byte();
    let row_version = if versioned {
        Some(rec.byte_before(REC_N_OLD_EXTRA_BYTES + 1)?)
    } else {
        None
    };
    let n_slots = header.n_fields() as usize;
    let field_count = state.has_field_count().then_some(n_slots);
    let mut layout = RowLayout::decoded(schema, state, row_version, field_count)?;
    if let Some(view) = view {
        layout = layout.as_of(view);
    }
    ensure!(
        n_slots == layout.n_stored(),
        "corrupt record: header stores {} fields, index {} rows of this layout store {}",
        n_slots,
        schema.name(),
        layout.n_stored()
    );

    let short = header.one_byte_offsets();
    let back = table_back(versioned);
    offsets.prepare(schema.n_fields())?;

    let mut absent = 0;
    let mut end = 0usize;
    let mut any_external = false;
    for phys in 0..schema.n_fields() {
        let field = schema.physical_field(phys);
        let dropped = layout.is_dropped_in_view(phys);
        let presence = layout.presence(phys);
        let entry = match presence {
            Presence::NotYetAdded | Presence::Dropped => {
                absent += 1;
                let flag = if dropped || presence == Presence::Dropped {
                    flags::DROPPED
                } else {
                    flags::DEFAULT
                };
                end as u32 | flag
            }
            Presence::Present => {
                let (slot_end, is_null, is_external) = read_slot(&rec, back, short, phys - absent)?;
                ensure!(
                    slot_end >= end,
                    "corrupt record: end offset {} of field {} precedes {}",
                    slot_end,
                    field.name,
                    end
                );
                let len = slot_end - end;
                end = slot_end;
                let mut flag = 0;
                if is_null {
                    ensure!(
                        field.is_nullable() && len == field.sql_null_size() && !is_external,
                        "corrupt record: NULL field {} occupies {} bytes",
                        field.name,
                        len
                    );
                    flag = flags::SQL_NULL;
                } else if is_external {
                    ensure!(
                        field.is_big() && len >= EXTERN_FIELD_REF_SIZE,
                        "corrupt record: field {} cannot be external with {} bytes",
                        field.name,
                        len
                    );
                    flag = flags::EXTERNAL;
                } else if field.is_fixed() {
                    ensure!(
                        len == field.fixed_len(),
                        "corrupt record: fixed field {} occupies {} bytes, declared {}",
                        field.name,
                        len,
                        field.fixed_len()
                    );
                }
                if dropped {
                    flag = flags::DROPPED;
                }
                any_external |= flag == flags::EXTERNAL;
                end as u32 | flag
            }
        };
        offsets.set_entry(phys, entry);
    }

    ensure!(
        end <= rec.data().len(),
        "corrupt record: {} data bytes described, {} available after origin",
        end,
        rec.data().len()
    );
    offsets.set_header(back - 1 + n_slots * slot_width(short), false, any_external);
    offsets.set_layout(state, row_version);
    Ok(())
}

/// Slot of physical field `phys` in a record whose offsets were computed.
fn slot_of(schema: &IndexSchema, offsets: &RecOffsets<'_>, phys: usize) -> Result<usize> {
    let Some(state) = offsets.insert_state() else {
        bail!("offsets were not computed from a redundant record");
    };
    if state.is_prefix_shaped() {
        return Ok(phys);
    }
    let version = offsets.row_version().unwrap_or(0);
    Ok((0..phys)
        .filter(|&q| schema.physical_field(q).presence_in(version) == Presence::Present)
        .count())
}

/// Flips the NULL flag of a stored field's slot.
pub(crate) fn set_null_bit(
    rec: &mut RecordMut<'_>,
    schema: &IndexSchema,
    offsets: &RecOffsets<'_>,
    phys: usize,
    null: bool,
) -> Result<()> {
    let slot = slot_of(schema, offsets, phys)?;
    let header = RedundantHeader::read(&rec.as_record())?;
    let short = header.one_byte_offsets();
    let back = table_back(offsets.row_version().is_some());

    let (n, mask) = if short {
        (back + slot, SHORT_NULL)
    } else {
        (back + 2 * slot + 1, (LONG_NULL >> 8) as u8)
    };
    let byte = rec.byte_before_mut(n)?;
    if null {
        *byte |= mask;
    } else {
        *byte &= !mask;
    }
    Ok(())
}
