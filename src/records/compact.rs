//! # Compact Record Format
//!
//! The new on-disk format. Field data follows the origin in physical order;
//! the header in front of it is read backwards:
//!
//! ```text
//!  lower addresses                                               origin
//!  +-----------------+-------------+-------+----------------+-----+---------+
//!  | lengths (rev.)  | null bitmap | affix | extra (5 bytes)|     | data... |
//!  +-----------------+-------------+-------+----------------+-----+---------+
//!   <- read direction
//! ```
//!
//! - **affix**: nothing, one version byte, or a 1-2 byte legacy field count,
//!   as decided by the row's insert state. A 2-byte count stores
//!   `0x80 | count >> 8` nearest the origin and `count & 0xFF` before it.
//! - **null bitmap**: `ceil(n_nullable / 8)` bytes. Bit `j` of the nullable
//!   fields the row stores lives in the `j / 8`-th byte counting back from the
//!   affix, mask `1 << (j % 8)`.
//! - **lengths**: one entry per stored, non-NULL variable-length field. An
//!   entry is one byte unless the field is big and the value is 128 bytes or
//!   longer (or stored externally); then it is two bytes, the first holding
//!   `0x80 | 0x40 (external) | len >> 8` and the second `len & 0xFF`.
//!
//! NULL fields take no data bytes. Fixed-length fields have no length entry.
//!
//! ## Temp Records
//!
//! Sort buffers and bulk loads use a variant without extra bytes or affix. A
//! temp record stores every field that is not instantly dropped, with
//! defaults materialized; the null bitmap covers every nullable stored field.

use eyre::{ensure, eyre, Result};
use zerocopy::IntoBytes;

use crate::config::{
    EXTERN_FIELD_REF_SIZE, REC_1BYTE_LEN_MAX, REC_N_FIELDS_TWO_BYTES_FLAG, REC_N_NEW_EXTRA_BYTES,
};
use crate::records::codec::{check_record_size, check_value, stored_fields, StoredFields};
use crate::records::header::{CompactHeader, RecordStatus};
use crate::records::offsets::{flags, RecOffsets};
use crate::records::record::{EncodedRecord, RecordRef, RecordSize};
use crate::records::schema::{FieldDef, IndexSchema, Presence};
use crate::records::tuple::{FieldValue, Tuple};
use crate::records::version::{classify, HeaderAffix, RowLayout};

const LEN_TWO_BYTES: u8 = 0x80;
const LEN_EXTERNAL: u8 = 0x40;
const LEN_HIGH_MASK: u8 = 0x3F;

fn length_bytes(field: &FieldDef, value: FieldValue<'_>) -> usize {
    if field.is_fixed() {
        return 0;
    }
    match value {
        FieldValue::Null | FieldValue::Default => 0,
        FieldValue::External(_) => 2,
        FieldValue::Data(bytes) => {
            if field.is_big() && bytes.len() > REC_1BYTE_LEN_MAX {
                2
            } else {
                1
            }
        }
    }
}

/// Length-table and data sizes of the stored fields.
fn body_size(schema: &IndexSchema, stored: &StoredFields<'_>) -> Result<(usize, usize)> {
    let mut len_bytes = 0;
    let mut data = 0;
    for &(field, value) in stored {
        check_value(schema, field, value)?;
        len_bytes += length_bytes(field, value);
        data += value.bytes().map_or(0, <[u8]>::len);
    }
    Ok((len_bytes, data))
}

/// Writes the null bitmap, length table and data. `nulls_back` is the
/// distance from the origin of the first bitmap byte.
fn write_body(
    buf: &mut [u8],
    origin: usize,
    nulls_back: usize,
    n_nullable: usize,
    stored: &StoredFields<'_>,
) -> usize {
    let null_bytes = n_nullable.div_ceil(8);
    for i in 0..null_bytes {
        buf[origin - nulls_back - i] = 0;
    }
    let mut lens_back = nulls_back + null_bytes;
    let mut null_idx = 0;
    let mut end = origin;

    for &(field, value) in stored {
        if field.is_nullable() {
            let bit = null_idx;
            null_idx += 1;
            if value.is_null() {
                buf[origin - nulls_back - bit / 8] |= 1 << (bit % 8);
                continue;
            }
        }
        let bytes = value.bytes().unwrap_or_default();
        if !field.is_fixed() {
            let len = bytes.len();
            if length_bytes(field, value) == 2 {
                let mut high = LEN_TWO_BYTES | (len >> 8) as u8;
                if matches!(value, FieldValue::External(_)) {
                    high |= LEN_EXTERNAL;
                }
                buf[origin - lens_back] = high;
                buf[origin - lens_back - 1] = len as u8;
                lens_back += 2;
            } else {
                buf[origin - lens_back] = len as u8;
                lens_back += 1;
            }
        }
        buf[end..end + bytes.len()].copy_from_slice(bytes);
        end += bytes.len();
    }
    end
}

fn header_base(layout: &RowLayout<'_>) -> usize {
    REC_N_NEW_EXTRA_BYTES + layout.affix_len()
}

fn record_size(
    schema: &IndexSchema,
    layout: &RowLayout<'_>,
    stored: &StoredFields<'_>,
) -> Result<RecordSize> {
    let (len_bytes, data) = body_size(schema, stored)?;
    let size = RecordSize {
        extra: header_base(layout) + layout.n_nullable().div_ceil(8) + len_bytes,
        data,
    };
    check_record_size(schema, size)
}

pub(crate) fn converted_size(
    schema: &IndexSchema,
    tuple: &Tuple<'_>,
    version: u8,
) -> Result<RecordSize> {
    let layout = RowLayout::plan(schema, tuple, version)?;
    let stored = stored_fields(schema, &layout, tuple);
    record_size(schema, &layout, &stored)
}

pub(crate) fn encode(
    schema: &IndexSchema,
    tuple: &Tuple<'_>,
    version: u8,
    buf: &mut [u8],
) -> Result<EncodedRecord> {
    let layout = RowLayout::plan(schema, tuple, version)?;
    let stored = stored_fields(schema, &layout, tuple);
    let size = record_size(schema, &layout, &stored)?;
    let base = header_base(&layout);
    let origin = size.extra;
    let total = size.total();
    ensure!(
        total <= buf.len(),
        "record of {} bytes does not fit in a {}-byte buffer",
        total,
        buf.len()
    );

    let header = CompactHeader::new(layout.state().info_bits(), RecordStatus::Ordinary);
    buf[origin - REC_N_NEW_EXTRA_BYTES..origin].copy_from_slice(header.as_bytes());

    let affix_back = REC_N_NEW_EXTRA_BYTES + 1;
    match layout.state().affix() {
        HeaderAffix::None => {}
        HeaderAffix::VersionByte => {
            buf[origin - affix_back] = layout.row_version().unwrap_or(0);
        }
        HeaderAffix::FieldCount => {
            let count = layout.prefix_fields();
            if layout.affix_len() == 1 {
                buf[origin - affix_back] = count as u8;
            } else {
                buf[origin - affix_back] = REC_N_FIELDS_TWO_BYTES_FLAG | (count >> 8) as u8;
                buf[origin - affix_back - 1] = count as u8;
            }
        }
    }

    let end = write_body(buf, origin, base + 1, layout.n_nullable(), &stored);
    debug_assert_eq!(end, total);
    Ok(EncodedRecord { origin, len: total })
}

/// Walks the null bitmap and length table, filling `offsets`. Returns the
/// number of header bytes consumed and whether any field is external.
fn read_body(
    rec: &RecordRef<'_>,
    schema: &IndexSchema,
    offsets: &mut RecOffsets<'_>,
    nulls_back: usize,
    n_nullable: usize,
    presence: impl Fn(usize) -> (Presence, bool),
) -> Result<(usize, bool)> {
    let mut lens_back = nulls_back + n_nullable.div_ceil(8);
    let mut null_idx = 0;
    let mut end = 0usize;
    let mut any_external = false;

    for phys in 0..schema.n_fields() {
        let field = schema.physical_field(phys);
        let (stored, dropped) = presence(phys);
        let entry = match stored {
            Presence::NotYetAdded if dropped => end as u32 | flags::DROPPED,
            Presence::NotYetAdded => end as u32 | flags::DEFAULT,
            Presence::Dropped => end as u32 | flags::DROPPED,
            Presence::Present => {
                let mut is_null = false;
                if field.is_nullable() {
                    let bit = null_idx;
                    null_idx += 1;
                    is_null = rec.byte_before(nulls_back + bit / 8)? & (1 << (bit % 8)) != 0;
                }
                let mut flag = 0;
                if is_null {
                    flag = flags::SQL_NULL;
                } else if field.is_fixed() {
                    end += field.fixed_len();
                } else {
                    let first = rec.byte_before(lens_back)?;
                    lens_back += 1;
                    let len = if field.is_big() && first & LEN_TWO_BYTES != 0 {
                        let second = rec.byte_before(lens_back)?;
                        lens_back += 1;
                        let len = ((first & LEN_HIGH_MASK) as usize) << 8 | second as usize;
                        if first & LEN_EXTERNAL != 0 {
                            ensure!(
                                len >= EXTERN_FIELD_REF_SIZE,
                                "corrupt record: external field {} holds {} bytes, \
                                 reference needs {}",
                                field.name,
                                len,
                                EXTERN_FIELD_REF_SIZE
                            );
                            flag = flags::EXTERNAL;
                        }
                        len
                    } else {
                        first as usize
                    };
                    end += len;
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
    Ok((lens_back - 1, any_external))
}

pub(crate) fn compute_offsets(
    rec: RecordRef<'_>,
    schema: &IndexSchema,
    offsets: &mut RecOffsets<'_>,
    view: Option<u8>,
) -> Result<()> {
    let header = CompactHeader::read(&rec)?;
    ensure!(
        header.status().is_some(),
        "corrupt record: invalid status bits in heap number {}",
        header.heap_no()
    );
    let bits = header.info_bits();
    let state = classify(bits, schema).ok_or_else(|| {
        eyre!(
            "corrupt record: info bits {:#04x} impossible for index {}",
            bits,
            schema.name()
        )
    })?;

    let mut back = REC_N_NEW_EXTRA_BYTES + 1;
    let (row_version, field_count) = match state.affix() {
        HeaderAffix::None => (None, None),
        HeaderAffix::VersionByte => {
            let version = rec.byte_before(back)?;
            back += 1;
            (Some(version), None)
        }
        HeaderAffix::FieldCount => {
            let first = rec.byte_before(back)?;
            back += 1;
            if first & REC_N_FIELDS_TWO_BYTES_FLAG != 0 {
                let second = rec.byte_before(back)?;
                back += 1;
                let high = (first & !REC_N_FIELDS_TWO_BYTES_FLAG) as usize;
                let count = high << 8 | second as usize;
                (None, Some(count))
            } else {
                (None, Some(first as usize))
            }
        }
    };

    let mut layout = RowLayout::decoded(schema, state, row_version, field_count)?;
    if let Some(view) = view {
        layout = layout.as_of(view);
    }

    offsets.prepare(schema.n_fields())?;
    let (extra, any_external) = read_body(
        &rec,
        schema,
        offsets,
        back,
        layout.n_nullable(),
        |phys| (layout.presence(phys), layout.is_dropped_in_view(phys)),
    )?;
    offsets.set_header(extra, true, any_external);
    offsets.set_layout(state, row_version);
    Ok(())
}

fn temp_fields<'a>(schema: &'a IndexSchema, tuple: &'a Tuple<'_>) -> StoredFields<'a> {
    (0..schema.n_fields())
        .filter(|&phys| !schema.physical_field(phys).is_instant_dropped())
        .map(|phys| {
            let field = schema.physical_field(phys);
            let value = match tuple.value(schema.logical_pos(phys)) {
                FieldValue::Default => FieldValue::from_option(field.default_value()),
                other => other,
            };
            (field, value)
        })
        .collect()
}

fn temp_nullable(schema: &IndexSchema) -> usize {
    schema
        .fields()
        .iter()
        .filter(|f| f.is_nullable() && !f.is_instant_dropped())
        .count()
}

/// Size of a temp record; `extra` counts the null bitmap and length table.
pub fn temp_size(schema: &IndexSchema, tuple: &Tuple<'_>) -> Result<RecordSize> {
    ensure!(
        tuple.len() <= schema.n_fields(),
        "tuple has {} fields, index {} has {}",
        tuple.len(),
        schema.name(),
        schema.n_fields()
    );
    let (len_bytes, data) = body_size(schema, &temp_fields(schema, tuple))?;
    Ok(RecordSize {
        extra: temp_nullable(schema).div_ceil(8) + len_bytes,
        data,
    })
}

/// Encodes a temp record at the start of `buf`.
pub fn encode_temp(
    schema: &IndexSchema,
    tuple: &Tuple<'_>,
    buf: &mut [u8],
) -> Result<EncodedRecord> {
    let size = temp_size(schema, tuple)?;
    ensure!(
        size.total() <= buf.len(),
        "temp record of {} bytes does not fit in a {}-byte buffer",
        size.total(),
        buf.len()
    );
    let origin = size.extra;
    write_body(
        buf,
        origin,
        1,
        temp_nullable(schema),
        &temp_fields(schema, tuple),
    );
    Ok(EncodedRecord {
        origin,
        len: size.total(),
    })
}

/// Offsets of a temp record. Instantly dropped fields report DROPPED.
pub fn compute_offsets_temp(
    rec: RecordRef<'_>,
    schema: &IndexSchema,
    offsets: &mut RecOffsets<'_>,
) -> Result<()> {
    offsets.prepare(schema.n_fields())?;
    let (extra, any_external) = read_body(
        &rec,
        schema,
        offsets,
        1,
        temp_nullable(schema),
        |phys| {
            if schema.physical_field(phys).is_instant_dropped() {
                (Presence::Dropped, true)
            } else {
                (Presence::Present, false)
            }
        },
    )?;
    offsets.set_header(extra, true, any_external);
    Ok(())
}
