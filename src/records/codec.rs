//! # Record Codec
//!
//! Entry points shared by every engine component that reads or writes records.
//! The two on-disk formats sit behind the [`RecordCodec`] trait; a table picks
//! its implementation once through [`IndexSchema::codec`] and every call site
//! goes through it.
//!
//! | Operation | Result on bad input |
//! |-----------|---------------------|
//! | [`encode`], [`converted_size`] | `Err`: tuples come from callers |
//! | [`try_compute_offsets`], [`compute_offsets_as_of`] | `Err` rooted in `corrupt record` |
//! | [`compute_offsets`] | panics on corruption after logging it |
//!
//! Non-aborting checks for consistency tools live in
//! [`validate`](crate::records::validate).

use eyre::{bail, ensure, Result, WrapErr};
use smallvec::SmallVec;
use tracing::error;

use crate::config::{EXTERN_FIELD_REF_SIZE, MAX_RECORD_SIZE, REC_2BYTE_LEN_MAX};
use crate::records::compact;
use crate::records::dump::RecordDump;
use crate::records::header::{CompactHeader, RedundantHeader};
use crate::records::offsets::RecOffsets;
use crate::records::record::{EncodedRecord, RecordMut, RecordRef, RecordSize};
use crate::records::redundant;
use crate::records::schema::{FieldDef, IndexSchema, Presence, RecordFormat};
use crate::records::tuple::{FieldValue, Tuple};
use crate::records::version::RowLayout;

/// Format-specific half of the record codec.
pub trait RecordCodec: Send + Sync + std::fmt::Debug {
    fn format(&self) -> RecordFormat;

    /// Header and data sizes `encode` would produce.
    fn converted_size(
        &self,
        schema: &IndexSchema,
        tuple: &Tuple<'_>,
        version: u8,
    ) -> Result<RecordSize>;

    /// Encodes at the start of `buf`; the record's origin is in the result.
    fn encode(
        &self,
        schema: &IndexSchema,
        tuple: &Tuple<'_>,
        version: u8,
        buf: &mut [u8],
    ) -> Result<EncodedRecord>;

    /// Parses the header into `offsets`. With a `view`, columns dropped at or
    /// before it are reported as DROPPED.
    fn compute_offsets(
        &self,
        rec: RecordRef<'_>,
        schema: &IndexSchema,
        offsets: &mut RecOffsets<'_>,
        view: Option<u8>,
    ) -> Result<()>;

    fn info_bits(&self, rec: RecordRef<'_>) -> Result<u8>;

    fn heap_no(&self, rec: RecordRef<'_>) -> Result<u16>;

    fn set_delete_marked(&self, rec: &mut RecordMut<'_>, marked: bool) -> Result<()>;

    /// Flips the stored NULL flag of physical field `phys`.
    fn set_null_bit(
        &self,
        rec: &mut RecordMut<'_>,
        schema: &IndexSchema,
        offsets: &RecOffsets<'_>,
        phys: usize,
        null: bool,
    ) -> Result<()>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CompactCodec;

#[derive(Debug, Clone, Copy, Default)]
pub struct RedundantCodec;

static COMPACT: CompactCodec = CompactCodec;
static REDUNDANT: RedundantCodec = RedundantCodec;

pub fn codec_for(format: RecordFormat) -> &'static dyn RecordCodec {
    match format {
        RecordFormat::Compact => &COMPACT,
        RecordFormat::Redundant => &REDUNDANT,
    }
}

impl RecordCodec for CompactCodec {
    fn format(&self) -> RecordFormat {
        RecordFormat::Compact
    }

    fn converted_size(
        &self,
        schema: &IndexSchema,
        tuple: &Tuple<'_>,
        version: u8,
    ) -> Result<RecordSize> {
        compact::converted_size(schema, tuple, version)
    }

    fn encode(
        &self,
        schema: &IndexSchema,
        tuple: &Tuple<'_>,
        version: u8,
        buf: &mut [u8],
    ) -> Result<EncodedRecord> {
        compact::encode(schema, tuple, version, buf)
    }

    fn compute_offsets(
        &self,
        rec: RecordRef<'_>,
        schema: &IndexSchema,
        offsets: &mut RecOffsets<'_>,
        view: Option<u8>,
    ) -> Result<()> {
        compact::compute_offsets(rec, schema, offsets, view)
    }

    fn info_bits(&self, rec: RecordRef<'_>) -> Result<u8> {
        Ok(CompactHeader::read(&rec)?.info_bits())
    }

    fn heap_no(&self, rec: RecordRef<'_>) -> Result<u16> {
        Ok(CompactHeader::read(&rec)?.heap_no())
    }

    fn set_delete_marked(&self, rec: &mut RecordMut<'_>, marked: bool) -> Result<()> {
        CompactHeader::read_mut(rec)?.set_delete_marked(marked);
        Ok(())
    }

    fn set_null_bit(
        &self,
        _rec: &mut RecordMut<'_>,
        schema: &IndexSchema,
        _offsets: &RecOffsets<'_>,
        phys: usize,
        _null: bool,
    ) -> Result<()> {
        bail!(
            "compact record of index {} cannot change NULL state of field {} in place",
            schema.name(),
            schema.physical_field(phys).name
        )
    }
}

impl RecordCodec for RedundantCodec {
    fn format(&self) -> RecordFormat {
        RecordFormat::Redundant
    }

    fn converted_size(
        &self,
        schema: &IndexSchema,
        tuple: &Tuple<'_>,
        version: u8,
    ) -> Result<RecordSize> {
        redundant::converted_size(schema, tuple, version)
    }

    fn encode(
        &self,
        schema: &IndexSchema,
        tuple: &Tuple<'_>,
        version: u8,
        buf: &mut [u8],
    ) -> Result<EncodedRecord> {
        redundant::encode(schema, tuple, version, buf)
    }

    fn compute_offsets(
        &self,
        rec: RecordRef<'_>,
        schema: &IndexSchema,
        offsets: &mut RecOffsets<'_>,
        view: Option<u8>,
    ) -> Result<()> {
        redundant::compute_offsets(rec, schema, offsets, view)
    }

    fn info_bits(&self, rec: RecordRef<'_>) -> Result<u8> {
        Ok(RedundantHeader::read(&rec)?.info_bits())
    }

    fn heap_no(&self, rec: RecordRef<'_>) -> Result<u16> {
        Ok(RedundantHeader::read(&rec)?.heap_no())
    }

    fn set_delete_marked(&self, rec: &mut RecordMut<'_>, marked: bool) -> Result<()> {
        RedundantHeader::read_mut(rec)?.set_delete_marked(marked);
        Ok(())
    }

    fn set_null_bit(
        &self,
        rec: &mut RecordMut<'_>,
        schema: &IndexSchema,
        offsets: &RecOffsets<'_>,
        phys: usize,
        null: bool,
    ) -> Result<()> {
        redundant::set_null_bit(rec, schema, offsets, phys, null)
    }
}

pub(crate) type StoredFields<'a> = SmallVec<[(&'a FieldDef, FieldValue<'a>); 16]>;

/// Fields a row stores, in physical order, paired with their tuple values.
pub(crate) fn stored_fields<'a>(
    schema: &'a IndexSchema,
    layout: &RowLayout<'_>,
    tuple: &'a Tuple<'_>,
) -> StoredFields<'a> {
    (0..schema.n_fields())
        .filter(|&phys| layout.presence(phys) == Presence::Present)
        .map(|phys| {
            (
                schema.physical_field(phys),
                tuple.value(schema.logical_pos(phys)),
            )
        })
        .collect()
}

/// Checks that `value` can be stored in `field`.
pub(crate) fn check_value(
    schema: &IndexSchema,
    field: &FieldDef,
    value: FieldValue<'_>,
) -> Result<()> {
    match value {
        FieldValue::Default => bail!(
            "field {} of index {} has no value",
            field.name,
            schema.name()
        ),
        FieldValue::Null => ensure!(
            field.is_nullable(),
            "field {} of index {} is NOT NULL",
            field.name,
            schema.name()
        ),
        FieldValue::Data(bytes) => {
            if field.is_fixed() {
                ensure!(
                    bytes.len() == field.fixed_len(),
                    "field {} of index {} is fixed {} bytes, got {}",
                    field.name,
                    schema.name(),
                    field.fixed_len(),
                    bytes.len()
                );
            } else {
                ensure!(
                    bytes.len() as u64 <= field.max_len() as u64,
                    "field {} of index {} holds at most {} bytes, got {}",
                    field.name,
                    schema.name(),
                    field.max_len(),
                    bytes.len()
                );
                ensure!(
                    bytes.len() <= REC_2BYTE_LEN_MAX,
                    "field {} of index {} needs external storage for {} bytes",
                    field.name,
                    schema.name(),
                    bytes.len()
                );
            }
        }
        FieldValue::External(bytes) => {
            ensure!(
                field.is_big() && !field.is_fixed(),
                "field {} of index {} cannot be stored externally",
                field.name,
                schema.name()
            );
            ensure!(
                bytes.len() >= EXTERN_FIELD_REF_SIZE && bytes.len() <= REC_2BYTE_LEN_MAX,
                "external field {} of index {} has {} local bytes",
                field.name,
                schema.name(),
                bytes.len()
            );
        }
    }
    Ok(())
}

/// Rejects records too large for two of them to share a page.
pub(crate) fn check_record_size(schema: &IndexSchema, size: RecordSize) -> Result<RecordSize> {
    ensure!(
        size.total() <= MAX_RECORD_SIZE,
        "record of {} bytes for index {} exceeds the {}-byte record limit",
        size.total(),
        schema.name(),
        MAX_RECORD_SIZE
    );
    Ok(size)
}

/// Size of the record `encode` would produce for `tuple` at `version`.
pub fn converted_size(schema: &IndexSchema, tuple: &Tuple<'_>, version: u8) -> Result<RecordSize> {
    schema
        .codec()
        .converted_size(schema, tuple, version)
        .wrap_err_with(|| {
            format!(
                "sizing record for index {} (table {})",
                schema.name(),
                schema.table_id()
            )
        })
}

/// Encodes `tuple` as a row of `version` at the start of `buf`.
pub fn encode(
    schema: &IndexSchema,
    tuple: &Tuple<'_>,
    version: u8,
    buf: &mut [u8],
) -> Result<EncodedRecord> {
    schema
        .codec()
        .encode(schema, tuple, version, buf)
        .wrap_err_with(|| {
            format!(
                "encoding record for index {} (table {})",
                schema.name(),
                schema.table_id()
            )
        })
}

/// Parses `rec` into `offsets`, returning corruption as an error.
pub fn try_compute_offsets(
    rec: RecordRef<'_>,
    schema: &IndexSchema,
    offsets: &mut RecOffsets<'_>,
) -> Result<()> {
    schema
        .codec()
        .compute_offsets(rec, schema, offsets, None)
        .wrap_err_with(|| decode_context(rec, schema))
}

/// Like [`try_compute_offsets`], reporting columns dropped at or before
/// `view` as DROPPED.
pub fn compute_offsets_as_of(
    rec: RecordRef<'_>,
    schema: &IndexSchema,
    offsets: &mut RecOffsets<'_>,
    view: u8,
) -> Result<()> {
    schema
        .codec()
        .compute_offsets(rec, schema, offsets, Some(view))
        .wrap_err_with(|| decode_context(rec, schema))
}

/// Parses `rec` into `offsets`. A corrupt record aborts: the page it came
/// from cannot be trusted.
pub fn compute_offsets(rec: RecordRef<'_>, schema: &IndexSchema, offsets: &mut RecOffsets<'_>) {
    if let Err(err) = try_compute_offsets(rec, schema, offsets) {
        error!(
            target: "pagerec::codec",
            index = schema.name(),
            table_id = schema.table_id(),
            n_fields = schema.n_fields(),
            error = %err.root_cause(),
            "record decode failed"
        );
        panic!("{:?}", err);
    }
}

/// Whether `err` reports on-disk corruption rather than a caller error.
pub fn is_corruption(err: &eyre::Report) -> bool {
    err.chain()
        .any(|cause| cause.to_string().starts_with("corrupt record"))
}

fn decode_context(rec: RecordRef<'_>, schema: &IndexSchema) -> String {
    format!(
        "decoding record of index {} (table {}): {}",
        schema.name(),
        schema.table_id(),
        RecordDump::raw(rec)
    )
}
