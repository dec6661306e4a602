//! Fuzz testing for the record decoder.
//!
//! Arbitrary bytes are decoded against a small fixed set of schemas. The
//! validating path must never panic, and anything it accepts must be
//! readable field by field and dumpable.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use pagerec::memory::ScratchArena;
use pagerec::records::{
    get, try_compute_offsets, validate_record, FieldDef, IndexSchema, RecOffsets, RecordDump,
    RecordFormat, RecordRef,
};

#[derive(Debug, Arbitrary)]
struct DecoderInput {
    redundant: bool,
    shape: FuzzShape,
    origin: u16,
    bytes: Vec<u8>,
}

#[derive(Debug, Arbitrary, Clone, Copy)]
enum FuzzShape {
    Plain,
    Versioned,
    Legacy,
    Upgraded,
}

fn schema(format: RecordFormat, shape: FuzzShape) -> Option<IndexSchema> {
    let mut fields = vec![
        FieldDef::fixed("id", 4),
        FieldDef::variable("name", 300).nullable(),
        FieldDef::blob("body").nullable(),
    ];
    if matches!(shape, FuzzShape::Versioned | FuzzShape::Upgraded) {
        fields[1] = fields[1].clone().dropped_in(2);
        fields.push(FieldDef::fixed("score", 2).added_in(1).with_default(vec![0, 1]));
    }
    let schema = IndexSchema::new(1, "fuzz", format, fields).ok()?;
    match shape {
        FuzzShape::Legacy | FuzzShape::Upgraded => schema.with_legacy_instant(1).ok(),
        _ => Some(schema),
    }
}

fuzz_target!(|input: DecoderInput| {
    let format = if input.redundant {
        RecordFormat::Redundant
    } else {
        RecordFormat::Compact
    };
    let Some(schema) = schema(format, input.shape) else {
        return;
    };
    if input.bytes.is_empty() {
        return;
    }
    let origin = input.origin as usize % (input.bytes.len() + 1);
    let Ok(rec) = RecordRef::new(&input.bytes, origin) else {
        return;
    };

    if !validate_record(rec, &schema) {
        return;
    }

    let arena = ScratchArena::new();
    let mut offsets = RecOffsets::with_arena(&arena);
    if try_compute_offsets(rec, &schema, &mut offsets).is_ok() {
        for n in 0..schema.n_fields() {
            let _ = get(rec, &schema, &offsets, n);
        }
        let _ = RecordDump::decoded(rec, &schema, &offsets).to_string();
    }
});
