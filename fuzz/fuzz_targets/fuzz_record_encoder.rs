//! Fuzz testing for the record encoder.
//!
//! Arbitrary tuples are encoded in both formats. Whatever the encoder
//! accepts must decode back to the same values.

#![no_main]

use arbitrary::Arbitrary;
use libfuzzer_sys::fuzz_target;

use pagerec::records::{
    compute_offsets, converted_size, encode, get, Field, FieldDef, FieldValue, IndexSchema,
    RecOffsets, RecordFormat, Tuple,
};

#[derive(Debug, Arbitrary)]
struct EncoderInput {
    redundant: bool,
    columns: Vec<FuzzColumn>,
}

#[derive(Debug, Arbitrary)]
struct FuzzColumn {
    fixed: Option<u8>,
    nullable: bool,
    value: Option<Vec<u8>>,
}

fuzz_target!(|input: EncoderInput| {
    if input.columns.is_empty() || input.columns.len() > 64 {
        return;
    }
    let format = if input.redundant {
        RecordFormat::Redundant
    } else {
        RecordFormat::Compact
    };

    let fields = input
        .columns
        .iter()
        .enumerate()
        .map(|(i, c)| {
            let def = match c.fixed {
                Some(len) if len > 0 => FieldDef::fixed(format!("c{}", i), len as u16),
                _ => FieldDef::variable(format!("c{}", i), 512),
            };
            if c.nullable {
                def.nullable()
            } else {
                def
            }
        })
        .collect();
    let Ok(schema) = IndexSchema::new(1, "fuzz", format, fields) else {
        return;
    };

    let tuple: Tuple<'_> = input
        .columns
        .iter()
        .map(|c| FieldValue::from_option(c.value.as_deref()))
        .collect();
    let Ok(size) = converted_size(&schema, &tuple, 0) else {
        return;
    };
    let mut buf = vec![0u8; size.total()];
    let enc = encode(&schema, &tuple, 0, &mut buf).expect("sized tuple encodes");

    let rec = enc.record(&buf).expect("encoded record");
    let mut offsets = RecOffsets::new();
    compute_offsets(rec, &schema, &mut offsets);
    for (n, c) in input.columns.iter().enumerate() {
        let expected = match &c.value {
            Some(bytes) => Field::Data(bytes),
            None => Field::Null,
        };
        assert_eq!(get(rec, &schema, &offsets, n), expected);
    }
});
