//! Scenario tests for the records module

use super::*;
use crate::memory::ScratchArena;

const FORMATS: [RecordFormat; 2] = [RecordFormat::Compact, RecordFormat::Redundant];

fn be32(v: u32) -> [u8; 4] {
    v.to_be_bytes()
}

#[test]
fn added_column_decodes_as_default_then_dropped_in_later_view() {
    let seven = be32(7);
    for format in FORMATS {
        let before_drop = IndexSchema::new(
            10,
            "PRIMARY",
            format,
            vec![
                FieldDef::fixed("a", 4),
                FieldDef::variable("b", 40).nullable(),
                FieldDef::variable("c", 40).nullable().added_in(1),
            ],
        )
        .unwrap();
        let tuple = Tuple::from(vec![FieldValue::Data(&seven), FieldValue::Null]);
        let mut buf = [0u8; 64];
        let enc = encode(&before_drop, &tuple, 0, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();

        let mut offsets = RecOffsets::new();
        compute_offsets(rec, &before_drop, &mut offsets);
        assert_eq!(get(rec, &before_drop, &offsets, 0), Field::Data(&seven));
        assert_eq!(get(rec, &before_drop, &offsets, 1), Field::Null);
        assert_eq!(get(rec, &before_drop, &offsets, 2), Field::Default(None));

        let after_drop = IndexSchema::new(
            10,
            "PRIMARY",
            format,
            vec![
                FieldDef::fixed("a", 4),
                FieldDef::variable("b", 40).nullable(),
                FieldDef::variable("c", 40).nullable().added_in(1).dropped_in(2),
            ],
        )
        .unwrap();
        compute_offsets_as_of(rec, &after_drop, &mut offsets, 2).unwrap();
        assert_eq!(get(rec, &after_drop, &offsets, 0), Field::Data(&seven));
        assert_eq!(get(rec, &after_drop, &offsets, 1), Field::Null);
        assert_eq!(get(rec, &after_drop, &offsets, 2), Field::Dropped);

        compute_offsets(rec, &after_drop, &mut offsets);
        assert_eq!(get(rec, &after_drop, &offsets, 2), Field::Default(None));
    }
}

#[test]
fn column_added_in_the_middle_is_stored_last() {
    let id = be32(1);
    for format in FORMATS {
        let schema = IndexSchema::new(
            11,
            "PRIMARY",
            format,
            vec![
                FieldDef::fixed("id", 4),
                FieldDef::variable("x", 16).nullable().added_in(1),
                FieldDef::variable("name", 16),
            ],
        )
        .unwrap();

        let tuple = Tuple::from(vec![
            FieldValue::Data(&id),
            FieldValue::Data(b"new"),
            FieldValue::Data(b"bob"),
        ]);
        let mut buf = [0u8; 64];
        let enc = encode(&schema, &tuple, 1, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();
        assert_eq!(&rec.data()[4..], b"bobnew");

        let mut offsets = RecOffsets::new();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(b"new"));
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(b"bob"));
        assert_eq!(get_physical(rec, &schema, &offsets, 1), Field::Data(b"bob"));

        let old = Tuple::from(vec![
            FieldValue::Data(&id),
            FieldValue::Default,
            FieldValue::Data(b"bob"),
        ]);
        let enc = encode(&schema, &old, 0, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Default(None));
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(b"bob"));
    }
}

#[test]
fn added_column_default_is_served_for_old_rows() {
    let schema = IndexSchema::new(
        12,
        "PRIMARY",
        RecordFormat::Compact,
        vec![
            FieldDef::fixed("id", 4),
            FieldDef::fixed("flag", 1).added_in(1).with_default(vec![1]),
        ],
    )
    .unwrap();
    let id = be32(3);
    let tuple = Tuple::from(vec![FieldValue::Data(&id)]);
    let mut buf = [0u8; 32];
    let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();
    let rec = enc.record(&buf).unwrap();

    let mut offsets = RecOffsets::new();
    compute_offsets(rec, &schema, &mut offsets);
    let flag = get(rec, &schema, &offsets, 1);
    assert_eq!(flag, Field::Default(Some(&[1][..])));
    assert_eq!(flag.value(), Some(&[1][..]));
}

#[test]
fn dropped_column_keeps_consuming_bytes_in_older_rows() {
    let a = be32(5);
    for format in FORMATS {
        let schema = IndexSchema::new(
            13,
            "PRIMARY",
            format,
            vec![
                FieldDef::fixed("a", 4),
                FieldDef::variable("b", 20).nullable().dropped_in(2),
                FieldDef::fixed("c", 2),
                FieldDef::variable("d", 20).nullable().added_in(1),
            ],
        )
        .unwrap();

        let v1 = Tuple::from(vec![
            FieldValue::Data(&a),
            FieldValue::Data(b"zz"),
            FieldValue::Data(&[1, 2]),
            FieldValue::Null,
        ]);
        let mut buf = [0u8; 64];
        let enc = encode(&schema, &v1, 1, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();

        let mut offsets = RecOffsets::new();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(offsets.row_version(), Some(1));
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(b"zz"));

        compute_offsets_as_of(rec, &schema, &mut offsets, 2).unwrap();
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Dropped);
        assert_eq!(offsets.stored_len(1), 2);
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(&[1, 2]));
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Null);

        let v2 = Tuple::from(vec![
            FieldValue::Data(&a),
            FieldValue::Default,
            FieldValue::Data(&[3, 4]),
            FieldValue::Data(b"dd"),
        ]);
        let enc = encode(&schema, &v2, 2, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Dropped);
        assert_eq!(offsets.stored_len(1), 0);
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(&[3, 4]));
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Data(b"dd"));
    }
}

#[test]
fn dropped_column_rejects_data_in_new_rows() {
    let schema = IndexSchema::new(
        14,
        "PRIMARY",
        RecordFormat::Compact,
        vec![
            FieldDef::fixed("a", 4),
            FieldDef::variable("b", 20).nullable().dropped_in(1),
        ],
    )
    .unwrap();
    let a = be32(1);
    let tuple = Tuple::from(vec![FieldValue::Data(&a), FieldValue::Data(b"late")]);
    let mut buf = [0u8; 32];
    let err = encode(&schema, &tuple, 1, &mut buf).unwrap_err();
    assert!(!is_corruption(&err));
}

#[test]
fn upgraded_table_reads_rows_from_every_era() {
    let a = be32(9);
    for format in FORMATS {
        let schema = IndexSchema::new(
            15,
            "PRIMARY",
            format,
            vec![
                FieldDef::fixed("a", 4),
                FieldDef::variable("b", 20).nullable(),
                FieldDef::variable("c", 20).nullable(),
                FieldDef::variable("d", 20).nullable().added_in(1),
            ],
        )
        .unwrap()
        .with_legacy_instant(2)
        .unwrap();
        let mut buf = [0u8; 64];
        let mut offsets = RecOffsets::new();

        let core = Tuple::from(vec![FieldValue::Data(&a), FieldValue::Data(b"b0")]);
        let enc = encode(&schema, &core, 0, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(
            offsets.insert_state(),
            Some(InsertState::UpgradedBeforeFirstChange)
        );
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(b"b0"));
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Default(None));
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Default(None));

        let legacy = Tuple::from(vec![
            FieldValue::Data(&a),
            FieldValue::Null,
            FieldValue::Data(b"cc"),
        ]);
        let enc = encode(&schema, &legacy, 0, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(offsets.insert_state(), Some(InsertState::LegacyAfterFirstAdd));
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Null);
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(b"cc"));
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Default(None));

        let current = Tuple::from(vec![
            FieldValue::Data(&a),
            FieldValue::Data(b"b1"),
            FieldValue::Null,
            FieldValue::Data(b"dd"),
        ]);
        let enc = encode(&schema, &current, 1, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(
            offsets.insert_state(),
            Some(InsertState::VersionedAfterFirstChange)
        );
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Null);
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Data(b"dd"));
    }
}

#[test]
fn legacy_rows_decode_after_a_second_instant_add() {
    let first = IndexSchema::new(
        16,
        "PRIMARY",
        RecordFormat::Compact,
        vec![
            FieldDef::fixed("a", 4),
            FieldDef::variable("b", 20).nullable(),
        ],
    )
    .unwrap()
    .with_legacy_instant(1)
    .unwrap();
    let a = be32(2);
    let tuple = Tuple::from(vec![FieldValue::Data(&a), FieldValue::Data(b"bb")]);
    let mut buf = [0u8; 64];
    let enc = encode(&first, &tuple, 0, &mut buf).unwrap();

    let second = IndexSchema::new(
        16,
        "PRIMARY",
        RecordFormat::Compact,
        vec![
            FieldDef::fixed("a", 4),
            FieldDef::variable("b", 20).nullable(),
            FieldDef::variable("c", 20).nullable(),
        ],
    )
    .unwrap()
    .with_legacy_instant(1)
    .unwrap();
    let rec = enc.record(&buf).unwrap();
    let mut offsets = RecOffsets::new();
    compute_offsets(rec, &second, &mut offsets);
    assert_eq!(get(rec, &second, &offsets, 1), Field::Data(b"bb"));
    assert_eq!(get(rec, &second, &offsets, 2), Field::Default(None));
}

#[test]
fn wide_legacy_row_uses_two_byte_field_count() {
    let mut fields = vec![FieldDef::fixed("f0", 1)];
    fields.extend((1..200).map(|i| FieldDef::variable(format!("f{}", i), 4).nullable()));
    let schema = IndexSchema::new(17, "wide", RecordFormat::Compact, fields)
        .unwrap()
        .with_legacy_instant(1)
        .unwrap();

    let payload: Vec<[u8; 1]> = (0..200u32).map(|i| [i as u8]).collect();
    let tuple: Tuple<'_> = payload.iter().map(|p| FieldValue::Data(&p[..])).collect();
    let mut buf = vec![0u8; 1024];
    let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();
    let origin = enc.origin;
    assert_eq!(buf[origin - 6], 0x80);
    assert_eq!(buf[origin - 7], 200);

    let arena = ScratchArena::new();
    let mut offsets = RecOffsets::with_arena(&arena);
    let rec = enc.record(&buf).unwrap();
    compute_offsets(rec, &schema, &mut offsets);
    assert_eq!(offsets.n_fields(), 200);
    assert_eq!(get(rec, &schema, &offsets, 199), Field::Data(&[199]));
    assert_eq!(get(rec, &schema, &offsets, 0), Field::Data(&[0]));
}

#[test]
fn wide_index_without_arena_is_an_error() {
    let fields = (0..120).map(|i| FieldDef::fixed(format!("f{}", i), 1)).collect();
    let schema = IndexSchema::new(18, "wide", RecordFormat::Redundant, fields).unwrap();
    let payload = [7u8; 120];
    let tuple: Tuple<'_> = payload.chunks(1).map(FieldValue::Data).collect();
    let mut buf = vec![0u8; 512];
    let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();

    let mut offsets = RecOffsets::new();
    let err = try_compute_offsets(enc.record(&buf).unwrap(), &schema, &mut offsets).unwrap_err();
    assert!(!is_corruption(&err));

    let arena = ScratchArena::new();
    let mut offsets = RecOffsets::with_arena(&arena);
    try_compute_offsets(enc.record(&buf).unwrap(), &schema, &mut offsets).unwrap();
    assert_eq!(offsets.data_size(), 120);
}

#[test]
fn null_bitmap_spans_multiple_bytes() {
    let fields = (0..10)
        .map(|i| FieldDef::fixed(format!("n{}", i), 1).nullable())
        .collect();
    let schema = IndexSchema::new(19, "PRIMARY", RecordFormat::Compact, fields).unwrap();
    let values = [[0u8], [1], [2], [3], [4], [5], [6], [7], [8], [9]];
    let tuple: Tuple<'_> = values
        .iter()
        .enumerate()
        .map(|(i, v)| {
            if matches!(i, 0 | 7 | 8 | 9) {
                FieldValue::Null
            } else {
                FieldValue::Data(&v[..])
            }
        })
        .collect();
    let mut buf = [0u8; 32];
    let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();
    let origin = enc.origin;
    assert_eq!(buf[origin - 6], 0x81);
    assert_eq!(buf[origin - 7], 0x03);

    let rec = enc.record(&buf).unwrap();
    let mut offsets = RecOffsets::new();
    compute_offsets(rec, &schema, &mut offsets);
    assert_eq!(get(rec, &schema, &offsets, 3), Field::Data(&[3]));
    assert_eq!(get(rec, &schema, &offsets, 8), Field::Null);
    assert_eq!(offsets.data_size(), 6);
}

#[test]
fn external_field_exposes_its_reference() {
    let reference = ExternRef::new(2, 512, 96, 1_000_000);
    let value = reference.with_prefix(b"0123456789");
    let id = be32(4);
    for format in FORMATS {
        let schema = IndexSchema::new(
            20,
            "PRIMARY",
            format,
            vec![FieldDef::fixed("id", 4), FieldDef::blob("body").nullable()],
        )
        .unwrap();
        let tuple = Tuple::from(vec![FieldValue::Data(&id), FieldValue::External(&value)]);
        let mut buf = [0u8; 128];
        let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();

        let mut offsets = RecOffsets::new();
        compute_offsets(rec, &schema, &mut offsets);
        assert!(is_external(&schema, &offsets, 1));
        assert_eq!(offsets.n_external(), 1);
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(&value));

        let parsed = extern_ref(rec, &schema, &offsets, 1).unwrap();
        assert_eq!(parsed.page_no(), 512);
        assert_eq!(parsed.external_len(), 1_000_000);
        assert!(extern_ref(rec, &schema, &offsets, 0).is_none());
    }
}

#[test]
fn compact_external_length_has_flag_bits() {
    let value = ExternRef::new(1, 1, 1, 1).with_prefix(b"0123456789");
    let schema = IndexSchema::new(
        21,
        "PRIMARY",
        RecordFormat::Compact,
        vec![FieldDef::blob("body")],
    )
    .unwrap();
    let tuple = Tuple::from(vec![FieldValue::External(&value)]);
    let mut buf = [0u8; 64];
    let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();
    let origin = enc.origin;
    assert_eq!(buf[origin - 6], 0xC0);
    assert_eq!(buf[origin - 7], 30);
}

#[test]
fn record_sizes_add_up() {
    let id = be32(8);
    for format in FORMATS {
        let schema = IndexSchema::new(
            22,
            "PRIMARY",
            format,
            vec![FieldDef::fixed("id", 4), FieldDef::variable("s", 300).nullable()],
        )
        .unwrap();
        let long = vec![b'x'; 200];
        let tuple = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Data(&long)]);
        let size = converted_size(&schema, &tuple, 0).unwrap();
        let mut buf = vec![0u8; size.total()];
        let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();
        let rec = enc.record(&buf).unwrap();

        let mut offsets = RecOffsets::new();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(offsets.extra_size(), size.extra);
        assert_eq!(offsets.data_size(), size.data);
        assert_eq!(offsets.total_size(), buf.len());
        assert!(!offsets.any_null());
        assert!(!offsets.any_external());
    }
}

#[test]
fn record_decodes_from_inside_a_page() {
    let schema = IndexSchema::new(
        23,
        "PRIMARY",
        RecordFormat::Compact,
        vec![FieldDef::fixed("id", 4), FieldDef::variable("s", 20)],
    )
    .unwrap();
    let id = be32(42);
    let tuple = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Data(b"page")]);
    let mut scratch = [0u8; 32];
    let enc = encode(&schema, &tuple, 0, &mut scratch).unwrap();

    let mut page = vec![0xEEu8; 256];
    let at = 100;
    page[at..at + enc.len].copy_from_slice(&scratch[..enc.len]);
    let rec = RecordRef::new(&page, at + enc.origin).unwrap();

    let mut offsets = RecOffsets::new();
    compute_offsets(rec, &schema, &mut offsets);
    assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(b"page"));
    assert!(validate_record(rec, &schema));

    let arena = ScratchArena::new();
    let copy = copy_record(rec, &offsets, &arena);
    assert_eq!(copy.buf(), &scratch[..enc.len]);
}

#[test]
fn header_bits_survive_field_updates() {
    for format in FORMATS {
        let schema = IndexSchema::new(
            24,
            "PRIMARY",
            format,
            vec![FieldDef::fixed("id", 4), FieldDef::fixed("n", 4)],
        )
        .unwrap();
        let id = be32(1);
        let n = be32(2);
        let tuple = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Data(&n)]);
        let mut buf = [0u8; 32];
        let enc = encode(&schema, &tuple, 0, &mut buf).unwrap();

        let mut offsets = RecOffsets::new();
        compute_offsets(enc.record(&buf).unwrap(), &schema, &mut offsets);
        {
            let mut rec = enc.record_mut(&mut buf).unwrap();
            schema.codec().set_delete_marked(&mut rec, true).unwrap();
            set(&mut rec, &schema, &mut offsets, 1, Some(&be32(99)[..]));
        }
        let rec = enc.record(&buf).unwrap();
        assert_eq!(
            schema.codec().info_bits(rec).unwrap() & info_bits::DELETED,
            info_bits::DELETED
        );
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(&be32(99)));
    }
}

#[test]
fn temp_records_round_trip_with_defaults() {
    let schema = IndexSchema::new(
        25,
        "PRIMARY",
        RecordFormat::Compact,
        vec![
            FieldDef::fixed("id", 4),
            FieldDef::variable("s", 20).nullable().added_in(1),
        ],
    )
    .unwrap();
    let id = be32(6);
    let tuple = Tuple::from(vec![FieldValue::Data(&id)]);
    let size = temp_size(&schema, &tuple).unwrap();
    let mut buf = vec![0u8; size.total()];
    let enc = encode_temp(&schema, &tuple, &mut buf).unwrap();

    let rec = enc.record(&buf).unwrap();
    let mut offsets = RecOffsets::new();
    compute_offsets_temp(rec, &schema, &mut offsets).unwrap();
    assert_eq!(get(rec, &schema, &offsets, 0), Field::Data(&id));
    assert_eq!(get(rec, &schema, &offsets, 1), Field::Null);
}
