//! # Instant ADD/DROP COLUMN Integration Tests
//!
//! These tests walk a table through a sequence of schema changes and check
//! that rows written at every step still decode against the newest schema.
//!
//! ## Test Coverage
//!
//! 1. Versioned History
//!    - Rows written before any change carry no header affix
//!    - Rows written after a change carry their version byte
//!    - Columns added later decode as DEFAULT with the declared value
//!
//! 2. Dropped Columns
//!    - Older rows keep the dropped bytes but report DROPPED in later views
//!    - Newer rows omit the column entirely
//!
//! 3. Legacy Upgrade
//!    - Core-only, legacy-prefixed and versioned rows coexist
//!
//! 4. Corruption Handling
//!    - Version bytes newer than the schema are rejected
//!    - Field counts outside the legacy range are rejected

use pagerec::records::{
    compute_offsets, compute_offsets_as_of, encode, get, is_corruption, try_compute_offsets,
    EncodedRecord, Field, FieldDef, FieldValue, IndexSchema, InsertState, RecOffsets,
    RecordFormat, Tuple,
};

const FORMATS: [RecordFormat; 2] = [RecordFormat::Compact, RecordFormat::Redundant];

/// A table created with (id, name), then:
/// v1 ADD score INT DEFAULT 10, v2 DROP name, v3 ADD note VARCHAR NULL.
fn history(format: RecordFormat) -> IndexSchema {
    IndexSchema::new(
        42,
        "PRIMARY",
        format,
        vec![
            FieldDef::fixed("id", 4),
            FieldDef::variable("name", 64).nullable().dropped_in(2),
            FieldDef::fixed("score", 4).added_in(1).with_default(10u32.to_be_bytes()),
            FieldDef::variable("note", 64).nullable().added_in(3),
        ],
    )
    .unwrap()
}

fn write(schema: &IndexSchema, tuple: &Tuple<'_>, version: u8, buf: &mut [u8]) -> EncodedRecord {
    encode(schema, tuple, version, buf).unwrap()
}

// ============================================================================
// Versioned History
// ============================================================================

#[test]
fn rows_from_each_version_decode_against_the_latest_schema() {
    for format in FORMATS {
        let schema = history(format);
        assert_eq!(schema.current_row_version(), 3);

        let id = 1u32.to_be_bytes();
        let score = 77u32.to_be_bytes();

        let v0 = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Data(b"ann")]);
        let v1 = Tuple::from(vec![
            FieldValue::Data(&id),
            FieldValue::Data(b"bea"),
            FieldValue::Data(&score),
        ]);
        let v3 = Tuple::from(vec![
            FieldValue::Data(&id),
            FieldValue::Default,
            FieldValue::Data(&score),
            FieldValue::Data(b"hello"),
        ]);

        let mut buf0 = [0u8; 64];
        let mut buf1 = [0u8; 64];
        let mut buf3 = [0u8; 64];
        let r0 = write(&schema, &v0, 0, &mut buf0);
        let r1 = write(&schema, &v1, 1, &mut buf1);
        let r3 = write(&schema, &v3, 3, &mut buf3);

        let mut offsets = RecOffsets::new();

        let rec = r0.record(&buf0).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(
            offsets.insert_state(),
            Some(InsertState::VersionedBeforeFirstChange)
        );
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(b"ann"));
        assert_eq!(
            get(rec, &schema, &offsets, 2),
            Field::Default(Some(&10u32.to_be_bytes()[..]))
        );
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Default(None));

        let rec = r1.record(&buf1).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(offsets.row_version(), Some(1));
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(b"bea"));
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(&score));
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Default(None));

        let rec = r3.record(&buf3).unwrap();
        compute_offsets(rec, &schema, &mut offsets);
        assert_eq!(offsets.row_version(), Some(3));
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Dropped);
        assert_eq!(get(rec, &schema, &offsets, 3), Field::Data(b"hello"));
    }
}

#[test]
fn unversioned_rows_have_no_header_affix() {
    let plain = IndexSchema::new(
        1,
        "PRIMARY",
        RecordFormat::Compact,
        vec![FieldDef::fixed("id", 4), FieldDef::variable("name", 64).nullable()],
    )
    .unwrap();
    let versioned = history(RecordFormat::Compact);

    let id = 5u32.to_be_bytes();
    let tuple = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Data(b"x")]);
    let mut a = [0u8; 64];
    let mut b = [0u8; 64];
    let plain_rec = write(&plain, &tuple, 0, &mut a);
    let versioned_rec = write(&versioned, &tuple, 0, &mut b);

    assert_eq!(plain_rec.extra_size(), versioned_rec.extra_size());
    assert_eq!(a[..plain_rec.len], b[..versioned_rec.len]);
}

#[test]
fn version_byte_adds_one_header_byte() {
    for format in FORMATS {
        let schema = history(format);
        let id = 5u32.to_be_bytes();
        let score = 1u32.to_be_bytes();
        let v0 = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Null]);
        let v1 = Tuple::from(vec![
            FieldValue::Data(&id),
            FieldValue::Null,
            FieldValue::Data(&score),
        ]);
        let mut a = [0u8; 64];
        let mut b = [0u8; 64];
        let r0 = write(&schema, &v0, 0, &mut a);
        let r1 = write(&schema, &v1, 1, &mut b);
        // Redundant rows also grow by the new column's offset slot.
        let slot = match format {
            RecordFormat::Compact => 0,
            RecordFormat::Redundant => 1,
        };
        assert_eq!(r1.extra_size(), r0.extra_size() + 1 + slot);
        assert_eq!(r1.data_size(), r0.data_size() + 4);
    }
}

// ============================================================================
// Dropped Columns
// ============================================================================

#[test]
fn dropped_column_visibility_depends_on_the_view() {
    for format in FORMATS {
        let schema = history(format);
        let id = 9u32.to_be_bytes();
        let score = 3u32.to_be_bytes();
        let tuple = Tuple::from(vec![
            FieldValue::Data(&id),
            FieldValue::Data(b"kept"),
            FieldValue::Data(&score),
        ]);
        let mut buf = [0u8; 64];
        let enc = write(&schema, &tuple, 1, &mut buf);
        let rec = enc.record(&buf).unwrap();

        let mut offsets = RecOffsets::new();
        compute_offsets_as_of(rec, &schema, &mut offsets, 1).unwrap();
        assert_eq!(get(rec, &schema, &offsets, 1), Field::Data(b"kept"));

        for view in 2..=3 {
            compute_offsets_as_of(rec, &schema, &mut offsets, view).unwrap();
            assert_eq!(get(rec, &schema, &offsets, 1), Field::Dropped);
            assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(&score));
            assert_eq!(offsets.data_size(), 12);
        }

        // A view older than the row is raised to the row's own version.
        compute_offsets_as_of(rec, &schema, &mut offsets, 0).unwrap();
        assert_eq!(get(rec, &schema, &offsets, 2), Field::Data(&score));
    }
}

// ============================================================================
// Legacy Upgrade
// ============================================================================

#[test]
fn legacy_table_keeps_reading_after_upgrade() {
    for format in FORMATS {
        let legacy = IndexSchema::new(
            7,
            "PRIMARY",
            format,
            vec![
                FieldDef::fixed("id", 4),
                FieldDef::variable("a", 16).nullable(),
                FieldDef::variable("b", 16).nullable(),
            ],
        )
        .unwrap()
        .with_legacy_instant(1)
        .unwrap();

        let id = 2u32.to_be_bytes();
        let core_only = Tuple::from(vec![FieldValue::Data(&id)]);
        let with_a = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Data(b"aa")]);
        let mut buf_core = [0u8; 64];
        let mut buf_a = [0u8; 64];
        let core_rec = write(&legacy, &core_only, 0, &mut buf_core);
        let a_rec = write(&legacy, &with_a, 0, &mut buf_a);

        let upgraded = IndexSchema::new(
            7,
            "PRIMARY",
            format,
            vec![
                FieldDef::fixed("id", 4),
                FieldDef::variable("a", 16).nullable(),
                FieldDef::variable("b", 16).nullable(),
                FieldDef::variable("c", 16).nullable().added_in(1),
            ],
        )
        .unwrap()
        .with_legacy_instant(1)
        .unwrap();

        let mut offsets = RecOffsets::new();
        let rec = core_rec.record(&buf_core).unwrap();
        compute_offsets(rec, &upgraded, &mut offsets);
        assert_eq!(
            offsets.insert_state(),
            Some(InsertState::UpgradedBeforeFirstChange)
        );
        assert_eq!(get(rec, &upgraded, &offsets, 1), Field::Default(None));
        assert_eq!(get(rec, &upgraded, &offsets, 3), Field::Default(None));

        let rec = a_rec.record(&buf_a).unwrap();
        compute_offsets(rec, &upgraded, &mut offsets);
        assert_eq!(offsets.insert_state(), Some(InsertState::LegacyAfterFirstAdd));
        assert_eq!(get(rec, &upgraded, &offsets, 1), Field::Data(b"aa"));
        assert_eq!(get(rec, &upgraded, &offsets, 2), Field::Default(None));
        assert_eq!(get(rec, &upgraded, &offsets, 3), Field::Default(None));
    }
}

// ============================================================================
// Corruption Handling
// ============================================================================

#[test]
fn version_byte_beyond_schema_is_corrupt() {
    let schema = history(RecordFormat::Compact);
    let id = 1u32.to_be_bytes();
    let score = 1u32.to_be_bytes();
    let tuple = Tuple::from(vec![
        FieldValue::Data(&id),
        FieldValue::Null,
        FieldValue::Data(&score),
    ]);
    let mut buf = [0u8; 64];
    let enc = write(&schema, &tuple, 1, &mut buf);
    buf[enc.origin - 6] = 9;

    let mut offsets = RecOffsets::new();
    let err = try_compute_offsets(enc.record(&buf).unwrap(), &schema, &mut offsets).unwrap_err();
    assert!(is_corruption(&err));
}

#[test]
fn field_count_outside_legacy_range_is_corrupt() {
    let schema = IndexSchema::new(
        8,
        "PRIMARY",
        RecordFormat::Compact,
        vec![
            FieldDef::fixed("id", 4),
            FieldDef::variable("a", 16).nullable(),
        ],
    )
    .unwrap()
    .with_legacy_instant(1)
    .unwrap();
    let id = 1u32.to_be_bytes();
    let tuple = Tuple::from(vec![FieldValue::Data(&id), FieldValue::Data(b"a")]);
    let mut buf = [0u8; 64];
    let enc = write(&schema, &tuple, 0, &mut buf);
    assert_eq!(buf[enc.origin - 6], 2);
    buf[enc.origin - 6] = 5;

    let mut offsets = RecOffsets::new();
    let err = try_compute_offsets(enc.record(&buf).unwrap(), &schema, &mut offsets).unwrap_err();
    assert!(is_corruption(&err));
}
