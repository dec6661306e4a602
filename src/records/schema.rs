//! # Field Schema Snapshot
//!
//! This module provides the resolved, read-only view of an index that the codec
//! consumes: per-field storage properties plus the instant ADD/DROP history
//! needed to decode rows written under older schema versions.
//!
//! ## Logical vs Physical Order
//!
//! Fields are declared in **logical** order (the order of the current table
//! definition, dropped columns keeping their old slot). On disk, fields appear
//! in **physical** order: every column that existed before the first instant
//! ADD keeps its position, and instantly added columns are appended in the
//! order they were added, regardless of their logical position.
//!
//! ```text
//! logical:  a  x(added v1)  b  y(added v2)
//! physical: a  b  x  y
//! ```
//!
//! ## Instant History
//!
//! | Kind | Produced by | Rows self-describe via |
//! |------|-------------|------------------------|
//! | `None` | table never instantly altered | nothing |
//! | `Legacy` | instant ADD before row versions existed | field-count prefix + INSTANT bit |
//! | `Versioned` | instant ADD/DROP with row versions | version byte + VERSIONED bit |
//! | `Versioned` + upgraded core | legacy table altered with row versions | both |
//!
//! ## Schema Internals
//!
//! - `fields`: definitions in logical order
//! - `physical`: physical position -> logical index
//! - `logical_to_physical`: logical index -> physical position
//! - `nullable_prefix`: nullable count among the first `n` physical fields
//! - `nullable_by_version`: nullable count among fields visible in version `v`

use eyre::{bail, ensure, Result};

use crate::config::{MAX_ROW_VERSION, REC_MAX_N_FIELDS, SMALL_COLUMN_MAX_LEN};
use crate::records::codec::{codec_for, RecordCodec};

/// On-disk record format, fixed per table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RecordFormat {
    /// Old format: explicit per-field end-offset table.
    Redundant,
    /// New format: null bitmap plus reverse length table.
    Compact,
}

/// Whether a field is physically present in a row of a given version.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Presence {
    Present,
    /// Added after the row was written.
    NotYetAdded,
    /// Dropped at or before the row version.
    Dropped,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FieldDef {
    pub name: String,
    fixed_len: u16,
    max_len: u32,
    nullable: bool,
    large: bool,
    added_in: Option<u8>,
    dropped_in: Option<u8>,
    default: Option<Vec<u8>>,
}

impl FieldDef {
    pub fn fixed(name: impl Into<String>, len: u16) -> Self {
        Self {
            name: name.into(),
            fixed_len: len,
            max_len: len as u32,
            nullable: false,
            large: false,
            added_in: None,
            dropped_in: None,
            default: None,
        }
    }

    pub fn variable(name: impl Into<String>, max_len: u32) -> Self {
        Self {
            name: name.into(),
            fixed_len: 0,
            max_len,
            nullable: false,
            large: false,
            added_in: None,
            dropped_in: None,
            default: None,
        }
    }

    /// A BLOB-class column: unbounded, may be stored externally.
    pub fn blob(name: impl Into<String>) -> Self {
        Self {
            large: true,
            max_len: u32::MAX,
            ..Self::variable(name, 0)
        }
    }

    pub fn nullable(mut self) -> Self {
        self.nullable = true;
        self
    }

    pub fn added_in(mut self, version: u8) -> Self {
        self.added_in = Some(version);
        self
    }

    pub fn dropped_in(mut self, version: u8) -> Self {
        self.dropped_in = Some(version);
        self
    }

    pub fn with_default(mut self, value: impl Into<Vec<u8>>) -> Self {
        self.default = Some(value.into());
        self
    }

    pub fn fixed_len(&self) -> usize {
        self.fixed_len as usize
    }

    pub fn is_fixed(&self) -> bool {
        self.fixed_len != 0
    }

    pub fn max_len(&self) -> u32 {
        self.max_len
    }

    pub fn is_nullable(&self) -> bool {
        self.nullable
    }

    /// Variable-length columns that may exceed 255 bytes use the 2-byte
    /// length form and may be stored externally.
    pub fn is_big(&self) -> bool {
        self.large || self.max_len as usize > SMALL_COLUMN_MAX_LEN
    }

    pub fn added_in_version(&self) -> Option<u8> {
        self.added_in
    }

    pub fn dropped_in_version(&self) -> Option<u8> {
        self.dropped_in
    }

    pub fn is_instant_added(&self) -> bool {
        self.added_in.is_some()
    }

    pub fn is_instant_dropped(&self) -> bool {
        self.dropped_in.is_some()
    }

    /// Instant-ADD default; `None` means SQL NULL.
    pub fn default_value(&self) -> Option<&[u8]> {
        self.default.as_deref()
    }

    /// Bytes a NULL occupies in a redundant record.
    pub fn sql_null_size(&self) -> usize {
        self.fixed_len as usize
    }

    pub fn presence_in(&self, row_version: u8) -> Presence {
        if self.dropped_in.is_some_and(|d| d <= row_version) {
            Presence::Dropped
        } else if self.added_in.is_some_and(|a| a > row_version) {
            Presence::NotYetAdded
        } else {
            Presence::Present
        }
    }

    pub fn is_visible_in(&self, row_version: u8) -> bool {
        self.presence_in(row_version) == Presence::Present
    }

    pub fn is_dropped_as_of(&self, version: u8) -> bool {
        self.dropped_in.is_some_and(|d| d <= version)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum InstantKind {
    None,
    Legacy { n_core: usize },
    Versioned { upgraded_core: Option<usize> },
}

#[derive(Debug, Clone)]
pub struct IndexSchema {
    table_id: u64,
    name: String,
    format: RecordFormat,
    fields: Vec<FieldDef>,
    physical: Vec<usize>,
    logical_to_physical: Vec<usize>,
    instant: InstantKind,
    current_version: u8,
    nullable_prefix: Vec<u16>,
    nullable_by_version: Vec<u16>,
}

impl IndexSchema {
    /// Builds a snapshot from fields in logical order. Any `added_in` or
    /// `dropped_in` marks the table as versioned.
    pub fn new(
        table_id: u64,
        name: impl Into<String>,
        format: RecordFormat,
        fields: Vec<FieldDef>,
    ) -> Result<Self> {
        let name = name.into();
        ensure!(!fields.is_empty(), "index {} has no fields", name);
        ensure!(
            fields.len() <= REC_MAX_N_FIELDS,
            "index {} has {} fields, limit is {}",
            name,
            fields.len(),
            REC_MAX_N_FIELDS
        );

        let mut current_version = 0u8;
        for field in &fields {
            if let Some(a) = field.added_in {
                ensure!(a >= 1, "field {} added in version 0", field.name);
                current_version = current_version.max(a);
            }
            if let Some(d) = field.dropped_in {
                ensure!(d >= 1, "field {} dropped in version 0", field.name);
                ensure!(
                    field.added_in.map_or(true, |a| a < d),
                    "field {} dropped in version {} before it was added",
                    field.name,
                    d
                );
                current_version = current_version.max(d);
            }
            ensure!(
                current_version <= MAX_ROW_VERSION,
                "field {} exceeds the maximum row version {}",
                field.name,
                MAX_ROW_VERSION
            );
            if field.added_in.is_some() {
                ensure!(
                    field.nullable || field.default.is_some(),
                    "instantly added NOT NULL field {} needs a default",
                    field.name
                );
            }
            if let Some(default) = &field.default {
                if field.is_fixed() {
                    ensure!(
                        default.len() == field.fixed_len(),
                        "default of field {} is {} bytes, field is fixed {}",
                        field.name,
                        default.len(),
                        field.fixed_len
                    );
                }
            }
        }

        let versioned = fields
            .iter()
            .any(|f| f.added_in.is_some() || f.dropped_in.is_some());
        let instant = if versioned {
            InstantKind::Versioned {
                upgraded_core: None,
            }
        } else {
            InstantKind::None
        };

        let mut physical: Vec<usize> = (0..fields.len())
            .filter(|&i| fields[i].added_in.is_none())
            .collect();
        let mut added: Vec<usize> = (0..fields.len())
            .filter(|&i| fields[i].added_in.is_some())
            .collect();
        added.sort_by_key(|&i| (fields[i].added_in, i));
        physical.extend(added);

        let mut logical_to_physical = vec![0; fields.len()];
        for (phys, &logical) in physical.iter().enumerate() {
            logical_to_physical[logical] = phys;
        }

        let mut nullable_prefix = Vec::with_capacity(fields.len() + 1);
        let mut count = 0u16;
        nullable_prefix.push(0);
        for &logical in &physical {
            if fields[logical].nullable {
                count += 1;
            }
            nullable_prefix.push(count);
        }

        let nullable_by_version = (0..=current_version)
            .map(|v| {
                fields
                    .iter()
                    .filter(|f| f.nullable && f.is_visible_in(v))
                    .count() as u16
            })
            .collect();

        Ok(Self {
            table_id,
            name,
            format,
            fields,
            physical,
            logical_to_physical,
            instant,
            current_version,
            nullable_prefix,
            nullable_by_version,
        })
    }

    /// Marks the table as having gone through instant ADD before row versions
    /// existed. The first `n_core` fields predate the first instant ADD.
    ///
    /// On an unversioned schema this produces a legacy-instant table; on a
    /// versioned schema it produces a table upgraded from a legacy one.
    pub fn with_legacy_instant(mut self, n_core: usize) -> Result<Self> {
        ensure!(
            n_core >= 1 && n_core <= self.fields.len(),
            "index {}: core field count {} out of range 1..={}",
            self.name,
            n_core,
            self.fields.len()
        );
        for phys in 0..n_core {
            let field = self.physical_field(phys);
            ensure!(
                field.added_in.is_none(),
                "index {}: core field {} carries a row version",
                self.name,
                field.name
            );
        }
        for phys in n_core..self.fields.len() {
            let field = self.physical_field(phys);
            if field.added_in.is_none() {
                ensure!(
                    field.nullable || field.default.is_some(),
                    "instantly added NOT NULL field {} needs a default",
                    field.name
                );
            }
        }
        self.instant = match self.instant {
            InstantKind::None => {
                if n_core == self.fields.len() {
                    bail!(
                        "index {}: legacy instant table must have fields beyond the core",
                        self.name
                    );
                }
                InstantKind::Legacy { n_core }
            }
            InstantKind::Versioned { .. } => InstantKind::Versioned {
                upgraded_core: Some(n_core),
            },
            InstantKind::Legacy { .. } => {
                bail!("index {} already has a legacy instant core", self.name)
            }
        };
        Ok(self)
    }

    pub fn table_id(&self) -> u64 {
        self.table_id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn format(&self) -> RecordFormat {
        self.format
    }

    pub fn is_compact(&self) -> bool {
        self.format == RecordFormat::Compact
    }

    pub fn codec(&self) -> &'static dyn RecordCodec {
        codec_for(self.format)
    }

    pub fn n_fields(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[FieldDef] {
        &self.fields
    }

    pub fn field(&self, logical: usize) -> Option<&FieldDef> {
        self.fields.get(logical)
    }

    pub fn field_by_name(&self, name: &str) -> Option<usize> {
        self.fields.iter().position(|f| f.name == name)
    }

    pub fn physical_field(&self, phys: usize) -> &FieldDef {
        &self.fields[self.physical[phys]]
    }

    pub fn logical_pos(&self, phys: usize) -> usize {
        self.physical[phys]
    }

    /// Maps a logical field number to its physical slot. Tables without row
    /// versions never reorder fields.
    pub fn physical_pos(&self, logical: usize) -> usize {
        if self.has_row_versions() {
            self.logical_to_physical[logical]
        } else {
            logical
        }
    }

    pub fn has_row_versions(&self) -> bool {
        matches!(self.instant, InstantKind::Versioned { .. })
    }

    pub fn has_legacy_instant(&self) -> bool {
        matches!(self.instant, InstantKind::Legacy { .. })
    }

    pub fn is_upgraded_instant(&self) -> bool {
        matches!(
            self.instant,
            InstantKind::Versioned {
                upgraded_core: Some(_)
            }
        )
    }

    pub fn has_instant_history(&self) -> bool {
        self.instant != InstantKind::None
    }

    pub fn current_row_version(&self) -> u8 {
        self.current_version
    }

    /// Fields present in rows written before the first legacy instant ADD.
    pub fn n_core_fields(&self) -> usize {
        match self.instant {
            InstantKind::Legacy { n_core } => n_core,
            InstantKind::Versioned {
                upgraded_core: Some(n_core),
            } => n_core,
            InstantKind::Versioned {
                upgraded_core: None,
            } => self.n_fields_in_version(0),
            InstantKind::None => self.fields.len(),
        }
    }

    /// Fields stored by rows of the legacy instant format: every field not
    /// added with a row version, all of which precede versioned additions
    /// physically.
    pub fn n_legacy_fields(&self) -> usize {
        self.fields.iter().filter(|f| f.added_in.is_none()).count()
    }

    pub fn n_fields_in_version(&self, version: u8) -> usize {
        self.fields.iter().filter(|f| f.is_visible_in(version)).count()
    }

    pub fn n_nullable(&self) -> usize {
        self.nullable_prefix[self.fields.len()] as usize
    }

    /// Nullable fields among the first `n_physical` physical fields.
    pub fn nullable_in_prefix(&self, n_physical: usize) -> usize {
        self.nullable_prefix[n_physical] as usize
    }

    /// Nullable fields physically present in rows of `version`.
    pub fn nullable_in_version(&self, version: u8) -> usize {
        self.nullable_by_version[version as usize] as usize
    }
}
