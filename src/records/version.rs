//! # Row Version Classifier
//!
//! A table that went through instant ADD/DROP holds rows written under several
//! historical schemas. Each row self-describes through two header info bits,
//! and combining those bits with the table's instant history yields exactly one
//! of six insert states:
//!
//! | Table history | INSTANT | VERSIONED | State |
//! |---------------|---------|-----------|-------|
//! | never altered | 0 | 0 | `NoInstant` |
//! | legacy instant | 0 | 0 | `LegacyBeforeFirstAdd` |
//! | legacy instant | 1 | 0 | `LegacyAfterFirstAdd` |
//! | row versions | 0 | 0 | `VersionedBeforeFirstChange` |
//! | row versions | 0 | 1 | `VersionedAfterFirstChange` |
//! | upgraded legacy | 0 | 0 | `UpgradedBeforeFirstChange` |
//! | upgraded legacy | 1 | 0 | `LegacyAfterFirstAdd` |
//! | upgraded legacy | 0 | 1 | `VersionedAfterFirstChange` |
//!
//! Every other combination is impossible and means the record is corrupt.
//!
//! The state fixes three things for the decoders:
//!
//! 1. the header affix: a version byte, a legacy field-count prefix, or nothing
//! 2. how many nullable fields the null bitmap covers
//! 3. whether logical and physical field positions can differ
//!
//! [`RowLayout`] is the state resolved against a schema: it answers, for every
//! physical field, whether the row stores it. The encoders build one from the
//! tuple ([`RowLayout::plan`]) and the decoders from the header, so both sides
//! walk the same layout.

use eyre::{bail, ensure, Result};
use tracing::trace;

use crate::records::header::info_bits;
use crate::records::schema::{IndexSchema, Presence};
use crate::records::tuple::{FieldValue, Tuple};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum InsertState {
    /// The table never had an instant ADD or DROP.
    NoInstant,
    /// Legacy instant table; row written before the first instant ADD.
    LegacyBeforeFirstAdd,
    /// Legacy instant table; row carries a field-count prefix.
    LegacyAfterFirstAdd,
    /// Table with row versions; row written before the first instant change.
    VersionedBeforeFirstChange,
    /// Table with row versions; row carries a version byte.
    VersionedAfterFirstChange,
    /// Table upgraded from legacy instant; row predates every instant ADD.
    UpgradedBeforeFirstChange,
}

/// Header bytes that sit between the fixed extra bytes and the null bitmap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderAffix {
    None,
    VersionByte,
    FieldCount,
}

impl InsertState {
    pub fn affix(self) -> HeaderAffix {
        match self {
            InsertState::VersionedAfterFirstChange => HeaderAffix::VersionByte,
            InsertState::LegacyAfterFirstAdd => HeaderAffix::FieldCount,
            InsertState::NoInstant
            | InsertState::LegacyBeforeFirstAdd
            | InsertState::VersionedBeforeFirstChange
            | InsertState::UpgradedBeforeFirstChange => HeaderAffix::None,
        }
    }

    pub fn has_version_byte(self) -> bool {
        self.affix() == HeaderAffix::VersionByte
    }

    pub fn has_field_count(self) -> bool {
        self.affix() == HeaderAffix::FieldCount
    }

    /// Info bits an encoder sets for a row in this state.
    pub fn info_bits(self) -> u8 {
        match self.affix() {
            HeaderAffix::VersionByte => info_bits::VERSIONED,
            HeaderAffix::FieldCount => info_bits::INSTANT,
            HeaderAffix::None => 0,
        }
    }

    /// Whether the row stores a prefix of the physical fields, in which case
    /// its width is a single count.
    pub fn is_prefix_shaped(self) -> bool {
        match self {
            InsertState::NoInstant
            | InsertState::LegacyBeforeFirstAdd
            | InsertState::LegacyAfterFirstAdd
            | InsertState::UpgradedBeforeFirstChange => true,
            InsertState::VersionedBeforeFirstChange | InsertState::VersionedAfterFirstChange => {
                false
            }
        }
    }

    /// Whether logical field numbers must be translated before indexing the
    /// offsets array.
    pub fn needs_mapping(self, schema: &IndexSchema) -> bool {
        self != InsertState::NoInstant && schema.has_row_versions()
    }
}

/// Classifies a record from its info bits. `None` means the bit combination
/// cannot occur for this table.
pub fn classify(bits: u8, schema: &IndexSchema) -> Option<InsertState> {
    let instant = bits & info_bits::INSTANT != 0;
    let versioned = bits & info_bits::VERSIONED != 0;

    let state = match (instant, versioned) {
        (true, true) => None,
        (false, false) => Some(if schema.is_upgraded_instant() {
            InsertState::UpgradedBeforeFirstChange
        } else if schema.has_row_versions() {
            InsertState::VersionedBeforeFirstChange
        } else if schema.has_legacy_instant() {
            InsertState::LegacyBeforeFirstAdd
        } else {
            InsertState::NoInstant
        }),
        (true, false) => {
            if schema.has_legacy_instant() || schema.is_upgraded_instant() {
                Some(InsertState::LegacyAfterFirstAdd)
            } else {
                None
            }
        }
        (false, true) => {
            if schema.has_row_versions() {
                Some(InsertState::VersionedAfterFirstChange)
            } else {
                None
            }
        }
    };

    trace!(
        target: "pagerec::version",
        index = schema.name(),
        bits,
        state = ?state,
        "classified record"
    );
    state
}

/// Physical shape of one row: which fields it stores and how the decoder
/// should report the ones it does not.
#[derive(Debug, Clone, Copy)]
pub struct RowLayout<'s> {
    schema: &'s IndexSchema,
    state: InsertState,
    row_version: Option<u8>,
    prefix_fields: usize,
    view: u8,
}

impl<'s> RowLayout<'s> {
    /// Layout of a stored row. `row_version` is the version byte if the row
    /// has one; `field_count` is the legacy prefix (or the redundant header
    /// field count) for prefix-shaped states.
    pub fn decoded(
        schema: &'s IndexSchema,
        state: InsertState,
        row_version: Option<u8>,
        field_count: Option<usize>,
    ) -> Result<Self> {
        if let Some(v) = row_version {
            ensure!(
                v <= schema.current_row_version(),
                "corrupt record: row version {} newer than index {} version {}",
                v,
                schema.name(),
                schema.current_row_version()
            );
        }
        let prefix_fields = match state {
            InsertState::NoInstant => schema.n_fields(),
            InsertState::LegacyBeforeFirstAdd | InsertState::UpgradedBeforeFirstChange => {
                schema.n_core_fields()
            }
            InsertState::LegacyAfterFirstAdd => {
                let Some(count) = field_count else {
                    bail!("corrupt record: legacy instant row without a field count");
                };
                ensure!(
                    count >= schema.n_core_fields() && count <= schema.n_legacy_fields(),
                    "corrupt record: field count {} outside {}..={} for index {}",
                    count,
                    schema.n_core_fields(),
                    schema.n_legacy_fields(),
                    schema.name()
                );
                count
            }
            InsertState::VersionedBeforeFirstChange | InsertState::VersionedAfterFirstChange => 0,
        };
        let layout = Self {
            schema,
            state,
            row_version,
            prefix_fields,
            view: row_version.unwrap_or(0),
        };
        Ok(layout)
    }

    /// Layout an encoder produces for `tuple` at `version`.
    pub fn plan(schema: &'s IndexSchema, tuple: &Tuple<'_>, version: u8) -> Result<Self> {
        ensure!(
            tuple.len() <= schema.n_fields(),
            "tuple has {} fields, index {} has {}",
            tuple.len(),
            schema.name(),
            schema.n_fields()
        );
        ensure!(
            version <= schema.current_row_version(),
            "row version {} is newer than index {} version {}",
            version,
            schema.name(),
            schema.current_row_version()
        );

        if schema.has_row_versions() && version > 0 {
            let layout = Self {
                schema,
                state: InsertState::VersionedAfterFirstChange,
                row_version: Some(version),
                prefix_fields: 0,
                view: version,
            };
            layout.check_supplied(tuple)?;
            return Ok(layout);
        }

        if schema.has_row_versions() && !schema.is_upgraded_instant() {
            let layout = Self {
                schema,
                state: InsertState::VersionedBeforeFirstChange,
                row_version: None,
                prefix_fields: 0,
                view: 0,
            };
            layout.check_supplied(tuple)?;
            return Ok(layout);
        }

        if !schema.has_instant_history() {
            let layout = Self {
                schema,
                state: InsertState::NoInstant,
                row_version: None,
                prefix_fields: schema.n_fields(),
                view: 0,
            };
            layout.check_supplied(tuple)?;
            return Ok(layout);
        }

        // Legacy instant rules, also used for version-0 rows of an upgraded
        // table: store the shortest physical prefix that keeps every supplied
        // value, never fewer than the core fields.
        let n_legacy = schema.n_legacy_fields();
        let mut width = 0;
        for phys in 0..n_legacy {
            let logical = schema.logical_pos(phys);
            if !matches!(tuple.value(logical), FieldValue::Default) {
                width = phys + 1;
            }
        }
        let width = width.max(schema.n_core_fields());
        let state = match (width == schema.n_core_fields(), schema.is_upgraded_instant()) {
            (true, true) => InsertState::UpgradedBeforeFirstChange,
            (true, false) => InsertState::LegacyBeforeFirstAdd,
            (false, _) => InsertState::LegacyAfterFirstAdd,
        };
        let layout = Self {
            schema,
            state,
            row_version: None,
            prefix_fields: width,
            view: 0,
        };
        layout.check_supplied(tuple)?;
        Ok(layout)
    }

    fn check_supplied(&self, tuple: &Tuple<'_>) -> Result<()> {
        for phys in 0..self.schema.n_fields() {
            let logical = self.schema.logical_pos(phys);
            let field = self.schema.physical_field(phys);
            let value = tuple.value(logical);
            match self.presence(phys) {
                Presence::Present => ensure!(
                    !matches!(value, FieldValue::Default),
                    "field {} of index {} is stored at this row version and needs a value",
                    field.name,
                    self.schema.name()
                ),
                Presence::NotYetAdded | Presence::Dropped => ensure!(
                    matches!(value, FieldValue::Default | FieldValue::Null),
                    "field {} of index {} is not stored at this row version",
                    field.name,
                    self.schema.name()
                ),
            }
        }
        Ok(())
    }

    /// Reports columns dropped at or before `view` as dropped even when the
    /// row still stores them. Views older than the row are ignored.
    pub fn as_of(mut self, view: u8) -> Self {
        self.view = self.view.max(view);
        self
    }

    pub fn state(&self) -> InsertState {
        self.state
    }

    pub fn row_version(&self) -> Option<u8> {
        self.row_version
    }

    pub fn view(&self) -> u8 {
        self.view
    }

    /// Width of the row for prefix-shaped states.
    pub fn prefix_fields(&self) -> usize {
        self.prefix_fields
    }

    /// Whether physical field `phys` is stored in the row.
    pub fn presence(&self, phys: usize) -> Presence {
        if self.state.is_prefix_shaped() {
            if phys < self.prefix_fields {
                Presence::Present
            } else {
                Presence::NotYetAdded
            }
        } else {
            let version = self.row_version.unwrap_or(0);
            self.schema.physical_field(phys).presence_in(version)
        }
    }

    /// Whether the field is gone in the layout's view, stored or not.
    pub fn is_dropped_in_view(&self, phys: usize) -> bool {
        self.schema.physical_field(phys).is_dropped_as_of(self.view)
    }

    /// Physical fields the row stores.
    pub fn n_stored(&self) -> usize {
        if self.state.is_prefix_shaped() {
            self.prefix_fields
        } else {
            self.schema
                .n_fields_in_version(self.row_version.unwrap_or(0))
        }
    }

    /// Nullable fields covered by the null bitmap.
    pub fn n_nullable(&self) -> usize {
        if self.state.is_prefix_shaped() {
            self.schema.nullable_in_prefix(self.prefix_fields)
        } else {
            self.schema
                .nullable_in_version(self.row_version.unwrap_or(0))
        }
    }

    /// Header bytes taken by the affix.
    pub fn affix_len(&self) -> usize {
        match self.state.affix() {
            HeaderAffix::None => 0,
            HeaderAffix::VersionByte => 1,
            HeaderAffix::FieldCount => field_count_len(self.prefix_fields),
        }
    }
}

/// Bytes the legacy field-count prefix takes for `count` fields.
pub fn field_count_len(count: usize) -> usize {
    if count <= crate::config::REC_N_FIELDS_ONE_BYTE_MAX {
        1
    } else {
        2
    }
}
