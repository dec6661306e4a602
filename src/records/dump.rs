//! Human-readable record dumps attached to decode errors and used by
//! consistency tools.
//!
//! ```text
//! origin 14, header [.. 03 00 00 00 10 00 00], data [00 00 00 07 68 69]
//! extra 7, data 6, row version -
//!   0 id: 00 00 00 07
//!   1 name: NULL
//! ```

use std::fmt;

use crate::records::offsets::{FieldState, RecOffsets};
use crate::records::record::RecordRef;
use crate::records::schema::IndexSchema;

const RAW_WINDOW: usize = 16;

fn write_hex(f: &mut fmt::Formatter<'_>, bytes: &[u8]) -> fmt::Result {
    for (i, byte) in bytes.iter().enumerate() {
        if i > 0 {
            f.write_str(" ")?;
        }
        write!(f, "{:02x}", byte)?;
    }
    Ok(())
}

pub struct RecordDump<'a, 'o> {
    rec: RecordRef<'a>,
    decoded: Option<(&'a IndexSchema, &'a RecOffsets<'o>)>,
}

impl<'a, 'o> RecordDump<'a, 'o> {
    /// Bytes around the origin, for records whose header could not be parsed.
    pub fn raw(rec: RecordRef<'a>) -> Self {
        Self { rec, decoded: None }
    }

    /// Per-field dump of a record with computed offsets.
    pub fn decoded(
        rec: RecordRef<'a>,
        schema: &'a IndexSchema,
        offsets: &'a RecOffsets<'o>,
    ) -> Self {
        Self {
            rec,
            decoded: Some((schema, offsets)),
        }
    }
}

impl fmt::Display for RecordDump<'_, '_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let header = self.rec.header();
        let data = self.rec.data();

        let Some((schema, offsets)) = self.decoded else {
            let header_from = header.len().saturating_sub(RAW_WINDOW);
            write!(f, "origin {}, header [", self.rec.origin())?;
            if header_from > 0 {
                f.write_str(".. ")?;
            }
            write_hex(f, &header[header_from..])?;
            f.write_str("], data [")?;
            write_hex(f, &data[..data.len().min(RAW_WINDOW)])?;
            if data.len() > RAW_WINDOW {
                f.write_str(" ..")?;
            }
            return f.write_str("]");
        };

        let extra = offsets.extra_size().min(header.len());
        write!(f, "origin {}, header [", self.rec.origin())?;
        write_hex(f, &header[header.len() - extra..])?;
        write!(
            f,
            "]\nextra {}, data {}, row version ",
            offsets.extra_size(),
            offsets.data_size()
        )?;
        match offsets.row_version() {
            Some(v) => write!(f, "{}", v)?,
            None => f.write_str("-")?,
        }

        for phys in 0..offsets.n_fields().min(schema.n_fields()) {
            let field = schema.physical_field(phys);
            write!(f, "\n  {} {}: ", phys, field.name)?;
            match offsets.state(phys) {
                FieldState::Null => f.write_str("NULL")?,
                FieldState::Default => f.write_str("DEFAULT")?,
                FieldState::Dropped => f.write_str("DROPPED")?,
                state @ (FieldState::Data | FieldState::External) => {
                    let (start, end) = (offsets.start(phys), offsets.end(phys));
                    match data.get(start..end) {
                        Some(bytes) => write_hex(f, bytes)?,
                        None => write!(f, "<{}..{} out of bounds>", start, end)?,
                    }
                    if state == FieldState::External {
                        f.write_str(" (external)")?;
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::records::codec::{encode, try_compute_offsets};
    use crate::records::schema::{FieldDef, RecordFormat};
    use crate::records::tuple::{FieldValue, Tuple};

    #[test]
    fn raw_dump_shows_bytes_around_origin() {
        let buf = [0xABu8, 0x01, 0x02, 0x03];
        let rec = RecordRef::new(&buf, 2).unwrap();
        assert_eq!(
            RecordDump::raw(rec).to_string(),
            "origin 2, header [ab 01], data [02 03]"
        );
    }

    #[test]
    fn decoded_dump_lists_fields() {
        let schema = IndexSchema::new(
            1,
            "PRIMARY",
            RecordFormat::Compact,
            vec![FieldDef::fixed("id", 4), FieldDef::variable("name", 20).nullable()],
        )
        .unwrap();
        let tuple = Tuple::from(vec![FieldValue::Data(&[0, 0, 0, 7]), FieldValue::Null]);
        let mut buf = [0u8; 32];
        let encoded = encode(&schema, &tuple, 0, &mut buf).unwrap();
        let rec = encoded.record(&buf).unwrap();
        let mut offsets = RecOffsets::new();
        try_compute_offsets(rec, &schema, &mut offsets).unwrap();

        let text = RecordDump::decoded(rec, &schema, &offsets).to_string();
        assert!(text.contains("0 id: 00 00 00 07"));
        assert!(text.contains("1 name: NULL"));
        assert!(text.contains("row version -"));
    }
}
