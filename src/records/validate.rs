//! Non-aborting record validation for consistency checkers.
//!
//! [`validate_record`] runs the same header parse as the decode path and then
//! checks the resulting offsets array, returning `false` instead of aborting.
//! It is meant for tools scanning possibly damaged pages; the hot decode path
//! stays [`compute_offsets`](crate::records::codec::compute_offsets).

use eyre::{ensure, Result};
use tracing::debug;

use crate::memory::ScratchArena;
use crate::records::codec::try_compute_offsets;
use crate::records::offsets::RecOffsets;
use crate::records::record::RecordRef;
use crate::records::schema::IndexSchema;

fn check(rec: RecordRef<'_>, schema: &IndexSchema, offsets: &mut RecOffsets<'_>) -> Result<()> {
    try_compute_offsets(rec, schema, offsets)?;
    ensure!(
        offsets.is_monotonic(),
        "corrupt record: end offsets decrease"
    );
    ensure!(
        offsets.flags_exclusive(),
        "corrupt record: conflicting field flags"
    );
    ensure!(
        offsets.extra_size() <= rec.origin(),
        "corrupt record: {}-byte header before origin {}",
        offsets.extra_size(),
        rec.origin()
    );
    ensure!(
        offsets.data_size() <= rec.data().len(),
        "corrupt record: {} data bytes, {} available",
        offsets.data_size(),
        rec.data().len()
    );
    Ok(())
}

/// Whether `rec` decodes cleanly against `schema`.
pub fn validate_record(rec: RecordRef<'_>, schema: &IndexSchema) -> bool {
    let arena = ScratchArena::new();
    let mut offsets = RecOffsets::with_arena(&arena);
    match check(rec, schema, &mut offsets) {
        Ok(()) => true,
        Err(err) => {
            debug!(
                target: "pagerec::validate",
                index = schema.name(),
                table_id = schema.table_id(),
                error = %err.root_cause(),
                "record failed validation"
            );
            false
        }
    }
}
