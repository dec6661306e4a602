//! # Physical Record Handles
//!
//! A physical record is a byte buffer plus an **origin** index. Bytes before
//! the origin are the header (read backwards from the origin); bytes from the
//! origin onward are field data in physical order.
//!
//! ```text
//!   buf[0]                         buf[origin]
//!   |                              |
//!   v                              v
//!   +----------+-------------------+------------------------------+
//!   | (other)  | header (extra)    | field data ...               |
//!   +----------+-------------------+------------------------------+
//!               <- byte_before(n) counts back from the origin
//! ```
//!
//! The buffer may be a whole page: the handle never assumes the record is the
//! only thing in it. Every backwards read is bounds-checked against the start
//! of the buffer; reading past it means the header is corrupt.

use eyre::{bail, ensure, eyre, Result};

#[derive(Debug, Clone, Copy)]
pub struct RecordRef<'a> {
    buf: &'a [u8],
    origin: usize,
}

impl<'a> RecordRef<'a> {
    pub fn new(buf: &'a [u8], origin: usize) -> Result<Self> {
        ensure!(
            origin <= buf.len(),
            "record origin {} beyond buffer of {} bytes",
            origin,
            buf.len()
        );
        Ok(Self { buf, origin })
    }

    pub(crate) fn from_parts(buf: &'a [u8], origin: usize) -> Self {
        debug_assert!(origin <= buf.len());
        Self { buf, origin }
    }

    pub fn buf(&self) -> &'a [u8] {
        self.buf
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    /// Everything before the origin, including bytes of preceding records.
    pub fn header(&self) -> &'a [u8] {
        &self.buf[..self.origin]
    }

    /// Everything from the origin to the end of the buffer.
    pub fn data(&self) -> &'a [u8] {
        &self.buf[self.origin..]
    }

    /// The byte `n` positions before the origin (`n >= 1`).
    pub(crate) fn byte_before(&self, n: usize) -> Result<u8> {
        if n == 0 || n > self.origin {
            bail!(
                "corrupt record: header read at origin-{} precedes buffer start (origin {})",
                n,
                self.origin
            );
        }
        Ok(self.buf[self.origin - n])
    }

    /// The last `len` header bytes, ending at the origin.
    pub(crate) fn header_tail(&self, len: usize) -> Result<&'a [u8]> {
        if len > self.origin {
            bail!(
                "corrupt record: {}-byte header does not fit before origin {}",
                len,
                self.origin
            );
        }
        Ok(&self.buf[self.origin - len..self.origin])
    }

    /// Data bytes `[start, end)` relative to the origin.
    pub(crate) fn data_range(&self, start: usize, end: usize) -> Result<&'a [u8]> {
        let data = self.data();
        if start > end || end > data.len() {
            bail!(
                "corrupt record: field bytes {}..{} beyond {} data bytes",
                start,
                end,
                data.len()
            );
        }
        Ok(&data[start..end])
    }
}

#[derive(Debug)]
pub struct RecordMut<'a> {
    buf: &'a mut [u8],
    origin: usize,
}

impl<'a> RecordMut<'a> {
    pub fn new(buf: &'a mut [u8], origin: usize) -> Result<Self> {
        ensure!(
            origin <= buf.len(),
            "record origin {} beyond buffer of {} bytes",
            origin,
            buf.len()
        );
        Ok(Self { buf, origin })
    }

    pub fn origin(&self) -> usize {
        self.origin
    }

    pub fn as_record(&self) -> RecordRef<'_> {
        RecordRef {
            buf: &*self.buf,
            origin: self.origin,
        }
    }

    pub fn data_mut(&mut self) -> &mut [u8] {
        &mut self.buf[self.origin..]
    }

    pub(crate) fn byte_before_mut(&mut self, n: usize) -> Result<&mut u8> {
        if n == 0 || n > self.origin {
            bail!(
                "corrupt record: header write at origin-{} precedes buffer start (origin {})",
                n,
                self.origin
            );
        }
        Ok(&mut self.buf[self.origin - n])
    }

    pub(crate) fn header_tail_mut(&mut self, len: usize) -> Result<&mut [u8]> {
        if len > self.origin {
            bail!(
                "corrupt record: {}-byte header does not fit before origin {}",
                len,
                self.origin
            );
        }
        let origin = self.origin;
        Ok(&mut self.buf[origin - len..origin])
    }
}

/// Placement of a freshly encoded record inside the caller's buffer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncodedRecord {
    pub origin: usize,
    pub len: usize,
}

impl EncodedRecord {
    pub fn extra_size(&self) -> usize {
        self.origin
    }

    pub fn data_size(&self) -> usize {
        self.len - self.origin
    }

    pub fn record<'b>(&self, buf: &'b [u8]) -> Result<RecordRef<'b>> {
        let buf_len = buf.len();
        let bytes = buf
            .get(..self.len)
            .ok_or_else(|| self.short_buffer(buf_len))?;
        RecordRef::new(bytes, self.origin)
    }

    pub fn record_mut<'b>(&self, buf: &'b mut [u8]) -> Result<RecordMut<'b>> {
        let buf_len = buf.len();
        let bytes = buf
            .get_mut(..self.len)
            .ok_or_else(|| self.short_buffer(buf_len))?;
        RecordMut::new(bytes, self.origin)
    }

    fn short_buffer(&self, buf_len: usize) -> eyre::Report {
        eyre!(
            "record of {} bytes does not fit in a {}-byte buffer",
            self.len,
            buf_len
        )
    }
}

/// Header and data sizes of a record before it is encoded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordSize {
    pub extra: usize,
    pub data: usize,
}

impl RecordSize {
    pub fn total(&self) -> usize {
        self.extra + self.data
    }
}
