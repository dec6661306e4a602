//! # Logical Tuples
//!
//! A [`Tuple`] is what callers hand to the encoder: one [`FieldValue`] per
//! logical field, borrowing the payload bytes. Missing trailing fields read as
//! [`FieldValue::Default`].
//!
//! ```ignore
//! let tuple = Tuple::from(vec![
//!     FieldValue::Data(&7u32.to_be_bytes()),
//!     FieldValue::Null,
//! ]);
//! ```

use smallvec::SmallVec;

const INLINE_FIELDS: usize = 16;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldValue<'a> {
    Data(&'a [u8]),
    Null,
    /// Use the schema default; only valid where the row does not store the
    /// field.
    Default,
    /// Local prefix followed by a 20-byte external reference.
    External(&'a [u8]),
}

impl<'a> FieldValue<'a> {
    pub fn from_option(value: Option<&'a [u8]>) -> Self {
        match value {
            Some(bytes) => FieldValue::Data(bytes),
            None => FieldValue::Null,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, FieldValue::Null)
    }

    pub fn bytes(&self) -> Option<&'a [u8]> {
        match *self {
            FieldValue::Data(bytes) | FieldValue::External(bytes) => Some(bytes),
            FieldValue::Null | FieldValue::Default => None,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tuple<'a> {
    values: SmallVec<[FieldValue<'a>; INLINE_FIELDS]>,
}

impl<'a> Tuple<'a> {
    pub fn new() -> Self {
        Self {
            values: SmallVec::new(),
        }
    }

    pub fn with_capacity(n: usize) -> Self {
        Self {
            values: SmallVec::with_capacity(n),
        }
    }

    pub fn push(&mut self, value: FieldValue<'a>) -> &mut Self {
        self.values.push(value);
        self
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    /// Value of logical field `n`; fields past the end are `Default`.
    pub fn value(&self, n: usize) -> FieldValue<'a> {
        self.values.get(n).copied().unwrap_or(FieldValue::Default)
    }

    pub fn values(&self) -> &[FieldValue<'a>] {
        &self.values
    }

    pub fn iter(&self) -> impl Iterator<Item = &FieldValue<'a>> {
        self.values.iter()
    }
}

impl<'a> From<Vec<FieldValue<'a>>> for Tuple<'a> {
    fn from(values: Vec<FieldValue<'a>>) -> Self {
        Self {
            values: SmallVec::from_vec(values),
        }
    }
}

impl<'a> FromIterator<FieldValue<'a>> for Tuple<'a> {
    fn from_iter<I: IntoIterator<Item = FieldValue<'a>>>(iter: I) -> Self {
        Self {
            values: iter.into_iter().collect(),
        }
    }
}
