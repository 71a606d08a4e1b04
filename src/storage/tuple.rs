//! Tuples, field types and the fixed-width tuple encoding.
//!
//! Every tuple of a table has the same encoded width, given by its
//! [`TupleDesc`]. That is what lets a heap page be a plain array of slots.
//!
//! # Field encoding
//! ```text
//! Int      4 bytes, big-endian i32
//! Str(n)   4-byte big-endian length, then n bytes (zero padded)
//! ```

use std::fmt;

use crate::common::{Error, PageId, Result};

/// The type of one column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FieldType {
    /// 32-bit signed integer.
    Int,
    /// String of at most `n` bytes, stored in a fixed `4 + n` byte cell.
    Str(usize),
}

impl FieldType {
    /// Encoded width of a value of this type, in bytes.
    #[inline]
    pub fn width(&self) -> usize {
        match self {
            FieldType::Int => 4,
            FieldType::Str(max_len) => 4 + max_len,
        }
    }
}

/// A single column value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Field {
    Int(i32),
    Str(String),
}

impl Field {
    /// The integer value, if this is an `Int` field.
    pub fn as_int(&self) -> Option<i32> {
        match self {
            Field::Int(v) => Some(*v),
            Field::Str(_) => None,
        }
    }

    /// The string value, if this is a `Str` field.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Field::Str(s) => Some(s),
            Field::Int(_) => None,
        }
    }

    fn conforms_to(&self, ty: FieldType) -> bool {
        match (self, ty) {
            (Field::Int(_), FieldType::Int) => true,
            (Field::Str(s), FieldType::Str(max_len)) => s.len() <= max_len,
            _ => false,
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Field::Int(v) => write!(f, "{}", v),
            Field::Str(s) => write!(f, "{}", s),
        }
    }
}

impl From<i32> for Field {
    fn from(v: i32) -> Self {
        Field::Int(v)
    }
}

impl From<&str> for Field {
    fn from(s: &str) -> Self {
        Field::Str(s.to_string())
    }
}

/// Where a stored tuple lives: page plus slot number.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RecordId {
    pub page_id: PageId,
    pub slot: usize,
}

impl RecordId {
    pub fn new(page_id: PageId, slot: usize) -> Self {
        Self { page_id, slot }
    }
}

impl fmt::Display for RecordId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.page_id, self.slot)
    }
}

/// Schema of a table: the ordered list of column types.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TupleDesc {
    types: Vec<FieldType>,
}

impl TupleDesc {
    /// Create a descriptor from column types.
    ///
    /// # Panics
    /// Panics if `types` is empty.
    pub fn new(types: Vec<FieldType>) -> Self {
        assert!(!types.is_empty(), "a tuple needs at least one field");
        Self { types }
    }

    /// Number of columns.
    #[inline]
    pub fn num_fields(&self) -> usize {
        self.types.len()
    }

    /// Type of column `i`.
    #[inline]
    pub fn field_type(&self, i: usize) -> Option<FieldType> {
        self.types.get(i).copied()
    }

    pub fn types(&self) -> &[FieldType] {
        &self.types
    }

    /// Encoded width of one tuple, in bytes.
    pub fn tuple_width(&self) -> usize {
        self.types.iter().map(FieldType::width).sum()
    }

    /// Check that `tuple` has this shape.
    pub fn validate(&self, tuple: &Tuple) -> Result<()> {
        if tuple.fields.len() != self.types.len() {
            return Err(Error::SchemaMismatch(format!(
                "expected {} fields, got {}",
                self.types.len(),
                tuple.fields.len()
            )));
        }
        for (i, (field, ty)) in tuple.fields.iter().zip(&self.types).enumerate() {
            if !field.conforms_to(*ty) {
                return Err(Error::SchemaMismatch(format!(
                    "field {} ({:?}) does not fit {:?}",
                    i, field, ty
                )));
            }
        }
        Ok(())
    }

    /// Encode `tuple` into `out`, which must be exactly `tuple_width()` bytes.
    ///
    /// The tuple must already have passed [`validate`](Self::validate).
    pub(crate) fn encode(&self, tuple: &Tuple, out: &mut [u8]) {
        debug_assert_eq!(out.len(), self.tuple_width());
        let mut pos = 0;
        for (field, ty) in tuple.fields.iter().zip(&self.types) {
            let cell = &mut out[pos..pos + ty.width()];
            match field {
                Field::Int(v) => cell.copy_from_slice(&v.to_be_bytes()),
                Field::Str(s) => {
                    let bytes = s.as_bytes();
                    cell[..4].copy_from_slice(&(bytes.len() as u32).to_be_bytes());
                    cell[4..4 + bytes.len()].copy_from_slice(bytes);
                    cell[4 + bytes.len()..].fill(0);
                }
            }
            pos += ty.width();
        }
    }

    /// Decode one tuple from exactly `tuple_width()` bytes.
    ///
    /// Returns a description of the problem on malformed input; the page
    /// decoder wraps it with the page id.
    pub(crate) fn decode(&self, bytes: &[u8]) -> std::result::Result<Tuple, String> {
        debug_assert_eq!(bytes.len(), self.tuple_width());
        let mut fields = Vec::with_capacity(self.types.len());
        let mut pos = 0;
        for ty in &self.types {
            let cell = &bytes[pos..pos + ty.width()];
            let field = match ty {
                FieldType::Int => Field::Int(i32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]])),
                FieldType::Str(max_len) => {
                    let len = u32::from_be_bytes([cell[0], cell[1], cell[2], cell[3]]) as usize;
                    if len > *max_len {
                        return Err(format!("string length {} exceeds {}", len, max_len));
                    }
                    let s = std::str::from_utf8(&cell[4..4 + len])
                        .map_err(|e| format!("invalid utf-8 in string field: {}", e))?;
                    Field::Str(s.to_string())
                }
            };
            fields.push(field);
            pos += ty.width();
        }
        Ok(Tuple::new(fields))
    }
}

/// A row: ordered field values plus, once stored, its [`RecordId`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Tuple {
    fields: Vec<Field>,
    record_id: Option<RecordId>,
}

impl Tuple {
    pub fn new(fields: Vec<Field>) -> Self {
        Self {
            fields,
            record_id: None,
        }
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    pub fn field(&self, i: usize) -> Option<&Field> {
        self.fields.get(i)
    }

    /// Replace column `i`. Ignored if out of range.
    pub fn set_field(&mut self, i: usize, value: Field) {
        if let Some(slot) = self.fields.get_mut(i) {
            *slot = value;
        }
    }

    /// Location of this tuple, if it has been stored.
    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn set_record_id(&mut self, record_id: Option<RecordId>) {
        self.record_id = record_id;
    }
}

impl fmt::Display for Tuple {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut first = true;
        for field in &self.fields {
            if !first {
                write!(f, "\t")?;
            }
            write!(f, "{}", field)?;
            first = false;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn desc() -> TupleDesc {
        TupleDesc::new(vec![FieldType::Int, FieldType::Str(8)])
    }

    #[test]
    fn test_tuple_width() {
        assert_eq!(desc().tuple_width(), 4 + 4 + 8);
        assert_eq!(TupleDesc::new(vec![FieldType::Int; 3]).tuple_width(), 12);
    }

    #[test]
    fn test_validate() {
        let d = desc();
        assert!(d.validate(&Tuple::new(vec![1.into(), "abc".into()])).is_ok());
        assert!(d.validate(&Tuple::new(vec![1.into()])).is_err());
        assert!(d.validate(&Tuple::new(vec!["x".into(), "abc".into()])).is_err());
        // 9 bytes does not fit Str(8)
        assert!(d
            .validate(&Tuple::new(vec![1.into(), "abcdefghi".into()]))
            .is_err());
    }

    #[test]
    fn test_encoding_byte_layout() {
        let d = desc();
        let tuple = Tuple::new(vec![Field::Int(0x01020304), "hi".into()]);
        let mut buf = vec![0xFFu8; d.tuple_width()];
        d.encode(&tuple, &mut buf);

        assert_eq!(&buf[0..4], &[1, 2, 3, 4]); // big-endian int
        assert_eq!(&buf[4..8], &[0, 0, 0, 2]); // string length
        assert_eq!(&buf[8..10], b"hi");
        assert!(buf[10..].iter().all(|&b| b == 0)); // padding
    }

    #[test]
    fn test_decode_negative_int() {
        let d = TupleDesc::new(vec![FieldType::Int]);
        let tuple = Tuple::new(vec![Field::Int(-17)]);
        let mut buf = vec![0u8; 4];
        d.encode(&tuple, &mut buf);
        assert_eq!(d.decode(&buf).unwrap().fields(), tuple.fields());
    }

    #[test]
    fn test_decode_rejects_bad_length() {
        let d = TupleDesc::new(vec![FieldType::Str(4)]);
        let buf = [0, 0, 0, 9, b'a', b'b', b'c', b'd'];
        assert!(d.decode(&buf).is_err());
    }

    #[test]
    fn test_display() {
        let tuple = Tuple::new(vec![7.into(), "seven".into()]);
        assert_eq!(format!("{}", tuple), "7\tseven");
    }
}
