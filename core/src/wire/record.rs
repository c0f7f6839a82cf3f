//! Field records — the flat key/value layer under every message grammar
//!
//! A record is a sequence of fields, each `[key_len u8][key][value_len
//! u32 LE][value]`. Extraction is a linear, non-recursive, left-to-right
//! scan: callers name the fields they expect in the order they were
//! written. Nesting is expressed by carrying a complete encoded record as
//! a field value. Because every field is length-prefixed, values may
//! contain any byte sequence, including text that looks like a key.

use super::WireError;

/// Builds a field record in write order.
#[derive(Debug, Default)]
pub struct RecordWriter {
    buf: Vec<u8>,
}

impl RecordWriter {
    pub fn new() -> Self {
        Self { buf: Vec::new() }
    }

    /// Append one field. Keys are capped at 255 bytes by the format.
    pub fn field(&mut self, key: &str, value: &[u8]) -> Result<(), WireError> {
        if key.len() > u8::MAX as usize {
            return Err(WireError::KeyTooLong(key.len()));
        }
        self.buf.push(key.len() as u8);
        self.buf.extend_from_slice(key.as_bytes());
        self.buf
            .extend_from_slice(&(value.len() as u32).to_le_bytes());
        self.buf.extend_from_slice(value);
        Ok(())
    }

    /// Append a text field.
    pub fn field_str(&mut self, key: &str, value: &str) -> Result<(), WireError> {
        self.field(key, value.as_bytes())
    }

    /// Append an unsigned number as decimal text.
    pub fn field_u64(&mut self, key: &str, value: u64) -> Result<(), WireError> {
        self.field(key, value.to_string().as_bytes())
    }

    /// Append a signed number as decimal text.
    pub fn field_i64(&mut self, key: &str, value: i64) -> Result<(), WireError> {
        self.field(key, value.to_string().as_bytes())
    }

    /// Append a nested record as a single field.
    pub fn nested(&mut self, key: &str, inner: RecordWriter) -> Result<(), WireError> {
        self.field(key, &inner.finish())
    }

    pub fn finish(self) -> Vec<u8> {
        self.buf
    }
}

/// Consumes a field record strictly left-to-right.
#[derive(Debug, Clone)]
pub struct RecordReader<'a> {
    buf: &'a [u8],
    pos: usize,
}

impl<'a> RecordReader<'a> {
    pub fn new(buf: &'a [u8]) -> Self {
        Self { buf, pos: 0 }
    }

    /// True once every field has been consumed.
    pub fn is_empty(&self) -> bool {
        self.pos >= self.buf.len()
    }

    /// Read the next field without checking its key.
    fn next(&mut self) -> Result<(&'a str, &'a [u8]), WireError> {
        let need = |n: usize, got: usize| WireError::Truncated { need: n, got };

        if self.pos + 1 > self.buf.len() {
            return Err(need(self.pos + 1, self.buf.len()));
        }
        let key_len = self.buf[self.pos] as usize;
        let key_end = self.pos + 1 + key_len;
        if key_end + 4 > self.buf.len() {
            return Err(need(key_end + 4, self.buf.len()));
        }
        let key = std::str::from_utf8(&self.buf[self.pos + 1..key_end]).map_err(|_| {
            WireError::BadText {
                key: String::from("<key>"),
            }
        })?;

        let len_bytes: [u8; 4] = self.buf[key_end..key_end + 4]
            .try_into()
            .map_err(|_| need(key_end + 4, self.buf.len()))?;
        let value_len = u32::from_le_bytes(len_bytes) as usize;
        let value_end = key_end + 4 + value_len;
        if value_end > self.buf.len() {
            return Err(need(value_end, self.buf.len()));
        }
        let value = &self.buf[key_end + 4..value_end];

        self.pos = value_end;
        Ok((key, value))
    }

    /// Read the next field, which must carry `key`.
    pub fn field(&mut self, key: &str) -> Result<&'a [u8], WireError> {
        let (found, value) = self.next()?;
        if found != key {
            return Err(WireError::KeyMismatch {
                expected: key.to_string(),
                found: found.to_string(),
            });
        }
        Ok(value)
    }

    /// Read the next field only if it carries `key`; otherwise leave the
    /// cursor in place. Supports optional trailing fields in a grammar.
    pub fn try_field(&mut self, key: &str) -> Result<Option<&'a [u8]>, WireError> {
        if self.is_empty() {
            return Ok(None);
        }
        let saved = self.pos;
        let (found, value) = self.next()?;
        if found == key {
            Ok(Some(value))
        } else {
            self.pos = saved;
            Ok(None)
        }
    }

    pub fn field_str(&mut self, key: &str) -> Result<&'a str, WireError> {
        let value = self.field(key)?;
        std::str::from_utf8(value).map_err(|_| WireError::BadText {
            key: key.to_string(),
        })
    }

    pub fn field_u64(&mut self, key: &str) -> Result<u64, WireError> {
        let text = self.field_str(key)?;
        text.parse().map_err(|_| WireError::BadNumber {
            key: key.to_string(),
            value: text.to_string(),
        })
    }

    pub fn field_u32(&mut self, key: &str) -> Result<u32, WireError> {
        let text = self.field_str(key)?;
        text.parse().map_err(|_| WireError::BadNumber {
            key: key.to_string(),
            value: text.to_string(),
        })
    }

    pub fn field_i64(&mut self, key: &str) -> Result<i64, WireError> {
        let text = self.field_str(key)?;
        text.parse().map_err(|_| WireError::BadNumber {
            key: key.to_string(),
            value: text.to_string(),
        })
    }

    pub fn try_field_u32(&mut self, key: &str) -> Result<Option<u32>, WireError> {
        match self.try_field(key)? {
            None => Ok(None),
            Some(value) => {
                let text = std::str::from_utf8(value).map_err(|_| WireError::BadText {
                    key: key.to_string(),
                })?;
                let n = text.parse().map_err(|_| WireError::BadNumber {
                    key: key.to_string(),
                    value: text.to_string(),
                })?;
                Ok(Some(n))
            }
        }
    }

    pub fn try_field_i64(&mut self, key: &str) -> Result<Option<i64>, WireError> {
        match self.try_field(key)? {
            None => Ok(None),
            Some(value) => {
                let text = std::str::from_utf8(value).map_err(|_| WireError::BadText {
                    key: key.to_string(),
                })?;
                let n = text.parse().map_err(|_| WireError::BadNumber {
                    key: key.to_string(),
                    value: text.to_string(),
                })?;
                Ok(Some(n))
            }
        }
    }

    /// Read the next field as a nested record.
    pub fn nested(&mut self, key: &str) -> Result<RecordReader<'a>, WireError> {
        Ok(RecordReader::new(self.field(key)?))
    }
}

/// Encode an ordered field sequence into a record.
pub fn encode(fields: &[(&str, &[u8])]) -> Result<Vec<u8>, WireError> {
    let mut writer = RecordWriter::new();
    for (key, value) in fields {
        writer.field(key, value)?;
    }
    Ok(writer.finish())
}

/// Decode a record against a grammar: the ordered list of expected keys.
/// Returns the field values in grammar order; a missing or out-of-order
/// field is an error.
pub fn decode<'a>(raw: &'a [u8], grammar: &[&str]) -> Result<Vec<&'a [u8]>, WireError> {
    let mut reader = RecordReader::new(raw);
    let mut values = Vec::with_capacity(grammar.len());
    for key in grammar {
        values.push(reader.field(key)?);
    }
    Ok(values)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_roundtrip_grammar() {
        let fields: &[(&str, &[u8])] = &[("c", b"8"), ("o", b"3"), ("q", b"0")];
        let raw = encode(fields).unwrap();
        let values = decode(&raw, &["c", "o", "q"]).unwrap();
        assert_eq!(values, vec![&b"8"[..], &b"3"[..], &b"0"[..]]);
    }

    #[test]
    fn test_missing_field_is_error() {
        let raw = encode(&[("c", b"8"), ("q", b"0")]).unwrap();
        let result = decode(&raw, &["c", "o", "q"]);
        assert!(matches!(result, Err(WireError::KeyMismatch { .. })));
    }

    #[test]
    fn test_value_may_contain_key_text() {
        // The source format broke when a value collided with a later
        // marker; length prefixes make the collision harmless.
        let raw = encode(&[("name", b"o:q:end"), ("o", b"3")]).unwrap();
        let values = decode(&raw, &["name", "o"]).unwrap();
        assert_eq!(values[0], b"o:q:end");
        assert_eq!(values[1], b"3");
    }

    #[test]
    fn test_truncated_buffer() {
        let raw = encode(&[("utility", b"14")]).unwrap();
        let result = decode(&raw[..raw.len() - 1], &["utility"]);
        assert!(matches!(result, Err(WireError::Truncated { .. })));
    }

    #[test]
    fn test_numeric_helpers() {
        let mut writer = RecordWriter::new();
        writer.field_u64("utility", 14).unwrap();
        writer.field_i64("rtt", -7).unwrap();
        let raw = writer.finish();

        let mut reader = RecordReader::new(&raw);
        assert_eq!(reader.field_u64("utility").unwrap(), 14);
        assert_eq!(reader.field_i64("rtt").unwrap(), -7);
        assert!(reader.is_empty());
    }

    #[test]
    fn test_bad_number() {
        let mut writer = RecordWriter::new();
        writer.field_str("c", "eight").unwrap();
        let raw = writer.finish();

        let mut reader = RecordReader::new(&raw);
        let result = reader.field_u32("c");
        assert!(matches!(result, Err(WireError::BadNumber { .. })));
    }

    #[test]
    fn test_optional_field_present_and_absent() {
        let mut writer = RecordWriter::new();
        writer.field_u64("c", 4).unwrap();
        writer.field_u64("rtt", 20).unwrap();
        let raw = writer.finish();

        let mut reader = RecordReader::new(&raw);
        assert_eq!(reader.field_u32("c").unwrap(), 4);
        // "utility" was not written; the cursor must not advance.
        assert_eq!(reader.try_field_u32("utility").unwrap(), None);
        assert_eq!(reader.try_field_i64("rtt").unwrap(), Some(20));
        assert!(reader.is_empty());
    }

    #[test]
    fn test_nested_record() {
        let mut inner = RecordWriter::new();
        inner.field_str("name", "matrix-a").unwrap();
        inner.field_u64("size", 4096).unwrap();

        let mut outer = RecordWriter::new();
        outer.field_u64("inputsize", 1).unwrap();
        outer.nested("input", inner).unwrap();
        let raw = outer.finish();

        let mut reader = RecordReader::new(&raw);
        assert_eq!(reader.field_u64("inputsize").unwrap(), 1);
        let mut input = reader.nested("input").unwrap();
        assert_eq!(input.field_str("name").unwrap(), "matrix-a");
        assert_eq!(input.field_u64("size").unwrap(), 4096);
    }

    #[test]
    fn test_key_too_long() {
        let long_key = "k".repeat(300);
        let mut writer = RecordWriter::new();
        let result = writer.field(&long_key, b"v");
        assert!(matches!(result, Err(WireError::KeyTooLong(300))));
    }

    #[test]
    fn test_empty_record() {
        let raw = encode(&[]).unwrap();
        assert!(raw.is_empty());
        let reader = RecordReader::new(&raw);
        assert!(reader.is_empty());
    }
}
