//! Field-level encode helpers (apply the proto3-style default-omission
//! rules) and the generic decoder that walks a message body into a flat
//! list of `(field_number, wire_type, payload)` triples, skipping fields it
//! doesn't recognize.

use crate::error::Result;
use crate::error::WireError;
use crate::varint::WIRE_LEN;
use crate::varint::WIRE_VARINT;
use crate::varint::decode_tag;
use crate::varint::decode_varint;
use crate::varint::encode_tag;
use crate::varint::encode_varint;

/// One decoded field. `Varint` carries the raw unsigned value; `Len` borrows
/// the payload bytes directly out of the input buffer (no copy).
#[derive(Debug, Clone, Copy)]
pub enum RawValue<'a> {
    Varint(u64),
    Len(&'a [u8]),
}

#[derive(Debug, Clone, Copy)]
pub struct RawField<'a> {
    pub field_number: u32,
    pub wire_type: u8,
    pub value: RawValue<'a>,
}

/// Writes an unsigned integer field, omitting it entirely when `value == 0`
/// per the default-omission rule.
pub fn write_varint_field(buf: &mut Vec<u8>, field_number: u32, value: u64) {
    if value == 0 {
        return;
    }
    encode_tag(field_number, WIRE_VARINT, buf);
    encode_varint(value, buf);
}

/// Writes a boolean field; only emitted when `true`.
pub fn write_bool_field(buf: &mut Vec<u8>, field_number: u32, value: bool) {
    if value {
        write_varint_field(buf, field_number, 1);
    }
}

/// Writes a string/bytes field, omitting it when empty.
pub fn write_bytes_field(buf: &mut Vec<u8>, field_number: u32, bytes: &[u8]) {
    if bytes.is_empty() {
        return;
    }
    encode_tag(field_number, WIRE_LEN, buf);
    encode_varint(bytes.len() as u64, buf);
    buf.extend_from_slice(bytes);
}

pub fn write_string_field(buf: &mut Vec<u8>, field_number: u32, s: &str) {
    write_bytes_field(buf, field_number, s.as_bytes());
}

/// Writes a nested-message field. Nested messages are always emitted when
/// present, even if their body is empty (this is how Cursor distinguishes
/// "message set, all fields default" from "message absent").
pub fn write_message_field(buf: &mut Vec<u8>, field_number: u32, body: &[u8]) {
    encode_tag(field_number, WIRE_LEN, buf);
    encode_varint(body.len() as u64, buf);
    buf.extend_from_slice(body);
}

/// Like [`write_varint_field`] but for a `oneof`-style variant that must be
/// emitted even when its value is the zero value (used by the generic
/// `Value` encoder, where a `Null`/`false`/`0` variant still has to be
/// distinguishable on the wire from "field absent").
pub fn write_varint_field_always(buf: &mut Vec<u8>, field_number: u32, value: u64) {
    encode_tag(field_number, WIRE_VARINT, buf);
    encode_varint(value, buf);
}

/// Walks `input` and yields every `(field_number, wire_type, payload)`
/// triple in wire order. Unknown wire types and out-of-range field numbers
/// are treated as fatal decode errors: this codec is schema-free but not
/// format-free, and a byte stream that doesn't parse as a sequence of
/// varint/LEN fields cannot belong to this protocol at all.
pub fn parse_fields(input: &[u8]) -> Result<Vec<RawField<'_>>> {
    let mut fields = Vec::new();
    let mut offset = 0usize;
    while offset < input.len() {
        let (tag, tag_len) = decode_varint(&input[offset..])?;
        offset += tag_len;
        let (field_number, wire_type) = decode_tag(tag)?;
        match wire_type {
            WIRE_VARINT => {
                let (value, len) = decode_varint(&input[offset..])?;
                offset += len;
                fields.push(RawField {
                    field_number,
                    wire_type,
                    value: RawValue::Varint(value),
                });
            }
            WIRE_LEN => {
                let (len, len_len) = decode_varint(&input[offset..])?;
                offset += len_len;
                let len = len as usize;
                if offset + len > input.len() {
                    return Err(WireError::TruncatedPayload {
                        wanted: len,
                        had: input.len() - offset,
                    });
                }
                let payload = &input[offset..offset + len];
                offset += len;
                fields.push(RawField {
                    field_number,
                    wire_type,
                    value: RawValue::Len(payload),
                });
            }
            other => return Err(WireError::UnknownWireType(other as u64)),
        }
    }
    Ok(fields)
}

impl<'a> RawField<'a> {
    pub fn as_bytes(&self) -> Option<&'a [u8]> {
        match self.value {
            RawValue::Len(bytes) => Some(bytes),
            RawValue::Varint(_) => None,
        }
    }

    pub fn as_str(&self) -> Option<&'a str> {
        self.as_bytes().and_then(|b| std::str::from_utf8(b).ok())
    }

    pub fn as_u64(&self) -> Option<u64> {
        match self.value {
            RawValue::Varint(v) => Some(v),
            RawValue::Len(_) => None,
        }
    }

    pub fn as_bool(&self) -> bool {
        matches!(self.value, RawValue::Varint(v) if v != 0)
    }
}

/// Finds the first field with the given number, if any.
pub fn find<'a>(fields: &'a [RawField<'a>], field_number: u32) -> Option<&'a RawField<'a>> {
    fields.iter().find(|f| f.field_number == field_number)
}

/// Finds every field with the given number, in wire order (used for
/// `repeated` fields like `Value::List`/`Value::Object` entries).
pub fn find_all<'a>(fields: &'a [RawField<'a>], field_number: u32) -> Vec<&'a RawField<'a>> {
    fields
        .iter()
        .filter(|f| f.field_number == field_number)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn default_values_are_omitted() {
        let mut buf = Vec::new();
        write_varint_field(&mut buf, 1, 0);
        write_bool_field(&mut buf, 2, false);
        write_string_field(&mut buf, 3, "");
        write_bytes_field(&mut buf, 4, &[]);
        assert_eq!(buf, Vec::<u8>::new());
    }

    #[test]
    fn non_default_values_round_trip() {
        let mut buf = Vec::new();
        write_varint_field(&mut buf, 1, 42);
        write_string_field(&mut buf, 2, "hi");
        let fields = parse_fields(&buf).unwrap();
        assert_eq!(fields.len(), 2);
        assert_eq!(find(&fields, 1).unwrap().as_u64(), Some(42));
        assert_eq!(find(&fields, 2).unwrap().as_str(), Some("hi"));
    }

    #[test]
    fn nested_message_emitted_even_when_empty() {
        let mut buf = Vec::new();
        write_message_field(&mut buf, 1, &[]);
        assert_eq!(buf, vec![0x0a, 0x00]);
    }

    #[test]
    fn unknown_fields_are_preserved_for_caller_to_skip() {
        let mut buf = Vec::new();
        write_varint_field(&mut buf, 99, 7);
        write_varint_field(&mut buf, 1, 1);
        let fields = parse_fields(&buf).unwrap();
        // The known-field lookup simply ignores field 99; nothing fails.
        assert_eq!(find(&fields, 1).unwrap().as_u64(), Some(1));
    }
}
