//! Hand-rolled binary codec for Cursor's bidirectional Agent protocol.
//!
//! This is deliberately narrow: there is no schema compiler, no descriptor
//! pool, no support for wire types this protocol never uses. It encodes and
//! decodes exactly the shapes `cursor-protocol` needs, the way a team would
//! hand-write a decoder for one proprietary wire format rather than pull in
//! a general-purpose protobuf runtime for a handful of message kinds.

pub mod error;
pub mod fields;
pub mod frame;
pub mod varint;
pub mod value;

pub use error::Result;
pub use error::WireError;
pub use fields::RawField;
pub use fields::RawValue;
pub use fields::find;
pub use fields::find_all;
pub use fields::parse_fields;
pub use fields::write_bool_field;
pub use fields::write_bytes_field;
pub use fields::write_message_field;
pub use fields::write_string_field;
pub use fields::write_varint_field;
pub use fields::write_varint_field_always;
pub use frame::Frame;
pub use frame::FrameReader;
pub use frame::check_trailer;
pub use frame::encode_frame;
pub use value::Value;
pub use varint::WIRE_LEN;
pub use varint::WIRE_VARINT;
pub use varint::decode_tag;
pub use varint::decode_varint;
pub use varint::encode_signed32_as_varint;
pub use varint::encode_tag;
pub use varint::encode_varint;
