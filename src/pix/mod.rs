//! PIX "copia e cola" payload generation (EMV BR Code, static form).

pub mod crc;
pub mod payload;

pub use crc::checksum;
pub use payload::{encode, encode_without_checksum, parse, Merchant, ParsedPayload, PixError};
