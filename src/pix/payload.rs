use std::str::FromStr;

use rust_decimal::{Decimal, RoundingStrategy};
use thiserror::Error;

use super::crc::checksum;

pub const PIX_GUI: &str = "br.gov.bcb.pix";
pub const CHECKSUM_HEADER: &str = "6304";

// Tag 26 holds "0014br.gov.bcb.pix" plus "01" + 2-digit length + key in 99 bytes.
const MAX_KEY_LEN: usize = 77;
const MAX_NAME_LEN: usize = 25;
const MAX_CITY_LEN: usize = 15;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum PixError {
    #[error("payload contains non-ASCII characters")]
    NonAscii,
    #[error("field at offset {offset} is truncated")]
    Truncated { offset: usize },
    #[error("field at offset {offset} has a non-numeric length")]
    InvalidLength { offset: usize },
    #[error("payload does not end with a checksum field")]
    MissingChecksum,
    #[error("checksum mismatch: expected {expected}, found {found}")]
    ChecksumMismatch { expected: String, found: String },
}

/// Static merchant identity embedded in every payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Merchant {
    pub key: String,
    pub name: String,
    pub city: String,
    pub reference_label: String,
}

impl Merchant {
    /// Key, name and city are cut to the BR Code limits (77, 25 and 15
    /// chars) and stripped of non-ASCII characters so field lengths stay
    /// byte-exact.
    pub fn new(key: &str, name: &str, city: &str) -> Self {
        Self {
            key: ascii_only(key, MAX_KEY_LEN),
            name: ascii_only(name, MAX_NAME_LEN),
            city: ascii_only(city, MAX_CITY_LEN),
            reference_label: "***".to_string(),
        }
    }

    /// Fields preceding the amount: format indicator, merchant account
    /// information, merchant category code and currency.
    pub fn account_block(&self) -> String {
        let account_info = format!("{}{}", field("00", PIX_GUI), field("01", &self.key));
        format!(
            "{}{}{}{}",
            field("00", "01"),
            field("26", &account_info),
            field("52", "0000"),
            field("53", "986"),
        )
    }

    /// Fields following the amount: country, merchant name, city and the
    /// additional data template.
    pub fn identity_block(&self) -> String {
        format!(
            "{}{}{}{}",
            field("58", "BR"),
            field("59", &self.name),
            field("60", &self.city),
            field("62", &field("05", &self.reference_label)),
        )
    }
}

impl Default for Merchant {
    fn default() -> Self {
        Self::new("onlipet@onlipet.com.br", "ONLIPET", "SAO PAULO")
    }
}

fn ascii_only(value: &str, max_len: usize) -> String {
    value.chars().filter(char::is_ascii).take(max_len).collect()
}

/// Tag, two-digit length, value.
pub fn field(tag: &str, value: &str) -> String {
    format!("{}{:02}{}", tag, value.len(), value)
}

pub fn format_amount(amount: Decimal) -> String {
    let mut rounded = amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

pub fn amount_field(amount: Decimal) -> String {
    field("54", &format_amount(amount))
}

/// Everything up to and including the `6304` checksum header.
pub fn encode_without_checksum(amount: Decimal, merchant: &Merchant) -> String {
    debug_assert!(!amount.is_sign_negative(), "PIX amounts are non-negative");
    format!(
        "{}{}{}{}",
        merchant.account_block(),
        amount_field(amount),
        merchant.identity_block(),
        CHECKSUM_HEADER,
    )
}

pub fn encode(amount: Decimal, merchant: &Merchant) -> String {
    let mut payload = encode_without_checksum(amount, merchant);
    let crc = checksum(&payload);
    payload.push_str(&crc);
    payload
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Field {
    pub tag: String,
    pub value: String,
}

#[derive(Debug, Clone)]
pub struct ParsedPayload {
    pub fields: Vec<Field>,
}

impl ParsedPayload {
    pub fn field(&self, tag: &str) -> Option<&str> {
        self.fields
            .iter()
            .find(|f| f.tag == tag)
            .map(|f| f.value.as_str())
    }

    pub fn amount(&self) -> Option<Decimal> {
        self.field("54").and_then(|v| Decimal::from_str(v).ok())
    }

    pub fn merchant_name(&self) -> Option<&str> {
        self.field("59")
    }
}

/// Splits a payload into its top-level fields and verifies the trailing
/// checksum.
pub fn parse(payload: &str) -> Result<ParsedPayload, PixError> {
    if !payload.is_ascii() {
        return Err(PixError::NonAscii);
    }

    let mut fields = Vec::new();
    let mut offset = 0;

    while offset < payload.len() {
        let header = payload
            .get(offset..offset + 4)
            .ok_or(PixError::Truncated { offset })?;
        let len: usize = header[2..]
            .parse()
            .map_err(|_| PixError::InvalidLength { offset })?;
        let value = payload
            .get(offset + 4..offset + 4 + len)
            .ok_or(PixError::Truncated { offset })?;

        fields.push(Field {
            tag: header[..2].to_string(),
            value: value.to_string(),
        });
        offset += 4 + len;
    }

    match fields.last() {
        Some(last) if last.tag == "63" && last.value.len() == 4 => {
            let expected = checksum(&payload[..payload.len() - 4]);
            if expected != last.value {
                return Err(PixError::ChecksumMismatch {
                    expected,
                    found: last.value.clone(),
                });
            }
        }
        _ => return Err(PixError::MissingChecksum),
    }

    Ok(ParsedPayload { fields })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn merchant() -> Merchant {
        Merchant::default()
    }

    #[test]
    fn test_amount_formatting() {
        assert_eq!(format_amount(Decimal::new(4990, 2)), "49.90");
        assert_eq!(format_amount(Decimal::new(30, 0)), "30.00");
        assert_eq!(format_amount(Decimal::ZERO), "0.00");
        assert_eq!(format_amount(Decimal::new(12345, 3)), "12.35");
    }

    #[test]
    fn test_pro_price_embeds_amount_field() {
        let payload = encode(Decimal::new(4990, 2), &merchant());
        assert!(payload.contains("540549.90"));
    }

    #[test]
    fn test_basic_price_payload_length() {
        let m = merchant();
        let payload = encode(Decimal::new(2990, 2), &m);

        assert!(payload.contains("540529.90"));
        let fixed = m.account_block().len() + "5405".len() + m.identity_block().len() + CHECKSUM_HEADER.len() + 4;
        assert_eq!(payload.len(), fixed + "29.90".len());
    }

    #[test]
    fn test_checksum_round_trip() {
        let m = merchant();
        for cents in [0_i64, 1, 990, 2990, 4990, 29990, 1_000_000] {
            let payload = encode(Decimal::new(cents, 2), &m);
            let (body, crc) = payload.split_at(payload.len() - 4);
            assert_eq!(checksum(body), crc);
            assert_eq!(body, encode_without_checksum(Decimal::new(cents, 2), &m));
        }
    }

    #[test]
    fn test_payload_ends_with_uppercase_hex() {
        let payload = encode(Decimal::new(29990, 2), &merchant());
        let tail = &payload[payload.len() - 4..];
        assert!(tail.chars().all(|c| c.is_ascii_digit() || ('A'..='F').contains(&c)));
        assert_eq!(&payload[payload.len() - 8..payload.len() - 4], CHECKSUM_HEADER);
    }

    #[test]
    fn test_static_layout() {
        let payload = encode(Decimal::new(4990, 2), &merchant());
        assert!(payload.starts_with("000201"));
        assert!(payload.contains("0014br.gov.bcb.pix"));
        assert!(payload.contains("52040000"));
        assert!(payload.contains("5303986"));
        assert!(payload.contains("5802BR"));
        assert!(payload.contains("5907ONLIPET"));
        assert!(payload.contains("6009SAO PAULO"));
        assert!(payload.contains("62070503***"));
    }

    #[test]
    fn test_merchant_fields_are_truncated() {
        let m = Merchant::new("key", "ASSOCIACAO PROTETORA DOS ANIMAIS", "SAO JOSE DOS CAMPOS");
        assert_eq!(m.name.len(), 25);
        assert_eq!(m.city.len(), 15);

        let m = Merchant::new("key", "São Paulo Pets", "São Paulo");
        assert_eq!(m.name, "So Paulo Pets");
    }

    #[test]
    fn test_long_key_is_capped() {
        let key = "k".repeat(85);
        let merchant = Merchant::new(&key, "ONLIPET", "SAO PAULO");
        assert_eq!(merchant.key.len(), MAX_KEY_LEN);

        let payload = encode(Decimal::new(2990, 2), &merchant);
        let parsed = parse(&payload).unwrap();
        assert_eq!(parsed.field("26").map(str::len), Some(99));
    }

    #[test]
    fn test_parse_valid_payload() {
        let payload = encode(Decimal::new(4990, 2), &merchant());
        let parsed = parse(&payload).unwrap();

        assert_eq!(parsed.amount(), Some(Decimal::new(4990, 2)));
        assert_eq!(parsed.merchant_name(), Some("ONLIPET"));
        assert_eq!(parsed.field("58"), Some("BR"));
        assert_eq!(parsed.fields.last().map(|f| f.tag.as_str()), Some("63"));
    }

    #[test]
    fn test_parse_detects_tampering() {
        let payload = encode(Decimal::new(4990, 2), &merchant());
        let tampered = payload.replace("540549.90", "540519.90");

        assert!(matches!(
            parse(&tampered),
            Err(PixError::ChecksumMismatch { .. })
        ));
    }

    #[test]
    fn test_parse_rejects_malformed_input() {
        assert_eq!(parse("000201").unwrap_err(), PixError::MissingChecksum);
        assert_eq!(parse("0002").unwrap_err(), PixError::Truncated { offset: 0 });
        assert_eq!(parse("00XX01").unwrap_err(), PixError::InvalidLength { offset: 0 });
        assert_eq!(parse("0002ção").unwrap_err(), PixError::NonAscii);
    }
}
