/// CRC-16/CCITT-FALSE as used by the PIX BR Code checksum field (tag 63).
///
/// Polynomial `0x1021`, initial register `0xFFFF`, MSB-first, no reflection
/// and no final XOR.
pub const POLYNOMIAL: u16 = 0x1021;
pub const INITIAL: u16 = 0xFFFF;

pub fn crc16_ccitt_false(data: &[u8]) -> u16 {
    let mut crc = INITIAL;

    for &byte in data {
        crc ^= (byte as u16) << 8;
        for _ in 0..8 {
            if crc & 0x8000 != 0 {
                crc = (crc << 1) ^ POLYNOMIAL;
            } else {
                crc <<= 1;
            }
        }
    }

    crc
}

/// Checksum of `input` rendered as 4 uppercase hex digits.
pub fn checksum(input: &str) -> String {
    format!("{:04X}", crc16_ccitt_false(input.as_bytes()))
}
