//! CRC-8 variant used by the sensor: polynomial 0x31, init 0xFF, no final XOR.
//!
//! Every 2-byte data word on the wire is followed by this checksum. The
//! polynomial and initial value must match the datasheet bit-for-bit; any
//! deviation corrupts the protocol silently.

pub(crate) fn crc(data: &[u8]) -> u8 {
    let mut crc: u8 = 0xFF;
    for byte in data.iter().copied() {
        crc ^= byte;
        for _ in 0..8 {
            if crc & 0x80 == 0 {
                crc <<= 1;
            } else {
                crc = (crc << 1) ^ 0x31u8;
            }
        }
    }
    crc
}

pub(crate) fn validate(data: &[u8], expected: u8) -> bool {
    crc(data) == expected
}
