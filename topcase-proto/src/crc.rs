//! CRC-16 checksum for packets and messages.
//!
//! The controller uses the reflected 0x8005 polynomial with a zero seed and no
//! final xor (CRC-16/ARC), computed with a 256-entry lookup table.

use crc::{Crc, CRC_16_ARC};

/// CRC-16/ARC calculator with 256-entry lookup table.
const CRC16: Crc<u16> = Crc::<u16>::new(&CRC_16_ARC);

/// Calculate the CRC-16 of a byte slice.
#[inline]
#[must_use]
pub fn crc16(data: &[u8]) -> u16 {
    CRC16.checksum(data)
}

#[cfg(test)]
mod tests {
    use super::*;

    // Byte-at-a-time table walk as the controller firmware does it.
    fn reference_crc16(data: &[u8]) -> u16 {
        let mut table = [0u16; 256];
        for (i, entry) in table.iter_mut().enumerate() {
            let mut c = i as u16;
            for _ in 0..8 {
                c = if c & 1 != 0 { (c >> 1) ^ 0xA001 } else { c >> 1 };
            }
            *entry = c;
        }

        let mut crc = 0u16;
        for &b in data {
            crc = (crc >> 8) ^ table[((crc ^ u16::from(b)) & 0xff) as usize];
        }
        crc
    }

    #[test]
    fn test_crc16_empty() {
        assert_eq!(crc16(&[]), 0x0000);
    }

    #[test]
    fn test_crc16_all_zero() {
        assert_eq!(crc16(&[0u8; 16]), 0x0000);
        assert_eq!(crc16(&[0u8; 254]), 0x0000);
    }

    #[test]
    fn test_crc16_all_ff() {
        assert_eq!(crc16(&[0xFF]), 0x4040);
        assert_eq!(crc16(&[0xFF; 16]), 0x7040);
    }

    #[test]
    fn test_crc16_check_value() {
        assert_eq!(crc16(b"123456789"), 0xBB3D);
        assert_eq!(crc16(&[0xAA, 0xBB]), 0xD33E);
    }

    #[test]
    fn test_crc16_matches_table_walk() {
        let mut data = [0u8; 256];
        for (i, b) in data.iter_mut().enumerate() {
            *b = (i as u8).wrapping_mul(37).wrapping_add(11);
        }
        for len in [0, 1, 2, 7, 8, 63, 128, 246, 254, 256] {
            assert_eq!(crc16(&data[..len]), reference_crc16(&data[..len]), "len {len}");
        }
    }
}
