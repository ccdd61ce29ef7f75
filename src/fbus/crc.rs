//! # FBus Checksum
//!
//! 8-bit end-around-carry checksum used by every FBus frame.
//!
//! The covered bytes are summed as 16-bit, any carry out of the low byte is
//! folded back in until the sum fits in 8 bits, and the frame carries
//! `0xFF - sum`.

/// Sum `data` with end-around carry folding
///
/// # Arguments
///
/// * `data` - Bytes covered by the checksum
///
/// # Returns
///
/// * `u8` - Folded sum
pub fn folded_sum(data: &[u8]) -> u8 {
    let mut sum: u32 = data.iter().map(|&b| b as u32).sum();

    while sum > 0xFF {
        sum = (sum & 0xFF) + (sum >> 8);
    }

    sum as u8
}

/// Calculate the FBus checksum byte for `data`
///
/// # Arguments
///
/// * `data` - Bytes covered by the checksum (frame body without size/CRC)
///
/// # Returns
///
/// * `u8` - Checksum byte to append to the frame
///
/// # Examples
///
/// ```
/// use fbus_receiver::fbus::crc::fbus_checksum;
///
/// assert_eq!(fbus_checksum(&[]), 0xFF);
/// assert_eq!(fbus_checksum(&[0x10, 0x20]), 0xCF);
/// ```
pub fn fbus_checksum(data: &[u8]) -> u8 {
    0xFF - folded_sum(data)
}

/// Check `data` against a received checksum byte
pub fn verify_checksum(data: &[u8], crc: u8) -> bool {
    fbus_checksum(data) == crc
}
