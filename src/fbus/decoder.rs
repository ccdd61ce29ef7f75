//! # FBus Frame Decoder
//!
//! Field-by-field decoding of control frames and downlink/uplink frames from
//! raw byte slices. Every decoder reports whether the slice is incomplete,
//! malformed or valid, so the protocol engine can decide between waiting for
//! more bytes and resynchronizing.

use bytes::Buf;

use super::crc::fbus_checksum;
use super::protocol::*;

/// Unpack 8 channels (11 bits each, LSB first) from 11 packed bytes
///
/// # Arguments
///
/// * `src` - At least 11 packed bytes
/// * `dst` - Destination for the 8 decoded values
///
/// # Algorithm
///
/// ```text
/// Ch1 = B0[0:7]  | B1[0:2]
/// Ch2 = B1[3:7]  | B2[0:5]
/// Ch3 = B2[6:7]  | B3[0:7] | B4[0]
/// ...
/// Ch8 = B9[5:7]  | B10[0:7]
/// ```
pub fn unpack_8_channels(src: &[u8], dst: &mut [u16]) {
    let b = |i: usize| src[i] as u16;

    dst[0] = b(0) | ((b(1) & 0x07) << 8);
    dst[1] = ((b(1) & 0xF8) >> 3) | ((b(2) & 0x3F) << 5);
    dst[2] = ((b(2) & 0xC0) >> 6) | (b(3) << 2) | ((b(4) & 0x01) << 10);
    dst[3] = ((b(4) & 0xFE) >> 1) | ((b(5) & 0x0F) << 7);
    dst[4] = ((b(5) & 0xF0) >> 4) | ((b(6) & 0x7F) << 4);
    dst[5] = ((b(6) & 0x80) >> 7) | (b(7) << 1) | ((b(8) & 0x03) << 9);
    dst[6] = ((b(8) & 0xFC) >> 2) | ((b(9) & 0x1F) << 6);
    dst[7] = ((b(9) & 0xE0) >> 5) | (b(10) << 3);
}

/// Check the header of a control frame without requiring the full frame
///
/// # Returns
///
/// * `Ok(len)` - Total frame length announced by the size byte
/// * `Err(FrameError)` - Incomplete header, wrong id byte or unknown size
pub fn check_control_header(buf: &[u8]) -> Result<usize, FrameError> {
    if buf.len() < FBUS_CONTROL_HDR_SIZE {
        return Err(FrameError::Incomplete { needed: FBUS_CONTROL_HDR_SIZE });
    }

    if buf[1] != FBUS_CONTROL_HDR {
        return Err(FrameError::BadHeader(buf[1]));
    }

    if control_channel_count(buf[0]).is_none() {
        return Err(FrameError::BadSize(buf[0]));
    }

    Ok(control_frame_len(buf[0]))
}

/// Decode a complete control frame
///
/// # Arguments
///
/// * `buf` - Buffered bytes starting at the frame's size byte
///
/// # Returns
///
/// * `Result<ControlFrame, FrameError>` - Decoded frame, or why it is not one
///
/// # Errors
///
/// Returns error if:
/// - Fewer bytes than the announced frame length are buffered
/// - The id byte is not 0xFF
/// - The size byte is not 8, 16 or 24 channels
/// - The checksum over `[2 .. size+2)` does not match
pub fn decode_control_frame(buf: &[u8]) -> Result<ControlFrame, FrameError> {
    let len = check_control_header(buf)?;
    if buf.len() < len {
        return Err(FrameError::Incomplete { needed: len });
    }

    let size = buf[0] as usize;
    let body = &buf[FBUS_CONTROL_HDR_SIZE..FBUS_CONTROL_HDR_SIZE + size];
    let received_crc = buf[FBUS_CONTROL_HDR_SIZE + size];
    let calculated_crc = fbus_checksum(body);
    if calculated_crc != received_crc {
        return Err(FrameError::Checksum { expected: calculated_crc, actual: received_crc });
    }

    let count = control_channel_count(buf[0]).ok_or(FrameError::BadSize(buf[0]))?;
    let packed = count / 8 * FBUS_CONTROL_8_VALUE_SIZE;

    let mut channels = [0u16; MAX_CHANNELS];
    for group in 0..count / 8 {
        unpack_8_channels(
            &body[group * FBUS_CONTROL_8_VALUE_SIZE..],
            &mut channels[group * 8..group * 8 + 8],
        );
    }

    Ok(ControlFrame {
        count,
        channels,
        flags: body[packed],
        rssi: body[packed + 1],
    })
}

/// Decode a complete downlink poll or uplink reply
///
/// # Arguments
///
/// * `buf` - Buffered bytes starting at the frame's size byte
///
/// # Returns
///
/// * `Result<SportFrame, FrameError>` - Decoded frame, or why it is not one
pub fn decode_sport_frame(buf: &[u8]) -> Result<SportFrame, FrameError> {
    if buf.is_empty() {
        return Err(FrameError::Incomplete { needed: FBUS_DOWNLINK_HDR_SIZE });
    }

    if buf[0] != FBUS_DOWNLINK_HDR {
        return Err(FrameError::BadHeader(buf[0]));
    }

    if buf.len() < FBUS_DOWNLINK_SIZE {
        return Err(FrameError::Incomplete { needed: FBUS_DOWNLINK_SIZE });
    }

    let body = &buf[FBUS_DOWNLINK_HDR_SIZE..FBUS_DOWNLINK_SIZE - 1];
    let received_crc = buf[FBUS_DOWNLINK_SIZE - 1];
    let calculated_crc = fbus_checksum(body);
    if calculated_crc != received_crc {
        return Err(FrameError::Checksum { expected: calculated_crc, actual: received_crc });
    }

    let mut fields = body;
    Ok(SportFrame {
        id: fields.get_u8(),
        prim: fields.get_u8(),
        app_id: fields.get_u16_le(),
        data: fields.get_u32_le(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbus::encoder::{encode_control_frame, encode_sport_frame, pack_8_channels};

    #[test]
    fn test_unpack_first_channel_only() {
        let mut packed = [0u8; 11];
        packed[0] = 0xFF;
        packed[1] = 0x07;

        let mut out = [0u16; 8];
        unpack_8_channels(&packed, &mut out);

        assert_eq!(out[0], 0x7FF);
        assert!(out[1..].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_unpack_last_channel_only() {
        let mut packed = [0u8; 11];
        packed[9] = 0xE0;
        packed[10] = 0xFF;

        let mut out = [0u16; 8];
        unpack_8_channels(&packed, &mut out);

        assert_eq!(out[7], 0x7FF);
        assert!(out[..7].iter().all(|&v| v == 0));
    }

    #[test]
    fn test_unpack_matches_pack() {
        let values = [992u16, 8, 1976, 0x7FF, 0, 0x555, 0x2AA, 1234];
        let mut packed = [0u8; 11];
        pack_8_channels(&values, &mut packed);

        let mut out = [0u16; 8];
        unpack_8_channels(&packed, &mut out);
        assert_eq!(out, values);
    }

    #[test]
    fn test_decode_control_center_first_channel() {
        let mut channels = [0u16; 8];
        channels[0] = 992;
        let frame = encode_control_frame(&channels, 0x00, 100).unwrap();

        let decoded = decode_control_frame(&frame).unwrap();
        assert_eq!(decoded.count, 8);
        assert_eq!(decoded.channels[0], 992);
        assert_eq!(decoded.rssi, 100);
        assert_eq!(decoded.flags, 0x00);
    }

    #[test]
    fn test_decode_control_all_sizes() {
        for count in [8usize, 16, 24] {
            let channels: Vec<u16> = (0..count).map(|i| (8 + i as u16 * 81) & 0x7FF).collect();
            let frame = encode_control_frame(&channels, 0x0C, 42).unwrap();

            let decoded = decode_control_frame(&frame).unwrap();
            assert_eq!(decoded.count, count);
            assert_eq!(&decoded.channels[..count], channels.as_slice());
            assert_eq!(decoded.flags, 0x0C);
            assert_eq!(decoded.rssi, 42);
        }
    }

    #[test]
    fn test_decode_control_header_errors() {
        assert_eq!(
            decode_control_frame(&[0x18]),
            Err(FrameError::Incomplete { needed: 2 })
        );
        assert_eq!(decode_control_frame(&[0x18, 0x00]), Err(FrameError::BadHeader(0x00)));
        assert_eq!(decode_control_frame(&[0x17, 0xFF]), Err(FrameError::BadSize(0x17)));
    }

    #[test]
    fn test_decode_control_incomplete() {
        let frame = encode_control_frame(&[992u16; 16], 0, 0).unwrap();
        assert_eq!(
            decode_control_frame(&frame[..frame.len() - 1]),
            Err(FrameError::Incomplete { needed: 27 })
        );
    }

    #[test]
    fn test_decode_control_crc_error() {
        let mut frame = encode_control_frame(&[992u16; 16], 0, 0).unwrap();
        let last = frame.len() - 1;
        frame[last] ^= 0xFF;

        assert!(matches!(
            decode_control_frame(&frame),
            Err(FrameError::Checksum { .. })
        ));
    }

    #[test]
    fn test_decode_control_flags_are_checksummed() {
        let mut frame = encode_control_frame(&[992u16; 8], 0x00, 80).unwrap();
        // Flags byte sits right after the 11 packed channel bytes
        frame[2 + 11] = 0x08;

        assert!(decode_control_frame(&frame).is_err());
    }

    #[test]
    fn test_decode_sport_frame() {
        let frame = encode_sport_frame(RECEIVER_ID, 0x10, 0x0400, 0xDEAD_BEEF);
        let decoded = decode_sport_frame(&frame).unwrap();

        assert_eq!(decoded.id, RECEIVER_ID);
        assert_eq!(decoded.prim, 0x10);
        assert_eq!(decoded.app_id, 0x0400);
        assert_eq!(decoded.data, 0xDEAD_BEEF);
        assert!(decoded.is_for_us());
    }

    #[test]
    fn test_decode_sport_frame_little_endian_fields() {
        let frame = encode_sport_frame(0x1B, 0x10, 0x1234, 0x0102_0304);
        assert_eq!(&frame[3..5], &[0x34, 0x12]);
        assert_eq!(&frame[5..9], &[0x04, 0x03, 0x02, 0x01]);
    }

    #[test]
    fn test_decode_sport_frame_errors() {
        assert_eq!(decode_sport_frame(&[]), Err(FrameError::Incomplete { needed: 1 }));
        assert_eq!(decode_sport_frame(&[0x0D]), Err(FrameError::BadHeader(0x0D)));
        assert_eq!(
            decode_sport_frame(&[0x08, 0x67]),
            Err(FrameError::Incomplete { needed: 10 })
        );

        let mut frame = encode_sport_frame(RECEIVER_ID, 0x10, 0x0400, 7);
        frame[6] ^= 0x01;
        assert!(matches!(decode_sport_frame(&frame), Err(FrameError::Checksum { .. })));
    }
}
