//! # FBus Frame Encoder
//!
//! Serializes uplink telemetry replies for the wire. Control frame and
//! downlink poll encoders are used by tests.

use bytes::BufMut;

use super::crc::fbus_checksum;
use super::protocol::*;
use crate::telemetry::TelemetryItem;

/// Pack 8 channels (11 bits each, LSB first) into 11 bytes
///
/// Values above 11 bits are masked.
///
/// # Arguments
///
/// * `values` - 8 channel values
/// * `dst` - At least 11 bytes of output
pub fn pack_8_channels(values: &[u16], dst: &mut [u8]) {
    dst[..FBUS_CONTROL_8_VALUE_SIZE].fill(0);

    let mut bit_index = 0;
    for &value in values.iter().take(8) {
        let value = value & 0x7FF;

        for bit in 0..11 {
            if (value >> bit) & 1 == 1 {
                dst[bit_index / 8] |= 1 << (bit_index % 8);
            }
            bit_index += 1;
        }
    }
}

/// Encode a complete control frame
///
/// # Arguments
///
/// * `channels` - 8, 16 or 24 raw channel values
/// * `flags` - Link flags byte
/// * `rssi` - Signal strength byte
///
/// # Returns
///
/// * `Option<Vec<u8>>` - Frame bytes, or `None` for an unsupported channel count
///
/// # Examples
///
/// ```
/// use fbus_receiver::fbus::encoder::encode_control_frame;
///
/// let frame = encode_control_frame(&[992u16; 16], 0x00, 100).unwrap();
/// assert_eq!(frame.len(), 27);
/// assert_eq!(&frame[..2], &[0x18, 0xFF]);
/// ```
pub fn encode_control_frame(channels: &[u16], flags: u8, rssi: u8) -> Option<Vec<u8>> {
    let size = control_size_for(channels.len())?;

    let mut frame = Vec::with_capacity(control_frame_len(size));
    frame.push(size);
    frame.push(FBUS_CONTROL_HDR);

    for group in channels.chunks(8) {
        let mut packed = [0u8; FBUS_CONTROL_8_VALUE_SIZE];
        pack_8_channels(group, &mut packed);
        frame.extend_from_slice(&packed);
    }

    frame.push(flags);
    frame.push(rssi);

    let crc = fbus_checksum(&frame[FBUS_CONTROL_HDR_SIZE..]);
    frame.push(crc);

    Some(frame)
}

/// Encode a 10-byte downlink/uplink frame
///
/// # Arguments
///
/// * `id` - Physical id of the addressed device
/// * `prim` - Frame primitive
/// * `app_id` - Sensor application id
/// * `data` - Sensor value
///
/// # Returns
///
/// * `[u8; 10]` - Frame bytes, checksum included
pub fn encode_sport_frame(id: u8, prim: u8, app_id: u16, data: u32) -> [u8; FBUS_DOWNLINK_SIZE] {
    let mut frame = [0u8; FBUS_DOWNLINK_SIZE];

    {
        let mut out = &mut frame[..];
        out.put_u8(FBUS_DOWNLINK_HDR);
        out.put_u8(id);
        out.put_u8(prim);
        out.put_u16_le(app_id);
        out.put_u32_le(data);
    }

    frame[FBUS_DOWNLINK_SIZE - 1] = fbus_checksum(&frame[FBUS_DOWNLINK_HDR_SIZE..FBUS_DOWNLINK_SIZE - 1]);
    frame
}

/// Encode the uplink reply carrying one telemetry item
///
/// # Arguments
///
/// * `item` - Telemetry value supplied by the telemetry source
///
/// # Returns
///
/// * `[u8; 10]` - Uplink frame addressed from this device
pub fn encode_uplink_frame(item: &TelemetryItem) -> [u8; FBUS_UPLINK_SIZE] {
    encode_sport_frame(RECEIVER_ID, FBUS_UPLINK_DATA_FRAME, item.app_id, item.data)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fbus::crc::verify_checksum;

    #[test]
    fn test_pack_all_zeros() {
        let mut packed = [0xAAu8; 11];
        pack_8_channels(&[0u16; 8], &mut packed);
        assert_eq!(packed, [0u8; 11]);
    }

    #[test]
    fn test_pack_all_max() {
        let mut packed = [0u8; 11];
        pack_8_channels(&[0x7FFu16; 8], &mut packed);
        // 8 channels × 11 bits = 88 bits = 11 bytes
        assert_eq!(packed, [0xFFu8; 11]);
    }

    #[test]
    fn test_pack_masks_oversized_values() {
        let mut packed = [0u8; 11];
        let mut values = [0u16; 8];
        values[0] = 0xFFFF;
        pack_8_channels(&values, &mut packed);

        assert_eq!(packed[0], 0xFF);
        assert_eq!(packed[1], 0x07);
        assert!(packed[2..].iter().all(|&b| b == 0));
    }

    #[test]
    fn test_encode_control_frame_structure() {
        let frame = encode_control_frame(&[992u16; 24], 0x04, 0).unwrap();

        assert_eq!(frame.len(), 38);
        assert_eq!(frame[0], FBUS_CONTROL_24CH_SIZE);
        assert_eq!(frame[1], FBUS_CONTROL_HDR);
        assert_eq!(frame[35], 0x04); // flags
        assert_eq!(frame[36], 0x00); // rssi
        assert!(verify_checksum(&frame[2..37], frame[37]));
    }

    #[test]
    fn test_encode_control_frame_rejects_bad_counts() {
        assert!(encode_control_frame(&[992u16; 4], 0, 0).is_none());
        assert!(encode_control_frame(&[992u16; 17], 0, 0).is_none());
        assert!(encode_control_frame(&[], 0, 0).is_none());
    }

    #[test]
    fn test_encode_uplink_frame() {
        let item = TelemetryItem { app_id: 0x5100, data: 0x0000_0102 };
        let frame = encode_uplink_frame(&item);

        assert_eq!(frame.len(), 10);
        assert_eq!(frame[0], FBUS_UPLINK_HDR);
        assert_eq!(frame[1], RECEIVER_ID);
        assert_eq!(frame[2], FBUS_UPLINK_DATA_FRAME);
        assert_eq!(&frame[3..5], &[0x00, 0x51]);
        assert_eq!(&frame[5..9], &[0x02, 0x01, 0x00, 0x00]);
        assert!(verify_checksum(&frame[1..9], frame[9]));
    }

    #[test]
    fn test_encode_frame_different_data_different_crc() {
        let frame1 = encode_sport_frame(RECEIVER_ID, 0x10, 0x0400, 20);
        let frame2 = encode_sport_frame(RECEIVER_ID, 0x10, 0x0400, 21);

        assert_ne!(frame1[9], frame2[9]);
    }
}
