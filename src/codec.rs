/*!
 # Frame obfuscation

 Every payload is XOR-masked with a random key before it is written to the
 device, so identical commands never produce identical frames on air.

 Frame layout:

 | byte | content |
 |------|---------|
 | 0    | magic `0x54` |
 | 1    | `(payload length + 1) ^ 0x54` |
 | 2    | `key ^ 0x54` |
 | 3..  | `payload[i] ^ key` |

 This is obfuscation only, the key travels with the frame.
*/

use thiserror::Error;

/// First byte of every frame
pub const MAGIC_BYTE: u8 = 0x54;

/// Shortest frame that can carry a payload
pub const MIN_FRAME_LEN: usize = 4;

/// Longest payload whose length still fits the length byte
pub const MAX_PAYLOAD_LEN: usize = u8::MAX as usize - 1;

/// Errors raised while encoding a payload
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum EncodeError {
    #[error("payload must be at least 1 byte")]
    EmptyPayload,

    #[error("payload must be at most 254 bytes, got {len}")]
    PayloadTooLong { len: usize },
}

/// Errors raised while decoding a frame
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecodeError {
    #[error("frame must be at least 4 bytes, got {len}")]
    TooShort { len: usize },

    #[error("bad magic byte: expected 0x54, got {found:#04x}")]
    BadMagic { found: u8 },

    #[error("frame length mismatch: expected {expected} bytes, got {actual}")]
    LengthMismatch { expected: usize, actual: usize },
}

/// Encodes a payload with a freshly drawn random key
pub fn encode(payload: &[u8]) -> Result<Vec<u8>, EncodeError> {
    encode_with_key(payload, rand::random())
}

/// Encodes a payload with the given key
///
/// The output is fully determined by `payload` and `key`.
pub fn encode_with_key(payload: &[u8], key: u8) -> Result<Vec<u8>, EncodeError> {
    if payload.is_empty() {
        return Err(EncodeError::EmptyPayload);
    }
    if payload.len() > MAX_PAYLOAD_LEN {
        return Err(EncodeError::PayloadTooLong { len: payload.len() });
    }

    let length = (payload.len() + 1) as u8 ^ MAGIC_BYTE;

    let mut frame = Vec::with_capacity(payload.len() + 3);
    frame.extend_from_slice(&[MAGIC_BYTE, length, key ^ MAGIC_BYTE]);
    frame.extend(payload.iter().map(|b| b ^ key));
    Ok(frame)
}

/// Decodes a frame back into its plaintext payload
pub fn decode(frame: &[u8]) -> Result<Vec<u8>, DecodeError> {
    if frame.len() < MIN_FRAME_LEN {
        return Err(DecodeError::TooShort { len: frame.len() });
    }

    if frame[0] != MAGIC_BYTE {
        return Err(DecodeError::BadMagic { found: frame[0] });
    }

    let expected = (frame[1] ^ frame[0]) as usize + 2;
    if frame.len() != expected {
        return Err(DecodeError::LengthMismatch {
            expected,
            actual: frame.len(),
        });
    }

    let key = frame[2] ^ frame[0];
    Ok(frame[3..].iter().map(|b| b ^ key).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const FRAMES: [(&[u8], &[u8]); 5] = [
        (
            &[0x54, 0x5E, 0x68, 0x80, 0x38, 0x3C, 0x3D, 0xDE, 0x7C, 0x3C, 0x3C, 0x3C],
            &[0xBC, 0x04, 0x00, 0x01, 0xE2, 0x40, 0x00, 0x00, 0x00],
        ),
        (
            &[0x54, 0x5E, 0x76, 0x9E, 0x24, 0x39, 0x31, 0x2B, 0x26, 0x29, 0xC4, 0x25],
            &[0xBC, 0x06, 0x1B, 0x13, 0x09, 0x04, 0x0B, 0xE6, 0x07],
        ),
        (
            &[0x54, 0x5F, 0x07, 0xEF, 0x56, 0x55, 0x53, 0x53, 0x5A, 0x53, 0x2C, 0x52, 0x37],
            &[0xBC, 0x05, 0x06, 0x00, 0x00, 0x09, 0x00, 0x7F, 0x01, 0x64],
        ),
        (
            &[0x54, 0x5E, 0x88, 0x60, 0xDD, 0xDD, 0xDC, 0xDC, 0xDC, 0xDC, 0xDC, 0xDC],
            &[0xBC, 0x01, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ),
        (
            &[0x54, 0x5E, 0x57, 0xBF, 0x02, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03, 0x03],
            &[0xBC, 0x01, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00, 0x00],
        ),
    ];

    #[test]
    fn test_decode_known_frames() {
        for (frame, payload) in FRAMES {
            assert_eq!(decode(frame).unwrap(), payload);
        }
    }

    #[test]
    fn test_encode_known_frames() {
        // Key recovered from byte 2 reproduces the captured frame exactly
        for (frame, payload) in FRAMES {
            let key = frame[2] ^ MAGIC_BYTE;
            assert_eq!(encode_with_key(payload, key).unwrap(), frame);
        }
    }

    #[test]
    fn test_encode_header() {
        let payload = [0xBC, 0x05, 0x06, 0x00, 0x00, 0x09, 0x00, 0x7F, 0x01, 0x64];
        let frame = encode(&payload).unwrap();
        assert_eq!(frame.len(), payload.len() + 3);
        assert_eq!(frame[0], MAGIC_BYTE);
        assert_eq!(frame[1], (payload.len() as u8 + 1) ^ MAGIC_BYTE);
        assert_eq!(decode(&frame).unwrap(), payload);
    }

    #[test]
    fn test_encode_empty() {
        assert_eq!(encode(&[]), Err(EncodeError::EmptyPayload));
        assert_eq!(encode_with_key(&[], 0x42), Err(EncodeError::EmptyPayload));
    }

    #[test]
    fn test_encode_too_long() {
        let payload = [0u8; MAX_PAYLOAD_LEN + 1];
        assert_eq!(
            encode(&payload),
            Err(EncodeError::PayloadTooLong { len: 255 })
        );

        let payload = [0u8; MAX_PAYLOAD_LEN];
        let frame = encode_with_key(&payload, 7).unwrap();
        assert_eq!(frame.len(), 257);
        assert_eq!(decode(&frame).unwrap(), payload);
    }

    #[test]
    fn test_decode_too_short() {
        assert_eq!(decode(&[]), Err(DecodeError::TooShort { len: 0 }));
        assert_eq!(
            decode(&[0x54, 0x56, 0x00]),
            Err(DecodeError::TooShort { len: 3 })
        );
    }

    #[test]
    fn test_decode_bad_magic() {
        let frame = [0x53, 0x5E, 0x68, 0x80, 0x38, 0x3C, 0x3D, 0xDE, 0x7C, 0x3C, 0x3C, 0x3C];
        assert_eq!(decode(&frame), Err(DecodeError::BadMagic { found: 0x53 }));
    }

    #[test]
    fn test_decode_length_mismatch() {
        let frame = [0x54, 0x5F, 0x68, 0x80, 0x38, 0x3C, 0x3D, 0xDE, 0x7C, 0x3C, 0x3C, 0x3C];
        assert_eq!(
            decode(&frame),
            Err(DecodeError::LengthMismatch {
                expected: 13,
                actual: 12
            })
        );
    }

    #[test]
    fn test_smallest_frame() {
        let frame = encode_with_key(&[0xAB], 0xFF).unwrap();
        assert_eq!(frame, [0x54, 0x56, 0xAB, 0x54]);
        assert_eq!(decode(&frame).unwrap(), [0xAB]);
    }

    proptest! {
        #[test]
        fn roundtrip_any_key(payload in prop::collection::vec(any::<u8>(), 1..64), key in any::<u8>()) {
            let frame = encode_with_key(&payload, key).unwrap();
            prop_assert_eq!(decode(&frame).unwrap(), payload);
        }
    }
}
