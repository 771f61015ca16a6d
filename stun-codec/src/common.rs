use crate::error::{StunError, StunErrorType};

// Stun message format
//       0                   1                   2                   3
//       0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//      |0 0|     STUN Message Type     |         Message Length        |
//      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//      |                         Magic Cookie                          |
//      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//      |                                                               |
//      |                     Transaction ID (96 bits)                  |
//      |                                                               |
//      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// STUN message header size
pub const MESSAGE_HEADER_SIZE: usize = 20;

// Stun attribute format
//       0                   1                   2                   3
//       0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//      |         Type                  |            Length             |
//      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//      |                         Value (variable)                ....
//      +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// STUN attribute header size
pub const ATTRIBUTE_HEADER_SIZE: usize = 4;

/// Largest message the 16-bit length field can describe
pub const MAX_MESSAGE_SIZE: usize = MESSAGE_HEADER_SIZE + u16::MAX as usize;

pub(crate) const DEFAULT_PADDING_VALUE: u8 = 0x00;

pub(crate) const MESSAGE_TYPE_OFFSET: usize = 0;
pub(crate) const MESSAGE_LENGTH_OFFSET: usize = 2;
pub(crate) const MAGIC_COOKIE_OFFSET: usize = 4;
pub(crate) const TRANSACTION_ID_OFFSET: usize = 8;

pub(crate) const U16_SIZE: usize = 2;
pub(crate) const U32_SIZE: usize = 4;
pub(crate) const U64_SIZE: usize = 8;

/// Number of padding bytes that follow a value of `value_size` bytes
pub fn padding(value_size: usize) -> usize {
    (4 - (value_size & 3)) & 3
}

/// Size of a value once padded to the 4-byte boundary
pub fn align4(value_size: usize) -> usize {
    value_size + padding(value_size)
}

pub(crate) fn check_buffer_boundaries(
    buffer: &[u8],
    limit: usize,
    error_type: StunErrorType,
) -> Result<(), StunError> {
    (buffer.len() >= limit).then_some(()).ok_or_else(|| {
        StunError::new(
            error_type,
            format!("Required size: {}, buffer size: {}", limit, buffer.len()),
        )
    })
}

pub(crate) fn check_value_size(value: &[u8], expected: usize) -> Result<(), StunError> {
    (value.len() == expected).then_some(()).ok_or_else(|| {
        log::trace!(
            "attribute value of {} bytes, expected {}",
            value.len(),
            expected
        );
        StunError::new(
            StunErrorType::InvalidAttributeLength,
            format!("Expected size: {}, value size: {}", expected, value.len()),
        )
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn padding_to_four_bytes() {
        assert_eq!(padding(0), 0);
        assert_eq!(padding(1), 3);
        assert_eq!(padding(2), 2);
        assert_eq!(padding(3), 1);
        assert_eq!(padding(4), 0);
        assert_eq!(padding(17), 3);

        assert_eq!(align4(0), 0);
        assert_eq!(align4(11), 12);
        assert_eq!(align4(20), 20);
    }

    #[test]
    fn buffer_boundaries() {
        let buffer = [0u8; 4];
        assert!(check_buffer_boundaries(&buffer, 4, StunErrorType::OutOfMemory).is_ok());
        let result = check_buffer_boundaries(&buffer, 5, StunErrorType::OutOfMemory);
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::OutOfMemory
        );
    }

    #[test]
    fn value_size() {
        assert!(check_value_size(&[0u8; 8], 8).is_ok());
        let result = check_value_size(&[0u8; 7], 8);
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::InvalidAttributeLength
        );
    }
}
