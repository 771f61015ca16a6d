//! STUN Attributes.
//! This module contains the attribute type registry and the value types
//! that are not plain integers, buffers or addresses.

use crate::common::{check_buffer_boundaries, U16_SIZE};
use crate::error::{StunError, StunErrorType};
use byteorder::ByteOrder;
use std::fmt;

/// A STUN attribute type is a hex number in the range 0x0000-0xFFFF.
/// STUN attribute types in the range 0x0000-0x7FFF are considered
/// comprehension-required.
///
/// # Examples
///```rust
/// # use stun_codec::AttributeType;
/// let attr_type = AttributeType::from(0x0008);
/// assert_eq!(attr_type, AttributeType::MESSAGE_INTEGRITY);
/// // This is a comprehension required attribute
/// assert!(attr_type.is_comprehension_required());
/// // This is not a comprehension optional attribute
/// assert!(!attr_type.is_comprehension_optional());
///```
#[derive(Clone, Copy, PartialOrd, Ord, PartialEq, Eq, Hash)]
pub struct AttributeType(u16);

// Declares the registry of known attribute types along with their names.
macro_rules! attribute_types {
    ($( $(#[$meta:meta])* ($name:ident, $value:literal, $text:literal) ),* $(,)?) => {
        impl AttributeType {
            $(
                $(#[$meta])*
                pub const $name: AttributeType = AttributeType($value);
            )*

            /// Returns the registered name of this attribute type, if it is known
            pub fn name(&self) -> Option<&'static str> {
                match self.0 {
                    $($value => Some($text),)*
                    _ => None,
                }
            }
        }
    };
}

attribute_types!(
    /// MAPPED-ADDRESS
    (MAPPED_ADDRESS, 0x0001, "MAPPED-ADDRESS"),
    /// RESPONSE-ADDRESS
    (RESPONSE_ADDRESS, 0x0002, "RESPONSE-ADDRESS"),
    /// CHANGE-REQUEST
    (CHANGE_REQUEST, 0x0003, "CHANGE-REQUEST"),
    /// SOURCE-ADDRESS
    (SOURCE_ADDRESS, 0x0004, "SOURCE-ADDRESS"),
    /// CHANGED-ADDRESS
    (CHANGED_ADDRESS, 0x0005, "CHANGED-ADDRESS"),
    /// USERNAME
    (USERNAME, 0x0006, "USERNAME"),
    /// PASSWORD
    (PASSWORD, 0x0007, "PASSWORD"),
    /// MESSAGE-INTEGRITY
    (MESSAGE_INTEGRITY, 0x0008, "MESSAGE-INTEGRITY"),
    /// ERROR-CODE
    (ERROR_CODE, 0x0009, "ERROR-CODE"),
    /// UNKNOWN-ATTRIBUTES
    (UNKNOWN_ATTRIBUTES, 0x000A, "UNKNOWN-ATTRIBUTES"),
    /// REFLECTED-FROM
    (REFLECTED_FROM, 0x000B, "REFLECTED-FROM"),
    /// CHANNEL-NUMBER
    (CHANNEL_NUMBER, 0x000C, "CHANNEL-NUMBER"),
    /// LIFETIME
    (LIFETIME, 0x000D, "LIFETIME"),
    /// XOR-PEER-ADDRESS
    (XOR_PEER_ADDRESS, 0x0012, "XOR-PEER-ADDRESS"),
    /// DATA
    (DATA, 0x0013, "DATA"),
    /// REALM
    (REALM, 0x0014, "REALM"),
    /// NONCE
    (NONCE, 0x0015, "NONCE"),
    /// XOR-RELAYED-ADDRESS
    (XOR_RELAYED_ADDRESS, 0x0016, "XOR-RELAYED-ADDRESS"),
    /// EVEN-PORT
    (EVEN_PORT, 0x0018, "EVEN-PORT"),
    /// REQUESTED-TRANSPORT
    (REQUESTED_TRANSPORT, 0x0019, "REQUESTED-TRANSPORT"),
    /// DONT-FRAGMENT
    (DONT_FRAGMENT, 0x001A, "DONT-FRAGMENT"),
    /// XOR-MAPPED-ADDRESS
    (XOR_MAPPED_ADDRESS, 0x0020, "XOR-MAPPED-ADDRESS"),
    /// RESERVATION-TOKEN
    (RESERVATION_TOKEN, 0x0022, "RESERVATION-TOKEN"),
    /// PRIORITY
    (PRIORITY, 0x0024, "PRIORITY"),
    /// USE-CANDIDATE
    (USE_CANDIDATE, 0x0025, "USE-CANDIDATE"),
    /// SOFTWARE
    (SOFTWARE, 0x8022, "SOFTWARE"),
    /// FINGERPRINT
    (FINGERPRINT, 0x8028, "FINGERPRINT"),
    /// ICE-CONTROLLED
    (ICE_CONTROLLED, 0x8029, "ICE-CONTROLLED"),
    /// ICE-CONTROLLING
    (ICE_CONTROLLING, 0x802A, "ICE-CONTROLLING"),
);

impl AttributeType {
    /// Creates a new [`AttributeType` ]
    pub fn new(attr_type: u16) -> Self {
        AttributeType(attr_type)
    }

    /// Return the [`u16`] representation of this attribute type
    pub fn as_u16(&self) -> u16 {
        self.0
    }

    /// Returns true if this is a comprehension required attribute
    pub fn is_comprehension_required(&self) -> bool {
        // Comprehension-required range (0x0000-0x7FFF):
        self.0 < 0x8000
    }

    /// Returns true if this is a comprehension optional attribute
    pub fn is_comprehension_optional(&self) -> bool {
        // Comprehension-optional range (0x8000-0xFFFF)
        !self.is_comprehension_required()
    }

    /// Returns true if the value of this attribute is a family/port/address tuple
    pub fn is_address(&self) -> bool {
        matches!(
            *self,
            AttributeType::MAPPED_ADDRESS
                | AttributeType::RESPONSE_ADDRESS
                | AttributeType::SOURCE_ADDRESS
                | AttributeType::CHANGED_ADDRESS
                | AttributeType::REFLECTED_FROM
        ) || self.is_xor_address()
    }

    /// Returns true if the address carried by this attribute is obfuscated
    /// with the magic cookie and the transaction id
    pub fn is_xor_address(&self) -> bool {
        matches!(
            *self,
            AttributeType::XOR_MAPPED_ADDRESS
                | AttributeType::XOR_PEER_ADDRESS
                | AttributeType::XOR_RELAYED_ADDRESS
        )
    }

    /// Returns true if this attribute carries no value
    pub fn is_flag(&self) -> bool {
        matches!(
            *self,
            AttributeType::USE_CANDIDATE | AttributeType::DONT_FRAGMENT
        )
    }
}

impl From<u16> for AttributeType {
    fn from(val: u16) -> Self {
        Self::new(val)
    }
}

impl From<AttributeType> for u16 {
    fn from(val: AttributeType) -> Self {
        val.0
    }
}

impl fmt::Debug for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "AttributeType (0x{:04X})", self.0)?;
        Ok(())
    }
}

impl fmt::Display for AttributeType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self.name() {
            Some(name) => write!(f, "{} (0x{:04X})", name, self.0),
            None => write!(f, "attribute type (0x{:04X})", self.0),
        }
    }
}

const MIN_ERROR_CLASS: u8 = 3;
const MAX_ERROR_CLASS: u8 = 6;
const MAX_ERROR_NUMBER: u8 = 99;
pub(crate) const ERROR_CODE_HEADER_SIZE: usize = 4;

// ErrorCode format
//  0                   1                   2                   3
//  0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |           Reserved, should be 0         |Class|     Number    |
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
// |      Reason Phrase (variable)                                ..
// +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

/// The value of an ERROR-CODE attribute. The reason phrase is a view of
/// bytes with no implied terminator.
///
/// # Examples
///```rust
/// # use stun_codec::ErrorCode;
/// # use std::error::Error;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let attr = ErrorCode::new(420, b"Unknown Attribute")?;
/// assert_eq!(attr.class(), 4);
/// assert_eq!(attr.number(), 20);
/// assert_eq!(attr.code(), 420);
/// assert_eq!(attr.reason(), b"Unknown Attribute");
/// #  Ok(())
/// # }
///```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorCode<'a> {
    class: u8,
    number: u8,
    reason: &'a [u8],
}

impl<'a> ErrorCode<'a> {
    /// Creates a new `ErrorCode` from its numeric value.
    /// # Return:
    /// The `ErrorCode` or a [`StunError`] if the class is not in the range
    /// of 3 to 6.
    pub fn new(code: u16, reason: &'a [u8]) -> Result<Self, StunError> {
        let class = u8::try_from(code / 100)?;
        let number = u8::try_from(code % 100)?;
        ErrorCode::from_parts(class, number, reason)
    }

    /// Creates a new `ErrorCode` from its class and number.
    pub fn from_parts(class: u8, number: u8, reason: &'a [u8]) -> Result<Self, StunError> {
        if !(MIN_ERROR_CLASS..=MAX_ERROR_CLASS).contains(&class) {
            return Err(StunError::new(
                StunErrorType::BadParam,
                format!(
                    "Error class {} is not in the range ({}..={})",
                    class, MIN_ERROR_CLASS, MAX_ERROR_CLASS
                ),
            ));
        }
        if number > MAX_ERROR_NUMBER {
            return Err(StunError::new(
                StunErrorType::BadParam,
                format!("Error number {} is not in the range (0..=99)", number),
            ));
        }
        Ok(Self {
            class,
            number,
            reason,
        })
    }

    // Values read from the wire are reported as they are.
    pub(crate) fn decode(value: &'a [u8]) -> Result<Self, StunError> {
        check_buffer_boundaries(
            value,
            ERROR_CODE_HEADER_SIZE,
            StunErrorType::InvalidAttributeLength,
        )?;
        Ok(Self {
            class: value[2] & 0x07,
            number: value[3],
            reason: &value[ERROR_CODE_HEADER_SIZE..],
        })
    }

    /// Returns the class of the error code (the hundreds digit).
    pub fn class(&self) -> u8 {
        self.class
    }

    /// Returns the error code modulo 100.
    pub fn number(&self) -> u8 {
        self.number
    }

    /// Returns the numeric error code value.
    pub fn code(&self) -> u16 {
        u16::from(self.class) * 100 + u16::from(self.number)
    }

    /// Returns the reason phrase
    pub fn reason(&self) -> &'a [u8] {
        self.reason
    }
}

/// The EVEN-PORT attribute value. The R bit asks the relay to reserve the
/// next-higher port as well.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct EvenPort(bool);

impl EvenPort {
    /// Creates a new value
    pub fn new(reserve: bool) -> Self {
        Self(reserve)
    }

    /// Returns true if the R bit is set
    pub fn reserve(&self) -> bool {
        self.0
    }

    pub(crate) fn as_byte(&self) -> u8 {
        if self.0 {
            0x80
        } else {
            0x00
        }
    }

    pub(crate) fn from_byte(value: u8) -> Self {
        Self(value & 0x80 == 0x80)
    }
}

/// A view of the UNKNOWN-ATTRIBUTES value: a list of 16-bit attribute types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UnknownAttributes<'a>(&'a [u8]);

impl<'a> UnknownAttributes<'a> {
    pub(crate) fn decode(value: &'a [u8]) -> Result<Self, StunError> {
        (value.len() % U16_SIZE == 0)
            .then_some(Self(value))
            .ok_or_else(|| {
                StunError::new(
                    StunErrorType::InvalidAttributeLength,
                    format!("Length {} is not a multiple of {}", value.len(), U16_SIZE),
                )
            })
    }

    /// Returns the number of attribute types in the list
    pub fn len(&self) -> usize {
        self.0.len() / U16_SIZE
    }

    /// Returns true if the list is empty
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns an iterator over the attribute types, read with the byte order `O`
    pub fn iter<O: ByteOrder + 'static>(&self) -> impl Iterator<Item = AttributeType> + 'a {
        self.0
            .chunks_exact(U16_SIZE)
            .map(|chunk| AttributeType::from(O::read_u16(chunk)))
    }
}
