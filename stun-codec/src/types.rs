use crate::error::{StunError, StunErrorType};
use rand::Rng;
use std::convert::TryFrom;
use std::fmt;
use std::ops::Deref;

pub(crate) const MAGIC_COOKIE_SIZE: usize = 4;
pub(crate) const TRANSACTION_ID_SIZE: usize = 12;

/// STUN message cookie
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Cookie(u32);

impl Cookie {
    /// Returns the [`u32`] representation of the cookie
    pub fn as_u32(&self) -> u32 {
        self.0
    }

    /// Returns the most significant 16 bits of the cookie
    pub fn high_u16(&self) -> u16 {
        (self.0 >> 16) as u16
    }
}

impl PartialEq<u32> for Cookie {
    fn eq(&self, other: &u32) -> bool {
        self.0 == *other
    }
}

impl PartialEq<Cookie> for u32 {
    fn eq(&self, other: &Cookie) -> bool {
        *self == other.0
    }
}

impl AsRef<u32> for Cookie {
    fn as_ref(&self) -> &u32 {
        &self.0
    }
}

/// STUN magic cookie
pub const MAGIC_COOKIE: Cookie = Cookie(0x2112_A442);

/// The transaction ID is a 96-bit identifier, used to uniquely identify
/// STUN transactions. It correlates requests with responses and keys the
/// XOR transform applied to IPv6 addresses.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TransactionId([u8; TRANSACTION_ID_SIZE]);

impl TransactionId {
    /// Returns a reference to the bytes that represents the identifier.
    pub fn as_bytes(&self) -> &[u8; TRANSACTION_ID_SIZE] {
        &self.0
    }
}

fn fmt_transaction_id(bytes: &[u8], f: &mut fmt::Formatter) -> fmt::Result {
    for byte in bytes {
        write!(f, "{:02X}", byte)?;
    }
    write!(f, ")")
}

impl fmt::Debug for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "TransactionId(0x")?;
        fmt_transaction_id(self.as_ref(), f)
    }
}

impl fmt::Display for TransactionId {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "transaction id (0x")?;
        fmt_transaction_id(self.as_ref(), f)
    }
}

impl Deref for TransactionId {
    type Target = [u8];

    fn deref(&self) -> &[u8] {
        &self.0
    }
}

impl AsRef<[u8]> for TransactionId {
    fn as_ref(&self) -> &[u8] {
        &self.0[..]
    }
}

impl From<&[u8; TRANSACTION_ID_SIZE]> for TransactionId {
    fn from(buff: &[u8; TRANSACTION_ID_SIZE]) -> Self {
        Self(*buff)
    }
}

impl From<[u8; TRANSACTION_ID_SIZE]> for TransactionId {
    fn from(buff: [u8; TRANSACTION_ID_SIZE]) -> Self {
        Self(buff)
    }
}

impl TryFrom<&[u8]> for TransactionId {
    type Error = StunError;

    fn try_from(buff: &[u8]) -> Result<Self, Self::Error> {
        let bytes: [u8; TRANSACTION_ID_SIZE] = buff.try_into()?;
        Ok(Self(bytes))
    }
}

impl Default for TransactionId {
    /// Creates a cryptographically random transaction ID chosen from the interval 0 .. 2**96-1.
    fn default() -> Self {
        let mut buffer = [0u8; TRANSACTION_ID_SIZE];
        rand::rng().fill(&mut buffer);
        TransactionId::from(buffer)
    }
}

/// The STUN message types handled by this codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageType {
    /// Binding request (0x0001)
    BindingRequest,
    /// Binding success response (0x0101)
    BindingSuccessResponse,
    /// Binding failure response (0x0111)
    BindingFailureResponse,
    /// Binding indication (0x0011)
    BindingIndication,
}

impl MessageType {
    /// Returns the wire representation of this message type
    pub fn as_u16(&self) -> u16 {
        match self {
            MessageType::BindingRequest => 0x0001,
            MessageType::BindingSuccessResponse => 0x0101,
            MessageType::BindingFailureResponse => 0x0111,
            MessageType::BindingIndication => 0x0011,
        }
    }

    /// Returns true if this is a request
    pub fn is_request(&self) -> bool {
        matches!(self, MessageType::BindingRequest)
    }

    /// Returns true if this is a success or failure response
    pub fn is_response(&self) -> bool {
        matches!(
            self,
            MessageType::BindingSuccessResponse | MessageType::BindingFailureResponse
        )
    }
}

impl TryFrom<u16> for MessageType {
    type Error = StunError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        match value {
            0x0001 => Ok(MessageType::BindingRequest),
            0x0101 => Ok(MessageType::BindingSuccessResponse),
            0x0111 => Ok(MessageType::BindingFailureResponse),
            0x0011 => Ok(MessageType::BindingIndication),
            _ => Err(StunError::new(
                StunErrorType::MalformedMessage,
                format!("Unknown message type 0x{:04X}", value),
            )),
        }
    }
}

impl From<MessageType> for u16 {
    fn from(value: MessageType) -> Self {
        value.as_u16()
    }
}

impl fmt::Display for MessageType {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            MessageType::BindingRequest => write!(f, "binding request"),
            MessageType::BindingSuccessResponse => write!(f, "binding success response"),
            MessageType::BindingFailureResponse => write!(f, "binding failure response"),
            MessageType::BindingIndication => write!(f, "binding indication"),
        }
    }
}

/// The fixed part of every STUN message: its type and transaction id.
/// The message length and magic cookie are handled by the codec.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct StunHeader {
    /// The message type
    pub message_type: MessageType,
    /// The transaction id
    pub transaction_id: TransactionId,
}

impl StunHeader {
    /// Creates a new header
    pub fn new(message_type: MessageType, transaction_id: TransactionId) -> Self {
        Self {
            message_type,
            transaction_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn magic_cookie() {
        assert_eq!(MAGIC_COOKIE.as_u32(), 0x2112_A442);
        assert_eq!(MAGIC_COOKIE.high_u16(), 0x2112);
        assert_eq!(MAGIC_COOKIE, 0x2112_A442u32);
        assert_eq!(0x2112_A442u32, MAGIC_COOKIE);
    }

    #[test]
    fn transaction_id() {
        let bytes = [
            0xb7, 0xe7, 0xa7, 0x01, 0xbc, 0x34, 0xd6, 0x86, 0xfa, 0x87, 0xdf, 0xae,
        ];
        let id = TransactionId::from(bytes);
        assert_eq!(id.as_bytes(), &bytes);
        assert_eq!(
            format!("{:?}", id),
            "TransactionId(0xB7E7A701BC34D686FA87DFAE)"
        );
        assert_eq!(
            format!("{}", id),
            "transaction id (0xB7E7A701BC34D686FA87DFAE)"
        );

        let id = TransactionId::try_from(&bytes[..]).expect("Can not create transaction id");
        assert_eq!(id.as_ref(), &bytes[..]);

        let result = TransactionId::try_from(&bytes[1..]);
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);
    }

    #[test]
    fn random_transaction_ids() {
        let id1 = TransactionId::default();
        let id2 = TransactionId::default();
        assert_ne!(id1, id2);
    }

    #[test]
    fn message_types() {
        for value in [0x0001u16, 0x0101, 0x0111, 0x0011] {
            let msg_type = MessageType::try_from(value).expect("Can not get message type");
            assert_eq!(msg_type.as_u16(), value);
            assert_eq!(u16::from(msg_type), value);
        }

        assert!(MessageType::BindingRequest.is_request());
        assert!(!MessageType::BindingRequest.is_response());
        assert!(MessageType::BindingFailureResponse.is_response());
        assert!(!MessageType::BindingIndication.is_request());

        let result = MessageType::try_from(0x0003);
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::MalformedMessage
        );
    }
}
