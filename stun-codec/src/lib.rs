//! STUN message codec.
//!
//! This crate serializes and deserializes STUN messages in place: the
//! deserializer walks an untrusted buffer and hands out views of its
//! attributes, and the serializer writes attributes into a caller provided
//! buffer while enforcing the order required by MESSAGE-INTEGRITY and
//! FINGERPRINT. Computing HMAC and CRC values is left to the caller; the
//! codec delimits the bytes they cover.
//!
//! The implementation is based on:
//! * [`RFC8489`](https://datatracker.ietf.org/doc/html/rfc8489). Session Traversal Utilities for NAT (STUN).
//! * [`RFC8445`](https://datatracker.ietf.org/doc/html/rfc8445). Interactive Connectivity Establishment (ICE).
//! * [`RFC8656`](https://datatracker.ietf.org/doc/html/rfc8656). Traversal Using Relays around NAT (TURN)
//! * [`RFC5769`](https://datatracker.ietf.org/doc/html/rfc5769). Test Vectors for Session Traversal Utilities for NAT (STUN).
//!
//! # Usage
//! Example that encodes a STUN Binding request protected with a FINGERPRINT
//!```rust
//! # use stun_codec::{MessageType, Serializer, StunHeader, TransactionId};
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! let header = StunHeader::new(MessageType::BindingRequest, TransactionId::default());
//! let mut buffer = [0u8; 64];
//! let mut serializer = Serializer::new(&mut buffer, &header)?;
//! serializer.add_attribute_username(b"evtj:h6vY")?;
//!
//! let crc = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC);
//! let input = serializer.fingerprint_buffer()?.ok_or("No buffer to checksum")?;
//! let fingerprint = crc.checksum(input) ^ 0x5354_554e;
//! serializer.add_attribute_fingerprint(fingerprint)?;
//!
//! let size = serializer.finalize();
//! assert_eq!(size, 44);
//! #
//! #   Ok(())
//! # }
//!```
//!
//! Example that decodes a STUN Binding response and fetches some attributes.
//!```rust
//! # use stun_codec::{AttributeType, Deserializer, MessageType};
//! # use std::net::{IpAddr, Ipv4Addr};
//! # use std::error::Error;
//! #
//! # fn main() -> Result<(), Box<dyn Error>> {
//! // This response uses the following parameter:
//! // Password: `VOkJxbRl1RmTxUk/WvJxBt` (without quotes)
//! // Software name: "test vector" (without quotes)
//! // Mapped address: 192.0.2.1 port 32853
//! let sample_ipv4_response = [
//!     0x01, 0x01, 0x00, 0x3c, // Response type and message length
//!     0x21, 0x12, 0xa4, 0x42, // Magic cookie
//!     0xb7, 0xe7, 0xa7, 0x01, // }
//!     0xbc, 0x34, 0xd6, 0x86, // }  Transaction ID
//!     0xfa, 0x87, 0xdf, 0xae, // }
//!     0x80, 0x22, 0x00, 0x0b, // SOFTWARE attribute header
//!     0x74, 0x65, 0x73, 0x74, // }
//!     0x20, 0x76, 0x65, 0x63, // }  UTF-8 server name
//!     0x74, 0x6f, 0x72, 0x20, // }
//!     0x00, 0x20, 0x00, 0x08, // XOR-MAPPED-ADDRESS attribute header
//!     0x00, 0x01, 0xa1, 0x47, // Address family (IPv4) and xor'd mapped port number
//!     0xe1, 0x12, 0xa6, 0x43, // Xor'd mapped IPv4 address
//!     0x00, 0x08, 0x00, 0x14, // MESSAGE-INTEGRITY header
//!     0x2b, 0x91, 0xf5, 0x99, // }
//!     0xfd, 0x9e, 0x90, 0xc3, // }
//!     0x8c, 0x74, 0x89, 0xf9, // } HMAC-SHA1 fingerprint
//!     0x2a, 0xf9, 0xba, 0x53, // }
//!     0xf0, 0x6b, 0xe7, 0xd7, // }
//!     0x80, 0x28, 0x00, 0x04, // FINGERPRINT attribute header
//!     0xc0, 0x7d, 0x4c, 0x96, // Reserved for CRC32 fingerprint
//! ];
//!
//! let (mut deserializer, header) = Deserializer::new(&sample_ipv4_response)?;
//! assert_eq!(header.message_type, MessageType::BindingSuccessResponse);
//!
//! let software = deserializer
//!   .find_attribute(AttributeType::SOFTWARE)?
//!   .ok_or("Software attribute not found")?;
//! assert_eq!(deserializer.parse_attribute_software(&software)?, b"test vector");
//!
//! let xor_addr = deserializer
//!   .find_attribute(AttributeType::XOR_MAPPED_ADDRESS)?
//!   .ok_or("XorMappedAddress attribute not found")?;
//! let socket = deserializer
//!   .parse_attribute_xor_mapped_address(&xor_addr)?
//!   .socket_address();
//! assert_eq!(socket.ip(), IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1)));
//! assert_eq!(socket.port(), 32853);
//!
//! // Bytes covered by the MESSAGE-INTEGRITY value
//! deserializer.find_attribute(AttributeType::MESSAGE_INTEGRITY)?;
//! let range = deserializer.integrity_buffer()?;
//! assert_eq!(range.bytes().len(), 48);
//! assert_eq!(range.message_length(), 52);
//! #
//! #   Ok(())
//! # }
//!```
//!
//! # Byte order
//! Both codec halves take the byte order as a type parameter implementing
//! [`byteorder::ByteOrder`]. [`Deserializer::new`], [`Serializer::new`] and
//! [`Serializer::size_only`] use [`NetworkEndian`]; other orders can be
//! selected with [`Deserializer::with_byte_order`],
//! [`Serializer::new_with_order`] and [`Serializer::size_only_with_order`].
//!
//! # Logging
//! The codec emits [`log`] records at trace level when it rejects input.
//! Nothing is printed unless the application installs a logger.
//!
//! #  Common features
//! This crate defines next feature flags that can be enabled:
//! * **turn**: Adds helpers for the attributes defined in
//!     [`RFC8656`](https://datatracker.ietf.org/doc/html/rfc8656).
//!     Traversal Using Relays around NAT (TURN). Enabled by default.
//! * **ice**: Adds helpers for the attributes defined in
//!     [`RFC8445`](https://datatracker.ietf.org/doc/html/rfc8445).
//!     Interactive Connectivity Establishment (ICE). Enabled by default.
//! * **experiments**: This flag can be set to adjust some behavior
//!     of the library, such as the padding written by the
//!     [`Serializer`].

#![deny(missing_docs)]

mod address;
mod attributes;
mod common;
mod context;
mod deserializer;
mod serializer;
mod types;
mod xor;

pub mod error;

#[cfg(feature = "experiments")]
pub use crate::serializer::StunPadding;

pub use byteorder::{BigEndian, ByteOrder, LittleEndian, NetworkEndian};

pub use crate::address::{AddressFamily, StunAddress};
pub use crate::attributes::{AttributeType, ErrorCode, EvenPort, UnknownAttributes};
pub use crate::common::{
    align4, padding, ATTRIBUTE_HEADER_SIZE, MAX_MESSAGE_SIZE, MESSAGE_HEADER_SIZE,
};
pub use crate::context::{ContextFlags, OrderState, StunContext};
pub use crate::deserializer::{
    update_attribute_nonce, AttributeSlot, Deserializer, SigningRange, StunAttribute,
};
pub use crate::error::{StunError, StunErrorType};
pub use crate::serializer::Serializer;
pub use crate::types::{Cookie, MessageType, StunHeader, TransactionId, MAGIC_COOKIE};
pub use crate::xor::xor_address;
