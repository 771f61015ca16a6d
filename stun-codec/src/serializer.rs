use crate::address::StunAddress;
use crate::attributes::{AttributeType, ErrorCode, EvenPort};
use crate::common::{
    align4, check_buffer_boundaries, ATTRIBUTE_HEADER_SIZE, DEFAULT_PADDING_VALUE,
    MAGIC_COOKIE_OFFSET, MAX_MESSAGE_SIZE, MESSAGE_HEADER_SIZE, MESSAGE_LENGTH_OFFSET,
    MESSAGE_TYPE_OFFSET, TRANSACTION_ID_OFFSET, U16_SIZE, U32_SIZE, U64_SIZE,
};
use crate::context::StunContext;
use crate::error::{StunError, StunErrorType};
use crate::types::{StunHeader, MAGIC_COOKIE};
use crate::xor::xor_address;
use byteorder::{ByteOrder, NetworkEndian};
use std::convert::TryFrom;
use std::marker::PhantomData;

// Size of the MESSAGE-INTEGRITY attribute carrying an HMAC-SHA1 value
const INTEGRITY_ATTRIBUTE_SIZE: usize = ATTRIBUTE_HEADER_SIZE + 20;
const FINGERPRINT_ATTRIBUTE_SIZE: usize = ATTRIBUTE_HEADER_SIZE + U32_SIZE;

#[cfg(feature = "experiments")]
/// Custom padding used to encode a message. This feature required to enable
/// the flag `experiments`
#[derive(Debug, PartialEq, Eq, Clone)]
pub enum StunPadding {
    /// custom
    Custom(u8),
    /// random padding
    Random,
}

#[derive(Debug)]
enum Target<'a> {
    SizeOnly,
    Buffer(&'a mut [u8]),
}

/// Builds a STUN message attribute by attribute.
///
/// A serializer either writes into a caller provided buffer, or only
/// computes the size of the message. Both modes perform the same
/// validations and move the cursor the same way, so running a sequence of
/// calls in size-only mode gives the exact buffer size the same sequence
/// needs in write mode.
///
/// Attributes must respect the protection order: once MESSAGE-INTEGRITY is
/// added only FINGERPRINT can follow, and nothing can follow FINGERPRINT.
///
/// # Examples
///```rust
/// # use stun_codec::{MessageType, Serializer, StunHeader, TransactionId};
/// # use std::error::Error;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let header = StunHeader::new(MessageType::BindingRequest, TransactionId::default());
///
/// let mut sizer = Serializer::size_only(&header);
/// sizer.add_attribute_username(b"evtj:h6vY")?;
/// sizer.add_attribute_priority(0x6e0001ff)?;
/// let size = sizer.finalize();
/// assert_eq!(size, 44);
///
/// let mut buffer = vec![0u8; size];
/// let mut serializer = Serializer::new(&mut buffer, &header)?;
/// serializer.add_attribute_username(b"evtj:h6vY")?;
/// serializer.add_attribute_priority(0x6e0001ff)?;
/// assert_eq!(serializer.finalize(), size);
/// assert_eq!(&buffer[2..4], &[0x00, 0x18]);
/// #
/// #   Ok(())
/// # }
///```
#[derive(Debug)]
pub struct Serializer<'a, O = NetworkEndian> {
    target: Target<'a>,
    header: StunHeader,
    ctx: StunContext,
    #[cfg(feature = "experiments")]
    padding: Option<StunPadding>,
    phantom: PhantomData<O>,
}

impl<'a> Serializer<'a, NetworkEndian> {
    /// Creates a serializer that writes a message in network byte order into `buffer`.
    /// # Returns
    /// The serializer with the header already written, or a [`StunError`]
    /// if the buffer can not hold a header.
    pub fn new(buffer: &'a mut [u8], header: &StunHeader) -> Result<Self, StunError> {
        Serializer::new_with_order(buffer, header)
    }

    /// Creates a serializer that only computes the size of a message.
    pub fn size_only(header: &StunHeader) -> Self {
        Serializer::size_only_with_order(header)
    }
}

macro_rules! add_attribute_fns {
    ($(
        $(#[$meta:meta])*
        ($name:ident, $attr_type:ident, $appender:ident($arg:ty))
    ),* $(,)?) => {
        paste::paste! {
            $(
                $(#[$meta])*
                #[doc = "Appends a `" $attr_type "` attribute"]
                pub fn [<add_attribute_ $name>](&mut self, value: $arg) -> Result<(), StunError> {
                    self.$appender(AttributeType::$attr_type, value)
                }
            )*
        }
    };
}

impl<'a, O> Serializer<'a, O>
where
    O: ByteOrder,
{
    /// Creates a serializer that writes into `buffer` using the byte order `O`.
    pub fn new_with_order(buffer: &'a mut [u8], header: &StunHeader) -> Result<Self, StunError> {
        check_buffer_boundaries(buffer, MESSAGE_HEADER_SIZE, StunErrorType::BadParam)?;

        O::write_u16(
            &mut buffer[MESSAGE_TYPE_OFFSET..MESSAGE_LENGTH_OFFSET],
            header.message_type.as_u16(),
        );
        O::write_u16(&mut buffer[MESSAGE_LENGTH_OFFSET..MAGIC_COOKIE_OFFSET], 0);
        O::write_u32(
            &mut buffer[MAGIC_COOKIE_OFFSET..TRANSACTION_ID_OFFSET],
            MAGIC_COOKIE.as_u32(),
        );
        buffer[TRANSACTION_ID_OFFSET..MESSAGE_HEADER_SIZE]
            .copy_from_slice(header.transaction_id.as_bytes());

        let capacity = buffer.len();
        Ok(Self {
            target: Target::Buffer(buffer),
            header: *header,
            ctx: message_context(capacity),
            #[cfg(feature = "experiments")]
            padding: None,
            phantom: PhantomData,
        })
    }

    /// Creates a serializer that only computes sizes, using the byte order `O`.
    pub fn size_only_with_order(header: &StunHeader) -> Self {
        Self {
            target: Target::SizeOnly,
            header: *header,
            ctx: message_context(MAX_MESSAGE_SIZE),
            #[cfg(feature = "experiments")]
            padding: None,
            phantom: PhantomData,
        }
    }

    #[cfg(feature = "experiments")]
    /// Uses a custom padding. The padding bits MUST be set to zero on
    /// sending and MUST be ignored by the receiver, but the
    /// [`RFC5769`](https://datatracker.ietf.org/doc/html/RFC5769) test
    /// vectors pad with other values. This allows to reproduce them
    /// byte by byte.
    pub fn with_custom_padding(mut self, padding: StunPadding) -> Self {
        self.padding = Some(padding);
        self
    }

    #[cfg(feature = "experiments")]
    fn padding(&self) -> u8 {
        self.padding
            .as_ref()
            .map_or(DEFAULT_PADDING_VALUE, |padding| match padding {
                StunPadding::Random => rand::random(),
                StunPadding::Custom(v) => *v,
            })
    }

    #[cfg(not(feature = "experiments"))]
    fn padding(&self) -> u8 {
        DEFAULT_PADDING_VALUE
    }

    /// Returns the header this message is built with
    pub fn header(&self) -> &StunHeader {
        &self.header
    }

    /// Returns the cursor state
    pub fn context(&self) -> &StunContext {
        &self.ctx
    }

    /// Returns true if this serializer does not write
    pub fn is_size_only(&self) -> bool {
        matches!(self.target, Target::SizeOnly)
    }

    // Validation and cursor arithmetic shared by every attribute. The value
    // is given in parts so that composite values need no scratch buffer.
    fn append(
        &mut self,
        attr_type: AttributeType,
        parts: &[&[u8]],
        barred_after_integrity: bool,
    ) -> Result<(), StunError> {
        let value_size: usize = parts.iter().map(|part| part.len()).sum();
        let length = u16::try_from(value_size)?;
        let size = ATTRIBUTE_HEADER_SIZE + align4(value_size);

        if self.ctx.remaining() < size {
            log::trace!(
                "{} needs {} bytes, {} available",
                attr_type,
                size,
                self.ctx.remaining()
            );
            return Err(StunError::new(
                StunErrorType::OutOfMemory,
                format!(
                    "{} needs {} bytes, {} available",
                    attr_type,
                    size,
                    self.ctx.remaining()
                ),
            ));
        }

        self.ctx
            .check_order(attr_type, barred_after_integrity || attr_type.is_flag())?;

        let padding = self.padding();
        if let Target::Buffer(buffer) = &mut self.target {
            let pos = self.ctx.index();
            let raw = &mut buffer[pos..pos + size];
            O::write_u16(&mut raw[..U16_SIZE], attr_type.as_u16());
            O::write_u16(&mut raw[U16_SIZE..ATTRIBUTE_HEADER_SIZE], length);

            let mut offset = ATTRIBUTE_HEADER_SIZE;
            for part in parts {
                raw[offset..offset + part.len()].copy_from_slice(part);
                offset += part.len();
            }
            raw[offset..].fill(padding);
        }

        self.ctx.record(attr_type);
        self.ctx.advance(size);
        Ok(())
    }

    /// Appends an attribute with an opaque value.
    /// # Returns
    /// [`StunErrorType::BadParam`] if the value is empty or longer than
    /// 65535 bytes, [`StunErrorType::OutOfMemory`] if it does not fit in
    /// the buffer or [`StunErrorType::InvalidAttributeOrder`] if it can not
    /// follow the attributes already added.
    pub fn add_attribute_buffer(
        &mut self,
        attr_type: AttributeType,
        value: &[u8],
    ) -> Result<(), StunError> {
        if value.is_empty() {
            return Err(StunError::new(
                StunErrorType::BadParam,
                format!("Empty value for {}", attr_type),
            ));
        }
        self.append(attr_type, &[value], false)
    }

    /// Appends an attribute with no value.
    /// # Returns
    /// [`StunErrorType::BadParam`] if `attr_type` is not a flag attribute.
    pub fn add_attribute_flag(&mut self, attr_type: AttributeType) -> Result<(), StunError> {
        if !attr_type.is_flag() {
            return Err(StunError::new(
                StunErrorType::BadParam,
                format!("{} is not a flag attribute", attr_type),
            ));
        }
        self.append(attr_type, &[], true)
    }

    /// Appends an attribute holding a 32-bit value
    pub fn add_attribute_u32(
        &mut self,
        attr_type: AttributeType,
        value: u32,
    ) -> Result<(), StunError> {
        let mut raw = [0u8; U32_SIZE];
        O::write_u32(&mut raw, value);
        self.append(attr_type, &[&raw], false)
    }

    /// Appends an attribute holding a 64-bit value
    pub fn add_attribute_u64(
        &mut self,
        attr_type: AttributeType,
        value: u64,
    ) -> Result<(), StunError> {
        let mut raw = [0u8; U64_SIZE];
        O::write_u64(&mut raw, value);
        self.append(attr_type, &[&raw], false)
    }

    /// Appends an address attribute. Addresses of the XOR-* attributes are
    /// transformed with the transaction id of this message; `addr` itself
    /// is left untouched.
    pub fn add_attribute_address(
        &mut self,
        attr_type: AttributeType,
        addr: &StunAddress,
    ) -> Result<(), StunError> {
        if !attr_type.is_address() {
            return Err(StunError::new(
                StunErrorType::BadParam,
                format!("{} is not an address attribute", attr_type),
            ));
        }

        let addr = if attr_type.is_xor_address() {
            xor_address(addr, &self.header.transaction_id)
        } else {
            *addr
        };
        let (raw, size) = addr.encode::<O>();
        self.append(attr_type, &[&raw[..size]], false)
    }

    /// Appends an ERROR-CODE attribute
    pub fn add_attribute_error_code(&mut self, error: &ErrorCode) -> Result<(), StunError> {
        // Values decoded from the wire are not validated
        let error = ErrorCode::from_parts(error.class(), error.number(), error.reason())?;
        let raw = [0x00, 0x00, error.class(), error.number()];
        self.append(AttributeType::ERROR_CODE, &[&raw, error.reason()], true)
    }

    /// Appends an UNKNOWN-ATTRIBUTES attribute
    pub fn add_attribute_unknown_attributes(
        &mut self,
        attr_types: &[AttributeType],
    ) -> Result<(), StunError> {
        if attr_types.is_empty() {
            return Err(StunError::new(
                StunErrorType::BadParam,
                "Empty list of unknown attributes",
            ));
        }
        let mut raw = vec![0u8; attr_types.len() * U16_SIZE];
        for (chunk, attr_type) in raw.chunks_exact_mut(U16_SIZE).zip(attr_types) {
            O::write_u16(chunk, attr_type.as_u16());
        }
        self.append(AttributeType::UNKNOWN_ATTRIBUTES, &[&raw], false)
    }

    /// Appends a CHANNEL-NUMBER attribute
    #[cfg(feature = "turn")]
    pub fn add_attribute_channel_number(&mut self, channel: u16) -> Result<(), StunError> {
        let mut raw = [0u8; U32_SIZE];
        O::write_u16(&mut raw[..U16_SIZE], channel);
        self.append(AttributeType::CHANNEL_NUMBER, &[&raw], true)
    }

    /// Appends an EVEN-PORT attribute
    #[cfg(feature = "turn")]
    pub fn add_attribute_even_port(&mut self, even_port: EvenPort) -> Result<(), StunError> {
        self.append(AttributeType::EVEN_PORT, &[&[even_port.as_byte()]], false)
    }

    add_attribute_fns!(
        (username, USERNAME, add_attribute_buffer(&[u8])),
        (realm, REALM, add_attribute_buffer(&[u8])),
        (nonce, NONCE, add_attribute_buffer(&[u8])),
        (software, SOFTWARE, add_attribute_buffer(&[u8])),
        (integrity, MESSAGE_INTEGRITY, add_attribute_buffer(&[u8])),
        (fingerprint, FINGERPRINT, add_attribute_u32(u32)),
        (change_request, CHANGE_REQUEST, add_attribute_u32(u32)),
        (mapped_address, MAPPED_ADDRESS, add_attribute_address(&StunAddress)),
        (response_address, RESPONSE_ADDRESS, add_attribute_address(&StunAddress)),
        (source_address, SOURCE_ADDRESS, add_attribute_address(&StunAddress)),
        (changed_address, CHANGED_ADDRESS, add_attribute_address(&StunAddress)),
        (reflected_from, REFLECTED_FROM, add_attribute_address(&StunAddress)),
        (xor_mapped_address, XOR_MAPPED_ADDRESS, add_attribute_address(&StunAddress)),
    );

    add_attribute_fns!(
        #[cfg(feature = "ice")]
        (priority, PRIORITY, add_attribute_u32(u32)),
        #[cfg(feature = "ice")]
        (ice_controlled, ICE_CONTROLLED, add_attribute_u64(u64)),
        #[cfg(feature = "ice")]
        (ice_controlling, ICE_CONTROLLING, add_attribute_u64(u64)),
    );

    add_attribute_fns!(
        #[cfg(feature = "turn")]
        (lifetime, LIFETIME, add_attribute_u32(u32)),
        #[cfg(feature = "turn")]
        (data, DATA, add_attribute_buffer(&[u8])),
        #[cfg(feature = "turn")]
        (requested_transport, REQUESTED_TRANSPORT, add_attribute_buffer(&[u8])),
        #[cfg(feature = "turn")]
        (reservation_token, RESERVATION_TOKEN, add_attribute_u64(u64)),
        #[cfg(feature = "turn")]
        (xor_peer_address, XOR_PEER_ADDRESS, add_attribute_address(&StunAddress)),
        #[cfg(feature = "turn")]
        (xor_relayed_address, XOR_RELAYED_ADDRESS, add_attribute_address(&StunAddress)),
    );

    /// Appends a `USE_CANDIDATE` attribute
    #[cfg(feature = "ice")]
    pub fn add_attribute_use_candidate(&mut self) -> Result<(), StunError> {
        self.add_attribute_flag(AttributeType::USE_CANDIDATE)
    }

    /// Appends a `DONT_FRAGMENT` attribute
    #[cfg(feature = "turn")]
    pub fn add_attribute_dont_fragment(&mut self) -> Result<(), StunError> {
        self.add_attribute_flag(AttributeType::DONT_FRAGMENT)
    }

    /// Prepares the message for the computation of its MESSAGE-INTEGRITY.
    /// The header length is set to cover the attribute about to be added.
    /// # Returns
    /// The bytes the HMAC must be computed over, or `None` in size-only mode.
    pub fn integrity_buffer(&mut self) -> Result<Option<&[u8]>, StunError> {
        self.signing_range(AttributeType::MESSAGE_INTEGRITY, INTEGRITY_ATTRIBUTE_SIZE)
    }

    /// Prepares the message for the computation of its FINGERPRINT.
    /// The header length is set to cover the attribute about to be added.
    /// # Returns
    /// The bytes the CRC must be computed over, or `None` in size-only mode.
    pub fn fingerprint_buffer(&mut self) -> Result<Option<&[u8]>, StunError> {
        self.signing_range(AttributeType::FINGERPRINT, FINGERPRINT_ATTRIBUTE_SIZE)
    }

    fn signing_range(
        &mut self,
        attr_type: AttributeType,
        attr_size: usize,
    ) -> Result<Option<&[u8]>, StunError> {
        self.ctx.check_order(attr_type, false)?;
        let pos = self.ctx.index();
        let length = u16::try_from(pos - MESSAGE_HEADER_SIZE + attr_size)?;

        match &mut self.target {
            Target::SizeOnly => Ok(None),
            Target::Buffer(buffer) => {
                O::write_u16(
                    &mut buffer[MESSAGE_LENGTH_OFFSET..MAGIC_COOKIE_OFFSET],
                    length,
                );
                Ok(Some(&buffer[..pos]))
            }
        }
    }

    /// Writes the final message length in the header.
    /// # Returns
    /// The size of the whole message, header included.
    pub fn finalize(mut self) -> usize {
        let size = self.ctx.index();
        if let Target::Buffer(buffer) = &mut self.target {
            // Bounded by message_context
            let length = u16::try_from(size - MESSAGE_HEADER_SIZE).unwrap_or(u16::MAX);
            O::write_u16(
                &mut buffer[MESSAGE_LENGTH_OFFSET..MAGIC_COOKIE_OFFSET],
                length,
            );
        }
        size
    }
}

// Shared by both modes. The 16-bit length field can not describe a bigger message.
fn message_context(capacity: usize) -> StunContext {
    StunContext::new(capacity.min(MAX_MESSAGE_SIZE), MESSAGE_HEADER_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::OrderState;
    use crate::deserializer::Deserializer;
    use crate::types::{MessageType, TransactionId};
    use std::net::SocketAddr;
    use std::str::FromStr;

    const TRANSACTION_ID: [u8; 12] = [
        0xb7, 0xe7, 0xa7, 0x01, 0xbc, 0x34, 0xd6, 0x86, 0xfa, 0x87, 0xdf, 0xae,
    ];

    fn binding_request() -> StunHeader {
        StunHeader::new(
            MessageType::BindingRequest,
            TransactionId::from(TRANSACTION_ID),
        )
    }

    fn ipv6_address() -> StunAddress {
        StunAddress::from(
            SocketAddr::from_str("[2001:db8:1234:5678:11:2233:4455:6677]:21888")
                .expect("Can not parse address"),
        )
    }

    #[test]
    fn encode_header() {
        let mut buffer = [0xffu8; 20];
        let serializer =
            Serializer::new(&mut buffer, &binding_request()).expect("Can not create serializer");
        assert!(!serializer.is_size_only());
        assert_eq!(serializer.header(), &binding_request());
        assert_eq!(serializer.context().index(), MESSAGE_HEADER_SIZE);
        assert_eq!(serializer.finalize(), 20);
        assert_eq!(
            buffer,
            [
                0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xa4, 0x42, 0xb7, 0xe7, 0xa7, 0x01, 0xbc,
                0x34, 0xd6, 0x86, 0xfa, 0x87, 0xdf, 0xae
            ]
        );
    }

    #[test]
    fn encode_header_small_buffer() {
        let mut buffer = [0u8; 19];
        let result = Serializer::new(&mut buffer, &binding_request());
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);
    }

    #[test]
    fn encode_binding_request() {
        let mut buffer = [0u8; 120];
        let mut serializer =
            Serializer::new(&mut buffer, &binding_request()).expect("Can not create serializer");
        serializer
            .add_attribute_username(b"6a05f848:8ac3e902")
            .expect("Can not add USERNAME");
        serializer
            .add_attribute_priority(0x7e7f00ff)
            .expect("Can not add PRIORITY");
        serializer
            .add_attribute_mapped_address(&ipv6_address())
            .expect("Can not add MAPPED-ADDRESS");
        let addr = StunAddress::ipv6(ipv6_address().raw_address().to_owned(), 0x8055);
        serializer
            .add_attribute_xor_mapped_address(&addr)
            .expect("Can not add XOR-MAPPED-ADDRESS");
        let error = ErrorCode::new(403, b"Forbidden IP").expect("Can not create error code");
        serializer
            .add_attribute_error_code(&error)
            .expect("Can not add ERROR-CODE");
        assert_eq!(serializer.finalize(), 120);

        // The caller keeps the untransformed address
        assert_eq!(addr.port(), 0x8055);

        assert_eq!(&buffer[..4], &[0x00, 0x01, 0x00, 0x64]);
        assert_eq!(&buffer[20..24], &[0x00, 0x06, 0x00, 0x11]);
        assert_eq!(&buffer[24..41], b"6a05f848:8ac3e902");
        assert_eq!(&buffer[41..44], &[0x00, 0x00, 0x00]);
        assert_eq!(&buffer[44..52], &[0x00, 0x24, 0x00, 0x04, 0x7e, 0x7f, 0x00, 0xff]);
        assert_eq!(&buffer[52..56], &[0x00, 0x01, 0x00, 0x14]);
        assert_eq!(&buffer[56..60], &[0x00, 0x02, 0x55, 0x80]);
        assert_eq!(&buffer[76..84], &[0x00, 0x20, 0x00, 0x14, 0x00, 0x02, 0xa1, 0x47]);
        assert_eq!(
            &buffer[84..100],
            &[
                0x01, 0x13, 0xa9, 0xfa, 0xa5, 0xd3, 0xf1, 0x79, 0xbc, 0x25, 0xf4, 0xb5, 0xbe,
                0xd2, 0xb9, 0xd9
            ]
        );
        assert_eq!(&buffer[100..108], &[0x00, 0x09, 0x00, 0x10, 0x00, 0x00, 0x04, 0x03]);
        assert_eq!(&buffer[108..], b"Forbidden IP");
    }

    #[test]
    fn round_trip() {
        let header = StunHeader::new(MessageType::BindingIndication, TransactionId::default());
        let mut buffer = [0u8; 128];
        let mut serializer =
            Serializer::new(&mut buffer, &header).expect("Can not create serializer");
        serializer
            .add_attribute_buffer(AttributeType::new(0x7777), &[0x01, 0x02, 0x03])
            .expect("Can not add attribute");
        serializer
            .add_attribute_ice_controlling(0x0102030405060708)
            .expect("Can not add ICE-CONTROLLING");
        serializer
            .add_attribute_xor_relayed_address(&ipv6_address())
            .expect("Can not add XOR-RELAYED-ADDRESS");
        serializer
            .add_attribute_channel_number(0x4000)
            .expect("Can not add CHANNEL-NUMBER");
        serializer
            .add_attribute_dont_fragment()
            .expect("Can not add DONT-FRAGMENT");
        serializer
            .add_attribute_unknown_attributes(&[AttributeType::new(0x7777)])
            .expect("Can not add UNKNOWN-ATTRIBUTES");
        let size = serializer.finalize();

        let (mut deserializer, decoded) =
            Deserializer::new(&buffer[..size]).expect("Can not decode header");
        assert_eq!(decoded, header);

        let attr = deserializer.get_next_attribute().expect("Expected attribute");
        assert_eq!(attr.attribute_type(), AttributeType::new(0x7777));
        assert_eq!(attr.value(), &[0x01, 0x02, 0x03]);

        let attr = deserializer.get_next_attribute().expect("Expected attribute");
        assert_eq!(
            deserializer
                .parse_attribute_ice_controlling(&attr)
                .expect("Can not parse ICE-CONTROLLING"),
            0x0102030405060708
        );

        let attr = deserializer.get_next_attribute().expect("Expected attribute");
        assert_eq!(
            deserializer
                .parse_attribute_xor_relayed_address(&attr)
                .expect("Can not parse XOR-RELAYED-ADDRESS"),
            ipv6_address()
        );

        let attr = deserializer.get_next_attribute().expect("Expected attribute");
        assert_eq!(attr.value(), &[0x40, 0x00, 0x00, 0x00]);
        assert_eq!(
            deserializer
                .parse_attribute_channel_number(&attr)
                .expect("Can not parse CHANNEL-NUMBER"),
            0x4000
        );

        let attr = deserializer.get_next_attribute().expect("Expected attribute");
        deserializer
            .parse_attribute_dont_fragment(&attr)
            .expect("Can not parse DONT-FRAGMENT");

        let attr = deserializer.get_next_attribute().expect("Expected attribute");
        let unknown = deserializer
            .parse_attribute_unknown_attributes(&attr)
            .expect("Can not parse UNKNOWN-ATTRIBUTES");
        assert_eq!(
            unknown.iter::<NetworkEndian>().collect::<Vec<_>>(),
            vec![AttributeType::new(0x7777)]
        );

        let result = deserializer.get_next_attribute();
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::NoMoreAttributeFound
        );
    }

    #[test]
    fn bad_parameters() {
        let mut serializer = Serializer::size_only(&binding_request());
        let result = serializer.add_attribute_buffer(AttributeType::USERNAME, &[]);
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);

        let value = vec![0u8; 65536];
        let result = serializer.add_attribute_data(&value);
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);

        let result = serializer.add_attribute_address(AttributeType::NONCE, &ipv6_address());
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);

        let result = serializer.add_attribute_unknown_attributes(&[]);
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);

        // Only USE-CANDIDATE and DONT-FRAGMENT go without a value
        let result = serializer.add_attribute_flag(AttributeType::USERNAME);
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);
        let result = serializer.add_attribute_flag(AttributeType::MESSAGE_INTEGRITY);
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);
        assert_eq!(serializer.context().order_state(), OrderState::Open);

        // Class 7 can only come from the wire
        let message = [
            0x01, 0x11, 0x00, 0x08, // Failure response type and message length
            0x21, 0x12, 0xa4, 0x42, // Magic cookie
            0xb7, 0xe7, 0xa7, 0x01, // }
            0xbc, 0x34, 0xd6, 0x86, // }  Transaction ID
            0xfa, 0x87, 0xdf, 0xae, // }
            0x00, 0x09, 0x00, 0x04, // ERROR-CODE attribute header
            0x00, 0x00, 0x07, 0x00, // Reserved, class and number
        ];
        let (mut deserializer, _) = Deserializer::new(&message).expect("Can not decode header");
        let attr = deserializer
            .get_next_attribute()
            .expect("Expected ERROR-CODE");
        let error = deserializer
            .parse_attribute_error_code(&attr)
            .expect("Can not parse ERROR-CODE");
        assert_eq!(error.class(), 7);
        let result = serializer.add_attribute_error_code(&error);
        assert_eq!(result.expect_err("Error expected"), StunErrorType::BadParam);

        // Nothing was added
        assert_eq!(serializer.finalize(), 20);
    }

    #[test]
    fn out_of_memory() {
        let mut buffer = [0u8; 32];
        let mut serializer =
            Serializer::new(&mut buffer, &binding_request()).expect("Can not create serializer");
        serializer
            .add_attribute_priority(1)
            .expect("Can not add PRIORITY");
        let result = serializer.add_attribute_priority(2);
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::OutOfMemory
        );
        let result = serializer.add_attribute_realm(b"a");
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::OutOfMemory
        );
        // Flags still fit
        serializer
            .add_attribute_use_candidate()
            .expect("Can not add USE-CANDIDATE");
        assert_eq!(serializer.finalize(), 32);
    }

    #[test]
    fn ordering() {
        let mut serializer = Serializer::size_only(&binding_request());
        serializer
            .add_attribute_use_candidate()
            .expect("Can not add USE-CANDIDATE");
        serializer
            .add_attribute_integrity(&[0u8; 20])
            .expect("Can not add MESSAGE-INTEGRITY");

        // Only FINGERPRINT can follow MESSAGE-INTEGRITY
        let result = serializer.add_attribute_username(b"user");
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::InvalidAttributeOrder
        );
        let result = serializer.add_attribute_integrity(&[0u8; 20]);
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::InvalidAttributeOrder
        );
        let result = serializer.add_attribute_use_candidate();
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::InvalidAttributeOrder
        );
        let error = ErrorCode::new(401, b"Unauthorized").expect("Can not create error code");
        let result = serializer.add_attribute_error_code(&error);
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::InvalidAttributeOrder
        );
        let result = serializer.add_attribute_channel_number(0x4000);
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::InvalidAttributeOrder
        );

        serializer
            .add_attribute_fingerprint(0)
            .expect("Can not add FINGERPRINT");
        let result = serializer.fingerprint_buffer();
        assert_eq!(
            result.expect_err("Error expected"),
            StunErrorType::InvalidAttributeOrder
        );
        assert_eq!(serializer.finalize(), 20 + 4 + 24 + 8);
    }

    #[test]
    fn nothing_after_fingerprint() {
        let appenders: [fn(&mut Serializer) -> Result<(), StunError>; 12] = [
            |s| s.add_attribute_username(b"user"),
            |s| s.add_attribute_fingerprint(0),
            |s| s.add_attribute_integrity(&[0u8; 20]),
            |s| s.add_attribute_priority(1),
            |s| s.add_attribute_ice_controlled(1),
            |s| s.add_attribute_use_candidate(),
            |s| s.add_attribute_dont_fragment(),
            |s| s.add_attribute_xor_mapped_address(&StunAddress::ipv4([10, 0, 0, 1], 3478)),
            |s| s.add_attribute_error_code(&ErrorCode::new(400, b"Bad Request")?),
            |s| s.add_attribute_channel_number(0x4001),
            |s| s.add_attribute_even_port(EvenPort::new(true)),
            |s| s.add_attribute_buffer(AttributeType::new(0xC001), b"x"),
        ];

        for append in appenders.iter() {
            let mut buffer = [0u8; 64];
            let mut serializer = Serializer::new(&mut buffer, &binding_request())
                .expect("Can not create serializer");
            serializer
                .add_attribute_fingerprint(0)
                .expect("Can not add FINGERPRINT");
            assert_eq!(
                append(&mut serializer).expect_err("Error expected"),
                StunErrorType::InvalidAttributeOrder
            );
        }
    }

    fn build_message(serializer: &mut Serializer) -> Result<(), StunError> {
        serializer.add_attribute_software(b"test vector")?;
        serializer.add_attribute_xor_mapped_address(&StunAddress::ipv4([192, 0, 2, 1], 32853))?;
        serializer.add_attribute_reservation_token(0x1122334455667788)?;
        serializer.add_attribute_even_port(EvenPort::new(false))?;
        serializer.add_attribute_lifetime(600)?;
        serializer.integrity_buffer()?;
        serializer.add_attribute_integrity(&[0u8; 20])?;
        serializer.fingerprint_buffer()?;
        serializer.add_attribute_fingerprint(0xdeadbeef)
    }

    #[test]
    fn two_pass_equivalence() {
        let header = binding_request();

        let mut sizer = Serializer::size_only(&header);
        assert!(sizer.is_size_only());
        build_message(&mut sizer).expect("Can not compute size");
        let size = sizer.finalize();

        let mut buffer = vec![0u8; size];
        let mut serializer =
            Serializer::new(&mut buffer, &header).expect("Can not create serializer");
        build_message(&mut serializer).expect("Can not encode message");
        assert_eq!(serializer.finalize(), size);

        // One byte less is not enough
        let mut buffer = vec![0u8; size - 1];
        let mut serializer =
            Serializer::new(&mut buffer, &header).expect("Can not create serializer");
        assert_eq!(
            build_message(&mut serializer).expect_err("Error expected"),
            StunErrorType::OutOfMemory
        );
    }

    fn fill_message(serializer: &mut Serializer) -> Result<(), StunError> {
        serializer.add_attribute_data(&vec![0x55; 60000])?;
        serializer.add_attribute_data(&vec![0x55; 10000])
    }

    #[test]
    fn message_size_limit() {
        let header = binding_request();

        let mut sizer = Serializer::size_only(&header);
        assert_eq!(sizer.context().capacity(), MAX_MESSAGE_SIZE);
        assert_eq!(
            fill_message(&mut sizer).expect_err("Error expected"),
            StunErrorType::OutOfMemory
        );
        let size = sizer.finalize();
        assert_eq!(size, 20 + 4 + 60000);

        // A bigger buffer does not raise the limit
        let mut buffer = vec![0u8; MAX_MESSAGE_SIZE + 100];
        let mut serializer =
            Serializer::new(&mut buffer, &header).expect("Can not create serializer");
        assert_eq!(serializer.context().capacity(), MAX_MESSAGE_SIZE);
        assert_eq!(
            fill_message(&mut serializer).expect_err("Error expected"),
            StunErrorType::OutOfMemory
        );
        assert_eq!(serializer.finalize(), size);
        assert_eq!(&buffer[2..4], &[0xea, 0x64]);

        // The largest body that fits the length field
        let mut sizer = Serializer::size_only(&header);
        sizer
            .add_attribute_data(&vec![0x55; 65528])
            .expect("Can not add DATA");
        assert_eq!(sizer.finalize(), 20 + 65532);
    }

    #[test]
    fn signing_ranges() {
        let mut buffer = [0u8; 60];
        let mut serializer =
            Serializer::new(&mut buffer, &binding_request()).expect("Can not create serializer");
        serializer
            .add_attribute_priority(0x7e7f00ff)
            .expect("Can not add PRIORITY");

        let range = serializer
            .integrity_buffer()
            .expect("Can not get integrity range")
            .expect("Expected bytes to sign");
        assert_eq!(range.len(), 28);
        // Priority (8) + MESSAGE-INTEGRITY (24)
        assert_eq!(&range[2..4], &[0x00, 0x20]);
        serializer
            .add_attribute_integrity(&[0xaa; 20])
            .expect("Can not add MESSAGE-INTEGRITY");

        let range = serializer
            .fingerprint_buffer()
            .expect("Can not get fingerprint range")
            .expect("Expected bytes to checksum");
        assert_eq!(range.len(), 52);
        // Priority (8) + MESSAGE-INTEGRITY (24) + FINGERPRINT (8)
        assert_eq!(&range[2..4], &[0x00, 0x28]);
        serializer
            .add_attribute_fingerprint(0x01020304)
            .expect("Can not add FINGERPRINT");
        assert_eq!(serializer.finalize(), 60);
        assert_eq!(&buffer[2..4], &[0x00, 0x28]);

        let mut sizer = Serializer::size_only(&binding_request());
        assert_eq!(sizer.integrity_buffer().expect("Can not get range"), None);
        assert_eq!(sizer.fingerprint_buffer().expect("Can not get range"), None);
    }

    #[test]
    fn little_endian_strategy() {
        use byteorder::LittleEndian;

        let mut buffer = [0u8; 28];
        let mut serializer =
            Serializer::<LittleEndian>::new_with_order(&mut buffer, &binding_request())
                .expect("Can not create serializer");
        serializer
            .add_attribute_lifetime(600)
            .expect("Can not add LIFETIME");
        assert_eq!(serializer.finalize(), 28);
        assert_eq!(&buffer[..8], &[0x01, 0x00, 0x08, 0x00, 0x42, 0xa4, 0x12, 0x21]);
        assert_eq!(&buffer[20..], &[0x0d, 0x00, 0x04, 0x00, 0x58, 0x02, 0x00, 0x00]);
    }

    #[cfg(feature = "experiments")]
    #[test]
    fn custom_padding() {
        let mut buffer = [0u8; 28];
        let mut serializer = Serializer::new(&mut buffer, &binding_request())
            .expect("Can not create serializer")
            .with_custom_padding(StunPadding::Custom(0x20));
        serializer
            .add_attribute_software(b"abc")
            .expect("Can not add SOFTWARE");
        assert_eq!(serializer.finalize(), 28);
        assert_eq!(&buffer[20..], &[0x80, 0x22, 0x00, 0x03, 0x61, 0x62, 0x63, 0x20]);
    }
}
