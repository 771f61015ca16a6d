use crate::address::StunAddress;
use crate::attributes::{AttributeType, ErrorCode, EvenPort, UnknownAttributes};
use crate::common::{
    align4, check_buffer_boundaries, check_value_size, ATTRIBUTE_HEADER_SIZE,
    MAGIC_COOKIE_OFFSET, MESSAGE_HEADER_SIZE, MESSAGE_LENGTH_OFFSET, MESSAGE_TYPE_OFFSET,
    TRANSACTION_ID_OFFSET, U16_SIZE, U32_SIZE, U64_SIZE,
};
use crate::context::{ContextFlags, StunContext};
use crate::error::{StunError, StunErrorType};
use crate::types::{MessageType, StunHeader, TransactionId, MAGIC_COOKIE};
use crate::xor::xor_address;
use byteorder::{ByteOrder, NetworkEndian};
use fallible_iterator::FallibleIterator;
use std::convert::TryFrom;
use std::marker::PhantomData;

const MESSAGE_TYPE_RESERVED_BITS: u16 = 0xC000;

/// Offset of an attribute inside the message it was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct AttributeSlot(usize);

impl AttributeSlot {
    /// Returns the offset of the attribute header from the start of the message
    pub fn offset(&self) -> usize {
        self.0
    }
}

/// A zero-copy view of an attribute found in a message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StunAttribute<'a> {
    attr_type: AttributeType,
    value: &'a [u8],
    slot: AttributeSlot,
}

impl<'a> StunAttribute<'a> {
    /// Returns the attribute type
    pub fn attribute_type(&self) -> AttributeType {
        self.attr_type
    }

    /// Returns the value of the attribute, without padding
    pub fn value(&self) -> &'a [u8] {
        self.value
    }

    /// Returns the unpadded length of the value
    pub fn len(&self) -> usize {
        self.value.len()
    }

    /// Returns true if the attribute has no value
    pub fn is_empty(&self) -> bool {
        self.value.is_empty()
    }

    /// Returns the position of the attribute in the message
    pub fn slot(&self) -> AttributeSlot {
        self.slot
    }

    /// Returns the number of bytes the attribute takes in the message
    pub fn wire_size(&self) -> usize {
        ATTRIBUTE_HEADER_SIZE + align4(self.value.len())
    }
}

/// The part of a message a MESSAGE-INTEGRITY or FINGERPRINT value is
/// computed over: every byte before the attribute, with the header length
/// field covering the message up to and including the attribute.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SigningRange<'a> {
    header: [u8; MESSAGE_HEADER_SIZE],
    range: &'a [u8],
    message_length: u16,
}

impl<'a> SigningRange<'a> {
    fn new<O: ByteOrder>(range: &'a [u8], message_length: u16) -> Self {
        let mut header = [0u8; MESSAGE_HEADER_SIZE];
        header.copy_from_slice(&range[..MESSAGE_HEADER_SIZE]);
        O::write_u16(
            &mut header[MESSAGE_LENGTH_OFFSET..MAGIC_COOKIE_OFFSET],
            message_length,
        );
        Self {
            header,
            range,
            message_length,
        }
    }

    /// The bytes as they are in the message, with the original length field
    pub fn bytes(&self) -> &'a [u8] {
        self.range
    }

    /// The value the header length field must carry while computing the digest
    pub fn message_length(&self) -> u16 {
        self.message_length
    }

    /// The message header with the adjusted length field
    pub fn header(&self) -> &[u8; MESSAGE_HEADER_SIZE] {
        &self.header
    }

    /// The attributes that precede the signed attribute
    pub fn body(&self) -> &'a [u8] {
        &self.range[MESSAGE_HEADER_SIZE..]
    }

    /// Returns the bytes to feed to the HMAC or CRC computation
    pub fn to_input_text(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(self.range.len());
        out.extend_from_slice(&self.header);
        out.extend_from_slice(self.body());
        out
    }
}

// Location of an attribute that protects the bytes preceding it
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Protection {
    offset: usize,
    size: usize,
}

/// Walks a STUN message attribute by attribute.
///
/// The deserializer never copies the input: attributes are returned as
/// views of the buffer. The sequence is forward-only; scanning the message
/// again requires a new deserializer.
///
/// # Examples
///```rust
/// # use stun_codec::{AttributeType, Deserializer, MessageType, StunErrorType};
/// # use std::error::Error;
/// #
/// # fn main() -> Result<(), Box<dyn Error>> {
/// let buffer = [
///     0x00, 0x01, 0x00, 0x08, // Request type and message length
///     0x21, 0x12, 0xa4, 0x42, // Magic cookie
///     0xb7, 0xe7, 0xa7, 0x01, // }
///     0xbc, 0x34, 0xd6, 0x86, // }  Transaction ID
///     0xfa, 0x87, 0xdf, 0xae, // }
///     0x00, 0x24, 0x00, 0x04, // PRIORITY attribute header
///     0x6e, 0x00, 0x01, 0xff, // Priority value
/// ];
/// let (mut deserializer, header) = Deserializer::new(&buffer)?;
/// assert_eq!(header.message_type, MessageType::BindingRequest);
///
/// let attr = deserializer.get_next_attribute()?;
/// assert_eq!(attr.attribute_type(), AttributeType::PRIORITY);
/// assert_eq!(deserializer.parse_attribute_priority(&attr)?, 0x6e0001ff);
///
/// let result = deserializer.get_next_attribute();
/// assert_eq!(result.expect_err("Error expected"), StunErrorType::NoMoreAttributeFound);
/// #
/// #   Ok(())
/// # }
///```
#[derive(Debug)]
pub struct Deserializer<'a, O = NetworkEndian> {
    buffer: &'a [u8],
    header: StunHeader,
    ctx: StunContext,
    integrity: Option<Protection>,
    fingerprint: Option<Protection>,
    phantom: PhantomData<O>,
}

impl<'a> Deserializer<'a, NetworkEndian> {
    /// Reads the header of a message in network byte order.
    /// # Returns
    /// The deserializer positioned on the first attribute and the message
    /// header, or a [`StunError`] if the header is not valid.
    pub fn new(buffer: &'a [u8]) -> Result<(Self, StunHeader), StunError> {
        Deserializer::with_byte_order(buffer)
    }
}

macro_rules! parse_attribute_fns {
    ($(
        $(#[$meta:meta])*
        ($name:ident, $attr_type:ident, $parser:ident -> $ret:ty)
    ),* $(,)?) => {
        paste::paste! {
            $(
                $(#[$meta])*
                #[doc = "Parses the value of a `" $attr_type "` attribute"]
                pub fn [<parse_attribute_ $name>](
                    &self,
                    attr: &StunAttribute<'a>,
                ) -> Result<$ret, StunError> {
                    self.$parser(attr, AttributeType::$attr_type)
                }
            )*
        }
    };
}

impl<'a, O> Deserializer<'a, O>
where
    O: ByteOrder,
{
    /// Reads the header of a message using the byte order `O`.
    pub fn with_byte_order(buffer: &'a [u8]) -> Result<(Self, StunHeader), StunError> {
        check_buffer_boundaries(buffer, MESSAGE_HEADER_SIZE, StunErrorType::BadParam)?;

        let cookie = O::read_u32(&buffer[MAGIC_COOKIE_OFFSET..TRANSACTION_ID_OFFSET]);
        if cookie != MAGIC_COOKIE {
            log::trace!("magic cookie mismatch: {:#010x}", cookie);
            return Err(StunError::new(
                StunErrorType::MagicCookieMismatch,
                format!("Expected {:#010x}, got {:#010x}", MAGIC_COOKIE.as_u32(), cookie),
            ));
        }

        let msg_type = O::read_u16(&buffer[MESSAGE_TYPE_OFFSET..MESSAGE_LENGTH_OFFSET]);
        if msg_type & MESSAGE_TYPE_RESERVED_BITS != 0 {
            return Err(StunError::new(
                StunErrorType::MalformedMessage,
                format!("Most significant bits of {:#06x} are not zero", msg_type),
            ));
        }
        let message_type = MessageType::try_from(msg_type)?;

        let body_length =
            usize::from(O::read_u16(&buffer[MESSAGE_LENGTH_OFFSET..MAGIC_COOKIE_OFFSET]));
        let message_size = MESSAGE_HEADER_SIZE + body_length;
        if message_size > buffer.len() || body_length % 4 != 0 {
            log::trace!(
                "declared length {} does not fit a buffer of {} bytes",
                body_length,
                buffer.len()
            );
            return Err(StunError::new(
                StunErrorType::MalformedMessage,
                format!(
                    "Declared message length: {}, buffer size: {}",
                    body_length,
                    buffer.len()
                ),
            ));
        }

        let transaction_id =
            TransactionId::try_from(&buffer[TRANSACTION_ID_OFFSET..MESSAGE_HEADER_SIZE])?;
        let header = StunHeader::new(message_type, transaction_id);

        let deserializer = Self {
            buffer: &buffer[..message_size],
            header,
            ctx: StunContext::new(message_size, MESSAGE_HEADER_SIZE),
            integrity: None,
            fingerprint: None,
            phantom: PhantomData,
        };

        Ok((deserializer, header))
    }

    /// Returns the message header
    pub fn header(&self) -> &StunHeader {
        &self.header
    }

    /// Returns the cursor state
    pub fn context(&self) -> &StunContext {
        &self.ctx
    }

    /// Returns the message as delimited by the length in its header
    pub fn message(&self) -> &'a [u8] {
        self.buffer
    }

    /// Reads the next attribute and moves the cursor past it.
    /// # Returns
    /// The attribute, [`StunErrorType::NoMoreAttributeFound`] when the end
    /// of the message is reached, or [`StunErrorType::InvalidAttributeLength`]
    /// if the attribute overruns the message. In the latter case the cursor
    /// is left on the invalid attribute.
    pub fn get_next_attribute(&mut self) -> Result<StunAttribute<'a>, StunError> {
        if self.ctx.remaining() < ATTRIBUTE_HEADER_SIZE {
            return Err(StunError::new(
                StunErrorType::NoMoreAttributeFound,
                format!("No attributes after position {}", self.ctx.index()),
            ));
        }

        let pos = self.ctx.index();
        let value_pos = pos + ATTRIBUTE_HEADER_SIZE;
        let attr_type = AttributeType::from(O::read_u16(&self.buffer[pos..pos + U16_SIZE]));
        let length = usize::from(O::read_u16(&self.buffer[pos + U16_SIZE..value_pos]));

        let available = self.ctx.remaining() - ATTRIBUTE_HEADER_SIZE;
        if align4(length) > available {
            log::trace!(
                "{} declares {} bytes, {} available",
                attr_type,
                length,
                available
            );
            return Err(StunError::new(
                StunErrorType::InvalidAttributeLength,
                format!(
                    "{} at position {} declares {} bytes, only {} available",
                    attr_type, pos, length, available
                ),
            ));
        }

        let attr = StunAttribute {
            attr_type,
            value: &self.buffer[value_pos..value_pos + length],
            slot: AttributeSlot(pos),
        };

        let protection = Protection {
            offset: pos,
            size: attr.wire_size(),
        };
        match attr_type {
            AttributeType::MESSAGE_INTEGRITY if self.integrity.is_none() => {
                self.integrity = Some(protection)
            }
            AttributeType::FINGERPRINT if self.fingerprint.is_none() => {
                self.fingerprint = Some(protection)
            }
            _ => {}
        }

        self.ctx.record(attr_type);
        self.ctx.advance(attr.wire_size());

        Ok(attr)
    }

    /// Scans forward from the cursor for the first attribute of type `attr_type`.
    /// # Returns
    /// The attribute, `None` if the end of the message was reached without
    /// finding it, or the error that stopped the scan.
    pub fn find_attribute(
        &mut self,
        attr_type: AttributeType,
    ) -> Result<Option<StunAttribute<'a>>, StunError> {
        while let Some(attr) = self.next()? {
            if attr.attribute_type() == attr_type {
                return Ok(Some(attr));
            }
        }
        Ok(None)
    }

    /// Returns true if the flag attribute `attr_type` was walked over
    pub fn is_flag_attribute_found(&self, attr_type: AttributeType) -> Result<bool, StunError> {
        match ContextFlags::from_attribute(attr_type) {
            Some(flag) if attr_type.is_flag() => Ok(self.ctx.contains(flag)),
            _ => Err(StunError::new(
                StunErrorType::BadParam,
                format!("{} is not a flag attribute", attr_type),
            )),
        }
    }

    /// Returns the range a MESSAGE-INTEGRITY value is computed over.
    /// The MESSAGE-INTEGRITY attribute must have been walked over already.
    pub fn integrity_buffer(&self) -> Result<SigningRange<'a>, StunError> {
        self.signing_range(self.integrity, AttributeType::MESSAGE_INTEGRITY)
    }

    /// Returns the range a FINGERPRINT value is computed over.
    /// The FINGERPRINT attribute must have been walked over already.
    pub fn fingerprint_buffer(&self) -> Result<SigningRange<'a>, StunError> {
        self.signing_range(self.fingerprint, AttributeType::FINGERPRINT)
    }

    fn signing_range(
        &self,
        protection: Option<Protection>,
        attr_type: AttributeType,
    ) -> Result<SigningRange<'a>, StunError> {
        let protection = protection.ok_or_else(|| {
            StunError::new(
                StunErrorType::BadParam,
                format!("{} has not been found yet", attr_type),
            )
        })?;
        let length = protection.offset + protection.size - MESSAGE_HEADER_SIZE;
        Ok(SigningRange::new::<O>(
            &self.buffer[..protection.offset],
            u16::try_from(length)?,
        ))
    }

    fn check_type(
        &self,
        attr: &StunAttribute<'a>,
        attr_type: AttributeType,
    ) -> Result<(), StunError> {
        (attr.attribute_type() == attr_type)
            .then_some(())
            .ok_or_else(|| {
                StunError::new(
                    StunErrorType::BadParam,
                    format!("Expected {}, got {}", attr_type, attr.attribute_type()),
                )
            })
    }

    fn parse_u32(
        &self,
        attr: &StunAttribute<'a>,
        attr_type: AttributeType,
    ) -> Result<u32, StunError> {
        self.check_type(attr, attr_type)?;
        check_value_size(attr.value(), U32_SIZE)?;
        Ok(O::read_u32(attr.value()))
    }

    fn parse_u64(
        &self,
        attr: &StunAttribute<'a>,
        attr_type: AttributeType,
    ) -> Result<u64, StunError> {
        self.check_type(attr, attr_type)?;
        check_value_size(attr.value(), U64_SIZE)?;
        Ok(O::read_u64(attr.value()))
    }

    fn parse_buffer(
        &self,
        attr: &StunAttribute<'a>,
        attr_type: AttributeType,
    ) -> Result<&'a [u8], StunError> {
        self.check_type(attr, attr_type)?;
        Ok(attr.value())
    }

    fn parse_flag(
        &self,
        attr: &StunAttribute<'a>,
        attr_type: AttributeType,
    ) -> Result<(), StunError> {
        self.check_type(attr, attr_type)?;
        check_value_size(attr.value(), 0)
    }

    fn parse_typed_address(
        &self,
        attr: &StunAttribute<'a>,
        attr_type: AttributeType,
    ) -> Result<StunAddress, StunError> {
        self.check_type(attr, attr_type)?;
        self.parse_attribute_address(attr)
    }

    /// Parses the value of any address attribute. Addresses carried by the
    /// XOR-* attributes are returned already restored.
    pub fn parse_attribute_address(
        &self,
        attr: &StunAttribute<'a>,
    ) -> Result<StunAddress, StunError> {
        let attr_type = attr.attribute_type();
        if !attr_type.is_address() {
            return Err(StunError::new(
                StunErrorType::BadParam,
                format!("{} is not an address attribute", attr_type),
            ));
        }

        let addr = StunAddress::decode::<O>(attr.value())?;
        if attr_type.is_xor_address() {
            Ok(xor_address(&addr, &self.header.transaction_id))
        } else {
            Ok(addr)
        }
    }

    /// Parses the value of an `ERROR_CODE` attribute
    pub fn parse_attribute_error_code(
        &self,
        attr: &StunAttribute<'a>,
    ) -> Result<ErrorCode<'a>, StunError> {
        self.check_type(attr, AttributeType::ERROR_CODE)?;
        ErrorCode::decode(attr.value())
    }

    /// Parses the value of an `UNKNOWN_ATTRIBUTES` attribute
    pub fn parse_attribute_unknown_attributes(
        &self,
        attr: &StunAttribute<'a>,
    ) -> Result<UnknownAttributes<'a>, StunError> {
        self.check_type(attr, AttributeType::UNKNOWN_ATTRIBUTES)?;
        UnknownAttributes::decode(attr.value())
    }

    /// Parses the value of a `CHANNEL_NUMBER` attribute. The reserved half
    /// of the value is ignored.
    #[cfg(feature = "turn")]
    pub fn parse_attribute_channel_number(
        &self,
        attr: &StunAttribute<'a>,
    ) -> Result<u16, StunError> {
        self.check_type(attr, AttributeType::CHANNEL_NUMBER)?;
        check_value_size(attr.value(), U32_SIZE)?;
        Ok(O::read_u16(&attr.value()[..U16_SIZE]))
    }

    /// Parses the value of an `EVEN_PORT` attribute
    #[cfg(feature = "turn")]
    pub fn parse_attribute_even_port(
        &self,
        attr: &StunAttribute<'a>,
    ) -> Result<EvenPort, StunError> {
        self.check_type(attr, AttributeType::EVEN_PORT)?;
        check_value_size(attr.value(), 1)?;
        Ok(EvenPort::from_byte(attr.value()[0]))
    }

    parse_attribute_fns!(
        (fingerprint, FINGERPRINT, parse_u32 -> u32),
        (change_request, CHANGE_REQUEST, parse_u32 -> u32),
        (username, USERNAME, parse_buffer -> &'a [u8]),
        (realm, REALM, parse_buffer -> &'a [u8]),
        (nonce, NONCE, parse_buffer -> &'a [u8]),
        (software, SOFTWARE, parse_buffer -> &'a [u8]),
        (integrity, MESSAGE_INTEGRITY, parse_buffer -> &'a [u8]),
        (mapped_address, MAPPED_ADDRESS, parse_typed_address -> StunAddress),
        (response_address, RESPONSE_ADDRESS, parse_typed_address -> StunAddress),
        (source_address, SOURCE_ADDRESS, parse_typed_address -> StunAddress),
        (changed_address, CHANGED_ADDRESS, parse_typed_address -> StunAddress),
        (reflected_from, REFLECTED_FROM, parse_typed_address -> StunAddress),
        (xor_mapped_address, XOR_MAPPED_ADDRESS, parse_typed_address -> StunAddress),
    );

    parse_attribute_fns!(
        #[cfg(feature = "ice")]
        (priority, PRIORITY, parse_u32 -> u32),
        #[cfg(feature = "ice")]
        (ice_controlled, ICE_CONTROLLED, parse_u64 -> u64),
        #[cfg(feature = "ice")]
        (ice_controlling, ICE_CONTROLLING, parse_u64 -> u64),
        #[cfg(feature = "ice")]
        (use_candidate, USE_CANDIDATE, parse_flag -> ()),
    );

    parse_attribute_fns!(
        #[cfg(feature = "turn")]
        (lifetime, LIFETIME, parse_u32 -> u32),
        #[cfg(feature = "turn")]
        (data, DATA, parse_buffer -> &'a [u8]),
        #[cfg(feature = "turn")]
        (requested_transport, REQUESTED_TRANSPORT, parse_buffer -> &'a [u8]),
        #[cfg(feature = "turn")]
        (reservation_token, RESERVATION_TOKEN, parse_u64 -> u64),
        #[cfg(feature = "turn")]
        (dont_fragment, DONT_FRAGMENT, parse_flag -> ()),
        #[cfg(feature = "turn")]
        (xor_peer_address, XOR_PEER_ADDRESS, parse_typed_address -> StunAddress),
        #[cfg(feature = "turn")]
        (xor_relayed_address, XOR_RELAYED_ADDRESS, parse_typed_address -> StunAddress),
    );
}

impl<'a, O> FallibleIterator for Deserializer<'a, O>
where
    O: ByteOrder,
{
    type Item = StunAttribute<'a>;
    type Error = StunError;

    fn next(&mut self) -> Result<Option<Self::Item>, Self::Error> {
        match self.get_next_attribute() {
            Ok(attr) => Ok(Some(attr)),
            Err(e) if e.is_end_of_attributes() => Ok(None),
            Err(e) => Err(e),
        }
    }
}

/// Replaces the value of the NONCE attribute at `slot` in place.
///
/// The new value must take the same number of padded bytes as the current
/// one, so that no other attribute moves. The length field is rewritten and
/// the padding is zeroed.
pub fn update_attribute_nonce<O: ByteOrder>(
    message: &mut [u8],
    slot: AttributeSlot,
    nonce: &[u8],
) -> Result<(), StunError> {
    if nonce.is_empty() {
        return Err(StunError::new(StunErrorType::BadParam, "Empty nonce"));
    }

    let pos = slot.offset();
    let value_pos = pos + ATTRIBUTE_HEADER_SIZE;
    check_buffer_boundaries(message, value_pos, StunErrorType::BadParam)?;

    let attr_type = AttributeType::from(O::read_u16(&message[pos..pos + U16_SIZE]));
    if attr_type != AttributeType::NONCE {
        return Err(StunError::new(
            StunErrorType::BadParam,
            format!("Expected {}, got {}", AttributeType::NONCE, attr_type),
        ));
    }

    let current = usize::from(O::read_u16(&message[pos + U16_SIZE..value_pos]));
    if align4(nonce.len()) != align4(current) {
        return Err(StunError::new(
            StunErrorType::InvalidAttributeLength,
            format!(
                "New nonce of {} bytes does not fit a slot of {} bytes",
                nonce.len(),
                align4(current)
            ),
        ));
    }
    check_buffer_boundaries(
        message,
        value_pos + align4(current),
        StunErrorType::InvalidAttributeLength,
    )?;

    O::write_u16(
        &mut message[pos + U16_SIZE..value_pos],
        u16::try_from(nonce.len())?,
    );
    let slot_value = &mut message[value_pos..value_pos + align4(current)];
    slot_value[..nonce.len()].copy_from_slice(nonce);
    slot_value[nonce.len()..].fill(0);

    Ok(())
}
