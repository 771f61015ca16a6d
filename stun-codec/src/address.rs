use crate::common::{check_buffer_boundaries, U16_SIZE};
use crate::error::{StunError, StunErrorType};
use byteorder::ByteOrder;
use std::convert::TryFrom;
use std::fmt;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};

// Format of MAPPED-ADDRESS Attribute:
//	    0                   1                   2                   3
//      0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1 2 3 4 5 6 7 8 9 0 1
//     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//     |0 0 0 0 0 0 0 0|    Family     |           Port                |
//     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+
//     |                                                               |
//     |                 Address (32 bits or 128 bits)                 |
//     |                                                               |
//     +-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+-+

const ADDRESS_HEADER_SIZE: usize = 4;
pub(crate) const IPV4_ADDRESS_SIZE: usize = 4;
pub(crate) const IPV6_ADDRESS_SIZE: usize = 16;
pub(crate) const MAX_ADDRESS_VALUE_SIZE: usize = ADDRESS_HEADER_SIZE + IPV6_ADDRESS_SIZE;

/// Address family
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AddressFamily {
    /// IP version 4
    IPv4,
    /// IP version 6
    IPv6,
}

impl AddressFamily {
    /// Number of address bytes used by this family
    pub fn address_size(&self) -> usize {
        match self {
            AddressFamily::IPv4 => IPV4_ADDRESS_SIZE,
            AddressFamily::IPv6 => IPV6_ADDRESS_SIZE,
        }
    }

    fn as_u8(&self) -> u8 {
        match self {
            AddressFamily::IPv4 => 0x01,
            AddressFamily::IPv6 => 0x02,
        }
    }
}

impl TryFrom<u8> for AddressFamily {
    type Error = StunError;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            0x01 => Ok(AddressFamily::IPv4),
            0x02 => Ok(AddressFamily::IPv6),
            _ => Err(StunError::new(
                StunErrorType::MalformedMessage,
                format!("Invalid address family ({:#04x})", value),
            )),
        }
    }
}

/// A transport address as carried by the address attributes. IPv4
/// addresses only use the first 4 bytes of the address slot.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct StunAddress {
    family: AddressFamily,
    port: u16,
    address: [u8; IPV6_ADDRESS_SIZE],
}

impl StunAddress {
    /// Creates an IPv4 address
    pub fn ipv4(octets: [u8; IPV4_ADDRESS_SIZE], port: u16) -> Self {
        let mut address = [0u8; IPV6_ADDRESS_SIZE];
        address[..IPV4_ADDRESS_SIZE].copy_from_slice(&octets);
        Self {
            family: AddressFamily::IPv4,
            port,
            address,
        }
    }

    /// Creates an IPv6 address
    pub fn ipv6(octets: [u8; IPV6_ADDRESS_SIZE], port: u16) -> Self {
        Self {
            family: AddressFamily::IPv6,
            port,
            address: octets,
        }
    }

    /// Returns the address family
    pub fn family(&self) -> AddressFamily {
        self.family
    }

    /// Returns the port
    pub fn port(&self) -> u16 {
        self.port
    }

    /// Returns the address bytes in use for this family
    pub fn address(&self) -> &[u8] {
        &self.address[..self.family.address_size()]
    }

    /// Returns the standard library representation of this address
    pub fn socket_address(&self) -> SocketAddr {
        let ip = match self.family {
            AddressFamily::IPv4 => IpAddr::V4(Ipv4Addr::new(
                self.address[0],
                self.address[1],
                self.address[2],
                self.address[3],
            )),
            AddressFamily::IPv6 => IpAddr::V6(Ipv6Addr::from(self.address)),
        };
        SocketAddr::new(ip, self.port)
    }

    /// Size of the attribute value that carries this address
    pub fn encoded_size(&self) -> usize {
        ADDRESS_HEADER_SIZE + self.family.address_size()
    }

    pub(crate) fn with_parts(family: AddressFamily, port: u16, address: [u8; 16]) -> Self {
        Self {
            family,
            port,
            address,
        }
    }

    pub(crate) fn raw_address(&self) -> &[u8; IPV6_ADDRESS_SIZE] {
        &self.address
    }

    pub(crate) fn decode<O: ByteOrder>(value: &[u8]) -> Result<Self, StunError> {
        check_buffer_boundaries(
            value,
            ADDRESS_HEADER_SIZE,
            StunErrorType::InvalidAttributeLength,
        )?;

        let family = AddressFamily::try_from(value[1])?;
        let port = O::read_u16(&value[U16_SIZE..ADDRESS_HEADER_SIZE]);

        let size = ADDRESS_HEADER_SIZE + family.address_size();
        if value.len() != size {
            return Err(StunError::new(
                StunErrorType::InvalidAttributeLength,
                format!(
                    "Address value of {} bytes, {:?} requires {}",
                    value.len(),
                    family,
                    size
                ),
            ));
        }

        let mut address = [0u8; IPV6_ADDRESS_SIZE];
        address[..family.address_size()].copy_from_slice(&value[ADDRESS_HEADER_SIZE..]);

        Ok(Self {
            family,
            port,
            address,
        })
    }

    pub(crate) fn encode<O: ByteOrder>(&self) -> ([u8; MAX_ADDRESS_VALUE_SIZE], usize) {
        let mut value = [0u8; MAX_ADDRESS_VALUE_SIZE];
        // The first 8 bits MUST be set to 0 and MUST be ignored
        // by receivers.
        value[1] = self.family.as_u8();
        O::write_u16(&mut value[U16_SIZE..ADDRESS_HEADER_SIZE], self.port);
        let size = self.encoded_size();
        value[ADDRESS_HEADER_SIZE..size].copy_from_slice(self.address());
        (value, size)
    }
}

impl From<SocketAddr> for StunAddress {
    fn from(addr: SocketAddr) -> Self {
        match addr.ip() {
            IpAddr::V4(ip) => StunAddress::ipv4(ip.octets(), addr.port()),
            IpAddr::V6(ip) => StunAddress::ipv6(ip.octets(), addr.port()),
        }
    }
}

impl From<StunAddress> for SocketAddr {
    fn from(addr: StunAddress) -> Self {
        addr.socket_address()
    }
}

impl fmt::Debug for StunAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "StunAddress({:?}, {})", self.family, self.socket_address())
    }
}

impl fmt::Display for StunAddress {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.socket_address())
    }
}
