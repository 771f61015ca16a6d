//! Address obfuscation used by the XOR-* address attributes.

use crate::address::{AddressFamily, StunAddress};
use crate::types::{TransactionId, MAGIC_COOKIE, MAGIC_COOKIE_SIZE};

/// Applies the XOR transform to an address and returns the transformed copy.
///
/// The port is XORed with the most significant 16 bits of the magic cookie
/// and the first 4 address bytes with the cookie itself. For IPv6, the
/// remaining 12 address bytes are XORed with the transaction id. The
/// transform is its own inverse, so the same call obfuscates an address
/// before encoding and restores it after decoding.
///
/// # Examples
///```rust
/// # use stun_codec::{xor_address, StunAddress, TransactionId};
/// let transaction_id = TransactionId::from([0x01; 12]);
/// let addr = StunAddress::ipv4([192, 0, 2, 1], 32853);
/// let xored = xor_address(&addr, &transaction_id);
/// assert_eq!(xored.port(), 0xa147);
/// assert_eq!(xored.address(), &[0xe1, 0x12, 0xa6, 0x43]);
/// assert_eq!(xor_address(&xored, &transaction_id), addr);
///```
pub fn xor_address(addr: &StunAddress, transaction_id: &TransactionId) -> StunAddress {
    let port = addr.port() ^ MAGIC_COOKIE.high_u16();

    let mut octets = *addr.raw_address();
    let cookie = MAGIC_COOKIE.as_u32().to_be_bytes();
    for (b, c) in octets.iter_mut().zip(cookie.iter()) {
        *b ^= c;
    }

    if addr.family() == AddressFamily::IPv6 {
        for (b, t) in octets
            .iter_mut()
            .skip(MAGIC_COOKIE_SIZE)
            .zip(transaction_id.as_bytes().iter())
        {
            *b ^= t;
        }
    }

    StunAddress::with_parts(addr.family(), port, octets)
}
