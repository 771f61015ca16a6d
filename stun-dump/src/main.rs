use anyhow::{bail, Context, Result};
use clap::Parser;
use stun_codec::{
    AttributeType, ByteOrder, Deserializer, LittleEndian, NetworkEndian, StunAttribute,
};

const FINGERPRINT_XOR_VALUE: u32 = 0x5354_554e;

#[derive(Parser, Debug)]
#[command(author, version, about = "Decodes STUN messages and prints their attributes", long_about = None)]
struct Args {
    /// Hex encoded messages. The RFC 5769 test vectors are dumped when none is given
    messages: Vec<String>,

    /// Password used to check MESSAGE-INTEGRITY values (short-term credentials)
    #[arg(short, long)]
    password: Option<String>,

    /// Read the messages in little endian byte order
    #[arg(long)]
    little_endian: bool,
}

fn decode_hex(input: &str) -> Result<Vec<u8>> {
    let digits: Vec<u8> = input
        .bytes()
        .filter(|b| !b.is_ascii_whitespace() && *b != b':')
        .collect();
    if digits.len() % 2 != 0 {
        bail!("Odd number of hex digits: {}", digits.len());
    }

    digits
        .chunks(2)
        .map(|pair| {
            let pair = std::str::from_utf8(pair)?;
            u8::from_str_radix(pair, 16).with_context(|| format!("Invalid hex byte {:?}", pair))
        })
        .collect()
}

fn to_hex(bytes: &[u8]) -> String {
    bytes.iter().map(|b| format!("{:02x}", b)).collect()
}

fn status(valid: bool) -> &'static str {
    if valid {
        "valid"
    } else {
        "INVALID"
    }
}

fn describe<'a, O: ByteOrder + 'static>(
    deserializer: &Deserializer<'a, O>,
    attr: &StunAttribute<'a>,
    key: Option<&[u8]>,
) -> Result<String> {
    let text = match attr.attribute_type() {
        AttributeType::USERNAME
        | AttributeType::REALM
        | AttributeType::NONCE
        | AttributeType::SOFTWARE => format!("{:?}", String::from_utf8_lossy(attr.value())),
        attr_type if attr_type.is_address() => {
            deserializer.parse_attribute_address(attr)?.to_string()
        }
        AttributeType::ERROR_CODE => {
            let error = deserializer.parse_attribute_error_code(attr)?;
            format!(
                "{} {:?}",
                error.code(),
                String::from_utf8_lossy(error.reason())
            )
        }
        AttributeType::UNKNOWN_ATTRIBUTES => deserializer
            .parse_attribute_unknown_attributes(attr)?
            .iter::<O>()
            .map(|attr_type| attr_type.to_string())
            .collect::<Vec<_>>()
            .join(", "),
        AttributeType::PRIORITY => deserializer.parse_attribute_priority(attr)?.to_string(),
        AttributeType::ICE_CONTROLLED => {
            format!("{:#018x}", deserializer.parse_attribute_ice_controlled(attr)?)
        }
        AttributeType::ICE_CONTROLLING => {
            format!("{:#018x}", deserializer.parse_attribute_ice_controlling(attr)?)
        }
        AttributeType::LIFETIME => {
            format!("{} seconds", deserializer.parse_attribute_lifetime(attr)?)
        }
        AttributeType::CHANNEL_NUMBER => {
            format!("{:#06x}", deserializer.parse_attribute_channel_number(attr)?)
        }
        AttributeType::EVEN_PORT => format!(
            "reserve next port: {}",
            deserializer.parse_attribute_even_port(attr)?.reserve()
        ),
        AttributeType::RESERVATION_TOKEN => {
            format!("{:#018x}", deserializer.parse_attribute_reservation_token(attr)?)
        }
        attr_type if attr_type.is_flag() => String::from("set"),
        AttributeType::MESSAGE_INTEGRITY => {
            let value = deserializer.parse_attribute_integrity(attr)?;
            match key {
                Some(key) => {
                    let range = deserializer.integrity_buffer()?;
                    let hmac = hmac_sha1::hmac_sha1(key, &range.to_input_text());
                    format!("{} ({})", to_hex(value), status(hmac == value))
                }
                None => to_hex(value),
            }
        }
        AttributeType::FINGERPRINT => {
            let value = deserializer.parse_attribute_fingerprint(attr)?;
            let range = deserializer.fingerprint_buffer()?;
            let crc32 = crc::Crc::<u32>::new(&crc::CRC_32_ISO_HDLC)
                .checksum(&range.to_input_text())
                ^ FINGERPRINT_XOR_VALUE;
            format!("{:#010x} ({})", value, status(crc32 == value))
        }
        _ => to_hex(attr.value()),
    };
    Ok(text)
}

fn dump<O: ByteOrder + 'static>(name: &str, buffer: &[u8], key: Option<&[u8]>) -> Result<()> {
    let (mut deserializer, header) = Deserializer::<O>::with_byte_order(buffer)
        .with_context(|| format!("{}: can not decode the message header", name))?;
    let message_size = deserializer.message().len();
    println!(
        "{}: {}, {}, {} bytes",
        name, header.message_type, header.transaction_id, message_size
    );
    if message_size < buffer.len() {
        log::warn!(
            "{}: ignoring {} bytes past the end of the message",
            name,
            buffer.len() - message_size
        );
    }

    loop {
        let attr = match deserializer.get_next_attribute() {
            Ok(attr) => attr,
            Err(e) if e.is_end_of_attributes() => break,
            Err(e) => return Err(e).with_context(|| format!("{}: malformed attribute", name)),
        };

        let text = describe(&deserializer, &attr, key).unwrap_or_else(|e| {
            log::warn!("{}: can not parse {}: {}", name, attr.attribute_type(), e);
            to_hex(attr.value())
        });
        println!(
            "  {:>4} {} ({} bytes): {}",
            attr.slot().offset(),
            attr.attribute_type(),
            attr.len(),
            text
        );
    }

    log::debug!(
        "{}: order state {:?}, flags {:?}",
        name,
        deserializer.context().order_state(),
        deserializer.context().flags()
    );
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();

    if args.messages.is_empty() {
        log::info!("No messages given, dumping the test vectors");
        let password = stun_vectors::PASSWORD.as_bytes();
        let vectors: [(&str, &[u8], Option<&[u8]>); 5] = [
            ("Sample request", &stun_vectors::SAMPLE_REQUEST, Some(password)),
            ("Sample IPv4 response", &stun_vectors::SAMPLE_IPV4_RESPONSE, Some(password)),
            ("Sample IPv6 response", &stun_vectors::SAMPLE_IPV6_RESPONSE, Some(password)),
            (
                "Sample request with long-term authentication",
                &stun_vectors::SAMPLE_REQUEST_LONG_TERM_AUTH,
                None,
            ),
            ("Binding request", &stun_vectors::BINDING_REQUEST, None),
        ];
        for (name, buffer, key) in vectors {
            dump::<NetworkEndian>(name, buffer, key)?;
        }
        return Ok(());
    }

    let key = args.password.as_deref().map(str::as_bytes);
    for (index, message) in args.messages.iter().enumerate() {
        let name = format!("Message #{}", index + 1);
        let buffer = decode_hex(message).with_context(|| format!("{}: bad hex input", name))?;
        if args.little_endian {
            dump::<LittleEndian>(&name, &buffer, key)?;
        } else {
            dump::<NetworkEndian>(&name, &buffer, key)?;
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn describe_all(buffer: &[u8], key: Option<&[u8]>) -> Vec<String> {
        let (mut deserializer, _) = Deserializer::new(buffer).expect("Can not decode header");
        let mut out = Vec::new();
        while let Ok(attr) = deserializer.get_next_attribute() {
            out.push(describe(&deserializer, &attr, key).expect("Can not describe attribute"));
        }
        out
    }

    #[test]
    fn hex_input() {
        assert_eq!(
            decode_hex("0001 0000:2112a442").expect("Valid input"),
            [0x00, 0x01, 0x00, 0x00, 0x21, 0x12, 0xa4, 0x42]
        );
        assert!(decode_hex("001").is_err());
        assert!(decode_hex("zz").is_err());
        assert_eq!(to_hex(&[0x0a, 0xff]), "0aff");
    }

    #[test]
    fn describe_ipv4_response() {
        let lines = describe_all(
            &stun_vectors::SAMPLE_IPV4_RESPONSE,
            Some(stun_vectors::PASSWORD.as_bytes()),
        );
        assert_eq!(lines.len(), 4);
        assert_eq!(lines[0], "\"test vector\"");
        assert_eq!(lines[1], "192.0.2.1:32853");
        assert!(lines[2].ends_with("(valid)"));
        assert_eq!(lines[3], "0xc07d4c96 (valid)");
    }

    #[test]
    fn describe_wrong_password() {
        let lines = describe_all(&stun_vectors::SAMPLE_REQUEST, Some(b"wrong password"));
        assert_eq!(lines[1], "1845494271");
        assert_eq!(lines[2], "0x932ff9b151263b36");
        assert!(lines[4].ends_with("(INVALID)"));
        assert!(lines[5].ends_with("(valid)"));
    }

    #[test]
    fn describe_binding_request() {
        let lines = describe_all(&stun_vectors::BINDING_REQUEST, None);
        assert_eq!(lines[0], "\"6a05f848:8ac3e902\"");
        assert_eq!(lines[2], "[2001:db8:1234:5678:11:2233:4455:6677]:21888");
        assert_eq!(lines[3], "[2001:db8:1234:5678:11:2233:4455:6677]:32853");
        assert_eq!(lines[4], "403 \"Forbidden IP\"");
    }
}
