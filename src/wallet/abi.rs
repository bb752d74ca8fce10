//! Just enough contract ABI encoding for the verification contract.
use thiserror::Error;

/// `payForVerification(string)`
pub const PAY_FOR_VERIFICATION: [u8; 4] = [0xed, 0xa2, 0x20, 0x99];
/// `hasUserPaidForVerification(address,string)`
pub const HAS_USER_PAID_FOR_VERIFICATION: [u8; 4] = [0xab, 0xfd, 0x56, 0x5e];
/// `verificationPrice()`
pub const VERIFICATION_PRICE: [u8; 4] = [0x21, 0xc7, 0x7b, 0xf3];

const WORD: usize = 32;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AbiError {
    #[error("invalid address '{0}'")]
    InvalidAddress(String),
    #[error("invalid hex data '{0}'")]
    InvalidHex(String),
    #[error("expected a 32-byte word, got {0} bytes")]
    ShortWord(usize),
    #[error("value does not fit in 128 bits")]
    Overflow,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Token {
    Address(String),
    Uint(u128),
    String(String),
}

/// Encodes a call as `0x`-prefixed calldata.
pub fn encode_call(selector: [u8; 4], args: &[Token]) -> Result<String, AbiError> {
    let mut head = Vec::with_capacity(args.len() * WORD);
    let mut tail = Vec::new();
    let head_len = args.len() * WORD;

    for arg in args {
        match arg {
            Token::Address(address) => head.extend_from_slice(&address_word(address)?),
            Token::Uint(value) => head.extend_from_slice(&uint_word(*value)),
            Token::String(value) => {
                head.extend_from_slice(&uint_word((head_len + tail.len()) as u128));
                let bytes = value.as_bytes();
                tail.extend_from_slice(&uint_word(bytes.len() as u128));
                tail.extend_from_slice(bytes);
                let padding = (WORD - bytes.len() % WORD) % WORD;
                tail.resize(tail.len() + padding, 0);
            }
        }
    }

    let mut data = selector.to_vec();
    data.extend(head);
    data.extend(tail);
    Ok(format!("0x{}", hex::encode(data)))
}

pub fn decode_bool(data: &str) -> Result<bool, AbiError> {
    Ok(decode_uint(data)? != 0)
}

/// Reads the first returned word as an unsigned integer.
pub fn decode_uint(data: &str) -> Result<u128, AbiError> {
    let bytes = from_hex(data)?;
    if bytes.len() < WORD {
        return Err(AbiError::ShortWord(bytes.len()));
    }
    let word = &bytes[..WORD];
    if word[..16].iter().any(|b| *b != 0) {
        return Err(AbiError::Overflow);
    }
    let mut low = [0u8; 16];
    low.copy_from_slice(&word[16..]);
    Ok(u128::from_be_bytes(low))
}

/// Parses a JSON-RPC quantity such as `0x5208`.
pub fn parse_quantity(value: &str) -> Result<u128, AbiError> {
    let digits = value
        .strip_prefix("0x")
        .ok_or_else(|| AbiError::InvalidHex(value.to_string()))?;
    if digits.is_empty() {
        return Err(AbiError::InvalidHex(value.to_string()));
    }
    u128::from_str_radix(digits, 16).map_err(|_| AbiError::InvalidHex(value.to_string()))
}

pub fn to_quantity(value: u128) -> String {
    format!("{value:#x}")
}

fn uint_word(value: u128) -> [u8; WORD] {
    let mut word = [0u8; WORD];
    word[16..].copy_from_slice(&value.to_be_bytes());
    word
}

fn address_word(address: &str) -> Result<[u8; WORD], AbiError> {
    let digits = address
        .strip_prefix("0x")
        .filter(|d| d.len() == 40)
        .ok_or_else(|| AbiError::InvalidAddress(address.to_string()))?;
    let bytes = from_hex(digits).map_err(|_| AbiError::InvalidAddress(address.to_string()))?;
    let mut word = [0u8; WORD];
    word[12..].copy_from_slice(&bytes);
    Ok(word)
}

fn from_hex(data: &str) -> Result<Vec<u8>, AbiError> {
    let digits = data.strip_prefix("0x").unwrap_or(data);
    hex::decode(digits).map_err(|_| AbiError::InvalidHex(data.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const ACCOUNT: &str = "0x00000000000000000000000000000000000000ab";

    #[test]
    fn encodes_address_then_dynamic_string() {
        let data = encode_call(
            HAS_USER_PAID_FOR_VERIFICATION,
            &[
                Token::Address(ACCOUNT.into()),
                Token::String("bafy123".into()),
            ],
        )
        .unwrap();
        assert_eq!(
            data,
            concat!(
                "0xabfd565e",
                "00000000000000000000000000000000000000000000000000000000000000ab",
                "0000000000000000000000000000000000000000000000000000000000000040",
                "0000000000000000000000000000000000000000000000000000000000000007",
                "6261667931323300000000000000000000000000000000000000000000000000"
            )
        );
    }

    #[test]
    fn empty_string_has_no_data_words() {
        let data = encode_call(PAY_FOR_VERIFICATION, &[Token::String(String::new())]).unwrap();
        assert_eq!(
            data,
            concat!(
                "0xeda22099",
                "0000000000000000000000000000000000000000000000000000000000000020",
                "0000000000000000000000000000000000000000000000000000000000000000"
            )
        );
    }

    #[test]
    fn selector_only_call() {
        assert_eq!(encode_call(VERIFICATION_PRICE, &[]).unwrap(), "0x21c77bf3");
    }

    #[test]
    fn rejects_malformed_address() {
        let err = encode_call(HAS_USER_PAID_FOR_VERIFICATION, &[Token::Address("0x12".into())])
            .unwrap_err();
        assert_eq!(err, AbiError::InvalidAddress("0x12".into()));
    }

    #[test]
    fn decodes_bool_and_price_words() {
        let yes = format!("0x{}1", "0".repeat(63));
        let no = format!("0x{}", "0".repeat(64));
        assert!(decode_bool(&yes).unwrap());
        assert!(!decode_bool(&no).unwrap());

        // 0.01 tFIL
        let price = format!("0x{:064x}", 10_000_000_000_000_000u128);
        assert_eq!(decode_uint(&price).unwrap(), 10_000_000_000_000_000);

        assert_eq!(decode_uint("0x").unwrap_err(), AbiError::ShortWord(0));
        let huge = format!("0x{}", "f".repeat(64));
        assert_eq!(decode_uint(&huge).unwrap_err(), AbiError::Overflow);
    }

    #[test]
    fn quantities_round_trip_through_hex() {
        assert_eq!(parse_quantity("0x5208").unwrap(), 21_000);
        assert_eq!(to_quantity(0), "0x0");
        assert_eq!(to_quantity(25_200), "0x6270");
        assert!(parse_quantity("5208").is_err());
        assert!(parse_quantity("0x").is_err());
    }

    #[test]
    fn rejects_signed_or_odd_hex_words() {
        let signed = format!("0x+f{}", "0".repeat(62));
        assert_eq!(decode_uint(&signed).unwrap_err(), AbiError::InvalidHex(signed.clone()));
        assert!(matches!(decode_uint("0xabc"), Err(AbiError::InvalidHex(_))));

        let address = format!("0x+f{}", "0".repeat(38));
        assert_eq!(
            encode_call(HAS_USER_PAID_FOR_VERIFICATION, &[Token::Address(address.clone())])
                .unwrap_err(),
            AbiError::InvalidAddress(address)
        );
    }
}
