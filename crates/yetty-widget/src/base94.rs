//! Base94 payload encoding.
//!
//! Escape-sequence payloads must survive the terminal's printable-ASCII
//! channel, so each byte becomes a pair of characters from `!` (33) to `~`
//! (126): `b -> ('!' + b / 94, '!' + b % 94)`. Decoding drops invalid
//! pairs and continues.
//!
//! # Example
//!
//! ```rust
//! use yetty_widget::base94;
//!
//! let encoded = base94::encode(b"payload; with; semicolons");
//! assert!(encoded.bytes().all(|b| (b'!'..=b'~').contains(&b)));
//! assert_eq!(base94::decode(&encoded), b"payload; with; semicolons");
//! ```

const BASE: u8 = 94;

/// Encode bytes as printable character pairs.
pub fn encode(data: &[u8]) -> String {
    let mut out = String::with_capacity(data.len() * 2);
    for &b in data {
        // b / 94 <= 2, so both characters stay within '!'..='~'
        out.push((b'!' + b / BASE) as char);
        out.push((b'!' + b % BASE) as char);
    }
    out
}

/// Decode character pairs back to bytes.
///
/// A pair is valid only when `0 <= c1 - '!' <= 2` (so the value fits a
/// byte) and `0 <= c2 - '!' < 94`; anything else is skipped with a log.
/// A trailing odd character is ignored.
pub fn decode(encoded: &str) -> Vec<u8> {
    let bytes = encoded.as_bytes();
    let mut out = Vec::with_capacity(bytes.len() / 2);
    let mut i = 0;
    while i + 1 < bytes.len() {
        let v1 = bytes[i] as i32 - b'!' as i32;
        let v2 = bytes[i + 1] as i32 - b'!' as i32;
        i += 2;

        if !(0..=2).contains(&v1) || !(0..94).contains(&v2) {
            tracing::debug!(at = i - 2, "invalid base94 pair skipped");
            continue;
        }
        let value = v1 * 94 + v2;
        if value > 255 {
            tracing::debug!(at = i - 2, value, "base94 value out of range, skipped");
            continue;
        }
        out.push(value as u8);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_every_byte_value() {
        let all: Vec<u8> = (0..=255).collect();
        assert_eq!(decode(&encode(&all)), all);
    }

    #[test]
    fn encoded_output_is_printable() {
        let encoded = encode(&[0, 127, 255]);
        assert!(encoded.bytes().all(|b| (b'!'..=b'~').contains(&b)));
    }

    #[test]
    fn invalid_pairs_are_dropped() {
        // ' ' (space) is below '!', so the first pair is invalid
        let mut s = String::from(" !");
        s.push_str(&encode(b"ok"));
        assert_eq!(decode(&s), b"ok");
    }

    #[test]
    fn out_of_range_value_is_dropped() {
        // '~~' would decode to 2*94 + 93 = 281 > 255
        let mut s = String::from("~~");
        s.push_str(&encode(b"x"));
        assert_eq!(decode(&s), b"x");
    }

    #[test]
    fn trailing_odd_char_is_ignored(){
        let mut s = encode(b"ab");
        s.push('!');
        assert_eq!(decode(&s), b"ab");
    }

    #[test]
    fn empty_input() {
        assert_eq!(decode(""), Vec::<u8>::new());
        assert_eq!(encode(&[]), "");
    }
}
