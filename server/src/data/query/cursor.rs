//! Opaque pagination cursor codec
//!
//! A cursor encodes the `(ordering value, id)` position of a page boundary
//! as URL-safe base64 over `value|id`. It is stateless and reconstructible
//! only from its own encoding.
//!
//! The token is an obfuscation convenience, not a security boundary: it is
//! neither signed nor encrypted, and the position it carries can be forged.
//! Callers must apply their own authorization checks before serving data
//! reachable through a cursor.

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;

/// Field delimiter; not expected in ISO-8601 ordering values or ids
const DELIMITER: char = '|';

/// Decoded cursor position
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Ordering value of the boundary row (ISO-8601 timestamp by convention)
    pub order_value: String,
    /// Tie-breaking row id
    pub id: i64,
}

impl Cursor {
    pub fn new(order_value: impl Into<String>, id: i64) -> Self {
        Self {
            order_value: order_value.into(),
            id,
        }
    }

    /// Encode into an opaque token
    pub fn encode(&self) -> String {
        let raw = format!("{}{}{}", self.order_value, DELIMITER, self.id);
        URL_SAFE_NO_PAD.encode(raw)
    }

    /// Decode a token; any malformed input yields `None`, never an error.
    /// Callers treat `None` as "no cursor supplied".
    pub fn decode(token: &str) -> Option<Self> {
        let bytes = URL_SAFE_NO_PAD.decode(token).ok()?;
        let raw = String::from_utf8(bytes).ok()?;
        let (order_value, id) = raw.rsplit_once(DELIMITER)?;
        let id = id.parse::<i64>().ok()?;
        Some(Self {
            order_value: order_value.to_string(),
            id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips() {
        let cursor = Cursor::new("2024-03-01T12:30:00.000Z", 42);
        let decoded = Cursor::decode(&cursor.encode()).unwrap();
        assert_eq!(decoded, cursor);
    }

    #[test]
    fn round_trips_extreme_ids() {
        for id in [0, 1, i64::MAX] {
            let cursor = Cursor::new("2024-01-01T00:00:00Z", id);
            assert_eq!(Cursor::decode(&cursor.encode()).unwrap().id, id);
        }
    }

    #[test]
    fn invalid_base64_returns_none() {
        assert_eq!(Cursor::decode("not-valid-base64!!"), None);
    }

    #[test]
    fn missing_delimiter_returns_none() {
        let token = URL_SAFE_NO_PAD.encode("2024-01-01T00:00:00Z");
        assert_eq!(Cursor::decode(&token), None);
    }

    #[test]
    fn non_numeric_id_returns_none() {
        let token = URL_SAFE_NO_PAD.encode("2024-01-01T00:00:00Z|abc");
        assert_eq!(Cursor::decode(&token), None);
    }

    #[test]
    fn non_utf8_payload_returns_none() {
        let token = URL_SAFE_NO_PAD.encode([0xff, 0xfe, 0xfd]);
        assert_eq!(Cursor::decode(&token), None);
    }

    #[test]
    fn empty_token_returns_none() {
        assert_eq!(Cursor::decode(""), None);
    }

    #[test]
    fn token_is_url_safe() {
        let token = Cursor::new("2024-03-01T12:30:00+00:00", i64::MAX).encode();
        assert!(
            token
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }
}
