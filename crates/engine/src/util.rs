//! Internal helpers for id parsing and token generation.
//!
//! These utilities are **not** part of the public API.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono_tz::Tz;
use rand::{RngCore, rngs::OsRng};
use uuid::Uuid;

use crate::{EngineError, ResultEngine};

/// Random bytes behind an invite token.
const INVITE_TOKEN_BYTES: usize = 16;

/// Parse a UUID from storage and return a labeled error on failure.
pub(crate) fn parse_uuid(value: &str, label: &str) -> ResultEngine<Uuid> {
    Uuid::parse_str(value).map_err(|_| EngineError::InvalidId(format!("invalid {label} id")))
}

pub(crate) fn parse_optional_uuid(value: Option<&str>, label: &str) -> ResultEngine<Option<Uuid>> {
    value.map(|v| parse_uuid(v, label)).transpose()
}

/// URL-safe invite token (22 chars, no padding).
pub(crate) fn generate_invite_token() -> String {
    let mut bytes = [0u8; INVITE_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Parse an IANA timezone name (`Europe/Moscow`).
pub(crate) fn parse_timezone(value: &str) -> ResultEngine<Tz> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(EngineError::ValidationFailure(
            "timezone must not be empty".to_string(),
        ));
    }
    trimmed
        .parse::<Tz>()
        .map_err(|_| EngineError::ValidationFailure(format!("unknown timezone: {trimmed}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invite_tokens_are_url_safe_and_unique() {
        let a = generate_invite_token();
        let b = generate_invite_token();
        assert_eq!(a.len(), 22);
        assert_ne!(a, b);
        assert!(
            a.chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
        );
    }

    #[test]
    fn timezone_parsing() {
        assert_eq!(parse_timezone(" Europe/Moscow ").unwrap(), Tz::Europe__Moscow);
        assert!(parse_timezone("").is_err());
        assert!(parse_timezone("Mars/Olympus").is_err());
    }

    #[test]
    fn uuid_parsing_labels_errors() {
        let err = parse_uuid("nope", "budget").unwrap_err();
        assert_eq!(err, EngineError::InvalidId("invalid budget id".to_string()));
    }
}
