use serde::{Deserialize, Serialize};

use crate::EngineError;

/// Currencies offered as buttons when a budget is created.
///
/// Any three-letter code is accepted by the engine; this list only drives the
/// keyboards.
pub const SUPPORTED_CURRENCIES: [&str; 10] = [
    "RUB", "USD", "EUR", "KZT", "GEL", "TRY", "AMD", "BYN", "UAH", "GBP",
];

/// Three-letter, upper-case currency code (`RUB`, `USD`, ...).
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Currency(String);

impl Currency {
    /// Canonical currency code.
    #[must_use]
    pub fn code(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for Currency {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.code())
    }
}

impl TryFrom<&str> for Currency {
    type Error = EngineError;

    fn try_from(value: &str) -> Result<Self, Self::Error> {
        let code = value.trim().to_ascii_uppercase();
        if code.len() != 3 || !code.chars().all(|c| c.is_ascii_uppercase()) {
            return Err(EngineError::ValidationFailure(format!(
                "currency must be a three-letter code, got \"{}\"",
                value.trim()
            )));
        }
        Ok(Self(code))
    }
}

impl TryFrom<String> for Currency {
    type Error = EngineError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::try_from(value.as_str())
    }
}

impl From<Currency> for String {
    fn from(value: Currency) -> Self {
        value.0
    }
}
