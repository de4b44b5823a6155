//! Supported currencies
//!
//! Currency codes are checked here, at the edge, before a request reaches
//! the ledger. Records store the plain 3-letter code.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use super::DomainError;

/// Currencies an account can be opened in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Currency {
    Usd,
    Eur,
    Cad,
}

impl Currency {
    pub const ALL: [Currency; 3] = [Currency::Usd, Currency::Eur, Currency::Cad];

    pub fn code(&self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Cad => "CAD",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl FromStr for Currency {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "USD" => Ok(Currency::Usd),
            "EUR" => Ok(Currency::Eur),
            "CAD" => Ok(Currency::Cad),
            other => Err(DomainError::UnsupportedCurrency(other.to_string())),
        }
    }
}

impl TryFrom<String> for Currency {
    type Error = DomainError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Currency> for String {
    fn from(currency: Currency) -> Self {
        currency.code().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_supported() {
        for currency in Currency::ALL {
            assert_eq!(currency.code().parse::<Currency>().unwrap(), currency);
        }
    }

    #[test]
    fn test_parse_is_case_sensitive() {
        assert!("usd".parse::<Currency>().is_err());
        assert!(matches!(
            "JPY".parse::<Currency>(),
            Err(DomainError::UnsupportedCurrency(code)) if code == "JPY"
        ));
    }

    #[test]
    fn test_deserialize_rejects_unknown() {
        let err = serde_json::from_str::<Currency>("\"XYZ\"");
        assert!(err.is_err());
    }
}
