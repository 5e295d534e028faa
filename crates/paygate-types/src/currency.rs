//! Supported settlement currencies

use serde::{Deserialize, Serialize};

use crate::error::GatewayError;

/// ISO 4217 currencies the gateway settles in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    RUB,
    USD,
    EUR,
    KZT,
    BYN,
}

impl Currency {
    pub const ALL: [Currency; 5] = [
        Currency::RUB,
        Currency::USD,
        Currency::EUR,
        Currency::KZT,
        Currency::BYN,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::RUB => "RUB",
            Self::USD => "USD",
            Self::EUR => "EUR",
            Self::KZT => "KZT",
            Self::BYN => "BYN",
        }
    }
}

impl std::fmt::Display for Currency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Currency {
    type Err = GatewayError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "RUB" => Ok(Self::RUB),
            "USD" => Ok(Self::USD),
            "EUR" => Ok(Self::EUR),
            "KZT" => Ok(Self::KZT),
            "BYN" => Ok(Self::BYN),
            other => Err(GatewayError::validation(format!(
                "unsupported currency: {other}"
            ))),
        }
    }
}
