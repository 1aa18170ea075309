use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Supported invoice currencies.
///
/// All amounts in the engine are integer minor units; the exponent only
/// matters when rendering an amount for people to read.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Currency {
    /// US Dollar (cents)
    USD,
    /// Euro (cents)
    EUR,
    /// Pound Sterling (pence)
    GBP,
    /// Malaysian Ringgit (sen)
    MYR,
    /// Indonesian Rupiah (no minor unit)
    IDR,
    /// Japanese Yen (no minor unit)
    JPY,
}

impl Currency {
    /// Number of decimal places represented by one minor unit
    pub fn exponent(&self) -> u32 {
        match self {
            Currency::IDR | Currency::JPY => 0,
            Currency::USD | Currency::EUR | Currency::GBP | Currency::MYR => 2,
        }
    }

    /// Converts minor units into a decimal for display only
    pub fn to_major(&self, minor_units: i64) -> Decimal {
        Decimal::new(minor_units, self.exponent())
    }

    /// Formats a minor-unit amount as `"USD 100.00"`
    pub fn format_minor(&self, minor_units: i64) -> String {
        format!("{} {}", self, self.to_major(minor_units))
    }

    pub fn code(&self) -> &'static str {
        match self {
            Currency::USD => "USD",
            Currency::EUR => "EUR",
            Currency::GBP => "GBP",
            Currency::MYR => "MYR",
            Currency::IDR => "IDR",
            Currency::JPY => "JPY",
        }
    }
}

impl fmt::Display for Currency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.code())
    }
}

impl std::str::FromStr for Currency {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_uppercase().as_str() {
            "USD" => Ok(Currency::USD),
            "EUR" => Ok(Currency::EUR),
            "GBP" => Ok(Currency::GBP),
            "MYR" => Ok(Currency::MYR),
            "IDR" => Ok(Currency::IDR),
            "JPY" => Ok(Currency::JPY),
            _ => Err(format!("Invalid currency: {}", s)),
        }
    }
}
