use crate::error::InvalidInput;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// A German postal code (Postleitzahl): exactly five ASCII digits.
///
/// # Examples
///
/// ```
/// use heizgradtage::PostalCode;
///
/// let mitte: PostalCode = "10115".parse().unwrap();
/// assert_eq!(mitte.as_str(), "10115");
/// assert!(" 10115 ".parse::<PostalCode>().is_ok());
/// assert!("1011".parse::<PostalCode>().is_err());
/// assert!("1011a".parse::<PostalCode>().is_err());
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PostalCode(String);

impl PostalCode {
    pub fn new(raw: &str) -> Result<Self, InvalidInput> {
        let trimmed = raw.trim();
        if trimmed.len() == 5 && trimmed.bytes().all(|b| b.is_ascii_digit()) {
            Ok(Self(trimmed.to_string()))
        } else {
            Err(InvalidInput::PostalCode(raw.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for PostalCode {
    type Err = InvalidInput;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl fmt::Display for PostalCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
