use std::fmt;
use std::str::FromStr;

use serde::Serialize;

use crate::errors::ServiceError;

const MAX_SERIAL_NUMBER_LEN: usize = 64;

/// A factory serial number.
///
/// Serial numbers are spliced into SQL text stored in the label database, so
/// only a conservative character set is accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct SerialNumber(String);

impl SerialNumber {
    pub fn parse(raw: &str) -> Result<Self, ServiceError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(ServiceError::InvalidInput(
                "Serial number cannot be empty".to_string(),
            ));
        }

        if trimmed.len() > MAX_SERIAL_NUMBER_LEN {
            return Err(ServiceError::InvalidInput(format!(
                "Serial number exceeds {} characters",
                MAX_SERIAL_NUMBER_LEN
            )));
        }

        if let Some(bad) = trimmed.chars().find(|c| !is_serial_char(*c)) {
            return Err(ServiceError::InvalidInput(format!(
                "Serial number contains invalid character {:?}",
                bad
            )));
        }

        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

fn is_serial_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '/')
}

impl FromStr for SerialNumber {
    type Err = ServiceError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for SerialNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for SerialNumber {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
