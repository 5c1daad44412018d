// ABOUTME: Swarm service name validation.
// ABOUTME: Names are passed to `docker service` as arguments, so only docker's own charset is accepted.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Docker rejects longer service names.
const MAX_LEN: usize = 63;

#[derive(Debug, Error)]
pub enum ServiceNameError {
    #[error("service name cannot be empty")]
    Empty,

    #[error("service name exceeds maximum length of 63 characters")]
    TooLong,

    #[error("service name must start with a letter or digit")]
    InvalidStart,

    #[error("invalid character in service name: '{0}'")]
    InvalidChar(char),
}

/// Name of a swarm service, e.g. `shop_api`.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ServiceName(String);

impl ServiceName {
    pub fn new(value: &str) -> Result<Self, ServiceNameError> {
        let mut chars = value.chars();
        match chars.next() {
            None => return Err(ServiceNameError::Empty),
            Some(c) if !c.is_ascii_alphanumeric() => return Err(ServiceNameError::InvalidStart),
            Some(_) => {}
        }
        if value.len() > MAX_LEN {
            return Err(ServiceNameError::TooLong);
        }
        if let Some(c) = chars.find(|c| !c.is_ascii_alphanumeric() && !matches!(c, '-' | '_' | '.')) {
            return Err(ServiceNameError::InvalidChar(c));
        }
        Ok(Self(value.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl FromStr for ServiceName {
    type Err = ServiceNameError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl AsRef<str> for ServiceName {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ServiceName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}
