// ABOUTME: SSH remote host addresses as given on the command line.
// ABOUTME: Parses "host", "user@host", "host:port" and "user@host:port".

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseRemoteHostError {
    #[error("remote host cannot be empty")]
    Empty,

    #[error("hostname cannot be empty")]
    EmptyHostname,

    #[error("user cannot be empty")]
    EmptyUser,

    #[error("invalid port: {0}")]
    InvalidPort(String),

    #[error("invalid character in remote host: '{0}'")]
    InvalidChar(char),
}

/// An SSH destination that hosts the swarm manager.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RemoteHost {
    user: Option<String>,
    host: String,
    port: Option<u16>,
}

impl RemoteHost {
    pub fn parse(s: &str) -> Result<Self, ParseRemoteHostError> {
        let s = s.trim();
        if s.is_empty() {
            return Err(ParseRemoteHostError::Empty);
        }

        // Anything else would be interpreted by ssh or docker as an option or a path.
        if let Some(c) = s.chars().find(|c| c.is_whitespace() || matches!(c, '/' | '\'' | '"')) {
            return Err(ParseRemoteHostError::InvalidChar(c));
        }
        if s.starts_with('-') {
            return Err(ParseRemoteHostError::InvalidChar('-'));
        }

        let (user, rest) = match s.rsplit_once('@') {
            Some((user, _)) if user.is_empty() => return Err(ParseRemoteHostError::EmptyUser),
            Some((user, rest)) => (Some(user.to_string()), rest),
            None => (None, s),
        };

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port_str)) => {
                let port = port_str
                    .parse::<u16>()
                    .map_err(|_| ParseRemoteHostError::InvalidPort(port_str.to_string()))?;
                (host, Some(port))
            }
            None => (rest, None),
        };

        if host.is_empty() {
            return Err(ParseRemoteHostError::EmptyHostname);
        }

        Ok(Self {
            user,
            host: host.to_string(),
            port,
        })
    }

    pub fn user(&self) -> Option<&str> {
        self.user.as_deref()
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> Option<u16> {
        self.port
    }

    /// Destination argument for the ssh binary (`user@host`, port passed separately).
    pub fn ssh_destination(&self) -> String {
        match &self.user {
            Some(user) => format!("{}@{}", user, self.host),
            None => self.host.clone(),
        }
    }

    /// Value for `docker -H`.
    pub fn docker_url(&self) -> String {
        match self.port {
            Some(port) => format!("ssh://{}:{}", self.ssh_destination(), port),
            None => format!("ssh://{}", self.ssh_destination()),
        }
    }
}

impl fmt::Display for RemoteHost {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.ssh_destination())?;
        if let Some(port) = self.port {
            write!(f, ":{}", port)?;
        }
        Ok(())
    }
}
