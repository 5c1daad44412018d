// ABOUTME: Container image references as docker understands them.
// ABOUTME: Splits `[registry/]name[:tag][@digest]` and re-targets images at another registry.

use std::fmt;
use std::str::FromStr;
use thiserror::Error;

const DEFAULT_TAG: &str = "latest";

#[derive(Debug, Error)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character in image reference: {0}")]
    InvalidChar(char),

    #[error("invalid image reference format: {0}")]
    InvalidFormat(String),
}

/// A parsed image reference. A reference with neither tag nor digest gets `latest`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    registry: Option<String>,
    name: String,
    tag: Option<String>,
    digest: Option<String>,
}

/// Docker treats the first path component as a registry host only if it
/// could not be a repository namespace.
fn is_registry_host(component: &str) -> bool {
    component == "localhost" || component.contains(['.', ':'])
}

fn is_reference_char(c: char) -> bool {
    c.is_ascii_alphanumeric() || matches!(c, '/' | ':' | '.' | '-' | '_' | '@')
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }
        if let Some(c) = input.chars().find(|c| !is_reference_char(*c)) {
            return Err(ParseImageRefError::InvalidChar(c));
        }
        let malformed = || ParseImageRefError::InvalidFormat(input.to_string());

        let (registry, remainder) = match input.split_once('/') {
            Some((first, rest)) if is_registry_host(first) => (Some(first), rest),
            _ => (None, input),
        };

        let (remainder, digest) = match remainder.split_once('@') {
            Some((before, digest)) if !digest.is_empty() => (before, Some(digest)),
            Some(_) => return Err(malformed()),
            None => (remainder, None),
        };

        // After the registry is split off, a colon can only introduce a tag.
        let (name, tag) = match remainder.rsplit_once(':') {
            Some((name, tag)) if !tag.is_empty() && !tag.contains('/') => (name, Some(tag)),
            Some(_) => return Err(malformed()),
            None => (remainder, None),
        };

        if name.is_empty() || name.split('/').any(str::is_empty) {
            return Err(malformed());
        }

        let tag = match (tag, digest) {
            (None, None) => Some(DEFAULT_TAG),
            (tag, _) => tag,
        };

        Ok(Self {
            registry: registry.map(str::to_string),
            name: name.to_string(),
            tag: tag.map(str::to_string),
            digest: digest.map(str::to_string),
        })
    }

    pub fn registry(&self) -> Option<&str> {
        self.registry.as_deref()
    }

    /// Repository path without registry, tag or digest.
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }

    /// The same repository and tag, addressed through another registry.
    ///
    /// Digests are dropped: a pushed copy gets a new manifest digest.
    pub fn in_registry(&self, registry: &str) -> ImageRef {
        ImageRef {
            registry: Some(registry.to_string()),
            name: self.name.clone(),
            tag: Some(self.tag().unwrap_or(DEFAULT_TAG).to_string()),
            digest: None,
        }
    }

    /// `<prefix>/<name>:latest`, the name a deployed image carries on the swarm.
    pub fn with_prefix_latest(&self, prefix: &str) -> String {
        format!("{}/{}:{}", prefix, self.name, DEFAULT_TAG)
    }
}

impl FromStr for ImageRef {
    type Err = ParseImageRefError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.registry {
            Some(registry) => write!(f, "{}/{}", registry, self.name)?,
            None => f.write_str(&self.name)?,
        }
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}
