// ABOUTME: Splits image references reported by engines into repository, tag and digest.
// ABOUTME: Handles registries with ports, e.g. localhost:5000/app:v1@sha256:...

use std::fmt;
use thiserror::Error;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseImageRefError {
    #[error("image reference cannot be empty")]
    Empty,

    #[error("invalid character {0:?} in image reference")]
    InvalidChar(char),
}

/// A parsed image reference.
///
/// Unlike a reference typed by a user, references read back from an engine are
/// taken as-is: a missing tag stays missing and `latest` is only substituted by
/// [`ImageRef::tag_or_latest`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageRef {
    repository: String,
    tag: Option<String>,
    digest: Option<String>,
}

impl ImageRef {
    pub fn parse(input: &str) -> Result<Self, ParseImageRefError> {
        let input = input.trim();
        if input.is_empty() {
            return Err(ParseImageRefError::Empty);
        }

        if let Some(c) = input
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || "/:.-_@+".contains(*c)))
        {
            return Err(ParseImageRefError::InvalidChar(c));
        }

        let (named, digest) = match input.split_once('@') {
            Some((before, after)) => (before, Some(after.to_string())),
            None => (input, None),
        };

        // A colon after the last slash separates the tag; earlier ones belong to a registry port.
        let last_segment_start = named.rfind('/').map_or(0, |i| i + 1);
        let (repository, tag) = match named[last_segment_start..].rfind(':') {
            Some(offset) => {
                let split = last_segment_start + offset;
                (&named[..split], Some(named[split + 1..].to_string()))
            }
            None => (named, None),
        };

        Ok(Self {
            repository: repository.to_string(),
            tag: tag.filter(|t| !t.is_empty()),
            digest,
        })
    }

    /// Repository including any registry host, e.g. `docker.io/library/nginx`.
    pub fn repository(&self) -> &str {
        &self.repository
    }

    /// Repository without the default registry prefixes users never type.
    pub fn familiar_name(&self) -> &str {
        let name = self
            .repository
            .strip_prefix("docker.io/")
            .unwrap_or(&self.repository);
        name.strip_prefix("library/").unwrap_or(name)
    }

    pub fn tag(&self) -> Option<&str> {
        self.tag.as_deref()
    }

    pub fn tag_or_latest(&self) -> &str {
        self.tag.as_deref().unwrap_or("latest")
    }

    pub fn digest(&self) -> Option<&str> {
        self.digest.as_deref()
    }
}

impl fmt::Display for ImageRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.repository)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{tag}")?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{digest}")?;
        }
        Ok(())
    }
}
