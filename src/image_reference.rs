use std::fmt;
use thiserror::Error;

/// A container image descriptor split into its source (`registry/repository`) and a tag and/or digest.
///
/// The canonical form is `source[:tag][@digest]`. Two references are equal exactly when their canonical strings are
/// equal, so the rendered string is what gets written into version statuses and compared on later passes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ImageReference {
    pub source: String,
    pub tag: Option<String>,
    pub digest: Option<String>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
    #[error("image reference is empty")]
    Empty,
    #[error("image source is missing in {0}")]
    MissingSource(String),
    #[error("image {0} has neither a tag nor a digest")]
    MissingTagOrDigest(String),
    #[error("image {0} has an empty tag")]
    EmptyTag(String),
    #[error("image {0} has a malformed digest, expected <algorithm>:<hex>")]
    InvalidDigest(String),
    #[error("image {0} contains whitespace")]
    Whitespace(String),
}

impl fmt::Display for ImageReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.source)?;
        if let Some(tag) = &self.tag {
            write!(f, ":{}", tag)?;
        }
        if let Some(digest) = &self.digest {
            write!(f, "@{}", digest)?;
        }
        Ok(())
    }
}

impl ImageReference {
    pub fn parse(s: &str) -> Result<Self, ParseError> {
        if s.trim().is_empty() {
            return Err(ParseError::Empty);
        }
        if s.chars().any(char::is_whitespace) {
            return Err(ParseError::Whitespace(s.to_string()));
        }

        let (name, digest) = match s.split_once('@') {
            Some((name, digest)) => {
                let valid = digest
                    .split_once(':')
                    .is_some_and(|(algorithm, hex)| !algorithm.is_empty() && !hex.is_empty());
                if !valid {
                    return Err(ParseError::InvalidDigest(s.to_string()));
                }
                (name, Some(digest.to_string()))
            }
            None => (s, None),
        };

        // A colon only separates a tag when it comes after the last slash, otherwise it is a registry port
        let last_slash = name.rfind('/');
        let (source, tag) = match name.rfind(':') {
            Some(pos) if last_slash.is_none_or(|slash| pos > slash) => {
                let tag = &name[pos + 1..];
                if tag.is_empty() {
                    return Err(ParseError::EmptyTag(s.to_string()));
                }
                (&name[..pos], Some(tag.to_string()))
            }
            _ => (name, None),
        };

        if source.is_empty() || source.starts_with('/') || source.ends_with('/') {
            return Err(ParseError::MissingSource(s.to_string()));
        }
        if tag.is_none() && digest.is_none() {
            return Err(ParseError::MissingTagOrDigest(s.to_string()));
        }

        Ok(Self {
            source: source.to_string(),
            tag,
            digest,
        })
    }

    /// Builds `source:tag`, validating the result the same way a user-supplied image is validated.
    pub fn tagged(source: &str, tag: &str) -> Result<Self, ParseError> {
        Self::parse(&format!("{}:{}", source, tag))
    }

    /// The tag, or the digest for digest-only references.
    pub fn version_label(&self) -> &str {
        self.tag
            .as_deref()
            .or(self.digest.as_deref())
            .unwrap_or_default()
    }
}
