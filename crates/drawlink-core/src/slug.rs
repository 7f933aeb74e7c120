use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::DrawingError;

/// Longest slug accepted by the record store
pub const MAX_SLUG_LEN: usize = 100;

static SLUG_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9-]+$").unwrap());
static WHITESPACE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\s+").unwrap());

/// A human-chosen, URL-safe drawing identifier matching `[a-z0-9-]{1,100}`
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Slug(String);

/// Why a slug was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlugError {
    InvalidCharacters,
    InvalidLength,
}

impl fmt::Display for SlugError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SlugError::InvalidCharacters => write!(
                f,
                "Slug can only contain lowercase letters, numbers, and hyphens"
            ),
            SlugError::InvalidLength => write!(
                f,
                "Slug must be between 1 and {} characters",
                MAX_SLUG_LEN
            ),
        }
    }
}

impl std::error::Error for SlugError {}

impl From<SlugError> for DrawingError {
    fn from(err: SlugError) -> Self {
        DrawingError::Validation(err.to_string())
    }
}

impl Slug {
    /// Validate a slug exactly as given
    pub fn parse(value: impl Into<String>) -> Result<Self, SlugError> {
        let value = value.into();
        if value.is_empty() || value.len() > MAX_SLUG_LEN {
            return Err(SlugError::InvalidLength);
        }
        if !SLUG_PATTERN.is_match(&value) {
            return Err(SlugError::InvalidCharacters);
        }
        Ok(Self(value))
    }

    /// Lowercase, trim and hyphenate free-form input, then validate it
    pub fn normalize(input: &str) -> Result<Self, SlugError> {
        let lowered = input.trim().to_lowercase();
        Self::parse(WHITESPACE.replace_all(&lowered, "-").into_owned())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Slug {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Slug {
    type Err = SlugError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl TryFrom<String> for Slug {
    type Error = SlugError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(value)
    }
}

impl From<Slug> for String {
    fn from(slug: Slug) -> Self {
        slug.0
    }
}

impl AsRef<str> for Slug {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
