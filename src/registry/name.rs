//! Qualified mapping names and fuzzy reference matching

use std::fmt;

use serde::Serialize;

/// Separator between tokens of a qualified name
pub const SEPARATOR: &str = ":";

/// Whether a string is a valid name token: `[A-Za-z0-9_-]+`
pub fn is_valid_token(token: &str) -> bool {
    !token.is_empty()
        && token
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'_' || b == b'-')
}

/// The canonical name of a registered mapping, e.g. `infoapi:string:upper`
///
/// Tokens go from the outermost namespace to the short name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct QualifiedName {
    tokens: Vec<String>,
}

/// A possibly abbreviated name written in a template, e.g. `string:upper`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct QualifiedRef {
    tokens: Vec<String>,
}

impl QualifiedName {
    pub fn new<S: Into<String>>(tokens: impl IntoIterator<Item = S>) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    /// Split `a:b:c` into tokens
    pub fn parse(text: &str) -> Self {
        Self::new(text.split(SEPARATOR))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    /// The last token, or "" for an empty name
    pub fn short_name(&self) -> &str {
        self.tokens.last().map(String::as_str).unwrap_or("")
    }

    /// Match a reference against this name
    ///
    /// Any subsequence of the canonical tokens that keeps the short name
    /// matches. Returns the number of canonical tokens the reference skipped
    /// (0 for an exact match), or None if it does not match.
    pub fn matches(&self, reference: &QualifiedRef) -> Option<u32> {
        let input = reference.tokens();
        if input.is_empty() || input.last() != self.tokens.last() {
            return None;
        }

        let mut remaining = input.iter().peekable();
        let mut skipped = 0;
        for token in &self.tokens {
            if remaining.peek() == Some(&token) {
                remaining.next();
            } else {
                skipped += 1;
            }
        }

        // A leftover token is out of order or not part of this name
        if remaining.next().is_some() {
            return None;
        }

        Some(skipped)
    }
}

impl QualifiedRef {
    pub fn new<S: Into<String>>(tokens: impl IntoIterator<Item = S>) -> Self {
        Self {
            tokens: tokens.into_iter().map(Into::into).collect(),
        }
    }

    pub fn parse(text: &str) -> Self {
        Self::new(text.split(SEPARATOR))
    }

    pub fn tokens(&self) -> &[String] {
        &self.tokens
    }

    pub fn short_name(&self) -> &str {
        self.tokens.last().map(String::as_str).unwrap_or("")
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(SEPARATOR))
    }
}

impl fmt::Display for QualifiedRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.tokens.join(SEPARATOR))
    }
}

impl From<QualifiedName> for String {
    fn from(name: QualifiedName) -> Self {
        name.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn canonical() -> QualifiedName {
        QualifiedName::new(["root", "mod1", "dupTest"])
    }

    #[test]
    fn test_short_name_only() {
        assert_eq!(canonical().matches(&QualifiedRef::parse("dupTest")), Some(2));
    }

    #[test]
    fn test_partial_prefix() {
        assert_eq!(
            canonical().matches(&QualifiedRef::parse("mod1:dupTest")),
            Some(1)
        );
    }

    #[test]
    fn test_exact_match() {
        assert_eq!(
            canonical().matches(&QualifiedRef::parse("root:mod1:dupTest")),
            Some(0)
        );
    }

    #[test]
    fn test_skipping_middle_token() {
        assert_eq!(
            canonical().matches(&QualifiedRef::parse("root:dupTest")),
            Some(1)
        );
    }

    #[test]
    fn test_foreign_token_rejected() {
        assert_eq!(canonical().matches(&QualifiedRef::parse("mod2:dupTest")), None);
    }

    #[test]
    fn test_out_of_order_rejected() {
        assert_eq!(
            canonical().matches(&QualifiedRef::parse("mod1:root:dupTest")),
            None
        );
    }

    #[test]
    fn test_different_short_name_rejected() {
        assert_eq!(canonical().matches(&QualifiedRef::parse("mod1")), None);
    }

    #[test]
    fn test_token_validation() {
        assert!(is_valid_token("block-type_2"));
        assert!(!is_valid_token(""));
        assert!(!is_valid_token("a:b"));
        assert!(!is_valid_token("a b"));
    }

    #[test]
    fn test_display_joins_tokens() {
        assert_eq!(canonical().to_string(), "root:mod1:dupTest");
        assert_eq!(canonical().short_name(), "dupTest");
    }
}
