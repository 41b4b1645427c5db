//! Cursor over template text
//!
//! The scanner only deals with the literal layer of a template: escapes,
//! raw text runs and locating placeholder boundaries. Placeholder bodies are
//! tokenized by [`super::lexer`].

/// A byte cursor over a source string
#[derive(Debug, Clone)]
pub struct Scanner<'a> {
    source: &'a str,
    pos: usize,
}

/// Saved scanner position for backtracking
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Checkpoint(usize);

impl<'a> Scanner<'a> {
    pub fn new(source: &'a str) -> Self {
        Self { source, pos: 0 }
    }

    /// Current byte offset
    pub fn pos(&self) -> usize {
        self.pos
    }

    pub fn source(&self) -> &'a str {
        self.source
    }

    pub fn eof(&self) -> bool {
        self.pos >= self.source.len()
    }

    /// Unread part of the source
    pub fn rest(&self) -> &'a str {
        &self.source[self.pos..]
    }

    /// Look at the next `len` bytes without consuming them
    ///
    /// Returns None if fewer than `len` bytes remain or the slice would split
    /// a UTF-8 sequence.
    pub fn peek(&self, len: usize) -> Option<&'a str> {
        self.source.get(self.pos..self.pos + len)
    }

    /// Consume `text` if the source continues with it
    pub fn eat(&mut self, text: &str) -> bool {
        if self.rest().starts_with(text) {
            self.pos += text.len();
            true
        } else {
            false
        }
    }

    /// Consume everything up to (not including) the nearest of `needles`
    ///
    /// Returns None and consumes nothing if no needle occurs.
    pub fn read_until(&mut self, needles: &[char]) -> Option<&'a str> {
        let rest = self.rest();
        let offset = rest.find(needles)?;
        self.pos += offset;
        Some(&rest[..offset])
    }

    /// Consume the remainder of the source
    pub fn read_rest(&mut self) -> &'a str {
        let rest = self.rest();
        self.pos = self.source.len();
        rest
    }

    /// Move the cursor forward to an absolute offset
    pub fn advance_to(&mut self, pos: usize) {
        debug_assert!(pos >= self.pos && pos <= self.source.len());
        self.pos = pos;
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint(self.pos)
    }

    pub fn rewind(&mut self, checkpoint: Checkpoint) {
        self.pos = checkpoint.0;
    }

    /// Run `f`, rolling the cursor back if it returns None
    pub fn attempt<T>(&mut self, f: impl FnOnce(&mut Self) -> Option<T>) -> Option<T> {
        let checkpoint = self.checkpoint();
        let result = f(self);
        if result.is_none() {
            self.rewind(checkpoint);
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_eat_and_peek() {
        let mut s = Scanner::new("{{a");
        assert_eq!(s.peek(2), Some("{{"));
        assert!(!s.eat("}"));
        assert!(s.eat("{{"));
        assert_eq!(s.rest(), "a");
        assert_eq!(s.peek(2), None);
    }

    #[test]
    fn test_read_until_nearest_needle() {
        let mut s = Scanner::new("abc}de{f");
        assert_eq!(s.read_until(&['{', '}']), Some("abc"));
        assert_eq!(s.pos(), 3);
        assert!(s.eat("}"));
        assert_eq!(s.read_until(&['{', '}']), Some("de"));
    }

    #[test]
    fn test_read_until_missing_needle_consumes_nothing() {
        let mut s = Scanner::new("plain");
        assert_eq!(s.read_until(&['{']), None);
        assert_eq!(s.pos(), 0);
        assert_eq!(s.read_rest(), "plain");
        assert!(s.eof());
    }

    #[test]
    fn test_attempt_rewinds_on_failure() {
        let mut s = Scanner::new("{x");
        let result = s.attempt(|s| {
            s.eat("{");
            if s.eat("}") {
                Some(())
            } else {
                None
            }
        });
        assert!(result.is_none());
        assert_eq!(s.pos(), 0);

        let result = s.attempt(|s| s.eat("{").then_some(()));
        assert!(result.is_some());
        assert_eq!(s.pos(), 1);
    }

    #[test]
    fn test_peek_does_not_split_utf8() {
        let s = Scanner::new("é");
        assert_eq!(s.peek(1), None);
        assert_eq!(s.peek(2), Some("é"));
    }
}
