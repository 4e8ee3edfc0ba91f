//! Immutable text buffers
//!
//! Text is the simplest shared payload: an immutable buffer behind a
//! reference count, tagged with the domain it was allocated in. Permanent
//! buffers are never mutated or freed by a context; duplicating one into the
//! permanent domain shares the existing buffer instead of copying (interned
//! text). Every other duplication copies the content into a fresh buffer
//! owned by the target domain.

use std::fmt;
use std::sync::Arc;

use crate::lifetime::Lifetime;

/// Shared immutable text buffer
#[derive(Clone)]
pub struct Text {
    buf: Arc<TextBuf>,
}

#[derive(Debug)]
struct TextBuf {
    content: Box<str>,
    permanent: bool,
}

impl Text {
    /// Create request-owned text
    pub fn new(content: impl Into<String>) -> Self {
        Text::alloc(content.into(), Lifetime::Request)
    }

    /// Create text directly in a chosen domain
    pub fn with_lifetime(content: impl Into<String>, lifetime: Lifetime) -> Self {
        Text::alloc(content.into(), lifetime)
    }

    fn alloc(content: String, lifetime: Lifetime) -> Self {
        Text {
            buf: Arc::new(TextBuf {
                content: content.into_boxed_str(),
                permanent: lifetime.is_permanent(),
            }),
        }
    }

    /// Copy this text into the target domain.
    ///
    /// Permanent text duplicated as permanent shares the buffer; all other
    /// combinations copy the bytes into a fresh buffer.
    pub fn duplicate(&self, lifetime: Lifetime) -> Text {
        if self.buf.permanent && lifetime.is_permanent() {
            return self.clone();
        }
        Text::alloc(self.buf.content.to_string(), lifetime)
    }

    /// Whether the buffer lives in the permanent domain
    pub fn is_permanent(&self) -> bool {
        self.buf.permanent
    }

    /// Whether two handles share one buffer
    pub fn same_buffer(a: &Text, b: &Text) -> bool {
        Arc::ptr_eq(&a.buf, &b.buf)
    }

    /// Current reference count of the underlying buffer
    pub fn refcount(&self) -> usize {
        Arc::strong_count(&self.buf)
    }

    pub fn as_str(&self) -> &str {
        &self.buf.content
    }

    pub fn as_bytes(&self) -> &[u8] {
        self.buf.content.as_bytes()
    }

    pub fn len(&self) -> usize {
        self.buf.content.len()
    }

    pub fn is_empty(&self) -> bool {
        self.buf.content.is_empty()
    }
}

impl PartialEq for Text {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Eq for Text {}

impl std::hash::Hash for Text {
    fn hash<H: std::hash::Hasher>(&self, state: &mut H) {
        self.as_str().hash(state);
    }
}

impl fmt::Display for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl fmt::Debug for Text {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Text({:?})", self.as_str())
    }
}

impl From<&str> for Text {
    fn from(s: &str) -> Self {
        Text::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_is_request() {
        let t = Text::new("hello");
        assert!(!t.is_permanent());
        assert_eq!(t.as_str(), "hello");
    }

    #[test]
    fn test_duplicate_into_permanent() {
        let t = Text::new("hello");
        let p = t.duplicate(Lifetime::Permanent);
        assert!(p.is_permanent());
        assert_eq!(p, t);
        assert!(!Text::same_buffer(&t, &p));
    }

    #[test]
    fn test_permanent_to_permanent_shares_buffer() {
        let p = Text::with_lifetime("interned", Lifetime::Permanent);
        let q = p.duplicate(Lifetime::Permanent);
        assert!(Text::same_buffer(&p, &q));
        assert_eq!(p.refcount(), 2);
    }

    #[test]
    fn test_permanent_to_request_copies() {
        let p = Text::with_lifetime("interned", Lifetime::Permanent);
        let r = p.duplicate(Lifetime::Request);
        assert!(!r.is_permanent());
        assert!(!Text::same_buffer(&p, &r));
        assert_eq!(r.as_bytes(), p.as_bytes());
    }

    #[test]
    fn test_round_trip_preserves_content() {
        // permanent then request yields byte-identical content
        let t = Text::new("round trip");
        let p = t.duplicate(Lifetime::Permanent);
        let r = p.duplicate(Lifetime::Request);
        assert_eq!(r.as_bytes(), t.as_bytes());
    }

    #[test]
    fn test_empty_text() {
        let t = Text::new("");
        assert!(t.is_empty());
        assert_eq!(t.len(), 0);
        let p = t.duplicate(Lifetime::Permanent);
        assert!(p.is_empty());
    }

    #[test]
    fn test_eq_and_hash_by_content() {
        use std::collections::HashSet;
        let a = Text::new("k");
        let b = Text::with_lifetime("k", Lifetime::Permanent);
        assert_eq!(a, b);
        let mut set = HashSet::new();
        set.insert(a);
        assert!(set.contains(&b));
    }

    #[test]
    fn test_display_and_debug() {
        let t = Text::new("x");
        assert_eq!(t.to_string(), "x");
        assert_eq!(format!("{:?}", t), "Text(\"x\")");
    }
}
