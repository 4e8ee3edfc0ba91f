//! Ownership domains for copied payloads
//!
//! Every duplication call is parameterized by the domain the copy must live
//! in: the process-lifetime permanent domain (immutable, shared read-only by
//! all contexts, torn down with the process) or the context-lifetime request
//! domain (owned and mutated by exactly one context, torn down with it).

/// The ownership domain a copy is allocated in
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Lifetime {
    /// Process-lifetime, immutable, shared across contexts
    Permanent,
    /// Context-lifetime, mutable, owned by a single context
    Request,
}

impl Lifetime {
    /// Whether this is the permanent domain
    pub fn is_permanent(self) -> bool {
        matches!(self, Lifetime::Permanent)
    }

    /// Reference count a freshly duplicated container starts with.
    ///
    /// Permanent containers carry one logical owner plus one structural
    /// self-reference marking immutability.
    pub(crate) fn initial_refcount(self) -> u32 {
        match self {
            Lifetime::Permanent => 2,
            Lifetime::Request => 1,
        }
    }

    /// Reference count at which a container's slots are torn down
    pub(crate) fn terminal_refcount(self) -> u32 {
        match self {
            Lifetime::Permanent => 1,
            Lifetime::Request => 0,
        }
    }
}

impl std::fmt::Display for Lifetime {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Lifetime::Permanent => write!(f, "permanent"),
            Lifetime::Request => write!(f, "request"),
        }
    }
}
