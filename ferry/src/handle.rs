//! External handles
//!
//! Handles are never deep-copied as live resources. Only stream-like kinds
//! are recognized as transferable, and then only by resolving them to a
//! plain integer descriptor usable in the target context; every other kind,
//! or a stream that cannot produce a descriptor, collapses to null. A
//! deliberately lossy, best-effort projection.

use std::fmt;

use crate::value::Value;

/// Kind of an external handle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandleKind {
    Stream,
    PersistentStream,
    Other,
}

/// External handle owned by the host interpreter
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Handle {
    kind: HandleKind,
    /// Raw descriptor, when the stream can be cast to one
    descriptor: Option<i64>,
}

impl Handle {
    pub fn stream(descriptor: i64) -> Self {
        Handle {
            kind: HandleKind::Stream,
            descriptor: Some(descriptor),
        }
    }

    pub fn persistent_stream(descriptor: i64) -> Self {
        Handle {
            kind: HandleKind::PersistentStream,
            descriptor: Some(descriptor),
        }
    }

    /// A stream that cannot be cast to a descriptor
    pub fn stream_without_descriptor() -> Self {
        Handle {
            kind: HandleKind::Stream,
            descriptor: None,
        }
    }

    /// A handle of any non-stream kind
    pub fn other() -> Self {
        Handle {
            kind: HandleKind::Other,
            descriptor: None,
        }
    }

    pub fn kind(&self) -> HandleKind {
        self.kind
    }

    pub fn descriptor(&self) -> Option<i64> {
        self.descriptor
    }

    /// Whether this handle kind may cross a context boundary at all
    pub fn transferable(&self) -> bool {
        matches!(self.kind, HandleKind::Stream | HandleKind::PersistentStream)
    }

    /// Resolve to a transferable integer descriptor, or null
    pub fn translate(&self) -> Value {
        if self.transferable() {
            if let Some(fd) = self.descriptor {
                return Value::Int(fd);
            }
        }
        Value::Null
    }
}

impl fmt::Display for Handle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.kind, self.descriptor) {
            (HandleKind::Stream, Some(fd)) => write!(f, "stream({fd})"),
            (HandleKind::PersistentStream, Some(fd)) => write!(f, "pstream({fd})"),
            _ => write!(f, "handle"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stream_translates_to_descriptor() {
        assert_eq!(Handle::stream(3).translate(), Value::Int(3));
        assert_eq!(Handle::persistent_stream(5).translate(), Value::Int(5));
    }

    #[test]
    fn test_stream_without_descriptor_is_null() {
        assert_eq!(Handle::stream_without_descriptor().translate(), Value::Null);
    }

    #[test]
    fn test_other_kind_is_null() {
        let h = Handle::other();
        assert!(!h.transferable());
        assert_eq!(h.translate(), Value::Null);
    }

    #[test]
    fn test_display() {
        assert_eq!(Handle::stream(3).to_string(), "stream(3)");
        assert_eq!(Handle::other().to_string(), "handle");
    }
}
