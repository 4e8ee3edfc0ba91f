//! Compiled code units
//!
//! A code unit is the reusable compiled representation of a function body:
//! its static-variable container, declared variable names, constant
//! literals, and the size of its per-context execution cache. Each unit
//! carries a stable opcode identity issued once at creation; the identity is
//! the deduplication key for the process-wide cache and is never derived
//! from a memory address.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crate::container::Container;
use crate::lifetime::Lifetime;
use crate::text::Text;
use crate::value::Value;

/// Stable identity of a compiled instruction sequence
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct OpcodeId(u64);

static NEXT_OPCODE_ID: AtomicU64 = AtomicU64::new(1);

impl OpcodeId {
    fn next() -> Self {
        OpcodeId(NEXT_OPCODE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for OpcodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Compiled code unit
pub struct CodeUnit {
    identity: OpcodeId,
    name: String,
    lifetime: Lifetime,
    is_closure: bool,
    immutable: bool,
    static_variables: Option<Container>,
    /// Declared variable names, scanned for auto-global activation
    variables: Vec<Text>,
    /// Constant literal table; string literals are scanned for activation
    literals: Vec<Value>,
    /// Declared size of the per-context execution cache
    cache_size: usize,
    /// Zero-filled execution-cache scratch; request instances only
    run_time_cache: Option<Box<[u8]>>,
}

impl CodeUnit {
    /// Create a plain (host-owned) code unit with a fresh opcode identity
    pub fn new(name: impl Into<String>) -> Self {
        CodeUnit {
            identity: OpcodeId::next(),
            name: name.into(),
            lifetime: Lifetime::Request,
            is_closure: false,
            immutable: false,
            static_variables: None,
            variables: Vec::new(),
            literals: Vec::new(),
            cache_size: 0,
            run_time_cache: None,
        }
    }

    pub fn with_static_variables(mut self, statics: Container) -> Self {
        self.static_variables = Some(statics);
        self
    }

    pub fn with_variables<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.variables = names.into_iter().map(|n| Text::new(n.into())).collect();
        self
    }

    pub fn with_literals(mut self, literals: Vec<Value>) -> Self {
        self.literals = literals;
        self
    }

    pub fn with_cache_size(mut self, size: usize) -> Self {
        self.cache_size = size;
        self
    }

    pub fn mark_closure(mut self) -> Self {
        self.is_closure = true;
        self
    }

    /// Copy the header into a target domain, keeping the opcode identity.
    ///
    /// The caller supplies the already-duplicated static-variable container
    /// and the execution-cache scratch appropriate to that domain.
    pub(crate) fn derived(
        &self,
        lifetime: Lifetime,
        static_variables: Option<Container>,
        run_time_cache: Option<Box<[u8]>>,
        is_closure: bool,
    ) -> CodeUnit {
        CodeUnit {
            identity: self.identity,
            name: self.name.clone(),
            lifetime,
            is_closure,
            immutable: lifetime.is_permanent(),
            static_variables,
            variables: self.variables.clone(),
            literals: self.literals.clone(),
            cache_size: self.cache_size,
            run_time_cache,
        }
    }

    /// Allocate the zero-filled execution-cache scratch for this unit
    pub(crate) fn fresh_run_time_cache(&self) -> Option<Box<[u8]>> {
        Some(vec![0u8; self.cache_size].into_boxed_slice())
    }

    pub fn identity(&self) -> OpcodeId {
        self.identity
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }

    pub fn is_closure(&self) -> bool {
        self.is_closure
    }

    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    pub fn static_variables(&self) -> Option<&Container> {
        self.static_variables.as_ref()
    }

    pub fn variables(&self) -> &[Text] {
        &self.variables
    }

    pub fn literals(&self) -> &[Value] {
        &self.literals
    }

    pub fn cache_size(&self) -> usize {
        self.cache_size
    }

    pub fn run_time_cache(&self) -> Option<&[u8]> {
        self.run_time_cache.as_deref()
    }
}

impl Drop for CodeUnit {
    fn drop(&mut self) {
        // the matching release for the duplication or acquire that bound
        // the statics
        if let Some(statics) = self.static_variables.take() {
            statics.release_owned();
        }
    }
}

impl fmt::Debug for CodeUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CodeUnit")
            .field("identity", &self.identity)
            .field("name", &self.name)
            .field("lifetime", &self.lifetime)
            .field("is_closure", &self.is_closure)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_identities_are_unique() {
        let a = CodeUnit::new("a");
        let b = CodeUnit::new("b");
        assert_ne!(a.identity(), b.identity());
    }

    #[test]
    fn test_builder() {
        let unit = CodeUnit::new("f")
            .with_variables(["argv", "count"])
            .with_literals(vec![Value::Int(1), Value::from("lit")])
            .with_cache_size(64)
            .mark_closure();
        assert_eq!(unit.name(), "f");
        assert!(unit.is_closure());
        assert_eq!(unit.variables().len(), 2);
        assert_eq!(unit.literals().len(), 2);
        assert_eq!(unit.cache_size(), 64);
        assert!(unit.run_time_cache().is_none());
    }

    #[test]
    fn test_derived_keeps_identity() {
        let unit = CodeUnit::new("f").with_cache_size(8);
        let copy = unit.derived(
            Lifetime::Permanent,
            None,
            None,
            false,
        );
        assert_eq!(copy.identity(), unit.identity());
        assert!(copy.is_immutable());
        assert!(!copy.is_closure());
    }

    #[test]
    fn test_fresh_run_time_cache_is_zeroed() {
        let unit = CodeUnit::new("f").with_cache_size(16);
        let rtc = unit.fresh_run_time_cache().unwrap();
        assert_eq!(rtc.len(), 16);
        assert!(rtc.iter().all(|b| *b == 0));
    }

    #[test]
    fn test_drop_releases_static_variables() {
        let statics = Container::new();
        statics.push(Value::Int(0));
        let observer = statics.clone();
        let unit = CodeUnit::new("f").with_static_variables(statics);
        drop(unit);
        assert!(observer.is_released());
    }
}
