//! Callables with captured state
//!
//! A closure pairs a code unit with the identity of the lexical scope it was
//! bound to and an optional bound receiver value. Permanent copies strip the
//! receiver and defer scope resolution; request copies re-resolve the scope
//! by name in the target context and leave the receiver unset. Every copy is
//! tagged with its origin domain for later introspection.

use std::fmt;
use std::sync::Arc;

use crate::code::CodeUnit;
use crate::host::ScopeId;
use crate::lifetime::Lifetime;
use crate::text::Text;
use crate::value::Value;

/// A callable: code unit plus captured bound state
pub struct Closure {
    unit: Arc<CodeUnit>,
    /// Name of the bound lexical scope, if any
    scope_name: Option<Text>,
    /// Scope resolved in the owning context; never set on permanent copies
    resolved_scope: Option<ScopeId>,
    /// Bound receiver; cleared by duplication, re-bound externally
    receiver: Option<Value>,
    /// Domain this copy was produced for
    lifetime: Lifetime,
}

impl Closure {
    /// Wrap a code unit as a context-owned callable
    pub fn new(unit: Arc<CodeUnit>) -> Self {
        Closure {
            unit,
            scope_name: None,
            resolved_scope: None,
            receiver: None,
            lifetime: Lifetime::Request,
        }
    }

    pub fn with_scope_name(mut self, name: impl Into<String>) -> Self {
        self.scope_name = Some(Text::new(name.into()));
        self
    }

    pub fn with_receiver(mut self, receiver: Value) -> Self {
        self.receiver = Some(receiver);
        self
    }

    pub(crate) fn from_parts(
        unit: Arc<CodeUnit>,
        scope_name: Option<Text>,
        resolved_scope: Option<ScopeId>,
        lifetime: Lifetime,
    ) -> Self {
        Closure {
            unit,
            scope_name,
            resolved_scope,
            receiver: None,
            lifetime,
        }
    }

    pub fn unit(&self) -> &Arc<CodeUnit> {
        &self.unit
    }

    pub fn scope_name(&self) -> Option<&Text> {
        self.scope_name.as_ref()
    }

    pub fn resolved_scope(&self) -> Option<ScopeId> {
        self.resolved_scope
    }

    pub fn receiver(&self) -> Option<&Value> {
        self.receiver.as_ref()
    }

    /// Which domain this copy was produced for
    pub fn lifetime(&self) -> Lifetime {
        self.lifetime
    }
}

impl fmt::Debug for Closure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Closure")
            .field("unit", &self.unit)
            .field("scope_name", &self.scope_name)
            .field("resolved_scope", &self.resolved_scope)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}
