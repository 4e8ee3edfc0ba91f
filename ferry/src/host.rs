//! Collaborator interfaces consumed by the duplication engine
//!
//! The core does not resolve dependencies, register auto-globals, or look up
//! lexical scopes itself; the embedding interpreter supplies those through
//! this trait. All methods default to no-ops so hosts implement only what
//! they need.

use crate::code::CodeUnit;

/// Identity of a lexical scope resolved inside a target context
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ScopeId(pub u64);

/// Host interpreter collaborators
pub trait Host: Send + Sync {
    /// Record the external code units a permanently cached unit depends on.
    /// Invoked once per unit, while its permanent copy is being built; may
    /// re-enter the permanent duplication path for other units.
    fn store_dependencies(&self, _unit: &CodeUnit) {}

    /// Materialize a unit's recorded dependencies into the calling context.
    /// Invoked the first time a context requests the unit.
    fn load_dependencies(&self, _unit: &CodeUnit) {}

    /// Register a variable or literal name as an auto-global in the calling
    /// context. Invoked per name on first activation of a code unit.
    fn declare_auto_global(&self, _name: &str) {}

    /// Re-bind a closure's lexical scope by name in the calling context
    fn resolve_scope(&self, _name: &str) -> Option<ScopeId> {
        None
    }
}

/// Host with every collaborator stubbed out
#[derive(Debug, Default)]
pub struct DefaultHost;

impl Host for DefaultHost {}
