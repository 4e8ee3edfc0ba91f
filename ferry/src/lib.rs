//! Ferry
//!
//! Value and compiled-code transfer between isolated execution contexts.
//! A value produced in one context is copied into another without violating
//! either context's ownership rules: copies live either in the
//! process-lifetime permanent domain (immutable, shared read-only) or in a
//! context-lifetime request domain (owned and mutated by one context), and a
//! process-wide cache guarantees each compiled code unit is deep-copied into
//! permanent form at most once.

pub mod closure;
pub mod code;
pub mod container;
pub mod context;
mod copy;
pub mod error;
pub mod handle;
pub mod host;
pub mod lifetime;
pub mod process;
pub mod text;
pub mod value;

pub use closure::Closure;
pub use code::{CodeUnit, OpcodeId};
pub use container::{Container, Key};
pub use context::Context;
pub use error::{Error, Result};
pub use handle::{Handle, HandleKind};
pub use host::{DefaultHost, Host, ScopeId};
pub use lifetime::Lifetime;
pub use process::Process;
pub use text::Text;
pub use value::{Object, Value};
