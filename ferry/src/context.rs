//! Per-context duplication state
//!
//! Each execution context owns three maps with no ambient globals: the
//! `uncopied` cache of context-local code-unit instances, the `used` table
//! mapping instantiated units back to the name they were registered under,
//! and the `activated` set of opcode identities whose auto-globals have
//! already been declared here. The context also owns its callable table.
//! All of it is constructed at context start and dropped at context end.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use crate::code::{CodeUnit, OpcodeId};
use crate::copy;
use crate::error::{Error, Result};
use crate::host::{DefaultHost, Host};
use crate::lifetime::Lifetime;
use crate::process::Process;
use crate::value::Value;

pub(crate) struct ContextTables {
    /// Context-local code-unit instances, keyed by opcode identity
    pub(crate) uncopied: HashMap<OpcodeId, Arc<CodeUnit>>,
    /// Name a context-local instance was registered under
    pub(crate) used: HashMap<OpcodeId, String>,
    /// Opcode identities whose auto-globals are already declared here
    pub(crate) activated: HashSet<OpcodeId>,
    /// The context's callable table
    pub(crate) functions: HashMap<String, Arc<CodeUnit>>,
}

/// An isolated execution context's view of the duplication engine
pub struct Context {
    process: Arc<Process>,
    host: Arc<dyn Host>,
    tables: ContextTables,
}

impl Context {
    /// Context startup: fresh per-context caches against a shared process
    pub fn new(process: Arc<Process>, host: Arc<dyn Host>) -> Self {
        Context {
            process,
            host,
            tables: ContextTables {
                uncopied: HashMap::new(),
                used: HashMap::new(),
                activated: HashSet::new(),
                functions: HashMap::new(),
            },
        }
    }

    /// Context with every host collaborator stubbed out
    pub fn with_default_host(process: Arc<Process>) -> Self {
        Context::new(process, Arc::new(DefaultHost))
    }

    pub fn process(&self) -> &Arc<Process> {
        &self.process
    }

    /// Copy a value into the chosen ownership domain.
    ///
    /// Total: every value kind produces a value. Unsupported kinds degrade
    /// to their truthiness, untranslatable handles to null.
    pub fn duplicate(&mut self, value: &Value, lifetime: Lifetime) -> Value {
        match lifetime {
            Lifetime::Permanent => copy::permanent_value(&self.process, &*self.host, value),
            Lifetime::Request => {
                copy::request_value(&self.process, &*self.host, &mut self.tables, value)
            }
        }
    }

    /// Copy a code unit into the chosen ownership domain.
    ///
    /// The permanent path consults the process-wide cache and deep-copies at
    /// most once per opcode identity. The request path is idempotent within
    /// this context and requires the permanent copy to exist already.
    pub fn duplicate_code_unit(&mut self, unit: &CodeUnit, lifetime: Lifetime) -> Arc<CodeUnit> {
        match lifetime {
            Lifetime::Permanent => self.process.cache_permanent(unit, &*self.host),
            Lifetime::Request => {
                copy::request_code_unit(&self.process, &*self.host, &mut self.tables, unit)
            }
        }
    }

    /// Declare a code unit's auto-global names in this context, once per
    /// opcode identity
    pub fn activate_auto_globals(&mut self, unit: &CodeUnit) {
        copy::activate_auto_globals(&*self.host, &mut self.tables, unit);
    }

    /// Request-duplicate a code unit and register it in this context's
    /// callable table under `name`
    pub fn register_use(&mut self, name: &str, unit: &CodeUnit) -> Result<()> {
        if self.tables.functions.contains_key(name) {
            return Err(Error::name_exists(name));
        }
        let instance =
            copy::request_code_unit(&self.process, &*self.host, &mut self.tables, unit);
        self.tables.used.insert(instance.identity(), name.to_string());
        self.tables.functions.insert(name.to_string(), instance);
        Ok(())
    }

    /// Look up a registered callable
    pub fn function(&self, name: &str) -> Option<Arc<CodeUnit>> {
        self.tables.functions.get(name).cloned()
    }

    /// Names in the callable table
    pub fn function_count(&self) -> usize {
        self.tables.functions.len()
    }

    /// Remove a callable table entry.
    ///
    /// Evicts the matching `used` and `uncopied` records as well, so the
    /// instance's static-variable container is released now, once, rather
    /// than at context teardown.
    pub fn remove_function(&mut self, name: &str) -> Result<()> {
        let Some(instance) = self.tables.functions.remove(name) else {
            return Err(Error::name_missing(name));
        };
        let identity = instance.identity();
        if self.tables.used.get(&identity).is_some_and(|n| n == name) {
            self.tables.used.remove(&identity);
            self.tables.uncopied.remove(&identity);
        }
        Ok(())
    }
}

// Context teardown drops the tables; each instance's drop releases its
// request-owned static-variable container when the last handle goes.
