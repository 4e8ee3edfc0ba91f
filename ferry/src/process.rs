//! Process-wide permanent code cache
//!
//! One cache per process, shared by every context: opcode identity mapped to
//! the permanent, immutable copy of a code unit. A unit is deep-copied into
//! permanent form at most once; afterwards every context re-instantiates
//! from the cached form. Entries live until the process is torn down.
//!
//! The cache offers get-or-insert semantics with the producer running while
//! the lock is released, so dependency storage may re-enter the permanent
//! duplication path for another unit without self-deadlock; the first insert
//! for an identity wins and later racers adopt it.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;

use crate::code::{CodeUnit, OpcodeId};
use crate::copy;
use crate::host::Host;
use crate::lifetime::Lifetime;

/// Process lifecycle handle owning the permanent code cache
pub struct Process {
    cache: Mutex<HashMap<OpcodeId, Arc<CodeUnit>>>,
}

impl Process {
    /// Process startup: create an empty cache
    pub fn new() -> Self {
        Process {
            cache: Mutex::new(HashMap::new()),
        }
    }

    /// Read the permanent entry for an opcode identity
    pub fn cached(&self, identity: OpcodeId) -> Option<Arc<CodeUnit>> {
        self.cache.lock().get(&identity).cloned()
    }

    /// Number of permanently cached units
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Permanent path of the code-unit duplicator.
    ///
    /// Cache hits return the existing entry with no new allocation. On a
    /// miss the permanent copy is built with the lock released: header copy
    /// with the closure flag cleared and the immutable flag set, static
    /// variables duplicated as permanent. The winner of the insert is
    /// decided under the lock; a losing racer adopts the cached copy and
    /// drops its own, releasing the statics it duplicated. Only the winner
    /// stores dependencies through the host, once per unit, after the lock
    /// is dropped so storage may re-enter the permanent path.
    pub fn cache_permanent(&self, source: &CodeUnit, host: &dyn Host) -> Arc<CodeUnit> {
        if let Some(hit) = self.cached(source.identity()) {
            return hit;
        }

        let statics = source
            .static_variables()
            .map(|c| copy::permanent_container(self, host, c));
        let unit = Arc::new(source.derived(Lifetime::Permanent, statics, None, false));

        {
            let mut cache = self.cache.lock();
            if let Some(hit) = cache.get(&source.identity()) {
                return Arc::clone(hit);
            }
            cache.insert(source.identity(), Arc::clone(&unit));
        }

        host.store_dependencies(&unit);
        unit
    }
}

impl Default for Process {
    fn default() -> Self {
        Process::new()
    }
}

// Process teardown drops the cache; each unit's drop releases its permanent
// static-variable container recursively.
