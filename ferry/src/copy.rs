//! The duplication engine
//!
//! Every transfer enters through the value duplicator and recurses from
//! there: containers back into values for each slot, closures into the
//! code-unit duplicator, the code-unit duplicator into the process cache.
//! Permanent duplication needs only the process and host; request
//! duplication additionally threads the calling context's tables through
//! the recursion.

use std::sync::Arc;

use crate::closure::Closure;
use crate::code::CodeUnit;
use crate::container::{Container, Key};
use crate::context::ContextTables;
use crate::host::Host;
use crate::lifetime::Lifetime;
use crate::process::Process;
use crate::value::Value;

const STACK_RED_ZONE: usize = 128 * 1024; // 128KB remaining triggers growth
const STACK_GROW_SIZE: usize = 4 * 1024 * 1024; // Grow by 4MB each time

// ---------------------------------------------------------------------------
// Permanent duplication
// ---------------------------------------------------------------------------

/// Copy a value into the permanent domain, growing the stack for deep
/// container nesting
pub(crate) fn permanent_value(process: &Process, host: &dyn Host, value: &Value) -> Value {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        permanent_value_inner(process, host, value)
    })
}

fn permanent_value_inner(process: &Process, host: &dyn Host, value: &Value) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => value.clone(),
        Value::Str(text) => Value::Str(text.duplicate(Lifetime::Permanent)),
        Value::Array(container) => {
            Value::Array(permanent_container(process, host, container))
        }
        Value::Closure(closure) => {
            Value::Closure(Arc::new(permanent_closure(process, host, closure)))
        }
        // object identity cannot safely cross the boundary
        Value::Object(_) => Value::Bool(true),
        Value::Handle(handle) => handle.translate(),
    }
}

/// Permanent mode of the container duplicator: fresh immutable header,
/// count fixed at 2, every key and value recursively permanent. An empty
/// source keeps the shared empty sentinel and allocates nothing.
pub(crate) fn permanent_container(
    process: &Process,
    host: &dyn Host,
    source: &Container,
) -> Container {
    let entries = source.entries();
    let mut slots = Vec::with_capacity(entries.len());
    let mut static_keys = true;
    let mut next_free_key = 0i64;

    for (key, value) in entries {
        let key = match key {
            Key::Name(text) => {
                // string keys force the non-static layout henceforth
                static_keys = false;
                Key::Name(text.duplicate(Lifetime::Permanent))
            }
            Key::Index(index) => {
                if index >= next_free_key {
                    next_free_key = index + 1;
                }
                Key::Index(index)
            }
        };
        slots.push((key, permanent_value(process, host, &value)));
    }

    Container::from_parts(Lifetime::Permanent, slots, static_keys, next_free_key)
}

/// Permanent mode of the closure duplicator: the code unit is routed
/// through the process cache unless it is already a permanent unit, the
/// closure carries its own permanent header with the closure kind restored,
/// scope resolution is deferred, and the receiver is stripped.
pub(crate) fn permanent_closure(process: &Process, host: &dyn Host, source: &Closure) -> Closure {
    let cached = if source.unit().lifetime().is_permanent() {
        Arc::clone(source.unit())
    } else {
        process.cache_permanent(source.unit(), host)
    };

    // the cache entry has the closure flag cleared; the closure's own
    // header restores it, acquiring the cached statics instead of
    // duplicating them a second time
    let statics = cached.static_variables().map(|c| c.acquire());
    let unit = Arc::new(cached.derived(Lifetime::Permanent, statics, None, true));

    let scope_name = source
        .scope_name()
        .map(|name| name.duplicate(Lifetime::Permanent));
    Closure::from_parts(unit, scope_name, None, Lifetime::Permanent)
}

// ---------------------------------------------------------------------------
// Request duplication
// ---------------------------------------------------------------------------

/// Copy a value into the calling context's request domain
pub(crate) fn request_value(
    process: &Process,
    host: &dyn Host,
    tables: &mut ContextTables,
    value: &Value,
) -> Value {
    stacker::maybe_grow(STACK_RED_ZONE, STACK_GROW_SIZE, || {
        request_value_inner(process, host, tables, value)
    })
}

fn request_value_inner(
    process: &Process,
    host: &dyn Host,
    tables: &mut ContextTables,
    value: &Value,
) -> Value {
    match value {
        Value::Null | Value::Bool(_) | Value::Int(_) | Value::Float(_) => value.clone(),
        Value::Str(text) => Value::Str(text.duplicate(Lifetime::Request)),
        Value::Array(container) => {
            Value::Array(request_container(process, host, tables, container))
        }
        Value::Closure(closure) => {
            Value::Closure(Arc::new(request_closure(process, host, tables, closure)))
        }
        Value::Object(_) => Value::Bool(true),
        Value::Handle(handle) => handle.translate(),
    }
}

/// Request mode of the container duplicator: fresh mutable header owned by
/// the calling context, count 1. Sources on the sequential-integer-key fast
/// path copy slots verbatim and only recurse into reference-counted values;
/// otherwise each slot is copied field by field with request-owned key text.
pub(crate) fn request_container(
    process: &Process,
    host: &dyn Host,
    tables: &mut ContextTables,
    source: &Container,
) -> Container {
    let entries = source.entries();
    let mut slots = Vec::with_capacity(entries.len());
    let static_keys = source.static_keys();

    if static_keys {
        for (key, value) in entries {
            let value = if value.is_refcounted() {
                request_value(process, host, tables, &value)
            } else {
                value
            };
            slots.push((key, value));
        }
    } else {
        for (key, value) in entries {
            let key = match key {
                Key::Name(text) => Key::Name(text.duplicate(Lifetime::Request)),
                index => index,
            };
            slots.push((key, request_value(process, host, tables, &value)));
        }
    }

    Container::from_parts(
        Lifetime::Request,
        slots,
        static_keys,
        source.next_free_key(),
    )
}

/// Request path of the code-unit duplicator.
///
/// Idempotent within a context: the uncopied cache returns the identical
/// instance for repeated requests of one opcode identity. First requests
/// load dependencies, activate auto-globals, then re-instantiate from the
/// permanent cache entry. The permanent entry must already exist; a caller
/// that requests a unit before duplicating it as permanent has violated the
/// duplication contract.
pub(crate) fn request_code_unit(
    process: &Process,
    host: &dyn Host,
    tables: &mut ContextTables,
    source: &CodeUnit,
) -> Arc<CodeUnit> {
    if let Some(hit) = tables.uncopied.get(&source.identity()) {
        return Arc::clone(hit);
    }

    host.load_dependencies(source);
    activate_auto_globals(host, tables, source);

    let cached = process.cached(source.identity()).unwrap_or_else(|| {
        panic!(
            "code unit {} ({:?}) has no permanent copy; duplicate it as permanent \
             before requesting it in a context",
            source.identity(),
            source.name()
        )
    });

    let statics = cached
        .static_variables()
        .map(|c| request_container(process, host, tables, c));
    let unit = Arc::new(cached.derived(
        Lifetime::Request,
        statics,
        cached.fresh_run_time_cache(),
        cached.is_closure(),
    ));

    tables.uncopied.insert(unit.identity(), Arc::clone(&unit));
    unit
}

/// Request mode of the closure duplicator: the closure gets its own
/// instance of the request-path unit with freshly duplicated statics and a
/// zeroed execution cache, its bound scope re-resolved by name, and no
/// receiver.
pub(crate) fn request_closure(
    process: &Process,
    host: &dyn Host,
    tables: &mut ContextTables,
    source: &Closure,
) -> Closure {
    let base = request_code_unit(process, host, tables, source.unit());

    let statics = base
        .static_variables()
        .map(|c| request_container(process, host, tables, c));
    let unit = Arc::new(base.derived(
        Lifetime::Request,
        statics,
        base.fresh_run_time_cache(),
        true,
    ));

    let scope_name = source
        .scope_name()
        .map(|name| name.duplicate(Lifetime::Request));
    // lookup failure leaves the scope unresolved rather than failing the copy
    let resolved = scope_name
        .as_ref()
        .and_then(|name| host.resolve_scope(name.as_str()));

    Closure::from_parts(unit, scope_name, resolved, Lifetime::Request)
}

/// Auto-global activation: idempotent per opcode identity within a context.
/// First activation notifies the host for every declared variable name and
/// every string literal.
pub(crate) fn activate_auto_globals(
    host: &dyn Host,
    tables: &mut ContextTables,
    unit: &CodeUnit,
) {
    if tables.activated.contains(&unit.identity()) {
        return;
    }

    for name in unit.variables() {
        host.declare_auto_global(name.as_str());
    }
    for literal in unit.literals() {
        if let Value::Str(text) = literal {
            host.declare_auto_global(text.as_str());
        }
    }

    tables.activated.insert(unit.identity());
}
