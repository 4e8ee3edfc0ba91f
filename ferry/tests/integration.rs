//! Integration tests for the transfer engine
//!
//! Exercises the full duplication pipeline the way an embedding scheduler
//! would: values duplicated as permanent on the sending side, then
//! re-instantiated as request copies inside receiving contexts.

use std::sync::Arc;

use ferry::{
    CodeUnit, Closure, Container, Context, Handle, Key, Lifetime, Object, Process, Text, Value,
};

/// Helper: a process plus a context with stubbed host collaborators
fn process_and_context() -> (Arc<Process>, Context) {
    let process = Arc::new(Process::new());
    let ctx = Context::with_default_host(Arc::clone(&process));
    (process, ctx)
}

/// Helper: the container `{ "a": 1, "b": [2, 3] }`
fn sample_container() -> Container {
    let b = Container::new();
    b.push(Value::Int(2));
    b.push(Value::Int(3));
    let c = Container::new();
    c.insert(Key::name("a"), Value::Int(1));
    c.insert(Key::name("b"), Value::Array(b));
    c
}

#[test]
fn scalars_round_trip_unchanged() {
    let (_process, mut ctx) = process_and_context();
    for value in [
        Value::Null,
        Value::Bool(true),
        Value::Int(-42),
        Value::Float(2.5),
    ] {
        let perm = ctx.duplicate(&value, Lifetime::Permanent);
        let req = ctx.duplicate(&perm, Lifetime::Request);
        assert_eq!(req, value);
    }
}

#[test]
fn text_round_trip_is_byte_identical() {
    let (_process, mut ctx) = process_and_context();
    let source = Value::Str(Text::new("shared between contexts"));
    let perm = ctx.duplicate(&source, Lifetime::Permanent);
    let req = ctx.duplicate(&perm, Lifetime::Request);

    let (Value::Str(original), Value::Str(copy)) = (&source, &req) else {
        panic!("text survived as a different kind");
    };
    assert_eq!(copy.as_bytes(), original.as_bytes());
    assert!(!copy.is_permanent());
}

#[test]
fn container_round_trip_preserves_order_keys_and_values() {
    let (_process, mut ctx) = process_and_context();
    let source = sample_container();

    let perm = ctx.duplicate(&Value::Array(source.clone()), Lifetime::Permanent);
    let Value::Array(perm_container) = &perm else {
        panic!("container survived as a different kind");
    };
    assert!(perm_container.is_immutable());
    assert_eq!(perm_container.refcount(), 2);

    let mut receiver = Context::with_default_host(Arc::clone(ctx.process()));
    let req = receiver.duplicate(&perm, Lifetime::Request);
    let Value::Array(req_container) = &req else {
        panic!("container survived as a different kind");
    };

    assert_eq!(*req_container, source);
    assert_eq!(req_container.get_name("a"), Some(Value::Int(1)));
    let keys: Vec<String> = req_container
        .entries()
        .iter()
        .map(|(k, _)| k.to_string())
        .collect();
    assert_eq!(keys, vec!["\"a\"", "\"b\""]);
}

#[test]
fn request_copy_is_independently_mutable() {
    let (_process, mut ctx) = process_and_context();
    let source = sample_container();
    let perm = ctx.duplicate(&Value::Array(source.clone()), Lifetime::Permanent);
    let req = ctx.duplicate(&perm, Lifetime::Request);
    let req_container = req.as_array().unwrap();

    req_container.insert(Key::name("c"), Value::Int(99));
    assert_eq!(req_container.len(), 3);
    assert_eq!(source.len(), 2);
    assert_eq!(perm.as_array().unwrap().len(), 2);
}

#[test]
fn permanent_statics_survive_acquire_release_cycle() {
    let (process, mut ctx) = process_and_context();
    let statics = Container::new();
    statics.insert(Key::name("count"), Value::Int(0));
    let unit = CodeUnit::new("counter").with_static_variables(statics);
    ctx.duplicate_code_unit(&unit, Lifetime::Permanent);

    // a reader takes and returns a reference to the cached statics; the
    // shared slots must stay live for every later request instantiation
    let cached = process.cached(unit.identity()).unwrap();
    let held = cached.static_variables().unwrap().acquire();
    held.release();
    assert!(!held.is_released());

    let instance = ctx.duplicate_code_unit(&unit, Lifetime::Request);
    let instance_statics = instance.static_variables().unwrap();
    assert_eq!(instance_statics.get_name("count"), Some(Value::Int(0)));
}

#[test]
fn empty_container_uses_shared_sentinel() {
    let (_process, mut ctx) = process_and_context();
    let empty = Container::new();

    let perm = ctx.duplicate(&Value::Array(empty.clone()), Lifetime::Permanent);
    let perm_container = perm.as_array().unwrap();
    assert!(!perm_container.has_allocated_storage());

    let req = ctx.duplicate(&perm, Lifetime::Request);
    let req_container = req.as_array().unwrap();
    assert!(!req_container.has_allocated_storage());

    req_container.release();
    assert!(req_container.is_released());
}

#[test]
fn unsupported_kinds_degrade_safely() {
    let (_process, mut ctx) = process_and_context();

    let object = Value::Object(Object::new("Channel"));
    assert_eq!(ctx.duplicate(&object, Lifetime::Request), Value::Bool(true));

    let stream = Value::Handle(Handle::stream(7));
    assert_eq!(ctx.duplicate(&stream, Lifetime::Request), Value::Int(7));

    let opaque = Value::Handle(Handle::other());
    assert_eq!(ctx.duplicate(&opaque, Lifetime::Request), Value::Null);
}

#[test]
fn code_unit_permanent_copy_is_cached_once() {
    let (process, mut ctx) = process_and_context();
    let unit = CodeUnit::new("worker");

    let first = ctx.duplicate_code_unit(&unit, Lifetime::Permanent);
    let second = ctx.duplicate_code_unit(&unit, Lifetime::Permanent);
    assert!(Arc::ptr_eq(&first, &second));
    assert_eq!(process.cached_count(), 1);
}

#[test]
fn closure_instances_have_independent_static_bindings() {
    let (process, mut sender) = process_and_context();

    let statics = Container::new();
    statics.insert(Key::name("count"), Value::Int(0));
    let unit = Arc::new(
        CodeUnit::new("counter")
            .with_static_variables(statics)
            .with_cache_size(32)
            .mark_closure(),
    );
    let closure = Value::Closure(Arc::new(Closure::new(Arc::clone(&unit))));

    let perm = sender.duplicate(&closure, Lifetime::Permanent);

    let mut ctx1 = Context::with_default_host(Arc::clone(&process));
    let mut ctx2 = Context::with_default_host(Arc::clone(&process));
    let a = ctx1.duplicate(&perm, Lifetime::Request);
    let b = ctx2.duplicate(&perm, Lifetime::Request);

    let a_statics = a.as_closure().unwrap().unit().static_variables().unwrap();
    let b_statics = b.as_closure().unwrap().unit().static_variables().unwrap();

    a_statics.insert(Key::name("count"), Value::Int(10));
    assert_eq!(a_statics.get_name("count"), Some(Value::Int(10)));
    assert_eq!(b_statics.get_name("count"), Some(Value::Int(0)));

    // each instance owns a fresh, zeroed execution cache
    let rtc = a.as_closure().unwrap().unit().run_time_cache().unwrap();
    assert_eq!(rtc.len(), 32);
    assert!(rtc.iter().all(|b| *b == 0));
}

#[test]
fn permanent_closure_strips_receiver_and_defers_scope() {
    let (_process, mut ctx) = process_and_context();
    let unit = Arc::new(CodeUnit::new("bound").mark_closure());
    let closure = Value::Closure(Arc::new(
        Closure::new(unit)
            .with_scope_name("Worker")
            .with_receiver(Value::Int(1)),
    ));

    let perm = ctx.duplicate(&closure, Lifetime::Permanent);
    let perm_closure = perm.as_closure().unwrap();
    assert_eq!(perm_closure.lifetime(), Lifetime::Permanent);
    assert!(perm_closure.receiver().is_none());
    assert!(perm_closure.resolved_scope().is_none());
    assert_eq!(perm_closure.scope_name().unwrap().as_str(), "Worker");

    // request copy re-resolves by name; the stub host finds nothing, which
    // leaves the scope unbound rather than failing
    let req = ctx.duplicate(&perm, Lifetime::Request);
    let req_closure = req.as_closure().unwrap();
    assert_eq!(req_closure.lifetime(), Lifetime::Request);
    assert!(req_closure.resolved_scope().is_none());
    assert!(req_closure.receiver().is_none());
}

#[test]
fn permanent_closure_keeps_closure_kind() {
    let (process, mut ctx) = process_and_context();
    let statics = Container::new();
    statics.insert(Key::name("seen"), Value::Int(0));
    let unit = Arc::new(
        CodeUnit::new("cb")
            .with_static_variables(statics)
            .mark_closure(),
    );
    let closure = Value::Closure(Arc::new(Closure::new(Arc::clone(&unit))));

    let perm = ctx.duplicate(&closure, Lifetime::Permanent);
    let perm_unit = perm.as_closure().unwrap().unit();
    assert!(perm_unit.is_closure());
    assert!(perm_unit.is_immutable());
    assert_eq!(perm_unit.lifetime(), Lifetime::Permanent);

    // the cache entry itself stays flag-cleared, and the closure's header
    // shares its statics rather than duplicating them a second time
    let cached = process.cached(unit.identity()).unwrap();
    assert!(!cached.is_closure());
    assert!(Container::same_header(
        cached.static_variables().unwrap(),
        perm_unit.static_variables().unwrap(),
    ));
}

#[test]
fn register_use_then_remove_releases_statics_once() {
    let (_process, mut ctx) = process_and_context();
    let statics = Container::new();
    statics.insert(Key::name("state"), Value::from("idle"));
    let unit = CodeUnit::new("job").with_static_variables(statics);
    ctx.duplicate_code_unit(&unit, Lifetime::Permanent);

    ctx.register_use("foo", &unit).unwrap();
    assert_eq!(ctx.function_count(), 1);
    let observer = ctx
        .function("foo")
        .unwrap()
        .static_variables()
        .unwrap()
        .clone();

    ctx.remove_function("foo").unwrap();
    assert_eq!(ctx.function_count(), 0);
    assert!(observer.is_released());
    assert_eq!(observer.refcount(), 0);

    drop(ctx);
    assert_eq!(observer.refcount(), 0);
}

#[test]
fn nested_containers_with_closures_transfer_whole() {
    let (process, mut sender) = process_and_context();

    let statics = Container::new();
    statics.insert(Key::name("seen"), Value::Int(0));
    let unit = Arc::new(
        CodeUnit::new("callback")
            .with_static_variables(statics)
            .mark_closure(),
    );

    let payload = Container::new();
    payload.insert(Key::name("id"), Value::Int(7));
    payload.insert(
        Key::name("on_done"),
        Value::Closure(Arc::new(Closure::new(unit))),
    );
    payload.insert(Key::name("log"), Value::Handle(Handle::stream(3)));

    let perm = sender.duplicate(&Value::Array(payload), Lifetime::Permanent);

    let mut receiver = Context::with_default_host(process);
    let req = receiver.duplicate(&perm, Lifetime::Request);
    let arrived = req.as_array().unwrap();

    assert_eq!(arrived.get_name("id"), Some(Value::Int(7)));
    assert_eq!(arrived.get_name("log"), Some(Value::Int(3)));
    let closure = arrived.get_name("on_done").unwrap();
    let closure = closure.as_closure().unwrap();
    assert_eq!(closure.lifetime(), Lifetime::Request);
    assert!(closure.unit().static_variables().is_some());
}

#[test]
fn deeply_nested_containers_do_not_overflow_the_stack() {
    let (_process, mut ctx) = process_and_context();

    let mut value = Value::Int(0);
    for _ in 0..1_024 {
        let wrapper = Container::new();
        wrapper.push(value);
        value = Value::Array(wrapper);
    }

    let perm = ctx.duplicate(&value, Lifetime::Permanent);
    let req = ctx.duplicate(&perm, Lifetime::Request);

    let mut depth = 0;
    let mut cursor = req;
    while let Value::Array(c) = cursor {
        cursor = c.get_index(0).unwrap();
        depth += 1;
    }
    assert_eq!(depth, 1_024);
    assert_eq!(cursor, Value::Int(0));
}

#[test]
fn same_identity_resolves_to_same_permanent_entry_across_contexts() {
    let (process, mut ctx1) = process_and_context();
    let mut ctx2 = Context::with_default_host(Arc::clone(&process));
    let unit = CodeUnit::new("shared");

    let a = ctx1.duplicate_code_unit(&unit, Lifetime::Permanent);
    let b = ctx2.duplicate_code_unit(&unit, Lifetime::Permanent);
    assert!(Arc::ptr_eq(&a, &b));
}
