//! Ordered keyed containers
//!
//! A container is an ordered sequence of key/value slots behind a shared
//! header carrying an explicit logical reference count. Exactly two
//! lifecycle variants exist:
//!
//! - *Permanent*: reference count starts at 2 (one logical owner plus one
//!   structural self-reference marking immutability), immutable, read-only
//!   from every context, torn down only with the process. Acquires raise
//!   the count above that floor; releasing back past the floor is a fatal
//!   invariant violation, never a teardown.
//! - *Request*: reference count starts at 1, mutable, owned by the context
//!   that created it, torn down when the last holder releases it.
//!
//! Cloning a `Container` copies the handle only; the logical count moves
//! through [`Container::acquire`] and [`Container::release`] plus the
//! ownership-drop path that fires when a duplication or cache entry is
//! discarded. An empty container is backed by the shared empty sentinel
//! instead of an allocated slot vector.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use parking_lot::RwLock;

use crate::lifetime::Lifetime;
use crate::text::Text;
use crate::value::Value;

/// A slot key: a small integer or interned text
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Index(i64),
    Name(Text),
}

impl Key {
    pub fn name(s: impl Into<String>) -> Key {
        Key::Name(Text::new(s))
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Key::Index(i) => write!(f, "{i}"),
            Key::Name(t) => write!(f, "{:?}", t.as_str()),
        }
    }
}

/// Backing storage: the shared empty sentinel, or owned slots
enum Backing {
    /// Process-wide empty-bucket sentinel; no slot allocation
    Empty,
    Slots(Vec<(Key, Value)>),
}

impl Backing {
    fn as_slice(&self) -> &[(Key, Value)] {
        match self {
            Backing::Empty => &[],
            Backing::Slots(slots) => slots,
        }
    }
}

struct ContainerData {
    slots: Backing,
    /// All keys are integers; string keys clear this fast-path flag
    static_keys: bool,
    /// Next integer key handed out on append
    next_free_key: i64,
    /// Slots already torn down by a terminal release
    released: bool,
}

struct ContainerInner {
    refcount: AtomicU32,
    lifetime: Lifetime,
    immutable: bool,
    data: RwLock<ContainerData>,
}

/// Shared handle to a container header
#[derive(Clone)]
pub struct Container {
    inner: Arc<ContainerInner>,
}

impl Container {
    /// Create an empty request-owned container
    pub fn new() -> Self {
        Container::from_parts(Lifetime::Request, Vec::new(), true, 0)
    }

    pub(crate) fn from_parts(
        lifetime: Lifetime,
        slots: Vec<(Key, Value)>,
        static_keys: bool,
        next_free_key: i64,
    ) -> Self {
        let slots = if slots.is_empty() {
            Backing::Empty
        } else {
            Backing::Slots(slots)
        };
        Container {
            inner: Arc::new(ContainerInner {
                refcount: AtomicU32::new(lifetime.initial_refcount()),
                lifetime,
                immutable: lifetime.is_permanent(),
                data: RwLock::new(ContainerData {
                    slots,
                    static_keys,
                    next_free_key,
                    released: false,
                }),
            }),
        }
    }

    pub fn lifetime(&self) -> Lifetime {
        self.inner.lifetime
    }

    pub fn is_immutable(&self) -> bool {
        self.inner.immutable
    }

    /// Current logical reference count
    pub fn refcount(&self) -> u32 {
        self.inner.refcount.load(Ordering::Acquire)
    }

    /// Whether the slots have been torn down by a terminal release
    pub fn is_released(&self) -> bool {
        self.inner.data.read().released
    }

    /// Whether the container owns an allocated slot vector, as opposed to
    /// being backed by the shared empty sentinel
    pub fn has_allocated_storage(&self) -> bool {
        matches!(self.inner.data.read().slots, Backing::Slots(_))
    }

    pub fn static_keys(&self) -> bool {
        self.inner.data.read().static_keys
    }

    pub fn next_free_key(&self) -> i64 {
        self.inner.data.read().next_free_key
    }

    pub fn len(&self) -> usize {
        self.inner.data.read().slots.as_slice().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether two handles point at the same header
    pub fn same_header(a: &Container, b: &Container) -> bool {
        Arc::ptr_eq(&a.inner, &b.inner)
    }

    /// Snapshot of the live slots in insertion order
    pub fn entries(&self) -> Vec<(Key, Value)> {
        self.inner.data.read().slots.as_slice().to_vec()
    }

    /// Look up a value by key
    pub fn get(&self, key: &Key) -> Option<Value> {
        let data = self.inner.data.read();
        data.slots
            .as_slice()
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.clone())
    }

    /// Look up a value by string key
    pub fn get_name(&self, name: &str) -> Option<Value> {
        self.get(&Key::Name(Text::new(name)))
    }

    /// Look up a value by integer key
    pub fn get_index(&self, index: i64) -> Option<Value> {
        self.get(&Key::Index(index))
    }

    /// Insert or replace a slot. Replacing releases the old value.
    ///
    /// Panics if the container is immutable or already released; both are
    /// contract violations, not runtime errors.
    pub fn insert(&self, key: Key, value: Value) {
        if self.inner.immutable {
            panic!("cannot mutate a permanent container");
        }
        let mut data = self.inner.data.write();
        if data.released {
            panic!("cannot mutate a released container");
        }
        match &key {
            Key::Index(i) => {
                if *i >= data.next_free_key {
                    data.next_free_key = i + 1;
                }
            }
            Key::Name(_) => data.static_keys = false,
        }
        if matches!(data.slots, Backing::Empty) {
            data.slots = Backing::Slots(Vec::new());
        }
        let Backing::Slots(slots) = &mut data.slots else {
            unreachable!()
        };
        if let Some(slot) = slots.iter_mut().find(|(k, _)| *k == key) {
            let old = std::mem::replace(&mut slot.1, value);
            drop(data);
            old.release();
        } else {
            slots.push((key, value));
        }
    }

    /// Append a value under the next free integer key
    pub fn push(&self, value: Value) {
        let next = self.next_free_key();
        self.insert(Key::Index(next), value);
    }

    /// Take one more logical reference
    pub fn acquire(&self) -> Container {
        self.inner.refcount.fetch_add(1, Ordering::AcqRel);
        self.clone()
    }

    /// Drop one logical reference taken with [`Container::acquire`].
    ///
    /// Request containers tear their slots down at the terminal count.
    /// Permanent containers never tear down through this path: their count
    /// floors at the initial owner-plus-marker pair, and releasing past
    /// the floor is a fatal invariant violation.
    pub fn release(&self) {
        if self.inner.immutable {
            let prev = self.inner.refcount.fetch_sub(1, Ordering::AcqRel);
            if prev <= self.inner.lifetime.initial_refcount() {
                panic!("permanent container released more times than acquired");
            }
            return;
        }
        self.release_owned();
    }

    /// Drop the logical reference created by duplication or caching; tear
    /// down the slots at the terminal count for this lifetime.
    ///
    /// Teardown fires exactly once. Releasing more times than the container
    /// was acquired is a fatal invariant violation.
    pub(crate) fn release_owned(&self) {
        let prev = self.inner.refcount.fetch_sub(1, Ordering::AcqRel);
        if prev == 0 {
            panic!("container reference count underflow");
        }
        if prev - 1 == self.inner.lifetime.terminal_refcount() {
            self.teardown();
        }
    }

    /// Release keys and reference-counted values, then drop the backing
    /// storage unless it is the shared empty sentinel.
    fn teardown(&self) {
        let slots = {
            let mut data = self.inner.data.write();
            if data.released {
                return;
            }
            data.released = true;
            std::mem::replace(&mut data.slots, Backing::Empty)
        };
        if let Backing::Slots(slots) = slots {
            for (_key, value) in slots {
                value.release();
                // key text is reference counted; dropping it here is the
                // matching release for the duplication that created it
            }
        }
    }
}

impl Default for Container {
    fn default() -> Self {
        Container::new()
    }
}

impl PartialEq for Container {
    fn eq(&self, other: &Self) -> bool {
        if Container::same_header(self, other) {
            return true;
        }
        self.entries() == other.entries()
    }
}

impl fmt::Display for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[")?;
        for (i, (key, value)) in self.entries().iter().enumerate() {
            if i > 0 {
                write!(f, ", ")?;
            }
            write!(f, "{key} => {value}")?;
        }
        write!(f, "]")
    }
}

impl fmt::Debug for Container {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Container")
            .field("lifetime", &self.inner.lifetime)
            .field("refcount", &self.refcount())
            .field("len", &self.len())
            .finish()
    }
}
