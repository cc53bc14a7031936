//! Idempotent process-wide registry for ambient singletons.
//!
//! `spec.md` §9 requires the hub, composition executor, and tool executor to
//! survive development-time hot reloads: a per-module `static` that the
//! build tool may duplicate across reload boundaries is explicitly
//! disallowed. This registry is a single `OnceLock` keyed by type, set once
//! per process and returned idempotently on every subsequent call.

use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::sync::{Arc, OnceLock, RwLock};

type AnyArc = Arc<dyn Any + Send + Sync>;

fn slots() -> &'static RwLock<HashMap<TypeId, AnyArc>> {
    static SLOTS: OnceLock<RwLock<HashMap<TypeId, AnyArc>>> = OnceLock::new();
    SLOTS.get_or_init(|| RwLock::new(HashMap::new()))
}

/// Returns the process-wide instance of `T`, constructing it with `init` the
/// first time it is requested. Subsequent calls (including across a
/// hot-reload that re-executes module initializers) return the same `Arc`.
pub fn get_or_init<T, F>(init: F) -> Arc<T>
where
    T: Send + Sync + 'static,
    F: FnOnce() -> T,
{
    let key = TypeId::of::<T>();

    if let Some(existing) = slots().read().expect("registry lock poisoned").get(&key) {
        if let Ok(typed) = Arc::clone(existing).downcast::<T>() {
            return typed;
        }
    }

    let mut guard = slots().write().expect("registry lock poisoned");
    if let Some(existing) = guard.get(&key) {
        if let Ok(typed) = Arc::clone(existing).downcast::<T>() {
            return typed;
        }
    }
    let created: Arc<T> = Arc::new(init());
    guard.insert(key, created.clone());
    created
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Counter(std::sync::atomic::AtomicUsize);

    #[test]
    fn get_or_init_is_idempotent() {
        let calls = std::sync::atomic::AtomicUsize::new(0);
        let a = get_or_init(|| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Counter(std::sync::atomic::AtomicUsize::new(1))
        });
        let b = get_or_init(|| {
            calls.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            Counter(std::sync::atomic::AtomicUsize::new(2))
        });
        assert!(Arc::ptr_eq(&a, &b));
        assert_eq!(a.0.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
