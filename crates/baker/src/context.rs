//! Execution-context handoff between the bake worker and the interactive
//! thread.
//!
//! The graphics context is not implicitly shared across threads: every
//! GPU-touching step acquires it first and releases it right after, so an
//! interactive viewport can interleave its own work between samples. The
//! acquisition is bounded to one sample and is the sole concurrency-safety
//! mechanism of the pipeline.

use std::sync::{Condvar, Mutex};

/// Scoped access to the graphics context. `acquire` may block until the
/// other side releases; the pair is safe to call from a background thread.
pub trait ExecutionContext: Send + Sync {
    fn acquire(&self);
    fn release(&self);
}

/// RAII pairing of `acquire`/`release`; guarantees the release on every
/// path out of a sample, including error returns.
pub struct ContextScope<'a> {
    context: &'a dyn ExecutionContext,
}

impl<'a> ContextScope<'a> {
    pub fn enter(context: &'a dyn ExecutionContext) -> Self {
        context.acquire();
        Self { context }
    }
}

impl Drop for ContextScope<'_> {
    fn drop(&mut self) {
        self.context.release();
    }
}

/// Context shared with an interactive thread; a binary gate serialises
/// device use between the two sides.
#[derive(Debug, Default)]
pub struct SharedDeviceContext {
    held: Mutex<bool>,
    idle: Condvar,
}

impl SharedDeviceContext {
    pub fn new() -> Self {
        Self::default()
    }
}

impl ExecutionContext for SharedDeviceContext {
    fn acquire(&self) {
        let mut held = self.held.lock().unwrap_or_else(|err| err.into_inner());
        while *held {
            held = self.idle.wait(held).unwrap_or_else(|err| err.into_inner());
        }
        *held = true;
    }

    fn release(&self) {
        let mut held = self.held.lock().unwrap_or_else(|err| err.into_inner());
        debug_assert!(*held, "release without matching acquire");
        *held = false;
        drop(held);
        self.idle.notify_one();
    }
}

/// Context for jobs that own the device outright (headless bakes); the
/// enter/exit pairs still run so the sequencing stays identical.
#[derive(Debug, Default, Clone, Copy)]
pub struct ExclusiveContext;

impl ExecutionContext for ExclusiveContext {
    fn acquire(&self) {}
    fn release(&self) {}
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn scope_releases_on_drop() {
        let context = SharedDeviceContext::new();
        {
            let _scope = ContextScope::enter(&context);
            assert!(*context.held.lock().unwrap());
        }
        assert!(!*context.held.lock().unwrap());
    }

    #[test]
    fn contended_acquire_waits_for_release() {
        let context = Arc::new(SharedDeviceContext::new());
        let entered = Arc::new(AtomicU32::new(0));

        context.acquire();
        let worker = {
            let context = Arc::clone(&context);
            let entered = Arc::clone(&entered);
            std::thread::spawn(move || {
                let _scope = ContextScope::enter(context.as_ref());
                entered.store(1, Ordering::SeqCst);
            })
        };

        std::thread::sleep(std::time::Duration::from_millis(20));
        assert_eq!(entered.load(Ordering::SeqCst), 0, "acquired while held");
        context.release();
        worker.join().unwrap();
        assert_eq!(entered.load(Ordering::SeqCst), 1);
    }
}
