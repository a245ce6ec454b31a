//! Engine setup shared by every pipe interpreter.

use super::host::register_host;
use crate::bridge::register_types;
use crate::config::EngineLimits;
use rhai::{Dynamic, Engine};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Applies the safety limits and registers the bridge and host types.
pub fn configure_engine(engine: &mut Engine, limits: &EngineLimits) {
    // Set safety limits
    engine.set_max_expr_depths(limits.max_expr_depth, limits.max_function_expr_depth);
    engine.set_max_call_levels(limits.max_call_levels);
    engine.set_max_operations(limits.max_operations);
    engine.set_max_string_size(limits.max_string_size);
    engine.set_max_array_size(limits.max_array_size);
    engine.set_max_map_size(limits.max_map_size);
    engine.set_max_modules(limits.max_modules);

    register_types(engine);
    register_host(engine);
}

/// Interrupt request of one interpreter, scoped to a single run.
///
/// Every run gets a fresh id from [`Interrupt::begin`]. Raising an id that
/// is no longer current has no effect, so a late cancellation of a
/// finished run never leaks into the next one.
#[derive(Debug, Default)]
pub struct Interrupt {
    current: AtomicU64,
    raised: AtomicU64,
}

impl Interrupt {
    /// Starts a new run and returns its id.
    pub fn begin(&self) -> u64 {
        self.current.fetch_add(1, Ordering::SeqCst) + 1
    }

    /// Requests termination of run `id`.
    pub fn raise(&self, id: u64) {
        self.raised.fetch_max(id, Ordering::SeqCst);
    }

    pub fn is_raised(&self) -> bool {
        let current = self.current.load(Ordering::Relaxed);
        current != 0 && self.raised.load(Ordering::Relaxed) == current
    }
}

/// Terminates the running script once its run is interrupted.
///
/// The request is polled between operations, so a script blocked inside a
/// native function only stops when that function returns.
pub fn register_interrupt(engine: &mut Engine, interrupt: Arc<Interrupt>) {
    engine.on_progress(move |_| {
        interrupt
            .is_raised()
            .then(|| Dynamic::from("cancelled".to_string()))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_limits_applied() {
        let limits = EngineLimits {
            max_operations: 500,
            ..EngineLimits::default()
        };
        let mut engine = Engine::new();
        configure_engine(&mut engine, &limits);
        assert_eq!(engine.max_operations(), 500);
        assert!(engine.run("loop { }").is_err());
    }

    #[test]
    fn test_interrupt_terminates() {
        let interrupt = Arc::new(Interrupt::default());
        let mut engine = Engine::new();
        register_interrupt(&mut engine, interrupt.clone());

        let run = interrupt.begin();
        interrupt.raise(run);
        let err = engine.run("loop { }").unwrap_err();
        assert!(Error::from_rhai_error("p", err).is_cancelled());

        interrupt.begin();
        assert!(engine.run("let x = 1 + 1;").is_ok());
    }

    #[test]
    fn test_stale_raise_is_ignored() {
        let interrupt = Interrupt::default();
        assert!(!interrupt.is_raised());
        let first = interrupt.begin();
        let second = interrupt.begin();
        interrupt.raise(first);
        assert!(!interrupt.is_raised());
        interrupt.raise(second);
        interrupt.raise(first);
        assert!(interrupt.is_raised());
    }
}
