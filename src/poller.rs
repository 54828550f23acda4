//! Cooperative cancellation and status hooks.
//!
//! Grounded on the `lifepoll`/`lifeerrors` abstract interfaces Golly's own
//! tick loop drives, generalised here to the engine's long-running
//! `step`/`get_result` recursion, which needs to check in periodically
//! without the caller threading a closure through every call site.

/// Polled periodically from inside a long-running `step` to decide whether
/// to abort early. `cache::Ctx::interrupt` is driven by this trait's
/// [`Poller::poll`] composed with [`Poller::is_interrupted`].
pub trait Poller {
    /// Called frequently (once per recursive cache call); should be cheap.
    /// Returning `true` aborts the in-flight step at the next consistent
    /// boundary.
    fn poll(&mut self) -> bool {
        false
    }

    /// Sticky flag: once set, stays set until explicitly cleared. Mirrors
    /// `softinterrupt` in the original step driver, which is set when
    /// shrinking the increment makes the in-flight computation's horizon
    /// invalid.
    fn is_interrupted(&self) -> bool {
        false
    }

    fn set_interrupted(&mut self, _value: bool) {}

    /// Invoked by `population::PopulationCache` (or a caller rendering a
    /// live population count) once a possibly-expensive recount finishes.
    fn update_pop(&mut self, _population: &crate::bigint::BigInt) {}
}

/// A no-op poller: never interrupts, ignores population updates. The
/// default for headless / library use.
#[derive(Default)]
pub struct NullPoller;

impl Poller for NullPoller {}

/// Destination for the engine's fatal/warning/status messages (§6.4,
/// `lifeerrors`). Kept separate from `Poller` because a caller may want to
/// swap logging destinations independent of cancellation policy.
pub trait ErrorSink {
    fn fatal(&mut self, message: &str);
    fn warning(&mut self, message: &str);
    fn status(&mut self, message: &str);
}

/// Routes every message through `tracing`, at the target the rest of the
/// engine already logs under.
#[derive(Default)]
pub struct TracingErrorSink;

impl ErrorSink for TracingErrorSink {
    fn fatal(&mut self, message: &str) {
        tracing::error!(target: "hashlife.engine", "{message}");
    }

    fn warning(&mut self, message: &str) {
        tracing::warn!(target: "hashlife.engine", "{message}");
    }

    fn status(&mut self, message: &str) {
        tracing::info!(target: "hashlife.engine", "{message}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn null_poller_never_interrupts() {
        let mut p = NullPoller;
        assert!(!p.poll());
        assert!(!p.is_interrupted());
    }
}
