//! One-shot readiness gate
//!
//! The host can only hand out a working projection after an asynchronous readiness
//! signal. The gate records that transition and runs the callbacks waiting on it
//! exactly once.

/// Lifecycle state of a component waiting on the host
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Readiness {
    #[default]
    Uninitialized,
    Ready,
}

/// `Uninitialized → Ready` transition with callbacks fired at most once
#[derive(Default)]
pub struct ReadinessGate {
    state: Readiness,
    pending: Vec<Box<dyn FnOnce()>>,
}

impl std::fmt::Debug for ReadinessGate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReadinessGate")
            .field("state", &self.state)
            .field("pending", &self.pending.len())
            .finish()
    }
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    #[inline]
    pub fn state(&self) -> Readiness {
        self.state
    }

    #[inline]
    pub fn is_ready(&self) -> bool {
        self.state == Readiness::Ready
    }

    /// Run `callback` once the gate opens, or right away if it already has
    pub fn on_ready(&mut self, callback: impl FnOnce() + 'static) {
        match self.state {
            Readiness::Ready => callback(),
            Readiness::Uninitialized => self.pending.push(Box::new(callback)),
        }
    }

    /// Open the gate; returns false if it was already open
    pub fn mark_ready(&mut self) -> bool {
        if self.is_ready() {
            return false;
        }
        self.state = Readiness::Ready;
        for callback in std::mem::take(&mut self.pending) {
            callback();
        }
        true
    }
}
