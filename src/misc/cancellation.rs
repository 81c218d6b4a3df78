/*
   Primitives shared between the pricing controller and its per-line
   workers. A worker never touches another worker's engine directly;
   it only observes the round's token, and the controller only
   observes the round's signal.
*/

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Condvar, Mutex};

/// Cooperative cancellation flag
///
/// Cloning yields a handle to the same flag. Engines poll it at
/// whatever granularity they support; the pricing loop polls it at
/// every solve-round boundary.
#[derive(Clone, Debug, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst)
    }
}

#[derive(Default)]
struct RoundState {
    finished: usize,
    succeeded: usize,
}

/// Completion signal for one pricing round.
///
/// Workers report once each. The controller blocks until either
/// every worker reported or, when asked to, the first success came in.
/// - unrecoverable if lock fails so just unwrap
#[derive(Default)]
pub struct RoundSignal {
    state: Mutex<RoundState>,
    condvar: Condvar,
}

impl RoundSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, success: bool) {
        let mut state = self.state.lock().unwrap();
        state.finished += 1;
        if success {
            state.succeeded += 1;
        }
        self.condvar.notify_all();
    }

    /// Block until `workers` reports arrived, or until the first
    /// success if `stop_on_success` is set.
    /// Returns whether any worker reported success so far.
    pub fn wait(&self, workers: usize, stop_on_success: bool) -> bool {
        let mut state = self.state.lock().unwrap();
        while state.finished < workers && !(stop_on_success && state.succeeded > 0) {
            state = self.condvar.wait(state).unwrap();
        }
        state.succeeded > 0
    }

    pub fn num_succeeded(&self) -> usize {
        self.state.lock().unwrap().succeeded
    }

    /// Guard that reports failure on drop unless `finish` was
    /// called. Keeps the controller from waiting on a worker that panicked.
    pub fn guard(&self) -> ReportGuard<'_> {
        ReportGuard { signal: self, reported: false }
    }
}

pub struct ReportGuard<'a> {
    signal: &'a RoundSignal,
    reported: bool,
}

impl ReportGuard<'_> {
    pub fn finish(mut self, success: bool) {
        self.reported = true;
        self.signal.report(success);
    }
}

impl Drop for ReportGuard<'_> {
    fn drop(&mut self) {
        if !self.reported {
            self.signal.report(false);
        }
    }
}
