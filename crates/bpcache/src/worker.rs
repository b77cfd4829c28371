//! Background maintenance for bounded stores
//!
//! One thread per store. It resets hit counters every reset interval and runs
//! garbage collection whenever a `put` asks for it. Requests that arrive while
//! a pass is running coalesce into a single follow-up pass.

use std::io;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Instant;

use parking_lot::{Condvar, Mutex};
use tracing::{debug, error};

use crate::store::Inner;

#[derive(Debug, Default)]
struct SignalState {
    gc_requested: bool,
    stopped: bool,
}

#[derive(Debug, Default)]
struct Signal {
    state: Mutex<SignalState>,
    cond: Condvar,
}

/// Handle to the maintenance thread of a store
#[derive(Debug)]
pub(crate) struct Maintenance {
    signal: Arc<Signal>,
    handle: Mutex<Option<JoinHandle<()>>>,
}

impl Maintenance {
    pub(crate) fn spawn(inner: Arc<Inner>) -> io::Result<Self> {
        let signal = Arc::new(Signal::default());
        let thread_signal = Arc::clone(&signal);
        let handle = thread::Builder::new()
            .name("bpstore-maintenance".to_string())
            .spawn(move || run(inner, thread_signal))?;

        Ok(Self {
            signal,
            handle: Mutex::new(Some(handle)),
        })
    }

    /// Ask for a garbage collection pass without waiting for it
    pub(crate) fn request_gc(&self) {
        let mut state = self.signal.state.lock();
        if !state.stopped {
            state.gc_requested = true;
            self.signal.cond.notify_one();
        }
    }

    /// Stop the thread and wait for it. Safe to call more than once.
    pub(crate) fn shutdown(&self) {
        {
            let mut state = self.signal.state.lock();
            state.stopped = true;
            self.signal.cond.notify_all();
        }
        if let Some(handle) = self.handle.lock().take() {
            if handle.join().is_err() {
                error!("Blueprint store maintenance thread panicked");
            }
        }
    }
}

fn run(inner: Arc<Inner>, signal: Arc<Signal>) {
    let interval = inner.settings.reset_interval;
    let mut next_reset = Instant::now() + interval;

    loop {
        let run_gc = {
            let mut state = signal.state.lock();
            while !state.stopped && !state.gc_requested && Instant::now() < next_reset {
                signal.cond.wait_until(&mut state, next_reset);
            }
            if state.stopped {
                break;
            }
            std::mem::take(&mut state.gc_requested)
        };

        if Instant::now() >= next_reset {
            inner.reset_hits();
            next_reset = Instant::now() + interval;
        }
        if run_gc {
            inner.collect_garbage();
        }
    }

    debug!("Blueprint store maintenance thread stopped");
}
