//! Watchdog thread that terminates a running isolate
//!
//! The isolate itself is `!Send`, so the watchdog only holds its thread-safe
//! handle. It polls the deadline and the caller's cancellation token at the
//! configured interval and reacts immediately to heap alarms raised from the
//! isolate's near-heap-limit callback. `stop` is the rendezvous point: once it
//! returns, the watchdog will not touch the isolate again.

use deno_core::v8::IsolateHandle;
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread::JoinHandle;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

/// Why the watchdog terminated execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Verdict {
    Deadline,
    Cancelled,
    MemoryCeiling { heap_bytes: usize },
}

impl Verdict {
    /// Deadline and caller cancellation are both reported as a timeout
    pub fn is_timeout(self) -> bool {
        matches!(self, Verdict::Deadline | Verdict::Cancelled)
    }
}

enum Signal {
    Stop,
    HeapCeiling { heap_bytes: usize },
}

/// Sender half handed to the near-heap-limit callback
pub(crate) struct HeapAlarm {
    tx: mpsc::Sender<Signal>,
    raised: bool,
}

impl HeapAlarm {
    /// Report that the heap reached its ceiling. Only the first call is forwarded.
    pub fn raise(&mut self, heap_bytes: usize) {
        if !self.raised {
            self.raised = true;
            let _ = self.tx.send(Signal::HeapCeiling { heap_bytes });
        }
    }
}

pub(crate) struct Watchdog {
    tx: mpsc::Sender<Signal>,
    thread: JoinHandle<Option<Verdict>>,
}

impl Watchdog {
    pub fn spawn(
        handle: IsolateHandle,
        deadline: Instant,
        cancel: Option<CancellationToken>,
        interval: Duration,
    ) -> std::io::Result<Self> {
        let (tx, rx) = mpsc::channel();
        let thread = std::thread::Builder::new()
            .name("scriptbox-watchdog".into())
            .spawn(move || watch(rx, handle, deadline, cancel, interval))?;
        Ok(Self { tx, thread })
    }

    pub fn heap_alarm(&self) -> HeapAlarm {
        HeapAlarm {
            tx: self.tx.clone(),
            raised: false,
        }
    }

    /// Stop watching and return the termination verdict, if any.
    pub fn stop(self) -> Option<Verdict> {
        let _ = self.tx.send(Signal::Stop);
        match self.thread.join() {
            Ok(verdict) => verdict,
            Err(_) => {
                tracing::error!("Watchdog thread panicked");
                None
            }
        }
    }
}

fn watch(
    rx: mpsc::Receiver<Signal>,
    handle: IsolateHandle,
    deadline: Instant,
    cancel: Option<CancellationToken>,
    interval: Duration,
) -> Option<Verdict> {
    let interval = interval.max(Duration::from_millis(1));
    loop {
        let now = Instant::now();
        let verdict = if now >= deadline {
            Some(Verdict::Deadline)
        } else if cancel.as_ref().is_some_and(|token| token.is_cancelled()) {
            Some(Verdict::Cancelled)
        } else {
            None
        };
        if let Some(verdict) = verdict {
            handle.terminate_execution();
            tracing::debug!(?verdict, "Watchdog terminated execution");
            return Some(verdict);
        }

        match rx.recv_timeout(interval.min(deadline - now)) {
            Ok(Signal::Stop) | Err(RecvTimeoutError::Disconnected) => return None,
            Ok(Signal::HeapCeiling { heap_bytes }) => {
                handle.terminate_execution();
                tracing::debug!(heap_bytes, "Watchdog terminated execution at heap ceiling");
                return Some(Verdict::MemoryCeiling { heap_bytes });
            }
            Err(RecvTimeoutError::Timeout) => {}
        }
    }
}
