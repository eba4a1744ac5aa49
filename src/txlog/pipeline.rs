//! Writer pipeline
//!
//! The bounded queue, background writer thread and error channel shared by
//! every backend. A backend only supplies an [`EventSink`].

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam::channel::{bounded, unbounded, Receiver, Sender};
use parking_lot::{Mutex, RwLock};

use crate::error::{LedgerError, Result};

use super::Event;

/// Where the background writer puts events
pub(crate) trait EventSink: Send + 'static {
    /// Persist one event and set its `sequence` to the committed value
    fn append(&mut self, event: &mut Event) -> Result<()>;

    /// Called once after the queue is drained
    fn finish(&mut self) -> Result<()> {
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    Idle,
    Running,
    Closed,
}

/// Queue + writer + error stream for one log instance
///
/// ## Concurrency:
/// - `events_tx`: read-locked by every enqueue, write-locked once by `close`
///   so that closing waits for in-flight sends
/// - `last_sequence`: written by the replay scan and the writer, never both
/// - Exactly one writer thread per pipeline
pub(crate) struct LogPipeline {
    capacity: usize,
    phase: Mutex<Phase>,
    events_tx: RwLock<Option<Sender<Event>>>,
    errors_tx: Mutex<Option<Sender<LedgerError>>>,
    errors_rx: Receiver<LedgerError>,
    last_sequence: Arc<AtomicU64>,
    writer: Mutex<Option<JoinHandle<()>>>,
}

impl LogPipeline {
    pub(crate) fn new(capacity: usize) -> Self {
        let (errors_tx, errors_rx) = unbounded();
        Self {
            capacity: capacity.max(1),
            phase: Mutex::new(Phase::Idle),
            events_tx: RwLock::new(None),
            errors_tx: Mutex::new(Some(errors_tx)),
            errors_rx,
            last_sequence: Arc::new(AtomicU64::new(0)),
            writer: Mutex::new(None),
        }
    }

    pub(crate) fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hand an event to the writer, blocking while the queue is full
    pub(crate) fn submit(&self, event: Event) -> Result<()> {
        let guard = self.events_tx.read();
        let tx = guard
            .as_ref()
            .ok_or_else(|| LedgerError::LogState("log is not accepting writes".to_string()))?;

        tx.send(event)
            .map_err(|_| LedgerError::LogState("background writer has stopped".to_string()))
    }

    pub(crate) fn errors(&self) -> Receiver<LedgerError> {
        self.errors_rx.clone()
    }

    pub(crate) fn last_sequence(&self) -> u64 {
        self.last_sequence.load(Ordering::Acquire)
    }

    /// Shared counter for a replay scan to record the highest sequence seen
    pub(crate) fn sequence_tracker(&self) -> Arc<AtomicU64> {
        Arc::clone(&self.last_sequence)
    }

    pub(crate) fn ensure_replayable(&self) -> Result<()> {
        match *self.phase.lock() {
            Phase::Idle => Ok(()),
            Phase::Running => Err(LedgerError::LogState(
                "replay is not available after start".to_string(),
            )),
            Phase::Closed => Err(LedgerError::LogState("log is closed".to_string())),
        }
    }

    /// Spawn the background writer around `sink`
    pub(crate) fn start<S: EventSink>(&self, name: &str, sink: S) -> Result<()> {
        let mut phase = self.phase.lock();
        if *phase != Phase::Idle {
            return Err(LedgerError::LogState(format!(
                "cannot start a log that is {:?}",
                *phase
            )));
        }

        let errors_tx = self
            .errors_tx
            .lock()
            .take()
            .ok_or_else(|| LedgerError::LogState("error stream already taken".to_string()))?;

        let (events_tx, events_rx) = bounded(self.capacity);
        let last_sequence = Arc::clone(&self.last_sequence);

        let handle = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || run_writer(sink, events_rx, errors_tx, last_sequence))?;

        *self.events_tx.write() = Some(events_tx);
        *self.writer.lock() = Some(handle);
        *phase = Phase::Running;

        tracing::debug!(
            writer = name,
            capacity = self.capacity,
            last_sequence = self.last_sequence(),
            "Transaction log writer started"
        );
        Ok(())
    }

    /// Stop accepting events, let the writer drain the queue, join it
    pub(crate) fn close(&self) -> Result<()> {
        let mut phase = self.phase.lock();
        match *phase {
            Phase::Closed => return Ok(()),
            Phase::Idle => {
                self.errors_tx.lock().take();
                *phase = Phase::Closed;
                return Ok(());
            }
            Phase::Running => {}
        }

        // Dropping the only sender ends the writer's receive loop once the
        // queue is empty.
        self.events_tx.write().take();

        let handle = self.writer.lock().take();
        *phase = Phase::Closed;

        if let Some(handle) = handle {
            handle
                .join()
                .map_err(|_| LedgerError::LogState("background writer panicked".to_string()))?;
        }

        tracing::debug!(
            last_sequence = self.last_sequence(),
            "Transaction log writer drained"
        );
        Ok(())
    }
}

/// Writer loop: strictly FIFO, one event at a time
fn run_writer<S: EventSink>(
    mut sink: S,
    events: Receiver<Event>,
    errors: Sender<LedgerError>,
    last_sequence: Arc<AtomicU64>,
) {
    for mut event in events.iter() {
        match sink.append(&mut event) {
            Ok(()) => {
                last_sequence.store(event.sequence, Ordering::Release);
                tracing::trace!(sequence = event.sequence, key = %event.key, "Event committed");
            }
            Err(e) => {
                let failure = LedgerError::DurableWrite(format!(
                    "{:?} of key '{}' not persisted: {}",
                    event.kind, event.key, e
                ));
                // Nobody listening is not the writer's problem.
                let _ = errors.send(failure);
            }
        }
    }

    if let Err(e) = sink.finish() {
        let _ = errors.send(LedgerError::DurableWrite(format!(
            "final flush failed: {}",
            e
        )));
    }
}
