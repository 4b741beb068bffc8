//! Process-wide FIFO queue in front of the writer thread.
//!
//! Producers only ever `try_send`, so they never wait on disk I/O. With a
//! bounded capacity a full queue drops the newest block instead of blocking.
//!
//! The consumer runs on a dedicated thread under a supervisor: if it panics,
//! the fault is logged, the old queue and everything still in it is
//! discarded, and a fresh queue and consumer take over.

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, info, warn};

use super::command::{ShutdownReport, WriteCommand};
use super::consumer::WriterConsumer;
use crate::error::{LoggerError, Result};
use crate::sessions::SessionRegistry;

/// Extra time granted past the drain deadline for the final acknowledgement.
const SHUTDOWN_GRACE: Duration = Duration::from_millis(250);

/// Drain timeout used when the queue is dropped without an explicit shutdown.
const DROP_DRAIN_TIMEOUT: Duration = Duration::from_secs(2);

const WRITER_THREAD_NAME: &str = "execlog-writer";

/// Counters shared between the queue handle and the consumer.
#[derive(Debug, Default)]
pub(crate) struct Shared {
    pub(crate) drain_deadline: Mutex<Option<Instant>>,
    pub(crate) written: AtomicU64,
    pub(crate) failed: AtomicU64,
    pub(crate) rejected: AtomicU64,
    pub(crate) discarded: AtomicU64,
    pub(crate) restarts: AtomicU64,
    stopping: AtomicBool,
}

/// Snapshot of writer activity.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WriterStats {
    /// Blocks written and flushed.
    pub written: u64,
    /// Blocks dropped because the write or open failed.
    pub failed: u64,
    /// Blocks refused at enqueue (queue full or writer stopped).
    pub rejected: u64,
    /// Blocks discarded at shutdown after the drain deadline.
    pub discarded: u64,
    /// Consumer restarts after a fault.
    pub restarts: u64,
}

type Sender = flume::Sender<WriteCommand>;

fn channel(capacity: Option<usize>) -> (Sender, flume::Receiver<WriteCommand>) {
    match capacity {
        Some(n) => flume::bounded(n),
        None => flume::unbounded(),
    }
}

/// Handle to the writer thread and its queue.
pub(crate) struct WriterQueue {
    sender: Arc<RwLock<Option<Sender>>>,
    shared: Arc<Shared>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl WriterQueue {
    /// Start the writer thread.
    pub(crate) fn start(
        registry: Arc<SessionRegistry>,
        capacity: Option<usize>,
        echo: bool,
    ) -> Result<Self> {
        let shared = Arc::new(Shared::default());
        let (tx, rx) = channel(capacity);
        let sender = Arc::new(RwLock::new(Some(tx)));

        let thread = {
            let sender = Arc::clone(&sender);
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name(WRITER_THREAD_NAME.to_string())
                .spawn(move || supervise(rx, registry, sender, shared, capacity, echo))
                .map_err(|e| {
                    error!(error = %e, "Failed to spawn session log writer");
                    LoggerError::WriterStopped
                })?
        };

        debug!(capacity = ?capacity, "Session log writer started");
        Ok(Self {
            sender,
            shared,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Offer a command to the queue without blocking.
    ///
    /// Returns `false` when the command was refused; the refusal has already
    /// been reported.
    pub(crate) fn enqueue(&self, command: WriteCommand) -> bool {
        let guard = self.sender.read();
        let Some(tx) = guard.as_ref() else {
            self.shared.rejected.fetch_add(1, Ordering::Relaxed);
            warn!("Session log writer is stopped; block dropped");
            return false;
        };

        match tx.try_send(command) {
            Ok(()) => true,
            Err(flume::TrySendError::Full(_)) => {
                self.shared.rejected.fetch_add(1, Ordering::Relaxed);
                warn!(capacity = ?tx.capacity(), "Session log queue is full; block dropped");
                false
            }
            Err(flume::TrySendError::Disconnected(_)) => {
                self.shared.rejected.fetch_add(1, Ordering::Relaxed);
                warn!("Session log writer is gone; block dropped");
                false
            }
        }
    }

    /// Wait until everything enqueued before this call has been handled.
    ///
    /// Returns `false` on timeout or if the writer is not running.
    pub fn barrier(&self, timeout: Duration) -> bool {
        // The lock must not be held while waiting for room in the queue.
        let Some(tx) = self.sender.read().clone() else {
            return false;
        };
        let (ack_tx, ack_rx) = flume::bounded(1);
        let queued = tx.send_timeout(WriteCommand::Barrier(ack_tx), timeout).is_ok();
        queued && ack_rx.recv_timeout(timeout).is_ok()
    }

    /// Drain the queue for at most `timeout`, close every session file and
    /// stop the writer thread.
    ///
    /// Blocks still queued when the deadline passes are discarded and
    /// counted. Calling this more than once returns a default report.
    pub fn shutdown(&self, timeout: Duration) -> ShutdownReport {
        let Some(handle) = self.thread.lock().take() else {
            return ShutdownReport::default();
        };

        self.shared.stopping.store(true, Ordering::SeqCst);
        *self.shared.drain_deadline.lock() = Some(Instant::now() + timeout);

        // Producers see the writer as stopped from here on. The lock is
        // released before the send, which may wait for a full queue to drain.
        let tx = self.sender.write().take();
        let (ack_tx, ack_rx) = flume::bounded(1);
        let queued = match tx {
            Some(tx) => tx.send_timeout(WriteCommand::Shutdown(ack_tx), timeout).is_ok(),
            None => false,
        };

        let report = if queued {
            ack_rx.recv_timeout(timeout + SHUTDOWN_GRACE).ok()
        } else {
            None
        };

        match report {
            Some(report) => {
                let _ = handle.join();
                if report.discarded > 0 {
                    warn!(
                        discarded = report.discarded,
                        "Session log drain deadline passed; queued blocks discarded"
                    );
                }
                info!(closed_files = report.closed_files, "Session log writer stopped");
                report
            }
            None => {
                warn!(
                    timeout_ms = timeout.as_millis() as u64,
                    "Session log writer did not stop in time; remaining blocks abandoned"
                );
                ShutdownReport {
                    completed: false,
                    discarded: self.shared.discarded.load(Ordering::Relaxed),
                    closed_files: 0,
                }
            }
        }
    }

    pub fn is_running(&self) -> bool {
        self.sender.read().is_some()
    }

    pub fn stats(&self) -> WriterStats {
        WriterStats {
            written: self.shared.written.load(Ordering::Relaxed),
            failed: self.shared.failed.load(Ordering::Relaxed),
            rejected: self.shared.rejected.load(Ordering::Relaxed),
            discarded: self.shared.discarded.load(Ordering::Relaxed),
            restarts: self.shared.restarts.load(Ordering::Relaxed),
        }
    }
}

impl Drop for WriterQueue {
    fn drop(&mut self) {
        if self.thread.lock().is_some() {
            self.shutdown(DROP_DRAIN_TIMEOUT);
        }
    }
}

/// Run consumers until one exits normally, replacing the queue after each
/// fault.
fn supervise(
    mut rx: flume::Receiver<WriteCommand>,
    registry: Arc<SessionRegistry>,
    sender: Arc<RwLock<Option<Sender>>>,
    shared: Arc<Shared>,
    capacity: Option<usize>,
    echo: bool,
) {
    loop {
        let outcome = panic::catch_unwind(AssertUnwindSafe(|| {
            WriterConsumer::new(Arc::clone(&registry), Arc::clone(&shared), echo).run(&rx)
        }));

        let Err(payload) = outcome else {
            return;
        };

        let restarts = shared.restarts.fetch_add(1, Ordering::Relaxed) + 1;
        if shared.stopping.load(Ordering::SeqCst) {
            error!(
                panic = %panic_message(&*payload),
                "Session log writer faulted during shutdown"
            );
            return;
        }

        let (tx, fresh_rx) = channel(capacity);
        let lost = {
            let mut guard = sender.write();
            // Swap while holding the lock so no producer enqueues into the
            // old queue after it has been counted.
            *guard = Some(tx);
            rx.len()
        };
        rx = fresh_rx;

        error!(
            restart = restarts,
            lost_blocks = lost,
            panic = %panic_message(&*payload),
            "Session log writer faulted; restarted with a fresh queue"
        );
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sessions::{Created, SessionKey};
    use std::path::{Path, PathBuf};
    use tempfile::tempdir;

    const WAIT: Duration = Duration::from_secs(5);

    fn header(
        registry: &SessionRegistry,
        queue: &WriterQueue,
        root: &Path,
        id: &str,
    ) -> (SessionKey, PathBuf) {
        let mut key = None;
        let created = registry.create_with(id, Default::default(), root, |s| {
            key = Some(s.key);
            assert!(queue.enqueue(WriteCommand::Header {
                key: s.key,
                text: format!("HEADER {id}\n"),
            }));
        });
        let Created::New(path) = created else {
            panic!("expected new session");
        };
        (key.unwrap(), path)
    }

    fn entry(key: SessionKey, text: &str) -> WriteCommand {
        WriteCommand::Entry {
            key,
            text: format!("{text}\n"),
            echo: text.to_string(),
        }
    }

    #[test]
    fn test_writes_in_fifo_order() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let queue = WriterQueue::start(Arc::clone(&registry), None, false).unwrap();

        let (key, path) = header(&registry, &queue, dir.path(), "s1");
        for i in 0..50 {
            assert!(queue.enqueue(entry(key, &format!("line {i}"))));
        }
        assert!(queue.barrier(WAIT));

        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines[0], "HEADER s1");
        for (i, line) in lines[1..].iter().enumerate() {
            assert_eq!(*line, format!("line {i}"));
        }
        assert_eq!(registry.by_key(key).unwrap().entry_count, 50);
        assert_eq!(queue.stats().written, 51);
    }

    #[test]
    fn test_restart_after_fault() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let queue = WriterQueue::start(Arc::clone(&registry), None, false).unwrap();

        let (key, path) = header(&registry, &queue, dir.path(), "s1");
        assert!(queue.enqueue(entry(key, "before")));
        assert!(queue.barrier(WAIT));

        assert!(queue.enqueue(WriteCommand::Crash));
        // Wait for the supervisor to install the fresh queue.
        let deadline = Instant::now() + WAIT;
        while queue.stats().restarts == 0 && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(queue.stats().restarts, 1);

        // The swap happens right after the counter moves; retry until the
        // new queue accepts work.
        let deadline = Instant::now() + WAIT;
        while !queue.barrier(Duration::from_millis(50)) && Instant::now() < deadline {}

        assert!(queue.enqueue(entry(key, "after")));
        assert!(queue.barrier(WAIT));

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.contains("before\n"));
        assert!(content.ends_with("after\n"));
        assert!(queue.is_running());
    }

    #[test]
    fn test_bounded_queue_rejects_when_full() {
        let registry = Arc::new(SessionRegistry::new());
        let queue = WriterQueue::start(Arc::clone(&registry), Some(1), false).unwrap();

        // Park the consumer on a barrier nobody reads until the queue fills.
        let (ack_tx, ack_rx) = flume::bounded(0);
        assert!(queue.enqueue(WriteCommand::Barrier(ack_tx)));

        let mut refused = 0;
        for _ in 0..10 {
            if !queue.enqueue(WriteCommand::Barrier(flume::bounded(1).0)) {
                refused += 1;
            }
        }
        assert!(refused >= 8);
        assert_eq!(queue.stats().rejected, refused);
        assert!(ack_rx.recv_timeout(WAIT).is_ok());
    }

    #[test]
    fn test_shutdown_closes_and_stops() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let queue = WriterQueue::start(Arc::clone(&registry), None, false).unwrap();

        let (key, path) = header(&registry, &queue, dir.path(), "s1");
        assert!(queue.enqueue(entry(key, "last")));

        let report = queue.shutdown(WAIT);
        assert!(report.completed);
        assert_eq!(report.discarded, 0);
        assert_eq!(report.closed_files, 1);
        assert!(std::fs::read_to_string(&path).unwrap().ends_with("last\n"));

        assert!(!queue.is_running());
        assert!(!queue.enqueue(entry(key, "late")));
        assert_eq!(queue.shutdown(WAIT), ShutdownReport::default());
    }

    #[test]
    fn test_shutdown_deadline_discards() {
        let dir = tempdir().unwrap();
        let registry = Arc::new(SessionRegistry::new());
        let queue = WriterQueue::start(Arc::clone(&registry), None, false).unwrap();
        let (key, _path) = header(&registry, &queue, dir.path(), "s1");
        assert!(queue.barrier(WAIT));

        // Hold the consumer on a rendezvous barrier while entries pile up.
        let (ack_tx, ack_rx) = flume::bounded(0);
        assert!(queue.enqueue(WriteCommand::Barrier(ack_tx)));
        for i in 0..20 {
            assert!(queue.enqueue(entry(key, &format!("queued {i}"))));
        }

        let release = thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            let _ = ack_rx.recv();
        });

        let report = queue.shutdown(Duration::from_millis(10));
        release.join().unwrap();

        assert!(report.completed);
        assert_eq!(report.discarded, 20);
        assert_eq!(registry.by_key(key).unwrap().entry_count, 0);
    }
}
