use std::{
    sync::{
        atomic::{AtomicBool, Ordering},
        Arc,
    },
    thread::JoinHandle,
};

use parking_lot::Mutex;

use crate::AssetBuilder;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkerState {
    Idle,
    Running,
    Finished,
    Stopped,
}

impl WorkerState {
    /// Terminal states: no further entries can arrive until a restart.
    pub fn is_terminal(self) -> bool {
        matches!(self, WorkerState::Finished | WorkerState::Stopped)
    }
}

/// A build in flight.
///
/// Owned by exactly one place at a time: the pending queue, the worker
/// thread, the mountable queue or the manager's unresolved list.
pub struct Entry {
    pub vpath: String,
    pub builder: Box<dyn AssetBuilder>,
    /// Expansion tuples captured after a successful build.
    pub expanded: Vec<(String, String)>,
    /// Build failure, carried as data across the thread boundary.
    pub error: Option<String>,
}

impl Entry {
    pub fn new(vpath: impl Into<String>, builder: Box<dyn AssetBuilder>) -> Self {
        Self {
            vpath: vpath.into(),
            builder,
            expanded: Vec::new(),
            error: None,
        }
    }
}

/// Dedicated background thread draining the pending-build queue.
///
/// A run processes exactly the entries that were pending when it started;
/// submissions arriving mid-run wait for the next run. The queues are flume
/// channels, so nothing is ever locked across a `build()` call.
pub struct BuildWorker {
    pending_send: flume::Sender<Entry>,
    pending_recv: flume::Receiver<Entry>,
    mountable_send: flume::Sender<Entry>,
    mountable_recv: flume::Receiver<Entry>,
    state: Arc<Mutex<WorkerState>>,
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl BuildWorker {
    pub fn new() -> Self {
        let (pending_send, pending_recv) = flume::unbounded();
        let (mountable_send, mountable_recv) = flume::unbounded();
        Self {
            pending_send,
            pending_recv,
            mountable_send,
            mountable_recv,
            state: Arc::new(Mutex::new(WorkerState::Idle)),
            stop: Arc::new(AtomicBool::new(false)),
            handle: None,
        }
    }

    pub fn state(&self) -> WorkerState {
        *self.state.lock()
    }

    /// Entries submitted but not yet drawn into a run.
    pub fn pending_len(&self) -> usize {
        self.pending_recv.len()
    }

    /// Enqueues a build. Callable from any thread at any time, including
    /// while a run is in progress.
    pub fn submit(&self, vpath: impl Into<String>, builder: Box<dyn AssetBuilder>) {
        if self.pending_send.send(Entry::new(vpath, builder)).is_err() {
            log::error!(target: "AssetBuilder", "Failed to enqueue build entry");
        }
    }

    /// Non-blocking; pops one built entry if any is ready.
    pub fn poll_mountable(&self) -> Option<Entry> {
        self.mountable_recv.try_recv().ok()
    }

    /// Starts a run. No-op while already running; a finished thread is
    /// joined first to reclaim it.
    pub fn start(&mut self) {
        if self.state() == WorkerState::Running {
            return;
        }
        self.join();
        self.stop.store(false, Ordering::Relaxed);
        *self.state.lock() = WorkerState::Running;

        let pending = self.pending_recv.clone();
        let mountable = self.mountable_send.clone();
        let state = Arc::clone(&self.state);
        let stop = Arc::clone(&self.stop);
        let handle = std::thread::Builder::new()
            .name("AssetBuilder".into())
            .spawn(move || run_batch(pending, mountable, state, stop))
            .expect("failed to spawn asset build thread");
        self.handle = Some(handle);
    }

    /// Requests the current run to exit before its next entry. The build in
    /// flight is never interrupted.
    pub fn stop(&self) {
        self.stop.store(true, Ordering::Relaxed);
    }

    /// Blocks until the current run completes.
    pub fn join(&mut self) {
        if let Some(handle) = self.handle.take() {
            if handle.join().is_err() {
                log::error!(target: "AssetBuilder", "Build thread panicked");
                *self.state.lock() = WorkerState::Stopped;
            }
        }
    }
}

impl Default for BuildWorker {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for BuildWorker {
    fn drop(&mut self) {
        self.join();
    }
}

fn run_batch(
    pending: flume::Receiver<Entry>,
    mountable: flume::Sender<Entry>,
    state: Arc<Mutex<WorkerState>>,
    stop: Arc<AtomicBool>,
) {
    // Snapshot: entries submitted past this point wait for the next run.
    let batch = pending.len();

    for _ in 0..batch {
        if stop.load(Ordering::Relaxed) {
            *state.lock() = WorkerState::Stopped;
            return;
        }
        let Ok(mut entry) = pending.try_recv() else {
            break;
        };
        match entry.builder.build() {
            Ok(()) => {
                entry.expanded = entry.builder.expanded_assets().to_vec();
                entry.error = None;
            }
            Err(err) => entry.error = Some(format!("{:#}", err)),
        }
        // Failures travel through the same queue; they are never dropped here.
        if mountable.send(entry).is_err() {
            log::error!(target: "AssetBuilder", "Failed to enqueue mountable entry");
        }
    }
    *state.lock() = WorkerState::Finished;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Asset, AssetManager};

    struct InstantBuilder;

    impl AssetBuilder for InstantBuilder {
        fn build(&mut self) -> anyhow::Result<()> {
            Ok(())
        }
        fn mount(&mut self, _assets: &mut AssetManager, _vpath: &str) -> Option<Asset> {
            None
        }
    }

    struct FailingBuilder;

    impl AssetBuilder for FailingBuilder {
        fn build(&mut self) -> anyhow::Result<()> {
            Err(anyhow::anyhow!("This is definately a failure!").context("Well"))
        }
        fn mount(&mut self, _assets: &mut AssetManager, _vpath: &str) -> Option<Asset> {
            None
        }
    }

    /// Signals `started` when the build begins, then blocks on `gate`.
    struct GatedBuilder {
        started: flume::Sender<()>,
        gate: flume::Receiver<()>,
    }

    impl AssetBuilder for GatedBuilder {
        fn build(&mut self) -> anyhow::Result<()> {
            let _ = self.started.send(());
            let _ = self.gate.recv();
            Ok(())
        }
        fn mount(&mut self, _assets: &mut AssetManager, _vpath: &str) -> Option<Asset> {
            None
        }
    }

    #[test]
    fn idle_worker_has_nothing_mountable() {
        let worker = BuildWorker::new();
        assert_eq!(worker.state(), WorkerState::Idle);
        assert!(worker.poll_mountable().is_none());
    }

    #[test]
    fn run_builds_every_pending_entry() {
        let mut worker = BuildWorker::new();
        worker.submit("Test/A", Box::new(InstantBuilder));
        worker.submit("Test/B", Box::new(InstantBuilder));
        worker.start();
        worker.join();

        assert_eq!(worker.state(), WorkerState::Finished);
        assert_eq!(worker.poll_mountable().unwrap().vpath, "Test/A");
        assert_eq!(worker.poll_mountable().unwrap().vpath, "Test/B");
        assert!(worker.poll_mountable().is_none());
    }

    #[test]
    fn build_failure_is_carried_as_data() {
        let mut worker = BuildWorker::new();
        worker.submit("Test/Bad", Box::new(FailingBuilder));
        worker.start();
        worker.join();

        let entry = worker.poll_mountable().unwrap();
        assert_eq!(
            entry.error.as_deref(),
            Some("Well: This is definately a failure!")
        );
        assert!(entry.expanded.is_empty());
    }

    #[test]
    fn mid_run_submissions_wait_for_the_next_run() {
        let (open, gate) = flume::unbounded();
        let (started, started_recv) = flume::unbounded();

        let mut worker = BuildWorker::new();
        worker.submit(
            "Test/First",
            Box::new(GatedBuilder {
                started: started.clone(),
                gate: gate.clone(),
            }),
        );
        worker.start();
        // Once the build has begun the batch snapshot is already taken.
        started_recv.recv().unwrap();
        worker.submit("Test/Second", Box::new(GatedBuilder { started, gate }));
        open.send(()).unwrap();
        worker.join();

        assert_eq!(worker.state(), WorkerState::Finished);
        assert_eq!(worker.poll_mountable().unwrap().vpath, "Test/First");
        assert!(worker.poll_mountable().is_none());
        assert_eq!(worker.pending_len(), 1);

        open.send(()).unwrap();
        worker.start();
        // Restart resets the state before the new batch runs.
        worker.join();
        assert_eq!(worker.poll_mountable().unwrap().vpath, "Test/Second");
        assert_eq!(worker.pending_len(), 0);
    }

    #[test]
    fn stop_exits_between_entries() {
        let (open, gate) = flume::unbounded();
        let (started, started_recv) = flume::unbounded();

        let mut worker = BuildWorker::new();
        worker.submit(
            "Test/First",
            Box::new(GatedBuilder {
                started: started.clone(),
                gate: gate.clone(),
            }),
        );
        worker.submit("Test/Second", Box::new(GatedBuilder { started, gate }));
        worker.start();
        started_recv.recv().unwrap();
        worker.stop();
        open.send(()).unwrap();
        open.send(()).unwrap();
        worker.join();

        assert_eq!(worker.state(), WorkerState::Stopped);
        // The in-flight build still completed and was delivered.
        assert_eq!(worker.poll_mountable().unwrap().vpath, "Test/First");
        assert!(worker.poll_mountable().is_none());
        assert_eq!(worker.pending_len(), 1);
    }
}
