use std::collections::HashMap;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use parking_lot::{Condvar, Mutex, RwLock};
use tracing::{debug, warn};

use crate::process::{ManagedProcess, Pid, ProcessInfo};

/// `pid -> ManagedProcess`, shared between the shell and its cleanup worker.
///
/// Lookups clone the `Arc` under the read lock and release it before
/// delegating, so a slow process call never blocks the table.
#[derive(Default)]
pub struct ProcessTable {
    processes: RwLock<HashMap<Pid, Arc<ManagedProcess>>>,
}

impl ProcessTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, process: Arc<ManagedProcess>) {
        let replaced = self.processes.write().insert(process.pid(), process);
        drop(replaced);
    }

    pub fn get(&self, pid: Pid) -> Option<Arc<ManagedProcess>> {
        self.processes.read().get(&pid).cloned()
    }

    pub fn remove(&self, pid: Pid) -> Option<Arc<ManagedProcess>> {
        self.processes.write().remove(&pid)
    }

    pub fn infos(&self) -> Vec<ProcessInfo> {
        let processes: Vec<_> = self.processes.read().values().cloned().collect();
        let mut infos: Vec<_> = processes.iter().map(|p| p.get_info()).collect();
        infos.sort_by_key(|info| info.pid);
        infos
    }

    pub fn len(&self) -> usize {
        self.processes.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.processes.read().is_empty()
    }

    /// Drops every finished entry, returning how many went.
    ///
    /// Dropping the last handle joins the monitor thread, so the entries are
    /// released only after the write lock is.
    pub fn sweep(&self) -> usize {
        let finished: Vec<Arc<ManagedProcess>> = {
            let mut processes = self.processes.write();
            let pids: Vec<Pid> = processes
                .iter()
                .filter(|(_, process)| process.is_complete())
                .map(|(&pid, _)| pid)
                .collect();
            pids.iter().filter_map(|pid| processes.remove(pid)).collect()
        };
        let removed = finished.len();
        drop(finished);
        removed
    }

    /// Empties the table and hands back what was in it.
    pub fn drain(&self) -> Vec<Arc<ManagedProcess>> {
        self.processes.write().drain().map(|(_, p)| p).collect()
    }
}

struct StopSignal {
    stopped: Mutex<bool>,
    wake: Condvar,
}

/// Periodic [`ProcessTable::sweep`] on its own thread.
pub struct CleanupWorker {
    stop: Arc<StopSignal>,
    thread: Option<JoinHandle<()>>,
}

impl CleanupWorker {
    pub fn spawn(table: Arc<ProcessTable>, interval: Duration) -> Self {
        let stop = Arc::new(StopSignal {
            stopped: Mutex::new(false),
            wake: Condvar::new(),
        });

        let signal = Arc::clone(&stop);
        let thread = thread::Builder::new()
            .name("process-cleanup".into())
            .spawn(move || {
                loop {
                    {
                        let mut stopped = signal.stopped.lock();
                        if !*stopped {
                            signal.wake.wait_for(&mut stopped, interval);
                        }
                        if *stopped {
                            break;
                        }
                    }
                    let removed = table.sweep();
                    if removed > 0 {
                        debug!(removed, remaining = table.len(), "swept finished processes");
                    }
                }
            });

        let thread = match thread {
            Ok(thread) => Some(thread),
            Err(e) => {
                warn!(error = %e, "cleanup thread not started");
                None
            }
        };

        Self { stop, thread }
    }

    pub fn is_running(&self) -> bool {
        self.thread.is_some()
    }

    /// Wakes the worker and joins it. Safe to call more than once.
    pub fn stop(&mut self) {
        *self.stop.stopped.lock() = true;
        self.stop.wake.notify_all();
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

impl Drop for CleanupWorker {
    fn drop(&mut self) {
        self.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryManager;
    use std::time::Instant;

    fn process(pid: Pid) -> Arc<ManagedProcess> {
        Arc::new(ManagedProcess::new(
            pid,
            "true",
            Vec::new(),
            Arc::new(MemoryManager::new()),
        ))
    }

    #[test]
    fn test_insert_get_remove() {
        let table = ProcessTable::new();
        table.insert(process(1000));
        table.insert(process(1001));

        assert_eq!(table.len(), 2);
        assert_eq!(table.get(1000).map(|p| p.pid()), Some(1000));
        assert!(table.get(7).is_none());
        assert!(table.remove(1000).is_some());
        assert_eq!(table.infos().len(), 1);
    }

    #[test]
    fn test_sweep_removes_only_finished() {
        let table = ProcessTable::new();
        let finished = process(1);
        finished.terminate(false);
        table.insert(finished);
        table.insert(process(2));

        assert_eq!(table.sweep(), 1);
        assert!(table.get(1).is_none());
        assert!(table.get(2).is_some());
    }

    #[test]
    fn test_worker_sweeps_and_stops() {
        let table = Arc::new(ProcessTable::new());
        let finished = process(1);
        finished.terminate(false);
        table.insert(finished);

        let mut worker = CleanupWorker::spawn(Arc::clone(&table), Duration::from_millis(10));
        assert!(worker.is_running());

        let deadline = Instant::now() + Duration::from_secs(2);
        while !table.is_empty() && Instant::now() < deadline {
            thread::sleep(Duration::from_millis(5));
        }
        assert!(table.is_empty());

        worker.stop();
        assert!(!worker.is_running());
        worker.stop();
    }
}
