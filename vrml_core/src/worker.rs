use crate::sync::lock;
use std::io;
use std::sync::Mutex;
use std::thread::{self, JoinHandle};

/// Background threads owned by a scene or browser. Everything still running
/// is joined when the group is dropped.
#[derive(Default)]
pub struct WorkerGroup {
    handles: Mutex<Vec<JoinHandle<()>>>,
}

impl WorkerGroup {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn spawn(&self, name: &str, job: impl FnOnce() + Send + 'static) -> io::Result<()> {
        let handle = thread::Builder::new()
            .name(format!("vrml-{name}"))
            .spawn(job)?;
        let mut handles = lock(&self.handles);
        handles.retain(|h| !h.is_finished());
        handles.push(handle);
        Ok(())
    }

    /// Number of workers not yet finished.
    pub fn active(&self) -> usize {
        lock(&self.handles)
            .iter()
            .filter(|h| !h.is_finished())
            .count()
    }

    /// Wait for every worker, including ones started while waiting. A worker
    /// never waits for itself.
    pub fn join_all(&self) {
        let current = thread::current().id();
        loop {
            let handles: Vec<JoinHandle<()>> = std::mem::take(&mut *lock(&self.handles));
            if handles.is_empty() {
                return;
            }
            let mut joined = false;
            for handle in handles {
                if handle.thread().id() == current {
                    continue;
                }
                joined = true;
                if handle.join().is_err() {
                    log::error!("worker thread panicked");
                }
            }
            if !joined {
                return;
            }
        }
    }
}

impl Drop for WorkerGroup {
    fn drop(&mut self) {
        self.join_all();
    }
}
