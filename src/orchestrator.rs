// src/orchestrator.rs

use std::{
    collections::HashSet,
    fmt::Debug,
    sync::{Mutex, PoisonError},
    thread,
    time::{Duration, Instant},
};

use anyhow::Error;
use crossbeam::channel;

/// Progress sink receiving a status message and a percentage.
pub type ProgressCallback<'a> = &'a dyn Fn(&str, u8);

/// Represents the result of a processed task.
#[derive(Debug)]
pub struct TaskResult<K, T> {
    pub id: K,
    pub outcome: Result<T, Error>,
}

impl<K, T> TaskResult<K, T> {
    pub fn success(&self) -> bool {
        self.outcome.is_ok()
    }
}

/// Runs work on background threads and hands results back over a channel.
///
/// Workers are fire-and-forget: there is no cancellation, and a worker that
/// outlives its caller's deadline simply has its result discarded.
pub struct TaskOrchestrator<K, T> {
    result_receiver: channel::Receiver<TaskResult<K, T>>,
    result_sender: channel::Sender<TaskResult<K, T>>,
}

impl<K, T> Default for TaskOrchestrator<K, T>
where
    K: Debug + Send + 'static,
    T: Send + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

impl<K, T> TaskOrchestrator<K, T>
where
    K: Debug + Send + 'static,
    T: Send + 'static,
{
    /// Creates a new TaskOrchestrator.
    pub fn new() -> Self {
        let (result_sender, result_receiver) = channel::unbounded::<TaskResult<K, T>>();
        Self {
            result_sender,
            result_receiver,
        }
    }

    /// Submits a new task to be processed on its own thread.
    pub fn submit<F>(&self, id: K, task: F)
    where
        F: FnOnce() -> Result<T, Error> + Send + 'static,
    {
        let result_sender = self.result_sender.clone();
        thread::spawn(move || {
            let outcome = task();
            if let Err(e) = result_sender.send(TaskResult { id, outcome }) {
                tracing::error!("Failed to send result: {:?}", e.into_inner().id);
            }
        });
    }

    /// Attempts to receive a task result without blocking.
    pub fn try_recv_result(&self) -> Option<TaskResult<K, T>> {
        self.result_receiver.try_recv().ok()
    }

    /// Waits for a result until `deadline`, returning `None` once it passes.
    pub fn recv_result_until(&self, deadline: Instant) -> Option<TaskResult<K, T>> {
        self.result_receiver.recv_deadline(deadline).ok()
    }

    /// Collects up to `expected` results, giving up once `timeout` elapses.
    pub fn collect(&self, expected: usize, timeout: Duration) -> Vec<TaskResult<K, T>> {
        let deadline = Instant::now() + timeout;
        let mut results = Vec::with_capacity(expected);
        while results.len() < expected {
            match self.recv_result_until(deadline) {
                Some(result) => results.push(result),
                None => {
                    tracing::warn!(
                        "Timed out waiting for tasks: {} of {} finished",
                        results.len(),
                        expected
                    );
                    break;
                }
            }
        }
        results
    }
}

/// Names of operations currently in flight, e.g. tools being installed.
///
/// Passed by reference to whoever starts such an operation; [`TaskRegistry::begin`]
/// refuses a second concurrent operation under the same name.
#[derive(Debug, Default)]
pub struct TaskRegistry {
    active: Mutex<HashSet<String>>,
}

/// Marks a name as in flight until dropped.
#[derive(Debug)]
pub struct TaskGuard<'a> {
    registry: &'a TaskRegistry,
    name: String,
}

impl TaskRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `name`, or returns `None` if it is already in flight.
    pub fn begin(&self, name: &str) -> Option<TaskGuard<'_>> {
        let mut active = self.active.lock().unwrap_or_else(PoisonError::into_inner);
        if !active.insert(name.to_string()) {
            return None;
        }
        Some(TaskGuard {
            registry: self,
            name: name.to_string(),
        })
    }

    pub fn is_active(&self, name: &str) -> bool {
        self.active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains(name)
    }

    pub fn active(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .cloned()
            .collect();
        names.sort();
        names
    }
}

impl Drop for TaskGuard<'_> {
    fn drop(&mut self) {
        self.registry
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&self.name);
    }
}
