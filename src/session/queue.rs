// SPDX-License-Identifier: GPL-3.0-only

//! Serialized execution contexts
//!
//! A [`SerialQueue`] is a named OS thread that owns a piece of state and
//! runs submitted jobs against it one at a time, in submission order. The
//! state never leaves the thread, so the only way to touch it is to
//! dispatch a job. Dropping the queue lets already submitted jobs finish,
//! then joins the thread.

use super::completion::Completion;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::JoinHandle;
use tracing::{debug, error, warn};

/// Work item run against the queue's state
pub type Job<S> = Box<dyn FnOnce(&mut S) + Send + 'static>;

enum Message<S> {
    Run(Job<S>),
    Shutdown,
}

/// Cloneable submitter for a [`SerialQueue`]
pub struct QueueHandle<S> {
    sender: Sender<Message<S>>,
    label: &'static str,
}

impl<S> Clone for QueueHandle<S> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            label: self.label,
        }
    }
}

impl<S> QueueHandle<S> {
    /// Enqueue `job`; returns false once the queue has shut down
    pub fn dispatch(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        let sent = self.sender.send(Message::Run(Box::new(job))).is_ok();
        if !sent {
            debug!(queue = self.label, "Job dropped, queue is shut down");
        }
        sent
    }

    /// Resolves once every job submitted before it has run
    pub fn barrier(&self) -> Completion<()> {
        let (resolver, completion) = Completion::pair();
        self.dispatch(move |_| resolver.resolve(Some(())));
        completion
    }
}

/// Dedicated thread owning state `S`
pub struct SerialQueue<S> {
    handle: QueueHandle<S>,
    thread: Option<JoinHandle<()>>,
}

impl<S: 'static> SerialQueue<S> {
    /// Spawn the queue thread and build its state there
    ///
    /// `init` runs on the new thread before any job and receives a handle
    /// to the queue itself, so the state can schedule follow-up work.
    pub fn spawn<F>(label: &'static str, init: F) -> std::io::Result<Self>
    where
        F: FnOnce(QueueHandle<S>) -> S + Send + 'static,
    {
        let (sender, receiver) = mpsc::channel();
        let handle = QueueHandle { sender, label };
        let own_handle = handle.clone();

        let thread = std::thread::Builder::new()
            .name(label.to_string())
            .spawn(move || {
                let state = init(own_handle);
                drain(label, state, receiver);
            })?;

        debug!(queue = label, "Serial queue started");
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> QueueHandle<S> {
        self.handle.clone()
    }

    pub fn dispatch(&self, job: impl FnOnce(&mut S) + Send + 'static) -> bool {
        self.handle.dispatch(job)
    }

    pub fn barrier(&self) -> Completion<()> {
        self.handle.barrier()
    }

    /// Whether the caller is running on this queue's thread
    pub fn is_current(&self) -> bool {
        self.thread
            .as_ref()
            .is_some_and(|thread| thread.thread().id() == std::thread::current().id())
    }
}

impl<S> Drop for SerialQueue<S> {
    fn drop(&mut self) {
        let _ = self.handle.sender.send(Message::Shutdown);
        let Some(thread) = self.thread.take() else {
            return;
        };
        // Joining from the queue's own thread would deadlock
        if thread.thread().id() == std::thread::current().id() {
            warn!(queue = self.handle.label, "Queue dropped from its own thread, detaching");
            return;
        }
        if thread.join().is_err() {
            error!(queue = self.handle.label, "Queue thread panicked");
        }
    }
}

fn drain<S>(label: &'static str, mut state: S, receiver: Receiver<Message<S>>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(job) => {
                let outcome = panic::catch_unwind(AssertUnwindSafe(|| job(&mut state)));
                if outcome.is_err() {
                    error!(queue = label, "Job panicked, continuing with next job");
                }
            }
            Message::Shutdown => break,
        }
    }
    debug!(queue = label, "Serial queue stopped");
}
