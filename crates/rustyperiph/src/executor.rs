//! Single serialized execution context
//!
//! Registration, attribute dispatch and change notification all run on one
//! executor thread. Work from any other thread is handed off as a job and
//! runs in submission order. A job that panics is reported and the executor
//! keeps serving.

use crate::error::{Error, Result};
use log::{debug, error};
use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::mpsc::{self, Receiver, Sender};
use std::thread::{self, JoinHandle, ThreadId};

type Job = Box<dyn FnOnce() + Send + 'static>;

enum Message {
    Run(Job),
    Shutdown,
}

/// Owns the executor thread; dropping it drains queued jobs and joins.
pub struct SerialExecutor {
    handle: ExecutorHandle,
    thread: Option<JoinHandle<()>>,
}

/// Cloneable handle for submitting work to a [`SerialExecutor`]
#[derive(Clone)]
pub struct ExecutorHandle {
    sender: Sender<Message>,
    thread_id: ThreadId,
}

impl SerialExecutor {
    /// Starts the executor thread.
    pub fn spawn(name: &str) -> Result<Self> {
        let (sender, receiver) = mpsc::channel();
        let thread = thread::Builder::new()
            .name(name.to_string())
            .spawn(move || serve(receiver))?;

        let handle = ExecutorHandle {
            sender,
            thread_id: thread.thread().id(),
        };

        debug!("Serial executor '{}' started", name);
        Ok(Self {
            handle,
            thread: Some(thread),
        })
    }

    pub fn handle(&self) -> ExecutorHandle {
        self.handle.clone()
    }

    /// Stops accepting work after the jobs already queued and joins the thread.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        if let Some(thread) = self.thread.take() {
            let _ = self.handle.sender.send(Message::Shutdown);
            if thread.join().is_err() {
                error!("Serial executor thread terminated abnormally");
            }
        }
    }
}

impl Drop for SerialExecutor {
    fn drop(&mut self) {
        self.stop();
    }
}

impl ExecutorHandle {
    /// True when called from the executor thread itself.
    pub fn is_current(&self) -> bool {
        thread::current().id() == self.thread_id
    }

    /// Queues `job` behind everything already submitted.
    pub fn submit<F>(&self, job: F) -> Result<()>
    where
        F: FnOnce() + Send + 'static,
    {
        self.sender
            .send(Message::Run(Box::new(job)))
            .map_err(|_| Error::ExecutorClosed)
    }

    /// Runs `job` on the executor and waits for its result. Runs inline when
    /// already on the executor so a job may call back into it.
    pub fn call<F, R>(&self, job: F) -> Result<R>
    where
        F: FnOnce() -> R + Send + 'static,
        R: Send + 'static,
    {
        if self.is_current() {
            return Ok(job());
        }

        let (tx, rx) = mpsc::sync_channel(1);
        self.submit(move || {
            let outcome = panic::catch_unwind(AssertUnwindSafe(job))
                .map_err(|payload| panic_message(payload.as_ref()));
            let _ = tx.send(outcome);
        })?;

        match rx.recv() {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(message)) => Err(Error::Internal(message)),
            Err(_) => Err(Error::ExecutorClosed),
        }
    }
}

fn serve(receiver: Receiver<Message>) {
    while let Ok(message) = receiver.recv() {
        match message {
            Message::Run(job) => {
                if let Err(payload) = panic::catch_unwind(AssertUnwindSafe(job)) {
                    error!(
                        "Executor job panicked: {}",
                        panic_message(payload.as_ref())
                    );
                }
            }
            Message::Shutdown => break,
        }
    }
    debug!("Serial executor stopped");
}

/// Best-effort text of a panic payload.
pub(crate) fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
