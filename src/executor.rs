//! Background worker for OS calls that must not block the UI loop.
//!
//! Jobs run in submission order on one thread. Results come back to the UI loop through calloop
//! channels owned by whoever submitted the job.

#[cfg(test)]
use std::collections::VecDeque;
#[cfg(test)]
use std::sync::{Arc, Mutex, PoisonError};
use std::thread;

use anyhow::Context;
use tracing::{debug, warn};

type Job = Box<dyn FnOnce() + Send>;

#[derive(Clone)]
pub struct BackgroundExecutor {
    inner: Inner,
}

#[derive(Clone)]
enum Inner {
    Thread(async_channel::Sender<Job>),
    /// Runs every job on the calling thread. Replies still go through the channels, so they
    /// arrive on the next loop turn.
    Immediate,
    /// Holds jobs until [`BackgroundExecutor::run_pending`] is called.
    #[cfg(test)]
    Queued(Arc<Mutex<VecDeque<Job>>>),
}

impl BackgroundExecutor {
    pub fn spawn(name: &str) -> anyhow::Result<Self> {
        let (tx, rx) = async_channel::unbounded::<Job>();

        let thread_name = name.to_owned();
        thread::Builder::new()
            .name(thread_name.clone())
            .spawn(move || {
                while let Ok(job) = rx.recv_blocking() {
                    let _span = tracy_client::span!("BackgroundExecutor job");
                    job();
                }
                debug!("{thread_name}: all senders dropped, stopping");
            })
            .context("error spawning the background thread")?;

        Ok(Self {
            inner: Inner::Thread(tx),
        })
    }

    pub fn immediate() -> Self {
        Self {
            inner: Inner::Immediate,
        }
    }

    #[cfg(test)]
    pub fn queued() -> Self {
        Self {
            inner: Inner::Queued(Arc::default()),
        }
    }

    /// Runs queued jobs, including ones they queue, and returns how many ran.
    #[cfg(test)]
    pub fn run_pending(&self) -> usize {
        let Inner::Queued(queue) = &self.inner else {
            return 0;
        };

        let mut ran = 0;
        loop {
            let job = queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .pop_front();
            let Some(job) = job else {
                return ran;
            };
            job();
            ran += 1;
        }
    }

    pub fn execute(&self, job: impl FnOnce() + Send + 'static) {
        match &self.inner {
            Inner::Thread(tx) => {
                if tx.send_blocking(Box::new(job)).is_err() {
                    warn!("background thread is gone, dropping job");
                }
            }
            Inner::Immediate => job(),
            #[cfg(test)]
            Inner::Queued(queue) => queue
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push_back(Box::new(job)),
        }
    }
}

impl std::fmt::Debug for BackgroundExecutor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.inner {
            Inner::Thread(_) => f.write_str("BackgroundExecutor::Thread"),
            Inner::Immediate => f.write_str("BackgroundExecutor::Immediate"),
            #[cfg(test)]
            Inner::Queued(_) => f.write_str("BackgroundExecutor::Queued"),
        }
    }
}
