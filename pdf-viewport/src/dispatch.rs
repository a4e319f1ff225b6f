//! Running rasterization off the interactive thread.
//!
//! The viewport hands each render to a [`RenderDispatch`] together with the
//! sender half of its outcome channel. Whatever thread executes the job sends
//! back a [`RenderOutcome`]; the viewport drains those on its own thread and
//! decides whether each one is still wanted.

use crate::document::{render_checked, Document, PixelBuffer, RenderRequest};
use crate::error::RenderError;
use crate::frames::Ticket;
use crate::layout::PixelSize;
use std::sync::{mpsc, Arc, Mutex};
use std::thread::{self, JoinHandle};
use tokio::sync::mpsc::UnboundedSender;
use tracing::{debug, trace, warn};

pub type OutcomeSender = UnboundedSender<RenderOutcome>;

/// One rasterization to perform for a slot.
#[derive(Clone)]
pub struct RenderJob {
    pub ticket: Ticket,
    pub slot: usize,
    pub request: RenderRequest,
    pub document: Arc<dyn Document>,
}

impl RenderJob {
    /// Rasterize synchronously on the calling thread.
    pub fn execute(self) -> RenderOutcome {
        let request = self.request;
        let result = render_checked(self.document.as_ref(), &request);
        RenderOutcome {
            ticket: self.ticket,
            slot: self.slot,
            page: request.page,
            size: request.size,
            result,
        }
    }
}

/// A finished render on its way back to the interactive owner.
#[derive(Debug)]
pub struct RenderOutcome {
    pub ticket: Ticket,
    pub slot: usize,
    pub page: usize,
    pub size: PixelSize,
    pub result: Result<PixelBuffer, RenderError>,
}

/// Executes render jobs somewhere and reports the outcome on `outcomes`.
pub trait RenderDispatch: Send {
    fn dispatch(&self, job: RenderJob, outcomes: &OutcomeSender);
}

/// Renders on the calling thread. Outcomes still go through the channel, so
/// they are installed on the next poll like any other result.
#[derive(Debug, Default, Clone, Copy)]
pub struct InlineDispatch;

impl RenderDispatch for InlineDispatch {
    fn dispatch(&self, job: RenderJob, outcomes: &OutcomeSender) {
        let _ = outcomes.send(job.execute());
    }
}

type QueuedJob = (RenderJob, OutcomeSender);

/// A fixed set of render threads pulling from one job queue.
pub struct WorkerPool {
    jobs: Option<mpsc::Sender<QueuedJob>>,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    pub fn new(num_workers: usize) -> Self {
        let (jobs, queue) = mpsc::channel::<QueuedJob>();
        let queue = Arc::new(Mutex::new(queue));
        let workers = (0..num_workers.max(1))
            .filter_map(|id| {
                let queue = Arc::clone(&queue);
                thread::Builder::new()
                    .name(format!("render-worker-{id}"))
                    .spawn(move || worker_loop(id, &queue))
                    .map_err(|e| warn!(worker = id, error = %e, "failed to spawn render worker"))
                    .ok()
            })
            .collect();

        Self {
            jobs: Some(jobs),
            workers,
        }
    }

    pub fn num_workers(&self) -> usize {
        self.workers.len()
    }
}

fn worker_loop(id: usize, queue: &Mutex<mpsc::Receiver<QueuedJob>>) {
    debug!(worker = id, "render worker started");
    loop {
        let next = match queue.lock() {
            Ok(receiver) => receiver.recv(),
            Err(_) => break,
        };
        let Ok((job, outcomes)) = next else {
            break;
        };
        trace!(worker = id, page = job.request.page, ticket = job.ticket, "rendering");
        // The viewport may be gone; nobody is waiting for this result then.
        let _ = outcomes.send(job.execute());
    }
    debug!(worker = id, "render worker stopped");
}

impl RenderDispatch for WorkerPool {
    fn dispatch(&self, job: RenderJob, outcomes: &OutcomeSender) {
        let queued = match &self.jobs {
            Some(jobs) => jobs.send((job, outcomes.clone())),
            None => return,
        };
        if let Err(mpsc::SendError((job, outcomes))) = queued {
            let page = job.request.page;
            let _ = outcomes.send(RenderOutcome {
                ticket: job.ticket,
                slot: job.slot,
                page,
                size: job.request.size,
                result: Err(RenderError::Disconnected(page)),
            });
        }
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Closing the queue lets each worker finish its job and exit.
        self.jobs.take();
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("render worker panicked");
            }
        }
    }
}
