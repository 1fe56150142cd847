use crate::error::{GraphError, RunError};
use crate::graph::Graph;
use crate::runtime::{Firing, GraphHandler};
use crate::token::TokenVec;
use crate::types::NodeId;
use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TryRecvError};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use tracing::{debug, trace, warn};

type RunResult = Result<TokenVec, RunError>;

/// Executor configuration.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    /// Number of worker threads.
    pub workers: NonZeroUsize,
}

impl Default for ExecutorConfig {
    /// One worker per available hardware thread.
    fn default() -> Self {
        Self {
            workers: thread::available_parallelism().unwrap_or(NonZeroUsize::MIN),
        }
    }
}

impl ExecutorConfig {
    /// Configuration with an explicit worker count.
    pub fn with_workers(workers: NonZeroUsize) -> Self {
        Self { workers }
    }
}

/// Per-run ownership: the live graph clone plus the caller's completion
/// channel. Dropped (and the clone with it) once the last outstanding job
/// for the run finishes; dropping without completing resolves the future
/// with [`RunError::Shutdown`].
struct RunState {
    graph: GraphHandler,
    result: Sender<RunResult>,
}

impl RunState {
    fn complete(&self, result: RunResult) {
        // The receiver may be gone when the caller dropped the future.
        let _ = self.result.send(result);
    }
}

/// One unit of work: fire `node` within the given run.
struct Job {
    run: Arc<RunState>,
    node: NodeId,
}

/// Fixed-size worker pool executing graph runs.
///
/// Workers are symmetric and drain one shared FIFO job queue. Each
/// [`Executor::run`] clones the validated graph into fresh per-run state, so
/// any number of runs may be in flight concurrently over the same template.
///
/// Dropping the executor joins the workers; runs still in flight resolve
/// their futures with [`RunError::Shutdown`].
pub struct Executor {
    jobs: Sender<Job>,
    shutdown: Option<Sender<()>>,
    workers: Vec<JoinHandle<()>>,
}

impl Default for Executor {
    fn default() -> Self {
        Self::new(ExecutorConfig::default())
    }
}

impl Executor {
    /// Spawns the worker pool.
    pub fn new(config: ExecutorConfig) -> Self {
        let (jobs, incoming) = unbounded::<Job>();
        let (shutdown, stopping) = bounded::<()>(0);
        let workers = (0..config.workers.get())
            .map(|index| {
                let jobs = jobs.clone();
                let incoming = incoming.clone();
                let stopping = stopping.clone();
                thread::Builder::new()
                    .name(format!("mdf-worker-{index}"))
                    .spawn(move || worker_loop(index, &jobs, &incoming, &stopping))
                    .expect("Executor::new: failed to spawn worker thread")
            })
            .collect();
        Self {
            jobs,
            shutdown: Some(shutdown),
            workers,
        }
    }

    /// Executes one run of `graph` with the given positional input tokens.
    ///
    /// Validates the graph first (a no-op when already validated), clones it
    /// into fresh live state, seeds the entry node and enqueues it. The
    /// returned future resolves with the exit node's output tokens, or with
    /// the error that terminated the run.
    pub fn run(&self, graph: &mut Graph, inputs: TokenVec) -> Result<RunFuture, GraphError> {
        graph.validate()?;
        let (result, future) = unbounded();
        let handler = GraphHandler::new(graph, inputs)?;
        let entry = handler.entry();
        let run = Arc::new(RunState {
            graph: handler,
            result,
        });
        debug!(%entry, "run submitted");
        self.jobs
            .send(Job { run, node: entry })
            .expect("Executor::run: job queue disconnected");
        Ok(RunFuture { result: future })
    }
}

impl Drop for Executor {
    fn drop(&mut self) {
        // Disconnecting the shutdown channel is the stop signal.
        drop(self.shutdown.take());
        for worker in self.workers.drain(..) {
            if worker.join().is_err() {
                warn!("worker thread panicked");
            }
        }
        debug!("executor shut down");
    }
}

/// Pending result of one graph run.
#[derive(Debug)]
#[must_use]
pub struct RunFuture {
    result: Receiver<RunResult>,
}

impl RunFuture {
    /// Blocks until the run completes.
    pub fn wait(self) -> RunResult {
        self.result.recv().unwrap_or(Err(RunError::Shutdown))
    }

    /// Returns the result if the run has completed, `None` otherwise.
    pub fn try_wait(&self) -> Option<RunResult> {
        match self.result.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(RunError::Shutdown)),
        }
    }
}

fn worker_loop(index: usize, jobs: &Sender<Job>, incoming: &Receiver<Job>, stopping: &Receiver<()>) {
    debug!(worker = index, "worker started");
    loop {
        crossbeam_channel::select! {
            recv(incoming) -> job => match job {
                Ok(job) => serve(job, jobs),
                Err(_) => break,
            },
            recv(stopping) -> _ => break,
        }
    }
    debug!(worker = index, "worker stopped");
}

/// Fires one node and routes the outcome: ready successors go back onto the
/// queue (only the latch winner enqueues a successor), completion or failure
/// resolves the run's future.
fn serve(job: Job, jobs: &Sender<Job>) {
    let Job { run, node } = job;
    trace!(%node, "firing node");
    match run.graph.fire(node) {
        Ok(Firing::Completed(tokens)) => run.complete(Ok(tokens)),
        Ok(Firing::Ready(successors)) => {
            for successor in successors {
                let job = Job {
                    run: Arc::clone(&run),
                    node: successor,
                };
                // A send only fails during shutdown, when queued work is
                // abandoned anyway.
                if jobs.send(job).is_err() {
                    break;
                }
            }
        }
        Err(error) => {
            warn!(%node, %error, "firing failed, terminating run");
            run.complete(Err(error));
        }
    }
}
