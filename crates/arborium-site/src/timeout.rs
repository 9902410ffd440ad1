//! Bounding how long a single block may take to highlight.
//!
//! [`TimeoutEngine`] owns a worker thread running the real engine. Each block is
//! sent to the worker and we wait at most `budget` for the answer. A block that
//! runs over falls back to plain text, and the busy worker is abandoned: it
//! finishes the block in the background, notices nobody is listening and exits.
//! The next block starts a new worker, unless [`DEFAULT_MAX_WORKERS`] threads are
//! already alive; then blocks go straight to plain text until one of them exits.

use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::mpsc::{self, RecvTimeoutError};
use std::thread;
use std::time::Duration;

use crate::engine::{EngineFactory, HighlightEngine, HighlightResult};
use crate::error::EngineError;
use crate::language::CandidateSet;

/// Live worker threads (current one plus stuck ones) allowed per engine.
pub const DEFAULT_MAX_WORKERS: usize = 4;

struct Job {
    source: String,
    candidates: CandidateSet,
    reply: mpsc::Sender<Result<HighlightResult, EngineError>>,
}

/// Decrements the live worker count when a worker thread ends, however it ends.
struct LiveWorker(Arc<AtomicUsize>);

impl Drop for LiveWorker {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Runs another engine with a per-block time budget.
pub struct TimeoutEngine {
    factory: EngineFactory,
    budget: Duration,
    worker: Option<mpsc::Sender<Job>>,
    live: Arc<AtomicUsize>,
    max_workers: usize,
}

impl TimeoutEngine {
    pub fn new(factory: EngineFactory, budget: Duration) -> Self {
        Self {
            factory,
            budget,
            worker: None,
            live: Arc::new(AtomicUsize::new(0)),
            max_workers: DEFAULT_MAX_WORKERS,
        }
    }

    /// Limit how many worker threads (including abandoned ones) may be alive.
    pub fn with_max_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers.max(1);
        self
    }

    /// Worker threads currently alive, stuck ones included.
    pub fn live_workers(&self) -> usize {
        self.live.load(Ordering::SeqCst)
    }

    /// Wraps `factory` so that every engine it builds is time-bounded.
    pub fn factory(inner: EngineFactory, budget: Duration) -> EngineFactory {
        Arc::new(move || -> Box<dyn HighlightEngine> {
            Box::new(TimeoutEngine::new(inner.clone(), budget))
        })
    }

    fn spawn_worker(&self) -> Result<mpsc::Sender<Job>, EngineError> {
        let (tx, rx) = mpsc::channel::<Job>();
        let factory = self.factory.clone();
        self.live.fetch_add(1, Ordering::SeqCst);
        let live = LiveWorker(self.live.clone());

        thread::Builder::new()
            .name("arborium-site-highlight".to_string())
            .spawn(move || {
                let _live = live;
                // The engine is built here so it never has to cross threads.
                let mut engine = factory();
                for job in rx {
                    let result = panic::catch_unwind(AssertUnwindSafe(|| {
                        engine.highlight(&job.source, &job.candidates)
                    }))
                    .unwrap_or_else(|_| {
                        engine = factory();
                        Err(EngineError::Panicked)
                    });
                    if job.reply.send(result).is_err() {
                        // Caller gave up on us.
                        break;
                    }
                }
            })
            .map_err(|_| EngineError::WorkerLost)?;

        Ok(tx)
    }

    fn submit(&mut self, job: Job) -> Result<(), EngineError> {
        let worker = match self.worker.take() {
            Some(worker) => worker,
            None => self.spawn_worker()?,
        };
        match worker.send(job) {
            Ok(()) => {
                self.worker = Some(worker);
                Ok(())
            }
            Err(mpsc::SendError(job)) => {
                // The previous worker exited; one retry with a fresh thread.
                let worker = self.spawn_worker()?;
                worker.send(job).map_err(|_| EngineError::WorkerLost)?;
                self.worker = Some(worker);
                Ok(())
            }
        }
    }
}

impl HighlightEngine for TimeoutEngine {
    fn highlight(
        &mut self,
        source: &str,
        candidates: &CandidateSet,
    ) -> Result<HighlightResult, EngineError> {
        if self.worker.is_none() && self.live_workers() >= self.max_workers {
            tracing::warn!(
                stuck = self.live_workers(),
                bytes = source.len(),
                "too many highlight workers stuck, leaving block plain"
            );
            return Ok(HighlightResult::plain(source));
        }

        let (reply, answer) = mpsc::channel();
        self.submit(Job {
            source: source.to_string(),
            candidates: candidates.clone(),
            reply,
        })?;

        match answer.recv_timeout(self.budget) {
            Ok(result) => result,
            Err(RecvTimeoutError::Timeout) => {
                tracing::warn!(
                    budget_ms = self.budget.as_millis() as u64,
                    bytes = source.len(),
                    stuck = self.live_workers(),
                    "highlighting timed out, leaving block plain"
                );
                self.worker = None;
                Ok(HighlightResult::plain(source))
            }
            Err(RecvTimeoutError::Disconnected) => {
                self.worker = None;
                Err(EngineError::WorkerLost)
            }
        }
    }
}
