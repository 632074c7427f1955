use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use capture_logging::{capture_debug, capture_error};
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

use crate::{FetchError, FetchOutput, Fetcher, ResourceClass};

/// One resource to download, addressed by its index in the file list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadJob {
    pub index: usize,
    pub url: String,
    pub class: ResourceClass,
}

/// Receives every entry transition made by the worker pool.
pub trait EntrySink: Send + Sync {
    /// A worker is about to fetch `index`. Returning `false` refuses the
    /// claim and stops that worker.
    fn claim(&self, index: usize) -> bool;
    fn completed(&self, index: usize, output: FetchOutput);
    fn failed(&self, index: usize, error: FetchError);
}

/// Bounded worker pool over a shared queue of jobs.
pub struct DownloadCoordinator {
    fetcher: Arc<dyn Fetcher>,
}

impl DownloadCoordinator {
    pub fn new(fetcher: Arc<dyn Fetcher>) -> Self {
        Self { fetcher }
    }

    /// Run `concurrency` workers until the queue is empty or `stop` is
    /// cancelled. A stop only prevents new claims; fetches already in flight
    /// run to completion or to their own timeout.
    pub async fn run(
        &self,
        jobs: Vec<DownloadJob>,
        concurrency: usize,
        stop: CancellationToken,
        sink: Arc<dyn EntrySink>,
    ) {
        if jobs.is_empty() {
            return;
        }
        let workers = concurrency.clamp(1, jobs.len());
        let queue = Arc::new(JobQueue::new(jobs));

        let mut set = JoinSet::new();
        for worker_id in 0..workers {
            let queue = queue.clone();
            let fetcher = self.fetcher.clone();
            let stop = stop.clone();
            let sink = sink.clone();
            set.spawn(async move {
                worker_loop(worker_id, queue, fetcher, stop, sink).await;
            });
        }

        while let Some(joined) = set.join_next().await {
            if let Err(err) = joined {
                capture_error!("download worker ended abnormally: {}", err);
            }
        }
    }
}

struct JobQueue {
    jobs: Vec<DownloadJob>,
    next: AtomicUsize,
}

impl JobQueue {
    fn new(jobs: Vec<DownloadJob>) -> Self {
        Self {
            jobs,
            next: AtomicUsize::new(0),
        }
    }

    fn pop(&self) -> Option<&DownloadJob> {
        let position = self.next.fetch_add(1, Ordering::Relaxed);
        self.jobs.get(position)
    }
}

async fn worker_loop(
    worker_id: usize,
    queue: Arc<JobQueue>,
    fetcher: Arc<dyn Fetcher>,
    stop: CancellationToken,
    sink: Arc<dyn EntrySink>,
) {
    loop {
        if stop.is_cancelled() {
            capture_debug!("worker {} observed stop signal", worker_id);
            break;
        }
        let Some(job) = queue.pop() else {
            break;
        };
        if !sink.claim(job.index) {
            capture_debug!("worker {} claim of entry {} refused", worker_id, job.index);
            break;
        }
        match fetcher.fetch(&job.url, job.class).await {
            Ok(output) => sink.completed(job.index, output),
            Err(error) => sink.failed(job.index, error),
        }
    }
}
