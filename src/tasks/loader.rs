use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use tokio::select;
use tokio::sync::mpsc::Sender;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::error::LoadError;
use crate::events::{Generation, ImageSettled, LoadOutcome, PreloadRequest};
use crate::fetch::ImageFetcher;

struct QueuedFetch {
    index: usize,
    url: Arc<str>,
}

struct FetchDone {
    generation: Generation,
    index: usize,
    /// `None` when the fetch was abandoned because its image set was replaced.
    outcome: Option<LoadOutcome>,
}

/// Preloads the active image set:
/// - A new request cancels in-flight fetches of the previous generation and drops its queue.
/// - At most `max_in_flight` fetches run at once; the rest queue in index order.
/// - Failures and timeouts are logged and reported as `LoadOutcome::Failed`.
pub async fn run<F: ImageFetcher>(
    fetcher: Arc<F>,
    mut requests: watch::Receiver<Option<PreloadRequest>>,
    to_scheduler: Sender<ImageSettled>,
    cancel: CancellationToken,
    max_in_flight: usize,
    timeout: Option<Duration>,
) -> Result<()> {
    let mut generation = Generation::default();
    let mut generation_cancel = cancel.child_token();
    let mut queue: VecDeque<QueuedFetch> = VecDeque::new();
    let mut tasks: JoinSet<FetchDone> = JoinSet::new();
    let mut requests_open = true;

    // A request may already be waiting before the first `changed()`.
    if let Some(req) = requests.borrow_and_update().clone() {
        start_generation(req, &mut generation, &mut generation_cancel, &mut queue, &cancel);
    }

    loop {
        while tasks.len() < max_in_flight {
            let Some(QueuedFetch { index, url }) = queue.pop_front() else {
                break;
            };
            tasks.spawn(fetch_one(
                fetcher.clone(),
                generation,
                index,
                url,
                generation_cancel.clone(),
                timeout,
            ));
        }

        if !requests_open && tasks.is_empty() && queue.is_empty() {
            break;
        }

        select! {
            _ = cancel.cancelled() => break,

            changed = requests.changed(), if requests_open => {
                if changed.is_err() {
                    debug!("preload request channel closed");
                    requests_open = false;
                    continue;
                }
                if let Some(req) = requests.borrow_and_update().clone() {
                    start_generation(req, &mut generation, &mut generation_cancel, &mut queue, &cancel);
                }
            }

            Some(joined) = tasks.join_next() => {
                let done = match joined {
                    Ok(done) => done,
                    Err(err) => {
                        warn!(error = %err, "fetch task failed to join");
                        continue;
                    }
                };
                let Some(outcome) = done.outcome else {
                    continue;
                };
                let settled = ImageSettled {
                    generation: done.generation,
                    index: done.index,
                    outcome,
                };
                if to_scheduler.send(settled).await.is_err() {
                    debug!("scheduler closed; stopping loader");
                    break;
                }
            }
        }
    }

    generation_cancel.cancel();
    tasks.shutdown().await;
    Ok(())
}

fn start_generation(
    req: PreloadRequest,
    generation: &mut Generation,
    generation_cancel: &mut CancellationToken,
    queue: &mut VecDeque<QueuedFetch>,
    cancel: &CancellationToken,
) {
    generation_cancel.cancel();
    *generation_cancel = cancel.child_token();
    *generation = req.generation;
    queue.clear();
    queue.extend(
        req.images
            .iter()
            .enumerate()
            .map(|(index, url)| QueuedFetch {
                index,
                url: url.clone(),
            }),
    );
    info!(
        generation = req.generation.0,
        images = req.images.len(),
        "preloading image set"
    );
}

async fn fetch_one<F: ImageFetcher>(
    fetcher: Arc<F>,
    generation: Generation,
    index: usize,
    url: Arc<str>,
    abandon: CancellationToken,
    timeout: Option<Duration>,
) -> FetchDone {
    let fetched = async {
        match timeout {
            Some(after) => tokio::time::timeout(after, fetcher.fetch(&url))
                .await
                .unwrap_or_else(|_| {
                    Err(LoadError::TimedOut {
                        url: url.to_string(),
                        after,
                    })
                }),
            None => fetcher.fetch(&url).await,
        }
    };

    let outcome = select! {
        _ = abandon.cancelled() => {
            debug!(generation = generation.0, index, url = %url, "fetch abandoned");
            None
        }
        res = fetched => Some(match res {
            Ok(()) => {
                debug!(generation = generation.0, index, url = %url, "image loaded");
                LoadOutcome::Loaded
            }
            Err(err) => {
                warn!(generation = generation.0, index, error = %err, "image failed to load; slot counts as settled");
                LoadOutcome::Failed
            }
        }),
    };

    FetchDone {
        generation,
        index,
        outcome,
    }
}
