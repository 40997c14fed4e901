use std::collections::HashMap;
use std::io;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use studio_slideshow::error::LoadError;
use studio_slideshow::events::{Generation, ImageSettled, LoadOutcome, PreloadRequest};
use studio_slideshow::fetch::{ImageFetcher, UrlFetcher};
use studio_slideshow::tasks::loader;
use studio_slideshow::viewport::ImageSet;
use tokio::sync::{mpsc, watch};
use tokio::time::{sleep, timeout};
use tokio_util::sync::CancellationToken;

#[derive(Clone, Copy)]
enum Script {
    Load(Duration),
    Fail(Duration),
    Hang,
}

#[derive(Default)]
struct ScriptedFetcher {
    scripts: HashMap<String, Script>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

impl ScriptedFetcher {
    fn new(scripts: &[(&str, Script)]) -> Self {
        Self {
            scripts: scripts
                .iter()
                .map(|(url, script)| (url.to_string(), *script))
                .collect(),
            ..Self::default()
        }
    }
}

impl ImageFetcher for ScriptedFetcher {
    async fn fetch(&self, url: &str) -> Result<(), LoadError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        let result = match self.scripts.get(url).copied().unwrap_or(Script::Hang) {
            Script::Load(after) => {
                sleep(after).await;
                Ok(())
            }
            Script::Fail(after) => {
                sleep(after).await;
                Err(LoadError::Io {
                    url: url.to_string(),
                    source: io::Error::other("connection reset"),
                })
            }
            Script::Hang => std::future::pending().await,
        };
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }
}

fn image_set(urls: &[&str]) -> ImageSet {
    urls.iter().map(|url| Arc::from(*url)).collect()
}

struct Loader {
    requests: watch::Sender<Option<PreloadRequest>>,
    settled: mpsc::Receiver<ImageSettled>,
    cancel: CancellationToken,
}

impl Loader {
    fn start<F: ImageFetcher>(
        fetcher: Arc<F>,
        max_in_flight: usize,
        fetch_timeout: Option<Duration>,
    ) -> Self {
        let (requests, requests_rx) = watch::channel(None);
        let (settled_tx, settled) = mpsc::channel(16);
        let cancel = CancellationToken::new();
        tokio::spawn(loader::run(
            fetcher,
            requests_rx,
            settled_tx,
            cancel.clone(),
            max_in_flight,
            fetch_timeout,
        ));
        Self {
            requests,
            settled,
            cancel,
        }
    }

    fn preload(&self, generation: u64, urls: &[&str]) {
        self.requests.send_replace(Some(PreloadRequest {
            generation: Generation(generation),
            images: image_set(urls),
        }));
    }

    async fn next(&mut self) -> ImageSettled {
        timeout(Duration::from_secs(60), self.settled.recv())
            .await
            .expect("timeout waiting for settled image")
            .expect("loader channel closed")
    }
}

#[tokio::test(start_paused = true)]
async fn completions_arrive_out_of_order_and_failures_count_as_settled() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        ("a", Script::Load(Duration::from_millis(300))),
        ("b", Script::Fail(Duration::from_millis(100))),
        ("c", Script::Load(Duration::from_millis(200))),
    ]));
    let mut loader = Loader::start(fetcher, 4, None);
    loader.preload(0, &["a", "b", "c"]);

    let order: Vec<(usize, LoadOutcome)> = vec![
        loader.next().await,
        loader.next().await,
        loader.next().await,
    ]
    .into_iter()
    .map(|s| (s.index, s.outcome))
    .collect();
    assert_eq!(
        order,
        vec![
            (1, LoadOutcome::Failed),
            (2, LoadOutcome::Loaded),
            (0, LoadOutcome::Loaded),
        ]
    );
    loader.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn concurrency_is_bounded() {
    let scripts: Vec<(String, Script)> = (0..6)
        .map(|i| (format!("img-{i}"), Script::Load(Duration::from_millis(100))))
        .collect();
    let borrowed: Vec<(&str, Script)> = scripts.iter().map(|(u, s)| (u.as_str(), *s)).collect();
    let fetcher = Arc::new(ScriptedFetcher::new(&borrowed));
    let mut loader = Loader::start(fetcher.clone(), 2, None);
    let urls: Vec<&str> = scripts.iter().map(|(u, _)| u.as_str()).collect();
    loader.preload(0, &urls);

    let mut indices = Vec::new();
    for _ in 0..6 {
        indices.push(loader.next().await.index);
    }
    indices.sort_unstable();
    assert_eq!(indices, vec![0, 1, 2, 3, 4, 5]);
    assert_eq!(fetcher.peak.load(Ordering::SeqCst), 2);
    loader.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn new_image_set_abandons_previous_generation() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[
        ("wide-0", Script::Hang),
        ("wide-1", Script::Load(Duration::from_millis(500))),
        ("narrow-0", Script::Load(Duration::from_millis(50))),
        ("narrow-1", Script::Load(Duration::from_millis(80))),
    ]));
    let mut loader = Loader::start(fetcher.clone(), 4, None);
    loader.preload(0, &["wide-0", "wide-1"]);
    sleep(Duration::from_millis(10)).await;
    loader.preload(1, &["narrow-0", "narrow-1"]);

    let first = loader.next().await;
    let second = loader.next().await;
    assert_eq!((first.generation, first.index), (Generation(1), 0));
    assert_eq!((second.generation, second.index), (Generation(1), 1));

    let stray = timeout(Duration::from_secs(5), loader.settled.recv()).await;
    assert!(stray.is_err(), "superseded fetches must not report");
    loader.cancel.cancel();
}

#[tokio::test(start_paused = true)]
async fn fetch_timeout_marks_slot_failed() {
    let fetcher = Arc::new(ScriptedFetcher::new(&[("slow", Script::Hang)]));
    let mut loader = Loader::start(fetcher, 4, Some(Duration::from_secs(5)));
    loader.preload(3, &["slow"]);

    let settled = loader.next().await;
    assert_eq!(settled.generation, Generation(3));
    assert_eq!(settled.outcome, LoadOutcome::Failed);
    loader.cancel.cancel();
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn url_fetcher_reads_local_images() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("hero.png");
    image::RgbaImage::new(4, 2).save(&good).unwrap();
    let bad = dir.path().join("broken.jpg");
    std::fs::write(&bad, b"definitely not a jpeg").unwrap();
    let missing = dir.path().join("missing.webp");

    let fetcher = UrlFetcher::new().unwrap();
    fetcher
        .fetch(good.to_str().unwrap())
        .await
        .expect("png on disk should load");
    fetcher
        .fetch(&format!("file://{}", good.display()))
        .await
        .expect("file:// url should load");

    let err = fetcher.fetch(bad.to_str().unwrap()).await.unwrap_err();
    assert!(matches!(err, LoadError::Decode { .. }), "{err}");

    let err = fetcher.fetch(missing.to_str().unwrap()).await.unwrap_err();
    assert!(matches!(err, LoadError::Io { .. }), "{err}");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn loader_reports_real_files() {
    let dir = tempfile::tempdir().unwrap();
    let good = dir.path().join("a.png");
    image::RgbaImage::new(1, 1).save(&good).unwrap();
    let missing = dir.path().join("gone.png");

    let good = good.to_string_lossy().into_owned();
    let missing = missing.to_string_lossy().into_owned();
    let mut loader = Loader::start(Arc::new(UrlFetcher::new().unwrap()), 2, None);
    loader.preload(0, &[good.as_str(), missing.as_str()]);

    let mut outcomes = vec![loader.next().await, loader.next().await];
    outcomes.sort_by_key(|s| s.index);
    assert_eq!(outcomes[0].outcome, LoadOutcome::Loaded);
    assert_eq!(outcomes[1].outcome, LoadOutcome::Failed);
    loader.cancel.cancel();
}
