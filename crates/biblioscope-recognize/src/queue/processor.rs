use std::sync::{Arc, Mutex, PoisonError, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use biblioscope_core::{Attachment, BibRecord, ItemId, RecognizeConfig};
use tokio::sync::watch;

use super::observer::{RecognitionObserver, RowEvent};
use super::rows::{JobQueue, JobRow, RowStatus};
use crate::connectivity::Connectivity;
use crate::error::RecognizeError;
use crate::recognize::MetadataResolver;

pub const NO_MATCH_MESSAGE: &str = "No matching metadata found";
const PROCESSING_MESSAGE: &str = "processing";

/// What the worker runs for each dequeued attachment.
#[async_trait]
pub trait AttachmentResolver: Send + Sync {
    /// Resolves once the item store can be used.
    async fn wait_until_ready(&self);

    async fn resolve(&self, id: ItemId) -> Result<Option<BibRecord>, RecognizeError>;
}

#[async_trait]
impl AttachmentResolver for MetadataResolver {
    async fn wait_until_ready(&self) {
        if let Err(e) = self.store().wait_until_ready().await {
            // Jobs still run; store errors surface per job and are retried.
            tracing::error!(error = %e, "item store readiness check failed");
        }
    }

    async fn resolve(&self, id: ItemId) -> Result<Option<BibRecord>, RecognizeError> {
        self.recognize(id).await
    }
}

/// Worker timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecognizerSettings {
    pub offline_poll: Duration,
    pub backoff_step: Duration,
    pub backoff_cap: Duration,
}

impl Default for RecognizerSettings {
    fn default() -> Self {
        Self::from(&RecognizeConfig::default())
    }
}

impl From<&RecognizeConfig> for RecognizerSettings {
    fn from(config: &RecognizeConfig) -> Self {
        Self {
            offline_poll: config.offline_poll_interval(),
            backoff_step: config.backoff_step(),
            backoff_cap: config.backoff_cap(),
        }
    }
}

impl RecognizerSettings {
    /// Linear in consecutive failures, capped.
    pub fn backoff_delay(&self, failures: u32) -> Duration {
        self.backoff_step.saturating_mul(failures).min(self.backoff_cap)
    }
}

struct Inner {
    state: Mutex<JobQueue>,
    /// Held from state mutation through notification so observers see
    /// batches in the order the queue produced them.
    dispatch: Mutex<()>,
    running: watch::Sender<bool>,
    observers: RwLock<Vec<Arc<dyn RecognitionObserver>>>,
    resolver: Arc<dyn AttachmentResolver>,
    connectivity: Arc<dyn Connectivity>,
    settings: RecognizerSettings,
}

impl Inner {
    /// Mutate the queue under its lock, then notify observers without it.
    /// The dispatch lock is taken before the state lock is released, so
    /// concurrent updates notify in mutation order.
    fn update<T>(&self, f: impl FnOnce(&mut JobQueue, &mut Vec<RowEvent>) -> T) -> T {
        let mut events = Vec::new();
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        let out = f(&mut state, &mut events);
        let running = state.is_running();
        self.running.send_if_modified(|current| {
            let changed = *current != running;
            *current = running;
            changed
        });
        let _dispatch = self.dispatch.lock().unwrap_or_else(PoisonError::into_inner);
        drop(state);
        self.notify(&events);
        out
    }

    fn read<T>(&self, f: impl FnOnce(&JobQueue) -> T) -> T {
        f(&self.state.lock().unwrap_or_else(PoisonError::into_inner))
    }

    fn notify(&self, events: &[RowEvent]) {
        if events.is_empty() {
            return;
        }
        let observers = self
            .observers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone();
        for event in events {
            for observer in &observers {
                event.dispatch(observer.as_ref());
            }
        }
    }

    fn set_row(&self, id: ItemId, status: RowStatus, message: impl Into<String>) {
        let message = message.into();
        self.update(|q, events| q.update_row(id, status, message, events));
    }
}

/// The recognition queue: rows, pending attachments and a single worker task
/// that resolves them one at a time.
///
/// Cloning yields another handle to the same queue.
#[derive(Clone)]
pub struct Recognizer {
    inner: Arc<Inner>,
}

impl Recognizer {
    pub fn new(
        resolver: Arc<dyn AttachmentResolver>,
        connectivity: Arc<dyn Connectivity>,
        settings: RecognizerSettings,
    ) -> Self {
        let (running, _) = watch::channel(false);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(JobQueue::new()),
                dispatch: Mutex::new(()),
                running,
                observers: RwLock::new(Vec::new()),
                resolver,
                connectivity,
                settings,
            }),
        }
    }

    pub fn add_observer(&self, observer: Arc<dyn RecognitionObserver>) {
        self.inner
            .observers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .push(observer);
    }

    /// Queue every attachment and start the worker if it is idle. Must be
    /// called from within a Tokio runtime.
    pub fn recognize_items<'a>(&self, items: impl IntoIterator<Item = &'a Attachment>) -> usize {
        let queued = items
            .into_iter()
            .filter(|item| self.enqueue(item))
            .count();
        tracing::debug!(queued, "attachments queued for recognition");
        queued
    }

    /// Queue one attachment at the front. Returns `false` when it is already
    /// queued or processing.
    pub fn enqueue(&self, attachment: &Attachment) -> bool {
        let (queued, start) = self.inner.update(|q, events| {
            let queued = q.enqueue(attachment.id, &attachment.title, events);
            (queued, queued && q.try_start())
        });
        if start {
            tokio::spawn(run_worker(Arc::clone(&self.inner)));
        }
        queued
    }

    pub fn cancel_all(&self) {
        tracing::info!("recognition cancelled");
        self.inner.update(|q, events| q.cancel_all(events));
    }

    pub fn delete_row(&self, id: ItemId) -> bool {
        self.inner.update(|q, events| q.delete_row(id, events))
    }

    pub fn list_rows(&self) -> Vec<JobRow> {
        self.inner.read(|q| q.rows().to_vec())
    }

    pub fn row(&self, id: ItemId) -> Option<JobRow> {
        self.inner.read(|q| q.row(id).cloned())
    }

    pub fn total_count(&self) -> usize {
        self.inner.read(JobQueue::total_count)
    }

    pub fn processed_count(&self) -> usize {
        self.inner.read(JobQueue::processed_count)
    }

    pub fn is_running(&self) -> bool {
        self.inner.read(JobQueue::is_running)
    }

    /// Wait until the worker has drained the queue.
    pub async fn wait_idle(&self) {
        let mut running = self.inner.running.subscribe();
        // The sender lives in `inner`, which `self` keeps alive.
        let _ = running.wait_for(|running| !*running).await;
    }
}

async fn run_worker(inner: Arc<Inner>) {
    tracing::debug!("recognition worker started");
    inner.resolver.wait_until_ready().await;

    let mut failures: u32 = 0;
    loop {
        if inner.update(|q, _| q.stop_if_empty()) {
            break;
        }
        if !inner.connectivity.is_online().await {
            tracing::info!(
                retry_in = ?inner.settings.offline_poll,
                "offline, waiting before next recognition"
            );
            tokio::time::sleep(inner.settings.offline_poll).await;
            continue;
        }
        let Some(id) = inner.update(|q, _| q.next_job()) else {
            break;
        };

        inner.set_row(id, RowStatus::Processing, PROCESSING_MESSAGE);
        match inner.resolver.resolve(id).await {
            Ok(Some(record)) => {
                failures = 0;
                inner.set_row(id, RowStatus::Succeeded, record.title);
            }
            Ok(None) => {
                failures = 0;
                inner.set_row(id, RowStatus::Failed, NO_MATCH_MESSAGE);
            }
            Err(RecognizeError::Domain(failure)) => {
                tracing::info!(item = %id, reason = %failure, "recognition failed");
                inner.set_row(id, RowStatus::Failed, failure.message());
            }
            Err(RecognizeError::Recoverable(message)) => {
                tracing::error!(item = %id, error = %message, "recognition error, will retry");
                inner.set_row(id, RowStatus::Failed, format!("An error occurred: {message}"));
                inner.update(|q, _| q.requeue(id));
                failures = failures.saturating_add(1);
                tokio::time::sleep(inner.settings.backoff_delay(failures)).await;
            }
        }
    }
    tracing::debug!("recognition worker idle");
}

#[cfg(test)]
mod tests {
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};

    use biblioscope_core::{CandidateRecord, ItemType, PDF_CONTENT_TYPE};
    use chrono::Utc;
    use tokio::time::Instant;

    use super::*;
    use crate::connectivity::AlwaysOnline;
    use crate::error::DomainFailure;
    use crate::queue::observer::{ChannelObserver, RowSnapshot};

    #[derive(Debug, Clone)]
    enum Outcome {
        Found(&'static str),
        NotFound,
        Domain(DomainFailure),
        Recoverable,
        /// Finds a record after the given delay.
        Slow(Duration),
    }

    #[derive(Default)]
    struct ScriptedResolver {
        script: Mutex<HashMap<ItemId, VecDeque<Outcome>>>,
        calls: Mutex<Vec<(ItemId, Instant)>>,
    }

    impl ScriptedResolver {
        fn with(self, id: i64, outcomes: Vec<Outcome>) -> Self {
            self.script.lock().unwrap().insert(ItemId(id), outcomes.into());
            self
        }

        fn called_ids(&self) -> Vec<i64> {
            self.calls.lock().unwrap().iter().map(|(id, _)| id.0).collect()
        }

        fn call_gaps(&self) -> Vec<Duration> {
            let calls = self.calls.lock().unwrap();
            calls.windows(2).map(|w| w[1].1 - w[0].1).collect()
        }
    }

    fn record(id: ItemId, title: &str) -> BibRecord {
        BibRecord {
            id: ItemId(id.0 + 1000),
            key: "ABCD1234".into(),
            item_type: ItemType::JournalArticle,
            title: title.into(),
            creators: Vec::new(),
            fields: Default::default(),
            library_catalog: None,
            date_added: Utc::now(),
        }
    }

    #[async_trait]
    impl AttachmentResolver for ScriptedResolver {
        async fn wait_until_ready(&self) {}

        async fn resolve(&self, id: ItemId) -> Result<Option<BibRecord>, RecognizeError> {
            self.calls.lock().unwrap().push((id, Instant::now()));
            let outcome = self
                .script
                .lock()
                .unwrap()
                .get_mut(&id)
                .and_then(VecDeque::pop_front)
                .unwrap_or(Outcome::NotFound);
            match outcome {
                Outcome::Found(title) => Ok(Some(record(id, title))),
                Outcome::NotFound => Ok(None),
                Outcome::Domain(failure) => Err(failure.into()),
                Outcome::Recoverable => Err(RecognizeError::Recoverable("HTTP 503".into())),
                Outcome::Slow(delay) => {
                    tokio::time::sleep(delay).await;
                    Ok(Some(record(id, "Slow")))
                }
            }
        }
    }

    struct FlakyNetwork {
        offline_checks: AtomicUsize,
    }

    #[async_trait]
    impl Connectivity for FlakyNetwork {
        async fn is_online(&self) -> bool {
            self.offline_checks
                .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
                .is_err()
        }
    }

    fn attachment(id: i64) -> Attachment {
        Attachment {
            id: ItemId(id),
            key: format!("KEY{id:05}"),
            title: format!("file{id}.pdf"),
            file_path: Some(format!("/tmp/file{id}.pdf")),
            content_type: PDF_CONTENT_TYPE.into(),
            parent_id: None,
            date_added: Utc::now(),
        }
    }

    fn recognizer(resolver: Arc<ScriptedResolver>) -> Recognizer {
        Recognizer::new(resolver, Arc::new(AlwaysOnline), RecognizerSettings::default())
    }

    fn drain(rx: &mut tokio::sync::mpsc::UnboundedReceiver<RowEvent>) -> Vec<RowEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn backoff_is_linear_and_capped() {
        let settings = RecognizerSettings::default();
        assert_eq!(settings.backoff_delay(1), Duration::from_secs(1));
        assert_eq!(settings.backoff_delay(2), Duration::from_secs(2));
        assert_eq!(settings.backoff_delay(3), Duration::from_secs(3));
        assert_eq!(settings.backoff_delay(60), Duration::from_secs(60));
        assert_eq!(settings.backoff_delay(500), Duration::from_secs(60));
    }

    #[tokio::test(start_paused = true)]
    async fn most_recent_item_is_processed_first() {
        let resolver = Arc::new(ScriptedResolver::default());
        let queue = recognizer(resolver.clone());

        let items = [attachment(1), attachment(2), attachment(3)];
        assert_eq!(queue.recognize_items(&items), 3);
        let row_ids: Vec<i64> = queue.list_rows().iter().map(|r| r.id.0).collect();
        assert_eq!(row_ids, vec![3, 2, 1]);

        queue.wait_idle().await;
        assert_eq!(resolver.called_ids(), vec![3, 2, 1]);
        assert_eq!(queue.processed_count(), 3);
        assert!(!queue.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn queued_item_is_not_added_twice() {
        let resolver = Arc::new(ScriptedResolver::default().with(1, vec![Outcome::Found("T")]));
        let queue = recognizer(resolver.clone());

        assert!(queue.enqueue(&attachment(1)));
        assert!(!queue.enqueue(&attachment(1)));
        assert_eq!(queue.total_count(), 1);

        queue.wait_idle().await;
        assert_eq!(resolver.called_ids(), vec![1]);

        // Terminal rows are replaced by a fresh queued row.
        let (observer, mut rx) = ChannelObserver::new();
        queue.add_observer(Arc::new(observer));
        assert!(queue.enqueue(&attachment(1)));
        let events = drain(&mut rx);
        assert!(matches!(&events[0], RowEvent::Deleted(s) if s.status == RowStatus::Succeeded));
        assert!(matches!(&events[1], RowEvent::Added(s) if s.status == RowStatus::Queued));
        assert_eq!(queue.total_count(), 1);

        queue.wait_idle().await;
        assert_eq!(resolver.called_ids(), vec![1, 1]);
    }

    #[tokio::test(start_paused = true)]
    async fn recoverable_errors_back_off_linearly() {
        let resolver = Arc::new(ScriptedResolver::default().with(
            1,
            vec![
                Outcome::Recoverable,
                Outcome::Recoverable,
                Outcome::Recoverable,
                Outcome::Found("Finally"),
            ],
        ));
        let queue = recognizer(resolver.clone());

        queue.enqueue(&attachment(1));
        queue.wait_idle().await;

        assert_eq!(resolver.called_ids(), vec![1, 1, 1, 1]);
        assert_eq!(
            resolver.call_gaps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(3)
            ]
        );
        let row = queue.row(ItemId(1)).unwrap();
        assert_eq!(row.status, RowStatus::Succeeded);
        assert_eq!(row.message, "Finally");
    }

    #[tokio::test(start_paused = true)]
    async fn backoff_counter_is_shared_and_capped() {
        let resolver = Arc::new(
            ScriptedResolver::default()
                .with(1, vec![Outcome::Recoverable])
                .with(
                    2,
                    vec![Outcome::Recoverable, Outcome::Recoverable, Outcome::Found("Two")],
                ),
        );
        let settings = RecognizerSettings {
            backoff_cap: Duration::from_secs(2),
            ..RecognizerSettings::default()
        };
        let queue = Recognizer::new(resolver.clone(), Arc::new(AlwaysOnline), settings);

        queue.recognize_items(&[attachment(1), attachment(2)]);
        queue.wait_idle().await;

        // Retries go to the back; the third consecutive failure hits the cap.
        assert_eq!(resolver.called_ids(), vec![2, 1, 2, 1, 2]);
        assert_eq!(
            resolver.call_gaps(),
            vec![
                Duration::from_secs(1),
                Duration::from_secs(2),
                Duration::from_secs(2),
                Duration::ZERO
            ]
        );
        assert_eq!(queue.row(ItemId(2)).unwrap().status, RowStatus::Succeeded);
        assert_eq!(queue.row(ItemId(1)).unwrap().message, NO_MATCH_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn domain_failure_is_not_retried() {
        let resolver = Arc::new(
            ScriptedResolver::default().with(1, vec![Outcome::Domain(DomainFailure::HasParent)]),
        );
        let queue = recognizer(resolver.clone());

        let start = Instant::now();
        queue.enqueue(&attachment(1));
        queue.wait_idle().await;

        assert_eq!(resolver.called_ids(), vec![1]);
        assert_eq!(start.elapsed(), Duration::ZERO);
        let row = queue.row(ItemId(1)).unwrap();
        assert_eq!(row.status, RowStatus::Failed);
        assert_eq!(row.message, DomainFailure::HasParent.message());
    }

    #[tokio::test(start_paused = true)]
    async fn no_match_fails_row() {
        let resolver = Arc::new(ScriptedResolver::default());
        let queue = recognizer(resolver);
        queue.enqueue(&attachment(5));
        queue.wait_idle().await;

        let row = queue.row(ItemId(5)).unwrap();
        assert_eq!(row.status, RowStatus::Failed);
        assert_eq!(row.message, NO_MATCH_MESSAGE);
    }

    #[tokio::test(start_paused = true)]
    async fn offline_worker_polls_until_online() {
        let resolver = Arc::new(ScriptedResolver::default());
        let network = Arc::new(FlakyNetwork {
            offline_checks: AtomicUsize::new(2),
        });
        let queue = Recognizer::new(resolver.clone(), network, RecognizerSettings::default());

        let start = Instant::now();
        queue.enqueue(&attachment(1));
        queue.wait_idle().await;

        let calls = resolver.calls.lock().unwrap().clone();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].1 - start, Duration::from_secs(10));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_before_start_processes_nothing() {
        let resolver = Arc::new(ScriptedResolver::default());
        let queue = recognizer(resolver.clone());
        let (observer, mut rx) = ChannelObserver::new();
        queue.add_observer(Arc::new(observer));

        queue.recognize_items(&[attachment(1), attachment(2)]);
        queue.cancel_all();
        queue.wait_idle().await;

        assert!(resolver.called_ids().is_empty());
        assert_eq!(queue.total_count(), 0);
        assert_eq!(drain(&mut rx).last(), Some(&RowEvent::Empty));
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_discards_in_flight_result() {
        let resolver = Arc::new(
            ScriptedResolver::default().with(1, vec![Outcome::Slow(Duration::from_secs(10))]),
        );
        let queue = recognizer(resolver.clone());
        let (observer, mut rx) = ChannelObserver::new();
        queue.add_observer(Arc::new(observer));

        queue.enqueue(&attachment(1));
        tokio::time::sleep(Duration::from_secs(1)).await;
        assert_eq!(queue.row(ItemId(1)).unwrap().status, RowStatus::Processing);

        queue.cancel_all();
        queue.wait_idle().await;

        assert_eq!(resolver.called_ids(), vec![1]);
        assert_eq!(queue.total_count(), 0);
        let events = drain(&mut rx);
        assert!(!events.iter().any(|e| matches!(e, RowEvent::Updated(s) if s.status == RowStatus::Succeeded)));
    }

    #[tokio::test(start_paused = true)]
    async fn delete_last_row_fires_empty() {
        let resolver = Arc::new(ScriptedResolver::default());
        let queue = recognizer(resolver);
        queue.enqueue(&attachment(1));
        queue.wait_idle().await;

        let (observer, mut rx) = ChannelObserver::new();
        queue.add_observer(Arc::new(observer));
        assert!(queue.delete_row(ItemId(1)));
        assert!(!queue.delete_row(ItemId(1)));

        let events = drain(&mut rx);
        assert!(matches!(events.as_slice(), [RowEvent::Deleted(_), RowEvent::Empty]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_enqueues_notify_in_mutation_order() {
        let resolver = Arc::new(ScriptedResolver::default());
        let queue = recognizer(resolver);
        let (observer, mut rx) = ChannelObserver::new();
        queue.add_observer(Arc::new(observer));

        let producers: Vec<_> = (0..8)
            .map(|batch| {
                let queue = queue.clone();
                tokio::spawn(async move {
                    for n in 0..25 {
                        queue.enqueue(&attachment(batch * 100 + n + 1));
                        tokio::task::yield_now().await;
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.await.unwrap();
        }
        queue.wait_idle().await;

        let mut seen = HashMap::new();
        for event in drain(&mut rx) {
            match event {
                RowEvent::Added(row) => {
                    assert!(seen.insert(row.id, row.status).is_none(), "{:?} added twice", row.id);
                }
                RowEvent::Updated(row) => {
                    assert!(seen.contains_key(&row.id), "{:?} updated before added", row.id);
                    seen.insert(row.id, row.status);
                }
                other => assert!(!matches!(other, RowEvent::Deleted(_)), "unexpected {other:?}"),
            }
        }
        assert_eq!(seen.len(), 200);
        assert!(seen.values().all(|status| *status == RowStatus::Failed));
    }

    mod end_to_end {
        use std::path::Path;

        use biblioscope_core::Database;
        use tempfile::TempDir;

        use super::*;
        use crate::error::{Result, ScienceError};
        use crate::extract::TextExtractor;
        use crate::recognize::{RemoteRecognizer, RemoteResponse, ResolverSettings};
        use crate::sources::{SearchQuery, StructuredSearch};
        use crate::store::SqliteItemStore;

        struct StaticText;

        #[async_trait]
        impl TextExtractor for StaticText {
            async fn extract_lines(&self, _pdf_path: &Path, _max_pages: u32) -> Result<Vec<String>> {
                Ok(vec![
                    "Journal of Examples".to_string(),
                    "A Study of Things".to_string(),
                    "https://doi.org/10.1000/xyz.".to_string(),
                ])
            }
        }

        struct DoiOnly;

        #[async_trait]
        impl StructuredSearch for DoiOnly {
            async fn search(&self, query: &SearchQuery) -> Result<Vec<CandidateRecord>> {
                match query {
                    SearchQuery::Doi(doi) if doi == "10.1000/xyz" => Ok(vec![
                        CandidateRecord::new(ItemType::JournalArticle, "A Study of Things")
                            .with_catalog("CrossRef"),
                    ]),
                    _ => Err(ScienceError::ApiError("test".into(), "unexpected".into())),
                }
            }
        }

        struct NoRemote;

        #[async_trait]
        impl RemoteRecognizer for NoRemote {
            async fn recognize(&self, _hash: &str, _text: &str) -> Result<Option<RemoteResponse>> {
                panic!("DOI lookup should have matched");
            }
        }

        #[tokio::test(start_paused = true)]
        async fn doi_path_creates_parent_and_reports_rows() {
            let dir = TempDir::new().unwrap();
            let pdf = dir.path().join("paper.pdf");
            std::fs::write(&pdf, b"%PDF-1.4").unwrap();

            let db = Arc::new(Database::open_in_memory().unwrap());
            let collection = db.create_collection("Reading").unwrap();
            let att = db
                .add_attachment("paper.pdf", Some(&pdf.to_string_lossy()), PDF_CONTENT_TYPE)
                .unwrap();
            db.add_to_collection(collection.id, att.id).unwrap();

            let resolver = MetadataResolver::new(
                Arc::new(SqliteItemStore::new(Arc::clone(&db))),
                Arc::new(StaticText),
                Arc::new(DoiOnly),
                ResolverSettings::default(),
            )
            .with_remote(Arc::new(NoRemote));
            let queue = Recognizer::new(
                Arc::new(resolver),
                Arc::new(AlwaysOnline),
                RecognizerSettings::default(),
            );
            let (observer, mut rx) = ChannelObserver::new();
            queue.add_observer(Arc::new(observer));

            queue.enqueue(&att);
            queue.wait_idle().await;

            let snapshot = |status, message: &str| RowSnapshot {
                id: att.id,
                status,
                message: message.to_string(),
            };
            assert_eq!(
                drain(&mut rx),
                vec![
                    RowEvent::Added(snapshot(RowStatus::Queued, "")),
                    RowEvent::NonEmpty,
                    RowEvent::Updated(snapshot(RowStatus::Processing, "processing")),
                    RowEvent::Updated(snapshot(RowStatus::Succeeded, "A Study of Things")),
                ]
            );

            let reparented = db.get_attachment(att.id).unwrap().unwrap();
            let parent = reparented.parent_id.unwrap();
            let record = db.get_record(parent).unwrap().unwrap();
            assert_eq!(record.title, "A Study of Things");
            assert_eq!(record.library_catalog.as_deref(), Some("CrossRef"));
            let collections: Vec<String> = db
                .item_collections(parent)
                .unwrap()
                .into_iter()
                .map(|c| c.name)
                .collect();
            assert_eq!(collections, vec!["Reading"]);
        }
    }
}
