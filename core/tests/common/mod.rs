#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::Mutex;
use quire_core::report::{ErrorKind, ErrorReporter};
use quire_core::session::{Session, SessionContext, Window};
use quire_core::storage::{Document, DocumentContent, DocumentStore, Error, OperationResult, Result};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Call {
    GetDocument(String),
    GetContent(String),
    Rename { id: String, old: String, new: String },
    UpdateContent { id: String, text: String, structured: String },
    UpdateAll { id: String, title: String, text: String, structured: String },
    SetOpen(String, bool),
}

/// In-memory store that records every call.
///
/// Renames succeed with the trimmed title unless a result was queued. Mutating calls take
/// `delay` to complete unless a per-call delay was set.
pub struct RecordingStore {
    pub document: Mutex<Document>,
    pub content: Mutex<Option<String>>,
    calls: Mutex<Vec<Call>>,
    rename_results: Mutex<VecDeque<OperationResult<String>>>,
    content_result: Mutex<OperationResult>,
    update_all_result: Mutex<OperationResult>,
    delay: Mutex<Duration>,
    content_delay: Mutex<Option<Duration>>,
    update_all_delay: Mutex<Option<Duration>>,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
}

impl RecordingStore {
    pub fn new(document: Document, content: Option<&str>) -> Self {
        RecordingStore {
            document: Mutex::new(document),
            content: Mutex::new(content.map(str::to_string)),
            calls: Mutex::new(Vec::new()),
            rename_results: Mutex::new(VecDeque::new()),
            content_result: Mutex::new(OperationResult::Success(())),
            update_all_result: Mutex::new(OperationResult::Success(())),
            delay: Mutex::new(Duration::ZERO),
            content_delay: Mutex::new(None),
            update_all_delay: Mutex::new(None),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
        }
    }

    /// `{id: "n1", title: "Old", text: "", structured: "{}"}`
    pub fn scenario() -> Self {
        let document = Document {
            id: "n1".into(),
            title: "Old".into(),
            text_content: String::new(),
            structured_content: "{}".into(),
            is_open: false,
        };
        RecordingStore::new(document, Some("{}"))
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().clone()
    }

    pub fn renames(&self) -> Vec<(String, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Rename { old, new, .. } => Some((old, new)),
                _ => None,
            })
            .collect()
    }

    pub fn content_updates(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::UpdateContent { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn update_alls(&self) -> Vec<Call> {
        self.calls()
            .into_iter()
            .filter(|call| matches!(call, Call::UpdateAll { .. }))
            .collect()
    }

    pub fn queue_rename_result(&self, result: OperationResult<String>) {
        self.rename_results.lock().push_back(result);
    }

    pub fn set_content_result(&self, result: OperationResult) {
        *self.content_result.lock() = result;
    }

    pub fn set_update_all_result(&self, result: OperationResult) {
        *self.update_all_result.lock() = result;
    }

    pub fn set_delay(&self, delay: Duration) {
        *self.delay.lock() = delay;
    }

    pub fn set_content_delay(&self, delay: Duration) {
        *self.content_delay.lock() = Some(delay);
    }

    pub fn set_update_all_delay(&self, delay: Duration) {
        *self.update_all_delay.lock() = Some(delay);
    }

    /// Most mutating calls that were running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::SeqCst)
    }

    fn record(&self, call: Call) {
        self.calls.lock().push(call);
    }

    async fn wait(&self, specific: Option<Duration>) {
        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let delay = specific.unwrap_or(*self.delay.lock());
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl DocumentStore for RecordingStore {
    async fn get_document(&self, id: &str) -> Result<Document> {
        self.record(Call::GetDocument(id.into()));
        let document = self.document.lock().clone();
        if document.id == id { Ok(document) } else { Err(Error::NotFound(id.into())) }
    }

    async fn get_document_content(&self, id: &str) -> Result<DocumentContent> {
        self.record(Call::GetContent(id.into()));
        Ok(DocumentContent { content: self.content.lock().clone() })
    }

    async fn rename_document(
        &self,
        id: &str,
        old_title: &str,
        new_title: &str,
    ) -> OperationResult<String> {
        self.record(Call::Rename { id: id.into(), old: old_title.into(), new: new_title.into() });
        self.wait(None).await;
        let result = self
            .rename_results
            .lock()
            .pop_front()
            .unwrap_or_else(|| OperationResult::Success(new_title.trim().to_string()));
        if let OperationResult::Success(title) = &result {
            self.document.lock().title = title.clone();
        }
        result
    }

    async fn update_content(
        &self,
        id: &str,
        text_content: &str,
        structured_content: &str,
    ) -> OperationResult {
        self.record(Call::UpdateContent {
            id: id.into(),
            text: text_content.into(),
            structured: structured_content.into(),
        });
        let delay = *self.content_delay.lock();
        self.wait(delay).await;
        let result = self.content_result.lock().clone();
        if result.is_success() {
            self.document.lock().text_content = text_content.into();
            *self.content.lock() = Some(structured_content.into());
        }
        result
    }

    async fn update_all(
        &self,
        id: &str,
        title: &str,
        text_content: &str,
        structured_content: &str,
    ) -> OperationResult {
        self.record(Call::UpdateAll {
            id: id.into(),
            title: title.into(),
            text: text_content.into(),
            structured: structured_content.into(),
        });
        let delay = *self.update_all_delay.lock();
        self.wait(delay).await;
        let result = self.update_all_result.lock().clone();
        if result.is_success() {
            let mut document = self.document.lock();
            document.title = title.into();
            document.text_content = text_content.into();
            *self.content.lock() = Some(structured_content.into());
        }
        result
    }

    async fn set_open(&self, id: &str, is_open: bool) {
        self.record(Call::SetOpen(id.into(), is_open));
        self.wait(Some(Duration::ZERO)).await;
        self.document.lock().is_open = is_open;
    }
}

#[derive(Debug, Default)]
pub struct RecordingReporter {
    reports: Mutex<Vec<(ErrorKind, String)>>,
}

impl RecordingReporter {
    pub fn reports(&self) -> Vec<(ErrorKind, String)> {
        self.reports.lock().clone()
    }

    pub fn kinds(&self) -> Vec<ErrorKind> {
        self.reports.lock().iter().map(|(kind, _)| *kind).collect()
    }
}

impl ErrorReporter for RecordingReporter {
    fn report(&self, kind: ErrorKind, context: &str) {
        self.reports.lock().push((kind, context.to_string()));
    }
}

#[derive(Debug, Default)]
pub struct RecordingWindow {
    suppressed: AtomicUsize,
    closed: AtomicUsize,
}

impl RecordingWindow {
    pub fn suppressed(&self) -> usize {
        self.suppressed.load(Ordering::SeqCst)
    }

    pub fn closed(&self) -> usize {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Window for RecordingWindow {
    fn suppress_close(&self) {
        self.suppressed.fetch_add(1, Ordering::SeqCst);
    }

    fn close(&self) {
        self.closed.fetch_add(1, Ordering::SeqCst);
    }
}

/// A store plus recording reporter and window.
pub struct Harness<S: DocumentStore + 'static = RecordingStore> {
    pub store: Arc<S>,
    pub reporter: Arc<RecordingReporter>,
    pub window: Arc<RecordingWindow>,
}

impl<S: DocumentStore + 'static> Harness<S> {
    pub fn new(store: S) -> Self {
        Harness {
            store: Arc::new(store),
            reporter: Arc::new(RecordingReporter::default()),
            window: Arc::new(RecordingWindow::default()),
        }
    }

    pub fn context(&self) -> SessionContext {
        SessionContext::new(self.store.clone(), self.reporter.clone(), self.window.clone())
    }

    pub async fn open(&self, id: &str) -> Session {
        Session::open(id, self.context()).await.expect("session should open")
    }
}
