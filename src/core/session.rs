/*!
 * Browser session: the single owner of navigation state
 *
 * The presentation layer talks to a running [`Session`] through a
 * [`SessionHandle`]: [`Intent`]s go in, [`SessionEvent`]s come out. Every
 * store call runs on its own spawned task and reports back over a channel;
 * only the session loop applies results to the [`Navigator`].
 *
 * ```no_run
 * use s3nav::core::navigator::NavigationConfig;
 * use s3nav::core::session::{Intent, Session};
 * use s3nav::protocol::s3::MemoryStore;
 * use std::sync::Arc;
 *
 * # #[tokio::main]
 * # async fn main() {
 * let (mut handle, _task) = Session::spawn(Arc::new(MemoryStore::new()), NavigationConfig::default());
 * handle.send(Intent::Connect).await.unwrap();
 * let events = handle.recv_until_settled().await.unwrap();
 * println!("{:?}", events.last());
 * # }
 * ```
 */

use super::navigator::{
    execute, FileInfo, LargeFolderChoice, LargeFolderPrompt, NavError, NavigationConfig,
    NavigationSnapshot, Navigator, Outcome, Request, Status, Step,
};
use super::entry::Location;
use super::upload::{UploadJob, UploadProgress, UploadReport, Uploader};
use crate::protocol::s3::{ObjectStore, S3Result};
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Capacity of the intent queue
const INTENT_QUEUE: usize = 32;

/// Requests from the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Intent {
    /// List buckets, (re)establishing the session
    Connect,
    /// Jump to a location without walking there
    Open(Location),
    /// Activate the entry at this index of the last snapshot
    Select(usize),
    /// Answer the large-folder prompt
    Choose(LargeFolderChoice),
    /// Close the large-folder prompt
    Dismiss,
    /// Abort the in-flight listing
    Cancel,
    /// Re-list the current location
    Reload,
    /// Upload local files into the current location
    Upload(Vec<PathBuf>),
    Shutdown,
}

/// Notifications for the presentation layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    Snapshot(NavigationSnapshot),
    LargeFolder(LargeFolderPrompt),
    FileInfo(FileInfo),
    Error(String),
    UploadProgress(UploadProgress),
    UploadFinished(UploadReport),
}

#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("browser session has shut down")]
pub struct SessionClosed;

/// Presentation side of a session
#[derive(Debug)]
pub struct SessionHandle {
    intents: mpsc::Sender<Intent>,
    events: mpsc::UnboundedReceiver<SessionEvent>,
}

impl SessionHandle {
    pub async fn send(&self, intent: Intent) -> Result<(), SessionClosed> {
        self.intents.send(intent).await.map_err(|_| SessionClosed)
    }

    pub async fn next_event(&mut self) -> Option<SessionEvent> {
        self.events.recv().await
    }

    pub fn try_next_event(&mut self) -> Option<SessionEvent> {
        self.events.try_recv().ok()
    }

    /// Collect events up to and including the next snapshot that is not loading
    pub async fn recv_until_settled(&mut self) -> Option<Vec<SessionEvent>> {
        let mut events = Vec::new();
        loop {
            let event = self.events.recv().await?;
            let settled = matches!(
                &event,
                SessionEvent::Snapshot(snapshot) if snapshot.status != Status::Loading
            );
            events.push(event);
            if settled {
                return Some(events);
            }
        }
    }

    /// Like [`recv_until_settled`](Self::recv_until_settled), but sends
    /// [`Intent::Cancel`] once `interrupt` completes
    ///
    /// Events already received are kept; the settled snapshot after a cancel
    /// shows the location from before the request.
    pub async fn recv_until_settled_or_cancel<F>(
        &mut self,
        interrupt: F,
    ) -> Option<Vec<SessionEvent>>
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(interrupt);
        let mut interrupted = false;
        let mut events = Vec::new();
        loop {
            tokio::select! {
                event = self.events.recv() => {
                    let event = event?;
                    let settled = matches!(
                        &event,
                        SessionEvent::Snapshot(snapshot) if snapshot.status != Status::Loading
                    );
                    events.push(event);
                    if settled {
                        return Some(events);
                    }
                }
                _ = &mut interrupt, if !interrupted => {
                    interrupted = true;
                    debug!("interrupted; cancelling");
                    self.intents.send(Intent::Cancel).await.ok()?;
                }
            }
        }
    }

    /// Wait for the running upload to finish, dropping everything else
    pub async fn recv_upload_report(&mut self) -> Option<UploadReport> {
        loop {
            if let SessionEvent::UploadFinished(report) = self.events.recv().await? {
                return Some(report);
            }
        }
    }
}

/// The state-owning loop
pub struct Session {
    navigator: Navigator,
    store: Arc<dyn ObjectStore>,
    uploader: Uploader,
    intents: mpsc::Receiver<Intent>,
    events: mpsc::UnboundedSender<SessionEvent>,
    outcomes_tx: mpsc::UnboundedSender<(u64, S3Result<Outcome>)>,
    outcomes_rx: mpsc::UnboundedReceiver<(u64, S3Result<Outcome>)>,
    progress_tx: mpsc::UnboundedSender<UploadProgress>,
    progress_rx: mpsc::UnboundedReceiver<UploadProgress>,
    uploads_tx: mpsc::UnboundedSender<S3Result<UploadJob>>,
    uploads_rx: mpsc::UnboundedReceiver<S3Result<UploadJob>>,
    in_flight: Option<CancellationToken>,
    uploading: bool,
}

impl Session {
    pub fn new(store: Arc<dyn ObjectStore>, config: NavigationConfig) -> (Self, SessionHandle) {
        let (intent_tx, intent_rx) = mpsc::channel(INTENT_QUEUE);
        let (event_tx, event_rx) = mpsc::unbounded_channel();
        let (outcomes_tx, outcomes_rx) = mpsc::unbounded_channel();
        let (progress_tx, progress_rx) = mpsc::unbounded_channel();
        let (uploads_tx, uploads_rx) = mpsc::unbounded_channel();

        let session = Self {
            navigator: Navigator::new(config),
            uploader: Uploader::new(Arc::clone(&store)),
            store,
            intents: intent_rx,
            events: event_tx,
            outcomes_tx,
            outcomes_rx,
            progress_tx,
            progress_rx,
            uploads_tx,
            uploads_rx,
            in_flight: None,
            uploading: false,
        };
        let handle = SessionHandle {
            intents: intent_tx,
            events: event_rx,
        };
        (session, handle)
    }

    /// Start a session on the current tokio runtime
    pub fn spawn(
        store: Arc<dyn ObjectStore>,
        config: NavigationConfig,
    ) -> (SessionHandle, JoinHandle<()>) {
        let (session, handle) = Self::new(store, config);
        (handle, tokio::spawn(session.run()))
    }

    /// Process intents and results until shutdown or every handle is dropped
    pub async fn run(mut self) {
        debug!("session started");
        loop {
            tokio::select! {
                // Progress is drained before the matching completion
                biased;
                intent = self.intents.recv() => match intent {
                    Some(Intent::Shutdown) | None => break,
                    Some(intent) => self.handle_intent(intent),
                },
                Some((id, result)) = self.outcomes_rx.recv() => self.handle_outcome(id, result),
                Some(progress) = self.progress_rx.recv() => {
                    self.emit(SessionEvent::UploadProgress(progress));
                }
                Some(result) = self.uploads_rx.recv() => self.handle_upload_done(result),
            }
        }

        if let Some(token) = self.in_flight.take() {
            token.cancel();
        }
        debug!("session stopped");
    }

    fn handle_intent(&mut self, intent: Intent) {
        debug!(?intent, "intent");
        let result = match intent {
            Intent::Connect => self.navigator.connect().map(Step::Run),
            Intent::Open(location) => self.navigator.open(location).map(Step::Run),
            Intent::Select(index) => self.navigator.select(index),
            Intent::Choose(choice) => self.navigator.choose(choice).map(Step::Run),
            Intent::Dismiss => self.navigator.dismiss().map(|_| Step::Done),
            Intent::Reload => self.navigator.reload().map(Step::Run),
            Intent::Cancel => {
                // Nothing in flight: the last snapshot already settled
                if !self.navigator.cancel() {
                    debug!("nothing to cancel");
                    return;
                }
                if let Some(token) = self.in_flight.take() {
                    token.cancel();
                }
                Ok(Step::Done)
            }
            Intent::Upload(sources) => {
                self.start_upload(sources);
                return;
            }
            Intent::Shutdown => return,
        };

        match result {
            Ok(step) => self.follow(step),
            Err(err) => self.reject(err),
        }
        self.emit_snapshot();
    }

    fn handle_outcome(&mut self, id: u64, result: S3Result<Outcome>) {
        // Cancelled requests already produced their settled snapshot
        if !self.navigator.awaits(id) {
            debug!(id, "dropping outcome of a cancelled request");
            return;
        }
        let step = self.navigator.apply(id, result);
        if !self.navigator.is_loading() {
            self.in_flight = None;
        }
        self.follow(step);
        self.emit_snapshot();
    }

    fn follow(&mut self, step: Step) {
        match step {
            Step::Done => {}
            Step::Run(request) => self.dispatch(request),
            Step::Prompt(prompt) => self.emit(SessionEvent::LargeFolder(prompt)),
            Step::File(info) => self.emit(SessionEvent::FileInfo(info)),
            Step::Failed(err) => self.emit(SessionEvent::Error(err.to_string())),
        }
    }

    fn reject(&mut self, err: NavError) {
        debug!(error = %err, "intent rejected");
        self.emit(SessionEvent::Error(err.to_string()));
    }

    fn dispatch(&mut self, request: Request) {
        let token = CancellationToken::new();
        self.in_flight = Some(token.clone());

        let store = Arc::clone(&self.store);
        let outcomes = self.outcomes_tx.clone();
        tokio::spawn(async move {
            let result = execute(store.as_ref(), request.command, &token).await;
            let _ = outcomes.send((request.id, result));
        });
    }

    fn start_upload(&mut self, sources: Vec<PathBuf>) {
        if self.uploading {
            self.emit(SessionEvent::Error("an upload is already running".to_string()));
            return;
        }
        self.uploading = true;

        let destination = self.navigator.location().clone();
        info!(%destination, files = sources.len(), "upload requested");

        let uploader = self.uploader.clone();
        let progress = self.progress_tx.clone();
        let done = self.uploads_tx.clone();
        tokio::spawn(async move {
            let result = uploader.upload(sources, destination, Some(progress)).await;
            let _ = done.send(result);
        });
    }

    fn handle_upload_done(&mut self, result: S3Result<UploadJob>) {
        self.uploading = false;
        match result {
            Ok(job) => {
                self.emit(SessionEvent::UploadFinished(job.report()));
                // Show the new objects if we are still looking at the destination
                if &job.destination == self.navigator.location() && !self.navigator.is_loading() {
                    if let Ok(request) = self.navigator.reload() {
                        self.dispatch(request);
                    }
                }
                self.emit_snapshot();
            }
            Err(err) => {
                warn!(error = %err, "upload rejected");
                self.emit(SessionEvent::Error(err.to_string()));
            }
        }
    }

    fn emit_snapshot(&self) {
        self.emit(SessionEvent::Snapshot(self.navigator.snapshot()));
    }

    fn emit(&self, event: SessionEvent) {
        // A closed receiver means the surface is gone; the loop ends on its own
        let _ = self.events.send(event);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::entry::Entry;
    use crate::protocol::s3::{MemoryStore, StoreOp};
    use std::time::Duration;

    fn last_snapshot(events: &[SessionEvent]) -> NavigationSnapshot {
        events
            .iter()
            .rev()
            .find_map(|e| match e {
                SessionEvent::Snapshot(s) => Some(s.clone()),
                _ => None,
            })
            .unwrap()
    }

    #[tokio::test]
    async fn test_connect_and_descend() {
        let store = MemoryStore::new();
        store.add_object("assets", "img/a.png", b"");
        let (mut handle, _task) = Session::spawn(Arc::new(store), NavigationConfig::default());

        handle.send(Intent::Connect).await.unwrap();
        let snapshot = last_snapshot(&handle.recv_until_settled().await.unwrap());
        assert!(snapshot.connected);
        assert_eq!(snapshot.entries, vec![Entry::bucket("assets")]);

        handle.send(Intent::Select(0)).await.unwrap();
        let snapshot = last_snapshot(&handle.recv_until_settled().await.unwrap());
        assert_eq!(snapshot.location, Location::bucket("assets"));
        assert_eq!(snapshot.entries[0], Entry::parent_link());
    }

    #[tokio::test]
    async fn test_cancel_restores_previous_state() {
        let store = MemoryStore::new();
        store.add_object("b", "k", b"");
        let (mut handle, _task) =
            Session::spawn(Arc::new(store.clone()), NavigationConfig::default());

        handle.send(Intent::Connect).await.unwrap();
        let before = last_snapshot(&handle.recv_until_settled().await.unwrap());

        store.set_latency(Duration::from_secs(30));
        handle.send(Intent::Select(0)).await.unwrap();
        handle.send(Intent::Cancel).await.unwrap();

        let after = last_snapshot(&handle.recv_until_settled().await.unwrap());
        assert_eq!(after.status, Status::Idle);
        assert_eq!(after.location, before.location);
        assert_eq!(after.entries, before.entries);
    }

    #[tokio::test]
    async fn test_interrupt_cancels_and_settles_once() {
        let store = MemoryStore::new();
        store.add_object("b", "k", b"");
        let (mut handle, _task) =
            Session::spawn(Arc::new(store.clone()), NavigationConfig::default());

        handle.send(Intent::Connect).await.unwrap();
        let before = last_snapshot(&handle.recv_until_settled().await.unwrap());

        store.set_latency(Duration::from_secs(30));
        handle.send(Intent::Select(0)).await.unwrap();
        let events = tokio::time::timeout(
            Duration::from_secs(5),
            handle.recv_until_settled_or_cancel(tokio::time::sleep(Duration::from_millis(50))),
        )
        .await
        .unwrap()
        .unwrap();

        assert!(matches!(&events[0], SessionEvent::Snapshot(s) if s.status == Status::Loading));
        let after = last_snapshot(&events);
        assert_eq!(after.status, Status::Idle);
        assert_eq!(after.location, before.location);
        assert_eq!(after.entries, before.entries);

        // The aborted listing reports nothing more
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert_eq!(handle.try_next_event(), None);
    }

    #[tokio::test]
    async fn test_cancel_while_idle_emits_nothing() {
        let store = MemoryStore::new();
        store.add_object("b", "k", b"");
        let (mut handle, _task) = Session::spawn(Arc::new(store), NavigationConfig::default());

        handle.send(Intent::Connect).await.unwrap();
        handle.recv_until_settled().await.unwrap();

        handle.send(Intent::Cancel).await.unwrap();
        handle.send(Intent::Select(0)).await.unwrap();
        let events = handle.recv_until_settled().await.unwrap();
        assert!(matches!(&events[0], SessionEvent::Snapshot(s) if s.status == Status::Loading));
        assert_eq!(last_snapshot(&events).location, Location::bucket("b"));
    }

    #[tokio::test]
    async fn test_rejected_intent_reports_error() {
        let (mut handle, _task) =
            Session::spawn(Arc::new(MemoryStore::new()), NavigationConfig::default());

        handle.send(Intent::Select(0)).await.unwrap();
        let events = handle.recv_until_settled().await.unwrap();
        assert!(events.contains(&SessionEvent::Error(NavError::NotConnected.to_string())));
    }

    #[tokio::test]
    async fn test_upload_refreshes_destination() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.txt");
        std::fs::write(&file, b"fresh").unwrap();

        let store = MemoryStore::new();
        store.create_bucket("b");
        let (mut handle, _task) =
            Session::spawn(Arc::new(store.clone()), NavigationConfig::default());

        handle.send(Intent::Connect).await.unwrap();
        handle.recv_until_settled().await.unwrap();
        handle.send(Intent::Select(0)).await.unwrap();
        handle.recv_until_settled().await.unwrap();

        handle.send(Intent::Upload(vec![file])).await.unwrap();
        let report = handle.recv_upload_report().await.unwrap();
        assert_eq!(report.succeeded, 1);

        let snapshot = last_snapshot(&handle.recv_until_settled().await.unwrap());
        assert!(snapshot.entries.contains(&Entry::file("new.txt", "new.txt")));
        assert_eq!(store.calls(StoreOp::PutObject), 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_handle() {
        let (handle, task) =
            Session::spawn(Arc::new(MemoryStore::new()), NavigationConfig::default());
        handle.send(Intent::Shutdown).await.unwrap();
        task.await.unwrap();
        assert_eq!(handle.send(Intent::Connect).await, Err(SessionClosed));
    }
}
