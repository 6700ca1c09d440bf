/*!
 * Navigation controller
 *
 * A pure state machine over [`Location`]s. Selecting an entry never does I/O
 * here; it yields a [`Request`] that the caller runs with [`execute`] (on any
 * task it likes) and feeds back through [`Navigator::apply`]. Only the owner
 * of the `Navigator` mutates navigation state.
 *
 * Loads into a bucket go through the large-folder policy: an estimate first,
 * then either a full listing or a [`LargeFolderPrompt`] the user answers with
 * a [`LargeFolderChoice`].
 */

use super::entry::{Entry, EntryKind, Location, PageResult};
use crate::protocol::s3::{
    CountEstimate, ListRequest, ObjectStore, S3Error, S3Result, ESTIMATE_PAGE_CAP,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Estimates above this trigger the large-folder prompt
pub const DEFAULT_LARGE_FOLDER_THRESHOLD: u64 = 1000;

/// Page size for the "folders only" choice
pub const DEFAULT_FOLDERS_ONLY_PAGE_SIZE: usize = 100;

/// Page size for the "first items" choice and each "load more"
pub const DEFAULT_FIRST_ITEMS_PAGE_SIZE: usize = 500;

/// Tunables for listing and the large-folder policy
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationConfig {
    /// Largest estimate that still gets a full listing
    ///
    /// The estimate reads a single page of 1000 keys, so anything above
    /// that cannot be told apart and acts as 1000.
    pub large_folder_threshold: u64,

    pub folders_only_page_size: usize,

    pub first_items_page_size: usize,

    /// Page size used while walking a full listing
    pub page_size: usize,
}

impl NavigationConfig {
    /// Threshold actually compared against an estimate
    pub fn effective_threshold(&self) -> u64 {
        self.large_folder_threshold.min(ESTIMATE_PAGE_CAP as u64)
    }
}

impl Default for NavigationConfig {
    fn default() -> Self {
        Self {
            large_folder_threshold: DEFAULT_LARGE_FOLDER_THRESHOLD,
            folders_only_page_size: DEFAULT_FOLDERS_ONLY_PAGE_SIZE,
            first_items_page_size: DEFAULT_FIRST_ITEMS_PAGE_SIZE,
            page_size: crate::protocol::s3::MAX_PAGE_SIZE,
        }
    }
}

/// Errors from driving the navigator
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum NavError {
    #[error("a listing is already in progress")]
    Busy,

    #[error("not connected to the object store")]
    NotConnected,

    #[error("no selectable entry at index {0}")]
    InvalidSelection(usize),

    #[error("no large-folder choice is pending")]
    NoPendingChoice,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "message", rename_all = "lowercase")]
pub enum Status {
    Idle,
    Loading,
    Error(String),
}

/// How to show a folder whose estimate crossed the threshold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum LargeFolderChoice {
    /// One bounded page, folders only
    FoldersOnly,
    /// One bounded page plus a "load more" placeholder
    FirstItems,
}

/// Raised instead of listing when a folder looks too large
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LargeFolderPrompt {
    pub location: Location,
    /// Lower bound; the store only counted one page
    pub estimate: u64,
}

/// Metadata surfaced when a file is selected
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FileInfo {
    pub name: String,
    pub bucket: String,
    pub key: String,
}

/// Work for the object store, produced by the navigator
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    ListBuckets,
    Estimate {
        location: Location,
    },
    ListAll {
        location: Location,
        page_size: usize,
    },
    FoldersOnly {
        location: Location,
        page_size: usize,
    },
    FirstItems {
        location: Location,
        page_size: usize,
        estimate: u64,
    },
    LoadMore {
        location: Location,
        cursor: String,
        page_size: usize,
        estimate: u64,
    },
}

/// Result of running a [`Command`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Buckets(Vec<String>),
    Estimated {
        location: Location,
        estimate: CountEstimate,
    },
    Listed {
        location: Location,
        entries: Vec<Entry>,
    },
    FoldersOnly {
        location: Location,
        folders: Vec<Entry>,
    },
    FirstItems {
        location: Location,
        page: PageResult,
        estimate: u64,
    },
    MoreItems {
        location: Location,
        page: PageResult,
        estimate: u64,
    },
}

/// A command tagged with the id its outcome must carry back
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Request {
    pub id: u64,
    pub command: Command,
}

/// What the caller should do next
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    /// Nothing further; render the new snapshot
    Done,
    /// Run another request (the navigator stays loading)
    Run(Request),
    /// Ask the user how to show a large folder
    Prompt(LargeFolderPrompt),
    /// A file was selected
    File(FileInfo),
    /// The last request failed; state is unchanged
    Failed(S3Error),
}

/// Read-only view handed to the presentation layer
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NavigationSnapshot {
    pub location: Location,
    pub entries: Vec<Entry>,
    pub status: Status,
    pub connected: bool,
    pub prompt: Option<LargeFolderPrompt>,
}

#[derive(Debug, Clone)]
struct PagingCursor {
    token: String,
    estimate: u64,
}

/// Owns the current location and its entries
#[derive(Debug)]
pub struct Navigator {
    config: NavigationConfig,
    location: Location,
    entries: Vec<Entry>,
    status: Status,
    connected: bool,
    prompt: Option<LargeFolderPrompt>,
    cursor: Option<PagingCursor>,
    in_flight: Option<u64>,
    next_id: u64,
}

impl Navigator {
    pub fn new(config: NavigationConfig) -> Self {
        if config.large_folder_threshold > ESTIMATE_PAGE_CAP as u64 {
            warn!(
                threshold = config.large_folder_threshold,
                cap = ESTIMATE_PAGE_CAP,
                "large folder threshold is above the estimate page; using the cap"
            );
        }
        Self {
            config,
            location: Location::root(),
            entries: Vec::new(),
            status: Status::Idle,
            connected: false,
            prompt: None,
            cursor: None,
            in_flight: None,
            next_id: 0,
        }
    }

    pub fn config(&self) -> &NavigationConfig {
        &self.config
    }

    pub fn location(&self) -> &Location {
        &self.location
    }

    pub fn entries(&self) -> &[Entry] {
        &self.entries
    }

    pub fn status(&self) -> &Status {
        &self.status
    }

    pub fn is_connected(&self) -> bool {
        self.connected
    }

    pub fn is_loading(&self) -> bool {
        self.status == Status::Loading
    }

    pub fn pending_prompt(&self) -> Option<&LargeFolderPrompt> {
        self.prompt.as_ref()
    }

    pub fn snapshot(&self) -> NavigationSnapshot {
        NavigationSnapshot {
            location: self.location.clone(),
            entries: self.entries.clone(),
            status: self.status.clone(),
            connected: self.connected,
            prompt: self.prompt.clone(),
        }
    }

    /// Start (or restart) a session by listing buckets
    pub fn connect(&mut self) -> Result<Request, NavError> {
        self.ensure_idle()?;
        self.prompt = None;
        Ok(self.issue(Command::ListBuckets))
    }

    /// Reload whatever is currently shown
    pub fn reload(&mut self) -> Result<Request, NavError> {
        self.ensure_idle()?;
        self.ensure_connected()?;
        self.prompt = None;
        let location = self.location.clone();
        Ok(self.load(location))
    }

    /// Jump straight to `location`, as a command-line argument would
    ///
    /// Does not require a prior `connect`; a successful listing marks the
    /// navigator connected.
    pub fn open(&mut self, location: Location) -> Result<Request, NavError> {
        self.ensure_idle()?;
        self.prompt = None;
        Ok(self.load(location))
    }

    /// React to the user picking the entry at `index`
    ///
    /// A pending large-folder prompt is dismissed by any new selection.
    pub fn select(&mut self, index: usize) -> Result<Step, NavError> {
        self.ensure_idle()?;
        self.ensure_connected()?;

        let entry = self
            .entries
            .get(index)
            .cloned()
            .ok_or(NavError::InvalidSelection(index))?;
        self.prompt = None;

        let step = match entry {
            Entry::Bucket { name } => Step::Run(self.load(Location::bucket(name))),
            ref up if up.is_parent_link() => {
                let parent = self
                    .location
                    .parent()
                    .ok_or(NavError::InvalidSelection(index))?;
                Step::Run(self.load(parent))
            }
            Entry::Folder { full_prefix, .. } => {
                let target = self.location.with_prefix(full_prefix);
                Step::Run(self.load(target))
            }
            Entry::File {
                display_name,
                full_key,
            } => Step::File(FileInfo {
                name: display_name,
                bucket: self.location.bucket_name().to_string(),
                key: full_key,
            }),
            Entry::LoadMore { .. } => {
                let cursor = self
                    .cursor
                    .clone()
                    .ok_or(NavError::InvalidSelection(index))?;
                Step::Run(self.issue(Command::LoadMore {
                    location: self.location.clone(),
                    cursor: cursor.token,
                    page_size: self.config.first_items_page_size,
                    estimate: cursor.estimate,
                }))
            }
        };
        Ok(step)
    }

    /// Answer the pending large-folder prompt
    pub fn choose(&mut self, choice: LargeFolderChoice) -> Result<Request, NavError> {
        self.ensure_idle()?;
        let prompt = self.prompt.take().ok_or(NavError::NoPendingChoice)?;
        info!(location = %prompt.location, ?choice, "large folder choice");

        let command = match choice {
            LargeFolderChoice::FoldersOnly => Command::FoldersOnly {
                location: prompt.location,
                page_size: self.config.folders_only_page_size,
            },
            LargeFolderChoice::FirstItems => Command::FirstItems {
                location: prompt.location,
                page_size: self.config.first_items_page_size,
                estimate: prompt.estimate,
            },
        };
        Ok(self.issue(command))
    }

    /// Close the pending prompt and stay where we are
    pub fn dismiss(&mut self) -> Result<(), NavError> {
        let prompt = self.prompt.take().ok_or(NavError::NoPendingChoice)?;
        debug!(location = %prompt.location, "large folder prompt dismissed");
        Ok(())
    }

    /// Whether `id` is the request the navigator is waiting on
    pub fn awaits(&self, id: u64) -> bool {
        self.in_flight == Some(id)
    }

    /// Abandon the in-flight request; its outcome will be ignored
    pub fn cancel(&mut self) -> bool {
        match self.in_flight.take() {
            Some(id) => {
                debug!(id, "request cancelled");
                self.status = Status::Idle;
                true
            }
            None => false,
        }
    }

    /// Apply the result of request `id`
    ///
    /// Results for anything but the in-flight request are dropped.
    pub fn apply(&mut self, id: u64, result: S3Result<Outcome>) -> Step {
        if !self.awaits(id) {
            debug!(id, "ignoring stale outcome");
            return Step::Done;
        }
        self.in_flight = None;

        let outcome = match result {
            Ok(outcome) => outcome,
            Err(S3Error::Cancelled) => {
                self.status = Status::Idle;
                return Step::Done;
            }
            Err(err) => return self.fail(err),
        };

        match outcome {
            Outcome::Buckets(names) => {
                info!(count = names.len(), "connected");
                self.cursor = None;
                self.commit(
                    Location::root(),
                    names.into_iter().map(Entry::bucket).collect(),
                );
                Step::Done
            }
            Outcome::Estimated { location, estimate } => {
                if !estimate.exceeds(self.config.effective_threshold()) {
                    let page_size = self.config.page_size;
                    Step::Run(self.issue(Command::ListAll {
                        location,
                        page_size,
                    }))
                } else {
                    info!(%location, estimate = estimate.count, "large folder");
                    let prompt = LargeFolderPrompt {
                        location,
                        estimate: estimate.count,
                    };
                    self.prompt = Some(prompt.clone());
                    self.status = Status::Idle;
                    Step::Prompt(prompt)
                }
            }
            Outcome::Listed { location, entries } => {
                self.cursor = None;
                self.commit_with_parent(location, entries);
                Step::Done
            }
            Outcome::FoldersOnly { location, folders } => {
                self.cursor = None;
                self.commit_with_parent(location, folders);
                Step::Done
            }
            Outcome::FirstItems {
                location,
                page,
                estimate,
            } => {
                self.commit_with_parent(location, page.entries);
                self.set_cursor(page.continuation, estimate);
                Step::Done
            }
            Outcome::MoreItems {
                location,
                page,
                estimate,
            } => {
                if location != self.location {
                    self.status = Status::Idle;
                    return Step::Done;
                }
                self.entries.retain(|e| e.kind() != EntryKind::LoadMore);
                merge_entries(&mut self.entries, page.entries);
                self.status = Status::Idle;
                self.set_cursor(page.continuation, estimate);
                Step::Done
            }
        }
    }

    fn ensure_idle(&self) -> Result<(), NavError> {
        if self.is_loading() {
            return Err(NavError::Busy);
        }
        Ok(())
    }

    fn ensure_connected(&self) -> Result<(), NavError> {
        if !self.connected {
            return Err(NavError::NotConnected);
        }
        Ok(())
    }

    fn load(&mut self, target: Location) -> Request {
        if target.is_root() {
            self.issue(Command::ListBuckets)
        } else {
            self.issue(Command::Estimate { location: target })
        }
    }

    fn issue(&mut self, command: Command) -> Request {
        self.next_id += 1;
        let id = self.next_id;
        self.in_flight = Some(id);
        self.status = Status::Loading;
        debug!(id, ?command, "issuing request");
        Request { id, command }
    }

    fn fail(&mut self, err: S3Error) -> Step {
        warn!(location = %self.location, error = %err, "navigation failed");
        if err.is_connection_loss() {
            self.connected = false;
        }
        self.status = Status::Error(err.to_string());
        Step::Failed(err)
    }

    fn commit(&mut self, location: Location, entries: Vec<Entry>) {
        info!(%location, count = entries.len(), "location loaded");
        self.connected = true;
        self.location = location;
        self.entries = entries;
        self.status = Status::Idle;
    }

    fn commit_with_parent(&mut self, location: Location, entries: Vec<Entry>) {
        let mut with_parent = Vec::with_capacity(entries.len() + 1);
        with_parent.push(Entry::parent_link());
        with_parent.extend(entries);
        self.commit(location, with_parent);
    }

    fn set_cursor(&mut self, continuation: Option<String>, estimate: u64) {
        self.cursor = continuation.map(|token| PagingCursor { token, estimate });
        if self.cursor.is_some() {
            let loaded = self.entries.iter().filter(|e| !e.is_synthetic()).count() as u64;
            self.entries.push(Entry::LoadMore {
                remaining_estimate: estimate.saturating_sub(loaded),
            });
        }
    }
}

impl Default for Navigator {
    fn default() -> Self {
        Self::new(NavigationConfig::default())
    }
}

/// Merge a later page into `entries`, keeping folders ahead of files
///
/// Each page is folders-then-files on its own; appending pages would
/// interleave the groups.
pub fn merge_entries(entries: &mut Vec<Entry>, page: Vec<Entry>) {
    let mut folder_end = entries
        .iter()
        .rposition(|e| e.kind() == EntryKind::Folder)
        .map_or(0, |i| i + 1);

    for entry in page {
        if entry.kind() == EntryKind::Folder {
            entries.insert(folder_end, entry);
            folder_end += 1;
        } else {
            entries.push(entry);
        }
    }
}

/// Run `first` and every follow-up request until the navigator settles
///
/// Returns the final step: `Done`, `Prompt`, or `Failed`.
pub async fn drive(
    navigator: &mut Navigator,
    store: &dyn ObjectStore,
    first: Request,
    token: &CancellationToken,
) -> Step {
    let mut request = first;
    loop {
        let result = execute(store, request.command, token).await;
        match navigator.apply(request.id, result) {
            Step::Run(next) => request = next,
            other => return other,
        }
    }
}

/// Run one command against a store
pub async fn execute(
    store: &dyn ObjectStore,
    command: Command,
    token: &CancellationToken,
) -> S3Result<Outcome> {
    match command {
        Command::ListBuckets => store.list_buckets(token).await.map(Outcome::Buckets),
        Command::Estimate { location } => {
            let estimate = store
                .estimate(location.bucket_name(), location.prefix(), token)
                .await?;
            Ok(Outcome::Estimated { location, estimate })
        }
        Command::ListAll {
            location,
            page_size,
        } => {
            let mut entries = Vec::new();
            let mut cursor: Option<String> = None;
            loop {
                let request = ListRequest::new(location.bucket_name(), location.prefix())
                    .page_size(page_size)
                    .continuation_token(cursor.as_deref());
                let page = store.list_objects(&request, token).await?;
                merge_entries(&mut entries, page.entries);
                match page.continuation {
                    Some(next) => cursor = Some(next),
                    None => break,
                }
            }
            Ok(Outcome::Listed { location, entries })
        }
        Command::FoldersOnly {
            location,
            page_size,
        } => {
            let request =
                ListRequest::new(location.bucket_name(), location.prefix()).page_size(page_size);
            let page = store.list_objects(&request, token).await?;
            let folders = page
                .entries
                .into_iter()
                .filter(|e| e.kind() == EntryKind::Folder)
                .collect();
            Ok(Outcome::FoldersOnly { location, folders })
        }
        Command::FirstItems {
            location,
            page_size,
            estimate,
        } => {
            let request =
                ListRequest::new(location.bucket_name(), location.prefix()).page_size(page_size);
            let page = store.list_objects(&request, token).await?;
            Ok(Outcome::FirstItems {
                location,
                page,
                estimate,
            })
        }
        Command::LoadMore {
            location,
            cursor,
            page_size,
            estimate,
        } => {
            let request = ListRequest::new(location.bucket_name(), location.prefix())
                .page_size(page_size)
                .continuation_token(Some(&cursor));
            let page = store.list_objects(&request, token).await?;
            Ok(Outcome::MoreItems {
                location,
                page,
                estimate,
            })
        }
    }
}
