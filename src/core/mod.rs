/*!
 * Browsing and uploading on top of an object store
 */

pub mod entry;
pub mod hierarchy;
pub mod navigator;
pub mod session;
pub mod upload;

pub use entry::{Entry, EntryKind, Location, PageResult};
pub use navigator::{LargeFolderChoice, NavError, NavigationConfig, NavigationSnapshot, Navigator};
pub use session::{Intent, Session, SessionEvent, SessionHandle};
pub use upload::{UploadJob, UploadReport, Uploader};
