//! Response-video commits.
//!
//! Uploads go to an [`ObjectStore`]; the returned locator is committed to the
//! repository at most once per exercise-in-session.

mod commit;
mod object_store;

pub use commit::{
    object_key, CommitOutcome, MediaCommitter, MediaConfig, MediaUpload, Preflight,
    DEFAULT_RETENTION,
};
pub use object_store::{FsObjectStore, MemoryObjectStore, ObjectStore, ObjectStoreError};
