//! Conversation and change-proposal core.
//!
//! A [`Session`] keeps the ordered turn log of one assistant panel. Requests go
//! to a backend through a [`RequestDispatcher`]; replies are classified,
//! diffed against the live file contents, and kept as [`ChangeSet`]s the user
//! can apply to an [`EditingSurface`] all at once.
//!
//! [`SessionRuntime`] wires a session to a [`backend_channel::BackendChannel`]
//! with worker threads and a single outcome queue.

pub mod apply;
pub mod changeset;
pub mod classify;
pub mod context;
pub mod diff;
pub mod events;
pub mod render;
pub mod runtime;
pub mod session;
pub mod surface;
pub mod turn;

pub use apply::{apply_change_set, ApplyError, ApplyReport};
pub use backend_channel::{BackendRequest, Generation, RawReply};
pub use classify::{classify, ClassifiedReply, ProposedFile};
pub use context::{normalize_path, ContextSnapshot, ContextStore, FileRef};
pub use diff::{diff, Patch, PatchLine, PatchLineKind, PatchStats};
pub use events::{CoreEvent, EventLevel, EventLog};
pub use render::render_session;
pub use runtime::{BackendOutcome, SessionRuntime};
pub use session::{
    RequestDispatcher, Session, SessionError, SessionOptions, SessionState, SubmitOutcome,
};
pub use surface::{EditingSurface, FileEdit, FileSnapshot, MemorySurface, SurfaceError};
pub use turn::{ChangeSet, ChangeSetError, FileChange, Turn};
