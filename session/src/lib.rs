//! Upload and chat state controller for DocChat clients.
//!
//! A [`Session`] drives the upload and chat operations of the API client
//! through per-operation state machines and publishes a [`SessionSnapshot`]
//! after every transition for rendering layers to observe.

pub mod models;
pub mod session;
pub mod state;

pub use models::{Banner, BannerKind, ChatMessage, Role, SessionSnapshot};
pub use session::{Invocation, Session, SessionWatcher, SkipReason};
pub use state::{OperationState, Phase, Ticket};
