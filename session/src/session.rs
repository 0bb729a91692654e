//! Operation state controller driving upload and chat.

use docchat_api::{ApiClient, ApiError, UploadDocument};
use tokio::sync::watch;
use tracing::{debug, info, warn};

use crate::models::{Banner, BannerKind, ChatMessage, SessionSnapshot};
use crate::state::Ticket;

const UPLOAD_LOADING_MESSAGE: &str = "Uploading and indexing document...";
const UPLOAD_SUCCESS_MESSAGE: &str = "Document uploaded.";
const CHAT_LOADING_MESSAGE: &str = "Assistant is thinking...";

/// Receiver that yields a new snapshot after every transition.
pub type SessionWatcher = watch::Receiver<SessionSnapshot>;

/// Why an invocation was ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The operation already has a call in flight
    Busy,
    /// Chat requires a successful upload first
    ChatGated,
    /// Blank chat query
    EmptyQuery,
}

/// Outcome of asking the session to run an operation.
#[derive(Debug, Clone, PartialEq)]
pub enum Invocation {
    /// Nothing happened: no request, no state change
    Skipped(SkipReason),
    Succeeded,
    Failed(ApiError),
    /// The invocation was cancelled before it completed; its result was dropped
    Discarded,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Operation {
    Upload,
    Chat,
}

/// Holds an invocation's ticket across the request.
///
/// If the invocation future is dropped before its completion is applied, the
/// operation returns to `Idle` so later invocations are not refused as busy.
struct InFlight<'a> {
    state: &'a watch::Sender<SessionSnapshot>,
    operation: Operation,
    ticket: Ticket,
    armed: bool,
}

impl<'a> InFlight<'a> {
    fn new(state: &'a watch::Sender<SessionSnapshot>, operation: Operation, ticket: Ticket) -> Self {
        Self {
            state,
            operation,
            ticket,
            armed: true,
        }
    }

    /// The completion is about to be applied; nothing to release.
    fn disarm(mut self) -> Ticket {
        self.armed = false;
        self.ticket
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }

        let (operation, ticket) = (self.operation, self.ticket);
        let released = self.state.send_if_modified(|s| {
            let changed = match operation {
                Operation::Upload => s.upload.cancel_ticket(ticket),
                Operation::Chat => s.chat.cancel_ticket(ticket),
            };
            if changed {
                clear_loading_banner(s);
            }
            changed
        });
        if released {
            debug!("Abandoned {:?} invocation released", operation);
        }
    }
}

/// Upload-then-chat session for a single document.
///
/// State lives in a watch channel; every transition is an atomic
/// check-and-update on it, so a second invocation of an operation that is
/// already loading is refused without any request being sent. Dropping an
/// invocation future before it completes returns that operation to `Idle`.
pub struct Session {
    client: ApiClient,
    state: watch::Sender<SessionSnapshot>,
}

impl Session {
    pub fn new(client: ApiClient) -> Self {
        let (state, _) = watch::channel(SessionSnapshot::default());
        Self { client, state }
    }

    /// Create a session configured from environment variables.
    pub fn from_env() -> Self {
        Self::new(ApiClient::from_env())
    }

    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Subscribe to state changes.
    ///
    /// ```ignore
    /// let mut rx = session.subscribe();
    /// while rx.changed().await.is_ok() {
    ///     render(&rx.borrow_and_update());
    /// }
    /// ```
    pub fn subscribe(&self) -> SessionWatcher {
        self.state.subscribe()
    }

    /// Current state (cloned).
    pub fn snapshot(&self) -> SessionSnapshot {
        self.state.borrow().clone()
    }

    pub fn chat_enabled(&self) -> bool {
        self.state.borrow().chat_enabled()
    }

    /// Upload a document, making it the target of subsequent chat queries.
    pub async fn upload(&self, document: UploadDocument) -> Invocation {
        let mut ticket: Option<Ticket> = None;
        self.state.send_if_modified(|s| match s.upload.begin() {
            Some(t) => {
                ticket = Some(t);
                s.banner = Some(Banner::loading(UPLOAD_LOADING_MESSAGE));
                true
            }
            None => false,
        });

        let ticket = match ticket {
            Some(ticket) => ticket,
            None => {
                debug!("Upload already in progress, ignoring {}", document.filename);
                return Invocation::Skipped(SkipReason::Busy);
            }
        };

        let guard = InFlight::new(&self.state, Operation::Upload, ticket);
        info!("Uploading {} ({} bytes)", document.filename, document.bytes.len());
        let outcome = self.client.upload_pdf(document).await;
        let ticket = guard.disarm();

        let mut applied = false;
        self.state.send_if_modified(|s| {
            applied = match &outcome {
                Ok(envelope) => {
                    let data = &envelope.data;
                    if s.upload.succeed(ticket, &envelope.request_id, data.clone()) {
                        let message = if data.message.trim().is_empty() {
                            UPLOAD_SUCCESS_MESSAGE.to_string()
                        } else {
                            data.message.clone()
                        };
                        s.document = Some(data.filename.clone());
                        s.banner = Some(Banner::success(message, &envelope.request_id));
                        true
                    } else {
                        false
                    }
                }
                Err(error) => {
                    if s.upload.fail(ticket, error.clone()) {
                        s.banner = Some(Banner::error(error));
                        true
                    } else {
                        false
                    }
                }
            };
            applied
        });

        settle("upload", applied, outcome.map(|_| ()))
    }

    /// Send a chat query about the uploaded document.
    ///
    /// Blank queries, queries before a successful upload, and queries while a
    /// previous one is still loading are ignored.
    pub async fn send_chat(&self, query: &str) -> Invocation {
        let query = query.trim();
        if query.is_empty() {
            return Invocation::Skipped(SkipReason::EmptyQuery);
        }

        let mut gate: Result<Ticket, SkipReason> = Err(SkipReason::Busy);
        self.state.send_if_modified(|s| {
            if !s.chat_enabled() {
                gate = Err(SkipReason::ChatGated);
                return false;
            }
            match s.chat.begin() {
                Some(ticket) => {
                    gate = Ok(ticket);
                    s.transcript.push(ChatMessage::user(query));
                    s.banner = Some(Banner::loading(CHAT_LOADING_MESSAGE));
                    true
                }
                None => false,
            }
        });

        let ticket = match gate {
            Ok(ticket) => ticket,
            Err(reason) => {
                debug!("Chat query ignored: {:?}", reason);
                return Invocation::Skipped(reason);
            }
        };

        let guard = InFlight::new(&self.state, Operation::Chat, ticket);
        let outcome = self.client.send_chat(query).await;
        let ticket = guard.disarm();

        let mut applied = false;
        self.state.send_if_modified(|s| {
            applied = match &outcome {
                Ok(envelope) => {
                    let reply = envelope.data.reply();
                    let text = reply.display_text();
                    if s.chat.succeed(ticket, &envelope.request_id, reply) {
                        s.transcript.push(ChatMessage::assistant(text));
                        s.banner = None;
                        true
                    } else {
                        false
                    }
                }
                Err(error) => {
                    if s.chat.fail(ticket, error.clone()) {
                        s.banner = Some(Banner::error(error));
                        true
                    } else {
                        false
                    }
                }
            };
            applied
        });

        settle("chat", applied, outcome.map(|_| ()))
    }

    /// Invalidate in-flight operations so their results are discarded.
    ///
    /// Loading operations return to `Idle`; subscribers are notified if anything changed.
    pub fn cancel_all(&self) {
        self.state.send_if_modified(|s| {
            let changed = s.upload.cancel() | s.chat.cancel();
            if changed {
                clear_loading_banner(s);
            }
            changed
        });
    }
}

fn clear_loading_banner(snapshot: &mut SessionSnapshot) {
    if matches!(snapshot.banner.as_ref().map(|b| b.kind), Some(BannerKind::Loading)) {
        snapshot.banner = None;
    }
}

fn settle(operation: &str, applied: bool, outcome: Result<(), ApiError>) -> Invocation {
    if !applied {
        debug!("Discarding stale {} completion", operation);
        return Invocation::Discarded;
    }

    match outcome {
        Ok(()) => Invocation::Succeeded,
        Err(error) => {
            warn!(
                "{} failed: {} (request_id={})",
                operation, error, error.request_id
            );
            Invocation::Failed(error)
        }
    }
}
