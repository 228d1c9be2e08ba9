//! Per-record question and answer sessions.

use crate::error::CoreError;
use crate::events::emit;
use log::{debug, info, warn};
use parking_lot::RwLock;
use pdfdesk_config::ChatConfig;
use pdfdesk_protocol::{
    ChatMessage, ChatOutcome, DeskEventPayload, EventSink, RecordId, RecordService, ServiceError,
    SessionId,
};
use std::sync::Arc;
use uuid::Uuid;

/// Open chat bound to one record. Messages are kept in answer-arrival order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatSession {
    pub id: SessionId,
    pub record_id: RecordId,
    pub messages: Vec<ChatMessage>,
}

/// Result of [`ChatSessionManager::send`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Blank question; nothing was sent.
    Skipped,
    /// The answer was appended.
    Answered(ChatMessage),
    /// The request failed and a sentinel message was appended.
    Failed {
        message: ChatMessage,
        error: ServiceError,
    },
    /// The reply arrived after its session was closed or replaced.
    Dropped(ChatMessage),
}

/// Owns at most one open chat session.
pub struct ChatSessionManager {
    service: Arc<dyn RecordService>,
    texts: ChatConfig,
    session: RwLock<Option<ChatSession>>,
    events: Option<Arc<dyn EventSink>>,
}

impl ChatSessionManager {
    pub fn new(
        service: Arc<dyn RecordService>,
        texts: ChatConfig,
        events: Option<Arc<dyn EventSink>>,
    ) -> Self {
        Self {
            service,
            texts,
            session: RwLock::new(None),
            events,
        }
    }

    /// Open a session for a record, replacing any open one.
    pub fn open(&self, record_id: RecordId) -> SessionId {
        let session = ChatSession {
            id: Uuid::new_v4(),
            record_id: record_id.clone(),
            messages: Vec::new(),
        };
        let session_id = session.id;
        let previous = self.session.write().replace(session);
        if let Some(previous) = previous {
            debug!("chat session replaced (session_id={})", previous.id);
            emit(
                &self.events,
                DeskEventPayload::ChatClosed {
                    session_id: previous.id,
                },
            );
        }
        info!(
            "chat session opened (session_id={}, record_id={})",
            session_id, record_id
        );
        emit(
            &self.events,
            DeskEventPayload::ChatOpened {
                session_id,
                record_id,
            },
        );
        session_id
    }

    /// Ask the open session's record a question.
    ///
    /// Concurrent sends are allowed; each answer is appended when it arrives.
    /// Blank questions are skipped whether or not a session is open.
    pub async fn send(&self, question: &str) -> Result<SendOutcome, CoreError> {
        if question.trim().is_empty() {
            return Ok(SendOutcome::Skipped);
        }
        let (session_id, record_id) = {
            let guard = self.session.read();
            let session = guard.as_ref().ok_or(CoreError::NoSession)?;
            (session.id, session.record_id.clone())
        };

        debug!(
            "chat question sent (session_id={}, record_id={})",
            session_id, record_id
        );
        let result = self.service.ask(&record_id, question).await;
        let (message, error) = match result {
            Ok(answer) => (ChatMessage::answered(question, &answer), None),
            Err(err) => {
                warn!(
                    "chat request failed (session_id={}, record_id={}, error={})",
                    session_id, record_id, err
                );
                (self.sentinel(question, &err), Some(err))
            }
        };

        {
            let mut guard = self.session.write();
            match guard.as_mut() {
                Some(session) if session.id == session_id => {
                    session.messages.push(message.clone());
                }
                _ => {
                    debug!("late chat reply dropped (session_id={})", session_id);
                    return Ok(SendOutcome::Dropped(message));
                }
            }
        }

        emit(
            &self.events,
            DeskEventPayload::ChatAppended {
                session_id,
                message: message.clone(),
            },
        );
        Ok(match error {
            None => SendOutcome::Answered(message),
            Some(error) => {
                emit(
                    &self.events,
                    DeskEventPayload::ChatFailed {
                        session_id,
                        record_id,
                        error: error.to_string(),
                    },
                );
                SendOutcome::Failed { message, error }
            }
        })
    }

    fn sentinel(&self, question: &str, err: &ServiceError) -> ChatMessage {
        let (answer, outcome) = match err {
            ServiceError::Status { status, .. } => (
                self.texts.answer_error_text.clone(),
                ChatOutcome::Rejected { status: *status },
            ),
            other => (
                self.texts.send_error_text.clone(),
                ChatOutcome::Failed {
                    reason: other.to_string(),
                },
            ),
        };
        ChatMessage {
            question: question.to_string(),
            answer,
            outcome,
        }
    }

    /// Close the open session and discard its log.
    pub fn close(&self) -> Option<ChatSession> {
        let closed = self.session.write().take();
        if let Some(session) = &closed {
            info!("chat session closed (session_id={})", session.id);
            emit(
                &self.events,
                DeskEventPayload::ChatClosed {
                    session_id: session.id,
                },
            );
        }
        closed
    }

    /// Messages of the open session, empty when none is open.
    pub fn messages(&self) -> Vec<ChatMessage> {
        self.session
            .read()
            .as_ref()
            .map(|session| session.messages.clone())
            .unwrap_or_default()
    }

    pub fn current(&self) -> Option<ChatSession> {
        self.session.read().clone()
    }

    pub fn is_open(&self) -> bool {
        self.session.read().is_some()
    }
}
