//! Notification Aggregate

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Notification {
    pub(crate) id: Uuid,
    pub(crate) recipient_id: String,
    pub(crate) message: String,
    pub(crate) link: String,
    pub(crate) read: bool,
    pub(crate) created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(recipient_id: impl Into<String>, message: impl Into<String>, link: impl Into<String>) -> Self {
        Self { id: Uuid::now_v7(), recipient_id: recipient_id.into(), message: message.into(), link: link.into(), read: false, created_at: Utc::now() }
    }

    pub fn id(&self) -> Uuid { self.id }
    pub fn recipient_id(&self) -> &str { &self.recipient_id }
    pub fn message(&self) -> &str { &self.message }
    pub fn link(&self) -> &str { &self.link }
    pub fn is_read(&self) -> bool { self.read }
    pub fn created_at(&self) -> DateTime<Utc> { self.created_at }

    pub fn mark_read(&mut self) { self.read = true; }
    pub fn mark_unread(&mut self) { self.read = false; }
}
