//! The decoded notification value.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::payload::{Medium, Reason};

/// One notification observed on chain.
///
/// Built by the payload codec, never mutated afterwards.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NotificationEvent {
    /// Feed URLs, in the order the broadcaster listed them. Never empty.
    pub urls: Vec<String>,
    pub account: String,
    pub reason: Reason,
    pub medium: Medium,
    pub version: String,
    pub transaction_id: String,
    pub block_number: u64,
    /// Position of the operation among all operations of its block.
    pub ordinal: u32,
    /// Block production time.
    pub observed_at: DateTime<Utc>,
}

impl NotificationEvent {
    /// Total order key within one reader session.
    pub fn position(&self) -> (u64, u32) {
        (self.block_number, self.ordinal)
    }

    pub fn len(&self) -> usize {
        self.urls.len()
    }

    pub fn is_empty(&self) -> bool {
        self.urls.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, String> {
        self.urls.iter()
    }
}

impl<'a> IntoIterator for &'a NotificationEvent {
    type Item = &'a String;
    type IntoIter = std::slice::Iter<'a, String>;

    fn into_iter(self) -> Self::IntoIter {
        self.urls.iter()
    }
}
