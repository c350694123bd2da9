use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::models::{FileAttachment, MessageType};

// -- JWT Claims --

/// Bearer-token claims shared by the REST middleware and the WebSocket
/// upgrade. Canonical definition lives here to eliminate duplication.
/// Tokens are issued by an external identity service; only the decoded
/// subject id is consumed in this repository.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub exp: usize,
}

// -- Conversations --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CreateConversationRequest {
    pub other_user_id: Uuid,
}

// -- Messages --

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct SendMessageRequest {
    pub content: String,
    #[serde(default)]
    pub message_type: MessageType,
    #[serde(default)]
    pub files: Vec<FileAttachment>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarkReadResponse {
    pub updated: u64,
}

// -- Pagination --

#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PageQuery {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    50
}

impl Default for PageQuery {
    fn default() -> Self {
        Self {
            page: default_page(),
            limit: default_limit(),
        }
    }
}

impl PageQuery {
    pub const MAX_LIMIT: u32 = 200;

    /// Clamped page size.
    pub fn limit(&self) -> u32 {
        self.limit.clamp(1, Self::MAX_LIMIT)
    }

    /// Row offset for a 1-based page number.
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1) * self.limit()
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Paginated<T> {
    pub items: Vec<T>,
    pub total: u64,
    pub page: u32,
    pub limit: u32,
}
