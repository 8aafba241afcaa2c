use serde::{Deserialize, Serialize};

use crate::users::repo_types::Message;

/// Public send form. Older clients post `targetUsername`.
#[derive(Debug, Deserialize)]
pub struct SendMessageRequest {
    #[serde(alias = "targetUsername")]
    pub username: String,
    pub content: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptMessagesRequest {
    pub accept_messages: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AcceptanceStatus {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub is_accepting_messages: bool,
}

#[derive(Debug, Serialize)]
pub struct MessagesResponse {
    pub success: bool,
    pub messages: Vec<Message>,
}
