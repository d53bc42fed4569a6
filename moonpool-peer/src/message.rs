//! Messages exchanged between cluster members.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::RemoteError;
use crate::id::RequestId;

/// A message on the peer-to-peer link.
///
/// Requests flow from the local node to the peer; `Response` and
/// `ErrorResponse` flow back and are matched to the waiting caller by
/// `request_id`. `Heartbeat` flows both ways.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Message {
    /// Liveness signal.
    Heartbeat,

    /// Look up an actor registered under `name` on the remote member.
    FindRequest {
        /// Correlation id of this request.
        request_id: RequestId,
        /// Registered actor name.
        name: String,
    },

    /// List every actor registered on the remote member.
    ListRequest {
        /// Correlation id of this request.
        request_id: RequestId,
    },

    /// Successful reply to a request.
    Response {
        /// Id of the request being answered.
        request_id: RequestId,
        /// Reply payload.
        value: Value,
    },

    /// Failed reply to a request.
    ErrorResponse {
        /// Id of the request being answered.
        request_id: RequestId,
        /// Error reported by the remote member.
        error: RemoteError,
    },
}

impl Message {
    /// Correlation id, for every variant but `Heartbeat`.
    pub fn request_id(&self) -> Option<RequestId> {
        match self {
            Message::Heartbeat => None,
            Message::FindRequest { request_id, .. }
            | Message::ListRequest { request_id }
            | Message::Response { request_id, .. }
            | Message::ErrorResponse { request_id, .. } => Some(*request_id),
        }
    }

    /// Short variant name for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            Message::Heartbeat => "heartbeat",
            Message::FindRequest { .. } => "find_request",
            Message::ListRequest { .. } => "list_request",
            Message::Response { .. } => "response",
            Message::ErrorResponse { .. } => "error_response",
        }
    }
}
