//! API Models
//!
//! This module defines the wire payloads for connection negotiation and the
//! structures used for generating OpenAPI documentation with `utoipa`.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::transport::NegotiatedAnswer;

/// A connection offer from a client.
///
/// All fields are optional at the serde layer so that malformed payloads
/// reach the lifecycle validation step and produce a single, uniform
/// bad-request error instead of a framework-specific rejection.
#[derive(Deserialize, ToSchema, Debug, Clone)]
pub struct OfferRequest {
    /// Present when the client is renegotiating an existing session.
    pub pc_id: Option<String>,
    #[schema(example = "v=0...")]
    pub sdp: Option<String>,
    #[serde(rename = "type")]
    #[schema(example = "offer")]
    pub kind: Option<String>,
}

/// The negotiated answer returned for an accepted offer.
#[derive(Serialize, ToSchema, Debug, Clone)]
pub struct AnswerResponse {
    pub pc_id: String,
    pub sdp: String,
    #[serde(rename = "type")]
    #[schema(example = "answer")]
    pub kind: String,
}

impl From<NegotiatedAnswer> for AnswerResponse {
    fn from(answer: NegotiatedAnswer) -> Self {
        Self {
            pc_id: answer.pc_id,
            sdp: answer.sdp,
            kind: answer.kind,
        }
    }
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}
