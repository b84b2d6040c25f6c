//! Invalidation signal wire schema.
//!
//! Deployment tooling emits one fire-and-forget JSON event per deploy (or
//! manual clear); the consumer treats it as a request to sweep one or more
//! namespaces. The envelope `name` discriminates signal types so unrelated
//! events on the same transport are rejected at the parser.
//!
//! ```json
//! {
//!   "name": "cache.invalidate",
//!   "data": {
//!     "reason": "deploy",
//!     "namespaces": ["activity"],
//!     "correlationId": "deploy-2041",
//!     "timestamp": 1738000000000
//!   }
//! }
//! ```

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Envelope name this crate consumes.
pub const SIGNAL_NAME: &str = "cache.invalidate";

/// Payload of one invalidation signal.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateSignal {
    /// Producer-supplied cause, e.g. `deploy` or `manual`.
    pub reason: String,
    /// Target namespaces; omitted means every configured namespace.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub namespaces: Option<Vec<String>>,
    /// Producer-side identifier carried through sweep logs and reports.
    pub correlation_id: String,
    /// Emission time, unix milliseconds.
    pub timestamp: i64,
}

/// Outer event envelope as emitted by deployment tooling.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SignalEnvelope {
    pub name: String,
    pub data: InvalidateSignal,
}

#[derive(Debug, Error)]
pub enum SignalError {
    #[error("unrecognized signal name `{0}`")]
    UnknownName(String),
    #[error("malformed invalidation signal: {0}")]
    Malformed(#[from] serde_json::Error),
}

impl SignalEnvelope {
    /// Parse a raw event, rejecting envelopes that are not
    /// [`SIGNAL_NAME`].
    pub fn parse(raw: &str) -> Result<InvalidateSignal, SignalError> {
        let envelope: SignalEnvelope = serde_json::from_str(raw)?;
        if envelope.name != SIGNAL_NAME {
            return Err(SignalError::UnknownName(envelope.name));
        }
        Ok(envelope.data)
    }
}
