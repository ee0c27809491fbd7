//! Facade replies
//!
//! Maps service results to what a request handler renders: a wire record, an
//! empty success, or a stable [`Outcome`] with a message. Store details of
//! internal failures are logged here and never returned.

use serde::de::DeserializeOwned;
use serde::Serialize;
use tracing::{error, warn};

use crate::error::{AppError, Outcome, Result};
use crate::mapper::{record_to_wire, wire_to_record};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Failure {
    pub outcome: Outcome,
    pub message: String,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Reply {
    Ok(serde_json::Value),
    NoContent,
    Failed(Failure),
}

/// Decode a strict request payload
pub fn decode<R: DeserializeOwned>(payload: &serde_json::Value) -> Result<R> {
    Ok(wire_to_record(payload)?)
}

pub fn reply<T: Serialize>(result: Result<T>) -> Reply {
    match result.and_then(|value| Ok(record_to_wire(&value)?)) {
        Ok(body) => Reply::Ok(body),
        Err(err) => Reply::Failed(failure(err)),
    }
}

pub fn reply_empty(result: Result<()>) -> Reply {
    match result {
        Ok(()) => Reply::NoContent,
        Err(err) => Reply::Failed(failure(err)),
    }
}

/// Convert AppError to a rendered failure
pub fn failure(err: AppError) -> Failure {
    let outcome = err.outcome();
    let message = match outcome {
        Outcome::Internal => {
            error!(error = %err, "Request failed with internal error");
            outcome.message().to_string()
        }
        Outcome::Unavailable => {
            warn!(error = %err, "Request failed, store unavailable");
            outcome.message().to_string()
        }
        Outcome::NotFound | Outcome::Conflict | Outcome::Invalid => err.to_string(),
    };
    Failure { outcome, message }
}
