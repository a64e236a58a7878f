use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::error::{QueueError, QueueResult};

/// Store-assigned job identity
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct JobId(pub i64);

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A unit of work that can be pushed onto the queue.
///
/// `KIND` tags the serialized payload so a consumer can tell job types apart
/// without guessing from the data.
pub trait JobPayload: Serialize + DeserializeOwned + Send + Sync {
    const KIND: &'static str;
}

/// Kind reported for stored blobs that do not parse as an envelope
pub const UNDECODABLE_KIND: &str = "undecodable";

/// Schema-tagged payload envelope stored in the `job` column
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Payload {
    pub kind: String,
    pub data: serde_json::Value,
}

impl Payload {
    pub fn encode<T: JobPayload>(task: &T) -> QueueResult<Self> {
        Ok(Self {
            kind: T::KIND.to_string(),
            data: serde_json::to_value(task)?,
        })
    }

    /// Decode into `T`, failing when the envelope carries another kind
    pub fn decode<T: JobPayload>(&self) -> QueueResult<T> {
        if self.kind != T::KIND {
            return Err(QueueError::JobTypeMismatch {
                expected: T::KIND.to_string(),
                found: self.kind.clone(),
            });
        }
        Ok(serde_json::from_value(self.data.clone())?)
    }

    pub fn to_blob(&self) -> QueueResult<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_blob(blob: &str) -> QueueResult<Self> {
        Ok(serde_json::from_str(blob)?)
    }

    /// Keep a stored blob that is not a valid envelope, verbatim, under
    /// [`UNDECODABLE_KIND`]
    pub fn undecodable(blob: &str) -> Self {
        Self {
            kind: UNDECODABLE_KIND.to_string(),
            data: serde_json::Value::String(blob.to_string()),
        }
    }

    /// Decode a stored blob, falling back to [`Payload::undecodable`]
    pub fn from_blob_lossy(blob: &str) -> Self {
        Self::from_blob(blob).unwrap_or_else(|_| Self::undecodable(blob))
    }
}

/// A pending job as materialized by a store.
///
/// Always a detached copy: changing it has no effect on the stored row until
/// it is passed back to `release`, `delete` or `fail`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Job {
    pub id: JobId,
    pub payload: Payload,
    pub category: String,
    pub attempts: u32,
    /// Stored but never consulted by selection
    pub priority: i16,

    /// Timestamps
    #[serde(with = "time::serde::rfc3339::option")]
    pub reserved_at: Option<OffsetDateTime>,
    #[serde(with = "time::serde::rfc3339")]
    pub available_at: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl Job {
    pub fn kind(&self) -> &str {
        &self.payload.kind
    }

    pub fn decode<T: JobPayload>(&self) -> QueueResult<T> {
        self.payload.decode()
    }

    pub fn is_reserved(&self) -> bool {
        self.reserved_at.is_some()
    }
}

/// Why a job failed, rendered into the failure record's `error` column
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct JobFailure {
    pub kind: String,
    pub message: String,
    pub code: Option<i64>,
}

impl JobFailure {
    pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
        let kind = kind.into();
        Self {
            kind: if kind.trim().is_empty() {
                "JobFailure".to_string()
            } else {
                kind
            },
            message: message.into(),
            code: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = Some(code);
        self
    }

    /// Build from any error, using the error's type name as the kind
    pub fn from_error<E: std::error::Error>(err: &E) -> Self {
        let type_name = std::any::type_name::<E>();
        let kind = type_name.rsplit("::").next().unwrap_or(type_name);
        Self::new(kind, err.to_string())
    }
}

impl fmt::Display for JobFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.kind)?;
        if !self.message.is_empty() {
            write!(f, " : {}", self.message)?;
        }
        match self.code {
            Some(code) if code != 0 => write!(f, " (#{})", code),
            _ => Ok(()),
        }
    }
}

impl From<QueueError> for JobFailure {
    fn from(err: QueueError) -> Self {
        Self::new(err.kind(), err.to_string())
    }
}

/// Terminal record of a permanently failed job
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FailureRecord {
    pub id: i64,
    pub payload: Payload,
    pub error: String,
    #[serde(with = "time::serde::rfc3339")]
    pub failed_at: OffsetDateTime,
}
