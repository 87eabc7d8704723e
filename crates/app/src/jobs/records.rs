//! Job Records

use std::{fmt, str::FromStr};

use jiff::Timestamp;
use thiserror::Error;

use crate::{
    domain::catalog::records::{ImageUuid, ProductUuid},
    uuids::TypedUuid,
};

/// Generation Job UUID
pub type JobUuid = TypedUuid<GenerationJob>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum JobState {
    Queued,
    Running,
    Succeeded,
    Failed,
}

impl JobState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Queued => "QUEUED",
            Self::Running => "RUNNING",
            Self::Succeeded => "SUCCEEDED",
            Self::Failed => "FAILED",
        }
    }
}

impl fmt::Display for JobState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown job state: {0}")]
pub struct UnknownJobState(pub String);

impl FromStr for JobState {
    type Err = UnknownJobState;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "QUEUED" => Ok(Self::Queued),
            "RUNNING" => Ok(Self::Running),
            "SUCCEEDED" => Ok(Self::Succeeded),
            "FAILED" => Ok(Self::Failed),
            other => Err(UnknownJobState(other.to_string())),
        }
    }
}

/// One queued generation of one AI image version.
#[derive(Debug, Clone, PartialEq)]
pub struct GenerationJob {
    pub uuid: JobUuid,
    pub product_uuid: ProductUuid,
    pub image_uuid: ImageUuid,
    pub source_storage_key: String,
    pub version: u32,
    pub state: JobState,

    /// Claims so far, including the one currently running.
    pub attempts: u32,

    pub run_at: Timestamp,
    pub claimed_until: Option<Timestamp>,
    pub last_error: Option<String>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// New Job Data
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewJob {
    pub product: ProductUuid,
    pub image: ImageUuid,
    pub source_storage_key: String,
    pub version: u32,
}
