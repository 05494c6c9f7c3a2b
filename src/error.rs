use thiserror::Error;

use crate::model::work_item::WorkItemId;
use crate::tracker::TrackerError;

pub const EXIT_SUCCESS: i32 = 0;
pub const EXIT_FAILURE: i32 = 1;

/// Why a search fragment was refused.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FragmentProblem {
    #[error("it contains no '/'")]
    MissingSeparator,

    #[error("it contains whitespace")]
    ContainsWhitespace,

    #[error("it is {len} characters long, at least {min} required")]
    TooShort { len: usize, min: usize },
}

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("{0}")]
    Usage(String),

    #[error("git path '{fragment}' is invalid: {reason}. Expected format: \"<repository_name>/<branch_name>\"")]
    InvalidFragment {
        fragment: String,
        reason: FragmentProblem,
    },

    #[error("Too many work items found: {found}, limit {limit}")]
    TooManyMatches { found: usize, limit: usize },

    #[error("Work item query failed: {source}\nquery: {query}")]
    Query {
        query: String,
        #[source]
        source: TrackerError,
    },

    #[error("Failed to read work item #{id}: {source}")]
    Read {
        id: WorkItemId,
        #[source]
        source: TrackerError,
    },

    #[error("Failed to update work item #{id}: {source}\npayload: {payload}")]
    Patch {
        id: WorkItemId,
        payload: String,
        #[source]
        source: TrackerError,
    },
}

impl ReportError {
    /// Whether a batch run may continue past this error.
    pub fn is_recoverable_in_batch(&self) -> bool {
        matches!(self, ReportError::Patch { source, .. } if !source.is_connect_timeout())
    }

    pub fn exit_code(&self) -> i32 {
        EXIT_FAILURE
    }
}
