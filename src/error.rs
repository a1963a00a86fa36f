//! Error types for status fetching, eventual assertions and manifest commands.

use std::time::Duration;

use thiserror::Error;

/* ============================= FETCH ============================= */

/// Failure of a single read against the cluster.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum FetchError {
    /// The resource (or the status field being read) does not exist yet.
    #[error("not found: {0}")]
    NotFound(String),

    /// API or network hiccup; the next attempt may succeed.
    #[error("transient fetch error: {0}")]
    Transient(String),

    /// The query can never succeed as written.
    #[error("malformed query: {0}")]
    MalformedQuery(String),
}

impl FetchError {
    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::Transient(msg.into())
    }

    pub fn malformed(msg: impl Into<String>) -> Self {
        Self::MalformedQuery(msg.into())
    }

    /// Whether the polling loop should absorb this error and try again.
    pub fn is_retryable(&self) -> bool {
        !matches!(self, Self::MalformedQuery(_))
    }
}

impl From<kube::Error> for FetchError {
    fn from(err: kube::Error) -> Self {
        match err {
            kube::Error::Api(resp) if resp.code == 404 => Self::NotFound(resp.message),
            other => Self::Transient(other.to_string()),
        }
    }
}

/* ============================= POLL ============================= */

/// Terminal failure of an eventual assertion.
#[derive(Debug, Error)]
pub enum PollError {
    #[error(
        "timed out after {elapsed:?} ({attempts} attempts) waiting for {target} to {predicate}; \
         last observed: {last_observed}"
    )]
    Timeout {
        target: String,
        predicate: String,
        elapsed: Duration,
        attempts: u32,
        last_observed: String,
    },

    #[error("cancelled after {attempts} attempts while waiting for {target} to {predicate}")]
    Cancelled {
        target: String,
        predicate: String,
        attempts: u32,
    },

    #[error("malformed query for {target}: {reason}")]
    MalformedQuery { target: String, reason: String },

    #[error("invalid poll timing: {0}")]
    InvalidTiming(String),
}

impl PollError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(self, Self::Cancelled { .. })
    }
}

/* ============================= APPLY ============================= */

/// Failure of a manifest apply/patch/delete command.
#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to spawn `{command}`: {source}")]
    Spawn {
        command: String,
        #[source]
        source: std::io::Error,
    },

    #[error("`{command}` exited with {status}: {stderr}")]
    CommandFailed {
        command: String,
        status: String,
        stderr: String,
    },
}

/* ============================= TESTS ============================= */
