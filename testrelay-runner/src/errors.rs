// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Errors produced by testrelay.

use camino::Utf8PathBuf;
use std::{error, fmt, sync::Arc};
use thiserror::Error;

/// An error returned by a [`ReportingClient`](crate::client::ReportingClient) call.
///
/// Completions may be shared between several dependent calls, so this error is
/// cheaply cloneable.
#[derive(Clone, Debug, Error)]
#[non_exhaustive]
pub enum ClientError {
    /// The request could not be sent, or the response could not be read.
    #[error("request to `{url}` failed")]
    Request {
        /// The URL of the request.
        url: String,

        /// The underlying error.
        #[source]
        error: Arc<reqwest::Error>,
    },

    /// The backend answered with a non-success status.
    #[error("request to `{url}` returned status {status}: {body}")]
    Status {
        /// The URL of the request.
        url: String,

        /// The HTTP status code.
        status: u16,

        /// The response body, for diagnostics.
        body: String,
    },

    /// The backend acknowledged a create call, but its response had no usable identifier.
    #[error("response from `{url}` did not contain an entity id")]
    MissingId {
        /// The URL of the request.
        url: String,
    },

    /// The call was skipped because the entity it depends on could not be created.
    #[error("{entity} was not reported because {dependency} could not be created")]
    DependencyFailed {
        /// The entity this call was about.
        entity: String,

        /// The launch or parent item that failed.
        dependency: String,
    },

    /// The call referred to a temporary identifier that this client never handed out.
    #[error("unknown {kind} id {id}")]
    UnknownEntity {
        /// `launch` or `item`.
        kind: &'static str,

        /// The identifier.
        id: String,
    },

    /// The background task performing the call was cancelled or panicked.
    #[error("reporting task for {entity} did not complete")]
    TaskCancelled {
        /// The entity this call was about.
        entity: String,
    },

    /// A recording client was configured to fail this call.
    #[error("injected failure for call #{index}")]
    Injected {
        /// The index of the failed call.
        index: usize,
    },
}

/// An error that occurs while building a [`ReporterConfig`](crate::config::ReporterConfig).
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ConfigError {
    /// A value required for reporting to a backend is missing.
    #[error(
        "`{field}` is not set (set it in testrelay.json, the {env_var} environment \
         variable, or on the command line)"
    )]
    Missing {
        /// The config field.
        field: &'static str,

        /// The environment variable that sets this field.
        env_var: &'static str,
    },

    /// A config file was passed in explicitly but could not be read.
    #[error("failed to read config file at `{path}`")]
    Read {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A config file was passed in explicitly but could not be parsed.
    #[error("failed to parse config file at `{path}`")]
    Parse {
        /// The path to the config file.
        path: Utf8PathBuf,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// An error that occurs while parsing a line of an event stream.
#[derive(Debug, Error)]
#[error("invalid event on line {line}")]
pub struct EventParseError {
    line: usize,
    #[source]
    error: serde_json::Error,
}

impl EventParseError {
    pub(crate) fn new(line: usize, error: serde_json::Error) -> Self {
        Self { line, error }
    }

    /// Returns the 1-based line number of the invalid event.
    pub fn line(&self) -> usize {
        self.line
    }
}

/// An error that occurs while reading events.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ReadEventsError {
    /// Reading the input failed.
    #[error("failed to read events from {source_name}")]
    Io {
        /// A description of the input.
        source_name: String,

        /// The underlying error.
        #[source]
        error: std::io::Error,
    },

    /// A line of an NDJSON stream could not be parsed.
    #[error("failed to parse events from {source_name}")]
    Event {
        /// A description of the input.
        source_name: String,

        /// The underlying error.
        #[source]
        error: EventParseError,
    },

    /// A Jest aggregate results document could not be parsed.
    #[error("failed to parse Jest results from {source_name}")]
    Jest {
        /// A description of the input.
        source_name: String,

        /// The underlying error.
        #[source]
        error: serde_json::Error,
    },
}

/// Displays an error along with the chain of its sources.
#[derive(Debug)]
pub struct DisplayErrorChain<E> {
    error: E,
}

impl<E: error::Error> DisplayErrorChain<E> {
    /// Creates a new `DisplayErrorChain`.
    pub fn new(error: E) -> Self {
        Self { error }
    }
}

impl<E: error::Error> fmt::Display for DisplayErrorChain<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.error)?;
        let mut source = self.error.source();
        while let Some(error) = source {
            write!(f, "\n  caused by: {error}")?;
            source = error.source();
        }
        Ok(())
    }
}
