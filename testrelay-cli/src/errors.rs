// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::output::{NO_HEADING_TARGET, StderrStyles};
use camino::Utf8PathBuf;
use owo_colors::OwoColorize;
use std::error::Error;
use testrelay_runner::errors::{ClientError, ConfigError, ReadEventsError};
use thiserror::Error;
use tracing::error;

pub(crate) type Result<T, E = ExpectedError> = std::result::Result<T, E>;

/// Process exit codes returned by testrelay.
pub enum TestrelayExitCode {}

impl TestrelayExitCode {
    /// The run was reported without errors.
    pub const OK: i32 = 0;

    /// Configuration could not be loaded or was incomplete, or the reporter
    /// could not be set up.
    pub const SETUP_ERROR: i32 = 96;

    /// The input events could not be read or parsed.
    pub const INPUT_ERROR: i32 = 97;

    /// Some reporting calls failed, and `--fail-on-report-errors` was passed.
    pub const REPORT_FAILED: i32 = 98;
}

// Note that the #[error()] strings are mostly placeholder messages -- the expected way to print out
// errors is with the display_to_stderr method, which colorizes errors.

/// An error that testrelay expects to be able to report to the user.
#[derive(Debug, Error)]
#[doc(hidden)]
pub enum ExpectedError {
    #[error("could not determine the current directory")]
    CurrentDirFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("current directory is not valid UTF-8")]
    CurrentDirInvalidUtf8 { path: std::path::PathBuf },
    #[error("config error")]
    ConfigError {
        #[from]
        error: ConfigError,
    },
    #[error("failed to create reporting client")]
    ClientCreateFailed {
        #[source]
        error: ClientError,
    },
    #[error("failed to create async runtime")]
    RuntimeCreateFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("failed to open input")]
    InputOpenFailed {
        path: Utf8PathBuf,
        #[source]
        error: std::io::Error,
    },
    #[error("failed to read input")]
    InputReadFailed {
        #[from]
        error: ReadEventsError,
    },
    #[error("failed to write output")]
    WriteFailed {
        #[source]
        error: std::io::Error,
    },
    #[error("failed to serialize config")]
    ConfigSerializeFailed {
        #[source]
        error: serde_json::Error,
    },
    #[error("{failed} reporting operations failed")]
    ReportFailed { failed: usize },
}

impl ExpectedError {
    /// Returns the exit code for the process.
    pub fn process_exit_code(&self) -> i32 {
        match self {
            Self::CurrentDirFailed { .. }
            | Self::CurrentDirInvalidUtf8 { .. }
            | Self::ConfigError { .. }
            | Self::ClientCreateFailed { .. }
            | Self::RuntimeCreateFailed { .. }
            | Self::WriteFailed { .. }
            | Self::ConfigSerializeFailed { .. } => TestrelayExitCode::SETUP_ERROR,
            Self::InputOpenFailed { .. } | Self::InputReadFailed { .. } => {
                TestrelayExitCode::INPUT_ERROR
            }
            Self::ReportFailed { .. } => TestrelayExitCode::REPORT_FAILED,
        }
    }

    /// Displays this error to stderr.
    pub fn display_to_stderr(&self, styles: &StderrStyles) {
        let mut next_error = match self {
            Self::CurrentDirFailed { error } => {
                error!("could not determine the current directory");
                Some(error as &dyn Error)
            }
            Self::CurrentDirInvalidUtf8 { path } => {
                error!(
                    "current directory `{}` is not valid UTF-8",
                    path.display().style(styles.bold)
                );
                None
            }
            Self::ConfigError { error } => {
                error!("{error}");
                error.source()
            }
            Self::ClientCreateFailed { error } => {
                error!("failed to create reporting client");
                Some(error as &dyn Error)
            }
            Self::RuntimeCreateFailed { error } => {
                error!("failed to create async runtime");
                Some(error as &dyn Error)
            }
            Self::InputOpenFailed { path, error } => {
                error!("failed to open input at `{}`", path.style(styles.bold));
                Some(error as &dyn Error)
            }
            Self::InputReadFailed { error } => {
                error!("{error}");
                error.source()
            }
            Self::WriteFailed { error } => {
                error!("failed to write output");
                Some(error as &dyn Error)
            }
            Self::ConfigSerializeFailed { error } => {
                error!("failed to serialize config");
                Some(error as &dyn Error)
            }
            Self::ReportFailed { failed } => {
                error!(
                    "{} reporting {} failed",
                    failed.style(styles.warning_text),
                    if *failed == 1 {
                        "operation"
                    } else {
                        "operations"
                    },
                );
                None
            }
        };

        while let Some(err) = next_error {
            error!(target: NO_HEADING_TARGET, "\nCaused by:\n  {}", err);
            next_error = err.source();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use test_case::test_case;

    #[test_case(
        ExpectedError::ConfigError {
            error: ConfigError::Missing { field: "endpoint", env_var: "TESTRELAY_ENDPOINT" },
        },
        TestrelayExitCode::SETUP_ERROR
        ; "missing config"
    )]
    #[test_case(
        ExpectedError::InputOpenFailed {
            path: "results.json".into(),
            error: std::io::Error::from(std::io::ErrorKind::NotFound),
        },
        TestrelayExitCode::INPUT_ERROR
        ; "missing input"
    )]
    #[test_case(
        ExpectedError::ReportFailed { failed: 2 },
        TestrelayExitCode::REPORT_FAILED
        ; "report failed"
    )]
    fn exit_codes(error: ExpectedError, expected: i32) {
        assert_eq!(error.process_exit_code(), expected);
    }
}
