// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Reporter configuration.
//!
//! Configuration is assembled from four layers, in increasing priority:
//!
//! 1. the defaults embedded in this crate,
//! 2. the nearest `testrelay.json` in the working directory or one of its ancestors,
//! 3. `TESTRELAY_*` environment variables,
//! 4. options passed in explicitly, typically on the command line.

mod discovery;
mod env;

pub use discovery::*;
pub use env::*;

use crate::errors::ConfigError;
use serde::{Deserialize, Serialize};
use std::{collections::BTreeSet, fmt, str::FromStr};
use testrelay_model::{Attribute, LaunchMode, ParseEnumError};
use tracing::warn;

/// The fully merged reporter configuration.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReporterConfig {
    /// The base URL of the backend, without the `/api/v1` suffix.
    pub endpoint: Option<String>,

    /// The token used to authenticate with the backend.
    pub access_token: Option<String>,

    /// The backend project to report into.
    pub project: Option<String>,

    /// The name of the launch.
    pub testset: String,

    /// The launch description.
    pub description: Option<String>,

    /// User attributes attached to the launch.
    pub attributes: Vec<Attribute>,

    /// Whether the launch reruns an earlier launch.
    pub rerun: bool,

    /// The backend id of the launch being rerun.
    pub rerun_of: Option<String>,

    /// The launch mode.
    pub mode: LaunchMode,

    /// The skipped-issue policy.
    ///
    /// `Some(false)` marks skipped steps as "not an issue". `None` and
    /// `Some(true)` leave them unmarked, for the backend to classify.
    pub skipped_issue: Option<bool>,

    /// How steps are reported.
    pub listener_mode: ListenerMode,

    /// When suites and nested tests are finished.
    pub suite_lifetime: SuiteLifetime,

    /// Enables debug output.
    pub debug: bool,
}

/// The launch name used when nothing else is configured.
pub const DEFAULT_TESTSET: &str = "Unit Tests";

impl ReporterConfig {
    /// The embedded default configuration.
    pub const DEFAULT_CONFIG: &'static str = include_str!("../default-config.json");

    /// Merges the configuration layers, in increasing priority.
    ///
    /// For every field, the value from the highest-priority layer that sets it wins.
    pub fn merge(
        defaults: PartialConfig,
        file: PartialConfig,
        env: PartialConfig,
        explicit: PartialConfig,
    ) -> Self {
        let merged = defaults.overlay(file).overlay(env).overlay(explicit);
        Self {
            endpoint: merged.endpoint,
            access_token: merged.access_token,
            project: merged.project,
            testset: merged.testset.unwrap_or_else(|| DEFAULT_TESTSET.to_owned()),
            description: merged.description,
            attributes: merged.attributes.unwrap_or_default(),
            rerun: merged.rerun.unwrap_or(false),
            rerun_of: merged.rerun_of,
            mode: merged.mode.unwrap_or_default(),
            skipped_issue: merged.skipped_issue,
            listener_mode: merged.listener_mode.unwrap_or_default(),
            suite_lifetime: merged.suite_lifetime.unwrap_or_default(),
            debug: merged.debug.unwrap_or(false),
        }
    }

    /// Returns the settings needed to connect to the backend.
    ///
    /// Returns an error if any of them is missing.
    pub fn backend(&self) -> Result<BackendSettings<'_>, ConfigError> {
        fn required<'a>(
            value: Option<&'a str>,
            field: &'static str,
            env_var: &'static str,
        ) -> Result<&'a str, ConfigError> {
            match value {
                Some(value) if !value.is_empty() => Ok(value),
                _ => Err(ConfigError::Missing { field, env_var }),
            }
        }

        Ok(BackendSettings {
            endpoint: required(self.endpoint.as_deref(), "endpoint", ENV_ENDPOINT)?,
            access_token: required(
                self.access_token.as_deref(),
                "accessToken",
                ENV_ACCESS_TOKEN,
            )?,
            project: required(self.project.as_deref(), "project", ENV_PROJECT)?,
        })
    }

    /// Returns a copy of this configuration with the access token hidden, for display.
    pub fn redacted(&self) -> Self {
        Self {
            access_token: self.access_token.as_ref().map(|_| "<redacted>".to_owned()),
            ..self.clone()
        }
    }
}

/// The settings needed to connect to the backend, as returned by [`ReporterConfig::backend`].
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub struct BackendSettings<'a> {
    /// The base URL of the backend.
    pub endpoint: &'a str,

    /// The access token.
    pub access_token: &'a str,

    /// The project.
    pub project: &'a str,
}

/// One layer of configuration. Every field is optional.
#[derive(Clone, Debug, Default, Eq, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PartialConfig {
    /// See [`ReporterConfig::endpoint`].
    pub endpoint: Option<String>,
    /// See [`ReporterConfig::access_token`].
    pub access_token: Option<String>,
    /// See [`ReporterConfig::project`].
    pub project: Option<String>,
    /// See [`ReporterConfig::testset`].
    pub testset: Option<String>,
    /// See [`ReporterConfig::description`].
    pub description: Option<String>,
    /// See [`ReporterConfig::attributes`].
    pub attributes: Option<Vec<Attribute>>,
    /// See [`ReporterConfig::rerun`].
    pub rerun: Option<bool>,
    /// See [`ReporterConfig::rerun_of`].
    pub rerun_of: Option<String>,
    /// See [`ReporterConfig::mode`].
    pub mode: Option<LaunchMode>,
    /// See [`ReporterConfig::skipped_issue`].
    pub skipped_issue: Option<bool>,
    /// See [`ReporterConfig::listener_mode`].
    pub listener_mode: Option<ListenerMode>,
    /// See [`ReporterConfig::suite_lifetime`].
    pub suite_lifetime: Option<SuiteLifetime>,
    /// See [`ReporterConfig::debug`].
    pub debug: Option<bool>,
}

impl PartialConfig {
    /// Returns the embedded default layer.
    pub fn defaults() -> Self {
        let (config, unknown) = Self::from_json_str(ReporterConfig::DEFAULT_CONFIG)
            .expect("default config is always valid");

        // The default config is shipped with this binary, so unknown keys are a bug.
        if !unknown.is_empty() {
            panic!(
                "found unknown keys in default config: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }
        config
    }

    /// Parses a layer from JSON, returning it along with the paths of any unknown keys.
    pub fn from_json_str(input: &str) -> Result<(Self, BTreeSet<String>), serde_json::Error> {
        let mut unknown = BTreeSet::new();
        let mut deserializer = serde_json::Deserializer::from_str(input);
        let config = serde_ignored::deserialize(&mut deserializer, |path: serde_ignored::Path| {
            unknown.insert(path.to_string());
        })?;
        deserializer.end()?;
        Ok((config, unknown))
    }

    /// Parses a layer from JSON, warning about unknown keys. `source` names the
    /// input in the warning.
    pub fn from_json_str_warn_unknown(input: &str, source: &str) -> Result<Self, serde_json::Error> {
        let (config, unknown) = Self::from_json_str(input)?;
        if !unknown.is_empty() {
            warn!(
                "ignoring unknown configuration keys in {source}: {}",
                unknown.into_iter().collect::<Vec<_>>().join(", ")
            );
        }
        Ok(config)
    }

    /// Returns a layer with the fields of `higher` where it sets them, and the
    /// fields of `self` elsewhere.
    pub fn overlay(self, higher: PartialConfig) -> PartialConfig {
        PartialConfig {
            endpoint: higher.endpoint.or(self.endpoint),
            access_token: higher.access_token.or(self.access_token),
            project: higher.project.or(self.project),
            testset: higher.testset.or(self.testset),
            description: higher.description.or(self.description),
            attributes: higher.attributes.or(self.attributes),
            rerun: higher.rerun.or(self.rerun),
            rerun_of: higher.rerun_of.or(self.rerun_of),
            mode: higher.mode.or(self.mode),
            skipped_issue: higher.skipped_issue.or(self.skipped_issue),
            listener_mode: higher.listener_mode.or(self.listener_mode),
            suite_lifetime: higher.suite_lifetime.or(self.suite_lifetime),
            debug: higher.debug.or(self.debug),
        }
    }
}

/// How each test invocation is reported.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ListenerMode {
    /// Start and finish each step with separate calls, attaching failure logs in between.
    #[default]
    Default,

    /// Start and finish each step with a single call. Failure logs are not sent.
    Fast,
}

impl ListenerMode {
    /// Returns the string form of this mode.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Fast => "FAST",
        }
    }
}

impl FromStr for ListenerMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(Self::Default),
            "FAST" => Ok(Self::Fast),
            _ => Err(ParseEnumError::new("listener mode", s, &["DEFAULT", "FAST"])),
        }
    }
}

impl fmt::Display for ListenerMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// When suites and nested tests are finished.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum SuiteLifetime {
    /// Suites are created at most once per run, and finished when the run completes.
    #[default]
    PerRun,

    /// Suites are finished after each test file, and created again if a later
    /// file refers to them.
    PerFile,
}

impl SuiteLifetime {
    /// Returns the string form of this lifetime.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::PerRun => "per-run",
            Self::PerFile => "per-file",
        }
    }
}

impl FromStr for SuiteLifetime {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "per-run" => Ok(Self::PerRun),
            "per-file" => Ok(Self::PerFile),
            _ => Err(ParseEnumError::new(
                "suite lifetime",
                s,
                &["per-run", "per-file"],
            )),
        }
    }
}

impl fmt::Display for SuiteLifetime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
