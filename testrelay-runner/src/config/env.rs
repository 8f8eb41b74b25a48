// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::{ListenerMode, PartialConfig};
use testrelay_model::Attribute;
use tracing::warn;

/// The environment variable for [`ReporterConfig::endpoint`](super::ReporterConfig::endpoint).
pub const ENV_ENDPOINT: &str = "TESTRELAY_ENDPOINT";
/// The environment variable for [`ReporterConfig::access_token`](super::ReporterConfig::access_token).
pub const ENV_ACCESS_TOKEN: &str = "TESTRELAY_ACCESSTOKEN";
/// The environment variable for [`ReporterConfig::project`](super::ReporterConfig::project).
pub const ENV_PROJECT: &str = "TESTRELAY_PROJECT";
/// The environment variable for [`ReporterConfig::testset`](super::ReporterConfig::testset).
pub const ENV_TESTSET: &str = "TESTRELAY_TESTSET";
/// The environment variable for [`ReporterConfig::description`](super::ReporterConfig::description).
pub const ENV_DESCRIPTION: &str = "TESTRELAY_DESCRIPTION";
/// The environment variable for [`ReporterConfig::attributes`](super::ReporterConfig::attributes).
pub const ENV_ATTRIBUTES: &str = "TESTRELAY_ATTRIBUTES";
/// The environment variable for [`ReporterConfig::listener_mode`](super::ReporterConfig::listener_mode).
pub const ENV_LISTENER_MODE: &str = "TESTRELAY_LISTENER_MODE";
/// The environment variable for [`ReporterConfig::skipped_issue`](super::ReporterConfig::skipped_issue).
pub const ENV_SKIPPED_ISSUE: &str = "TESTRELAY_SKIPPED_ISSUE";

impl PartialConfig {
    /// Builds the environment layer from `lookup`, usually backed by [`std::env::var`].
    ///
    /// Unset and empty variables are ignored. A variable with a value that
    /// cannot be parsed is logged and ignored, so lower layers apply instead.
    pub fn from_env<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |name: &str| lookup(name).filter(|value| !value.is_empty());

        let listener_mode = get(ENV_LISTENER_MODE).and_then(|value| {
            value
                .parse::<ListenerMode>()
                .inspect_err(|error| {
                    warn!("ignoring invalid value for {ENV_LISTENER_MODE}: {error}");
                })
                .ok()
        });

        let skipped_issue =
            get(ENV_SKIPPED_ISSUE).and_then(|value| match value.to_ascii_lowercase().as_str() {
                "true" => Some(true),
                "false" => Some(false),
                _ => {
                    warn!(
                        "ignoring invalid value for {ENV_SKIPPED_ISSUE}: \
                         expected `true` or `false`, found `{value}`"
                    );
                    None
                }
            });

        Self {
            endpoint: get(ENV_ENDPOINT),
            access_token: get(ENV_ACCESS_TOKEN),
            project: get(ENV_PROJECT),
            testset: get(ENV_TESTSET),
            description: get(ENV_DESCRIPTION),
            attributes: get(ENV_ATTRIBUTES).map(|value| parse_attribute_list(&value)),
            listener_mode,
            skipped_issue,
            ..Default::default()
        }
    }
}

/// Parses a comma-separated list of attributes, each `key:value` or a bare `value`.
pub fn parse_attribute_list(input: &str) -> Vec<Attribute> {
    input
        .split(',')
        .map(str::trim)
        .filter(|item| !item.is_empty())
        .map(Attribute::parse)
        .collect()
}
