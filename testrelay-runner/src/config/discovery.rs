// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use super::PartialConfig;
use crate::errors::{ConfigError, DisplayErrorChain};
use camino::{Utf8Path, Utf8PathBuf};
use tracing::{debug, warn};

/// The name of the per-project config file.
pub const CONFIG_FILE_NAME: &str = "testrelay.json";

/// Returns the nearest `testrelay.json` in `start` or one of its ancestors.
pub fn discover_config_file(start: &Utf8Path) -> Option<Utf8PathBuf> {
    start
        .ancestors()
        .map(|dir| dir.join(CONFIG_FILE_NAME))
        .find(|candidate| candidate.is_file())
}

impl PartialConfig {
    /// Loads the file layer from the nearest `testrelay.json` above `start`.
    ///
    /// A missing, unreadable or malformed file yields an empty layer. Only the
    /// last two are warned about.
    pub fn discover(start: &Utf8Path) -> Self {
        let Some(path) = discover_config_file(start) else {
            debug!("no {CONFIG_FILE_NAME} found in {start} or its ancestors");
            return Self::default();
        };

        match Self::from_file(&path) {
            Ok(config) => {
                debug!("loaded config from {path}");
                config
            }
            Err(error) => {
                warn!(
                    "ignoring config file: {}",
                    DisplayErrorChain::new(&error)
                );
                Self::default()
            }
        }
    }

    /// Loads a layer from the config file at `path`.
    ///
    /// Unlike [`discover`](Self::discover), failures are returned as errors.
    pub fn from_file(path: &Utf8Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|error| ConfigError::Read {
            path: path.to_owned(),
            error,
        })?;
        Self::from_json_str_warn_unknown(&contents, path.as_str()).map_err(|error| {
            ConfigError::Parse {
                path: path.to_owned(),
                error,
            }
        })
    }
}
