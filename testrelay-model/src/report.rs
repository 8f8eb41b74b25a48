// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};
use std::{error, fmt, str::FromStr};

/// A key-value pair attached to a launch.
///
/// Attributes without a key are displayed as plain tags by most backends.
#[derive(Clone, Debug, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Attribute {
    /// The key of this attribute, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key: Option<String>,

    /// The value of this attribute.
    pub value: String,

    /// Whether this attribute was generated by the reporter rather than by the user.
    ///
    /// System attributes are hidden in most backend views.
    #[serde(default, skip_serializing_if = "is_false")]
    pub system: bool,
}

impl Attribute {
    /// Creates a new user attribute with a key.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
            system: false,
        }
    }

    /// Creates a new user attribute without a key.
    pub fn tag(value: impl Into<String>) -> Self {
        Self {
            key: None,
            value: value.into(),
            system: false,
        }
    }

    /// Creates a new system attribute.
    pub fn system(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: Some(key.into()),
            value: value.into(),
            system: true,
        }
    }

    /// Parses an attribute from its `key:value` form.
    ///
    /// Input without a `:` becomes a tag with no key.
    pub fn parse(input: &str) -> Self {
        match input.split_once(':') {
            Some((key, value)) => Self::new(key, value),
            None => Self::tag(input),
        }
    }
}

impl fmt::Display for Attribute {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.key {
            Some(key) => write!(f, "{key}:{}", self.value),
            None => write!(f, "{}", self.value),
        }
    }
}

/// The mode a launch is reported in.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum LaunchMode {
    /// A regular launch, visible to all project members.
    #[default]
    Default,

    /// A debug launch, only visible to its owner.
    Debug,
}

impl LaunchMode {
    /// Returns the string used for this mode on the wire.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Default => "DEFAULT",
            Self::Debug => "DEBUG",
        }
    }
}

impl FromStr for LaunchMode {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "DEFAULT" => Ok(Self::Default),
            "DEBUG" => Ok(Self::Debug),
            _ => Err(ParseEnumError::new("launch mode", s, &["DEFAULT", "DEBUG"])),
        }
    }
}

/// The request to start a launch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartLaunch {
    /// The name of the launch.
    pub name: String,

    /// A free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// User attributes, followed by system attributes.
    pub attributes: Vec<Attribute>,

    /// The mode of the launch.
    pub mode: LaunchMode,

    /// Whether this launch reruns an earlier one.
    #[serde(skip_serializing_if = "is_false")]
    pub rerun: bool,

    /// The backend identifier of the launch being rerun.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rerun_of: Option<String>,

    /// The time at which the launch started.
    pub start_time: DateTime<FixedOffset>,
}

impl StartLaunch {
    /// Creates a new `StartLaunch` with the given name and start time.
    pub fn new(name: impl Into<String>, start_time: impl Into<DateTime<FixedOffset>>) -> Self {
        Self {
            name: name.into(),
            description: None,
            attributes: vec![],
            mode: LaunchMode::Default,
            rerun: false,
            rerun_of: None,
            start_time: start_time.into(),
        }
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Adds an attribute.
    pub fn add_attribute(&mut self, attribute: Attribute) -> &mut Self {
        self.attributes.push(attribute);
        self
    }

    /// Adds several attributes, preserving their order.
    pub fn add_attributes(&mut self, attributes: impl IntoIterator<Item = Attribute>) -> &mut Self {
        self.attributes.extend(attributes);
        self
    }

    /// Sets the mode.
    pub fn set_mode(&mut self, mode: LaunchMode) -> &mut Self {
        self.mode = mode;
        self
    }

    /// Marks this launch as a rerun, optionally of a specific earlier launch.
    pub fn set_rerun(&mut self, rerun: bool, rerun_of: Option<String>) -> &mut Self {
        self.rerun = rerun;
        self.rerun_of = rerun_of;
        self
    }
}

/// The request to finish a launch.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishLaunch {
    /// The time at which the launch ended.
    pub end_time: DateTime<FixedOffset>,
}

impl FinishLaunch {
    /// Creates a new `FinishLaunch`.
    pub fn new(end_time: impl Into<DateTime<FixedOffset>>) -> Self {
        Self {
            end_time: end_time.into(),
        }
    }
}

/// The kind of an item within a launch.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ItemType {
    /// A grouping level: a test file or a top-level describe block.
    Suite,

    /// A nested grouping level below a suite.
    Test,

    /// A single invocation of a test, carrying a status.
    Step,
}

impl fmt::Display for ItemType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Suite => write!(f, "SUITE"),
            Self::Test => write!(f, "TEST"),
            Self::Step => write!(f, "STEP"),
        }
    }
}

/// The request to start an item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartItem {
    /// The kind of item.
    #[serde(rename = "type")]
    pub item_type: ItemType,

    /// The display name.
    pub name: String,

    /// A stable reference to the location of the item in source code.
    ///
    /// Backends use this to match items across launches.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code_ref: Option<String>,

    /// A free-form description.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Whether this item is a retry of an earlier item with the same code reference.
    #[serde(skip_serializing_if = "is_false")]
    pub retry: bool,

    /// The time at which the item started.
    pub start_time: DateTime<FixedOffset>,
}

impl StartItem {
    /// Creates a new `StartItem`.
    pub fn new(
        item_type: ItemType,
        name: impl Into<String>,
        start_time: impl Into<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            item_type,
            name: name.into(),
            code_ref: None,
            description: None,
            retry: false,
            start_time: start_time.into(),
        }
    }

    /// Sets the code reference.
    pub fn set_code_ref(&mut self, code_ref: impl Into<String>) -> &mut Self {
        self.code_ref = Some(code_ref.into());
        self
    }

    /// Sets the description.
    pub fn set_description(&mut self, description: impl Into<String>) -> &mut Self {
        self.description = Some(description.into());
        self
    }

    /// Sets the retry flag.
    pub fn set_retry(&mut self, retry: bool) -> &mut Self {
        self.retry = retry;
        self
    }
}

/// The outcome of a step.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    /// The step passed.
    Passed,

    /// The step failed.
    Failed,

    /// The step was not run.
    Skipped,
}

impl fmt::Display for Status {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Passed => write!(f, "passed"),
            Self::Failed => write!(f, "failed"),
            Self::Skipped => write!(f, "skipped"),
        }
    }
}

/// A defect classification attached to a finished item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Issue {
    /// The issue type locator, e.g. `NOT_ISSUE`.
    pub issue_type: String,
}

impl Issue {
    /// The locator for "this is not a defect".
    pub const NOT_ISSUE: &'static str = "NOT_ISSUE";

    /// Creates an issue marking the item as not a defect.
    ///
    /// Skipped steps carry this marker so that backends don't flag them for
    /// investigation.
    pub fn not_issue() -> Self {
        Self {
            issue_type: Self::NOT_ISSUE.to_owned(),
        }
    }
}

/// The request to finish an item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FinishItem {
    /// The outcome. Suites and tests are finished without one, and the
    /// backend derives their status from their children.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<Status>,

    /// Whether this item is a retry.
    #[serde(skip_serializing_if = "is_false")]
    pub retry: bool,

    /// A defect classification.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub issue: Option<Issue>,

    /// The time at which the item ended.
    pub end_time: DateTime<FixedOffset>,
}

impl FinishItem {
    /// Creates a new `FinishItem` without a status.
    pub fn new(end_time: impl Into<DateTime<FixedOffset>>) -> Self {
        Self {
            status: None,
            retry: false,
            issue: None,
            end_time: end_time.into(),
        }
    }

    /// Sets the status.
    pub fn set_status(&mut self, status: Status) -> &mut Self {
        self.status = Some(status);
        self
    }

    /// Sets the retry flag.
    pub fn set_retry(&mut self, retry: bool) -> &mut Self {
        self.retry = retry;
        self
    }

    /// Sets the issue.
    pub fn set_issue(&mut self, issue: Issue) -> &mut Self {
        self.issue = Some(issue);
        self
    }
}

/// The severity of a log entry.
#[derive(Copy, Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogLevel {
    /// A failure.
    Error,
    /// Something unexpected that did not fail the item.
    Warn,
    /// Informational.
    Info,
    /// Debugging detail.
    Debug,
    /// Fine-grained tracing.
    Trace,
}

/// A log entry attached to an item.
#[derive(Clone, Debug, Eq, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    /// The severity.
    pub level: LogLevel,

    /// The message. Backends render it as plain text.
    pub message: String,

    /// The time at which the entry was produced.
    pub time: DateTime<FixedOffset>,
}

impl LogEntry {
    /// Creates a new `LogEntry`.
    pub fn new(
        level: LogLevel,
        message: impl Into<String>,
        time: impl Into<DateTime<FixedOffset>>,
    ) -> Self {
        Self {
            level,
            message: message.into(),
            time: time.into(),
        }
    }
}

/// An error that occurs while parsing one of the enums in this crate from a string.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ParseEnumError {
    kind: &'static str,
    input: String,
    known: &'static [&'static str],
}

impl ParseEnumError {
    /// Creates a new `ParseEnumError`.
    pub fn new(kind: &'static str, input: impl Into<String>, known: &'static [&'static str]) -> Self {
        Self {
            kind,
            input: input.into(),
            known,
        }
    }
}

impl fmt::Display for ParseEnumError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "unrecognized value for {}: {}\n(known values: {})",
            self.kind,
            self.input,
            self.known.join(", ")
        )
    }
}

impl error::Error for ParseEnumError {}

fn is_false(value: &bool) -> bool {
    !*value
}
