// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Top-level application and command routing.

use crate::{
    ExpectedError, Result, TestrelayExitCode,
    output::{OutputContext, OutputOpts, OutputWriter},
    replay::{InputFormat, current_dir, open_input, read_events, replay},
};
use camino::{Utf8Path, Utf8PathBuf};
use clap::{Args, Parser, Subcommand, ValueEnum};
use owo_colors::OwoColorize;
use testrelay_model::{Attribute, LaunchMode};
use testrelay_runner::{
    client::{HttpReportingClient, RecordingClient},
    config::{ListenerMode, PartialConfig, ReporterConfig, SuiteLifetime},
    path::PathResolver,
    reporter::{ReportingStateMachine, RunSummary},
};
use tracing::{debug, info, warn};

/// Relays the results of a test run to a remote reporting backend.
#[derive(Debug, Parser)]
#[command(
    name = "testrelay",
    version,
    styles = crate::output::clap_styles::style(),
    max_term_width = 100
)]
pub struct TestrelayApp {
    #[clap(flatten)]
    output: OutputOpts,

    #[clap(subcommand)]
    command: Command,
}

impl TestrelayApp {
    /// Initializes the output context.
    pub fn init_output(&self) -> OutputContext {
        self.output.init()
    }

    /// Executes the app.
    ///
    /// Returns the exit code.
    pub fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        match self.command {
            Command::Report(opts) => opts.exec(output, output_writer),
            Command::ShowConfig(opts) => opts.exec(output_writer),
        }
    }
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Report the events of a test run
    ///
    /// Events are read from standard input by default. Use `--dry-run` to print
    /// the hierarchy that would be reported without contacting the backend.
    Report(Box<ReportOpts>),

    /// Print the merged configuration as JSON
    ///
    /// The access token is redacted.
    ShowConfig(ShowConfigOpts),
}

#[derive(Debug, Args)]
struct ReportOpts {
    /// File to read events from, or `-` for standard input
    #[arg(long, short, value_name = "PATH")]
    input: Option<Utf8PathBuf>,

    /// Format of the input
    #[arg(long, value_enum, default_value_t)]
    format: InputFormat,

    /// Print the report hierarchy instead of sending it to the backend
    #[arg(long)]
    dry_run: bool,

    /// Exit with a non-zero code if any reporting call failed
    #[arg(long)]
    fail_on_report_errors: bool,

    #[clap(flatten)]
    config: ConfigOpts,
}

impl ReportOpts {
    fn exec(self, output: OutputContext, output_writer: &mut OutputWriter) -> Result<i32> {
        let cwd = current_dir()?;
        let config = self.config.load(&cwd)?;
        if config.debug {
            output.raise_log_level();
        }
        debug!("using config: {:?}", config.redacted());

        let (reader, source_name) = open_input(self.input.as_deref())?;
        let events = read_events(reader, source_name, self.format)?;

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .thread_name("testrelay-worker")
            .build()
            .map_err(|error| ExpectedError::RuntimeCreateFailed { error })?;
        let resolver = PathResolver::new(&cwd);

        let summary = if self.dry_run {
            let mut machine = ReportingStateMachine::new(RecordingClient::new(), config, resolver);
            let summary = runtime.block_on(replay(&mut machine, events))?;

            output_writer
                .write_stdout(&machine.client().render_tree())
                .map_err(|error| ExpectedError::WriteFailed { error })?;
            summary
        } else {
            let backend = config.backend()?;
            let client = HttpReportingClient::new(
                backend.endpoint,
                backend.project,
                backend.access_token.to_owned(),
                runtime.handle().clone(),
            )
            .map_err(|error| ExpectedError::ClientCreateFailed { error })?;
            debug!("reporting to {}", client.base_url());

            let mut machine = ReportingStateMachine::new(client, config, resolver);
            runtime.block_on(replay(&mut machine, events))?
        };

        log_summary(&summary, &output);
        if !summary.is_success() && self.fail_on_report_errors {
            return Err(ExpectedError::ReportFailed {
                failed: summary.failed_operations,
            });
        }
        Ok(TestrelayExitCode::OK)
    }
}

fn log_summary(summary: &RunSummary, output: &OutputContext) {
    let styles = output.stderr_styles();
    info!(
        "{} {} suites, {} tests and {} steps",
        "Reported".style(styles.success),
        summary.suites.style(styles.bold),
        summary.tests.style(styles.bold),
        summary.steps.style(styles.bold),
    );
    if !summary.is_success() {
        warn!(
            "{} of {} reporting operations failed",
            summary.failed_operations.style(styles.warning_text),
            summary.settled_operations,
        );
    }
}

#[derive(Debug, Args)]
struct ShowConfigOpts {
    #[clap(flatten)]
    config: ConfigOpts,
}

impl ShowConfigOpts {
    fn exec(self, output_writer: &mut OutputWriter) -> Result<i32> {
        let cwd = current_dir()?;
        let config = self.config.load(&cwd)?;
        let mut json = serde_json::to_string_pretty(&config.redacted())
            .map_err(|error| ExpectedError::ConfigSerializeFailed { error })?;
        json.push('\n');

        output_writer
            .write_stdout(&json)
            .map_err(|error| ExpectedError::WriteFailed { error })?;
        Ok(TestrelayExitCode::OK)
    }
}

/// Options that override configuration from files and the environment.
#[derive(Debug, Default, Args)]
#[command(next_help_heading = "Config options")]
struct ConfigOpts {
    /// Config file to use instead of the nearest testrelay.json
    #[arg(long, value_name = "PATH")]
    config_file: Option<Utf8PathBuf>,

    /// Base URL of the reporting backend
    #[arg(long, value_name = "URL")]
    endpoint: Option<String>,

    /// Access token for the reporting backend
    #[arg(long, value_name = "TOKEN")]
    token: Option<String>,

    /// Backend project to report into
    #[arg(long)]
    project: Option<String>,

    /// Name of the launch
    #[arg(long, value_name = "NAME")]
    testset: Option<String>,

    /// Description of the launch
    #[arg(long)]
    description: Option<String>,

    /// Attribute to attach to the launch, as KEY:VALUE or a bare VALUE
    #[arg(long = "attribute", value_name = "KEY:VALUE")]
    attributes: Vec<String>,

    /// Mark the launch as a rerun
    #[arg(long)]
    rerun: bool,

    /// Backend id of the launch being rerun
    #[arg(long, value_name = "ID")]
    rerun_of: Option<String>,

    /// Launch mode
    #[arg(long, value_enum)]
    mode: Option<ModeOpt>,

    /// Whether skipped steps are treated as issues
    #[arg(long, value_name = "BOOL")]
    skipped_issue: Option<bool>,

    /// How steps are reported
    #[arg(long, value_enum)]
    listener_mode: Option<ListenerModeOpt>,

    /// When suites and nested tests are finished
    #[arg(long, value_enum)]
    suite_lifetime: Option<SuiteLifetimeOpt>,
}

impl ConfigOpts {
    fn load(&self, cwd: &Utf8Path) -> Result<ReporterConfig> {
        let file = match &self.config_file {
            Some(path) => PartialConfig::from_file(path)?,
            None => PartialConfig::discover(cwd),
        };
        let env = PartialConfig::from_env(|name| std::env::var(name).ok());
        Ok(ReporterConfig::merge(
            PartialConfig::defaults(),
            file,
            env,
            self.explicit_layer(),
        ))
    }

    fn explicit_layer(&self) -> PartialConfig {
        PartialConfig {
            endpoint: self.endpoint.clone(),
            access_token: self.token.clone(),
            project: self.project.clone(),
            testset: self.testset.clone(),
            description: self.description.clone(),
            attributes: (!self.attributes.is_empty()).then(|| {
                self.attributes
                    .iter()
                    .map(|attribute| Attribute::parse(attribute))
                    .collect()
            }),
            rerun: self.rerun.then_some(true),
            rerun_of: self.rerun_of.clone(),
            mode: self.mode.map(Into::into),
            skipped_issue: self.skipped_issue,
            listener_mode: self.listener_mode.map(Into::into),
            suite_lifetime: self.suite_lifetime.map(Into::into),
            debug: None,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ModeOpt {
    Default,
    Debug,
}

impl From<ModeOpt> for LaunchMode {
    fn from(opt: ModeOpt) -> Self {
        match opt {
            ModeOpt::Default => LaunchMode::Default,
            ModeOpt::Debug => LaunchMode::Debug,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum ListenerModeOpt {
    Default,
    Fast,
}

impl From<ListenerModeOpt> for ListenerMode {
    fn from(opt: ListenerModeOpt) -> Self {
        match opt {
            ListenerModeOpt::Default => ListenerMode::Default,
            ListenerModeOpt::Fast => ListenerMode::Fast,
        }
    }
}

#[derive(Copy, Clone, Debug, ValueEnum)]
enum SuiteLifetimeOpt {
    PerRun,
    PerFile,
}

impl From<SuiteLifetimeOpt> for SuiteLifetime {
    fn from(opt: SuiteLifetimeOpt) -> Self {
        match opt {
            SuiteLifetimeOpt::PerRun => SuiteLifetime::PerRun,
            SuiteLifetimeOpt::PerFile => SuiteLifetime::PerFile,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::output::Color;
    use camino_tempfile::Utf8TempDir;
    use clap::CommandFactory;
    use indoc::indoc;
    use pretty_assertions::assert_eq;
    use test_case::test_case;

    fn output() -> OutputContext {
        OutputContext {
            verbose: false,
            color: Color::Never,
        }
    }

    fn exec(args: &[&str]) -> (Result<i32>, String) {
        let app = TestrelayApp::try_parse_from(args).expect("arguments are valid");
        let mut writer = OutputWriter::Test { stdout: Vec::new() };
        let result = app.exec(output(), &mut writer);
        let OutputWriter::Test { stdout } = writer else {
            unreachable!("writer is a test writer")
        };
        (result, String::from_utf8(stdout).expect("output is UTF-8"))
    }

    fn write_file(dir: &Utf8TempDir, name: &str, contents: &str) -> Utf8PathBuf {
        let path = dir.path().join(name);
        std::fs::write(&path, contents).expect("fixture written");
        path
    }

    #[test]
    fn verify_app() {
        TestrelayApp::command().debug_assert();
    }

    #[test]
    fn explicit_layer_from_args() {
        let app = TestrelayApp::try_parse_from([
            "testrelay",
            "report",
            "--endpoint",
            "https://reports.example.com",
            "--attribute",
            "os:linux",
            "--attribute",
            "nightly",
            "--rerun",
            "--mode",
            "debug",
            "--skipped-issue",
            "false",
            "--listener-mode",
            "fast",
            "--suite-lifetime",
            "per-file",
        ])
        .expect("arguments are valid");
        let Command::Report(opts) = app.command else {
            panic!("expected report command");
        };

        assert_eq!(
            opts.config.explicit_layer(),
            PartialConfig {
                endpoint: Some("https://reports.example.com".to_owned()),
                attributes: Some(vec![
                    Attribute::new("os", "linux"),
                    Attribute::tag("nightly"),
                ]),
                rerun: Some(true),
                mode: Some(LaunchMode::Debug),
                skipped_issue: Some(false),
                listener_mode: Some(ListenerMode::Fast),
                suite_lifetime: Some(SuiteLifetime::PerFile),
                ..PartialConfig::default()
            }
        );
    }

    #[test]
    fn explicit_layer_empty() {
        assert_eq!(ConfigOpts::default().explicit_layer(), PartialConfig::default());
    }

    #[test_case(&["testrelay", "report", "--format", "xml"] ; "unknown format")]
    #[test_case(&["testrelay", "report", "--skipped-issue", "maybe"] ; "invalid bool")]
    #[test_case(&["testrelay", "show-config", "--suite-lifetime", "forever"] ; "unknown lifetime")]
    fn invalid_args(args: &[&str]) {
        TestrelayApp::try_parse_from(args).expect_err("arguments are invalid");
    }

    #[test]
    fn show_config_redacts_token() {
        let dir = camino_tempfile::tempdir().expect("tempdir created");
        let config_file = write_file(
            &dir,
            "testrelay.json",
            r#"{"endpoint": "https://reports.example.com", "accessToken": "secret", "project": "web"}"#,
        );

        let (result, stdout) = exec(&[
            "testrelay",
            "show-config",
            "--config-file",
            config_file.as_str(),
            "--testset",
            "Nightly",
        ]);
        assert_eq!(result.expect("show-config succeeds"), TestrelayExitCode::OK);

        let shown: serde_json::Value = serde_json::from_str(&stdout).expect("output is JSON");
        assert_eq!(shown["accessToken"], "<redacted>");
        assert_eq!(shown["endpoint"], "https://reports.example.com");
        assert_eq!(shown["testset"], "Nightly");
        assert!(!stdout.contains("secret"), "token leaked: {stdout}");
    }

    #[test]
    fn missing_config_file() {
        let dir = camino_tempfile::tempdir().expect("tempdir created");
        let missing = dir.path().join("missing.json");
        let (result, _) = exec(&["testrelay", "show-config", "--config-file", missing.as_str()]);
        let error = result.expect_err("config file is missing");
        assert_eq!(error.process_exit_code(), TestrelayExitCode::SETUP_ERROR);
    }

    #[test]
    fn report_dry_run() {
        let dir = camino_tempfile::tempdir().expect("tempdir created");
        let config_file = write_file(&dir, "testrelay.json", r#"{"testset": "Dry Run"}"#);
        let input = write_file(
            &dir,
            "results.json",
            indoc! {r#"
                {
                  "testResults": [
                    {
                      "name": "/project/math.test.js",
                      "assertionResults": [
                        {"title": "adds", "ancestorTitles": ["math"], "status": "passed"},
                        {"title": "divides", "ancestorTitles": ["math"], "status": "failed", "failureMessages": ["boom"]}
                      ]
                    }
                  ]
                }
            "#},
        );

        let (result, stdout) = exec(&[
            "testrelay",
            "report",
            "--dry-run",
            "--format",
            "jest-json",
            "--input",
            input.as_str(),
            "--config-file",
            config_file.as_str(),
        ]);
        assert_eq!(result.expect("dry run succeeds"), TestrelayExitCode::OK);
        assert_eq!(
            stdout,
            indoc! {"
                launch: Dry Run
                  SUITE math
                    STEP adds: passed
                    STEP divides: failed
                      [Error] boom
            "}
        );
    }

    #[test]
    fn report_invalid_input() {
        let dir = camino_tempfile::tempdir().expect("tempdir created");
        let config_file = write_file(&dir, "testrelay.json", "{}");
        let input = write_file(&dir, "events.ndjson", "{\"event\": \"run-started\"}\nnot json\n");

        let (result, _) = exec(&[
            "testrelay",
            "report",
            "--dry-run",
            "--input",
            input.as_str(),
            "--config-file",
            config_file.as_str(),
        ]);
        let error = result.expect_err("line 2 is invalid");
        assert_eq!(error.process_exit_code(), TestrelayExitCode::INPUT_ERROR);
    }
}
