// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

use crate::fixtures::*;
use color_eyre::eyre::Result;
use indoc::indoc;
use pretty_assertions::assert_eq;
use testrelay_runner::events::JestAggregatedResult;

static JEST_OUTPUT: &str = indoc! {r#"
    {
      "numFailedTests": 0,
      "numPassedTests": 3,
      "numTotalTests": 3,
      "success": true,
      "startTime": 1714564800000,
      "testResults": [
        {
          "name": "/home/ci/project/src/__tests__/parser.test.js",
          "status": "passed",
          "assertionResults": [
            {
              "ancestorTitles": ["parser", "numbers"],
              "fullName": "parser numbers parses integers",
              "title": "parses integers",
              "status": "passed",
              "failureMessages": [],
              "duration": 2,
              "invocations": 1
            },
            {
              "ancestorTitles": ["parser", "strings"],
              "fullName": "parser strings parses escapes",
              "title": "parses escapes",
              "status": "passed",
              "failureMessages": [],
              "duration": 1
            }
          ]
        },
        {
          "name": "/home/ci/project/index.test.js",
          "status": "passed",
          "assertionResults": [
            {
              "ancestorTitles": [],
              "fullName": "exports",
              "title": "exports",
              "status": "passed",
              "failureMessages": []
            }
          ]
        }
      ]
    }
"#};

#[test]
fn replay_jest_json() -> Result<()> {
    let aggregated: JestAggregatedResult = serde_json::from_str(JEST_OUTPUT)?;
    let events = aggregated.into_events().into_iter().map(Ok);
    let (summary, client) = replay(default_config(), events)?;
    let summary = summary.expect("run completed");

    assert_eq!(summary.suites, 2);
    assert_eq!(summary.tests, 2);
    assert_eq!(summary.steps, 3);
    assert_eq!(
        client.render_tree(),
        indoc! {"
            launch: Unit Tests
              SUITE parser
                TEST numbers
                  STEP parses integers: passed
                TEST strings
                  STEP parses escapes: passed
              SUITE Suite exports
                STEP exports: passed
        "}
    );
    Ok(())
}
