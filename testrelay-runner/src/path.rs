// Copyright (c) The testrelay Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Canonical names and code references for test results.
//!
//! A *code reference* locates an entity in source: the test file's directory
//! relative to the working directory, the file name and a title, joined with
//! `/`. Code references must be stable for a given input within a run and
//! identical across platforms.
//!
//! Suites and tests are deduplicated on a [`PathKey`] instead, which keeps the
//! titles apart: a title may itself contain `/`.

use crate::{
    events::TestCaseResult,
    helpers::{convert_to_forward_slash, normalize_lexically},
};
use camino::{Utf8Path, Utf8PathBuf};
use itertools::Itertools;
use std::fmt;

/// Derives code references relative to a root directory, usually the working directory.
#[derive(Clone, Debug)]
pub struct PathResolver {
    root: Utf8PathBuf,
}

impl PathResolver {
    /// Creates a new `PathResolver` rooted at `root`.
    pub fn new(root: impl AsRef<str>) -> Self {
        Self {
            root: normalize_lexically(&convert_to_forward_slash(root.as_ref())),
        }
    }

    /// Returns the root directory, with forward slashes.
    pub fn root(&self) -> &Utf8Path {
        &self.root
    }

    /// Returns `<relative-dir>/<file-name>/<title>` for a test file.
    ///
    /// If the file is directly inside the root, the directory segment and its
    /// separator are omitted.
    pub fn code_ref(&self, file_path: &str, title: &str) -> String {
        format!("{}/{title}", self.file_ref(file_path))
    }

    /// Returns `<relative-dir>/<file-name>`, or just the file name for a file
    /// directly inside the root.
    pub fn file_ref(&self, file_path: &str) -> String {
        let file = normalize_lexically(&convert_to_forward_slash(file_path));
        let relative =
            pathdiff::diff_utf8_paths(&file, &self.root).unwrap_or_else(|| file.clone());
        let file_name = file.file_name().unwrap_or(file.as_str());

        match relative.parent().map(|dir| dir.as_str().replace('\\', "/")) {
            Some(dir) if !dir.is_empty() => format!("{dir}/{file_name}"),
            _ => file_name.to_owned(),
        }
    }

    /// Resolves the chain of entities that a single result belongs to.
    ///
    /// `fallback_suite` names the suite for results without any describe
    /// block.
    pub fn resolve(
        &self,
        file_path: &str,
        result: &TestCaseResult,
        fallback_suite: &str,
    ) -> ResolvedPath {
        let file_ref = self.file_ref(file_path);
        let titles = &result.ancestor_titles;
        let (suite, nested) = match titles.split_first() {
            Some((top, rest)) => {
                let nested = (0..rest.len())
                    .map(|index| {
                        let chain = &titles[..index + 2];
                        PathLevel {
                            name: rest[index].clone(),
                            code_ref: format!("{file_ref}/{}", chain.iter().join("/")),
                            key: PathKey::new(&file_ref, chain.to_vec()),
                        }
                    })
                    .collect();
                (
                    PathLevel {
                        name: top.clone(),
                        code_ref: format!("{file_ref}/{top}"),
                        key: PathKey::new(&file_ref, vec![top.clone()]),
                    },
                    nested,
                )
            }
            // There is one suite per file for results without describe blocks.
            None => (
                PathLevel {
                    name: fallback_suite.to_owned(),
                    code_ref: format!("{file_ref}/{fallback_suite}"),
                    key: PathKey::new(&file_ref, Vec::new()),
                },
                Vec::new(),
            ),
        };

        ResolvedPath {
            suite,
            nested,
            step_code_ref: format!("{file_ref}/{}", full_test_name(result)),
        }
    }
}

/// One named level of the report hierarchy.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct PathLevel {
    /// The display name: a single describe-block title.
    pub name: String,

    /// The code reference sent to the backend.
    pub code_ref: String,

    /// The key the item is registered under.
    pub key: PathKey,
}

/// Identifies a suite or test within a run: a file and the chain of titles
/// leading to it.
///
/// Unlike a code reference, titles are kept as separate segments, so
/// `["GET /users"]` and `["GET ", "users"]` are different keys.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub struct PathKey {
    file: String,
    titles: Vec<String>,
}

impl PathKey {
    /// Creates a new key for `titles` within the file at `file_ref`.
    ///
    /// An empty title chain stands for the suite holding results without
    /// describe blocks.
    pub fn new(file_ref: impl Into<String>, titles: Vec<String>) -> Self {
        Self {
            file: file_ref.into(),
            titles,
        }
    }

    /// Returns the file this key belongs to.
    pub fn file(&self) -> &str {
        &self.file
    }

    /// Returns the chain of titles, outermost first.
    pub fn titles(&self) -> &[String] {
        &self.titles
    }
}

impl fmt::Display for PathKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.file)?;
        for title in &self.titles {
            write!(f, " > {title}")?;
        }
        Ok(())
    }
}

/// The entities a result belongs to, outermost first.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ResolvedPath {
    /// The top-level suite.
    pub suite: PathLevel,

    /// Nested describe blocks below the suite, reported as tests.
    pub nested: Vec<PathLevel>,

    /// The code reference for the steps of this result.
    pub step_code_ref: String,
}

/// Joins the ancestor titles and the title of a result with `/`.
///
/// Results without ancestors get a `Suite/` prefix, so that their name never
/// collides with the code reference of a suite.
pub fn full_test_name(result: &TestCaseResult) -> String {
    if result.ancestor_titles.is_empty() {
        format!("Suite/{}", result.title)
    } else {
        full_step_name(result)
    }
}

/// Joins the ancestor titles and the title of a result with `/`.
pub fn full_step_name(result: &TestCaseResult) -> String {
    result
        .ancestor_titles
        .iter()
        .map(String::as_str)
        .chain(std::iter::once(result.title.as_str()))
        .join("/")
}

/// Returns the name of the suite that holds results without describe blocks.
pub fn fallback_suite_name(title: &str) -> String {
    format!("Suite {title}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::TestCaseStatus;
    use pretty_assertions::assert_eq;
    use test_case::test_case;
    use test_strategy::proptest;

    fn result(ancestors: &[&str], title: &str) -> TestCaseResult {
        let mut result = TestCaseResult::new(title, TestCaseStatus::Passed);
        result.ancestor_titles = ancestors.iter().map(|s| (*s).to_owned()).collect();
        result
    }

    #[test_case("/project", "/project/test/example.js", "test/example.js/my test" ; "subdirectory")]
    #[test_case("/project", "/project/example.js", "example.js/my test" ; "no subdirectory")]
    #[test_case("/project", "/project/a/b/c.test.js", "a/b/c.test.js/my test" ; "nested")]
    #[test_case(r"C:\testProject", r"C:\testProject\test\example.js", "test/example.js/my test" ; "windows separators")]
    #[test_case(r"C:\testProject", r"C:\testProject\example.js", "example.js/my test" ; "windows no subdirectory")]
    #[test_case("/project/", "/project/./test/../example.js", "example.js/my test" ; "unnormalized")]
    #[test_case("/project", "/elsewhere/x.js", "../elsewhere/x.js/my test" ; "outside root")]
    fn code_ref(root: &str, file: &str, expected: &str) {
        let resolver = PathResolver::new(root);
        assert_eq!(resolver.code_ref(file, "my test"), expected);
    }

    #[test]
    fn full_names() {
        assert_eq!(full_test_name(&result(&[], "t")), "Suite/t");
        assert_eq!(full_test_name(&result(&["a", "b"], "t")), "a/b/t");
        assert_eq!(full_step_name(&result(&["a", "b"], "t")), "a/b/t");
        assert_eq!(full_step_name(&result(&[], "t")), "t");
        assert_eq!(
            full_step_name(&result(&["rootDescribe", "parentDescribe"], "stepTitle")),
            "rootDescribe/parentDescribe/stepTitle"
        );
    }

    #[test]
    fn resolve_nested() {
        let resolver = PathResolver::new("/project");
        let resolved = resolver.resolve(
            "/project/test/math.test.js",
            &result(&["math", "add", "integers"], "adds"),
            "unused",
        );
        assert_eq!(
            resolved,
            ResolvedPath {
                suite: PathLevel {
                    name: "math".to_owned(),
                    code_ref: "test/math.test.js/math".to_owned(),
                    key: PathKey::new("test/math.test.js", vec!["math".to_owned()]),
                },
                nested: vec![
                    PathLevel {
                        name: "add".to_owned(),
                        code_ref: "test/math.test.js/math/add".to_owned(),
                        key: PathKey::new(
                            "test/math.test.js",
                            vec!["math".to_owned(), "add".to_owned()],
                        ),
                    },
                    PathLevel {
                        name: "integers".to_owned(),
                        code_ref: "test/math.test.js/math/add/integers".to_owned(),
                        key: PathKey::new(
                            "test/math.test.js",
                            vec!["math".to_owned(), "add".to_owned(), "integers".to_owned()],
                        ),
                    },
                ],
                step_code_ref: "test/math.test.js/math/add/integers/adds".to_owned(),
            }
        );
    }

    #[test]
    fn titles_with_slashes_get_distinct_keys() {
        let resolver = PathResolver::new("/project");
        let flat = resolver.resolve("/project/api.test.js", &result(&["GET /users"], "t1"), "");
        let nested = resolver.resolve(
            "/project/api.test.js",
            &result(&["GET ", "users"], "t2"),
            "",
        );

        // The code references are the same, the keys are not.
        assert_eq!(flat.suite.code_ref, nested.nested[0].code_ref);
        assert_ne!(flat.suite.key, nested.nested[0].key);
        assert_ne!(flat.suite.key, nested.suite.key);
        assert_eq!(nested.nested[0].key.to_string(), "api.test.js > GET  > users");
    }

    #[test]
    fn resolve_without_describe() {
        let resolver = PathResolver::new("/project");
        let resolved = resolver.resolve(
            "/project/sum.test.js",
            &result(&[], "adds"),
            &fallback_suite_name("adds"),
        );
        assert_eq!(resolved.suite.name, "Suite adds");
        assert_eq!(resolved.suite.code_ref, "sum.test.js/Suite adds");
        assert_eq!(resolved.suite.key, PathKey::new("sum.test.js", Vec::new()));
        assert!(resolved.nested.is_empty());
        assert_eq!(resolved.step_code_ref, "sum.test.js/Suite/adds");
    }

    #[proptest(cases = 64)]
    fn code_ref_is_canonical(
        #[strategy(proptest::collection::vec("[a-z0-9_]{1,6}", 0..4))] dirs: Vec<String>,
        #[strategy("[a-z]{1,8}\\.test\\.js")] file_name: String,
        #[strategy("[A-Za-z ]{1,12}")] title: String,
    ) {
        let unix = PathResolver::new("/root/project");
        let windows = PathResolver::new(r"D:\root\project");

        let mut segments = dirs.clone();
        segments.push(file_name.clone());
        let unix_file = format!("/root/project/{}", segments.join("/"));
        let windows_file = format!(r"D:\root\project\{}", segments.join(r"\"));

        let code_ref = unix.code_ref(&unix_file, &title);
        // Stable within a run, and identical across separator conventions.
        proptest::prop_assert_eq!(&code_ref, &unix.code_ref(&unix_file, &title));
        proptest::prop_assert_eq!(&code_ref, &windows.code_ref(&windows_file, &title));
        proptest::prop_assert!(!code_ref.contains('\\'));
        proptest::prop_assert!(!code_ref.starts_with('/'));
        proptest::prop_assert_eq!(code_ref, format!("{}/{}", segments.join("/"), title));
    }
}
