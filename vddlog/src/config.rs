//! Configuration types for report generation.
//!
//! Split into what the pipeline needs to interpret inputs (`ReportConfig`)
//! and where those inputs come from (`RunSource`). Rendering choices live in
//! `OutputFormat` and are only consulted by the output writers.

use std::path::{Path, PathBuf};

/// Default token marking a library helper directory.
pub const DEFAULT_LIBRARY_TOKEN: &str = "lib";

/// Size above which a suite file is still processed but flagged as degraded.
pub const DEFAULT_LARGE_FILE_THRESHOLD: u64 = 1 << 31;

/// Decides whether a test is a library helper rather than a reportable test.
///
/// Library tests still contribute their assert, exception and error counts,
/// but never show up in the passed/failed/blocked tallies.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub enum LibraryPolicy {
    /// The test script's parent directory path contains this token
    /// (case-insensitive).
    PathToken(String),
    /// No test is ever treated as a library test.
    Never,
    /// Caller-supplied predicate over the test script path.
    Custom(fn(&Path) -> bool),
}

impl Default for LibraryPolicy {
    fn default() -> Self {
        Self::PathToken(DEFAULT_LIBRARY_TOKEN.to_owned())
    }
}

impl LibraryPolicy {
    /// Apply the policy to a test script path.
    ///
    /// A bare file name carries no directory information, so it is never
    /// considered a library test under `PathToken`.
    #[must_use]
    pub fn is_library(&self, test_file: &Path) -> bool {
        match self {
            Self::PathToken(token) => test_file
                .parent()
                .filter(|parent| !parent.as_os_str().is_empty())
                .is_some_and(|parent| {
                    parent
                        .to_string_lossy()
                        .to_lowercase()
                        .contains(&token.to_lowercase())
                }),
            Self::Never => false,
            Self::Custom(predicate) => predicate(test_file),
        }
    }
}

/// Pipeline configuration.
#[derive(Debug, Clone)]
#[non_exhaustive]
pub struct ReportConfig {
    /// How library helper tests are recognised.
    pub library_policy: LibraryPolicy,
    /// Extension (without the dot) a per-test log must carry (default: `log`).
    pub log_extension: String,
    /// Suite files larger than this are processed with a degraded-capability
    /// warning (default: 2^31 bytes).
    pub large_file_threshold: u64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            library_policy: LibraryPolicy::default(),
            log_extension: "log".to_owned(),
            large_file_threshold: DEFAULT_LARGE_FILE_THRESHOLD,
        }
    }
}

/// Where the suite summary files of a run come from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RunSource {
    /// A single suite summary file.
    SuiteFile(PathBuf),
    /// Every `*.xml` file directly inside this directory.
    SuiteDir(PathBuf),
}

impl RunSource {
    /// Directory reports are written to when the caller does not pick one.
    #[must_use]
    pub fn default_output_dir(&self) -> PathBuf {
        match self {
            Self::SuiteFile(path) => match path.parent() {
                Some(parent) if !parent.as_os_str().is_empty() => parent.to_path_buf(),
                _ => PathBuf::from("."),
            },
            Self::SuiteDir(dir) => dir.clone(),
        }
    }
}

/// Rendering of the written report artifacts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum OutputFormat {
    /// Plain-text tables.
    #[default]
    Human,
    /// Pretty-printed JSON.
    Json,
}

impl OutputFormat {
    /// File extension used for artifacts in this format.
    #[must_use]
    pub fn extension(self) -> &'static str {
        match self {
            Self::Human => "txt",
            Self::Json => "json",
        }
    }
}
