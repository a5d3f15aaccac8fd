use std::path::PathBuf;
use std::process::ExitCode;

use clap::{ArgAction, ArgGroup, Parser, ValueEnum};
use colored::Colorize;
use vddlog::output::{ReportFiles, write_report_files};
use vddlog::{
    DEFAULT_LIBRARY_TOKEN, LibraryPolicy, OutputFormat, ReportConfig, RunReport, RunSource,
    generate_run_report,
};

use crate::logging;

/// Report artifacts could not be written, or the run failed unexpectedly.
const EXIT_FAILURE: u8 = 1;
/// `--suitefile` names a file that does not exist.
const EXIT_MISSING_SUITE_FILE: u8 = 3;
/// `--suitedir` names a directory that does not exist.
const EXIT_MISSING_SUITE_DIR: u8 = 4;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
enum FormatArg {
    #[default]
    Human,
    Json,
}

impl From<FormatArg> for OutputFormat {
    fn from(value: FormatArg) -> Self {
        match value {
            FormatArg::Human => Self::Human,
            FormatArg::Json => Self::Json,
        }
    }
}

/// Build summary and issue reports from a `VoodooDriver` test run.
#[derive(Debug, Parser)]
#[command(name = "vddlog", version, about, long_about = None)]
#[command(group(ArgGroup::new("input").required(true).args(["suitefile", "suitedir"])))]
struct Cli {
    /// Suite summary XML file to report on
    #[arg(long, value_name = "PATH")]
    suitefile: Option<PathBuf>,

    /// Directory whose *.xml suite summaries make up the run
    #[arg(long, value_name = "DIR")]
    suitedir: Option<PathBuf>,

    /// Where to write the reports (default: the suite file's directory or the suite directory)
    #[arg(long, value_name = "DIR")]
    output_dir: Option<PathBuf>,

    /// Report format
    #[arg(long, value_enum, default_value_t = FormatArg::Human)]
    format: FormatArg,

    /// Directory token marking library helper scripts; empty disables library detection
    #[arg(long, value_name = "TOKEN", default_value = DEFAULT_LIBRARY_TOKEN)]
    library_token: String,

    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = ArgAction::Count)]
    verbose: u8,
}

impl Cli {
    fn source(&self) -> Option<RunSource> {
        match (&self.suitefile, &self.suitedir) {
            (Some(file), _) => Some(RunSource::SuiteFile(file.clone())),
            (None, Some(dir)) => Some(RunSource::SuiteDir(dir.clone())),
            (None, None) => None,
        }
    }

    fn report_config(&self) -> ReportConfig {
        let mut config = ReportConfig::default();
        config.library_policy = if self.library_token.is_empty() {
            LibraryPolicy::Never
        } else {
            LibraryPolicy::PathToken(self.library_token.clone())
        };
        config
    }
}

/// Check the named input exists; returns the exit code to stop with if not.
fn check_input(source: &RunSource) -> Option<u8> {
    match source {
        RunSource::SuiteFile(path) if !path.is_file() => {
            eprintln!("Error: suite file does not exist: {}", path.display());
            Some(EXIT_MISSING_SUITE_FILE)
        }
        RunSource::SuiteDir(dir) if !dir.is_dir() => {
            eprintln!("Error: suite directory does not exist: {}", dir.display());
            Some(EXIT_MISSING_SUITE_DIR)
        }
        RunSource::SuiteFile(_) | RunSource::SuiteDir(_) => None,
    }
}

fn print_console_summary(report: &RunReport, files: &ReportFiles) {
    let counts = &report.totals.counts;
    println!(
        "{} suite(s): {} passed, {} failed, {} blocked",
        report.suites.len(),
        counts.passed.to_string().green(),
        counts.failed.to_string().red(),
        counts.blocked.to_string().yellow(),
    );
    println!(
        "  asserts: {} passed, {} failed; {} exception(s), {} error(s), {} watchdog",
        counts.passed_asserts,
        counts.failed_asserts,
        counts.exceptions,
        counts.errors,
        counts.watchdog
    );
    if report.any_truncated() {
        println!("  {}", "some suites are truncated; totals may be incomplete".yellow());
    }
    if !report.diagnostics.is_empty() {
        println!(
            "  {}",
            format!("{} diagnostic(s); see the summary report", report.diagnostics.len()).yellow()
        );
    }
    for path in &files.written {
        println!("  wrote {}", path.display());
    }
}

pub fn run() -> ExitCode {
    let cli = Cli::parse();
    logging::init(cli.verbose);

    // The required "input" group guarantees one of the two is set.
    let Some(source) = cli.source() else {
        return ExitCode::from(EXIT_FAILURE);
    };
    if let Some(code) = check_input(&source) {
        return ExitCode::from(code);
    }

    let report = match generate_run_report(&source, &cli.report_config()) {
        Ok(report) => report,
        Err(e) => {
            eprintln!("Error: {e}");
            return ExitCode::from(EXIT_FAILURE);
        }
    };

    let output_dir = cli
        .output_dir
        .clone()
        .unwrap_or_else(|| source.default_output_dir());
    let files = write_report_files(&report, &output_dir, cli.format.into());

    print_console_summary(&report, &files);

    if files.ok() {
        ExitCode::SUCCESS
    } else {
        for failure in &files.failures {
            eprintln!("Error: {failure}");
        }
        ExitCode::from(EXIT_FAILURE)
    }
}
