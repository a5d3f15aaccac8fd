//! Filesystem input discovery for a run.
//!
//! Lists the suite summary files of a suite directory and reads summary files
//! for the parser. Neither operation fails as a whole: problems are returned
//! as diagnostics next to whatever could be collected.

use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::error::{Diagnostic, DiagnosticKind, emit};

/// Whether a directory entry name marks a suite summary file.
///
/// Matches on the name ending in `xml` (any case), as the driver's own
/// directory scan did, so `Login.XML` and `report.xml` are both picked up.
fn is_suite_file_name(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().to_ascii_lowercase().ends_with("xml"))
}

/// Find the suite summary files directly inside `dir`, sorted by file name.
///
/// Returns `(files, diagnostics)`; walk errors (permission denied and the
/// like) are reported as `WalkError` diagnostics and never silently dropped.
#[must_use]
pub fn find_suite_files(dir: &Path) -> (Vec<PathBuf>, Vec<Diagnostic>) {
    let mut files = Vec::new();
    let mut diagnostics = Vec::new();

    for entry_result in WalkDir::new(dir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
    {
        let entry = match entry_result {
            Ok(e) => e,
            Err(walk_err) => {
                let path = walk_err
                    .path()
                    .map_or_else(|| dir.to_path_buf(), Path::to_path_buf);
                emit(
                    &mut diagnostics,
                    Diagnostic::new(
                        path,
                        DiagnosticKind::WalkError,
                        format!("Directory traversal error: {walk_err}"),
                    ),
                );
                continue;
            }
        };

        let path = entry.path();
        // Symlinks to regular files are fine; directories, pipes and sockets are not.
        if !path.is_file() || !is_suite_file_name(path) {
            continue;
        }
        files.push(path.to_path_buf());
    }

    (files, diagnostics)
}

/// Read a suite summary file into memory.
///
/// Files above `large_file_threshold` are still read but flagged `Degraded`.
/// Invalid UTF-8 is replaced rather than rejected, since the driver wrote
/// test output verbatim into the summary. Returns `None` if the file is
/// missing or cannot be read.
pub fn read_summary_file(
    path: &Path,
    large_file_threshold: u64,
    diagnostics: &mut Vec<Diagnostic>,
) -> Option<String> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            emit(
                diagnostics,
                Diagnostic::new(
                    path,
                    DiagnosticKind::MissingInput,
                    "Suite summary file does not exist",
                ),
            );
            return None;
        }
        Err(e) => {
            emit(
                diagnostics,
                Diagnostic::new(path, DiagnosticKind::IoError, format!("Failed to open file: {e}")),
            );
            return None;
        }
    };

    if let Ok(metadata) = file.metadata()
        && metadata.len() > large_file_threshold
    {
        emit(
            diagnostics,
            Diagnostic::new(
                path,
                DiagnosticKind::Degraded,
                format!(
                    "File is {} bytes, above the {large_file_threshold} byte threshold; \
                     processing it in memory anyway",
                    metadata.len()
                ),
            ),
        );
    }

    let mut buffer = Vec::new();
    if let Err(e) = (&file).read_to_end(&mut buffer) {
        emit(
            diagnostics,
            Diagnostic::new(path, DiagnosticKind::IoError, format!("Failed to read file: {e}")),
        );
        return None;
    }

    Some(String::from_utf8_lossy(&buffer).into_owned())
}
