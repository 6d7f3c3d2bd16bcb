//! Run reports kept under the cache dir: `<cache_dir>/reports/<run_name>.json`.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, instrument};

use crate::error::ReportError;
use crate::types::RunReport;

/// Directory under the cache dir holding one report per run name.
pub const REPORTS_SUBDIR: &str = "reports";

/// Where the report for `run_name` lives.
pub fn report_path(cache_dir: &Path, run_name: &str) -> PathBuf {
  cache_dir.join(REPORTS_SUBDIR).join(format!("{run_name}.json"))
}

/// Replaces the file at `path` with `bytes` via a `.tmp` sibling and a rename,
/// so readers never see a half-written file.
pub(crate) fn write_atomic(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
  if let Some(parent) = path.parent() {
    fs::create_dir_all(parent)?;
  }
  let mut tmp = path.as_os_str().to_owned();
  tmp.push(".tmp");
  let tmp = PathBuf::from(tmp);
  fs::write(&tmp, bytes)?;
  if let Err(e) = fs::rename(&tmp, path) {
    let _ = fs::remove_file(&tmp);
    return Err(e);
  }
  Ok(())
}

/// Writes `report` for its run under `cache_dir`, returning the path written.
#[instrument(level = "trace", skip(cache_dir, report), fields(run_name = %report.run_name))]
pub fn write_report(cache_dir: &Path, report: &RunReport) -> Result<PathBuf, ReportError> {
  let path = report_path(cache_dir, &report.run_name);
  let json = serde_json::to_vec_pretty(report).map_err(|source| ReportError::Encode {
    path: path.clone(),
    source,
  })?;
  write_atomic(&path, &json).map_err(|source| ReportError::Io {
    path: path.clone(),
    source,
  })?;
  debug!(path = %path.display(), chunks = report.chunks.len(), "wrote run report");
  Ok(path)
}

/// Reads the last report written for `run_name`. `None` if no run wrote one yet.
#[instrument(level = "trace", skip(cache_dir))]
pub fn read_report(cache_dir: &Path, run_name: &str) -> Result<Option<RunReport>, ReportError> {
  let path = report_path(cache_dir, run_name);
  let bytes = match fs::read(&path) {
    Ok(bytes) => bytes,
    Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
    Err(source) => return Err(ReportError::Io { path, source }),
  };
  serde_json::from_slice(&bytes)
    .map(Some)
    .map_err(|source| ReportError::Decode { path, source })
}
