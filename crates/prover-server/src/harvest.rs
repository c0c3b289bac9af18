// Copyright (C) 2025 SyncMyOrders Sp. z o.o.
// SPDX-License-Identifier: AGPL-3.0-or-later
//! Prover output harvesting.
//!
//! The prover communicates through files in the workspace. It always writes
//! `result.yaml` (even when it fails internally) and may write any number of
//! additional artifacts. After a run, timed out or not, the workspace is
//! scanned and everything is folded into a [`JobResult`].

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::BTreeMap;
use std::path::Path;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::runner::ExecutionOutcome;

/// Formula input written before the run.
pub const FORMULA_FILE: &str = "formula.txt";

/// Options input written before the run.
pub const OPTIONS_FILE: &str = "options.json";

/// Summary the prover must always write.
pub const SUMMARY_FILE: &str = "result.yaml";

/// Files that are never harvested as output artifacts.
pub const RESERVED_FILES: [&str; 3] = [FORMULA_FILE, OPTIONS_FILE, SUMMARY_FILE];

/// Summary key carrying the captured process output.
pub const STDOUT_KEY: &str = "stdout";

/// Summary key flagging a run that hit its deadline.
pub const TIMED_OUT_KEY: &str = "timed_out";

/// How output files are keyed in the response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileGrouping {
    /// `filename -> content`
    Flat,
    /// `extension -> base name -> content`
    ByExtension,
}

impl FromStr for FileGrouping {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "flat" => Ok(FileGrouping::Flat),
            "extension" | "by_extension" | "grouped" => Ok(FileGrouping::ByExtension),
            other => Err(format!("unknown file grouping: {}", other)),
        }
    }
}

/// Whether `stdout` and `timed_out` are added to the summary unconditionally.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SummaryPolicy {
    /// Add `stdout` only when non-empty and `timed_out` only when true.
    Lenient,
    /// Always add both keys.
    Strict,
}

impl FromStr for SummaryPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "lenient" => Ok(SummaryPolicy::Lenient),
            "strict" => Ok(SummaryPolicy::Strict),
            other => Err(format!("unknown summary policy: {}", other)),
        }
    }
}

/// Harvested output artifacts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum HarvestedFiles {
    /// Keyed by file name.
    Flat(BTreeMap<String, String>),
    /// Keyed by extension, then base name.
    Grouped(BTreeMap<String, BTreeMap<String, String>>),
}

impl HarvestedFiles {
    /// Empty collection in the given layout.
    pub fn new(grouping: FileGrouping) -> Self {
        match grouping {
            FileGrouping::Flat => HarvestedFiles::Flat(BTreeMap::new()),
            FileGrouping::ByExtension => HarvestedFiles::Grouped(BTreeMap::new()),
        }
    }

    /// File an artifact.
    ///
    /// Grouped layout splits on the first `.`: `proof.log` lands under
    /// `log` / `proof`, `a.tar.gz` under `tar.gz` / `a`, and a name without
    /// a dot under the empty group.
    pub fn insert(&mut self, file_name: &str, content: String) {
        match self {
            HarvestedFiles::Flat(files) => {
                files.insert(file_name.to_string(), content);
            }
            HarvestedFiles::Grouped(groups) => {
                let (base, ext) = file_name.split_once('.').unwrap_or((file_name, ""));
                groups
                    .entry(ext.to_string())
                    .or_default()
                    .insert(base.to_string(), content);
            }
        }
    }

    /// Number of harvested files.
    pub fn len(&self) -> usize {
        match self {
            HarvestedFiles::Flat(files) => files.len(),
            HarvestedFiles::Grouped(groups) => groups.values().map(BTreeMap::len).sum(),
        }
    }

    /// Whether nothing was harvested.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Look up an artifact by file name in either layout.
    pub fn get(&self, file_name: &str) -> Option<&str> {
        match self {
            HarvestedFiles::Flat(files) => files.get(file_name).map(String::as_str),
            HarvestedFiles::Grouped(groups) => {
                let (base, ext) = file_name.split_once('.').unwrap_or((file_name, ""));
                groups.get(ext)?.get(base).map(String::as_str)
            }
        }
    }
}

/// Result returned to the caller.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobResult {
    /// Parsed `result.yaml` plus process metadata
    pub summary: Map<String, Value>,
    /// Additional output artifacts
    pub files: HarvestedFiles,
}

/// Read and parse the summary artifact.
///
/// An empty document yields an empty map. A missing file, invalid YAML, or
/// a document that is not a mapping is an error.
pub async fn read_summary(dir: &Path) -> Result<Map<String, Value>> {
    let path = dir.join(SUMMARY_FILE);
    let content = tokio::fs::read_to_string(&path)
        .await
        .map_err(|e| Error::Summary(format!("Failed to read {}: {}", path.display(), e)))?;

    let doc: serde_yaml::Value = serde_yaml::from_str(&content)
        .map_err(|e| Error::Summary(format!("Failed to parse {}: {}", SUMMARY_FILE, e)))?;

    match doc {
        serde_yaml::Value::Null => Ok(Map::new()),
        serde_yaml::Value::Mapping(_) => match serde_json::to_value(&doc) {
            Ok(Value::Object(map)) => Ok(map),
            Ok(_) => Err(Error::Summary(format!("{} is not a mapping", SUMMARY_FILE))),
            Err(e) => Err(Error::Summary(format!(
                "Failed to convert {}: {}",
                SUMMARY_FILE, e
            ))),
        },
        _ => Err(Error::Summary(format!("{} is not a mapping", SUMMARY_FILE))),
    }
}

/// Add process metadata to the summary according to `policy`.
pub fn augment_summary(
    summary: &mut Map<String, Value>,
    outcome: &ExecutionOutcome,
    policy: SummaryPolicy,
) {
    match policy {
        SummaryPolicy::Lenient => {
            if !outcome.captured_output.is_empty() {
                summary.insert(
                    STDOUT_KEY.to_string(),
                    Value::String(outcome.captured_output.clone()),
                );
            }
            if outcome.timed_out {
                summary.insert(TIMED_OUT_KEY.to_string(), Value::Bool(true));
            }
        }
        SummaryPolicy::Strict => {
            summary.insert(
                STDOUT_KEY.to_string(),
                Value::String(outcome.captured_output.clone()),
            );
            summary.insert(TIMED_OUT_KEY.to_string(), Value::Bool(outcome.timed_out));
        }
    }
}

/// Collect the job result from a workspace after the prover has run.
///
/// Only the summary and the directory listing are fatal. Individual output
/// files that cannot be read are logged and skipped, as are empty files and
/// sub-directories.
pub async fn collect(
    dir: &Path,
    outcome: &ExecutionOutcome,
    grouping: FileGrouping,
    policy: SummaryPolicy,
) -> Result<JobResult> {
    let mut summary = read_summary(dir).await?;
    augment_summary(&mut summary, outcome, policy);

    let mut files = HarvestedFiles::new(grouping);
    let mut entries = tokio::fs::read_dir(dir)
        .await
        .map_err(|e| Error::Workspace(format!("Failed to list {}: {}", dir.display(), e)))?;

    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| Error::Workspace(format!("Failed to list {}: {}", dir.display(), e)))?
    {
        let file_name = entry.file_name().to_string_lossy().into_owned();
        if RESERVED_FILES.contains(&file_name.as_str()) {
            continue;
        }

        if let Ok(file_type) = entry.file_type().await
            && file_type.is_dir()
        {
            debug!(file = %file_name, "Skipping directory in workspace");
            continue;
        }

        let bytes = match tokio::fs::read(entry.path()).await {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(file = %file_name, error = %e, "Failed to read output file, skipping");
                continue;
            }
        };

        if bytes.is_empty() {
            continue;
        }

        files.insert(&file_name, String::from_utf8_lossy(&bytes).into_owned());
    }

    debug!(
        files = files.len(),
        timed_out = outcome.timed_out,
        "Harvested workspace"
    );

    Ok(JobResult { summary, files })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn completed(output: &str) -> ExecutionOutcome {
        ExecutionOutcome::completed(Some(0), output.to_string(), 5)
    }

    #[test]
    fn test_grouped_insert_splits_on_first_dot() {
        let mut files = HarvestedFiles::new(FileGrouping::ByExtension);
        files.insert("proof.log", "ok".to_string());
        files.insert("model.tar.gz", "bytes".to_string());
        files.insert("README", "text".to_string());

        let json = serde_json::to_value(&files).unwrap();
        assert_eq!(
            json,
            json!({
                "log": {"proof": "ok"},
                "tar.gz": {"model": "bytes"},
                "": {"README": "text"}
            })
        );
        assert_eq!(files.get("model.tar.gz"), Some("bytes"));
        assert_eq!(files.len(), 3);
    }

    #[test]
    fn test_flat_insert_keeps_file_name() {
        let mut files = HarvestedFiles::new(FileGrouping::Flat);
        files.insert("proof.log", "ok".to_string());
        assert_eq!(
            serde_json::to_value(&files).unwrap(),
            json!({"proof.log": "ok"})
        );
    }

    #[test]
    fn test_lenient_augmentation_skips_trivial_fields() {
        let mut summary = Map::new();
        augment_summary(&mut summary, &completed(""), SummaryPolicy::Lenient);
        assert!(summary.is_empty());

        let timed_out = ExecutionOutcome::timed_out("partial".to_string(), 2000);
        augment_summary(&mut summary, &timed_out, SummaryPolicy::Lenient);
        assert_eq!(summary[STDOUT_KEY], json!("partial"));
        assert_eq!(summary[TIMED_OUT_KEY], json!(true));
    }

    #[test]
    fn test_strict_augmentation_always_adds_fields() {
        let mut summary = Map::new();
        augment_summary(&mut summary, &completed(""), SummaryPolicy::Strict);
        assert_eq!(summary[STDOUT_KEY], json!(""));
        assert_eq!(summary[TIMED_OUT_KEY], json!(false));
    }

    #[test]
    fn test_parse_policies() {
        assert_eq!("flat".parse::<FileGrouping>(), Ok(FileGrouping::Flat));
        assert_eq!(
            "Extension".parse::<FileGrouping>(),
            Ok(FileGrouping::ByExtension)
        );
        assert!("tree".parse::<FileGrouping>().is_err());
        assert_eq!("strict".parse::<SummaryPolicy>(), Ok(SummaryPolicy::Strict));
        assert!("sometimes".parse::<SummaryPolicy>().is_err());
    }

    #[tokio::test]
    async fn test_read_summary_parses_yaml() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(
            temp_dir.path().join(SUMMARY_FILE),
            "valid: true\nsteps: 3\nrules:\n  - mp\n  - ax1\n",
        )
        .unwrap();

        let summary = read_summary(temp_dir.path()).await.unwrap();
        assert_eq!(
            Value::Object(summary),
            json!({"valid": true, "steps": 3, "rules": ["mp", "ax1"]})
        );
    }

    #[tokio::test]
    async fn test_read_summary_empty_document() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(SUMMARY_FILE), "").unwrap();

        let summary = read_summary(temp_dir.path()).await.unwrap();
        assert!(summary.is_empty());
    }

    #[tokio::test]
    async fn test_read_summary_missing() {
        let temp_dir = TempDir::new().unwrap();
        let err = read_summary(temp_dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Summary(_)));
    }

    #[tokio::test]
    async fn test_read_summary_malformed() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(SUMMARY_FILE), "valid: [unclosed").unwrap();
        let err = read_summary(temp_dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Summary(_)));
    }

    #[tokio::test]
    async fn test_read_summary_rejects_scalar_document() {
        let temp_dir = TempDir::new().unwrap();
        std::fs::write(temp_dir.path().join(SUMMARY_FILE), "just a string").unwrap();
        let err = read_summary(temp_dir.path()).await.unwrap_err();
        assert!(matches!(err, Error::Summary(_)));
    }

    #[tokio::test]
    async fn test_collect_skips_inputs_empty_files_and_directories() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join(FORMULA_FILE), "P -> P").unwrap();
        std::fs::write(dir.join(OPTIONS_FILE), "{}").unwrap();
        std::fs::write(dir.join(SUMMARY_FILE), "valid: true").unwrap();
        std::fs::write(dir.join("proof.log"), "ok").unwrap();
        std::fs::write(dir.join("empty.txt"), "").unwrap();
        std::fs::create_dir(dir.join("scratch")).unwrap();

        let result = collect(
            dir,
            &completed("done"),
            FileGrouping::ByExtension,
            SummaryPolicy::Lenient,
        )
        .await
        .unwrap();

        assert_eq!(result.summary["valid"], json!(true));
        assert_eq!(result.summary[STDOUT_KEY], json!("done"));
        assert!(!result.summary.contains_key(TIMED_OUT_KEY));
        assert_eq!(
            serde_json::to_value(&result.files).unwrap(),
            json!({"log": {"proof": "ok"}})
        );
    }

    #[tokio::test]
    async fn test_collect_decodes_non_utf8_lossily() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join(SUMMARY_FILE), "valid: false").unwrap();
        std::fs::write(dir.join("raw.bin"), [b'o', b'k', 0xff]).unwrap();

        let result = collect(
            dir,
            &completed(""),
            FileGrouping::Flat,
            SummaryPolicy::Lenient,
        )
        .await
        .unwrap();

        assert_eq!(result.files.get("raw.bin"), Some("ok\u{fffd}"));
    }

    #[cfg(unix)]
    #[tokio::test]
    async fn test_collect_skips_unreadable_file() {
        let temp_dir = TempDir::new().unwrap();
        let dir = temp_dir.path();
        std::fs::write(dir.join(SUMMARY_FILE), "valid: true").unwrap();
        std::fs::write(dir.join("proof.log"), "ok").unwrap();
        std::os::unix::fs::symlink("/nonexistent/prover-output", dir.join("dangling.log"))
            .unwrap();

        let result = collect(
            dir,
            &completed(""),
            FileGrouping::ByExtension,
            SummaryPolicy::Lenient,
        )
        .await
        .unwrap();

        assert_eq!(result.summary["valid"], json!(true));
        assert_eq!(
            serde_json::to_value(&result.files).unwrap(),
            json!({"log": {"proof": "ok"}})
        );
    }
}
