//! Result store and results file
//!
//! **Purpose:** Hold every completed trial of the run (plus resumed ones),
//! rank them, and persist them.
//!
//! **File formats:** the results file is either a bare JSON list of records
//! (checkpoints, older files) or a structured document
//! `{all_results, top_performers, most_efficient}` written at the end of a
//! run. Both are accepted on load. An existing file is copied to a
//! timestamped `.bak` before a run starts.

use crate::error::Result;
use axetune_common::{Candidate, RankedRecord, TrialRecord};
use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info, warn};

/// Size of the precomputed rankings in the structured document
pub const TOP_K: usize = 8;

/// Ranking order for [`ResultStore::top_k`]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Ranking {
    /// Highest average hashrate first
    Hashrate,
    /// Lowest J/TH first
    Efficiency,
}

/// Structured results document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultsDocument {
    pub all_results: Vec<TrialRecord>,

    #[serde(default)]
    pub top_performers: Vec<RankedRecord>,

    #[serde(default)]
    pub most_efficient: Vec<RankedRecord>,
}

/// Any results file this tool has written
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum ResultsFile {
    Structured(ResultsDocument),
    Legacy(Vec<TrialRecord>),
}

impl ResultsFile {
    /// Normalize to the flat record list
    pub fn into_records(self) -> Vec<TrialRecord> {
        match self {
            ResultsFile::Structured(doc) => doc.all_results,
            ResultsFile::Legacy(records) => records,
        }
    }
}

/// Ordered, duplicate-free list of trial records
#[derive(Debug, Clone, Default)]
pub struct ResultStore {
    results: Vec<TrialRecord>,
    tested: HashSet<Candidate>,
}

impl ResultStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a record; a record for an already tested candidate is rejected
    pub fn add(&mut self, record: TrialRecord) -> bool {
        if !self.tested.insert(record.candidate) {
            warn!(candidate = %record.candidate, "Ignoring duplicate result");
            return false;
        }
        self.results.push(record);
        true
    }

    pub fn contains(&self, candidate: Candidate) -> bool {
        self.tested.contains(&candidate)
    }

    pub fn tested(&self) -> &HashSet<Candidate> {
        &self.tested
    }

    pub fn results(&self) -> &[TrialRecord] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Highest average hashrate; the earliest record wins a tie
    pub fn best(&self) -> Option<&TrialRecord> {
        self.results.iter().fold(None, |best: Option<&TrialRecord>, r| match best {
            Some(b) if b.average_hash_rate >= r.average_hash_rate => Some(b),
            _ => Some(r),
        })
    }

    /// First `k` records in `by` order with 1-based ranks (stable on ties)
    pub fn top_k(&self, k: usize, by: Ranking) -> Vec<RankedRecord> {
        let mut sorted: Vec<&TrialRecord> = self.results.iter().collect();
        match by {
            Ranking::Hashrate => {
                sorted.sort_by(|a, b| b.average_hash_rate.total_cmp(&a.average_hash_rate))
            }
            Ranking::Efficiency => sorted.sort_by(|a, b| a.efficiency_jth.total_cmp(&b.efficiency_jth)),
        }

        sorted
            .into_iter()
            .take(k)
            .enumerate()
            .map(|(i, record)| RankedRecord {
                rank: i + 1,
                record: record.clone(),
            })
            .collect()
    }

    /// Structured snapshot with the precomputed top-8 rankings
    pub fn document(&self) -> ResultsDocument {
        ResultsDocument {
            all_results: self.results.clone(),
            top_performers: self.top_k(TOP_K, Ranking::Hashrate),
            most_efficient: self.top_k(TOP_K, Ranking::Efficiency),
        }
    }

    /// Write the structured document
    pub fn persist(&self, path: &Path) -> Result<()> {
        write_json(path, &ResultsFile::Structured(self.document()))?;
        info!("Results saved to {}", path.display());
        Ok(())
    }

    /// Write the bare record list (interim save after each trial)
    pub fn checkpoint(&self, path: &Path) -> Result<()> {
        write_json(path, &self.results)?;
        debug!(records = self.results.len(), "Checkpoint written to {}", path.display());
        Ok(())
    }

    /// Merge records from a previous run's results file
    ///
    /// Returns the number of records added. A missing file adds nothing;
    /// records for candidates already present are skipped.
    pub fn load_for_resume(&mut self, path: &Path) -> Result<usize> {
        if !path.exists() {
            debug!("No results file at {}, nothing to resume", path.display());
            return Ok(0);
        }

        let content = std::fs::read_to_string(path)?;
        let file: ResultsFile = serde_json::from_str(&content)?;

        let added = file
            .into_records()
            .into_iter()
            .filter(|record| self.add(record.clone()))
            .count();

        info!(
            "Resuming benchmark. Loaded {} tested combinations.",
            self.tested.len()
        );
        Ok(added)
    }
}

/// `<file>.<YYYYmmdd_HHMMSS>.bak` next to `path`
pub fn backup_path(path: &Path, at: &DateTime<Local>) -> PathBuf {
    let file_name = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    path.with_file_name(format!("{}.{}.bak", file_name, at.format("%Y%m%d_%H%M%S")))
}

/// Copy an existing results file to a timestamped backup
///
/// Returns the backup path, or `None` when there was nothing to back up.
pub fn backup_results_file(path: &Path) -> Result<Option<PathBuf>> {
    backup_results_file_at(path, &Local::now())
}

pub fn backup_results_file_at(path: &Path, at: &DateTime<Local>) -> Result<Option<PathBuf>> {
    if !path.exists() {
        return Ok(None);
    }
    let backup = backup_path(path, at);
    std::fs::copy(path, &backup)?;
    info!("Backup created: {}", backup.display());
    Ok(Some(backup))
}

fn write_json<T: Serialize>(path: &Path, value: &T) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(value)?;
    std::fs::write(path, json)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(v: u32, f: u32, hash: f64, eff: f64) -> TrialRecord {
        TrialRecord {
            candidate: Candidate::new(v, f),
            average_hash_rate: hash,
            average_temperature: 60.0,
            efficiency_jth: eff,
            average_vr_temp: None,
        }
    }

    fn sample_store() -> ResultStore {
        let mut store = ResultStore::new();
        store.add(record(1150, 600, 590.0, 16.0));
        store.add(record(1150, 620, 615.0, 16.5));
        store.add(record(1160, 640, 630.0, 17.2));
        store.add(record(1160, 660, 610.0, 15.1));
        store
    }

    #[test]
    fn test_add_rejects_duplicate_candidate() {
        let mut store = ResultStore::new();
        assert!(store.add(record(1150, 600, 590.0, 16.0)));
        assert!(!store.add(record(1150, 600, 999.0, 1.0)));

        assert_eq!(store.len(), 1);
        assert_eq!(store.results()[0].average_hash_rate, 590.0);
        assert!(store.contains(Candidate::new(1150, 600)));
    }

    #[test]
    fn test_best_by_hashrate() {
        let store = sample_store();
        assert_eq!(store.best().unwrap().candidate, Candidate::new(1160, 640));
        assert!(ResultStore::new().best().is_none());
    }

    #[test]
    fn test_best_tie_keeps_first() {
        let mut store = ResultStore::new();
        store.add(record(1150, 600, 600.0, 16.0));
        store.add(record(1160, 600, 600.0, 15.0));
        assert_eq!(store.best().unwrap().candidate, Candidate::new(1150, 600));
    }

    #[test]
    fn test_top_k_by_hashrate() {
        let top = sample_store().top_k(2, Ranking::Hashrate);
        assert_eq!(top.len(), 2);
        assert_eq!(top[0].rank, 1);
        assert_eq!(top[0].record.candidate, Candidate::new(1160, 640));
        assert_eq!(top[1].rank, 2);
        assert_eq!(top[1].record.candidate, Candidate::new(1150, 620));
    }

    #[test]
    fn test_top_k_by_efficiency_lowest_first() {
        let top = sample_store().top_k(8, Ranking::Efficiency);
        assert_eq!(top.len(), 4);
        assert_eq!(top[0].record.candidate, Candidate::new(1160, 660));
        assert_eq!(top[3].record.candidate, Candidate::new(1160, 640));
        assert_eq!(top.iter().map(|r| r.rank).collect::<Vec<_>>(), vec![1, 2, 3, 4]);
    }

    #[test]
    fn test_persist_then_resume_restores_tested_set() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        let store = sample_store();
        store.persist(&path).unwrap();

        let mut resumed = ResultStore::new();
        let added = resumed.load_for_resume(&path).unwrap();

        assert_eq!(added, 4);
        assert_eq!(resumed.tested(), store.tested());
        assert_eq!(resumed.results(), store.results());
    }

    #[test]
    fn test_checkpoint_is_legacy_list() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        sample_store().checkpoint(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert!(raw.is_array());

        let mut resumed = ResultStore::new();
        assert_eq!(resumed.load_for_resume(&path).unwrap(), 4);
    }

    #[test]
    fn test_structured_document_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        sample_store().persist(&path).unwrap();

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw["all_results"].as_array().unwrap().len(), 4);
        assert_eq!(raw["top_performers"][0]["rank"], 1);
        assert_eq!(raw["top_performers"][0]["frequency"], 640);
        assert_eq!(raw["most_efficient"][0]["efficiencyJTH"], 15.1);
    }

    #[test]
    fn test_resume_merges_without_duplicates() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(
            &path,
            r#"[
                {"coreVoltage": 1150, "frequency": 600, "averageHashRate": 590.0,
                 "averageTemperature": 60.0, "efficiencyJTH": 16.0},
                {"coreVoltage": 1150, "frequency": 600, "averageHashRate": 10.0,
                 "averageTemperature": 60.0, "efficiencyJTH": 99.0},
                {"coreVoltage": 1170, "frequency": 700, "averageHashRate": 650.0,
                 "averageTemperature": 64.0, "efficiencyJTH": 18.0, "averageVRTemp": 70.5}
            ]"#,
        )
        .unwrap();

        let mut store = ResultStore::new();
        store.add(record(1170, 700, 1.0, 1.0));
        let added = store.load_for_resume(&path).unwrap();

        assert_eq!(added, 1);
        assert_eq!(store.len(), 2);
        assert_eq!(store.results()[1].average_hash_rate, 590.0);
    }

    #[test]
    fn test_resume_missing_file_is_noop() {
        let dir = tempfile::tempdir().unwrap();
        let mut store = ResultStore::new();
        assert_eq!(store.load_for_resume(&dir.path().join("none.json")).unwrap(), 0);
    }

    #[test]
    fn test_backup_copies_existing_file() {
        use chrono::TimeZone;

        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results_10.0.0.5.json");
        std::fs::write(&path, "[]").unwrap();
        let at = Local.with_ymd_and_hms(2024, 5, 1, 13, 2, 3).unwrap();

        let backup = backup_results_file_at(&path, &at).unwrap().unwrap();

        assert_eq!(
            backup.file_name().unwrap().to_str().unwrap(),
            "results_10.0.0.5.json.20240501_130203.bak"
        );
        assert_eq!(std::fs::read_to_string(&backup).unwrap(), "[]");
        assert!(path.exists());
    }

    #[test]
    fn test_backup_without_file_is_none() {
        let dir = tempfile::tempdir().unwrap();
        assert_eq!(backup_results_file(&dir.path().join("missing.json")).unwrap(), None);
    }

    #[test]
    fn test_resume_corrupt_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("results.json");
        std::fs::write(&path, "{\"unexpected\": true}").unwrap();

        let mut store = ResultStore::new();
        assert!(store.load_for_resume(&path).is_err());
        assert!(store.is_empty());
    }
}
