//! Cost ledger: per-call cost records persisted as a JSON array.
//!
//! The whole log is rewritten on every commit (temp file, then rename), so
//! the file on disk is always a complete, valid document.

use crate::api::pricing::PricingTable;
use crate::error::LedgerError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Project label used in stats for records without one.
pub const UNKNOWN_PROJECT: &str = "Unknown";

/// One completed model call.
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct CostRecord {
    pub timestamp: DateTime<Utc>,
    pub model: String,
    pub input_tokens: u64,
    pub output_tokens: u64,
    /// USD.
    pub cost: f64,
    #[serde(default)]
    pub project: Option<String>,
    #[serde(default)]
    pub notes: Option<String>,
}

impl CostRecord {
    pub fn total_tokens(&self) -> u64 {
        self.input_tokens + self.output_tokens
    }
}

/// Aggregate view over a ledger.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct LedgerStats {
    pub total_cost: f64,
    pub total_requests: usize,
    pub total_tokens: u64,
    pub avg_cost_per_request: f64,
    pub cost_by_model: BTreeMap<String, f64>,
    pub cost_by_project: BTreeMap<String, f64>,
}

impl LedgerStats {
    /// Multi-line printable report.
    pub fn summary(&self) -> String {
        let rule = "=".repeat(60);
        let mut out = format!(
            "{rule}\nAPI COST SUMMARY\n{rule}\n\
             Total Cost: ${:.4}\n\
             Total Requests: {}\n\
             Total Tokens: {}\n\
             Avg Cost/Request: ${:.4}\n",
            self.total_cost, self.total_requests, self.total_tokens, self.avg_cost_per_request,
        );
        if !self.cost_by_model.is_empty() {
            out.push_str("\nCost by Model:\n");
            for (model, cost) in &self.cost_by_model {
                out.push_str(&format!("  {model}: ${cost:.4}\n"));
            }
        }
        if !self.cost_by_project.is_empty() {
            out.push_str("\nCost by Project:\n");
            for (project, cost) in &self.cost_by_project {
                out.push_str(&format!("  {project}: ${cost:.4}\n"));
            }
        }
        out.push_str(&rule);
        out
    }
}

/// Append-only sequence of [`CostRecord`]s, optionally backed by a file.
#[derive(Debug, Clone, Default)]
pub struct CostLedger {
    records: Vec<CostRecord>,
    path: Option<PathBuf>,
    pricing: PricingTable,
}

impl CostLedger {
    /// A ledger that is never persisted.
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// Open a file-backed ledger, loading existing records. A missing or
    /// empty file starts an empty ledger.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self, LedgerError> {
        let path = path.into();
        let records = match std::fs::read_to_string(&path) {
            Ok(text) if text.trim().is_empty() => Vec::new(),
            Ok(text) => serde_json::from_str(&text)?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Vec::new(),
            Err(e) => return Err(e.into()),
        };
        debug!("Loaded {} cost record(s) from {}", records.len(), path.display());
        Ok(Self {
            records,
            path: Some(path),
            pricing: PricingTable::default(),
        })
    }

    /// Replace the pricing table (builder pattern).
    pub fn with_pricing(mut self, pricing: PricingTable) -> Self {
        self.pricing = pricing;
        self
    }

    pub fn pricing(&self) -> &PricingTable {
        &self.pricing
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn records(&self) -> &[CostRecord] {
        &self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Price a call without recording it.
    pub fn quote(
        &self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        project: Option<&str>,
        notes: Option<&str>,
    ) -> CostRecord {
        CostRecord {
            timestamp: Utc::now(),
            model: model.to_string(),
            input_tokens,
            output_tokens,
            cost: self.pricing.cost(model, input_tokens, output_tokens),
            project: project.map(String::from),
            notes: notes.map(String::from),
        }
    }

    /// Price and record one call, then persist. Returns the call's cost.
    pub fn record(
        &mut self,
        model: &str,
        input_tokens: u64,
        output_tokens: u64,
        project: Option<&str>,
        notes: Option<&str>,
    ) -> Result<f64, LedgerError> {
        let record = self.quote(model, input_tokens, output_tokens, project, notes);
        let cost = record.cost;
        self.commit(vec![record])?;
        Ok(cost)
    }

    /// Append already-priced records and persist once. Returns their summed
    /// cost.
    ///
    /// The records stay in memory even if persisting fails, so in-memory
    /// totals always match what was spent.
    pub fn commit(&mut self, records: Vec<CostRecord>) -> Result<f64, LedgerError> {
        let cost: f64 = records.iter().map(|r| r.cost).sum();
        self.records.extend(records);
        self.save()?;
        Ok(cost)
    }

    /// Sum of costs, optionally filtered by project label.
    pub fn total(&self, project: Option<&str>) -> f64 {
        self.records
            .iter()
            .filter(|r| project.is_none() || r.project.as_deref() == project)
            .map(|r| r.cost)
            .sum()
    }

    pub fn stats(&self) -> LedgerStats {
        let total_cost = self.total(None);
        let total_requests = self.records.len();
        let mut stats = LedgerStats {
            total_cost,
            total_requests,
            total_tokens: self.records.iter().map(CostRecord::total_tokens).sum(),
            avg_cost_per_request: if total_requests > 0 {
                total_cost / total_requests as f64
            } else {
                0.0
            },
            ..Default::default()
        };
        for record in &self.records {
            *stats.cost_by_model.entry(record.model.clone()).or_default() += record.cost;
            let project = record.project.as_deref().unwrap_or(UNKNOWN_PROJECT);
            *stats.cost_by_project.entry(project.to_string()).or_default() += record.cost;
        }
        stats
    }

    /// Clear all records and rewrite the log.
    pub fn reset(&mut self) -> Result<(), LedgerError> {
        self.records.clear();
        self.save()
    }

    /// Atomic write: serialize to a temp file, then rename into place.
    fn save(&self) -> Result<(), LedgerError> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
            std::fs::create_dir_all(dir)?;
        }
        let mut tmp_name = path.file_name().unwrap_or_default().to_os_string();
        tmp_name.push(".tmp");
        let tmp_path = path.with_file_name(tmp_name);

        let json = serde_json::to_string_pretty(&self.records)?;
        std::fs::write(&tmp_path, json)?;
        std::fs::rename(&tmp_path, path)?;
        Ok(())
    }
}

/// Format a USD amount for humans.
pub fn format_cost(cost: f64) -> String {
    if cost < 0.01 {
        format!("${cost:.4} (< 1 cent)")
    } else if cost < 1.0 {
        format!("${cost:.2} ({} cents)", (cost * 100.0) as u64)
    } else {
        format!("${cost:.2}")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-12
    }

    #[test]
    fn record_prices_with_table() {
        let mut ledger = CostLedger::in_memory();
        let cost = ledger.record("gpt-4", 1000, 500, None, None).unwrap();
        assert!(approx(cost, 0.03 + 0.03));
        assert_eq!(ledger.len(), 1);
        assert_eq!(ledger.records()[0].total_tokens(), 1500);
    }

    #[test]
    fn unknown_model_uses_default_rates() {
        let mut ledger = CostLedger::in_memory();
        let unknown = ledger.record("mystery-model", 2000, 2000, None, None).unwrap();
        let known = ledger.pricing().cost("gpt-3.5-turbo", 2000, 2000);
        assert!(approx(unknown, known));
    }

    #[test]
    fn totals_filter_by_project() {
        let mut ledger = CostLedger::in_memory();
        ledger.record("gpt-4", 1000, 0, Some("alpha"), None).unwrap();
        ledger.record("gpt-4", 2000, 0, Some("beta"), None).unwrap();
        ledger.record("gpt-4", 1000, 0, None, Some("scratch")).unwrap();
        assert!(approx(ledger.total(Some("alpha")), 0.03));
        assert!(approx(ledger.total(Some("beta")), 0.06));
        assert!(approx(ledger.total(None), 0.12));
        assert!(approx(ledger.total(Some("gamma")), 0.0));
    }

    #[test]
    fn stats_group_by_model_and_project() {
        let mut ledger = CostLedger::in_memory();
        ledger.record("gpt-4", 1000, 0, Some("alpha"), None).unwrap();
        ledger.record("gpt-3.5-turbo", 1000, 1000, None, None).unwrap();

        let stats = ledger.stats();
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.total_tokens, 3000);
        assert!(approx(stats.total_cost, 0.03 + 0.002));
        assert!(approx(stats.avg_cost_per_request, (0.03 + 0.002) / 2.0));
        assert!(approx(stats.cost_by_model["gpt-4"], 0.03));
        assert!(approx(stats.cost_by_project[UNKNOWN_PROJECT], 0.002));
        assert!(stats.summary().contains("Total Requests: 2"));
    }

    #[test]
    fn empty_stats() {
        let stats = CostLedger::in_memory().stats();
        assert_eq!(stats, LedgerStats::default());
        assert!(stats.summary().contains("Total Cost: $0.0000"));
    }

    #[test]
    fn persists_and_reloads() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("logs").join("cost_log.json");

        let mut ledger = CostLedger::open(&path).unwrap();
        assert!(ledger.is_empty());
        ledger.record("gpt-4", 100, 50, Some("demo"), Some("first")).unwrap();
        ledger.record("claude-3-haiku", 100, 50, None, None).unwrap();

        let reloaded = CostLedger::open(&path).unwrap();
        assert_eq!(reloaded.records(), ledger.records());
        assert!(!path.with_file_name("cost_log.json.tmp").exists());

        let raw: serde_json::Value =
            serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 2);
        assert_eq!(raw[0]["project"], "demo");
        assert_eq!(raw[1]["project"], serde_json::Value::Null);
    }

    #[test]
    fn reset_clears_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cost_log.json");
        let mut ledger = CostLedger::open(&path).unwrap();
        ledger.record("gpt-4", 100, 50, None, None).unwrap();
        ledger.reset().unwrap();
        assert!(ledger.is_empty());
        assert!(CostLedger::open(&path).unwrap().is_empty());
    }

    #[test]
    fn corrupt_log_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cost_log.json");
        std::fs::write(&path, "{not json").unwrap();
        assert!(matches!(CostLedger::open(&path), Err(LedgerError::Serde(_))));
    }

    #[test]
    fn commit_sums_batch() {
        let mut ledger = CostLedger::in_memory();
        let a = ledger.quote("gpt-4", 1000, 0, None, None);
        let b = ledger.quote("gpt-4", 0, 1000, None, None);
        let cost = ledger.commit(vec![a, b]).unwrap();
        assert!(approx(cost, 0.09));
        assert!(approx(ledger.total(None), cost));
    }

    #[test]
    fn cost_formatting() {
        assert_eq!(format_cost(0.0042), "$0.0042 (< 1 cent)");
        assert_eq!(format_cost(0.25), "$0.25 (25 cents)");
        assert_eq!(format_cost(3.14159), "$3.14");
    }
}
