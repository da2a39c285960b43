//! Tabular view of a metric batch and the extraction seam that builds it.

use std::collections::{BTreeMap, BTreeSet};

use sentinel_types::MetricSample;
use serde::{Deserialize, Serialize};

use crate::error::{EngineError, EngineResult};

/// Cells of one column.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum ColumnData {
    Numeric(Vec<Option<f64>>),
    Text(Vec<Option<String>>),
}

impl ColumnData {
    pub fn len(&self) -> usize {
        match self {
            Self::Numeric(v) => v.len(),
            Self::Text(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Column {
    pub name: String,
    pub data: ColumnData,
}

/// A batch of samples as named, typed columns.
///
/// Row `i` always describes `batch[i]`.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTable {
    rows: usize,
    columns: Vec<Column>,
}

impl FeatureTable {
    /// Empty table with a fixed row count.
    pub fn new(rows: usize) -> Self {
        Self {
            rows,
            columns: Vec::new(),
        }
    }

    /// Append a column. Its length must match the row count and its name
    /// must be unique.
    pub fn push_column(&mut self, name: impl Into<String>, data: ColumnData) -> EngineResult<()> {
        let name = name.into();
        if data.len() != self.rows {
            return Err(EngineError::MalformedBatch(format!(
                "column {} has {} cells, table has {} rows",
                name,
                data.len(),
                self.rows
            )));
        }
        if self.columns.iter().any(|c| c.name == name) {
            return Err(EngineError::MalformedBatch(format!("duplicate column {}", name)));
        }
        self.columns.push(Column { name, data });
        Ok(())
    }

    pub fn row_count(&self) -> usize {
        self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    /// Numeric columns in insertion order.
    pub fn numeric_columns(&self) -> impl Iterator<Item = (&str, &[Option<f64>])> {
        self.columns.iter().filter_map(|c| match &c.data {
            ColumnData::Numeric(cells) => Some((c.name.as_str(), cells.as_slice())),
            ColumnData::Text(_) => None,
        })
    }

    pub fn numeric_column(&self, name: &str) -> Option<&[Option<f64>]> {
        self.numeric_columns()
            .find(|(n, _)| *n == name)
            .map(|(_, cells)| cells)
    }

    pub fn has_numeric_columns(&self) -> bool {
        self.numeric_columns().next().is_some()
    }

    /// Every numeric cell of row `index`, missing or non-finite ones as `0.0`.
    pub fn numeric_row(&self, index: usize) -> BTreeMap<String, f64> {
        self.numeric_columns()
            .map(|(name, cells)| {
                let value = cells.get(index).copied().flatten().and_then(finite);
                (name.to_string(), value.unwrap_or(0.0))
            })
            .collect()
    }
}

/// A cell value, or `None` when it is NaN or infinite.
pub(crate) fn finite(value: f64) -> Option<f64> {
    value.is_finite().then_some(value)
}

// ── Extraction ──────────────────────────────────────────────────────────

/// Turns a metric batch into a feature table.
///
/// Implementations must keep rows aligned with the batch order.
pub trait FeatureExtractor: Send + Sync {
    fn extract(&self, batch: &[MetricSample]) -> EngineResult<FeatureTable>;
}

/// Default extractor: one numeric column per distinct metric name.
///
/// Each row carries its sample's value under its own metric name and is
/// missing in every other numeric column, so per-column statistics are
/// per-metric statistics. Name, service and namespace ride along as text.
#[derive(Debug, Clone, Default)]
pub struct MetricFeatureExtractor;

impl FeatureExtractor for MetricFeatureExtractor {
    fn extract(&self, batch: &[MetricSample]) -> EngineResult<FeatureTable> {
        let mut table = FeatureTable::new(batch.len());

        table.push_column(
            "metric_name",
            ColumnData::Text(batch.iter().map(|s| Some(s.name.clone())).collect()),
        )?;
        table.push_column(
            "service",
            ColumnData::Text(batch.iter().map(|s| Some(s.service().to_string())).collect()),
        )?;
        table.push_column(
            "namespace",
            ColumnData::Text(batch.iter().map(|s| Some(s.namespace().to_string())).collect()),
        )?;

        let names: BTreeSet<&str> = batch.iter().map(|s| s.name.as_str()).collect();
        for name in names {
            let cells = batch
                .iter()
                .map(|s| if s.name == name { finite(s.value) } else { None })
                .collect();
            table.push_column(name, ColumnData::Numeric(cells))?;
        }

        Ok(table)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn push_column_rejects_wrong_length() {
        let mut table = FeatureTable::new(2);
        let err = table
            .push_column("x", ColumnData::Numeric(vec![Some(1.0)]))
            .unwrap_err();
        assert!(matches!(err, EngineError::MalformedBatch(_)));
    }

    #[test]
    fn push_column_rejects_duplicates() {
        let mut table = FeatureTable::new(1);
        table.push_column("x", ColumnData::Numeric(vec![Some(1.0)])).unwrap();
        assert!(table.push_column("x", ColumnData::Numeric(vec![Some(2.0)])).is_err());
    }

    #[test]
    fn numeric_row_coerces_missing_to_zero() {
        let mut table = FeatureTable::new(2);
        table
            .push_column("a", ColumnData::Numeric(vec![Some(1.5), None]))
            .unwrap();
        table
            .push_column("b", ColumnData::Numeric(vec![Some(f64::NAN), Some(2.0)]))
            .unwrap();
        table
            .push_column("label", ColumnData::Text(vec![Some("x".into()), None]))
            .unwrap();

        let row0 = table.numeric_row(0);
        assert_eq!(row0.len(), 2);
        assert_eq!(row0["a"], 1.5);
        assert_eq!(row0["b"], 0.0);
        assert_eq!(table.numeric_row(1)["a"], 0.0);
    }

    #[test]
    fn extractor_pivots_by_metric_name() {
        let batch = vec![
            MetricSample::new("cpu_usage", 0.4).with_label("service", "api"),
            MetricSample::new("memory_rss", 512.0),
            MetricSample::new("cpu_usage", 0.6),
        ];
        let table = MetricFeatureExtractor.extract(&batch).unwrap();

        assert_eq!(table.row_count(), 3);
        let cpu = table.numeric_column("cpu_usage").unwrap();
        assert_eq!(cpu, &[Some(0.4), None, Some(0.6)]);
        let mem = table.numeric_column("memory_rss").unwrap();
        assert_eq!(mem, &[None, Some(512.0), None]);
        assert_eq!(table.numeric_columns().count(), 2);
    }

    #[test]
    fn extractor_treats_nan_values_as_missing() {
        let batch = vec![MetricSample::new("latency_ms", f64::NAN)];
        let table = MetricFeatureExtractor.extract(&batch).unwrap();
        assert_eq!(table.numeric_column("latency_ms").unwrap(), &[None]);
    }
}
