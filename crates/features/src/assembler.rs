//! Feature assembly.
//!
//! Picks the ordered feature columns out of a merged table and produces the
//! numeric matrix (plus next-bar direction labels for training). The feature
//! order chosen at training time is persisted and reused verbatim at inference.

use mtf_core::config::GapPolicy;
use mtf_core::{
    format_timestamp, BarField, ColumnRef, Error, MergedRow, MergedTable, Result, Timeframe,
    Timestamp,
};
use ndarray::Array2;
use serde::{Deserialize, Serialize};

/// Ordered feature names.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet {
    names: Vec<String>,
}

impl FeatureSet {
    /// Canonical candidate list: log-returns, then volumes, then spreads,
    /// fast timeframe before slow within each group.
    pub fn canonical(fast: &Timeframe, slow: &Timeframe) -> Vec<String> {
        [BarField::LogReturn, BarField::Vol, BarField::Spread]
            .into_iter()
            .flat_map(|field| [field.column(fast), field.column(slow)])
            .collect()
    }

    /// Wrap an already-chosen list (e.g. one read back from an artifact).
    pub fn new(names: Vec<String>) -> Result<Self> {
        if names.is_empty() {
            return Err(Error::no_features("feature list is empty"));
        }
        Ok(Self { names })
    }

    /// Keep the candidates present in `table`, preserving candidate order.
    pub fn select(candidates: &[String], table: &MergedTable) -> Result<Self> {
        let names: Vec<String> = candidates
            .iter()
            .filter(|name| table.resolve_column(name).is_some())
            .cloned()
            .collect();
        if names.is_empty() {
            return Err(Error::no_features(format!(
                "none of [{}] is present in the merged table",
                candidates.join(", ")
            )));
        }
        Ok(Self { names })
    }

    /// Resolve every name against `table`, in order. Any missing column fails;
    /// nothing is dropped or reordered.
    pub fn resolve(&self, table: &MergedTable) -> Result<Vec<ColumnRef>> {
        self.names
            .iter()
            .map(|name| {
                table.resolve_column(name).ok_or_else(|| {
                    Error::no_features(format!("feature '{name}' is missing from the data"))
                })
            })
            .collect()
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// Rows are time-ordered observations, columns follow the feature set.
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub names: Vec<String>,
    pub times: Vec<Timestamp>,
    /// Index of each row in the merged table. Strictly increasing; a jump
    /// marks dropped rows in between.
    pub sources: Vec<usize>,
    pub values: Array2<f64>,
}

impl FeatureMatrix {
    pub fn rows(&self) -> usize {
        self.values.nrows()
    }

    pub fn is_empty(&self) -> bool {
        self.values.nrows() == 0
    }
}

/// Rows removed during assembly.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AssemblyReport {
    /// Rows with a missing selected feature.
    pub incomplete_rows: usize,
    /// Trailing rows with no next bar to label against.
    pub unlabeled_rows: usize,
}

/// Labeled training data.
#[derive(Debug, Clone)]
pub struct TrainingData {
    pub matrix: FeatureMatrix,
    /// 1 when the next fast close is higher, else 0.
    pub labels: Vec<u8>,
    pub report: AssemblyReport,
}

/// Turns a merged table into feature matrices.
pub struct FeatureAssembler {
    features: FeatureSet,
    gap_policy: GapPolicy,
}

impl FeatureAssembler {
    pub fn new(features: FeatureSet, gap_policy: GapPolicy) -> Self {
        Self {
            features,
            gap_policy,
        }
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    /// Assemble training rows with labels.
    ///
    /// Labels compare each row's fast close with the next merged row's, before
    /// any row is dropped; the last row has no label and is excluded.
    pub fn training(&self, table: &MergedTable) -> Result<TrainingData> {
        let columns = self.features.resolve(table)?;

        let mut report = AssemblyReport {
            unlabeled_rows: table.len().min(1),
            ..AssemblyReport::default()
        };
        let mut times = Vec::with_capacity(table.len());
        let mut sources = Vec::with_capacity(table.len());
        let mut flat = Vec::with_capacity(table.len() * columns.len());
        let mut labels = Vec::with_capacity(table.len());

        for (i, pair) in table.rows.windows(2).enumerate() {
            let (row, next) = (&pair[0], &pair[1]);
            if !self.collect_row(row, &columns, &mut flat, &mut report)? {
                continue;
            }
            labels.push(u8::from(next.fast.bar.close > row.fast.bar.close));
            times.push(row.time);
            sources.push(i);
        }

        if times.is_empty() {
            return Err(Error::empty_result(format!(
                "no labeled rows left out of {} merged rows",
                table.len()
            )));
        }

        Ok(TrainingData {
            matrix: self.matrix(times, sources, flat)?,
            labels,
            report,
        })
    }

    /// Assemble every complete row, without labels. Incomplete rows are always
    /// dropped here; an empty matrix is returned rather than an error.
    pub fn inference(&self, table: &MergedTable) -> Result<(FeatureMatrix, AssemblyReport)> {
        let columns = self.features.resolve(table)?;
        let mut report = AssemblyReport::default();
        let mut times = Vec::with_capacity(table.len());
        let mut sources = Vec::with_capacity(table.len());
        let mut flat = Vec::with_capacity(table.len() * columns.len());

        for (i, row) in table.rows.iter().enumerate() {
            match columns.iter().map(|&c| row.value(c)).collect::<Option<Vec<f64>>>() {
                Some(values) => {
                    flat.extend(values);
                    times.push(row.time);
                    sources.push(i);
                }
                None => report.incomplete_rows += 1,
            }
        }

        Ok((self.matrix(times, sources, flat)?, report))
    }

    /// Append one row's values. Returns false when the row is dropped.
    fn collect_row(
        &self,
        row: &MergedRow,
        columns: &[ColumnRef],
        flat: &mut Vec<f64>,
        report: &mut AssemblyReport,
    ) -> Result<bool> {
        let values: Option<Vec<f64>> = columns.iter().map(|&c| row.value(c)).collect();
        match (values, self.gap_policy) {
            (Some(values), _) => {
                flat.extend(values);
                Ok(true)
            }
            (None, GapPolicy::Drop) => {
                report.incomplete_rows += 1;
                Ok(false)
            }
            (None, GapPolicy::Reject) => Err(Error::data(format!(
                "row at {} is missing a selected feature",
                format_timestamp(row.time)
            ))),
        }
    }

    fn matrix(
        &self,
        times: Vec<Timestamp>,
        sources: Vec<usize>,
        flat: Vec<f64>,
    ) -> Result<FeatureMatrix> {
        let values = Array2::from_shape_vec((times.len(), self.features.len()), flat)
            .map_err(|e| Error::data(format!("feature matrix shape: {e}")))?;
        Ok(FeatureMatrix {
            names: self.features.names().to_vec(),
            times,
            sources,
            values,
        })
    }
}
