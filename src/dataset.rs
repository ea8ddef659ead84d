use crate::error::{ClusterError, Result};
use crate::Matrix;
use ndarray::{Array1, Axis};
use std::collections::HashMap;

/// Expression vectors keyed by a stable entity identifier (e.g. an ORF name).
///
/// Row `i` of `features` belongs to `ids[i]`; the engines only see row
/// indices, this type maps them back to names.
#[derive(Clone, Debug)]
pub struct Dataset {
    pub ids: Vec<String>,
    pub features: Matrix,
}

impl Dataset {
    pub fn new(ids: Vec<String>, features: Matrix) -> Result<Self> {
        if features.nrows() != ids.len() {
            return Err(ClusterError::invalid(format!(
                "number of ids ({}) and samples ({}) must match",
                ids.len(),
                features.nrows()
            )));
        }

        Ok(Self { ids, features })
    }

    /// Builds a dataset from ragged input, rejecting rows whose length
    /// differs from the first one.
    pub fn from_rows(ids: Vec<String>, rows: Vec<Vec<f64>>) -> Result<Self> {
        let n_features = rows
            .first()
            .map(|row| row.len())
            .ok_or_else(|| ClusterError::invalid("dataset must contain at least one row"))?;
        if n_features == 0 {
            return Err(ClusterError::invalid("feature vectors must have at least one dimension"));
        }

        let mut flat = Vec::with_capacity(rows.len() * n_features);
        for (i, row) in rows.iter().enumerate() {
            if row.len() != n_features {
                return Err(ClusterError::invalid(format!(
                    "row {} has {} features, expected {}",
                    i,
                    row.len(),
                    n_features
                )));
            }
            flat.extend_from_slice(row);
        }

        let features = Matrix::from_shape_vec((rows.len(), n_features), flat)
            .map_err(|e| ClusterError::invalid(e.to_string()))?;
        Self::new(ids, features)
    }

    pub fn n_samples(&self) -> usize {
        self.features.nrows()
    }

    pub fn n_features(&self) -> usize {
        self.features.ncols()
    }

    pub fn index_of(&self, id: &str) -> Option<usize> {
        self.ids.iter().position(|candidate| candidate == id)
    }

    /// Keeps only the given rows, in the given order.
    pub fn select(&self, indices: &[usize]) -> Self {
        Self {
            ids: indices.iter().map(|&i| self.ids[i].clone()).collect(),
            features: self.features.select(Axis(0), indices),
        }
    }

    /// Maps each entity id to the cluster label at its row.
    pub fn label_map(&self, labels: &Array1<usize>) -> Result<HashMap<String, usize>> {
        if labels.len() != self.n_samples() {
            return Err(ClusterError::invalid(format!(
                "labels length ({}) doesn't match number of samples ({})",
                labels.len(),
                self.n_samples()
            )));
        }

        Ok(self.ids.iter().cloned().zip(labels.iter().copied()).collect())
    }
}
