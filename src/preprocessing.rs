//! Input conditioning for the clustering engines.
//!
//! The engines assume every entity has already been filtered and z-scored
//! along its own time axis; they never re-normalize. The helpers here do
//! that step for callers that start from raw expression levels.

use crate::dataset::Dataset;
use crate::error::{ClusterError, Result};
use crate::{Matrix, Vector};
use ndarray::Axis;
use tracing::debug;

/// Drops low-expression and low-variability entities.
///
/// An entity is kept when its row mean is above
/// `mean(row_means) - mean_cutoff_sigmas * std(row_means)`; the survivors are
/// then kept when their row standard deviation is above the same kind of
/// cutoff computed over the survivors' row standard deviations. All standard
/// deviations are sample deviations (`ddof = 1`).
#[derive(Clone, Debug)]
pub struct ExpressionFilter {
    mean_cutoff_sigmas: f64,
    std_cutoff_sigmas: f64,
}

impl Default for ExpressionFilter {
    fn default() -> Self {
        Self::new()
    }
}

impl ExpressionFilter {
    pub fn new() -> Self {
        Self {
            mean_cutoff_sigmas: 2.0,
            std_cutoff_sigmas: 2.0,
        }
    }

    pub fn mean_cutoff_sigmas(mut self, sigmas: f64) -> Self {
        self.mean_cutoff_sigmas = sigmas;
        self
    }

    pub fn std_cutoff_sigmas(mut self, sigmas: f64) -> Self {
        self.std_cutoff_sigmas = sigmas;
        self
    }

    pub fn apply(&self, dataset: &Dataset) -> Result<Dataset> {
        if !self.mean_cutoff_sigmas.is_finite() || !self.std_cutoff_sigmas.is_finite() {
            return Err(ClusterError::invalid("cutoff sigmas must be finite"));
        }
        if dataset.n_features() < 2 {
            return Err(ClusterError::invalid(
                "filtering needs at least two time points per entity",
            ));
        }

        let row_means = dataset.features.map_axis(Axis(1), |row| row.mean().unwrap_or(0.0));
        let mean_cutoff = cutoff(&row_means, self.mean_cutoff_sigmas)?;
        let expressed: Vec<usize> = (0..dataset.n_samples())
            .filter(|&i| row_means[i] > mean_cutoff)
            .collect();
        let expressed = dataset.select(&expressed);

        let row_stds = expressed.features.std_axis(Axis(1), 1.0);
        let std_cutoff = cutoff(&row_stds, self.std_cutoff_sigmas)?;
        let variable: Vec<usize> = (0..expressed.n_samples())
            .filter(|&i| row_stds[i] > std_cutoff)
            .collect();

        debug!(
            input = dataset.n_samples(),
            after_mean_cutoff = expressed.n_samples(),
            kept = variable.len(),
            mean_cutoff,
            std_cutoff,
            "filtered expression dataset"
        );

        Ok(expressed.select(&variable))
    }
}

fn cutoff(values: &Vector, sigmas: f64) -> Result<f64> {
    if values.len() < 2 {
        return Err(ClusterError::invalid(format!(
            "need at least two entities to compute a cutoff, got {}",
            values.len()
        )));
    }
    let mean = values.mean().unwrap_or(0.0);
    Ok(mean - sigmas * values.std(1.0))
}

/// Per-entity z-score normalization: each row is shifted to mean 0 and
/// scaled to unit sample standard deviation.
pub struct RowNormalizer {
    mean: Option<Vector>,
    std: Option<Vector>,
}

impl Default for RowNormalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl RowNormalizer {
    pub fn new() -> Self {
        Self {
            mean: None,
            std: None,
        }
    }

    pub fn fit(&mut self, data: &Matrix) -> Result<()> {
        if data.ncols() < 2 {
            return Err(ClusterError::invalid(
                "row normalization needs at least two time points per entity",
            ));
        }

        let mean = data.map_axis(Axis(1), |row| row.mean().unwrap_or(0.0));
        let std = data.std_axis(Axis(1), 1.0);

        if let Some(row) = std.iter().position(|&s| s == 0.0 || !s.is_finite()) {
            return Err(ClusterError::invalid(format!(
                "row {} has zero or undefined variance",
                row
            )));
        }

        self.mean = Some(mean);
        self.std = Some(std);
        Ok(())
    }

    pub fn transform(&self, data: &Matrix) -> Result<Matrix> {
        let (mean, std) = self.fitted()?;
        if data.nrows() != mean.len() {
            return Err(ClusterError::invalid(format!(
                "number of rows ({}) doesn't match fitted data ({})",
                data.nrows(),
                mean.len()
            )));
        }

        let mut result = data.clone();
        for (i, mut row) in result.axis_iter_mut(Axis(0)).enumerate() {
            row -= mean[i];
            row /= std[i];
        }

        Ok(result)
    }

    pub fn fit_transform(&mut self, data: &Matrix) -> Result<Matrix> {
        self.fit(data)?;
        self.transform(data)
    }

    pub fn inverse_transform(&self, data: &Matrix) -> Result<Matrix> {
        let (mean, std) = self.fitted()?;
        if data.nrows() != mean.len() {
            return Err(ClusterError::invalid(format!(
                "number of rows ({}) doesn't match fitted data ({})",
                data.nrows(),
                mean.len()
            )));
        }

        let mut result = data.clone();
        for (i, mut row) in result.axis_iter_mut(Axis(0)).enumerate() {
            row *= std[i];
            row += mean[i];
        }

        Ok(result)
    }

    fn fitted(&self) -> Result<(&Vector, &Vector)> {
        match (self.mean.as_ref(), self.std.as_ref()) {
            (Some(mean), Some(std)) => Ok((mean, std)),
            _ => Err(ClusterError::NotFitted),
        }
    }
}

/// Z-scores every row of `data`.
pub fn normalize_rows(data: &Matrix) -> Result<Matrix> {
    RowNormalizer::new().fit_transform(data)
}
