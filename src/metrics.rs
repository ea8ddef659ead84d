use crate::error::{ClusterError, Result};
use crate::Matrix;
use ndarray::{Array1, ArrayView1};

/// Sum of squared per-dimension differences. No square root: callers only
/// compare distances against each other.
pub fn squared_euclidean(a: &ArrayView1<f64>, b: &ArrayView1<f64>) -> f64 {
    a.iter()
        .zip(b.iter())
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f64>()
}

/// Total within-cluster squared distance of every row to its assigned centroid.
pub fn distortion(x: &Matrix, centroids: &Matrix, labels: &Array1<usize>) -> Result<f64> {
    if labels.len() != x.nrows() {
        return Err(ClusterError::invalid(format!(
            "labels length ({}) doesn't match number of samples ({})",
            labels.len(),
            x.nrows()
        )));
    }
    if x.ncols() != centroids.ncols() {
        return Err(ClusterError::invalid(format!(
            "number of features in X ({}) doesn't match centroids ({})",
            x.ncols(),
            centroids.ncols()
        )));
    }

    let mut total = 0.0;
    for (row, &label) in x.rows().into_iter().zip(labels.iter()) {
        if label >= centroids.nrows() {
            return Err(ClusterError::invalid(format!(
                "label {} out of range for {} centroids",
                label,
                centroids.nrows()
            )));
        }
        total += squared_euclidean(&row, &centroids.row(label));
    }
    Ok(total)
}

/// Distortion averaged over the number of samples.
pub fn mean_distortion(x: &Matrix, centroids: &Matrix, labels: &Array1<usize>) -> Result<f64> {
    if x.nrows() == 0 {
        return Err(ClusterError::invalid("input matrix has no samples"));
    }
    Ok(distortion(x, centroids, labels)? / x.nrows() as f64)
}
