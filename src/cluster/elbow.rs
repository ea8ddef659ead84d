use super::kmeans::{ConvergenceStatus, KMeans};
use crate::error::{ClusterError, Result};
use crate::metrics::mean_distortion;
use crate::Matrix;
use tracing::info;

/// Mean distortion of one k-means fit in an elbow sweep.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ElbowPoint {
    pub k: usize,
    pub distortion: f64,
    pub status: ConvergenceStatus,
}

/// Fits `template` once per entry of `ks`, overriding only the number of
/// clusters, and reports the mean distortion of each fit.
pub fn elbow_curve(x: &Matrix, ks: &[usize], template: &KMeans) -> Result<Vec<ElbowPoint>> {
    if ks.is_empty() {
        return Err(ClusterError::invalid("need at least one value of k"));
    }

    let mut points = Vec::with_capacity(ks.len());
    for &k in ks {
        let mut model = template.clone().n_clusters(k);
        let result = model.fit(x)?;
        let distortion = mean_distortion(x, &result.centroids, &result.labels)?;
        info!(k, distortion, converged = result.is_converged(), "elbow point");

        points.push(ElbowPoint {
            k,
            distortion,
            status: result.status,
        });
    }

    Ok(points)
}
