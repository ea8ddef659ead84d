use crate::error::{ClusterError, Result};
use crate::metrics::{distortion, squared_euclidean};
use crate::Matrix;
use ndarray::{Array1, ArrayView1, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::rngs::StdRng;
use rand::SeedableRng;
use tracing::{debug, info, warn};

/// How a [`KMeans::fit`] run ended.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ConvergenceStatus {
    /// Every centroid moved by at most the tolerance in every dimension.
    Converged { iterations: usize },
    /// The iteration budget ran out first. The result still carries the
    /// last centroids and assignment.
    DidNotConverge { iterations: usize, max_shift: f64 },
}

impl ConvergenceStatus {
    pub fn is_converged(&self) -> bool {
        matches!(self, ConvergenceStatus::Converged { .. })
    }

    pub fn iterations(&self) -> usize {
        match *self {
            ConvergenceStatus::Converged { iterations } => iterations,
            ConvergenceStatus::DidNotConverge { iterations, .. } => iterations,
        }
    }
}

/// A cluster that received no members during an update step. Its previous
/// centroid was kept.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct DegenerateCluster {
    pub iteration: usize,
    pub cluster: usize,
}

/// Output of a single update step.
#[derive(Clone, Debug)]
pub struct CentroidUpdate {
    pub centroids: Matrix,
    /// Element-wise `|new - old|`, one row per cluster.
    pub shifts: Matrix,
    pub max_shift: f64,
    pub empty_clusters: Vec<usize>,
}

#[derive(Clone, Debug)]
pub struct KMeansResult {
    pub centroids: Matrix,
    pub labels: Array1<usize>,
    /// Distortion of the final assignment against the final centroids.
    pub inertia: f64,
    pub status: ConvergenceStatus,
    /// Distortion measured right after each assignment step.
    pub distortion_history: Vec<f64>,
    pub degenerate: Vec<DegenerateCluster>,
}

impl KMeansResult {
    pub fn is_converged(&self) -> bool {
        self.status.is_converged()
    }

    /// Row indices assigned to `cluster`.
    pub fn cluster_members(&self, cluster: usize) -> Vec<usize> {
        self.labels
            .iter()
            .enumerate()
            .filter(|&(_, &label)| label == cluster)
            .map(|(i, _)| i)
            .collect()
    }

    pub fn cluster_sizes(&self) -> Vec<usize> {
        let mut sizes = vec![0; self.centroids.nrows()];
        for &label in self.labels.iter() {
            sizes[label] += 1;
        }
        sizes
    }
}

/// Nearest-centroid partitioning with centroids seeded uniformly inside the
/// per-dimension bounding box of the data.
#[derive(Clone, Debug)]
pub struct KMeans {
    pub cluster_centers: Option<Matrix>,
    pub labels: Option<Array1<usize>>,
    pub inertia: Option<f64>,
    n_clusters: usize,
    max_iter: usize,
    tolerance: f64,
    random_state: Option<u64>,
    initial_centroids: Option<Matrix>,
}

impl KMeans {
    pub fn new(n_clusters: usize) -> Self {
        Self {
            cluster_centers: None,
            labels: None,
            inertia: None,
            n_clusters,
            max_iter: 300,
            tolerance: 1e-4,
            random_state: None,
            initial_centroids: None,
        }
    }

    pub fn n_clusters(mut self, n_clusters: usize) -> Self {
        self.n_clusters = n_clusters;
        self
    }

    pub fn max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    /// Largest per-dimension centroid movement still counted as converged.
    pub fn tolerance(mut self, tolerance: f64) -> Self {
        self.tolerance = tolerance;
        self
    }

    pub fn random_state(mut self, random_state: u64) -> Self {
        self.random_state = Some(random_state);
        self
    }

    /// Starts from the given `k x D` centroids instead of random ones.
    pub fn initial_centroids(mut self, centroids: Matrix) -> Self {
        self.initial_centroids = Some(centroids);
        self
    }

    pub fn get_n_clusters(&self) -> usize {
        self.n_clusters
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<KMeansResult> {
        self.validate(x)?;

        let result = if self.n_clusters == x.nrows() {
            // Every cluster non-empty forces one entity per cluster.
            debug!(n_clusters = self.n_clusters, "k equals sample count, using singletons");
            KMeansResult {
                centroids: x.clone(),
                labels: (0..x.nrows()).collect(),
                inertia: 0.0,
                status: ConvergenceStatus::Converged { iterations: 0 },
                distortion_history: Vec::new(),
                degenerate: Vec::new(),
            }
        } else {
            self.run(x)?
        };

        self.cluster_centers = Some(result.centroids.clone());
        self.labels = Some(result.labels.clone());
        self.inertia = Some(result.inertia);

        Ok(result)
    }

    pub fn fit_predict(&mut self, x: &Matrix) -> Result<Array1<usize>> {
        Ok(self.fit(x)?.labels)
    }

    /// Assigns rows of `x` to the fitted centroids.
    pub fn predict(&self, x: &Matrix) -> Result<Array1<usize>> {
        let centroids = self.cluster_centers.as_ref().ok_or(ClusterError::NotFitted)?;
        assign(x, centroids)
    }

    /// Squared distance from every row of `x` to every fitted centroid.
    pub fn transform(&self, x: &Matrix) -> Result<Matrix> {
        let centroids = self.cluster_centers.as_ref().ok_or(ClusterError::NotFitted)?;
        check_features(x, centroids)?;

        let mut distances = Matrix::zeros((x.nrows(), centroids.nrows()));
        for (i, row) in x.rows().into_iter().enumerate() {
            for (k, centroid) in centroids.rows().into_iter().enumerate() {
                distances[[i, k]] = squared_euclidean(&row, &centroid);
            }
        }

        Ok(distances)
    }

    fn run(&self, x: &Matrix) -> Result<KMeansResult> {
        let mut centroids = self.initialize_centroids(x)?;
        let mut labels = Array1::zeros(x.nrows());
        let mut distortion_history = Vec::new();
        let mut degenerate = Vec::new();
        let mut status = ConvergenceStatus::DidNotConverge {
            iterations: 0,
            max_shift: f64::INFINITY,
        };

        for iteration in 1..=self.max_iter {
            labels = assign(x, &centroids)?;
            let current = distortion(x, &centroids, &labels)?;
            distortion_history.push(current);

            let step = update(x, &labels, &centroids)?;
            for &cluster in &step.empty_clusters {
                warn!(iteration, cluster, "empty cluster, keeping previous centroid");
                degenerate.push(DegenerateCluster { iteration, cluster });
            }
            debug!(
                iteration,
                max_shift = step.max_shift,
                distortion = current,
                "k-means iteration"
            );

            centroids = step.centroids;
            if step.max_shift <= self.tolerance {
                status = ConvergenceStatus::Converged { iterations: iteration };
                break;
            }
            status = ConvergenceStatus::DidNotConverge {
                iterations: iteration,
                max_shift: step.max_shift,
            };
        }

        let inertia = distortion(x, &centroids, &labels)?;
        match status {
            ConvergenceStatus::Converged { iterations } => {
                info!(iterations, inertia, n_clusters = self.n_clusters, "k-means converged");
            }
            ConvergenceStatus::DidNotConverge { iterations, max_shift } => {
                warn!(
                    iterations,
                    max_shift,
                    tolerance = self.tolerance,
                    "k-means did not converge"
                );
            }
        }

        Ok(KMeansResult {
            centroids,
            labels,
            inertia,
            status,
            distortion_history,
            degenerate,
        })
    }

    fn validate(&self, x: &Matrix) -> Result<()> {
        if x.nrows() == 0 || x.ncols() == 0 {
            return Err(ClusterError::invalid(
                "input matrix must have at least one sample and one feature",
            ));
        }
        if self.n_clusters == 0 {
            return Err(ClusterError::invalid("n_clusters must be > 0"));
        }
        if x.nrows() < self.n_clusters {
            return Err(ClusterError::invalid(format!(
                "n_samples={} should be >= n_clusters={}",
                x.nrows(),
                self.n_clusters
            )));
        }
        if self.max_iter == 0 {
            return Err(ClusterError::invalid("max_iter must be > 0"));
        }
        if !(self.tolerance >= 0.0 && self.tolerance.is_finite()) {
            return Err(ClusterError::invalid(format!(
                "tolerance must be finite and >= 0, got {}",
                self.tolerance
            )));
        }
        if x.iter().any(|v| !v.is_finite()) {
            return Err(ClusterError::invalid("input contains non-finite values"));
        }
        if let Some(initial) = &self.initial_centroids {
            if initial.iter().any(|v| !v.is_finite()) {
                return Err(ClusterError::invalid("initial centroids contain non-finite values"));
            }
            if initial.nrows() != self.n_clusters || initial.ncols() != x.ncols() {
                return Err(ClusterError::invalid(format!(
                    "initial centroids have shape {:?}, expected [{}, {}]",
                    initial.shape(),
                    self.n_clusters,
                    x.ncols()
                )));
            }
        }
        Ok(())
    }

    fn initialize_centroids(&self, x: &Matrix) -> Result<Matrix> {
        if let Some(initial) = &self.initial_centroids {
            return Ok(initial.clone());
        }

        let mut rng = match self.random_state {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        // Each coordinate is drawn independently, so a centroid can start in
        // a region with no data nearby.
        let lower = x.fold_axis(Axis(0), f64::INFINITY, |&acc, &v| acc.min(v));
        let upper = x.fold_axis(Axis(0), f64::NEG_INFINITY, |&acc, &v| acc.max(v));

        let unit = Matrix::random_using(
            (self.n_clusters, x.ncols()),
            Uniform::new_inclusive(0.0, 1.0),
            &mut rng,
        );
        // Interpolate rather than scale the span, which overflows when the
        // bounds sit near opposite ends of the f64 range.
        let centroids = Matrix::from_shape_fn(unit.raw_dim(), |(k, d)| {
            let u = unit[[k, d]];
            lower[d] * (1.0 - u) + upper[d] * u
        });

        Ok(centroids)
    }
}

/// Index of the closest centroid for every row of `x`. Ties go to the
/// lowest centroid index.
pub fn assign(x: &Matrix, centroids: &Matrix) -> Result<Array1<usize>> {
    check_features(x, centroids)?;
    if centroids.nrows() == 0 {
        return Err(ClusterError::invalid("need at least one centroid"));
    }

    Ok(x.rows()
        .into_iter()
        .map(|row| nearest_centroid(&row, centroids))
        .collect())
}

/// Recomputes each centroid as the mean of its members. Clusters without
/// members keep their previous centroid and are listed in `empty_clusters`.
pub fn update(x: &Matrix, labels: &Array1<usize>, centroids: &Matrix) -> Result<CentroidUpdate> {
    check_features(x, centroids)?;
    if labels.len() != x.nrows() {
        return Err(ClusterError::invalid(format!(
            "labels length ({}) doesn't match number of samples ({})",
            labels.len(),
            x.nrows()
        )));
    }

    let k = centroids.nrows();
    let mut counts = vec![0usize; k];
    for &label in labels.iter() {
        if label >= k {
            return Err(ClusterError::invalid(format!(
                "label {} out of range for {} centroids",
                label, k
            )));
        }
        counts[label] += 1;
    }

    // Accumulating `row / count` keeps every partial sum within the range
    // of the members, so means of large finite values stay finite.
    let mut means = Matrix::zeros(centroids.raw_dim());
    for (row, &label) in x.rows().into_iter().zip(labels.iter()) {
        let mut mean = means.row_mut(label);
        mean.scaled_add(1.0 / counts[label] as f64, &row);
    }

    let mut next = centroids.clone();
    let mut empty_clusters = Vec::new();
    for (j, &count) in counts.iter().enumerate() {
        if count == 0 {
            empty_clusters.push(j);
        } else {
            next.row_mut(j).assign(&means.row(j));
        }
    }

    let shifts = (&next - centroids).mapv(f64::abs);
    // A NaN shift must never read as converged.
    let max_shift = shifts.iter().copied().fold(0.0, |acc: f64, shift| {
        if shift.is_nan() {
            f64::INFINITY
        } else {
            acc.max(shift)
        }
    });

    Ok(CentroidUpdate {
        centroids: next,
        shifts,
        max_shift,
        empty_clusters,
    })
}

fn nearest_centroid(row: &ArrayView1<f64>, centroids: &Matrix) -> usize {
    let mut min_distance = f64::INFINITY;
    let mut closest_cluster = 0;

    for (k, centroid) in centroids.rows().into_iter().enumerate() {
        let distance = squared_euclidean(row, &centroid);
        if distance < min_distance {
            min_distance = distance;
            closest_cluster = k;
        }
    }

    closest_cluster
}

fn check_features(x: &Matrix, centroids: &Matrix) -> Result<()> {
    if x.ncols() != centroids.ncols() {
        return Err(ClusterError::invalid(format!(
            "number of features in X ({}) doesn't match centroids ({})",
            x.ncols(),
            centroids.ncols()
        )));
    }
    Ok(())
}
