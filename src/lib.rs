//! Clustering engines for gene-expression time series.
//!
//! Each entity (gene) is one row of a [`Matrix`]; its columns are the ordered
//! time points. Two independent strategies are provided over that shape:
//!
//! - [`KMeans`]: iterative nearest-centroid partitioning into `k` clusters.
//! - [`Agglomerative`]: bottom-up merging into a [`Dendrogram`] that records
//!   every merge product and its ancestry.
//!
//! [`preprocessing`] holds the filtering and per-entity normalization the
//! engines expect to have been applied to their input.

pub use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

pub mod cluster;
pub mod dataset;
pub mod error;
pub mod metrics;
pub mod preprocessing;

pub use cluster::{
    agglomerate, assign, elbow_curve, update, Agglomerative, CentroidUpdate, ClusterNode,
    ConvergenceStatus, DegenerateCluster, Dendrogram, ElbowPoint, KMeans, KMeansResult, Merge,
};
pub use dataset::Dataset;
pub use error::{ClusterError, Result};
pub use preprocessing::{normalize_rows, ExpressionFilter, RowNormalizer};

/// One feature vector, or one centroid.
pub type Vector = Array1<f64>;
/// Feature vectors stacked one entity per row.
pub type Matrix = Array2<f64>;
