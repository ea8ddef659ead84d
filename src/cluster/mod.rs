//! Clustering engines for expression vectors.
//!
//! This module provides two independent strategies over the same input
//! shape (one row per entity):
//! - `KMeans`: partitional clustering using iteratively refined centroids
//! - `Agglomerative`: hierarchical clustering recorded as a `Dendrogram`
//!
//! # Examples
//!
//! ## K-Means Clustering
//! ```rust
//! use coexpress::{KMeans, Matrix};
//! use ndarray::array;
//!
//! let x: Matrix = array![
//!     [1.0, 1.0],
//!     [1.5, 2.0],
//!     [3.0, 4.0],
//!     [5.0, 7.0],
//!     [3.5, 5.0],
//!     [4.5, 5.0]
//! ];
//!
//! let mut kmeans = KMeans::new(2).max_iter(100).random_state(42);
//! let result = kmeans.fit(&x).unwrap();
//!
//! println!("Cluster centers: {:?}", result.centroids);
//! println!("Converged: {}", result.is_converged());
//! println!("Inertia: {:.4}", result.inertia);
//! ```
//!
//! ## Agglomerative Clustering
//! ```rust
//! use coexpress::{agglomerate, Dendrogram, Matrix};
//! use ndarray::array;
//!
//! let x: Matrix = array![[0.0], [1.0], [9.0], [10.0]];
//!
//! let dendrogram = agglomerate(&x).unwrap();
//! assert_eq!(dendrogram.nodes().len(), 7);
//!
//! // Undo merges that produced components larger than two entities.
//! let labels = dendrogram.cut_by_size(2).unwrap();
//! assert_eq!(Dendrogram::component_sizes(&labels), vec![2, 2]);
//! ```

mod agglomerative;
mod elbow;
mod kmeans;

pub use agglomerative::{agglomerate, Agglomerative, ClusterNode, Dendrogram, Merge};
pub use elbow::{elbow_curve, ElbowPoint};
pub use kmeans::{
    assign, update, CentroidUpdate, ConvergenceStatus, DegenerateCluster, KMeans, KMeansResult,
};
