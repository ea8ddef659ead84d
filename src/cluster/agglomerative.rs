use crate::error::{ClusterError, Result};
use crate::metrics::squared_euclidean;
use crate::{Matrix, Vector};
use ndarray::Array1;
use std::collections::HashMap;
use tracing::{debug, trace};

/// One entry of the dendrogram: either an original entity or the product of
/// merging two earlier nodes.
#[derive(Clone, Debug, PartialEq)]
pub struct ClusterNode {
    /// Own coordinates for originals, size-weighted centroid for merges.
    pub centroid: Vector,
    /// Still eligible for merging. Never set back once cleared.
    pub active: bool,
    /// Number of original entities under this node.
    pub size: usize,
    /// The two merged node ids, `None` for originals.
    pub children: Option<(usize, usize)>,
    /// Last recorded nearest active node. May be stale.
    pub nearest: Option<usize>,
    /// Squared distance to `nearest`.
    pub distance: f64,
}

impl ClusterNode {
    fn original(centroid: Vector) -> Self {
        Self {
            centroid,
            active: true,
            size: 1,
            children: None,
            nearest: None,
            distance: f64::INFINITY,
        }
    }

    pub fn is_original(&self) -> bool {
        self.children.is_none()
    }
}

/// A single merge step, in the order it happened.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Merge {
    pub left: usize,
    pub right: usize,
    /// Id of the node the merge produced.
    pub node: usize,
    /// Recorded squared distance between the two merged nodes.
    pub distance: f64,
    pub size: usize,
}

/// Full merge history of an agglomerative run.
///
/// Node ids `0..n_leaves` are the input rows; each following id is one merge
/// product, so the last node is the root.
#[derive(Clone, Debug)]
pub struct Dendrogram {
    nodes: Vec<ClusterNode>,
    merges: Vec<Merge>,
    n_leaves: usize,
}

impl Dendrogram {
    pub fn nodes(&self) -> &[ClusterNode] {
        &self.nodes
    }

    pub fn node(&self, id: usize) -> Option<&ClusterNode> {
        self.nodes.get(id)
    }

    pub fn merges(&self) -> &[Merge] {
        &self.merges
    }

    pub fn n_leaves(&self) -> usize {
        self.n_leaves
    }

    pub fn root(&self) -> &ClusterNode {
        // Construction guarantees at least one merge.
        &self.nodes[self.nodes.len() - 1]
    }

    /// Original entities under `node`, in ascending order.
    pub fn leaves(&self, node: usize) -> Result<Vec<usize>> {
        if node >= self.nodes.len() {
            return Err(ClusterError::invalid(format!(
                "node {} out of range for {} nodes",
                node,
                self.nodes.len()
            )));
        }

        let mut leaves = Vec::new();
        let mut stack = vec![node];
        while let Some(id) = stack.pop() {
            match self.nodes[id].children {
                Some((left, right)) => {
                    stack.push(left);
                    stack.push(right);
                }
                None => leaves.push(id),
            }
        }
        leaves.sort_unstable();
        Ok(leaves)
    }

    /// Component labels after undoing the last merges until `n_clusters`
    /// components remain. Labels are numbered by first appearance.
    pub fn cut(&self, n_clusters: usize) -> Result<Array1<usize>> {
        if n_clusters == 0 || n_clusters > self.n_leaves {
            return Err(ClusterError::invalid(format!(
                "n_clusters must be in 1..={}, got {}",
                self.n_leaves, n_clusters
            )));
        }

        let last_kept = self.n_leaves + (self.n_leaves - n_clusters);
        Ok(self.labels_where(|id, _| id < last_kept))
    }

    /// Component labels keeping only merges whose product holds at most
    /// `max_size` entities.
    pub fn cut_by_size(&self, max_size: usize) -> Result<Array1<usize>> {
        if max_size == 0 {
            return Err(ClusterError::invalid("max_size must be > 0"));
        }
        Ok(self.labels_where(|_, node| node.size <= max_size))
    }

    /// Members of the component containing `entity` under a size cut.
    pub fn component_of(&self, entity: usize, max_size: usize) -> Result<Vec<usize>> {
        if entity >= self.n_leaves {
            return Err(ClusterError::invalid(format!(
                "entity {} out of range for {} entities",
                entity, self.n_leaves
            )));
        }
        if max_size == 0 {
            return Err(ClusterError::invalid("max_size must be > 0"));
        }

        let parents = self.parents();
        let top = self.climb(&parents, entity, |_, node| node.size <= max_size);
        self.leaves(top)
    }

    /// Number of entities carrying each label.
    pub fn component_sizes(labels: &Array1<usize>) -> Vec<usize> {
        let n_components = labels.iter().max().map_or(0, |&max| max + 1);
        let mut sizes = vec![0; n_components];
        for &label in labels.iter() {
            sizes[label] += 1;
        }
        sizes
    }

    fn parents(&self) -> Vec<Option<usize>> {
        let mut parents = vec![None; self.nodes.len()];
        for (id, node) in self.nodes.iter().enumerate() {
            if let Some((left, right)) = node.children {
                parents[left] = Some(id);
                parents[right] = Some(id);
            }
        }
        parents
    }

    fn climb<F>(&self, parents: &[Option<usize>], leaf: usize, keep: F) -> usize
    where
        F: Fn(usize, &ClusterNode) -> bool,
    {
        let mut top = leaf;
        while let Some(parent) = parents[top] {
            if !keep(parent, &self.nodes[parent]) {
                break;
            }
            top = parent;
        }
        top
    }

    fn labels_where<F>(&self, keep: F) -> Array1<usize>
    where
        F: Fn(usize, &ClusterNode) -> bool,
    {
        let parents = self.parents();
        let mut roots: HashMap<usize, usize> = HashMap::new();

        (0..self.n_leaves)
            .map(|leaf| {
                let top = self.climb(&parents, leaf, &keep);
                let next = roots.len();
                *roots.entry(top).or_insert(next)
            })
            .collect()
    }
}

/// Bottom-up clustering that repeatedly merges the closest pair of active
/// nodes into their size-weighted centroid.
///
/// Nearest neighbours are maintained lazily: after a merge only distances to
/// the new node are compared against what each active node has on record, so
/// a node can keep pointing at a neighbour that has since been merged away.
/// A stale record is refreshed only when that node is picked as the closest.
/// The result is an approximation of exact centroid linkage and merge
/// distances are not guaranteed to be monotone.
#[derive(Clone, Debug, Default)]
pub struct Agglomerative {
    pub dendrogram: Option<Dendrogram>,
}

impl Agglomerative {
    pub fn new() -> Self {
        Self { dendrogram: None }
    }

    pub fn fit(&mut self, x: &Matrix) -> Result<&Dendrogram> {
        let dendrogram = agglomerate(x)?;
        Ok(self.dendrogram.insert(dendrogram))
    }

    /// Fits and returns labels for `n_clusters` components.
    pub fn fit_predict(&mut self, x: &Matrix, n_clusters: usize) -> Result<Array1<usize>> {
        self.fit(x)?.cut(n_clusters)
    }
}

/// Runs the full N-1 merges over the rows of `x`.
pub fn agglomerate(x: &Matrix) -> Result<Dendrogram> {
    let n = x.nrows();
    if n < 2 {
        return Err(ClusterError::invalid(format!(
            "agglomeration needs at least 2 samples, got {}",
            n
        )));
    }
    if x.ncols() == 0 {
        return Err(ClusterError::invalid("feature vectors must have at least one dimension"));
    }
    if x.iter().any(|v| !v.is_finite()) {
        return Err(ClusterError::invalid("input contains non-finite values"));
    }

    let mut nodes: Vec<ClusterNode> = Vec::with_capacity(2 * n - 1);
    nodes.extend(x.rows().into_iter().map(|row| ClusterNode::original(row.to_owned())));
    for i in 0..n {
        refresh_nearest(&mut nodes, i);
    }

    let mut merges = Vec::with_capacity(n - 1);
    for _ in 0..n - 1 {
        let (left, right) = closest_pair(&mut nodes)?;
        let distance = nodes[left].distance;
        nodes[left].active = false;
        nodes[right].active = false;

        let (size_left, size_right) = (nodes[left].size, nodes[right].size);
        let size = size_left + size_right;
        let centroid = (&nodes[left].centroid * size_left as f64
            + &nodes[right].centroid * size_right as f64)
            / size as f64;

        let id = nodes.len();
        nodes.push(ClusterNode {
            centroid,
            active: true,
            size,
            children: Some((left, right)),
            nearest: None,
            distance: f64::INFINITY,
        });

        for j in 0..id {
            if !nodes[j].active {
                continue;
            }
            let d = squared_euclidean(&nodes[id].centroid.view(), &nodes[j].centroid.view());
            if nodes[id].nearest.is_none() || d < nodes[id].distance {
                nodes[id].distance = d;
                nodes[id].nearest = Some(j);
            }
            if d < nodes[j].distance {
                nodes[j].distance = d;
                nodes[j].nearest = Some(id);
            }
        }

        trace!(left, right, node = id, size, distance, "merged");
        merges.push(Merge {
            left,
            right,
            node: id,
            distance,
            size,
        });
    }

    debug!(n_leaves = n, n_nodes = nodes.len(), "agglomeration finished");

    Ok(Dendrogram {
        nodes,
        merges,
        n_leaves: n,
    })
}

/// Recomputes `nearest`/`distance` of node `i` over the other active nodes.
/// Ties go to the lowest index. The first candidate is always taken, so a
/// distance that overflowed to infinity still yields a neighbour.
fn refresh_nearest(nodes: &mut [ClusterNode], i: usize) {
    let mut nearest = None;
    let mut min_distance = f64::INFINITY;

    for (j, other) in nodes.iter().enumerate() {
        if j == i || !other.active {
            continue;
        }
        let d = squared_euclidean(&nodes[i].centroid.view(), &other.centroid.view());
        if nearest.is_none() || d < min_distance {
            min_distance = d;
            nearest = Some(j);
        }
    }

    nodes[i].nearest = nearest;
    nodes[i].distance = min_distance;
}

/// The active node with the smallest recorded distance, paired with its
/// recorded nearest neighbour. A stale record is refreshed and the scan
/// repeated.
fn closest_pair(nodes: &mut [ClusterNode]) -> Result<(usize, usize)> {
    loop {
        let mut closest: Option<usize> = None;
        for (i, node) in nodes.iter().enumerate() {
            if !node.active {
                continue;
            }
            match closest {
                Some(c) if node.distance >= nodes[c].distance => {}
                _ => closest = Some(i),
            }
        }

        let i = closest.ok_or_else(|| ClusterError::invalid("no active nodes left to merge"))?;
        let nearest = nodes[i].nearest;
        match nearest {
            Some(j) if nodes[j].active => return Ok((i, j)),
            _ => refresh_nearest(nodes, i),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn test_four_points_merge_order() {
        let x = array![[0.0], [1.0], [9.0], [10.0]];
        let dendrogram = agglomerate(&x).unwrap();

        let merges = dendrogram.merges();
        assert_eq!(merges.len(), 3);
        assert_eq!((merges[0].left, merges[0].right, merges[0].node), (0, 1, 4));
        assert_eq!((merges[1].left, merges[1].right, merges[1].node), (2, 3, 5));
        assert_eq!((merges[2].left, merges[2].right, merges[2].node), (4, 5, 6));
        assert_abs_diff_eq!(merges[0].distance, 1.0);
        assert_abs_diff_eq!(merges[1].distance, 1.0);
        assert_abs_diff_eq!(merges[2].distance, 81.0);

        assert_abs_diff_eq!(dendrogram.nodes()[4].centroid[0], 0.5);
        assert_abs_diff_eq!(dendrogram.nodes()[5].centroid[0], 9.5);
        assert_abs_diff_eq!(dendrogram.root().centroid[0], 5.0);
        assert_eq!(dendrogram.root().size, 4);
    }

    #[test]
    fn test_node_table_shape() {
        let x = array![
            [0.3, 1.2],
            [2.5, -0.4],
            [1.1, 1.0],
            [-3.0, 0.5],
            [0.0, 0.0],
            [4.2, 4.0],
            [3.9, 4.4],
            [-2.7, 0.8],
            [1.0, -1.0],
            [0.2, 0.3]
        ];
        let n = x.nrows();
        let dendrogram = agglomerate(&x).unwrap();

        assert_eq!(dendrogram.merges().len(), n - 1);
        assert_eq!(dendrogram.nodes().len(), 2 * n - 1);
        assert_eq!(dendrogram.root().size, n);
        assert_eq!(dendrogram.nodes().iter().filter(|node| node.active).count(), 1);
        assert!(dendrogram.root().active);

        for (id, node) in dendrogram.nodes().iter().enumerate() {
            assert_eq!(node.is_original(), id < n);
            if let Some((left, right)) = node.children {
                let (l, r) = (&dendrogram.nodes()[left], &dendrogram.nodes()[right]);
                assert!(!l.active && !r.active);
                assert_eq!(node.size, l.size + r.size);
                assert!(left < id && right < id);
            }
        }
        assert_eq!(dendrogram.leaves(2 * n - 2).unwrap(), (0..n).collect::<Vec<_>>());
    }

    #[test]
    fn test_size_weighted_centroid() {
        let x = array![[0.0], [0.1], [3.0]];
        let dendrogram = agglomerate(&x).unwrap();

        // (0, 1) merge first, then the pair joins 3.0 with weights 2:1.
        let expected = (2.0 * 0.05 + 3.0) / 3.0;
        assert_abs_diff_eq!(dendrogram.root().centroid[0], expected, epsilon = 1e-12);
    }

    #[test]
    fn test_cuts() {
        let x = array![[0.0], [1.0], [9.0], [10.0]];
        let dendrogram = agglomerate(&x).unwrap();

        assert_eq!(dendrogram.cut(1).unwrap(), array![0, 0, 0, 0]);
        assert_eq!(dendrogram.cut(2).unwrap(), array![0, 0, 1, 1]);
        assert_eq!(dendrogram.cut(3).unwrap(), array![0, 0, 1, 2]);
        assert_eq!(dendrogram.cut(4).unwrap(), array![0, 1, 2, 3]);
        assert!(dendrogram.cut(0).is_err());
        assert!(dendrogram.cut(5).is_err());

        let by_size = dendrogram.cut_by_size(2).unwrap();
        assert_eq!(by_size, array![0, 0, 1, 1]);
        assert_eq!(Dendrogram::component_sizes(&by_size), vec![2, 2]);
        assert_eq!(dendrogram.cut_by_size(1).unwrap(), array![0, 1, 2, 3]);

        assert_eq!(dendrogram.component_of(3, 2).unwrap(), vec![2, 3]);
        assert_eq!(dendrogram.component_of(0, 4).unwrap(), vec![0, 1, 2, 3]);
        assert_eq!(dendrogram.component_of(1, 1).unwrap(), vec![1]);
        assert!(dendrogram.component_of(4, 2).is_err());
    }

    #[test]
    fn test_estimator_fit_predict() {
        let x = array![[0.0, 0.0], [0.2, 0.1], [5.0, 5.0], [5.1, 4.9], [5.2, 5.2]];
        let mut model = Agglomerative::new();

        let labels = model.fit_predict(&x, 2).unwrap();
        assert_eq!(labels, array![0, 0, 1, 1, 1]);
        assert!(model.dendrogram.is_some());
    }

    #[test]
    fn test_too_few_samples() {
        assert!(matches!(
            agglomerate(&array![[1.0, 2.0]]),
            Err(ClusterError::InvalidParameter(_))
        ));
        assert!(agglomerate(&Matrix::zeros((0, 3))).is_err());
        assert!(agglomerate(&Matrix::zeros((3, 0))).is_err());
    }

    #[test]
    fn test_seed_tie_goes_to_lowest_index() {
        let x = array![[0.0], [1.0], [2.0]];
        let dendrogram = agglomerate(&x).unwrap();

        // Node 1 is equally far from 0 and 2.
        assert_eq!(dendrogram.nodes()[1].nearest, Some(0));
        let first = dendrogram.merges()[0];
        assert_eq!((first.left, first.right, first.node), (0, 1, 3));
        assert_abs_diff_eq!(first.distance, 1.0);
        assert_eq!(first.size, 2);
    }

    #[test]
    fn test_overflowing_distances_still_merge() {
        let x = array![[0.0], [1e155], [3e155]];
        let dendrogram = agglomerate(&x).unwrap();

        assert_eq!(dendrogram.merges().len(), 2);
        assert_eq!(dendrogram.nodes().len(), 5);
        assert_eq!(dendrogram.root().size, 3);
        assert!(dendrogram.root().centroid.iter().all(|v| v.is_finite()));
        assert!(dendrogram.nodes()[..3].iter().all(|node| node.nearest.is_some()));
    }

    #[test]
    fn test_identical_points() {
        let x = array![[1.0], [1.0], [1.0]];
        let dendrogram = agglomerate(&x).unwrap();

        assert_eq!(dendrogram.nodes().len(), 5);
        assert_eq!(dendrogram.root().size, 3);
        assert!(dendrogram.merges().iter().all(|m| m.distance == 0.0));
    }
}
