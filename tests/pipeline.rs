use approx::assert_abs_diff_eq;
use coexpress::{
    agglomerate, elbow_curve, normalize_rows, Dataset, Dendrogram, ExpressionFilter, KMeans,
};
use ndarray::Axis;

/// Two expression programs (rising and falling) plus one silent gene.
fn raw_dataset() -> Dataset {
    let mut ids = Vec::new();
    let mut rows = Vec::new();
    for i in 0..6 {
        let scale = 1.0 + i as f64 * 0.1;
        ids.push(format!("up{}", i));
        rows.push((0..8).map(|t| 20.0 + scale * t as f64).collect());
        ids.push(format!("down{}", i));
        rows.push((0..8).map(|t| 20.0 - scale * t as f64 + 8.0).collect());
    }
    ids.push("silent".to_string());
    rows.push(vec![-400.0, -401.0, -399.0, -400.0, -402.0, -398.0, -400.0, -401.0]);

    Dataset::from_rows(ids, rows).unwrap()
}

fn prepared() -> Dataset {
    let filtered = ExpressionFilter::new().apply(&raw_dataset()).unwrap();
    let features = normalize_rows(&filtered.features).unwrap();
    Dataset::new(filtered.ids, features).unwrap()
}

#[test]
fn filter_drops_silent_gene() {
    let data = prepared();
    assert_eq!(data.n_samples(), 12);
    assert!(data.index_of("silent").is_none());
}

#[test]
fn kmeans_separates_programs() {
    let data = prepared();
    // Seed from one gene of each program so neither cluster starts empty.
    let seeds = data.features.select(Axis(0), &[0, 1]);
    let result = KMeans::new(2)
        .initial_centroids(seeds)
        .fit(&data.features)
        .unwrap();
    assert!(result.is_converged());

    let labels = data.label_map(&result.labels).unwrap();
    for i in 0..6 {
        assert_eq!(labels[&format!("up{}", i)], labels["up0"]);
        assert_eq!(labels[&format!("down{}", i)], labels["down0"]);
    }
    assert_ne!(labels["up0"], labels["down0"]);
    assert_eq!(result.cluster_sizes(), vec![6, 6]);
}

#[test]
fn agglomerative_separates_programs() {
    let data = prepared();
    let dendrogram = agglomerate(&data.features).unwrap();

    assert_eq!(dendrogram.nodes().len(), 2 * data.n_samples() - 1);
    assert_eq!(dendrogram.root().size, data.n_samples());

    let labels = dendrogram.cut_by_size(6).unwrap();
    assert_eq!(Dendrogram::component_sizes(&labels), vec![6, 6]);

    let up0 = data.index_of("up0").unwrap();
    let members: Vec<String> = dendrogram
        .component_of(up0, 6)
        .unwrap()
        .into_iter()
        .map(|i| data.ids[i].clone())
        .collect();
    assert!(members.iter().all(|id| id.starts_with("up")));
}

#[test]
fn elbow_distortion_never_rises() {
    let data = prepared();
    let n = data.n_samples();
    let points = elbow_curve(&data.features, &[1, 2, n], &KMeans::new(1).random_state(3)).unwrap();

    // Rising and falling ramps z-score to opposite vectors, so the grand mean
    // is the origin and each gene sits at squared distance n_points - 1.
    assert_abs_diff_eq!(points[0].distortion, 7.0, epsilon = 1e-9);
    assert!(points[1].distortion <= points[0].distortion + 1e-9);
    assert_abs_diff_eq!(points[2].distortion, 0.0);
}
