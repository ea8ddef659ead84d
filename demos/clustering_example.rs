use coexpress::{
    agglomerate, elbow_curve, normalize_rows, Dataset, Dendrogram, ExpressionFilter, KMeans,
};
use tracing_subscriber::EnvFilter;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    println!("=== Gene Expression Clustering ===\n");

    let raw = synthetic_time_course();
    println!(
        "Raw dataset: {} genes, {} time points",
        raw.n_samples(),
        raw.n_features()
    );

    // Drop silent and flat genes, then z-score each gene over time
    let filtered = ExpressionFilter::new().apply(&raw)?;
    let features = normalize_rows(&filtered.features)?;
    let data = Dataset::new(filtered.ids, features)?;
    println!("After filtering: {} genes\n", data.n_samples());

    println!("=== Elbow Sweep ===");
    let template = KMeans::new(1).random_state(42);
    let points = elbow_curve(&data.features, &[1, 2, 3, 4, 5, 6], &template)?;
    for point in &points {
        println!(
            "  k={}: mean distortion {:.4} ({} iterations)",
            point.k,
            point.distortion,
            point.status.iterations()
        );
    }

    println!("\n=== K-Means (k=3) ===");
    let result = KMeans::new(3).random_state(42).fit(&data.features)?;
    println!("  Status: {:?}", result.status);
    println!("  Inertia: {:.4}", result.inertia);
    println!("  Empty cluster events: {}", result.degenerate.len());
    for (cluster, size) in result.cluster_sizes().iter().enumerate() {
        let names: Vec<&str> = result
            .cluster_members(cluster)
            .iter()
            .map(|&i| data.ids[i].as_str())
            .collect();
        println!("    Cluster {}: {} genes {:?}", cluster, size, names);
    }

    println!("\n=== Agglomerative ===");
    let dendrogram = agglomerate(&data.features)?;
    println!(
        "  {} merges, {} nodes, root size {}",
        dendrogram.merges().len(),
        dendrogram.nodes().len(),
        dendrogram.root().size
    );
    for max_size in [2, 4, 8] {
        let labels = dendrogram.cut_by_size(max_size)?;
        println!(
            "  Components with at most {} genes: {:?}",
            max_size,
            Dendrogram::component_sizes(&labels)
        );
    }

    if let Some(entity) = data.index_of("early0") {
        let members: Vec<&str> = dendrogram
            .component_of(entity, 4)?
            .into_iter()
            .map(|i| data.ids[i].as_str())
            .collect();
        println!("  early0 sits with: {:?}", members);
    }

    Ok(())
}

/// Three response programs (early peak, late peak, steady decline) over
/// ten time points, plus two genes the filter should remove.
fn synthetic_time_course() -> Dataset {
    let mut ids = Vec::new();
    let mut rows = Vec::new();

    for i in 0..4 {
        let offset = i as f64 * 0.3;
        ids.push(format!("early{}", i));
        rows.push((0..10).map(|t| peak(t, 2.0) + offset).collect());
        ids.push(format!("late{}", i));
        rows.push((0..10).map(|t| peak(t, 7.0) + offset).collect());
        ids.push(format!("decline{}", i));
        rows.push((0..10).map(|t| 60.0 - 1.5 * t as f64 + offset).collect());
    }

    ids.push("silent".to_string());
    rows.push(vec![-500.0; 10]);
    ids.push("flat".to_string());
    rows.push(vec![55.0, 55.0, 55.0, 55.0, 55.0, 55.0, 55.0, 55.0, 55.0, 55.01]);

    Dataset::from_rows(ids, rows).expect("synthetic rows share one length")
}

/// Baseline expression with a Gaussian bump centred on `center`.
fn peak(t: usize, center: f64) -> f64 {
    50.0 + 10.0 * (-(t as f64 - center).powi(2) / 4.0).exp()
}
