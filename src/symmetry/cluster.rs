//! Average-linkage agglomerative clustering.

/// Cluster `n` items given their pairwise distances, merging the closest
/// clusters while their average distance stays within `threshold`.
///
/// `dist` must be a full symmetric `n x n` matrix. Clusters are returned with
/// sorted members, ordered by their smallest member.
pub fn average_linkage(dist: &[Vec<f64>], threshold: f64) -> Vec<Vec<usize>> {
    let n = dist.len();
    let mut clusters: Vec<Vec<usize>> = (0..n).map(|i| vec![i]).collect();
    let mut d: Vec<Vec<f64>> = dist.to_vec();

    while clusters.len() > 1 {
        let mut best: Option<(usize, usize, f64)> = None;
        for i in 0..clusters.len() {
            for j in i + 1..clusters.len() {
                if best.map_or(true, |(_, _, b)| d[i][j] < b) {
                    best = Some((i, j, d[i][j]));
                }
            }
        }
        let Some((i, j, closest)) = best else {
            break;
        };
        if closest > threshold {
            break;
        }

        // Lance-Williams update for average linkage
        let (n_i, n_j) = (clusters[i].len() as f64, clusters[j].len() as f64);
        for k in 0..clusters.len() {
            if k == i || k == j {
                continue;
            }
            let merged = (n_i * d[i][k] + n_j * d[j][k]) / (n_i + n_j);
            d[i][k] = merged;
            d[k][i] = merged;
        }
        let moved = clusters.remove(j);
        clusters[i].extend(moved);
        d.remove(j);
        for row in d.iter_mut() {
            row.remove(j);
        }
    }

    for c in clusters.iter_mut() {
        c.sort_unstable();
    }
    clusters.sort_by_key(|c| c[0]);
    clusters
}
