use crate::features::DescriptorSet;

/// A correspondence between descriptor `query_idx` of the first frame and
/// descriptor `train_idx` of the second, with the metric distance.
#[derive(Debug, Clone, Copy)]
pub struct Match {
    pub query_idx: usize,
    pub train_idx: usize,
    pub distance: f32,
}

fn hamming(a: &[u8; 32], b: &[u8; 32]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x ^ y).count_ones())
        .sum::<u32>() as f32
}

#[cfg(feature = "gradient-descriptor")]
fn euclidean(a: &[f32; 128], b: &[f32; 128]) -> f32 {
    a.iter()
        .zip(b)
        .map(|(x, y)| (x - y) * (x - y))
        .sum::<f32>()
        .sqrt()
}

fn argmin_distance<T>(from: &T, candidates: &[T], dist: &impl Fn(&T, &T) -> f32) -> (usize, f32) {
    let mut best = (0usize, f32::INFINITY);
    for (j, c) in candidates.iter().enumerate() {
        let d = dist(from, c);
        if d < best.1 {
            best = (j, d);
        }
    }
    best
}

fn cross_check<T>(query: &[T], train: &[T], dist: impl Fn(&T, &T) -> f32) -> Vec<Match> {
    let forward: Vec<(usize, f32)> = query
        .iter()
        .map(|q| argmin_distance(q, train, &dist))
        .collect();
    let backward: Vec<usize> = train
        .iter()
        .map(|t| argmin_distance(t, query, &|a, b| dist(b, a)).0)
        .collect();

    let mut matches: Vec<Match> = forward
        .iter()
        .enumerate()
        .filter(|&(i, &(j, _))| backward[j] == i)
        .map(|(i, &(j, d))| Match {
            query_idx: i,
            train_idx: j,
            distance: d,
        })
        .collect();
    matches.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then(a.query_idx.cmp(&b.query_idx))
    });
    matches
}

/// Brute-force matching with mutual-consistency filtering ("cross-check"):
/// a pair survives only when each descriptor is the other's best match.
/// The metric follows the descriptor type (Hamming for binary, Euclidean
/// for float); an empty input on either side yields an empty result.
pub fn match_descriptors(query: &DescriptorSet, train: &DescriptorSet) -> Vec<Match> {
    if query.is_empty() || train.is_empty() {
        return Vec::new();
    }
    match (query, train) {
        (DescriptorSet::Binary(q), DescriptorSet::Binary(t)) => {
            cross_check(q, t, |a, b| hamming(a, b))
        }
        #[cfg(feature = "gradient-descriptor")]
        (DescriptorSet::Float(q), DescriptorSet::Float(t)) => {
            cross_check(q, t, |a, b| euclidean(a, b))
        }
        #[cfg(feature = "gradient-descriptor")]
        (q, t) => {
            log::warn!(
                "descriptor type mismatch ({:?} vs {:?}), no matches",
                q.metric(),
                t.metric()
            );
            Vec::new()
        }
    }
}
