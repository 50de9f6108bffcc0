//! Threshold-based label selection

use modgate_core::ScorePair;

/// Pick the labels whose score is at least `threshold`.
///
/// `pairs` must already be sorted by descending score. Order is preserved.
/// When nothing clears the threshold the top pair is returned on its own, so
/// a non-empty input always yields at least one label. A threshold of 0
/// selects every pair.
pub fn select_labels(pairs: &[ScorePair], threshold: f32) -> Vec<ScorePair> {
    let picked: Vec<ScorePair> = pairs
        .iter()
        .filter(|pair| pair.score >= threshold)
        .cloned()
        .collect();

    if picked.is_empty() {
        pairs.first().cloned().into_iter().collect()
    } else {
        picked
    }
}
