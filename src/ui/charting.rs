use tock::level::{LevelId, LevelResult};
use tock::util::mean;

/// Best score per level, in play order, for the levels that were attempted.
pub fn level_bars(results: &[LevelResult]) -> Vec<(&'static str, u64)> {
    LevelId::ORDER
        .iter()
        .filter_map(|id| {
            results
                .iter()
                .filter(|r| r.id == *id)
                .map(|r| r.score as u64)
                .max()
                .map(|best| (bar_label(*id), best))
        })
        .collect()
}

fn bar_label(id: LevelId) -> &'static str {
    match id {
        LevelId::Lamp => "lamp",
        LevelId::Runner => "runner",
        LevelId::Pulse => "pulse",
    }
}

/// Mean points per round over every recorded attempt.
pub fn points_per_round(results: &[LevelResult]) -> Option<f64> {
    let per_attempt: Vec<f64> = results
        .iter()
        .filter(|r| r.completed > 0)
        .map(|r| r.score as f64 / r.completed as f64)
        .collect();
    mean(&per_attempt)
}
