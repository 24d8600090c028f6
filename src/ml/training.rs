use crate::error::{AppError, Result};
use crate::ml::models::{RiskSample, TrainingDataset};
use crate::ml::sla::{Priority, SlaPolicy};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::Rng;

const MIN_OPEN_HOURS: f64 = 0.1;

/// Generate labeled tickets from the SLA table.
///
/// A `near_deadline_ratio` share is drawn from 0.7..1.5 × SLA so both sides
/// of the deadline are well represented; the rest stay well inside it,
/// starting at 0.1 h or 0.4 × SLA for windows too short for that floor.
/// A ticket is breached once its open time reaches the SLA.
pub fn generate_synthetic_samples(
    policy: &SlaPolicy,
    categories: &[String],
    n_samples: usize,
    near_deadline_ratio: f64,
    rng: &mut StdRng,
) -> Result<Vec<RiskSample>> {
    if categories.is_empty() {
        return Err(AppError::Configuration(
            "At least one ticket category is required for training".to_string(),
        ));
    }
    if n_samples == 0 {
        return Err(AppError::Configuration(
            "synthetic_samples must be positive".to_string(),
        ));
    }
    let near_deadline_ratio = near_deadline_ratio.clamp(0.0, 1.0);

    let samples = (0..n_samples)
        .map(|_| {
            let priority = Priority::ALL[rng.gen_range(0..Priority::ALL.len())];
            let category = categories[rng.gen_range(0..categories.len())].clone();
            let sla = policy.max_open_hours(priority);

            let open_time_hours = if rng.gen_bool(near_deadline_ratio) {
                rng.gen_range(0.7 * sla..1.5 * sla)
            } else {
                rng.gen_range(MIN_OPEN_HOURS.min(0.4 * sla)..0.8 * sla)
            };

            RiskSample {
                priority,
                category,
                open_time_hours,
                breached: open_time_hours >= sla,
            }
        })
        .collect();

    Ok(samples)
}

/// Oversample the minority class until both classes have equal counts
pub fn balance_classes(dataset: &TrainingDataset, rng: &mut StdRng) -> Result<TrainingDataset> {
    let (negatives, positives): (Vec<usize>, Vec<usize>) =
        (0..dataset.n_samples).partition(|&i| dataset.labels[i] == 0);

    if negatives.is_empty() || positives.is_empty() {
        return Err(AppError::Training(format!(
            "Cannot balance a single-class dataset ({} negative, {} positive)",
            negatives.len(),
            positives.len()
        )));
    }

    let (majority, minority) = if negatives.len() >= positives.len() {
        (negatives, positives)
    } else {
        (positives, negatives)
    };

    let mut rows = Vec::with_capacity(majority.len() * 2);
    rows.extend_from_slice(&majority);
    rows.extend_from_slice(&minority);
    for _ in minority.len()..majority.len() {
        rows.push(minority[rng.gen_range(0..minority.len())]);
    }
    rows.shuffle(rng);

    tracing::debug!(
        original = dataset.n_samples,
        balanced = rows.len(),
        "Balanced risk training classes"
    );

    Ok(dataset.select(&rows))
}
