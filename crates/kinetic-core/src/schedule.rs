//! Precomputed training schedules.
//!
//! All schedules are plain arrays built once before training: per-step
//! values are looked up by absolute iteration index, so a run restored at
//! an epoch boundary resumes with exactly the same values.

/// Evenly spaced values from `start` to `end` inclusive.
fn linspace(start: f64, end: f64, steps: usize) -> Vec<f64> {
    match steps {
        0 => Vec::new(),
        1 => vec![start],
        _ => (0..steps)
            .map(|i| start + (end - start) * i as f64 / (steps - 1) as f64)
            .collect(),
    }
}

/// Per-step cosine schedule with an optional linear warmup.
///
/// The first `warmup_epochs` epochs ramp linearly from `start_warmup_value`
/// to `base_value`; the remaining steps decay to `final_value` along a half
/// cosine. The returned array has `epochs * steps_per_epoch` entries.
pub fn cosine_schedule(
    base_value: f64,
    final_value: f64,
    epochs: usize,
    steps_per_epoch: usize,
    warmup_epochs: usize,
    start_warmup_value: f64,
) -> Vec<f64> {
    let total = epochs * steps_per_epoch;
    let warmup = (warmup_epochs * steps_per_epoch).min(total);

    let mut schedule = linspace(start_warmup_value, base_value, warmup);
    let decay_steps = total - warmup;
    for i in 0..decay_steps {
        let cos = (std::f64::consts::PI * i as f64 / decay_steps as f64).cos();
        schedule.push(final_value + 0.5 * (base_value - final_value) * (1.0 + cos));
    }
    schedule
}

/// Per-epoch teacher temperature: linear warmup from `warmup_temp` to
/// `temp` over `warmup_epochs`, constant afterwards. Read-only after
/// construction.
pub fn teacher_temp_schedule(
    warmup_temp: f64,
    temp: f64,
    warmup_epochs: usize,
    epochs: usize,
) -> Vec<f64> {
    let warmup = warmup_epochs.min(epochs);
    let mut schedule = linspace(warmup_temp, temp, warmup);
    schedule.resize(epochs, temp);
    schedule
}
