//! Depth resolution and the random subsampling of one sample.
//!
//! A sample is a population of `total_depth` reads in which every clone
//! contributes `read_count` indistinguishable reads. Drawing `d` reads
//! uniformly without replacement is a multivariate hypergeometric draw over
//! the clones. It is computed as a chain of conditional univariate
//! hypergeometric draws, each sampled exactly by inverting its distribution
//! function outward from the mode, so no read is ever materialized.

use log::warn;
use rand::{
    Rng,
    RngCore,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use statrs::function::factorial::ln_binomial;

use super::config::BootstrapConfig;
use crate::data_structs::typedef::{
    CountType,
    IterType,
    LabelStr,
};
use crate::data_structs::{
    BootstrapWarning,
    Sample,
    ThresholdMode,
};
use crate::error::BootstrapError;

/// Target depth of a threshold before it is checked against the sample.
pub fn target_depth(
    mode: ThresholdMode,
    value: f64,
    total_depth: CountType,
) -> CountType {
    match mode {
        ThresholdMode::Percentile => (total_depth as f64 * value / 100.0).floor() as CountType,
        ThresholdMode::Absolute => value as CountType,
    }
}

/// Draw size for a threshold, or `None` when the sample cannot provide it.
///
/// Percentile thresholds are rounded down; a depth of zero or one larger
/// than `total_depth` is never adjusted into range.
pub fn resolve_depth(
    mode: ThresholdMode,
    value: f64,
    total_depth: CountType,
) -> Option<CountType> {
    let depth = target_depth(mode, value, total_depth);
    if depth == 0 || depth > total_depth {
        None
    }
    else {
        Some(depth)
    }
}

const SEED_GAMMA: u64 = 0x9e37_79b9_7f4a_7c15;

fn mix64(mut z: u64) -> u64 {
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^ (z >> 31)
}

fn fnv1a(bytes: &[u8]) -> u64 {
    bytes.iter().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ *byte as u64).wrapping_mul(0x0100_0000_01b3)
    })
}

/// Seed of one comparison arm. Arms selecting the same genotype still draw
/// independently.
pub fn arm_seed(
    run_seed: u64,
    arm_idx: usize,
) -> u64 {
    mix64(run_seed.wrapping_add(SEED_GAMMA.wrapping_mul(arm_idx as u64 + 1)))
}

/// Seed of one resampling unit. Depends only on the unit coordinates, so
/// results do not depend on scheduling.
pub fn task_seed(
    arm_seed: u64,
    sample_id: &str,
    threshold_idx: usize,
    round: IterType,
    iteration: IterType,
) -> u64 {
    [
        fnv1a(sample_id.as_bytes()),
        threshold_idx as u64,
        round as u64,
        iteration as u64,
    ]
    .into_iter()
    .fold(mix64(arm_seed), |state, value| {
        mix64(state.wrapping_add(SEED_GAMMA) ^ value)
    })
}

pub fn task_rng(seed: u64) -> ChaCha8Rng {
    ChaCha8Rng::seed_from_u64(seed)
}

/// Run seed used when none is configured.
pub fn entropy_seed() -> u64 {
    rand::rngs::OsRng.next_u64()
}

/// Drawn read counts per clone of a sample, aligned with its observations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BootstrapDraw {
    counts: Vec<CountType>,
    depth:  CountType,
}

impl BootstrapDraw {
    /// Draw holding exactly `counts`.
    pub fn from_counts(counts: Vec<CountType>) -> Self {
        let depth = counts.iter().sum();
        Self { counts, depth }
    }

    pub fn counts(&self) -> &[CountType] {
        &self.counts
    }

    pub fn depth(&self) -> CountType {
        self.depth
    }

    /// Number of clones with at least one drawn read.
    pub fn clones_present(&self) -> usize {
        self.counts.iter().filter(|count| **count > 0).count()
    }
}

/// Number of marked items when `draws` items are taken without
/// replacement from `population` items of which `successes` are marked.
///
/// Inverts the distribution function starting at the mode and alternating
/// outwards, so the expected work is proportional to the standard
/// deviation.
fn hypergeometric<R: Rng + ?Sized>(
    population: CountType,
    successes: CountType,
    draws: CountType,
    rng: &mut R,
) -> CountType {
    if draws == 0 || successes == 0 {
        return 0;
    }
    if successes == population {
        return draws;
    }
    if draws == population {
        return successes;
    }

    let failures = population - successes;
    let low = draws.saturating_sub(failures);
    let high = draws.min(successes);
    let mode = ((draws + 1) as f64 * (successes + 1) as f64 / (population + 2) as f64)
        .floor() as CountType;
    let mode = mode.clamp(low, high);

    let (n, k, m) = (draws as f64, successes as f64, failures as f64);
    // p(x + 1) / p(x)
    let up_ratio = |x: f64| (k - x) * (n - x) / ((x + 1.0) * (m - n + x + 1.0));
    // p(x - 1) / p(x)
    let down_ratio = |x: f64| x * (m - n + x) / ((k - x + 1.0) * (n - x + 1.0));

    let mode_pmf = (ln_binomial(successes, mode) + ln_binomial(failures, draws - mode)
        - ln_binomial(population, draws))
    .exp();
    let mut u = rng.gen::<f64>() - mode_pmf;
    if u < 0.0 {
        return mode;
    }

    let (mut below, mut below_pmf) = (mode, mode_pmf);
    let (mut above, mut above_pmf) = (mode, mode_pmf);
    loop {
        let mut moved = false;
        if below > low {
            below_pmf *= down_ratio(below as f64);
            below -= 1;
            u -= below_pmf;
            if u < 0.0 {
                return below;
            }
            moved = true;
        }
        if above < high {
            above_pmf *= up_ratio(above as f64);
            above += 1;
            u -= above_pmf;
            if u < 0.0 {
                return above;
            }
            moved = true;
        }
        if !moved {
            // Rounding left a negligible remainder; it belongs to the mode.
            return mode;
        }
    }
}

/// Draws `depth` reads without replacement from clones holding `counts`
/// reads each.
///
/// Fails with [`BootstrapError::Sampling`] when `depth` exceeds the total.
pub fn draw<R: Rng + ?Sized>(
    counts: &[CountType],
    depth: CountType,
    rng: &mut R,
) -> Result<BootstrapDraw, BootstrapError> {
    let total: CountType = counts.iter().sum();
    if depth > total {
        return Err(BootstrapError::Sampling(format!(
            "cannot draw {depth} reads from a population of {total}"
        )));
    }

    let mut remaining_population = total;
    let mut remaining_draws = depth;
    let mut drawn = Vec::with_capacity(counts.len());
    for &count in counts {
        let taken = hypergeometric(remaining_population, count, remaining_draws, rng);
        drawn.push(taken);
        remaining_population -= count;
        remaining_draws -= taken;
    }

    Ok(BootstrapDraw {
        counts: drawn,
        depth,
    })
}

/// One independent resampling task.
#[derive(Debug, Clone, PartialEq)]
pub struct ResampleUnit {
    pub sample_idx:    usize,
    pub sample_id:     LabelStr,
    pub threshold_idx: usize,
    pub threshold:     f64,
    pub depth:         CountType,
    pub round:         IterType,
    pub iteration:     IterType,
}

impl ResampleUnit {
    pub fn seed(
        &self,
        arm_seed: u64,
    ) -> u64 {
        task_seed(
            arm_seed,
            &self.sample_id,
            self.threshold_idx,
            self.round,
            self.iteration,
        )
    }
}

/// Expands samples into `(sample, threshold, round, iteration)` units.
///
/// Thresholds a sample cannot reach are skipped with an
/// [`BootstrapWarning::InsufficientDepth`].
pub fn plan_units(
    samples: &[Sample],
    config: &BootstrapConfig,
) -> (Vec<ResampleUnit>, Vec<BootstrapWarning>) {
    let mut units = Vec::new();
    let mut warnings = Vec::new();

    for (sample_idx, sample) in samples.iter().enumerate() {
        for (threshold_idx, &threshold) in config.thresholds.iter().enumerate() {
            let Some(depth) =
                resolve_depth(config.threshold_mode, threshold, sample.total_depth())
            else {
                let warning = BootstrapWarning::InsufficientDepth {
                    sample_id: sample.id().clone(),
                    threshold,
                    required: target_depth(
                        config.threshold_mode,
                        threshold,
                        sample.total_depth(),
                    ),
                    available: sample.total_depth(),
                };
                warn!("{warning}");
                warnings.push(warning);
                continue;
            };

            for round in 0..config.rounds {
                for iteration in 0..config.iterations {
                    units.push(ResampleUnit {
                        sample_idx,
                        sample_id: sample.id().clone(),
                        threshold_idx,
                        threshold,
                        depth,
                        round,
                        iteration,
                    });
                }
            }
        }
    }
    (units, warnings)
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;
    use crate::data_structs::{
        ClonalObservation,
        GroupKey,
    };

    #[rstest]
    #[case::half(ThresholdMode::Percentile, 50.0, 1000, Some(500))]
    #[case::floor(ThresholdMode::Percentile, 90.0, 15, Some(13))]
    #[case::full(ThresholdMode::Percentile, 100.0, 200, Some(200))]
    #[case::rounds_to_zero(ThresholdMode::Percentile, 10.0, 5, None)]
    #[case::over(ThresholdMode::Percentile, 150.0, 200, None)]
    #[case::absolute(ThresholdMode::Absolute, 180.0, 200, Some(180))]
    #[case::absolute_exact(ThresholdMode::Absolute, 200.0, 200, Some(200))]
    #[case::absolute_over(ThresholdMode::Absolute, 201.0, 200, None)]
    fn depth_resolution(
        #[case] mode: ThresholdMode,
        #[case] value: f64,
        #[case] total: CountType,
        #[case] expected: Option<CountType>,
    ) {
        assert_eq!(resolve_depth(mode, value, total), expected);
    }

    #[test]
    fn draw_is_sub_multiset_of_exact_size() {
        let counts = [500, 300, 200, 1, 0, 7];
        let mut rng = task_rng(42);
        for depth in [1, 10, 250, 900, 1008] {
            let draw = draw(&counts, depth, &mut rng).unwrap();
            assert_eq!(draw.counts().iter().sum::<CountType>(), depth);
            for (taken, available) in draw.counts().iter().zip(counts.iter()) {
                assert!(taken <= available);
            }
        }
    }

    #[test]
    fn full_depth_draw_is_the_sample() {
        let counts = [150, 50];
        let mut rng = task_rng(7);
        let draw = draw(&counts, 200, &mut rng).unwrap();
        assert_eq!(draw.counts(), &counts);
        assert_eq!(draw.clones_present(), 2);
    }

    #[test]
    fn oversized_draw_fails() {
        let mut rng = task_rng(7);
        assert!(matches!(
            draw(&[3, 4], 8, &mut rng),
            Err(BootstrapError::Sampling(_))
        ));
    }

    /// Mean and variance of one clone's drawn reads under the exact
    /// hypergeometric law.
    fn hypergeometric_moments(
        population: f64,
        successes: f64,
        draws: f64,
    ) -> (f64, f64) {
        let p = successes / population;
        let mean = draws * p;
        let variance =
            draws * p * (1.0 - p) * (population - draws) / (population - 1.0);
        (mean, variance)
    }

    #[rstest]
    #[case::below_half(100)]
    #[case::above_half(900)]
    fn draw_matches_hypergeometric_means(#[case] depth: CountType) {
        let counts = [500, 300, 200];
        let iterations = 200_000;
        let mut rng = task_rng(1234);
        let mut totals = [0u64; 3];
        for _ in 0..iterations {
            let draw = draw(&counts, depth, &mut rng).unwrap();
            for (total, taken) in totals.iter_mut().zip(draw.counts()) {
                *total += taken;
            }
        }
        for (total, count) in totals.iter().zip(counts) {
            let (mean, variance) = hypergeometric_moments(1000.0, count as f64, depth as f64);
            let standard_error = (variance / iterations as f64).sqrt();
            let observed = *total as f64 / iterations as f64;
            assert!(
                (observed - mean).abs() < 5.0 * standard_error,
                "clone of {count} reads: mean {observed}, expected {mean} +- {standard_error}"
            );
        }
    }

    #[rstest]
    #[case::half_marked(1000, 500, 100)]
    #[case::large_draw(1000, 100, 500)]
    #[case::wide(100_000, 30_000, 40_000)]
    fn univariate_draw_matches_hypergeometric_mean(
        #[case] population: CountType,
        #[case] successes: CountType,
        #[case] draws: CountType,
    ) {
        let iterations = 200_000;
        let mut rng = task_rng(99);
        let mut total = 0u64;
        for _ in 0..iterations {
            let taken = hypergeometric(population, successes, draws, &mut rng);
            assert!(taken <= successes.min(draws));
            total += taken;
        }
        let (mean, variance) =
            hypergeometric_moments(population as f64, successes as f64, draws as f64);
        let standard_error = (variance / iterations as f64).sqrt();
        let observed = total as f64 / iterations as f64;
        assert!(
            (observed - mean).abs() < 5.0 * standard_error,
            "mean {observed}, expected {mean} +- {standard_error}"
        );
    }

    #[test]
    fn zero_count_clones_are_never_drawn() {
        let counts = [0, 4, 0, 0, 6, 0];
        let mut rng = task_rng(3);
        for depth in 0..=10 {
            let draw = draw(&counts, depth, &mut rng).unwrap();
            assert_eq!(draw.counts()[0] + draw.counts()[2] + draw.counts()[3], 0);
            assert_eq!(draw.counts()[5], 0);
            assert_eq!(draw.counts().iter().sum::<CountType>(), depth);
        }
    }

    #[test]
    fn task_seeds_are_distinct_and_stable() {
        let base = arm_seed(5, 0);
        assert_eq!(task_seed(base, "M1", 0, 0, 1), task_seed(base, "M1", 0, 0, 1));
        assert_ne!(task_seed(base, "M1", 0, 0, 1), task_seed(base, "M1", 0, 0, 2));
        assert_ne!(task_seed(base, "M1", 0, 0, 1), task_seed(base, "M1", 1, 0, 1));
        assert_ne!(task_seed(base, "M1", 0, 0, 1), task_seed(base, "M1", 0, 1, 1));
        assert_ne!(task_seed(base, "M1", 0, 0, 1), task_seed(base, "M2", 0, 0, 1));
        assert_ne!(arm_seed(5, 0), arm_seed(5, 1));
    }

    #[test]
    fn plans_units_and_warns_on_unreachable_thresholds() {
        let sample = Sample::new("M1".into(), "KT".into(), vec![ClonalObservation::new(
            "M1".into(),
            "KT".into(),
            150,
            vec![GroupKey::Single("A".into())],
        )]);
        let config = BootstrapConfig::default()
            .with_threshold_mode(ThresholdMode::Absolute)
            .with_thresholds(vec![100.0, 200.0])
            .with_iterations(3)
            .with_rounds(2);
        let (units, warnings) = plan_units(&[sample], &config);
        assert_eq!(units.len(), 6);
        assert!(units.iter().all(|unit| unit.depth == 100 && unit.threshold_idx == 0));
        assert_eq!(warnings.len(), 1);
        assert_eq!(warnings[0].threshold(), Some(200.0));
    }
}
