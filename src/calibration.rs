//! Calibration of the concentration-to-signal line and its inversion.
//!
//! The engine is stateless: [`fit`] returns an immutable [`Model`] and the
//! caller keeps the latest instance for later predictions. Refitting never
//! mutates an existing model.

use chrono::{DateTime, Utc};
use rand::seq::SliceRandom;
use rand::Rng;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::linfit::linfit;
use crate::sample::{Sample, Split};
use crate::{Error, Result};

/// Fitted calibration line `ratio = slope * concentration + intercept`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Model {
    pub slope: f64,
    pub intercept: f64,
    /// Coefficient of determination over the fitted set.
    pub r_squared: f64,
    /// Root-mean-squared residual over the fitted set, in signal units.
    pub rmse: f64,
    pub trained_at: DateTime<Utc>,
}

/// Residual statistics of a model over an independent labeled set.
///
/// Unlike the training metrics on [`Model`], `r_squared` here can go
/// negative: on held-out data the line may explain less than the mean.
#[derive(Clone, Copy, Debug)]
pub struct Evaluation {
    pub r_squared: f64,
    pub rmse: f64,
    pub n: usize,
}

/// Shuffle and partition samples into train and test sets.
///
/// The first `floor(n * train_fraction)` shuffled samples are tagged
/// [`Split::Train`], the remainder [`Split::Test`]. Every input sample lands
/// in exactly one of the two outputs. The random source is injected so
/// callers (and tests) control determinism.
///
/// # Errors
/// [`Error::InvalidTrainFraction`] unless `train_fraction` lies strictly
/// between 0 and 1, [`Error::NotEnoughSamples`] on an empty input.
#[allow(clippy::cast_possible_truncation, clippy::cast_precision_loss, clippy::cast_sign_loss)]
pub fn split<R: Rng>(
    samples: Vec<Sample>,
    train_fraction: f64,
    rng: &mut R,
) -> Result<(Vec<Sample>, Vec<Sample>)> {
    if !(train_fraction > 0.0 && train_fraction < 1.0) {
        return Err(Error::InvalidTrainFraction(train_fraction));
    }
    if samples.is_empty() {
        return Err(Error::NotEnoughSamples { have: 0, need: 1 });
    }

    let mut train = samples;
    train.shuffle(rng);
    let cut = (train.len() as f64 * train_fraction).floor() as usize;
    let mut test = train.split_off(cut);

    for sample in &mut train {
        sample.split = Some(Split::Train);
    }
    for sample in &mut test {
        sample.split = Some(Split::Test);
    }
    Ok((train, test))
}

/// Fit the calibration line by ordinary least squares, with
/// `x = concentration` and `y = ratio`.
///
/// Mixed collections are accepted: when any sample carries a split tag, only
/// the [`Split::Train`] entries are fitted; a fully untagged collection is
/// fitted whole. Goodness-of-fit metrics are computed over the same fitted
/// set. The engine's own minimum is the mathematical two samples; stricter
/// floors are caller policy.
///
/// # Errors
/// [`Error::MissingLabel`] naming the first unlabeled sample,
/// [`Error::NotEnoughSamples`] and [`Error::DegenerateFit`] as for
/// [`linfit`].
pub fn fit(samples: &[Sample]) -> Result<Model> {
    let tagged = samples.iter().any(|sample| sample.split.is_some());

    let mut x = Vec::new();
    let mut y = Vec::new();
    for sample in samples {
        if tagged && sample.split != Some(Split::Train) {
            continue;
        }
        let concentration = sample.concentration.ok_or_else(|| Error::MissingLabel {
            name: sample.name.clone(),
        })?;
        x.push(concentration);
        y.push(sample.ratio);
    }

    let summary = linfit(&x, &y)?;
    let model = Model {
        slope: summary.slope,
        intercept: summary.intercept,
        r_squared: summary.r_squared,
        rmse: summary.rmse,
        trained_at: Utc::now(),
    };
    info!(
        n = x.len(),
        slope = model.slope,
        intercept = model.intercept,
        r_squared = model.r_squared,
        rmse = model.rmse,
        "fitted calibration line"
    );
    Ok(model)
}

/// Invert the calibration line for a newly observed signal.
///
/// Estimates below the assay's detectable floor are reported as zero, never
/// negative.
///
/// # Errors
/// [`Error::DegenerateModel`] when the slope is zero; a flat line carries no
/// information to invert.
pub fn predict(model: &Model, ratio: f64) -> Result<f64> {
    if model.slope == 0.0 {
        return Err(Error::DegenerateModel);
    }
    Ok(((ratio - model.intercept) / model.slope).max(0.0))
}

/// Predict a sample in place, stamping the estimate and the
/// [`Split::Prediction`] tag.
///
/// # Errors
/// As [`predict`].
pub fn predict_sample(model: &Model, sample: &mut Sample) -> Result<f64> {
    let concentration = predict(model, sample.ratio)?;
    sample.predicted_concentration = Some(concentration);
    sample.split = Some(Split::Prediction);
    Ok(concentration)
}

/// Residual statistics of `model` over any labeled set, e.g. the held-out
/// test split.
///
/// This is additive diagnostics: nothing in the crate calls it implicitly,
/// and the training metrics on [`Model`] are never computed this way.
///
/// # Errors
/// [`Error::MissingLabel`] on unlabeled samples, [`Error::NotEnoughSamples`]
/// on an empty set, [`Error::DegenerateFit`] when the set has zero signal
/// variance so no variance is there to explain.
#[allow(clippy::cast_precision_loss)]
pub fn evaluate(model: &Model, samples: &[Sample]) -> Result<Evaluation> {
    if samples.is_empty() {
        return Err(Error::NotEnoughSamples { have: 0, need: 1 });
    }

    let mut y = Vec::with_capacity(samples.len());
    let mut predicted = Vec::with_capacity(samples.len());
    for sample in samples {
        let concentration = sample.concentration.ok_or_else(|| Error::MissingLabel {
            name: sample.name.clone(),
        })?;
        y.push(sample.ratio);
        predicted.push(model.slope * concentration + model.intercept);
    }

    let n = y.len() as f64;
    let mean_y = y.iter().sum::<f64>() / n;
    let ss_tot: f64 = y.iter().map(|yi| (yi - mean_y).powi(2)).sum();
    let ss_res: f64 = y
        .iter()
        .zip(&predicted)
        .map(|(yi, pi)| (yi - pi).powi(2))
        .sum();
    if ss_tot == 0.0 {
        return Err(Error::DegenerateFit {
            reason: "zero variance in signal".to_owned(),
        });
    }

    Ok(Evaluation {
        r_squared: 1.0 - ss_res / ss_tot,
        rmse: (ss_res / n).sqrt(),
        n: samples.len(),
    })
}

#[cfg(test)]
mod test {
    use std::collections::HashSet;

    use proptest::prelude::*;
    use rand::SeedableRng;
    use rand_isaac::Isaac64Rng;

    use super::{evaluate, fit, predict, predict_sample, split, Model};
    use crate::sample::{Sample, Split};
    use crate::Error;

    fn labeled(name: &str, concentration: f64, ratio: f64) -> Sample {
        Sample::new(name, 100.0, ratio * 100.0, 20.0, ratio).with_concentration(concentration)
    }

    fn line_samples(slope: f64, intercept: f64, xs: &[f64]) -> Vec<Sample> {
        xs.iter()
            .enumerate()
            .map(|(ii, &x)| labeled(&format!("s{ii}"), x, slope * x + intercept))
            .collect()
    }

    fn model(slope: f64, intercept: f64) -> Model {
        Model {
            slope,
            intercept,
            r_squared: 1.0,
            rmse: 0.0,
            trained_at: chrono::Utc::now(),
        }
    }

    #[test]
    fn split_partitions_without_loss_or_duplication() {
        let mut rng = Isaac64Rng::seed_from_u64(40);
        let samples = line_samples(2.0, 1.0, &[0.0, 1.0, 2.0, 3.0, 4.0, 5.0, 6.0, 7.0, 8.0, 9.0]);
        let input_ids: HashSet<_> = samples.iter().map(|s| s.id).collect();

        let (train, test) = split(samples, 0.7, &mut rng).unwrap();

        assert_eq!(train.len(), 7);
        assert_eq!(test.len(), 3);
        assert!(train.iter().all(|s| s.split == Some(Split::Train)));
        assert!(test.iter().all(|s| s.split == Some(Split::Test)));

        let output_ids: HashSet<_> = train.iter().chain(&test).map(|s| s.id).collect();
        assert_eq!(output_ids, input_ids);
        assert_eq!(train.len() + test.len(), input_ids.len());
    }

    #[test]
    fn split_is_deterministic_under_a_seeded_source() {
        let samples = line_samples(1.0, 0.0, &[1.0, 2.0, 3.0, 4.0, 5.0]);

        let (train_a, _) = split(samples.clone(), 0.6, &mut Isaac64Rng::seed_from_u64(7)).unwrap();
        let (train_b, _) = split(samples, 0.6, &mut Isaac64Rng::seed_from_u64(7)).unwrap();

        let ids_a: Vec<_> = train_a.iter().map(|s| s.id).collect();
        let ids_b: Vec<_> = train_b.iter().map(|s| s.id).collect();
        assert_eq!(ids_a, ids_b);
    }

    #[test]
    fn split_rejects_degenerate_fractions_and_empty_input() {
        let mut rng = Isaac64Rng::seed_from_u64(40);
        let samples = line_samples(1.0, 0.0, &[1.0, 2.0]);

        for fraction in [0.0, 1.0, -0.2, 1.7] {
            assert!(matches!(
                split(samples.clone(), fraction, &mut rng),
                Err(Error::InvalidTrainFraction(_))
            ));
        }
        assert!(matches!(
            split(Vec::new(), 0.5, &mut rng),
            Err(Error::NotEnoughSamples { .. })
        ));
    }

    #[test]
    fn fit_recovers_a_noiseless_line() {
        let samples = line_samples(2.0, 1.0, &[0.0, 1.0, 2.0, 3.0, 4.0]);

        let model = fit(&samples).unwrap();

        approx::assert_relative_eq!(model.slope, 2.0, max_relative = 1e-12);
        approx::assert_relative_eq!(model.intercept, 1.0, max_relative = 1e-12);
        approx::assert_relative_eq!(model.r_squared, 1.0, max_relative = 1e-12);
        approx::assert_abs_diff_eq!(model.rmse, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn fit_ignores_everything_but_the_train_tag_on_tagged_input() {
        let mut samples = line_samples(2.0, 1.0, &[0.0, 1.0, 2.0, 3.0]);
        for sample in &mut samples {
            sample.split = Some(Split::Train);
        }
        // A test-tagged outlier that would wreck the line if it leaked in.
        let mut outlier = labeled("outlier", 100.0, 0.0);
        outlier.split = Some(Split::Test);
        samples.push(outlier);

        let model = fit(&samples).unwrap();

        approx::assert_relative_eq!(model.slope, 2.0, max_relative = 1e-12);
        approx::assert_relative_eq!(model.intercept, 1.0, max_relative = 1e-12);
    }

    #[test]
    fn fit_on_identical_concentrations_is_degenerate() {
        let samples = vec![
            labeled("a", 5.0, 0.1),
            labeled("b", 5.0, 0.2),
            labeled("c", 5.0, 0.3),
        ];

        assert!(matches!(
            fit(&samples),
            Err(Error::DegenerateFit { .. })
        ));
    }

    #[test]
    fn fit_names_the_sample_missing_its_label() {
        let mut samples = line_samples(1.0, 0.0, &[1.0, 2.0]);
        samples.push(Sample::new("unlabeled.png", 100.0, 50.0, 10.0, 0.5));

        match fit(&samples) {
            Err(Error::MissingLabel { name }) => assert_eq!(name, "unlabeled.png"),
            other => panic!("expected a missing label, got {other:?}"),
        }
    }

    #[test]
    fn predict_inverts_the_line_and_clamps_at_the_floor() {
        let model = model(2.0, 1.0);

        approx::assert_relative_eq!(predict(&model, 5.0).unwrap(), 2.0);
        // Below the intercept the raw inverse is negative; report the floor.
        approx::assert_relative_eq!(predict(&model, 0.5).unwrap(), 0.0);
    }

    #[test]
    fn predict_refuses_a_flat_line() {
        let model = model(0.0, 1.0);
        assert!(matches!(predict(&model, 0.5), Err(Error::DegenerateModel)));
    }

    #[test]
    fn predict_sample_stamps_the_record() {
        let model = model(2.0, 1.0);
        let mut sample = Sample::new("new.png", 100.0, 50.0, 10.0, 5.0);

        let concentration = predict_sample(&model, &mut sample).unwrap();

        approx::assert_relative_eq!(concentration, 2.0);
        approx::assert_relative_eq!(sample.predicted_concentration.unwrap(), 2.0);
        assert_eq!(sample.split, Some(Split::Prediction));
    }

    #[test]
    fn noiseless_round_trip_recovers_every_training_point() {
        let xs = [0.5, 1.0, 2.5, 4.0, 8.0];
        let samples = line_samples(0.4, 0.05, &xs);
        let model = fit(&samples).unwrap();

        for &x in &xs {
            let ratio = model.slope * x + model.intercept;
            approx::assert_relative_eq!(predict(&model, ratio).unwrap(), x, max_relative = 1e-9);
        }
    }

    #[test]
    fn evaluation_on_a_perfect_test_set_matches_training() {
        let model = fit(&line_samples(2.0, 1.0, &[0.0, 1.0, 2.0, 3.0])).unwrap();
        let held_out = line_samples(2.0, 1.0, &[0.5, 1.5, 2.5]);

        let evaluation = evaluate(&model, &held_out).unwrap();

        assert_eq!(evaluation.n, 3);
        approx::assert_relative_eq!(evaluation.r_squared, 1.0, max_relative = 1e-12);
        approx::assert_abs_diff_eq!(evaluation.rmse, 0.0, epsilon = 1e-9);
    }

    #[test]
    fn evaluation_on_hostile_data_goes_negative() {
        let model = model(1.0, 0.0);
        // Ratios anti-correlated with what the model expects.
        let held_out = vec![labeled("a", 1.0, 5.0), labeled("b", 5.0, 1.0)];

        let evaluation = evaluate(&model, &held_out).unwrap();
        assert!(evaluation.r_squared < 0.0);
    }

    proptest! {
        #[test]
        fn split_sizes_follow_the_floor_rule(n in 1_usize..64, fraction in 0.01_f64..0.99) {
            let xs: Vec<f64> = (0..n).map(|ii| ii as f64).collect();
            let samples = line_samples(1.0, 0.0, &xs);
            let mut rng = Isaac64Rng::seed_from_u64(40);

            let (train, test) = split(samples, fraction, &mut rng).unwrap();

            let expected = (n as f64 * fraction).floor() as usize;
            prop_assert_eq!(train.len(), expected);
            prop_assert_eq!(train.len() + test.len(), n);
        }

        #[test]
        fn predictions_are_never_negative(
            slope in prop_oneof![-10.0_f64..-0.01, 0.01_f64..10.0],
            intercept in -5.0_f64..5.0,
            ratio in -100.0_f64..100.0,
        ) {
            let model = model(slope, intercept);
            let concentration = predict(&model, ratio).unwrap();
            prop_assert!(concentration >= 0.0);
        }
    }
}
