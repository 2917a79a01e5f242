//! Picks a rounds value whose verify time lands near a target duration.
//!
//! Speed is estimated at half the default work first, so slow machines do
//! not spend long on the first probe, then refined twice at the estimated
//! target.

use std::{
    fmt,
    time::{Duration, Instant},
};

use tracing::debug;

use crate::{
    error::HashError,
    handler::{Handler, HashOptions},
    scheme::{CostMetric, ParamSpec, SchemeDescriptor},
};

/// Fraction of the target a log2 boundary value may miss by and still be
/// recommended on its own.
pub const DEFAULT_TOLERANCE: f64 = 0.05;
pub const DEFAULT_TARGET: Duration = Duration::from_millis(350);

const PROBE_SECRET: &[u8] = b"S0m3-S3Kr1T";

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CalibrateOptions {
    pub tolerance: f64,
    /// verify calls averaged per repeat
    pub samples: usize,
    /// repeats; the fastest average wins
    pub repeats: usize,
    pub refinements: usize,
}

impl Default for CalibrateOptions {
    fn default() -> Self {
        Self {
            tolerance: DEFAULT_TOLERANCE,
            samples: 4,
            repeats: 4,
            refinements: 2,
        }
    }
}

impl CalibrateOptions {
    fn validate(&self) -> Result<(), HashError> {
        if !(self.tolerance > 0.0 && self.tolerance < 1.0) {
            return Err(HashError::InvalidSetting(format!(
                "tolerance {} must be between 0 and 1",
                self.tolerance
            )));
        }
        if self.samples == 0 || self.repeats == 0 {
            return Err(HashError::InvalidSetting(
                "samples and repeats must be at least 1".into(),
            ));
        }
        Ok(())
    }
}

/// A rounds value with its predicted verify time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Estimate {
    pub rounds: u32,
    pub elapsed: Duration,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Recommendation {
    Rounds(u32),
    /// The target falls between two log2 values, neither within tolerance.
    Between { faster: Estimate, slower: Estimate },
}

#[derive(Debug, Clone, PartialEq)]
pub struct Calibration {
    pub scheme: String,
    pub cost_metric: CostMetric,
    /// work units per second
    pub speed: f64,
    pub target: Duration,
    pub recommendation: Recommendation,
}

impl Calibration {
    /// The single recommended value, or the faster one of a pair.
    pub fn rounds(&self) -> u32 {
        match self.recommendation {
            Recommendation::Rounds(rounds) => rounds,
            Recommendation::Between { faster, .. } => faster.rounds,
        }
    }
}

impl fmt::Display for Calibration {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "hash............: {}", self.scheme)?;
        if self.speed < 1000.0 {
            writeln!(f, "speed...........: {:.2} iterations/second", self.speed)?;
        } else {
            writeln!(f, "speed...........: {} iterations/second", self.speed as u64)?;
        }
        writeln!(f, "target time.....: {} ms", self.target.as_millis())?;

        let target = self.target.as_secs_f64();
        match self.recommendation {
            Recommendation::Rounds(rounds) => write!(f, "target rounds...: {rounds}"),
            Recommendation::Between { faster, slower } => {
                let gain = target - faster.elapsed.as_secs_f64();
                writeln!(
                    f,
                    "target rounds...: {} ({}ms -- {}ms/{}% faster than requested)",
                    faster.rounds,
                    faster.elapsed.as_millis(),
                    (gain * 1000.0) as u64,
                    (100.0 * gain / target).round() as u64,
                )?;
                let loss = slower.elapsed.as_secs_f64() - target;
                write!(
                    f,
                    "target rounds...: {} ({}ms -- {}ms/{}% slower than requested)",
                    slower.rounds,
                    slower.elapsed.as_millis(),
                    (loss * 1000.0) as u64,
                    (100.0 * loss / target).round() as u64,
                )
            }
        }
    }
}

/// Calibrates `handler` by timing real verify calls.
pub fn choose_rounds(
    handler: &dyn Handler,
    target: Duration,
    options: &CalibrateOptions,
) -> Result<Calibration, HashError> {
    choose_rounds_with(handler.descriptor(), target, options, |rounds| {
        time_verify(handler, rounds, options)
    })
}

/// Calibration over an arbitrary timing source. `measure(rounds)` returns
/// the verify time at `rounds`.
pub fn choose_rounds_with<F>(
    descriptor: &SchemeDescriptor,
    target: Duration,
    options: &CalibrateOptions,
    mut measure: F,
) -> Result<Calibration, HashError>
where
    F: FnMut(u32) -> Result<Duration, HashError>,
{
    options.validate()?;
    if target.is_zero() {
        return Err(HashError::InvalidSetting("target time must be > 0".into()));
    }
    let spec = descriptor.rounds().ok_or_else(|| {
        HashError::InvalidSetting(format!(
            "{} does not support variable rounds",
            descriptor.name
        ))
    })?;
    let metric = descriptor.cost_metric;
    let target_secs = target.as_secs_f64();

    let mut speed_at = |rounds: u32| -> Result<f64, HashError> {
        let elapsed = measure(rounds)?.max(Duration::from_nanos(1));
        let speed = metric.work(rounds.into()) / elapsed.as_secs_f64();
        debug!(scheme = descriptor.name, rounds, ?elapsed, speed, "calibration probe");
        Ok(speed)
    };

    let mut rounds = clamp_rounds(spec, metric.inverse(0.5 * metric.work(spec.default.into())));
    let mut speed = speed_at(rounds)?;
    for _ in 0..options.refinements {
        rounds = clamp_rounds(spec, metric.inverse(speed * target_secs));
        speed = speed_at(rounds)?;
    }

    let ideal = metric.inverse(speed * target_secs);
    let recommendation = match metric {
        CostMetric::Linear => Recommendation::Rounds(clamp_rounds(spec, ideal.round())),
        CostMetric::Log2 => {
            let predict = |rounds: u32| Estimate {
                rounds,
                elapsed: Duration::from_secs_f64(metric.work(rounds.into()) / speed),
            };
            let lower = predict(clamp_rounds(spec, ideal));
            let upper = predict(clamp_rounds(spec, ideal.ceil()));
            let lower_miss = (target_secs - lower.elapsed.as_secs_f64()) / target_secs;
            let upper_miss = (upper.elapsed.as_secs_f64() - target_secs) / target_secs;
            if lower_miss < options.tolerance {
                Recommendation::Rounds(lower.rounds)
            } else if upper_miss < options.tolerance {
                Recommendation::Rounds(upper.rounds)
            } else {
                Recommendation::Between {
                    faster: lower,
                    slower: upper,
                }
            }
        }
    };

    Ok(Calibration {
        scheme: descriptor.name.to_string(),
        cost_metric: metric,
        speed,
        target,
        recommendation,
    })
}

/// Fastest average verify time over `options.repeats` runs of
/// `options.samples` calls, against one hash made at `rounds`.
pub fn time_verify(
    handler: &dyn Handler,
    rounds: u32,
    options: &CalibrateOptions,
) -> Result<Duration, HashError> {
    let record = handler.hash_with(PROBE_SECRET, &HashOptions::new().rounds(rounds))?;

    let mut best: Option<Duration> = None;
    for _ in 0..options.repeats {
        let mut total = Duration::ZERO;
        for _ in 0..options.samples {
            let start = Instant::now();
            handler.verify_record(PROBE_SECRET, &record)?;
            total += start.elapsed();
        }
        let average = total / options.samples as u32;
        best = Some(best.map_or(average, |b| b.min(average)));
    }
    Ok(best.unwrap_or_default())
}

// truncates toward zero, then clamps into the scheme's bounds
fn clamp_rounds(spec: &ParamSpec, rounds: f64) -> u32 {
    if !(rounds < spec.max as f64) {
        return spec.max;
    }
    (rounds as u32).max(spec.min)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        crypto::Pbkdf2Backend,
        schemes::{BCRYPT, PBKDF2_SHA256, Pbkdf2Handler},
    };

    // verify time for a machine doing `speed` work units per second
    fn machine(metric: CostMetric, speed: f64) -> impl FnMut(u32) -> Result<Duration, HashError> {
        move |rounds| Ok(Duration::from_secs_f64(metric.work(rounds.into()) / speed))
    }

    fn calibrate_log2(ideal: f64) -> Recommendation {
        let speed = ideal.exp2() / DEFAULT_TARGET.as_secs_f64();
        choose_rounds_with(
            &BCRYPT,
            DEFAULT_TARGET,
            &CalibrateOptions::default(),
            machine(CostMetric::Log2, speed),
        )
        .unwrap()
        .recommendation
    }

    #[test]
    fn linear_scheme_rounds_to_nearest() {
        let cal = choose_rounds_with(
            &PBKDF2_SHA256,
            DEFAULT_TARGET,
            &CalibrateOptions::default(),
            machine(CostMetric::Linear, 100_000.0),
        )
        .unwrap();
        assert_eq!(cal.recommendation, Recommendation::Rounds(35_000));
        assert_eq!(cal.rounds(), 35_000);
    }

    #[test]
    fn log2_exact_value_is_recommended() {
        assert_eq!(calibrate_log2(12.0), Recommendation::Rounds(12));
    }

    #[test]
    fn log2_value_within_tolerance_is_recommended() {
        assert_eq!(calibrate_log2(12.03), Recommendation::Rounds(12));
        assert_eq!(calibrate_log2(11.97), Recommendation::Rounds(12));
    }

    #[test]
    fn log2_midpoint_reports_both_sides() {
        match calibrate_log2(11.5) {
            Recommendation::Between { faster, slower } => {
                assert_eq!(faster.rounds, 11);
                assert_eq!(slower.rounds, 12);
                assert!(faster.elapsed < DEFAULT_TARGET);
                assert!(slower.elapsed > DEFAULT_TARGET);
            }
            other => panic!("expected a pair, got {other:?}"),
        }
    }

    #[test]
    fn recommendation_is_clamped() {
        // a very slow machine still gets the minimum cost
        assert_eq!(calibrate_log2(1.0), Recommendation::Rounds(4));
        assert_eq!(calibrate_log2(40.0), Recommendation::Rounds(31));
    }

    #[test]
    fn first_probe_uses_half_the_default_work() {
        let mut probes = Vec::new();
        let mut inner = machine(CostMetric::Log2, 4096.0 / 0.35);
        choose_rounds_with(&BCRYPT, DEFAULT_TARGET, &CalibrateOptions::default(), |r| {
            probes.push(r);
            inner(r)
        })
        .unwrap();
        assert_eq!(probes.len(), 3);
        assert_eq!(probes[0], 11);
    }

    #[test]
    fn rejects_bad_options() {
        let opts = CalibrateOptions {
            tolerance: 0.0,
            ..CalibrateOptions::default()
        };
        let err = choose_rounds_with(&BCRYPT, DEFAULT_TARGET, &opts, |_| Ok(DEFAULT_TARGET));
        assert!(matches!(err, Err(HashError::InvalidSetting(_))));

        let err = choose_rounds_with(
            &BCRYPT,
            Duration::ZERO,
            &CalibrateOptions::default(),
            |_| Ok(DEFAULT_TARGET),
        );
        assert!(matches!(err, Err(HashError::InvalidSetting(_))));
    }

    #[test]
    fn display_matches_report_layout() {
        let cal = Calibration {
            scheme: "bcrypt".into(),
            cost_metric: CostMetric::Log2,
            speed: 11702.86,
            target: DEFAULT_TARGET,
            recommendation: Recommendation::Rounds(12),
        };
        assert_eq!(
            cal.to_string(),
            "hash............: bcrypt\n\
             speed...........: 11702 iterations/second\n\
             target time.....: 350 ms\n\
             target rounds...: 12"
        );
    }

    #[test]
    fn real_timing_produces_a_value() {
        let handler = Pbkdf2Handler::sha256(Pbkdf2Backend::default());
        let opts = CalibrateOptions {
            samples: 1,
            repeats: 1,
            refinements: 1,
            ..CalibrateOptions::default()
        };
        let cal = choose_rounds(&handler, Duration::from_millis(5), &opts).unwrap();
        assert!(cal.rounds() >= 1);
        assert!(cal.speed > 0.0);
    }
}
