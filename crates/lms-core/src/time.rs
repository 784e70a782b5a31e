//! Time sets and calendar horizons.
//!
//! A [`TimeSet`] is either continuous (only its bounds are known until it is
//! discretised) or an explicit ordered list of points. A [`Horizon`] maps a
//! calendar window onto a continuous set measured in seconds.

use crate::error::{ModelError, ModelResult};
use chrono::{Duration, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Points closer than this are considered identical.
pub const POINT_TOLERANCE: f64 = 1e-9;

/// Unique identifier for a time set within a model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TimeSetId(usize);

impl TimeSetId {
    #[inline]
    pub fn new(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn value(&self) -> usize {
        self.0
    }
}

/// Ordered domain indexing time-dependent quantities.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TimeSet {
    name: String,
    points: Vec<f64>,
    continuous: bool,
    discretized: bool,
}

impl TimeSet {
    /// Continuous domain `[start, end]`; carries only its bounds until discretised.
    pub fn continuous(name: impl Into<String>, start: f64, end: f64) -> ModelResult<Self> {
        let name = name.into();
        if !start.is_finite() || !end.is_finite() {
            return Err(ModelError::InvalidTimeSet(format!(
                "{name}: bounds must be finite"
            )));
        }
        if end <= start {
            return Err(ModelError::InvalidTimeSet(format!(
                "{name}: end {end} must be greater than start {start}"
            )));
        }
        Ok(Self {
            name,
            points: vec![start, end],
            continuous: true,
            discretized: false,
        })
    }

    /// Explicit strictly increasing list of points.
    pub fn discrete(name: impl Into<String>, points: Vec<f64>) -> ModelResult<Self> {
        let name = name.into();
        if points.is_empty() {
            return Err(ModelError::InvalidTimeSet(format!("{name}: no points")));
        }
        if points.iter().any(|p| !p.is_finite()) {
            return Err(ModelError::InvalidTimeSet(format!(
                "{name}: points must be finite"
            )));
        }
        if points.windows(2).any(|w| w[1] <= w[0]) {
            return Err(ModelError::InvalidTimeSet(format!(
                "{name}: points must be strictly increasing"
            )));
        }
        Ok(Self {
            name,
            points,
            continuous: false,
            discretized: false,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn points(&self) -> &[f64] {
        &self.points
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn start(&self) -> f64 {
        self.points[0]
    }

    pub fn end(&self) -> f64 {
        self.points[self.points.len() - 1]
    }

    /// True for a continuous set that has not been discretised yet.
    pub fn is_continuous(&self) -> bool {
        self.continuous && !self.discretized
    }

    pub fn is_discretized(&self) -> bool {
        self.discretized
    }

    /// Index of the point equal to `t`, if any.
    pub fn position(&self, t: f64) -> Option<usize> {
        self.points
            .iter()
            .position(|p| (p - t).abs() <= POINT_TOLERANCE)
    }

    /// True when both sets hold the same ordered points.
    pub fn same_points(&self, other: &TimeSet) -> bool {
        self.points.len() == other.points.len()
            && self
                .points
                .iter()
                .zip(&other.points)
                .all(|(a, b)| (a - b).abs() <= POINT_TOLERANCE)
    }

    pub(crate) fn replace_points(&mut self, points: Vec<f64>) {
        self.points = points;
        self.discretized = true;
    }
}

/// Calendar window split into equal steps.
///
/// Model time is measured in seconds from `start`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Horizon {
    start: NaiveDateTime,
    end: NaiveDateTime,
    step: Duration,
}

impl Horizon {
    pub const TIMESTAMP_FORMAT: &'static str = "%Y-%m-%d %H:%M:%S";

    pub fn new(start: NaiveDateTime, end: NaiveDateTime, step: Duration) -> ModelResult<Self> {
        let span = end - start;
        let step_ms = step.num_milliseconds();
        let span_ms = span.num_milliseconds();
        if step_ms <= 0 {
            return Err(ModelError::InvalidTimeSet(
                "horizon step must be positive".into(),
            ));
        }
        if span_ms <= 0 {
            return Err(ModelError::InvalidTimeSet(format!(
                "horizon end {end} must be after start {start}"
            )));
        }
        if span_ms % step_ms != 0 {
            return Err(ModelError::InvalidTimeSet(format!(
                "horizon of {span_ms} ms is not a multiple of the {step_ms} ms step"
            )));
        }
        if span_ms / step_ms < 2 {
            return Err(ModelError::InvalidTimeSet(
                "horizon must contain at least two steps".into(),
            ));
        }
        Ok(Self { start, end, step })
    }

    /// Build from `YYYY-MM-DD HH:MM:SS` timestamps and a step in seconds.
    pub fn parse(start: &str, end: &str, step_seconds: i64) -> ModelResult<Self> {
        let parse = |s: &str| {
            NaiveDateTime::parse_from_str(s, Self::TIMESTAMP_FORMAT)
                .map_err(|e| ModelError::InvalidTimeSet(format!("'{s}': {e}")))
        };
        Self::new(parse(start)?, parse(end)?, Duration::seconds(step_seconds))
    }

    pub fn start(&self) -> NaiveDateTime {
        self.start
    }

    pub fn end(&self) -> NaiveDateTime {
        self.end
    }

    pub fn duration_seconds(&self) -> f64 {
        (self.end - self.start).num_milliseconds() as f64 / 1000.0
    }

    pub fn step_seconds(&self) -> f64 {
        self.step.num_milliseconds() as f64 / 1000.0
    }

    /// Number of finite elements covering the horizon.
    pub fn nfe(&self) -> usize {
        ((self.end - self.start).num_milliseconds() / self.step.num_milliseconds()) as usize
    }

    /// Continuous time set `[0, duration]` in seconds.
    pub fn time_set(&self, name: impl Into<String>) -> ModelResult<TimeSet> {
        TimeSet::continuous(name, 0.0, self.duration_seconds())
    }

    pub fn timestamp_at(&self, seconds: f64) -> NaiveDateTime {
        self.start + Duration::milliseconds((seconds * 1000.0).round() as i64)
    }

    /// Calendar timestamp of every point of `set`.
    pub fn timestamps(&self, set: &TimeSet) -> Vec<NaiveDateTime> {
        set.points().iter().map(|t| self.timestamp_at(*t)).collect()
    }
}
