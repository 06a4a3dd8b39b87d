//! Output time grids

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Strictly increasing sequence of at least two finite report times.
///
/// The grid only controls where the solution is reported; the solver picks
/// its own internal steps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<f64>", into = "Vec<f64>")]
pub struct TimeGrid {
    times: Vec<f64>,
}

/// Invalid time grid
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GridError {
    /// Fewer than two points
    #[error("time grid needs at least 2 points, got {0}")]
    TooShort(usize),
    /// A point is NaN or infinite
    #[error("time grid point {index} is not finite ({value})")]
    NonFinite {
        /// Position in the grid
        index: usize,
        /// Offending value
        value: f64,
    },
    /// Two neighbouring points are not strictly increasing
    #[error(
        "time grid must be strictly increasing, but t[{index}] = {previous} >= t[{next_index}] = {next}",
        next_index = .index + 1
    )]
    NotIncreasing {
        /// Position of the first of the two points
        index: usize,
        /// Value at `index`
        previous: f64,
        /// Value at `index + 1`
        next: f64,
    },
}

impl TimeGrid {
    /// `count` evenly spaced points from `start` to `end`, both included.
    pub fn linspace(start: f64, end: f64, count: usize) -> Result<Self, GridError> {
        Self::new(linspace(start, end, count))
    }

    /// Validate an explicit list of times
    pub fn new(times: Vec<f64>) -> Result<Self, GridError> {
        if times.len() < 2 {
            return Err(GridError::TooShort(times.len()));
        }
        if let Some((index, &value)) = times.iter().enumerate().find(|(_, t)| !t.is_finite()) {
            return Err(GridError::NonFinite { index, value });
        }
        if let Some(index) = times.windows(2).position(|w| w[1] <= w[0]) {
            return Err(GridError::NotIncreasing {
                index,
                previous: times[index],
                next: times[index + 1],
            });
        }
        Ok(Self { times })
    }

    /// Report times
    pub fn as_slice(&self) -> &[f64] {
        &self.times
    }

    /// Number of points
    pub fn len(&self) -> usize {
        self.times.len()
    }

    /// Never true for a validated grid
    pub fn is_empty(&self) -> bool {
        self.times.is_empty()
    }

    /// First report time
    pub fn start(&self) -> f64 {
        self.times[0]
    }

    /// Last report time
    pub fn end(&self) -> f64 {
        self.times[self.times.len() - 1]
    }
}

impl TryFrom<Vec<f64>> for TimeGrid {
    type Error = GridError;

    fn try_from(times: Vec<f64>) -> Result<Self, Self::Error> {
        Self::new(times)
    }
}

impl From<TimeGrid> for Vec<f64> {
    fn from(grid: TimeGrid) -> Self {
        grid.times
    }
}

/// `count` evenly spaced values from `start` to `end`, both included.
///
/// One value yields `[start]`; zero yields an empty vector. The last value is
/// exactly `end`.
pub fn linspace(start: f64, end: f64, count: usize) -> Vec<f64> {
    match count {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (end - start) / (count - 1) as f64;
            let mut values: Vec<f64> = (0..count).map(|i| start + i as f64 * step).collect();
            values[count - 1] = end;
            values
        }
    }
}
