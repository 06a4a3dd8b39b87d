//! Sampled solutions

use std::io::Write;

use serde::Serialize;

use crate::model::State;

/// States of one integration, one per report time, in time order.
#[derive(Debug, Clone, PartialEq)]
pub struct Trajectory {
    times: Vec<f64>,
    states: Vec<State>,
}

/// One CSV line: `[i0,]t,S,I,R`
#[derive(Serialize)]
pub(crate) struct Row {
    #[serde(skip_serializing_if = "Option::is_none")]
    i0: Option<f64>,
    t: f64,
    #[serde(rename = "S")]
    s: f64,
    #[serde(rename = "I")]
    i: f64,
    #[serde(rename = "R")]
    r: f64,
}

impl Row {
    pub(crate) fn new(i0: Option<f64>, t: f64, state: &State) -> Self {
        Self {
            i0,
            t,
            s: state.s,
            i: state.i,
            r: state.r,
        }
    }
}

impl Trajectory {
    /// Pair report times with states.
    ///
    /// # Panics
    /// If the two vectors differ in length.
    pub fn new(times: Vec<f64>, states: Vec<State>) -> Self {
        assert_eq!(
            times.len(),
            states.len(),
            "trajectory needs one state per report time"
        );
        Self { times, states }
    }

    /// Report times
    pub fn times(&self) -> &[f64] {
        &self.times
    }

    /// States, aligned with [`Trajectory::times`]
    pub fn states(&self) -> &[State] {
        &self.states
    }

    /// Number of samples
    pub fn len(&self) -> usize {
        self.states.len()
    }

    /// Whether there are no samples
    pub fn is_empty(&self) -> bool {
        self.states.is_empty()
    }

    /// `(t, state)` pairs in time order
    pub fn iter(&self) -> impl Iterator<Item = (f64, &State)> + '_ {
        self.times.iter().copied().zip(self.states.iter())
    }

    /// First sample
    pub fn first(&self) -> Option<&State> {
        self.states.first()
    }

    /// Last sample
    pub fn last(&self) -> Option<&State> {
        self.states.last()
    }

    /// S(t) series
    pub fn susceptible(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.s).collect()
    }

    /// I(t) series
    pub fn infected(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.i).collect()
    }

    /// R(t) series
    pub fn recovered(&self) -> Vec<f64> {
        self.states.iter().map(|s| s.r).collect()
    }

    /// Sample with the largest number of infected, as `(t, I)`
    pub fn peak_infected(&self) -> Option<(f64, f64)> {
        self.iter()
            .map(|(t, s)| (t, s.i))
            .max_by(|a, b| a.1.total_cmp(&b.1))
    }

    /// Largest |S + I + R - total| over all samples
    pub fn max_total_deviation(&self, total: f64) -> f64 {
        self.states
            .iter()
            .map(|s| (s.total() - total).abs())
            .fold(0.0, f64::max)
    }

    /// Write `t,S,I,R` rows with a header.
    pub fn write_csv<W: Write>(&self, writer: W) -> Result<(), csv::Error> {
        let mut wtr = csv::Writer::from_writer(writer);
        for (t, state) in self.iter() {
            wtr.serialize(Row::new(None, t, state))?;
        }
        wtr.flush()?;
        Ok(())
    }
}
