use crate::config::Config;
use crate::model::Record;
use crate::stats::{Accumulator, TimeSeries};
use anyhow::{Context, Result};
use rmp_serde::decode;
use std::{
    fs::File,
    io::{BufReader, BufWriter},
    path::Path,
};

/// Observable computed over a stream of step records.
pub trait Obs {
    fn update(&mut self, record: &Record) -> Result<()>;
    fn report(&self) -> serde_json::Value;
}

/// Raw per-step population counts, ready for plotting against the step
/// index.
pub struct PopSeries {
    n_vir_vec: Vec<usize>,
}

impl PopSeries {
    pub fn new() -> Self {
        Self {
            n_vir_vec: Vec::new(),
        }
    }
}

impl Obs for PopSeries {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.n_vir_vec.push(record.n_vir);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({ "pop_series": self.n_vir_vec })
    }
}

/// Summary statistics of the population size time series.
pub struct PopSize {
    time_series: TimeSeries,
}

impl PopSize {
    pub fn new() -> Self {
        Self {
            time_series: TimeSeries::new(),
        }
    }
}

impl Obs for PopSize {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.time_series.push(record.n_vir as f64);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let report = self.time_series.report();
        serde_json::json!({ "pop_size": report })
    }
}

/// Summary statistics of the population density.
pub struct PopDensity {
    acc: Accumulator,
}

impl PopDensity {
    pub fn new() -> Self {
        Self {
            acc: Accumulator::new(),
        }
    }
}

impl Obs for PopDensity {
    fn update(&mut self, record: &Record) -> Result<()> {
        self.acc.add(record.pop_density);
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        let report = self.acc.report();
        serde_json::json!({ "pop_density": report })
    }
}

/// First step at which the population hit zero, if it ever did.
pub struct Extinction {
    extinct_step: Option<usize>,
}

impl Extinction {
    pub fn new() -> Self {
        Self { extinct_step: None }
    }
}

impl Obs for Extinction {
    fn update(&mut self, record: &Record) -> Result<()> {
        if record.n_vir == 0 && self.extinct_step.is_none() {
            self.extinct_step = Some(record.step);
        }
        Ok(())
    }

    fn report(&self) -> serde_json::Value {
        serde_json::json!({
            "extinction": {
                "extinct": self.extinct_step.is_some(),
                "step": self.extinct_step,
            }
        })
    }
}

/// Replays trajectory files through the observables and writes their
/// reports.
pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    pub fn new(cfg: Config) -> Self {
        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(PopSeries::new()),
            Box::new(PopSize::new()),
            Box::new(PopDensity::new()),
            Box::new(Extinction::new()),
        ];
        Self { cfg, obs_ptr_vec }
    }

    /// Read one trajectory file and feed every record to the observables.
    ///
    /// Each trajectory file holds exactly `n_steps` frames.
    pub fn add_file<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.output.n_steps {
            let record: Record = decode::from_read(&mut reader).context("failed to read record")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(&record).context("failed to update observable")?;
            }
        }
        Ok(())
    }

    /// Write the observable reports as pretty-printed JSON.
    pub fn save_results<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let writer = BufWriter::new(file);

        let reports: Vec<_> = self.obs_ptr_vec.iter().map(|obs| obs.report()).collect();
        serde_json::to_writer_pretty(writer, &reports)?;
        Ok(())
    }
}
