use crate::config::Config;
use crate::model::{Host, Record, Virion};
use anyhow::{Context, Result};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rmp_serde::{decode, encode};
use serde::{Deserialize, Serialize};
use std::{
    fs::File,
    io::{BufReader, BufWriter, Write},
    path::Path,
};

/// Simulation engine.
///
/// Holds the configuration, the host population, the step counter, the
/// per-step results, and the random number generator, and provides methods
/// to initialize, run, save, and load simulations.
#[derive(Serialize, Deserialize)]
pub struct Engine {
    cfg: Config,
    host: Host,
    step: usize,
    results: Vec<usize>,
    rng: ChaCha12Rng,
}

impl Engine {
    /// Create a new `Engine` with the given configuration and a freshly
    /// seeded host population.
    pub fn generate_initial_condition(cfg: Config) -> Result<Self> {
        let rng = ChaCha12Rng::try_from_os_rng()?;

        let seed = Virion::new(cfg.model.prob_birth, cfg.model.prob_clear);
        let vir_vec = vec![seed; cfg.init.n_vir];
        let host = Host::new(vir_vec, cfg.model.max_pop);

        Ok(Self {
            cfg,
            host,
            step: 0,
            results: Vec::new(),
            rng,
        })
    }

    pub fn cfg(&self) -> &Config {
        &self.cfg
    }

    /// Population size after each update performed so far, in step order.
    pub fn results(&self) -> &[usize] {
        &self.results
    }

    /// Perform `n_steps` updates of the host population, recording each
    /// resulting population size and writing one [`Record`] frame per step
    /// to a binary trajectory file.
    ///
    /// Steps are causally dependent, so they run strictly in sequence.
    /// Calling this again continues the same population from where the
    /// previous run left off.
    pub fn run_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let n_steps = self.cfg.output.n_steps;
        let log_every = (n_steps / 10).max(1);

        for i_step in 0..n_steps {
            let n_vir = self.host.update(&mut self.rng);
            self.results.push(n_vir);

            let record = Record {
                step: self.step,
                n_vir,
                pop_density: self.host.pop_density(),
            };
            encode::write(&mut writer, &record).context("failed to serialize record")?;

            self.step += 1;

            if (i_step + 1) % log_every == 0 {
                let progress = 100.0 * (i_step + 1) as f64 / n_steps as f64;
                log::info!("completed {progress:06.2}%");
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }

    /// Save a checkpoint of the entire engine state.
    ///
    /// Can be used to resume the simulation later.
    pub fn save_checkpoint<P: AsRef<Path>>(&self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);
        encode::write(&mut writer, &self).context("failed to serialize engine")?;
        Ok(())
    }

    /// Load a previously saved engine checkpoint.
    pub fn load_checkpoint<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);
        let engine = decode::from_read(&mut reader).context("failed to deserialize engine")?;
        Ok(engine)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{InitConfig, ModelConfig, OutputConfig};

    fn test_cfg(
        n_steps: usize,
        prob_birth: f64,
        prob_clear: f64,
        max_pop: usize,
        n_vir: usize,
    ) -> Config {
        Config {
            model: ModelConfig {
                prob_birth,
                prob_clear,
                max_pop,
            },
            init: InitConfig { n_vir },
            output: OutputConfig { n_steps },
        }
    }

    #[test]
    fn full_clearance_run_records_zero() {
        let tmp_dir = tempfile::tempdir().expect("create tmp dir");

        let cfg = test_cfg(1, 0.05, 1.0, 100, 10);
        let mut engine = Engine::generate_initial_condition(cfg).expect("create engine");
        engine
            .run_simulation(tmp_dir.path().join("trajectory-0000.msgpack"))
            .expect("run simulation");

        assert_eq!(engine.results(), &[0]);
    }

    #[test]
    fn empty_host_run_records_zeros() {
        let tmp_dir = tempfile::tempdir().expect("create tmp dir");

        let cfg = test_cfg(5, 0.05, 0.01, 100, 0);
        let mut engine = Engine::generate_initial_condition(cfg).expect("create engine");
        engine
            .run_simulation(tmp_dir.path().join("trajectory-0000.msgpack"))
            .expect("run simulation");

        assert_eq!(engine.results(), &[0, 0, 0, 0, 0]);
    }

    #[test]
    fn results_gain_one_entry_per_step() {
        let tmp_dir = tempfile::tempdir().expect("create tmp dir");

        let cfg = test_cfg(20, 0.05, 0.1, 100, 50);
        let mut engine = Engine::generate_initial_condition(cfg).expect("create engine");
        engine
            .run_simulation(tmp_dir.path().join("trajectory-0000.msgpack"))
            .expect("run simulation");

        assert_eq!(engine.results().len(), 20);
    }

    #[test]
    fn checkpoint_roundtrip_continues_run() {
        let tmp_dir = tempfile::tempdir().expect("create tmp dir");

        let cfg = test_cfg(3, 0.9, 0.0, 100, 50);
        let mut engine = Engine::generate_initial_condition(cfg.clone()).expect("create engine");
        engine
            .run_simulation(tmp_dir.path().join("trajectory-0000.msgpack"))
            .expect("run simulation");
        assert_eq!(engine.results(), &[50, 50, 50]);

        let checkpoint = tmp_dir.path().join("checkpoint.msgpack");
        engine.save_checkpoint(&checkpoint).expect("save checkpoint");

        let mut engine = Engine::load_checkpoint(&checkpoint).expect("load checkpoint");
        assert_eq!(engine.cfg(), &cfg);
        assert_eq!(engine.results(), &[50, 50, 50]);

        engine
            .run_simulation(tmp_dir.path().join("trajectory-0001.msgpack"))
            .expect("resume simulation");
        assert_eq!(engine.results(), &[50; 6]);
    }
}
