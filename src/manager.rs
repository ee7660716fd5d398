use crate::analysis::Analyzer;
use crate::config::Config;
use crate::engine::World;
use anyhow::{Context, Result};
use glob::glob;
use std::{
    fs,
    path::{Path, PathBuf},
};

const OUTPUT_FILES: [&str; 5] = [
    "customers_over_time.csv",
    "counted_customers_over_time.csv",
    "profits_over_time.csv",
    "prices_over_time.csv",
    "summary.csv",
];

/// Simulation directory: a `config.toml` plus one `run-NNNN` directory per run.
pub struct Manager {
    sim_dir: PathBuf,
    cfg: Config,
}

impl Manager {
    pub fn new<P: AsRef<Path>>(sim_dir: P) -> Result<Self> {
        let sim_dir = sim_dir.as_ref().to_path_buf();

        let cfg =
            Config::from_file(sim_dir.join("config.toml")).context("failed to construct cfg")?;
        log::info!("{cfg:#?}");

        Ok(Self { sim_dir, cfg })
    }

    /// Perform one new run.
    pub fn create_run(&self) -> Result<()> {
        let run_idx = self.count_run_dirs().context("failed to count run dirs")?;

        let run_dir = self.run_dir(run_idx);
        fs::create_dir_all(&run_dir).with_context(|| format!("failed to create {run_dir:?}"))?;
        log::info!("created {run_dir:?}");

        let mut world = World::generate_initial_condition(self.cfg.clone(), run_idx)
            .context("failed to generate initial condition")?;

        let trajectory_file = self.trajectory_file(run_idx);
        world
            .perform_simulation(&trajectory_file)
            .context("failed to perform simulation")?;
        log::info!("wrote {trajectory_file:?}");

        Ok(())
    }

    /// Perform the configured number of new runs.
    pub fn sweep(&self) -> Result<()> {
        let n_sims = self.cfg.run.n_sims;
        for i_sim in 0..n_sims {
            log::info!("running simulation {}/{n_sims}", i_sim + 1);
            self.create_run()?;
        }
        Ok(())
    }

    /// Write the per-step tables and the summary of all runs.
    pub fn analyze_sim(&self) -> Result<()> {
        let mut analyzer =
            Analyzer::new(self.cfg.clone(), &self.sim_dir).context("failed to construct analyzer")?;

        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            analyzer
                .add_file(run_idx, self.trajectory_file(run_idx))
                .context("failed to add file")?;
        }

        analyzer.finish().context("failed to save results")?;
        log::info!("analyzed {n_runs} runs");

        Ok(())
    }

    /// Remove all runs and analysis outputs, keeping the configuration.
    pub fn clean_sim(&self) -> Result<()> {
        let n_runs = self.count_run_dirs().context("failed to count run dirs")?;
        for run_idx in 0..n_runs {
            let run_dir = self.run_dir(run_idx);
            fs::remove_dir_all(&run_dir).with_context(|| format!("failed to remove {run_dir:?}"))?;
            log::info!("removed {run_dir:?}");
        }

        for name in OUTPUT_FILES {
            let file = self.sim_dir.join(name);
            if file.exists() {
                fs::remove_file(&file).with_context(|| format!("failed to remove {file:?}"))?;
                log::info!("removed {file:?}");
            }
        }

        Ok(())
    }

    fn count_run_dirs(&self) -> Result<usize> {
        let pattern = self.sim_dir.join("run-*");
        let pattern = pattern.to_str().context("pattern is not valid UTF-8")?;
        let count = glob(pattern)
            .context("failed to glob run dirs")?
            .filter_map(Result::ok)
            .filter(|p| p.is_dir())
            .count();
        Ok(count)
    }

    fn run_dir(&self, run_idx: usize) -> PathBuf {
        self.sim_dir.join(format!("run-{run_idx:04}"))
    }

    fn trajectory_file(&self, run_idx: usize) -> PathBuf {
        self.run_dir(run_idx).join("trajectory.msgpack")
    }
}
