use crate::config::Config;
use crate::model::{OutletRecord, Record, outlet_label};
use crate::stats::Accumulator;
use anyhow::{Context, Result};
use csv::Writer;
use rmp_serde::decode;
use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

/// Consumer of the records of every run.
pub trait Obs {
    fn update(&mut self, run_idx: usize, record: &Record) -> Result<()>;
    fn finish(&mut self) -> Result<()>;
}

/// Per-step table with one column per supermarket, runs concatenated.
pub struct Table {
    writer: Writer<File>,
    value: fn(&OutletRecord) -> String,
}

impl Table {
    pub fn new<P: AsRef<Path>>(
        file: P,
        labels: &[String],
        value: fn(&OutletRecord) -> String,
    ) -> Result<Self> {
        let file = file.as_ref();
        let mut writer =
            Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;

        let mut header = vec!["run".to_string(), "step".to_string()];
        header.extend_from_slice(labels);
        writer.write_record(&header).context("failed to write header")?;

        Ok(Self { writer, value })
    }
}

impl Obs for Table {
    fn update(&mut self, run_idx: usize, record: &Record) -> Result<()> {
        let mut row = vec![run_idx.to_string(), record.step.to_string()];
        row.extend(record.outlets.iter().map(self.value));
        self.writer.write_record(&row).context("failed to write row")?;
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        self.writer.flush().context("failed to flush table")?;
        Ok(())
    }
}

#[derive(Default)]
struct OutletSummary {
    final_profit: Accumulator,
    price: Accumulator,
    visits: Accumulator,
}

/// Cross-run statistics per supermarket.
pub struct Summary {
    file: PathBuf,
    labels: Vec<String>,
    n_steps: usize,
    outlets: Vec<OutletSummary>,
}

impl Summary {
    pub fn new<P: AsRef<Path>>(file: P, labels: &[String], n_steps: usize) -> Self {
        let mut outlets = Vec::new();
        outlets.resize_with(labels.len(), OutletSummary::default);
        Self {
            file: file.as_ref().to_path_buf(),
            labels: labels.to_vec(),
            n_steps,
            outlets,
        }
    }
}

impl Obs for Summary {
    fn update(&mut self, _run_idx: usize, record: &Record) -> Result<()> {
        for (summary, rec) in self.outlets.iter_mut().zip(&record.outlets) {
            summary.price.add(rec.price);
            summary.visits.add(rec.visits as f64);
            if record.step == self.n_steps {
                summary.final_profit.add(rec.profit);
            }
        }
        Ok(())
    }

    fn finish(&mut self) -> Result<()> {
        let file = &self.file;
        let mut writer =
            Writer::from_path(file).with_context(|| format!("failed to create {file:?}"))?;
        writer.write_record([
            "label",
            "mean_final_profit",
            "std_final_profit",
            "mean_price",
            "std_price",
            "mean_visits",
            "std_visits",
            "min_price",
            "max_price",
        ])?;
        for (label, summary) in self.labels.iter().zip(&self.outlets) {
            writer.write_record([
                label.clone(),
                summary.final_profit.mean().to_string(),
                summary.final_profit.std_dev().to_string(),
                summary.price.mean().to_string(),
                summary.price.std_dev().to_string(),
                summary.visits.mean().to_string(),
                summary.visits.std_dev().to_string(),
                summary.price.min().to_string(),
                summary.price.max().to_string(),
            ])?;
        }
        writer.flush().context("failed to flush summary")?;
        Ok(())
    }
}

/// Reads trajectory files and feeds their records to all observers.
pub struct Analyzer {
    cfg: Config,
    obs_ptr_vec: Vec<Box<dyn Obs>>,
}

impl Analyzer {
    /// Create an analyzer writing its tables into `out_dir`.
    pub fn new<P: AsRef<Path>>(cfg: Config, out_dir: P) -> Result<Self> {
        let out_dir = out_dir.as_ref();
        let labels: Vec<_> = cfg
            .market
            .strategies
            .iter()
            .enumerate()
            .map(|(id, &strategy)| outlet_label(strategy, id))
            .collect();

        let obs_ptr_vec: Vec<Box<dyn Obs>> = vec![
            Box::new(Table::new(
                out_dir.join("customers_over_time.csv"),
                &labels,
                |rec| rec.visits.to_string(),
            )?),
            Box::new(Table::new(
                out_dir.join("counted_customers_over_time.csv"),
                &labels,
                |rec| rec.counted_visits.to_string(),
            )?),
            Box::new(Table::new(
                out_dir.join("profits_over_time.csv"),
                &labels,
                |rec| rec.profit.to_string(),
            )?),
            Box::new(Table::new(
                out_dir.join("prices_over_time.csv"),
                &labels,
                |rec| rec.price.to_string(),
            )?),
            Box::new(Summary::new(
                out_dir.join("summary.csv"),
                &labels,
                cfg.run.n_steps,
            )),
        ];

        Ok(Self { cfg, obs_ptr_vec })
    }

    pub fn add_file<P: AsRef<Path>>(&mut self, run_idx: usize, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::open(file).with_context(|| format!("failed to open {file:?}"))?;
        let mut reader = BufReader::new(file);

        for _ in 0..self.cfg.run.n_steps {
            let record: Record = decode::from_read(&mut reader).context("failed to read record")?;
            for obs in &mut self.obs_ptr_vec {
                obs.update(run_idx, &record)
                    .context("failed to update observable")?;
            }
        }
        Ok(())
    }

    pub fn finish(&mut self) -> Result<()> {
        for obs in &mut self.obs_ptr_vec {
            obs.finish().context("failed to finish observable")?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::sample_config;
    use crate::engine::World;
    use rand::prelude::*;
    use rand_chacha::ChaCha12Rng;
    use std::fs;

    #[test]
    fn tables_have_one_row_per_step_and_run() {
        let mut cfg = sample_config();
        cfg.run.n_steps = 12;
        let dir = std::env::temp_dir().join(format!("marketsim-analysis-{}", std::process::id()));
        fs::create_dir_all(&dir).unwrap();

        let mut analyzer = Analyzer::new(cfg.clone(), &dir).unwrap();
        for run_idx in 0..2 {
            let mut world = World::new(cfg.clone(), ChaCha12Rng::seed_from_u64(run_idx)).unwrap();
            let file = dir.join(format!("trajectory-{run_idx}.msgpack"));
            world.perform_simulation(&file).unwrap();
            analyzer.add_file(run_idx as usize, &file).unwrap();
        }
        analyzer.finish().unwrap();

        let customers = fs::read_to_string(dir.join("customers_over_time.csv")).unwrap();
        let lines: Vec<_> = customers.lines().collect();
        assert_eq!(lines[0], "run,step,supermarket_EDLP_0,supermarket_Dynamic_1");
        assert_eq!(lines.len(), 1 + 2 * 12);
        assert!(lines[1].starts_with("0,1,"));
        assert!(lines[24].starts_with("1,12,"));
        for line in &lines[1..] {
            let visits: u32 = line.split(',').skip(2).map(|v| v.parse::<u32>().unwrap()).sum();
            assert_eq!(visits, 100);
        }

        // Visits the pricing rule saw lag behind the visits of the step, but
        // every one of them is counted exactly once by the end of the run.
        let counted = fs::read_to_string(dir.join("counted_customers_over_time.csv")).unwrap();
        let lines: Vec<_> = counted.lines().collect();
        assert_eq!(lines[0], "run,step,supermarket_EDLP_0,supermarket_Dynamic_1");
        assert_eq!(lines.len(), 1 + 2 * 12);
        let counted_run_0: u32 = lines[1..=12]
            .iter()
            .flat_map(|line| line.split(',').skip(2))
            .map(|v| v.parse::<u32>().unwrap())
            .sum();
        assert!((12 * 100 - 100..=12 * 100).contains(&counted_run_0));

        let summary = fs::read_to_string(dir.join("summary.csv")).unwrap();
        assert_eq!(summary.lines().count(), 3);
        assert!(summary.lines().nth(2).unwrap().starts_with("supermarket_Dynamic_1,"));

        fs::remove_dir_all(&dir).ok();
    }
}
