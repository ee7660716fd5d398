use crate::config::Config;
use crate::model::{
    AgentId, Customer, FlexibleCustomer, LoyalCustomer, Outlet, OutletRecord, Pricing, Record,
};
use crate::scheduler::Scheduler;
use crate::space::Field;
use anyhow::{Context, Result, bail};
use rand::prelude::*;
use rand_chacha::ChaCha12Rng;
use rand_distr::{Bernoulli, Uniform};
use rmp_serde::encode;
use std::{
    fs::File,
    io::{BufWriter, Write},
    path::Path,
};

/// Simulation world.
///
/// Owns the field, all agents, the scheduler and the random number generator,
/// and keeps one [`Record`] per completed step.
pub struct World {
    cfg: Config,
    field: Field,
    outlets: Vec<Outlet>,
    customers: Vec<Customer>,
    scheduler: Scheduler,
    pricing: Pricing,
    visit_dist: Bernoulli,
    rng: ChaCha12Rng,
    tick: usize,
    history: Vec<Record>,
}

impl World {
    /// Create the world of run `run_idx` with a random initial condition.
    ///
    /// With a configured seed every run gets its own stream of the same seed,
    /// otherwise the generator is seeded from the OS.
    pub fn generate_initial_condition(cfg: Config, run_idx: usize) -> Result<Self> {
        let rng = match cfg.run.seed {
            Some(seed) => {
                let mut rng = ChaCha12Rng::seed_from_u64(seed);
                rng.set_stream(run_idx as u64);
                rng
            }
            None => ChaCha12Rng::try_from_os_rng()?,
        };
        Self::new(cfg, rng)
    }

    /// Create a new `World`, placing all agents with the given generator.
    pub fn new(cfg: Config, mut rng: ChaCha12Rng) -> Result<Self> {
        let market = &cfg.market;
        if market.strategies.is_empty() {
            bail!("at least one supermarket is required");
        }
        if market.strategies.len() != market.n_outlets {
            bail!("number of strategies does not match number of supermarkets");
        }

        let field = Field::new(market.width, market.height).context("failed to create field")?;
        let fluctuation = market.price_fluctuation;
        let pricing = Pricing {
            step: market.price_adjustment,
            fluctuation: Uniform::new_inclusive(-fluctuation, fluctuation)?,
        };
        let visit_dist = Bernoulli::new(cfg.customers.prob_visit)?;

        let mut outlets = Vec::with_capacity(market.n_outlets);
        for (id, &strategy) in market.strategies.iter().enumerate() {
            let location = field.sample_inset_point(market.location_factor, &mut rng);
            let experience = rng.random::<f64>();
            log::debug!(
                "supermarket {id} ({strategy}) at {location:?}, experience {experience:.3}"
            );
            outlets.push(Outlet::new(
                id,
                location,
                market.base_price,
                market.price_margin,
                strategy,
                experience,
            ));
        }

        let n_customers = cfg.customers.n_customers;
        let n_loyal = (n_customers as f64 * cfg.customers.frac_loyal) as usize;
        let mut customers = Vec::with_capacity(n_customers);
        for id in 0..n_loyal {
            let location = field.sample_point(&mut rng);
            let outlet = rng.random_range(0..outlets.len());
            customers.push(Customer::Loyal(LoyalCustomer::new(id, location, outlet)));
        }
        for id in n_loyal..n_customers {
            let location = field.sample_point(&mut rng);
            customers.push(Customer::Flexible(FlexibleCustomer::new(id, location, outlets.len())));
        }
        log::debug!(
            "created {} supermarkets, {n_loyal} loyal and {} flexible customers",
            outlets.len(),
            n_customers - n_loyal
        );

        let mut agents: Vec<_> = (0..outlets.len()).map(AgentId::Outlet).collect();
        agents.extend((0..customers.len()).map(AgentId::Customer));
        let scheduler = Scheduler::new(agents);

        Ok(Self {
            cfg,
            field,
            outlets,
            customers,
            scheduler,
            pricing,
            visit_dist,
            rng,
            tick: 0,
            history: Vec::new(),
        })
    }

    pub fn field(&self) -> &Field {
        &self.field
    }

    pub fn outlets(&self) -> &[Outlet] {
        &self.outlets
    }

    pub fn customers(&self) -> &[Customer] {
        &self.customers
    }

    /// Number of completed steps.
    pub fn tick(&self) -> usize {
        self.tick
    }

    /// Records of all completed steps.
    pub fn history(&self) -> &[Record] {
        &self.history
    }

    /// Activate every agent once in random order and record the outcome.
    pub fn advance_tick(&mut self) -> &Record {
        for outlet in &mut self.outlets {
            outlet.begin_step();
        }

        let order = self.scheduler.activation_order(&mut self.rng);
        for &agent in order {
            match agent {
                AgentId::Outlet(i_outlet) => {
                    self.outlets[i_outlet].step(&self.pricing, &mut self.rng)
                }
                AgentId::Customer(i_customer) => {
                    self.customers[i_customer].step(
                        &mut self.outlets,
                        &self.field,
                        &self.cfg.customers,
                        &self.visit_dist,
                        &mut self.rng,
                    );
                }
            }
        }

        self.tick += 1;
        let record = Record {
            step: self.tick,
            outlets: self.outlets.iter().map(OutletRecord::new).collect(),
        };
        log::debug!(
            "step {}: {} visits",
            self.tick,
            record.outlets.iter().map(|rec| rec.visits).sum::<u32>()
        );
        self.history.push(record);

        &self.history[self.history.len() - 1]
    }

    /// Advance `n_ticks` steps.
    pub fn run(&mut self, n_ticks: usize) {
        for _ in 0..n_ticks {
            self.advance_tick();
        }
    }

    /// Perform the configured number of steps and save the records to a binary file.
    pub fn perform_simulation<P: AsRef<Path>>(&mut self, file: P) -> Result<()> {
        let file = file.as_ref();
        let file = File::create(file).with_context(|| format!("failed to create {file:?}"))?;
        let mut writer = BufWriter::new(file);

        let n_steps = self.cfg.run.n_steps;
        let mut next_report = 1;
        for i_step in 0..n_steps {
            let record = self.advance_tick();
            encode::write(&mut writer, record).context("failed to serialize record")?;

            if 10 * (i_step + 1) >= next_report * n_steps {
                let progress = 100.0 * (i_step + 1) as f64 / n_steps as f64;
                log::info!("completed {progress:06.2}%");
                next_report = 10 * (i_step + 1) / n_steps + 1;
            }
        }

        writer.flush().context("failed to flush writer stream")?;

        Ok(())
    }
}
