use crate::config::CustomerConfig;
use crate::space::{Field, Point};
use rand::prelude::*;
use rand_distr::{Bernoulli, Uniform};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Index of a supermarket in the world's registration order.
pub type OutletId = usize;

/// Pricing strategy of a supermarket, fixed for the whole run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Strategy {
    /// Every day low price: the margin never changes.
    #[serde(rename = "EDLP")]
    Edlp,
    /// Margin follows the change in the number of visitors.
    Dynamic,
    /// Margin drifts by a random amount each step.
    #[serde(alias = "random-dynamic")]
    RandomDynamic,
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Strategy::Edlp => "EDLP",
            Strategy::Dynamic => "Dynamic",
            Strategy::RandomDynamic => "RandomDynamic",
        };
        f.write_str(label)
    }
}

/// Price update parameters shared by all supermarkets.
pub struct Pricing {
    /// Margin step of the `Dynamic` strategy.
    pub step: f64,
    /// Margin perturbation of the `RandomDynamic` strategy.
    pub fluctuation: Uniform<f64>,
}

/// Supermarket agent.
#[derive(Debug, Clone)]
pub struct Outlet {
    id: OutletId,
    location: Point,
    base_price: f64,
    price_margin: f64,
    strategy: Strategy,
    experience: f64,

    // Visits since the last price adjustment and the count seen by the one before.
    visits: u32,
    prev_visits: u32,
    // Visits received during the current step, regardless of activation order.
    visits_today: u32,

    profit: f64,
    price_hist: Vec<f64>,
    visit_hist: Vec<u32>,
}

impl Outlet {
    pub fn new(
        id: OutletId,
        location: Point,
        base_price: f64,
        price_margin: f64,
        strategy: Strategy,
        experience: f64,
    ) -> Self {
        Self {
            id,
            location,
            base_price,
            price_margin,
            strategy,
            experience,
            visits: 0,
            prev_visits: 0,
            visits_today: 0,
            profit: 0.0,
            price_hist: Vec::new(),
            visit_hist: Vec::new(),
        }
    }

    pub fn id(&self) -> OutletId {
        self.id
    }

    pub fn location(&self) -> &Point {
        &self.location
    }

    pub fn strategy(&self) -> Strategy {
        self.strategy
    }

    pub fn experience(&self) -> f64 {
        self.experience
    }

    pub fn price_margin(&self) -> f64 {
        self.price_margin
    }

    pub fn avg_price(&self) -> f64 {
        self.base_price + self.price_margin
    }

    pub fn profit(&self) -> f64 {
        self.profit
    }

    pub fn visits_today(&self) -> u32 {
        self.visits_today
    }

    pub fn price_hist(&self) -> &[f64] {
        &self.price_hist
    }

    pub fn visit_hist(&self) -> &[u32] {
        &self.visit_hist
    }

    /// Register a customer visit paying `payment`.
    pub fn record_visit(&mut self, payment: f64) {
        self.visits += 1;
        self.visits_today += 1;
        self.profit += payment;
    }

    /// Reset the per-step visit counter before any agent is activated.
    pub fn begin_step(&mut self) {
        self.visits_today = 0;
    }

    /// Adjust the price and roll the visit counters over.
    pub fn step<R: Rng>(&mut self, pricing: &Pricing, rng: &mut R) {
        self.adjust_price(pricing, rng);

        self.price_hist.push(self.avg_price());
        self.visit_hist.push(self.visits);
        self.prev_visits = self.visits;
        self.visits = 0;
    }

    fn adjust_price<R: Rng>(&mut self, pricing: &Pricing, rng: &mut R) {
        match self.strategy {
            Strategy::Edlp => {}
            Strategy::Dynamic => {
                if self.visits > self.prev_visits {
                    self.price_margin += pricing.step;
                } else if self.visits < self.prev_visits {
                    self.price_margin -= pricing.step;
                }
                self.price_margin = self
                    .price_margin
                    .clamp(-0.4 * self.base_price, 2.0 * self.base_price);
            }
            Strategy::RandomDynamic => {
                let fluctuation = pricing.fluctuation.sample(rng);
                self.price_margin = (self.price_margin + fluctuation).max(0.0);
            }
        }
    }
}

/// Customer that picks the supermarket with the lowest cost every step.
#[derive(Debug, Clone)]
pub struct FlexibleCustomer {
    id: usize,
    location: Point,
    loyalty: Vec<f64>,
    last_visited: Option<OutletId>,
}

impl FlexibleCustomer {
    /// Create a customer with zero loyalty to each of `n_outlets` supermarkets.
    pub fn new(id: usize, location: Point, n_outlets: usize) -> Self {
        Self {
            id,
            location,
            loyalty: vec![0.0; n_outlets],
            last_visited: None,
        }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn location(&self) -> &Point {
        &self.location
    }

    pub fn loyalty(&self) -> &[f64] {
        &self.loyalty
    }

    pub fn last_visited(&self) -> Option<OutletId> {
        self.last_visited
    }

    /// Cost of shopping at `outlet`; lower is better.
    pub fn utility(&self, outlet: &Outlet, field: &Field, cfg: &CustomerConfig) -> f64 {
        let distance = field.distance(&self.location, outlet.location());
        cfg.distance_weight * distance
            + cfg.price_weight * outlet.avg_price()
            + cfg.experience_weight * (1.0 - outlet.experience())
            + cfg.loyalty_weight * -self.loyalty[outlet.id()]
    }

    /// Supermarket with the strictly lowest cost, the first one on ties.
    pub fn choose(
        &self,
        outlets: &[Outlet],
        field: &Field,
        cfg: &CustomerConfig,
    ) -> Option<OutletId> {
        let mut best: Option<(OutletId, f64)> = None;
        for outlet in outlets {
            let utility = self.utility(outlet, field, cfg);
            if best.is_none_or(|(_, best_utility)| utility < best_utility) {
                best = Some((outlet.id(), utility));
            }
        }
        best.map(|(id, _)| id)
    }

    fn update_loyalty(&mut self, chosen: OutletId, cfg: &CustomerConfig) {
        if let Some(last) = self.last_visited.filter(|&last| last != chosen) {
            self.loyalty[last] = (self.loyalty[last] - cfg.loyalty_decrement).max(0.0);
        }
        self.loyalty[chosen] = (self.loyalty[chosen] + cfg.loyalty_increase).min(cfg.max_loyalty);
        self.last_visited = Some(chosen);
    }

    /// Choose a supermarket, update loyalty and pay the visit.
    pub fn step(
        &mut self,
        outlets: &mut [Outlet],
        field: &Field,
        cfg: &CustomerConfig,
    ) -> Option<OutletId> {
        let chosen = self.choose(outlets, field, cfg)?;
        self.update_loyalty(chosen, cfg);

        let payment = cfg.normal_payment + outlets[chosen].price_margin();
        outlets[chosen].record_visit(payment);
        log::trace!("customer {} visited supermarket {chosen}", self.id);

        Some(chosen)
    }
}

/// Customer permanently bound to one supermarket.
#[derive(Debug, Clone)]
pub struct LoyalCustomer {
    id: usize,
    location: Point,
    outlet: OutletId,
}

impl LoyalCustomer {
    pub fn new(id: usize, location: Point, outlet: OutletId) -> Self {
        Self { id, location, outlet }
    }

    pub fn id(&self) -> usize {
        self.id
    }

    pub fn location(&self) -> &Point {
        &self.location
    }

    pub fn outlet(&self) -> OutletId {
        self.outlet
    }

    pub fn step(&self, outlets: &mut [Outlet], cfg: &CustomerConfig) -> OutletId {
        outlets[self.outlet].record_visit(cfg.loyal_payment);
        log::trace!("loyal customer {} visited supermarket {}", self.id, self.outlet);
        self.outlet
    }
}

/// Either kind of customer.
#[derive(Debug, Clone)]
pub enum Customer {
    Flexible(FlexibleCustomer),
    Loyal(LoyalCustomer),
}

impl Customer {
    /// Go shopping with probability given by `visit_dist`.
    ///
    /// Returns the visited supermarket, if any.
    pub fn step<R: Rng>(
        &mut self,
        outlets: &mut [Outlet],
        field: &Field,
        cfg: &CustomerConfig,
        visit_dist: &Bernoulli,
        rng: &mut R,
    ) -> Option<OutletId> {
        if !visit_dist.sample(rng) {
            return None;
        }
        match self {
            Customer::Flexible(customer) => customer.step(outlets, field, cfg),
            Customer::Loyal(customer) => Some(customer.step(outlets, cfg)),
        }
    }

    pub fn location(&self) -> &Point {
        match self {
            Customer::Flexible(customer) => customer.location(),
            Customer::Loyal(customer) => customer.location(),
        }
    }
}

/// Column label combining strategy and index.
pub fn outlet_label(strategy: Strategy, id: OutletId) -> String {
    format!("supermarket_{strategy}_{id}")
}

/// Entry of the activation registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AgentId {
    Outlet(OutletId),
    Customer(usize),
}

/// State of one supermarket at the end of a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutletRecord {
    pub id: OutletId,
    pub strategy: Strategy,
    /// Latest recorded average price.
    pub price: f64,
    pub margin: f64,
    /// Visits received during the step.
    pub visits: u32,
    /// Visits counted by the supermarket's own price adjustment.
    pub counted_visits: u32,
    /// Cumulative profit.
    pub profit: f64,
}

impl OutletRecord {
    pub fn new(outlet: &Outlet) -> Self {
        Self {
            id: outlet.id(),
            strategy: outlet.strategy(),
            price: outlet.price_hist().last().copied().unwrap_or(outlet.avg_price()),
            margin: outlet.price_margin(),
            visits: outlet.visits_today(),
            counted_visits: outlet.visit_hist().last().copied().unwrap_or(0),
            profit: outlet.profit(),
        }
    }

    pub fn label(&self) -> String {
        outlet_label(self.strategy, self.id)
    }
}

/// Record of the simulation at a single step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    /// Simulation step, starting at 1.
    pub step: usize,

    /// Supermarkets in registration order.
    pub outlets: Vec<OutletRecord>,
}
