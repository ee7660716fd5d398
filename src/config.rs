use crate::model::Strategy;
use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use std::{fmt::Debug, fs, ops::RangeBounds, path::Path};

/// Simulation configuration parameters.
///
/// Loaded from a TOML file and validated before use.
/// See [`Config::from_file`] for loading.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
    pub market: MarketConfig,
    pub customers: CustomerConfig,
    pub run: RunConfig,
}

/// Field and supermarket parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct MarketConfig {
    /// Number of supermarkets.
    pub n_outlets: usize,

    /// Width of the field.
    pub width: f64,
    /// Height of the field.
    pub height: f64,
    /// Fraction of each side kept free of supermarkets.
    pub location_factor: f64,

    /// Constant part of every supermarket's price.
    #[serde(default = "default_base_price")]
    pub base_price: f64,
    /// Initial price margin.
    pub price_margin: f64,
    /// Margin step of the `Dynamic` strategy.
    pub price_adjustment: f64,
    /// Half-width of the `RandomDynamic` margin fluctuation.
    #[serde(default = "default_price_fluctuation")]
    pub price_fluctuation: f64,

    /// Pricing strategy of each supermarket.
    pub strategies: Vec<Strategy>,
}

/// Customer population and decision parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct CustomerConfig {
    /// Number of customers.
    pub n_customers: usize,
    /// Fraction of customers bound to a single supermarket.
    pub frac_loyal: f64,
    /// Probability that a customer goes shopping on a given step.
    #[serde(default = "default_prob_visit")]
    pub prob_visit: f64,

    /// Payment made by a loyal customer on each visit.
    pub loyal_payment: f64,
    /// Payment made by a flexible customer on each visit (on top of the margin).
    pub normal_payment: f64,

    pub distance_weight: f64,
    pub price_weight: f64,
    pub experience_weight: f64,
    pub loyalty_weight: f64,

    pub loyalty_increase: f64,
    pub loyalty_decrement: f64,
    #[serde(default = "default_max_loyalty")]
    pub max_loyalty: f64,
}

/// Run control parameters.
#[derive(Debug, PartialEq, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct RunConfig {
    /// Number of steps (days) per run.
    pub n_steps: usize,
    /// Number of runs performed by a sweep.
    #[serde(default = "default_n_sims")]
    pub n_sims: usize,
    /// Seed of the random number generator (from the OS if absent).
    pub seed: Option<u64>,
}

fn default_base_price() -> f64 {
    50.0
}

fn default_price_fluctuation() -> f64 {
    0.5
}

fn default_prob_visit() -> f64 {
    1.0
}

fn default_max_loyalty() -> f64 {
    100.0
}

fn default_n_sims() -> usize {
    1
}

impl Config {
    /// Load a [`Config`] from a file.
    ///
    /// The file must be TOML-encoded and contain a serialized [`Config`].
    /// Performs validation on all parameters before returning.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, deserialized,
    /// or if the configuration values are invalid.
    pub fn from_file<P: AsRef<Path>>(file: P) -> Result<Self> {
        let file = file.as_ref();
        let contents =
            fs::read_to_string(file).with_context(|| format!("failed to read {file:?}"))?;
        Self::from_toml(&contents)
    }

    /// Parse and validate a [`Config`] from a TOML string.
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents).context("failed to deserialize config")?;

        config.validate().context("failed to validate config")?;

        Ok(config)
    }

    /// Lowest price margin any supermarket can reach during a run.
    pub fn min_reachable_margin(&self) -> f64 {
        let market = &self.market;
        let mut min_margin = market.price_margin;
        for strategy in &market.strategies {
            match strategy {
                Strategy::Edlp => {}
                Strategy::Dynamic => min_margin = min_margin.min(-0.4 * market.base_price),
                Strategy::RandomDynamic => min_margin = min_margin.min(0.0),
            }
        }
        min_margin
    }

    fn validate(&self) -> Result<()> {
        let market = &self.market;
        check_num(market.n_outlets, 1..10_000).context("invalid number of supermarkets")?;
        let n_strategies = market.strategies.len();
        if n_strategies != market.n_outlets {
            bail!(
                "one pricing strategy per supermarket required ({}), but {n_strategies} given",
                market.n_outlets
            );
        }
        check_num(market.width, f64::MIN_POSITIVE..f64::INFINITY).context("invalid field width")?;
        check_num(market.height, f64::MIN_POSITIVE..f64::INFINITY).context("invalid field height")?;
        check_num(market.location_factor, 0.0..0.5).context("invalid location factor")?;
        check_num(market.base_price, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid base price")?;
        let margin_range = -0.4 * market.base_price..=2.0 * market.base_price;
        check_num(market.price_margin, margin_range).context("invalid initial price margin")?;
        if market.strategies.contains(&Strategy::RandomDynamic) {
            check_num(market.price_margin, 0.0..)
                .context("invalid initial price margin for random dynamic pricing")?;
        }
        check_num(market.price_adjustment, 0.0..f64::INFINITY).context("invalid price adjustment")?;
        check_num(market.price_fluctuation, 0.0..f64::INFINITY)
            .context("invalid price fluctuation")?;

        let customers = &self.customers;
        check_num(customers.n_customers, 0..10_000_000).context("invalid number of customers")?;
        check_num(customers.frac_loyal, 0.0..=1.0).context("invalid fraction of loyal customers")?;
        check_num(customers.prob_visit, 0.0..=1.0).context("invalid visit probability")?;
        check_num(customers.loyal_payment, 0.0..f64::INFINITY)
            .context("invalid loyal customer payment")?;
        check_num(customers.normal_payment, 0.0..f64::INFINITY)
            .context("invalid normal customer payment")?;
        check_num(customers.distance_weight, 0.0..f64::INFINITY)
            .context("invalid distance weight")?;
        check_num(customers.price_weight, 0.0..f64::INFINITY).context("invalid price weight")?;
        check_num(customers.experience_weight, 0.0..f64::INFINITY)
            .context("invalid experience weight")?;
        check_num(customers.loyalty_weight, 0.0..f64::INFINITY).context("invalid loyalty weight")?;
        check_num(customers.loyalty_increase, 0.0..f64::INFINITY)
            .context("invalid loyalty increase")?;
        check_num(customers.loyalty_decrement, 0.0..f64::INFINITY)
            .context("invalid loyalty decrement")?;
        check_num(customers.max_loyalty, f64::MIN_POSITIVE..f64::INFINITY)
            .context("invalid maximum loyalty")?;

        // Profit must never decrease, so a visit can never pay less than zero.
        let min_payment = customers.normal_payment + self.min_reachable_margin();
        if min_payment < 0.0 {
            bail!("normal customer payment can drop to {min_payment}, must stay non-negative");
        }

        check_num(self.run.n_steps, 1..10_000_000).context("invalid number of steps")?;
        check_num(self.run.n_sims, 1..100_000).context("invalid number of simulations")?;

        Ok(())
    }
}

fn check_num<T, R>(num: T, range: R) -> Result<()>
where
    T: PartialOrd + Debug,
    R: RangeBounds<T> + Debug,
{
    if !range.contains(&num) {
        bail!("number must be in the range {range:?}, but is {num:?}");
    }
    Ok(())
}

#[cfg(test)]
pub(crate) const SAMPLE_CONFIG: &str = r#"
[market]
n_outlets = 2
width = 260.0
height = 260.0
location_factor = 0.25
price_margin = 20.0
price_adjustment = 10.0
strategies = ["EDLP", "Dynamic"]

[customers]
n_customers = 100
frac_loyal = 0.3
loyal_payment = 35.0
normal_payment = 22.0
distance_weight = 0.4
price_weight = 0.25
experience_weight = 0.13
loyalty_weight = 0.12
loyalty_increase = 20.0
loyalty_decrement = 50.0

[run]
n_steps = 50
seed = 7
"#;

#[cfg(test)]
pub(crate) fn sample_config() -> Config {
    Config::from_toml(SAMPLE_CONFIG).expect("sample config is valid")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sample_config_uses_defaults() {
        let cfg = sample_config();
        assert_eq!(cfg.market.base_price, 50.0);
        assert_eq!(cfg.market.price_fluctuation, 0.5);
        assert_eq!(cfg.customers.prob_visit, 1.0);
        assert_eq!(cfg.customers.max_loyalty, 100.0);
        assert_eq!(cfg.run.n_sims, 1);
        assert_eq!(cfg.run.seed, Some(7));
        assert_eq!(cfg.market.strategies, vec![Strategy::Edlp, Strategy::Dynamic]);
    }

    #[test]
    fn random_dynamic_alias_is_accepted() {
        let contents = SAMPLE_CONFIG.replace(
            r#"["EDLP", "Dynamic"]"#,
            r#"["random-dynamic", "RandomDynamic"]"#,
        );
        let cfg = Config::from_toml(&contents).unwrap();
        assert_eq!(cfg.market.strategies, vec![Strategy::RandomDynamic; 2]);
    }

    #[test]
    fn unknown_strategy_is_rejected() {
        let contents = SAMPLE_CONFIG.replace(r#"["EDLP", "Dynamic"]"#, r#"["EDLP", "HiLo"]"#);
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn zero_outlets_are_rejected() {
        let contents = SAMPLE_CONFIG
            .replace("n_outlets = 2", "n_outlets = 0")
            .replace(r#"["EDLP", "Dynamic"]"#, "[]");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn strategy_count_must_match_outlets() {
        let contents = SAMPLE_CONFIG.replace("n_outlets = 2", "n_outlets = 3");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn negative_dimensions_are_rejected() {
        let contents = SAMPLE_CONFIG.replace("width = 260.0", "width = -1.0");
        assert!(Config::from_toml(&contents).is_err());
        let contents = SAMPLE_CONFIG.replace("n_customers = 100", "n_customers = -5");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn infinite_values_are_rejected() {
        let contents = SAMPLE_CONFIG.replace("width = 260.0", "width = inf");
        assert!(Config::from_toml(&contents).is_err());
        let contents = SAMPLE_CONFIG.replace("height = 260.0", "height = inf");
        assert!(Config::from_toml(&contents).is_err());
        let contents =
            SAMPLE_CONFIG.replace("price_margin = 20.0", "price_margin = 20.0\nbase_price = inf");
        assert!(Config::from_toml(&contents).is_err());
        let contents = SAMPLE_CONFIG.replace("price_weight = 0.25", "price_weight = inf");
        assert!(Config::from_toml(&contents).is_err());
        let contents = SAMPLE_CONFIG.replace("width = 260.0", "width = nan");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn random_dynamic_margin_must_start_non_negative() {
        let negative = SAMPLE_CONFIG.replace("price_margin = 20.0", "price_margin = -5.0");
        assert!(Config::from_toml(&negative).is_ok());

        let contents = negative.replace(r#"["EDLP", "Dynamic"]"#, r#"["EDLP", "RandomDynamic"]"#);
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let contents = SAMPLE_CONFIG.replace("[run]\n", "[run]\nbudget = 3\n");
        assert!(Config::from_toml(&contents).is_err());
    }

    #[test]
    fn payment_must_cover_lowest_margin() {
        // Dynamic margins can reach -20, which a payment of 10 cannot cover.
        let contents = SAMPLE_CONFIG.replace("normal_payment = 22.0", "normal_payment = 10.0");
        assert!(Config::from_toml(&contents).is_err());

        let contents = contents.replace(r#"["EDLP", "Dynamic"]"#, r#"["EDLP", "EDLP"]"#);
        let cfg = Config::from_toml(&contents).unwrap();
        assert_eq!(cfg.min_reachable_margin(), 20.0);
    }
}
