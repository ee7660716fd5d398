use crate::model::AgentId;
use rand::prelude::*;

/// Random activation scheduler.
///
/// Every registered agent is activated exactly once per step, in a fresh
/// uniformly random order.
pub struct Scheduler {
    agents: Vec<AgentId>,
}

impl Scheduler {
    pub fn new(agents: Vec<AgentId>) -> Self {
        Self { agents }
    }

    /// Shuffle the registry and return this step's activation order.
    pub fn activation_order<R: Rng>(&mut self, rng: &mut R) -> &[AgentId] {
        self.agents.shuffle(rng);
        &self.agents
    }
}
