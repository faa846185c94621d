//! Policies map an observation to an action.
//!
//! The world treats every policy as opaque: scripted policies live here,
//! learned ones are supplied by the trainer through the same trait.

mod random;
mod trader;

pub use random::RandomPolicy;
pub use trader::TraderPolicy;

use crate::sim::Action;
use crate::state::Observation;

pub trait Policy: Send {
    fn choose_action(&mut self, observation: &Observation) -> Action;

    /// Short name for logging
    fn name(&self) -> &str {
        "policy"
    }
}

impl<F> Policy for F
where
    F: FnMut(&Observation) -> Action + Send,
{
    fn choose_action(&mut self, observation: &Observation) -> Action {
        self(observation)
    }

    fn name(&self) -> &str {
        "closure"
    }
}
