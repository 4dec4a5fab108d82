use std::fmt::{Display, Formatter};

use anyhow::anyhow;

/// Stages of a shuffle run. A run only ever moves forward, one stage at a time.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Init,
    Sharding,
    Shuffling,
    Interleaving,
    Done,
}

impl Phase {
    /// The stage that follows this one, None for [Phase::Done]
    pub fn next(&self) -> Option<Phase> {
        match self {
            Phase::Init => Some(Phase::Sharding),
            Phase::Sharding => Some(Phase::Shuffling),
            Phase::Shuffling => Some(Phase::Interleaving),
            Phase::Interleaving => Some(Phase::Done),
            Phase::Done => None,
        }
    }

    /// Move to `to` if it directly follows the current stage
    pub fn advance(&mut self, to: Phase) -> Result<(), anyhow::Error> {
        match self.next() {
            Some(next) if next == to => {
                log::info!("Phase transition: {} -> {}", self, to);
                *self = to;
                Ok(())
            }
            _ => Err(anyhow!("Invalid phase transition: {} -> {}", self, to)),
        }
    }
}

impl Display for Phase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Phase::Init => "INIT",
            Phase::Sharding => "SHARDING",
            Phase::Shuffling => "SHUFFLING",
            Phase::Interleaving => "INTERLEAVING",
            Phase::Done => "DONE",
        };
        write!(f, "{}", name)
    }
}
