//! Dispatch attempt state machine
//!
//! Each attempt moves strictly forward:
//! Scored -> Selected -> ChainChecked -> CircuitChecked -> Dispatched,
//! with Suppressed reachable from every non-terminal phase after scoring.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Phase of a single dispatch attempt
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DispatchPhase {
    /// Every specialist has a score
    Scored,
    /// A winner cleared the confidence floor
    Selected,
    /// The chain ledger allowed the winner
    ChainChecked,
    /// The circuit breaker allowed the winner
    CircuitChecked,
    /// Both ledgers updated and the decision returned
    Dispatched,
    /// Nothing actionable for the caller
    Suppressed,
}

impl DispatchPhase {
    /// Phases reachable from this one
    pub fn valid_transitions(&self) -> &'static [DispatchPhase] {
        use DispatchPhase::*;
        match self {
            Scored => &[Selected, Suppressed],
            Selected => &[ChainChecked, Suppressed],
            ChainChecked => &[CircuitChecked, Suppressed],
            CircuitChecked => &[Dispatched],
            Dispatched | Suppressed => &[],
        }
    }

    pub fn can_transition_to(&self, next: &DispatchPhase) -> bool {
        self.valid_transitions().contains(next)
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, DispatchPhase::Dispatched | DispatchPhase::Suppressed)
    }
}

/// Ordered record of the phases one attempt went through
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DispatchTrace {
    phases: Vec<DispatchPhase>,
}

impl DispatchTrace {
    pub(crate) fn start() -> Self {
        Self {
            phases: vec![DispatchPhase::Scored],
        }
    }

    pub fn current(&self) -> DispatchPhase {
        *self.phases.last().unwrap_or(&DispatchPhase::Scored)
    }

    pub fn phases(&self) -> &[DispatchPhase] {
        &self.phases
    }

    pub(crate) fn advance(&mut self, next: DispatchPhase) -> Result<()> {
        let from = self.current();
        if !from.can_transition_to(&next) {
            return Err(Error::Other(format!(
                "Invalid dispatch transition from {:?} to {:?}",
                from, next
            )));
        }
        tracing::debug!(from = ?from, to = ?next, "Dispatch phase transition");
        self.phases.push(next);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use DispatchPhase::*;

    #[test]
    fn test_happy_path() {
        let mut trace = DispatchTrace::start();
        for next in [Selected, ChainChecked, CircuitChecked, Dispatched] {
            trace.advance(next).unwrap();
        }
        assert_eq!(trace.current(), Dispatched);
        assert!(trace.current().is_terminal());
        assert_eq!(trace.phases().len(), 5);
    }

    #[test]
    fn test_suppression_from_each_check() {
        for path in [vec![], vec![Selected], vec![Selected, ChainChecked]] {
            let mut trace = DispatchTrace::start();
            for next in path {
                trace.advance(next).unwrap();
            }
            trace.advance(Suppressed).unwrap();
            assert_eq!(trace.current(), Suppressed);
        }
    }

    #[test]
    fn test_no_skipping_checks() {
        let mut trace = DispatchTrace::start();
        trace.advance(Selected).unwrap();
        assert!(trace.advance(Dispatched).is_err());
        assert!(trace.advance(CircuitChecked).is_err());
        assert_eq!(trace.current(), Selected);
    }

    #[test]
    fn test_terminal_phases_are_final() {
        assert!(Dispatched.valid_transitions().is_empty());
        assert!(Suppressed.valid_transitions().is_empty());
        assert!(!CircuitChecked.can_transition_to(&Suppressed));
    }
}
