use serde::{Deserialize, Serialize};
use std::fmt;

/// Lifecycle of a conditional order as seen by this service.
///
/// ```text
/// Prepared -> Submitted -> Active -> {Filled, Cancelled, Expired}
///                      \-> Rejected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderState {
    Prepared,
    Submitted,
    Active,
    Rejected,
    Filled,
    Cancelled,
    Expired,
}

impl OrderState {
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(
            self,
            OrderState::Filled | OrderState::Cancelled | OrderState::Expired | OrderState::Rejected
        )
    }

    /// Returns true if `self -> next` is an edge of the lifecycle graph.
    #[must_use]
    pub const fn can_transition_to(self, next: OrderState) -> bool {
        matches!(
            (self, next),
            (OrderState::Prepared, OrderState::Submitted)
                | (OrderState::Submitted, OrderState::Active)
                | (OrderState::Submitted, OrderState::Rejected)
                | (OrderState::Active, OrderState::Filled)
                | (OrderState::Active, OrderState::Cancelled)
                | (OrderState::Active, OrderState::Expired)
        )
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            OrderState::Prepared => "PREPARED",
            OrderState::Submitted => "SUBMITTED",
            OrderState::Active => "ACTIVE",
            OrderState::Rejected => "REJECTED",
            OrderState::Filled => "FILLED",
            OrderState::Cancelled => "CANCELLED",
            OrderState::Expired => "EXPIRED",
        }
    }
}

impl fmt::Display for OrderState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn happy_path_edges() {
        assert!(OrderState::Prepared.can_transition_to(OrderState::Submitted));
        assert!(OrderState::Submitted.can_transition_to(OrderState::Active));
        assert!(OrderState::Active.can_transition_to(OrderState::Filled));
    }

    #[test]
    fn terminal_states_have_no_exits() {
        let all = [
            OrderState::Prepared,
            OrderState::Submitted,
            OrderState::Active,
            OrderState::Rejected,
            OrderState::Filled,
            OrderState::Cancelled,
            OrderState::Expired,
        ];
        for from in all.iter().copied().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn cannot_skip_submission() {
        assert!(!OrderState::Prepared.can_transition_to(OrderState::Active));
        assert!(!OrderState::Active.can_transition_to(OrderState::Rejected));
    }

    #[test]
    fn serializes_screaming_snake() {
        let json = serde_json::to_string(&OrderState::Cancelled).unwrap();
        assert_eq!(json, "\"CANCELLED\"");
    }
}
