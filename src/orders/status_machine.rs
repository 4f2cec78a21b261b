use crate::orders::OrderStatus;

/// Service for managing order status transitions
pub struct StatusMachine;

impl StatusMachine {
    /// Check if a status transition is valid
    ///
    /// # Valid Transitions
    /// - Pending → Confirmed, Cancelled, Rejected
    /// - Confirmed → Preparing, Cancelled, Rejected
    /// - Preparing → Ready
    /// - Ready → Picked
    /// - Picked → OnTheWay
    /// - OnTheWay → Delivered
    /// - Delivered, Cancelled, Rejected → (absorbing)
    /// - Any status → Same status (at-least-once status update delivery)
    ///
    /// Cancellation and rejection are only reachable while the order is
    /// still pending or confirmed; once the kitchen starts, the order runs
    /// to delivery.
    pub fn is_valid_transition(from: OrderStatus, to: OrderStatus) -> bool {
        // Same status is always valid (idempotent redelivery)
        if from == to {
            return true;
        }

        match (from, to) {
            // From Pending
            (OrderStatus::Pending, OrderStatus::Confirmed) => true,
            (OrderStatus::Pending, OrderStatus::Cancelled) => true,
            (OrderStatus::Pending, OrderStatus::Rejected) => true,

            // From Confirmed
            (OrderStatus::Confirmed, OrderStatus::Preparing) => true,
            (OrderStatus::Confirmed, OrderStatus::Cancelled) => true,
            (OrderStatus::Confirmed, OrderStatus::Rejected) => true,

            // Happy path through fulfilment
            (OrderStatus::Preparing, OrderStatus::Ready) => true,
            (OrderStatus::Ready, OrderStatus::Picked) => true,
            (OrderStatus::Picked, OrderStatus::OnTheWay) => true,
            (OrderStatus::OnTheWay, OrderStatus::Delivered) => true,

            // Absorbing states
            (OrderStatus::Delivered, _) => false,
            (OrderStatus::Cancelled, _) => false,
            (OrderStatus::Rejected, _) => false,

            // All other transitions are invalid
            _ => false,
        }
    }

    /// Attempt to transition from one status to another
    ///
    /// # Returns
    /// `Ok(to)` if the transition is valid, `Err(message)` otherwise
    pub fn transition(from: OrderStatus, to: OrderStatus) -> Result<OrderStatus, String> {
        if Self::is_valid_transition(from, to) {
            Ok(to)
        } else {
            Err(format!("Invalid status transition from {} to {}", from, to))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_happy_path_transitions() {
        let path = [
            OrderStatus::Pending,
            OrderStatus::Confirmed,
            OrderStatus::Preparing,
            OrderStatus::Ready,
            OrderStatus::Picked,
            OrderStatus::OnTheWay,
            OrderStatus::Delivered,
        ];

        for window in path.windows(2) {
            assert!(
                StatusMachine::is_valid_transition(window[0], window[1]),
                "{} -> {} should be valid",
                window[0],
                window[1]
            );
        }
    }

    #[test]
    fn test_cancel_only_from_pending_or_confirmed() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Pending,
            OrderStatus::Cancelled
        ));
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::Cancelled
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Preparing,
            OrderStatus::Cancelled
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Ready,
            OrderStatus::Cancelled
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::OnTheWay,
            OrderStatus::Cancelled
        ));
    }

    #[test]
    fn test_reject_only_from_pending_or_confirmed() {
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Pending,
            OrderStatus::Rejected
        ));
        assert!(StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::Rejected
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Preparing,
            OrderStatus::Rejected
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Delivered,
            OrderStatus::Rejected
        ));
    }

    #[test]
    fn test_no_skipping_ahead() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Pending,
            OrderStatus::Preparing
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::Ready
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Preparing,
            OrderStatus::Delivered
        ));
    }

    #[test]
    fn test_no_moving_backward() {
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Confirmed,
            OrderStatus::Pending
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Ready,
            OrderStatus::Preparing
        ));
        assert!(!StatusMachine::is_valid_transition(
            OrderStatus::Delivered,
            OrderStatus::OnTheWay
        ));
    }

    #[test]
    fn test_transition_function_reports_reason() {
        let result = StatusMachine::transition(OrderStatus::Preparing, OrderStatus::Cancelled);
        assert!(result.is_err());
        assert!(result.unwrap_err().contains("Invalid status transition"));

        let result = StatusMachine::transition(OrderStatus::Pending, OrderStatus::Confirmed);
        assert_eq!(result.unwrap(), OrderStatus::Confirmed);
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    fn order_status_strategy() -> impl Strategy<Value = OrderStatus> {
        prop_oneof![
            Just(OrderStatus::Pending),
            Just(OrderStatus::Confirmed),
            Just(OrderStatus::Preparing),
            Just(OrderStatus::Ready),
            Just(OrderStatus::Picked),
            Just(OrderStatus::OnTheWay),
            Just(OrderStatus::Delivered),
            Just(OrderStatus::Cancelled),
            Just(OrderStatus::Rejected),
        ]
    }

    /// Same-status transitions are always valid (idempotent redelivery)
    #[test]
    fn prop_same_status_is_valid() {
        proptest!(|(status in order_status_strategy())| {
            prop_assert!(StatusMachine::is_valid_transition(status, status));
        });
    }

    /// Delivered, Cancelled, and Rejected are absorbing
    #[test]
    fn prop_terminal_states_are_absorbing() {
        proptest!(|(to_status in order_status_strategy())| {
            for terminal in [
                OrderStatus::Delivered,
                OrderStatus::Cancelled,
                OrderStatus::Rejected,
            ] {
                if to_status != terminal {
                    prop_assert!(
                        !StatusMachine::is_valid_transition(terminal, to_status),
                        "No transition should be allowed from {} to {}",
                        terminal,
                        to_status
                    );
                }
            }
        });
    }

    /// transition() and is_valid_transition() agree
    #[test]
    fn prop_transition_consistency() {
        proptest!(|(
            from in order_status_strategy(),
            to in order_status_strategy()
        )| {
            let is_valid = StatusMachine::is_valid_transition(from, to);
            let transition_result = StatusMachine::transition(from, to);

            if is_valid {
                prop_assert_eq!(transition_result.unwrap(), to);
            } else {
                prop_assert!(transition_result.is_err());
            }
        });
    }
}
