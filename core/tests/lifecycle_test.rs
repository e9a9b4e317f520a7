//! Ticket lifecycle tests.
//!
//! Every transition out of `active`, and every attempt to leave a terminal
//! state, driven through `ReducerTest`.

#![allow(clippy::expect_used)]
#![allow(clippy::unwrap_used)]

use nightpass_core::environment::Clock;
use nightpass_core::reducer::Reducer;
use nightpass_core::{
    LifecycleEnvironment, LifecycleError, Money, TicketAction, TicketEffect, TicketLifecycle,
    TicketStatus, UserId, ValidationId,
};
use nightpass_testing::fixtures::TicketBuilder;
use nightpass_testing::{ReducerTest, assertions, test_clock};
use std::sync::Arc;

fn create_test_env() -> LifecycleEnvironment {
    LifecycleEnvironment::new(Arc::new(test_clock()))
}

fn grant(operator: UserId) -> TicketAction {
    TicketAction::GrantEntry {
        validation_id: ValidationId::new(),
        validated_by: operator,
        biometric_match: true,
        location: Some("Main door".to_string()),
    }
}

const TERMINAL: [TicketStatus; 4] = [
    TicketStatus::Used,
    TicketStatus::Cancelled,
    TicketStatus::Refunded,
    TicketStatus::Expired,
];

#[test]
fn test_grant_entry_marks_used_and_records_validation() {
    let operator = UserId::new();
    let ticket = TicketBuilder::new().secure().quantity(2).build();
    let ticket_id = ticket.id;
    let event_id = ticket.event_id;

    ReducerTest::new(TicketLifecycle::new())
        .with_env(create_test_env())
        .given_state(ticket)
        .when_action(grant(operator))
        .then_state(move |ticket| {
            assert_eq!(ticket.status, TicketStatus::Used);
            assert_eq!(ticket.validation_history.len(), 1);
            let record = &ticket.validation_history[0];
            assert_eq!(record.ticket_id, ticket_id);
            assert_eq!(record.validated_by, operator);
            assert_eq!(record.validated_at, test_clock().now());
            assert!(record.entry_granted);
            assert!(record.biometric_match);
            assert_eq!(record.location.as_deref(), Some("Main door"));
            assert!(record.reason.is_none());
            assert_eq!(ticket.status_changed_at, Some(test_clock().now()));
        })
        .then_effects(move |effects| {
            assert_eq!(
                effects,
                &[
                    TicketEffect::RecordCheckIn {
                        event_id,
                        quantity: 2
                    },
                    TicketEffect::Persist,
                ]
            );
        })
        .run();
}

#[test]
fn test_repeated_denials_accumulate_without_locking() {
    let env = create_test_env();
    let mut ticket = TicketBuilder::new().secure().build();

    for _ in 0..3 {
        TicketLifecycle
            .reduce(
                &mut ticket,
                TicketAction::DenyEntry {
                    validation_id: ValidationId::new(),
                    validated_by: UserId::new(),
                    biometric_match: false,
                    location: None,
                    reason: "Biometric verification failed".to_string(),
                },
                &env,
            )
            .unwrap();
    }
    assert_eq!(ticket.status, TicketStatus::Active);
    assert_eq!(ticket.denied_attempts(), 3);

    TicketLifecycle
        .reduce(&mut ticket, grant(UserId::new()), &env)
        .unwrap();
    assert_eq!(ticket.status, TicketStatus::Used);
    assert_eq!(ticket.validation_history.len(), 4);
    assert!(ticket.validation_history[3].entry_granted);
}

#[test]
fn test_cancel_refunds_and_reverses_revenue() {
    let ticket = TicketBuilder::new()
        .base_price(Money::from_units(20_000))
        .secure()
        .quantity(2)
        .build();
    let event_id = ticket.event_id;

    ReducerTest::new(TicketLifecycle::new())
        .with_env(create_test_env())
        .given_state(ticket)
        .when_action(TicketAction::Cancel {
            reason: "Event postponed".to_string(),
        })
        .then_state(|ticket| {
            assert_eq!(ticket.status, TicketStatus::Cancelled);
            assert_eq!(ticket.status_reason.as_deref(), Some("Event postponed"));
            assert!(ticket.validation_history.is_empty());
        })
        .then_effects(move |effects| {
            assert_eq!(
                effects,
                &[
                    TicketEffect::RefundPayment {
                        amount: Money::from_units(60_000),
                        payment_reference: Some("mock_txn_fixture".to_string()),
                    },
                    TicketEffect::ReverseRevenue {
                        event_id,
                        quantity: 2,
                        total: Money::from_units(60_000),
                        app_commission: Money::from_units(3_000),
                        venue_revenue: Money::from_units(57_000),
                    },
                    TicketEffect::Persist,
                ]
            );
        })
        .run();
}

#[test]
fn test_refund_is_distinct_from_cancel() {
    ReducerTest::new(TicketLifecycle::new())
        .with_env(create_test_env())
        .given_state(TicketBuilder::new().build())
        .when_action(TicketAction::Refund {
            reason: "Chargeback".to_string(),
        })
        .then_state(|ticket| {
            assert_eq!(ticket.status, TicketStatus::Refunded);
            assert_eq!(ticket.status_reason.as_deref(), Some("Chargeback"));
        })
        .then_effects(|effects| assertions::assert_effects_count(effects, 3))
        .run();
}

#[test]
fn test_reissue_qr_keeps_ticket_active() {
    ReducerTest::new(TicketLifecycle::new())
        .with_env(create_test_env())
        .given_state(TicketBuilder::new().build())
        .when_action(TicketAction::ReissueQr {
            qr_code: "fresh-qr".to_string(),
        })
        .then_state(|ticket| {
            assert_eq!(ticket.status, TicketStatus::Active);
            assert_eq!(ticket.qr_code, "fresh-qr");
        })
        .then_effects(|effects| assert_eq!(effects, &[TicketEffect::Persist]))
        .run();
}

#[test]
fn test_used_ticket_rejects_second_entry() {
    ReducerTest::new(TicketLifecycle::new())
        .with_env(create_test_env())
        .given_state(TicketBuilder::new().status(TicketStatus::Used).build())
        .when_action(grant(UserId::new()))
        .then_error(|error| {
            assert_eq!(
                *error,
                LifecycleError::InvalidTransition {
                    status: TicketStatus::Used
                }
            );
            assert_eq!(error.to_string(), "Ticket is used");
        })
        .then_state(|ticket| {
            assert_eq!(ticket.status, TicketStatus::Used);
            assert!(ticket.validation_history.is_empty());
        })
        .run();
}

#[test]
fn test_terminal_states_reject_every_action() {
    let env = create_test_env();

    for status in TERMINAL {
        let actions = vec![
            grant(UserId::new()),
            TicketAction::DenyEntry {
                validation_id: ValidationId::new(),
                validated_by: UserId::new(),
                biometric_match: false,
                location: None,
                reason: "Biometric verification failed".to_string(),
            },
            TicketAction::Cancel {
                reason: "late".to_string(),
            },
            TicketAction::Refund {
                reason: "late".to_string(),
            },
            TicketAction::Expire,
            TicketAction::ReissueQr {
                qr_code: "qr".to_string(),
            },
        ];

        for action in actions {
            let mut ticket = TicketBuilder::new().status(status).build();
            let before = ticket.clone();
            let name = action.name();

            let result = TicketLifecycle.reduce(&mut ticket, action, &env);

            assert_eq!(
                result.unwrap_err(),
                LifecycleError::InvalidTransition { status },
                "{name} from {status}"
            );
            assert_eq!(ticket, before, "{name} from {status} must not mutate");
        }
    }
}

#[test]
fn test_active_reaches_each_terminal_state_once() {
    let env = create_test_env();
    let transitions = [
        (grant(UserId::new()), TicketStatus::Used),
        (
            TicketAction::Cancel {
                reason: "r".to_string(),
            },
            TicketStatus::Cancelled,
        ),
        (
            TicketAction::Refund {
                reason: "r".to_string(),
            },
            TicketStatus::Refunded,
        ),
        (TicketAction::Expire, TicketStatus::Expired),
    ];

    for (action, expected) in transitions {
        let mut ticket = TicketBuilder::new().build();
        TicketLifecycle.reduce(&mut ticket, action, &env).unwrap();
        assert_eq!(ticket.status, expected);
        assert!(
            TicketLifecycle
                .reduce(&mut ticket, TicketAction::Expire, &env)
                .is_err()
        );
    }
}
