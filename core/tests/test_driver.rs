//! Integration tests for the simulation driver: full runs with
//! rule-based and oracle agents, recoverable-failure handling,
//! conservation checks and lifecycle control.

use std::time::Duration;

use futures::FutureExt;
use market_sim_core::{
    AgentDecision, AgentSeed, DiagnosticKind, DriverPhase, Event, FnOracle, PriceBand,
    SimulationConfig, SimulationDriver, SimulationError,
};

/// One rule-based buyer (valuation 20.00) and one rule-based seller
/// (cost 10.00): bid 1800 crosses ask 1100 every round.
fn crossing_config(num_rounds: usize) -> SimulationConfig {
    SimulationConfig::new(
        num_rounds,
        vec![
            AgentSeed::buyer("buyer_1", 10_000, 2_000),
            AgentSeed::seller("seller_1", 10, 1_000),
        ],
    )
}

// ============================================================================
// Full runs with rule-based agents
// ============================================================================

#[tokio::test]
async fn test_rule_based_run_trades_every_round() {
    let mut driver = SimulationDriver::new(crossing_config(3)).unwrap();
    let results = driver.run().await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(driver.phase(), DriverPhase::Completed);
    for (i, result) in results.iter().enumerate() {
        assert_eq!(result.round, i + 1);
        assert_eq!(result.num_orders, 2);
        assert_eq!(result.num_transactions, 1);
        assert_eq!(result.volume, 1);
        // The buyer sits first in the roster, so its bid rests and
        // sets the price.
        assert_eq!(result.clearing_price, Some(1_800));
    }

    assert_eq!(driver.state().transaction_log().len(), 3);
    assert_eq!(driver.state().price_history().len(), 3);
    assert_eq!(driver.state().last_traded_price(), Some(1_800));
}

#[tokio::test]
async fn test_funds_and_inventory_are_conserved() {
    let mut driver = SimulationDriver::new(crossing_config(5)).unwrap();
    let funds_before = driver.state().total_funds();
    let inventory_before = driver.state().total_inventory();

    driver.run().await.unwrap();

    assert_eq!(driver.state().total_funds(), funds_before);
    assert_eq!(driver.state().total_inventory(), inventory_before);

    let buyer = driver.state().get_record("buyer_1").unwrap();
    let seller = driver.state().get_record("seller_1").unwrap();
    assert_eq!(buyer.funds(), 10_000 - 5 * 1_800);
    assert_eq!(buyer.inventory(), 5);
    assert_eq!(seller.funds(), 5 * 1_800);
    assert_eq!(seller.inventory(), 5);
}

#[tokio::test]
async fn test_exhausted_buyer_abstains_and_round_clears_empty() {
    // 5 trades at 1800 leave the buyer with 1000, below its bid price,
    // so from round 6 on it abstains and nothing trades.
    let mut driver = SimulationDriver::new(crossing_config(7)).unwrap();
    let results = driver.run().await.unwrap();

    assert_eq!(results[4].clearing_price, Some(1_800));
    assert_eq!(results[5].num_transactions, 0);
    assert_eq!(results[5].clearing_price, None);
    // The seller still asks, so the rounds are not idle.
    assert_eq!(results[5].num_orders, 1);
    assert_eq!(results.len(), 7);
}

#[tokio::test]
async fn test_round_history_snapshots() {
    let mut driver = SimulationDriver::new(crossing_config(3)).unwrap();
    driver.run().await.unwrap();

    let history = driver.history();
    assert_eq!(history.len(), 3);
    for (i, snapshot) in history.iter().enumerate() {
        assert_eq!(snapshot.round, i + 1);
        assert_eq!(snapshot.price_history.len(), i + 1);
        assert_eq!(snapshot.agents.len(), 2);
    }
    // Each round's book replaces the previous one.
    assert_eq!(history[2].open_bids.len(), 1);
    assert_eq!(history[2].open_asks.len(), 1);
}

#[tokio::test]
async fn test_event_log_records_the_run() {
    let mut driver = SimulationDriver::new(crossing_config(2)).unwrap();
    driver.run().await.unwrap();

    let log = driver.event_log();
    let submitted = log
        .events()
        .iter()
        .filter(|e| matches!(e, Event::OrderSubmitted { .. }))
        .count();
    let trades = log
        .events()
        .iter()
        .filter(|e| matches!(e, Event::Trade { .. }))
        .count();
    let cleared = log
        .events()
        .iter()
        .filter(|e| matches!(e, Event::RoundCleared { .. }))
        .count();

    assert_eq!(submitted, 4);
    assert_eq!(trades, 2);
    assert_eq!(cleared, 2);
    assert_eq!(log.events_for_round(1).count(), 4);
}

// ============================================================================
// Oracle agents
// ============================================================================

#[tokio::test]
async fn test_oracle_decision_flows_through() {
    let mut config = crossing_config(1);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async {
                    Ok(AgentDecision::Bid {
                        price: 1_600,
                        quantity: 1,
                    })
                }
                .boxed()
            })),
        )
        .unwrap();

    let results = driver.run().await.unwrap();
    assert_eq!(results[0].num_transactions, 1);
    assert_eq!(results[0].clearing_price, Some(1_600));
}

#[tokio::test]
async fn test_run_refuses_unregistered_oracle() {
    let mut config = crossing_config(1);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();

    let mut driver = SimulationDriver::new(config).unwrap();
    let err = driver.run().await.unwrap_err();

    assert!(matches!(err, SimulationError::InvalidConfig(_)));
    assert_eq!(driver.phase(), DriverPhase::Failed);
}

#[tokio::test]
async fn test_register_oracle_for_unknown_agent_fails() {
    let mut driver = SimulationDriver::new(crossing_config(1)).unwrap();
    let err = driver
        .register_oracle(
            "nobody",
            Box::new(FnOracle::new(|_s, _r| {
                async { Ok(AgentDecision::Abstain) }.boxed()
            })),
        )
        .unwrap_err();

    assert_eq!(err, SimulationError::AgentNotFound("nobody".to_string()));
}

#[tokio::test]
async fn test_oracle_error_degrades_to_abstention() {
    let mut config = crossing_config(2);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async { Err("model endpoint unreachable".into()) }.boxed()
            })),
        )
        .unwrap();

    // The run completes; the failing agent just never trades.
    let results = driver.run().await.unwrap();
    assert_eq!(results.len(), 2);
    assert_eq!(driver.phase(), DriverPhase::Completed);
    assert_eq!(results[0].num_transactions, 0);

    let failure = driver.first_oracle_failure().unwrap();
    assert_eq!(failure.round, 1);
    assert_eq!(failure.agent_id, "buyer_1");
    assert!(failure.message.contains("unreachable"));

    let diagnostics = &driver.history()[0].diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert!(matches!(
        diagnostics[0].kind,
        DiagnosticKind::OracleError { .. }
    ));
}

#[tokio::test]
async fn test_slow_oracle_times_out() {
    let mut config = crossing_config(1);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();
    config.per_agent_timeout_ms = 50;

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                    Ok(AgentDecision::Abstain)
                }
                .boxed()
            })),
        )
        .unwrap();

    let results = driver.run().await.unwrap();
    assert_eq!(results[0].num_transactions, 0);

    let diagnostics = &driver.history()[0].diagnostics;
    assert_eq!(diagnostics.len(), 1);
    assert_eq!(diagnostics[0].agent_id, "buyer_1");
    assert!(matches!(diagnostics[0].kind, DiagnosticKind::Timeout));
    assert!(driver
        .event_log()
        .events()
        .iter()
        .any(|e| matches!(e, Event::AgentTimedOut { .. })));
}

#[tokio::test]
async fn test_wrong_side_submission_is_rejected() {
    let mut config = crossing_config(1);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async {
                    Ok(AgentDecision::Ask {
                        price: 1_500,
                        quantity: 1,
                    })
                }
                .boxed()
            })),
        )
        .unwrap();

    driver.run().await.unwrap();

    let diagnostics = &driver.history()[0].diagnostics;
    assert_eq!(diagnostics.len(), 1);
    match &diagnostics[0].kind {
        DiagnosticKind::InvalidOrder { reason } => {
            assert!(reason.contains("buyer"));
        }
        other => panic!("expected InvalidOrder, got {other:?}"),
    }
}

#[tokio::test]
async fn test_price_band_rejects_outlier_bid() {
    let mut config = crossing_config(1);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();
    config.price_band = Some(PriceBand {
        min: 500,
        max: 1_500,
    });

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async {
                    Ok(AgentDecision::Bid {
                        price: 9_999,
                        quantity: 1,
                    })
                }
                .boxed()
            })),
        )
        .unwrap();

    let results = driver.run().await.unwrap();
    assert_eq!(results[0].num_transactions, 0);
    assert!(matches!(
        driver.history()[0].diagnostics[0].kind,
        DiagnosticKind::InvalidOrder { .. }
    ));
}

#[tokio::test]
async fn test_resting_ask_sets_price_and_settles_both_legs() {
    // Seller first in the roster: its ask rests, so the trade executes
    // at the ask price even though the bid came in higher.
    let config = SimulationConfig::new(
        1,
        vec![
            AgentSeed::seller("seller_1", 1, 1_000).with_oracle(),
            AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle(),
        ],
    );

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "seller_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async {
                    Ok(AgentDecision::Ask {
                        price: 1_200,
                        quantity: 1,
                    })
                }
                .boxed()
            })),
        )
        .unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async {
                    Ok(AgentDecision::Bid {
                        price: 1_800,
                        quantity: 1,
                    })
                }
                .boxed()
            })),
        )
        .unwrap();

    let results = driver.run().await.unwrap();
    assert_eq!(results[0].clearing_price, Some(1_200));

    let buyer = driver.state().get_record("buyer_1").unwrap();
    let seller = driver.state().get_record("seller_1").unwrap();
    assert_eq!(buyer.funds(), 10_000 - 1_200);
    assert_eq!(buyer.inventory(), 1);
    assert_eq!(seller.funds(), 1_200);
    assert_eq!(seller.inventory(), 0);
}

#[tokio::test]
async fn test_negative_price_from_oracle_degrades_to_abstention() {
    let mut config = crossing_config(1);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|_snapshot, _record| {
                async {
                    Ok(AgentDecision::Bid {
                        price: -5,
                        quantity: 1,
                    })
                }
                .boxed()
            })),
        )
        .unwrap();

    let results = driver.run().await.unwrap();
    // The seller's ask still stands alone; the round proceeds.
    assert_eq!(results[0].num_orders, 1);
    assert_eq!(results[0].num_transactions, 0);

    let diagnostics = &driver.history()[0].diagnostics;
    assert_eq!(diagnostics.len(), 1);
    match &diagnostics[0].kind {
        DiagnosticKind::InvalidOrder { reason } => assert!(reason.contains("positive")),
        other => panic!("expected InvalidOrder, got {other:?}"),
    }
}

#[tokio::test]
async fn test_book_is_fresh_each_round() {
    // The buyer bids only in round 1 and the seller asks only in
    // round 2; if orders carried over they would cross, so zero
    // trades proves each round starts from an empty book.
    let mut config = crossing_config(2);
    config.agent_roster[0] = AgentSeed::buyer("buyer_1", 10_000, 2_000).with_oracle();
    config.agent_roster[1] = AgentSeed::seller("seller_1", 10, 1_000).with_oracle();

    let mut driver = SimulationDriver::new(config).unwrap();
    driver
        .register_oracle(
            "buyer_1",
            Box::new(FnOracle::new(|snapshot, _record| {
                async move {
                    if snapshot.round == 0 {
                        Ok(AgentDecision::Bid {
                            price: 1_800,
                            quantity: 1,
                        })
                    } else {
                        Ok(AgentDecision::Abstain)
                    }
                }
                .boxed()
            })),
        )
        .unwrap();
    driver
        .register_oracle(
            "seller_1",
            Box::new(FnOracle::new(|snapshot, _record| {
                async move {
                    if snapshot.round == 1 {
                        Ok(AgentDecision::Ask {
                            price: 1_200,
                            quantity: 1,
                        })
                    } else {
                        Ok(AgentDecision::Abstain)
                    }
                }
                .boxed()
            })),
        )
        .unwrap();

    let results = driver.run().await.unwrap();
    assert_eq!(results[0].num_transactions, 0);
    assert_eq!(results[1].num_transactions, 0);
    assert!(driver.state().transaction_log().is_empty());
}

// ============================================================================
// Lifecycle control
// ============================================================================

#[tokio::test]
async fn test_stop_handle_halts_between_rounds() {
    let mut driver = SimulationDriver::new(crossing_config(100)).unwrap();
    driver.stop_handle().stop();

    let results = driver.run().await.unwrap();
    assert!(results.is_empty());
    assert_eq!(driver.phase(), DriverPhase::Completed);
    assert_eq!(driver.state().round(), 0);
}

#[tokio::test]
async fn test_idle_market_halts_early() {
    // Broke buyer and empty-handed seller: every round is idle.
    let mut config = SimulationConfig::new(
        50,
        vec![
            AgentSeed::buyer("buyer_1", 0, 2_000),
            AgentSeed::seller("seller_1", 0, 1_000),
        ],
    );
    config.halt_after_idle_rounds = 3;

    let mut driver = SimulationDriver::new(config).unwrap();
    let results = driver.run().await.unwrap();

    assert_eq!(results.len(), 3);
    assert_eq!(driver.phase(), DriverPhase::Completed);
    for result in &results {
        assert_eq!(result.num_orders, 0);
        assert_eq!(result.clearing_price, None);
    }
}

#[tokio::test]
async fn test_driver_refuses_second_run() {
    let mut driver = SimulationDriver::new(crossing_config(1)).unwrap();
    driver.run().await.unwrap();

    let err = driver.run().await.unwrap_err();
    assert!(matches!(err, SimulationError::InvalidConfig(_)));
}

#[tokio::test]
async fn test_invalid_config_rejected_at_construction() {
    let config = SimulationConfig::new(0, vec![AgentSeed::buyer("b", 100, 100)]);
    assert!(matches!(
        SimulationDriver::new(config),
        Err(SimulationError::InvalidConfig(_))
    ));
}
