//! Property-based tests: matching sanity over arbitrary books, and
//! conservation/determinism of full runs over arbitrary rosters.

use proptest::prelude::*;

use market_sim_core::{
    match_orders, volume_weighted_price, AgentSeed, Order, OrderBook, Side, SimulationConfig,
    SimulationDriver,
};

fn build_book(bids: &[(i64, i64)], asks: &[(i64, i64)]) -> OrderBook {
    let mut book = OrderBook::new();
    for (i, (price, quantity)) in bids.iter().enumerate() {
        book.insert(Order::new(format!("b{i}"), Side::Bid, *price, *quantity, 1).unwrap());
    }
    for (i, (price, quantity)) in asks.iter().enumerate() {
        book.insert(Order::new(format!("s{i}"), Side::Ask, *price, *quantity, 1).unwrap());
    }
    book
}

fn order_params() -> impl Strategy<Value = (i64, i64)> {
    (1i64..=5_000, 1i64..=10)
}

proptest! {
    /// Every trade prices at one of the two matched orders, so within
    /// the range of submitted prices, and never exceeds either side's
    /// submitted quantity.
    #[test]
    fn prop_matching_respects_submitted_orders(
        bids in prop::collection::vec(order_params(), 0..8),
        asks in prop::collection::vec(order_params(), 0..8),
    ) {
        let mut book = build_book(&bids, &asks);
        let report = match_orders(&mut book, 1);

        let all_prices: Vec<i64> = bids.iter().chain(asks.iter()).map(|(p, _)| *p).collect();

        let mut bought = vec![0i64; bids.len()];
        let mut sold = vec![0i64; asks.len()];
        for tx in &report.transactions {
            prop_assert!(tx.price() > 0);
            prop_assert!(tx.quantity() > 0);
            prop_assert!(all_prices.contains(&tx.price()));

            let b: usize = tx.buyer_id()[1..].parse().unwrap();
            let s: usize = tx.seller_id()[1..].parse().unwrap();
            bought[b] += tx.quantity();
            sold[s] += tx.quantity();
        }
        for (i, (_, quantity)) in bids.iter().enumerate() {
            prop_assert!(bought[i] <= *quantity);
        }
        for (i, (_, quantity)) in asks.iter().enumerate() {
            prop_assert!(sold[i] <= *quantity);
        }
    }

    /// After one clearing pass no crossing pair remains.
    #[test]
    fn prop_clearing_pass_is_exhaustive(
        bids in prop::collection::vec(order_params(), 0..8),
        asks in prop::collection::vec(order_params(), 0..8),
    ) {
        let mut book = build_book(&bids, &asks);
        match_orders(&mut book, 1);

        let rerun = match_orders(&mut book, 1);
        prop_assert!(rerun.transactions.is_empty());
    }

    /// The volume-weighted price sits within the traded price range.
    #[test]
    fn prop_vwap_within_trade_range(
        bids in prop::collection::vec(order_params(), 1..8),
        asks in prop::collection::vec(order_params(), 1..8),
    ) {
        let mut book = build_book(&bids, &asks);
        let report = match_orders(&mut book, 1);

        match volume_weighted_price(&report.transactions) {
            None => prop_assert!(report.transactions.is_empty()),
            Some(vwap) => {
                let min = report.transactions.iter().map(|t| t.price()).min().unwrap();
                let max = report.transactions.iter().map(|t| t.price()).max().unwrap();
                prop_assert!(min <= vwap && vwap <= max);
            }
        }
    }
}

fn roster(buyers: &[(i64, i64)], sellers: &[(i64, i64)]) -> Vec<AgentSeed> {
    let mut seeds = Vec::new();
    for (i, (funds, valuation)) in buyers.iter().enumerate() {
        seeds.push(AgentSeed::buyer(format!("b{i}"), *funds, *valuation));
    }
    for (i, (inventory, cost)) in sellers.iter().enumerate() {
        seeds.push(AgentSeed::seller(format!("s{i}"), *inventory, *cost));
    }
    seeds
}

fn run_simulation(config: SimulationConfig) -> SimulationDriver {
    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_time()
        .build()
        .unwrap();
    let mut driver = SimulationDriver::new(config).unwrap();
    rt.block_on(driver.run()).unwrap();
    driver
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Total funds and total inventory never change, and no agent ever
    /// goes negative, whatever the roster.
    #[test]
    fn prop_full_run_conserves_funds_and_inventory(
        buyers in prop::collection::vec((0i64..50_000, 500i64..5_000), 1..4),
        sellers in prop::collection::vec((0i64..20, 200i64..4_000), 1..4),
        num_rounds in 1usize..6,
    ) {
        let config = SimulationConfig::new(num_rounds, roster(&buyers, &sellers));
        let funds_before: i64 = buyers.iter().map(|(f, _)| f).sum();
        let inventory_before: i64 = sellers.iter().map(|(inv, _)| inv).sum();

        let driver = run_simulation(config);

        prop_assert_eq!(driver.state().total_funds(), funds_before);
        prop_assert_eq!(driver.state().total_inventory(), inventory_before);
        for record in driver.state().agent_records().values() {
            prop_assert!(record.funds() >= 0);
            prop_assert!(record.inventory() >= 0);
        }
        prop_assert_eq!(driver.state().price_history().len(), num_rounds);
    }

    /// Rule-based runs are reproducible: two drivers over the same
    /// config produce identical trades and price histories.
    #[test]
    fn prop_rule_based_runs_are_deterministic(
        buyers in prop::collection::vec((0i64..50_000, 500i64..5_000), 1..4),
        sellers in prop::collection::vec((0i64..20, 200i64..4_000), 1..4),
        num_rounds in 1usize..6,
    ) {
        let config = SimulationConfig::new(num_rounds, roster(&buyers, &sellers));

        let first = run_simulation(config.clone());
        let second = run_simulation(config);

        let key = |driver: &SimulationDriver| -> Vec<(String, String, i64, i64, usize)> {
            driver
                .state()
                .transaction_log()
                .iter()
                .map(|tx| {
                    (
                        tx.buyer_id().to_string(),
                        tx.seller_id().to_string(),
                        tx.price(),
                        tx.quantity(),
                        tx.round(),
                    )
                })
                .collect()
        };

        prop_assert_eq!(key(&first), key(&second));
        prop_assert_eq!(first.state().price_history(), second.state().price_history());
    }
}
