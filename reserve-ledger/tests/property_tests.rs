//! Property-based tests for ledger invariants
//!
//! These tests use proptest to verify critical invariants:
//! - Pool conservation: pool == initial + applied increases − settled USD
//! - Cursor monotonicity: advances by exactly one per committed block
//! - Commit ordering: out-of-order and duplicate commits are rejected

use chrono::Utc;
use proptest::prelude::*;
use reserve_ledger::{
    AccountId, BlockCommit, Exchange, ExchangeStatus, LedgerStore, PoolChange,
    ScheduledPoolIncrease, StoreConfig,
};
use rust_decimal::Decimal;

const INITIAL_POOL_CENTS: i64 = 100_000_000; // $1,000,000.00
const FIRST_BLOCK: u64 = 1;

/// One simulated block: settled USD cents plus an optional pool increase
/// scheduled to land at that block's height.
#[derive(Debug, Clone)]
struct SimBlock {
    settled_cents: u32,
    increase_cents: Option<u32>,
}

fn sim_block_strategy() -> impl Strategy<Value = SimBlock> {
    (0u32..500_00, proptest::option::of(1u32..10_000_00)).prop_map(
        |(settled_cents, increase_cents)| SimBlock {
            settled_cents,
            increase_cents,
        },
    )
}

fn open_store(dir: &std::path::Path) -> LedgerStore {
    let config = StoreConfig {
        data_dir: dir.to_path_buf(),
        initial_pool: Decimal::new(INITIAL_POOL_CENTS, 2),
        initial_cursor: FIRST_BLOCK - 1,
        ..Default::default()
    };
    LedgerStore::open(&config).unwrap()
}

fn settlement_commit(height: u64, settled: Decimal, pool_after: Decimal) -> BlockCommit {
    if settled == Decimal::ZERO {
        return BlockCommit::default();
    }
    let exchange = Exchange {
        sender: AccountId::new("5Sender"),
        recipient: AccountId::new("5Reserve"),
        amount: Decimal::new(1, 0),
        amount_usd: settled,
        price: settled,
        block_height: height,
        block_time: Utc::now(),
        logged_at: Utc::now(),
        status: ExchangeStatus::Pending,
    };
    BlockCommit {
        exchanges: vec![exchange],
        pool_change: Some(PoolChange {
            block_height: height,
            block_time: Utc::now(),
            delta: -settled,
            issuance: Decimal::new(1_000_000, 0),
            pool_after,
            price_after: Decimal::ZERO,
            reason: "exchanges settled".to_string(),
        }),
        sum_usd: settled,
        ..Default::default()
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(25))]

    /// Property: after any schedule of blocks and scheduled increases, the
    /// pool equals initial + applied increases − settled USD, and the
    /// cursor advanced by exactly one per block.
    #[test]
    fn prop_pool_conservation(blocks in proptest::collection::vec(sim_block_strategy(), 1..20)) {
        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let issuance = Decimal::new(1_000_000, 0);

        let mut expected_pool = Decimal::new(INITIAL_POOL_CENTS, 2);

        for (i, block) in blocks.iter().enumerate() {
            let height = FIRST_BLOCK + i as u64;

            if let Some(cents) = block.increase_cents {
                store
                    .schedule_pool_increase(ScheduledPoolIncrease {
                        block_height: height,
                        amount: Decimal::new(cents as i64, 2),
                        reason: "replenish".to_string(),
                    })
                    .unwrap();
                expected_pool += Decimal::new(cents as i64, 2);
            }

            let pool = store.refresh(height, Utc::now(), issuance).unwrap();
            prop_assert_eq!(pool, expected_pool);

            let settled = Decimal::new(block.settled_cents as i64, 2);
            expected_pool -= settled;
            store
                .commit_block(height, settlement_commit(height, settled, expected_pool))
                .unwrap();

            prop_assert_eq!(store.pool(), expected_pool);
            prop_assert_eq!(store.last_block_processed(), height);
        }

        // Every scheduled increase was consumed
        prop_assert!(store.scheduled_increases().unwrap().is_empty());
    }

    /// Property: a commit for any height other than cursor + 1 is rejected
    /// and leaves no trace.
    #[test]
    fn prop_out_of_order_commit_rejected(offset in 0u64..100) {
        prop_assume!(offset != 1);

        let temp_dir = tempfile::tempdir().unwrap();
        let store = open_store(temp_dir.path());
        let cursor = store.last_block_processed();

        let settled = Decimal::new(100, 2);
        let result = store.commit_block(
            cursor + offset,
            settlement_commit(cursor + offset, settled, Decimal::ZERO),
        );

        prop_assert!(result.is_err());
        prop_assert_eq!(store.last_block_processed(), cursor);
        prop_assert!(store.exchanges().unwrap().is_empty());
        prop_assert_eq!(store.pool(), Decimal::new(INITIAL_POOL_CENTS, 2));
    }
}
