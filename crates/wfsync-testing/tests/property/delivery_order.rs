//! Property tests: whatever the page sizes, events reach the handler once
//! each and in chain order.

use proptest::prelude::*;
use std::sync::Arc;
use wfsync::{encode_event, EventHandler, SyncerConfig};
use wfsync_testing::{RecordingHandler, SyncHarness, WorkflowFixture, DON_ID};
use wfsync_types::{ChainPosition, Event, WorkflowStatus};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

/// Distinct log positions, in arbitrary order
fn arb_positions() -> impl Strategy<Value = Vec<(u64, u32)>> {
    prop::collection::hash_set((1u64..1000, 0u32..4), 1..30)
        .prop_map(|set| set.into_iter().collect::<Vec<_>>())
        .prop_shuffle()
}

fn paged_config(query_count: u64, max_pages: u32) -> SyncerConfig {
    SyncerConfig {
        max_pages_per_tick: max_pages,
        ..SyncerConfig::default().with_query_count(query_count)
    }
}

/// Registration of a fresh workflow at `position`
fn registration(position: ChainPosition, don: u32) -> Event {
    let name = format!("wf-{}-{}", position.block, position.log_index);
    let record = WorkflowFixture::new(name, don).record(WorkflowStatus::Paused);
    Event::registered_from(&record, position)
}

// ---------------------------------------------------------------------------
// Property Tests
// ---------------------------------------------------------------------------

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    /// Logs inserted out of order are delivered sorted, exactly once.
    #[test]
    fn logs_are_delivered_once_in_chain_order(
        positions in arb_positions(),
        query_count in 1u64..5,
        max_pages in 1u32..3,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let recorder = RecordingHandler::new();
            let h = SyncHarness::builder()
                .config(paged_config(query_count, max_pages))
                .handler(recorder.clone() as Arc<dyn EventHandler>)
                .build();
            h.start().await.unwrap();
            prop_assert!(h.caught_up().await);

            for &(block, log_index) in &positions {
                let position = ChainPosition::new(block, log_index);
                h.ledger.insert_log(encode_event(&registration(position, DON_ID)));
            }

            for _ in 0..=positions.len() {
                h.tick().await;
            }
            prop_assert!(h.caught_up().await);

            let mut expected: Vec<ChainPosition> = positions
                .iter()
                .map(|&(block, log_index)| ChainPosition::new(block, log_index))
                .collect();
            expected.sort();
            prop_assert_eq!(recorder.positions(), expected);

            h.close().await.unwrap();
            Ok(())
        })?;
    }

    /// Events for other DONs advance the cursor without reaching the handler.
    #[test]
    fn foreign_don_logs_are_skipped(
        positions in arb_positions(),
        foreign in prop::collection::vec(any::<bool>(), 30),
        query_count in 1u64..5,
    ) {
        let rt = tokio::runtime::Runtime::new().unwrap();
        rt.block_on(async {
            let recorder = RecordingHandler::new();
            let h = SyncHarness::builder()
                .config(paged_config(query_count, 2))
                .handler(recorder.clone() as Arc<dyn EventHandler>)
                .build();
            h.start().await.unwrap();
            prop_assert!(h.caught_up().await);

            let mut expected = Vec::new();
            for (i, &(block, log_index)) in positions.iter().enumerate() {
                let position = ChainPosition::new(block, log_index);
                let don = if foreign[i] { DON_ID + 1 } else { DON_ID };
                if don == DON_ID {
                    expected.push(position);
                }
                h.ledger.insert_log(encode_event(&registration(position, don)));
            }
            expected.sort();

            for _ in 0..=positions.len() {
                h.tick().await;
            }
            prop_assert!(h.caught_up().await);
            prop_assert_eq!(recorder.positions(), expected);

            h.close().await.unwrap();
            Ok(())
        })?;
    }
}
