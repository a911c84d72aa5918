//! Independence of concurrently registered correlation ids

use proptest::prelude::*;
use std::sync::Arc;
use std::time::Duration;

use scrape_relay::correlation::RequestCorrelator;
use scrape_relay::types::{FieldMap, ScrapeResult};

fn result_for(id: &str) -> ScrapeResult {
    let mut data = FieldMap::new();
    data.insert("id", id);
    ScrapeResult::success(format!("https://{id}.example"), data, Duration::ZERO)
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Whatever order results arrive in, every handle gets exactly its own
    #[test]
    fn each_handle_receives_its_own_result(
        ids in prop::collection::hash_set("[a-z]{1,12}", 1..24),
        seed in any::<u64>(),
    ) {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();

        runtime.block_on(async {
            let correlator = Arc::new(RequestCorrelator::new());
            let mut ids: Vec<String> = ids.into_iter().collect();
            let mut handles: Vec<_> = ids
                .iter()
                .map(|id| correlator.register(id.as_str()).unwrap())
                .collect();

            // deterministic shuffle of resolution order
            let len = ids.len();
            for i in 0..len {
                let j = (seed as usize).wrapping_mul(31).wrapping_add(i * 17) % len;
                ids.swap(i, j);
            }

            let resolver = {
                let correlator = Arc::clone(&correlator);
                tokio::spawn(async move {
                    for id in ids {
                        assert!(correlator.resolve(&id, result_for(&id)));
                        tokio::task::yield_now().await;
                    }
                })
            };

            for handle in &mut handles {
                let id = handle.id().to_string();
                let got = correlator
                    .await_result(handle, Duration::from_secs(5))
                    .await
                    .unwrap();
                assert_eq!(got.data["id"], id);
                correlator.unregister(&id);
            }

            resolver.await.unwrap();
            assert!(correlator.is_empty());
        });
    }
}

#[tokio::test]
async fn resolving_one_id_leaves_the_others_pending() {
    let correlator = RequestCorrelator::new();
    let mut a = correlator.register("a").unwrap();
    let mut b = correlator.register("b").unwrap();

    assert!(correlator.resolve("b", result_for("b")));

    let got_b = correlator.await_result(&mut b, Duration::from_millis(50)).await.unwrap();
    assert_eq!(got_b.data["id"], "b");
    assert!(correlator.await_result(&mut a, Duration::from_millis(50)).await.is_err());
    assert!(correlator.resolve("a", result_for("a")));
    let got_a = correlator.await_result(&mut a, Duration::from_millis(50)).await.unwrap();
    assert_eq!(got_a.data["id"], "a");
}
