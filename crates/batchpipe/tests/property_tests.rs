//! Property tests for end-to-end delivery through a batch pipe.

use batchpipe::{sync_handler, BatchPipe, PipeConfig};
use batchpipe_queue::MemoryBackend;
use proptest::prelude::*;
use std::sync::{Arc, Mutex};

fn runtime() -> tokio::runtime::Runtime {
    tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .unwrap()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// Everything sent before close reaches the handler exactly once, in
    /// send order, and no handler call exceeds the drain limit.
    #[test]
    fn prop_no_loss_and_bounded_batches(
        sends in prop::collection::vec(prop::collection::vec(any::<u16>(), 0..10), 0..30),
        max_len in 1usize..6,
    ) {
        let rt = runtime();
        let calls = rt.block_on(async {
            let backend = MemoryBackend::default();
            let calls = Arc::new(Mutex::new(Vec::<Vec<u16>>::new()));
            let handler = {
                let calls = Arc::clone(&calls);
                sync_handler(move |batch: Vec<u16>| calls.lock().unwrap().push(batch))
            };

            let pipe = BatchPipe::open(&backend, handler, PipeConfig::default().with_max_len(max_len))
                .await
                .unwrap();
            let send = pipe.sender();
            for (i, batch) in sends.iter().enumerate() {
                send.send(batch.iter().copied()).unwrap();
                if i % 3 == 0 {
                    tokio::task::yield_now().await;
                }
            }
            pipe.close().await.unwrap();
            assert_eq!(backend.live_queues(), 0);

            let calls = calls.lock().unwrap().clone();
            calls
        });

        for call in &calls {
            prop_assert!(!call.is_empty());
            prop_assert!(call.len() <= max_len);
        }
        let delivered: Vec<u16> = calls.concat();
        let expected: Vec<u16> = sends.concat();
        prop_assert_eq!(delivered, expected);
    }
}
