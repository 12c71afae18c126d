//! Demonstration of batchpipe features.
//!
//! Run with: `cargo run -p batchpipe --features demo --bin demo`
//! Set `RUST_LOG=batchpipe=debug` to watch the consumer loop.

use anyhow::{Context, Result};
use batchpipe::{
    async_handler, sync_handler, with_pipe, BatchPipe, ErrorPolicy, Event, PipeConfig, Router,
    Teardown,
};
use batchpipe_queue::MemoryBackend;
use rand::Rng;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env())
        .init();

    println!("=== batchpipe Demo ===\n");

    let backend = MemoryBackend::default();
    demo_threaded_producers(&backend).await?;
    demo_single_item_router(&backend).await?;
    demo_trailing_timeout(&backend).await?;

    println!("\n=== All demos completed successfully! ===");
    Ok(())
}

/// Demo 1: producers on plain OS threads, one async consumer
async fn demo_threaded_producers(backend: &MemoryBackend) -> Result<()> {
    println!("--- Demo 1: Threaded Producers ---");

    let total = Arc::new(AtomicU64::new(0));
    let handler = {
        let total = Arc::clone(&total);
        sync_handler(move |batch: Vec<u64>| {
            total.fetch_add(batch.iter().sum::<u64>(), Ordering::Relaxed);
        })
    };

    let pipe = BatchPipe::open(backend, handler, PipeConfig::default().with_max_len(64)).await?;

    let mut expected = 0u64;
    let producers: Vec<_> = (0..4)
        .map(|_| {
            let send = pipe.sender();
            std::thread::spawn(move || -> Result<u64> {
                let mut rng = rand::thread_rng();
                let mut sum = 0;
                for _ in 0..100 {
                    let len = rng.gen_range(1..20);
                    let batch: Vec<u64> = (0..len).map(|_| rng.gen_range(0..1_000)).collect();
                    sum += batch.iter().sum::<u64>();
                    send.send(batch)?;
                }
                Ok(sum)
            })
        })
        .collect();
    for producer in producers {
        let joined = producer
            .join()
            .map_err(|_| anyhow::anyhow!("producer thread panicked"))?;
        expected += joined?;
    }

    let metrics = Arc::clone(pipe.metrics());
    let teardown = pipe.close().await.context("closing threaded pipe")?;

    println!("  Teardown: {:?}", teardown);
    println!(
        "  Handled {} items in {} batches across {} wakes",
        metrics.items_handled(),
        metrics.batches_handled(),
        metrics.wakes()
    );
    println!(
        "  Sum sent: {}, sum handled: {}",
        expected,
        total.load(Ordering::Relaxed)
    );
    anyhow::ensure!(expected == total.load(Ordering::Relaxed), "items were lost");
    println!("  ✓ Threaded producers complete\n");
    Ok(())
}

/// Demo 2: single-item pipe feeding a topic router
async fn demo_single_item_router(backend: &MemoryBackend) -> Result<()> {
    println!("--- Demo 2: Single-Item Router ---");

    let router = Router::new()
        .on(
            "loss",
            sync_handler(|v: f64| println!("  loss  = {:.3}", v)),
        )
        .on(
            "step",
            async_handler(|v: f64| async move {
                tokio::task::yield_now().await;
                println!("  step  = {}", v);
            }),
        );

    with_pipe(backend, router, PipeConfig::default(), |send| async move {
        let mut loss = 1.0;
        for step in 0..3 {
            send.send(Event::new("step", f64::from(step)))?;
            send.send(Event::new("loss", loss))?;
            loss /= 2.0;
        }
        send.send(Event::new("unrouted", 0.0))
    })
    .await??;

    println!("  ✓ Router complete\n");
    Ok(())
}

/// Demo 3: close gives up on a slow handler under the log policy
async fn demo_trailing_timeout(backend: &MemoryBackend) -> Result<()> {
    println!("--- Demo 3: Trailing Timeout ---");

    let handler = async_handler(|batch: Vec<u32>| async move {
        tokio::time::sleep(Duration::from_millis(200)).await;
        println!("  slow handler finished {} items", batch.len());
    });
    let config = PipeConfig::default()
        .with_trailing_timeout(Some(Duration::from_millis(20)))
        .with_errors(ErrorPolicy::Log);

    let pipe = BatchPipe::open(backend, handler, config).await?;
    pipe.sender().send([1, 2, 3])?;
    let teardown = pipe.close().await?;
    println!("  Teardown: {:?}", teardown);
    anyhow::ensure!(teardown == Teardown::Detached, "expected a detached consumer");

    while backend.live_queues() > 0 {
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
    println!("  Detached consumer released its queue");
    println!("  ✓ Trailing timeout complete\n");
    Ok(())
}
