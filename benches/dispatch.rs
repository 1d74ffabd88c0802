//! Dispatch hot-path benchmark suite.
//!
//! Benchmarks the per-frame work the I/O loop performs:
//! - Frame parsing + fan-out at different listener counts
//! - History recording at capacity (eviction on every append)
//!
//! Run with: cargo bench --bench dispatch
//! Results saved to: target/criterion/

use std::sync::Arc;

use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};

use city_realtime::client::dispatch::MessageDispatcher;
use city_realtime::client::history::HistoryBuffer;
use city_realtime::client::listeners::ListenerRegistry;
use city_realtime::{MessageFilter, MessageType};

// ============================================================================
// Benchmark Parameters
// ============================================================================

const LISTENER_COUNTS: &[usize] = &[1, 8, 64];

const CHAT_FRAME: &str = r#"{"message_type":"Chat","room":42,"sender":"alice","content":"hello"}"#;

// ============================================================================
// Benchmark: Frame Dispatch
// ============================================================================

fn bench_dispatch_frame(c: &mut Criterion) {
    let mut group = c.benchmark_group("dispatch_frame");

    for &count in LISTENER_COUNTS {
        let listeners = Arc::new(ListenerRegistry::new());
        for _ in 0..count / 2 {
            listeners.add(MessageType::Chat, |msg| {
                std::hint::black_box(msg.room);
            });
            listeners.add(MessageFilter::Any, |msg| {
                std::hint::black_box(msg.room);
            });
        }

        let history = Arc::new(HistoryBuffer::new(100));
        let dispatcher = MessageDispatcher::new(Arc::clone(&listeners), history);

        group.bench_with_input(BenchmarkId::new("listeners", count), &count, |b, _| {
            b.iter(|| dispatcher.dispatch_frame(std::hint::black_box(CHAT_FRAME)));
        });
    }

    group.finish();
}

// ============================================================================
// Benchmark: History Recording
// ============================================================================

fn bench_history_record(c: &mut Criterion) {
    let history = HistoryBuffer::new(100);
    let message: city_realtime::ServerMessage =
        serde_json::from_str(CHAT_FRAME).expect("valid frame");

    // Fill to capacity so every record also evicts.
    for _ in 0..100 {
        history.record(message.clone());
    }

    c.bench_function("history_record_at_capacity", |b| {
        b.iter(|| history.record(std::hint::black_box(message.clone())));
    });
}

criterion_group!(benches, bench_dispatch_frame, bench_history_record);
criterion_main!(benches);
