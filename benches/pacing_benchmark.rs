//! Pacer benchmark: cost of the per-frame hot path.
//!
//! Target: a frame (advance + prefix slice) well under 1µs, independent of
//! how much text has already been revealed.

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use std::time::{Duration, Instant};
use trickle::ingest::FrameDecoder;
use trickle::{DisplayBuffer, Pacer, PacingConfig};

fn buffer_push(c: &mut Criterion) {
    c.bench_function("buffer_push_token", |b| {
        let mut buffer = DisplayBuffer::new();
        b.iter(|| {
            buffer.push(black_box("token "));
        });
    });
}

fn buffer_advance(c: &mut Criterion) {
    let mut group = c.benchmark_group("buffer_advance");
    for chars in [1usize, 2, 16] {
        group.bench_with_input(BenchmarkId::from_parameter(chars), &chars, |b, &chars| {
            let mut buffer = DisplayBuffer::new();
            buffer.push(&"lorem ipsum dolor sit amet ".repeat(40_000));
            b.iter(|| {
                if !buffer.has_pending() {
                    buffer = DisplayBuffer::new();
                    buffer.push(&"lorem ipsum dolor sit amet ".repeat(40_000));
                }
                black_box(buffer.advance(chars));
            });
        });
    }
    group.finish();
}

fn pacer_tick(c: &mut Criterion) {
    let config = PacingConfig::default().with_frame_interval(Duration::ZERO);

    c.bench_function("pacer_tick_streaming", |b| {
        let start = Instant::now();
        let mut pacer = Pacer::new(config.clone());
        let mut now = start;
        b.iter(|| {
            now += Duration::from_micros(1);
            pacer.push("ab", now);
            black_box(pacer.tick(now));
        });
    });
}

fn decoder_feed(c: &mut Criterion) {
    let frames: Vec<u8> = (0..1_000)
        .flat_map(|i| format!("data: {{\"chunk\": \"token {i} \"}}\n\n").into_bytes())
        .collect();

    c.bench_function("decoder_feed_1k_frames", |b| {
        b.iter(|| {
            let mut decoder = FrameDecoder::new();
            for read in frames.chunks(512) {
                black_box(decoder.feed(read));
            }
        });
    });
}

criterion_group!(benches, buffer_push, buffer_advance, pacer_tick, decoder_feed);
criterion_main!(benches);
