//! Performance benchmarks for the audio and protocol hot paths
//!
//! Run with: cargo bench
//! Or for specific benchmarks: cargo bench -- <filter>

use criterion::{BenchmarkId, Criterion, Throughput, black_box, criterion_group, criterion_main};
use std::time::Duration;
use voice_interview::core::audio::{
    AudioBuffer, CAPTURE_BLOCK_SIZE, decode_base64, encode_base64, encode_capture_block,
    float_to_pcm_bytes, int16_to_pcm_bytes, pcm_bytes_to_float, resample_linear,
};
use voice_interview::core::conversation::extract_question;
use voice_interview::core::realtime::{ClientEvent, ServerEvent};

fn sine(len: usize, rate: u32) -> Vec<f32> {
    (0..len)
        .map(|i| (i as f32 * 440.0 * std::f32::consts::TAU / rate as f32).sin() * 0.8)
        .collect()
}

/// Benchmark microphone block encoding at common device rates
fn bench_capture_encoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("capture_encoding");
    group.measurement_time(Duration::from_secs(5));

    for rate in [16_000u32, 24_000, 44_100, 48_000] {
        let block = AudioBuffer::new(sine(CAPTURE_BLOCK_SIZE, rate), rate);
        group.throughput(Throughput::Elements(CAPTURE_BLOCK_SIZE as u64));
        group.bench_with_input(BenchmarkId::new("block", rate), &block, |b, block| {
            b.iter(|| encode_capture_block(black_box(block)));
        });
    }

    // Full outbound path: encode, base64 and serialize the append frame
    let block = AudioBuffer::new(sine(CAPTURE_BLOCK_SIZE, 48_000), 48_000);
    group.bench_function("append_frame_48k", |b| {
        b.iter(|| {
            let bytes = encode_capture_block(black_box(&block));
            serde_json::to_string(&ClientEvent::audio_append(&bytes))
        });
    });

    group.finish();
}

/// Benchmark decoding of response audio deltas
fn bench_playback_decoding(c: &mut Criterion) {
    let mut group = c.benchmark_group("playback_decoding");

    // 100ms and 1s of 24kHz audio
    for samples in [2_400usize, 24_000] {
        let pcm = float_to_pcm_bytes(&sine(samples, 24_000));
        let frame = serde_json::json!({
            "type": "response.audio.delta",
            "response_id": "resp_001",
            "item_id": "item_001",
            "delta": encode_base64(&pcm)
        })
        .to_string();

        group.throughput(Throughput::Bytes(frame.len() as u64));
        group.bench_with_input(BenchmarkId::new("audio_delta", samples), &frame, |b, frame| {
            b.iter(|| {
                let event: ServerEvent = serde_json::from_str(black_box(frame)).unwrap();
                if let ServerEvent::AudioDelta { delta, .. } = event {
                    let bytes = decode_base64(&delta).unwrap();
                    black_box(pcm_bytes_to_float(&bytes));
                }
            });
        });
    }

    group.finish();
}

/// Benchmark resampling between wire and device rates
fn bench_resampling(c: &mut Criterion) {
    let mut group = c.benchmark_group("resampling");

    let wire = sine(24_000, 24_000);
    group.throughput(Throughput::Elements(wire.len() as u64));
    group.bench_function("24k_to_48k", |b| {
        b.iter(|| resample_linear(black_box(&wire), 24_000, 48_000));
    });
    group.bench_function("24k_to_44k1", |b| {
        b.iter(|| resample_linear(black_box(&wire), 24_000, 44_100));
    });

    let device = sine(48_000, 48_000);
    group.throughput(Throughput::Elements(device.len() as u64));
    group.bench_function("48k_to_24k", |b| {
        b.iter(|| resample_linear(black_box(&device), 48_000, 24_000));
    });

    group.finish();
}

/// Benchmark PCM16 serialization
fn bench_pcm_serialization(c: &mut Criterion) {
    let mut group = c.benchmark_group("pcm_serialization");

    let samples: Vec<i16> = (0..24_000).map(|i| (i % 65_536 - 32_768) as i16).collect();
    group.throughput(Throughput::Elements(samples.len() as u64));
    group.bench_function("int16_to_bytes", |b| {
        b.iter(|| int16_to_pcm_bytes(black_box(&samples)));
    });

    group.finish();
}

/// Benchmark question tracking over a growing assistant message
fn bench_question_extraction(c: &mut Criterion) {
    let mut group = c.benchmark_group("question_extraction");

    let short = "Thanks for that. Can you tell me about yourself?";
    let long = format!(
        "{} What was the hardest bug you fixed?",
        "That sounds like a great project. ".repeat(40)
    );

    group.bench_function("short", |b| b.iter(|| extract_question(black_box(short))));
    group.bench_function("long", |b| b.iter(|| extract_question(black_box(&long))));

    group.finish();
}

criterion_group!(
    benches,
    bench_capture_encoding,
    bench_playback_decoding,
    bench_resampling,
    bench_pcm_serialization,
    bench_question_extraction,
);
criterion_main!(benches);
