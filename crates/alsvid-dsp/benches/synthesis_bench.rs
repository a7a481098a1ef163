//! Benchmarks for the waveform synthesis pipeline
//!
//! Run with: cargo bench -p alsvid-dsp

use alsvid_dsp::filter::apply_rrc_filter;
use alsvid_dsp::sequence::upsample;
use alsvid_dsp::zadoff_chu::zadoff_chu;
use alsvid_dsp::{ModulationScheme, SynthesisConfig, synthesize};
use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use num_complex::Complex64;

/// Benchmark the full pipeline at realistic frame sizes
fn bench_synthesize(c: &mut Criterion) {
    let mut group = c.benchmark_group("synthesize");
    group.sample_size(20);

    for num_symbols in &[10_000_usize, 100_000, 1_000_000] {
        group.bench_with_input(
            BenchmarkId::new("gaussian", num_symbols),
            num_symbols,
            |b, &n| {
                let config = SynthesisConfig {
                    num_symbols: n,
                    pilot_frequencies: vec![200e6, 220e6],
                    pilot_amplitudes: vec![0.05, 0.05],
                    seed: Some(42),
                    ..SynthesisConfig::default()
                };
                b.iter(|| synthesize(black_box(&config)).unwrap());
            },
        );
    }

    group.finish();
}

/// Benchmark the modulation families against each other
fn bench_modulation_draw(c: &mut Criterion) {
    let mut group = c.benchmark_group("modulation_draw");

    for (name, modulation, size) in [
        ("gaussian", ModulationScheme::Gaussian, 4_u32),
        ("psk", ModulationScheme::Psk, 8),
        ("qam", ModulationScheme::Qam, 64),
    ] {
        group.bench_function(name, |b| {
            let config = SynthesisConfig {
                modulation,
                modulation_size: size,
                num_symbols: 100_000,
                seed: Some(42),
                ..SynthesisConfig::default()
            };
            b.iter(|| synthesize(black_box(&config)).unwrap());
        });
    }

    group.finish();
}

/// Benchmark the FFT-backed pulse shaping on its own
fn bench_pulse_shaping(c: &mut Criterion) {
    let mut group = c.benchmark_group("pulse_shaping");
    group.sample_size(20);

    for num_symbols in &[10_000_usize, 100_000] {
        let symbols: Vec<Complex64> = (0..*num_symbols)
            .map(|n| Complex64::new((n % 7) as f64 * 0.01, (n % 5) as f64 * 0.01))
            .collect();
        let upsampled = upsample(&symbols, 5);
        group.bench_with_input(
            BenchmarkId::new("rrc", num_symbols),
            &upsampled,
            |b, sequence| {
                b.iter(|| {
                    apply_rrc_filter(black_box(sequence), 52, 0.5, 1e-8, 500e6).unwrap()
                });
            },
        );
    }

    group.finish();
}

/// Benchmark preamble generation
fn bench_preamble(c: &mut Criterion) {
    let mut group = c.benchmark_group("preamble");

    for length in &[3989_u32, 13_913] {
        group.bench_with_input(BenchmarkId::new("zadoff_chu", length), length, |b, &l| {
            b.iter(|| zadoff_chu(black_box(5), black_box(l)).unwrap());
        });
    }

    group.finish();
}

criterion_group!(
    benches,
    bench_synthesize,
    bench_modulation_draw,
    bench_pulse_shaping,
    bench_preamble,
);

criterion_main!(benches);
