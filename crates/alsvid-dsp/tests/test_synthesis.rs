//! Integration tests for the synthesis pipeline.
//!
//! Covers the shape invariants of the output, the persistence hooks and
//! the load bypass.

use alsvid_dsp::{ModulationScheme, SignalFiles, SynthesisConfig, synthesize};
use proptest::prelude::*;

fn gcd(mut a: u32, mut b: u32) -> u32 {
    while b != 0 {
        (a, b) = (b, a % b);
    }
    a
}

/// Generate a valid configuration over a spread of rates, alphabets and
/// preamble shapes. Symbol rates are exact divisors of the converter
/// rate so the oversampling factor is not at the mercy of rounding.
fn arb_config() -> impl Strategy<Value = (SynthesisConfig, usize)> {
    let modulation = prop_oneof![
        Just((ModulationScheme::Gaussian, 4_u32)),
        Just((ModulationScheme::Psk, 8_u32)),
        Just((ModulationScheme::Qam, 16_u32)),
    ];
    let sps = prop_oneof![Just(1_usize), Just(2), Just(4), Just(5), Just(8)];
    let preamble = (2_u32..=64)
        .prop_flat_map(|length| (1..length, Just(length)))
        .prop_filter("root must be coprime with the length", |(root, length)| {
            gcd(*root, *length) == 1
        });
    (
        modulation,
        sps,
        preamble,
        1_usize..=128,
        0_usize..=32,
        0_usize..=32,
        0_usize..=2,
        any::<bool>(),
        any::<u64>(),
    )
        .prop_map(
            |(
                (modulation, modulation_size),
                sps,
                (zc_root, zc_length),
                num_symbols,
                num_zeros_start,
                num_zeros_end,
                num_pilots,
                pulsed,
                seed,
            )| {
                let dac_rate = 500e6;
                let config = SynthesisConfig {
                    modulation,
                    modulation_size,
                    num_symbols,
                    symbol_rate: dac_rate / sps as f64,
                    dac_rate,
                    pilot_frequencies: (0..num_pilots).map(|k| (k + 1) as f64 * 50e6).collect(),
                    pilot_amplitudes: vec![0.01; num_pilots],
                    zc_root,
                    zc_length,
                    num_zeros_start,
                    num_zeros_end,
                    pulsed,
                    seed: Some(seed),
                    ..SynthesisConfig::default()
                };
                (config, sps)
            },
        )
}

proptest! {
    /// The three output lengths follow directly from the configuration:
    /// symbols, quantum samples and the framed final sequence.
    #[test]
    fn test_output_shape_invariants((config, sps) in arb_config()) {
        let output = synthesize(&config).unwrap();
        prop_assert_eq!(output.symbols.len(), config.num_symbols,
            "symbol count mismatch");
        prop_assert_eq!(output.quantum_sequence.len(), config.num_symbols * sps,
            "quantum length mismatch");
        let expected = config.num_symbols * sps
            + config.zc_length as usize
            + config.num_zeros_start
            + config.num_zeros_end;
        prop_assert_eq!(output.final_sequence.len(), expected,
            "final length mismatch");
    }

    /// The padding regions stay exactly zero.
    #[test]
    fn test_padding_is_zero((config, _sps) in arb_config()) {
        let output = synthesize(&config).unwrap();
        let len = output.final_sequence.len();
        for sample in &output.final_sequence[..config.num_zeros_start] {
            prop_assert_eq!(sample.norm(), 0.0);
        }
        for sample in &output.final_sequence[len - config.num_zeros_end..] {
            prop_assert_eq!(sample.norm(), 0.0);
        }
    }
}

#[test]
fn test_save_then_load_bypass_round_trip() {
    let dir = tempfile::tempdir().unwrap();
    let files = SignalFiles {
        final_sequence_path: dir.path().join("final.bin"),
        quantum_sequence_path: dir.path().join("quantum.bin"),
        symbols_path: dir.path().join("symbols.bin"),
        ..SignalFiles::default()
    };

    let saving = SynthesisConfig {
        num_symbols: 256,
        seed: Some(99),
        files: SignalFiles {
            save_final_sequence: true,
            save_quantum_sequence: true,
            save_symbols: true,
            ..files.clone()
        },
        ..SynthesisConfig::default()
    };
    let original = synthesize(&saving).unwrap();

    let loading = SynthesisConfig {
        files: SignalFiles {
            load_final_sequence: true,
            ..files
        },
        // A different seed must not matter once everything is on disk.
        seed: Some(7),
        ..saving.clone()
    };
    let reloaded = synthesize(&loading).unwrap();

    assert_eq!(original, reloaded);
}

#[test]
fn test_loaded_symbols_pin_the_waveform() {
    let dir = tempfile::tempdir().unwrap();
    let symbols_path = dir.path().join("symbols.bin");

    let first = SynthesisConfig {
        num_symbols: 128,
        seed: Some(5),
        files: SignalFiles {
            save_symbols: true,
            symbols_path: symbols_path.clone(),
            ..SignalFiles::default()
        },
        ..SynthesisConfig::default()
    };
    let original = synthesize(&first).unwrap();

    // Different seed, but the symbols come from disk: everything
    // downstream of the draw is deterministic.
    let second = SynthesisConfig {
        seed: Some(6),
        files: SignalFiles {
            load_symbols: true,
            symbols_path,
            ..SignalFiles::default()
        },
        ..first.clone()
    };
    let replayed = synthesize(&second).unwrap();

    assert_eq!(original.symbols, replayed.symbols);
    assert_eq!(original.final_sequence, replayed.final_sequence);
}

#[test]
fn test_discrete_modulations_synthesize() {
    let psk = SynthesisConfig {
        modulation: ModulationScheme::Psk,
        modulation_size: 4,
        variance: 0.05,
        num_symbols: 64,
        seed: Some(2),
        ..SynthesisConfig::default()
    };
    let output = synthesize(&psk).unwrap();
    for symbol in &output.symbols {
        assert!((symbol.norm() - 0.05_f64.sqrt()).abs() < 1e-12);
    }

    let qam = SynthesisConfig {
        modulation: ModulationScheme::Qam,
        modulation_size: 16,
        ..psk
    };
    assert_eq!(synthesize(&qam).unwrap().symbols.len(), 64);
}
