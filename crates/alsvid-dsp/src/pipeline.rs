//! The synthesis pipeline: quantum symbols to DAC-ready waveform.
//!
//! Fixed step order:
//!
//! 1. draw (or load) the symbols
//! 2. upsample to the converter rate
//! 3. pulse-shape (RRC, or rectangular in pulsed mode)
//! 4. shift in frequency
//! 5. snapshot the quantum-only sequence
//! 6. superpose pilot tones
//! 7. prepend the Zadoff-Chu preamble
//! 8. pad zeros
//! 9. optionally persist
//!
//! The pipeline is pure: given the same configuration (including the
//! seed) and the same files on disk, it produces the same output.

use std::path::PathBuf;

use num_complex::Complex64;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DspError, DspResult};
use crate::filter::{apply_rect_filter, apply_rrc_filter};
use crate::io::{load_sequence, save_sequence};
use crate::modulation::ModulationScheme;
use crate::sequence::{add_pilots, pad_zeros, shift_frequency, upsample};
use crate::zadoff_chu::{prepend_preamble, zadoff_chu};

/// File persistence switches of the pipeline.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SignalFiles {
    /// Bypass synthesis and load all three outputs from their paths.
    #[serde(default)]
    pub load_final_sequence: bool,
    /// Persist the final sequence after synthesis.
    #[serde(default)]
    pub save_final_sequence: bool,
    /// Path of the final sequence.
    #[serde(default)]
    pub final_sequence_path: PathBuf,
    /// Persist the quantum-only sequence after synthesis.
    #[serde(default)]
    pub save_quantum_sequence: bool,
    /// Path of the quantum-only sequence.
    #[serde(default)]
    pub quantum_sequence_path: PathBuf,
    /// Load the symbols from disk instead of drawing them.
    #[serde(default)]
    pub load_symbols: bool,
    /// Persist the drawn symbols.
    #[serde(default)]
    pub save_symbols: bool,
    /// Path of the symbols.
    #[serde(default)]
    pub symbols_path: PathBuf,
}

/// Everything the pipeline needs to build one frame's waveform.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SynthesisConfig {
    /// Modulation family of the quantum symbols.
    pub modulation: ModulationScheme,
    /// Total variance of the complex symbols.
    pub variance: f64,
    /// Alphabet size for the discrete families.
    pub modulation_size: u32,
    /// Number of symbols in the frame.
    pub num_symbols: usize,
    /// Symbol rate in Hz.
    pub symbol_rate: f64,
    /// Pulse-shaping roll-off (also the cyclic ratio in pulsed mode).
    pub roll_off: f64,
    /// Center-frequency shift of the quantum band, in Hz.
    pub frequency_shift: f64,
    /// Pilot tone frequencies, in Hz.
    pub pilot_frequencies: Vec<f64>,
    /// Pilot tone amplitudes, one per frequency.
    pub pilot_amplitudes: Vec<f64>,
    /// Zadoff-Chu root.
    pub zc_root: u32,
    /// Zadoff-Chu length.
    pub zc_length: u32,
    /// Zadoff-Chu sample rate in Hz; 0 means the converter rate.
    pub zc_rate: f64,
    /// Zero padding before the preamble.
    pub num_zeros_start: usize,
    /// Zero padding after the quantum data.
    pub num_zeros_end: usize,
    /// Converter sample rate in Hz.
    pub dac_rate: f64,
    /// Rectangular pulses instead of RRC shaping.
    pub pulsed: bool,
    /// Persistence switches.
    pub files: SignalFiles,
    /// Seed for the symbol draw; `None` seeds from the OS.
    pub seed: Option<u64>,
}

impl Default for SynthesisConfig {
    fn default() -> Self {
        Self {
            modulation: ModulationScheme::Gaussian,
            variance: 0.05,
            modulation_size: 4,
            num_symbols: 4096,
            symbol_rate: 100e6,
            roll_off: 0.5,
            frequency_shift: 100e6,
            pilot_frequencies: Vec::new(),
            pilot_amplitudes: Vec::new(),
            zc_root: 5,
            zc_length: 3989,
            zc_rate: 0.0,
            num_zeros_start: 0,
            num_zeros_end: 0,
            dac_rate: 500e6,
            pulsed: false,
            files: SignalFiles::default(),
            seed: None,
        }
    }
}

impl SynthesisConfig {
    /// Oversampling factor `floor(dac_rate / symbol_rate)`.
    pub fn samples_per_symbol(&self) -> DspResult<usize> {
        if !(self.symbol_rate > 0.0) || !(self.dac_rate > 0.0) {
            return Err(DspError::InvalidRate(format!(
                "rates must be positive (symbol {}, converter {})",
                self.symbol_rate, self.dac_rate
            )));
        }
        let ratio = (self.dac_rate / self.symbol_rate).floor();
        if ratio < 1.0 {
            return Err(DspError::InvalidRate(format!(
                "symbol rate {} exceeds converter rate {}",
                self.symbol_rate, self.dac_rate
            )));
        }
        Ok(ratio as usize)
    }

    /// Sample-and-hold factor for the preamble,
    /// `floor(dac_rate / zc_rate)`, or 1 when `zc_rate` is unset.
    pub fn preamble_repeat(&self) -> DspResult<usize> {
        if self.zc_rate == 0.0 {
            return Ok(1);
        }
        if !(self.zc_rate > 0.0) {
            return Err(DspError::InvalidRate(format!(
                "preamble rate must not be negative, got {}",
                self.zc_rate
            )));
        }
        let repeat = (self.dac_rate / self.zc_rate).floor();
        if repeat < 1.0 {
            return Err(DspError::InvalidRate(format!(
                "preamble rate {} exceeds converter rate {}",
                self.zc_rate, self.dac_rate
            )));
        }
        Ok(repeat as usize)
    }
}

/// The three artifacts of one synthesis run.
#[derive(Debug, Clone, PartialEq)]
pub struct SynthesisOutput {
    /// What goes to the converter: preamble + pilots + quantum + padding.
    pub final_sequence: Vec<Complex64>,
    /// The shaped, shifted quantum data alone (calibration input).
    pub quantum_sequence: Vec<Complex64>,
    /// The raw symbols (parameter-estimation input).
    pub symbols: Vec<Complex64>,
}

impl SynthesisOutput {
    /// True when every final sample fits the converter's normalized
    /// range, `[-1, 1]` on both quadratures.
    pub fn within_unit_range(&self) -> bool {
        self.final_sequence
            .iter()
            .all(|s| s.re.abs() <= 1.0 && s.im.abs() <= 1.0)
    }
}

/// Run the pipeline (or the load bypass) for one frame.
pub fn synthesize(config: &SynthesisConfig) -> DspResult<SynthesisOutput> {
    if config.files.load_final_sequence {
        debug!(
            final_path = %config.files.final_sequence_path.display(),
            quantum_path = %config.files.quantum_sequence_path.display(),
            symbols_path = %config.files.symbols_path.display(),
            "load switch set, bypassing synthesis"
        );
        return Ok(SynthesisOutput {
            final_sequence: load_sequence(&config.files.final_sequence_path)?,
            quantum_sequence: load_sequence(&config.files.quantum_sequence_path)?,
            symbols: load_sequence(&config.files.symbols_path)?,
        });
    }

    let sps = config.samples_per_symbol()?;
    if config.num_symbols == 0 {
        return Err(DspError::InvalidModulation(
            "at least one symbol is required".into(),
        ));
    }

    let symbols = if config.files.load_symbols {
        load_sequence(&config.files.symbols_path)?
    } else {
        let mut rng = match config.seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };
        debug!(
            modulation = config.modulation.name(),
            variance = config.variance,
            count = config.num_symbols,
            "drawing symbols"
        );
        config.modulation.draw(
            config.variance,
            config.modulation_size,
            config.num_symbols,
            &mut rng,
        )?
    };
    if config.files.save_symbols {
        save_sequence(&config.files.symbols_path, &symbols)?;
    }

    debug!(sps, "upsampling");
    let sequence = upsample(&symbols, sps);

    let length = 10 * sps + 2;
    let symbol_period = 1.0 / config.symbol_rate;
    let sequence = if config.pulsed {
        debug!(length, "pulse shaping with rectangular filter");
        apply_rect_filter(
            &sequence,
            length,
            config.roll_off,
            symbol_period,
            config.dac_rate,
        )?
    } else {
        debug!(length, roll_off = config.roll_off, "pulse shaping with RRC filter");
        apply_rrc_filter(
            &sequence,
            length,
            config.roll_off,
            symbol_period,
            config.dac_rate,
        )?
    };

    let sequence = shift_frequency(&sequence, config.frequency_shift, config.dac_rate);
    let quantum_sequence = sequence.clone();
    if config.files.save_quantum_sequence {
        save_sequence(&config.files.quantum_sequence_path, &quantum_sequence)?;
    }

    let sequence = add_pilots(
        &sequence,
        &config.pilot_frequencies,
        &config.pilot_amplitudes,
        config.dac_rate,
    )?;

    let repeat = config.preamble_repeat()?;
    let preamble = zadoff_chu(config.zc_root, config.zc_length)?;
    debug!(
        root = config.zc_root,
        length = config.zc_length,
        repeat,
        "prepending preamble"
    );
    let sequence = prepend_preamble(&sequence, &preamble, repeat);

    let final_sequence = pad_zeros(&sequence, config.num_zeros_start, config.num_zeros_end);
    if config.files.save_final_sequence {
        save_sequence(&config.files.final_sequence_path, &final_sequence)?;
    }

    Ok(SynthesisOutput {
        final_sequence,
        quantum_sequence,
        symbols,
    })
}
