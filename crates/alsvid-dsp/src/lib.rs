//! Digital signal processing for the transmitter.
//!
//! Everything here is pure and synchronous: the pipeline turns a
//! [`SynthesisConfig`] into the three artifacts of one frame (the
//! DAC-ready final sequence, the quantum-only sequence and the raw
//! symbols) without touching hardware. Determinism is part of the
//! contract, a seeded run always produces the same waveform.
//!
//! ```
//! use alsvid_dsp::{SynthesisConfig, synthesize};
//!
//! let config = SynthesisConfig {
//!     num_symbols: 128,
//!     seed: Some(1),
//!     ..SynthesisConfig::default()
//! };
//! let output = synthesize(&config)?;
//! assert_eq!(output.symbols.len(), 128);
//! # Ok::<(), alsvid_dsp::DspError>(())
//! ```

pub mod error;
pub mod filter;
pub mod io;
pub mod modulation;
pub mod pipeline;
pub mod sequence;
pub mod zadoff_chu;

pub use error::{DspError, DspResult};
pub use io::{load_sequence, save_sequence};
pub use modulation::ModulationScheme;
pub use pipeline::{SignalFiles, SynthesisConfig, SynthesisOutput, synthesize};
pub use zadoff_chu::zadoff_chu;
