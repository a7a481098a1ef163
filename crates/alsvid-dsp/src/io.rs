//! Sequence persistence.
//!
//! Sequences are stored as bincode with the quadratures split into two
//! flat vectors, so the on-disk format does not depend on how any
//! complex type happens to serialize.

use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;

use num_complex::Complex64;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{DspError, DspResult};

#[derive(Serialize, Deserialize)]
struct StoredSequence {
    re: Vec<f64>,
    im: Vec<f64>,
}

impl StoredSequence {
    fn from_samples(samples: &[Complex64]) -> Self {
        Self {
            re: samples.iter().map(|s| s.re).collect(),
            im: samples.iter().map(|s| s.im).collect(),
        }
    }

    fn into_samples(self) -> Result<Vec<Complex64>, String> {
        if self.re.len() != self.im.len() {
            return Err(format!(
                "quadrature lengths differ: {} vs {}",
                self.re.len(),
                self.im.len()
            ));
        }
        Ok(self
            .re
            .into_iter()
            .zip(self.im)
            .map(|(re, im)| Complex64::new(re, im))
            .collect())
    }
}

/// Write a sequence to `path`, replacing any existing file.
pub fn save_sequence(path: impl AsRef<Path>, samples: &[Complex64]) -> DspResult<()> {
    let path = path.as_ref();
    let save_err = |reason: String| DspError::Save {
        path: path.to_path_buf(),
        reason,
    };
    debug!(path = %path.display(), samples = samples.len(), "saving sequence");
    let file = File::create(path).map_err(|err| save_err(err.to_string()))?;
    let writer = BufWriter::new(file);
    bincode::serialize_into(writer, &StoredSequence::from_samples(samples))
        .map_err(|err| save_err(err.to_string()))
}

/// Read a sequence from `path`. A missing or corrupt file is a
/// [`DspError::Load`], never a panic.
pub fn load_sequence(path: impl AsRef<Path>) -> DspResult<Vec<Complex64>> {
    let path = path.as_ref();
    let load_err = |reason: String| DspError::Load {
        path: path.to_path_buf(),
        reason,
    };
    debug!(path = %path.display(), "loading sequence");
    let file = File::open(path).map_err(|err| load_err(err.to_string()))?;
    let reader = BufReader::new(file);
    let stored: StoredSequence =
        bincode::deserialize_from(reader).map_err(|err| load_err(err.to_string()))?;
    stored.into_samples().map_err(load_err)
}
