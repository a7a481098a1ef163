//! Simulated arbitrary-waveform converter.

use std::sync::{Arc, Mutex, PoisonError};

use async_trait::async_trait;
use tracing::debug;

use alsvid_hal::{EmissionParams, HalError, HalResult, RepeatMode, TransmitConverter};

use crate::trace::BenchLog;

/// One recorded lifecycle call.
#[derive(Debug, Clone, PartialEq)]
pub enum ConverterEvent {
    Opened,
    Configured(RepeatMode),
    Loaded { samples: usize },
    Started,
    Stopped,
    Closed,
}

#[derive(Debug, Default)]
struct ConverterState {
    open: bool,
    mode: Option<RepeatMode>,
    loaded_i: Vec<f64>,
    loaded_q: Vec<f64>,
    playing: bool,
    events: Vec<ConverterEvent>,
}

/// Read-only view into a [`SimConverter`], usable after the device has
/// been boxed into a bench.
#[derive(Debug, Clone)]
pub struct SimConverterProbe {
    state: Arc<Mutex<ConverterState>>,
}

impl SimConverterProbe {
    fn state(&self) -> std::sync::MutexGuard<'_, ConverterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Whether playback is running right now.
    pub fn is_playing(&self) -> bool {
        self.state().playing
    }

    /// Mode of the last `configure()` call.
    pub fn mode(&self) -> Option<RepeatMode> {
        self.state().mode
    }

    /// Copy of the currently loaded sequence.
    pub fn loaded(&self) -> (Vec<f64>, Vec<f64>) {
        let state = self.state();
        (state.loaded_i.clone(), state.loaded_q.clone())
    }

    /// All lifecycle events so far.
    pub fn events(&self) -> Vec<ConverterEvent> {
        self.state().events.clone()
    }
}

/// Converter double. Records every call, enforces the open/close
/// lifecycle and rejects samples outside the normalized range.
#[derive(Debug)]
pub struct SimConverter {
    state: Arc<Mutex<ConverterState>>,
    log: Option<BenchLog>,
}

impl SimConverter {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(ConverterState::default())),
            log: None,
        }
    }

    /// Attach a bench-wide call log.
    pub fn with_log(mut self, log: BenchLog) -> Self {
        self.log = Some(log);
        self
    }

    /// Handle for assertions once the device is boxed.
    pub fn probe(&self) -> SimConverterProbe {
        SimConverterProbe {
            state: Arc::clone(&self.state),
        }
    }

    fn state(&self) -> std::sync::MutexGuard<'_, ConverterState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn record(&self, entry: &str) {
        if let Some(log) = &self.log {
            log.record(format!("dac.{entry}"));
        }
    }

    fn ensure_open(&self) -> HalResult<()> {
        if self.state().open {
            Ok(())
        } else {
            Err(HalError::NotOpen("sim converter".into()))
        }
    }
}

impl Default for SimConverter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransmitConverter for SimConverter {
    fn name(&self) -> &str {
        "sim-converter"
    }

    async fn open(&mut self) -> HalResult<()> {
        let mut state = self.state();
        state.open = true;
        state.events.push(ConverterEvent::Opened);
        drop(state);
        self.record("open");
        Ok(())
    }

    async fn configure(&mut self, params: &EmissionParams) -> HalResult<()> {
        self.ensure_open()?;
        if params.channels.len() != 2 {
            return Err(HalError::InvalidParams(format!(
                "expected 2 channels for I and Q, got {}",
                params.channels.len()
            )));
        }
        let mut state = self.state();
        state.mode = Some(params.mode);
        state.events.push(ConverterEvent::Configured(params.mode));
        drop(state);
        self.record("configure");
        debug!(mode = params.mode.name(), rate = params.rate, "sim converter configured");
        Ok(())
    }

    async fn load(&mut self, i: &[f64], q: &[f64]) -> HalResult<()> {
        self.ensure_open()?;
        if i.len() != q.len() {
            return Err(HalError::InvalidParams(format!(
                "I and Q lengths differ: {} vs {}",
                i.len(),
                q.len()
            )));
        }
        if i.iter().chain(q).any(|s| !(s.abs() <= 1.0)) {
            return Err(HalError::InvalidParams(
                "samples outside the normalized [-1, 1] range".into(),
            ));
        }
        let mut state = self.state();
        state.loaded_i = i.to_vec();
        state.loaded_q = q.to_vec();
        state.events.push(ConverterEvent::Loaded { samples: i.len() });
        drop(state);
        self.record("load");
        Ok(())
    }

    async fn start(&mut self) -> HalResult<()> {
        self.ensure_open()?;
        let mut state = self.state();
        if state.loaded_i.is_empty() {
            return Err(HalError::Device("no sequence loaded".into()));
        }
        state.playing = true;
        state.events.push(ConverterEvent::Started);
        drop(state);
        self.record("start");
        Ok(())
    }

    async fn stop(&mut self) -> HalResult<()> {
        self.ensure_open()?;
        let mut state = self.state();
        state.playing = false;
        state.events.push(ConverterEvent::Stopped);
        drop(state);
        self.record("stop");
        Ok(())
    }

    async fn close(&mut self) -> HalResult<()> {
        let mut state = self.state();
        if state.open {
            state.open = false;
            state.playing = false;
            state.events.push(ConverterEvent::Closed);
            drop(state);
            self.record("close");
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(mode: RepeatMode) -> EmissionParams {
        EmissionParams {
            channels: vec![1, 2],
            rate: 500e6,
            amplitude: 0.5,
            mode,
            extra: serde_json::Map::new(),
        }
    }

    #[tokio::test]
    async fn test_lifecycle_and_history() {
        let mut dac = SimConverter::new();
        let probe = dac.probe();

        dac.open().await.unwrap();
        dac.configure(&params(RepeatMode::Single)).await.unwrap();
        dac.load(&[0.1, 0.2], &[0.0, -0.1]).await.unwrap();
        dac.start().await.unwrap();
        assert!(probe.is_playing());
        dac.stop().await.unwrap();
        assert!(!probe.is_playing());
        dac.close().await.unwrap();

        assert_eq!(
            probe.events(),
            vec![
                ConverterEvent::Opened,
                ConverterEvent::Configured(RepeatMode::Single),
                ConverterEvent::Loaded { samples: 2 },
                ConverterEvent::Started,
                ConverterEvent::Stopped,
                ConverterEvent::Closed,
            ]
        );
        assert_eq!(probe.loaded().0, vec![0.1, 0.2]);
    }

    #[tokio::test]
    async fn test_not_open_guard() {
        let mut dac = SimConverter::new();
        assert!(matches!(
            dac.load(&[0.0], &[0.0]).await,
            Err(HalError::NotOpen(_))
        ));
        // Closing a never-opened device is a no-op.
        dac.close().await.unwrap();
        assert!(dac.probe().events().is_empty());
    }

    #[tokio::test]
    async fn test_rejects_out_of_range_samples() {
        let mut dac = SimConverter::new();
        dac.open().await.unwrap();
        assert!(matches!(
            dac.load(&[1.5], &[0.0]).await,
            Err(HalError::InvalidParams(_))
        ));
    }

    #[tokio::test]
    async fn test_start_requires_loaded_sequence() {
        let mut dac = SimConverter::new();
        dac.open().await.unwrap();
        assert!(matches!(dac.start().await, Err(HalError::Device(_))));
    }

    #[tokio::test]
    async fn test_close_stops_playback() {
        let mut dac = SimConverter::new();
        let probe = dac.probe();
        dac.open().await.unwrap();
        dac.load(&[0.1], &[0.1]).await.unwrap();
        dac.start().await.unwrap();
        dac.close().await.unwrap();
        assert!(!probe.is_playing());
    }
}
