//! The protocol engine.
//!
//! One [`Engine`] owns the session, the current frame, the live
//! configuration and the transmitter bench, and drives the whole
//! exchange: every received protocol unit is classified, checked
//! against the legality table and answered with exactly one response
//! before the next unit is read.
//!
//! Fault discipline:
//!
//! - protocol violations are answered with their specific error code
//!   and change nothing;
//! - a synthesis failure aborts the current frame attempt, stage
//!   untouched;
//! - a device fault before the response escalates to an abort plus a
//!   full session/frame reset, and the engine keeps serving;
//! - a device fault after the response (calibration) is logged and
//!   absorbed, so no command ever produces two responses.

use std::path::PathBuf;

use num_complex::Complex64;
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand_distr::{Distribution, Normal};
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

use alsvid_config::{Config, ConfigError, ParameterRegistry};
use alsvid_dsp::synthesize;
use alsvid_hal::Bench;
use alsvid_proto::{
    AbortNotice, ChangeParameter, ChannelError, ChannelResult, ControlChannel, ControlCode,
    DenyNotice, ErrorNotice, EstimationSummary, FrameEndedAck, IdentificationRequest,
    IdentificationResponse, InitializationRequest, InvalidVersion, Message, PROTOCOL_VERSION,
    ParameterChanged, ParameterUnknown, PhotonNumberResponse, SymbolsRequest, SymbolsResponse,
};

use crate::admin::AdminRequest;
use crate::bench::{bring_up, tear_down};
use crate::calibration::measure_photon_number;
use crate::error::ServerResult;
use crate::recovery::{end_recovery, start_recovery};
use crate::state::{Frame, FrameStage, Session, is_command_legal};

/// What became of one processed unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    /// Keep reading from the same peer.
    Continue,
    /// The peer is gone; go back to accepting.
    PeerLost,
}

/// Work that runs after the response has been delivered.
enum FollowUp {
    Calibrate,
}

#[derive(PartialEq)]
enum AdminFlow {
    Continue,
    Stop,
}

/// The transmitter-side control engine.
pub struct Engine {
    config: Config,
    config_path: Option<PathBuf>,
    parameters: ParameterRegistry,
    channel: Box<dyn ControlChannel>,
    bench: Bench,
    session: Session,
    frame: Option<Frame>,
    admin: Option<mpsc::Receiver<AdminRequest>>,
}

impl Engine {
    /// Bring the bench up and return a ready engine.
    ///
    /// A failure partway through bring-up rolls the already-opened
    /// devices back before returning; the caller decides what a fatal
    /// startup error means for the process.
    pub async fn start(
        config: Config,
        channel: Box<dyn ControlChannel>,
        mut bench: Bench,
    ) -> ServerResult<Self> {
        if let Err(err) = bring_up(&mut bench, &config).await {
            error!(error = %err, "bench bring-up failed, rolling back");
            tear_down(&mut bench).await;
            return Err(err);
        }
        info!(serial = %config.serial_number, "transmitter bench live");
        Ok(Self {
            config,
            config_path: None,
            parameters: ParameterRegistry::new(),
            channel,
            bench,
            session: Session::default(),
            frame: None,
            admin: None,
        })
    }

    /// Remember where the configuration came from, for operator reload.
    pub fn set_reload_path(&mut self, path: PathBuf) {
        self.config_path = Some(path);
    }

    /// Attach the operator admin channel, drained between messages.
    pub fn attach_admin(&mut self, admin: mpsc::Receiver<AdminRequest>) {
        self.admin = Some(admin);
    }

    /// Current session view.
    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Current frame, if one exists.
    pub fn frame(&self) -> Option<&Frame> {
        self.frame.as_ref()
    }

    /// Live configuration.
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Serve until the operator stops the engine or the channel closes.
    pub async fn serve(&mut self) -> ServerResult<()> {
        info!(serial = %self.config.serial_number, "engine serving");
        loop {
            if !self.session.connected {
                match self.channel.accept().await {
                    Ok(()) => {
                        self.session.connected = true;
                        info!("peer attached");
                    }
                    Err(ChannelError::Closed) => return Ok(()),
                    Err(err) => return Err(err.into()),
                }
            }

            enum Inbound {
                Admin(Option<AdminRequest>),
                Unit(ChannelResult<Message>),
            }
            let inbound = match &mut self.admin {
                Some(admin) => tokio::select! {
                    biased;
                    request = admin.recv() => Inbound::Admin(request),
                    unit = self.channel.receive() => Inbound::Unit(unit),
                },
                None => Inbound::Unit(self.channel.receive().await),
            };
            match inbound {
                Inbound::Admin(None) => self.admin = None,
                Inbound::Admin(Some(request)) => {
                    if self.handle_admin(request).await == AdminFlow::Stop {
                        return Ok(());
                    }
                }
                Inbound::Unit(unit) => {
                    self.process(unit).await;
                }
            }
        }
    }

    /// Wait for a peer on the channel.
    pub async fn accept(&mut self) -> ServerResult<()> {
        self.channel.accept().await?;
        self.session.connected = true;
        Ok(())
    }

    /// Receive and process exactly one protocol unit.
    pub async fn step(&mut self) -> Flow {
        let unit = self.channel.receive().await;
        self.process(unit).await
    }

    /// Release the bench and the channel.
    pub async fn shutdown(&mut self) {
        tear_down(&mut self.bench).await;
        if let Err(err) = self.channel.close().await {
            warn!(error = %err, "channel close failed");
        }
        info!("engine shut down");
    }

    /// Classify, dispatch and answer one received unit.
    pub async fn process(&mut self, unit: ChannelResult<Message>) -> Flow {
        let message = match unit {
            Ok(message) => message,
            Err(ChannelError::Disconnected) => {
                info!("peer disconnected");
                self.reset_full();
                self.session.connected = false;
                return Flow::PeerLost;
            }
            Err(ChannelError::UnknownCode(code)) => {
                warn!(code, "unknown control code");
                return self.answer(Message::bare(ControlCode::UnknownCommand)).await;
            }
            Err(ChannelError::AuthenticationFailure(reason)) => {
                warn!(%reason, "channel authentication failure");
                self.session.authenticated = false;
                return self
                    .answer(Message::bare(ControlCode::AuthenticationInvalid))
                    .await;
            }
            Err(ChannelError::Frame(reason)) => {
                warn!(%reason, "malformed protocol unit");
                return self.answer(invalid_content(reason)).await;
            }
            Err(err) => {
                error!(error = %err, "transport failure, detaching peer");
                self.reset_full();
                self.session.connected = false;
                return Flow::PeerLost;
            }
        };

        debug!(code = %message.code, "command received");
        let (response, followup) = self.dispatch(message).await;
        let flow = self.answer(response).await;
        if flow == Flow::Continue {
            if let Some(FollowUp::Calibrate) = followup {
                self.run_calibration().await;
            }
        }
        flow
    }

    async fn answer(&mut self, response: Message) -> Flow {
        debug!(code = %response.code, "responding");
        match self.channel.send(&response).await {
            Ok(()) => Flow::Continue,
            Err(err) => {
                warn!(error = %err, "response undeliverable, detaching peer");
                self.reset_full();
                self.session.connected = false;
                Flow::PeerLost
            }
        }
    }

    async fn dispatch(&mut self, message: Message) -> (Message, Option<FollowUp>) {
        match message.code {
            // Session-global commands, legal once a peer is attached.
            ControlCode::Abort => (self.handle_abort(&message), None),
            ControlCode::Disconnection => (self.handle_disconnection(), None),
            ControlCode::InvalidResponse => {
                warn!("peer flagged an invalid response");
                (Message::bare(ControlCode::InvalidResponseAck), None)
            }
            ControlCode::ChangeParameterRequest => (self.handle_change_parameter(&message), None),
            ControlCode::PolarizationRecoveryRequest => (self.handle_recovery_start().await, None),
            ControlCode::PolarizationRecoveryEnd => (self.handle_recovery_end().await, None),

            code if !is_command_legal(code, &self.session, self.stage()) => {
                warn!(%code, stage = ?self.stage().map(|s| s.name()), "unexpected command");
                (Message::bare(ControlCode::UnexpectedCommand), None)
            }

            ControlCode::IdentificationRequest => (self.handle_identification(&message), None),
            ControlCode::InitializationRequest => (self.handle_initialization(&message), None),
            // Configuration negotiation is future work.
            ControlCode::InitializationRequestConfig => {
                (Message::bare(ControlCode::UnexpectedCommand), None)
            }

            ControlCode::QieRequest => (self.handle_qie_request().await, None),
            ControlCode::QieTrigger => (self.handle_qie_trigger().await, None),
            ControlCode::QieAcquisitionEnded => self.handle_acquisition_ended().await,

            ControlCode::PeSymbolsRequest => (self.handle_pe_symbols(&message), None),
            ControlCode::PeNphotonRequest => (self.handle_pe_photon_number(), None),
            ControlCode::PeFinished => (self.handle_pe_finished(&message), None),

            // Key distillation is not served by this engine.
            ControlCode::EcInitialization
            | ControlCode::EcBlock
            | ControlCode::EcRemaining
            | ControlCode::EcVerification
            | ControlCode::PaRequest => (Message::bare(ControlCode::UnexpectedCommand), None),

            ControlCode::FrameEnded => (self.handle_frame_ended(), None),

            _ => (Message::bare(ControlCode::UnexpectedCommand), None),
        }
    }

    fn handle_abort(&mut self, message: &Message) -> Message {
        let reason = message
            .decode::<AbortNotice>()
            .ok()
            .and_then(|notice| notice.abort_message);
        warn!(
            reason = reason.as_deref().unwrap_or("none given"),
            "peer aborted the exchange"
        );
        self.reset_full();
        Message::bare(ControlCode::AbortAck)
    }

    fn handle_disconnection(&mut self) -> Message {
        info!("peer announced disconnection");
        self.reset_full();
        Message::bare(ControlCode::DisconnectionAck)
    }

    fn handle_identification(&mut self, message: &Message) -> Message {
        let request: IdentificationRequest = match message.decode() {
            Ok(request) => request,
            Err(err) => return invalid_content(err.to_string()),
        };
        if request.protocol_version != PROTOCOL_VERSION {
            warn!(
                peer_version = %request.protocol_version,
                our_version = PROTOCOL_VERSION,
                "protocol version mismatch"
            );
            return payload_message(
                ControlCode::InvalidVersion,
                &InvalidVersion {
                    protocol_version: PROTOCOL_VERSION.to_string(),
                },
            );
        }
        info!(peer_serial = %request.serial_number, "peer identified");
        self.session.authenticated = true;
        // A re-identification opens a new epoch; any old frame is stale.
        self.frame = None;
        payload_message(
            ControlCode::IdentificationResponse,
            &IdentificationResponse {
                serial_number: self.config.serial_number.clone(),
            },
        )
    }

    fn handle_initialization(&mut self, message: &Message) -> Message {
        let request: InitializationRequest = match message.decode() {
            Ok(request) => request,
            Err(err) => return invalid_content(err.to_string()),
        };
        if let Some(old) = &self.frame {
            info!(old_frame = %old.id, "replacing the current frame");
        }
        info!(frame = %request.frame_id, "frame initialized");
        self.frame = Some(Frame::new(request.frame_id));
        Message::bare(ControlCode::InitializationAccepted)
    }

    async fn handle_qie_request(&mut self) -> Message {
        let synthesis = self.config.synthesis();
        let output = match synthesize(&synthesis) {
            Ok(output) => output,
            Err(err) => {
                warn!(error = %err, "waveform synthesis failed");
                return abort_notice("DSP was not successful");
            }
        };
        if !output.within_unit_range() {
            warn!("synthesized waveform exceeds the converter range");
            return abort_notice("DSP was not successful");
        }
        let (i, q) = self.converter_image(&output.final_sequence);
        if let Err(err) = self.bench.converter.load(&i, &q).await {
            return self.abort_on_fault("loading the waveform", &err);
        }
        let Some(frame) = &mut self.frame else {
            return Message::bare(ControlCode::UnexpectedCommand);
        };
        frame.quantum_sequence = Some(output.quantum_sequence);
        frame.symbols = Some(output.symbols);
        frame.photon_number = 0.0;
        frame.stage = FrameStage::Prepared;
        info!(frame = %frame.id, samples = i.len(), "frame waveform armed");
        Message::bare(ControlCode::QieReady)
    }

    /// Split a sequence into the I/Q arrays the converter takes,
    /// perturbing them with the configured artificial excess noise.
    /// The stored quantum sequence stays clean; only the emitted image
    /// carries the noise.
    fn converter_image(&self, sequence: &[Complex64]) -> (Vec<f64>, Vec<f64>) {
        let mut i: Vec<f64> = sequence.iter().map(|s| s.re).collect();
        let mut q: Vec<f64> = sequence.iter().map(|s| s.im).collect();
        let excess = self.config.transmitter.artificial_excess_noise;
        if excess > 0.0 {
            if let Ok(noise) = Normal::new(0.0, (excess / 2.0).sqrt()) {
                let mut rng = StdRng::from_entropy();
                for sample in i.iter_mut().chain(q.iter_mut()) {
                    // The converter rejects anything outside its range.
                    *sample = (*sample + noise.sample(&mut rng)).clamp(-1.0, 1.0);
                }
                debug!(excess, "artificial excess noise applied to the converter image");
            }
        }
        (i, q)
    }

    async fn handle_qie_trigger(&mut self) -> Message {
        match self.bench.converter.start().await {
            Ok(()) => {
                self.advance(FrameStage::Sent);
                info!("emission started");
                Message::bare(ControlCode::QieEmissionStarted)
            }
            Err(err) => self.abort_on_fault("starting emission", &err),
        }
    }

    async fn handle_acquisition_ended(&mut self) -> (Message, Option<FollowUp>) {
        match self.bench.converter.stop().await {
            Ok(()) => {
                self.advance(FrameStage::Ended);
                info!("emission stopped, acquisition ended");
                (Message::bare(ControlCode::QieEnded), Some(FollowUp::Calibrate))
            }
            Err(err) => (self.abort_on_fault("stopping emission", &err), None),
        }
    }

    async fn run_calibration(&mut self) {
        let Some(quantum) = self
            .frame
            .as_ref()
            .and_then(|frame| frame.quantum_sequence.clone())
        else {
            warn!("no quantum sequence on the frame, skipping calibration");
            return;
        };
        let transmitter = &self.config.transmitter;
        let result = measure_photon_number(
            self.bench.converter.as_mut(),
            self.bench.power_meter.as_mut(),
            &transmitter.dac,
            &quantum,
            self.config.frame.quantum.symbol_rate,
            transmitter.emission_wavelength,
            transmitter.photodiode_conversion,
        )
        .await;
        match result {
            Ok(photon_number) => {
                if let Some(frame) = &mut self.frame {
                    frame.photon_number = photon_number;
                }
            }
            // The response is already out; absorb the fault and leave
            // the estimate at zero.
            Err(err) => warn!(error = %err, "photon-number calibration failed"),
        }
    }

    fn handle_pe_symbols(&self, message: &Message) -> Message {
        let request: SymbolsRequest = match message.decode() {
            Ok(request) => request,
            Err(err) => return invalid_content(err.to_string()),
        };
        let Some(symbols) = self.frame.as_ref().and_then(|frame| frame.symbols.as_ref()) else {
            return symbols_error("no symbols available for this frame".to_string());
        };
        let mut real = Vec::with_capacity(request.indices.len());
        let mut imag = Vec::with_capacity(request.indices.len());
        for &index in &request.indices {
            match usize::try_from(index).ok().and_then(|n| symbols.get(n)) {
                Some(symbol) => {
                    real.push(symbol.re);
                    imag.push(symbol.im);
                }
                None => {
                    return symbols_error(format!(
                        "index {index} out of range ({} symbols)",
                        symbols.len()
                    ));
                }
            }
        }
        payload_message(
            ControlCode::PeSymbolsResponse,
            &SymbolsResponse {
                symbols_real: real,
                symbols_imag: imag,
            },
        )
    }

    fn handle_pe_photon_number(&self) -> Message {
        let photon_number = self.frame.as_ref().map_or(0.0, |frame| frame.photon_number);
        payload_message(
            ControlCode::PeNphotonResponse,
            &PhotonNumberResponse { photon_number },
        )
    }

    fn handle_pe_finished(&mut self, message: &Message) -> Message {
        let summary: EstimationSummary = match message.decode() {
            Ok(summary) => summary,
            Err(err) => return invalid_content(err.to_string()),
        };
        if summary.key_rate <= 0.0 {
            info!(key_rate = summary.key_rate, "estimation denied");
            return payload_message(
                ControlCode::PeDenied,
                &DenyNotice {
                    deny_message: format!("key rate {} is not positive", summary.key_rate),
                },
            );
        }
        info!(
            photon_number = summary.photon_number,
            transmittance = summary.transmittance,
            excess_noise = summary.excess_noise,
            electronic_noise = summary.electronic_noise,
            efficiency = summary.efficiency,
            key_rate = summary.key_rate,
            "estimation approved"
        );
        self.advance(FrameStage::ParamsApproved);
        Message::bare(ControlCode::PeApproved)
    }

    fn handle_frame_ended(&mut self) -> Message {
        let Some(frame) = self.frame.take() else {
            return Message::bare(ControlCode::UnexpectedCommand);
        };
        info!(frame = %frame.id, "frame closed");
        // The next frame starts a new epoch; the peer identifies again.
        self.session.authenticated = false;
        payload_message(
            ControlCode::FrameEndedAck,
            &FrameEndedAck { frame_id: frame.id },
        )
    }

    fn handle_change_parameter(&mut self, message: &Message) -> Message {
        let request: ChangeParameter = match message.decode() {
            Ok(request) => request,
            Err(err) => return invalid_content(err.to_string()),
        };
        match self
            .parameters
            .change(&mut self.config, &request.parameter, &request.value)
        {
            Ok(changed) => {
                info!(
                    parameter = %request.parameter,
                    old = %changed.old,
                    new = %changed.new,
                    "parameter changed"
                );
                payload_message(
                    ControlCode::ParameterChanged,
                    &ParameterChanged {
                        parameter: request.parameter,
                        old_value: changed.old,
                        new_value: changed.new,
                    },
                )
            }
            Err(ConfigError::UnknownParameter(_)) => {
                warn!(parameter = %request.parameter, "unknown parameter");
                payload_message(
                    ControlCode::ParameterUnknown,
                    &ParameterUnknown {
                        parameter: request.parameter,
                    },
                )
            }
            Err(err) => invalid_content(err.to_string()),
        }
    }

    async fn handle_recovery_start(&mut self) -> Message {
        let transmitter = &self.config.transmitter;
        match start_recovery(
            self.bench.converter.as_mut(),
            &transmitter.dac,
            &transmitter.polarization_recovery,
        )
        .await
        {
            Ok(()) => Message::bare(ControlCode::PolarizationRecoveryAck),
            Err(err) => self.abort_on_fault("starting polarization recovery", &err),
        }
    }

    async fn handle_recovery_end(&mut self) -> Message {
        match end_recovery(self.bench.converter.as_mut(), &self.config.transmitter.dac).await {
            Ok(()) => Message::bare(ControlCode::PolarizationRecoveryEnded),
            Err(err) => self.abort_on_fault("ending polarization recovery", &err),
        }
    }

    async fn handle_admin(&mut self, request: AdminRequest) -> AdminFlow {
        match request {
            AdminRequest::PrintConfig => match toml::to_string_pretty(&self.config) {
                Ok(text) => info!("active configuration:\n{text}"),
                Err(err) => warn!(error = %err, "configuration not printable"),
            },
            AdminRequest::ReloadConfig => match &self.config_path {
                None => warn!("no configuration path to reload from"),
                Some(path) => match Config::load(path) {
                    Ok(config) => {
                        self.config = config;
                        info!(path = %path.display(), "configuration reloaded");
                    }
                    Err(err) => {
                        warn!(error = %err, "reload failed, keeping the active configuration");
                    }
                },
            },
            AdminRequest::ResetState => {
                self.reset_full();
                info!("session and frame state reset");
            }
            AdminRequest::Stop => {
                info!("operator stop");
                return AdminFlow::Stop;
            }
        }
        AdminFlow::Continue
    }

    fn stage(&self) -> Option<FrameStage> {
        self.frame.as_ref().map(|frame| frame.stage)
    }

    fn advance(&mut self, stage: FrameStage) {
        if let Some(frame) = &mut self.frame {
            debug!(frame = %frame.id, from = frame.stage.name(), to = stage.name(), "stage advance");
            frame.stage = stage;
        }
    }

    /// Drop the frame and require re-identification. The transport
    /// attachment is tracked separately by the caller.
    fn reset_full(&mut self) {
        self.session.authenticated = false;
        self.frame = None;
    }

    fn abort_on_fault(&mut self, context: &str, err: &dyn std::fmt::Display) -> Message {
        error!(error = %err, "device fault while {context}, aborting the exchange");
        self.reset_full();
        payload_message(
            ControlCode::Abort,
            &AbortNotice {
                abort_message: Some(format!("{context}: {err}")),
            },
        )
    }
}

/// Payload structs serialize to JSON objects by construction; a bare
/// code is the (unreachable) fallback.
fn payload_message<T: serde::Serialize>(code: ControlCode, payload: &T) -> Message {
    Message::with_payload(code, payload).unwrap_or_else(|_| Message::bare(code))
}

fn invalid_content(detail: impl Into<String>) -> Message {
    payload_message(
        ControlCode::InvalidContent,
        &ErrorNotice {
            error_message: detail.into(),
        },
    )
}

fn abort_notice(detail: &str) -> Message {
    payload_message(
        ControlCode::Abort,
        &AbortNotice {
            abort_message: Some(detail.into()),
        },
    )
}

fn symbols_error(detail: String) -> Message {
    payload_message(
        ControlCode::PeSymbolsError,
        &ErrorNotice {
            error_message: detail,
        },
    )
}
