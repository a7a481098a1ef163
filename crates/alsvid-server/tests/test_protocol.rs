//! Scenario tests: the engine against the in-memory channel and the
//! simulated bench.

use uuid::Uuid;

use alsvid_adapter_sim::{
    ConverterEvent, SimAttenuator, SimBiasController, SimConverter, SimConverterProbe, SimLaser,
    SimPowerMeter,
};
use alsvid_config::Config;
use alsvid_hal::{Bench, RepeatMode};
use alsvid_proto::{
    AbortNotice, ChangeParameter, ChannelError, ControlCode, ErrorNotice, EstimationSummary,
    IdentificationRequest, IdentificationResponse, InitializationRequest, InvalidVersion,
    MemoryControlPeer, Message, PROTOCOL_VERSION, ParameterChanged, ParameterUnknown,
    PhotonNumberResponse, SymbolsRequest, SymbolsResponse, memory_pair,
};
use alsvid_server::{Engine, Flow, FrameStage};

const CONFIG: &str = r#"
serial_number = "alsvid-test-01"

[authentication]
scheme = "none"

[transmitter]
emission_wavelength = 1550e-9
photodiode_conversion = 0.8

[transmitter.dac]
kind = "sim"
location = "dac0"
channels = [1, 2]
rate = 500e6
amplitude = 0.5

[transmitter.powermeter]
kind = "sim"
location = "pm0"
timeout_secs = 2.0

[transmitter.voa]
kind = "sim"
location = "voa0"
value = 3.0

[transmitter.laser]
kind = "sim"
location = "laser0"

[transmitter.bias_controller]
kind = "sim"
location = "bias0"

[transmitter.polarization_recovery]
frequency = 2e6
amplitude = 0.3

[frame]
num_zeros_start = 5
num_zeros_end = 7

[frame.quantum]
modulation = "gaussian"
variance = 0.05
num_symbols = 64
symbol_rate = 125e6
roll_off = 0.5
frequency_shift = 100e6

[frame.pilots]
frequencies = [180e6]
amplitudes = [0.2]

[frame.zadoff_chu]
root = 3
length = 16

[signal]
seed = 7
"#;

// num_symbols * sps + zc_length + zeros = 64*4 + 16 + 5 + 7
const FINAL_SAMPLES: usize = 284;

fn base_config() -> Config {
    CONFIG.parse().expect("test configuration parses")
}

async fn engine_with_peer(
    mutate: impl FnOnce(&mut Config),
) -> (Engine, MemoryControlPeer, SimConverterProbe) {
    let mut config = base_config();
    mutate(&mut config);

    let (channel, peer) = memory_pair();
    let dac = SimConverter::new();
    let probe = dac.probe();
    let meter = SimPowerMeter::new()
        .with_dark_power(2e-9)
        .with_emission_power(4e-6)
        .linked_to(dac.probe());
    let bench = Bench {
        converter: Box::new(dac),
        power_meter: Box::new(meter),
        attenuator: Box::new(SimAttenuator::new()),
        laser: Box::new(SimLaser::new()),
        bias: Box::new(SimBiasController::new()),
    };

    let mut engine = Engine::start(config, Box::new(channel), bench)
        .await
        .expect("bench bring-up succeeds");
    engine.accept().await.expect("peer attaches");
    (engine, peer, probe)
}

async fn exchange(engine: &mut Engine, peer: &mut MemoryControlPeer, message: Message) -> Message {
    peer.send(message).await.expect("peer send");
    engine.step().await;
    peer.recv().await.expect("engine response")
}

fn identify() -> Message {
    Message::with_payload(
        ControlCode::IdentificationRequest,
        &IdentificationRequest {
            serial_number: "bob-007".into(),
            protocol_version: PROTOCOL_VERSION.into(),
        },
    )
    .unwrap()
}

fn initialize(frame_id: Uuid) -> Message {
    Message::with_payload(
        ControlCode::InitializationRequest,
        &InitializationRequest { frame_id },
    )
    .unwrap()
}

fn estimation(key_rate: f64) -> Message {
    Message::with_payload(
        ControlCode::PeFinished,
        &EstimationSummary {
            photon_number: 1.2,
            transmittance: 0.4,
            excess_noise: 0.01,
            electronic_noise: 0.05,
            efficiency: 0.85,
            key_rate,
        },
    )
    .unwrap()
}

#[tokio::test]
async fn test_identification_success() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;

    let response = exchange(&mut engine, &mut peer, identify()).await;
    assert_eq!(response.code, ControlCode::IdentificationResponse);
    let body: IdentificationResponse = response.decode().unwrap();
    assert_eq!(body.serial_number, "alsvid-test-01");
    assert!(engine.session().connected);
    assert!(engine.session().authenticated);
}

#[tokio::test]
async fn test_identification_version_mismatch() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;

    let request = Message::with_payload(
        ControlCode::IdentificationRequest,
        &IdentificationRequest {
            serial_number: "bob-007".into(),
            protocol_version: "9.9".into(),
        },
    )
    .unwrap();
    let response = exchange(&mut engine, &mut peer, request).await;
    assert_eq!(response.code, ControlCode::InvalidVersion);
    let body: InvalidVersion = response.decode().unwrap();
    assert_eq!(body.protocol_version, PROTOCOL_VERSION);
    assert!(!engine.session().authenticated);
}

#[tokio::test]
async fn test_identification_missing_fields() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;

    let response = exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::IdentificationRequest),
    )
    .await;
    assert_eq!(response.code, ControlCode::InvalidContent);
    assert!(!engine.session().authenticated);
}

#[tokio::test]
async fn test_initialization_requires_authentication() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;

    let response = exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;
    assert_eq!(response.code, ControlCode::UnexpectedCommand);
    assert!(engine.frame().is_none());
}

#[tokio::test(start_paused = true)]
async fn test_full_frame_lifecycle() {
    let (mut engine, mut peer, probe) = engine_with_peer(|_| {}).await;
    let frame_id = Uuid::new_v4();

    exchange(&mut engine, &mut peer, identify()).await;
    let response = exchange(&mut engine, &mut peer, initialize(frame_id)).await;
    assert_eq!(response.code, ControlCode::InitializationAccepted);
    assert_eq!(engine.frame().unwrap().stage, FrameStage::Initialized);

    // Commands ahead of the ladder are refused without state change.
    let early = exchange(&mut engine, &mut peer, Message::bare(ControlCode::QieTrigger)).await;
    assert_eq!(early.code, ControlCode::UnexpectedCommand);
    assert_eq!(engine.frame().unwrap().stage, FrameStage::Initialized);

    let response = exchange(&mut engine, &mut peer, Message::bare(ControlCode::QieRequest)).await;
    assert_eq!(response.code, ControlCode::QieReady);
    assert_eq!(engine.frame().unwrap().stage, FrameStage::Prepared);
    assert_eq!(probe.loaded().0.len(), FINAL_SAMPLES);

    let response = exchange(&mut engine, &mut peer, Message::bare(ControlCode::QieTrigger)).await;
    assert_eq!(response.code, ControlCode::QieEmissionStarted);
    assert_eq!(engine.frame().unwrap().stage, FrameStage::Sent);
    assert!(probe.is_playing());

    let response = exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::QieAcquisitionEnded),
    )
    .await;
    assert_eq!(response.code, ControlCode::QieEnded);
    let frame = engine.frame().unwrap();
    assert_eq!(frame.stage, FrameStage::Ended);
    // Calibration ran after the response: estimate stored, single-shot
    // playback used and repeating mode restored.
    assert!(frame.photon_number > 0.0);
    let events = probe.events();
    assert!(events.contains(&ConverterEvent::Configured(RepeatMode::Single)));
    assert_eq!(probe.mode(), Some(RepeatMode::Continuous));
    assert!(!probe.is_playing());

    let request = Message::with_payload(
        ControlCode::PeSymbolsRequest,
        &SymbolsRequest { indices: vec![0, 5, 63] },
    )
    .unwrap();
    let response = exchange(&mut engine, &mut peer, request).await;
    assert_eq!(response.code, ControlCode::PeSymbolsResponse);
    let body: SymbolsResponse = response.decode().unwrap();
    assert_eq!(body.symbols_real.len(), 3);
    assert_eq!(body.symbols_imag.len(), 3);

    let response = exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::PeNphotonRequest),
    )
    .await;
    let body: PhotonNumberResponse = response.decode().unwrap();
    assert_eq!(body.photon_number, engine.frame().unwrap().photon_number);

    // A non-positive key rate is denied and changes nothing.
    let response = exchange(&mut engine, &mut peer, estimation(0.0)).await;
    assert_eq!(response.code, ControlCode::PeDenied);
    assert_eq!(engine.frame().unwrap().stage, FrameStage::Ended);

    let response = exchange(&mut engine, &mut peer, estimation(0.12)).await;
    assert_eq!(response.code, ControlCode::PeApproved);
    assert_eq!(engine.frame().unwrap().stage, FrameStage::ParamsApproved);

    // Key distillation is not served here.
    let response = exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::EcInitialization),
    )
    .await;
    assert_eq!(response.code, ControlCode::UnexpectedCommand);

    // And without it the frame can never be declared closed.
    let response = exchange(&mut engine, &mut peer, Message::bare(ControlCode::FrameEnded)).await;
    assert_eq!(response.code, ControlCode::UnexpectedCommand);
    assert!(engine.frame().is_some());
}

#[tokio::test]
async fn test_synthesis_failure_aborts_without_state_change() {
    let (mut engine, mut peer, probe) = engine_with_peer(|config| {
        config.frame.quantum.variance = 1e6;
    })
    .await;

    exchange(&mut engine, &mut peer, identify()).await;
    exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;

    let response = exchange(&mut engine, &mut peer, Message::bare(ControlCode::QieRequest)).await;
    assert_eq!(response.code, ControlCode::Abort);
    let notice: AbortNotice = response.decode().unwrap();
    assert_eq!(notice.abort_message.as_deref(), Some("DSP was not successful"));
    // Frame untouched, converter untouched, session intact.
    assert_eq!(engine.frame().unwrap().stage, FrameStage::Initialized);
    assert!(probe.loaded().0.is_empty());
    assert!(engine.session().authenticated);
}

#[tokio::test]
async fn test_change_parameter() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;

    // Unknown path: lookup miss, nothing mutated.
    let request = Message::with_payload(
        ControlCode::ChangeParameterRequest,
        &ChangeParameter {
            parameter: "frame.quantum.bogus".into(),
            value: serde_json::json!(1.0),
        },
    )
    .unwrap();
    let response = exchange(&mut engine, &mut peer, request).await;
    assert_eq!(response.code, ControlCode::ParameterUnknown);
    let body: ParameterUnknown = response.decode().unwrap();
    assert_eq!(body.parameter, "frame.quantum.bogus");
    assert_eq!(engine.config().frame.quantum.variance, 0.05);

    // Known path: old and new values echoed.
    let request = Message::with_payload(
        ControlCode::ChangeParameterRequest,
        &ChangeParameter {
            parameter: "frame.quantum.variance".into(),
            value: serde_json::json!(0.07),
        },
    )
    .unwrap();
    let response = exchange(&mut engine, &mut peer, request).await;
    assert_eq!(response.code, ControlCode::ParameterChanged);
    let body: ParameterChanged = response.decode().unwrap();
    assert_eq!(body.old_value, serde_json::json!(0.05));
    assert_eq!(body.new_value, serde_json::json!(0.07));
    assert_eq!(engine.config().frame.quantum.variance, 0.07);

    // Type-incompatible value: rejected, nothing mutated.
    let request = Message::with_payload(
        ControlCode::ChangeParameterRequest,
        &ChangeParameter {
            parameter: "frame.quantum.variance".into(),
            value: serde_json::json!("loud"),
        },
    )
    .unwrap();
    let response = exchange(&mut engine, &mut peer, request).await;
    assert_eq!(response.code, ControlCode::InvalidContent);
    assert_eq!(engine.config().frame.quantum.variance, 0.07);
}

#[tokio::test]
async fn test_transport_fault_classification() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;
    exchange(&mut engine, &mut peer, identify()).await;

    peer.inject(ChannelError::UnknownCode(4242)).await.unwrap();
    engine.step().await;
    assert_eq!(peer.recv().await.unwrap().code, ControlCode::UnknownCommand);
    assert!(engine.session().authenticated);

    peer.inject(ChannelError::AuthenticationFailure("mac mismatch".into()))
        .await
        .unwrap();
    engine.step().await;
    assert_eq!(
        peer.recv().await.unwrap().code,
        ControlCode::AuthenticationInvalid
    );
    assert!(!engine.session().authenticated);

    peer.inject(ChannelError::Frame("truncated unit".into()))
        .await
        .unwrap();
    engine.step().await;
    let response = peer.recv().await.unwrap();
    assert_eq!(response.code, ControlCode::InvalidContent);
    let notice: ErrorNotice = response.decode().unwrap();
    assert!(notice.error_message.contains("truncated"));
}

#[tokio::test]
async fn test_peer_disconnect_resets_everything() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;
    exchange(&mut engine, &mut peer, identify()).await;
    exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;

    drop(peer);
    assert_eq!(engine.step().await, Flow::PeerLost);
    assert!(!engine.session().connected);
    assert!(!engine.session().authenticated);
    assert!(engine.frame().is_none());
}

#[tokio::test]
async fn test_abort_resets_session_and_frame() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;
    exchange(&mut engine, &mut peer, identify()).await;
    exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;

    let request = Message::with_payload(
        ControlCode::Abort,
        &AbortNotice {
            abort_message: Some("operator said so".into()),
        },
    )
    .unwrap();
    let response = exchange(&mut engine, &mut peer, request).await;
    assert_eq!(response.code, ControlCode::AbortAck);
    assert!(engine.frame().is_none());
    assert!(!engine.session().authenticated);

    // Until re-identification the peer can do nothing frame-related.
    let response = exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;
    assert_eq!(response.code, ControlCode::UnexpectedCommand);
}

#[tokio::test]
async fn test_disconnection_notice_acknowledged() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;
    exchange(&mut engine, &mut peer, identify()).await;
    exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;

    let response = exchange(&mut engine, &mut peer, Message::bare(ControlCode::Disconnection)).await;
    assert_eq!(response.code, ControlCode::DisconnectionAck);
    assert!(engine.frame().is_none());
    assert!(!engine.session().authenticated);

    let response = exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::InvalidResponse),
    )
    .await;
    assert_eq!(response.code, ControlCode::InvalidResponseAck);
}

#[tokio::test]
async fn test_polarization_recovery_tone() {
    let (mut engine, mut peer, probe) = engine_with_peer(|_| {}).await;

    // Legal once a peer is attached, identification not required.
    let response = exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::PolarizationRecoveryRequest),
    )
    .await;
    assert_eq!(response.code, ControlCode::PolarizationRecoveryAck);
    assert!(probe.is_playing());
    assert_eq!(probe.loaded().0.len(), 100_000);

    let response = exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::PolarizationRecoveryEnd),
    )
    .await;
    assert_eq!(response.code, ControlCode::PolarizationRecoveryEnded);
    assert!(!probe.is_playing());
    assert_eq!(probe.mode(), Some(RepeatMode::Continuous));
}

#[tokio::test]
async fn test_excess_noise_perturbs_only_the_converter_image() {
    let (mut engine, mut peer, probe) = engine_with_peer(|config| {
        config.transmitter.artificial_excess_noise = 0.05;
    })
    .await;

    exchange(&mut engine, &mut peer, identify()).await;
    exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;
    let response = exchange(&mut engine, &mut peer, Message::bare(ControlCode::QieRequest)).await;
    assert_eq!(response.code, ControlCode::QieReady);

    // Same seed, no noise: the clean pipeline output.
    let clean = alsvid_dsp::synthesize(&base_config().synthesis()).unwrap();
    let (i, _q) = probe.loaded();
    let clean_i: Vec<f64> = clean.final_sequence.iter().map(|s| s.re).collect();
    assert_eq!(i.len(), clean_i.len());
    assert_ne!(i, clean_i);
    // The stored quantum sequence stays noise-free.
    assert_eq!(
        engine.frame().unwrap().quantum_sequence.as_ref().unwrap(),
        &clean.quantum_sequence
    );
}

#[tokio::test(start_paused = true)]
async fn test_pe_symbols_index_out_of_range() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;
    exchange(&mut engine, &mut peer, identify()).await;
    exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;
    exchange(&mut engine, &mut peer, Message::bare(ControlCode::QieRequest)).await;
    exchange(&mut engine, &mut peer, Message::bare(ControlCode::QieTrigger)).await;
    exchange(
        &mut engine,
        &mut peer,
        Message::bare(ControlCode::QieAcquisitionEnded),
    )
    .await;

    let request = Message::with_payload(
        ControlCode::PeSymbolsRequest,
        &SymbolsRequest {
            indices: vec![0, 64],
        },
    )
    .unwrap();
    let response = exchange(&mut engine, &mut peer, request).await;
    assert_eq!(response.code, ControlCode::PeSymbolsError);
    let notice: ErrorNotice = response.decode().unwrap();
    assert!(notice.error_message.contains("64"));
    // Per-request error only; the frame is still healthy.
    assert_eq!(engine.frame().unwrap().stage, FrameStage::Ended);
}

#[tokio::test]
async fn test_reidentification_drops_the_frame() {
    let (mut engine, mut peer, _probe) = engine_with_peer(|_| {}).await;
    exchange(&mut engine, &mut peer, identify()).await;
    exchange(&mut engine, &mut peer, initialize(Uuid::new_v4())).await;
    assert!(engine.frame().is_some());

    exchange(&mut engine, &mut peer, identify()).await;
    assert!(engine.frame().is_none());
    assert!(engine.session().authenticated);
}
