//! Control-code catalogue.
//!
//! Codes are grouped in blocks of 100 by protocol phase. The numeric
//! values are part of the wire contract and never change meaning; new
//! codes may only be appended within a block.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::ChannelError;

/// A control code, the command/response vocabulary of the channel.
///
/// Serialized as its `u16` value on the wire. Values outside the
/// catalogue fail to deserialize with [`ChannelError::UnknownCode`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
#[repr(u16)]
pub enum ControlCode {
    // 100s: session-global commands and error signals.
    /// Abandon the current exchange and reset.
    Abort = 100,
    /// Acknowledge an abort.
    AbortAck = 101,
    /// The peer is leaving on purpose.
    Disconnection = 102,
    /// Acknowledge a disconnection notice.
    DisconnectionAck = 103,
    /// The peer received a response it could not act on.
    InvalidResponse = 104,
    /// Acknowledge an invalid-response notice.
    InvalidResponseAck = 105,
    /// The received code is outside the catalogue.
    UnknownCommand = 106,
    /// The command is known but illegal in the current state.
    UnexpectedCommand = 107,
    /// The command is legal but its payload is missing or malformed.
    InvalidContent = 108,
    /// Channel-level authentication was rejected.
    AuthenticationInvalid = 109,

    // 200s: runtime parameter tuning.
    /// Change one configuration parameter by dotted path.
    ChangeParameterRequest = 200,
    /// The parameter was changed; carries old and new values.
    ParameterChanged = 201,
    /// The dotted path does not name a tunable parameter.
    ParameterUnknown = 202,

    // 300s: identification.
    /// Open a session: serial number + protocol version.
    IdentificationRequest = 300,
    /// Identification accepted; carries the responder's serial number.
    IdentificationResponse = 301,
    /// Protocol versions do not match; carries the responder's version.
    InvalidVersion = 302,

    // 400s: frame initialization.
    /// Begin a new frame with a fresh identifier.
    InitializationRequest = 400,
    /// Begin a new frame and negotiate configuration (unimplemented).
    InitializationRequestConfig = 401,
    /// Frame initialization accepted.
    InitializationAccepted = 402,

    // 500s: quantum information exchange.
    /// Synthesize and arm the frame waveform.
    QieRequest = 500,
    /// Waveform armed, ready to emit.
    QieReady = 501,
    /// Start emission.
    QieTrigger = 502,
    /// Emission started.
    QieEmissionStarted = 503,
    /// The receiver finished acquiring; stop emission.
    QieAcquisitionEnded = 504,
    /// Emission stopped.
    QieEnded = 505,

    // 600s: parameter estimation.
    /// Request the symbols at the given indices.
    PeSymbolsRequest = 600,
    /// The requested symbols.
    PeSymbolsResponse = 601,
    /// A requested index is out of range.
    PeSymbolsError = 602,
    /// Request the calibrated mean photon number.
    PeNphotonRequest = 603,
    /// The mean photon number.
    PeNphotonResponse = 604,
    /// Estimation summary: noise figures and achievable key rate.
    PeFinished = 605,
    /// Estimation accepted, frame may proceed.
    PeApproved = 606,
    /// Estimation rejected (no positive key rate).
    PeDenied = 607,

    // 700s: error correction (not served by this engine).
    /// Initialize error correction.
    EcInitialization = 700,
    /// One error-correction block.
    EcBlock = 701,
    /// Remaining error-correction data.
    EcRemaining = 702,
    /// Error-correction verification.
    EcVerification = 703,

    // 800s: privacy amplification (not served by this engine).
    /// Run privacy amplification.
    PaRequest = 800,

    // 900s: frame closure.
    /// Close the current frame.
    FrameEnded = 900,
    /// Frame closed; echoes the frame identifier.
    FrameEndedAck = 901,

    // 1000s: polarization recovery.
    /// Start emitting the polarization-recovery tone.
    PolarizationRecoveryRequest = 1000,
    /// Recovery tone is being emitted.
    PolarizationRecoveryAck = 1001,
    /// Stop the polarization-recovery tone.
    PolarizationRecoveryEnd = 1002,
    /// Recovery tone stopped.
    PolarizationRecoveryEnded = 1003,
}

impl ControlCode {
    /// Every code in the catalogue, in wire order.
    pub const ALL: [ControlCode; 44] = [
        ControlCode::Abort,
        ControlCode::AbortAck,
        ControlCode::Disconnection,
        ControlCode::DisconnectionAck,
        ControlCode::InvalidResponse,
        ControlCode::InvalidResponseAck,
        ControlCode::UnknownCommand,
        ControlCode::UnexpectedCommand,
        ControlCode::InvalidContent,
        ControlCode::AuthenticationInvalid,
        ControlCode::ChangeParameterRequest,
        ControlCode::ParameterChanged,
        ControlCode::ParameterUnknown,
        ControlCode::IdentificationRequest,
        ControlCode::IdentificationResponse,
        ControlCode::InvalidVersion,
        ControlCode::InitializationRequest,
        ControlCode::InitializationRequestConfig,
        ControlCode::InitializationAccepted,
        ControlCode::QieRequest,
        ControlCode::QieReady,
        ControlCode::QieTrigger,
        ControlCode::QieEmissionStarted,
        ControlCode::QieAcquisitionEnded,
        ControlCode::QieEnded,
        ControlCode::PeSymbolsRequest,
        ControlCode::PeSymbolsResponse,
        ControlCode::PeSymbolsError,
        ControlCode::PeNphotonRequest,
        ControlCode::PeNphotonResponse,
        ControlCode::PeFinished,
        ControlCode::PeApproved,
        ControlCode::PeDenied,
        ControlCode::EcInitialization,
        ControlCode::EcBlock,
        ControlCode::EcRemaining,
        ControlCode::EcVerification,
        ControlCode::PaRequest,
        ControlCode::FrameEnded,
        ControlCode::FrameEndedAck,
        ControlCode::PolarizationRecoveryRequest,
        ControlCode::PolarizationRecoveryAck,
        ControlCode::PolarizationRecoveryEnd,
        ControlCode::PolarizationRecoveryEnded,
    ];

    /// Human-readable name, stable across versions (used in logs).
    pub fn name(&self) -> &'static str {
        match self {
            ControlCode::Abort => "abort",
            ControlCode::AbortAck => "abort-ack",
            ControlCode::Disconnection => "disconnection",
            ControlCode::DisconnectionAck => "disconnection-ack",
            ControlCode::InvalidResponse => "invalid-response",
            ControlCode::InvalidResponseAck => "invalid-response-ack",
            ControlCode::UnknownCommand => "unknown-command",
            ControlCode::UnexpectedCommand => "unexpected-command",
            ControlCode::InvalidContent => "invalid-content",
            ControlCode::AuthenticationInvalid => "authentication-invalid",
            ControlCode::ChangeParameterRequest => "change-parameter-request",
            ControlCode::ParameterChanged => "parameter-changed",
            ControlCode::ParameterUnknown => "parameter-unknown",
            ControlCode::IdentificationRequest => "identification-request",
            ControlCode::IdentificationResponse => "identification-response",
            ControlCode::InvalidVersion => "invalid-version",
            ControlCode::InitializationRequest => "initialization-request",
            ControlCode::InitializationRequestConfig => "initialization-request-config",
            ControlCode::InitializationAccepted => "initialization-accepted",
            ControlCode::QieRequest => "qie-request",
            ControlCode::QieReady => "qie-ready",
            ControlCode::QieTrigger => "qie-trigger",
            ControlCode::QieEmissionStarted => "qie-emission-started",
            ControlCode::QieAcquisitionEnded => "qie-acquisition-ended",
            ControlCode::QieEnded => "qie-ended",
            ControlCode::PeSymbolsRequest => "pe-symbols-request",
            ControlCode::PeSymbolsResponse => "pe-symbols-response",
            ControlCode::PeSymbolsError => "pe-symbols-error",
            ControlCode::PeNphotonRequest => "pe-nphoton-request",
            ControlCode::PeNphotonResponse => "pe-nphoton-response",
            ControlCode::PeFinished => "pe-finished",
            ControlCode::PeApproved => "pe-approved",
            ControlCode::PeDenied => "pe-denied",
            ControlCode::EcInitialization => "ec-initialization",
            ControlCode::EcBlock => "ec-block",
            ControlCode::EcRemaining => "ec-remaining",
            ControlCode::EcVerification => "ec-verification",
            ControlCode::PaRequest => "pa-request",
            ControlCode::FrameEnded => "frame-ended",
            ControlCode::FrameEndedAck => "frame-ended-ack",
            ControlCode::PolarizationRecoveryRequest => "polarization-recovery-request",
            ControlCode::PolarizationRecoveryAck => "polarization-recovery-ack",
            ControlCode::PolarizationRecoveryEnd => "polarization-recovery-end",
            ControlCode::PolarizationRecoveryEnded => "polarization-recovery-ended",
        }
    }

    /// True for commands the engine accepts in any connected state,
    /// before frame-stage legality applies.
    pub fn is_session_global(&self) -> bool {
        matches!(
            self,
            ControlCode::Abort
                | ControlCode::Disconnection
                | ControlCode::InvalidResponse
                | ControlCode::ChangeParameterRequest
                | ControlCode::PolarizationRecoveryRequest
                | ControlCode::PolarizationRecoveryEnd
        )
    }
}

impl From<ControlCode> for u16 {
    fn from(code: ControlCode) -> u16 {
        code as u16
    }
}

impl TryFrom<u16> for ControlCode {
    type Error = ChannelError;

    fn try_from(value: u16) -> Result<Self, Self::Error> {
        let code = match value {
            100 => ControlCode::Abort,
            101 => ControlCode::AbortAck,
            102 => ControlCode::Disconnection,
            103 => ControlCode::DisconnectionAck,
            104 => ControlCode::InvalidResponse,
            105 => ControlCode::InvalidResponseAck,
            106 => ControlCode::UnknownCommand,
            107 => ControlCode::UnexpectedCommand,
            108 => ControlCode::InvalidContent,
            109 => ControlCode::AuthenticationInvalid,
            200 => ControlCode::ChangeParameterRequest,
            201 => ControlCode::ParameterChanged,
            202 => ControlCode::ParameterUnknown,
            300 => ControlCode::IdentificationRequest,
            301 => ControlCode::IdentificationResponse,
            302 => ControlCode::InvalidVersion,
            400 => ControlCode::InitializationRequest,
            401 => ControlCode::InitializationRequestConfig,
            402 => ControlCode::InitializationAccepted,
            500 => ControlCode::QieRequest,
            501 => ControlCode::QieReady,
            502 => ControlCode::QieTrigger,
            503 => ControlCode::QieEmissionStarted,
            504 => ControlCode::QieAcquisitionEnded,
            505 => ControlCode::QieEnded,
            600 => ControlCode::PeSymbolsRequest,
            601 => ControlCode::PeSymbolsResponse,
            602 => ControlCode::PeSymbolsError,
            603 => ControlCode::PeNphotonRequest,
            604 => ControlCode::PeNphotonResponse,
            605 => ControlCode::PeFinished,
            606 => ControlCode::PeApproved,
            607 => ControlCode::PeDenied,
            700 => ControlCode::EcInitialization,
            701 => ControlCode::EcBlock,
            702 => ControlCode::EcRemaining,
            703 => ControlCode::EcVerification,
            800 => ControlCode::PaRequest,
            900 => ControlCode::FrameEnded,
            901 => ControlCode::FrameEndedAck,
            1000 => ControlCode::PolarizationRecoveryRequest,
            1001 => ControlCode::PolarizationRecoveryAck,
            1002 => ControlCode::PolarizationRecoveryEnd,
            1003 => ControlCode::PolarizationRecoveryEnded,
            other => return Err(ChannelError::UnknownCode(other)),
        };
        Ok(code)
    }
}

impl fmt::Display for ControlCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name(), *self as u16)
    }
}
