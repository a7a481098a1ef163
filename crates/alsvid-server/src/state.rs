//! Session and frame state, and the command legality table.
//!
//! The exchange walks one frame through an ordered ladder of stages.
//! Progress is monotone: a command may require "at least stage X" but
//! never moves a frame backwards, and anything that invalidates the
//! frame drops it entirely instead of rewinding it. Keeping the ladder
//! as a single ordered enum makes illegal flag combinations
//! unrepresentable.

use num_complex::Complex64;
use uuid::Uuid;

use alsvid_proto::ControlCode;

/// What the engine knows about the attached peer.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Session {
    /// A peer is attached to the channel.
    pub connected: bool,
    /// The peer passed identification for the current frame epoch.
    pub authenticated: bool,
}

/// Progress ladder of one frame.
///
/// The derived ordering is the protocol ordering; legality checks
/// compare with `>=`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FrameStage {
    /// Frame exists, nothing synthesized yet.
    Initialized,
    /// Waveform synthesized and loaded into the converter.
    Prepared,
    /// Emission ran (or is running).
    Sent,
    /// Acquisition finished, emission stopped.
    Ended,
    /// Parameter estimation approved by both sides.
    ParamsApproved,
    /// Error correction initialized.
    EcInitialized,
    /// Error correction finished.
    EcEnded,
    /// Privacy amplification approved.
    PaApproved,
}

impl FrameStage {
    /// Every stage, in ladder order.
    pub const ALL: [FrameStage; 8] = [
        FrameStage::Initialized,
        FrameStage::Prepared,
        FrameStage::Sent,
        FrameStage::Ended,
        FrameStage::ParamsApproved,
        FrameStage::EcInitialized,
        FrameStage::EcEnded,
        FrameStage::PaApproved,
    ];

    /// Stable lowercase name (used in logs).
    pub fn name(&self) -> &'static str {
        match self {
            FrameStage::Initialized => "initialized",
            FrameStage::Prepared => "prepared",
            FrameStage::Sent => "sent",
            FrameStage::Ended => "ended",
            FrameStage::ParamsApproved => "params-approved",
            FrameStage::EcInitialized => "ec-initialized",
            FrameStage::EcEnded => "ec-ended",
            FrameStage::PaApproved => "pa-approved",
        }
    }
}

/// One key-exchange frame, from initialization to closure.
///
/// The sequences are populated exactly once, when the synthesis
/// pipeline runs for this frame, and die with the frame.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Peer-chosen identifier, echoed at closure.
    pub id: Uuid,
    /// Current position on the ladder.
    pub stage: FrameStage,
    /// Shaped, shifted quantum data (calibration input).
    pub quantum_sequence: Option<Vec<Complex64>>,
    /// Raw symbols (parameter-estimation input).
    pub symbols: Option<Vec<Complex64>>,
    /// Calibrated mean photon number; 0.0 until calibration ran.
    pub photon_number: f64,
}

impl Frame {
    /// A fresh frame at the bottom of the ladder.
    pub fn new(id: Uuid) -> Self {
        Self {
            id,
            stage: FrameStage::Initialized,
            quantum_sequence: None,
            symbols: None,
            photon_number: 0.0,
        }
    }
}

/// The legality table: is `code` acceptable as a command right now?
///
/// Session-global commands need only an attached peer. Frame-gated
/// commands additionally need authentication and a minimum stage.
/// Response codes arriving as commands are never legal.
pub fn is_command_legal(code: ControlCode, session: &Session, stage: Option<FrameStage>) -> bool {
    let connected = session.connected;
    let authed = connected && session.authenticated;
    let at_least = |required: FrameStage| stage.is_some_and(|current| current >= required);

    match code {
        // Session-global.
        ControlCode::Abort
        | ControlCode::Disconnection
        | ControlCode::InvalidResponse
        | ControlCode::ChangeParameterRequest
        | ControlCode::PolarizationRecoveryRequest
        | ControlCode::PolarizationRecoveryEnd => connected,

        ControlCode::IdentificationRequest => connected,

        ControlCode::InitializationRequest | ControlCode::InitializationRequestConfig => authed,

        ControlCode::QieRequest => authed && stage.is_some(),
        ControlCode::QieTrigger => authed && at_least(FrameStage::Prepared),
        ControlCode::QieAcquisitionEnded => authed && at_least(FrameStage::Sent),

        ControlCode::PeSymbolsRequest | ControlCode::PeNphotonRequest | ControlCode::PeFinished => {
            authed && at_least(FrameStage::Ended)
        }

        ControlCode::EcInitialization => authed && at_least(FrameStage::ParamsApproved),
        ControlCode::EcBlock | ControlCode::EcRemaining | ControlCode::EcVerification => {
            authed && at_least(FrameStage::EcInitialized)
        }
        ControlCode::PaRequest => authed && at_least(FrameStage::EcEnded),

        ControlCode::FrameEnded => connected && at_least(FrameStage::PaApproved),

        // Everything else is a response code, never a command.
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stage_order_is_the_ladder() {
        for pair in FrameStage::ALL.windows(2) {
            assert!(pair[0] < pair[1], "{} !< {}", pair[0].name(), pair[1].name());
        }
    }

    #[test]
    fn test_fresh_frame() {
        let id = Uuid::new_v4();
        let frame = Frame::new(id);
        assert_eq!(frame.id, id);
        assert_eq!(frame.stage, FrameStage::Initialized);
        assert!(frame.quantum_sequence.is_none());
        assert!(frame.symbols.is_none());
        assert_eq!(frame.photon_number, 0.0);
    }

    #[test]
    fn test_nothing_is_legal_without_a_peer() {
        let session = Session::default();
        for code in ControlCode::ALL {
            assert!(!is_command_legal(code, &session, None), "{code}");
        }
    }

    #[test]
    fn test_identification_needs_no_authentication() {
        let session = Session {
            connected: true,
            authenticated: false,
        };
        assert!(is_command_legal(
            ControlCode::IdentificationRequest,
            &session,
            None
        ));
        assert!(!is_command_legal(
            ControlCode::InitializationRequest,
            &session,
            None
        ));
    }

    #[test]
    fn test_trigger_needs_a_prepared_frame() {
        let session = Session {
            connected: true,
            authenticated: true,
        };
        assert!(!is_command_legal(ControlCode::QieTrigger, &session, None));
        assert!(!is_command_legal(
            ControlCode::QieTrigger,
            &session,
            Some(FrameStage::Initialized)
        ));
        assert!(is_command_legal(
            ControlCode::QieTrigger,
            &session,
            Some(FrameStage::Prepared)
        ));
        assert!(is_command_legal(
            ControlCode::QieTrigger,
            &session,
            Some(FrameStage::Ended)
        ));
    }

    #[test]
    fn test_frame_closure_ignores_authentication() {
        let session = Session {
            connected: true,
            authenticated: false,
        };
        assert!(is_command_legal(
            ControlCode::FrameEnded,
            &session,
            Some(FrameStage::PaApproved)
        ));
        assert!(!is_command_legal(
            ControlCode::FrameEnded,
            &session,
            Some(FrameStage::EcEnded)
        ));
    }

    #[test]
    fn test_response_codes_are_never_commands() {
        let session = Session {
            connected: true,
            authenticated: true,
        };
        for code in [
            ControlCode::QieReady,
            ControlCode::IdentificationResponse,
            ControlCode::PeApproved,
            ControlCode::FrameEndedAck,
            ControlCode::AbortAck,
        ] {
            assert!(
                !is_command_legal(code, &session, Some(FrameStage::PaApproved)),
                "{code}"
            );
        }
    }
}
