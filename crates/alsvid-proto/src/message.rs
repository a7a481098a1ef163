//! Message envelope and typed payloads.
//!
//! A [`Message`] is a control code plus an optional JSON object. The
//! structs below give the payloads a typed surface; they (de)serialize
//! to the wire field names, so adding a struct never changes the wire.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::code::ControlCode;
use crate::error::PayloadError;

/// Free-form payload carried by a message.
pub type Payload = serde_json::Map<String, serde_json::Value>;

/// One protocol unit: a control code and an optional payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The control code.
    pub code: ControlCode,
    /// Payload object, absent for bare commands.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Payload>,
}

impl Message {
    /// A message with no payload.
    pub fn bare(code: ControlCode) -> Self {
        Self { code, data: None }
    }

    /// A message carrying `payload` serialized to a JSON object.
    pub fn with_payload<T: Serialize>(code: ControlCode, payload: &T) -> Result<Self, PayloadError> {
        match serde_json::to_value(payload)? {
            serde_json::Value::Object(map) => Ok(Self {
                code,
                data: Some(map),
            }),
            _ => Err(PayloadError::NotAnObject),
        }
    }

    /// Decode the payload into `T`.
    ///
    /// A missing payload decodes like an empty object, so the error for
    /// "no payload" and "payload lacks field x" is uniformly a missing
    /// field.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, PayloadError> {
        let value = match &self.data {
            Some(map) => serde_json::Value::Object(map.clone()),
            None => serde_json::Value::Object(Payload::new()),
        };
        Ok(serde_json::from_value(value)?)
    }
}

/// Opens a session; both fields are required.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationRequest {
    /// Peer hardware serial number.
    pub serial_number: String,
    /// Protocol version the peer speaks.
    pub protocol_version: String,
}

/// Identification accepted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IdentificationResponse {
    /// Responder hardware serial number.
    pub serial_number: String,
}

/// Version mismatch; tells the peer which version is spoken here.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InvalidVersion {
    /// The responder's protocol version.
    pub protocol_version: String,
}

/// Opens a frame under a peer-chosen identifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct InitializationRequest {
    /// Frame identifier, unique per frame.
    pub frame_id: Uuid,
}

/// Frame-closure acknowledgement, echoing the identifier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FrameEndedAck {
    /// The identifier of the frame that was closed.
    pub frame_id: Uuid,
}

/// Asks for the symbols at the given positions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolsRequest {
    /// Zero-based symbol indices.
    pub indices: Vec<u64>,
}

/// The symbols at the requested positions, split by quadrature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolsResponse {
    /// In-phase parts, one per requested index.
    pub symbols_real: Vec<f64>,
    /// Quadrature parts, one per requested index.
    pub symbols_imag: Vec<f64>,
}

/// Calibrated mean photon number at the output.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PhotonNumberResponse {
    /// Mean photon number per symbol.
    pub photon_number: f64,
}

/// Parameter-estimation summary the peer submits for approval.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EstimationSummary {
    /// Mean photon number used in the estimation.
    pub photon_number: f64,
    /// Estimated channel transmittance.
    pub transmittance: f64,
    /// Estimated excess noise.
    pub excess_noise: f64,
    /// Receiver electronic noise.
    pub electronic_noise: f64,
    /// Receiver detection efficiency.
    pub efficiency: f64,
    /// Achievable secret key rate.
    pub key_rate: f64,
}

/// Runtime change of one configuration parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeParameter {
    /// Dotted path of the parameter.
    pub parameter: String,
    /// New value.
    pub value: serde_json::Value,
}

/// Confirms a parameter change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterChanged {
    /// Dotted path of the parameter.
    pub parameter: String,
    /// Value before the change.
    pub old_value: serde_json::Value,
    /// Value after the change.
    pub new_value: serde_json::Value,
}

/// The dotted path did not resolve to a tunable parameter.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParameterUnknown {
    /// The path as received.
    pub parameter: String,
}

/// Abort notice with an optional reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AbortNotice {
    /// Why the exchange is being abandoned.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub abort_message: Option<String>,
}

/// Error detail attached to a rejection response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorNotice {
    /// What was wrong with the request.
    pub error_message: String,
}

/// Denial detail attached to a deny response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DenyNotice {
    /// Why the request was denied.
    pub deny_message: String,
}
