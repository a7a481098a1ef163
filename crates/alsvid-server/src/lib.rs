//! The Alsvid transmitter engine.
//!
//! This crate is the "Alice" side of the link: a single-peer server
//! that walks one key-exchange frame at a time from identification
//! through parameter estimation, synthesizing and emitting the quantum
//! waveform in between and calibrating the emitted photon number
//! afterwards.
//!
//! The pieces:
//!
//! - [`state`] — session/frame state and the command legality table.
//! - [`engine`] — the [`Engine`]: dispatch, handlers, serve loop.
//! - [`calibration`] — post-acquisition photon-number measurement.
//! - [`recovery`] — polarization-recovery tone emission.
//! - [`bench`] — device construction, bring-up and teardown.
//! - [`admin`] — the operator interrupt menu, drained between messages.
//!
//! The engine is transport-agnostic ([`ControlChannel`] from
//! `alsvid-proto`) and hardware-agnostic (`alsvid-hal` contracts), so
//! everything here is exercisable against the in-memory channel and
//! the simulated bench.
//!
//! [`ControlChannel`]: alsvid_proto::ControlChannel

pub mod admin;
pub mod bench;
pub mod calibration;
pub mod engine;
pub mod error;
pub mod recovery;
pub mod state;

pub use admin::AdminRequest;
pub use bench::build_bench;
pub use engine::{Engine, Flow};
pub use error::{ServerError, ServerResult};
pub use state::{Frame, FrameStage, Session, is_command_legal};
