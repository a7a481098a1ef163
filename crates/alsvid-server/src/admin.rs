//! Operator admin channel.
//!
//! An interrupt must never re-enter the command loop or cancel an
//! in-flight hardware procedure, so the operator menu runs in its own
//! task: on Ctrl-C it prompts on the terminal, parses one line and
//! forwards the request over an mpsc channel. The engine drains the
//! channel only between protocol messages.

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

/// One operator request, drained between protocol messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdminRequest {
    /// Log the active configuration.
    PrintConfig,
    /// Re-read the configuration file; keep the old tree on failure.
    ReloadConfig,
    /// Drop the frame and force re-identification.
    ResetState,
    /// Shut the engine down in an orderly fashion.
    Stop,
}

const MENU: &str = "interrupt: [p]rint config  [r]eload config  [t] reset state  [s]top  [c]ancel";

/// Spawn the Ctrl-C watcher and return the request receiver.
///
/// The task ends when the receiver is dropped or stdin closes.
pub fn spawn_interrupt_watcher() -> mpsc::Receiver<AdminRequest> {
    let (tx, rx) = mpsc::channel(4);
    tokio::spawn(async move {
        let mut lines = BufReader::new(tokio::io::stdin()).lines();
        loop {
            if tokio::signal::ctrl_c().await.is_err() {
                warn!("interrupt handler unavailable, admin menu disabled");
                return;
            }
            eprintln!("{MENU}");
            let line = match lines.next_line().await {
                Ok(Some(line)) => line,
                Ok(None) | Err(_) => return,
            };
            let Some(request) = parse_choice(&line) else {
                continue;
            };
            if tx.send(request).await.is_err() {
                return;
            }
        }
    });
    rx
}

fn parse_choice(line: &str) -> Option<AdminRequest> {
    match line.trim().to_ascii_lowercase().as_str() {
        "p" => Some(AdminRequest::PrintConfig),
        "r" => Some(AdminRequest::ReloadConfig),
        "t" => Some(AdminRequest::ResetState),
        "s" => Some(AdminRequest::Stop),
        _ => None,
    }
}
