use std::sync::Arc;
use tokio::sync::mpsc;

use crate::api_auth::AuthGate;
use crate::register::{ProvisionError, UserProvisioner};

/// Sender side of the fatal channel. The serve loop stops the process when
/// anything arrives on it.
pub type FatalSender = mpsc::UnboundedSender<ProvisionError>;

/// Gateway shared state
#[derive(Clone)]
pub struct AppState {
    /// Authentication gate (also the challenge issuer)
    pub gate: Arc<AuthGate>,
    /// Register/mint provisioning saga
    pub provisioner: Arc<UserProvisioner>,
    /// Challenges returned per `GET /challenges`
    pub challenge_batch_size: usize,
    pub livemode: bool,
    fatal_tx: FatalSender,
}

impl AppState {
    pub fn new(
        gate: Arc<AuthGate>,
        provisioner: Arc<UserProvisioner>,
        challenge_batch_size: usize,
        livemode: bool,
        fatal_tx: FatalSender,
    ) -> Self {
        Self {
            gate,
            provisioner,
            challenge_batch_size,
            livemode,
            fatal_tx,
        }
    }

    /// Hand an unrecoverable error to the serve loop.
    pub fn report_fatal(&self, err: ProvisionError) {
        if self.fatal_tx.send(err).is_err() {
            tracing::error!("Fatal channel closed, serve loop already stopped");
        }
    }
}
