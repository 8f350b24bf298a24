//! Blocking [`ProfileFetcher`] backed by the compliance client.
//!
//! The runner resolves profiles synchronously, so this adapter owns a
//! current-thread runtime and drives the async client on it. It must not be
//! called from inside another async runtime.

use tokio::runtime::{Builder, Runtime};
use tracing::debug;

use vulcano_core::{Error as CoreError, ProfileFetcher, RemoteRef, RunSummary};

use crate::client::ComplianceClient;
use crate::error::{ComplianceError, Result};

/// Fetches `compliance://` and HTTP(S) profiles for the runner.
#[derive(Debug)]
pub struct BlockingFetcher {
    client: ComplianceClient,
    runtime: Runtime,
}

impl BlockingFetcher {
    /// Wraps `client`.
    ///
    /// # Errors
    ///
    /// Returns [`ComplianceError::Runtime`] if the runtime cannot start.
    pub fn new(client: ComplianceClient) -> Result<Self> {
        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|source| ComplianceError::Runtime { source })?;
        Ok(Self { client, runtime })
    }

    /// The wrapped client.
    #[must_use]
    pub const fn client(&self) -> &ComplianceClient {
        &self.client
    }

    /// Publishes a run summary, blocking until the server answers.
    ///
    /// # Errors
    ///
    /// See [`ComplianceClient::publish`].
    pub fn publish(&self, owner: &str, summary: &RunSummary) -> Result<()> {
        self.runtime.block_on(self.client.publish(owner, summary))
    }
}

impl ProfileFetcher for BlockingFetcher {
    fn fetch(&self, reference: &RemoteRef) -> vulcano_core::Result<String> {
        debug!(reference = %reference, "Fetching remote profile");
        let result = match reference {
            RemoteRef::Compliance { owner, name } => self
                .runtime
                .block_on(self.client.fetch_profile(owner, name)),
            RemoteRef::Url(url) => self.runtime.block_on(self.client.fetch_url(url)),
        };
        result.map_err(|e| CoreError::Fetch {
            reference: reference.to_string(),
            message: e.to_string(),
        })
    }
}
