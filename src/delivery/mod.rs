//! Resilient delivery of source maps
//!
//! One upload runs up to [`ROUNDS`] rounds. Each round re-resolves the
//! service host, shuffles the addresses and tries them in turn until one
//! accepts the map. Every failed attempt is followed by a jittered sleep
//! (see [`backoff`]). When all rounds fail, one last attempt is made against
//! the first address of a fresh lookup and its outcome is final.
//!
//! All failures are retried the same way, whatever their cause.

pub mod backoff;
pub mod response;
pub mod transport;

use std::io;
use std::net::SocketAddr;
use std::time::Duration;

use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{RngCore, SeedableRng};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::Endpoint;
use crate::graph::UploadRecord;

pub use backoff::{backoff_delay, BACKOFF_BASE};
pub use response::check_response;
pub use transport::{
    DnsResolver, HttpsTransport, PinnedTarget, RawResponse, Resolver, Transport, UploadRequest,
};

/// Shuffled rounds before the final fallback attempt
pub const ROUNDS: usize = 5;

/// Why a single attempt (or the whole delivery) failed
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("DNS lookup for {host} failed: {source}")]
    Resolve {
        host: String,
        #[source]
        source: io::Error,
    },

    #[error("No addresses found for {0}")]
    NoAddresses(String),

    #[error("Request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("{message}")]
    Status { status: u16, message: String },

    #[error("Malformed response: {0}")]
    MalformedResponse(String),
}

/// Uploads records to the ingestion service
pub struct DeliveryClient {
    endpoint: Endpoint,
    resolver: Box<dyn Resolver>,
    transport: Box<dyn Transport>,
    rng: Box<dyn RngCore + Send + Sync>,
    backoff_base: Duration,
}

impl DeliveryClient {
    /// Client using system DNS, HTTPS and an entropy-seeded RNG
    pub fn new(endpoint: Endpoint) -> Self {
        Self::with_parts(
            endpoint,
            Box::new(DnsResolver),
            Box::new(HttpsTransport),
            Box::new(StdRng::from_entropy()),
        )
    }

    pub fn with_parts(
        endpoint: Endpoint,
        resolver: Box<dyn Resolver>,
        transport: Box<dyn Transport>,
        rng: Box<dyn RngCore + Send + Sync>,
    ) -> Self {
        Self {
            endpoint,
            resolver,
            transport,
            rng,
            backoff_base: BACKOFF_BASE,
        }
    }

    pub fn with_backoff_base(mut self, base: Duration) -> Self {
        self.backoff_base = base;
        self
    }

    pub fn endpoint(&self) -> &Endpoint {
        &self.endpoint
    }

    /// The PUT request for one record
    pub fn build_request(
        &self,
        group: &str,
        api_key: &str,
        record: &UploadRecord,
    ) -> UploadRequest {
        UploadRequest {
            url: self.endpoint.url(),
            headers: vec![
                ("Content-Type", "application/json".to_string()),
                ("Authorization", format!("Bearer {}", api_key)),
                ("X-Group", group.to_string()),
                ("X-Filename", record.relative_path.clone()),
                ("X-ContentHash", record.hash.token()),
            ],
            body: record.content.clone(),
        }
    }

    /// Deliver one record, retrying across addresses and rounds
    pub async fn deliver(
        &mut self,
        group: &str,
        api_key: &str,
        record: &UploadRecord,
    ) -> Result<(), DeliveryError> {
        let request = self.build_request(group, api_key, record);

        for round in 0..ROUNDS {
            let addresses = match self.resolve().await {
                Ok(mut addresses) => {
                    addresses.shuffle(&mut self.rng);
                    addresses
                }
                Err(e) => {
                    warn!(round, "{}", e);
                    self.backoff(round).await;
                    continue;
                }
            };

            for address in addresses {
                match self.attempt(address, &request).await {
                    Ok(()) => {
                        info!(%address, round, file = %record.relative_path, "uploaded");
                        return Ok(());
                    }
                    Err(e) => {
                        warn!(
                            %address,
                            round,
                            file = %record.relative_path,
                            "attempt failed: {}",
                            e
                        );
                        self.backoff(round).await;
                    }
                }
            }
        }

        let address = self
            .resolve()
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| DeliveryError::NoAddresses(self.endpoint.host.clone()))?;
        debug!(%address, file = %record.relative_path, "final attempt");
        self.attempt(address, &request).await
    }

    async fn resolve(&self) -> Result<Vec<SocketAddr>, DeliveryError> {
        let host = &self.endpoint.host;
        let addresses = self
            .resolver
            .resolve(host, self.endpoint.port)
            .await
            .map_err(|source| DeliveryError::Resolve {
                host: host.clone(),
                source,
            })?;
        if addresses.is_empty() {
            return Err(DeliveryError::NoAddresses(host.clone()));
        }
        Ok(addresses)
    }

    async fn attempt(
        &self,
        address: SocketAddr,
        request: &UploadRequest,
    ) -> Result<(), DeliveryError> {
        let target = PinnedTarget {
            connect_to: address,
            verify_as: self.endpoint.host.clone(),
        };
        debug!(%address, host = %target.verify_as, "PUT {}", request.url);
        let response = self.transport.put(&target, request).await?;
        check_response(response.status, &response.body)?;
        Ok(())
    }

    async fn backoff(&mut self, round: usize) {
        let delay = backoff_delay(&mut self.rng, self.backoff_base, round);
        debug!(round, ?delay, "backing off");
        tokio::time::sleep(delay).await;
    }
}
