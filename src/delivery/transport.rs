//! Name resolution and address-pinned HTTPS

use std::io;
use std::net::SocketAddr;

use async_trait::async_trait;

use super::DeliveryError;

/// Connect to one literal address while verifying TLS as a logical host
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PinnedTarget {
    pub connect_to: SocketAddr,
    pub verify_as: String,
}

/// A fully built PUT request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadRequest {
    /// URL naming the logical host, so Host and SNI carry the service name
    pub url: String,
    pub headers: Vec<(&'static str, String)>,
    pub body: Vec<u8>,
}

impl UploadRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(n, _)| n.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Status and complete body of a response
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    pub status: u16,
    pub body: Vec<u8>,
}

/// Looks up every address of a host
#[async_trait]
pub trait Resolver: Send + Sync {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>>;
}

/// Sends one request to one pinned address
#[async_trait]
pub trait Transport: Send + Sync {
    async fn put(
        &self,
        target: &PinnedTarget,
        request: &UploadRequest,
    ) -> Result<RawResponse, DeliveryError>;
}

/// System resolver (A and AAAA records)
#[derive(Debug, Default, Clone, Copy)]
pub struct DnsResolver;

#[async_trait]
impl Resolver for DnsResolver {
    async fn resolve(&self, host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
        let mut addresses: Vec<SocketAddr> = Vec::new();
        for address in tokio::net::lookup_host((host, port)).await? {
            if !addresses.contains(&address) {
                addresses.push(address);
            }
        }
        Ok(addresses)
    }
}

/// HTTPS transport on reqwest, pinning the logical host to the target address
#[derive(Debug, Default, Clone, Copy)]
pub struct HttpsTransport;

#[async_trait]
impl Transport for HttpsTransport {
    async fn put(
        &self,
        target: &PinnedTarget,
        request: &UploadRequest,
    ) -> Result<RawResponse, DeliveryError> {
        // The override keeps the URL's host for SNI, certificate checks and Host.
        let client = reqwest::Client::builder()
            .resolve(&target.verify_as, target.connect_to)
            .build()?;

        let mut builder = client.put(&request.url).body(request.body.clone());
        for (name, value) in &request.headers {
            builder = builder.header(*name, value.as_str());
        }

        let response = builder.send().await?;
        let status = response.status().as_u16();
        let body = response.bytes().await?;

        Ok(RawResponse {
            status,
            body: body.to_vec(),
        })
    }
}
