//! Source map uploader
//!
//! Finds the source maps among a set of build outputs, works out which
//! generated file each map belongs to, and uploads every unambiguous map to
//! the ingestion service.
//!
//! ## Pipeline
//!
//! ```text
//! roots ──scan──▶ files ──classify──▶ ResolutionContext ──link──▶ UploadRecords
//!                          (parallel)     generated files          (one per map with
//!                                         source maps               exactly one match)
//!                                                                        │
//!                                                                     deliver
//!                                                                        ▼
//!                                                                     service
//! ```
//!
//! - **Classification**: a file is a source map iff it is a JSON object with
//!   `version: 3` and a string `mappings`; everything else is a generated-file
//!   candidate, hashed with SHA256.
//! - **Linking**: maps and generated files reference each other through the
//!   map's `file` field and the generated file's trailing
//!   `//# sourceMappingURL=` comment. Both directions are followed.
//! - **Delivery**: PUT to every resolved address of the service in shuffled
//!   order, with jittered quadratic backoff over five rounds and one final
//!   fallback attempt.

pub mod checksum;
pub mod classify;
pub mod config;
pub mod delivery;
pub mod error;
pub mod graph;
pub mod log;
pub mod scan;
pub mod upload;

pub use checksum::Checksum;
pub use classify::{classify_path, Artifact, GeneratedFileEntry, SourceMapEntry};
pub use config::{Endpoint, Settings, UploadConfig};
pub use delivery::{DeliveryClient, DeliveryError};
pub use error::{Result, UploadError};
pub use graph::{Resolution, ResolutionContext, UploadRecord};
pub use log::{LogLevel, LogSink};
pub use scan::FileScanner;
pub use upload::{upload, upload_with, UploadSummary};
