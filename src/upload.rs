//! The upload pipeline: scan, classify, link, deliver
//!
//! Everything a call needs lives in its own [`ResolutionContext`], so
//! concurrent calls never share state.

use std::fmt;
use std::fs;
use std::path::PathBuf;

use rayon::prelude::*;

use crate::classify::classify_path;
use crate::config::UploadConfig;
use crate::delivery::DeliveryClient;
use crate::error::{Result, UploadError};
use crate::graph::ResolutionContext;
use crate::log::{LogLevel, LogSink};
use crate::scan::FileScanner;

/// What a successful call did
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadSummary {
    pub uploaded: usize,
    pub unmatched: usize,
    pub ambiguous: usize,
    pub dry_run: bool,
}

impl fmt::Display for UploadSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Uploaded {} source map(s)", self.uploaded)?;
        let skipped = self.unmatched + self.ambiguous;
        if skipped > 0 {
            write!(f, ", skipped {}", skipped)?;
        }
        if self.dry_run {
            write!(f, " (DRY RUN)")?;
        }
        Ok(())
    }
}

/// Upload every unambiguously matched source map under the configured roots
pub async fn upload(config: &UploadConfig) -> Result<UploadSummary> {
    let mut client = DeliveryClient::new(config.endpoint.clone());
    upload_with(config, &mut client).await
}

/// [`upload`] with a caller-supplied delivery client
pub async fn upload_with(
    config: &UploadConfig,
    client: &mut DeliveryClient,
) -> Result<UploadSummary> {
    config.validate()?;
    let log = config.log.clone();

    let scanner = FileScanner::new(&config.extensions, &config.ignore)?;
    let roots: Vec<PathBuf> = config
        .roots
        .iter()
        .map(|r| config.resolve_root(r))
        .collect();
    let scan_log = log.clone();
    let context = tokio::task::spawn_blocking(move || collect(&scanner, &roots, &scan_log))
        .await?;

    // Scanned paths are canonical; match them against a canonical root.
    let root = fs::canonicalize(&config.root)
        .unwrap_or_else(|_| config.root.clone());
    let resolution = context.resolve(&root, &log);

    for record in &resolution.records {
        log(
            LogLevel::Normal,
            &format!("Uploading {}", record.relative_path),
        );
        log(
            LogLevel::Verbose,
            &format!("  content hash {}", record.hash.token()),
        );
        if config.dry_run {
            continue;
        }
        client
            .deliver(&config.group, &config.api_key, record)
            .await
            .map_err(|source| UploadError::Delivery {
                path: record.relative_path.clone(),
                source,
            })?;
    }

    let summary = UploadSummary {
        uploaded: resolution.records.len(),
        unmatched: resolution.unmatched.len(),
        ambiguous: resolution.ambiguous.len(),
        dry_run: config.dry_run,
    };
    log(LogLevel::Normal, &summary.to_string());
    Ok(summary)
}

/// Scan and classify every file; entries are inserted in scan order
fn collect(scanner: &FileScanner, roots: &[PathBuf], log: &LogSink) -> ResolutionContext {
    let mut context = ResolutionContext::new();
    let files = scanner.scan(roots, &mut context.scanned, log);
    let scanned = format!("Scanning {} file(s)", files.len());
    log(LogLevel::Verbose, &scanned);

    let classified: Vec<_> = files
        .par_iter()
        .map(|path| (path, classify_path(path)))
        .collect();

    for (path, result) in classified {
        match result {
            Ok(classified) => {
                for note in &classified.notes {
                    log(LogLevel::Verbose, note);
                }
                context.insert(classified.artifact);
            }
            Err(e) => log(
                LogLevel::Verbose,
                &format!("{}: unreadable, skipping: {}", path.display(), e),
            ),
        }
    }
    context
}
