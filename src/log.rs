//! User-facing log sink
//!
//! The pipeline reports progress through a [`LogSink`] callback instead of
//! writing to stdout directly. Internal diagnostics go through `tracing`.

use std::sync::{Arc, Mutex};

/// Severity of a user-facing message
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Normal,
    Verbose,
}

/// Callback receiving every user-facing message
pub type LogSink = Arc<dyn Fn(LogLevel, &str) + Send + Sync>;

/// A sink forwarding normal messages to `info!` and verbose ones to `debug!`
pub fn tracing_sink() -> LogSink {
    Arc::new(|level: LogLevel, message: &str| match level {
        LogLevel::Normal => tracing::info!("{}", message),
        LogLevel::Verbose => tracing::debug!("{}", message),
    })
}

/// A sink that records messages in order, for inspection after a run
pub fn collecting_sink() -> (LogSink, Arc<Mutex<Vec<(LogLevel, String)>>>) {
    let lines = Arc::new(Mutex::new(Vec::new()));
    let captured = Arc::clone(&lines);
    let sink: LogSink = Arc::new(move |level: LogLevel, message: &str| {
        if let Ok(mut lines) = captured.lock() {
            lines.push((level, message.to_string()));
        }
    });
    (sink, lines)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collecting_sink_keeps_order() {
        let (sink, lines) = collecting_sink();
        sink(LogLevel::Normal, "first");
        sink(LogLevel::Verbose, "second");

        let lines = lines.lock().unwrap();
        assert_eq!(
            *lines,
            vec![
                (LogLevel::Normal, "first".to_string()),
                (LogLevel::Verbose, "second".to_string()),
            ]
        );
    }
}
