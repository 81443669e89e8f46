//! Parsing host signal streams

use crate::error::TrackerError;
use crate::signal::host_signal::{HostSignal, SignalValidationError};

/// Parser for batches of [`HostSignal`]s
pub struct SignalParser;

impl SignalParser {
    /// Parse a JSON string containing an array of signals
    pub fn parse_array(json: &str) -> Result<Vec<HostSignal>, TrackerError> {
        let signals: Vec<HostSignal> = serde_json::from_str(json)?;
        Ok(signals)
    }

    /// Parse NDJSON (newline-delimited JSON) containing signals
    pub fn parse_ndjson(ndjson: &str) -> Result<Vec<HostSignal>, TrackerError> {
        let mut signals = Vec::new();
        for (line_num, line) in ndjson.lines().enumerate() {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }
            match serde_json::from_str::<HostSignal>(trimmed) {
                Ok(signal) => signals.push(signal),
                Err(e) => {
                    return Err(TrackerError::ParseError(format!(
                        "Failed to parse line {}: {}",
                        line_num + 1,
                        e
                    )));
                }
            }
        }
        Ok(signals)
    }

    /// Validate every signal, returning only the failures
    pub fn validate_signals(signals: &[HostSignal]) -> Vec<ValidationResult> {
        signals
            .iter()
            .enumerate()
            .filter_map(|(index, signal)| {
                signal.validate().err().map(|error| ValidationResult {
                    index,
                    signal: signal.kind(),
                    error,
                })
            })
            .collect()
    }
}

/// A signal that failed validation
#[derive(Debug)]
pub struct ValidationResult {
    pub index: usize,
    pub signal: &'static str,
    pub error: SignalValidationError,
}
