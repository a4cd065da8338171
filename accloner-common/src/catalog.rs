//! Command catalog model
//!
//! An [`AcModel`] is the learned command set for one air-conditioner model:
//! a list of operating modes, each holding the encoded signals captured per
//! output temperature. Capture merges a freshly received signal into this
//! structure; the store persists the whole model as a document.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// One captured signal, filed under an output temperature
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemperatureEntry {
    /// Output temperature this signal drives the unit to
    pub output: i64,
    /// Opaque encoded signal exactly as received from the transmitter
    pub encoded_signal: String,
}

/// All signals captured for one operating mode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcCommand {
    /// Operating mode identifier (cool, heat, fan... as numbered by the unit)
    pub mode: i64,
    /// Captured signals for this mode, in first-capture order
    pub temperatures: Vec<TemperatureEntry>,
}

/// A named air-conditioner model and its captured command catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AcModel {
    /// Stable identifier assigned at creation
    pub id: Uuid,
    /// Normalized model name (trimmed, lowercase), unique across the catalog
    pub name: String,
    /// Captured commands, in first-capture order per mode
    pub commands: Vec<AcCommand>,
}

/// Normalizes a model name for storage and lookup
///
/// Names are compared case-insensitively and without surrounding
/// whitespace, so both forms are stripped before they reach the store.
pub fn normalize_model_name(raw: &str) -> String {
    raw.trim().to_lowercase()
}

impl AcModel {
    /// Creates an empty model with a fresh identifier and normalized name
    pub fn new(name: &str) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: normalize_model_name(name),
            commands: Vec::new(),
        }
    }

    /// Merges one captured signal into the catalog
    ///
    /// Creates the mode entry when the mode is new, appends a temperature
    /// entry when the output is new for that mode, and replaces the stored
    /// signal when both already exist. Existing entries keep their order.
    pub fn apply_capture(&mut self, mode: i64, output: i64, encoded_signal: &str) {
        match self.commands.iter_mut().find(|command| command.mode == mode) {
            Some(command) => {
                match command
                    .temperatures
                    .iter_mut()
                    .find(|entry| entry.output == output)
                {
                    Some(entry) => entry.encoded_signal = encoded_signal.to_string(),
                    None => command.temperatures.push(TemperatureEntry {
                        output,
                        encoded_signal: encoded_signal.to_string(),
                    }),
                }
            }
            None => self.commands.push(AcCommand {
                mode,
                temperatures: vec![TemperatureEntry {
                    output,
                    encoded_signal: encoded_signal.to_string(),
                }],
            }),
        }
    }

    /// Looks up the stored signal for a mode/output pair
    pub fn signal_for(&self, mode: i64, output: i64) -> Option<&str> {
        self.commands
            .iter()
            .find(|command| command.mode == mode)?
            .temperatures
            .iter()
            .find(|entry| entry.output == output)
            .map(|entry| entry.encoded_signal.as_str())
    }
}
