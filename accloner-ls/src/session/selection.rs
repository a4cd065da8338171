//! Shared selection state
//!
//! Holds the operator's current model/mode/temperature choice. Capture
//! application happens under the same write lock that guards selection
//! changes, so a frame is always merged against one consistent selection.

use accloner_common::catalog::AcModel;
use accloner_common::events::CaptureEvent;
use tokio::sync::RwLock;

#[derive(Debug, Default)]
struct Selection {
    model: Option<AcModel>,
    mode: Option<i64>,
    temperature: Option<i64>,
}

/// Thread-safe selection holder shared by the console and transmitter paths
pub struct SelectionState {
    selection: RwLock<Selection>,
}

impl SelectionState {
    /// Creates an empty selection (no model, no mode, no temperature)
    pub fn new() -> Self {
        Self {
            selection: RwLock::new(Selection::default()),
        }
    }

    /// Sets the operating mode captures are filed under
    pub async fn set_mode(&self, mode: i64) {
        self.selection.write().await.mode = Some(mode);
    }

    /// Sets the output temperature captures are filed under
    pub async fn set_temperature(&self, temperature: i64) {
        self.selection.write().await.temperature = Some(temperature);
    }

    /// Replaces the selected model
    pub async fn set_model(&self, model: Option<AcModel>) {
        self.selection.write().await.model = model;
    }

    /// Clone of the currently selected model, if any
    pub async fn current_model(&self) -> Option<AcModel> {
        self.selection.read().await.model.clone()
    }

    /// Merges a received signal into the selected model
    ///
    /// Returns `None` without touching anything when the selection is
    /// incomplete (no model, no mode, or no temperature). On success the
    /// in-place model keeps accumulating and the returned snapshot reflects
    /// the merge, paired with the capture notification payload.
    pub async fn apply_capture(&self, encoded_signal: &str) -> Option<(AcModel, CaptureEvent)> {
        let mut selection = self.selection.write().await;

        let (mode, output) = match (selection.mode, selection.temperature) {
            (Some(mode), Some(output)) => (mode, output),
            _ => return None,
        };
        let model = selection.model.as_mut()?;

        model.apply_capture(mode, output, encoded_signal);

        let snapshot = model.clone();
        let event = CaptureEvent {
            model_id: snapshot.id,
            model_name: snapshot.name.clone(),
            mode,
            output,
            encoded_signal: encoded_signal.to_string(),
            timestamp: chrono::Utc::now(),
        };
        Some((snapshot, event))
    }
}

impl Default for SelectionState {
    fn default() -> Self {
        Self::new()
    }
}
