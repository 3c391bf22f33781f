//! Secondary status command set
//!
//! The secondary port answers simple stateless lookups plus REBOOT, which
//! resets the shared device flags. UPDATE_STATUS keeps a stopwatch that
//! runs only while an update is in flight (`update_status == 2`).

use std::time::{Duration, Instant};
use tokio::sync::Mutex;

use super::documents;
use crate::protocol::envelope::{Document, ResponseBuilder};
use crate::state::StateHandle;

/// Handler for secondary-port commands
pub struct SecondaryCommands {
    state: StateHandle,
    stopwatch: Mutex<Option<Instant>>,
}

impl SecondaryCommands {
    /// Create a handler over the shared state
    #[must_use]
    pub fn new(state: StateHandle) -> Self {
        Self {
            state,
            stopwatch: Mutex::new(None),
        }
    }

    /// Handle one request document, returning the rendered response
    pub async fn handle(&self, request: &Document) -> String {
        match request.get("COMMAND").unwrap_or("") {
            "STATUS" => Self::status(),
            "REBOOT" => self.reboot().await,
            "ANY_UPDATES" => self.any_updates().await,
            "UPDATE_STATUS" => self.update_status().await,
            _ => documents::unknown_command(),
        }
    }

    fn status() -> String {
        ResponseBuilder::new()
            .standard("Operation SUCCESSFUL", "OK", "-1", "SUCCESS")
            .field("SECONDARY_DATA", "14")
            .field("MACLABEL_IN_SESSION", "P_752")
            .field("SESSION_DURATION", "00:00:02")
            .field("INVOICE_SESSION", "MD3551")
            .field("SERIAL_NUMBER", "286061806")
            .render()
    }

    async fn reboot(&self) -> String {
        self.state
            .update(|s| {
                s.approval_mode = true;
                s.card_swiped = false;
                s.device_busy = false;
                s.session_open = false;
            })
            .await;

        ResponseBuilder::new()
            .standard("SUCCESS", "OK", "-1", "SUCCESS")
            .field("SECONDARY_DATA", "0")
            .render()
    }

    async fn any_updates(&self) -> String {
        let data = if self.state.get().await.update_available {
            "1"
        } else {
            "0"
        };

        ResponseBuilder::new()
            .standard("SUCCESS", "OK", "-1", "SUCCESS")
            .field("SECONDARY_DATA", data)
            .render()
    }

    async fn update_status(&self) -> String {
        let update_status = self.state.get().await.update_status;

        let duration = {
            let mut stopwatch = self.stopwatch.lock().await;
            if stopwatch.is_none() {
                *stopwatch = Some(Instant::now());
            }
            if update_status != 2 {
                *stopwatch = None;
            }
            match *stopwatch {
                Some(start) => format_hhmmss(start.elapsed()),
                None => "00:00:00".to_string(),
            }
        };

        ResponseBuilder::new()
            .standard("SUCCESS", "OK", "-1", "SUCCESS")
            .field("SECONDARY_DATA", update_status.to_string())
            .field("MACLABEL_IN_SESSION", "SIMULATOR")
            .field("SESSION_DURATION", duration)
            .field("INVOICE_SESSION", "98985")
            .field("DEVICENAME", "LANE1")
            .field("SERIALNUMBER", "987654321")
            .render()
    }
}

fn format_hhmmss(elapsed: Duration) -> String {
    let total = elapsed.as_secs();
    format!(
        "{:02}:{:02}:{:02}",
        total / 3600,
        (total % 3600) / 60,
        total % 60
    )
}
