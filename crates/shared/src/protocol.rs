use serde::{Deserialize, Serialize};

use crate::domain::{ControlId, EventName, ValidationError};

/// Endpoint that receives event descriptors and answers with a render script.
/// Relative to the application base URL.
pub const PROCESS_EVENT_PATH: &str = "process-server-ui-event";
/// Endpoint serving the script that builds the initial page.
pub const CREATE_UI_PATH: &str = "create-ui.js";

pub const JSON_CONTENT_TYPE: &str = "application/json";
pub const JAVASCRIPT_CONTENT_TYPE: &str = "application/javascript";

/// Module exporting `onClickHandler`, the listener that forwards clicks to
/// the server.
pub const BUTTON_MODULE: &str = "./controls/button.mjs";
/// Module exporting `clearPage`.
pub const PAGE_MODULE: &str = "./page.mjs";

/// Identifies which control and which interaction triggered a server round trip.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventDescriptor {
    pub control_id: ControlId,
    pub event_name: EventName,
}

impl EventDescriptor {
    pub fn new(control_id: ControlId, event_name: EventName) -> Self {
        Self {
            control_id,
            event_name,
        }
    }

    pub fn parse(control_id: &str, event_name: &str) -> Result<Self, ValidationError> {
        Ok(Self {
            control_id: ControlId::new(control_id)?,
            event_name: EventName::new(event_name)?,
        })
    }
}
