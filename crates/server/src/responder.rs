use std::sync::atomic::{AtomicU64, Ordering};

use shared::{
    domain::EventName,
    error::{ApiException, ErrorCode},
    protocol::EventDescriptor,
};
use tracing::info;

use crate::render::RenderScript;

/// Server-side page logic: produces the creation script and answers each
/// event with the script that brings the client page up to date.
pub trait ScriptResponder: Send + Sync {
    fn creation_script(&self) -> String;
    fn handle_event(&self, descriptor: &EventDescriptor) -> Result<String, ApiException>;
}

const PANEL: &str = "panel";
const INCREMENT: &str = "btn1";
const RESET: &str = "btn2";
const LABEL: &str = "lbl1";

/// Demonstration page: a counter button, a reset button and a label, all
/// inside a panel that handles clicks landing on its plain children.
/// Keeps one view state for the whole process.
pub struct CounterPage {
    title: String,
    clicks: AtomicU64,
}

impl CounterPage {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            clicks: AtomicU64::new(0),
        }
    }

    pub fn clicks(&self) -> u64 {
        self.clicks.load(Ordering::SeqCst)
    }
}

fn label_text(clicks: u64) -> String {
    format!("Clicked {clicks} times")
}

impl ScriptResponder for CounterPage {
    fn creation_script(&self) -> String {
        RenderScript::new()
            .clear_page()
            .set_title(&self.title)
            .create_element("div", PANEL, None)
            .append_to_body(PANEL)
            .create_element("button", INCREMENT, Some("Click me"))
            .append(PANEL, INCREMENT)
            .create_element("button", RESET, Some("Reset"))
            .append(PANEL, RESET)
            .create_element("span", LABEL, Some(&label_text(self.clicks())))
            .append(PANEL, LABEL)
            .on_click(PANEL)
            .on_click(INCREMENT)
            .on_click(RESET)
            .build()
    }

    fn handle_event(&self, descriptor: &EventDescriptor) -> Result<String, ApiException> {
        if descriptor.event_name.as_str() != EventName::CLICK {
            return Err(ApiException::new(
                ErrorCode::Validation,
                format!("unsupported event '{}'", descriptor.event_name),
            ));
        }

        let mut script = RenderScript::new();
        match descriptor.control_id.as_str() {
            INCREMENT => {
                let clicks = self.clicks.fetch_add(1, Ordering::SeqCst) + 1;
                info!(clicks, "counter incremented");
                script
                    .update_text(LABEL, &label_text(clicks))
                    .set_title(&format!("{} ({clicks})", self.title));
            }
            RESET => {
                self.clicks.store(0, Ordering::SeqCst);
                info!("counter reset");
                script
                    .update_text(LABEL, &label_text(0))
                    .set_title(&self.title);
            }
            PANEL => {
                script.set_title(&format!("{}: panel", self.title));
            }
            other => {
                return Err(ApiException::new(
                    ErrorCode::NotFound,
                    format!("unknown control '{other}'"),
                ));
            }
        }
        Ok(script.build())
    }
}

#[cfg(test)]
#[path = "tests/responder_tests.rs"]
mod tests;
