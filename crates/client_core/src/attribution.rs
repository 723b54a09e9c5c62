//! Decides which control owns a physical user action when controls nest.
//!
//! Every interactive control carries a [`ServerEventListener`]. When an event
//! reaches it, the listener compares the event's attribution target with its
//! own node. Only the matching listener dispatches; it halts propagation at
//! once so no ancestor fires for the same action. Everyone else defers and
//! lets the event keep bubbling.

use shared::{
    domain::{ControlId, EventName, ValidationError},
    protocol::EventDescriptor,
};
use tracing::debug;

use crate::page::{EventState, NodeId};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DispatchContext<N> {
    pub original_target: N,
    pub current_owner: N,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Attribution {
    Authoritative,
    Deferred,
}

pub fn decide<N: PartialEq>(context: &DispatchContext<N>) -> Attribution {
    if context.original_target == context.current_owner {
        Attribution::Authoritative
    } else {
        Attribution::Deferred
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerEventListener {
    event_name: EventName,
}

impl ServerEventListener {
    pub fn new(event_name: EventName) -> Self {
        Self { event_name }
    }

    pub fn click() -> Self {
        Self::new(EventName::click())
    }

    pub fn event_name(&self) -> &EventName {
        &self.event_name
    }

    /// Returns the descriptor to send when this listener is authoritative.
    ///
    /// An authoritative owner without an id still stops propagation; the
    /// missing id surfaces as a validation error for the caller to report.
    pub fn handle(
        &self,
        event: &mut EventState,
        owner_id: Option<&str>,
    ) -> Option<Result<EventDescriptor, ValidationError>> {
        let current_owner = event.current_target();
        let Some(original_target) = event.attribution_target() else {
            return None;
        };
        let context = DispatchContext {
            original_target,
            current_owner,
        };

        match decide::<NodeId>(&context) {
            Attribution::Deferred => {
                debug!(
                    owner = ?current_owner,
                    target = ?original_target,
                    "deferring event to the innermost interactive control"
                );
                None
            }
            Attribution::Authoritative => {
                event.stop_immediate_propagation();
                let descriptor = ControlId::new(owner_id.unwrap_or_default())
                    .map(|control_id| EventDescriptor::new(control_id, self.event_name.clone()));
                debug!(owner = ?current_owner, event_name = %self.event_name, "authoritative dispatch");
                Some(descriptor)
            }
        }
    }
}

#[cfg(test)]
#[path = "tests/attribution_tests.rs"]
mod tests;
