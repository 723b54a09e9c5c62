use std::sync::Arc;

use shared::{domain::ControlId, protocol::EventDescriptor};
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::{
    engine::{RenderScriptEngine, ScriptEngine},
    error::BridgeError,
    invocation::RemoteInvocationClient,
    page::{NodeId, PageHandle},
    script::ScriptValue,
};

const CLICK_EVENT: &str = "click";

/// Ties the page, the invocation client and the script engine together:
/// user actions are attributed, sent to the server, and the reply is run
/// against the same page.
#[derive(Clone)]
pub struct UiBridge {
    page: PageHandle,
    client: Arc<RemoteInvocationClient>,
    engine: Arc<dyn ScriptEngine>,
}

/// A round trip started by a dispatch. Dropping it does not cancel the work.
#[derive(Debug)]
pub struct PendingInvocation {
    descriptor: Option<EventDescriptor>,
    handle: Option<JoinHandle<Result<ScriptValue, BridgeError>>>,
    rejected: Option<BridgeError>,
}

impl PendingInvocation {
    pub fn descriptor(&self) -> Option<&EventDescriptor> {
        self.descriptor.as_ref()
    }

    /// Waits for the server reply to be executed.
    pub async fn outcome(self) -> Result<ScriptValue, BridgeError> {
        if let Some(err) = self.rejected {
            return Err(err);
        }
        match self.handle {
            Some(handle) => handle.await?,
            None => Ok(ScriptValue::Undefined),
        }
    }
}

impl UiBridge {
    pub fn new(page: PageHandle, client: RemoteInvocationClient) -> Self {
        Self::with_engine(page, client, Arc::new(RenderScriptEngine::default()))
    }

    pub fn with_engine(
        page: PageHandle,
        client: RemoteInvocationClient,
        engine: Arc<dyn ScriptEngine>,
    ) -> Self {
        Self {
            page,
            client: Arc::new(client),
            engine,
        }
    }

    pub fn page(&self) -> &PageHandle {
        &self.page
    }

    pub fn client(&self) -> &RemoteInvocationClient {
        &self.client
    }

    /// Fetches and runs the creation script.
    pub async fn load(&self) -> Result<ScriptValue, BridgeError> {
        let script = self.client.fetch_creation_script().await?;
        info!(bytes = script.len(), "loaded creation script");
        Ok(self.engine.execute(&self.page, &script).await?)
    }

    /// One full round trip: invoke, then execute the reply. A failed
    /// invocation never reaches the engine.
    pub async fn process(&self, descriptor: EventDescriptor) -> Result<ScriptValue, BridgeError> {
        let code = self.client.invoke_descriptor(&descriptor).await?;
        debug!(
            control_id = %descriptor.control_id,
            bytes = code.len(),
            "executing server reply"
        );
        Ok(self.engine.execute(&self.page, &code).await?)
    }

    /// Delivers `event_type` at `target` and starts one round trip for each
    /// authoritative listener. Returns without waiting for any of them.
    pub async fn dispatch(
        &self,
        target: NodeId,
        event_type: &str,
    ) -> Result<Vec<PendingInvocation>, BridgeError> {
        let report = {
            let document = self.page.lock().await;
            document
                .dispatch_event(target, event_type)
                .map_err(|e| BridgeError::InvalidInput(e.to_string()))?
        };
        debug!(
            event_type,
            listeners = report.listeners_evaluated,
            invocations = report.invocations.len(),
            "dispatched event"
        );

        Ok(report
            .invocations
            .into_iter()
            .map(|invocation| match invocation {
                Ok(descriptor) => {
                    let bridge = self.clone();
                    let queued = descriptor.clone();
                    PendingInvocation {
                        descriptor: Some(descriptor),
                        handle: Some(tokio::spawn(async move { bridge.process(queued).await })),
                        rejected: None,
                    }
                }
                Err(err) => PendingInvocation {
                    descriptor: None,
                    handle: None,
                    rejected: Some(err.into()),
                },
            })
            .collect())
    }

    /// Clicks the connected element with `control_id`.
    pub async fn click(&self, control_id: &ControlId) -> Result<Vec<PendingInvocation>, BridgeError> {
        let target = self
            .page
            .lock()
            .await
            .element_by_id(control_id.as_str())
            .ok_or_else(|| BridgeError::InvalidInput(format!("no control with id '{control_id}'")))?;
        self.dispatch(target, CLICK_EVENT).await
    }
}

#[cfg(test)]
#[path = "tests/bridge_tests.rs"]
mod tests;
