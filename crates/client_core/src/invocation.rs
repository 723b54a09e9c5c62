use reqwest::{
    header::{CACHE_CONTROL, CONTENT_TYPE, PRAGMA},
    Client, RequestBuilder, Response,
};
use shared::{
    error::ApiError,
    protocol::{EventDescriptor, CREATE_UI_PATH, JSON_CONTENT_TYPE, PROCESS_EVENT_PATH},
};
use tracing::debug;
use url::Url;

use crate::{error::BridgeError, stream_decoder::read_to_string};

/// Sends event descriptors to the server and hands back the decoded render
/// script. Holds no state between calls apart from the HTTP connection pool.
#[derive(Debug, Clone)]
pub struct RemoteInvocationClient {
    http: Client,
    base_url: Url,
}

impl RemoteInvocationClient {
    pub fn new(base_url: &str) -> Result<Self, BridgeError> {
        Self::with_http_client(Client::new(), base_url)
    }

    pub fn with_http_client(http: Client, base_url: &str) -> Result<Self, BridgeError> {
        let trimmed = base_url.trim();
        if trimmed.is_empty() {
            return Err(BridgeError::InvalidInput(
                "server url must not be empty".to_string(),
            ));
        }
        let mut base_url = Url::parse(trimmed)?;
        // Relative joins replace the last segment unless the path ends in '/'.
        if !base_url.path().ends_with('/') {
            let path = format!("{}/", base_url.path());
            base_url.set_path(&path);
        }
        Ok(Self { http, base_url })
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn endpoint(&self) -> Result<Url, BridgeError> {
        Ok(self.base_url.join(PROCESS_EVENT_PATH)?)
    }

    /// Validates the inputs, posts the descriptor and returns the response
    /// body as text. Invalid inputs fail before any network traffic.
    pub async fn invoke(&self, control_id: &str, event_name: &str) -> Result<String, BridgeError> {
        let descriptor = EventDescriptor::parse(control_id, event_name)?;
        self.invoke_descriptor(&descriptor).await
    }

    pub async fn invoke_descriptor(&self, descriptor: &EventDescriptor) -> Result<String, BridgeError> {
        let endpoint = self.endpoint()?;
        debug!(
            control_id = %descriptor.control_id,
            event_name = %descriptor.event_name,
            %endpoint,
            "invoking server event"
        );
        let request = self
            .http
            .post(endpoint)
            .header(CONTENT_TYPE, JSON_CONTENT_TYPE)
            .json(descriptor);
        self.fetch_text(request).await
    }

    /// Fetches the script that builds the initial page.
    pub async fn fetch_creation_script(&self) -> Result<String, BridgeError> {
        let url = self.base_url.join(CREATE_UI_PATH)?;
        debug!(%url, "fetching creation script");
        self.fetch_text(self.http.get(url)).await
    }

    async fn fetch_text(&self, request: RequestBuilder) -> Result<String, BridgeError> {
        let response = request
            .header(CACHE_CONTROL, "no-store")
            .header(PRAGMA, "no-cache")
            .send()
            .await
            .map_err(BridgeError::Network)?;
        let response = ensure_success(response).await?;
        let body = read_to_string(response.bytes_stream()).await?;
        Ok(body)
    }
}

async fn ensure_success(response: Response) -> Result<Response, BridgeError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let text = response.text().await.unwrap_or_default();
    let message = match serde_json::from_str::<ApiError>(&text) {
        Ok(error) => error.message,
        Err(_) if text.trim().is_empty() => status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string(),
        Err(_) => text,
    };
    Err(BridgeError::Server {
        status: status.as_u16(),
        message,
    })
}

#[cfg(test)]
#[path = "tests/invocation_tests.rs"]
mod tests;
