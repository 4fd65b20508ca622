use std::sync::{Arc, Mutex};
use std::time::Duration;

use protocol::{Method, PremisesId, StreamId};
use status::{StatusReceiver, StatusReceiverConfig};
use tracing::debug;

use crate::codecs::{Options, StreamConfiguration};
use crate::base::{required, ApiCore};
use crate::error::ClientError;

/// Deleting a stream also tears down its analysis, which the server does
/// synchronously.
const DELETE_TIMEOUT: Duration = Duration::from_secs(120);

/// Stream configuration endpoints and the shared status receiver.
#[derive(Debug)]
pub struct StreamStub {
    core: Arc<ApiCore>,
    status_config: StatusReceiverConfig,
    receiver: Mutex<Option<Arc<StatusReceiver>>>,
}

impl StreamStub {
    pub fn new(core: Arc<ApiCore>, status_config: StatusReceiverConfig) -> Self {
        Self {
            core,
            status_config,
            receiver: Mutex::new(None),
        }
    }

    pub async fn get_stream_configuration(&self, stream_id: StreamId) -> Result<StreamConfiguration, ClientError> {
        let path = format!("/api/streams/{stream_id}");
        let (config, _) = self.core.get_json(self.core.request(Method::Get, &path)).await?;
        required(config, &path)
    }

    /// All stream configurations, or only those of one premises.
    pub async fn get_stream_configurations(
        &self,
        premises_id: Option<PremisesId>,
    ) -> Result<Vec<StreamConfiguration>, ClientError> {
        const PATH: &str = "/api/streams";
        let mut request = self.core.request(Method::Get, PATH);
        if let Some(premises_id) = premises_id {
            request = request.query("premises_id", premises_id);
        }
        let (configs, _) = self.core.get_json(request).await?;
        Ok(configs.unwrap_or_default())
    }

    /// Creates the stream, or updates it when `config.id` is set. Returns the
    /// configuration as stored, with its ID.
    pub async fn set_stream_configuration(
        &self,
        config: &StreamConfiguration,
    ) -> Result<StreamConfiguration, ClientError> {
        const PATH: &str = "/api/streams";
        let stored = self.core.post_json(PATH, config).await?;
        required(stored, PATH)
    }

    /// Deletes the stream, stopping its analysis and closing it.
    pub async fn delete_stream_configuration(&self, stream_id: StreamId) -> Result<(), ClientError> {
        let request = self
            .core
            .request(Method::Delete, format!("/api/streams/{stream_id}"))
            .timeout(Some(DELETE_TIMEOUT));
        self.core.delete(request).await
    }

    /// The URL the server re-streams this stream at.
    pub async fn get_stream_url(&self, stream_id: StreamId) -> Result<String, ClientError> {
        let path = format!("/api/streams/{stream_id}/url");
        let (url, _) = self.core.get_json(self.core.request(Method::Get, &path)).await?;
        required(url, &path)
    }

    pub async fn get_runtime_options(&self, stream_id: StreamId) -> Result<Options, ClientError> {
        let path = format!("/api/streams/{stream_id}/runtime_options");
        let (options, _) = self.core.get_json(self.core.request(Method::Get, &path)).await?;
        Ok(options.unwrap_or_default())
    }

    pub async fn set_runtime_option_vals(&self, stream_id: StreamId, options: &Options) -> Result<(), ClientError> {
        let path = format!("/api/streams/{stream_id}/runtime_options");
        self.core
            .put_json::<_, serde_json::Value>(&path, options)
            .await?;
        Ok(())
    }

    /// The shared [`StatusReceiver`]. A new one is started if none exists
    /// yet or the previous one has stopped.
    ///
    /// Must be called from within a tokio runtime.
    pub fn get_status_receiver(&self) -> Arc<StatusReceiver> {
        let mut slot = self.receiver.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(receiver) = slot.as_ref().filter(|r| r.is_running()) {
            return Arc::clone(receiver);
        }

        debug!("starting status receiver");
        let receiver = Arc::new(StatusReceiver::start(
            Arc::clone(self.core.session()),
            self.status_config.clone(),
        ));
        *slot = Some(Arc::clone(&receiver));
        receiver
    }

    /// Stops the shared status receiver, if one was started.
    pub async fn close(&self) {
        let receiver = self.receiver.lock().unwrap_or_else(|e| e.into_inner()).take();
        if let Some(receiver) = receiver {
            receiver.close().await;
        }
    }
}
