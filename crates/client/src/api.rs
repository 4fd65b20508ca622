use std::sync::Arc;
use std::time::Duration;

use protocol::{ErrorRegistry, PremisesId, StreamId, ZoneStatusFrame};
use status::{StatusReceiver, ZoneStatusStream};
use transport::Credentials;
use url::Url;

use crate::base::ApiCore;
use crate::codecs::{Options, StreamConfiguration};
use crate::config::ClientConfig;
use crate::error::ClientError;
use crate::stubs::{StreamStub, SystemStub, ZoneStatusStub};

/// Access to every BrainFrame endpoint this client supports.
///
/// One component per resource, all sharing one [`ApiCore`] (and so one
/// connection pool, one session, and one error registry). The methods on
/// this type delegate to the components; use [`BrainFrameApi::streams`] and
/// friends to reach them directly.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> Result<(), client::ClientError> {
/// use client::{BrainFrameApi, ClientConfig};
///
/// let api = BrainFrameApi::new(
///     ClientConfig::new("http://localhost").with_credentials("admin", "admin"),
/// )?;
/// api.wait_for_server_initialization(None).await?;
/// for stream in api.get_stream_configurations(None).await? {
///     println!("{}", stream.name);
/// }
/// api.close().await;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct BrainFrameApi {
    core: Arc<ApiCore>,
    system: SystemStub,
    streams: StreamStub,
    zone_statuses: ZoneStatusStub,
}

impl BrainFrameApi {
    /// Builds a client with the built-in error registry.
    pub fn new(config: ClientConfig) -> Result<Self, ClientError> {
        Self::with_registry(config, ErrorRegistry::builtin())
    }

    /// Builds a client that translates server errors with `registry`.
    pub fn with_registry(config: ClientConfig, registry: ErrorRegistry) -> Result<Self, ClientError> {
        let server_url = config.parsed_server_url()?;
        let core = Arc::new(ApiCore::new(
            server_url,
            Arc::new(registry),
            config.default_timeout,
        )?);
        core.set_credentials(config.credentials.map(Credentials::from));

        Ok(Self {
            system: SystemStub::new(Arc::clone(&core)),
            streams: StreamStub::new(Arc::clone(&core), config.status),
            zone_statuses: ZoneStatusStub::new(Arc::clone(&core)),
            core,
        })
    }

    pub fn core(&self) -> &ApiCore {
        &self.core
    }

    pub fn system(&self) -> &SystemStub {
        &self.system
    }

    pub fn streams(&self) -> &StreamStub {
        &self.streams
    }

    pub fn zone_statuses(&self) -> &ZoneStatusStub {
        &self.zone_statuses
    }

    pub fn set_url(&self, url: &str) -> Result<(), ClientError> {
        self.core.set_url(url)
    }

    pub fn server_url(&self) -> Option<Url> {
        self.core.server_url()
    }

    pub fn set_credentials(&self, credentials: Option<Credentials>) {
        self.core.set_credentials(credentials);
    }

    // -----------------------------------------------------------------------
    // System
    // -----------------------------------------------------------------------

    pub async fn version(&self) -> Result<String, ClientError> {
        self.system.version().await
    }

    pub async fn wait_for_server_initialization(&self, timeout: Option<Duration>) -> Result<(), ClientError> {
        self.system.wait_for_server_initialization(timeout).await
    }

    // -----------------------------------------------------------------------
    // Streams
    // -----------------------------------------------------------------------

    pub async fn get_stream_configuration(&self, stream_id: StreamId) -> Result<StreamConfiguration, ClientError> {
        self.streams.get_stream_configuration(stream_id).await
    }

    pub async fn get_stream_configurations(
        &self,
        premises_id: Option<PremisesId>,
    ) -> Result<Vec<StreamConfiguration>, ClientError> {
        self.streams.get_stream_configurations(premises_id).await
    }

    pub async fn set_stream_configuration(
        &self,
        config: &StreamConfiguration,
    ) -> Result<StreamConfiguration, ClientError> {
        self.streams.set_stream_configuration(config).await
    }

    pub async fn delete_stream_configuration(&self, stream_id: StreamId) -> Result<(), ClientError> {
        self.streams.delete_stream_configuration(stream_id).await
    }

    pub async fn get_stream_url(&self, stream_id: StreamId) -> Result<String, ClientError> {
        self.streams.get_stream_url(stream_id).await
    }

    pub async fn get_runtime_options(&self, stream_id: StreamId) -> Result<Options, ClientError> {
        self.streams.get_runtime_options(stream_id).await
    }

    pub async fn set_runtime_option_vals(&self, stream_id: StreamId, options: &Options) -> Result<(), ClientError> {
        self.streams.set_runtime_option_vals(stream_id, options).await
    }

    pub fn get_status_receiver(&self) -> Arc<StatusReceiver> {
        self.streams.get_status_receiver()
    }

    // -----------------------------------------------------------------------
    // Zone statuses
    // -----------------------------------------------------------------------

    pub async fn get_latest_zone_statuses(&self) -> Result<ZoneStatusFrame, ClientError> {
        self.zone_statuses.get_latest_zone_statuses().await
    }

    pub async fn get_zone_status_stream(&self, timeout: Option<Duration>) -> Result<ZoneStatusStream, ClientError> {
        self.zone_statuses.get_zone_status_stream(timeout).await
    }

    /// Stops background work. The client stays usable for requests; a later
    /// [`BrainFrameApi::get_status_receiver`] starts a fresh receiver.
    pub async fn close(&self) {
        self.streams.close().await;
    }
}
