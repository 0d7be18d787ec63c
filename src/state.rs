use std::sync::Arc;
use std::time::Duration;

use dashmap::DashMap;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{info, warn};

use crate::config::ServerConfig;
use crate::core::realtime::openai::messages::SessionConfig;
use crate::core::realtime::{OpenAIRealtime, RealtimeConnector, RealtimeError, RealtimeResult};
use crate::core::session::{RelaySettings, Session};
use crate::core::tools::ToolRegistry;

/// Application state shared by every request handler.
pub struct AppState {
    pub config: ServerConfig,
    /// Opens one realtime AI session per call
    pub connector: Arc<dyn RealtimeConnector>,
    pub relay: RelaySettings,
    /// Calls currently being relayed, keyed by session id
    pub sessions: DashMap<String, Arc<Session>>,
    /// Cancelled on server shutdown; every session runs under a child token
    pub shutdown: CancellationToken,
    /// Media stream tasks, which outlive the HTTP connection that upgraded them
    pub tasks: TaskTracker,
}

impl AppState {
    /// Build the state for the OpenAI Realtime provider with the built-in tools.
    pub async fn new(config: ServerConfig) -> RealtimeResult<Arc<Self>> {
        let realtime_config = config
            .realtime_config()
            .map_err(RealtimeError::InvalidConfiguration)?;
        let connector = OpenAIRealtime::new(realtime_config)?;

        let tools = ToolRegistry::with_builtin_tools();
        let session_config = connector.build_session_config(tools.definitions());

        info!(
            model = %connector.config().model,
            voice = %connector.config().voice.as_str(),
            tools = tools.len(),
            "Realtime connector configured"
        );

        Ok(Self::with_connector(
            config,
            Arc::new(connector),
            session_config,
            tools,
        ))
    }

    /// Build the state around an arbitrary connector.
    pub fn with_connector(
        config: ServerConfig,
        connector: Arc<dyn RealtimeConnector>,
        session_config: SessionConfig,
        tools: ToolRegistry,
    ) -> Arc<Self> {
        let relay = RelaySettings {
            session: Arc::new(session_config),
            tools: Arc::new(tools),
            report_tool_errors: config.report_tool_errors,
        };

        Arc::new(Self {
            config,
            connector,
            relay,
            sessions: DashMap::new(),
            shutdown: CancellationToken::new(),
            tasks: TaskTracker::new(),
        })
    }

    pub fn active_sessions(&self) -> usize {
        self.sessions.len()
    }

    /// Cancel every session and wait for their teardown, up to `grace`.
    ///
    /// Returns `false` if some session was still closing when `grace` ran out.
    pub async fn drain_sessions(&self, grace: Duration) -> bool {
        self.shutdown.cancel();
        self.tasks.close();

        match tokio::time::timeout(grace, self.tasks.wait()).await {
            Ok(()) => {
                info!("All sessions closed");
                true
            }
            Err(_) => {
                warn!(
                    active_sessions = self.active_sessions(),
                    "Sessions still closing after shutdown grace period"
                );
                false
            }
        }
    }
}
