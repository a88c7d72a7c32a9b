//! Unix domain socket server for the control surface
//!
//! Provides request-response access to the command executor and state
//! manager, plus push notifications of events to subscribed clients.
//! Calls into the core run on the blocking pool so a slow shell or url
//! action never stalls the event loop.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Instant;

use anyhow::{Context, Result};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::{UnixListener, UnixStream};
use tokio::sync::{broadcast, mpsc, RwLock};
use tracing::{debug, error, info, warn};

use super::protocol::{DaemonStatus, Request, Response, MAX_FRAME_LEN};
use crate::commands::CommandExecutor;
use crate::events::StateEvent;
use crate::orchestrator::ComponentStatus;
use crate::state::StateManager;

/// Produces fresh component health on demand
pub type HealthSource = Box<dyn Fn() -> Vec<ComponentStatus> + Send + Sync>;

/// Core handles shared by every client connection
pub struct ServerContext {
    executor: Arc<Mutex<CommandExecutor>>,
    state: Arc<Mutex<StateManager>>,
    components: RwLock<Vec<ComponentStatus>>,
    health: Option<HealthSource>,
    start_time: Instant,
}

impl ServerContext {
    pub fn new(executor: Arc<Mutex<CommandExecutor>>, state: Arc<Mutex<StateManager>>) -> Self {
        Self {
            executor,
            state,
            components: RwLock::new(Vec::new()),
            health: None,
            start_time: Instant::now(),
        }
    }

    /// Re-check component health on every status request
    pub fn with_health_source<F>(mut self, health: F) -> Self
    where
        F: Fn() -> Vec<ComponentStatus> + Send + Sync + 'static,
    {
        self.health = Some(Box::new(health));
        self
    }

    /// Serve a request against the core. Blocks; call from the blocking pool.
    fn handle_blocking(&self, request: Request) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Subscribe => Response::Subscribed,
            Request::GetStatus => Response::Status(self.status_blocking()),
            Request::ListCommands => Response::Commands {
                names: self.executor().command_names(),
            },
            Request::ChangeState { state } => match self.state().change_state(&state) {
                Ok(()) => Response::StateChanged { state },
                Err(e) => Response::from(&e),
            },
            Request::ExecuteCommand { name } => match self.executor().execute_command(&name) {
                Ok(success) => Response::CommandResult { name, success },
                Err(e) => Response::from(&e),
            },
        }
    }

    fn status_blocking(&self) -> DaemonStatus {
        let (state, active_models) = {
            let state = self.state();
            (state.current_state().to_string(), state.get_active_models().to_vec())
        };

        let components = match &self.health {
            Some(health) => {
                let fresh = health();
                *self.components.blocking_write() = fresh.clone();
                fresh
            }
            None => self.components.blocking_read().clone(),
        };

        DaemonStatus {
            state,
            active_models,
            last_command: self.executor().last_command().map(str::to_string),
            components,
            uptime_secs: self.start_time.elapsed().as_secs(),
            ..DaemonStatus::default()
        }
    }

    fn executor(&self) -> std::sync::MutexGuard<'_, CommandExecutor> {
        self.executor.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn state(&self) -> std::sync::MutexGuard<'_, StateManager> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Control socket server handling client connections
pub struct Server {
    socket_path: PathBuf,
    listener: Option<UnixListener>,
    context: Arc<ServerContext>,
    shutdown_tx: broadcast::Sender<()>,
    /// Source of events pushed to subscribed clients
    events: Option<broadcast::Sender<StateEvent>>,
}

impl Server {
    /// Create a new control socket server
    pub fn new(socket_path: &Path, context: ServerContext) -> Result<Self> {
        // Ensure parent directory exists
        if let Some(parent) = socket_path.parent() {
            std::fs::create_dir_all(parent).context("failed to create socket directory")?;
        }

        // Remove stale socket if it exists
        if socket_path.exists() {
            std::fs::remove_file(socket_path).context("failed to remove stale socket")?;
        }

        let listener = UnixListener::bind(socket_path).context("failed to bind Unix socket")?;

        // Owner-only access
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            std::fs::set_permissions(socket_path, std::fs::Permissions::from_mode(0o600))?;
        }

        let (shutdown_tx, _) = broadcast::channel(1);

        info!(?socket_path, "control socket listening");

        Ok(Self {
            socket_path: socket_path.to_owned(),
            listener: Some(listener),
            context: Arc::new(context),
            shutdown_tx,
            events: None,
        })
    }

    /// Create a server that pushes events to subscribers
    pub fn with_events(
        socket_path: &Path,
        context: ServerContext,
        events: broadcast::Sender<StateEvent>,
    ) -> Result<Self> {
        let mut server = Self::new(socket_path, context)?;
        server.events = Some(events);
        Ok(server)
    }

    /// Publish the latest adapter health
    pub async fn set_components(&self, components: Vec<ComponentStatus>) {
        let mut current = self.context.components.write().await;
        debug!(count = components.len(), "component status updated");
        *current = components;
    }

    /// Run the server, accepting connections
    pub async fn run(&self) -> Result<()> {
        let listener = self.listener.as_ref().context("server not initialized")?;

        loop {
            match listener.accept().await {
                Ok((stream, _addr)) => {
                    debug!("client connected");
                    let context = Arc::clone(&self.context);
                    let events = self.events.clone();
                    let mut shutdown_rx = self.shutdown_tx.subscribe();

                    tokio::spawn(async move {
                        tokio::select! {
                            result = Self::handle_client(stream, context, events) => {
                                if let Err(e) = result {
                                    warn!(?e, "client handler error");
                                }
                            }
                            _ = shutdown_rx.recv() => {
                                debug!("client handler shutting down");
                            }
                        }
                    });
                }
                Err(e) => {
                    error!(?e, "accept error");
                }
            }
        }
    }

    /// Handle a single client connection
    async fn handle_client(
        stream: UnixStream,
        context: Arc<ServerContext>,
        events: Option<broadcast::Sender<StateEvent>>,
    ) -> Result<()> {
        let (mut reader, mut writer) = stream.into_split();
        let (request_tx, mut request_rx) = mpsc::channel::<Result<Request, String>>(16);

        // Frame reads are not cancel-safe, so they get their own task
        let reader_task = tokio::spawn(async move {
            loop {
                let frame = match read_frame(&mut reader).await {
                    Ok(Some(frame)) => frame,
                    Ok(None) => {
                        debug!("client disconnected");
                        break;
                    }
                    Err(e) => {
                        warn!(?e, "failed to read frame");
                        break;
                    }
                };
                let request = serde_json::from_slice::<Request>(&frame).map_err(|e| e.to_string());
                if request_tx.send(request).await.is_err() {
                    break;
                }
            }
        });

        let mut event_rx: Option<broadcast::Receiver<StateEvent>> = None;

        let result = loop {
            tokio::select! {
                request = request_rx.recv() => {
                    let Some(request) = request else {
                        break Ok(());
                    };
                    let response = match request {
                        Ok(request) => {
                            debug!(?request, "received request");
                            if request == Request::Subscribe && event_rx.is_none() {
                                event_rx = events.as_ref().map(broadcast::Sender::subscribe);
                                debug!("client subscribed to notifications");
                            }
                            Self::process_request(request, &context).await
                        }
                        Err(e) => Response::error("bad_request", e),
                    };
                    if let Err(e) = write_frame(&mut writer, &response).await {
                        break Err(e);
                    }
                }
                event = next_event(&mut event_rx) => {
                    match event {
                        Some(event) => {
                            if let Err(e) = write_frame(&mut writer, &Response::Event { event }).await {
                                break Err(e);
                            }
                        }
                        None => event_rx = None,
                    }
                }
            }
        };

        reader_task.abort();
        result
    }

    /// Process a request and return a response
    async fn process_request(request: Request, context: &Arc<ServerContext>) -> Response {
        match request {
            Request::Ping => Response::Pong,
            Request::Subscribe => Response::Subscribed,
            request => {
                let context = Arc::clone(context);
                tokio::task::spawn_blocking(move || context.handle_blocking(request))
                    .await
                    .unwrap_or_else(|e| Response::error("internal", e.to_string()))
            }
        }
    }

    /// Gracefully shutdown the server
    pub async fn shutdown(&self) {
        let _ = self.shutdown_tx.send(());

        // Remove socket file
        if self.socket_path.exists() {
            if let Err(e) = std::fs::remove_file(&self.socket_path) {
                warn!(?e, "failed to remove socket file");
            }
        }

        info!("control socket shutdown complete");
    }
}

/// Read one length-prefixed frame; `None` on clean EOF
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> Result<Option<Vec<u8>>> {
    let mut len_buf = [0u8; 4];
    match reader.read_exact(&mut len_buf).await {
        Ok(_) => {}
        Err(e) if e.kind() == std::io::ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(e.into()),
    }

    let len = u32::from_le_bytes(len_buf) as usize;
    anyhow::ensure!(len <= MAX_FRAME_LEN, "frame of {len} bytes is too large");

    let mut frame = vec![0u8; len];
    reader.read_exact(&mut frame).await?;
    Ok(Some(frame))
}

/// Send a length-prefixed JSON message
pub async fn write_frame<W, T>(writer: &mut W, msg: &T) -> Result<()>
where
    W: AsyncWrite + Unpin,
    T: serde::Serialize,
{
    let msg_bytes = serde_json::to_vec(msg)?;
    let msg_len = (msg_bytes.len() as u32).to_le_bytes();

    writer.write_all(&msg_len).await?;
    writer.write_all(&msg_bytes).await?;

    Ok(())
}

/// Next event for a subscriber; pends forever when not subscribed
async fn next_event(rx: &mut Option<broadcast::Receiver<StateEvent>>) -> Option<StateEvent> {
    let Some(rx) = rx.as_mut() else {
        return std::future::pending().await;
    };

    loop {
        match rx.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(n)) => {
                warn!(skipped = n, "event subscriber lagged");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use serde_json::json;

    use super::*;
    use crate::config::Config;

    fn context() -> (ServerContext, Arc<Mutex<StateManager>>) {
        let mut config = Config::default();
        config.model_actions = serde_json::from_value(json!({
            "greet": { "action": "custom_message", "message": "hi" }
        }))
        .unwrap();

        let state = Arc::new(Mutex::new(StateManager::new(&config).unwrap()));
        let executor = Arc::new(Mutex::new(CommandExecutor::new(&config)));
        (ServerContext::new(executor, Arc::clone(&state)), state)
    }

    async fn roundtrip(stream: &mut UnixStream, request: &Request) -> Response {
        write_frame(stream, request).await.unwrap();
        receive(stream).await
    }

    async fn receive(stream: &mut UnixStream) -> Response {
        let frame = read_frame(stream).await.unwrap().unwrap();
        serde_json::from_slice(&frame).unwrap()
    }

    async fn start_server() -> (tempfile::TempDir, PathBuf, Arc<Server>, broadcast::Sender<StateEvent>) {
        let (ctx, state) = context();
        start_server_with(ctx, state).await
    }

    async fn start_server_with(
        ctx: ServerContext,
        state: Arc<Mutex<StateManager>>,
    ) -> (tempfile::TempDir, PathBuf, Arc<Server>, broadcast::Sender<StateEvent>) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("daemon.sock");
        let (tx, _) = broadcast::channel(16);

        let events = tx.clone();
        state
            .lock()
            .unwrap()
            .add_state_change_callback(move |from, to| {
                let _ = events.send(StateEvent::StateChanged {
                    from: from.to_string(),
                    to: to.to_string(),
                });
            });

        let server = Arc::new(Server::with_events(&path, ctx, tx.clone()).unwrap());
        let runner = Arc::clone(&server);
        tokio::spawn(async move { runner.run().await });
        (dir, path, server, tx)
    }

    #[tokio::test]
    async fn test_ping_and_commands() {
        let (_dir, path, _server, _tx) = start_server().await;
        let mut stream = UnixStream::connect(&path).await.unwrap();

        assert_eq!(roundtrip(&mut stream, &Request::Ping).await, Response::Pong);
        assert_eq!(
            roundtrip(&mut stream, &Request::ExecuteCommand { name: "greet".into() }).await,
            Response::CommandResult {
                name: "greet".into(),
                success: true
            }
        );
        assert!(matches!(
            roundtrip(&mut stream, &Request::ExecuteCommand { name: "nope".into() }).await,
            Response::Error { ref code, .. } if code == "invalid_command"
        ));
        assert_eq!(
            roundtrip(&mut stream, &Request::ListCommands).await,
            Response::Commands {
                names: vec!["greet".into()]
            }
        );
    }

    #[tokio::test]
    async fn test_status_and_state_changes() {
        let (_dir, path, server, _tx) = start_server().await;
        server
            .set_components(vec![ComponentStatus::new("text", "running")])
            .await;
        let mut stream = UnixStream::connect(&path).await.unwrap();

        assert_eq!(
            roundtrip(&mut stream, &Request::ChangeState { state: "chatty".into() }).await,
            Response::StateChanged {
                state: "chatty".into()
            }
        );
        assert!(matches!(
            roundtrip(&mut stream, &Request::ChangeState { state: "asleep".into() }).await,
            Response::Error { ref code, .. } if code == "invalid_state"
        ));

        match roundtrip(&mut stream, &Request::GetStatus).await {
            Response::Status(status) => {
                assert_eq!(status.state, "chatty");
                assert_eq!(status.components.len(), 1);
                assert_eq!(status.version, env!("CARGO_PKG_VERSION"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_status_rechecks_component_health() {
        let (ctx, state) = context();
        let checks = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&checks);
        let ctx = ctx.with_health_source(move || {
            let status = match counter.fetch_add(1, Ordering::SeqCst) {
                0 => "running",
                _ => "stopped",
            };
            vec![ComponentStatus::new("text", status)]
        });
        let (_dir, path, _server, _tx) = start_server_with(ctx, state).await;
        let mut stream = UnixStream::connect(&path).await.unwrap();

        let Response::Status(first) = roundtrip(&mut stream, &Request::GetStatus).await else {
            panic!("expected status");
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        let Response::Status(second) = roundtrip(&mut stream, &Request::GetStatus).await else {
            panic!("expected status");
        };

        assert_eq!(checks.load(Ordering::SeqCst), 2);
        assert_eq!(first.components[0].status, "running");
        assert_eq!(second.components[0].status, "stopped");
        assert!(second.components[0].last_check_ms > first.components[0].last_check_ms);
    }

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let (_dir, path, _server, _tx) = start_server().await;
        let mut subscriber = UnixStream::connect(&path).await.unwrap();
        assert_eq!(
            roundtrip(&mut subscriber, &Request::Subscribe).await,
            Response::Subscribed
        );

        let mut client = UnixStream::connect(&path).await.unwrap();
        roundtrip(&mut client, &Request::ChangeState { state: "computer".into() }).await;

        assert_eq!(
            receive(&mut subscriber).await,
            Response::Event {
                event: StateEvent::StateChanged {
                    from: "idle".into(),
                    to: "computer".into()
                }
            }
        );
    }

    #[tokio::test]
    async fn test_bad_request_keeps_connection() {
        let (_dir, path, _server, _tx) = start_server().await;
        let mut stream = UnixStream::connect(&path).await.unwrap();

        write_frame(&mut stream, &json!({ "type": "launch_rockets" })).await.unwrap();
        assert!(matches!(
            receive(&mut stream).await,
            Response::Error { ref code, .. } if code == "bad_request"
        ));
        assert_eq!(roundtrip(&mut stream, &Request::Ping).await, Response::Pong);
    }
}
