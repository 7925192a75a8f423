//! Daemon lifecycle and the IPC server loop
//!
//! `taskdeck daemon start` forks to the background, becomes a session
//! leader, and re-execs itself as `taskdeck daemon run` so the daemon
//! process starts from a clean slate. The daemon owns the SQLite store
//! and serves newline-delimited JSON requests over a Unix socket.

use std::fs::{self, File};
use std::os::fd::AsRawFd;
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{Context, Result};
use nix::unistd::{fork, setsid, ForkResult};
use serde_json::json;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};
use tokio::net::{UnixListener, UnixStream};

use taskdeck_ipc::{Client, Request, RequestOp, Response};
use taskdeck_store::{NewTask, Store, TaskUpdate};

use crate::config::{self, Config};
use crate::pid::{self, PidInfo};

pub struct Daemon {
    config: Config,
    socket_path: PathBuf,
    pid_path: PathBuf,
}

impl Daemon {
    /// Create a new daemon instance, refusing if one is already running
    pub fn new() -> Result<Self> {
        let config = config::load_config()?;
        let socket_path = config::get_socket_path(&config)?;
        let pid_path = config::get_pid_file(&config)?;

        if let Some(info) = pid::check_daemon(&pid_path)? {
            anyhow::bail!(
                "Daemon already running (PID: {}, started: {})",
                info.pid,
                info.started_at
            );
        }

        Ok(Self {
            config,
            socket_path,
            pid_path,
        })
    }

    /// Start the daemon (forks to background and re-execs to avoid macOS
    /// fork issues)
    pub fn start(self) -> Result<()> {
        // Ensure config directory exists before forking
        if let Some(parent) = self.socket_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        match unsafe { fork() } {
            Ok(ForkResult::Parent { child }) => {
                println!("Daemon started (PID: {})", child);
                return Ok(());
            }
            Ok(ForkResult::Child) => {
                // Continue in child process
            }
            Err(e) => {
                anyhow::bail!("Fork failed: {}", e);
            }
        }

        // Child process: become session leader
        setsid().context("Failed to create new session")?;

        // Re-exec ourselves with daemon run to get a clean process
        let exe = std::env::current_exe()?;
        let exe_str = exe.to_string_lossy().to_string();
        let err = exec::execvp(&exe_str, &[&exe_str, "daemon", "run"]);
        anyhow::bail!("Failed to exec daemon: {}", err);
    }

    /// Run the daemon directly (called after re-exec)
    pub fn run_foreground() -> Result<()> {
        // Detach from the terminal, then route output to the log file
        let dev_null = File::open("/dev/null")?;
        let null_fd = dev_null.as_raw_fd();
        unsafe {
            libc::dup2(null_fd, 0);
            libc::dup2(null_fd, 1);
            libc::dup2(null_fd, 2);
        }

        let log_path = config::get_config_dir().ok().map(|d| d.join("daemon.log"));
        if let Some(ref path) = log_path {
            if let Ok(file) = File::create(path) {
                let file_fd = file.as_raw_fd();
                unsafe {
                    libc::dup2(file_fd, 1);
                    libc::dup2(file_fd, 2);
                }
            }
        }

        // Logging lands in the daemon.log file via the redirected fds
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::from_default_env()
                    .add_directive(tracing::Level::INFO.into()),
            )
            .init();

        let config = config::load_config()?;
        let socket_path = config::get_socket_path(&config)?;
        let pid_path = config::get_pid_file(&config)?;

        let daemon = Self {
            config,
            socket_path,
            pid_path,
        };

        let rt = tokio::runtime::Runtime::new()?;
        rt.block_on(daemon.run_daemon())
    }

    /// Main daemon loop
    async fn run_daemon(self) -> Result<()> {
        ensure_socket_free(&self.socket_path).await?;

        let db_path = config::get_db_path(&self.config)?;
        if let Some(parent) = db_path.parent() {
            if !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        tracing::info!("Opening database at {}", db_path.display());
        let store = Arc::new(
            Store::open(&db_path)
                .with_context(|| format!("Failed to open database: {}", db_path.display()))?,
        );

        let listener = UnixListener::bind(&self.socket_path)
            .with_context(|| format!("Failed to bind socket: {}", self.socket_path.display()))?;

        tracing::info!("Daemon listening on {}", self.socket_path.display());

        let pid_info = PidInfo::new(process::id(), &self.socket_path);
        pid_info.write(&self.pid_path)?;

        let result = self.run_server(listener, store).await;

        self.cleanup();
        result
    }

    /// Accept and handle connections until a shutdown signal arrives
    async fn run_server(&self, listener: UnixListener, store: Arc<Store>) -> Result<()> {
        let mut sigterm =
            tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())?;

        loop {
            tokio::select! {
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, _addr)) => {
                            let store = Arc::clone(&store);
                            tokio::spawn(async move {
                                if let Err(e) = handle_connection(stream, store).await {
                                    tracing::error!("Connection error: {}", e);
                                }
                            });
                        }
                        Err(e) => {
                            tracing::error!("Accept error: {}", e);
                        }
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    tracing::info!("Received interrupt, shutting down");
                    break;
                }
                _ = sigterm.recv() => {
                    tracing::info!("Received SIGTERM, shutting down");
                    break;
                }
            }
        }
        Ok(())
    }

    /// Clean up the socket and PID file on shutdown
    fn cleanup(&self) {
        if let Err(e) = pid::remove_pid_file(&self.pid_path) {
            tracing::error!("Failed to remove PID file: {}", e);
        }
        if self.socket_path.exists() {
            if let Err(e) = fs::remove_file(&self.socket_path) {
                tracing::error!("Failed to remove socket file: {}", e);
            }
        }
    }
}

/// Probe an existing socket file before claiming its path. If something
/// answers, another daemon owns it and startup must fail; a dead socket
/// file is removed.
async fn ensure_socket_free(socket_path: &Path) -> Result<()> {
    if !socket_path.exists() {
        return Ok(());
    }

    let probe = Client::new(socket_path);
    if probe.ping().await? {
        anyhow::bail!(
            "Socket {} is already in use by a running daemon",
            socket_path.display()
        );
    }

    tracing::debug!("Removing stale socket file {}", socket_path.display());
    fs::remove_file(socket_path)
        .with_context(|| format!("Failed to remove stale socket: {}", socket_path.display()))?;
    Ok(())
}

/// Serve one connection: requests are answered in order, line by line.
/// A malformed line gets an error response and the connection stays open.
async fn handle_connection(stream: UnixStream, store: Arc<Store>) -> Result<()> {
    let (reader, mut writer) = stream.into_split();
    let mut reader = BufReader::new(reader);
    let mut line = String::new();

    loop {
        line.clear();
        let bytes_read = reader.read_line(&mut line).await?;
        if bytes_read == 0 {
            break;
        }

        let value: serde_json::Value = match serde_json::from_str(line.trim()) {
            Ok(v) => v,
            Err(e) => {
                let response = Response::error(format!("Invalid JSON: {}", e));
                writer.write_all(response.to_line()?.as_bytes()).await?;
                continue;
            }
        };

        // Pull the correlation id out before the strict parse so even a
        // bad request echoes it back.
        let request_id = value
            .get("request_id")
            .and_then(|v| v.as_str())
            .map(String::from);

        let request: Request = match serde_json::from_value(value) {
            Ok(req) => req,
            Err(e) => {
                let response = Response::error(format!("Invalid request: {}", e))
                    .with_request_id(request_id);
                writer.write_all(response.to_line()?.as_bytes()).await?;
                continue;
            }
        };

        let response = handle_request(request, &store);
        writer.write_all(response.to_line()?.as_bytes()).await?;
    }

    Ok(())
}

/// Handle a single request
fn handle_request(request: Request, store: &Store) -> Response {
    let start = Instant::now();
    let result = dispatch(&request.op, store);
    let elapsed_ms = start.elapsed().as_millis();

    if elapsed_ms > 100 {
        tracing::warn!(op = ?request.op, elapsed_ms = %elapsed_ms, "Slow request");
    } else {
        tracing::debug!(op = ?request.op, elapsed_ms = %elapsed_ms, "Request completed");
    }

    let response = match result {
        Ok(value) => Response::success(value)
            .unwrap_or_else(|e| Response::error(format!("Serialization error: {}", e))),
        Err(err) => Response::error(err.to_string()),
    };
    response.with_request_id(request.request_id)
}

/// Dispatch a request to the store
fn dispatch(op: &RequestOp, store: &Store) -> taskdeck_store::Result<serde_json::Value> {
    match op {
        RequestOp::Ping => Ok(json!({"pong": true, "pid": process::id()})),

        RequestOp::BoardsList { include_archived } => {
            Ok(json!({"boards": store.list_boards(*include_archived)?}))
        }
        RequestOp::BoardsGet { id } => Ok(json!({"board": store.get_board(*id)?})),
        RequestOp::BoardsCreate { name, description } => Ok(json!({
            "board": store.create_board(name, description.as_deref().unwrap_or(""))?
        })),
        RequestOp::BoardsUpdate {
            id,
            name,
            description,
            archived,
        } => {
            if name.is_some() || description.is_some() {
                store.update_board(*id, name.as_deref(), description.as_deref())?;
            }
            if let Some(archived) = archived {
                store.archive_board(*id, *archived)?;
            }
            Ok(json!({"board": store.get_board(*id)?}))
        }
        RequestOp::BoardsDelete { id } => {
            store.delete_board(*id)?;
            Ok(json!({"deleted": true}))
        }

        RequestOp::TasksList {
            board_id,
            status,
            include_archived,
        } => Ok(json!({
            "tasks": store.list_tasks(*board_id, *status, *include_archived)?
        })),
        RequestOp::TasksGet { id } => Ok(json!({"task": store.get_task(*id)?})),
        RequestOp::TasksCreate {
            board_id,
            title,
            description,
            status,
            priority,
            due_date,
        } => {
            let mut new = NewTask::new(*board_id, title.clone());
            if let Some(description) = description {
                new = new.with_description(description.clone());
            }
            if let Some(status) = status {
                new = new.with_status(*status);
            }
            if let Some(priority) = priority {
                new = new.with_priority(*priority);
            }
            if let Some(due_date) = due_date {
                new = new.with_due_date(*due_date);
            }
            Ok(json!({"task": store.create_task(new)?}))
        }
        RequestOp::TasksUpdate {
            id,
            title,
            description,
            status,
            priority,
            due_date,
            archived,
        } => {
            let update = TaskUpdate {
                title: title.clone(),
                description: description.clone(),
                status: *status,
                priority: *priority,
                due_date: *due_date,
                position: None,
                archived: *archived,
            };
            Ok(json!({"task": store.update_task(*id, update)?}))
        }
        RequestOp::TasksDelete { id } => {
            store.delete_task(*id)?;
            Ok(json!({"deleted": true}))
        }
        RequestOp::TasksMove {
            id,
            status,
            position,
        } => Ok(json!({"task": store.move_task(*id, *status, *position)?})),
    }
}

pub async fn stop_daemon() -> Result<()> {
    let config = config::load_config()?;
    let pid_path = config::get_pid_file(&config)?;

    let info = match pid::check_daemon(&pid_path)? {
        Some(info) => info,
        None => {
            println!("Daemon is not running");
            return Ok(());
        }
    };

    println!("Stopping daemon (PID: {})...", info.pid);
    pid::send_sigterm(info.pid)?;

    for _ in 0..50 {
        if !pid::is_process_running(info.pid) {
            println!("Daemon stopped");
            let _ = pid::remove_pid_file(&pid_path);
            let socket_path = config::get_socket_path(&config)?;
            if socket_path.exists() {
                let _ = fs::remove_file(&socket_path);
            }
            return Ok(());
        }
        tokio::time::sleep(Duration::from_millis(100)).await;
    }

    anyhow::bail!("Daemon did not stop within 5 seconds")
}

/// Check and display daemon status
pub fn daemon_status() -> Result<()> {
    let config = config::load_config()?;
    let pid_path = config::get_pid_file(&config)?;

    match pid::check_daemon(&pid_path)? {
        Some(info) => {
            let running_version = &info.version;
            let cli_version = env!("CARGO_PKG_VERSION");

            println!("Daemon status: running");
            println!("  PID: {}", info.pid);
            println!("  Version: {}", running_version);
            println!("  Socket: {}", info.socket);
            println!("  Started: {}", info.started_at);

            if running_version != cli_version {
                println!();
                println!(
                    "Warning: Daemon version ({}) differs from CLI version ({})",
                    running_version, cli_version
                );
                println!("Consider running: taskdeck daemon restart");
            }
        }
        None => {
            println!("Daemon status: not running");
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use taskdeck_store::TaskStatus;

    fn spawn_server(socket_path: &Path) -> Arc<Store> {
        let store = Arc::new(Store::memory().unwrap());
        let listener = UnixListener::bind(socket_path).unwrap();
        let server_store = Arc::clone(&store);
        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let store = Arc::clone(&server_store);
                tokio::spawn(async move {
                    let _ = handle_connection(stream, store).await;
                });
            }
        });
        store
    }

    #[test]
    fn dispatch_creates_and_lists_boards() {
        let store = Store::memory().unwrap();
        let created = dispatch(
            &RequestOp::BoardsCreate {
                name: "Work".into(),
                description: None,
            },
            &store,
        )
        .unwrap();
        assert_eq!(created["board"]["name"], "Work");

        let listed = dispatch(
            &RequestOp::BoardsList {
                include_archived: false,
            },
            &store,
        )
        .unwrap();
        assert_eq!(listed["boards"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn dispatch_move_on_missing_task_uses_the_not_found_string() {
        let store = Store::memory().unwrap();
        let err = dispatch(
            &RequestOp::TasksMove {
                id: 5,
                status: TaskStatus::Done,
                position: None,
            },
            &store,
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "Task not found: 5");
    }

    #[test]
    fn dispatch_update_can_archive_a_task() {
        let store = Store::memory().unwrap();
        let board = store.create_board("Work", "").unwrap();
        let task = store.create_task(NewTask::new(board.id, "a")).unwrap();

        let updated = dispatch(
            &RequestOp::TasksUpdate {
                id: task.id,
                title: None,
                description: None,
                status: None,
                priority: None,
                due_date: None,
                archived: Some(true),
            },
            &store,
        )
        .unwrap();
        assert_eq!(updated["task"]["archived"], true);
    }

    #[test]
    fn handle_request_echoes_the_request_id() {
        let store = Store::memory().unwrap();
        let request = Request {
            request_id: Some("req-1".into()),
            op: RequestOp::Ping,
        };
        let response = handle_request(request, &store);
        assert!(response.ok);
        assert_eq!(response.request_id.as_deref(), Some("req-1"));
    }

    #[tokio::test]
    async fn client_ping_round_trips_over_the_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        spawn_server(&sock);

        let client = Client::new(&sock);
        assert!(client.ping().await.unwrap());
    }

    #[tokio::test]
    async fn not_found_error_reaches_the_client_verbatim() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        spawn_server(&sock);

        let client = Client::new(&sock);
        let err = client
            .request(RequestOp::TasksMove {
                id: 5,
                status: TaskStatus::Done,
                position: None,
            })
            .await
            .unwrap_err();
        assert_eq!(err.to_string(), "Task not found: 5");
    }

    #[tokio::test]
    async fn malformed_line_keeps_the_connection_open() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        spawn_server(&sock);

        let stream = UnixStream::connect(&sock).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer
            .write_all(b"not json\n{\"type\":\"ping\"}\n")
            .await
            .unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.contains("Invalid JSON"));

        line.clear();
        reader.read_line(&mut line).await.unwrap();
        assert!(line.contains("pong"));
    }

    #[tokio::test]
    async fn unknown_type_names_the_type_in_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        spawn_server(&sock);

        let stream = UnixStream::connect(&sock).await.unwrap();
        let (reader, mut writer) = stream.into_split();
        let mut reader = BufReader::new(reader);

        writer
            .write_all(b"{\"type\":\"tasks:frobnicate\",\"request_id\":\"r9\"}\n")
            .await
            .unwrap();

        let mut line = String::new();
        reader.read_line(&mut line).await.unwrap();
        let response: Response = serde_json::from_str(&line).unwrap();
        assert!(!response.ok);
        assert!(response.error.unwrap().contains("tasks:frobnicate"));
        assert_eq!(response.request_id.as_deref(), Some("r9"));
    }

    #[tokio::test]
    async fn startup_refuses_to_steal_an_answering_socket() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");
        spawn_server(&sock);

        let err = ensure_socket_free(&sock).await.unwrap_err();
        assert!(err.to_string().contains("already in use"));
        assert!(sock.exists());
    }

    #[tokio::test]
    async fn startup_removes_a_dead_socket_file() {
        let dir = tempfile::tempdir().unwrap();
        let sock = dir.path().join("t.sock");

        // Bind and immediately drop the listener; the file stays behind.
        drop(UnixListener::bind(&sock).unwrap());
        assert!(sock.exists());

        ensure_socket_free(&sock).await.unwrap();
        assert!(!sock.exists());
    }
}
