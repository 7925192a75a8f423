mod commands;
mod completions;
mod config;
mod daemon;
mod pid;

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};

use taskdeck_store::{Priority, TaskStatus};

use commands::Backend;

#[derive(Parser)]
#[command(name = "taskdeck")]
#[command(about = "A local kanban task tracker for the terminal")]
#[command(version)]
pub struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List boards with task counts
    #[command(display_order = 1)]
    Boards,
    /// Board management
    #[command(display_order = 2)]
    Board {
        #[command(subcommand)]
        action: BoardAction,
    },
    /// List tasks
    #[command(display_order = 3)]
    List {
        /// Filter by board
        #[arg(short, long)]
        board: Option<i64>,
        /// Filter by status (todo|doing|done)
        #[arg(short, long)]
        status: Option<TaskStatus>,
        /// Include archived tasks
        #[arg(long)]
        archived: bool,
    },
    /// Add a new task
    #[command(display_order = 4)]
    Add {
        title: String,
        /// Board ID (defaults to the oldest board)
        #[arg(short, long)]
        board: Option<i64>,
        /// Task description
        #[arg(short, long)]
        description: Option<String>,
        /// Priority (low|medium|high|urgent)
        #[arg(short, long)]
        priority: Option<Priority>,
        /// Due date (YYYY-MM-DD)
        #[arg(long)]
        due: Option<NaiveDate>,
        /// Starting status (defaults to todo)
        #[arg(short, long)]
        status: Option<TaskStatus>,
    },
    /// Move a task to the todo lane
    #[command(display_order = 5)]
    Todo { id: i64 },
    /// Move a task to the doing lane
    #[command(display_order = 6)]
    Doing { id: i64 },
    /// Move a task to the done lane
    #[command(display_order = 7)]
    Done { id: i64 },
    /// Move a task to a lane, optionally at a position
    #[command(display_order = 8)]
    Move {
        id: i64,
        status: TaskStatus,
        /// Insert at this position instead of appending
        #[arg(short, long)]
        position: Option<i64>,
    },
    /// Edit task fields
    #[command(display_order = 9)]
    Edit {
        id: i64,
        #[arg(long)]
        title: Option<String>,
        #[arg(long)]
        description: Option<String>,
        #[arg(long)]
        priority: Option<Priority>,
        /// New due date (YYYY-MM-DD), or "none" to clear it
        #[arg(long)]
        due: Option<String>,
    },
    /// Archive a task
    #[command(display_order = 10)]
    Archive { id: i64 },
    /// Delete a task
    #[command(display_order = 11)]
    Delete { id: i64 },
    /// Attach a tag to a task
    #[command(display_order = 12)]
    Tag { task_id: i64, name: String },
    /// Detach a tag from a task
    #[command(display_order = 13)]
    Untag { task_id: i64, name: String },
    /// Add a comment to a task
    #[command(display_order = 14)]
    Comment { task_id: i64, content: String },
    /// List a task's comments
    #[command(display_order = 15)]
    Comments { task_id: i64 },
    /// Fuzzy-search tasks by title, description, and tags
    #[command(display_order = 16)]
    Search {
        query: String,
        /// Restrict to one board
        #[arg(short, long)]
        board: Option<i64>,
    },
    /// Daemon management
    #[command(display_order = 20)]
    Daemon {
        #[command(subcommand)]
        action: DaemonAction,
    },
    /// Configuration management
    #[command(display_order = 21)]
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
    /// Generate shell completions
    #[command(display_order = 22)]
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
}

#[derive(Subcommand)]
enum BoardAction {
    /// Create a board
    Create {
        name: String,
        #[arg(short, long)]
        description: Option<String>,
    },
    /// Archive a board
    Archive { id: i64 },
    /// Delete a board and everything on it
    Delete { id: i64 },
}

#[derive(Subcommand)]
enum DaemonAction {
    /// Start the daemon
    Start,
    /// Stop the daemon
    Stop,
    /// Check daemon status
    Status,
    /// Restart the daemon
    Restart,
    /// Run daemon in foreground (internal use after fork+exec)
    #[command(hide = true)]
    Run,
}

#[derive(Subcommand)]
enum ConfigAction {
    /// Show current configuration
    Show,
    /// Get a configuration value
    Get { key: String },
    /// Set a configuration value
    Set { key: String, value: String },
    /// Show configuration file path
    Path,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    // Handle completions synchronously
    if let Commands::Completions { shell } = &cli.command {
        completions::generate_completions(*shell);
        return Ok(());
    }

    // Handle daemon start/restart/run synchronously (before any tokio
    // runtime exists) so fork() happens in a single-threaded process
    match &cli.command {
        Commands::Daemon {
            action: DaemonAction::Start,
        } => {
            let daemon = daemon::Daemon::new()?;
            return daemon.start();
        }
        Commands::Daemon {
            action: DaemonAction::Restart,
        } => {
            // Stop needs async, so spin up a runtime and drop it before fork
            let cfg = config::load_config()?;
            let pid_path = config::get_pid_file(&cfg)?;
            if pid::check_daemon(&pid_path)?.is_some() {
                let rt = tokio::runtime::Runtime::new()?;
                rt.block_on(async {
                    daemon::stop_daemon().await?;
                    tokio::time::sleep(std::time::Duration::from_millis(200)).await;
                    Ok::<_, anyhow::Error>(())
                })?;
            }
            let daemon = daemon::Daemon::new()?;
            return daemon.start();
        }
        Commands::Daemon {
            action: DaemonAction::Run,
        } => {
            return daemon::Daemon::run_foreground();
        }
        _ => {}
    }

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async_main(cli.command))
}

async fn async_main(command: Commands) -> Result<()> {
    // Default to WARN for quiet CLI output; RUST_LOG overrides
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cfg = config::load_config()?;

    match command {
        Commands::Boards => {
            let backend = Backend::connect(&cfg).await?;
            commands::boards(&backend).await
        }
        Commands::Board { action } => {
            let backend = Backend::connect(&cfg).await?;
            match action {
                BoardAction::Create { name, description } => {
                    commands::board_create(&backend, &name, description.as_deref().unwrap_or(""))
                        .await
                }
                BoardAction::Archive { id } => commands::board_archive(&backend, id).await,
                BoardAction::Delete { id } => commands::board_delete(&backend, id).await,
            }
        }
        Commands::List {
            board,
            status,
            archived,
        } => {
            let backend = Backend::connect(&cfg).await?;
            commands::list(&backend, board, status, archived).await
        }
        Commands::Add {
            title,
            board,
            description,
            priority,
            due,
            status,
        } => {
            let backend = Backend::connect(&cfg).await?;
            commands::add(&backend, &title, board, description, priority, due, status).await
        }
        Commands::Todo { id } => {
            let backend = Backend::connect(&cfg).await?;
            commands::set_status(&backend, id, TaskStatus::Todo).await
        }
        Commands::Doing { id } => {
            let backend = Backend::connect(&cfg).await?;
            commands::set_status(&backend, id, TaskStatus::Doing).await
        }
        Commands::Done { id } => {
            let backend = Backend::connect(&cfg).await?;
            commands::set_status(&backend, id, TaskStatus::Done).await
        }
        Commands::Move {
            id,
            status,
            position,
        } => {
            let backend = Backend::connect(&cfg).await?;
            commands::move_task(&backend, id, status, position).await
        }
        Commands::Edit {
            id,
            title,
            description,
            priority,
            due,
        } => {
            let backend = Backend::connect(&cfg).await?;
            commands::edit(&backend, id, title, description, priority, due).await
        }
        Commands::Archive { id } => {
            let backend = Backend::connect(&cfg).await?;
            commands::archive(&backend, id).await
        }
        Commands::Delete { id } => {
            let backend = Backend::connect(&cfg).await?;
            commands::delete(&backend, id).await
        }
        Commands::Tag { task_id, name } => {
            let store = commands::open_store(&cfg)?;
            commands::tag(&store, task_id, &name)
        }
        Commands::Untag { task_id, name } => {
            let store = commands::open_store(&cfg)?;
            commands::untag(&store, task_id, &name)
        }
        Commands::Comment { task_id, content } => {
            let store = commands::open_store(&cfg)?;
            commands::comment(&store, task_id, &content)
        }
        Commands::Comments { task_id } => {
            let store = commands::open_store(&cfg)?;
            commands::comments(&store, task_id)
        }
        Commands::Search { query, board } => {
            let store = commands::open_store(&cfg)?;
            commands::search(&store, &query, board)
        }
        Commands::Daemon { action } => match action {
            DaemonAction::Stop => daemon::stop_daemon().await,
            DaemonAction::Status => daemon::daemon_status(),
            DaemonAction::Start | DaemonAction::Restart | DaemonAction::Run => {
                unreachable!("Handled in main()")
            }
        },
        Commands::Config { action } => handle_config(action),
        Commands::Completions { .. } => unreachable!("Handled in main()"),
    }
}

fn handle_config(action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let cfg = config::load_config()?;
            let toml_str = toml::to_string_pretty(&cfg)?;
            println!("{}", toml_str);
            Ok(())
        }
        ConfigAction::Get { key } => {
            let cfg = config::load_config()?;
            match config::get_config_value(&cfg, &key) {
                Some(value) => println!("{}", value),
                None => {
                    let valid_keys = [
                        "daemon.enabled",
                        "daemon.socket_path",
                        "daemon.pid_file",
                        "database.path",
                    ];
                    if valid_keys.contains(&key.as_str()) {
                        println!("(not set)");
                    } else {
                        anyhow::bail!("Unknown config key: {}", key);
                    }
                }
            }
            Ok(())
        }
        ConfigAction::Set { key, value } => {
            let mut cfg = config::load_config()?;
            config::set_config_value(&mut cfg, &key, &value)?;
            config::save_config(&cfg)?;
            println!("Set {} = {}", key, value);
            Ok(())
        }
        ConfigAction::Path => {
            let path = config::get_config_file()?;
            println!("{}", path.display());
            Ok(())
        }
    }
}
