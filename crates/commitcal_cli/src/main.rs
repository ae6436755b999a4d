//! Commitcal CLI - command-line interface for the commit calendar cache.

mod commands;
mod config;
mod progress;
mod shutdown;

use std::path::PathBuf;

#[cfg(feature = "github")]
use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand};
use console::Term;
use tracing_subscriber::EnvFilter;

use crate::commands::shared::OutputFormat;

#[derive(Parser)]
#[command(name = "commitcal")]
#[command(version)]
#[command(about = "Commit history cache for calendar views")]
#[command(
    long_about = "Commitcal pulls commit history of your tracked GitHub repositories into a \
local cache, window by window, and serves calendar ranges from it. Repositories synced \
recently are answered from the cache without touching the API."
)]
#[command(after_long_help = r#"EXAMPLES
    Track a repository and sync the last year:
        $ commitcal repos add rust-lang/rust
        $ commitcal sync

    Register every repository your token can see:
        $ commitcal repos discover

    Sync a specific range, ignoring freshness:
        $ commitcal sync --since 2024-01-01 --until 2024-03-31 --force

    Extend cached history further back:
        $ commitcal backfill --since 2022-01-01

    Generate shell completions:
        $ commitcal completions bash > ~/.local/share/bash-completion/completions/commitcal

CONFIGURATION
    Commitcal reads configuration from:
      1. ~/.config/commitcal/config.toml (or $XDG_CONFIG_HOME/commitcal/config.toml)
      2. ./commitcal.toml
      3. Environment variables (COMMITCAL_* prefix, nested keys with __,
         e.g., COMMITCAL_SYNC__TTL_MINUTES)
      4. .env file in current directory

ENVIRONMENT VARIABLES
    COMMITCAL_DATABASE_URL    Database connection string (default: ~/.local/state/commitcal/commitcal.db)
    COMMITCAL_GITHUB_TOKEN    GitHub personal access token
    COMMITCAL_USER_ID         User whose repositories are synced (default: local)
"#)]
struct Cli {
    /// User whose repositories to work on (default from config or "local")
    #[arg(short, long, global = true)]
    user: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate {
        #[command(subcommand)]
        action: MigrateAction,
    },
    /// Manage tracked repositories
    Repos {
        #[command(subcommand)]
        action: ReposAction,
    },
    /// Sync commits of tracked repositories for a date range
    #[cfg(feature = "github")]
    Sync(SyncArgs),
    /// Fetch history older than what is cached
    #[cfg(feature = "github")]
    Backfill(BackfillArgs),
    /// Show cache statistics
    Status {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Manage the GitHub token
    Token {
        #[command(subcommand)]
        action: TokenAction,
    },
    /// Generate shell completion scripts
    Completions {
        /// Shell to generate completions for
        shell: clap_complete::Shell,
    },
    /// Generate man page(s)
    Man {
        /// Output directory for man pages (prints to stdout if not specified)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
}

#[derive(Subcommand)]
enum MigrateAction {
    /// Apply all pending migrations
    Up,
    /// Rollback the last migration
    Down,
    /// Show migration status
    Status,
    /// Fresh install - drop all tables and reapply migrations
    Fresh,
}

#[derive(Subcommand)]
enum ReposAction {
    /// Track repositories
    Add {
        /// Repositories as owner/name - can specify multiple
        #[arg(required = true)]
        repos: Vec<String>,

        /// Track without including them in syncs
        #[arg(long)]
        disabled: bool,
    },
    /// Track every repository the configured token can see
    #[cfg(feature = "github")]
    Discover,
    /// List tracked repositories
    List {
        /// Output format
        #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
        output: OutputFormat,
    },
    /// Include a repository in syncs
    Enable {
        /// Repository as owner/name
        repo: String,
    },
    /// Exclude a repository from syncs, keeping its cached commits
    Disable {
        /// Repository as owner/name
        repo: String,
    },
    /// Stop tracking a repository and delete its cached commits
    Remove {
        /// Repository as owner/name
        repo: String,
    },
}

#[derive(Subcommand)]
enum TokenAction {
    /// Save a GitHub token to the config file (prompts when omitted)
    Set {
        /// Personal access token
        token: Option<String>,
    },
    /// Show whether a token is configured
    Status,
}

/// Sync tuning shared by sync and backfill (defaults from config).
#[cfg(feature = "github")]
#[derive(Debug, Clone, clap::Args)]
struct TuningOptions {
    /// Minutes a sync stays fresh (default from config or 30)
    #[arg(short = 't', long)]
    ttl_minutes: Option<i64>,

    /// Repositories fetched concurrently (default from config or 3)
    #[arg(short = 'c', long)]
    concurrency: Option<usize>,

    /// Page cap per time window (default from config or 50)
    #[arg(long)]
    max_pages: Option<u32>,

    /// Commit cap per repository, 0 for none (default from config or 5000)
    #[arg(long)]
    max_commits: Option<usize>,
}

#[cfg(feature = "github")]
#[derive(Debug, Clone, clap::Args)]
struct SyncArgs {
    /// Range start, YYYY-MM-DD or RFC 3339
    #[arg(short = 's', long, value_parser = commands::shared::parse_start_date, conflicts_with = "months_back")]
    since: Option<DateTime<Utc>>,

    /// Range end, YYYY-MM-DD or RFC 3339 (default: now)
    #[arg(long, value_parser = commands::shared::parse_end_date)]
    until: Option<DateTime<Utc>>,

    /// Sync this many months back from the range end (default from config or 12)
    #[arg(short = 'm', long)]
    months_back: Option<u32>,

    /// Refetch every repository regardless of freshness
    #[arg(short = 'f', long)]
    force: bool,

    /// Print the commits in range
    #[arg(long)]
    commits: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    #[command(flatten)]
    tuning: TuningOptions,
}

#[cfg(feature = "github")]
#[derive(Debug, Clone, clap::Args)]
struct BackfillArgs {
    /// Extend history back to this date, YYYY-MM-DD or RFC 3339
    #[arg(short = 's', long, value_parser = commands::shared::parse_start_date)]
    since: DateTime<Utc>,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Table)]
    output: OutputFormat,

    #[command(flatten)]
    tuning: TuningOptions,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    // Structured logging only when not attached to a TTY; a TTY gets progress bars.
    if !Term::stdout().is_term() {
        let env_filter = match EnvFilter::try_from_default_env() {
            Ok(filter) => filter,
            Err(_) => EnvFilter::new("commitcal=info,commitcal_cli=info"),
        };

        tracing_subscriber::fmt()
            .with_env_filter(env_filter)
            .with_target(false)
            .init();
    }

    // Load configuration (config file -> env vars -> defaults)
    let config = config::Config::load();

    let cli = Cli::parse();

    // Handle commands that don't require database access first
    match cli.command {
        Commands::Completions { shell } => {
            commands::meta::handle_completions(shell)?;
            return Ok(());
        }
        Commands::Man { output } => {
            commands::meta::handle_man(output)?;
            return Ok(());
        }
        Commands::Token { action } => {
            commands::token::handle_token(action, &config)?;
            return Ok(());
        }
        _ => {}
    }

    let database_url = config
        .database_url()
        .ok_or("Could not determine a database location; set COMMITCAL_DATABASE_URL")?;
    prepare_sqlite_dir(&database_url)?;

    let cancel = shutdown::setup_shutdown_handler();
    let user_id = commands::shared::user_id(cli.user, &config);

    match cli.command {
        Commands::Migrate { action } => {
            commands::migrate::handle_migrate(action, &database_url).await?;
        }
        Commands::Repos { action } => {
            commands::repos::handle_repos(action, &config, &database_url, &user_id, &cancel)
                .await?;
        }
        #[cfg(feature = "github")]
        Commands::Sync(args) => {
            commands::sync::handle_sync(args, &config, &database_url, &user_id, &cancel).await?;
        }
        #[cfg(feature = "github")]
        Commands::Backfill(args) => {
            commands::sync::handle_backfill(args, &config, &database_url, &user_id, &cancel)
                .await?;
        }
        Commands::Status { output } => {
            commands::status::handle_status(output, &database_url, &user_id).await?;
        }
        Commands::Token { .. } | Commands::Completions { .. } | Commands::Man { .. } => {}
    }

    Ok(())
}

/// Create the parent directory of a file-backed SQLite database.
fn prepare_sqlite_dir(database_url: &str) -> std::io::Result<()> {
    let Some(db_path) = database_url.strip_prefix("sqlite://") else {
        return Ok(());
    };
    // Strip query parameters (e.g., ?mode=rwc) before path operations
    let db_path = db_path.split('?').next().unwrap_or(db_path);
    let db_path = std::path::Path::new(db_path);

    if db_path.is_relative() && !db_path.as_os_str().is_empty() {
        tracing::warn!(
            "Database path '{}' is relative - behavior depends on current directory. \
             Consider using an absolute path.",
            db_path.display()
        );
    }

    if let Some(parent) = db_path.parent()
        && !parent.as_os_str().is_empty()
    {
        std::fs::create_dir_all(parent)?;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn repos_add_accepts_several_names() {
        let cli = Cli::try_parse_from(["commitcal", "repos", "add", "a/x", "b/y", "--disabled"])
            .expect("parses");
        match cli.command {
            Commands::Repos {
                action: ReposAction::Add { repos, disabled },
            } => {
                assert_eq!(repos, vec!["a/x", "b/y"]);
                assert!(disabled);
            }
            _ => panic!("expected repos add"),
        }
    }

    #[cfg(feature = "github")]
    #[test]
    fn sync_rejects_since_with_months_back() {
        let result = Cli::try_parse_from([
            "commitcal",
            "sync",
            "--since",
            "2024-01-01",
            "--months-back",
            "3",
        ]);
        assert!(result.is_err());
    }

    #[cfg(feature = "github")]
    #[test]
    fn sync_parses_dates_and_tuning() {
        let cli = Cli::try_parse_from([
            "commitcal",
            "--user",
            "alice",
            "sync",
            "--since",
            "2024-01-01",
            "--force",
            "--max-commits",
            "0",
        ])
        .expect("parses");

        assert_eq!(cli.user.as_deref(), Some("alice"));
        match cli.command {
            Commands::Sync(args) => {
                assert!(args.force);
                assert_eq!(
                    args.since.map(|d| d.to_rfc3339()).as_deref(),
                    Some("2024-01-01T00:00:00+00:00")
                );
                assert_eq!(args.tuning.max_commits, Some(0));
            }
            _ => panic!("expected sync"),
        }
    }

    #[test]
    fn prepare_sqlite_dir_ignores_other_schemes() {
        assert!(prepare_sqlite_dir("postgres://localhost/cal").is_ok());
        assert!(prepare_sqlite_dir("sqlite::memory:").is_ok());
    }
}
