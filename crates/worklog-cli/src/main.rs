use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;
use worklog_core::UserId;

mod commands;

#[derive(Parser)]
#[command(name = "worklog", version, about = "Worklog CLI")]
struct Cli {
    /// Chat id of the acting user
    #[arg(long, global = true, env = "WORKLOG_USER", default_value_t = 1)]
    user: i64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Timer control
    Timer {
        #[command(subcommand)]
        action: commands::timer::TimerAction,
    },
    /// Daily statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Submit today's timers to the CRM
    Report,
    /// Account linkage
    Account {
        #[command(subcommand)]
        action: commands::account::AccountAction,
    },
    /// CRM authentication management
    Auth {
        #[command(subcommand)]
        action: commands::auth::AuthAction,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

fn main() {
    init_logging();
    let cli = Cli::parse();
    let user = UserId(cli.user);
    let result = match cli.command {
        Commands::Timer { action } => commands::timer::run(action, user),
        Commands::Stats { action } => commands::stats::run(action, user),
        Commands::Report => commands::report::run(user),
        Commands::Account { action } => commands::account::run(action, user),
        Commands::Auth { action } => commands::auth::run(action),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
