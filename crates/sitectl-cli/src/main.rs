mod cmd;
mod logging;
mod output;
mod root;

use clap::{Parser, Subcommand};
use cmd::{config::ConfigSubcommand, plugin::PluginSubcommand, run::RunOptions};
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "sitectl",
    about = "Drive a WordPress/WooCommerce site from plain-text commands",
    version,
    propagate_version = true
)]
struct Cli {
    /// Project root (default: auto-detect from .sitectl/ or .git/)
    #[arg(long, global = true, env = "SITECTL_ROOT")]
    root: Option<PathBuf>,

    /// Output as JSON
    #[arg(long, global = true, short = 'j')]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create .sitectl/config.yaml in the current project
    Init {
        /// Public URL of the WordPress site
        #[arg(long, default_value = "https://youtuneai.com")]
        site_url: String,

        /// Overwrite an existing config
        #[arg(long)]
        force: bool,
    },

    /// Execute one command, e.g. `sitectl run add product guitar lessons for $19.99`
    Run {
        /// The command text
        #[arg(required = true, trailing_var_arg = true)]
        text: Vec<String>,

        #[command(flatten)]
        options: RunOptions,
    },

    /// Read commands from stdin until `exit`, `quit` or EOF
    Shell {
        #[command(flatten)]
        options: RunOptions,
    },

    /// Upload theme files to the server as they change
    Watch {
        /// Directory to watch (default: theme.local_dir)
        #[arg(long)]
        dir: Option<PathBuf>,

        /// Stop after this many seconds
        #[arg(long = "for", value_name = "SECS")]
        duration: Option<u64>,
    },

    /// Upload theme files
    Deploy {
        /// Theme-relative files (default: theme.deploy_files)
        files: Vec<String>,

        /// Upload every file in the theme directory
        #[arg(long, conflicts_with = "files")]
        all: bool,

        /// Back up, upload, harden and validate, rolling back on failure
        #[arg(long)]
        release: bool,
    },

    /// Check which REST endpoints the site exposes
    Status {
        /// Also connect over SFTP and list the remote theme directory
        #[arg(long)]
        sftp: bool,
    },

    /// Check the configured REST credentials
    Whoami,

    /// Check public pages for required legal notices
    Audit {
        /// Write the report to .sitectl/reports/
        #[arg(long)]
        save: bool,
    },

    /// List and install WordPress plugins
    Plugin {
        #[command(subcommand)]
        subcommand: PluginSubcommand,
    },

    /// Show recently executed commands
    History {
        #[arg(long, short = 'n', default_value = "20")]
        limit: usize,
    },

    /// Show or validate the project configuration
    Config {
        #[command(subcommand)]
        subcommand: ConfigSubcommand,
    },
}

fn main() {
    let cli = Cli::parse();

    let default_level = match &cli.command {
        Commands::Watch { .. } | Commands::Shell { .. } => tracing::Level::INFO,
        _ => tracing::Level::WARN,
    };

    logging::init(default_level);

    let root = root::resolve_root(cli.root.as_deref());
    root::load_env_files(&root);

    let result = match cli.command {
        Commands::Init { site_url, force } => cmd::init::run(&root, &site_url, force),
        Commands::Run { text, options } => cmd::run::run(&root, &text.join(" "), &options, cli.json),
        Commands::Shell { options } => cmd::shell::run(&root, &options, cli.json),
        Commands::Watch { dir, duration } => cmd::watch::run(&root, dir, duration, cli.json),
        Commands::Deploy {
            files,
            all,
            release,
        } => cmd::deploy::run(&root, files, all, release, cli.json),
        Commands::Status { sftp } => cmd::status::run(&root, sftp, cli.json),
        Commands::Whoami => cmd::status::whoami(&root, cli.json),
        Commands::Audit { save } => cmd::audit::run(&root, save, cli.json),
        Commands::Plugin { subcommand } => cmd::plugin::run(&root, subcommand, cli.json),
        Commands::History { limit } => cmd::history::run(&root, limit, cli.json),
        Commands::Config { subcommand } => cmd::config::run(&root, subcommand, cli.json),
    };

    if let Err(e) = result {
        let secrets = sitectl_core::config::Secrets::from_env();
        eprintln!("error: {}", secrets.redact(&format!("{e:#}")));
        std::process::exit(1);
    }
}
