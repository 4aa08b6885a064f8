mod commands;

use clap::{Parser, Subcommand};
use oscar::config::{load_config, Overrides};

#[derive(Parser)]
#[command(name = "oscar", version, about = "Natural-language automation with human confirmation")]
struct Cli {
    /// Simulate every step instead of running it
    #[arg(long, global = true)]
    dry_run: bool,

    /// Verbose logging
    #[arg(long, global = true)]
    debug: bool,

    /// Skip the password gate and the shell's own pattern blocking
    #[arg(long = "unsafe", global = true)]
    disable_safe_mode: bool,

    /// Validate configuration and exit
    #[arg(long)]
    config_check: bool,

    #[command(subcommand)]
    command: Option<Cmd>,
}

#[derive(Subcommand)]
enum Cmd {
    /// Plan, confirm and run a single request
    Ask {
        #[arg(required = true, trailing_var_arg = true)]
        request: Vec<String>,
    },
    /// Check planner, tools and audit log
    Doctor,
    /// Open the config file in $EDITOR
    Config,
    /// Show recent audit entries
    Audit {
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,
    },
}

fn main() {
    let cli = Cli::parse();
    let overrides = Overrides {
        dry_run: cli.dry_run,
        debug: cli.debug,
        disable_safe_mode: cli.disable_safe_mode,
    };
    oscar::logging::init(overrides.debug_enabled());
    let config = load_config().resolve(&overrides);

    let result = if cli.config_check {
        commands::cmd_config_check(&config)
    } else {
        match cli.command {
            Some(Cmd::Ask { request }) => commands::cmd_ask(&config, &request.join(" ")),
            Some(Cmd::Doctor) => commands::cmd_doctor(&config),
            Some(Cmd::Config) => commands::cmd_config(),
            Some(Cmd::Audit { limit }) => commands::cmd_audit(&config, limit),
            None => commands::cmd_interactive(&config),
        }
    };

    if let Err(e) = result {
        eprintln!("oscar: {}", e);
        std::process::exit(1);
    }
}
