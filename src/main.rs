use clap::{Arg, ArgAction, ArgMatches, Command};
use tracing::info;

use cmdpal::cli::Cli;
use cmdpal::config::Config;
use cmdpal::server;

fn goal_from(matches: &ArgMatches) -> String {
    matches
        .get_many::<String>("goal")
        .unwrap_or_default()
        .map(String::as_str)
        .collect::<Vec<_>>()
        .join(" ")
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt::init();

    let matches = Command::new("ai")
        .about("AI-assisted terminal command palette")
        .long_about(
            "ai turns a natural language goal into a single vetted shell command: \
             it gathers context, asks the configured model backend, scores the \
             result for destructive potential and records everything to an audit log",
        )
        .subcommand_required(true)
        .arg_required_else_help(true)
        .subcommand(
            Command::new("suggest")
                .about("Print a command suggestion for the given goal")
                .arg(
                    Arg::new("goal")
                        .help("Natural language goal")
                        .required(true)
                        .num_args(1..),
                ),
        )
        .subcommand(
            Command::new("run")
                .about("Suggest a command and execute it after confirmation")
                .arg(
                    Arg::new("goal")
                        .help("Natural language goal")
                        .required(true)
                        .num_args(1..),
                ),
        )
        .subcommand(
            Command::new("explain")
                .about("Show risk information for a command")
                .arg(Arg::new("command").help("Command to explain").num_args(0..))
                .arg(
                    Arg::new("last")
                        .long("last")
                        .help("Explain the last suggested command")
                        .action(ArgAction::SetTrue),
                ),
        )
        .subcommand(Command::new("status").about("Show daemon status and statistics"))
        .subcommand(Command::new("daemon").about("Run the suggestion daemon in the foreground"))
        .get_matches();

    let config = Config::load()?;

    let exit_code = match matches.subcommand() {
        Some(("daemon", _)) => {
            server::serve(&config).await?;
            0
        }
        Some(("suggest", sub)) => {
            let goal = goal_from(sub);
            info!("Processing goal: {goal}");
            Cli::new(config).suggest(&goal).await?
        }
        Some(("run", sub)) => {
            let goal = goal_from(sub);
            info!("Processing goal: {goal}");
            Cli::new(config).run(&goal).await?
        }
        Some(("explain", sub)) => {
            let command = sub
                .get_many::<String>("command")
                .map(|words| words.map(String::as_str).collect::<Vec<_>>().join(" "));
            let last = sub.get_flag("last");
            Cli::new(config).explain(command.as_deref(), last)?
        }
        Some(("status", _)) => Cli::new(config).status().await?,
        _ => 2,
    };

    std::process::exit(exit_code);
}
