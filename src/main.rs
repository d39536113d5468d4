use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;

use desktop_todo::{
    cli::{self, ListArgs, RootCommand},
    logging::init_logging,
    paths::AppPaths,
};

#[derive(Parser, Debug)]
#[command(
    name = "desktop-todo",
    about = "Desktop to-do list with due-date reminders",
    long_about = "Manage the desktop to-do widget's task list and settings, and run its reminder loop.",
    version = env!("DESKTOP_TODO_BUILD_VERSION"),
    author
)]
struct Cli {
    /// Directory holding todos.json and settings.json
    #[arg(long, global = true, value_name = "DIR")]
    data_dir: Option<PathBuf>,

    #[arg(long, global = true)]
    json: bool,

    #[arg(long, global = true)]
    quiet: bool,

    #[command(subcommand)]
    command: Option<RootCommand>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let logging = match init_logging() {
        Ok(guard) => Some(guard),
        Err(err) => {
            eprintln!("warning: failed to initialize logging: {err:#}");
            None
        }
    };

    let cli = Cli::parse();
    let paths = match cli.data_dir {
        Some(dir) => AppPaths::new(dir),
        None => AppPaths::resolve()?,
    };
    let command = cli
        .command
        .unwrap_or_else(|| RootCommand::List(ListArgs::default()));

    let code = cli::run(paths, command, cli.json, cli.quiet).await;

    if code != 0 {
        if let Some(guard) = logging.as_ref() {
            eprintln!("log file: {}", guard.path().display());
        }
        // Flush the log writer before exiting without unwinding.
        drop(logging);
        std::process::exit(code);
    }

    Ok(())
}
