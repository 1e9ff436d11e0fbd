#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::missing_panics_doc,
    clippy::module_name_repetitions,
    clippy::needless_pass_by_value,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use dialogue_tracker::{dump, store, Config, EventVerbosity, StoreCommands};
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::{fmt, EnvFilter};

#[derive(Copy, Clone, Debug, Eq, PartialEq, ValueEnum)]
enum CompletionShell {
    #[value(name = "bash")]
    Bash,
    #[value(name = "fish")]
    Fish,
    #[value(name = "zsh")]
    Zsh,
    #[value(name = "powershell")]
    PowerShell,
    #[value(name = "elvish")]
    Elvish,
}

/// Event-sourced conversation state: inspect dumps, replay history, manage stored trackers.
#[derive(Parser, Debug)]
#[command(name = "dialogue-tracker")]
#[command(version)]
#[command(about = "Inspect, replay and persist conversation trackers.", long_about = None)]
struct Cli {
    /// Directory holding config.toml (default: ~/.dialogue-tracker)
    #[arg(long, global = true)]
    config_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Summarize a tracker dump
    #[command(long_about = "\
Summarize a tracker dump.

Reads a JSON snapshot taken with events, or a persisted dialogue, \
replays it against the configured domain and prints the resulting \
state: live events, latest action and intent, topic, slots.

Examples:
  dialogue-tracker inspect alice.json
  dialogue-tracker inspect alice.json --json --events applied")]
    Inspect {
        /// Path to the JSON dump
        dump: PathBuf,
        /// Print the current state as a JSON snapshot instead of a summary
        #[arg(long)]
        json: bool,
        /// Events to attach when printing JSON
        #[arg(long, value_enum, default_value = "none")]
        events: EventVerbosity,
    },

    /// Print the state at every decision point of a dump, one JSON object per line
    PriorStates {
        /// Path to the JSON dump
        dump: PathBuf,
    },

    /// Render a dump's live events as a story
    #[command(long_about = "\
Render a dump's live events as a story.

Prints the story to stdout, or appends it to --output.

Examples:
  dialogue-tracker export-story alice.json
  dialogue-tracker export-story alice.json --output stories.md")]
    ExportStory {
        /// Path to the JSON dump
        dump: PathBuf,
        /// Append the story to this file instead of printing it
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Read and write trackers in the configured store
    #[command(long_about = "\
Read and write trackers in the configured store.

The backend comes from [tracker_store] in config.toml, or the \
DIALOGUE_TRACKER_STORE* environment variables.

Examples:
  dialogue-tracker store list
  dialogue-tracker store get alice
  dialogue-tracker store save alice.json")]
    Store {
        #[command(subcommand)]
        store_command: StoreCommands,
    },

    /// Manage configuration
    #[command(long_about = "\
Manage configuration.

Use 'schema' to dump the full JSON Schema for the config file, \
which documents every available key, type, and default value.

Examples:
  dialogue-tracker config schema              # print JSON Schema to stdout
  dialogue-tracker config schema > schema.json")]
    Config {
        #[command(subcommand)]
        config_command: ConfigCommands,
    },

    /// Generate shell completion script to stdout
    #[command(long_about = "\
Generate shell completion scripts for `dialogue-tracker`.

The script is printed to stdout so it can be sourced directly:

Examples:
  source <(dialogue-tracker completions bash)
  dialogue-tracker completions zsh > ~/.zfunc/_dialogue-tracker")]
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommands {
    /// Dump the full configuration JSON Schema to stdout
    Schema,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    if let Some(config_dir) = &cli.config_dir {
        if config_dir.as_os_str().is_empty() {
            bail!("--config-dir cannot be empty");
        }
    }

    // Completions and the schema are stdout-only; no config, no logging.
    match &cli.command {
        Commands::Completions { shell } => {
            let mut stdout = std::io::stdout().lock();
            return write_shell_completion(*shell, &mut stdout);
        }
        Commands::Config {
            config_command: ConfigCommands::Schema,
        } => {
            let schema = schemars::schema_for!(Config);
            println!(
                "{}",
                serde_json::to_string_pretty(&schema).context("Failed to serialize JSON Schema")?
            );
            return Ok(());
        }
        _ => {}
    }

    // Logs go to stderr so command output stays pipeable.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to install tracing subscriber")?;

    let config = Config::load_or_init(cli.config_dir.as_deref()).await?;

    match cli.command {
        Commands::Completions { .. } | Commands::Config { .. } => Ok(()),

        Commands::Inspect {
            dump: path,
            json,
            events,
        } => {
            let tracker = load_dump(&config, &path)?;
            if json {
                println!("{}", dump::render_snapshot(&tracker, events)?);
            } else {
                print!("{}", dump::summarize(&tracker));
            }
            Ok(())
        }

        Commands::PriorStates { dump: path } => {
            let tracker = load_dump(&config, &path)?;
            let mut stdout = std::io::stdout().lock();
            for line in dump::prior_state_lines(&tracker)? {
                writeln!(stdout, "{line}")?;
            }
            Ok(())
        }

        Commands::ExportStory { dump: path, output } => {
            let tracker = load_dump(&config, &path)?;
            match output {
                Some(out) => {
                    tracker.export_stories_to_file(&out).with_context(|| {
                        format!("Failed to write story to {}", out.display())
                    })?;
                    tracing::info!(path = %out.display(), "Story appended");
                }
                None => println!("{}", tracker.export_stories()),
            }
            Ok(())
        }

        Commands::Store { store_command } => {
            store::handle_store_command(store_command, &config).await
        }
    }
}

fn load_dump(config: &Config, path: &Path) -> Result<dialogue_tracker::Tracker> {
    let domain = Arc::new(config.load_domain()?);
    dump::read_dump(path, domain)
}

fn write_shell_completion<W: Write>(shell: CompletionShell, writer: &mut W) -> Result<()> {
    use clap_complete::generate;
    use clap_complete::shells;

    let mut cmd = Cli::command();
    let bin_name = cmd.get_name().to_string();

    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin_name.clone(), writer),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin_name.clone(), writer),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin_name.clone(), writer);
        }
        CompletionShell::Elvish => generate(shells::Elvish, &mut cmd, bin_name, writer),
    }

    writer.flush()?;
    Ok(())
}
