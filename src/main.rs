//! CLI entry point for `mailsplit`.

use std::io::Write;
use std::path::{Path, PathBuf};

use anyhow::Context;
use clap::{CommandFactory, Parser, Subcommand};

use mailsplit::config::Config;
use mailsplit::export::attachment::CollisionPolicy;
use mailsplit::export::eml::HeaderLayout;
use mailsplit::model::attachment::SavedAttachment;
use mailsplit::{SplitOptions, Splitter};

/// Save the attachments of a MIME message and strip them from it.
#[derive(Parser)]
#[command(name = "mailsplit", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose logging (-v info, -vv debug, -vvv trace)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,
}

#[derive(Subcommand)]
enum Commands {
    /// Extract attachments and write the message without them
    Split {
        /// Message file to read (`-` for stdin)
        #[arg(value_name = "INPUT")]
        input: PathBuf,
        /// Directory receiving the attachments (created if missing)
        #[arg(short, long = "output-dir", value_name = "DIR")]
        output_dir: PathBuf,
        /// Write the rebuilt message here instead of stdout
        #[arg(short, long = "message", value_name = "FILE")]
        message_out: Option<PathBuf>,
        /// What to do when an attachment file name is already taken
        #[arg(long, value_enum)]
        on_collision: Option<CollisionPolicy>,
        /// Layout of the rebuilt top-level headers
        #[arg(long, value_enum)]
        headers: Option<HeaderLayout>,
        /// Nested multipart levels to descend into (0 = top level only)
        #[arg(long, value_name = "N")]
        max_depth: Option<usize>,
        /// Re-parse the rebuilt message before writing it
        #[arg(long)]
        verify: bool,
        /// Print the attachment summary as JSON
        #[arg(long)]
        json: bool,
    },
    /// Generate shell completions
    Completions {
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
    /// Generate a man page
    Manpage,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let config = mailsplit::config::load_config();

    let log_level = match cli.verbose {
        0 => config.general.log_level.as_str(),
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    setup_logging(log_level, &config);

    match cli.command {
        Commands::Split {
            input,
            output_dir,
            message_out,
            on_collision,
            headers,
            max_depth,
            verify,
            json,
        } => {
            let mut options = SplitOptions::from(&config);
            if let Some(policy) = on_collision {
                options.on_collision = policy;
            }
            if let Some(layout) = headers {
                options.header_layout = layout;
            }
            if let Some(depth) = max_depth {
                options.max_depth = depth;
            }
            options.verify |= verify;

            cmd_split(&input, &output_dir, message_out.as_deref(), options, json)
        }
        Commands::Completions { shell } => cmd_completions(shell),
        Commands::Manpage => cmd_manpage(),
    }
}

/// Set up tracing with stderr output and optional file logging.
fn setup_logging(level: &str, config: &Config) {
    use tracing_subscriber::layer::SubscriberExt;
    use tracing_subscriber::util::SubscriberInitExt;

    let env_filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(level));

    let stderr_layer = tracing_subscriber::fmt::layer().with_writer(std::io::stderr);

    let log_dir = mailsplit::config::cache_dir(config);
    if std::fs::create_dir_all(&log_dir).is_ok() {
        let file_appender =
            tracing_appender::rolling::never(&log_dir, mailsplit::config::LOG_FILE_NAME);
        let file_layer = tracing_subscriber::fmt::layer()
            .with_ansi(false)
            .with_writer(file_appender);

        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .with(file_layer)
            .init();
    } else {
        // Fall back to stderr only
        tracing_subscriber::registry()
            .with(env_filter)
            .with(stderr_layer)
            .init();
    }
}

/// Generate shell completions and print to stdout.
fn cmd_completions(shell: clap_complete::Shell) -> anyhow::Result<()> {
    let mut cmd = Cli::command();
    clap_complete::generate(shell, &mut cmd, "mailsplit", &mut std::io::stdout());
    Ok(())
}

/// Generate a man page and print to stdout.
fn cmd_manpage() -> anyhow::Result<()> {
    let cmd = Cli::command();
    let man = clap_mangen::Man::new(cmd);
    let mut buf = Vec::new();
    man.render(&mut buf)?;
    std::io::stdout().write_all(&buf)?;
    Ok(())
}

/// Split one message file.
fn cmd_split(
    input: &Path,
    output_dir: &Path,
    message_out: Option<&Path>,
    options: SplitOptions,
    json: bool,
) -> anyhow::Result<()> {
    let raw = read_input(input)?;

    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("Failed to create {}", output_dir.display()))?;

    let splitter = Splitter::new(options);
    let outcome = splitter
        .process(&raw, output_dir)
        .with_context(|| format!("Failed to split {}", input.display()))?;

    match message_out {
        Some(path) => std::fs::write(path, &outcome.message)
            .with_context(|| format!("Failed to write {}", path.display()))?,
        None => std::io::stdout().write_all(outcome.message.as_bytes())?,
    }

    // Keep stdout clean for the message when it is written there.
    let mut summary: Box<dyn Write> = if message_out.is_some() {
        Box::new(std::io::stdout())
    } else {
        Box::new(std::io::stderr())
    };

    if json {
        print_summary_json(&mut summary, output_dir, &outcome.saved)
    } else {
        print_summary_table(&mut summary, output_dir, &outcome.saved)
    }
}

fn read_input(input: &Path) -> anyhow::Result<String> {
    if input == Path::new("-") {
        let mut raw = String::new();
        std::io::Read::read_to_string(&mut std::io::stdin(), &mut raw)
            .context("Failed to read message from stdin")?;
        return Ok(raw);
    }

    if !input.exists() {
        anyhow::bail!("File not found: {}", input.display());
    }
    std::fs::read_to_string(input)
        .with_context(|| format!("Failed to read {} as UTF-8 text", input.display()))
}

/// Print saved attachments as a human-readable table.
fn print_summary_table(
    out: &mut dyn Write,
    output_dir: &Path,
    saved: &[SavedAttachment],
) -> anyhow::Result<()> {
    use humansize::{format_size, BINARY};

    writeln!(out)?;
    writeln!(
        out,
        "  {} attachment(s) saved to {}",
        saved.len(),
        output_dir.display()
    )?;

    if saved.is_empty() {
        writeln!(out)?;
        return Ok(());
    }

    writeln!(out)?;
    writeln!(out, "  {:<6} {:<40} {:>10}", "Part", "File", "Size")?;
    writeln!(out, "  {}", "-".repeat(58))?;
    for attachment in saved {
        let name: String = attachment.file_name.chars().take(39).collect();
        writeln!(
            out,
            "  {:<6} {:<40} {:>10}",
            attachment.part.to_string(),
            name,
            format_size(attachment.size, BINARY)
        )?;
    }

    let total: u64 = saved.iter().map(|a| a.size).sum();
    writeln!(out, "  {:<47} {:>10}", "Total", format_size(total, BINARY))?;
    writeln!(out)?;
    Ok(())
}

/// Print saved attachments as JSON.
fn print_summary_json(
    out: &mut dyn Write,
    output_dir: &Path,
    saved: &[SavedAttachment],
) -> anyhow::Result<()> {
    let summary = serde_json::json!({
        "output_dir": output_dir.to_string_lossy(),
        "attachment_count": saved.len(),
        "total_size": saved.iter().map(|a| a.size).sum::<u64>(),
        "attachments": saved,
    });

    writeln!(out, "{}", serde_json::to_string_pretty(&summary)?)?;
    Ok(())
}
