use std::io::{IsTerminal, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use indicatif::{ProgressBar, ProgressStyle};
use miette::{IntoDiagnostic, Result};

use diffsentry_core::{DiffSet, OutputFormat, SentryConfig, DEFAULT_CONFIG_FILE, ENV_ALT_API_KEY};
use diffsentry_review::llm::LlmClient;
use diffsentry_review::pipeline::ReviewPipeline;
use diffsentry_review::tools::ToolRegistry;

mod markdown;
mod present;

use present::Presenter;

#[derive(Parser)]
#[command(
    name = "diffsentry",
    version,
    about = "AI audits and commit messages for git changes",
    long_about = "diffsentry sends a git diff to an Azure OpenAI deployment and prints either\n\
                  a code audit with a risk score or a one-line commit message.\n\n\
                  Examples:\n  \
                    diffsentry audit_now                 Audit uncommitted changes\n  \
                    diffsentry audit_between_commits --path . --commit1 HEAD~1 --commit2 HEAD\n  \
                    diffsentry commit_message            Suggest a commit message"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .diffsentry.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Markdown rendered for the terminal (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  The model's Markdown, unrendered"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Audit the working tree changes of the configured repository
    #[command(
        name = "audit_now",
        alias = "audit-now",
        long_about = "Audit the working tree changes of the configured repository.\n\n\
        Diffs HEAD against the working tree (staged and unstaged, untracked files excluded),\n\
        asks the model for a review report, then asks it to classify the report into a\n\
        risk score from NONE to CRITICAL. The repository is [repo].path in the config\n\
        file (default: the current directory)."
    )]
    AuditNow,
    /// Audit the changes between two commits
    #[command(
        name = "audit_between_commits",
        alias = "audit-between-commits",
        long_about = "Audit the changes between two commits.\n\n\
        Revisions accept anything git rev-parse does: full or short SHAs, branches, HEAD~1.\n\
        Author and date are taken from the second commit.\n\n\
        Example:\n  diffsentry audit_between_commits --path ../app --commit1 3f2a9c1 --commit2 main"
    )]
    AuditBetweenCommits {
        /// Repository path (default: current directory)
        #[arg(long, default_value = ".")]
        path: PathBuf,
        /// Old side of the comparison
        #[arg(long)]
        commit1: String,
        /// New side of the comparison
        #[arg(long)]
        commit2: String,
    },
    /// Generate a one-line commit message for the working tree changes
    #[command(name = "commit_message", alias = "commit-message")]
    CommitMessage,
    /// Create a default .diffsentry.toml configuration file
    #[command(long_about = "Create a default .diffsentry.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .diffsentry.toml already exists.")]
    Init,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

const DEFAULT_CONFIG: &str = r#"# diffsentry configuration
# Environment variables take precedence over this file.

[llm]
# endpoint = "https://<resource>.openai.azure.com"   # AZURE_OPENAI_ENDPOINT
# api_version = "2024-02-01"                         # AZURE_OPENAI_API_VERSION
# deployment = "gpt-4o"                              # AZURE_OPENAI_CHAT_DEPLOYMENT_NAME
# temperature = 0.5                                  # AZURE_OPENAI_TEMPERATURE
# tools = true            # set to false if the deployment cannot call tools
# timeout_secs = 120
# The API key is read from AZURE_OPENAI_API_KEY.

[repo]
# path = "."              # repository used by audit_now and commit_message
"#;

fn init_logging(verbose: bool) {
    let default_filter = if verbose {
        "warn,diffsentry=debug,diffsentry_core=debug,diffsentry_git=debug,diffsentry_review=debug"
    } else {
        "warn"
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .format_timestamp(None)
        .init();
}

fn load_config(path: Option<&Path>) -> Result<SentryConfig> {
    let config = match path {
        Some(path) => SentryConfig::from_file(path)?,
        None => {
            let default_path = Path::new(DEFAULT_CONFIG_FILE);
            if default_path.exists() {
                SentryConfig::from_file(default_path)?
            } else {
                SentryConfig::default()
            }
        }
    };
    let config = config.with_process_env()?;
    log::debug!("configuration: {:?}", config.llm);
    if config.llm.alt_api_key.is_some() {
        log::debug!("{ENV_ALT_API_KEY} is set but not used");
    }
    Ok(config)
}

fn build_pipeline(config: &SentryConfig) -> Result<ReviewPipeline<LlmClient>> {
    let client = LlmClient::new(&config.llm)?;
    Ok(ReviewPipeline::new(client, ToolRegistry::with_defaults()))
}

fn spinner(message: &'static str) -> Option<ProgressBar> {
    if !std::io::stderr().is_terminal() {
        return None;
    }
    let pb = ProgressBar::new_spinner();
    if let Ok(style) = ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})") {
        pb.set_style(style);
    }
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(120));
    Some(pb)
}

async fn run_audit(
    pipeline: &ReviewPipeline<LlmClient>,
    diffs: &DiffSet,
    presenter: &Presenter,
) -> Result<()> {
    if diffs.is_empty() {
        return presenter
            .no_changes(&mut std::io::stdout().lock())
            .into_diagnostic();
    }

    let pb = spinner("Auditing changes...");
    let report = pipeline.audit_diff(diffs).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut out = std::io::stdout().lock();
    presenter
        .audit(&mut out, diffs, report.as_ref())
        .into_diagnostic()?;
    out.flush().into_diagnostic()
}

async fn run_commit_message(
    pipeline: &ReviewPipeline<LlmClient>,
    diffs: &DiffSet,
    presenter: &Presenter,
) -> Result<()> {
    if diffs.is_empty() {
        return presenter
            .no_changes(&mut std::io::stdout().lock())
            .into_diagnostic();
    }

    let pb = spinner("Writing commit message...");
    let message = pipeline.generate_commit_message(diffs).await;
    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    let mut out = std::io::stdout().lock();
    let mut notes = std::io::stderr().lock();
    presenter
        .commit_message(&mut out, &mut notes, diffs, message.as_deref())
        .into_diagnostic()?;
    notes.flush().into_diagnostic()?;
    out.flush().into_diagnostic()
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .into_diagnostic()?;
    human_panic::setup_panic!();

    let cli = Cli::parse();
    init_logging(cli.verbose);

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };
    let presenter = Presenter::new(cli.format, use_color);

    match cli.command {
        None => {
            Cli::command().print_help().into_diagnostic()?;
        }
        Some(Command::AuditNow) => {
            let config = load_config(cli.config.as_deref())?;
            let pipeline = build_pipeline(&config)?;
            let diffs = diffsentry_git::working_tree_diff(&config.repo.path)?;
            run_audit(&pipeline, &diffs, &presenter).await?;
        }
        Some(Command::AuditBetweenCommits {
            ref path,
            ref commit1,
            ref commit2,
        }) => {
            let config = load_config(cli.config.as_deref())?;
            let pipeline = build_pipeline(&config)?;
            let diffs = diffsentry_git::diff_between(path, commit1, commit2)?;
            run_audit(&pipeline, &diffs, &presenter).await?;
        }
        Some(Command::CommitMessage) => {
            let config = load_config(cli.config.as_deref())?;
            let pipeline = build_pipeline(&config)?;
            let diffs = diffsentry_git::working_tree_diff(&config.repo.path)?;
            run_commit_message(&pipeline, &diffs, &presenter).await?;
        }
        Some(Command::Init) => {
            let path = Path::new(DEFAULT_CONFIG_FILE);
            if path.exists() {
                miette::bail!("{DEFAULT_CONFIG_FILE} already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created {DEFAULT_CONFIG_FILE} with default configuration");
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "diffsentry", &mut std::io::stdout());
        }
    }

    Ok(())
}
