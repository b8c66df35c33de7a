use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};

use repo_tint::color::Color;
use repo_tint::config::loader::{self, ImportMode};
use repo_tint::config::types::{ColorValueConfig, RepoRuleConfig, StructuredRepoRule, Toggles};
use repo_tint::engine::{Engine, Outcome, Preview, validate_rules};
use repo_tint::session::WorkspaceSession;
use repo_tint::themed::ThemeKind;

#[derive(Parser)]
#[command(name = "repo-tint", version, about = "Per-repository VS Code window colors")]
struct Cli {
    /// Path to config file.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Workspace folder (defaults to the current directory).
    #[arg(short, long)]
    workspace: Option<PathBuf>,

    /// Theme to resolve colors for (overrides config and detection).
    #[arg(long, value_parser = ["dark", "light", "high-contrast"])]
    theme: Option<String>,

    /// Enable debug logging to stderr.
    #[arg(long)]
    debug: bool,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Apply rule-matched colors to the workspace settings (the default).
    Colorize {
        /// First save a rule mapping this workspace to COLOR, then apply.
        #[arg(long, value_name = "COLOR")]
        save_rule: Option<String>,

        /// Preview: apply the repo rule at this index instead of matching.
        #[arg(long, value_name = "INDEX")]
        rule: Option<usize>,

        /// Preview: apply the branch rule at this index from the matched
        /// rule's table (requires a branch table in scope).
        #[arg(long, value_name = "INDEX")]
        branch_rule: Option<usize>,
    },
    /// Remove every color this tool manages from the workspace settings.
    Decolorize,
    /// Colorize, then re-apply whenever the git branch changes.
    Watch {
        /// Poll interval for branch changes, in milliseconds.
        #[arg(long, default_value_t = 1000)]
        interval_ms: u64,
    },
    /// Validate the configured rules and show which one matches here.
    Rules,
    /// Export the config (rules, tables, profiles, toggles) as JSON.
    Export {
        path: PathBuf,
    },
    /// Import a JSON export, replacing or merging into the current config.
    Import {
        path: PathBuf,
        /// Merge instead of replacing (de-duplicated by qualifier/pattern).
        #[arg(long)]
        merge: bool,
    },
    /// Create a starter config file.
    Init,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing(cli.debug);

    let (mut config, source) = loader::load_config(cli.config.as_deref())?;
    let workspace = match &cli.workspace {
        Some(path) => path.clone(),
        None => std::env::current_dir()?,
    };
    let theme = resolve_theme(cli.theme.as_deref(), config.theme);

    match cli.command.unwrap_or(Commands::Colorize {
        save_rule: None,
        rule: None,
        branch_rule: None,
    }) {
        Commands::Colorize {
            save_rule,
            rule,
            branch_rule,
        } => {
            let mut session = WorkspaceSession::open(&workspace, theme);
            if let Some(color) = save_rule {
                save_workspace_rule(&mut config, &session, &color)?;
                let path = source
                    .clone()
                    .unwrap_or_else(loader::default_config_path);
                loader::save_config(&config, &path)?;
                println!("rule saved to {}", path.display());
            }
            let preview = Preview { rule, branch_rule };
            let outcome = Engine::new(&config).colorize_with(&mut session, preview)?;
            report(&outcome, &config.toggles);
        }
        Commands::Decolorize => {
            let session = WorkspaceSession::open(&workspace, theme);
            let outcome = Engine::new(&config).clear(&session)?;
            report(&outcome, &config.toggles);
        }
        Commands::Watch { interval_ms } => {
            let mut session = WorkspaceSession::open(&workspace, theme);
            Engine::new(&config).watch(&mut session, Duration::from_millis(interval_ms))?;
        }
        Commands::Rules => {
            let session = WorkspaceSession::open(&workspace, theme);
            print_rules(&config, &session);
        }
        Commands::Export { path } => {
            loader::export_config(&config, &path)?;
            println!("exported to {}", path.display());
        }
        Commands::Import { path, merge } => {
            let mode = if merge {
                ImportMode::Merge
            } else {
                ImportMode::Replace
            };
            let imported = loader::import_config(config, &path, mode)?;
            let target = source.unwrap_or_else(loader::default_config_path);
            loader::save_config(&imported, &target)?;
            println!("imported into {}", target.display());
        }
        Commands::Init => init_config()?,
    }

    Ok(())
}

fn init_tracing(debug: bool) {
    let filter = tracing_subscriber::EnvFilter::try_from_env("RUST_LOG")
        .unwrap_or_else(|_| {
            tracing_subscriber::EnvFilter::new(if debug { "debug" } else { "warn" })
        });
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(filter)
        .init();
}

fn resolve_theme(flag: Option<&str>, configured: Option<ThemeKind>) -> ThemeKind {
    match flag {
        Some("light") => ThemeKind::Light,
        Some("high-contrast") => ThemeKind::HighContrast,
        Some(_) => ThemeKind::Dark,
        None => configured.unwrap_or_else(ThemeKind::detect),
    }
}

/// Prepend a rule for the current workspace: remote qualifier when the repo
/// has one, local-folder glob otherwise. Prepended so it wins immediately
/// under first-match ordering.
fn save_workspace_rule(
    config: &mut repo_tint::config::types::TintConfig,
    session: &WorkspaceSession,
    color: &str,
) -> Result<()> {
    Color::parse(color, "--save-rule")?;
    let qualifier = match &session.remote_url {
        Some(url) => url.clone(),
        None => format!("!{}", session.folder.display()),
    };
    config.repo_rules.insert(
        0,
        RepoRuleConfig::Structured(StructuredRepoRule {
            qualifier: Some(qualifier),
            color: Some(ColorValueConfig::Plain(color.to_owned())),
            ..StructuredRepoRule::default()
        }),
    );
    Ok(())
}

fn report(outcome: &Outcome, toggles: &Toggles) {
    match outcome {
        Outcome::Applied {
            set_count,
            removed_count,
            wrote: true,
        } => println!("applied {set_count} colors ({removed_count} stale removed)"),
        Outcome::Applied { wrote: false, .. } => println!("colors already up to date"),
        Outcome::Cleared { wrote: true, removed_count } => {
            println!("removed {removed_count} managed colors");
        }
        Outcome::Cleared { wrote: false, .. } => println!("nothing to remove"),
        Outcome::NoMatch => {
            for line in no_match_lines(toggles) {
                println!("{line}");
            }
        }
    }
}

/// What to tell the user when no rule matched, per the reporting toggles.
fn no_match_lines(toggles: &Toggles) -> Vec<&'static str> {
    let mut lines = Vec::new();
    if toggles.show_status_icon_when_no_rule_matches {
        lines.push("no rule matches this workspace");
    }
    if toggles.ask_to_colorize_repo_when_opened {
        lines.push("hint: run \"repo-tint colorize --save-rule <COLOR>\" to add one");
    }
    lines
}

/// Starter config: one example of each concept, commented out so a fresh
/// install changes nothing until the user opts in.
const STARTER_CONFIG: &str = r##"config_schema_version = 2

# repo_rules = [
#     { qualifier = "github.com/your-org/your-repo", color = "#3b82f6" },
#     { qualifier = "!~/projects/scratch/*", color = "tomato" },
# ]

# [branch_tables."Default Rules"]
# rules = [
#     { pattern = "^(main|master)$", color = "#16a34a" },
#     { pattern = "^release/", color = "#dc2626" },
# ]

[toggles]
color_inactive_titlebar = true
color_editor_tabs = false
color_status_bar = false
activity_bar_color_knob = 3
"##;

fn init_config() -> Result<()> {
    let path = loader::default_config_path();
    if path.exists() {
        anyhow::bail!("config already exists at {}", path.display());
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(&path, STARTER_CONFIG)?;
    println!("created {}", path.display());
    Ok(())
}

fn print_rules(config: &repo_tint::config::types::TintConfig, session: &WorkspaceSession) {
    let report = validate_rules(config);
    let matched = repo_tint::rules::find_matching_repo_rule(
        &report.repo.rules,
        &session.match_context(),
    )
    .map(|(index, _)| index);

    println!("repo rules:");
    for (index, raw) in config.repo_rules.iter().enumerate() {
        let marker = if Some(index) == matched { "=>" } else { "  " };
        let status = match report.repo.errors.get(&index) {
            Some(message) => format!("error: {message}"),
            None => "ok".to_owned(),
        };
        let label = match raw {
            RepoRuleConfig::Legacy(text) => text.clone(),
            RepoRuleConfig::Structured(s) => s.qualifier.clone().unwrap_or_default(),
        };
        println!("{marker} [{index}] {label}  ({status})");
    }

    for (name, table) in &config.branch_tables {
        println!("branch table \"{name}\":");
        let errors = report.branch.get(name);
        for (index, rule) in table.rules.iter().enumerate() {
            let status = match errors.and_then(|p| p.errors.get(&index)) {
                Some(message) => format!("error: {message}"),
                None => "ok".to_owned(),
            };
            println!("   [{index}] {}  ({status})", rule.pattern);
        }
    }

    if matched.is_none() {
        println!("no rule matches this workspace");
    }
}
