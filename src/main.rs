mod batch;
mod client;
mod config;
mod endpoints;
mod identity;
mod session;

use crate::batch::JsonStyle;
use crate::client::CpeClient;
use crate::config::{Config, Scope, save};
use crate::endpoints::{API_VERSION, EndpointTable, NotFoundError, StaticEndpoints};
use anyhow::{Context, Result};
use clap::{CommandFactory, Parser, ValueEnum};
use serde_json::Value;
use std::io::{self, Write};
use std::sync::OnceLock;
use std::{fs, path::PathBuf};
use tracing::{debug, info};

static LONG_VERSION: OnceLock<String> = OnceLock::new();

fn long_version() -> &'static str {
    LONG_VERSION.get_or_init(|| {
        format!(
            "{}\n\nCPE Insight API version supported: {}",
            env!("CARGO_PKG_VERSION"),
            API_VERSION
        )
    })
}

#[derive(Parser)]
#[command(
    name = "cpe-insight",
    version,
    long_version = long_version(),
    about = "CPE Insight API explorer",
    disable_version_flag = true
)]
struct Cli {
    #[arg(short = 'v', long, action = clap::ArgAction::Version, help = "Print version")]
    version: (),

    #[arg(short = 'l', long, help = "List all API endpoints")]
    list: bool,

    #[arg(
        short = 'e',
        long,
        value_name = "NAME",
        conflicts_with = "all",
        help = "Request a single endpoint"
    )]
    endpoint: Option<String>,

    #[arg(short = 'a', long, help = "Request all endpoints")]
    all: bool,

    #[arg(short = 'p', long, help = "Router admin password (otherwise read from config)")]
    password: Option<String>,

    #[arg(short = 'o', long, value_name = "FILE", help = "Write JSON to FILE instead of stdout")]
    output: Option<PathBuf>,

    #[arg(
        long,
        value_enum,
        default_value_t = OutputFormat::Raw,
        help = "Output format"
    )]
    format: OutputFormat,

    #[arg(long, help = "Emit a comma after the last entry in --all output")]
    trailing_comma: bool,

    #[arg(
        long,
        value_name = "URL",
        help = "Portal base URL (defaults to https://wifi.telenor.no)"
    )]
    base_url: Option<String>,

    #[arg(long, value_name = "PATH", help = "API path prefix (defaults to /api)")]
    api_base: Option<String>,

    #[arg(long, help = "Accept invalid TLS certificates")]
    insecure: bool,

    #[arg(
        long,
        value_enum,
        value_name = "SCOPE",
        help = "Persist --base-url/--api-base/--password/--insecure to the chosen scope and exit"
    )]
    save_config: Option<ScopeArg>,

    #[arg(long, help = "Show current configuration (password masked)")]
    show_config: bool,

    #[arg(long, value_enum, value_name = "SHELL", help = "Generate a shell completion script")]
    completion: Option<CompletionShell>,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Clone, Copy, Debug, ValueEnum, PartialEq, Eq)]
enum OutputFormat {
    Raw,
    Pretty,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum ScopeArg {
    Local,
    User,
}

impl From<ScopeArg> for Scope {
    fn from(value: ScopeArg) -> Self {
        match value {
            ScopeArg::Local => Scope::Local,
            ScopeArg::User => Scope::User,
        }
    }
}

impl Cli {
    fn config_overrides(&self) -> Config {
        Config {
            base_url: self.base_url.clone(),
            api_base: self.api_base.clone(),
            password: self.password.clone(),
            verify_tls: self.insecure.then_some(false),
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    if let Some(shell) = cli.completion {
        print_completion(shell);
        return Ok(());
    }

    let table = StaticEndpoints::default();
    if cli.list {
        let mut stdout = io::stdout().lock();
        endpoints::write_listing(&mut stdout, table.entries()).context("writing endpoint list")?;
        return Ok(());
    }

    let cwd = std::env::current_dir().context("reading current directory")?;

    if let Some(scope) = cli.save_config {
        let existing = config::load_scope(scope.into(), &cwd)?;
        let path = save(
            scope.into(),
            &config::merge(existing, cli.config_overrides()),
            &cwd,
        )?;
        println!("Saved configuration to {}", path.display());
        return Ok(());
    }

    if cli.show_config {
        let mut merged = config::merge(config::load(&cwd)?, cli.config_overrides());
        if merged.password.is_some() {
            merged.password = Some("*****".into());
        }
        println!("{}", serde_json::to_string_pretty(&merged)?);
        return Ok(());
    }

    if cli.endpoint.is_none() && !cli.all {
        Cli::command().print_help()?;
        return Ok(());
    }

    if let Some(name) = &cli.endpoint
        && table.lookup(name).is_none()
    {
        return Err(NotFoundError(name.clone()).into());
    }

    let effective = config::resolve(&cwd, cli.config_overrides())?;
    let password = effective.require_password()?;
    let client = CpeClient::new(
        &effective.base_url,
        &effective.api_base,
        effective.verify_tls,
    )?;

    let identity = client.fetch_identity()?;
    info!(
        model = %identity.model,
        friendly_name = %identity.model_friendly_name,
        "connected to {}",
        client.base_url()
    );
    let session = session::authenticate(&client, &identity, password)?;

    let document = match &cli.endpoint {
        Some(name) => client.execute(&table, name, &session, &identity)?,
        None => {
            let mut progress = io::stderr().lock();
            let aggregate = batch::run_all(table.names(), &mut progress, |name| {
                client.execute(&table, name, &session, &identity)
            });
            debug!(
                endpoints = aggregate.entries().len(),
                failures = aggregate.failures(),
                "batch complete"
            );
            let style = if cli.trailing_comma {
                JsonStyle::TrailingComma
            } else {
                JsonStyle::Strict
            };
            aggregate.render(style)
        }
    };

    write_document(&format_document(document, cli.format)?, cli.output.as_ref())
}

fn format_document(document: Vec<u8>, format: OutputFormat) -> Result<Vec<u8>> {
    match format {
        OutputFormat::Raw => Ok(document),
        // Trailing-comma output does not parse; leave it as-is.
        OutputFormat::Pretty => match serde_json::from_slice::<Value>(&document) {
            Ok(json) => serde_json::to_vec_pretty(&json).context("formatting JSON"),
            Err(_) => Ok(document),
        },
    }
}

fn write_document(document: &[u8], output: Option<&PathBuf>) -> Result<()> {
    match output {
        Some(path) => {
            fs::write(path, document).with_context(|| format!("writing {}", path.display()))
        }
        None => {
            let mut stdout = io::stdout().lock();
            stdout.write_all(document)?;
            stdout.write_all(b"\n")?;
            stdout.flush()?;
            Ok(())
        }
    }
}

fn print_completion(shell: CompletionShell) {
    use clap_complete::{generate, shells};
    let mut cmd = Cli::command();
    let bin = cmd.get_name().to_string();
    match shell {
        CompletionShell::Bash => generate(shells::Bash, &mut cmd, bin, &mut io::stdout()),
        CompletionShell::Zsh => generate(shells::Zsh, &mut cmd, bin, &mut io::stdout()),
        CompletionShell::Fish => generate(shells::Fish, &mut cmd, bin, &mut io::stdout()),
        CompletionShell::PowerShell => {
            generate(shells::PowerShell, &mut cmd, bin, &mut io::stdout())
        }
    }
}
