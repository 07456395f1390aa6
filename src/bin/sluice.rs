//! sluice: operator CLI
//!
//! Renders templates, sends one-off requests through the gateway and
//! reports usage recorded in the configured usage file.

use std::collections::HashMap;
use std::io::{self, IsTerminal, Read};
use std::path::PathBuf;

use clap::{Parser, Subcommand};
use sluice::{Config, Gateway, IssueInput, Payload, SluiceBuilder, StructuredRequest};

/// Sluice request optimization gateway
#[derive(Parser)]
#[command(name = "sluice")]
#[command(version = sluice::version::PKG_VERSION)]
#[command(about = "Sluice request optimization gateway")]
struct Args {
    /// Config file (default: ~/.sluice/config.toml, then /etc/sluice/config.toml)
    #[arg(short, long, env = "SLUICE_CONFIG")]
    config: Option<PathBuf>,

    /// User id recorded with each request
    #[arg(short, long, env = "SLUICE_USER", default_value = "cli")]
    user: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List registered operations
    Operations,

    /// Render an operation's prompt without calling the provider
    Render {
        /// Operation name (e.g. issue_summary)
        operation: String,
        /// Template fields as key=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Run a registered operation
    Run {
        /// Operation name (e.g. issue_summary)
        operation: String,
        /// Template fields as key=value (repeatable)
        #[arg(short, long = "field", value_parser = parse_field)]
        fields: Vec<(String, String)>,
    },

    /// Summarize an issue
    Issue {
        /// Issue title
        title: String,
        /// Issue description (or omit to read from stdin)
        description: Option<String>,
        /// Issue category
        #[arg(long)]
        category: Option<String>,
    },

    /// Send a free-form prompt
    Ask {
        /// Prompt text (or omit to read from stdin)
        prompt: Option<String>,
        /// Model to use (default: provider.default_model)
        #[arg(short, long)]
        model: Option<String>,
        /// Fields the JSON reply must contain (comma-separated)
        #[arg(short, long, value_delimiter = ',')]
        expect: Vec<String>,
    },

    /// Show today's usage for the current user
    Usage,

    /// Show cache statistics and today's aggregate usage over all users
    Metrics,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialise tracing (default: warn for CLI; override with RUST_LOG).
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
        )
        .init();

    let args = Args::parse();

    let config = match &args.config {
        Some(path) => Config::load(Some(path.as_path()))?,
        None => Config::load(None).unwrap_or_else(|e| {
            tracing::info!(error = %e, "using built-in defaults");
            Config::default()
        }),
    };
    let gateway = SluiceBuilder::from_config(&config).build()?;

    let outcome = run(&gateway, &args.user, args.command).await;
    // Failed calls are tracked too; write them out before reporting.
    gateway.tracker().flush().await;
    outcome
}

async fn run(gateway: &Gateway, user: &str, command: Command) -> Result<(), Box<dyn std::error::Error>> {
    match command {
        Command::Operations => {
            for op in gateway.templates().operations() {
                println!("{op}");
            }
        }

        Command::Render { operation, fields } => {
            let fields: HashMap<String, String> = fields.into_iter().collect();
            println!("{}", gateway.templates().render(&operation, &fields)?);
        }

        Command::Run { operation, fields } => {
            let fields: HashMap<String, String> = fields.into_iter().collect();
            let response = gateway
                .run_operation(user, &operation, &fields)
                .await
                .ok_or_else(|| format!("{operation}: no response (see logs)"))?;
            print_payload(&response.payload)?;
            print_meta(response.quality, response.cache_hit, response.cost);
        }

        Command::Issue {
            title,
            description,
            category,
        } => {
            let description = resolve_text(description, "issue")?;
            let mut input = IssueInput::new(title, description);
            if let Some(category) = category {
                input = input.category(category);
            }
            let result = gateway
                .summarize_issue(user, &input)
                .await
                .ok_or("issue: no summary (see logs)")?;
            println!("{}", serde_json::to_string_pretty(&result.value)?);
            eprintln!("quality: {}  cache_hit: {}", result.quality, result.cache_hit);
        }

        Command::Ask {
            prompt,
            model,
            expect,
        } => {
            let prompt = resolve_text(prompt, "ask")?;
            let mut request = StructuredRequest::new("ask");
            if let Some(model) = model {
                request = request.model(model);
            }
            let expect: Vec<&str> = expect.iter().map(String::as_str).collect();
            request = request.expect(&expect);

            let response = gateway
                .structured_response(user, &prompt, &request)
                .await
                .ok_or("ask: no response (see logs)")?;
            print_payload(&response.payload)?;
            print_meta(response.quality, response.cache_hit, response.cost);
        }

        Command::Usage => {
            let usage = gateway.daily_usage(user).await;
            println!("user:      {user}");
            println!("requests:  {}", usage.request_count);
            println!("tokens:    {}", usage.total_tokens);
            println!("cost:      ${:.6}", usage.total_cost);
        }

        Command::Metrics => {
            let metrics = gateway.performance_metrics().await;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
            eprintln!("cache hit rate: {:.1}%", metrics.cache.hit_rate() * 100.0);
        }
    }
    Ok(())
}

/// Parse a `key=value` field argument.
fn parse_field(s: &str) -> Result<(String, String), String> {
    s.split_once('=')
        .map(|(k, v)| (k.trim().to_string(), v.to_string()))
        .ok_or_else(|| format!("expected key=value, got {s:?}"))
}

/// Resolve text input from an optional CLI argument and/or stdin.
///
/// Combination rules:
/// - arg only → arg
/// - stdin only → stdin
/// - both → `"{arg}\n\n{stdin}"`
/// - neither → error
fn resolve_text(arg: Option<String>, command: &str) -> Result<String, Box<dyn std::error::Error>> {
    let stdin_text = if io::stdin().is_terminal() {
        None
    } else {
        let mut buf = String::new();
        io::stdin().read_to_string(&mut buf)?;
        Some(buf.trim().to_string()).filter(|s| !s.is_empty())
    };

    match (arg, stdin_text) {
        (Some(a), Some(s)) => Ok(format!("{a}\n\n{s}")),
        (Some(a), None) => Ok(a),
        (None, Some(s)) => Ok(s),
        (None, None) => {
            Err(format!("{command}: no input provided (pass text as argument or via stdin)").into())
        }
    }
}

fn print_payload(payload: &Payload) -> Result<(), serde_json::Error> {
    match payload {
        Payload::Structured(value) => println!("{}", serde_json::to_string_pretty(value)?),
        Payload::Text(text) => println!("{text}"),
    }
    Ok(())
}

fn print_meta(quality: u8, cache_hit: bool, cost: f64) {
    eprintln!("quality: {quality}  cache_hit: {cache_hit}  cost: ${cost:.6}");
}
