use std::collections::HashMap;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use genpress::cache::ContentCache;
use genpress::config::Config;
use genpress::dispatch::Dispatcher;
use genpress::gateway::Gateway;
use genpress::generators::GeneratorRegistry;
use genpress::providers::ProviderRegistry;
use genpress::storage::{JobStatus, SqliteStorage};
use genpress::vars::VariableBag;
use genpress::workflow::{StepExecutor, WorkflowEngine};

#[derive(Parser)]
#[command(name = "genpress")]
#[command(about = "Multi-provider AI content generation pipeline", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// List providers and test connections
    Providers {
        #[command(subcommand)]
        action: ProviderActions,
    },
    /// Generate a single piece of content
    Generate {
        /// Content type (blog_post, product_description, social_media,
        /// email_newsletter, landing_page, image, voice, video)
        #[arg(short = 't', long = "type", default_value = "blog_post")]
        content_type: String,
        /// The prompt
        prompt: String,
        /// Writing tone override
        #[arg(long)]
        tone: Option<String>,
        /// Target length in words
        #[arg(long)]
        length: Option<u32>,
        /// Creativity (0.1 - 1.0)
        #[arg(long)]
        creativity: Option<f32>,
        /// Target audience
        #[arg(long)]
        audience: Option<String>,
    },
    /// Manage workflows
    Workflows {
        #[command(subcommand)]
        action: WorkflowActions,
    },
    /// Inspect generation jobs
    Jobs {
        /// Status filter: pending|completed|failed
        #[arg(long)]
        status: Option<String>,
        /// Number of jobs to show
        #[arg(short, long, default_value = "20")]
        limit: usize,
    },
    /// Prune old API logs and expired cache entries
    Maintenance,
}

#[derive(Subcommand)]
enum ProviderActions {
    /// List registered providers with key and rate-limit status
    List,
    /// Test a provider connection with an API key
    Test {
        /// Provider name (openai, stabilityai, elevenlabs, synthesia)
        name: String,
        /// API key to test (falls back to the configured key)
        #[arg(short, long)]
        key: Option<String>,
    },
}

#[derive(Subcommand)]
enum WorkflowActions {
    /// List all workflows
    List,
    /// Save a workflow from a YAML or JSON file
    Save {
        /// Path to the workflow definition file
        file: String,
    },
    /// Show a workflow definition
    Show {
        /// Workflow id
        id: String,
    },
    /// Run a workflow
    Run {
        /// Workflow id
        id: String,
        /// Input variables (key=value)
        #[arg(short, long = "var", value_parser = parse_var)]
        vars: Vec<(String, String)>,
    },
    /// Delete a workflow
    Delete {
        /// Workflow id
        id: String,
    },
}

fn parse_var(s: &str) -> std::result::Result<(String, String), String> {
    let pos = s
        .find('=')
        .ok_or_else(|| format!("Invalid variable format '{}'. Expected key=value", s))?;
    Ok((s[..pos].to_string(), s[pos + 1..].to_string()))
}

/// Everything the commands need, wired once at startup.
struct App {
    config: Config,
    storage: Arc<SqliteStorage>,
    gateway: Arc<Gateway>,
    dispatcher: Dispatcher,
    engine: WorkflowEngine,
}

fn build_app() -> anyhow::Result<App> {
    let config = Config::load();

    let mut providers = ProviderRegistry::new();
    config.apply_quota_overrides(&mut providers);

    let db_path = config.database_path();
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let storage = Arc::new(SqliteStorage::open(&db_path)?);

    let gateway = Arc::new(
        Gateway::new(providers, config.api_keys()).with_request_log(storage.clone()),
    );

    let generators = GeneratorRegistry::new(gateway.clone(), &config.generation);
    let defaults = config.default_settings();
    let cache = ContentCache::new(storage.clone(), config.generation.cache_ttl_secs);

    let dispatcher = Dispatcher::new(
        storage.clone(),
        generators.clone(),
        defaults.clone(),
        cache,
    );
    let engine = WorkflowEngine::new(storage.clone(), StepExecutor::new(generators, defaults));

    Ok(App {
        config,
        storage,
        gateway,
        dispatcher,
        engine,
    })
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(
            std::env::var("RUST_LOG").unwrap_or_else(|_| "genpress=info".into()),
        ))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let app = build_app()?;

    match cli.command {
        Commands::Providers { action } => match action {
            ProviderActions::List => cmd_providers_list(&app),
            ProviderActions::Test { name, key } => {
                cmd_providers_test(&app, &name, key.as_deref()).await?
            }
        },
        Commands::Generate {
            content_type,
            prompt,
            tone,
            length,
            creativity,
            audience,
        } => {
            cmd_generate(&app, &content_type, &prompt, tone, length, creativity, audience).await?
        }
        Commands::Workflows { action } => match action {
            WorkflowActions::List => cmd_workflows_list(&app).await?,
            WorkflowActions::Save { file } => cmd_workflows_save(&app, &file).await?,
            WorkflowActions::Show { id } => cmd_workflows_show(&app, &id).await?,
            WorkflowActions::Run { id, vars } => cmd_workflows_run(&app, &id, &vars).await?,
            WorkflowActions::Delete { id } => cmd_workflows_delete(&app, &id).await?,
        },
        Commands::Jobs { status, limit } => cmd_jobs(&app, status.as_deref(), limit).await?,
        Commands::Maintenance => cmd_maintenance(&app).await?,
    }

    Ok(())
}

fn cmd_providers_list(app: &App) {
    println!(
        "{:<14} {:<14} {:<8} {:<12} {:<24}",
        "NAME", "DISPLAY", "KEY", "REMAINING", "CAPABILITIES"
    );
    println!("{}", "-".repeat(74));

    for summary in app.gateway.list_providers() {
        let capabilities = summary
            .capabilities
            .iter()
            .map(|c| c.to_string())
            .collect::<Vec<_>>()
            .join(", ");
        println!(
            "{:<14} {:<14} {:<8} {:<12} {:<24}",
            summary.name,
            summary.display_name,
            if summary.has_key { "yes" } else { "no" },
            format!("{}/{}", summary.rate.remaining, summary.rate.limit),
            capabilities
        );
    }
}

async fn cmd_providers_test(app: &App, name: &str, key: Option<&str>) -> anyhow::Result<()> {
    let configured = app.config.api_keys();
    let key = key
        .map(str::to_string)
        .or_else(|| configured.get(name).cloned())
        .unwrap_or_default();

    match app.gateway.test_connection(name, &key).await {
        Ok(status) => {
            println!("{}: {}", status.provider, status.status);
            println!(
                "Rate limit: {}/{} remaining, resets in {}s",
                status.rate.remaining, status.rate.limit, status.rate.resets_in_secs
            );
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&e.to_json())?);
            std::process::exit(1);
        }
    }

    Ok(())
}

#[allow(clippy::too_many_arguments)]
async fn cmd_generate(
    app: &App,
    content_type: &str,
    prompt: &str,
    tone: Option<String>,
    length: Option<u32>,
    creativity: Option<f32>,
    audience: Option<String>,
) -> anyhow::Result<()> {
    let overrides = genpress::settings::SettingsPatch {
        tone: tone.as_deref().map(str::parse).transpose().map_err(anyhow::Error::msg)?,
        length,
        creativity,
        target_audience: audience,
        ..Default::default()
    };

    let outcome = app.dispatcher.generate(content_type, prompt, &overrides).await?;

    println!("{}", outcome.content);
    if !outcome.meta.is_empty() {
        eprintln!(
            "\n[job {}{}] meta: {}",
            outcome.job_id,
            if outcome.from_cache { ", cached" } else { "" },
            serde_json::to_string_pretty(&outcome.meta)?
        );
    }

    Ok(())
}

async fn cmd_workflows_list(app: &App) -> anyhow::Result<()> {
    let workflows = app.engine.list().await?;

    if workflows.is_empty() {
        println!("No workflows found.");
        println!();
        println!("Create one with: genpress workflows save <file.yaml>");
        return Ok(());
    }

    println!("{:<36} {:<28} {:<6} {:<18}", "ID", "NAME", "STEPS", "UPDATED");
    println!("{}", "-".repeat(90));
    for workflow in workflows {
        println!(
            "{:<36} {:<28} {:<6} {:<18}",
            workflow.id,
            workflow.name,
            workflow.steps.len(),
            workflow.updated_at.format("%Y-%m-%d %H:%M")
        );
    }

    Ok(())
}

async fn cmd_workflows_save(app: &App, file: &str) -> anyhow::Result<()> {
    let content = std::fs::read_to_string(file)?;

    // Definition files may be JSON or YAML.
    let data: serde_json::Value = match serde_json::from_str(&content) {
        Ok(value) => value,
        Err(_) => serde_yaml::from_str(&content)?,
    };

    let id = app.engine.save(&data).await?;
    println!("Saved workflow {}", id);
    Ok(())
}

async fn cmd_workflows_show(app: &App, id: &str) -> anyhow::Result<()> {
    match app.engine.get(id).await? {
        Some(workflow) => println!("{}", serde_json::to_string_pretty(&workflow)?),
        None => {
            eprintln!("Workflow not found: {}", id);
            std::process::exit(1);
        }
    }
    Ok(())
}

async fn cmd_workflows_run(
    app: &App,
    id: &str,
    vars: &[(String, String)],
) -> anyhow::Result<()> {
    let input: HashMap<String, String> = vars.iter().cloned().collect();

    match app.engine.run(id, VariableBag::from_strings(input)).await {
        Ok(result) => {
            println!("{}", result.content);
            eprintln!(
                "\n[workflow {} \"{}\"] {} steps completed",
                result.workflow_id,
                result.workflow_name,
                result.step_results.len()
            );
        }
        Err(e) => {
            eprintln!("{}", serde_json::to_string_pretty(&e.to_json())?);
            std::process::exit(1);
        }
    }

    Ok(())
}

async fn cmd_workflows_delete(app: &App, id: &str) -> anyhow::Result<()> {
    if app.engine.delete(id).await? {
        println!("Deleted workflow {}", id);
    } else {
        eprintln!("Workflow not found: {}", id);
        std::process::exit(1);
    }
    Ok(())
}

async fn cmd_jobs(app: &App, status: Option<&str>, limit: usize) -> anyhow::Result<()> {
    let status: Option<JobStatus> = status
        .map(str::parse)
        .transpose()
        .map_err(anyhow::Error::msg)?;
    let jobs = app.storage.list_jobs(status, limit).await?;

    if jobs.is_empty() {
        println!("No jobs found.");
        return Ok(());
    }

    println!(
        "{:<6} {:<20} {:<10} {:<18} {}",
        "ID", "TYPE", "STATUS", "CREATED", "PROMPT"
    );
    println!("{}", "-".repeat(90));
    for job in jobs {
        let prompt: String = job.prompt.chars().take(40).collect();
        println!(
            "{:<6} {:<20} {:<10} {:<18} {}",
            job.id,
            job.content_type,
            job.status.to_string(),
            job.created_at.format("%Y-%m-%d %H:%M"),
            prompt
        );
    }

    Ok(())
}

async fn cmd_maintenance(app: &App) -> anyhow::Result<()> {
    let retention = app.config.generation.log_retention_days;
    let pruned = app.storage.prune_api_logs(retention).await?;
    let swept = app.storage.clean_expired_cache().await?;

    println!(
        "Pruned {} API log entries older than {} days, removed {} expired cache entries",
        pruned, retention, swept
    );
    Ok(())
}
