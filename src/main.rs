mod logging;

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use flowsmith_config::{EngineSettings, PlanDef, ProviderKind, ProviderSettings, SearchKind};
use flowsmith_context::{ContextProvider, FsDocumentStore, TavilySearch};
use flowsmith_inference::{
  CredentialPool, GeminiProvider, InferenceService, OpenAiProvider, RotatingClient,
};
use flowsmith_pipeline::Merger;
use flowsmith_resolver::{Resolution, Resolver, StandardResolver};
use flowsmith_scheduler::{Scheduler, SchedulerConfig};

/// Flowsmith - generates and validates integration code for task plans
#[derive(Parser)]
#[command(name = "flowsmith")]
#[command(version, about, long_about = None)]
struct Cli {
  /// Path to the settings file (default: ~/.flowsmith/config.json)
  #[arg(long, global = true)]
  config: Option<PathBuf>,

  #[command(subcommand)]
  command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
  /// Resolve a plan and print its task graph
  Resolve {
    /// Path to the plan file (JSON)
    plan_file: PathBuf,

    /// Fail on downstream labels that match no task
    #[arg(long)]
    strict: bool,
  },

  /// Run every task of a plan and print the report
  Run {
    /// Path to the plan file (JSON)
    plan_file: PathBuf,

    /// Directory of local integration documents (overrides the settings file)
    #[arg(long)]
    docs_dir: Option<PathBuf>,

    /// Combine the generated artifacts into a single program
    #[arg(long)]
    merge: bool,

    /// Fail on downstream labels that match no task
    #[arg(long)]
    strict: bool,
  },
}

fn main() -> Result<()> {
  logging::init();
  let cli = Cli::parse();

  match cli.command {
    Some(Commands::Resolve { plan_file, strict }) => {
      resolve_plan(&plan_file, strict)?;
    }
    Some(Commands::Run {
      plan_file,
      docs_dir,
      merge,
      strict,
    }) => {
      let settings_file = match cli.config {
        Some(path) => path,
        None => default_settings_path()?,
      };
      let rt = tokio::runtime::Runtime::new()?;
      rt.block_on(async {
        run_plan(&plan_file, &settings_file, docs_dir, merge, strict).await
      })?;
    }
    None => {
      println!("flowsmith - use --help to see available commands");
    }
  }

  Ok(())
}

fn default_settings_path() -> Result<PathBuf> {
  Ok(
    dirs::home_dir()
      .context("could not determine home directory")?
      .join(".flowsmith")
      .join("config.json"),
  )
}

fn load_plan(plan_file: &Path) -> Result<PlanDef> {
  let content = std::fs::read_to_string(plan_file)
    .with_context(|| format!("failed to read plan file: {}", plan_file.display()))?;
  serde_json::from_str(&content)
    .with_context(|| format!("failed to parse plan file: {}", plan_file.display()))
}

fn resolve(plan: PlanDef, strict: bool) -> Result<Resolution> {
  let resolver = if strict {
    StandardResolver::strict()
  } else {
    StandardResolver::new()
  };
  let resolution = resolver.resolve(plan).context("failed to resolve plan")?;
  for warning in &resolution.warnings {
    eprintln!("warning: {}", warning);
  }
  Ok(resolution)
}

fn resolve_plan(plan_file: &Path, strict: bool) -> Result<()> {
  let resolution = resolve(load_plan(plan_file)?, strict)?;
  let graph = resolution.graph.graph();

  let output = serde_json::json!({
    "tasks": resolution.graph.tasks().collect::<Vec<_>>(),
    "roots": graph.roots(),
    "terminals": graph.terminals(),
    "order": graph.topological_order(),
    "warnings": resolution.warnings,
  });
  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}

fn load_settings(settings_file: &Path) -> Result<EngineSettings> {
  let content = std::fs::read_to_string(settings_file)
    .with_context(|| format!("failed to read settings file: {}", settings_file.display()))?;
  let mut settings: EngineSettings = serde_json::from_str(&content)
    .with_context(|| format!("failed to parse settings file: {}", settings_file.display()))?;
  settings.apply_env();
  settings.validate()?;
  Ok(settings)
}

fn build_client(provider: &ProviderSettings) -> Result<RotatingClient> {
  let timeout = Duration::from_secs(provider.timeout_secs);
  let service: Arc<dyn InferenceService> = match provider.kind {
    ProviderKind::Openai => Arc::new(OpenAiProvider::new(
      provider.model.clone(),
      provider.base_url.clone(),
      timeout,
    )?),
    ProviderKind::Gemini => Arc::new(GeminiProvider::new(
      provider.model.clone(),
      provider.base_url.clone(),
      timeout,
    )?),
  };
  let pool = CredentialPool::from_secrets(
    provider.api_keys.clone(),
    Duration::from_secs(provider.cooldown_secs),
  )?;

  Ok(RotatingClient::new(service, pool).with_max_cycles(provider.max_cycles))
}

fn build_context(settings: &EngineSettings, docs_dir: Option<PathBuf>) -> Result<ContextProvider> {
  let mut context = ContextProvider::new();

  if let Some(dir) = docs_dir.or_else(|| settings.documentation_dir.clone()) {
    context = context.with_documents(Arc::new(FsDocumentStore::new(dir)));
  }

  if let Some(search) = &settings.search {
    match search.kind {
      SearchKind::Tavily => {
        let client = TavilySearch::new(
          search.api_key.clone(),
          search.max_results as usize,
          Duration::from_secs(settings.provider.timeout_secs),
        )
        .context("failed to create search client")?;
        context = context.with_search(Arc::new(client));
      }
    }
  }

  Ok(context)
}

async fn run_plan(
  plan_file: &Path,
  settings_file: &Path,
  docs_dir: Option<PathBuf>,
  merge: bool,
  strict: bool,
) -> Result<()> {
  let plan = load_plan(plan_file)?;
  let goal = plan.goal.clone().unwrap_or_default();
  let settings = load_settings(settings_file)?;

  let resolution = resolve(plan, strict)?;
  eprintln!("Resolved plan with {} tasks", resolution.graph.len());

  let client = build_client(&settings.provider)?;
  let context = build_context(&settings, docs_dir)?;
  let config = SchedulerConfig {
    max_concurrency: settings.max_concurrency,
    generation_temperature: settings.provider.generation_temperature,
  };

  let merger = merge.then(|| {
    Merger::new(client.fork()).with_temperature(settings.provider.generation_temperature)
  });
  let scheduler = Scheduler::new(resolution.graph, client, context, config);

  let cancel = CancellationToken::new();
  let on_interrupt = cancel.clone();
  tokio::spawn(async move {
    if tokio::signal::ctrl_c().await.is_ok() {
      on_interrupt.cancel();
    }
  });

  let report = scheduler.run(cancel).await.context("run failed")?;
  eprintln!("Run completed: {}", report.run_id);
  eprintln!("Tasks executed: {}", report.outcomes.len());

  let mut output = serde_json::to_value(&report)?;
  if let Some(merger) = merger {
    let merged = merger
      .merge(&goal, &report.merge_inputs())
      .await
      .context("failed to merge artifacts")?;
    output["merged"] = serde_json::Value::String(merged);
  }

  println!("{}", serde_json::to_string_pretty(&output)?);

  Ok(())
}
