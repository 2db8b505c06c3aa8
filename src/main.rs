use anyhow::{Context, Result};
use stagerun::cli::commands::{HistoryCommand, ListCommand, RunCommand, ValidateCommand};
use stagerun::cli::output::*;
use stagerun::cli::{Cli, Command};
use stagerun::core::config::PipelineConfig;
use stagerun::execution::{ExecutionEngine, ExecutionEvent, ProcessRunner};
use stagerun::persistence::{create_summary, InMemoryPersistence, PersistenceBackend};
use stagerun::ExecutionStatus;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use tracing::{warn, Level};
use tracing_subscriber::FmtSubscriber;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::from_args();

    // Initialize logging
    let log_level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    let subscriber = FmtSubscriber::builder()
        .with_max_level(log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("Failed to set logging subscriber")?;

    // Execute command
    match &cli.command {
        Command::Run(cmd) => run_pipeline(cmd, cli.clone()).await?,
        Command::Validate(cmd) => validate_pipeline(cmd)?,
        Command::List(cmd) => list_pipelines(cmd).await?,
        Command::History(cmd) => show_history(cmd).await?,
    }

    Ok(())
}

#[cfg(feature = "sqlite")]
async fn open_history_store() -> Result<Arc<dyn PersistenceBackend>> {
    use stagerun::persistence::SqliteRunStore;
    Ok(Arc::new(SqliteRunStore::with_default_path().await?))
}

#[cfg(not(feature = "sqlite"))]
async fn open_history_store() -> Result<Arc<dyn PersistenceBackend>> {
    Ok(Arc::new(InMemoryPersistence::new()))
}

async fn run_pipeline(cmd: &RunCommand, cli: Cli) -> Result<()> {
    // Load pipeline config
    let config =
        PipelineConfig::from_file(&cmd.file).context("Failed to load pipeline config")?;

    println!("{} Loaded pipeline: {}", INFO, style(&config.name).bold());

    // Create pipeline
    let mut pipeline = config.to_pipeline();

    // Apply environment overrides
    for (key, value) in &cmd.env {
        pipeline.environment.insert(key.clone(), value.clone());
        println!(
            "{} Environment override: {} = {}",
            INFO,
            style(key).cyan(),
            style(value).dim()
        );
    }

    // Set up history
    let store: Arc<dyn PersistenceBackend> = if cmd.no_history {
        Arc::new(InMemoryPersistence::new())
    } else {
        open_history_store().await?
    };

    // Create execution engine
    let mut engine = ExecutionEngine::new(ProcessRunner::new());

    // Set up event handler for console output
    let show_output = cli.show_output;
    engine.add_event_handler(move |event| {
        if matches!(event, ExecutionEvent::CommandOutput { .. }) && !show_output {
            return;
        }
        println!("{}", format_execution_event(&event));
    });

    // Cancellation takes effect between stages; the current stage finishes
    let cancel = engine.cancel_flag();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Cancellation requested; finishing the current stage");
            cancel.store(true, Ordering::SeqCst);
        }
    });

    // Execute pipeline
    println!();
    let result = engine
        .execute(&mut pipeline)
        .await
        .context("Pipeline run aborted by a host error")?;

    // Write machine-readable report
    if let Some(path) = &cmd.report {
        let json = serde_json::to_string_pretty(&result)?;
        std::fs::write(path, json)
            .with_context(|| format!("Failed to write report to {}", path.display()))?;
        println!("{} Report written to {}", INFO, style(path.display()).dim());
    }

    // Save to history
    if !cmd.no_history {
        let summary = create_summary(&result);
        store.save_run(&summary).await?;
        println!(
            "\n{} Run saved to history (ID: {})",
            INFO,
            style(&summary.run_id.to_string()[..8]).dim()
        );
    }

    // Print final status; the exit code mirrors the stage-sequence verdict
    // only - post-action failures are reported but never flip it
    if result.post_action_errors() > 0 {
        println!(
            "{} {} post-action command(s) failed",
            WARN,
            style(result.post_action_errors()).yellow()
        );
    }

    match result.status {
        ExecutionStatus::Succeeded => {
            println!(
                "\n{} {} {}",
                CHECK,
                style(&pipeline.name).bold(),
                style("succeeded").green()
            );
        }
        ExecutionStatus::Cancelled => {
            println!(
                "\n{} {} {}",
                WARN,
                style(&pipeline.name).bold(),
                style("cancelled").yellow()
            );
            std::process::exit(1);
        }
        _ => {
            if let Some(stage) = result.failed_stage() {
                println!(
                    "\n{} {} {} at stage {}",
                    CROSS,
                    style(&pipeline.name).bold(),
                    style("failed").red(),
                    style(&stage.name).red()
                );
            } else {
                println!(
                    "\n{} {} {}",
                    CROSS,
                    style(&pipeline.name).bold(),
                    style("failed").red()
                );
            }
            std::process::exit(1);
        }
    }

    Ok(())
}

fn validate_pipeline(cmd: &ValidateCommand) -> Result<()> {
    println!("{} Validating pipeline...", INFO);

    let result = PipelineConfig::from_file(&cmd.file);

    match result {
        Ok(config) => {
            println!("{} Pipeline configuration is valid!", CHECK);
            println!("  Name: {}", style(&config.name).bold());
            if let Some(agent) = &config.agent {
                println!("  Agent: {}", style(agent).cyan());
            }
            println!("  Stages: {}", style(config.stages.len()).cyan());
            println!("  Commands: {}", style(config.command_count()).cyan());

            if cmd.json {
                let json = serde_json::to_string_pretty(&config)?;
                println!("\n{}", json);
            }
            Ok(())
        }
        Err(e) => {
            println!("{} Validation failed:", CROSS);
            println!("  {}", style(e).red());
            std::process::exit(1);
        }
    }
}

async fn list_pipelines(cmd: &ListCommand) -> Result<()> {
    let store = open_history_store().await?;
    let pipelines = store.list_pipelines().await?;

    if pipelines.is_empty() {
        println!("{} No pipelines found in history", INFO);
        return Ok(());
    }

    println!("{} Pipelines in history:", INFO);

    for pipeline_name in &pipelines {
        let runs = store.list_runs(pipeline_name).await?;

        if cmd.with_counts {
            let succeeded = runs
                .iter()
                .filter(|r| r.status == ExecutionStatus::Succeeded)
                .count();
            let failed = runs
                .iter()
                .filter(|r| r.status == ExecutionStatus::Failed)
                .count();
            println!(
                "  {} ({} runs: {} succeeded, {} failed)",
                style(pipeline_name).bold(),
                style(runs.len()).cyan(),
                style(succeeded).green(),
                style(failed).red()
            );
        } else {
            println!("  {}", style(pipeline_name).bold());
        }
    }

    if cmd.json {
        let mut json_data = Vec::new();
        for pipeline in &pipelines {
            let runs = store.list_runs(pipeline).await.ok();
            json_data.push(serde_json::json!({
                "name": pipeline,
                "run_count": runs.as_ref().map(|r| r.len()).unwrap_or(0)
            }));
        }
        let data = serde_json::json!({ "pipelines": json_data });
        println!("\n{}", serde_json::to_string_pretty(&data)?);
    }

    Ok(())
}

async fn show_history(cmd: &HistoryCommand) -> Result<()> {
    let store = open_history_store().await?;

    // If a specific run ID is requested
    if let Some(run_id_str) = &cmd.run_id {
        let run_id = uuid::Uuid::parse_str(run_id_str).context("Invalid run ID format")?;
        let summary = store.load_run(run_id).await?;

        match summary {
            Some(summary) => {
                print_run_details(&summary, cmd.verbose)?;
            }
            None => {
                println!("{} Run not found", WARN);
            }
        }
        return Ok(());
    }

    // List runs for pipeline or all
    let runs = if let Some(pipeline_name) = &cmd.pipeline {
        store.list_runs(pipeline_name).await?
    } else {
        let pipelines = store.list_pipelines().await?;
        let mut all_runs = Vec::new();
        for pipeline in &pipelines {
            all_runs.extend(store.list_runs(pipeline).await?);
        }
        // Sort by started_at descending
        all_runs.sort_by(|a, b| b.started_at.cmp(&a.started_at));
        all_runs.into_iter().take(cmd.limit).collect()
    };

    if runs.is_empty() {
        println!("{} No runs found", INFO);
        return Ok(());
    }

    println!("{} Run history (showing latest {}):", INFO, cmd.limit);

    if cmd.json {
        let data = serde_json::json!({ "runs": runs });
        println!("{}", serde_json::to_string_pretty(&data)?);
    } else {
        for summary in &runs {
            println!("  {}", format_run_summary(summary));
        }
    }

    Ok(())
}

fn print_run_details(summary: &stagerun::RunSummary, verbose: bool) -> Result<()> {
    println!("{} Run Details", INFO);
    println!("  ID: {}", style(summary.run_id).cyan());
    println!("  Pipeline: {}", style(&summary.pipeline_name).bold());
    println!("  Status: {}", format_status(summary.status));
    println!("  Started: {}", style(summary.started_at.to_rfc3339()).dim());
    if let Some(finished) = summary.finished_at {
        println!("  Finished: {}", style(finished.to_rfc3339()).dim());
        if let Ok(duration) = finished.signed_duration_since(summary.started_at).to_std() {
            println!("  Duration: {}", style(format_duration(duration)).dim());
        }
    }
    println!(
        "  Stages: {}/{} succeeded",
        summary.stages_succeeded, summary.stages_total
    );
    if let Some(failed_stage) = &summary.failed_stage {
        println!("  Failed stage: {}", style(failed_stage).red());
    }
    if summary.post_action_errors > 0 {
        println!(
            "  Post-action errors: {}",
            style(summary.post_action_errors).yellow()
        );
    }

    if verbose {
        println!("\n  {}", style("Full details:").bold());
        let json = serde_json::to_string_pretty(summary)?;
        for line in json.lines() {
            println!("    {}", line);
        }
    }

    Ok(())
}

fn format_duration(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m {}s", secs / 3600, (secs % 3600) / 60, secs % 60)
    }
}
