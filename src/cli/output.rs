//! CLI output formatting

use crate::{
    core::{ExecutionStatus, StageStatus},
    execution::ExecutionEvent,
    persistence::RunSummary,
};
use console::Emoji;
use indicatif::{ProgressBar, ProgressStyle};
use std::time::Duration;

// Re-export style
pub use console::style;

// Emojis for output
pub static CHECK: Emoji<'_, '_> = Emoji("✅ ", "✓ ");
pub static CROSS: Emoji<'_, '_> = Emoji("❌ ", "✗ ");
pub static SPINNER: Emoji<'_, '_> = Emoji("⏳ ", "~ ");
pub static INFO: Emoji<'_, '_> = Emoji("ℹ️  ", "i ");
pub static WARN: Emoji<'_, '_> = Emoji("⚠️  ", "!");
pub static ROCKET: Emoji<'_, '_> = Emoji("🚀 ", "> ");

/// Create a progress bar over the stage count
pub fn create_progress_bar(total: usize) -> ProgressBar {
    let progress = ProgressBar::new(total as u64);
    if let Ok(bar_style) = ProgressStyle::default_bar()
        .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
    {
        progress.set_style(bar_style.progress_chars("#>-"));
    }
    progress.enable_steady_tick(Duration::from_millis(100));
    progress
}

/// Format a stage status for display
pub fn format_stage_status(status: StageStatus) -> String {
    match status {
        StageStatus::Pending => style("PENDING").dim().to_string(),
        StageStatus::Running => style("RUNNING").yellow().to_string(),
        StageStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        StageStatus::Failed => style("FAILED").red().to_string(),
        StageStatus::Skipped => style("SKIPPED").dim().to_string(),
    }
}

/// Format an execution status for display
pub fn format_status(status: ExecutionStatus) -> String {
    match status {
        ExecutionStatus::Pending => style("PENDING").dim().to_string(),
        ExecutionStatus::Running => style("RUNNING").yellow().to_string(),
        ExecutionStatus::Succeeded => style("SUCCEEDED").green().to_string(),
        ExecutionStatus::Failed => style("FAILED").red().to_string(),
        ExecutionStatus::Cancelled => style("CANCELLED").yellow().to_string(),
    }
}

/// Format a run summary for display
pub fn format_run_summary(summary: &RunSummary) -> String {
    let status_icon = match summary.status {
        ExecutionStatus::Succeeded => CHECK,
        ExecutionStatus::Failed => CROSS,
        ExecutionStatus::Running => SPINNER,
        _ => INFO,
    };

    let mut line = format!(
        "{} {} - {} - {} ({}/{} stages)",
        status_icon,
        style(&summary.run_id.to_string()[..8]).dim(),
        style(&summary.pipeline_name).bold(),
        format_status(summary.status),
        summary.stages_succeeded,
        summary.stages_total,
    );

    if let Some(failed_stage) = &summary.failed_stage {
        line.push_str(&format!(" - failed at {}", style(failed_stage).red()));
    }
    if summary.post_action_errors > 0 {
        line.push_str(&format!(
            " - {} post-action error(s)",
            style(summary.post_action_errors).yellow()
        ));
    }

    line
}

/// Format an execution event for display
pub fn format_execution_event(event: &ExecutionEvent) -> String {
    match event {
        ExecutionEvent::PipelineStarted {
            run_id,
            pipeline_name,
        } => format!(
            "{} Starting pipeline {} ({})",
            ROCKET,
            style(pipeline_name).bold(),
            style(&run_id.to_string()[..8]).dim()
        ),
        ExecutionEvent::StageStarted { stage } => {
            format!("{} stage {}", SPINNER, style(stage).cyan())
        }
        ExecutionEvent::CommandStarted { command, .. } => {
            format!("   {} {}", style("$").dim(), style(command).dim())
        }
        ExecutionEvent::CommandOutput { output, .. } => format_output(output, 20),
        ExecutionEvent::CommandFinished {
            command,
            success,
            duration_ms,
            ..
        } => {
            let icon = if *success { CHECK } else { CROSS };
            format!(
                "   {}{} ({}ms)",
                icon,
                style(command).dim(),
                style(duration_ms).dim()
            )
        }
        ExecutionEvent::StageSucceeded { stage } => {
            format!("{} stage {}", CHECK, style(stage).green())
        }
        ExecutionEvent::StageFailed {
            stage,
            command,
            detail,
        } => format!(
            "{} stage {}: {} ({})",
            CROSS,
            style(stage).red(),
            style(command).bold(),
            style(detail).dim()
        ),
        ExecutionEvent::StageSkipped { stage } => {
            format!("{} stage {} skipped", INFO, style(stage).dim())
        }
        ExecutionEvent::PostActionStarted { command } => {
            format!("{} post {}", INFO, style(command).dim())
        }
        ExecutionEvent::PostActionFailed { command, detail } => format!(
            "{} post-action failed: {} ({})",
            WARN,
            style(command).yellow(),
            style(detail).dim()
        ),
        ExecutionEvent::PipelineCompleted { run_id, status } => {
            let status_str = match status {
                ExecutionStatus::Succeeded => style("succeeded").green().to_string(),
                ExecutionStatus::Failed => style("failed").red().to_string(),
                ExecutionStatus::Cancelled => style("cancelled").yellow().to_string(),
                _ => format!("{:?}", status),
            };
            format!(
                "{} Pipeline ({}) {}",
                INFO,
                style(&run_id.to_string()[..8]).dim(),
                status_str
            )
        }
    }
}

/// Format command output with truncation
pub fn format_output(output: &str, max_lines: usize) -> String {
    let lines: Vec<&str> = output.lines().collect();

    if lines.len() <= max_lines {
        output.trim_end().to_string()
    } else {
        let truncated = lines[..max_lines].join("\n");
        format!(
            "{}\n{} ({} more lines)",
            truncated,
            style("[truncated]").dim(),
            lines.len() - max_lines
        )
    }
}
