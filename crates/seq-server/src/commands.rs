//! Subcommand implementations

use anyhow::Result;
use seq_core::{CancellationToken, IssueFormatter, ProgressKind, ProgressSink, ProgressUpdate};
use seq_model::{NodeId, NodeKind, SequenceTree, ValidationReport};
use seq_script::{RunOutcome, RunReport, Sequencer};
use std::fmt::Write;
use std::process::ExitCode;
use std::time::Duration;
use tracing::warn;

/// Prints progress updates to stdout
#[derive(Debug, Default)]
pub struct ConsoleProgress;

impl ProgressSink for ConsoleProgress {
    fn report(&self, update: ProgressUpdate) {
        println!("{}", progress_line(&update));
    }
}

/// One console line per update
pub fn progress_line(update: &ProgressUpdate) -> String {
    let entity = update.entity.as_deref().unwrap_or("-");
    match update.kind {
        ProgressKind::RunStarted => format!("▶ {}", update.message),
        ProgressKind::RunFinished => format!("■ {}", update.message),
        ProgressKind::EntityStarted => format!("  {entity}: started"),
        ProgressKind::EntityFinished => {
            let status = update
                .status
                .map(|status| status.to_string())
                .unwrap_or_default();
            format!("  {entity}: {status} ({})", update.message)
        }
        ProgressKind::TriggerFired => format!("  ↻ {entity}: {}", update.message),
        ProgressKind::LoopPass => format!("  {entity}: {}", update.message),
        ProgressKind::Status => match update.percent {
            Some(percent) => format!("  {entity}: {} [{percent:.0}%]", update.message),
            None => format!("  {entity}: {}", update.message),
        },
    }
}

/// Run the sequence until it ends or Ctrl-C cancels it
pub async fn run(sequencer: &Sequencer) -> Result<RunReport> {
    let token = CancellationToken::new();
    let signal_token = token.clone();
    let signal = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, cancelling the run");
            signal_token.cancel();
        }
    });

    let report = sequencer.start(&ConsoleProgress, &token).await;
    signal.abort();
    Ok(report?)
}

/// Exit status for a finished run
pub fn run_exit_code(outcome: &RunOutcome) -> ExitCode {
    match outcome {
        RunOutcome::Finished => ExitCode::SUCCESS,
        RunOutcome::Failed(_) => ExitCode::from(1),
        RunOutcome::Invalid => ExitCode::from(2),
        RunOutcome::Cancelled => ExitCode::from(130),
    }
}

/// `entity: message` lines for every validation issue
pub fn validation_lines(report: &ValidationReport, formatter: &dyn IssueFormatter) -> Vec<String> {
    report
        .entries()
        .iter()
        .map(|entry| format!("{}: {}", entry.entity, formatter.format(&entry.issue)))
        .collect()
}

/// Indented outline of the tree with estimates
pub fn outline(tree: &SequenceTree) -> Result<String> {
    let mut out = String::new();
    outline_node(tree, tree.root(), 0, &mut out)?;
    Ok(out)
}

fn outline_node(tree: &SequenceTree, id: NodeId, depth: usize, out: &mut String) -> Result<()> {
    let node = tree.node(id)?;
    let indent = "  ".repeat(depth);
    let estimate = format_duration(tree.estimated_duration(id)?);
    let disabled = if node.info().enabled { "" } else { " (disabled)" };

    match node.kind() {
        NodeKind::Item(item) => {
            writeln!(out, "{indent}- {} [{}] ~{estimate}{disabled}", node.name(), item.kind())?;
        }
        NodeKind::Container(container) => {
            writeln!(
                out,
                "{indent}+ {} [{}] ~{estimate}{disabled}",
                node.name(),
                container.strategy.as_str()
            )?;
            if let Some(target) = &container.target {
                writeln!(out, "{indent}    target: {} ({})", target.name, target.coordinates)?;
            }
            for slot in container.conditions() {
                writeln!(out, "{indent}    ? {} [{}]", slot.info.name, slot.condition.kind())?;
            }
            for slot in container.triggers() {
                writeln!(out, "{indent}    ! {} [{}]", slot.info.name, slot.trigger.kind())?;
                if let Some(sequence) = &slot.sequence {
                    outline_node(sequence, sequence.root(), depth + 3, out)?;
                }
            }
            for child in container.children() {
                outline_node(tree, *child, depth + 1, out)?;
            }
        }
    }
    Ok(())
}

/// `1h 02m 03s`, `4m 05s` or `12s`
pub fn format_duration(duration: Duration) -> String {
    let total = duration.as_secs();
    let (hours, minutes, seconds) = (total / 3600, total / 60 % 60, total % 60);
    if hours > 0 {
        format!("{hours}h {minutes:02}m {seconds:02}s")
    } else if minutes > 0 {
        format!("{minutes}m {seconds:02}s")
    } else {
        format!("{seconds}s")
    }
}
