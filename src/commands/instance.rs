// src/commands/instance.rs

use std::io::Write;

use chrono::Utc;

use crate::cli::InstanceArgs;
use crate::criteria::RunCriteria;
use crate::engine::{open_detail, DetailView, LiveRow, LiveView};
use crate::errors::{Result, TaroError};
use crate::types::{MatchingStrategy, SortOption};
use crate::view::table::{format_exec_time, format_timestamp};

use super::CommandContext;

/// Pick row `--index` among the active runs matching the pattern and show
/// its detail. The selection is resolved against the environment again, so
/// a run that ended in between is reported as unavailable.
pub async fn run<W: Write>(ctx: &CommandContext, args: &InstanceArgs, out: &mut W) -> Result<DetailView> {
    let criteria = RunCriteria::parse(&args.pattern, MatchingStrategy::Partial)?;
    let mut runs = ctx.connector.get_active_runs(&criteria).await?;
    SortOption::Created.sort_runs(&mut runs, false, Utc::now());

    let view = LiveView {
        env_id: ctx.connector.env_id().to_string(),
        rows: runs
            .into_iter()
            .map(|run| LiveRow { run, ended: false })
            .collect(),
        notice: None,
    };
    let id = view.select(args.index).ok_or_else(|| {
        TaroError::InstanceNotFound(format!("{} (row {})", args.pattern, args.index))
    })?;

    let detail = open_detail(ctx.connector.as_ref(), &id).await?;
    match &detail {
        DetailView::Live(instance) => {
            let run = instance.snap();
            writeln!(out, "{}", run.instance_id)?;
            writeln!(out, "  stage:   {}", run.stage)?;
            writeln!(out, "  created: {}", format_timestamp(run.created_at))?;
            writeln!(out, "  time:    {}", format_exec_time(run.exec_time(Utc::now())))?;
            for phase in &run.phases {
                match phase.waiting {
                    Some(control) => writeln!(
                        out,
                        "  phase {}: {} (waiting for {control})",
                        phase.phase_id, phase.stage
                    )?,
                    None => writeln!(out, "  phase {}: {}", phase.phase_id, phase.stage)?,
                }
            }
            if let Some(status) = &run.status {
                writeln!(out, "  status:  {status}")?;
            }
            for warning in &run.warnings {
                writeln!(out, "  warning: {warning}")?;
            }
        }
        DetailView::Unavailable(id) => {
            writeln!(out, "{id} is no longer available")?;
        }
    }
    Ok(detail)
}
