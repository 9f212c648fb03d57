//! `overstory metrics [--last <n>] [--json]` — aggregate per-tool timing
//! stats derived from the event store.

use anyhow::Result;
use clap::Args;
use overstory_core::ToolStats;
use serde::Serialize;

use crate::context::AppContext;
use crate::output::Reportable;

#[derive(Debug, Args)]
pub struct MetricsArgs {
    /// Limit the table to the `n` tools with the highest call count.
    #[arg(long)]
    pub last: Option<usize>,
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize)]
struct MetricsReport {
    tools: Vec<ToolStats>,
}

impl Reportable for MetricsReport {
    fn to_human(&self) -> String {
        if self.tools.is_empty() {
            return "(no tool activity recorded)".to_string();
        }
        self.tools
            .iter()
            .map(|t| {
                format!(
                    "{}\tcalls={}\tavg={:.1}ms\tmax={}ms\terrors={}",
                    t.tool_name, t.call_count, t.avg_duration_ms, t.max_duration_ms, t.error_count
                )
            })
            .collect::<Vec<_>>()
            .join("\n")
    }
}

pub fn run(ctx: &AppContext, args: MetricsArgs) -> Result<()> {
    let mut tools = ctx.events.get_tool_stats()?;
    tools.sort_by(|a, b| b.call_count.cmp(&a.call_count));
    if let Some(n) = args.last {
        tools.truncate(n);
    }
    MetricsReport { tools }.print(args.json);
    Ok(())
}
