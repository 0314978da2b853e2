// SCHEDCMP -- OLD VS NEW SCHEDULER BENCHMARK HARNESS
// REBUILDS AND RUNS BOTH VARIANTS OF THE PROGRAM UNDER TEST PER SCENARIO,
// SCRAPES TIMINGS FROM ITS OUTPUT, AND REDUCES THE PAIRED TRIALS TO
// PER-SCENARIO STATISTICS AND TWO COMPARISON CHARTS.
//
// PIPELINE: orchestrate -> (build, trial -> extract) -> stats -> report/chart

pub mod build;
pub mod chart;
pub mod config;
pub mod error;
pub mod extract;
pub mod orchestrate;
pub mod procgroup;
pub mod report;
pub mod stats;
pub mod trial;

use std::path::PathBuf;

pub use config::{BenchConfig, Scenario};
pub use error::{BenchError, Result};

// WHAT A FINISHED RUN PRODUCED
#[derive(Debug)]
pub struct RunOutcome {
    pub summaries: Vec<stats::ScenarioSummary>,
    pub report: String,
    pub charts: Vec<PathBuf>,
}

// FULL PIPELINE OVER ANY BACKEND. FATAL ERRORS PROPAGATE UNTOUCHED.
// NO DATA -> NOTICE IN THE REPORT, NO CHARTS.
pub fn run_with<B: orchestrate::TrialBackend>(
    config: &BenchConfig,
    backend: B,
    verbose: bool,
) -> Result<RunOutcome> {
    config.validate()?;
    let mut orch = orchestrate::Orchestrator::new(config, backend);
    if !verbose {
        orch = orch.quiet();
    }
    let series = orch.run()?;
    let summaries = stats::summarize(series);
    let report = report::format_summary(&summaries);
    let charts = chart::write_charts(&config.out_dir, &summaries, config.repeat)?;
    Ok(RunOutcome {
        summaries,
        report,
        charts,
    })
}
