// SCHEDCMP -- OLD VS NEW SCHEDULER BENCHMARK HARNESS
// FLAGS -> BenchConfig -> PIPELINE. ALL LOGIC LIVES IN THE LIBRARY.

use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use schedcmp::config::{self, BenchConfig};
use schedcmp::orchestrate::MakeBackend;
use schedcmp::{procgroup, report, BenchError};

static INTERRUPTS: AtomicU32 = AtomicU32::new(0);

#[derive(Parser)]
#[command(name = "schedcmp")]
#[command(about = "SCHEDCMP -- OLD VS NEW SCHEDULER BENCHMARK HARNESS")]
struct Cli {
    // SCENARIO IDS (COMPILED IN AS -DTEST_SCENARIO=<id>)
    #[arg(long, value_delimiter = ',', default_values_t = config::DEFAULT_SCENARIOS)]
    scenarios: Vec<u32>,

    // PAIRED TRIALS PER SCENARIO
    #[arg(long, default_value_t = config::DEFAULT_REPEAT)]
    repeat: u32,

    // BUILD SYSTEM PROGRAM
    #[arg(long, default_value = config::DEFAULT_MAKE)]
    make: PathBuf,

    // BUILD TARGET
    #[arg(long, default_value = config::DEFAULT_BUILD_TARGET)]
    target: String,

    // RUN TARGET
    #[arg(long, default_value = config::DEFAULT_RUN_TARGET)]
    run_target: String,

    // PROJECT ROOT (CONTAINS THE MAKEFILE)
    #[arg(long, default_value = ".")]
    workdir: PathBuf,

    // EXTRA MAKE VARIABLE, KEY=VALUE (REPEATABLE)
    #[arg(long = "var", value_name = "KEY=VALUE")]
    vars: Vec<String>,

    // SKIP `make clean` BEFORE EACH BUILD
    #[arg(long)]
    no_clean: bool,

    // NOMINAL LOAD % PER SCENARIO, IN SCENARIO ORDER (DISPLAY ONLY)
    #[arg(long, value_delimiter = ',', default_values_t = config::DEFAULT_LOAD_PERCENTS)]
    loads: Vec<u32>,

    // SIGINT -> SIGKILL GRACE PERIOD IN MILLISECONDS
    #[arg(long, default_value_t = config::DEFAULT_GRACE.as_millis() as u64)]
    grace_ms: u64,

    // OUTPUT LINE THAT ENDS A TRIAL
    #[arg(long, default_value = schedcmp::trial::DEFAULT_END_MARKER)]
    marker: String,

    // WHERE THE CHARTS GO
    #[arg(long, default_value = ".")]
    out_dir: PathBuf,

    // ALSO SAVE THE STATISTICS BLOCK HERE
    #[arg(long)]
    report: Option<PathBuf>,

    // DEBUG-LEVEL DIAGNOSTICS ON STDERR
    #[arg(long)]
    verbose: bool,
}

impl Cli {
    fn into_config(self) -> Result<BenchConfig> {
        let make_vars = self
            .vars
            .iter()
            .map(|v| config::parse_make_var(v))
            .collect::<schedcmp::Result<Vec<_>>>()?;
        Ok(BenchConfig {
            scenarios: config::scenarios_with_loads(&self.scenarios, &self.loads),
            repeat: self.repeat,
            make_program: self.make,
            build_target: self.target,
            run_target: self.run_target,
            workdir: self.workdir,
            make_vars,
            clean: !self.no_clean,
            grace: Duration::from_millis(self.grace_ms),
            end_marker: self.marker,
            out_dir: self.out_dir,
        })
    }
}

fn init_logging(verbose: bool) {
    let default = if verbose { "debug" } else { "warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);
    let report_path = cli.report.clone();
    let config = cli.into_config().context("BAD ARGUMENTS")?;
    config.validate().context("BAD ARGUMENTS")?;

    // FIRST CTRL+C: INTERRUPT THE ACTIVE TRIAL'S GROUP AND STOP.
    // SECOND: THE WORKLOAD IGNORED SIGINT, KILL IT.
    let stop = Arc::new(AtomicBool::new(false));
    let handler_stop = stop.clone();
    ctrlc::set_handler(move || {
        handler_stop.store(true, Ordering::Relaxed);
        if INTERRUPTS.fetch_add(1, Ordering::SeqCst) == 0 {
            procgroup::interrupt_active();
        } else {
            procgroup::kill_active();
        }
    })?;

    report::print_banner(&config);

    let runner = config.trial_runner().with_stop_flag(stop.clone());
    let backend = MakeBackend::new(&config, runner);
    // A CTRL+C DURING A BUILD ALSO HITS make (SAME TERMINAL GROUP) AND
    // SURFACES AS A BUILD FAILURE. REPORT IT AS WHAT IT WAS.
    let outcome = schedcmp::run_with(&config, backend, true)
        .map_err(|e| if stop.load(Ordering::Relaxed) { BenchError::Interrupted } else { e })
        .context("BENCHMARK ABORTED")?;

    println!("ALL TESTS FINISHED.");
    println!();
    report::print_summary(&outcome.summaries);

    if let Some(path) = report_path {
        report::save_report(&path, &outcome.report).context("SAVING REPORT")?;
        println!("REPORT SAVED TO {}", path.display());
    }
    for path in &outcome.charts {
        println!("CHART SAVED TO {}", path.display());
    }

    Ok(())
}
