// SCHEDCMP CONSOLE REPORT
// PER-REPEAT PROGRESS BLOCKS AND THE FINAL PER-SCENARIO STATISTICS.
// FORMATTING ONLY. NUMBERS COME FROM orchestrate AND stats.

use std::fs;
use std::path::Path;

use crate::config::BenchConfig;
use crate::error::{BenchError, Result};
use crate::orchestrate::PairedTrial;
use crate::stats::ScenarioSummary;

pub const NO_DATA_NOTICE: &str = "No improvement data collected; skip stats and plotting.";

// "1.12x"
pub fn fmt_factor(r: f64) -> String {
    format!("{r:.2}x")
}

// >= 1 IS FASTER THAN OLD, < 1 IS SLOWER
pub fn fmt_factor_with_dir(r: f64) -> String {
    if r >= 1.0 {
        format!("{r:.2}x faster")
    } else {
        format!("{r:.2}x (slower than OLD)")
    }
}

// "1234ns (1.234µs)"
pub fn fmt_ns_and_us(ns: f64) -> String {
    if ns.is_nan() {
        return "n/a".to_string();
    }
    format!("{:.0}ns ({:.3}µs)", ns, ns / 1000.0)
}

fn fmt_opt<T: std::fmt::Display>(v: Option<T>, unit: &str) -> String {
    match v {
        Some(v) => format!("{v}{unit}"),
        None => "n/a".to_string(),
    }
}

pub fn print_banner(config: &BenchConfig) {
    let ids: Vec<String> = config.scenarios.iter().map(|s| s.id.to_string()).collect();
    println!("SCHEDULER BENCHMARK: OLD VS NEW");
    println!("{}", "=".repeat(50));
    println!("SCENARIOS:       [{}]", ids.join(", "));
    println!("REPEAT:          {}", config.repeat);
    println!("BUILD:           {} {}", config.make_program.display(), config.build_target);
    println!("RUN:             {} {}", config.make_program.display(), config.run_target);
    println!("WORKDIR:         {}", config.workdir.display());
    println!("CLEAN:           {}", config.clean);
    println!();
}

pub fn format_trial(label: &str, scenario_id: u32, run_idx: u32, pair: &PairedTrial) -> String {
    let old = &pair.old;
    let new = &pair.new;
    let diff = pair.diff_ns();
    let mut out = String::new();
    out.push_str(&format!("Scenario: {label} (id={scenario_id}), run #{run_idx}\n"));
    out.push_str(&format!("  Total task count: {}\n", old.task_count));
    out.push_str(&format!("  Active task ratio: {}\n", fmt_opt(old.active_ratio, " %")));
    if let Some(dist) = &old.distribution {
        let d: Vec<String> = dist.iter().map(u32::to_string).collect();
        out.push_str(&format!("  Priority distribution (0-7): {}\n", d.join(" ")));
    }
    out.push_str(&format!(
        "  Old  avg sched time: {}  max sched time: {}\n",
        fmt_ns_and_us(old.avg_ns),
        fmt_ns_and_us(old.max_ns)
    ));
    out.push_str(&format!(
        "  New  avg sched time: {}  max sched time: {}\n",
        fmt_ns_and_us(new.avg_ns),
        fmt_ns_and_us(new.max_ns)
    ));
    out.push_str(&format!("  Sched time difference: {diff:.0}ns ({:.3}µs)\n", diff / 1000.0));
    out.push_str(&format!("  Instant improvement : {}\n", fmt_factor_with_dir(pair.improvement_ratio())));
    out
}

pub fn print_trial(label: &str, scenario_id: u32, run_idx: u32, pair: &PairedTrial) {
    println!("{}", format_trial(label, scenario_id, run_idx, pair));
}

pub fn format_summary(summaries: &[ScenarioSummary]) -> String {
    if summaries.is_empty() {
        return format!("{NO_DATA_NOTICE}\n");
    }
    let mut out = String::new();
    out.push_str("Per-scenario statistics (improvement vs OLD):\n\n");
    for s in summaries {
        let st = &s.stats;
        out.push_str(&format!(
            "Scenario '{}' (id={}, load {}%, n={}):\n",
            s.series.label, s.series.scenario.id, s.series.scenario.load_percent, st.n
        ));
        out.push_str(&format!("  mean improvement        = {}\n", fmt_factor_with_dir(st.mean_ratio)));
        out.push_str(&format!("  std dev of improvement  = {}\n", fmt_factor(st.stdev_ratio)));
        out.push_str(&format!(
            "  min / max improvement   = {}  /  {}\n",
            fmt_factor(st.min_ratio),
            fmt_factor(st.max_ratio)
        ));
        out.push_str(&format!(
            "  95% CI of improvement   = [{}, {}]\n",
            fmt_factor(st.ci_low()),
            fmt_factor(st.ci_high())
        ));
        out.push_str(&format!("  mean old sched time     = {}\n", fmt_ns_and_us(st.mean_old_avg_ns)));
        out.push_str(&format!("  mean new sched time     = {}\n", fmt_ns_and_us(st.mean_new_avg_ns)));
        out.push_str(&format!("  max  old sched time     = {}\n", fmt_ns_and_us(st.max_old_max_ns)));
        out.push_str(&format!("  max  new sched time     = {}\n", fmt_ns_and_us(st.max_new_max_ns)));
        out.push('\n');
    }
    out
}

pub fn print_summary(summaries: &[ScenarioSummary]) {
    print!("{}", format_summary(summaries));
}

pub fn save_report(path: &Path, content: &str) -> Result<()> {
    let write_err = |source| BenchError::OutputWrite {
        path: path.to_path_buf(),
        source,
    };
    if let Some(dir) = path.parent().filter(|d| !d.as_os_str().is_empty()) {
        fs::create_dir_all(dir).map_err(write_err)?;
    }
    fs::write(path, content).map_err(write_err)
}
