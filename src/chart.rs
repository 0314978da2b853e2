// SCHEDCMP REPORT RENDERER
// TWO SCATTER CHARTS AS STANDALONE SVG:
//   bench_improvement.svg    -- PER TRIAL (ratio - 1), MEAN MARKED "1.23x"
//   bench_new_sched_time.svg -- PER TRIAL NEW AVG (ns), MEAN MARKED "512ns"
// ONE COLUMN PER SCENARIO, TICK LABEL "<name>" OVER "(<load>%)".
// RENDERING IS PURE (SUMMARIES -> String). ONLY write_charts TOUCHES DISK.

use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{BenchError, Result};
use crate::stats::ScenarioSummary;

pub const IMPROVEMENT_FILE: &str = "bench_improvement.svg";
pub const NEW_TIME_FILE: &str = "bench_new_sched_time.svg";

const WIDTH: f64 = 960.0;
const HEIGHT: f64 = 720.0;
const MARGIN_LEFT: f64 = 100.0;
const MARGIN_RIGHT: f64 = 40.0;
const MARGIN_TOP: f64 = 60.0;
const MARGIN_BOTTOM: f64 = 100.0;
const MAX_Y_TICKS: usize = 10;
const POINT_RADIUS: f64 = 3.5;
const MEAN_ARM: f64 = 7.0;

// MATPLOTLIB tab10
const PALETTE: [&str; 10] = [
    "#1f77b4", "#ff7f0e", "#2ca02c", "#d62728", "#9467bd",
    "#8c564b", "#e377c2", "#7f7f7f", "#bcbd22", "#17becf",
];

struct Column {
    name: String,
    load_percent: u32,
    points: Vec<f64>,
    mean: f64,
    annotation: String,
}

struct Plot {
    title: String,
    y_label: String,
    columns: Vec<Column>,
}

fn escape(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            _ => out.push(c),
        }
    }
    out
}

// STEP FROM {1, 2, 2.5, 5} x 10^k GIVING AT MOST max_ticks INTERVALS
pub fn nice_step(span: f64, max_ticks: usize) -> f64 {
    if !(span.is_finite() && span > 0.0) {
        return 1.0;
    }
    let raw = span / max_ticks.max(1) as f64;
    let mag = 10f64.powf(raw.log10().floor());
    for m in [1.0, 2.0, 2.5, 5.0, 10.0] {
        if m * mag >= raw {
            return m * mag;
        }
    }
    10.0 * mag
}

// TICKS COVERING [lo, hi] ON A NICE GRID
pub fn nice_ticks(lo: f64, hi: f64, max_ticks: usize) -> Vec<f64> {
    let step = nice_step(hi - lo, max_ticks);
    let first = (lo / step).floor() as i64;
    let last = (hi / step).ceil() as i64;
    (first..=last)
        .map(|i| {
            let v = i as f64 * step;
            if v.abs() < step * 1e-9 { 0.0 } else { v }
        })
        .collect()
}

fn tick_text(v: f64) -> String {
    let s = format!("{v:.6}");
    let s = s.trim_end_matches('0').trim_end_matches('.');
    if s == "-0" { "0".to_string() } else { s.to_string() }
}

// FINITE DATA RANGE WITH 5% PADDING. DEGENERATE RANGES ARE WIDENED.
fn y_range(columns: &[Column]) -> (f64, f64) {
    let finite = columns
        .iter()
        .flat_map(|c| c.points.iter().copied().chain(std::iter::once(c.mean)))
        .filter(|v| v.is_finite());
    let (lo, hi) = finite.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| (lo.min(v), hi.max(v)));
    if !lo.is_finite() {
        return (0.0, 1.0);
    }
    if hi - lo <= f64::EPSILON * lo.abs().max(1.0) {
        let pad = if lo == 0.0 { 1.0 } else { lo.abs() * 0.1 };
        return (lo - pad, hi + pad);
    }
    let pad = (hi - lo) * 0.05;
    (lo - pad, hi + pad)
}

fn render(plot: &Plot) -> String {
    let plot_w = WIDTH - MARGIN_LEFT - MARGIN_RIGHT;
    let plot_h = HEIGHT - MARGIN_TOP - MARGIN_BOTTOM;
    let (lo, hi) = y_range(&plot.columns);
    let ticks = nice_ticks(lo, hi, MAX_Y_TICKS);
    let y_min = ticks.first().copied().unwrap_or(lo);
    let y_max = ticks.last().copied().unwrap_or(hi);
    let y_span = if y_max > y_min { y_max - y_min } else { 1.0 };

    let y_px = |v: f64| MARGIN_TOP + plot_h * (1.0 - (v - y_min) / y_span);
    let band = plot_w / plot.columns.len().max(1) as f64;
    let x_px = |i: usize| MARGIN_LEFT + band * (i as f64 + 0.5);

    let mut svg = String::new();
    svg.push_str(&format!(
        "<svg xmlns=\"http://www.w3.org/2000/svg\" width=\"{WIDTH}\" height=\"{HEIGHT}\" viewBox=\"0 0 {WIDTH} {HEIGHT}\">\n"
    ));
    svg.push_str("  <style>\n");
    svg.push_str("    .title { font: bold 16px sans-serif; fill: #222; }\n");
    svg.push_str("    .axis { font: 13px sans-serif; fill: #222; }\n");
    svg.push_str("    .tick { font: 11px sans-serif; fill: #333; }\n");
    svg.push_str("    .note { font: 11px sans-serif; fill: #000; }\n");
    svg.push_str("  </style>\n");
    svg.push_str(&format!("  <rect width=\"{WIDTH}\" height=\"{HEIGHT}\" fill=\"#ffffff\"/>\n"));

    // TITLE AND AXIS LABELS
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"title\">{}</text>\n",
        WIDTH / 2.0,
        MARGIN_TOP / 2.0 + 6.0,
        escape(&plot.title)
    ));
    svg.push_str(&format!(
        "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"axis\">Scenario (with load %)</text>\n",
        MARGIN_LEFT + plot_w / 2.0,
        HEIGHT - 20.0
    ));
    let yl_x = 24.0;
    let yl_y = MARGIN_TOP + plot_h / 2.0;
    svg.push_str(&format!(
        "  <text x=\"{yl_x:.1}\" y=\"{yl_y:.1}\" text-anchor=\"middle\" class=\"axis\" transform=\"rotate(-90 {yl_x:.1} {yl_y:.1})\">{}</text>\n",
        escape(&plot.y_label)
    ));

    // Y GRID AND TICKS
    for &t in &ticks {
        let y = y_px(t);
        svg.push_str(&format!(
            "  <line x1=\"{MARGIN_LEFT:.1}\" y1=\"{y:.1}\" x2=\"{:.1}\" y2=\"{y:.1}\" stroke=\"#e0e0e0\"/>\n",
            MARGIN_LEFT + plot_w
        ));
        svg.push_str(&format!(
            "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"end\" class=\"tick\">{}</text>\n",
            MARGIN_LEFT - 8.0,
            y + 4.0,
            tick_text(t)
        ));
    }

    // FRAME
    svg.push_str(&format!(
        "  <rect x=\"{MARGIN_LEFT:.1}\" y=\"{MARGIN_TOP:.1}\" width=\"{plot_w:.1}\" height=\"{plot_h:.1}\" fill=\"none\" stroke=\"#333\"/>\n"
    ));

    for (i, col) in plot.columns.iter().enumerate() {
        let x = x_px(i);
        let color = PALETTE[i % PALETTE.len()];

        // X TICK: NAME OVER LOAD
        let base = MARGIN_TOP + plot_h;
        svg.push_str(&format!(
            "  <line x1=\"{x:.1}\" y1=\"{base:.1}\" x2=\"{x:.1}\" y2=\"{:.1}\" stroke=\"#333\"/>\n",
            base + 5.0
        ));
        svg.push_str(&format!(
            "  <text x=\"{x:.1}\" y=\"{:.1}\" text-anchor=\"middle\" class=\"tick\"><tspan x=\"{x:.1}\">{}</tspan><tspan x=\"{x:.1}\" dy=\"14\">({}%)</tspan></text>\n",
            base + 20.0,
            escape(&col.name),
            col.load_percent
        ));

        for &v in col.points.iter().filter(|v| v.is_finite()) {
            svg.push_str(&format!(
                "  <circle cx=\"{x:.1}\" cy=\"{:.1}\" r=\"{POINT_RADIUS}\" fill=\"{color}\" fill-opacity=\"0.6\"/>\n",
                y_px(v)
            ));
        }

        if col.mean.is_finite() {
            let y = y_px(col.mean);
            svg.push_str(&format!(
                "  <path d=\"M{:.1} {:.1} L{:.1} {:.1} M{:.1} {:.1} L{:.1} {:.1}\" stroke=\"#000\" stroke-width=\"2\"/>\n",
                x - MEAN_ARM, y - MEAN_ARM, x + MEAN_ARM, y + MEAN_ARM,
                x - MEAN_ARM, y + MEAN_ARM, x + MEAN_ARM, y - MEAN_ARM
            ));
            svg.push_str(&format!(
                "  <text x=\"{:.1}\" y=\"{:.1}\" text-anchor=\"start\" class=\"note\">{}</text>\n",
                x + MEAN_ARM + 5.0,
                y + 4.0,
                escape(&col.annotation)
            ));
        }
    }

    svg.push_str("</svg>\n");
    svg
}

pub fn render_improvement_chart(summaries: &[ScenarioSummary], repeat: u32) -> String {
    let columns = summaries
        .iter()
        .map(|s| Column {
            name: s.series.label.clone(),
            load_percent: s.series.scenario.load_percent,
            points: s.series.ratios.iter().map(|r| r - 1.0).collect(),
            mean: s.stats.mean_ratio - 1.0,
            annotation: format!("{:.2}x", s.stats.mean_ratio),
        })
        .collect();
    render(&Plot {
        title: format!("Scheduler Improvement (REPEAT={repeat})"),
        y_label: "Improvement".to_string(),
        columns,
    })
}

pub fn render_new_time_chart(summaries: &[ScenarioSummary], repeat: u32) -> String {
    let columns = summaries
        .iter()
        .map(|s| Column {
            name: s.series.label.clone(),
            load_percent: s.series.scenario.load_percent,
            points: s.series.new_avgs.clone(),
            mean: s.stats.mean_new_avg_ns,
            annotation: format!("{:.0}ns", s.stats.mean_new_avg_ns),
        })
        .collect();
    render(&Plot {
        title: format!("New scheduler avg scheduling time per run (REPEAT={repeat})"),
        y_label: "New scheduler avg sched time (ns)".to_string(),
        columns,
    })
}

fn write_svg(path: PathBuf, svg: &str) -> Result<PathBuf> {
    fs::write(&path, svg).map_err(|source| BenchError::OutputWrite {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

// RENDER BOTH CHARTS INTO dir AND RETURN THE WRITTEN PATHS.
// EMPTY SUMMARIES WRITE NOTHING.
pub fn write_charts(dir: &Path, summaries: &[ScenarioSummary], repeat: u32) -> Result<Vec<PathBuf>> {
    if summaries.is_empty() {
        return Ok(Vec::new());
    }
    fs::create_dir_all(dir).map_err(|source| BenchError::OutputWrite {
        path: dir.to_path_buf(),
        source,
    })?;
    let improvement = write_svg(dir.join(IMPROVEMENT_FILE), &render_improvement_chart(summaries, repeat))?;
    let new_time = write_svg(dir.join(NEW_TIME_FILE), &render_new_time_chart(summaries, repeat))?;
    Ok(vec![improvement, new_time])
}
