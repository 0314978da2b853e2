// SCHEDCMP STATISTICS AGGREGATOR
// PURE REDUCTIONS OVER ONE SCENARIO SERIES. NO I/O.
//
// NaN IN THE MAX SERIES MEANS "THIS TRIAL NEVER PRINTED A MAX". SUCH
// ENTRIES ARE SKIPPED; THE RESULT IS NaN ONLY WHEN EVERY ENTRY IS NaN.
// INFINITE RATIOS ARE ORDINARY VALUES AND FLOW THROUGH AS-IS.

use crate::orchestrate::ScenarioSeries;

// TWO-SIDED 95% NORMAL QUANTILE
pub const Z_95: f64 = 1.96;

pub fn mean(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    Some(values.iter().sum::<f64>() / values.len() as f64)
}

// SAMPLE (n - 1) STANDARD DEVIATION. 0 FOR A SINGLE VALUE.
pub fn sample_stdev(values: &[f64]) -> Option<f64> {
    let m = mean(values)?;
    let n = values.len();
    if n < 2 {
        return Some(0.0);
    }
    let ss: f64 = values.iter().map(|v| (v - m) * (v - m)).sum();
    Some((ss / (n - 1) as f64).sqrt())
}

// 1.96 * stdev / sqrt(n), 0 FOR n <= 1
pub fn ci95_half_width(stdev: f64, n: usize) -> f64 {
    if n > 1 {
        Z_95 * (stdev / (n as f64).sqrt())
    } else {
        0.0
    }
}

pub fn min(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::min)
}

pub fn max(values: &[f64]) -> Option<f64> {
    values.iter().copied().reduce(f64::max)
}

// f64::max ALREADY PREFERS THE NON-NaN OPERAND; FOLDING FROM NaN
// LEAVES NaN ONLY WHEN NOTHING ELSE WAS SEEN
pub fn max_skip_nan(values: &[f64]) -> f64 {
    values.iter().copied().filter(|v| !v.is_nan()).fold(f64::NAN, f64::max)
}

#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioStats {
    pub n: usize,
    pub mean_ratio: f64,
    pub stdev_ratio: f64,
    pub min_ratio: f64,
    pub max_ratio: f64,
    pub ci_half: f64,
    pub mean_old_avg_ns: f64,
    pub mean_new_avg_ns: f64,
    pub max_old_max_ns: f64,
    pub max_new_max_ns: f64,
}

impl ScenarioStats {
    // None FOR AN EMPTY SERIES
    pub fn from_series(series: &ScenarioSeries) -> Option<Self> {
        let r = &series.ratios;
        let n = r.len();
        let mean_ratio = mean(r)?;
        let stdev_ratio = sample_stdev(r)?;
        Some(Self {
            n,
            mean_ratio,
            stdev_ratio,
            min_ratio: min(r)?,
            max_ratio: max(r)?,
            ci_half: ci95_half_width(stdev_ratio, n),
            mean_old_avg_ns: mean(&series.old_avgs)?,
            mean_new_avg_ns: mean(&series.new_avgs)?,
            max_old_max_ns: max_skip_nan(&series.old_maxs),
            max_new_max_ns: max_skip_nan(&series.new_maxs),
        })
    }

    pub fn ci_low(&self) -> f64 {
        self.mean_ratio - self.ci_half
    }

    pub fn ci_high(&self) -> f64 {
        self.mean_ratio + self.ci_half
    }
}

// WHAT THE REPORT AND THE CHARTS CONSUME
#[derive(Debug, Clone)]
pub struct ScenarioSummary {
    pub series: ScenarioSeries,
    pub stats: ScenarioStats,
}

// EMPTY SERIES ARE DROPPED: NOTHING TO REPORT OR PLOT FOR THEM
pub fn summarize(all: Vec<ScenarioSeries>) -> Vec<ScenarioSummary> {
    all.into_iter()
        .filter_map(|series| {
            let stats = ScenarioStats::from_series(&series)?;
            Some(ScenarioSummary { series, stats })
        })
        .collect()
}
