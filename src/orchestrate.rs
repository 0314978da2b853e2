// SCHEDCMP TRIAL ORCHESTRATOR
// FOR EACH SCENARIO, FOR EACH REPEAT: BUILD+RUN OLD, BUILD+RUN NEW, PAIR.
// STRICTLY SEQUENTIAL. ANY FATAL ERROR ABORTS THE WHOLE RUN -- A SERIES IS
// EITHER COMPLETE (len == repeat) OR NEVER RETURNED.

use crate::build::{self, Make, Variant};
use crate::config::{BenchConfig, Scenario};
use crate::error::Result;
use crate::report;
use crate::trial::{TrialResult, TrialRunner};

// WHERE TRIALS COME FROM. THE ORCHESTRATOR ONLY SEQUENCES CALLS;
// THE BACKEND OWNS THE BUILD SYSTEM AND THE CHILD PROCESS.
pub trait TrialBackend {
    fn build(&mut self, scenario: &Scenario, variant: Variant) -> Result<()>;
    fn run(&mut self, scenario: &Scenario, variant: Variant) -> Result<TrialResult>;
}

// REAL BACKEND: make <target> ... THEN make <run-target>
pub struct MakeBackend {
    make: Make,
    target: String,
    vars: Vec<(String, String)>,
    clean: bool,
    runner: TrialRunner,
}

impl MakeBackend {
    pub fn new(config: &BenchConfig, runner: TrialRunner) -> Self {
        Self {
            make: config.make(),
            target: config.build_target.clone(),
            vars: config.make_vars.clone(),
            clean: config.clean,
            runner,
        }
    }
}

impl TrialBackend for MakeBackend {
    fn build(&mut self, scenario: &Scenario, variant: Variant) -> Result<()> {
        build::build(&self.make, &self.target, scenario.id, variant, &self.vars, self.clean)
    }

    fn run(&mut self, _scenario: &Scenario, _variant: Variant) -> Result<TrialResult> {
        self.runner.run()
    }
}

// old.avg / new.avg, +inf WHEN THE NEW AVERAGE IS NOT POSITIVE
pub fn improvement_ratio(old_avg_ns: f64, new_avg_ns: f64) -> f64 {
    if new_avg_ns > 0.0 {
        old_avg_ns / new_avg_ns
    } else {
        f64::INFINITY
    }
}

// OLD AND NEW UNDER THE SAME SCENARIO AND REPEAT INDEX
#[derive(Debug, Clone)]
pub struct PairedTrial {
    pub old: TrialResult,
    pub new: TrialResult,
}

impl PairedTrial {
    pub fn improvement_ratio(&self) -> f64 {
        improvement_ratio(self.old.avg_ns, self.new.avg_ns)
    }

    pub fn diff_ns(&self) -> f64 {
        self.old.avg_ns - self.new.avg_ns
    }

    // OLD IS RUN FIRST, SO ITS NAME IS THE ONE WE SAW FIRST
    pub fn discovered_label(&self) -> Option<&str> {
        self.old.label.as_deref().or(self.new.label.as_deref())
    }
}

// ONE ENTRY PER REPEAT
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioSeries {
    pub scenario: Scenario,
    pub label: String,
    pub ratios: Vec<f64>,
    pub old_avgs: Vec<f64>,
    pub new_avgs: Vec<f64>,
    pub old_maxs: Vec<f64>,
    pub new_maxs: Vec<f64>,
}

impl ScenarioSeries {
    pub fn new(scenario: Scenario) -> Self {
        Self {
            scenario,
            label: fallback_label(scenario.id),
            ratios: Vec::new(),
            old_avgs: Vec::new(),
            new_avgs: Vec::new(),
            old_maxs: Vec::new(),
            new_maxs: Vec::new(),
        }
    }

    pub fn push(&mut self, pair: &PairedTrial) {
        self.ratios.push(pair.improvement_ratio());
        self.old_avgs.push(pair.old.avg_ns);
        self.new_avgs.push(pair.new.avg_ns);
        self.old_maxs.push(pair.old.max_ns);
        self.new_maxs.push(pair.new.max_ns);
    }

    pub fn len(&self) -> usize {
        self.ratios.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ratios.is_empty()
    }
}

pub fn fallback_label(id: u32) -> String {
    format!("Scenario {id}")
}

pub struct Orchestrator<B> {
    scenarios: Vec<Scenario>,
    repeat: u32,
    backend: B,
    verbose: bool,
}

impl<B: TrialBackend> Orchestrator<B> {
    pub fn new(config: &BenchConfig, backend: B) -> Self {
        Self {
            scenarios: config.scenarios.clone(),
            repeat: config.repeat,
            backend,
            verbose: true,
        }
    }

    // SUPPRESS PER-REPEAT PROGRESS BLOCKS
    pub fn quiet(mut self) -> Self {
        self.verbose = false;
        self
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    fn trial(&mut self, scenario: &Scenario, variant: Variant) -> Result<TrialResult> {
        self.backend.build(scenario, variant)?;
        self.backend.run(scenario, variant)
    }

    pub fn run_scenario(&mut self, scenario: &Scenario) -> Result<ScenarioSeries> {
        let mut series = ScenarioSeries::new(*scenario);
        let mut discovered: Option<String> = None;

        for run_idx in 1..=self.repeat {
            let old = self.trial(scenario, Variant::Old)?;
            let new = self.trial(scenario, Variant::New)?;
            let pair = PairedTrial { old, new };

            if discovered.is_none() {
                discovered = pair.discovered_label().map(str::to_string);
            }
            series.push(&pair);

            if self.verbose {
                let shown = discovered.as_deref().unwrap_or(pair.old.label());
                report::print_trial(shown, scenario.id, run_idx, &pair);
            }
        }

        if let Some(label) = discovered {
            series.label = label;
        }
        Ok(series)
    }

    pub fn run(&mut self) -> Result<Vec<ScenarioSeries>> {
        let scenarios = self.scenarios.clone();
        let mut all = Vec::with_capacity(scenarios.len());
        for sc in &scenarios {
            all.push(self.run_scenario(sc)?);
        }
        Ok(all)
    }
}
