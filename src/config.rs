// SCHEDCMP CONFIGURATION
// ONE PLAIN VALUE, BUILT ONCE IN main AND HANDED TO THE ORCHESTRATOR.
// DEFAULTS REPRODUCE THE STOCK sched_cmp SETUP.

use std::path::PathBuf;
use std::time::Duration;

use crate::build::Make;
use crate::error::{BenchError, Result};
use crate::trial::{TrialRunner, DEFAULT_END_MARKER};

pub const DEFAULT_SCENARIOS: [u32; 5] = [0, 1, 2, 3, 4];
pub const DEFAULT_LOAD_PERCENTS: [u32; 5] = [2, 4, 20, 50, 100];
pub const DEFAULT_REPEAT: u32 = 20;
pub const DEFAULT_MAKE: &str = "make";
pub const DEFAULT_BUILD_TARGET: &str = "sched_cmp";
pub const DEFAULT_RUN_TARGET: &str = "run";
pub const DEFAULT_GRACE: Duration = Duration::from_secs(3);

// LOAD SCENARIO: THE SELECTOR COMPILED INTO THE PROGRAM UNDER TEST,
// PLUS ITS NOMINAL LOAD (DISPLAY ONLY)
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Scenario {
    pub id: u32,
    pub load_percent: u32,
}

// PAIR SCENARIO IDS WITH LOAD PERCENTS BY POSITION. TOO FEW PERCENTS FOR
// THE SCENARIO LIST -> SYNTHETIC (i + 1) * 2 FOR EVERY SCENARIO.
pub fn scenarios_with_loads(ids: &[u32], loads: &[u32]) -> Vec<Scenario> {
    let enough = loads.len() >= ids.len();
    ids.iter()
        .enumerate()
        .map(|(i, &id)| Scenario {
            id,
            load_percent: if enough { loads[i] } else { (i as u32 + 1) * 2 },
        })
        .collect()
}

// PARSE KEY=VALUE. KEY MUST BE NON-EMPTY; VALUE MAY BE EMPTY.
pub fn parse_make_var(s: &str) -> Result<(String, String)> {
    match s.split_once('=') {
        Some((k, v)) if !k.trim().is_empty() => Ok((k.trim().to_string(), v.to_string())),
        _ => Err(BenchError::InvalidConfig(format!(
            "make variable '{s}' is not KEY=VALUE"
        ))),
    }
}

#[derive(Clone, Debug)]
pub struct BenchConfig {
    pub scenarios: Vec<Scenario>,
    pub repeat: u32,
    pub make_program: PathBuf,
    pub build_target: String,
    pub run_target: String,
    pub workdir: PathBuf,
    pub make_vars: Vec<(String, String)>,
    pub clean: bool,
    pub grace: Duration,
    pub end_marker: String,
    pub out_dir: PathBuf,
}

impl Default for BenchConfig {
    fn default() -> Self {
        Self {
            scenarios: scenarios_with_loads(&DEFAULT_SCENARIOS, &DEFAULT_LOAD_PERCENTS),
            repeat: DEFAULT_REPEAT,
            make_program: PathBuf::from(DEFAULT_MAKE),
            build_target: DEFAULT_BUILD_TARGET.to_string(),
            run_target: DEFAULT_RUN_TARGET.to_string(),
            workdir: PathBuf::from("."),
            make_vars: Vec::new(),
            clean: true,
            grace: DEFAULT_GRACE,
            end_marker: DEFAULT_END_MARKER.to_string(),
            out_dir: PathBuf::from("."),
        }
    }
}

impl BenchConfig {
    pub fn validate(&self) -> Result<()> {
        let invalid = |msg: &str| Err(BenchError::InvalidConfig(msg.to_string()));
        if self.repeat == 0 {
            return invalid("repeat count must be at least 1");
        }
        if self.make_program.as_os_str().is_empty() {
            return invalid("make program is empty");
        }
        if self.build_target.trim().is_empty() {
            return invalid("build target is empty");
        }
        if self.run_target.trim().is_empty() {
            return invalid("run target is empty");
        }
        if self.end_marker.is_empty() {
            return invalid("end marker is empty");
        }
        if let Some((k, _)) = self.make_vars.iter().find(|(k, _)| k.trim().is_empty()) {
            return Err(BenchError::InvalidConfig(format!("make variable '{k}' has an empty name")));
        }
        Ok(())
    }

    pub fn make(&self) -> Make {
        Make::new(&self.make_program, &self.workdir)
    }

    pub fn trial_runner(&self) -> TrialRunner {
        TrialRunner::new(self.make(), &self.run_target, &self.end_marker, self.grace)
    }
}
