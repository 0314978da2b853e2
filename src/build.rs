// SCHEDCMP BUILD DRIVER
// REBUILDS THE PROGRAM UNDER TEST FOR ONE SCENARIO AND ONE VARIANT.
// SCENARIO GOES IN AS A NUMERIC DEFINE, OLD ADDS A FLAG, NEW OMITS IT.
// A FAILED BUILD IS FATAL: NO RETRY, NO SKIPPING TO THE NEXT SCENARIO.

use std::fmt;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use tracing::debug;

use crate::error::{BenchError, Result};

const STDERR_TAIL_LINES: usize = 5;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Variant {
    Old,
    New,
}

impl Variant {
    pub fn label(self) -> &'static str {
        match self {
            Self::Old => "OLD",
            Self::New => "NEW",
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

// THE BUILD SYSTEM ENTRY POINT: WHICH PROGRAM, RUN FROM WHERE
#[derive(Clone, Debug)]
pub struct Make {
    pub program: PathBuf,
    pub workdir: PathBuf,
}

impl Make {
    pub fn new(program: impl Into<PathBuf>, workdir: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            workdir: workdir.into(),
        }
    }

    pub fn command(&self) -> Command {
        let mut cmd = Command::new(&self.program);
        cmd.current_dir(&self.workdir);
        cmd
    }

    pub fn describe(&self, args: &[String]) -> String {
        let mut s = self.program.display().to_string();
        for a in args {
            s.push(' ');
            s.push_str(a);
        }
        s
    }
}

// ARGUMENTS FOR ONE BUILD: TARGET, EXTRA VARS IN ORDER, THEN THE DEFINES
pub fn build_args(
    target: &str,
    scenario: u32,
    variant: Variant,
    vars: &[(String, String)],
) -> Vec<String> {
    let mut args = Vec::with_capacity(vars.len() + 3);
    args.push(target.to_string());
    for (k, v) in vars {
        args.push(format!("{k}={v}"));
    }
    args.push(format!("TEST_SCENARIO=-DTEST_SCENARIO={scenario}"));
    if variant == Variant::Old {
        args.push("TEST_FLAGS=-DOLD".to_string());
    }
    args
}

// CLEAN IS BEST-EFFORT. ITS EXIT STATUS IS NOT CHECKED.
fn clean(make: &Make) {
    let args = vec!["clean".to_string()];
    debug!(command = %make.describe(&args), "clean");
    let status = make
        .command()
        .args(&args)
        .stdout(Stdio::null())
        .stderr(Stdio::null())
        .status();
    if let Err(e) = status {
        debug!(error = %e, "clean did not run");
    }
}

fn stderr_tail(stderr: &[u8]) -> String {
    let text = String::from_utf8_lossy(stderr);
    let lines: Vec<&str> = text.lines().filter(|l| !l.trim().is_empty()).collect();
    if lines.is_empty() {
        return String::new();
    }
    let start = lines.len().saturating_sub(STDERR_TAIL_LINES);
    let mut out = String::from(":");
    for l in &lines[start..] {
        out.push_str("\n    ");
        out.push_str(l);
    }
    out
}

pub fn build(
    make: &Make,
    target: &str,
    scenario: u32,
    variant: Variant,
    vars: &[(String, String)],
    do_clean: bool,
) -> Result<()> {
    if do_clean {
        clean(make);
    }

    let args = build_args(target, scenario, variant, vars);
    let described = make.describe(&args);
    debug!(command = %described, "build");

    let output = make
        .command()
        .args(&args)
        .stdin(Stdio::null())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .output()
        .map_err(|source| BenchError::BuildSpawn {
            command: described.clone(),
            source,
        })?;

    if !output.status.success() {
        return Err(BenchError::BuildFailed {
            target: target.to_string(),
            scenario,
            variant,
            status: output.status.to_string(),
            detail: stderr_tail(&output.stderr),
        });
    }
    Ok(())
}
