// SCHEDCMP TRIAL RUNNER
// ONE EXECUTION OF THE PROGRAM UNDER TEST: LAUNCH IT IN ITS OWN PROCESS
// GROUP, STREAM stdout+stderr LINE BY LINE THROUGH THE EXTRACTOR, STOP AT
// THE END MARKER (OR EOF), THEN INTERRUPT-THEN-KILL THE GROUP.
//
// THE WORKLOAD LOOPS FOREVER AFTER PRINTING ITS RESULTS, SO WAITING FOR A
// NATURAL EXIT WOULD HANG. THERE IS NO TIMEOUT ON SEEING THE MARKER.

use std::io::{self, BufRead, BufReader};
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tracing::{debug, trace};

use crate::build::Make;
use crate::error::{BenchError, Result};
use crate::extract::{self, LineMetrics};
use crate::procgroup::ProcessGroup;

pub const DEFAULT_END_MARKER: &str = "END TEST";
pub const UNKNOWN_LABEL: &str = "Unknown";
pub const UNKNOWN_TASK_COUNT: i64 = -1;

const AVG_FIELD: &str = "avg scheduling time";

// FACTS FROM ONE TRIAL. ONLY avg_ns IS GUARANTEED; THE REST CARRY A
// SENTINEL WHEN THE PROGRAM NEVER PRINTED THEM.
#[derive(Debug, Clone, PartialEq)]
pub struct TrialResult {
    pub avg_ns: f64,
    // NaN = NO MAX LINE
    pub max_ns: f64,
    pub label: Option<String>,
    // UNKNOWN_TASK_COUNT = NO COUNT LINE
    pub task_count: i64,
    pub active_ratio: Option<u32>,
    // PRIORITY DISTRIBUTION (0-7)
    pub distribution: Option<Vec<u32>>,
}

impl TrialResult {
    pub fn label(&self) -> &str {
        self.label.as_deref().unwrap_or(UNKNOWN_LABEL)
    }
}

// FIELDS ACCUMULATED ACROSS LINES.
// LABEL, COUNT, RATIO: FIRST MATCH WINS. TIMINGS: LATEST MATCH WINS.
#[derive(Debug, Default)]
pub struct Capture {
    avg_ns: Option<f64>,
    max_ns: Option<f64>,
    label: Option<String>,
    task_count: Option<i64>,
    active_ratio: Option<u32>,
    distribution: Option<Vec<u32>>,
    pub saw_marker: bool,
    pub lines: u64,
}

impl Capture {
    pub fn absorb(&mut self, m: LineMetrics) {
        if let Some((variant, ns)) = m.average {
            trace!(%variant, ns, "avg time");
            self.avg_ns = Some(ns);
        }
        if let Some(ns) = m.max_ns {
            trace!(ns, "max time");
            self.max_ns = Some(ns);
        }
        if self.label.is_none() {
            self.label = m.label;
        }
        if self.task_count.is_none() {
            self.task_count = m.task_count;
        }
        if self.active_ratio.is_none() {
            self.active_ratio = m.active_ratio;
        }
    }

    pub fn finish(self, command: &str, marker: &str) -> Result<TrialResult> {
        let avg_ns = self.avg_ns.ok_or_else(|| BenchError::MissingAverage {
            field: AVG_FIELD,
            marker: marker.to_string(),
            command: command.to_string(),
        })?;
        Ok(TrialResult {
            avg_ns,
            max_ns: self.max_ns.unwrap_or(f64::NAN),
            label: self.label,
            task_count: self.task_count.unwrap_or(UNKNOWN_TASK_COUNT),
            active_ratio: self.active_ratio,
            distribution: self.distribution,
        })
    }
}

// READ UNTIL A LINE CONTAINS marker OR THE STREAM ENDS.
// BYTES ARE DECODED LOSSILY: GARBAGE ON THE PIPE NEVER ABORTS A TRIAL.
pub fn consume<R: BufRead>(mut reader: R, marker: &str) -> io::Result<Capture> {
    let mut cap = Capture::default();
    let mut buf = Vec::with_capacity(256);
    loop {
        buf.clear();
        if reader.read_until(b'\n', &mut buf)? == 0 {
            break;
        }
        cap.lines += 1;
        let line = String::from_utf8_lossy(&buf);
        let line = line.trim_end_matches(['\n', '\r']);
        cap.absorb(extract::scan(line));
        if line.contains(marker) {
            cap.saw_marker = true;
            break;
        }
    }
    Ok(cap)
}

pub struct TrialRunner {
    make: Make,
    run_target: String,
    marker: String,
    grace: Duration,
    stop: Option<Arc<AtomicBool>>,
}

impl TrialRunner {
    pub fn new(make: Make, run_target: impl Into<String>, marker: impl Into<String>, grace: Duration) -> Self {
        Self {
            make,
            run_target: run_target.into(),
            marker: marker.into(),
            grace,
            stop: None,
        }
    }

    // A RAISED FLAG TURNS WHATEVER WAS READ INTO BenchError::Interrupted
    pub fn with_stop_flag(mut self, stop: Arc<AtomicBool>) -> Self {
        self.stop = Some(stop);
        self
    }

    fn stopped(&self) -> bool {
        self.stop.as_ref().is_some_and(|s| s.load(Ordering::Relaxed))
    }

    pub fn run(&self) -> Result<TrialResult> {
        let described = self.make.describe(std::slice::from_ref(&self.run_target));
        let spawn_err = |source| BenchError::RunSpawn {
            command: described.clone(),
            source,
        };

        if self.stopped() {
            return Err(BenchError::Interrupted);
        }

        let (reader, writer) = io::pipe().map_err(spawn_err)?;
        // THE Command OWNS THE WRITE ENDS. IT MUST DROP BEFORE WE READ OR
        // THE PIPE NEVER REPORTS EOF.
        let mut group = {
            let mut cmd = self.make.command();
            cmd.arg(&self.run_target)
                .stdin(Stdio::null())
                .stdout(writer.try_clone().map_err(spawn_err)?)
                .stderr(writer);
            ProcessGroup::spawn(&mut cmd, self.grace).map_err(spawn_err)?
        };
        debug!(command = %described, pgid = group.pgid(), "run");

        let consumed = consume(BufReader::new(reader), &self.marker);
        let status = group.release();
        debug!(?status, "run finished");

        let cap = consumed.map_err(|source| BenchError::StreamRead {
            command: described.clone(),
            source,
        })?;
        if self.stopped() {
            return Err(BenchError::Interrupted);
        }
        if !cap.saw_marker {
            debug!(lines = cap.lines, "stream ended without '{}'", self.marker);
        }
        cap.finish(&described, &self.marker)
    }
}
