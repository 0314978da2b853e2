// SCHEDCMP PIPELINE TESTS
// REAL BUILD DRIVER + TRIAL RUNNER + ORCHESTRATOR AGAINST A FAKE make.
//
// THE FAKE IS A SHELL SCRIPT IN A TEMP DIR. A "BUILD" RECORDS VARIANT AND
// SCENARIO IN ./state; A "RUN" PRINTS THE METRIC LINES FOR THAT STATE, THEN
// "END TEST", THEN LOOPS FOREVER LIKE THE REAL WORKLOAD. MARKER FILES IN
// THE DIR (no_avg, no_max, fail_build, ignore_int) BEND ITS BEHAVIOR.

use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use schedcmp::build::Make;
use schedcmp::config::{scenarios_with_loads, BenchConfig};
use schedcmp::orchestrate::MakeBackend;
use schedcmp::report::NO_DATA_NOTICE;
use schedcmp::trial::TrialRunner;
use schedcmp::{chart, BenchError};

const FAKE_MAKE: &str = r#"#!/bin/sh
case "$1" in
  clean)
    echo clean >> ./calls
    exit 0 ;;
  run)
    echo run >> ./calls
    read variant sc < ./state
    if [ -f ./ignore_int ]; then trap '' INT; fi
    echo "make[1]: Entering directory"
    echo "Running test: Scen$sc for 5s"
    echo "Task count: 10"
    echo "Task active ratio: 20"
    if [ ! -f ./no_avg ]; then
      if [ "$variant" = old ]; then
        echo "OLD scheduler avg sched time: $((1000 + sc * 100)) ns"
      else
        echo "NEW scheduler avg sched time: 0.5 us"
      fi
    fi
    if [ ! -f ./no_max ]; then echo "Max scheduling time: 800 ns" 1>&2; fi
    echo "END TEST"
    while :; do sleep 1; done ;;
  *)
    if [ -f ./fail_build ]; then echo "cc: error: boom" 1>&2; exit 2; fi
    variant=new
    sc=x
    for a in "$@"; do
      case "$a" in
        TEST_FLAGS=-DOLD) variant=old ;;
        TEST_SCENARIO=-DTEST_SCENARIO=*) sc="${a#TEST_SCENARIO=-DTEST_SCENARIO=}" ;;
      esac
    done
    echo "$variant $sc" > ./state
    echo "build $*" >> ./calls
    exit 0 ;;
esac
"#;

fn write_script(dir: &Path, name: &str, body: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, body).unwrap();
    fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
    path
}

fn touch(dir: &Path, name: &str) {
    fs::write(dir.join(name), "").unwrap();
}

fn calls(dir: &Path) -> Vec<String> {
    fs::read_to_string(dir.join("calls"))
        .unwrap_or_default()
        .lines()
        .map(str::to_string)
        .collect()
}

fn fake_config(dir: &Path, ids: &[u32], repeat: u32) -> BenchConfig {
    BenchConfig {
        scenarios: scenarios_with_loads(ids, &[2, 4, 20]),
        repeat,
        make_program: write_script(dir, "fake-make", FAKE_MAKE),
        workdir: dir.to_path_buf(),
        clean: false,
        grace: Duration::from_secs(2),
        out_dir: dir.join("charts"),
        ..Default::default()
    }
}

fn run(config: &BenchConfig) -> schedcmp::Result<schedcmp::RunOutcome> {
    let backend = MakeBackend::new(config, config.trial_runner());
    schedcmp::run_with(config, backend, false)
}

#[test]
fn runner_extracts_fields_and_stops_hanging_program() {
    let dir = tempfile::tempdir().unwrap();
    let prog = write_script(
        dir.path(),
        "prog",
        "#!/bin/sh\n\
         echo 'NEW scheduler avg sched time: 500 ns'\n\
         echo 'Max scheduling time: 800 ns'\n\
         echo 'Running test: Foo for 5s'\n\
         echo 'Task count: 10'\n\
         echo 'END TEST'\n\
         while :; do sleep 1; done\n",
    );
    let runner = TrialRunner::new(Make::new(prog, dir.path()), "run", "END TEST", Duration::from_secs(3));
    let start = Instant::now();
    let r = runner.run().unwrap();
    assert_eq!(r.avg_ns, 500.0);
    assert_eq!(r.max_ns, 800.0);
    assert_eq!(r.label(), "Foo");
    assert_eq!(r.task_count, 10);
    assert!(start.elapsed() < Duration::from_secs(3), "SIGINT SHOULD END IT WELL BEFORE THE GRACE");
}

// /proc/<pid>/stat STATE OTHER THAN ZOMBIE MEANS STILL RUNNING
fn running(pid: &str) -> bool {
    match fs::read_to_string(format!("/proc/{pid}/stat")) {
        Ok(stat) => stat
            .rsplit_once(')')
            .and_then(|(_, rest)| rest.split_whitespace().next())
            .is_some_and(|state| state != "Z"),
        Err(_) => false,
    }
}

#[test]
fn background_job_does_not_outlive_the_trial() {
    let dir = tempfile::tempdir().unwrap();
    let prog = write_script(
        dir.path(),
        "prog",
        "#!/bin/sh\n\
         sleep 300 >/dev/null 2>&1 &\n\
         echo $! > ./bg\n\
         echo 'NEW scheduler avg sched time: 5 ns'\n\
         echo 'END TEST'\n\
         wait\n",
    );
    let runner = TrialRunner::new(Make::new(prog, dir.path()), "run", "END TEST", Duration::from_secs(1));
    assert_eq!(runner.run().unwrap().avg_ns, 5.0);

    let pid = fs::read_to_string(dir.path().join("bg")).unwrap();
    let pid = pid.trim();
    let deadline = Instant::now() + Duration::from_secs(3);
    while running(pid) && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(20));
    }
    assert!(!running(pid), "BACKGROUND sleep {pid} SURVIVED THE TRIAL");
}

#[test]
fn runner_handles_natural_exit_without_marker() {
    let dir = tempfile::tempdir().unwrap();
    let prog = write_script(
        dir.path(),
        "prog",
        "#!/bin/sh\necho 'OLD scheduler avg scheduling time: 3 microseconds'\nexit 0\n",
    );
    let runner = TrialRunner::new(Make::new(prog, dir.path()), "run", "END TEST", Duration::from_secs(1));
    let r = runner.run().unwrap();
    assert_eq!(r.avg_ns, 3000.0);
    assert!(r.max_ns.is_nan());
    assert_eq!(r.task_count, -1);
}

#[test]
fn two_scenarios_three_repeats() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_config(dir.path(), &[1, 2], 3);
    let outcome = run(&config).unwrap();

    assert_eq!(outcome.summaries.len(), 2);
    let (a, b) = (&outcome.summaries[0], &outcome.summaries[1]);
    assert_eq!(a.series.label, "Scen1");
    assert_eq!(b.series.label, "Scen2");
    assert_eq!(a.series.len(), 3);
    assert_eq!(b.series.len(), 3);
    assert_eq!(a.series.scenario.load_percent, 2);
    assert_eq!(b.series.scenario.load_percent, 4);

    // OLD = 1000 + 100 * id ns, NEW = 0.5us = 500ns
    for r in &a.series.ratios {
        assert!((r - 2.2).abs() < 1e-12);
    }
    for r in &b.series.ratios {
        assert!((r - 2.4).abs() < 1e-12);
    }
    assert_eq!(a.stats.stdev_ratio, 0.0);
    assert_eq!(a.stats.ci_half, 0.0);
    assert_eq!(b.stats.mean_new_avg_ns, 500.0);
    assert_eq!(b.stats.max_old_max_ns, 800.0);

    assert!(outcome.report.contains("Scenario 'Scen1'"));
    assert!(outcome.report.contains("Scenario 'Scen2'"));
    assert_eq!(outcome.charts.len(), 2);
    assert!(config.out_dir.join(chart::IMPROVEMENT_FILE).exists());
    assert!(config.out_dir.join(chart::NEW_TIME_FILE).exists());

    // STRICT ALTERNATION: BUILD OLD, RUN, BUILD NEW, RUN -- 12 TRIALS
    let c = calls(dir.path());
    assert_eq!(c.len(), 24);
    assert!(c[0].contains("TEST_SCENARIO=-DTEST_SCENARIO=1") && c[0].contains("TEST_FLAGS=-DOLD"));
    assert_eq!(c[1], "run");
    assert!(c[2].contains("TEST_SCENARIO=-DTEST_SCENARIO=1") && !c[2].contains("TEST_FLAGS"));
    assert!(c[12].contains("TEST_SCENARIO=-DTEST_SCENARIO=2"));
}

#[test]
fn missing_average_aborts_before_statistics() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "no_avg");
    let config = fake_config(dir.path(), &[0, 1], 2);
    match run(&config) {
        Err(BenchError::MissingAverage { field, .. }) => assert_eq!(field, "avg scheduling time"),
        other => panic!("expected MissingAverage, got {other:?}"),
    }
    assert!(!config.out_dir.exists());
    // FIRST RUN FAILED: NOTHING AFTER IT
    assert_eq!(calls(dir.path()).iter().filter(|c| *c == "run").count(), 1);
}

#[test]
fn missing_max_is_nan_not_failure() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "no_max");
    let config = fake_config(dir.path(), &[0], 1);
    let outcome = run(&config).unwrap();
    let s = &outcome.summaries[0];
    assert!(s.series.old_maxs[0].is_nan());
    assert!(s.stats.max_old_max_ns.is_nan());
    assert!(s.stats.max_new_max_ns.is_nan());
    assert_eq!(s.stats.mean_ratio, 2.0);
    assert!(outcome.report.contains("max  old sched time     = n/a"));
}

#[test]
fn build_failure_is_fatal_and_quotes_stderr() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "fail_build");
    let config = fake_config(dir.path(), &[3], 2);
    let err = run(&config).unwrap_err();
    match &err {
        BenchError::BuildFailed { scenario, detail, .. } => {
            assert_eq!(*scenario, 3);
            assert!(detail.contains("cc: error: boom"));
        }
        other => panic!("expected BuildFailed, got {other:?}"),
    }
    assert!(err.to_string().starts_with("build stage:"));
    assert!(calls(dir.path()).is_empty());
}

#[test]
fn workload_ignoring_sigint_is_killed_after_grace() {
    let dir = tempfile::tempdir().unwrap();
    touch(dir.path(), "ignore_int");
    let mut config = fake_config(dir.path(), &[0], 1);
    config.grace = Duration::from_millis(300);
    let start = Instant::now();
    let outcome = run(&config).unwrap();
    assert_eq!(outcome.summaries[0].series.len(), 1);
    assert!(start.elapsed() < Duration::from_secs(10));
}

#[test]
fn clean_runs_before_every_build() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fake_config(dir.path(), &[0], 1);
    config.clean = true;
    run(&config).unwrap();
    let c = calls(dir.path());
    assert_eq!(c[0], "clean");
    assert!(c[1].starts_with("build sched_cmp"));
    assert_eq!(c[2], "run");
    assert_eq!(c[3], "clean");
}

#[test]
fn extra_make_vars_are_passed_through() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = fake_config(dir.path(), &[0], 1);
    config.make_vars = vec![("CC".into(), "clang".into())];
    run(&config).unwrap();
    assert!(calls(dir.path())[0].starts_with("build sched_cmp CC=clang TEST_SCENARIO="));
}

#[test]
fn no_scenarios_means_no_data() {
    let dir = tempfile::tempdir().unwrap();
    let config = fake_config(dir.path(), &[], 3);
    let outcome = run(&config).unwrap();
    assert!(outcome.summaries.is_empty());
    assert!(outcome.charts.is_empty());
    assert_eq!(outcome.report.trim_end(), NO_DATA_NOTICE);
    assert!(!config.out_dir.exists());
}
