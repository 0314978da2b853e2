// SCHEDCMP METRIC EXTRACTOR
// PURE LINE-ORIENTED PATTERN MATCHING. NO STATE, NO I/O.
//
// THE PATTERNS ARE THE CONTRACT WITH THE PROGRAM UNDER TEST. ITS OUTPUT
// IS NOT OURS TO CHANGE, SO EVERY SHAPE BELOW MATCHES WHAT IT PRINTS:
//   <OLD|NEW> scheduler avg sched(uling) time: <n> <unit>
//   max(imum) sched(uling) time: <n> <unit>
//   Running test: <label> for ...
//   Task count: <n>
//   Task active ratio: <n>

use std::sync::LazyLock;

use regex::Regex;

use crate::build::Variant;

static AVG_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)(old|new)\s+scheduler\s+avg\s+sched\w*\s+time:\s*([0-9]+(?:\.[0-9]+)?)\s*(µs|μs|us|microseconds?|ns|nanoseconds?)",
    )
    .expect("static regex")
});

static MAX_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)max(?:imum)?\s+sched\w*\s+time:\s*([0-9]+(?:\.[0-9]+)?)\s*(µs|μs|us|microseconds?|ns|nanoseconds?)",
    )
    .expect("static regex")
});

static TESTNAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Running test:\s*(.*?)\s+for\b").expect("static regex"));

static TASKCNT_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Task count:\s*(\d+)").expect("static regex"));

static ACTRATIO_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)Task active ratio:\s*(\d+)").expect("static regex"));

// EVERYTHING ONE LINE CAN TELL US. EACH FIELD IS INDEPENDENT.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct LineMetrics {
    pub average: Option<(Variant, f64)>,
    pub max_ns: Option<f64>,
    pub label: Option<String>,
    pub task_count: Option<i64>,
    pub active_ratio: Option<u32>,
}

impl LineMetrics {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

// NORMALIZE A TIMING VALUE TO NANOSECONDS. MICROSECOND UNITS (µs, us,
// microsecond(s)) SCALE BY 1000; ANYTHING ELSE IS ALREADY NANOSECONDS.
pub fn to_ns(value: f64, unit: &str) -> f64 {
    let unit = unit.to_lowercase();
    if unit.starts_with('µ') || unit.starts_with('μ') || unit.starts_with('u') || unit.starts_with("micro") {
        value * 1000.0
    } else {
        value
    }
}

fn timing(caps: &regex::Captures<'_>, value_idx: usize, unit_idx: usize) -> Option<f64> {
    let value: f64 = caps.get(value_idx)?.as_str().parse().ok()?;
    let unit = caps.get(unit_idx)?.as_str();
    Some(to_ns(value, unit))
}

pub fn average_time(line: &str) -> Option<(Variant, f64)> {
    let caps = AVG_RE.captures(line)?;
    let variant = if caps[1].eq_ignore_ascii_case("old") {
        Variant::Old
    } else {
        Variant::New
    };
    Some((variant, timing(&caps, 2, 3)?))
}

pub fn max_time(line: &str) -> Option<f64> {
    let caps = MAX_RE.captures(line)?;
    timing(&caps, 1, 2)
}

pub fn test_name(line: &str) -> Option<String> {
    let caps = TESTNAME_RE.captures(line)?;
    let name = caps[1].trim();
    if name.is_empty() {
        None
    } else {
        Some(name.to_string())
    }
}

pub fn task_count(line: &str) -> Option<i64> {
    TASKCNT_RE.captures(line)?[1].parse().ok()
}

pub fn active_ratio(line: &str) -> Option<u32> {
    ACTRATIO_RE.captures(line)?[1].parse().ok()
}

pub fn scan(line: &str) -> LineMetrics {
    LineMetrics {
        average: average_time(line),
        max_ns: max_time(line),
        label: test_name(line),
        task_count: task_count(line),
        active_ratio: active_ratio(line),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn microseconds_scale_by_1000() {
        for unit in ["us", "US", "µs", "μs", "microsecond", "microseconds", "Microseconds"] {
            assert_eq!(to_ns(1.5, unit), 1500.0, "unit {unit}");
        }
    }

    #[test]
    fn nanoseconds_and_unknown_pass_through() {
        for unit in ["ns", "NS", "nanosecond", "nanoseconds", "ms", ""] {
            assert_eq!(to_ns(42.0, unit), 42.0, "unit {unit}");
        }
    }

    #[test]
    fn average_line_short_and_long_forms() {
        assert_eq!(
            average_time("NEW scheduler avg sched time: 500 ns"),
            Some((Variant::New, 500.0))
        );
        assert_eq!(
            average_time("old Scheduler AVG Scheduling Time: 1.25 us"),
            Some((Variant::Old, 1250.0))
        );
        assert_eq!(
            average_time("[info] NEW scheduler avg scheduling time:12.5microseconds"),
            Some((Variant::New, 12500.0))
        );
    }

    #[test]
    fn patterns_are_unanchored() {
        // THE WORKLOAD MAY GLUE A PREFIX ONTO THE LINE WITH NO SEPARATOR
        assert_eq!(
            average_time("xNEW scheduler avg sched time: 5 ns"),
            Some((Variant::New, 5.0))
        );
        assert_eq!(average_time("[sched]OLD scheduler avg sched time: 2 us"), Some((Variant::Old, 2000.0)));
        assert_eq!(max_time("cpu0:max sched time: 9 ns"), Some(9.0));
    }

    #[test]
    fn average_line_requires_unit() {
        assert_eq!(average_time("NEW scheduler avg sched time: 500"), None);
        assert_eq!(average_time("scheduler avg sched time: 500 ns"), None);
    }

    #[test]
    fn max_line_is_variant_agnostic() {
        assert_eq!(max_time("Max scheduling time: 800 ns"), Some(800.0));
        assert_eq!(max_time("MAXIMUM SCHED TIME: 3 us"), Some(3000.0));
        assert_eq!(max_time("NEW scheduler max sched time: 7 ns"), Some(7.0));
        assert_eq!(max_time("avg sched time: 7 ns"), None);
    }

    #[test]
    fn test_name_between_prefix_and_suffix() {
        assert_eq!(test_name("Running test: Foo for 5s"), Some("Foo".to_string()));
        assert_eq!(
            test_name("running TEST:   Mixed load 50%   for 40 seconds"),
            Some("Mixed load 50%".to_string())
        );
        // "for" INSIDE A WORD IS NOT THE SUFFIX
        assert_eq!(
            test_name("Running test: Information forwarding for 5s"),
            Some("Information forwarding".to_string())
        );
        assert_eq!(test_name("Running test: no suffix here"), None);
    }

    #[test]
    fn counts_and_ratios() {
        assert_eq!(task_count("Task count: 10"), Some(10));
        assert_eq!(task_count("task COUNT:7 tasks"), Some(7));
        assert_eq!(task_count("Task count: many"), None);
        assert_eq!(active_ratio("Task active ratio: 50 %"), Some(50));
        assert_eq!(active_ratio("Task active ratio: -5"), None);
    }

    #[test]
    fn scan_unrelated_line_is_empty() {
        assert!(scan("booting workload generator").is_empty());
        assert!(scan("").is_empty());
    }

    #[test]
    fn scan_line_with_several_fields() {
        let m = scan("Task count: 12, Task active ratio: 20");
        assert_eq!(m.task_count, Some(12));
        assert_eq!(m.active_ratio, Some(20));
        assert_eq!(m.average, None);
        assert_eq!(m.max_ns, None);
    }
}
