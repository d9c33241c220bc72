//! Rendering engine values for the terminal.

use clap::ValueEnum;
use serde::Serialize;

use caseflow_engine::lifecycle::RunSummary;
use caseflow_engine::{FlowRun, FlowRunTestCase, TestCase, TestStep, TestSuite};

use crate::error::CliError;

/// Output format for CLI responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub(crate) enum OutputFormat {
    Text,
    Json,
}

pub(crate) fn report_error(msg: &str, output: OutputFormat, quiet: bool) {
    if quiet {
        return;
    }
    match output {
        OutputFormat::Text => eprintln!("error: {}", msg),
        OutputFormat::Json => {
            let json = serde_json::json!({ "error": msg });
            eprintln!("{}", json);
        }
    }
}

pub(crate) fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), CliError> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

// ── Cases ─────────────────────────────────────────────────────────────────────

pub(crate) fn case_line(case: &TestCase) -> String {
    format!(
        "{:<6} {:<8} {:<7} {}  ({})",
        case.display_id, case.status, case.priority, case.title, case.id
    )
}

fn step_lines(steps: &[TestStep], cursor: Option<usize>) -> Vec<String> {
    steps
        .iter()
        .enumerate()
        .map(|(i, step)| {
            let marker = if cursor == Some(i) { ">" } else { " " };
            let mut line = format!(
                "{} {}. [{}] {} => {}",
                marker,
                i + 1,
                step.status,
                step.description,
                step.expected_result
            );
            if !step.actual_result.is_empty() {
                line.push_str(&format!(" | actual: {}", step.actual_result));
            }
            line
        })
        .collect()
}

pub(crate) fn print_steps(steps: &[TestStep], cursor: Option<usize>) {
    if steps.is_empty() {
        println!("  (no steps)");
    }
    for line in step_lines(steps, cursor) {
        println!("{}", line);
    }
}

pub(crate) fn print_case(case: &TestCase) {
    println!("{} {}", case.display_id, case.title);
    println!("  id:       {}", case.id);
    println!("  status:   {}", case.status);
    println!("  priority: {}", case.priority);
    if !case.description.is_empty() {
        println!("  description: {}", case.description);
    }
    if !case.labels.is_empty() {
        println!("  labels:   {}", case.labels.join(", "));
    }
    if let Some(assignee) = &case.assignee {
        println!("  assignee: {}", assignee);
    }
    println!("  steps:");
    print_steps(&case.steps, None);
}

pub(crate) fn print_cases(cases: &[TestCase]) {
    if cases.is_empty() {
        println!("no test cases");
    }
    for case in cases {
        println!("{}", case_line(case));
    }
}

// ── Suites ────────────────────────────────────────────────────────────────────

pub(crate) fn suite_line(suite: &TestSuite) -> String {
    format!(
        "{:<6} {} ({} cases)  ({})",
        suite.display_id,
        suite.name,
        suite.test_cases.len(),
        suite.id
    )
}

pub(crate) fn print_suite(suite: &TestSuite, members: &[TestCase]) {
    println!("{} {}", suite.display_id, suite.name);
    println!("  id: {}", suite.id);
    if !suite.labels.is_empty() {
        println!("  labels: {}", suite.labels.join(", "));
    }
    if let Some(assignee) = &suite.assignee {
        println!("  assignee: {}", assignee);
    }
    println!("  cases:");
    if members.is_empty() {
        println!("    (none)");
    }
    for case in members {
        println!("    {}", case_line(case));
    }
}

// ── Flow runs ─────────────────────────────────────────────────────────────────

pub(crate) fn run_line(run: &FlowRun) -> String {
    format!("{:<11} {}  ({})", run.status, run.title, run.id)
}

pub(crate) fn summary_line(summary: &RunSummary) -> String {
    format!(
        "{} cases: {} passed, {} failed, {} pending, {} not run",
        summary.total, summary.passed, summary.failed, summary.pending, summary.no_run
    )
}

pub(crate) fn print_run(run: &FlowRun, cases: &[(FlowRunTestCase, Option<TestCase>)], summary: &RunSummary) {
    println!("{}", run.title);
    println!("  id:     {}", run.id);
    println!("  status: {}", run.status);
    if let Some(start) = &run.start_date {
        println!("  started:   {}", start);
    }
    if let Some(end) = &run.end_date {
        println!("  completed: {}", end);
    }
    println!("  {}", summary_line(summary));
    for (run_case, case) in cases {
        let title = case
            .as_ref()
            .map(|c| format!("{} {}", c.display_id, c.title))
            .unwrap_or_else(|| run_case.test_case_id.clone());
        println!("    {:<8} {}", run_case.status, title);
        if !run_case.notes.is_empty() {
            println!("             notes: {}", run_case.notes);
        }
    }
}
