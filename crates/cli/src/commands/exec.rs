//! `caseflow exec` -- interactive step-by-step execution of one test case.
//!
//! Reads one command per line from stdin:
//!
//! ```text
//! start            begin from the first step
//! pass | fail      record the step under the cursor
//! result [N] TEXT  store an actual result (current step, or step N)
//! quick-pass       mark every step passed
//! quick-fail       mark every step failed
//! show             print the steps
//! exit             leave; while running, asks for "yes"
//! ```
//!
//! The store is saved after every command that changes it.

use std::io::{self, BufRead, Write};

use caseflow_engine::{EngineError, ExecutionEvent, Sequencer, StepStatus};
use caseflow_storage::MemoryStore;

use super::{resolve_case, Session};
use crate::error::CliError;
use crate::output;

#[derive(Debug, Clone, PartialEq, Eq)]
enum Input {
    Start,
    Record(StepStatus),
    Result { step: Option<usize>, text: String },
    Quick(StepStatus),
    Show,
    Help,
    Exit,
}

fn parse_input(line: &str) -> Result<Input, String> {
    let (cmd, rest) = match line.split_once(char::is_whitespace) {
        Some((cmd, rest)) => (cmd, rest.trim()),
        None => (line, ""),
    };
    match cmd.to_lowercase().as_str() {
        "start" => Ok(Input::Start),
        "pass" => Ok(Input::Record(StepStatus::Passed)),
        "fail" => Ok(Input::Record(StepStatus::Failed)),
        "quick-pass" => Ok(Input::Quick(StepStatus::Passed)),
        "quick-fail" => Ok(Input::Quick(StepStatus::Failed)),
        "show" | "status" => Ok(Input::Show),
        "help" => Ok(Input::Help),
        "exit" | "quit" => Ok(Input::Exit),
        "result" => {
            if rest.is_empty() {
                return Err("usage: result [N] <text>".to_string());
            }
            let (first, tail) = rest.split_once(char::is_whitespace).unwrap_or((rest, ""));
            match first.parse::<usize>() {
                Ok(n) if n >= 1 && !tail.trim().is_empty() => Ok(Input::Result {
                    step: Some(n - 1),
                    text: tail.trim().to_string(),
                }),
                _ => Ok(Input::Result {
                    step: None,
                    text: rest.to_string(),
                }),
            }
        }
        other => Err(format!("unknown command '{}' (try 'help')", other)),
    }
}

fn print_help() {
    println!("commands:");
    println!("  start            begin from the first step");
    println!("  pass | fail      record the current step");
    println!("  result [N] TEXT  store an actual result");
    println!("  quick-pass       mark every step passed");
    println!("  quick-fail       mark every step failed");
    println!("  show             print the steps");
    println!("  exit             leave the session");
}

fn describe(event: &ExecutionEvent, seq: &Sequencer) -> String {
    let step_text = |i: usize| {
        seq.steps()
            .get(i)
            .map(|s| format!("step {}: {} (expect: {})", i + 1, s.description, s.expected_result))
            .unwrap_or_default()
    };
    match event {
        ExecutionEvent::Started { cursor } => format!("started; {}", step_text(*cursor)),
        ExecutionEvent::StepRecorded { status, .. } => format!("step {}", status),
        ExecutionEvent::CursorAdvanced { to, .. } => format!("next {}", step_text(*to)),
        ExecutionEvent::ResultRecorded { .. } => "result saved".to_string(),
        ExecutionEvent::CaseStatusChanged { status } => format!("status: {}", status),
        ExecutionEvent::Finished { status } => format!("finished: {}", status),
        ExecutionEvent::Abandoned => "execution abandoned".to_string(),
    }
}

fn report(events: &[ExecutionEvent], seq: &Sequencer, session: &Session) -> Result<(), CliError> {
    for event in events {
        if session.json() {
            println!("{}", serde_json::to_string(event)?);
        } else {
            session.say(describe(event, seq));
        }
    }
    Ok(())
}

fn ask_confirmation<R: BufRead>(reader: &mut R) -> bool {
    eprintln!("Execution in progress. Type 'yes' to abandon it:");
    let mut answer = String::new();
    reader.read_line(&mut answer).is_ok() && answer.trim() == "yes"
}

pub(crate) async fn run(
    case: &str,
    flow_run: Option<&str>,
    store: &MemoryStore,
    session: &Session,
) -> Result<bool, CliError> {
    let case_id = resolve_case(store, case).await?;
    let mut seq = match flow_run {
        Some(run) => Sequencer::for_flow_run_case(store, run, &case_id).await?,
        None => Sequencer::for_case(store, &case_id).await?,
    };

    session.say(format!(
        "executing {} ({} steps, status {}); type 'help' for commands",
        case,
        seq.steps().len(),
        seq.status()
    ));

    let stdin = io::stdin();
    let mut reader = stdin.lock();
    let mut line = String::new();
    let mut changed = false;

    loop {
        if !session.json() && !session.quiet {
            print!("caseflow> ");
            if io::stdout().flush().is_err() {
                break;
            }
        }

        line.clear();
        match reader.read_line(&mut line) {
            Ok(0) => break,
            Ok(_) => {}
            Err(e) => return Err(e.into()),
        }
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }

        let input = match parse_input(trimmed) {
            Ok(input) => input,
            Err(msg) => {
                eprintln!("{}", msg);
                continue;
            }
        };

        let result = match input {
            Input::Help => {
                print_help();
                continue;
            }
            Input::Show => {
                if session.json() {
                    output::print_json(seq.steps())?;
                } else {
                    output::print_steps(seq.steps(), seq.cursor());
                }
                continue;
            }
            Input::Start => seq.start(store).await,
            Input::Record(status) => match seq.current_step().map(|s| s.id.clone()) {
                Some(step_id) => seq.record_step(store, &step_id, status).await,
                None => Err(EngineError::InvalidTransition {
                    state: "idle".to_string(),
                    attempted: "record a step".to_string(),
                }),
            },
            Input::Result { step, text } => {
                let target = match step {
                    Some(i) => seq.steps().get(i).map(|s| s.id.clone()),
                    None => seq.current_step().map(|s| s.id.clone()),
                };
                match target {
                    Some(step_id) => seq.record_result(store, &step_id, &text).await,
                    None => {
                        eprintln!("no such step; use 'result N <text>' while idle");
                        continue;
                    }
                }
            }
            Input::Quick(status) => seq.quick_complete(store, status).await,
            Input::Exit => {
                if !seq.is_running() {
                    break;
                }
                let confirmed = ask_confirmation(&mut reader);
                match seq.exit(store, confirmed).await {
                    Err(EngineError::ConfirmationRequired) => {
                        eprintln!("still running");
                        continue;
                    }
                    Ok(events) => {
                        store.save(&session.store_path)?;
                        report(&events, &seq, session)?;
                        changed = true;
                        break;
                    }
                    Err(e) => Err(e),
                }
            }
        };

        match result {
            Ok(events) => {
                if !events.is_empty() {
                    store.save(&session.store_path)?;
                    changed = true;
                }
                report(&events, &seq, session)?;
            }
            Err(e) => {
                let hint = if e.is_retryable() { " (retry)" } else { "" };
                eprintln!("error: {}{}", e, hint);
            }
        }
    }

    Ok(changed)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_plain_commands() {
        assert_eq!(parse_input("start"), Ok(Input::Start));
        assert_eq!(parse_input("PASS"), Ok(Input::Record(StepStatus::Passed)));
        assert_eq!(parse_input("quick-fail"), Ok(Input::Quick(StepStatus::Failed)));
        assert_eq!(parse_input("quit"), Ok(Input::Exit));
    }

    #[test]
    fn result_targets_current_step_by_default() {
        assert_eq!(
            parse_input("result page took 9s to load"),
            Ok(Input::Result {
                step: None,
                text: "page took 9s to load".into()
            })
        );
    }

    #[test]
    fn result_with_step_number() {
        assert_eq!(
            parse_input("result 2 button missing"),
            Ok(Input::Result {
                step: Some(1),
                text: "button missing".into()
            })
        );
    }

    #[test]
    fn bare_number_is_result_text() {
        assert_eq!(
            parse_input("result 404"),
            Ok(Input::Result {
                step: None,
                text: "404".into()
            })
        );
    }

    #[test]
    fn empty_result_and_unknown_commands_are_errors() {
        assert!(parse_input("result").is_err());
        assert!(parse_input("skip").is_err());
    }
}
