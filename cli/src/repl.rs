//! Interactive and one-shot question answering.

use std::io::Write;

use marag_agent::{AgentError, Orchestrator, OrchestratorEvent, RunReport};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;

use crate::app;
use crate::config::MaragConfig;

const EXIT_COMMAND: &str = "exit";

/// Prompt for questions until `exit` or end of input.
pub(crate) async fn run_session(config: &MaragConfig) -> anyhow::Result<()> {
    let (tx, mut events) = mpsc::unbounded_channel();
    let orchestrator = app::orchestrator(config, tx)?;
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        print!("Question: ");
        std::io::stdout().flush()?;
        let Some(line) = lines.next_line().await? else {
            break;
        };
        let question = line.trim();
        if question.eq_ignore_ascii_case(EXIT_COMMAND) {
            break;
        }
        if question.is_empty() {
            continue;
        }

        match answer(&orchestrator, &mut events, question).await {
            Ok(report) => println!("{}", render_report(&report)),
            Err(e) => eprintln!("{}", render_abort(&e)),
        }
    }
    Ok(())
}

/// Answer a single question and exit.
pub(crate) async fn ask_once(config: &MaragConfig, question: &str) -> anyhow::Result<()> {
    let (tx, mut events) = mpsc::unbounded_channel();
    let orchestrator = app::orchestrator(config, tx)?;

    match answer(&orchestrator, &mut events, question).await {
        Ok(report) => {
            println!("{}", render_report(&report));
            Ok(())
        }
        Err(e) => anyhow::bail!(render_abort(&e)),
    }
}

/// Run the orchestrator, printing progress events as they arrive.
async fn answer(
    orchestrator: &Orchestrator,
    events: &mut mpsc::UnboundedReceiver<OrchestratorEvent>,
    question: &str,
) -> Result<RunReport, AgentError> {
    let ask = orchestrator.ask(question);
    tokio::pin!(ask);

    let result = loop {
        tokio::select! {
            biased;
            Some(event) = events.recv() => println!("{}", render_event(&event)),
            result = &mut ask => break result,
        }
    };
    while let Ok(event) = events.try_recv() {
        println!("{}", render_event(&event));
    }
    result
}

fn render_event(event: &OrchestratorEvent) -> String {
    match event {
        OrchestratorEvent::NodeCompleted { node } => format!("--- [node] {node} ---"),
        OrchestratorEvent::StepCompleted { index, success } => {
            let outcome = if *success { "answered" } else { "failed" };
            format!("    step {index} {outcome}")
        }
    }
}

fn render_report(report: &RunReport) -> String {
    let summary = &report.summary;
    // Runs without step answers only carry a narrative.
    if summary.answer.trim().is_empty() {
        return format!(
            "\nAnswer: {}\n(score {}/5)\n",
            summary.narrative, summary.score
        );
    }
    let mut out = format!("\nAnswer: {}\n", summary.answer);
    if !summary.narrative.is_empty() {
        out.push_str(&format!("\n{}\n", summary.narrative));
    }
    out.push_str(&format!("(score {}/5)\n", summary.score));
    out
}

fn render_abort(error: &AgentError) -> String {
    match error {
        AgentError::ExecutionOverrun { state, .. } => format!(
            "Aborted in {}: {error} ({} steps completed)",
            error.stage(),
            state.completed()
        ),
        _ => format!("Aborted in {}: {error}", error.stage()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use marag_agent::{
        FinalSummary, INSUFFICIENT_DECOMPOSITION, LlmError, Node, Plan, PlanExecutionState,
    };
    use pretty_assertions::assert_eq;

    #[test]
    fn test_render_events() {
        assert_eq!(
            render_event(&OrchestratorEvent::NodeCompleted {
                node: Node::PlanExecutor
            }),
            "--- [node] plan_executor ---"
        );
        assert_eq!(
            render_event(&OrchestratorEvent::StepCompleted {
                index: 2,
                success: false
            }),
            "    step 2 failed"
        );
    }

    fn report_with(summary: FinalSummary) -> RunReport {
        let now = chrono::Utc::now();
        RunReport {
            run_id: "run".to_string(),
            question: "q".to_string(),
            plan: Plan::default(),
            state: PlanExecutionState::new("q", Vec::new()),
            summary,
            started_at: now,
            finished_at: now,
        }
    }

    #[test]
    fn test_render_report() {
        let report = report_with(FinalSummary {
            narrative: "Found in step 1.".to_string(),
            answer: "Paris".to_string(),
            score: 5,
        });
        assert_eq!(
            render_report(&report),
            "\nAnswer: Paris\n\nFound in step 1.\n(score 5/5)\n"
        );
    }

    #[test]
    fn test_render_report_without_answer_shows_narrative() {
        let report = report_with(FinalSummary {
            narrative: INSUFFICIENT_DECOMPOSITION.to_string(),
            answer: String::new(),
            score: 0,
        });
        assert_eq!(
            render_report(&report),
            "\nAnswer: The question could not be decomposed into answerable steps.\n(score 0/5)\n"
        );
    }

    #[test]
    fn test_render_abort_names_stage() {
        let error = AgentError::PlannerFailed(LlmError::MalformedOutput("no JSON".to_string()));
        assert_eq!(
            render_abort(&error),
            "Aborted in planner: planner failed: malformed output: no JSON"
        );
    }
}
