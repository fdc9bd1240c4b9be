//! Top-level question answering loop.
//!
//! An invocation walks `Plan -> Execute -> Summarize -> Finished`. Each
//! stage is a separate method, and the orchestrator reports every finished
//! stage as an [`OrchestratorEvent`] when a channel is attached.

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use marag_retrieval::AdvancedQueryPipeline;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::info;
use uuid::Uuid;

use crate::config::{AgentConfig, LlmConfig, WebSearchConfig};
use crate::error::{AgentError, Result};
use crate::executor::SingleTaskExecutor;
use crate::llm::LlmClient;
use crate::plan_executor::PlanExecutor;
use crate::planner::{Plan, Planner};
use crate::research::ResearchAgent;
use crate::state::{FinalSummary, PlanExecutionState};
use crate::summarizer::Summarizer;
use crate::task_definer::LlmTaskDefiner;
use crate::tools::{CorpusSearchTool, Tool, ToolRegistry, WebSearchTool};

/// The agents that make up an invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Node {
    Planner,
    PlanExecutor,
    Summarizer,
}

impl fmt::Display for Node {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Node::Planner => write!(f, "planner"),
            Node::PlanExecutor => write!(f, "plan_executor"),
            Node::Summarizer => write!(f, "summarizer"),
        }
    }
}

/// Progress notifications.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrchestratorEvent {
    /// A node finished its work.
    NodeCompleted { node: Node },
    /// A plan step finished; `index` counts from 1.
    StepCompleted { index: usize, success: bool },
}

/// Where an invocation stands, with the data the next stage needs.
#[derive(Debug, Clone, PartialEq)]
pub enum Stage {
    Plan,
    Execute(Plan),
    Summarize(Plan, PlanExecutionState),
    Finished(Box<RunReport>),
}

/// Everything produced by one invocation.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunReport {
    pub run_id: String,
    pub question: String,
    pub plan: Plan,
    pub state: PlanExecutionState,
    pub summary: FinalSummary,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

/// Answers questions with the planner, plan executor and summarizer.
pub struct Orchestrator {
    planner: Planner,
    plan_executor: PlanExecutor,
    summarizer: Summarizer,
    events: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl Orchestrator {
    pub fn builder(llm: Arc<dyn LlmClient>, llm_config: LlmConfig) -> OrchestratorBuilder {
        OrchestratorBuilder::new(llm, llm_config)
    }

    /// Answer `question`, running every stage to completion.
    pub async fn ask(&self, question: &str) -> Result<RunReport> {
        let run_id = Uuid::new_v4().to_string();
        let started_at = Utc::now();
        info!(run_id = %run_id, question, "Answering question");

        let mut stage = Stage::Plan;
        loop {
            stage = match stage {
                Stage::Plan => self.plan(question).await?,
                Stage::Execute(plan) => self.execute(question, plan).await?,
                Stage::Summarize(plan, state) => {
                    let summary = self.summarize(question, &state).await?;
                    Stage::Finished(Box::new(RunReport {
                        run_id: run_id.clone(),
                        question: question.to_string(),
                        plan,
                        state,
                        summary,
                        started_at,
                        finished_at: Utc::now(),
                    }))
                }
                Stage::Finished(report) => {
                    info!(run_id = %report.run_id, score = report.summary.score, "Question answered");
                    return Ok(*report);
                }
            };
        }
    }

    /// Plan to Execute.
    pub async fn plan(&self, question: &str) -> Result<Stage> {
        let plan = self
            .planner
            .plan(question)
            .await
            .map_err(AgentError::PlannerFailed)?;
        self.emit(OrchestratorEvent::NodeCompleted { node: Node::Planner });
        Ok(Stage::Execute(plan))
    }

    /// Execute to Summarize.
    pub async fn execute(&self, question: &str, plan: Plan) -> Result<Stage> {
        let state = self
            .plan_executor
            .execute(question, plan.steps.clone())
            .await?;
        self.emit(OrchestratorEvent::NodeCompleted {
            node: Node::PlanExecutor,
        });
        Ok(Stage::Summarize(plan, state))
    }

    /// Summarize the step answers; the caller finishes the run.
    pub async fn summarize(
        &self,
        question: &str,
        state: &PlanExecutionState,
    ) -> Result<FinalSummary> {
        let summary = self
            .summarizer
            .summarize(question, state.answers())
            .await
            .map_err(AgentError::SummarizerFailed)?;
        self.emit(OrchestratorEvent::NodeCompleted {
            node: Node::Summarizer,
        });
        Ok(summary)
    }

    fn emit(&self, event: OrchestratorEvent) {
        if let Some(events) = &self.events {
            let _ = events.send(event);
        }
    }
}

/// Wires the agents, tools and limits of an [`Orchestrator`].
pub struct OrchestratorBuilder {
    llm: Arc<dyn LlmClient>,
    llm_config: LlmConfig,
    config: AgentConfig,
    tools: ToolRegistry,
    corpus_pipeline: Option<Arc<AdvancedQueryPipeline>>,
    events: Option<mpsc::UnboundedSender<OrchestratorEvent>>,
}

impl OrchestratorBuilder {
    pub fn new(llm: Arc<dyn LlmClient>, llm_config: LlmConfig) -> Self {
        Self {
            llm,
            llm_config,
            config: AgentConfig::default(),
            tools: ToolRegistry::new(),
            corpus_pipeline: None,
            events: None,
        }
    }

    pub fn with_config(mut self, config: AgentConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a tool for the research agent.
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools = self.tools.with_tool(tool);
        self
    }

    /// Register the Tavily web search tool.
    pub fn with_web_search(self, config: WebSearchConfig) -> Self {
        self.with_tool(Arc::new(WebSearchTool::new(config)))
    }

    /// Register the corpus search tool over `pipeline`.
    pub fn with_corpus_search(mut self, pipeline: Arc<AdvancedQueryPipeline>) -> Self {
        self.corpus_pipeline = Some(pipeline);
        self
    }

    pub fn with_events(mut self, events: mpsc::UnboundedSender<OrchestratorEvent>) -> Self {
        self.events = Some(events);
        self
    }

    pub fn build(self) -> Orchestrator {
        let mut tools = self.tools;
        if let Some(pipeline) = self.corpus_pipeline {
            tools = tools.with_tool(Arc::new(
                CorpusSearchTool::new(pipeline).with_default_corpus(self.config.default_corpus.clone()),
            ));
        }

        let research = ResearchAgent::new(
            self.llm.clone(),
            self.llm_config.clone(),
            tools,
            self.config.max_react_iterations,
        );
        let executor = SingleTaskExecutor::new(self.llm.clone(), self.llm_config.clone(), research);
        let definer = LlmTaskDefiner::new(self.llm.clone(), self.llm_config.clone());

        let mut plan_executor = PlanExecutor::new(
            Arc::new(definer),
            Arc::new(executor),
            self.config.max_iterations,
        );
        if let Some(events) = &self.events {
            plan_executor = plan_executor.with_events(events.clone());
        }

        Orchestrator {
            planner: Planner::new(self.llm.clone(), self.llm_config.clone()),
            plan_executor,
            summarizer: Summarizer::new(self.llm, self.llm_config, self.config.min_confident_rating),
            events: self.events,
        }
    }
}
