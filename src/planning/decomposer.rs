//! Task decomposition
//!
//! Splits MultiHop and sufficiently complex Analytical queries into a
//! dependency-ordered set of sub-questions. Model output is sanitized
//! (renumbered 1..n, unknown dependencies dropped), validated as a DAG,
//! put in dependency order, and capped at `max_subtasks` by merging the
//! excess into the last task.

use crate::config::DecomposerConfig;
use crate::errors::{RagError, Result};
use crate::llm::parser::string_field;
use crate::llm::{prompts, CompletionProvider, CompletionRequest, JsonExtractor, PromptRole};
use crate::planning::complexity::ComplexityEstimator;
use crate::planning::dag::TaskGraph;
use crate::types::{IntegrationMethod, Query, QueryClassification, QueryType, SubTask, TaskId};
use serde_json::Value;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use tracing::{debug, warn};

/// Sub-tasks for one query plus how their answers combine
#[derive(Debug, Clone)]
pub struct Decomposition {
    pub tasks: Vec<SubTask>,
    pub integration: IntegrationMethod,
}

impl Decomposition {
    /// The query as its own single task
    pub fn single(query: &Query) -> Self {
        Self {
            tasks: vec![SubTask::whole_query(query.id(), query.text())],
            integration: IntegrationMethod::Concatenate,
        }
    }

    pub fn is_single(&self) -> bool {
        self.tasks.len() == 1
    }
}

/// Raw sub-question as read from the model, before renumbering
#[derive(Debug, Clone)]
struct DraftTask {
    label: i64,
    question: String,
    depends_on: Vec<i64>,
    parallelizable: Option<bool>,
}

/// Model-driven query decomposer
#[derive(Clone)]
pub struct TaskDecomposer {
    provider: Arc<dyn CompletionProvider>,
    config: DecomposerConfig,
    estimator: ComplexityEstimator,
    extractor: JsonExtractor,
}

impl TaskDecomposer {
    pub fn new(provider: Arc<dyn CompletionProvider>, config: DecomposerConfig) -> Self {
        Self {
            provider,
            config,
            estimator: ComplexityEstimator::new(),
            extractor: JsonExtractor::new(),
        }
    }

    /// Whether a classified query qualifies for decomposition
    ///
    /// MultiHop needs confidence ≥ threshold; Analytical additionally needs
    /// heuristic complexity ≥ complexity_threshold.
    pub fn is_applicable(&self, query: &Query, classification: &QueryClassification) -> bool {
        if !classification.query_type.is_decomposable()
            || classification.confidence < self.config.decomposition_threshold
        {
            return false;
        }

        match classification.query_type {
            QueryType::Analytical => {
                self.estimator.estimate(query.text()) >= self.config.complexity_threshold
            }
            _ => true,
        }
    }

    /// Decompose a query. Non-applicable queries yield a single task.
    ///
    /// Fails with [`RagError::DecompositionCycle`] on cyclic dependencies
    /// and with a generic error on unusable model output; callers fall back
    /// to [`Decomposition::single`].
    pub async fn decompose(
        &self,
        query: &Query,
        classification: &QueryClassification,
    ) -> Result<Decomposition> {
        if !self.is_applicable(query, classification) {
            return Ok(Decomposition::single(query));
        }

        let request = CompletionRequest::new(
            PromptRole::Decompose,
            prompts::DECOMPOSER_SYSTEM,
            prompts::decompose_user(query.text(), self.config.max_subtasks),
        )
        .with_temperature(self.config.temperature)
        .with_max_tokens(self.config.max_tokens);

        let response = self.provider.complete(&request).await?;
        let value = self
            .extractor
            .extract(&response)?
            .ok_or_else(|| RagError::Generic("decomposition response has no JSON object".to_string()))?;

        let drafts = parse_drafts(&value);
        if drafts.len() < 2 {
            debug!(subtasks = drafts.len(), "decomposition produced fewer than two sub-tasks");
            return Ok(Decomposition::single(query));
        }

        let tasks = renumber(query, drafts);
        let graph = TaskGraph::build(&tasks)?;

        let tasks = cap_tasks(dependency_order(tasks, &graph), self.config.max_subtasks);
        TaskGraph::build(&tasks)?;

        let integration = string_field(&value, "integration_method")
            .as_deref()
            .and_then(IntegrationMethod::parse)
            .unwrap_or_default();

        debug!(subtasks = tasks.len(), ?integration, "decomposed query");
        Ok(Decomposition { tasks, integration })
    }
}

fn parse_drafts(value: &Value) -> Vec<DraftTask> {
    let items = ["subtasks", "sub_tasks", "tasks"]
        .iter()
        .find_map(|key| value.get(*key).and_then(Value::as_array));

    let Some(items) = items else {
        return Vec::new();
    };

    items
        .iter()
        .enumerate()
        .filter_map(|(position, item)| {
            let question = ["question", "description", "query"]
                .iter()
                .find_map(|key| string_field(item, key))
                .or_else(|| item.as_str().map(str::trim).filter(|s| !s.is_empty()).map(str::to_string))?;

            let label = item
                .get("id")
                .and_then(task_label)
                .unwrap_or(position as i64 + 1);

            let depends_on = ["depends_on", "dependencies"]
                .iter()
                .find_map(|key| item.get(*key).and_then(Value::as_array))
                .map(|deps| deps.iter().filter_map(task_label).collect())
                .unwrap_or_default();

            Some(DraftTask {
                label,
                question,
                depends_on,
                parallelizable: item.get("parallelizable").and_then(Value::as_bool),
            })
        })
        .collect()
}

/// Task reference as a number, numeric string, or `T<n>`
fn task_label(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s
            .trim()
            .trim_start_matches(['T', 't'])
            .parse::<i64>()
            .ok(),
        _ => None,
    }
}

/// Assign ids 1..n in listed order and resolve dependency labels
fn renumber(query: &Query, drafts: Vec<DraftTask>) -> Vec<SubTask> {
    let mut ids: HashMap<i64, TaskId> = HashMap::new();
    for (position, draft) in drafts.iter().enumerate() {
        ids.entry(draft.label).or_insert(TaskId(position + 1));
    }

    drafts
        .into_iter()
        .enumerate()
        .map(|(position, draft)| {
            let id = TaskId(position + 1);
            let mut dependencies = BTreeSet::new();
            for label in &draft.depends_on {
                match ids.get(label) {
                    Some(dep) => {
                        dependencies.insert(*dep);
                    }
                    None => warn!(task = %id, dependency = label, "dropping unknown dependency"),
                }
            }

            let dependencies: Vec<TaskId> = dependencies.into_iter().collect();
            SubTask {
                query_id: query.id(),
                id,
                description: draft.question,
                parallelizable: draft.parallelizable.unwrap_or(dependencies.is_empty()),
                dependencies,
            }
        })
        .collect()
}

/// Reorder tasks so every dependency precedes its dependent, renumbering
/// ids 1..n to match. Any prefix of the result is dependency-closed.
fn dependency_order(tasks: Vec<SubTask>, graph: &TaskGraph) -> Vec<SubTask> {
    let order = graph.execution_order();
    let ids: HashMap<TaskId, TaskId> = order
        .iter()
        .enumerate()
        .map(|(position, id)| (*id, TaskId(position + 1)))
        .collect();

    let mut by_id: HashMap<TaskId, SubTask> = tasks.into_iter().map(|t| (t.id, t)).collect();
    order
        .iter()
        .filter_map(|id| by_id.remove(id))
        .filter_map(|mut task| {
            task.id = *ids.get(&task.id)?;
            let dependencies: BTreeSet<TaskId> =
                task.dependencies.iter().filter_map(|d| ids.get(d).copied()).collect();
            task.dependencies = dependencies.into_iter().collect();
            Some(task)
        })
        .collect()
}

/// Merge tasks beyond `max` into the last kept task
fn cap_tasks(mut tasks: Vec<SubTask>, max: usize) -> Vec<SubTask> {
    let max = max.max(1);
    if tasks.len() <= max {
        return tasks;
    }

    let excess = tasks.split_off(max);
    let last_id = TaskId(max);
    let merged_ids: BTreeSet<TaskId> = excess.iter().map(|t| t.id).collect();

    warn!(kept = max, merged = excess.len(), "sub-task cap reached; merging excess");

    let redirect = |deps: &[TaskId], owner: TaskId| -> Vec<TaskId> {
        deps.iter()
            .map(|d| if merged_ids.contains(d) { last_id } else { *d })
            .filter(|d| *d != owner)
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect()
    };

    for task in tasks.iter_mut() {
        task.dependencies = redirect(&task.dependencies, task.id);
    }

    if let Some(last) = tasks.last_mut() {
        let mut dependencies = last.dependencies.clone();
        for extra in &excess {
            last.description.push('\n');
            last.description.push_str(&extra.description);
            dependencies.extend(extra.dependencies.iter().copied());
            last.parallelizable &= extra.parallelizable;
        }
        last.dependencies = redirect(&dependencies, last_id);
    }

    tasks
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::llm::CompletionRequest;
    use async_trait::async_trait;

    struct Canned(&'static str);

    #[async_trait]
    impl CompletionProvider for Canned {
        fn name(&self) -> &str {
            "canned"
        }

        async fn complete(&self, _request: &CompletionRequest) -> Result<String> {
            Ok(self.0.to_string())
        }
    }

    fn decomposer(response: &'static str) -> TaskDecomposer {
        TaskDecomposer::new(Arc::new(Canned(response)), DecomposerConfig::default())
    }

    fn multi_hop(query: &Query, confidence: f64) -> QueryClassification {
        QueryClassification::parsed(query.id(), QueryType::MultiHop, confidence)
    }

    const TWO_PLUS_ONE: &str = r#"{
        "subtasks": [
            {"id": 1, "question": "What is Agentic RAG?", "depends_on": [], "parallelizable": true},
            {"id": 2, "question": "What is traditional RAG?", "depends_on": [], "parallelizable": true},
            {"id": 3, "question": "Which suits enterprise knowledge management?", "depends_on": [1, 2], "parallelizable": false}
        ],
        "integration_method": "compare"
    }"#;

    #[tokio::test]
    async fn test_decomposes_multi_hop() {
        let query = Query::new("Compare Agentic RAG and traditional RAG").unwrap();
        let d = decomposer(TWO_PLUS_ONE)
            .decompose(&query, &multi_hop(&query, 0.9))
            .await
            .unwrap();

        assert_eq!(d.tasks.len(), 3);
        assert_eq!(d.integration, IntegrationMethod::Compare);
        assert_eq!(d.tasks[2].dependencies, vec![TaskId(1), TaskId(2)]);
        assert!(!d.tasks[2].parallelizable);
        assert!(d.tasks.iter().all(|t| t.query_id == query.id()));
    }

    #[tokio::test]
    async fn test_low_confidence_is_single_task() {
        let query = Query::new("Compare Agentic RAG and traditional RAG").unwrap();
        let d = decomposer(TWO_PLUS_ONE)
            .decompose(&query, &multi_hop(&query, 0.3))
            .await
            .unwrap();
        assert!(d.is_single());
        assert_eq!(d.tasks[0].description, query.text());
    }

    #[tokio::test]
    async fn test_other_types_are_single_task() {
        let query = Query::new("What is Agentic RAG?").unwrap();
        let classification = QueryClassification::parsed(query.id(), QueryType::Conceptual, 0.95);
        let d = decomposer(TWO_PLUS_ONE).decompose(&query, &classification).await.unwrap();
        assert!(d.is_single());
    }

    #[tokio::test]
    async fn test_simple_analytical_is_single_task() {
        let query = Query::new("Why?").unwrap();
        let classification = QueryClassification::parsed(query.id(), QueryType::Analytical, 0.9);
        let d = decomposer(TWO_PLUS_ONE).decompose(&query, &classification).await.unwrap();
        assert!(d.is_single());
    }

    #[tokio::test]
    async fn test_cycle_is_rejected() {
        let query = Query::new("q").unwrap();
        let err = decomposer(
            r#"{"subtasks": [
                {"id": 1, "question": "a", "depends_on": [2]},
                {"id": 2, "question": "b", "depends_on": [1]}
            ]}"#,
        )
        .decompose(&query, &multi_hop(&query, 0.9))
        .await
        .unwrap_err();
        assert!(matches!(err, RagError::DecompositionCycle { .. }));
    }

    #[tokio::test]
    async fn test_unknown_dependencies_dropped() {
        let query = Query::new("q").unwrap();
        let d = decomposer(
            r#"{"subtasks": [
                {"id": 1, "question": "a", "depends_on": [7]},
                {"id": 2, "question": "b", "depends_on": ["T1"]}
            ]}"#,
        )
        .decompose(&query, &multi_hop(&query, 0.9))
        .await
        .unwrap();
        assert!(d.tasks[0].dependencies.is_empty());
        assert_eq!(d.tasks[1].dependencies, vec![TaskId(1)]);
        assert_eq!(d.integration, IntegrationMethod::Concatenate);
    }

    #[tokio::test]
    async fn test_unusable_output_errors() {
        let query = Query::new("q").unwrap();
        assert!(decomposer("no json here")
            .decompose(&query, &multi_hop(&query, 0.9))
            .await
            .is_err());
    }

    #[test]
    fn test_cap_merges_excess_into_last() {
        let query = Query::new("q").unwrap();
        let drafts = (1..=5)
            .map(|i| DraftTask {
                label: i,
                question: format!("q{}", i),
                depends_on: if i == 5 { vec![1] } else { vec![] },
                parallelizable: None,
            })
            .collect();
        let tasks = cap_tasks(renumber(&query, drafts), 3);

        assert_eq!(tasks.len(), 3);
        assert_eq!(tasks[2].description, "q3\nq4\nq5");
        assert_eq!(tasks[2].dependencies, vec![TaskId(1)]);
        assert!(TaskGraph::build(&tasks).is_ok());
    }

    #[tokio::test]
    async fn test_cap_with_back_references_stays_acyclic() {
        let query = Query::new("q").unwrap();
        let d = decomposer(
            r#"{"subtasks": [
                {"id": 1, "question": "q1"},
                {"id": 2, "question": "q2", "depends_on": [9]},
                {"id": 3, "question": "q3"},
                {"id": 4, "question": "q4"},
                {"id": 5, "question": "q5"},
                {"id": 6, "question": "q6"},
                {"id": 7, "question": "q7"},
                {"id": 8, "question": "q8", "depends_on": [2]},
                {"id": 9, "question": "q9"}
            ]}"#,
        )
        .decompose(&query, &multi_hop(&query, 0.9))
        .await
        .unwrap();

        assert_eq!(d.tasks.len(), 8);
        assert!(TaskGraph::build(&d.tasks).is_ok());

        let position = |needle: &str| d.tasks.iter().position(|t| t.description.contains(needle));
        assert!(position("q9") < position("q2"));
        assert!(position("q2") <= position("q8"));
        for task in &d.tasks {
            assert!(task.dependencies.iter().all(|dep| *dep < task.id));
        }
    }

    #[test]
    fn test_dependency_order_renumbers_prerequisites_first() {
        let query = Query::new("q").unwrap();
        let drafts = vec![
            DraftTask { label: 1, question: "a".into(), depends_on: vec![3], parallelizable: None },
            DraftTask { label: 2, question: "b".into(), depends_on: vec![], parallelizable: None },
            DraftTask { label: 3, question: "c".into(), depends_on: vec![], parallelizable: None },
        ];
        let tasks = renumber(&query, drafts);
        let graph = TaskGraph::build(&tasks).unwrap();
        let tasks = dependency_order(tasks, &graph);

        let order: Vec<_> = tasks.iter().map(|t| t.description.as_str()).collect();
        assert_eq!(order, vec!["b", "c", "a"]);
        assert_eq!(tasks[2].dependencies, vec![TaskId(2)]);
        assert_eq!(tasks[2].id, TaskId(3));
    }

    #[test]
    fn test_cap_redirects_dependencies_on_merged_tasks() {
        let query = Query::new("q").unwrap();
        let drafts = vec![
            DraftTask { label: 1, question: "a".into(), depends_on: vec![], parallelizable: None },
            DraftTask { label: 2, question: "b".into(), depends_on: vec![3], parallelizable: None },
            DraftTask { label: 3, question: "c".into(), depends_on: vec![], parallelizable: None },
        ];
        let tasks = cap_tasks(renumber(&query, drafts), 2);
        assert_eq!(tasks.len(), 2);
        assert!(tasks[1].dependencies.is_empty());
    }
}
