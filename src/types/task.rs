//! Sub-tasks produced by decomposition

use crate::types::query::QueryId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Task identifier, 1-based and ordered by creation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TaskId(pub usize);

impl fmt::Display for TaskId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "T{}", self.0)
    }
}

/// One unit of retrieval + synthesis work
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Parent query
    pub query_id: QueryId,

    pub id: TaskId,

    /// Natural language sub-question
    pub description: String,

    /// Tasks that must complete first (empty = runnable immediately)
    pub dependencies: Vec<TaskId>,

    /// May run concurrently with other ready tasks
    pub parallelizable: bool,
}

impl SubTask {
    /// A task that wraps the whole query
    pub fn whole_query(query_id: QueryId, text: &str) -> Self {
        Self {
            query_id,
            id: TaskId(1),
            description: text.to_string(),
            dependencies: Vec::new(),
            parallelizable: true,
        }
    }

    pub fn is_independent(&self) -> bool {
        self.dependencies.is_empty()
    }
}

/// How sub-task answers are combined into the final answer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntegrationMethod {
    /// Provenance-tagged concatenation, no extra model call
    #[default]
    Concatenate,

    /// Model merges sections into one coherent answer
    Synthesize,

    /// Model contrasts the sections
    Compare,
}

impl IntegrationMethod {
    pub fn parse(label: &str) -> Option<IntegrationMethod> {
        match label.trim().to_lowercase().as_str() {
            "concatenate" | "concat" => Some(IntegrationMethod::Concatenate),
            "synthesize" | "synthesise" => Some(IntegrationMethod::Synthesize),
            "compare" => Some(IntegrationMethod::Compare),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_task_id_display_and_order() {
        assert_eq!(TaskId(3).to_string(), "T3");
        assert!(TaskId(1) < TaskId(2));
    }

    #[test]
    fn test_whole_query_task() {
        let task = SubTask::whole_query(Uuid::new_v4(), "What is RAG?");
        assert_eq!(task.id, TaskId(1));
        assert!(task.is_independent());
        assert_eq!(task.description, "What is RAG?");
    }

    #[test]
    fn test_integration_method_parse() {
        assert_eq!(IntegrationMethod::parse("Compare"), Some(IntegrationMethod::Compare));
        assert_eq!(IntegrationMethod::parse("synthesize"), Some(IntegrationMethod::Synthesize));
        assert_eq!(IntegrationMethod::parse("merge"), None);
    }
}
