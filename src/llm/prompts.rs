//! Fixed instruction prompts for each pipeline stage

use crate::types::IntegrationMethod;

/// Query classification instructions
pub const CLASSIFIER_SYSTEM: &str = r#"You are a query routing expert. Classify the user's query into exactly one type.

Types:
1. factual - asks for a specific fact, figure, name or date.
   Example: "When was the HIS system released?"
2. conceptual - asks for a definition, principle or explanation.
   Example: "What is retrieval-augmented generation?"
3. procedural - asks for steps, a workflow or how to do something.
   Example: "How do I register a patient in the HIS system?"
4. comparative - contrasts two or more things.
   Example: "What is the difference between HIS and EMR?"
5. analytical - requires deeper analysis, trade-offs or reasoning.
   Example: "Analyze the strengths and weaknesses of the HIS system."
6. multi_hop - needs several chained lookups, each building on the last.
   Example: "Who developed the HIS system and what else did they build?"
7. ambiguous - underspecified; cannot be answered without clarification.
   Example: "How do I use that system?"

Respond with JSON only:
{"query_type": "<type>", "confidence": <0.0-1.0>, "clarification_question": "<question if ambiguous, else empty>"}"#;

/// Task decomposition instructions
pub const DECOMPOSER_SYSTEM: &str = r#"You are a task decomposition expert. Split the query into atomic sub-questions that can each be answered by a single retrieval.

Rules:
1. Each sub-question must be answerable on its own, given the answers it depends on.
2. List dependencies by the ids of EARLIER sub-questions only.
3. Mark a sub-question parallelizable when it can run alongside its siblings.
4. Prefer 2-5 sub-questions.

Respond with JSON only:
{
  "subtasks": [
    {"id": 1, "question": "...", "depends_on": [], "parallelizable": true}
  ],
  "integration_method": "concatenate | synthesize | compare"
}

integration_method:
- concatenate: answers are stitched together as-is
- synthesize: answers are merged into one coherent answer
- compare: answers are contrasted against each other"#;

/// Draft answer instructions
pub const SYNTHESIZER_SYSTEM: &str = r#"You answer questions using ONLY the evidence provided.
Cite evidence by its [source_id]. If the evidence does not contain the answer, say so plainly instead of guessing."#;

/// Quality rubric instructions
pub const EVALUATOR_SYSTEM: &str = r#"You are an answer quality assessor. Score the draft answer against the question and the evidence.

Dimensions (each 0.0-1.0):
1. relevance - does the answer address the question?
2. completeness - does it cover everything the question asks?
3. accuracy - is every claim supported by the evidence?
4. clarity - is it well organized and easy to follow?

Respond with JSON only:
{
  "relevance": 0.0,
  "completeness": 0.0,
  "accuracy": 0.0,
  "clarity": 0.0,
  "missing_info": ["key information that is missing"],
  "suggestions": ["how the answer could be improved"],
  "new_query": "a better search query if more evidence is needed, else empty"
}"#;

/// Final smoothing instructions for `synthesize`
pub const ASSEMBLE_SYNTHESIZE_SYSTEM: &str = "You are an information synthesis expert. Merge the section answers into one complete, coherent answer. Keep the [T<n>] provenance tags next to the statements they support.";

/// Final smoothing instructions for `compare`
pub const ASSEMBLE_COMPARE_SYSTEM: &str = "You are a comparative analysis expert. Contrast the section answers, highlighting similarities and differences, then conclude. Keep the [T<n>] provenance tags next to the statements they support.";

pub fn classify_user(query: &str) -> String {
    format!("Classify the following query:\n{}", query)
}

pub fn decompose_user(query: &str, max_subtasks: usize) -> String {
    format!(
        "Decompose the following query into at most {} sub-questions:\n{}",
        max_subtasks, query
    )
}

pub fn synthesize_user(question: &str, evidence: &str, dependency_context: &str) -> String {
    let mut prompt = String::new();
    if !dependency_context.is_empty() {
        prompt.push_str("Answers to prerequisite questions:\n");
        prompt.push_str(dependency_context);
        prompt.push_str("\n\n");
    }
    prompt.push_str(evidence);
    prompt.push_str("\n\nQuestion: ");
    prompt.push_str(question);
    prompt
}

pub fn evaluate_user(question: &str, evidence: &str, draft: &str, sources: &[String]) -> String {
    format!(
        "Question:\n{}\n\n{}\n\nDraft answer:\n{}\n\nSources: {}\n\nAssess the draft answer.",
        question,
        evidence,
        draft,
        sources.join(", ")
    )
}

pub fn assemble_system(method: IntegrationMethod) -> &'static str {
    match method {
        IntegrationMethod::Compare => ASSEMBLE_COMPARE_SYSTEM,
        IntegrationMethod::Synthesize | IntegrationMethod::Concatenate => ASSEMBLE_SYNTHESIZE_SYSTEM,
    }
}

pub fn assemble_user(query: &str, sections: &str) -> String {
    format!(
        "Original query:\n{}\n\nSection answers:\n\n{}\n\nWrite the final answer.",
        query, sections
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classifier_prompt_lists_all_types() {
        for label in crate::types::QueryType::ALL.iter().map(|t| t.as_str()) {
            assert!(CLASSIFIER_SYSTEM.contains(label), "missing {}", label);
        }
    }

    #[test]
    fn test_synthesize_includes_dependency_context() {
        let prompt = synthesize_user("Q?", "Evidence", "[T1] earlier answer");
        assert!(prompt.contains("[T1] earlier answer"));
        assert!(prompt.contains("Question: Q?"));

        let bare = synthesize_user("Q?", "Evidence", "");
        assert!(!bare.contains("prerequisite"));
    }
}
