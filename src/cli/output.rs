//! Human-readable rendering of answers, classifications and plans

use crate::config::Settings;
use crate::types::{
    AgenticAnswer, AnswerStatus, QueryClassification, RetrievalConfig, TraceEvent,
};
use colored::*;

fn status_badge(status: &AnswerStatus) -> ColoredString {
    let label = status.label();
    match status {
        AnswerStatus::Passed => label.green(),
        AnswerStatus::Unevaluated | AnswerStatus::RoundLimitExceeded => label.yellow(),
        AnswerStatus::NeedsClarification => label.cyan(),
        _ => label.red(),
    }
}

fn header(title: &str) -> String {
    format!("\n{}\n{}", title.bold().cyan(), "=".repeat(60).cyan())
}

/// Render a final answer; the trace is appended when requested
pub fn render_answer(answer: &AgenticAnswer, show_trace: bool) -> String {
    let mut out = String::new();

    out.push_str(&header("Answer"));
    out.push('\n');
    out.push_str(&answer.answer_text);
    out.push('\n');

    out.push_str(&header("Details"));
    out.push_str(&format!(
        "\n  Query Type:   {} ({:.2})",
        answer.query_type.as_str().green(),
        answer.confidence
    ));
    out.push_str(&format!("\n  Status:       {}", status_badge(&answer.status)));
    if let AnswerStatus::Degraded { reason } = &answer.status {
        out.push_str(&format!("\n  Reason:       {:?}", reason));
    }
    out.push_str(&format!("\n  Rounds:       {}", answer.rounds_used));
    out.push_str(&format!("\n  Tasks:        {}", answer.task_answers.len()));

    if let Some(assessment) = &answer.quality_assessment {
        out.push_str(&format!("\n  Quality:      {:.2}", assessment.aggregate));
    }

    if !answer.sources.is_empty() {
        out.push_str(&format!("\n  Sources:      {}", answer.sources.join(", ")));
    }
    out.push('\n');

    if show_trace && !answer.trace.is_empty() {
        out.push_str(&header("Trace"));
        for (i, event) in answer.trace.iter().enumerate() {
            out.push_str(&format!("\n  {}. {}", (i + 1).to_string().cyan(), describe(event)));
        }
        out.push('\n');
    }

    out
}

fn describe(event: &TraceEvent) -> String {
    match event {
        TraceEvent::Classified {
            query_type,
            confidence,
            parsed,
        } => format!(
            "classified as {} ({:.2}){}",
            query_type.as_str(),
            confidence,
            if *parsed { "" } else { " [unparseable]" }
        ),
        TraceEvent::ClarificationRequested { question } => {
            format!("clarification requested: {}", question)
        }
        TraceEvent::Decomposed { tasks, integration } => {
            format!("decomposed into {} tasks ({:?})", tasks, integration)
        }
        TraceEvent::DecompositionFallback { reason } => {
            format!("decomposition fell back to a single task: {}", reason)
        }
        TraceEvent::RoundCompleted {
            task_id,
            round,
            strategy,
            top_k,
            similarity_threshold,
            passages,
            aggregate,
            passed,
        } => {
            let quality = match aggregate {
                Some(score) => format!("quality {:.2}{}", score, if *passed { " ✓" } else { "" }),
                None => "not evaluated".to_string(),
            };
            format!(
                "{} round {}: {:?} top_k={} threshold={:.2}, {} passages, {}",
                task_id, round, strategy, top_k, similarity_threshold, passages, quality
            )
        }
        TraceEvent::TaskCompleted {
            task_id,
            status,
            rounds,
        } => format!("{} finished: {} after {} rounds", task_id, status.label(), rounds),
        TraceEvent::Assembled { tasks, smoothed } => format!(
            "assembled {} answers{}",
            tasks,
            if *smoothed { " with final synthesis" } else { "" }
        ),
    }
}

pub fn render_classification(classification: &QueryClassification) -> String {
    let mut out = header("Classification");
    out.push_str(&format!(
        "\n  Type:         {}",
        classification.query_type.as_str().green()
    ));
    out.push_str(&format!("\n  Confidence:   {:.2}", classification.confidence));
    if !classification.is_parsed() {
        out.push_str(&format!("\n  Parsed:       {}", "No".red()));
    }
    if let Some(question) = &classification.clarification_question {
        out.push_str(&format!("\n  Clarify:      {}", question));
    }
    out.push('\n');
    out
}

pub fn render_plan(rounds: &[RetrievalConfig]) -> String {
    let mut out = header("Retrieval Plan");
    for config in rounds {
        out.push_str(&format!(
            "\n  Round {}: {:?}  top_k={}  threshold={:.2}{}",
            config.round.to_string().cyan(),
            config.strategy,
            config.top_k,
            config.similarity_threshold,
            if config.clarify { "  (clarify)" } else { "" }
        ));
    }
    out.push('\n');
    out
}

pub fn render_settings(settings: &Settings) -> String {
    let mut out = header("Configuration");
    out.push_str(&format!("\n  Ollama:       {}", settings.ollama_url().green()));
    out.push_str(&format!("\n  Model:        {}", settings.ollama.model.green()));

    let search = match (&settings.search.endpoint, &settings.search.corpus) {
        (Some(url), _) => url.clone(),
        (None, Some(path)) => path.display().to_string(),
        (None, None) => "not configured".to_string(),
    };
    out.push_str(&format!("\n  Search:       {}", search));
    out.push_str(&format!(
        "\n  Max Rounds:   {}",
        settings.agent.max_retrieval_rounds
    ));
    out.push_str(&format!(
        "\n  Threshold:    {:.2}",
        settings.agent.quality_threshold
    ));
    out.push_str(&format!(
        "\n  Decompose:    {}",
        if settings.agent.enable_task_decomposition { "On".green() } else { "Off".red() }
    ));
    out.push_str(&format!(
        "\n  Reflection:   {}",
        if settings.agent.enable_self_reflection { "On".green() } else { "Off".red() }
    ));
    if let Some(path) = Settings::default_path() {
        out.push_str(&format!("\n  File:         {}", path.display()));
    }
    out.push('\n');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{QueryType, RetrievalStrategy, TaskId};
    use uuid::Uuid;

    fn answer() -> AgenticAnswer {
        AgenticAnswer {
            query_id: Uuid::nil(),
            query_type: QueryType::Factual,
            confidence: 0.9,
            answer_text: "Paris".to_string(),
            sources: vec!["doc-1".to_string()],
            rounds_used: 1,
            quality_assessment: None,
            status: AnswerStatus::Passed,
            task_answers: Vec::new(),
            trace: vec![TraceEvent::TaskCompleted {
                task_id: TaskId(1),
                status: AnswerStatus::Passed,
                rounds: 1,
            }],
        }
    }

    #[test]
    fn test_render_answer() {
        colored::control::set_override(false);
        let text = render_answer(&answer(), false);
        assert!(text.contains("Paris"));
        assert!(text.contains("doc-1"));
        assert!(!text.contains("Trace"));

        let text = render_answer(&answer(), true);
        assert!(text.contains("T1 finished: passed after 1 rounds"));
    }

    #[test]
    fn test_render_plan() {
        colored::control::set_override(false);
        let rounds = vec![RetrievalConfig {
            strategy: RetrievalStrategy::Precise,
            top_k: 3,
            similarity_threshold: 0.8,
            max_rounds: 1,
            round: 1,
            clarify: false,
        }];
        let text = render_plan(&rounds);
        assert!(text.contains("top_k=3"));
        assert!(text.contains("threshold=0.80"));
    }
}
