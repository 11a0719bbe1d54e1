//! Dependency-resolution ledger
//!
//! Owned by the orchestrator's coordination loop and never touched by
//! workers. Dispatch policy:
//! - Ready = pending with every dependency completed
//! - FIFO by task id: the lowest ready id is the head and goes first
//! - A non-parallelizable task runs alone; the head waits for the pool to drain
//! - At most `worker_limit` tasks run at once

use crate::types::{Answer, AnswerStatus, SubTask, TaskId};
use std::collections::BTreeMap;

/// Scheduling slot of one task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Slot {
    Pending,
    Running,
    Completed,
}

#[derive(Debug)]
pub struct TaskLedger {
    tasks: BTreeMap<TaskId, SubTask>,
    slots: BTreeMap<TaskId, Slot>,
    answers: BTreeMap<TaskId, Answer>,

    /// Dependency order used for assembly
    order: Vec<TaskId>,
}

impl TaskLedger {
    /// `order` must be a topological order of `tasks`
    pub fn new(tasks: Vec<SubTask>, order: Vec<TaskId>) -> Self {
        let slots = tasks.iter().map(|t| (t.id, Slot::Pending)).collect();
        let tasks = tasks.into_iter().map(|t| (t.id, t)).collect();

        Self {
            tasks,
            slots,
            answers: BTreeMap::new(),
            order,
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    pub fn slot(&self, id: TaskId) -> Option<Slot> {
        self.slots.get(&id).copied()
    }

    pub fn running(&self) -> usize {
        self.count(Slot::Running)
    }

    pub fn pending(&self) -> usize {
        self.count(Slot::Pending)
    }

    fn count(&self, slot: Slot) -> usize {
        self.slots.values().filter(|s| **s == slot).count()
    }

    pub fn is_done(&self) -> bool {
        self.slots.values().all(|s| *s == Slot::Completed)
    }

    fn is_ready(&self, task: &SubTask) -> bool {
        self.slots.get(&task.id) == Some(&Slot::Pending)
            && task
                .dependencies
                .iter()
                .all(|dep| self.slots.get(dep) == Some(&Slot::Completed))
    }

    /// Next task to dispatch, if the policy allows one now
    pub fn next_ready(&self, worker_limit: usize) -> Option<&SubTask> {
        let running = self.running();
        if running >= worker_limit.max(1) {
            return None;
        }

        let exclusive_running = self
            .slots
            .iter()
            .filter(|(_, slot)| **slot == Slot::Running)
            .any(|(id, _)| self.tasks.get(id).map(|t| !t.parallelizable).unwrap_or(false));
        if exclusive_running {
            return None;
        }

        let head = self.tasks.values().find(|task| self.is_ready(task))?;
        if !head.parallelizable && running > 0 {
            return None;
        }

        Some(head)
    }

    pub fn mark_running(&mut self, id: TaskId) {
        if let Some(slot) = self.slots.get_mut(&id) {
            *slot = Slot::Running;
        }
    }

    pub fn complete(&mut self, answer: Answer) {
        if let Some(slot) = self.slots.get_mut(&answer.task_id) {
            *slot = Slot::Completed;
        }
        self.answers.insert(answer.task_id, answer);
    }

    /// Completed answers of a task's declared dependencies, ascending by id
    pub fn dependency_answers(&self, id: TaskId) -> Vec<&Answer> {
        let Some(task) = self.tasks.get(&id) else {
            return Vec::new();
        };

        let mut deps = task.dependencies.clone();
        deps.sort();
        deps.iter().filter_map(|dep| self.answers.get(dep)).collect()
    }

    /// Close every task that never started with `status`
    pub fn close_pending(&mut self, status: AnswerStatus) -> Vec<TaskId> {
        self.close(Slot::Pending, status)
    }

    /// Close every task still marked running with `status`
    ///
    /// Only meaningful once all workers have been joined; a task left
    /// running then is one whose worker was lost.
    pub fn close_running(&mut self, status: AnswerStatus) -> Vec<TaskId> {
        self.close(Slot::Running, status)
    }

    fn close(&mut self, slot: Slot, status: AnswerStatus) -> Vec<TaskId> {
        let open: Vec<TaskId> = self
            .slots
            .iter()
            .filter(|(_, s)| **s == slot)
            .map(|(id, _)| *id)
            .collect();

        for id in &open {
            if let Some(task) = self.tasks.get(id) {
                let answer = Answer {
                    task_id: *id,
                    description: task.description.clone(),
                    text: crate::types::INSUFFICIENT_EVIDENCE.to_string(),
                    sources: Vec::new(),
                    rounds_used: 0,
                    assessment: None,
                    status: status.clone(),
                };
                self.complete(answer);
            }
        }

        open
    }

    /// Answers in dependency order
    pub fn answers_in_order(&self) -> Vec<&Answer> {
        self.order.iter().filter_map(|id| self.answers.get(id)).collect()
    }

    pub fn into_answers(mut self) -> Vec<Answer> {
        self.order
            .iter()
            .filter_map(|id| self.answers.remove(id))
            .collect()
    }
}
