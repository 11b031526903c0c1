//! Per-run reasoning trace and step budget.

use serde::{Deserialize, Serialize};

/// One model step and what came back.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Step {
    /// The model's raw text for this step.
    pub log: String,
    pub observation: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Scratchpad {
    pub steps: Vec<Step>,
    pub iterations: usize,
    pub max_iterations: usize,
}

impl Scratchpad {
    pub fn new(max_iterations: usize) -> Self {
        Self {
            steps: Vec::new(),
            iterations: 0,
            max_iterations,
        }
    }

    /// Take one step from the budget. `false` once the budget is spent.
    pub fn tick(&mut self) -> bool {
        if self.iterations >= self.max_iterations {
            return false;
        }
        self.iterations += 1;
        true
    }

    pub fn record(&mut self, log: impl Into<String>, observation: impl Into<String>) {
        self.steps.push(Step {
            log: log.into(),
            observation: observation.into(),
        });
    }

    pub fn last_observation(&self) -> Option<&str> {
        self.steps.last().map(|s| s.observation.as_str())
    }

    /// The text that follows `Thought:` in the next prompt.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            out.push_str(step.log.trim_end());
            out.push_str("\nObservation: ");
            out.push_str(&step.observation);
            out.push_str("\nThought: ");
        }
        out
    }
}
