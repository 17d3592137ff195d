//! ResearchHandler - research_needed stage の仕事
//!
//! objective を読んで調査レポートを生成し、`report` キーに書きます。

use super::executor::StageHandler;
use crate::domain::{Payload, REPORT_KEY, Stage};

pub struct ResearchHandler {
    agent: String,
    model: String,
}

impl ResearchHandler {
    pub fn new(agent: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            agent: agent.into(),
            model: model.into(),
        }
    }
}

pub fn research_prompt(objective: &str) -> String {
    format!(
        "You are Marcus, a senior researcher.\n\
         Objective: {objective}\n\
         \n\
         Research it and write a brief strategic report with:\n\
         1. Market context.\n\
         2. Three key points.\n\
         3. A strategic recommendation.\n\
         \n\
         Answer in JSON format."
    )
}

impl StageHandler for ResearchHandler {
    fn stage(&self) -> Stage {
        Stage::ResearchNeeded
    }

    fn agent(&self) -> &str {
        &self.agent
    }

    fn model(&self) -> &str {
        &self.model
    }

    fn result_key(&self) -> &str {
        REPORT_KEY
    }

    fn prompt(&self, payload: &Payload) -> Option<String> {
        payload.objective().map(research_prompt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn prompt_mentions_objective() {
        let handler = ResearchHandler::new("marcus", "m");
        let prompt = handler
            .prompt(&Payload::for_objective("market entry Peru", json!(null)))
            .unwrap();

        assert!(prompt.contains("Objective: market entry Peru"));
        assert!(prompt.contains("JSON"));
    }

    #[test]
    fn no_objective_no_prompt() {
        let handler = ResearchHandler::new("marcus", "m");
        assert!(handler.prompt(&Payload::new()).is_none());
    }
}
