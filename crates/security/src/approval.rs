//! Production write gate.
//!
//! Writes whose parameter name or environment mention a protected marker
//! are refused with an approval request instead of being applied.

/// Decides which configuration writes need a human in the loop.
#[derive(Debug, Clone)]
pub struct ApprovalPolicy {
    markers: Vec<String>,
    escalation: String,
}

impl Default for ApprovalPolicy {
    fn default() -> Self {
        Self::new(["prod"])
    }
}

impl ApprovalPolicy {
    /// Markers are matched case-insensitively as substrings.
    pub fn new<I, S>(markers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            markers: markers
                .into_iter()
                .map(|m| m.into().to_lowercase())
                .filter(|m| !m.is_empty())
                .collect(),
            escalation: "Please raise this in #devops-approvals on Slack.".into(),
        }
    }

    /// Last line of the approval message.
    pub fn with_escalation(mut self, escalation: impl Into<String>) -> Self {
        self.escalation = escalation.into();
        self
    }

    pub fn requires_approval(&self, parameter: &str, environment: &str) -> bool {
        let parameter = parameter.to_lowercase();
        let environment = environment.to_lowercase();
        self.markers
            .iter()
            .any(|m| parameter.contains(m) || environment.contains(m))
    }

    pub fn approval_message(&self, parameter: &str, value: &str, environment: &str) -> String {
        format!(
            "⚠️  APPROVAL REQUIRED\n\
             Parameter: {parameter}\n\
             Requested value: {value}\n\
             Environment: {environment}\n\n\
             Production changes require DevOps team approval.\n\
             {}",
            self.escalation
        )
    }
}
