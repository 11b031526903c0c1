//! The ReAct prompt.

use cloudpilot_core::ToolDefinition;
use cloudpilot_memory::Turn;

const PREAMBLE: &str = "You are a helpful DevOps assistant for an engineering team.
You help developers check deployment status, pipeline status, environment variables,
and answer questions about the AWS infrastructure.";

const RULES: &str = "Rules:
- Always use a tool to get live data rather than guessing
- For questions about internal docs, runbooks, or service ownership, use rag_search
- For pipeline status questions, use get_pipeline_status (if you know the name) or list_pipelines first
- For ECS questions, use get_ecs_service_status
- For EKS questions, use list_eks_clusters then describe_eks_cluster
- For environment variables, use get_ssm_parameter or list_ssm_parameters
- NEVER apply production changes without showing the approval message
- If you don't know a pipeline/service name, ask the user or list available ones
- Always give a clear, human-friendly response, not raw JSON";

fn catalog(tools: &[ToolDefinition]) -> String {
    tools
        .iter()
        .map(|t| format!("{}: {} Input: {}", t.name, t.description, t.input.format_hint()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn conversation(history: &[Turn]) -> String {
    if history.is_empty() {
        return String::new();
    }
    let mut out = String::from("Previous conversation:\n");
    for turn in history {
        out.push_str(&format!("Human: {}\nAI: {}\n", turn.input, turn.output));
    }
    out.push('\n');
    out
}

pub fn render(tools: &[ToolDefinition], history: &[Turn], question: &str, scratchpad: &str) -> String {
    let names = tools.iter().map(|t| t.name.as_str()).collect::<Vec<_>>().join(", ");
    format!(
        "{PREAMBLE}\n\n\
         You have access to the following tools:\n{catalog}\n\n\
         {RULES}\n\n\
         Use this format strictly:\n\n\
         Question: the input question you must answer\n\
         Thought: think about what to do\n\
         Action: the action to take, must be one of [{names}]\n\
         Action Input: the input to the action\n\
         Observation: the result of the action\n\
         ... (repeat Thought/Action/Action Input/Observation as needed)\n\n\
         CRITICAL: When you are ready to respond to the user, you MUST use this exact format:\n\
         Thought: I now know the final answer\n\
         Final Answer: the final answer to the original question\n\n\
         {history}\
         Begin!\n\n\
         Question: {question}\n\
         Thought: {scratchpad}",
        catalog = catalog(tools),
        history = conversation(history),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use cloudpilot_core::ToolInput;

    fn tools() -> Vec<ToolDefinition> {
        vec![
            ToolDefinition {
                name: "list_pipelines".into(),
                description: "List all pipelines.".into(),
                service: "codepipeline".into(),
                input: ToolInput::text(""),
            },
            ToolDefinition {
                name: "put_ssm_parameter".into(),
                description: "Write a parameter.".into(),
                service: "ssm".into(),
                input: ToolInput::delimited(&["name", "value", "environment"], '|', "/dev/x|1|dev"),
            },
        ]
    }

    #[test]
    fn lists_tools_and_question() {
        let prompt = render(&tools(), &[], "what pipelines exist?", "");
        assert!(prompt.starts_with("You are a helpful DevOps assistant"));
        assert!(prompt.contains("list_pipelines: List all pipelines. Input: text"));
        assert!(prompt.contains("put_ssm_parameter: Write a parameter. Input: 'name|value|environment'"));
        assert!(prompt.contains("must be one of [list_pipelines, put_ssm_parameter]"));
        assert!(!prompt.contains("Previous conversation"));
        assert!(prompt.ends_with("Question: what pipelines exist?\nThought: "));
    }

    #[test]
    fn includes_history_and_scratchpad() {
        let history = vec![Turn {
            input: "list pipelines".into(),
            output: "payments, search".into(),
            at: Utc::now(),
        }];
        let prompt = render(&tools(), &history, "and payments?", "Action: x\nObservation: y\nThought: ");
        assert!(prompt.contains("Previous conversation:\nHuman: list pipelines\nAI: payments, search\n\nBegin!"));
        assert!(prompt.ends_with("Thought: Action: x\nObservation: y\nThought: "));
    }
}
