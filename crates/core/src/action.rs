//! The closed set of dispatchable actions.
//!
//! Every externally observable operation maps to exactly one [`Action`].
//! Anything that cannot be mapped resolves to [`Action::Unknown`], which has
//! no tool and is always rejected by the dispatcher.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Action {
    ListStorage,
    DescribeCompute,
    PipelineStatus,
    ListPipelines,
    EcsStatus,
    ListClusters,
    DescribeCluster,
    GetParameter,
    ListParameters,
    PutParameter,
    SearchDocs,
    Unknown,
}

impl Action {
    /// Every dispatchable action, in catalog order. `Unknown` is excluded.
    pub const DISPATCHABLE: [Action; 11] = [
        Action::ListStorage,
        Action::DescribeCompute,
        Action::PipelineStatus,
        Action::ListPipelines,
        Action::EcsStatus,
        Action::ListClusters,
        Action::DescribeCluster,
        Action::GetParameter,
        Action::ListParameters,
        Action::PutParameter,
        Action::SearchDocs,
    ];

    /// The wire literal (kebab-case).
    pub fn as_str(&self) -> &'static str {
        match self {
            Action::ListStorage => "list-storage",
            Action::DescribeCompute => "describe-compute",
            Action::PipelineStatus => "pipeline-status",
            Action::ListPipelines => "list-pipelines",
            Action::EcsStatus => "ecs-status",
            Action::ListClusters => "list-clusters",
            Action::DescribeCluster => "describe-cluster",
            Action::GetParameter => "get-parameter",
            Action::ListParameters => "list-parameters",
            Action::PutParameter => "put-parameter",
            Action::SearchDocs => "search-docs",
            Action::Unknown => "unknown",
        }
    }

    /// The registry tool that carries out this action.
    pub fn tool_name(&self) -> Option<&'static str> {
        let name = match self {
            Action::ListStorage => "list_s3_buckets",
            Action::DescribeCompute => "describe_ec2_instances",
            Action::PipelineStatus => "get_pipeline_status",
            Action::ListPipelines => "list_pipelines",
            Action::EcsStatus => "get_ecs_service_status",
            Action::ListClusters => "list_eks_clusters",
            Action::DescribeCluster => "describe_eks_cluster",
            Action::GetParameter => "get_ssm_parameter",
            Action::ListParameters => "list_ssm_parameters",
            Action::PutParameter => "put_ssm_parameter",
            Action::SearchDocs => "rag_search",
            Action::Unknown => return None,
        };
        Some(name)
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, Action::Unknown)
    }

    /// Whether this action writes to the control plane.
    pub fn is_mutation(&self) -> bool {
        matches!(self, Action::PutParameter)
    }
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Parses a wire literal. Older command names are accepted as aliases;
/// anything else is an error rather than `Unknown` so callers decide.
impl FromStr for Action {
    type Err = UnrecognizedAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let literal = s.trim().to_ascii_lowercase();
        let action = match literal.as_str() {
            "list-storage" | "list-s3" => Action::ListStorage,
            "describe-compute" | "describe-ec2" => Action::DescribeCompute,
            "pipeline-status" | "codepipeline-status" => Action::PipelineStatus,
            "list-pipelines" => Action::ListPipelines,
            "ecs-status" => Action::EcsStatus,
            "list-clusters" => Action::ListClusters,
            "describe-cluster" => Action::DescribeCluster,
            "get-parameter" => Action::GetParameter,
            "list-parameters" => Action::ListParameters,
            "put-parameter" => Action::PutParameter,
            "search-docs" => Action::SearchDocs,
            "unknown" => Action::Unknown,
            _ => return Err(UnrecognizedAction(s.to_string())),
        };
        Ok(action)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized action literal: {0:?}")]
pub struct UnrecognizedAction(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn literals_parse_back_to_actions() {
        for action in Action::DISPATCHABLE {
            assert_eq!(action.as_str().parse::<Action>().unwrap(), action);
        }
    }

    #[test]
    fn legacy_aliases_are_accepted() {
        assert_eq!("list-s3".parse::<Action>().unwrap(), Action::ListStorage);
        assert_eq!(" Describe-EC2 ".parse::<Action>().unwrap(), Action::DescribeCompute);
        assert_eq!(
            "codepipeline-status".parse::<Action>().unwrap(),
            Action::PipelineStatus
        );
    }

    #[test]
    fn garbage_is_rejected() {
        assert!("delete-everything".parse::<Action>().is_err());
    }

    #[test]
    fn unknown_has_no_tool() {
        assert!(Action::Unknown.tool_name().is_none());
        assert!(Action::DISPATCHABLE.iter().all(|a| a.tool_name().is_some()));
    }

    #[test]
    fn serializes_kebab_case() {
        let json = serde_json::to_string(&Action::PutParameter).unwrap();
        assert_eq!(json, "\"put-parameter\"");
    }
}
