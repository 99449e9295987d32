//! Repository pull policy
//!
//! Only functions whose ARN matches `{function-arn-prefix}{repo}_*` may
//! pull images from a repository.

use serde::{Deserialize, Serialize};

const POLICY_VERSION: &str = "2008-10-17";
const LAMBDA_SERVICE: &str = "lambda.amazonaws.com";
const SOURCE_ARN_KEY: &str = "aws:sourceArn";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RepositoryPolicy {
    pub version: String,
    pub statement: Vec<PolicyStatement>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PolicyStatement {
    pub sid: String,
    pub effect: String,
    pub principal: Principal,
    pub action: Vec<String>,
    pub condition: Condition,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct Principal {
    pub service: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Condition {
    #[serde(rename = "StringLike")]
    pub string_like: std::collections::BTreeMap<String, String>,
}

impl RepositoryPolicy {
    /// Pull policy for `repository`, scoped to functions named `{repository}_*`
    pub fn for_repository(function_arn_prefix: &str, repository: &str) -> Self {
        let pattern = format!("{}{}_*", function_arn_prefix, repository);
        RepositoryPolicy {
            version: POLICY_VERSION.to_string(),
            statement: vec![PolicyStatement {
                sid: "LambdaECRImageRetrievalPolicy".to_string(),
                effect: "Allow".to_string(),
                principal: Principal {
                    service: LAMBDA_SERVICE.to_string(),
                },
                action: vec![
                    "ecr:BatchGetImage".to_string(),
                    "ecr:GetDownloadUrlForLayer".to_string(),
                ],
                condition: Condition {
                    string_like: [(SOURCE_ARN_KEY.to_string(), pattern)].into_iter().collect(),
                },
            }],
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Whether a function with this ARN may pull images
    pub fn permits(&self, source_arn: &str) -> bool {
        self.statement.iter().any(|statement| {
            statement.effect == "Allow"
                && statement.principal.service == LAMBDA_SERVICE
                && statement
                    .condition
                    .string_like
                    .get(SOURCE_ARN_KEY)
                    .is_some_and(|pattern| string_like(pattern, source_arn))
        })
    }
}

/// `StringLike` matching: `*` matches any run of characters, `?` exactly one
fn string_like(pattern: &str, value: &str) -> bool {
    let pattern: Vec<char> = pattern.chars().collect();
    let value: Vec<char> = value.chars().collect();
    let (mut p, mut v) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while v < value.len() {
        match pattern.get(p) {
            Some('*') => {
                backtrack = Some((p, v));
                p += 1;
            }
            Some(&c) if c == '?' || c == value[v] => {
                p += 1;
                v += 1;
            }
            _ => match backtrack {
                Some((star, matched)) => {
                    p = star + 1;
                    v = matched + 1;
                    backtrack = Some((star, matched + 1));
                }
                None => return false,
            },
        }
    }
    pattern[p..].iter().all(|c| *c == '*')
}
