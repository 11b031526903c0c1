//! SigV4-signed HTTP client implementing [`CloudApi`].
//!
//! Supports the operations the tool catalog needs across four wire
//! protocols:
//! - JSON 1.1 RPC: codepipeline, ecs, ssm (any operation)
//! - REST-JSON: eks `ListClusters`, `DescribeCluster`
//! - REST-XML: s3 `ListBuckets`
//! - Query/XML: ec2 `DescribeInstances`, sts `AssumeRole`
//!
//! XML responses are converted to the JSON shape of the equivalent SDK
//! output so callers never see the wire format.

use async_trait::async_trait;
use chrono::Utc;
use cloudpilot_core::{CloudApi, CloudError, CloudRequest, Credentials, Identity, IdentitySource};
use reqwest::{Method, Url};
use serde_json::{Map, Value};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::error::{classify, json_error, xml_error};
use crate::sigv4::{self, SignableRequest};
use crate::{shapes, xml};

const FORM_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=utf-8";
const JSON_CONTENT_TYPE: &str = "application/x-amz-json-1.1";

/// JSON 1.1 target prefixes, by service.
fn json_target_prefix(service: &str) -> Option<&'static str> {
    match service {
        "codepipeline" => Some("CodePipeline_20150709"),
        "ecs" => Some("AmazonEC2ContainerServiceV20141113"),
        "ssm" => Some("AmazonSSM"),
        _ => None,
    }
}

pub struct AwsClient {
    http: reqwest::Client,
    endpoint_url: Option<String>,
    call_timeout: Duration,
}

struct Outgoing<'a> {
    service: &'a str,
    method: Method,
    url: Url,
    content_type: Option<&'static str>,
    target: Option<String>,
    body: Vec<u8>,
}

struct Incoming {
    status: u16,
    error_type: Option<String>,
    body: Vec<u8>,
}

impl Incoming {
    fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

impl AwsClient {
    pub fn new(call_timeout: Duration) -> Self {
        Self {
            http: reqwest::Client::new(),
            endpoint_url: None,
            call_timeout,
        }
    }

    /// Send every request to this endpoint (e.g. LocalStack) instead of
    /// the regional public endpoint.
    pub fn with_endpoint_url(mut self, endpoint_url: impl Into<String>) -> Self {
        let url = endpoint_url.into();
        self.endpoint_url = Some(url.trim_end_matches('/').to_string());
        self
    }

    pub fn from_config(config: &cloudpilot_config::AwsConfig) -> Self {
        let client = Self::new(Duration::from_secs(config.call_timeout_secs));
        match &config.endpoint_url {
            Some(url) => client.with_endpoint_url(url),
            None => client,
        }
    }

    fn endpoint(&self, service: &str, region: &str, path: &str) -> Result<Url, CloudError> {
        let base = match &self.endpoint_url {
            Some(url) => url.clone(),
            None => format!("https://{service}.{region}.amazonaws.com"),
        };
        Url::parse(&format!("{base}{path}")).map_err(|e| CloudError::Transport {
            service: service.to_string(),
            message: format!("invalid endpoint {base}: {e}"),
        })
    }

    fn credentials<'i>(&self, identity: &'i Identity, service: &str) -> Result<&'i Credentials, CloudError> {
        if let IdentitySource::Unscoped { account_id, reason } = &identity.source {
            return Err(CloudError::AccessDenied {
                service: service.to_string(),
                message: format!("no credentials for account {account_id}: {reason}"),
            });
        }
        identity.credentials.as_ref().ok_or_else(|| CloudError::AccessDenied {
            service: service.to_string(),
            message: "no AWS credentials available".into(),
        })
    }

    async fn send(&self, identity: &Identity, out: Outgoing<'_>) -> Result<Incoming, CloudError> {
        let credentials = self.credentials(identity, out.service)?;
        let amz_date = sigv4::amz_date(Utc::now());

        let mut headers = vec![
            ("host".to_string(), host_header(&out.url, out.service)?),
            ("x-amz-date".to_string(), amz_date.clone()),
            (
                "x-amz-content-sha256".to_string(),
                sigv4::sha256_hex(&out.body),
            ),
        ];
        if let Some(content_type) = out.content_type {
            headers.push(("content-type".to_string(), content_type.to_string()));
        }
        if let Some(target) = &out.target {
            headers.push(("x-amz-target".to_string(), target.clone()));
        }
        if let Some(token) = &credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        let authorization = sigv4::authorization(
            &SignableRequest {
                method: out.method.as_str(),
                url: &out.url,
                headers: &headers,
                payload: &out.body,
            },
            credentials,
            &identity.region,
            out.service,
            &amz_date,
        );

        let mut request = self
            .http
            .request(out.method, out.url)
            .timeout(self.call_timeout)
            .header("authorization", authorization);
        // reqwest derives Host from the URL.
        for (name, value) in headers.iter().filter(|(n, _)| n != "host") {
            request = request.header(name.as_str(), value.as_str());
        }

        let response = request
            .body(out.body)
            .send()
            .await
            .map_err(|e| self.transport_error(out.service, e))?;

        let status = response.status().as_u16();
        let error_type = response
            .headers()
            .get("x-amzn-errortype")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let body = response
            .bytes()
            .await
            .map_err(|e| self.transport_error(out.service, e))?
            .to_vec();

        Ok(Incoming {
            status,
            error_type,
            body,
        })
    }

    fn transport_error(&self, service: &str, err: reqwest::Error) -> CloudError {
        if err.is_timeout() {
            CloudError::Timeout {
                service: service.to_string(),
                after_secs: self.call_timeout.as_secs(),
            }
        } else {
            CloudError::Transport {
                service: service.to_string(),
                message: err.to_string(),
            }
        }
    }

    async fn json_rpc(
        &self,
        identity: &Identity,
        service: &str,
        target_prefix: &str,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, CloudError> {
        let body = serde_json::to_vec(params).map_err(|e| CloudError::MalformedResponse {
            service: service.to_string(),
            message: e.to_string(),
        })?;
        let incoming = self
            .send(
                identity,
                Outgoing {
                    service,
                    method: Method::POST,
                    url: self.endpoint(service, &identity.region, "/")?,
                    content_type: Some(JSON_CONTENT_TYPE),
                    target: Some(format!("{target_prefix}.{operation}")),
                    body,
                },
            )
            .await?;
        parse_json(service, incoming)
    }

    async fn eks(
        &self,
        identity: &Identity,
        operation: &str,
        params: &Map<String, Value>,
    ) -> Result<Value, CloudError> {
        let path = match operation {
            "ListClusters" => "/clusters".to_string(),
            "DescribeCluster" => {
                let name = params.get("name").and_then(Value::as_str).ok_or_else(|| {
                    CloudError::Service {
                        service: "eks".into(),
                        code: "ValidationException".into(),
                        message: "DescribeCluster requires 'name'".into(),
                    }
                })?;
                format!("/clusters/{}", sigv4::uri_encode(name, true))
            }
            other => {
                return Err(CloudError::Unsupported {
                    service: "eks".into(),
                    operation: other.to_string(),
                });
            }
        };

        let incoming = self
            .send(
                identity,
                Outgoing {
                    service: "eks",
                    method: Method::GET,
                    url: self.endpoint("eks", &identity.region, &path)?,
                    content_type: None,
                    target: None,
                    body: Vec::new(),
                },
            )
            .await?;
        parse_json("eks", incoming)
    }

    async fn list_buckets(&self, identity: &Identity) -> Result<Value, CloudError> {
        let incoming = self
            .send(
                identity,
                Outgoing {
                    service: "s3",
                    method: Method::GET,
                    url: self.endpoint("s3", &identity.region, "/")?,
                    content_type: None,
                    target: None,
                    body: Vec::new(),
                },
            )
            .await?;
        let root = parse_xml("s3", incoming)?;
        Ok(shapes::list_buckets(&root))
    }

    /// Issue a Query-protocol call (form-encoded POST, XML response).
    pub(crate) async fn query(
        &self,
        identity: &Identity,
        service: &str,
        version: &str,
        action: &str,
        params: &Map<String, Value>,
    ) -> Result<xml::Element, CloudError> {
        let mut pairs = vec![
            ("Action".to_string(), action.to_string()),
            ("Version".to_string(), version.to_string()),
        ];
        pairs.extend(flatten_params(params));

        let incoming = self
            .send(
                identity,
                Outgoing {
                    service,
                    method: Method::POST,
                    url: self.endpoint(service, &identity.region, "/")?,
                    content_type: Some(FORM_CONTENT_TYPE),
                    target: None,
                    body: sigv4::encode_form(&pairs).into_bytes(),
                },
            )
            .await?;
        parse_xml(service, incoming)
    }
}

#[async_trait]
impl CloudApi for AwsClient {
    async fn call(&self, identity: &Identity, request: CloudRequest) -> Result<Value, CloudError> {
        let started = Instant::now();
        let service = request.service.as_str();
        let operation = request.operation.as_str();

        let result = match (service, operation, json_target_prefix(service)) {
            (_, op, Some(prefix)) => {
                self.json_rpc(identity, service, prefix, op, &request.params)
                    .await
            }
            ("eks", op, None) => self.eks(identity, op, &request.params).await,
            ("s3", "ListBuckets", None) => self.list_buckets(identity).await,
            ("ec2", "DescribeInstances", None) => self
                .query(identity, "ec2", "2016-11-15", operation, &request.params)
                .await
                .map(|root| shapes::describe_instances(&root)),
            ("sts", "AssumeRole", None) => self
                .query(identity, "sts", "2011-06-15", operation, &request.params)
                .await
                .map(|root| shapes::assume_role(&root)),
            _ => Err(CloudError::Unsupported {
                service: service.to_string(),
                operation: operation.to_string(),
            }),
        };

        debug!(
            service,
            operation,
            region = %identity.region,
            ok = result.is_ok(),
            elapsed_ms = started.elapsed().as_millis() as u64,
            "Cloud call"
        );
        result
    }
}

fn host_header(url: &Url, service: &str) -> Result<String, CloudError> {
    let host = url.host_str().ok_or_else(|| CloudError::Transport {
        service: service.to_string(),
        message: format!("endpoint has no host: {url}"),
    })?;
    Ok(match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    })
}

/// Scalar top-level parameters as Query-protocol pairs, sorted by key.
fn flatten_params(params: &Map<String, Value>) -> Vec<(String, String)> {
    let mut pairs: Vec<(String, String)> = params
        .iter()
        .filter_map(|(key, value)| {
            let rendered = match value {
                Value::String(s) => s.clone(),
                Value::Number(n) => n.to_string(),
                Value::Bool(b) => b.to_string(),
                _ => return None,
            };
            Some((key.clone(), rendered))
        })
        .collect();
    pairs.sort();
    pairs
}

fn parse_json(service: &str, incoming: Incoming) -> Result<Value, CloudError> {
    if !incoming.is_success() {
        let (code, message) = json_error(&incoming.body, incoming.error_type.as_deref());
        return Err(classify(service, incoming.status, &code, &message));
    }
    if incoming.body.is_empty() {
        return Ok(Value::Object(Map::new()));
    }
    serde_json::from_slice(&incoming.body).map_err(|e| CloudError::MalformedResponse {
        service: service.to_string(),
        message: e.to_string(),
    })
}

fn parse_xml(service: &str, incoming: Incoming) -> Result<xml::Element, CloudError> {
    if !incoming.is_success() {
        let (code, message) = xml_error(&incoming.body);
        return Err(classify(service, incoming.status, &code, &message));
    }
    let text = String::from_utf8_lossy(&incoming.body);
    xml::parse(&text).map_err(|e| CloudError::MalformedResponse {
        service: service.to_string(),
        message: e.to_string(),
    })
}
