//! In-memory fakes shared by the tool tests.

use async_trait::async_trait;
use cloudpilot_core::{CloudApi, CloudError, CloudRequest, Identity, RetrievalError, Retriever};
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

/// Answers control-plane calls from canned responses keyed by
/// `(service, operation)` and records every request it sees.
pub struct FakeCloud {
    responses: HashMap<(String, String), Result<Value, CloudError>>,
    calls: Mutex<Vec<CloudRequest>>,
}

impl FakeCloud {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(mut self, service: &str, operation: &str, body: Value) -> Self {
        self.responses
            .insert((service.into(), operation.into()), Ok(body));
        self
    }

    pub fn fail(mut self, service: &str, operation: &str, err: CloudError) -> Self {
        self.responses
            .insert((service.into(), operation.into()), Err(err));
        self
    }

    pub fn calls(&self) -> Vec<CloudRequest> {
        self.calls.lock().unwrap().clone()
    }

    pub fn operations(&self) -> Vec<String> {
        self.calls().into_iter().map(|c| c.operation).collect()
    }
}

#[async_trait]
impl CloudApi for FakeCloud {
    async fn call(&self, _identity: &Identity, request: CloudRequest) -> Result<Value, CloudError> {
        let key = (request.service.clone(), request.operation.clone());
        self.calls.lock().unwrap().push(request);
        match self.responses.get(&key) {
            Some(response) => response.clone(),
            None => Err(CloudError::Unsupported {
                service: key.0,
                operation: key.1,
            }),
        }
    }
}

pub struct EmptyRetriever;

#[async_trait]
impl Retriever for EmptyRetriever {
    fn name(&self) -> &str {
        "empty"
    }

    async fn search(&self, _query: &str, _k: usize) -> Result<Vec<String>, RetrievalError> {
        Ok(Vec::new())
    }
}

pub fn identity(service: &str) -> Identity {
    Identity::ambient(service, "eu-west-2", None)
}

pub fn access_denied(service: &str) -> CloudError {
    CloudError::AccessDenied {
        service: service.into(),
        message: "User is not authorized".into(),
    }
}
