//! Scripted transport for exercising the gateway and everything built on it
//! without a socket.

use std::collections::VecDeque;
use std::sync::Mutex;

use async_trait::async_trait;

use crate::cancel::CancelToken;
use crate::error::Error;

use super::transport::{ApiRequest, ApiResponse, Transport};

/// Replays queued responses in order and records every request it saw.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<ApiRequest>>,
    responses: Mutex<VecDeque<Result<ApiResponse, Error>>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_json(&self, body: &str) {
        self.push(Ok(ApiResponse {
            headers: reqwest::header::HeaderMap::new(),
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn push_json_with_header(&self, body: &str, name: &'static str, value: &str) {
        let mut headers = reqwest::header::HeaderMap::new();
        headers.insert(name, value.parse().expect("header value"));
        self.push(Ok(ApiResponse {
            headers,
            body: body.as_bytes().to_vec(),
        }));
    }

    pub fn push_error(&self, error: Error) {
        self.push(Err(error));
    }

    fn push(&self, response: Result<ApiResponse, Error>) {
        self.responses.lock().unwrap().push_back(response);
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }

    pub fn request(&self, index: usize) -> ApiRequest {
        self.requests.lock().unwrap()[index].clone()
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn request(&self, req: ApiRequest, _cancel: &CancelToken) -> Result<ApiResponse, Error> {
        self.requests.lock().unwrap().push(req);
        self.responses
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| {
                Err(Error::Http {
                    status: 599,
                    body: "mock transport exhausted".into(),
                })
            })
    }
}
