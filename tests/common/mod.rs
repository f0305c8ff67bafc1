//! Shared test harness: a transport that replays scripted responses and
//! records every request it saw.
#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use bytes::Bytes;
use hyper::{HeaderMap, StatusCode, header};

use dav_sync_rs::error::{DavError, Result};
use dav_sync_rs::{HttpRequest, HttpResponse, HttpTransport};

#[derive(Default)]
pub struct MockTransport {
    responses: Mutex<VecDeque<HttpResponse>>,
    requests: Mutex<Vec<HttpRequest>>,
}

impl MockTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn push(&self, response: HttpResponse) {
        self.responses.lock().expect("lock poisoned").push_back(response);
    }

    pub fn push_status(&self, status: u16, body: &str) {
        self.push(response(status, body));
    }

    pub fn push_multistatus(&self, body: &str) {
        self.push(response(207, body));
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().expect("lock poisoned").clone()
    }
}

pub fn response(status: u16, body: &str) -> HttpResponse {
    HttpResponse {
        url: String::new(),
        status: StatusCode::from_u16(status).expect("valid status"),
        headers: HeaderMap::new(),
        body: Bytes::from(body.to_owned()),
    }
}

pub fn redirect(status: u16, location: &str) -> HttpResponse {
    let mut resp = response(status, "");
    resp.headers.insert(
        header::LOCATION,
        header::HeaderValue::from_str(location).expect("valid location"),
    );
    resp
}

#[async_trait]
impl HttpTransport for MockTransport {
    async fn execute(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut response = self
            .responses
            .lock()
            .expect("lock poisoned")
            .pop_front()
            .ok_or_else(|| {
                DavError::Transport(format!(
                    "no scripted response for {} {}",
                    request.method, request.url
                ))
            })?;
        if response.url.is_empty() {
            response.url = request.url.clone();
        }
        self.requests.lock().expect("lock poisoned").push(request);
        Ok(response)
    }
}
