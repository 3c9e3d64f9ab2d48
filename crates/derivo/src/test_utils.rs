//! Shared helpers for the crate's tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::FetchError;
use crate::transport::{DerivativeTransport, FetchedMedia};

#[inline]
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::DEBUG)
        .with_test_writer() // Write to test output
        .try_init();
}

/// Scripted transport that records every request.
///
/// Per-URL scripts are consumed first, then persistent failures apply, and
/// every other request succeeds with the default content type.
pub struct MockTransport {
    content_type: Option<String>,
    scripts: Mutex<HashMap<String, VecDeque<Result<FetchedMedia, FetchError>>>>,
    failures: HashMap<String, FetchError>,
    content_types: HashMap<String, Option<String>>,
    calls: Mutex<Vec<String>>,
}

impl MockTransport {
    /// Every request succeeds with `content_type`.
    pub fn always(content_type: &str) -> Self {
        Self {
            content_type: Some(content_type.to_string()),
            scripts: Mutex::new(HashMap::new()),
            failures: HashMap::new(),
            content_types: HashMap::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// Responses returned, in order, for the first requests of `url`.
    pub fn script(self, url: &str, responses: Vec<Result<FetchedMedia, FetchError>>) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(url.to_string(), responses.into());
        self
    }

    /// Every request of `url` fails with `error`.
    pub fn fail(mut self, url: &str, error: FetchError) -> Self {
        self.failures.insert(url.to_string(), error);
        self
    }

    /// Requests of `url` succeed with a different (or no) content type.
    pub fn content_type_for(mut self, url: &str, content_type: Option<&str>) -> Self {
        self.content_types
            .insert(url.to_string(), content_type.map(str::to_string));
        self
    }

    /// Body served for `url`.
    pub fn body_for(url: &str) -> Bytes {
        Bytes::from(format!("body of {url}"))
    }

    pub fn calls(&self) -> usize {
        self.calls.lock().unwrap().len()
    }

    pub fn calls_for(&self, url: &str) -> usize {
        self.calls.lock().unwrap().iter().filter(|u| *u == url).count()
    }

    pub fn requested_urls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl DerivativeTransport for MockTransport {
    async fn fetch(&self, url: &str) -> Result<FetchedMedia, FetchError> {
        self.calls.lock().unwrap().push(url.to_string());

        let scripted = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(url)
            .and_then(VecDeque::pop_front);
        if let Some(response) = scripted {
            return response;
        }

        if let Some(error) = self.failures.get(url) {
            return Err(error.clone());
        }

        let content_type = match self.content_types.get(url) {
            Some(content_type) => content_type.clone(),
            None => self.content_type.clone(),
        };

        Ok(FetchedMedia {
            bytes: Self::body_for(url),
            content_type,
        })
    }
}
