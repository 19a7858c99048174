//! Test and helper mocks for aqua_core

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use aqua_traits::{BoxError, EventStream, Response, ServerEvent, Transport};

/// One step of a scripted push stream.
#[derive(Debug, Clone)]
pub enum StreamStep {
    Event(ServerEvent),
    Fail(String),
    End,
}

impl StreamStep {
    /// A push carrying `data` under the default status event name.
    pub fn status(data: impl Into<String>) -> Self {
        Self::Event(ServerEvent {
            event: "status".into(),
            data: data.into(),
            id: None,
        })
    }

    pub fn named(event: &str, data: impl Into<String>) -> Self {
        Self::Event(ServerEvent {
            event: event.into(),
            data: data.into(),
            id: None,
        })
    }
}

struct Scripted {
    steps: VecDeque<StreamStep>,
}

impl EventStream for Scripted {
    fn next_event(&mut self) -> Result<Option<ServerEvent>, BoxError> {
        match self.steps.pop_front() {
            Some(StreamStep::Event(ev)) => Ok(Some(ev)),
            Some(StreamStep::Fail(msg)) => Err(Box::new(std::io::Error::other(msg))),
            Some(StreamStep::End) => Ok(None),
            // Script exhausted: stay connected and quiet.
            None => {
                std::thread::sleep(Duration::from_millis(10));
                Ok(Some(ServerEvent {
                    event: "keepalive".into(),
                    data: String::new(),
                    id: None,
                }))
            }
        }
    }
}

/// A transport that replays canned replies and records what was sent.
///
/// - GETs pop per-path queues; an empty queue is a transport error.
/// - POSTs pop a shared queue, defaulting to `{"ok":true}`.
/// - Each subscribe pops one stream script; none left is a refusal.
#[derive(Default)]
pub struct ScriptedTransport {
    gets: Mutex<HashMap<String, VecDeque<Result<Response, String>>>>,
    posts: Mutex<VecDeque<Result<Response, String>>>,
    streams: Mutex<VecDeque<Vec<StreamStep>>>,
    sent: Mutex<Vec<(String, Option<String>)>>,
    forms: Mutex<Vec<(String, Vec<(String, String)>)>>,
    subscribes: AtomicUsize,
}

fn lock<T>(m: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    m.lock().unwrap_or_else(PoisonError::into_inner)
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn on_get(self, path: &str, status: u16, body: &str) -> Self {
        lock(&self.gets)
            .entry(path.to_string())
            .or_default()
            .push_back(Ok(Response::new(status, body)));
        self
    }

    #[must_use]
    pub fn on_get_error(self, path: &str, msg: &str) -> Self {
        lock(&self.gets)
            .entry(path.to_string())
            .or_default()
            .push_back(Err(msg.to_string()));
        self
    }

    #[must_use]
    pub fn on_post(self, status: u16, body: &str) -> Self {
        lock(&self.posts).push_back(Ok(Response::new(status, body)));
        self
    }

    #[must_use]
    pub fn on_post_error(self, msg: &str) -> Self {
        lock(&self.posts).push_back(Err(msg.to_string()));
        self
    }

    #[must_use]
    pub fn with_stream(self, steps: Vec<StreamStep>) -> Self {
        lock(&self.streams).push_back(steps);
        self
    }

    /// Paths and bodies of every JSON post, in order.
    pub fn sent(&self) -> Vec<(String, Option<String>)> {
        lock(&self.sent).clone()
    }

    pub fn forms(&self) -> Vec<(String, Vec<(String, String)>)> {
        lock(&self.forms).clone()
    }

    pub fn subscribe_count(&self) -> usize {
        self.subscribes.load(Ordering::Relaxed)
    }

    fn next_post(&self) -> Result<Response, BoxError> {
        match lock(&self.posts).pop_front() {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(msg)) => Err(Box::new(std::io::Error::other(msg))),
            None => Ok(Response::new(200, r#"{"ok":true}"#)),
        }
    }
}

impl Transport for ScriptedTransport {
    fn get(&self, path: &str) -> Result<Response, BoxError> {
        let next = lock(&self.gets).get_mut(path).and_then(VecDeque::pop_front);
        match next {
            Some(Ok(resp)) => Ok(resp),
            Some(Err(msg)) => Err(Box::new(std::io::Error::other(msg))),
            None => Err(Box::new(std::io::Error::other(format!(
                "connection refused: {path}"
            )))),
        }
    }

    fn post_json(&self, path: &str, body: Option<&str>) -> Result<Response, BoxError> {
        lock(&self.sent).push((path.to_string(), body.map(str::to_string)));
        self.next_post()
    }

    fn post_form(&self, path: &str, fields: &[(&str, &str)]) -> Result<Response, BoxError> {
        lock(&self.forms).push((
            path.to_string(),
            fields
                .iter()
                .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
                .collect(),
        ));
        self.next_post()
    }

    fn subscribe(&self, path: &str) -> Result<Box<dyn EventStream + Send>, BoxError> {
        self.subscribes.fetch_add(1, Ordering::Relaxed);
        match lock(&self.streams).pop_front() {
            Some(steps) => Ok(Box::new(Scripted {
                steps: steps.into(),
            })),
            None => Err(Box::new(std::io::Error::other(format!(
                "subscription refused: {path}"
            )))),
        }
    }
}
