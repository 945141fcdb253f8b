//! Scripted in-memory [`PageDriver`] for unit tests.
//!
//! Each URL maps to a [`FakeDocument`]; the well-known extractor scripts are
//! answered from the document of the page last navigated to.

use crate::browser::{PageDriver, ResourceKind};
use crate::errors::BrowserError;
use crate::scrapers::meta::TITLE_SCRIPT;
use crate::scrapers::visible_text::{
    CONTENT_PRESENT_SCRIPT, DISMISS_DIALOG_SCRIPT, EXPAND_SCRIPT, SCROLL_SCRIPT, SNAPSHOT_SCRIPT,
};
use serde_json::Value;
use std::cell::RefCell;
use std::collections::{HashMap, HashSet, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

/// What a fake URL serves.
#[derive(Debug, Clone, Default)]
pub struct FakeDocument {
    /// Returned by `content()`.
    pub html: String,
    /// Returned for `document.title`.
    pub title: String,
    /// Snapshot payload; also makes the main content container present.
    pub visible: Option<Value>,
    /// A dismissable dialog is shown on load.
    pub has_dialog: bool,
    /// Clicks reported by successive expand rounds, then zero.
    pub expand_clicks: Vec<u64>,
}

#[derive(Default)]
struct State {
    current: Option<String>,
    dialog_open: bool,
    expand_queue: VecDeque<u64>,
    goto_log: Vec<(String, Instant)>,
    goto_outcomes: HashMap<String, VecDeque<Result<(), BrowserError>>>,
    evaluations: HashMap<String, usize>,
    blocked: Vec<ResourceKind>,
}

#[derive(Default)]
pub struct FakePage {
    documents: HashMap<String, FakeDocument>,
    failing: HashSet<String>,
    script_results: HashMap<String, Value>,
    state: RefCell<State>,
}

impl FakePage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_document(mut self, url: &str, document: FakeDocument) -> Self {
        self.documents.insert(url.to_string(), document);
        self
    }

    /// Results for successive `goto(url)` calls; once drained, navigation succeeds.
    pub fn with_goto_outcomes(self, url: &str, outcomes: Vec<Result<(), BrowserError>>) -> Self {
        self.state
            .borrow_mut()
            .goto_outcomes
            .insert(url.to_string(), outcomes.into());
        self
    }

    /// Every navigation to `url` fails with a connection error.
    pub fn with_failing_url(mut self, url: &str) -> Self {
        self.failing.insert(url.to_string());
        self
    }

    /// Fixed result for a script, regardless of the current document.
    pub fn with_script_result(mut self, script: &str, value: Value) -> Self {
        self.script_results.insert(script.to_string(), value);
        self
    }

    /// When each `goto(url)` call happened, in order.
    pub fn goto_times(&self, url: &str) -> Vec<Instant> {
        self.state
            .borrow()
            .goto_log
            .iter()
            .filter(|(u, _)| u == url)
            .map(|(_, at)| *at)
            .collect()
    }

    pub fn evaluations(&self, script: &str) -> usize {
        self.state.borrow().evaluations.get(script).copied().unwrap_or(0)
    }

    pub fn blocked_resources(&self) -> Vec<ResourceKind> {
        self.state.borrow().blocked.clone()
    }

    fn current_document(&self, state: &State) -> Option<&FakeDocument> {
        state.current.as_ref().and_then(|url| self.documents.get(url))
    }
}

impl PageDriver for FakePage {
    async fn goto(&self, url: &str, _timeout: Duration) -> Result<(), BrowserError> {
        let mut state = self.state.borrow_mut();
        state.goto_log.push((url.to_string(), Instant::now()));

        if self.failing.contains(url) {
            return Err(BrowserError::Navigation(format!(
                "net::ERR_NAME_NOT_RESOLVED at {url}"
            )));
        }
        if let Some(Err(e)) = state.goto_outcomes.get_mut(url).and_then(VecDeque::pop_front) {
            return Err(e);
        }

        let document = self.documents.get(url);
        state.current = Some(url.to_string());
        state.dialog_open = document.is_some_and(|d| d.has_dialog);
        state.expand_queue = document
            .map(|d| d.expand_clicks.iter().copied().collect())
            .unwrap_or_default();
        Ok(())
    }

    async fn evaluate(&self, script: &str) -> Result<Value, BrowserError> {
        let mut state = self.state.borrow_mut();
        *state.evaluations.entry(script.to_string()).or_default() += 1;

        if let Some(value) = self.script_results.get(script) {
            return Ok(value.clone());
        }

        let value = match script {
            CONTENT_PRESENT_SCRIPT => Value::Bool(
                self.current_document(&state)
                    .is_some_and(|d| d.visible.is_some()),
            ),
            DISMISS_DIALOG_SCRIPT => Value::Bool(std::mem::take(&mut state.dialog_open)),
            SCROLL_SCRIPT => Value::Null,
            EXPAND_SCRIPT => Value::from(state.expand_queue.pop_front().unwrap_or(0)),
            SNAPSHOT_SCRIPT => self
                .current_document(&state)
                .and_then(|d| d.visible.clone())
                .unwrap_or(Value::Null),
            TITLE_SCRIPT => self
                .current_document(&state)
                .map_or(Value::Null, |d| Value::from(d.title.as_str())),
            _ => Value::Null,
        };
        Ok(value)
    }

    async fn content(&self) -> Result<String, BrowserError> {
        let state = self.state.borrow();
        Ok(self
            .current_document(&state)
            .map(|d| d.html.clone())
            .unwrap_or_default())
    }

    async fn block_resources(&self, kinds: &[ResourceKind]) -> Result<(), BrowserError> {
        self.state.borrow_mut().blocked.extend_from_slice(kinds);
        Ok(())
    }
}
