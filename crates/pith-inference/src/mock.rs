//! Mock chat backend for deterministic testing.
//!
//! Scripted by substring rules: the first rule whose needle appears in the
//! prompt answers the call. Rules can fail a set number of times before
//! answering, which is how tests exercise per-item error isolation and
//! retry-after-failure flows. All calls are logged for assertions.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use pith_core::{ChatBackend, Error, Result};

/// One logged call.
#[derive(Debug, Clone)]
pub struct MockCall {
    pub model: String,
    pub system: String,
    pub prompt: String,
}

struct Rule {
    needle: String,
    response: String,
    fail_remaining: usize,
}

struct MockState {
    rules: Vec<Rule>,
    default_response: String,
    default_fail_remaining: usize,
    calls: Vec<MockCall>,
}

/// Mock chat backend.
#[derive(Clone)]
pub struct MockChatBackend {
    state: Arc<Mutex<MockState>>,
}

impl Default for MockChatBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl MockChatBackend {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState {
                rules: Vec::new(),
                default_response: "{}".to_string(),
                default_fail_remaining: 0,
                calls: Vec::new(),
            })),
        }
    }

    /// Set the response used when no rule matches.
    pub fn with_default_response(self, response: impl Into<String>) -> Self {
        self.state.lock().unwrap().default_response = response.into();
        self
    }

    /// Answer prompts containing `needle` with `response`.
    pub fn with_rule(self, needle: impl Into<String>, response: impl Into<String>) -> Self {
        self.state.lock().unwrap().rules.push(Rule {
            needle: needle.into(),
            response: response.into(),
            fail_remaining: 0,
        });
        self
    }

    /// Like `with_rule`, but the first `fail_times` matching calls return a
    /// transport error before the rule starts answering.
    pub fn with_failing_rule(
        self,
        needle: impl Into<String>,
        fail_times: usize,
        response: impl Into<String>,
    ) -> Self {
        self.state.lock().unwrap().rules.push(Rule {
            needle: needle.into(),
            response: response.into(),
            fail_remaining: fail_times,
        });
        self
    }

    /// Fail the first `times` unmatched calls too.
    pub fn with_default_failures(self, times: usize) -> Self {
        self.state.lock().unwrap().default_fail_remaining = times;
        self
    }

    /// All logged calls.
    pub fn calls(&self) -> Vec<MockCall> {
        self.state.lock().unwrap().calls.clone()
    }

    /// Number of calls made.
    pub fn call_count(&self) -> usize {
        self.state.lock().unwrap().calls.len()
    }

    /// Calls whose prompt contains `needle`.
    pub fn calls_matching(&self, needle: &str) -> usize {
        self.state
            .lock()
            .unwrap()
            .calls
            .iter()
            .filter(|c| c.prompt.contains(needle))
            .count()
    }
}

#[async_trait]
impl ChatBackend for MockChatBackend {
    async fn chat(&self, model: &str, system: &str, prompt: &str) -> Result<String> {
        let mut state = self.state.lock().unwrap();
        state.calls.push(MockCall {
            model: model.to_string(),
            system: system.to_string(),
            prompt: prompt.to_string(),
        });

        if let Some(rule) = state
            .rules
            .iter_mut()
            .find(|r| prompt.contains(r.needle.as_str()))
        {
            if rule.fail_remaining > 0 {
                rule.fail_remaining -= 1;
                return Err(Error::Transport(format!(
                    "mock failure for rule `{}`",
                    rule.needle
                )));
            }
            return Ok(rule.response.clone());
        }

        if state.default_fail_remaining > 0 {
            state.default_fail_remaining -= 1;
            return Err(Error::Transport("mock default failure".to_string()));
        }
        Ok(state.default_response.clone())
    }
}
