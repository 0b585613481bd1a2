//! Request dispatcher.
//!
//! Owns the registry of matchable calls and the request history behind one
//! lock. Each dispatch records the request, selects the candidate calls and
//! advances the chosen call's cursor atomically. Dynamic answers are evaluated
//! after the lock is released.
//!
//! Match policy:
//! - no call matches: 500 `NOT MOCKED` (no body for HEAD)
//! - exactly one call matches: its next answer
//! - several calls match: 500 listing every matching declaration

use crate::call::{MatchableCall, ResolvedAnswer};
use crate::history::RequestHistory;
use crate::logger::MockLogger;
use crate::matcher::Matcher;
use crate::request::RecordedRequest;
use crate::response::{MockResponse, MORE_THAN_ONE_RESPONSE_ERROR};
use parking_lot::Mutex;
use std::sync::Arc;

#[derive(Default)]
struct DispatcherState {
    calls: Vec<MatchableCall>,
    history: RequestHistory,
}

enum Selection {
    NotMocked,
    Matched(Option<ResolvedAnswer>, String),
    Ambiguous(Vec<String>),
}

pub struct Dispatcher {
    state: Mutex<DispatcherState>,
    logger: Arc<dyn MockLogger>,
}

impl Dispatcher {
    pub fn new(logger: Arc<dyn MockLogger>) -> Self {
        Self {
            state: Mutex::new(DispatcherState::default()),
            logger,
        }
    }

    pub fn logger(&self) -> &Arc<dyn MockLogger> {
        &self.logger
    }

    /// Record `request` and produce its response.
    pub fn dispatch(&self, request: RecordedRequest) -> MockResponse {
        let request_line = request.request_line();
        self.logger.log(&format!("-> Request     : {}", request_line));

        let (request, selection) = {
            let mut state = self.state.lock();
            let request = request.with_sequence_number(state.history.len());
            state.history.push(request.clone());

            let matched: Vec<&MatchableCall> = state
                .calls
                .iter()
                .filter(|call| call.matcher().matches(&request))
                .collect();

            let selection = match matched.as_slice() {
                [] => Selection::NotMocked,
                [call] => Selection::Matched(call.advance(), call.matcher().describe()),
                many => Selection::Ambiguous(many.iter().map(|c| c.matcher().describe()).collect()),
            };
            (request, selection)
        };

        match selection {
            Selection::NotMocked => {
                self.logger
                    .error(&format!("<- Response ERROR, NOT MOCKED: {}", request_line), None);
                MockResponse::not_mocked(request.method())
            }
            Selection::Ambiguous(descriptions) => {
                let message = format!(
                    "{}\n{}",
                    MORE_THAN_ONE_RESPONSE_ERROR,
                    descriptions.join("\n")
                );
                self.logger.error(
                    &format!("<- Response ERROR for {}: {}", request_line, message),
                    None,
                );
                MockResponse::from_error(&anyhow::anyhow!(message))
            }
            Selection::Matched(Some(resolved), description) => {
                let response = resolved.resolve(&request);
                self.logger.log(&format!(
                    "<- Response    : {} for {} (matched: {})",
                    response.status(),
                    request_line,
                    description
                ));
                response
            }
            Selection::Matched(None, description) => {
                // Registered calls always carry an answer, this is a broken invariant
                let error = anyhow::anyhow!("declaration has no answers: {}", description);
                self.logger.error(
                    &format!("<- Response ERROR for {}", request_line),
                    Some(&*error),
                );
                MockResponse::from_error(&error)
            }
        }
    }

    /// Register `call`. Returns `false` if it has no answers or is already
    /// registered.
    pub fn add_matchable_call(&self, call: &MatchableCall) -> bool {
        if call.number_of_answers() == 0 {
            self.logger.log(&format!(
                "## Not adding response without answers for: {}",
                call.matcher()
            ));
            return false;
        }
        let mut state = self.state.lock();
        if state.calls.iter().any(|c| c.ptr_eq(call)) {
            return false;
        }
        call.reset_cursor();
        state.calls.push(call.clone());
        drop(state);
        self.logger
            .log(&format!("## Adding new response for: {}", call.matcher()));
        true
    }

    /// Unregister `call`. Returns `false` if it was not registered.
    pub fn remove_matchable_call(&self, call: &MatchableCall) -> bool {
        let removed = {
            let mut state = self.state.lock();
            let before = state.calls.len();
            state.calls.retain(|c| !c.ptr_eq(call));
            state.calls.len() != before
        };
        if removed {
            self.logger
                .log(&format!("## Removing response for: {}", call.matcher()));
        }
        removed
    }

    /// Swap `old` for `new`. `new` is registered even if `old` was not.
    pub fn replace_matchable_call(&self, old: &MatchableCall, new: &MatchableCall) -> bool {
        self.remove_matchable_call(old);
        self.add_matchable_call(new)
    }

    pub fn remove_all_matchable_calls(&self) {
        self.state.lock().calls.clear();
        self.logger.log("## Removing all responses");
    }

    pub fn is_registered(&self, call: &MatchableCall) -> bool {
        self.state.lock().calls.iter().any(|c| c.ptr_eq(call))
    }

    /// Snapshot of the registry in registration order.
    pub fn matchable_calls(&self) -> Vec<MatchableCall> {
        self.state.lock().calls.clone()
    }

    pub fn clear_history(&self) {
        self.state.lock().history.clear();
    }

    /// Drop every declaration and all recorded requests.
    pub fn reset(&self) {
        let mut state = self.state.lock();
        state.calls.clear();
        state.history.clear();
        drop(state);
        self.logger.log("## Reset: removed all responses and request history");
    }

    /// Run `f` against the history while holding the dispatcher lock.
    pub fn with_history<R>(&self, f: impl FnOnce(&RequestHistory) -> R) -> R {
        f(&self.state.lock().history)
    }

    pub fn count(&self, matcher: &Matcher) -> usize {
        self.with_history(|history| history.count(matcher))
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.lock();
        f.debug_struct("Dispatcher")
            .field("calls", &state.calls.len())
            .field("history", &state.history.len())
            .finish()
    }
}
