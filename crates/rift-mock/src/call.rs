//! Matchable calls: declared expectations.
//!
//! A [`MatchableCall`] binds a matcher to an ordered sequence of answers plus
//! independent body/header delay sequences. Attaching the first answer
//! registers the call with its dispatcher.
//!
//! Sequencing uses a single cursor that advances once per consumed dispatch.
//! Answers and delays are picked with the sticky-last policy: once the cursor
//! runs past the end of a list, the final entry repeats.

use crate::dispatcher::Dispatcher;
use crate::loader::FileLoader;
use crate::matcher::Matcher;
use crate::request::RecordedRequest;
use crate::response::{Answer, MockAnswer, MockResponse};
use parking_lot::Mutex;
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;
use tracing::warn;

/// Unit for `delay_body` / `delay_headers` values.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeUnit {
    Nanoseconds,
    Microseconds,
    Milliseconds,
    Seconds,
    Minutes,
}

impl TimeUnit {
    pub fn to_duration(self, value: u64) -> Duration {
        match self {
            TimeUnit::Nanoseconds => Duration::from_nanos(value),
            TimeUnit::Microseconds => Duration::from_micros(value),
            TimeUnit::Milliseconds => Duration::from_millis(value),
            TimeUnit::Seconds => Duration::from_secs(value),
            TimeUnit::Minutes => Duration::from_secs(value.saturating_mul(60)),
        }
    }
}

#[derive(Default)]
struct CallState {
    answers: Vec<Answer>,
    body_delays: Vec<Duration>,
    header_delays: Vec<Duration>,
    cursor: usize,
}

impl CallState {
    fn resolve_at(&self, cursor: usize) -> Option<ResolvedAnswer> {
        Some(ResolvedAnswer {
            answer: sticky(&self.answers, cursor)?,
            body_delay: sticky(&self.body_delays, cursor),
            header_delay: sticky(&self.header_delays, cursor),
        })
    }
}

/// Entry at `cursor`, or the last entry once the cursor has run past the end.
fn sticky<T: Clone>(items: &[T], cursor: usize) -> Option<T> {
    items.get(cursor.min(items.len().saturating_sub(1))).cloned()
}

/// The answer and delays selected for one dispatch, not yet evaluated.
#[derive(Debug, Clone)]
pub(crate) struct ResolvedAnswer {
    answer: Answer,
    body_delay: Option<Duration>,
    header_delay: Option<Duration>,
}

impl ResolvedAnswer {
    /// Evaluate the answer and overlay the declared delays. Without declared
    /// delays the response keeps its own.
    pub(crate) fn resolve(self, request: &RecordedRequest) -> MockResponse {
        let mut response = self.answer.answer(request);
        if let Some(delay) = self.body_delay {
            response = response.with_body_delay(delay);
        }
        if let Some(delay) = self.header_delay {
            response = response.with_header_delay(delay);
        }
        response
    }
}

struct CallInner {
    matcher: Matcher,
    loader: Arc<dyn FileLoader>,
    dispatcher: Weak<Dispatcher>,
    state: Mutex<CallState>,
}

/// A declared expectation: matcher plus answer sequence.
///
/// Cloning yields another handle to the same declaration. Equality is identity.
#[derive(Clone)]
pub struct MatchableCall {
    inner: Arc<CallInner>,
}

impl MatchableCall {
    pub fn new(
        matcher: impl Into<Matcher>,
        loader: Arc<dyn FileLoader>,
        dispatcher: &Arc<Dispatcher>,
    ) -> Self {
        Self {
            inner: Arc::new(CallInner {
                matcher: matcher.into(),
                loader,
                dispatcher: Arc::downgrade(dispatcher),
                state: Mutex::new(CallState::default()),
            }),
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.inner.matcher
    }

    /// Respond with `body` and status 200.
    pub fn then_return_string(self, body: impl Into<String>) -> Self {
        self.then_return_strings(200, [body])
    }

    /// Respond with each body in turn, all with status `code`.
    pub fn then_return_strings<I, S>(self, code: u16, bodies: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let answers = bodies
            .into_iter()
            .map(|body| Answer::Fixed(MockResponse::text(code, body)))
            .collect();
        self.append_answers(answers)
    }

    /// Respond with status `code` and no body.
    pub fn then_return_empty(self, code: u16) -> Self {
        self.then_return(MockResponse::new(code))
    }

    /// Respond with `value` serialized as JSON. A serialization failure is
    /// served as a 500 error response.
    pub fn then_return_json<T: serde::Serialize + ?Sized>(self, code: u16, value: &T) -> Self {
        let response = MockResponse::json(code, value).unwrap_or_else(|e| {
            let error = anyhow::Error::new(e).context("failed to serialize mock JSON body");
            self.report_setup_error(&error);
            MockResponse::from_error(&error)
        });
        self.then_return(response)
    }

    /// Respond with the contents of `path` and status 200.
    pub fn then_return_file(self, path: &str) -> Self {
        self.then_return_files(200, [path])
    }

    /// Respond with the contents of each file in turn, all with status `code`.
    ///
    /// Files are read immediately through the file loader. A file that cannot
    /// be read becomes a 500 answer describing the failure.
    pub fn then_return_files<'a, I>(self, code: u16, paths: I) -> Self
    where
        I: IntoIterator<Item = &'a str>,
    {
        let answers = paths
            .into_iter()
            .map(|path| {
                let response = match self.inner.loader.read_file(path) {
                    Ok(contents) => MockResponse::new(code).with_body(contents),
                    Err(e) => {
                        let error = anyhow::Error::new(e);
                        self.report_setup_error(&error);
                        MockResponse::from_error(&error)
                    }
                };
                Answer::Fixed(response)
            })
            .collect();
        self.append_answers(answers)
    }

    pub fn then_return(self, response: MockResponse) -> Self {
        self.append_answers(vec![Answer::Fixed(response)])
    }

    pub fn then_return_all(self, responses: impl IntoIterator<Item = MockResponse>) -> Self {
        self.append_answers(responses.into_iter().map(Answer::Fixed).collect())
    }

    /// Respond with whatever `answer` computes for each request.
    pub fn then_answer(self, answer: impl MockAnswer + 'static) -> Self {
        self.append_answers(vec![Answer::dynamic(answer)])
    }

    pub fn then_answer_all(self, answers: impl IntoIterator<Item = Answer>) -> Self {
        self.append_answers(answers.into_iter().collect())
    }

    /// Append body delays. The n-th dispatch uses the n-th delay, later
    /// dispatches repeat the last one.
    pub fn delay_body(self, unit: TimeUnit, delays: impl IntoIterator<Item = u64>) -> Self {
        let delays = delays.into_iter().map(|d| unit.to_duration(d));
        self.inner.state.lock().body_delays.extend(delays);
        self
    }

    /// Append header delays, sequenced like [`delay_body`](Self::delay_body).
    pub fn delay_headers(self, unit: TimeUnit, delays: impl IntoIterator<Item = u64>) -> Self {
        let delays = delays.into_iter().map(|d| unit.to_duration(d));
        self.inner.state.lock().header_delays.extend(delays);
        self
    }

    /// Remove this call from its dispatcher. No-op if it is not registered.
    pub fn dont_set(self) -> Self {
        if let Some(dispatcher) = self.inner.dispatcher.upgrade() {
            dispatcher.remove_matchable_call(&self);
        }
        self
    }

    pub fn number_of_answers(&self) -> usize {
        self.inner.state.lock().answers.len()
    }

    /// How many dispatches have consumed this call so far.
    pub fn times_consumed(&self) -> usize {
        self.inner.state.lock().cursor
    }

    pub fn is_registered(&self) -> bool {
        self.inner
            .dispatcher
            .upgrade()
            .is_some_and(|dispatcher| dispatcher.is_registered(self))
    }

    /// The response the next dispatch would produce, without consuming it.
    pub fn peek_response(&self, request: &RecordedRequest) -> Option<MockResponse> {
        let resolved = {
            let state = self.inner.state.lock();
            state.resolve_at(state.cursor)?
        };
        Some(resolved.resolve(request))
    }

    /// Consume the next answer and evaluate it against `request`.
    ///
    /// Returns `None` when no answer was ever attached.
    pub fn next_response(&self, request: &RecordedRequest) -> Option<MockResponse> {
        let resolved = self.advance()?;
        Some(resolved.resolve(request))
    }

    /// Select the answer for the current cursor and advance it. Callers that
    /// need a consistent cursor across requests hold the dispatcher lock.
    pub(crate) fn advance(&self) -> Option<ResolvedAnswer> {
        let mut state = self.inner.state.lock();
        let resolved = state.resolve_at(state.cursor)?;
        state.cursor += 1;
        Some(resolved)
    }

    pub(crate) fn reset_cursor(&self) {
        self.inner.state.lock().cursor = 0;
    }

    pub(crate) fn ptr_eq(&self, other: &MatchableCall) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }

    fn append_answers(self, answers: Vec<Answer>) -> Self {
        if answers.is_empty() {
            return self;
        }
        // Release the call lock before touching the dispatcher
        self.inner.state.lock().answers.extend(answers);
        match self.inner.dispatcher.upgrade() {
            Some(dispatcher) => {
                dispatcher.add_matchable_call(&self);
            }
            None => warn!(
                "Dispatcher dropped, '{}' was not registered",
                self.inner.matcher
            ),
        }
        self
    }

    fn report_setup_error(&self, error: &anyhow::Error) {
        let message = format!("## Error while setting up response for: {}", self.matcher());
        match self.inner.dispatcher.upgrade() {
            Some(dispatcher) => dispatcher
                .logger()
                .error(&message, Some(&**error)),
            None => warn!("{}: {}", message, error),
        }
    }
}

impl PartialEq for MatchableCall {
    fn eq(&self, other: &Self) -> bool {
        self.ptr_eq(other)
    }
}

impl Eq for MatchableCall {}

impl fmt::Debug for MatchableCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let state = self.inner.state.lock();
        f.debug_struct("MatchableCall")
            .field("matcher", &self.inner.matcher.describe())
            .field("answers", &state.answers.len())
            .field("cursor", &state.cursor)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::loader::StaticFileLoader;
    use crate::logger::NoopLogger;
    use crate::matcher::path_ends_with;
    use proptest::prelude::*;

    fn dispatcher() -> Arc<Dispatcher> {
        Arc::new(Dispatcher::new(Arc::new(NoopLogger)))
    }

    fn call(dispatcher: &Arc<Dispatcher>) -> MatchableCall {
        let loader = Arc::new(StaticFileLoader::new().with_file("users.json", "[]"));
        MatchableCall::new(path_ends_with("sample"), loader, dispatcher)
    }

    fn get() -> RecordedRequest {
        RecordedRequest::new("GET", "/sample")
    }

    #[test]
    fn test_no_answers_means_nothing_to_serve() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher);
        assert_eq!(call.number_of_answers(), 0);
        assert!(call.peek_response(&get()).is_none());
        assert!(call.next_response(&get()).is_none());
        assert_eq!(call.times_consumed(), 0);
        assert!(!call.is_registered());
    }

    #[test]
    fn test_first_answer_registers_once() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher).then_return_string("a").then_return_string("b");
        assert!(call.is_registered());
        assert_eq!(dispatcher.matchable_calls().len(), 1);
        assert_eq!(call.number_of_answers(), 2);
    }

    #[test]
    fn test_empty_answer_list_is_not_registered() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher).then_return_all(Vec::new());
        assert!(!call.is_registered());
        assert!(dispatcher.matchable_calls().is_empty());
    }

    #[test]
    fn test_sticky_last_answer() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher).then_return_strings(200, ["a", "b", "c"]);
        let bodies: Vec<String> = (0..5)
            .map(|_| call.next_response(&get()).unwrap().body_string())
            .collect();
        assert_eq!(bodies, ["a", "b", "c", "c", "c"]);
        assert_eq!(call.times_consumed(), 5);
    }

    #[test]
    fn test_peek_does_not_consume() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher).then_return_strings(200, ["a", "b"]);
        assert_eq!(call.peek_response(&get()).unwrap().body_string(), "a");
        assert_eq!(call.peek_response(&get()).unwrap().body_string(), "a");
        assert_eq!(call.times_consumed(), 0);
        assert_eq!(call.next_response(&get()).unwrap().body_string(), "a");
        assert_eq!(call.peek_response(&get()).unwrap().body_string(), "b");
    }

    #[test]
    fn test_delays_are_sequenced_independently() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher)
            .then_return_strings(200, ["a", "b", "c"])
            .delay_body(TimeUnit::Milliseconds, [500, 0])
            .delay_headers(TimeUnit::Seconds, [1]);

        let first = call.next_response(&get()).unwrap();
        assert_eq!(first.body_delay(), Duration::from_millis(500));
        assert_eq!(first.header_delay(), Duration::from_secs(1));

        let second = call.next_response(&get()).unwrap();
        assert_eq!(second.body_delay(), Duration::ZERO);
        assert_eq!(second.header_delay(), Duration::from_secs(1));

        let third = call.next_response(&get()).unwrap();
        assert_eq!(third.body_delay(), Duration::ZERO);
    }

    #[test]
    fn test_response_keeps_own_delay_without_declared_delays() {
        let dispatcher = dispatcher();
        let own = MockResponse::text(200, "x").with_body_delay(Duration::from_millis(20));
        let call = call(&dispatcher).then_return(own);
        assert_eq!(
            call.next_response(&get()).unwrap().body_delay(),
            Duration::from_millis(20)
        );
    }

    #[test]
    fn test_file_answers() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher).then_return_files(201, ["users.json", "missing.json"]);

        let found = call.next_response(&get()).unwrap();
        assert_eq!(found.status(), 201);
        assert_eq!(found.body_string(), "[]");

        let missing = call.next_response(&get()).unwrap();
        assert_eq!(missing.status(), 500);
        assert!(missing.body_string().contains("missing.json"));
        assert!(missing.header("Exception").is_some());
    }

    #[test]
    fn test_dont_set_is_idempotent() {
        let dispatcher = dispatcher();
        let call = call(&dispatcher).then_return_string("a");
        let call = call.dont_set().dont_set();
        assert!(!call.is_registered());
        assert!(dispatcher.matchable_calls().is_empty());
    }

    #[test]
    fn test_identity_equality() {
        let dispatcher = dispatcher();
        let a = call(&dispatcher);
        let b = call(&dispatcher);
        assert_eq!(a, a.clone());
        assert_ne!(a, b);
    }

    #[test]
    fn test_time_unit_conversion() {
        assert_eq!(TimeUnit::Minutes.to_duration(2), Duration::from_secs(120));
        assert_eq!(TimeUnit::Microseconds.to_duration(5), Duration::from_micros(5));
    }

    proptest! {
        #[test]
        fn prop_dispatch_past_the_end_repeats_last(
            bodies in proptest::collection::vec("[a-z]{1,8}", 1..6),
            extra in 0usize..10,
        ) {
            let dispatcher = dispatcher();
            let call = call(&dispatcher).then_return_strings(200, bodies.clone());
            for expected in &bodies {
                prop_assert_eq!(&call.next_response(&get()).unwrap().body_string(), expected);
            }
            let last = bodies.last().unwrap();
            for _ in 0..=extra {
                prop_assert_eq!(&call.next_response(&get()).unwrap().body_string(), last);
            }
            prop_assert_eq!(call.times_consumed(), bodies.len() + extra + 1);
        }
    }
}
