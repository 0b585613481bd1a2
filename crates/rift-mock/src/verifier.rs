//! Request verification against the recorded history.

use crate::dispatcher::Dispatcher;
use crate::matcher::Matcher;
use std::sync::Arc;
use thiserror::Error;

/// A failed verification. The display form names the matcher, states the
/// expectation and lists every recorded request, marking the matched ones.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum VerificationError {
    #[error("Request = \"{matcher}\":\nWanted, but not invoked{}", invocations(.history))]
    NotInvoked { matcher: String, history: String },

    #[error(
        "Request = \"{matcher}\":\nWanted to be invoked {expected} times, but was {actual}.{}",
        invocations(.history)
    )]
    CountMismatch {
        matcher: String,
        expected: usize,
        actual: usize,
        history: String,
    },

    #[error(
        "Request = \"{matcher}\":\nWanted to be invoked at least {expected} times, but was only {actual}{}",
        invocations(.history)
    )]
    CountNotEnough {
        matcher: String,
        expected: usize,
        actual: usize,
        history: String,
    },

    #[error("number of times should be greater than {minimum}! is: {times}")]
    InvalidArgument { minimum: usize, times: usize },
}

fn invocations(history: &str) -> String {
    format!(
        "\n\nAll invocations: (\"#\" at the beginning means the request was matched)\n{}",
        history
    )
}

/// Count-based assertions for requests accepted by one matcher.
pub struct RequestVerification {
    matcher: Matcher,
    dispatcher: Arc<Dispatcher>,
}

impl RequestVerification {
    pub fn new(matcher: impl Into<Matcher>, dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            matcher: matcher.into(),
            dispatcher,
        }
    }

    pub fn matcher(&self) -> &Matcher {
        &self.matcher
    }

    /// How many recorded requests the matcher accepts.
    pub fn count(&self) -> usize {
        self.dispatcher.count(&self.matcher)
    }

    pub fn never(&self) -> Result<(), VerificationError> {
        self.exactly(0)
    }

    pub fn invoked(&self) -> Result<(), VerificationError> {
        self.exactly(1)
    }

    pub fn exactly(&self, times: usize) -> Result<(), VerificationError> {
        let result = self.dispatcher.with_history(|history| {
            let actual = history.count(&self.matcher);
            if actual == times {
                return Ok(());
            }
            let matcher = self.matcher.describe();
            let history = history.render_invocations(&self.matcher);
            if actual == 0 {
                Err(VerificationError::NotInvoked { matcher, history })
            } else {
                Err(VerificationError::CountMismatch {
                    matcher,
                    expected: times,
                    actual,
                    history,
                })
            }
        });
        self.report(result)
    }

    /// Passes if the matcher accepted at least `times` requests. `times` must
    /// be at least 1.
    pub fn at_least(&self, times: usize) -> Result<(), VerificationError> {
        if times < 1 {
            return self.report(Err(VerificationError::InvalidArgument { minimum: 1, times }));
        }
        let result = self.dispatcher.with_history(|history| {
            let actual = history.count(&self.matcher);
            if actual >= times {
                return Ok(());
            }
            Err(VerificationError::CountNotEnough {
                matcher: self.matcher.describe(),
                expected: times,
                actual,
                history: history.render_invocations(&self.matcher),
            })
        });
        self.report(result)
    }

    fn report(&self, result: Result<(), VerificationError>) -> Result<(), VerificationError> {
        if let Err(e) = &result {
            self.dispatcher
                .logger()
                .error("Verification failed", Some(e));
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logger::{NoopLogger, RecordingLogger};
    use crate::matcher::{is_get, is_post, path_ends_with};
    use crate::request::RecordedRequest;

    fn dispatcher_with(requests: &[(&str, &str)]) -> Arc<Dispatcher> {
        let dispatcher = Arc::new(Dispatcher::new(Arc::new(NoopLogger)));
        for (method, path) in requests {
            dispatcher.dispatch(RecordedRequest::new(*method, *path));
        }
        dispatcher
    }

    fn verify(dispatcher: &Arc<Dispatcher>, matcher: Matcher) -> RequestVerification {
        RequestVerification::new(matcher, dispatcher.clone())
    }

    #[test]
    fn test_exactly_and_invoked() {
        let dispatcher = dispatcher_with(&[("GET", "/sample"), ("GET", "/sample"), ("POST", "/sample")]);
        let get_sample = is_get().and(path_ends_with("sample"));

        assert!(verify(&dispatcher, get_sample.clone()).exactly(2).is_ok());
        assert!(verify(&dispatcher, is_post()).invoked().is_ok());
        assert_eq!(verify(&dispatcher, get_sample).count(), 2);
    }

    #[test]
    fn test_never() {
        let dispatcher = dispatcher_with(&[("GET", "/sample")]);
        assert!(verify(&dispatcher, is_post()).never().is_ok());

        let err = verify(&dispatcher, is_get()).never().unwrap_err();
        assert!(matches!(
            err,
            VerificationError::CountMismatch { expected: 0, actual: 1, .. }
        ));
    }

    #[test]
    fn test_not_invoked_message() {
        let dispatcher = dispatcher_with(&[("GET", "/sample")]);
        let err = verify(&dispatcher, is_post()).invoked().unwrap_err();
        assert!(matches!(err, VerificationError::NotInvoked { .. }));
        assert_eq!(
            err.to_string(),
            "Request = \"HTTP method is: POST\":\nWanted, but not invoked\n\n\
             All invocations: (\"#\" at the beginning means the request was matched)\n\
             [\n\tGET /sample HTTP/1.1\n]"
        );
    }

    #[test]
    fn test_count_mismatch_message() {
        let dispatcher = dispatcher_with(&[("GET", "/sample"), ("GET", "/sample")]);
        let err = verify(&dispatcher, is_get()).exactly(3).unwrap_err();
        let message = err.to_string();
        assert!(message.starts_with(
            "Request = \"HTTP method is: GET\":\nWanted to be invoked 3 times, but was 2."
        ));
        assert!(message.contains("\t# GET /sample HTTP/1.1 \t| #MATCH\n"));
    }

    #[test]
    fn test_at_least() {
        let dispatcher = dispatcher_with(&[("GET", "/a"), ("GET", "/b")]);
        assert!(verify(&dispatcher, is_get()).at_least(1).is_ok());
        assert!(verify(&dispatcher, is_get()).at_least(2).is_ok());

        let err = verify(&dispatcher, is_get()).at_least(3).unwrap_err();
        assert!(matches!(
            err,
            VerificationError::CountNotEnough { expected: 3, actual: 2, .. }
        ));
        assert!(err
            .to_string()
            .contains("Wanted to be invoked at least 3 times, but was only 2"));
    }

    #[test]
    fn test_at_least_zero_is_invalid() {
        let dispatcher = dispatcher_with(&[]);
        assert_eq!(
            verify(&dispatcher, is_get()).at_least(0),
            Err(VerificationError::InvalidArgument { minimum: 1, times: 0 })
        );
    }

    #[test]
    fn test_failures_reach_logger() {
        let logger = Arc::new(RecordingLogger::default());
        let dispatcher = Arc::new(Dispatcher::new(logger.clone()));
        dispatcher.dispatch(RecordedRequest::new("GET", "/sample"));

        assert!(verify(&dispatcher, is_get()).exactly(1).is_ok());
        assert!(!logger.contains("Verification failed"));

        verify(&dispatcher, is_post()).invoked().unwrap_err();
        assert!(logger.contains(
            "ERROR Verification failed: Request = \"HTTP method is: POST\":\nWanted, but not invoked"
        ));
    }
}
