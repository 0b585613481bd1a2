//! Rift Mock - a programmable HTTP(S) mock server for integration tests.
//!
//! Tests declare expected requests with [matchers](matcher) and attach canned
//! or computed responses. Every inbound request is recorded, dispatched to the
//! single matching declaration and can be verified afterwards.
//!
//! ```no_run
//! use rift_mock::matcher::{is_get, path_ends_with};
//! use rift_mock::{MockServer, TimeUnit};
//!
//! # async fn demo() -> Result<(), Box<dyn std::error::Error>> {
//! let server = MockServer::builder().start().await?;
//!
//! server
//!     .when_get(path_ends_with("sample"))
//!     .then_return_string("a")
//!     .then_return_string("b")
//!     .delay_body(TimeUnit::Milliseconds, [500, 0]);
//!
//! // ... exercise the client against server.url() ...
//!
//! server.verify_request(is_get()).at_least(1)?;
//! # Ok(())
//! # }
//! ```

pub mod call;
pub mod config;
pub mod dispatcher;
pub mod history;
pub mod loader;
pub mod logger;
pub mod matcher;
pub mod request;
pub mod response;
pub mod server;
pub mod verifier;

pub use call::{MatchableCall, TimeUnit};
pub use config::MocksConfig;
pub use dispatcher::Dispatcher;
pub use history::{HistoryError, RequestHistory};
pub use loader::{FileLoader, FsFileLoader, LoadError, StaticFileLoader};
pub use logger::{MockLogger, NoopLogger, TracingLogger};
pub use matcher::{Matcher, RequestMatcher};
pub use request::{QueryParam, RecordedRequest};
pub use response::{
    Answer, MockAnswer, MockResponse, MORE_THAN_ONE_RESPONSE_ERROR, RESPONSE_NOT_MOCKED,
};
pub use server::{MockServer, MockServerBuilder, ServerError, ServerOptions, TlsConfig};
pub use verifier::{RequestVerification, VerificationError};
