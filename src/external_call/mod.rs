//! Run test bodies under a cassette named after the test
//!
//! ```no_run
//! use vcrwrap::{test_target, ExternalCall, Request, Response, Settings};
//!
//! struct SearchTests;
//!
//! fn test_search() -> anyhow::Result<()> {
//!     let call = ExternalCall::new(Settings::global())?;
//!     call.run(&test_target!(SearchTests, test_search), |session| {
//!         let request = Request::new("GET", "https://api.example.com/search?q=%7B%7D")?;
//!         let response = session.exchange(&request, |_| {
//!             Ok::<_, std::io::Error>(Response::new(200, "[]"))
//!         })?;
//!         assert_eq!(response.status, 200);
//!         Ok(())
//!     })
//! }
//! ```

mod session;

pub use session::Session;

use std::any::Any;
use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;

use anyhow::Context as _;
use futures_util::FutureExt as _;
use tracing::{debug, error, info_span, Instrument as _};

use crate::config::{Settings, VcrConfig, VcrOptions};
use crate::interaction::Request;
use crate::matching::{json_query_matcher, Matcher, JSON_QUERY};
use crate::naming::{CassetteName, TestTarget};
use crate::recorder::Vcr;
use crate::Result;

/// Wraps test bodies so their HTTP exchanges go through a cassette
///
/// Built once per test (or shared between tests with the same options);
/// every [`run`](ExternalCall::run) builds a fresh [`Vcr`] and opens the
/// cassette derived from the test's [`TestTarget`].
#[derive(Debug, Clone)]
pub struct ExternalCall {
    config: VcrConfig,
    live: bool,
    use_namespaces: bool,
    custom_matchers: Vec<Matcher>,
}

impl ExternalCall {
    /// Default options
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidRecordMode`](crate::VcrError::InvalidRecordMode)
    /// if the configured record mode is invalid
    pub fn new(settings: &Settings) -> Result<Self> {
        Self::with_options(settings, VcrOptions::default())
    }

    /// Explicit per-test options merged over the defaults
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::InvalidRecordMode`](crate::VcrError::InvalidRecordMode)
    /// if the global or overriding record mode is invalid, or a
    /// configuration error for an empty matcher name
    pub fn with_options(settings: &Settings, options: VcrOptions) -> Result<Self> {
        let config = VcrConfig::resolve(settings, &options)?;

        debug!(
            "External call configured: record mode {}, matching on {}",
            config.record_mode,
            config.match_on.join(" / ")
        );

        Ok(Self {
            config,
            live: settings.make_external_requests,
            use_namespaces: options.use_namespaces,
            custom_matchers: Vec::new(),
        })
    }

    /// Register an extra matcher, available by name in `match_on`
    #[must_use]
    pub fn register_matcher<F>(mut self, name: &str, predicate: F) -> Self
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        self.custom_matchers.push(Matcher::new(name, predicate));
        self
    }

    /// Resolved configuration
    #[must_use]
    pub fn config(&self) -> &VcrConfig {
        &self.config
    }

    /// Matcher order applied to the top-level cassette
    #[must_use]
    pub fn match_on(&self) -> &[String] {
        &self.config.match_on
    }

    /// Whether bodies run without a cassette
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.live
    }

    fn build_vcr(&self) -> Vcr {
        let mut vcr = Vcr::new(self.config.clone());
        vcr.register_matcher(JSON_QUERY, json_query_matcher);
        for matcher in &self.custom_matchers {
            vcr.add_matcher(matcher.clone());
        }
        vcr
    }

    fn failure_context(&self, name: &CassetteName) -> String {
        format!(
            "inside cassette '{name}', matching on {}",
            self.config.match_on.join(" / ")
        )
    }

    /// Run `body` with the cassette for `target`
    ///
    /// An error returned by `body` gains the cassette name and matcher order
    /// as context; the original error stays reachable through
    /// [`anyhow::Error::downcast_ref`]. A panic is logged with the same
    /// context and resumed unchanged. The cassette is saved on every path.
    ///
    /// # Errors
    ///
    /// Returns error if the cassette cannot be opened or saved, or `body`
    /// fails
    pub fn run<T, F>(&self, target: &TestTarget, body: F) -> anyhow::Result<T>
    where
        F: FnOnce(&Session) -> anyhow::Result<T>,
    {
        let name = target.cassette_name();
        let span = info_span!("external_call", cassette = %name, external_api = true);
        let _entered = span.enter();

        let vcr = Arc::new(self.build_vcr());

        if self.live {
            debug!("Making external requests for '{}' without a cassette", name);
            return body(&Session::live(vcr, name, self.use_namespaces));
        }

        let guard = vcr
            .use_cassette(&name, Some(self.config.match_on.as_slice()))
            .with_context(|| format!("failed to open cassette '{name}'"))?;
        let session = Session::recording(
            Arc::clone(&vcr),
            name.clone(),
            guard.handle().clone(),
            self.use_namespaces,
        );

        match panic::catch_unwind(AssertUnwindSafe(|| body(&session))) {
            Ok(Ok(value)) => {
                guard.eject()?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e.context(self.failure_context(&name))),
            Err(payload) => {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "test body panicked {}",
                    self.failure_context(&name)
                );
                drop(guard);
                panic::resume_unwind(payload)
            }
        }
    }

    /// Async form of [`run`](ExternalCall::run)
    ///
    /// # Errors
    ///
    /// Same as [`run`](ExternalCall::run)
    pub async fn run_async<T, F, Fut>(&self, target: &TestTarget, body: F) -> anyhow::Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let name = target.cassette_name();
        let span = info_span!("external_call", cassette = %name, external_api = true);
        self.run_async_inner(name, body).instrument(span).await
    }

    async fn run_async_inner<T, F, Fut>(&self, name: CassetteName, body: F) -> anyhow::Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let vcr = Arc::new(self.build_vcr());

        if self.live {
            debug!("Making external requests for '{}' without a cassette", name);
            return body(Session::live(vcr, name, self.use_namespaces)).await;
        }

        let guard = vcr
            .use_cassette(&name, Some(self.config.match_on.as_slice()))
            .with_context(|| format!("failed to open cassette '{name}'"))?;
        let session = Session::recording(
            Arc::clone(&vcr),
            name.clone(),
            guard.handle().clone(),
            self.use_namespaces,
        );

        let outcome = AssertUnwindSafe(async move { body(session).await })
            .catch_unwind()
            .await;

        match outcome {
            Ok(Ok(value)) => {
                guard.eject()?;
                Ok(value)
            }
            Ok(Err(e)) => Err(e.context(self.failure_context(&name))),
            Err(payload) => {
                error!(
                    panic = %panic_message(payload.as_ref()),
                    "test body panicked {}",
                    self.failure_context(&name)
                );
                drop(guard);
                panic::resume_unwind(payload)
            }
        }
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> &str {
    if let Some(s) = payload.downcast_ref::<&'static str>() {
        s
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s
    } else {
        "non-string panic payload"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::RecordMode;
    use crate::interaction::Response;
    use crate::VcrError;
    use std::convert::Infallible;
    use std::path::Path;
    use tempfile::TempDir;

    struct ClientTests;

    fn settings(dir: &Path, record_mode: &str, live: bool) -> Settings {
        Settings {
            cassette_dir: Some(dir.to_path_buf()),
            record_mode: record_mode.to_string(),
            make_external_requests: live,
        }
    }

    fn search() -> Request {
        Request::new("GET", "https://api.example.com/search?q=%7B%22a%22%3A1%2C%22b%22%3A2%7D")
            .unwrap()
    }

    fn live_ok(_: &Request) -> std::result::Result<Response, Infallible> {
        Ok(Response::new(200, "live"))
    }

    #[test]
    fn test_invalid_mode_fails_before_body() {
        let temp_dir = TempDir::new().unwrap();
        let err = ExternalCall::new(&settings(temp_dir.path(), "sometimes", false)).unwrap_err();
        assert!(matches!(err, VcrError::InvalidRecordMode(_)));

        let err = ExternalCall::with_options(
            &settings(temp_dir.path(), "none", false),
            VcrOptions::new().record_mode("bogus"),
        )
        .unwrap_err();
        assert!(matches!(err, VcrError::InvalidRecordMode(_)));
    }

    #[test]
    fn test_default_match_on() {
        let temp_dir = TempDir::new().unwrap();
        let call = ExternalCall::new(&settings(temp_dir.path(), "none", false)).unwrap();
        assert_eq!(
            call.match_on(),
            ["method", "scheme", "host", "port", "path", "json_query"]
        );
        assert!(!call.is_live());
    }

    #[test]
    fn test_body_error_keeps_source_and_adds_context() {
        let temp_dir = TempDir::new().unwrap();
        let call = ExternalCall::new(&settings(temp_dir.path(), "none", false)).unwrap();

        let err = call
            .run(&crate::test_target!(ClientTests, test_miss), |session| {
                session.exchange(&search(), live_ok)?;
                Ok(())
            })
            .unwrap_err();

        let message = format!("{err:#}");
        assert!(message.contains("ClientTests.test_miss.yaml"), "{message}");
        assert!(
            message.contains("method / scheme / host / port / path / json_query"),
            "{message}"
        );
        assert!(matches!(
            err.downcast_ref::<VcrError>(),
            Some(VcrError::UnmatchedRequest { .. })
        ));
    }

    #[test]
    fn test_panic_is_resumed_and_cassette_saved() {
        let temp_dir = TempDir::new().unwrap();
        let call = ExternalCall::new(&settings(temp_dir.path(), "once", false)).unwrap();
        let target = crate::test_target!(ClientTests, test_panics);

        let result = panic::catch_unwind(AssertUnwindSafe(|| {
            call.run(&target, |session| -> anyhow::Result<()> {
                session.exchange(&search(), live_ok)?;
                panic!("assertion failed in body");
            })
        }));

        let payload = result.unwrap_err();
        assert_eq!(panic_message(payload.as_ref()), "assertion failed in body");
        assert!(temp_dir
            .path()
            .join(target.cassette_name().as_str())
            .exists());
    }

    #[test]
    fn test_namespaces_disabled_by_default() {
        let temp_dir = TempDir::new().unwrap();
        let call = ExternalCall::new(&settings(temp_dir.path(), "once", false)).unwrap();

        let err = call
            .run(&crate::test_target!(ClientTests, test_no_ns), |session| {
                session.namespace("setup", None, |_| Ok(()))
            })
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VcrError>(),
            Some(VcrError::NamespacesDisabled(_))
        ));
    }

    #[test]
    fn test_custom_matcher_available() {
        let temp_dir = TempDir::new().unwrap();
        let call = ExternalCall::with_options(
            &settings(temp_dir.path(), "once", false),
            VcrOptions::new().match_on(["method", "anything"]),
        )
        .unwrap()
        .register_matcher("anything", |_, _| true);

        call.run(&crate::test_target!(ClientTests, test_custom), |session| {
            session.exchange(&search(), live_ok)?;
            Ok(())
        })
        .unwrap();
    }

    #[test]
    fn test_unknown_matcher_reported_on_run() {
        let temp_dir = TempDir::new().unwrap();
        let call = ExternalCall::with_options(
            &settings(temp_dir.path(), "once", false),
            VcrOptions::new().match_on(["nope"]),
        )
        .unwrap();

        let err = call
            .run(&crate::test_target!(ClientTests, test_unknown), |_| Ok(()))
            .unwrap_err();
        assert!(matches!(
            err.downcast_ref::<VcrError>(),
            Some(VcrError::UnknownMatcher(_))
        ));
    }

    #[test]
    fn test_empty_match_on_replays_in_order() {
        let temp_dir = TempDir::new().unwrap();
        let target = crate::test_target!(ClientTests, test_match_anything);
        let options = || VcrOptions::new().match_on(Vec::<String>::new());

        let call =
            ExternalCall::with_options(&settings(temp_dir.path(), "once", false), options())
                .unwrap();
        assert!(call.match_on().is_empty());
        call.run(&target, |session| {
            session.exchange(&search(), |_| Ok::<_, Infallible>(Response::new(200, "first")))?;
            session.exchange(&search(), |_| Ok::<_, Infallible>(Response::new(201, "second")))?;
            Ok(())
        })
        .unwrap();

        let call =
            ExternalCall::with_options(&settings(temp_dir.path(), "none", false), options())
                .unwrap();
        let bodies = call
            .run(&target, |session| {
                let unrelated = Request::new("DELETE", "http://other.example.com/x")?;
                let first = session.exchange(&unrelated, live_ok)?;
                let second = session.exchange(&search(), live_ok)?;
                Ok((first.body, second.body))
            })
            .unwrap();
        assert_eq!(bodies, ("first".to_string(), "second".to_string()));
    }

    #[test]
    fn test_config_reflects_options() {
        let temp_dir = TempDir::new().unwrap();
        let call = ExternalCall::with_options(
            &settings(temp_dir.path(), "none", false),
            VcrOptions::new().record_mode("all"),
        )
        .unwrap();
        assert_eq!(call.config().record_mode, RecordMode::All);
    }
}
