//! Cassette recorder: matcher registration and scoped cassette use

use tracing::{debug, error};

use crate::cassette::{Cassette, CassetteHandle};
use crate::config::VcrConfig;
use crate::interaction::Request;
use crate::matching::{Matcher, MatcherRegistry};
use crate::naming::CassetteName;
use crate::Result;

/// Recorder configured once and used to open cassettes
#[derive(Debug, Clone)]
pub struct Vcr {
    config: VcrConfig,
    matchers: MatcherRegistry,
}

impl Vcr {
    /// Create a recorder with the built-in matchers
    #[must_use]
    pub fn new(config: VcrConfig) -> Self {
        Self {
            config,
            matchers: MatcherRegistry::new(),
        }
    }

    /// Recorder configuration
    #[must_use]
    pub fn config(&self) -> &VcrConfig {
        &self.config
    }

    /// Registered matchers
    #[must_use]
    pub fn matchers(&self) -> &MatcherRegistry {
        &self.matchers
    }

    /// Register a named matcher
    pub fn register_matcher<F>(&mut self, name: &str, predicate: F)
    where
        F: Fn(&Request, &Request) -> bool + Send + Sync + 'static,
    {
        debug!("Registering matcher '{}'", name);
        self.matchers.register(name, predicate);
    }

    /// Register an already named matcher
    pub fn add_matcher(&mut self, matcher: Matcher) {
        debug!("Registering matcher '{}'", matcher.name());
        self.matchers.insert(matcher);
    }

    /// Open a cassette for the lifetime of the returned guard
    ///
    /// `match_on` overrides the configured matcher order for this cassette.
    ///
    /// # Errors
    ///
    /// Returns error if a matcher is unknown, the name is invalid, or an
    /// existing cassette file cannot be read
    pub fn use_cassette(
        &self,
        name: &CassetteName,
        match_on: Option<&[String]>,
    ) -> Result<CassetteGuard> {
        let names = match_on.unwrap_or(self.config.match_on.as_slice());
        let matchers = self.matchers.resolve(names)?;
        let cassette = Cassette::load(name.clone(), &self.config, matchers)?;

        Ok(CassetteGuard {
            handle: Some(CassetteHandle::new(cassette)),
        })
    }
}

/// Active cassette scope
///
/// Pending recordings are saved when the guard is ejected or dropped, including
/// during unwinding. Errors on drop can only be logged; call [`eject`] to
/// observe them.
///
/// [`eject`]: CassetteGuard::eject
#[derive(Debug)]
pub struct CassetteGuard {
    handle: Option<CassetteHandle>,
}

impl CassetteGuard {
    /// Handle to the active cassette
    ///
    /// # Panics
    ///
    /// Never: the handle is only taken by `eject`, which consumes the guard
    #[must_use]
    pub fn handle(&self) -> &CassetteHandle {
        match &self.handle {
            Some(handle) => handle,
            None => unreachable!("cassette guard used after eject"),
        }
    }

    /// Close the scope, saving pending recordings
    ///
    /// # Errors
    ///
    /// Returns error if the cassette cannot be saved
    pub fn eject(mut self) -> Result<()> {
        match self.handle.take() {
            Some(handle) => handle.save(),
            None => Ok(()),
        }
    }
}

impl Drop for CassetteGuard {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            if let Err(e) = handle.save() {
                error!("Failed to save cassette '{}': {}", handle.name(), e);
            }
        }
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

    fn vcr(dir: &Path, record_mode: RecordMode) -> Vcr {
        Vcr::new(VcrConfig {
            cassette_library_dir: dir.to_path_buf(),
            record_mode,
            match_on: vec!["method".to_string(), "path".to_string()],
            ..VcrConfig::default()
        })
    }

    fn record_one(guard: &CassetteGuard, uri: &str) {
        guard
            .handle()
            .exchange(&Request::new("GET", uri).unwrap(), |_| {
                Ok::<_, Infallible>(Response::new(200, "ok"))
            })
            .unwrap();
    }

    #[test]
    fn test_eject_saves() {
        let temp_dir = TempDir::new().unwrap();
        let vcr = vcr(temp_dir.path(), RecordMode::Once);
        let name = CassetteName::from_raw("m.T.eject.yaml");

        let guard = vcr.use_cassette(&name, None).unwrap();
        record_one(&guard, "http://h/a");
        guard.eject().unwrap();

        assert!(temp_dir.path().join("m.T.eject.yaml").exists());
    }

    #[test]
    fn test_drop_saves() {
        let temp_dir = TempDir::new().unwrap();
        let vcr = vcr(temp_dir.path(), RecordMode::Once);
        let name = CassetteName::from_raw("m.T.drop.yaml");

        {
            let guard = vcr.use_cassette(&name, None).unwrap();
            record_one(&guard, "http://h/a");
        }

        assert!(temp_dir.path().join("m.T.drop.yaml").exists());
    }

    #[test]
    fn test_unwinding_saves() {
        let temp_dir = TempDir::new().unwrap();
        let vcr = vcr(temp_dir.path(), RecordMode::Once);
        let name = CassetteName::from_raw("m.T.panic.yaml");

        let result = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| {
            let guard = vcr.use_cassette(&name, None).unwrap();
            record_one(&guard, "http://h/a");
            panic!("test body failed");
        }));

        assert!(result.is_err());
        assert!(temp_dir.path().join("m.T.panic.yaml").exists());
    }

    #[test]
    fn test_nothing_written_without_recordings() {
        let temp_dir = TempDir::new().unwrap();
        let vcr = vcr(temp_dir.path(), RecordMode::Once);
        let name = CassetteName::from_raw("m.T.empty.yaml");

        vcr.use_cassette(&name, None).unwrap().eject().unwrap();
        assert!(!temp_dir.path().join("m.T.empty.yaml").exists());
    }

    #[test]
    fn test_match_on_override() {
        let temp_dir = TempDir::new().unwrap();
        let vcr = vcr(temp_dir.path(), RecordMode::Once);
        let name = CassetteName::from_raw("m.T.override.yaml");

        let guard = vcr
            .use_cassette(&name, Some(["host".to_string()].as_slice()))
            .unwrap();
        assert_eq!(guard.handle().lock().match_on(), vec!["host"]);
    }

    #[test]
    fn test_unknown_matcher() {
        let temp_dir = TempDir::new().unwrap();
        let vcr = vcr(temp_dir.path(), RecordMode::Once);
        let name = CassetteName::from_raw("m.T.unknown.yaml");

        let err = vcr
            .use_cassette(&name, Some(["json_query".to_string()].as_slice()))
            .unwrap_err();
        assert!(matches!(err, VcrError::UnknownMatcher(_)));
    }

    #[test]
    fn test_register_matcher() {
        let temp_dir = TempDir::new().unwrap();
        let mut vcr = vcr(temp_dir.path(), RecordMode::Once);
        vcr.register_matcher("json_query", crate::matching::json_query_matcher);
        let name = CassetteName::from_raw("m.T.registered.yaml");

        assert!(vcr
            .use_cassette(&name, Some(["json_query".to_string()].as_slice()))
            .is_ok());
    }
}
