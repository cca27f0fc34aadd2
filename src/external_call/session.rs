//! Per-invocation view of the active cassette

use std::future::Future;
use std::sync::Arc;

use tracing::debug;

use crate::cassette::CassetteHandle;
use crate::error::BoxError;
use crate::interaction::{Request, Response};
use crate::naming::CassetteName;
use crate::recorder::{CassetteGuard, Vcr};
use crate::{Result, VcrError};

/// Handed to a test body while it runs under [`ExternalCall`](super::ExternalCall)
///
/// HTTP clients route each request through [`Session::exchange`]: with a
/// cassette the request is replayed or recorded, in live mode the supplied
/// closure simply runs.
#[derive(Debug, Clone)]
pub struct Session {
    vcr: Arc<Vcr>,
    name: CassetteName,
    cassette: Option<CassetteHandle>,
    use_namespaces: bool,
}

impl Session {
    pub(super) fn recording(
        vcr: Arc<Vcr>,
        name: CassetteName,
        cassette: CassetteHandle,
        use_namespaces: bool,
    ) -> Self {
        Self {
            vcr,
            name,
            cassette: Some(cassette),
            use_namespaces,
        }
    }

    pub(super) fn live(vcr: Arc<Vcr>, name: CassetteName, use_namespaces: bool) -> Self {
        Self {
            vcr,
            name,
            cassette: None,
            use_namespaces,
        }
    }

    /// Name of the cassette this session records to (even in live mode)
    #[must_use]
    pub fn name(&self) -> &CassetteName {
        &self.name
    }

    /// Whether requests bypass cassettes
    #[must_use]
    pub fn is_live(&self) -> bool {
        self.cassette.is_none()
    }

    /// The active cassette, `None` in live mode
    #[must_use]
    pub fn cassette(&self) -> Option<&CassetteHandle> {
        self.cassette.as_ref()
    }

    /// Replay or record `request`; in live mode just call `live`
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::UnmatchedRequest`] on a miss the record mode
    /// cannot fill, or [`VcrError::Transport`] if `live` fails
    pub fn exchange<F, E>(&self, request: &Request, live: F) -> Result<Response>
    where
        F: FnOnce(&Request) -> std::result::Result<Response, E>,
        E: Into<BoxError>,
    {
        match &self.cassette {
            Some(cassette) => cassette.exchange(request, live),
            None => live(request).map_err(|e| VcrError::Transport(e.into())),
        }
    }

    /// Async form of [`Session::exchange`]
    ///
    /// # Errors
    ///
    /// Same as [`Session::exchange`]
    pub async fn exchange_async<F, Fut, E>(&self, request: &Request, live: F) -> Result<Response>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = std::result::Result<Response, E>>,
        E: Into<BoxError>,
    {
        match &self.cassette {
            Some(cassette) => cassette.exchange_async(request, live).await,
            None => live(request.clone())
                .await
                .map_err(|e| VcrError::Transport(e.into())),
        }
    }

    /// Run `body` against a subcassette namespaced under this session's
    /// cassette, e.g. `m.T.test.yaml` → `m.T.test.setup.yaml` for `"setup"`
    ///
    /// `match_on` overrides the matcher order for the subcassette only. In
    /// live mode no cassette is opened and `body` runs directly.
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::NamespacesDisabled`] unless the call was built with
    /// `use_namespaces`, any error opening or saving the subcassette, or the
    /// error returned by `body`
    pub fn namespace<T, F>(
        &self,
        name: &str,
        match_on: Option<&[String]>,
        body: F,
    ) -> anyhow::Result<T>
    where
        F: FnOnce(&Session) -> anyhow::Result<T>,
    {
        let (child, guard) = self.enter_namespace(name, match_on)?;
        let result = body(&child);

        if let Some(guard) = guard {
            if result.is_ok() {
                guard.eject()?;
            }
        }
        result
    }

    /// Async form of [`Session::namespace`]
    ///
    /// # Errors
    ///
    /// Same as [`Session::namespace`]
    pub async fn namespace_async<T, F, Fut>(
        &self,
        name: &str,
        match_on: Option<&[String]>,
        body: F,
    ) -> anyhow::Result<T>
    where
        F: FnOnce(Session) -> Fut,
        Fut: Future<Output = anyhow::Result<T>>,
    {
        let (child, guard) = self.enter_namespace(name, match_on)?;
        let result = body(child).await;

        if let Some(guard) = guard {
            if result.is_ok() {
                guard.eject()?;
            }
        }
        result
    }

    fn enter_namespace(
        &self,
        name: &str,
        match_on: Option<&[String]>,
    ) -> Result<(Session, Option<CassetteGuard>)> {
        if !self.use_namespaces {
            return Err(VcrError::NamespacesDisabled(self.name.to_string()));
        }

        let sub_name = self.name.subcassette(name);

        if self.is_live() {
            debug!("Namespace '{}' is a passthrough in live mode", sub_name);
            let child = Self::live(Arc::clone(&self.vcr), sub_name, self.use_namespaces);
            return Ok((child, None));
        }

        debug!("Entering namespace '{}'", sub_name);
        let guard = self.vcr.use_cassette(&sub_name, match_on)?;
        let child = Self::recording(
            Arc::clone(&self.vcr),
            sub_name,
            guard.handle().clone(),
            self.use_namespaces,
        );
        Ok((child, Some(guard)))
    }
}
