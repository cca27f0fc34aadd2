//! Cassette playback and recording

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tracing::{debug, info, warn};

use crate::config::{RecordMode, VcrConfig};
use crate::error::BoxError;
use crate::interaction::{Interaction, Request, Response};
use crate::matching::{failed_matchers, Matcher};
use crate::naming::CassetteName;
use crate::{Result, VcrError};

use super::format::{self, CassetteFile};

/// A loaded cassette: recorded interactions plus the policy for using them
#[derive(Debug)]
pub struct Cassette {
    name: CassetteName,
    path: PathBuf,
    record_mode: RecordMode,
    matchers: Vec<Matcher>,
    filter_headers: Vec<String>,
    allow_playback_repeats: bool,
    interactions: Vec<Interaction>,
    play_counts: Vec<usize>,
    existed: bool,
    dirty: bool,
}

impl Cassette {
    /// Load a cassette from `config.cassette_library_dir`
    ///
    /// In [`RecordMode::All`] existing interactions are ignored and the file
    /// is overwritten on save.
    ///
    /// # Errors
    ///
    /// Returns error if the name is not a valid file name or an existing
    /// cassette file cannot be parsed
    pub fn load(name: CassetteName, config: &VcrConfig, matchers: Vec<Matcher>) -> Result<Self> {
        name.validate()?;
        let path = config.cassette_library_dir.join(name.as_str());

        let (existed, interactions) = if config.record_mode == RecordMode::All {
            (path.exists(), Vec::new())
        } else {
            match format::read(&path)? {
                Some(file) => (true, file.interactions),
                None => (false, Vec::new()),
            }
        };

        info!(
            "Loaded cassette '{}': {} interactions (record mode {}, file {})",
            name,
            interactions.len(),
            config.record_mode,
            if existed { "present" } else { "absent" }
        );

        Ok(Self {
            name,
            path,
            record_mode: config.record_mode,
            matchers,
            filter_headers: config.filter_headers.clone(),
            allow_playback_repeats: config.allow_playback_repeats,
            play_counts: vec![0; interactions.len()],
            interactions,
            existed,
            dirty: false,
        })
    }

    /// Cassette name
    #[must_use]
    pub fn name(&self) -> &CassetteName {
        &self.name
    }

    /// Backing file path
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Active record mode
    #[must_use]
    pub fn record_mode(&self) -> RecordMode {
        self.record_mode
    }

    /// Matcher names in application order
    #[must_use]
    pub fn match_on(&self) -> Vec<&str> {
        self.matchers.iter().map(Matcher::name).collect()
    }

    /// Recorded interactions
    #[must_use]
    pub fn interactions(&self) -> &[Interaction] {
        &self.interactions
    }

    /// Number of recorded interactions
    #[must_use]
    pub fn len(&self) -> usize {
        self.interactions.len()
    }

    /// Whether the cassette holds no interactions
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.interactions.is_empty()
    }

    /// Whether the backing file existed when the cassette was loaded
    #[must_use]
    pub fn existed(&self) -> bool {
        self.existed
    }

    /// Whether unsaved recordings are pending
    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    /// Total number of replays served
    #[must_use]
    pub fn play_count(&self) -> usize {
        self.play_counts.iter().sum()
    }

    /// Whether every recorded interaction has been replayed at least once
    #[must_use]
    pub fn all_played(&self) -> bool {
        self.play_counts.iter().all(|&count| count > 0)
    }

    /// Whether new interactions may be recorded
    #[must_use]
    pub fn can_record(&self) -> bool {
        match self.record_mode {
            RecordMode::All | RecordMode::NewEpisodes => true,
            RecordMode::Once => !self.existed,
            RecordMode::None => false,
        }
    }

    fn replays(&self) -> bool {
        self.record_mode != RecordMode::All
    }

    fn find(&self, request: &Request) -> Option<usize> {
        self.interactions
            .iter()
            .enumerate()
            .filter(|(i, _)| self.allow_playback_repeats || self.play_counts[*i] == 0)
            .find(|(_, recorded)| {
                self.matchers
                    .iter()
                    .all(|m| m.matches(&recorded.request, request))
            })
            .map(|(i, _)| i)
    }

    /// Replay the first unplayed interaction matching `request`
    pub fn play(&mut self, request: &Request) -> Option<Response> {
        if !self.replays() {
            return None;
        }

        let index = self.find(request)?;
        self.play_counts[index] += 1;

        debug!(
            "Replayed {} {} from '{}' (interaction {})",
            request.method, request.uri, self.name, index
        );

        Some(self.interactions[index].response.clone())
    }

    /// Append an interaction, stripping filtered headers from the request
    ///
    /// # Errors
    ///
    /// Returns error if the record mode forbids recording
    pub fn record(&mut self, mut request: Request, response: Response) -> Result<()> {
        if !self.can_record() {
            return Err(VcrError::ConfigError(format!(
                "Cassette '{}' cannot record in record mode {}",
                self.name, self.record_mode
            )));
        }

        request.strip_headers(&self.filter_headers);

        debug!(
            "Recorded {} {} -> {} into '{}'",
            request.method, request.uri, response.status, self.name
        );

        self.interactions.push(Interaction { request, response });
        // A fresh recording counts as played
        self.play_counts.push(1);
        self.dirty = true;
        Ok(())
    }

    /// Error for a request that can neither be replayed nor recorded
    #[must_use]
    pub fn unmatched(&self, request: &Request) -> VcrError {
        let match_on = self.match_on().join(" / ");

        warn!(
            "No match in '{}' for {} {} (matching on {})",
            self.name, request.method, request.uri, match_on
        );
        for (i, recorded) in self.interactions.iter().enumerate() {
            debug!(
                "  interaction {}: {} {} rejected by {:?}",
                i,
                recorded.request.method,
                recorded.request.uri,
                failed_matchers(&self.matchers, &recorded.request, request)
            );
        }

        VcrError::UnmatchedRequest {
            cassette: self.name.to_string(),
            method: request.method.clone(),
            uri: request.uri.clone(),
            record_mode: self.record_mode.to_string(),
            match_on,
        }
    }

    /// Replay a matching interaction, or perform `live` and record its result
    ///
    /// # Errors
    ///
    /// Returns [`VcrError::UnmatchedRequest`] when nothing matches and the
    /// record mode forbids recording, or [`VcrError::Transport`] when the
    /// live call fails
    pub fn exchange<F, E>(&mut self, request: &Request, live: F) -> Result<Response>
    where
        F: FnOnce(&Request) -> std::result::Result<Response, E>,
        E: Into<BoxError>,
    {
        if let Some(response) = self.play(request) {
            return Ok(response);
        }

        if !self.can_record() {
            return Err(self.unmatched(request));
        }

        let response = live(request).map_err(|e| VcrError::Transport(e.into()))?;
        self.record(request.clone(), response.clone())?;
        Ok(response)
    }

    /// Write pending recordings to disk
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&mut self) -> Result<()> {
        if !self.dirty {
            return Ok(());
        }

        format::write(&self.path, &CassetteFile::new(self.interactions.clone()))?;
        self.dirty = false;

        info!(
            "Saved cassette '{}': {} interactions to {}",
            self.name,
            self.interactions.len(),
            self.path.display()
        );
        Ok(())
    }
}

/// Shared handle to a cassette held by an active scope
#[derive(Debug, Clone)]
pub struct CassetteHandle {
    inner: Arc<Mutex<Cassette>>,
}

impl CassetteHandle {
    /// Wrap a cassette
    #[must_use]
    pub fn new(cassette: Cassette) -> Self {
        Self {
            inner: Arc::new(Mutex::new(cassette)),
        }
    }

    /// Lock the cassette
    ///
    /// A poisoned lock is recovered.
    pub fn lock(&self) -> MutexGuard<'_, Cassette> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Cassette name
    #[must_use]
    pub fn name(&self) -> CassetteName {
        self.lock().name().clone()
    }

    /// See [`Cassette::exchange`]
    ///
    /// # Errors
    ///
    /// Same as [`Cassette::exchange`]
    pub fn exchange<F, E>(&self, request: &Request, live: F) -> Result<Response>
    where
        F: FnOnce(&Request) -> std::result::Result<Response, E>,
        E: Into<BoxError>,
    {
        self.lock().exchange(request, live)
    }

    /// Async form of [`Cassette::exchange`]; the lock is not held while the
    /// live call is pending
    ///
    /// # Errors
    ///
    /// Same as [`Cassette::exchange`]
    pub async fn exchange_async<F, Fut, E>(&self, request: &Request, live: F) -> Result<Response>
    where
        F: FnOnce(Request) -> Fut,
        Fut: Future<Output = std::result::Result<Response, E>>,
        E: Into<BoxError>,
    {
        {
            let mut cassette = self.lock();
            if let Some(response) = cassette.play(request) {
                return Ok(response);
            }
            if !cassette.can_record() {
                return Err(cassette.unmatched(request));
            }
        }

        let response = live(request.clone())
            .await
            .map_err(|e| VcrError::Transport(e.into()))?;
        self.lock().record(request.clone(), response.clone())?;
        Ok(response)
    }

    /// Save pending recordings
    ///
    /// # Errors
    ///
    /// Returns error if the file cannot be written
    pub fn save(&self) -> Result<()> {
        self.lock().save()
    }
}
