pub mod channel;
pub mod handoff;
pub mod http;
pub mod manifest;

use std::io;
use std::path::{Path, PathBuf};
use std::sync::{mpsc, Arc};
use std::thread;

use thiserror::Error;

use crate::config::Config;
use crate::connectivity::Connectivity;
use crate::error::{chain, FetchError, HandoffError};
use crate::present::Presenter;

use channel::{ManifestRequest, ReleaseChannel};
use handoff::{ArtifactHandoff, DownloadResult, Handoff};
use http::Transport;
use manifest::{CommitRef, UpdateManifest};

pub use channel::Endpoints;
pub use handoff::DeploymentMode;
pub use manifest::parse_manifest;

pub const NO_INTERNET_MSG: &str =
    "No internet connection. Connect to a network and launch the app again to update.";
pub const RELAUNCH_MSG: &str = "Update downloaded. Relaunch the app to use it.";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum State {
    Init,
    CheckingConnectivity,
    ResolvingChannel,
    FetchingManifest,
    AwaitingConsent,
    Downloading,
    HandingOff,
    Done,
    Aborted,
}

#[derive(Debug, Error)]
pub enum AbortReason {
    #[error("no network connectivity")]
    NoConnectivity,
    #[error("failed to resolve update manifest")]
    FetchFailed(#[source] FetchError),
    #[error("update declined")]
    UserDeclined,
    #[error("failed to download update")]
    DownloadFailed(#[source] FetchError),
    #[error("failed to hand off update")]
    HandoffFailed(#[source] HandoffError),
}

#[derive(Debug)]
pub enum Outcome {
    Done(Handoff),
    Aborted(AbortReason),
}

/// State of the one attempt a coordinator runs
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateAttempt {
    pub channel: ReleaseChannel,
    pub commit: Option<CommitRef>,
    pub target: PathBuf,
}

/// Drives connectivity check, channel resolution, manifest fetch, consent,
/// download and handoff for a single attempt
///
/// Runs on the presentation thread: every [`Presenter`] call is made from
/// the thread that calls [`run`](Self::run). Only the download leaves it
pub struct UpdateCoordinator<'a> {
    config: &'a Config,
    connectivity: &'a dyn Connectivity,
    transport: Arc<dyn Transport>,
    handoff: &'a ArtifactHandoff,
    presenter: &'a mut dyn Presenter,
    attempt: UpdateAttempt,
    state: State,
    trail: Vec<State>,
}

impl<'a> UpdateCoordinator<'a> {
    pub fn new(
        config: &'a Config,
        connectivity: &'a dyn Connectivity,
        transport: Arc<dyn Transport>,
        handoff: &'a ArtifactHandoff,
        presenter: &'a mut dyn Presenter,
    ) -> Self {
        let attempt = UpdateAttempt {
            channel: config.channel.clone(),
            commit: None,
            target: config.paths.target_for(handoff.mode()),
        };
        Self {
            config,
            connectivity,
            transport,
            handoff,
            presenter,
            attempt,
            state: State::Init,
            trail: vec![State::Init],
        }
    }

    pub fn state(&self) -> State {
        self.state
    }

    /// Every state entered so far, in order
    pub fn trail(&self) -> &[State] {
        &self.trail
    }

    pub fn attempt(&self) -> &UpdateAttempt {
        &self.attempt
    }

    fn enter(&mut self, next: State) {
        tracing::debug!("update state {:?} -> {:?}", self.state, next);
        self.state = next;
        self.trail.push(next);
    }

    /// Run the attempt to completion. Every failure is terminal
    pub fn run(&mut self) -> Outcome {
        self.enter(State::CheckingConnectivity);
        if !self.connectivity.is_online() {
            if let Err(e) = self.presenter.notify_blocking(NO_INTERNET_MSG) {
                tracing::debug!("connectivity notice not acknowledged: {e}");
            }
            return self.abort(AbortReason::NoConnectivity);
        }

        let manifest = match self.resolve_manifest() {
            Ok(manifest) => manifest,
            Err(e) => return self.abort(AbortReason::FetchFailed(e)),
        };

        self.enter(State::AwaitingConsent);
        match self.presenter.confirm(&upgrade_prompt(&manifest)) {
            Ok(true) => {}
            Ok(false) => return self.abort(AbortReason::UserDeclined),
            Err(e) => {
                tracing::warn!("no answer to the update prompt: {e}");
                return self.abort(AbortReason::UserDeclined);
            }
        }

        self.enter(State::Downloading);
        let target = self.attempt.target.clone();
        let download = match self.download(manifest.artifact_url, &target) {
            Ok(download) => download,
            Err(e) => return self.abort(AbortReason::DownloadFailed(e)),
        };
        tracing::info!("downloaded {} to {}", download.source_url, download.path.display());

        self.enter(State::HandingOff);
        let handoff = match self.handoff.handoff(download) {
            Ok(handoff) => handoff,
            Err(e) => return self.abort(AbortReason::HandoffFailed(e)),
        };
        if handoff == Handoff::RelaunchRequired {
            self.presenter.notify_transient(RELAUNCH_MSG);
        }

        self.enter(State::Done);
        tracing::info!("update handed off: {:?}", handoff);
        Outcome::Done(handoff)
    }

    /// Resolve the channel and fetch its manifest, following the canary
    /// branch reference when needed
    pub fn resolve_manifest(&mut self) -> Result<UpdateManifest, FetchError> {
        self.enter(State::ResolvingChannel);
        let request = channel::resolve(&self.attempt.channel, &self.config.endpoints);
        tracing::debug!("{} channel resolved to {:?}", self.attempt.channel.name(), request);

        self.enter(State::FetchingManifest);
        let manifest_url = match request {
            ManifestRequest::Direct(url) => url,
            ManifestRequest::TwoStep { branch_url } => {
                let branch = self.transport.get_json(&branch_url)?;
                let commit = manifest::extract_commit_sha(&branch)?;
                tracing::debug!("canary branch at {}", commit.as_str());
                let url = self.config.endpoints.canary_manifest_url(commit.as_str());
                self.attempt.commit = Some(commit);
                self.enter(State::FetchingManifest);
                url
            }
        };

        let json = self.transport.get_json(&manifest_url)?;
        let manifest = parse_manifest(&json, self.attempt.commit.as_ref(), &self.config.endpoints)?;
        tracing::info!("latest artifact at {}", manifest.artifact_url);
        Ok(manifest)
    }

    /// Download on a worker thread and wait for its result here
    fn download(&self, url: String, dest: &Path) -> Result<DownloadResult, FetchError> {
        let (tx, rx) = mpsc::channel();
        let transport = Arc::clone(&self.transport);
        let dest = dest.to_path_buf();

        thread::Builder::new()
            .name("artifact-download".to_string())
            .spawn(move || {
                let result = transport.download(&url, &dest).map(|_| DownloadResult {
                    path: dest,
                    source_url: url,
                });
                let _ = tx.send(result);
            })?;

        rx.recv().map_err(|_| {
            FetchError::Io(io::Error::new(
                io::ErrorKind::Other,
                "download worker exited without a result",
            ))
        })?
    }

    fn abort(&mut self, reason: AbortReason) -> Outcome {
        self.enter(State::Aborted);
        match &reason {
            AbortReason::NoConnectivity | AbortReason::UserDeclined => {
                tracing::warn!("update aborted: {}", reason)
            }
            AbortReason::FetchFailed(_)
            | AbortReason::DownloadFailed(_)
            | AbortReason::HandoffFailed(_) => {
                tracing::error!("update aborted: {}", chain(&reason))
            }
        }
        Outcome::Aborted(reason)
    }
}

fn upgrade_prompt(manifest: &UpdateManifest) -> String {
    match &manifest.version {
        Some(version) => format!("Version {} is available. Download and install it now?", version),
        None => "An update is available. Download and install it now?".to_string(),
    }
}
