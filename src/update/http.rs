use std::ffi::OsString;
use std::fs::{self, File};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use serde_json::Value;

use crate::error::FetchError;

const USER_AGENT: &str = concat!("app-stub/", env!("CARGO_PKG_VERSION"));
const JSON_ACCEPT: &str = "application/vnd.github+json, application/json";
const JSON_TIMEOUT: Duration = Duration::from_secs(30);

/// Outbound HTTP used by the updater. One attempt per call, no retries
pub trait Transport: Send + Sync {
    /// GET a URL and parse the body as JSON
    fn get_json(&self, url: &str) -> Result<Value, FetchError>;

    /// GET a URL and stream the body to `dest`. Returns the number of bytes written
    fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError>;
}

pub struct HttpTransport {
    client: reqwest::blocking::Client,
    show_progress: bool,
}

impl HttpTransport {
    pub fn new() -> reqwest::Result<Self> {
        // No client-wide timeout; JSON requests set their own
        let client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(None::<Duration>)
            .build()?;
        Ok(Self {
            client,
            show_progress: true,
        })
    }

    pub fn with_progress(mut self, show: bool) -> Self {
        self.show_progress = show;
        self
    }

    fn progress_bar(&self, total: Option<u64>) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        match total {
            Some(len) => {
                let pb = ProgressBar::new(len);
                if let Ok(style) = ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {bytes}/{total_bytes} ({eta})")
                {
                    pb.set_style(style.progress_chars("#>-"));
                }
                pb
            }
            None => self.spinner("Downloading"),
        }
    }

    fn spinner(&self, msg: &str) -> ProgressBar {
        if !self.show_progress {
            return ProgressBar::hidden();
        }
        let pb = ProgressBar::new_spinner();
        pb.set_message(msg.to_string());
        pb.enable_steady_tick(Duration::from_millis(120));
        pb
    }

    fn fetch_json(&self, url: &str) -> Result<Value, FetchError> {
        let response = self
            .client
            .get(url)
            .header(reqwest::header::ACCEPT, JSON_ACCEPT)
            .timeout(JSON_TIMEOUT)
            .send()
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let body = response.text().map_err(|e| FetchError::network(url, e))?;
        serde_json::from_str(&body).map_err(|e| FetchError::parse(format!("{}: {}", url, e)))
    }
}

impl Transport for HttpTransport {
    fn get_json(&self, url: &str) -> Result<Value, FetchError> {
        tracing::debug!("GET {url}");
        let pb = self.spinner("Checking for updates");
        let result = self.fetch_json(url);
        pb.finish_and_clear();
        result
    }

    fn download(&self, url: &str, dest: &Path) -> Result<u64, FetchError> {
        tracing::debug!("GET {url} -> {}", dest.display());
        let mut response = self
            .client
            .get(url)
            .send()
            .map_err(|e| FetchError::network(url, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        if let Some(parent) = dest.parent() {
            fs::create_dir_all(parent)?;
        }
        let partial = partial_path(dest);
        let pb = self.progress_bar(response.content_length());

        let written = match stream_to_file(&mut response, &partial, &pb) {
            Ok(n) => n,
            Err(e) => {
                pb.abandon();
                let _ = fs::remove_file(&partial);
                return Err(match e {
                    StreamError::Read(source) => FetchError::network(url, source),
                    StreamError::Write(source) => FetchError::Io(source),
                });
            }
        };

        if let Err(e) = fs::rename(&partial, dest) {
            pb.abandon();
            let _ = fs::remove_file(&partial);
            return Err(FetchError::Io(e));
        }
        pb.finish_and_clear();
        tracing::debug!("downloaded {written} bytes from {url}");
        Ok(written)
    }
}

enum StreamError {
    Read(std::io::Error),
    Write(std::io::Error),
}

fn stream_to_file(
    response: &mut impl Read,
    path: &Path,
    pb: &ProgressBar,
) -> Result<u64, StreamError> {
    let mut file = File::create(path).map_err(StreamError::Write)?;
    let mut downloaded: u64 = 0;
    let mut buffer = [0u8; 8192];

    loop {
        let bytes_read = response.read(&mut buffer).map_err(StreamError::Read)?;
        if bytes_read == 0 {
            break;
        }
        file.write_all(&buffer[..bytes_read])
            .map_err(StreamError::Write)?;
        downloaded += bytes_read as u64;
        pb.set_position(downloaded);
    }

    file.sync_all().map_err(StreamError::Write)?;
    Ok(downloaded)
}

/// `<dest>.part`, the staging file a download streams into
fn partial_path(dest: &Path) -> PathBuf {
    let mut name = OsString::from(dest.as_os_str());
    name.push(".part");
    PathBuf::from(name)
}
