//! Media fetcher - shells out to yt-dlp and hands back the downloaded file.

use std::fmt;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;
use tracing::{info, warn};

/// Browser user agent sent to YouTube. Paired with the android player client
/// below to get past bot detection on shared hosting IPs.
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
                          (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

/// Why a fetch produced no artifact. None of these are retried.
#[derive(Debug)]
pub enum FetchError {
    /// The downloader executable could not be started.
    Spawn(std::io::Error),
    /// The downloader ran but exited non-zero.
    Failed { code: Option<i32>, stderr: String },
    /// The downloader exceeded the wall-clock limit and was killed.
    Timeout(Duration),
    /// The downloader reported success but no output file could be located.
    NoOutput,
}

impl fmt::Display for FetchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Spawn(e) => write!(f, "failed to run downloader: {e}"),
            Self::Failed { code, stderr } => match code {
                Some(code) => write!(f, "downloader exited with code {code}: {stderr}"),
                None => write!(f, "downloader killed by signal: {stderr}"),
            },
            Self::Timeout(limit) => write!(f, "downloader timed out after {}s", limit.as_secs()),
            Self::NoOutput => write!(f, "downloader produced no locatable output file"),
        }
    }
}

impl std::error::Error for FetchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Spawn(e) => Some(e),
            _ => None,
        }
    }
}

/// A downloaded file on local storage. Owns the file: dropping the artifact
/// removes it, so every pipeline exit path cleans up without explicit calls.
#[derive(Debug)]
pub struct DownloadArtifact {
    path: PathBuf,
    size_bytes: u64,
}

impl DownloadArtifact {
    pub(crate) fn new(path: PathBuf, size_bytes: u64) -> Self {
        Self { path, size_bytes }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn size_bytes(&self) -> u64 {
        self.size_bytes
    }

    pub fn size_mib(&self) -> f64 {
        self.size_bytes as f64 / (1024.0 * 1024.0)
    }
}

impl Drop for DownloadArtifact {
    fn drop(&mut self) {
        match std::fs::remove_file(&self.path) {
            Ok(()) => info!("🗑️ Cleaned up file: {}", self.path.display()),
            Err(e) => warn!("Failed to remove {}: {e}", self.path.display()),
        }
    }
}

/// Wrapper around the yt-dlp executable.
///
/// Output files are keyed by media id, so concurrent requests for different
/// videos land on different names. Two concurrent requests for the *same*
/// video can race on one filename; unresolved, matching upstream behavior.
pub struct MediaFetcher {
    bin: String,
    download_dir: PathBuf,
    timeout: Duration,
}

impl MediaFetcher {
    pub fn new(bin: impl Into<String>, download_dir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            bin: bin.into(),
            download_dir: download_dir.into(),
            timeout,
        }
    }

    /// Download `url` with the given format selector and return the file.
    ///
    /// One bounded synchronous call: spawns yt-dlp, waits for exit or the
    /// wall-clock limit (the child is killed on timeout), then resolves the
    /// output path from the last non-empty stdout line. If the reported path
    /// does not exist the download directory is scanned for the most recently
    /// modified file instead.
    pub async fn fetch(&self, url: &str, format_selector: &str) -> Result<DownloadArtifact, FetchError> {
        tokio::fs::create_dir_all(&self.download_dir)
            .await
            .map_err(FetchError::Spawn)?;

        let output_template = self.download_dir.join("%(id)s.%(ext)s");

        info!("Starting download for URL: {url} with format: {format_selector}");

        let mut command = Command::new(&self.bin);
        command
            .arg("--output")
            .arg(&output_template)
            .args(["-f", format_selector, "--print", "filepath"])
            // Bypass YouTube's bot detection
            .args(["--extractor-args", "youtube:player_client=android"])
            .arg("--no-check-certificate")
            .args(["--user-agent", USER_AGENT])
            .arg(url)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);

        let output = match tokio::time::timeout(self.timeout, command.output()).await {
            Ok(result) => result.map_err(FetchError::Spawn)?,
            Err(_) => {
                warn!("Downloader timed out after {}s", self.timeout.as_secs());
                return Err(FetchError::Timeout(self.timeout));
            }
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            warn!("Downloader failed. STDERR: {stderr}");
            return Err(FetchError::Failed {
                code: output.status.code(),
                stderr,
            });
        }

        let stdout = String::from_utf8_lossy(&output.stdout);
        let reported = stdout
            .lines()
            .rev()
            .map(str::trim)
            .find(|line| !line.is_empty())
            .map(PathBuf::from);

        if let Some(path) = reported {
            if let Ok(meta) = std::fs::metadata(&path)
                && meta.is_file()
            {
                info!("Successfully downloaded file: {}", path.display());
                return Ok(DownloadArtifact::new(path, meta.len()));
            }
            warn!(
                "Download reported success, but file not found at: {}",
                path.display()
            );
        }

        // The printed path can be stale when yt-dlp post-processes the
        // container. Fall back to the newest file in the download directory.
        match newest_file(&self.download_dir) {
            Some((path, size)) => {
                info!("Falling back to newest downloaded file: {}", path.display());
                Ok(DownloadArtifact::new(path, size))
            }
            None => Err(FetchError::NoOutput),
        }
    }

    /// Run `yt-dlp --version` for the diagnostic route.
    pub async fn version(&self) -> Result<String, FetchError> {
        let output = Command::new(&self.bin)
            .arg("--version")
            .stdin(Stdio::null())
            .output()
            .await
            .map_err(FetchError::Spawn)?;

        if !output.status.success() {
            return Err(FetchError::Failed {
                code: output.status.code(),
                stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }
}

/// Most recently modified regular file in `dir`, with its size.
fn newest_file(dir: &Path) -> Option<(PathBuf, u64)> {
    let entries = std::fs::read_dir(dir).ok()?;
    entries
        .flatten()
        .filter_map(|entry| {
            let meta = entry.metadata().ok()?;
            if !meta.is_file() {
                return None;
            }
            let modified = meta.modified().ok()?;
            Some((entry.path(), meta.len(), modified))
        })
        .max_by_key(|(_, _, modified)| *modified)
        .map(|(path, size, _)| (path, size))
}
