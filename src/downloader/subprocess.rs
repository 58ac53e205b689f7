//! Download subprocess management.
//!
//! Spawns yt-dlp for one download, turns its progress lines into
//! `downloading` events and handles cancellation via atomic flags.

use std::collections::HashMap;
use std::path::Path;
use std::process::Stdio;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio::io::{AsyncBufReadExt, BufReader};

use crate::backend::MediaKind;
use crate::error::DownloaderError;
use crate::events::{EventBus, StatusEvent};
use crate::logging::Logger;

use super::progress::{PROGRESS_TEMPLATE, parse_progress_percent, progress_message, should_log_stderr};
use super::settings::{YtDlpConfig, build_format_args};
use super::ytdlp;

/// Interval in milliseconds to check for cancellation requests
const CANCELLATION_POLL_INTERVAL_MS: u64 = 100;

/// Debounce interval for progress updates
const PROGRESS_DEBOUNCE_MS: u128 = 100;

pub const SUCCESS_PREFIX: &str = "Success: Media downloaded successfully.";

/// Cancellation flags of the downloads currently running, by download id.
#[derive(Debug, Default)]
pub struct CancelFlags {
    flags: Mutex<HashMap<String, Arc<AtomicBool>>>,
}

impl CancelFlags {
    fn with_flags<R>(&self, f: impl FnOnce(&mut HashMap<String, Arc<AtomicBool>>) -> R) -> R {
        let mut guard = self.flags.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut guard)
    }

    /// Track a new download. Returns None if the id is already running.
    pub fn register(&self, download_id: &str) -> Option<Arc<AtomicBool>> {
        self.with_flags(|flags| {
            if flags.contains_key(download_id) {
                return None;
            }
            let flag = Arc::new(AtomicBool::new(false));
            flags.insert(download_id.to_string(), Arc::clone(&flag));
            Some(flag)
        })
    }

    /// Request cancellation. Returns false when no such download is running.
    pub fn request(&self, download_id: &str) -> bool {
        self.with_flags(|flags| match flags.get(download_id) {
            Some(flag) => {
                flag.store(true, Ordering::Relaxed);
                true
            }
            None => false,
        })
    }

    pub fn remove(&self, download_id: &str) {
        self.with_flags(|flags| flags.remove(download_id));
    }
}

/// How a download process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DownloadOutcome {
    /// Collected stdout, prefixed with the success line.
    Success(String),
    /// Collected stderr.
    Failed(String),
    Cancelled,
}

/// Full yt-dlp argument list for one download.
pub fn build_download_args(
    target: &str,
    quality: &str,
    kind: MediaKind,
    output_dir: &Path,
) -> Vec<String> {
    let mut args = build_format_args(quality, kind);

    args.push("--no-playlist".to_string());
    args.push("--newline".to_string());
    args.push("--progress-template".to_string());
    args.push(PROGRESS_TEMPLATE.to_string());
    args.push("-o".to_string());
    args.push(output_dir.join("%(title)s.%(ext)s").to_string_lossy().into_owned());
    args.push(target.to_string());

    args
}

/// Run one download to completion, emitting progress on `bus`.
///
/// Returns `Err` only when the process could not be started.
pub async fn run_download(
    config: &YtDlpConfig,
    args: &[String],
    download_id: &str,
    cancel_flag: &AtomicBool,
    bus: &EventBus,
    logger: &Logger,
) -> Result<DownloadOutcome, DownloaderError> {
    let mut cmd = ytdlp::command(config);
    cmd.args(args).stdin(Stdio::null()).stdout(Stdio::piped()).stderr(Stdio::piped());

    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

    let mut child = cmd.spawn().map_err(|e| DownloaderError::spawn(format!("spawn yt-dlp failed: {e}")))?;

    let stdout = child.stdout.take().ok_or_else(|| DownloaderError::empty_output("yt-dlp stdout unavailable"))?;
    let stderr = child.stderr.take().ok_or_else(|| DownloaderError::empty_output("yt-dlp stderr unavailable"))?;

    let mut out_reader = BufReader::new(stdout).lines();
    let mut err_reader = BufReader::new(stderr).lines();

    let mut collected_out = String::new();
    let mut collected_err = String::new();
    let mut last_progress_emit: Option<Instant> = None;

    let mut emit_progress = |percent: f64| {
        let due = last_progress_emit.is_none_or(|at| at.elapsed().as_millis() >= PROGRESS_DEBOUNCE_MS);
        if percent >= 100.0 || due {
            bus.emit(StatusEvent::downloading(download_id, progress_message(percent)));
            last_progress_emit = Some(Instant::now());
        }
    };

    let mut cancelled = false;
    let mut stdout_done = false;
    let mut stderr_done = false;
    let mut process_exited = false;
    let mut status: Option<std::process::ExitStatus> = None;

    loop {
        if process_exited && stdout_done && stderr_done {
            break;
        }

        tokio::select! {
            _ = tokio::time::sleep(Duration::from_millis(CANCELLATION_POLL_INTERVAL_MS)), if !cancelled => {
                if cancel_flag.load(Ordering::Relaxed) {
                    cancelled = true;
                    if let Err(e) = child.start_kill() {
                        logger.append_yt_dlp_log(download_id, &format!("Failed to kill yt-dlp process: {e}"));
                    }
                }
            }

            res = out_reader.next_line(), if !stdout_done => {
                match res {
                    Ok(Some(line)) => match parse_progress_percent(&line) {
                        Some(percent) => emit_progress(percent),
                        None => {
                            collected_out.push_str(&line);
                            collected_out.push('\n');
                        }
                    },
                    Ok(None) => stdout_done = true,
                    Err(e) => {
                        logger.append_yt_dlp_log(download_id, &format!("Error reading stdout: {e}"));
                        stdout_done = true;
                    }
                }
            }

            res = err_reader.next_line(), if !stderr_done => {
                match res {
                    Ok(Some(line)) => {
                        // yt-dlp often writes progress to stderr too
                        if let Some(percent) = parse_progress_percent(&line) {
                            emit_progress(percent);
                        } else {
                            if should_log_stderr(&line) {
                                logger.append_yt_dlp_log(download_id, &line);
                            }
                            collected_err.push_str(&line);
                            collected_err.push('\n');
                        }
                    }
                    Ok(None) => stderr_done = true,
                    Err(e) => {
                        logger.append_yt_dlp_log(download_id, &format!("Error reading stderr: {e}"));
                        stderr_done = true;
                    }
                }
            }

            res = child.wait(), if !process_exited => {
                match res {
                    Ok(s) => status = Some(s),
                    Err(e) => logger.append_yt_dlp_log(download_id, &format!("Error waiting for child process: {e}")),
                }
                process_exited = true;
            }
        }
    }

    if cancelled {
        return Ok(DownloadOutcome::Cancelled);
    }

    Ok(match status {
        Some(status) if status.success() => {
            let output = collected_out.trim_end();
            if output.is_empty() {
                DownloadOutcome::Success(SUCCESS_PREFIX.to_string())
            } else {
                DownloadOutcome::Success(format!("{}\n{}", SUCCESS_PREFIX, output))
            }
        }
        Some(status) => {
            let details = collected_err.trim_end();
            if details.is_empty() {
                DownloadOutcome::Failed(format!("yt-dlp exited with error status {}", status))
            } else {
                DownloadOutcome::Failed(details.to_string())
            }
        }
        None => DownloadOutcome::Failed("yt-dlp wait failed".to_string()),
    })
}
