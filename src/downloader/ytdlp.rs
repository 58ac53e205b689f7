//! One-shot yt-dlp invocations (title lookup, playlist listing).

use std::process::Stdio;

use tokio::io::AsyncReadExt;
use tokio::process::Command;

use super::settings::YtDlpConfig;

/// Captured result of a finished yt-dlp run.
#[derive(Debug, Clone, Default)]
pub struct YtDlpOutput {
    pub stdout: String,
    pub stderr: String,
    pub success: bool,
}

pub fn command(config: &YtDlpConfig) -> Command {
    Command::new(&config.binary)
}

/// Arguments that print the prospective filename instead of downloading.
pub fn title_args(target: &str) -> Vec<String> {
    ["--print", "filename", "--no-playlist", "-o", "%(title)s.%(ext)s", target]
        .into_iter()
        .map(String::from)
        .collect()
}

/// Arguments that list a playlist as one JSON object per line.
pub fn playlist_args(url: &str) -> Vec<String> {
    ["--flat-playlist", "-j", url].into_iter().map(String::from).collect()
}

/// Run yt-dlp command and capture stdout/stderr.
/// Ensures stdin is closed and output is captured concurrently.
pub async fn run_yt_dlp(cmd: &mut Command) -> Result<YtDlpOutput, std::io::Error> {
    cmd.stdin(Stdio::null());
    cmd.stdout(Stdio::piped());
    cmd.stderr(Stdio::piped());

    #[cfg(windows)]
    cmd.creation_flags(0x08000000); // CREATE_NO_WINDOW

    let mut child = cmd.spawn()?;

    let mut stdout = child.stdout.take().ok_or_else(|| std::io::Error::other("Could not capture stdout"))?;
    let mut stderr = child.stderr.take().ok_or_else(|| std::io::Error::other("Could not capture stderr"))?;

    let mut output = String::new();
    let mut errors = String::new();

    let (out_res, err_res) = tokio::join!(stdout.read_to_string(&mut output), stderr.read_to_string(&mut errors));

    out_res?;
    err_res?;

    let status = child.wait().await?;

    // Keep stdout for callers either way; the exit status is folded into stderr.
    if !status.success() {
        let status_note = match status.code() {
            Some(code) => format!("yt-dlp exited with status code {code}"),
            None => "yt-dlp exited without status code (terminated by signal)".to_string(),
        };

        if !errors.trim().is_empty() {
            errors.push('\n');
        }
        errors.push_str(&status_note);
    }

    Ok(YtDlpOutput {
        stdout: output,
        stderr: errors,
        success: status.success(),
    })
}
