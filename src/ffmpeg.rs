use std::{io::ErrorKind, path::Path, process::Stdio};

use anyhow::{Context, Result, bail};
use tracing::{debug, error, instrument};

/// Checks if ffmpeg is installed / available in PATH
pub async fn is_installed() -> bool {
    debug!("Checking for ffmpeg installation");
    tokio::process::Command::new("ffmpeg")
        .arg("-version")
        .stderr(Stdio::null())
        .stdout(Stdio::null())
        .status()
        .await
        .is_ok_and(|s| s.success())
}

/// Remuxes an MPEG-TS file into an MP4 container without re-encoding
///
/// # Errors
/// Errors when ffmpeg is missing, cannot be spawned or exits unsuccessfully
#[instrument]
pub async fn remux_to_mp4(input: &Path, out_file: &Path) -> Result<()> {
    let child = match tokio::process::Command::new("ffmpeg")
        .arg("-y")
        .args(["-loglevel", "error"])
        .arg("-i")
        .arg(input)
        .args(["-c", "copy", "-movflags", "+faststart"])
        .arg(out_file)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .spawn()
    {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => {
            bail!("`ffmpeg` is not installed or available in PATH!")
        }
        Err(e) => bail!("Unable to spawn ffmpeg: {e}"),
    };

    let out = child
        .wait_with_output()
        .await
        .context("Waiting for ffmpeg")?;
    if !out.status.success() {
        error!("Remuxing {} is unsuccessful", input.display());
        error!("stdout: {}", String::from_utf8_lossy(&out.stdout));
        error!("stderr: {}", String::from_utf8_lossy(&out.stderr));
        bail!("FFMPEG exit code not success")
    }

    Ok(())
}
