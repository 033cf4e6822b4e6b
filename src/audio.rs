use std::fs;
use std::path::{Path, PathBuf};
use std::thread;
use std::time::Duration;

use crate::error::{EditorError, Result};

pub const SUPPORTED_EXTENSIONS: &[&str] = &["wav", "mp3", "ogg"];

const REPLACE_ATTEMPTS: u32 = 3;
const REPLACE_SETTLE: Duration = Duration::from_millis(200);
const REPLACE_BACKOFF: Duration = Duration::from_millis(500);

/// Opaque playback service. Decoding and output are outside this tool's
/// scope; the session only resolves a clip path and hands it over.
pub trait AudioPlayer {
    fn play(&mut self, path: &Path);
    fn stop(&mut self) {}
}

/// Default player: announces the clip instead of decoding it.
#[derive(Default)]
pub struct LogPlayer;

impl AudioPlayer for LogPlayer {
    fn play(&mut self, path: &Path) {
        log::info!("playing audio clip {path:?}");
    }
}

/// Reject sources that do not exist or carry an unsupported extension.
pub fn validate_audio_source(path: &Path) -> Result<()> {
    if !path.exists() {
        return Err(EditorError::not_found(format!("audio file {path:?}")));
    }
    let ext = path
        .extension()
        .and_then(|e| e.to_str())
        .map(str::to_ascii_lowercase)
        .unwrap_or_default();
    if !SUPPORTED_EXTENSIONS.contains(&ext.as_str()) {
        return Err(EditorError::validation(format!(
            "unsupported audio format '.{ext}' (supported: {})",
            SUPPORTED_EXTENSIONS.join(", ")
        )));
    }
    Ok(())
}

/// Copy `source` into `target_dir` under `target_name`, staging through a
/// temporary file and replacing the destination with bounded retries to ride
/// out OS-level file locks. Returns the installed path.
pub fn install_audio_file(source: &Path, target_dir: &Path, target_name: &str) -> Result<PathBuf> {
    validate_audio_source(source)?;
    fs::create_dir_all(target_dir).map_err(|e| EditorError::Persistence {
        stage: "create directory",
        path: target_dir.to_path_buf(),
        source: e,
    })?;
    let target = target_dir.join(target_name);
    if same_file(source, &target) {
        log::info!("audio source and target are the same file, skipping copy");
        return Ok(target);
    }
    let staged = target_dir.join(format!("temp_{target_name}"));
    fs::copy(source, &staged).map_err(|e| EditorError::Persistence {
        stage: "stage audio copy",
        path: staged.clone(),
        source: e,
    })?;
    match replace_with_retry(&staged, &target) {
        Ok(()) => Ok(target),
        Err(err) => {
            let _ = fs::remove_file(&staged);
            Err(err)
        }
    }
}

fn same_file(a: &Path, b: &Path) -> bool {
    match (a.canonicalize(), b.canonicalize()) {
        (Ok(a), Ok(b)) => a == b,
        _ => false,
    }
}

fn replace_with_retry(staged: &Path, target: &Path) -> Result<()> {
    let mut last_err = None;
    for attempt in 0..REPLACE_ATTEMPTS {
        if attempt > 0 {
            thread::sleep(REPLACE_BACKOFF);
        }
        let result = (|| -> std::io::Result<()> {
            if target.exists() {
                thread::sleep(REPLACE_SETTLE);
                fs::remove_file(target)?;
            }
            thread::sleep(REPLACE_SETTLE);
            fs::rename(staged, target)
        })();
        match result {
            Ok(()) => return Ok(()),
            Err(e) => {
                log::warn!(
                    "audio replace attempt {} of {REPLACE_ATTEMPTS} failed: {e}",
                    attempt + 1
                );
                last_err = Some(e);
            }
        }
    }
    Err(EditorError::Persistence {
        stage: "replace audio file",
        path: target.to_path_buf(),
        source: last_err.unwrap_or_else(|| std::io::Error::other("replace failed")),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validate_rejects_unknown_extension() {
        let dir = tempfile::tempdir().unwrap();
        let flac = dir.path().join("clip.flac");
        fs::write(&flac, b"x").unwrap();
        assert!(matches!(
            validate_audio_source(&flac),
            Err(EditorError::Validation { .. })
        ));
        assert!(matches!(
            validate_audio_source(&dir.path().join("missing.mp3")),
            Err(EditorError::ResourceNotFound { .. })
        ));
        let ok = dir.path().join("clip.MP3");
        fs::write(&ok, b"x").unwrap();
        validate_audio_source(&ok).unwrap();
    }

    #[test]
    fn install_copies_and_replaces() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("new.wav");
        fs::write(&source, b"new-bytes").unwrap();
        let target_dir = dir.path().join("audio/en/book1");
        fs::create_dir_all(&target_dir).unwrap();
        fs::write(target_dir.join("word.wav"), b"old-bytes").unwrap();

        let installed = install_audio_file(&source, &target_dir, "word.wav").unwrap();
        assert_eq!(fs::read(&installed).unwrap(), b"new-bytes");
        assert!(!target_dir.join("temp_word.wav").exists());
    }

    #[test]
    fn install_skips_copy_onto_itself() {
        let dir = tempfile::tempdir().unwrap();
        let target_dir = dir.path().join("audio");
        fs::create_dir_all(&target_dir).unwrap();
        let clip = target_dir.join("word.ogg");
        fs::write(&clip, b"bytes").unwrap();
        let installed = install_audio_file(&clip, &target_dir, "word.ogg").unwrap();
        assert_eq!(fs::read(&installed).unwrap(), b"bytes");
    }
}
