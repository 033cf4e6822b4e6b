use std::path::{Path, PathBuf};

/// Resolves page images and audio clips under a single asset root:
/// images at `{root}/books/{book_id}/{image}`, audio under
/// `{root}/audio/{lang}/...` with a fixed search order.
#[derive(Clone, Debug)]
pub struct AssetPaths {
    root: PathBuf,
    lang: String,
}

impl AssetPaths {
    pub fn new(root: impl Into<PathBuf>, lang: impl Into<String>) -> Self {
        Self {
            root: root.into(),
            lang: lang.into(),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Deterministic, no fallback search.
    pub fn image_path(&self, book_id: &str, image: &str) -> PathBuf {
        self.root.join("books").join(book_id).join(image)
    }

    /// Candidate clip locations in resolution order.
    pub fn audio_candidates(&self, book_id: &str, filename: &str) -> [PathBuf; 4] {
        let base = self.root.join("audio").join(&self.lang);
        [
            base.join(filename),
            base.join(book_id).join(filename),
            base.join("V1").join(filename),
            base.join("V2").join(filename),
        ]
    }

    /// First existing candidate wins; `None` when the clip is missing from
    /// every location.
    pub fn resolve_audio(&self, book_id: &str, filename: &str) -> Option<PathBuf> {
        self.audio_candidates(book_id, filename)
            .into_iter()
            .find(|p| p.exists())
    }

    /// Where newly added clips for a book are installed.
    pub fn audio_target_dir(&self, book_id: &str) -> PathBuf {
        self.root.join("audio").join(&self.lang).join(book_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn candidate_order_matches_policy() {
        let paths = AssetPaths::new("/data", "en");
        let candidates = paths.audio_candidates("book7", "cat.mp3");
        assert_eq!(candidates[0], PathBuf::from("/data/audio/en/cat.mp3"));
        assert_eq!(candidates[1], PathBuf::from("/data/audio/en/book7/cat.mp3"));
        assert_eq!(candidates[2], PathBuf::from("/data/audio/en/V1/cat.mp3"));
        assert_eq!(candidates[3], PathBuf::from("/data/audio/en/V2/cat.mp3"));
    }

    #[test]
    fn image_path_is_deterministic() {
        let paths = AssetPaths::new("/data", "en");
        assert_eq!(
            paths.image_path("book7", "page_01.png"),
            PathBuf::from("/data/books/book7/page_01.png")
        );
    }

    #[test]
    fn resolve_prefers_earlier_candidates() {
        let dir = tempfile::tempdir().unwrap();
        let paths = AssetPaths::new(dir.path(), "en");
        let v1 = dir.path().join("audio/en/V1");
        let plain = dir.path().join("audio/en");
        std::fs::create_dir_all(&v1).unwrap();
        std::fs::write(v1.join("cat.mp3"), b"x").unwrap();
        assert_eq!(
            paths.resolve_audio("book7", "cat.mp3"),
            Some(v1.join("cat.mp3"))
        );
        std::fs::write(plain.join("cat.mp3"), b"x").unwrap();
        assert_eq!(
            paths.resolve_audio("book7", "cat.mp3"),
            Some(plain.join("cat.mp3"))
        );
        assert_eq!(paths.resolve_audio("book7", "dog.mp3"), None);
    }
}
