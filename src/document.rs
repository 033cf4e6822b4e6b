use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use snafu::ResultExt;
use uuid::Uuid;

use crate::error::{EditorError, PersistenceSnafu, Result};
use crate::geometry::RegionRect;
use crate::region::Category;

pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

fn now_stamp() -> String {
    chrono::Local::now().format(TIMESTAMP_FORMAT).to_string()
}

// ── Elements ────────────────────────────────────────────────────────────────

/// One annotated element as persisted in the book record. Always written with
/// canonical field names; legacy synonyms are folded in at load time and
/// never seen past this module. Fields this editor does not interpret (the
/// translated-language text/audio pair, timestamps) ride along in `extra`.
#[derive(Clone, Debug, Serialize)]
pub struct BookElement {
    #[serde(rename = "Text")]
    pub text: String,
    #[serde(rename = "Category")]
    pub category: Category,
    #[serde(rename = "Image")]
    pub image: String,
    #[serde(rename = "X1")]
    pub x1: i32,
    #[serde(rename = "Y1")]
    pub y1: i32,
    #[serde(rename = "X2")]
    pub x2: i32,
    #[serde(rename = "Y2")]
    pub y2: i32,
    #[serde(rename = "English_Audio_File")]
    pub audio_file: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl BookElement {
    pub fn rect(&self) -> RegionRect {
        RegionRect::from_ints(self.x1, self.y1, self.x2, self.y2)
    }

    pub fn set_rect(&mut self, rect: &RegionRect) {
        let (x1, y1, x2, y2) = rect.normalized().rounded();
        self.x1 = x1;
        self.y1 = y1;
        self.x2 = x2;
        self.y2 = y2;
    }

    fn touch(&mut self) {
        self.extra
            .insert("updateTime".into(), Value::String(now_stamp()));
    }
}

/// Loose on-disk shape: accepts both canonical and legacy field names, plus
/// the old nested `coordinates` object.
#[derive(Deserialize)]
struct RawElement {
    #[serde(rename = "Text", alias = "text")]
    text: Option<String>,
    #[serde(rename = "Category", alias = "category")]
    category: Option<Category>,
    #[serde(rename = "Image", alias = "image")]
    image: Option<String>,
    #[serde(rename = "X1")]
    x1: Option<i32>,
    #[serde(rename = "Y1")]
    y1: Option<i32>,
    #[serde(rename = "X2")]
    x2: Option<i32>,
    #[serde(rename = "Y2")]
    y2: Option<i32>,
    #[serde(rename = "English_Audio_File", alias = "audioFile")]
    audio_file: Option<String>,
    id: Option<String>,
    coordinates: Option<LegacyCoordinates>,
    #[serde(flatten)]
    extra: Map<String, Value>,
}

#[derive(Deserialize)]
struct LegacyCoordinates {
    x1: i32,
    y1: i32,
    x2: i32,
    y2: i32,
}

impl RawElement {
    fn normalize(self, index: usize) -> std::result::Result<BookElement, String> {
        let (x1, y1, x2, y2) = match (self.x1, self.y1, self.x2, self.y2, self.coordinates) {
            (Some(x1), Some(y1), Some(x2), Some(y2), _) => (x1, y1, x2, y2),
            (_, _, _, _, Some(c)) => (c.x1, c.y1, c.x2, c.y2),
            _ => return Err(format!("element {index}: missing coordinates")),
        };
        let image = self
            .image
            .ok_or_else(|| format!("element {index}: missing image name"))?;
        let rect = RegionRect::from_ints(x1, y1, x2, y2);
        let (x1, y1, x2, y2) = rect.rounded();
        Ok(BookElement {
            text: self.text.unwrap_or_default(),
            category: self.category.unwrap_or(Category::Word),
            image,
            x1,
            y1,
            x2,
            y2,
            audio_file: self.audio_file.unwrap_or_default(),
            id: self.id,
            extra: self.extra,
        })
    }
}

// ── Document ────────────────────────────────────────────────────────────────

#[derive(Clone, Debug)]
pub struct BookMetadata {
    pub book_id: String,
    pub title: String,
    pub page_count: usize,
    pub loaded_at: String,
}

/// Derived grouping of the flat element list by page image, in first-seen
/// order. Rebuilt after every structural change so it always agrees with the
/// flat list.
#[derive(Clone, Debug)]
pub struct PageEntry {
    pub image: String,
    pub element_indices: Vec<usize>,
}

/// The full annotation record for one book: a flat list of elements keyed by
/// page image, persisted as a JSON array.
#[derive(Debug)]
pub struct BookDocument {
    path: PathBuf,
    book_id: String,
    elements: Vec<BookElement>,
    pages: Vec<PageEntry>,
    loaded_at: String,
}

impl BookDocument {
    pub fn load(path: &Path) -> Result<Self> {
        let data = fs::read_to_string(path).context(PersistenceSnafu {
            stage: "read",
            path: path.to_path_buf(),
        })?;
        let raw: Vec<RawElement> =
            serde_json::from_str(&data).map_err(|e| EditorError::Format {
                path: path.to_path_buf(),
                message: e.to_string(),
            })?;
        let elements = raw
            .into_iter()
            .enumerate()
            .map(|(i, r)| r.normalize(i))
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(|message| EditorError::Format {
                path: path.to_path_buf(),
                message,
            })?;
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default();
        let book_id = stem.split('_').next().unwrap_or(stem).to_string();
        let mut doc = Self {
            path: path.to_path_buf(),
            book_id,
            elements,
            pages: Vec::new(),
            loaded_at: now_stamp(),
        };
        doc.rebuild_pages();
        log::info!(
            "loaded book {} with {} elements across {} pages",
            doc.book_id,
            doc.elements.len(),
            doc.pages.len()
        );
        Ok(doc)
    }

    fn rebuild_pages(&mut self) {
        let mut pages: Vec<PageEntry> = Vec::new();
        for (i, element) in self.elements.iter().enumerate() {
            match pages.iter_mut().find(|p| p.image == element.image) {
                Some(page) => page.element_indices.push(i),
                None => pages.push(PageEntry {
                    image: element.image.clone(),
                    element_indices: vec![i],
                }),
            }
        }
        self.pages = pages;
    }

    pub fn book_id(&self) -> &str {
        &self.book_id
    }

    pub fn metadata(&self) -> BookMetadata {
        BookMetadata {
            book_id: self.book_id.clone(),
            title: self
                .path
                .file_stem()
                .and_then(|s| s.to_str())
                .unwrap_or_default()
                .to_string(),
            page_count: self.pages.len(),
            loaded_at: self.loaded_at.clone(),
        }
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub fn element_count(&self) -> usize {
        self.elements.len()
    }

    pub fn element(&self, index: usize) -> Option<&BookElement> {
        self.elements.get(index)
    }

    pub fn page_image(&self, page_index: usize) -> Result<&str> {
        self.pages
            .get(page_index)
            .map(|p| p.image.as_str())
            .ok_or_else(|| EditorError::not_found(format!("page {page_index}")))
    }

    /// Elements of a page with their flat-list indices, in record order.
    pub fn page_elements(&self, page_index: usize) -> Result<Vec<(usize, &BookElement)>> {
        let page = self
            .pages
            .get(page_index)
            .ok_or_else(|| EditorError::not_found(format!("page {page_index}")))?;
        Ok(page
            .element_indices
            .iter()
            .map(|&i| (i, &self.elements[i]))
            .collect())
    }

    pub fn update_element_rect(&mut self, index: usize, rect: &RegionRect) -> Result<()> {
        if rect.normalized().is_degenerate() {
            return Err(EditorError::validation("degenerate rectangle"));
        }
        let element = self
            .elements
            .get_mut(index)
            .ok_or_else(|| EditorError::not_found(format!("element {index}")))?;
        element.set_rect(rect);
        element.touch();
        Ok(())
    }

    pub fn set_element_audio(&mut self, index: usize, filename: &str) -> Result<()> {
        let element = self
            .elements
            .get_mut(index)
            .ok_or_else(|| EditorError::not_found(format!("element {index}")))?;
        element.audio_file = filename.to_string();
        element.touch();
        Ok(())
    }

    /// Append a new element, stamping identity and timestamps, and regroup.
    pub fn add_element(&mut self, mut element: BookElement) -> usize {
        if element.id.is_none() {
            element.id = Some(Uuid::new_v4().to_string());
        }
        let stamp = now_stamp();
        element
            .extra
            .insert("createTime".into(), Value::String(stamp.clone()));
        element.extra.insert("updateTime".into(), Value::String(stamp));
        self.elements.push(element);
        self.rebuild_pages();
        self.elements.len() - 1
    }

    /// Remove an element from the flat list and regroup. Fails without
    /// mutating when the index no longer exists in the record.
    pub fn remove_element(&mut self, index: usize) -> Result<BookElement> {
        if index >= self.elements.len() {
            return Err(EditorError::not_found(format!("element {index}")));
        }
        let removed = self.elements.remove(index);
        self.rebuild_pages();
        Ok(removed)
    }

    /// Serialize the whole record, writing to a temporary file and renaming
    /// over the target so readers never observe a partial write.
    pub fn save(&self) -> Result<()> {
        let data = serde_json::to_string_pretty(&self.elements).map_err(|e| {
            EditorError::Format {
                path: self.path.clone(),
                message: e.to_string(),
            }
        })?;
        let tmp_path = temp_path(&self.path);
        fs::write(&tmp_path, data).context(PersistenceSnafu {
            stage: "write",
            path: tmp_path.clone(),
        })?;
        if let Err(source) = fs::rename(&tmp_path, &self.path) {
            let _ = fs::remove_file(&tmp_path);
            return Err(EditorError::Persistence {
                stage: "replace",
                path: self.path.clone(),
                source,
            });
        }
        log::info!("saved {} elements to {:?}", self.elements.len(), self.path);
        Ok(())
    }

    /// Save preceded by a `.bak` copy of the pre-write bytes. On failure the
    /// backup is restored over the primary path; the error is still returned
    /// and the in-memory record keeps the attempted edit.
    pub fn save_with_backup(&self) -> Result<()> {
        let backup = backup_path(&self.path);
        if self.path.exists() {
            if let Err(e) = fs::copy(&self.path, &backup) {
                log::warn!("could not create backup {backup:?}: {e}");
            }
        }
        match self.save() {
            Ok(()) => Ok(()),
            Err(err) => {
                if backup.exists() {
                    match fs::copy(&backup, &self.path) {
                        Ok(_) => log::warn!("restored {:?} from backup", self.path),
                        Err(e) => log::error!("backup restore failed: {e}"),
                    }
                }
                Err(err)
            }
        }
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".tmp");
    PathBuf::from(s)
}

pub fn backup_path(path: &Path) -> PathBuf {
    let mut s = path.as_os_str().to_os_string();
    s.push(".bak");
    PathBuf::from(s)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn write_record(dir: &Path, name: &str, json: &str) -> PathBuf {
        let path = dir.join(name);
        fs::write(&path, json).unwrap();
        path
    }

    #[test]
    fn load_accepts_legacy_field_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_record(
            dir.path(),
            "book3_data.json",
            r#"[
                {"text": "hello", "category": "Word", "image": "p1.png",
                 "coordinates": {"x1": 1, "y1": 2, "x2": 30, "y2": 40},
                 "audioFile": "hello.mp3"},
                {"Text": "world", "Category": "Sentence", "Image": "p1.png",
                 "X1": 5, "Y1": 6, "X2": 70, "Y2": 80,
                 "English_Audio_File": "world.mp3",
                 "中文翻譯": "世界"}
            ]"#,
        );
        let doc = BookDocument::load(&path).unwrap();
        assert_eq!(doc.book_id(), "book3");
        assert_eq!(doc.element_count(), 2);
        assert_eq!(doc.page_count(), 1);
        let first = doc.element(0).unwrap();
        assert_eq!(first.text, "hello");
        assert_eq!((first.x1, first.y1, first.x2, first.y2), (1, 2, 30, 40));
        assert_eq!(first.audio_file, "hello.mp3");
        let second = doc.element(1).unwrap();
        assert_eq!(
            second.extra.get("中文翻譯").and_then(|v| v.as_str()),
            Some("世界")
        );
    }

    #[test]
    fn save_writes_canonical_names() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_record(
            dir.path(),
            "b_data.json",
            r#"[{"text": "x", "category": "Word", "image": "p1.png",
                 "coordinates": {"x1": 0, "y1": 0, "x2": 10, "y2": 10},
                 "audioFile": "x.mp3"}]"#,
        );
        let doc = BookDocument::load(&path).unwrap();
        doc.save().unwrap();
        let written: Vec<Value> =
            serde_json::from_str(&fs::read_to_string(&path).unwrap()).unwrap();
        let obj = written[0].as_object().unwrap();
        assert!(obj.contains_key("Text"));
        assert!(obj.contains_key("English_Audio_File"));
        assert!(obj.contains_key("X1"));
        assert!(!obj.contains_key("audioFile"));
        assert!(!obj.contains_key("coordinates"));
    }

    #[test]
    fn malformed_record_is_a_format_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_record(dir.path(), "bad.json", r#"{"not": "a list"}"#);
        assert!(matches!(
            BookDocument::load(&path),
            Err(EditorError::Format { .. })
        ));
        let path = write_record(
            dir.path(),
            "short.json",
            r#"[{"Text": "no coords", "Image": "p1.png"}]"#,
        );
        assert!(matches!(
            BookDocument::load(&path),
            Err(EditorError::Format { .. })
        ));
    }

    #[test]
    fn inverted_coordinates_are_normalized_at_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_record(
            dir.path(),
            "b.json",
            r#"[{"Text": "t", "Category": "Word", "Image": "p1.png",
                 "X1": 50, "Y1": 60, "X2": 10, "Y2": 20,
                 "English_Audio_File": ""}]"#,
        );
        let doc = BookDocument::load(&path).unwrap();
        let e = doc.element(0).unwrap();
        assert_eq!((e.x1, e.y1, e.x2, e.y2), (10, 20, 50, 60));
    }

    #[test]
    fn remove_missing_element_leaves_record_unchanged() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_record(
            dir.path(),
            "b.json",
            r#"[{"Text": "t", "Category": "Word", "Image": "p1.png",
                 "X1": 0, "Y1": 0, "X2": 10, "Y2": 10,
                 "English_Audio_File": ""}]"#,
        );
        let mut doc = BookDocument::load(&path).unwrap();
        let err = doc.remove_element(5).unwrap_err();
        assert!(matches!(err, EditorError::ResourceNotFound { .. }));
        assert_eq!(doc.element_count(), 1);
    }

    #[test]
    fn grouping_tracks_structural_changes() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_record(
            dir.path(),
            "b.json",
            r#"[
                {"Text": "a", "Category": "Word", "Image": "p1.png",
                 "X1": 0, "Y1": 0, "X2": 10, "Y2": 10, "English_Audio_File": ""},
                {"Text": "b", "Category": "Word", "Image": "p2.png",
                 "X1": 0, "Y1": 0, "X2": 10, "Y2": 10, "English_Audio_File": ""}
            ]"#,
        );
        let mut doc = BookDocument::load(&path).unwrap();
        assert_eq!(doc.page_count(), 2);
        let new = BookElement {
            text: "c".into(),
            category: Category::Sentence,
            image: "p2.png".into(),
            x1: 1,
            y1: 1,
            x2: 9,
            y2: 9,
            audio_file: "c.mp3".into(),
            id: None,
            extra: Map::new(),
        };
        let idx = doc.add_element(new);
        assert_eq!(doc.page_elements(1).unwrap().len(), 2);
        assert!(doc.element(idx).unwrap().id.is_some());
        doc.remove_element(idx).unwrap();
        assert_eq!(doc.page_elements(1).unwrap().len(), 1);
    }
}
