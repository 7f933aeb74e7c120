use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier of a binary attachment referenced by image elements
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FileId(String);

impl FileId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FileId {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

/// Kind of a drawing element
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ElementKind {
    Rectangle,
    Ellipse,
    Diamond,
    Line,
    Arrow,
    Freedraw,
    Text,
    Image,
    Frame,
}

/// A single vector element of a drawing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Element {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ElementKind,
    pub x: f64,
    pub y: f64,
    #[serde(default)]
    pub width: f64,
    #[serde(default)]
    pub height: f64,
    #[serde(default)]
    pub angle: f64,
    #[serde(default = "default_stroke_color")]
    pub stroke_color: String,
    #[serde(default = "default_background_color")]
    pub background_color: String,
    #[serde(default = "default_opacity")]
    pub opacity: u8,
    /// Per-element edit counter maintained by the editor
    #[serde(default)]
    pub version: u32,
    #[serde(default)]
    pub is_deleted: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub points: Vec<[f64; 2]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_id: Option<FileId>,
}

fn default_stroke_color() -> String {
    "#1e1e1e".to_string()
}

fn default_background_color() -> String {
    "transparent".to_string()
}

fn default_opacity() -> u8 {
    100
}

impl Element {
    /// Create an element with default styling
    pub fn new(id: impl Into<String>, kind: ElementKind, x: f64, y: f64) -> Self {
        Self {
            id: id.into(),
            kind,
            x,
            y,
            width: 0.0,
            height: 0.0,
            angle: 0.0,
            stroke_color: default_stroke_color(),
            background_color: default_background_color(),
            opacity: default_opacity(),
            version: 1,
            is_deleted: false,
            text: None,
            points: Vec::new(),
            file_id: None,
        }
    }

    /// Create an image element pointing at an attachment
    pub fn image(id: impl Into<String>, file_id: FileId, x: f64, y: f64) -> Self {
        Self {
            file_id: Some(file_id),
            ..Self::new(id, ElementKind::Image, x, y)
        }
    }

    pub fn with_size(mut self, width: f64, height: f64) -> Self {
        self.width = width;
        self.height = height;
        self
    }

    pub fn with_text(mut self, text: impl Into<String>) -> Self {
        self.text = Some(text.into());
        self
    }

    /// The attachment this element renders, if it is an initialized image
    pub fn referenced_file(&self) -> Option<&FileId> {
        match self.kind {
            ElementKind::Image => self.file_id.as_ref(),
            _ => None,
        }
    }
}

/// Color theme of the editor
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// Persisted subset of the editor's view state
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct ViewState {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub theme: Option<Theme>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub view_background_color: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zoom: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_x: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scroll_y: Option<f64>,
}

/// Metadata describing an attachment without its bytes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct FileManifest {
    pub mime_type: String,
    /// Milliseconds since the Unix epoch
    pub created: i64,
}

/// Binary attachment with its bytes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BinaryFile {
    pub id: FileId,
    pub mime_type: String,
    pub created: i64,
    pub data: Vec<u8>,
}

impl BinaryFile {
    pub fn new(id: FileId, mime_type: impl Into<String>, data: Vec<u8>) -> Self {
        Self {
            id,
            mime_type: mime_type.into(),
            created: chrono::Utc::now().timestamp_millis(),
            data,
        }
    }

    pub fn manifest(&self) -> FileManifest {
        FileManifest {
            mime_type: self.mime_type.clone(),
            created: self.created,
        }
    }
}

/// An in-memory drawing: elements, view state and attachments
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Scene {
    pub elements: Vec<Element>,
    pub view: ViewState,
    pub files: BTreeMap<FileId, BinaryFile>,
}

impl Scene {
    pub fn new(elements: Vec<Element>, view: ViewState) -> Self {
        Self {
            elements,
            view,
            files: BTreeMap::new(),
        }
    }

    pub fn with_file(mut self, file: BinaryFile) -> Self {
        self.files.insert(file.id.clone(), file);
        self
    }

    /// Whether the scene holds any visible content
    pub fn has_content(&self) -> bool {
        self.elements.iter().any(|e| !e.is_deleted)
    }

    /// Attachment ids referenced by image elements
    pub fn referenced_file_ids(&self) -> BTreeSet<FileId> {
        self.elements
            .iter()
            .filter_map(Element::referenced_file)
            .cloned()
            .collect()
    }

    /// Attachments that are both referenced and present in the file map
    pub fn referenced_files(&self) -> BTreeMap<FileId, &BinaryFile> {
        self.referenced_file_ids()
            .into_iter()
            .filter_map(|id| self.files.get(&id).map(|file| (id, file)))
            .collect()
    }

    /// Manifest of the attachments that travel with the payload
    pub fn manifest(&self) -> BTreeMap<FileId, FileManifest> {
        self.referenced_files()
            .into_iter()
            .map(|(id, file)| (id, file.manifest()))
            .collect()
    }

    /// Normalize a freshly decoded scene: deleted elements are dropped
    pub fn restore(mut self) -> Self {
        self.elements.retain(|e| !e.is_deleted);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn png(id: &str) -> BinaryFile {
        BinaryFile::new(FileId::new(id), "image/png", vec![0x89, 0x50, 0x4e, 0x47])
    }

    #[test]
    fn test_element_defaults_on_deserialize() {
        let json = r#"{"id":"a","type":"rectangle","x":1.0,"y":2.0}"#;
        let element: Element = serde_json::from_str(json).unwrap();
        assert_eq!(element.kind, ElementKind::Rectangle);
        assert_eq!(element.stroke_color, "#1e1e1e");
        assert_eq!(element.background_color, "transparent");
        assert_eq!(element.opacity, 100);
        assert!(!element.is_deleted);
    }

    #[test]
    fn test_element_rejects_unknown_kind() {
        let json = r#"{"id":"a","type":"hexagon","x":1.0,"y":2.0}"#;
        assert!(serde_json::from_str::<Element>(json).is_err());
    }

    #[test]
    fn test_element_rejects_unknown_fields() {
        let json = r#"{"id":"a","type":"text","x":1.0,"y":2.0,"fontFamily":5}"#;
        assert!(serde_json::from_str::<Element>(json).is_err());
    }

    #[test]
    fn test_element_camel_case() {
        let element = Element::image("img", FileId::new("f1"), 0.0, 0.0);
        let json = serde_json::to_value(&element).unwrap();
        assert_eq!(json["type"], "image");
        assert_eq!(json["fileId"], "f1");
        assert_eq!(json["strokeColor"], "#1e1e1e");
    }

    #[test]
    fn test_referenced_files() {
        let mut text = Element::new("t", ElementKind::Text, 0.0, 0.0);
        // Only image elements reference attachments
        text.file_id = Some(FileId::new("ignored"));

        let scene = Scene::new(
            vec![
                Element::image("i1", FileId::new("f1"), 0.0, 0.0),
                Element::image("i2", FileId::new("f2"), 0.0, 0.0),
                text,
            ],
            ViewState::default(),
        )
        .with_file(png("f1"))
        .with_file(png("unused"));

        let ids = scene.referenced_file_ids();
        assert_eq!(ids.len(), 2);
        assert!(ids.contains(&FileId::new("f2")));

        let files = scene.referenced_files();
        assert_eq!(files.len(), 1);
        assert!(files.contains_key(&FileId::new("f1")));
        assert_eq!(scene.manifest().len(), 1);
    }

    #[test]
    fn test_has_content_ignores_deleted() {
        let mut element = Element::new("a", ElementKind::Ellipse, 0.0, 0.0);
        element.is_deleted = true;
        let scene = Scene::new(vec![element], ViewState::default());
        assert!(!scene.has_content());
        assert!(Scene::default().elements.is_empty());
    }

    #[test]
    fn test_restore_drops_deleted() {
        let mut gone = Element::new("gone", ElementKind::Line, 0.0, 0.0);
        gone.is_deleted = true;
        let scene = Scene::new(
            vec![Element::new("kept", ElementKind::Arrow, 0.0, 0.0), gone],
            ViewState::default(),
        )
        .restore();
        assert_eq!(scene.elements.len(), 1);
        assert_eq!(scene.elements[0].id, "kept");
    }
}
