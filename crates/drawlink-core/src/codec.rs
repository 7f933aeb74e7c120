//! Compression and encryption of drawing payloads and attachments.
//!
//! Every sealed blob shares one container layout:
//!
//! ```text
//! "DLNK" | format version (u8) | kind (u8) | nonce (12 bytes) | ciphertext
//! ```
//!
//! The ciphertext is ChaCha20-Poly1305 over the zlib-compressed body, with the
//! six header bytes bound as associated data. A scene body is a JSON document;
//! an attachment body is a length-prefixed JSON header followed by raw bytes.

use std::collections::BTreeMap;
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chacha20poly1305::aead::{Aead, AeadCore, KeyInit, OsRng, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Key, Nonce};
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use serde::{Deserialize, Serialize};

use crate::error::CodecError;
use crate::scene::{BinaryFile, Element, FileId, FileManifest, Scene, ViewState};

const MAGIC: &[u8; 4] = b"DLNK";
const FORMAT_VERSION: u8 = 1;
const HEADER_LEN: usize = 6;
const NONCE_LEN: usize = 12;
const KEY_LEN: usize = 32;

/// Upper bound on a decompressed body
pub const MAX_DECODED_BYTES: usize = 64 * 1024 * 1024;

const DOCUMENT_TYPE: &str = "drawlink";
const DOCUMENT_VERSION: u32 = 2;
const DOCUMENT_SOURCE: &str = "drawlink-core";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
enum ContainerKind {
    Scene = 1,
    Attachment = 2,
}

/// Symmetric key shared by a drawing's payload and all of its attachments
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EncryptionKey([u8; KEY_LEN]);

impl EncryptionKey {
    /// Generate a fresh key from the operating system's RNG
    pub fn generate() -> Self {
        let key = ChaCha20Poly1305::generate_key(&mut OsRng);
        let mut bytes = [0u8; KEY_LEN];
        bytes.copy_from_slice(key.as_slice());
        Self(bytes)
    }

    pub fn from_bytes(bytes: [u8; KEY_LEN]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; KEY_LEN] {
        &self.0
    }

    fn cipher(&self) -> ChaCha20Poly1305 {
        ChaCha20Poly1305::new(Key::from_slice(&self.0))
    }
}

/// Shorthand for [`EncryptionKey::generate`]
pub fn generate_key() -> EncryptionKey {
    EncryptionKey::generate()
}

impl fmt::Debug for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("EncryptionKey(..)")
    }
}

impl fmt::Display for EncryptionKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&URL_SAFE_NO_PAD.encode(self.0))
    }
}

impl FromStr for EncryptionKey {
    type Err = CodecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let decoded = URL_SAFE_NO_PAD
            .decode(s.trim().as_bytes())
            .map_err(|_| CodecError::InvalidKey)?;
        let bytes: [u8; KEY_LEN] = decoded.try_into().map_err(|_| CodecError::InvalidKey)?;
        Ok(Self(bytes))
    }
}

impl TryFrom<String> for EncryptionKey {
    type Error = CodecError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<EncryptionKey> for String {
    fn from(key: EncryptionKey) -> Self {
        key.to_string()
    }
}

/// On-the-wire scene document; strict so structural drift fails closed
#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct SceneDocument {
    #[serde(rename = "type")]
    kind: String,
    version: u32,
    source: String,
    elements: Vec<Element>,
    app_state: ViewState,
    #[serde(default)]
    files: BTreeMap<FileId, FileManifest>,
}

#[derive(Serialize, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
struct AttachmentHeader {
    id: FileId,
    mime_type: String,
    created: i64,
}

/// Logical content recovered from a payload
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedScene {
    pub elements: Vec<Element>,
    pub view: ViewState,
    pub manifest: BTreeMap<FileId, FileManifest>,
}

impl DecodedScene {
    /// Scene without attachment bytes; those are fetched separately
    pub fn into_scene(self) -> Scene {
        Scene::new(self.elements, self.view)
    }
}

/// Compress and encrypt a scene's elements, view state and attachment manifest
pub fn encode(scene: &Scene, key: &EncryptionKey) -> Result<Vec<u8>, CodecError> {
    ensure_finite(scene)?;
    let document = SceneDocument {
        kind: DOCUMENT_TYPE.to_string(),
        version: DOCUMENT_VERSION,
        source: DOCUMENT_SOURCE.to_string(),
        elements: scene.elements.clone(),
        app_state: scene.view.clone(),
        files: scene.manifest(),
    };
    let body = serde_json::to_vec(&document).map_err(|e| CodecError::Schema(e.to_string()))?;
    seal(ContainerKind::Scene, &body, key)
}

// JSON has no NaN or infinity; serde_json would write them as `null`,
// which decode then rejects.
fn ensure_finite(scene: &Scene) -> Result<(), CodecError> {
    for element in &scene.elements {
        let bounds = [element.x, element.y, element.width, element.height, element.angle];
        let points = element.points.iter().flatten().copied();
        if !bounds.into_iter().chain(points).all(f64::is_finite) {
            return Err(CodecError::Schema(format!(
                "element `{}` has a non-finite coordinate",
                element.id
            )));
        }
    }

    let view = &scene.view;
    if ![view.zoom, view.scroll_x, view.scroll_y]
        .into_iter()
        .flatten()
        .all(f64::is_finite)
    {
        return Err(CodecError::Schema("view state has a non-finite number".into()));
    }
    Ok(())
}

/// Reverse [`encode`]
pub fn decode(bytes: &[u8], key: &EncryptionKey) -> Result<DecodedScene, CodecError> {
    let body = open(ContainerKind::Scene, bytes, key)?;
    let document: SceneDocument =
        serde_json::from_slice(&body).map_err(|e| CodecError::Schema(e.to_string()))?;

    if document.kind != DOCUMENT_TYPE {
        return Err(CodecError::Schema(format!(
            "unexpected document type `{}`",
            document.kind
        )));
    }
    if document.version > DOCUMENT_VERSION {
        return Err(CodecError::Schema(format!(
            "unsupported document version {}",
            document.version
        )));
    }

    Ok(DecodedScene {
        elements: document.elements,
        view: document.app_state,
        manifest: document.files,
    })
}

/// Compress and encrypt one attachment together with its metadata
pub fn encode_attachment(file: &BinaryFile, key: &EncryptionKey) -> Result<Vec<u8>, CodecError> {
    let header = AttachmentHeader {
        id: file.id.clone(),
        mime_type: file.mime_type.clone(),
        created: file.created,
    };
    let header = serde_json::to_vec(&header).map_err(|e| CodecError::Schema(e.to_string()))?;
    let header_len = u32::try_from(header.len()).map_err(|_| CodecError::TooLarge(u32::MAX as usize))?;

    let mut body = Vec::with_capacity(4 + header.len() + file.data.len());
    body.extend_from_slice(&header_len.to_be_bytes());
    body.extend_from_slice(&header);
    body.extend_from_slice(&file.data);
    seal(ContainerKind::Attachment, &body, key)
}

/// Reverse [`encode_attachment`]
pub fn decode_attachment(bytes: &[u8], key: &EncryptionKey) -> Result<BinaryFile, CodecError> {
    let body = open(ContainerKind::Attachment, bytes, key)?;
    if body.len() < 4 {
        return Err(CodecError::Truncated);
    }
    let (len_bytes, rest) = body.split_at(4);
    let header_len = u32::from_be_bytes([len_bytes[0], len_bytes[1], len_bytes[2], len_bytes[3]]) as usize;
    if rest.len() < header_len {
        return Err(CodecError::Truncated);
    }
    let (header, data) = rest.split_at(header_len);
    let header: AttachmentHeader =
        serde_json::from_slice(header).map_err(|e| CodecError::Schema(e.to_string()))?;

    Ok(BinaryFile {
        id: header.id,
        mime_type: header.mime_type,
        created: header.created,
        data: data.to_vec(),
    })
}

fn header(kind: ContainerKind) -> [u8; HEADER_LEN] {
    [MAGIC[0], MAGIC[1], MAGIC[2], MAGIC[3], FORMAT_VERSION, kind as u8]
}

fn seal(kind: ContainerKind, body: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CodecError> {
    let mut encoder = ZlibEncoder::new(Vec::new(), Compression::default());
    encoder.write_all(body).map_err(|_| CodecError::Encryption)?;
    let compressed = encoder.finish().map_err(|_| CodecError::Encryption)?;

    let header = header(kind);
    let nonce = ChaCha20Poly1305::generate_nonce(&mut OsRng);
    let ciphertext = key
        .cipher()
        .encrypt(
            &nonce,
            Payload {
                msg: &compressed,
                aad: &header,
            },
        )
        .map_err(|_| CodecError::Encryption)?;

    let mut out = Vec::with_capacity(HEADER_LEN + NONCE_LEN + ciphertext.len());
    out.extend_from_slice(&header);
    out.extend_from_slice(nonce.as_slice());
    out.extend_from_slice(&ciphertext);
    Ok(out)
}

fn open(kind: ContainerKind, bytes: &[u8], key: &EncryptionKey) -> Result<Vec<u8>, CodecError> {
    if bytes.len() < HEADER_LEN + NONCE_LEN {
        return Err(CodecError::Truncated);
    }
    let (head, rest) = bytes.split_at(HEADER_LEN);
    if head != header(kind).as_slice() {
        return Err(CodecError::UnknownFormat);
    }
    let (nonce, ciphertext) = rest.split_at(NONCE_LEN);

    let compressed = key
        .cipher()
        .decrypt(
            Nonce::from_slice(nonce),
            Payload {
                msg: ciphertext,
                aad: head,
            },
        )
        .map_err(|_| CodecError::Decryption)?;

    let mut body = Vec::new();
    ZlibDecoder::new(compressed.as_slice())
        .take(MAX_DECODED_BYTES as u64 + 1)
        .read_to_end(&mut body)
        .map_err(|_| CodecError::Decompression)?;
    if body.len() > MAX_DECODED_BYTES {
        return Err(CodecError::TooLarge(MAX_DECODED_BYTES));
    }
    Ok(body)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scene::{ElementKind, Theme};

    fn sample_scene() -> Scene {
        let view = ViewState {
            name: Some("Roadmap".into()),
            theme: Some(Theme::Dark),
            view_background_color: Some("#ffffff".into()),
            zoom: Some(1.5),
            ..ViewState::default()
        };
        Scene::new(
            vec![
                Element::new("r1", ElementKind::Rectangle, 10.0, 20.0).with_size(100.0, 50.0),
                Element::new("t1", ElementKind::Text, 0.0, 0.0).with_text("Q3 goals"),
                Element::image("i1", FileId::new("f1"), 5.0, 5.0),
            ],
            view,
        )
        .with_file(BinaryFile {
            id: FileId::new("f1"),
            mime_type: "image/png".into(),
            created: 1_700_000_000_000,
            data: vec![1, 2, 3, 4],
        })
    }

    #[test]
    fn test_scene_round_trip() {
        let key = generate_key();
        let scene = sample_scene();

        let bytes = encode(&scene, &key).unwrap();
        let decoded = decode(&bytes, &key).unwrap();

        assert_eq!(decoded.elements, scene.elements);
        assert_eq!(decoded.view, scene.view);
        assert_eq!(decoded.manifest, scene.manifest());
        // Attachment bytes never travel inside the payload
        assert!(decoded.into_scene().files.is_empty());
    }

    #[test]
    fn test_encoding_is_not_deterministic() {
        let key = generate_key();
        let scene = sample_scene();
        assert_ne!(encode(&scene, &key).unwrap(), encode(&scene, &key).unwrap());
    }

    #[test]
    fn test_wrong_key_fails() {
        let bytes = encode(&sample_scene(), &generate_key()).unwrap();
        assert_eq!(decode(&bytes, &generate_key()), Err(CodecError::Decryption));
    }

    #[test]
    fn test_tampered_payload_fails() {
        let key = generate_key();
        let mut bytes = encode(&sample_scene(), &key).unwrap();
        let last = bytes.len() - 1;
        bytes[last] ^= 0x01;
        assert_eq!(decode(&bytes, &key), Err(CodecError::Decryption));
    }

    #[test]
    fn test_truncated_payload_fails() {
        let key = generate_key();
        let bytes = encode(&sample_scene(), &key).unwrap();
        assert_eq!(decode(&bytes[..10], &key), Err(CodecError::Truncated));
        assert_eq!(decode(&bytes[..bytes.len() - 4], &key), Err(CodecError::Decryption));
        assert_eq!(decode(b"", &key), Err(CodecError::Truncated));
    }

    #[test]
    fn test_attachment_is_not_a_scene() {
        let key = generate_key();
        let file = BinaryFile::new(FileId::new("f1"), "image/png", vec![9; 32]);
        let bytes = encode_attachment(&file, &key).unwrap();
        assert_eq!(decode(&bytes, &key), Err(CodecError::UnknownFormat));
    }

    #[test]
    fn test_schema_mismatch_fails_closed() {
        let key = generate_key();
        let body = br#"{"type":"drawlink","version":2,"source":"x","elements":[{"id":"a"}],"appState":{}}"#;
        let bytes = seal(ContainerKind::Scene, body, &key).unwrap();
        assert!(matches!(decode(&bytes, &key), Err(CodecError::Schema(_))));

        let body = br#"{"type":"other","version":2,"source":"x","elements":[],"appState":{}}"#;
        let bytes = seal(ContainerKind::Scene, body, &key).unwrap();
        assert!(matches!(decode(&bytes, &key), Err(CodecError::Schema(_))));
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let key = generate_key();

        let mut scene = sample_scene();
        scene.elements[0].x = f64::NAN;
        assert!(matches!(encode(&scene, &key), Err(CodecError::Schema(ref m)) if m.contains("`r1`")));

        let mut scene = sample_scene();
        scene.elements[1].points = vec![[0.0, 0.0], [f64::INFINITY, 1.0]];
        assert!(matches!(encode(&scene, &key), Err(CodecError::Schema(_))));

        let mut scene = sample_scene();
        scene.view.scroll_y = Some(f64::NEG_INFINITY);
        assert!(matches!(encode(&scene, &key), Err(CodecError::Schema(_))));

        // Large but finite values survive
        let mut scene = sample_scene();
        scene.elements[0].width = 1.0e12;
        scene.view.scroll_x = Some(-4096.0);
        let decoded = decode(&encode(&scene, &key).unwrap(), &key).unwrap();
        assert_eq!(decoded.elements[0].width, 1.0e12);
        assert_eq!(decoded.view.scroll_x, Some(-4096.0));
    }

    #[test]
    fn test_attachment_round_trip() {
        let key = generate_key();
        let file = BinaryFile::new(FileId::new("photo"), "image/jpeg", vec![0xff, 0xd8, 0xff, 0x00]);
        let bytes = encode_attachment(&file, &key).unwrap();
        assert_eq!(decode_attachment(&bytes, &key).unwrap(), file);
        assert_eq!(decode_attachment(&bytes, &generate_key()), Err(CodecError::Decryption));
    }

    #[test]
    fn test_key_string_form() {
        let key = generate_key();
        let encoded = key.to_string();
        assert_eq!(encoded.len(), 43);
        assert_eq!(encoded.parse::<EncryptionKey>().unwrap(), key);

        assert_eq!("short".parse::<EncryptionKey>(), Err(CodecError::InvalidKey));
        assert_eq!("not base64 !!".parse::<EncryptionKey>(), Err(CodecError::InvalidKey));
        assert_eq!(format!("{:?}", key), "EncryptionKey(..)");
    }
}
