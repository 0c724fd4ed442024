//! Voice model discovery and model card parsing.
//!
//! A voice is a pair of files in a scanned directory: `<id>.onnx` (the
//! model) and `<id>.onnx.json` (the card). Cards missing optional
//! fields get sensible defaults; unreadable cards are logged and
//! skipped rather than failing the scan.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

/// A discovered, usable voice model.
#[derive(Debug, Clone, Serialize)]
pub struct VoiceModel {
    pub id: String,
    pub name: String,
    pub description: String,
    pub language: String,
    #[serde(rename = "voiceprompt")]
    pub voice_prompt: String,
    #[serde(rename = "jsonPath")]
    pub json_path: PathBuf,
    #[serde(rename = "onnxPath")]
    pub onnx_path: PathBuf,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Ordered find/replace pairs applied to request text.
    pub replacements: Vec<(String, String)>,
    pub source: PathBuf,
}

#[derive(Debug, Default, Deserialize)]
struct ModelData {
    #[serde(default)]
    modelcard: ModelCard,
}

#[derive(Debug, Default, Deserialize)]
struct ModelCard {
    #[serde(default)]
    id: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    language: String,
    #[serde(default)]
    voiceprompt: String,
    #[serde(default)]
    image: String,
    #[serde(default)]
    replacements: Vec<Vec<String>>,
}

/// Replacements applied when a card does not define any.
fn default_replacements() -> Vec<(String, String)> {
    vec![
        ("\n".to_string(), " . ".to_string()),
        ("*".to_string(), String::new()),
        (")".to_string(), ",".to_string()),
    ]
}

/// Scan the given directories for `.onnx.json` cards with a sibling
/// `.onnx` model.
pub fn scan_models(paths: &[PathBuf]) -> Vec<VoiceModel> {
    let mut models = Vec::new();
    for dir in paths {
        debug!(dir = %dir.display(), "scanning model directory");
        let entries = match std::fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) => {
                debug!(dir = %dir.display(), error = %e, "model directory not readable");
                continue;
            }
        };
        for entry in entries.flatten() {
            let file_name = entry.file_name().to_string_lossy().into_owned();
            if !file_name.ends_with(".onnx.json") {
                continue;
            }
            let json_path = entry.path();
            let onnx_path = dir.join(file_name.trim_end_matches(".json"));
            if !onnx_path.is_file() {
                warn!(card = %json_path.display(), "missing .onnx companion, skipping");
                continue;
            }
            match load_model(&json_path, &onnx_path, dir) {
                Ok(model) => {
                    info!(id = %model.id, language = %model.language, "found model");
                    models.push(model);
                }
                Err(e) => warn!(card = %json_path.display(), error = %e, "unreadable model card"),
            }
        }
    }
    info!(count = models.len(), "model scan complete");
    models
}

fn load_model(json_path: &Path, onnx_path: &Path, source: &Path) -> anyhow::Result<VoiceModel> {
    let raw = std::fs::read_to_string(json_path)?;
    let data: ModelData = serde_json::from_str(&raw)?;
    let card = data.modelcard;

    let id = if card.id.is_empty() {
        json_path
            .file_name()
            .map(|n| n.to_string_lossy().trim_end_matches(".onnx.json").to_string())
            .unwrap_or_default()
    } else {
        card.id
    };
    let name = if card.name.is_empty() { id.clone() } else { card.name };

    let replacements: Vec<(String, String)> = card
        .replacements
        .iter()
        .filter(|pair| pair.len() >= 2)
        .map(|pair| (pair[0].clone(), pair[1].clone()))
        .collect();
    let replacements = if replacements.is_empty() {
        default_replacements()
    } else {
        replacements
    };

    Ok(VoiceModel {
        id,
        name,
        description: or_default(card.description, "No description available"),
        language: or_default(card.language, "Unknown"),
        voice_prompt: or_default(card.voiceprompt, "Not available"),
        json_path: json_path.to_path_buf(),
        onnx_path: onnx_path.to_path_buf(),
        image: extract_image_payload(&card.image),
        replacements,
        source: source.to_path_buf(),
    })
}

fn or_default(value: String, fallback: &str) -> String {
    if value.is_empty() {
        fallback.to_string()
    } else {
        value
    }
}

/// Cards embed the image as a data URI; keep only the base64 payload.
fn extract_image_payload(image: &str) -> Option<String> {
    if image.is_empty() {
        return None;
    }
    match image.split_once("base64,") {
        Some((_, payload)) => Some(payload.to_string()),
        None => Some(image.to_string()),
    }
}

/// Look a model up by the `.onnx` path a request referenced.
pub fn find_by_onnx_path<'a>(models: &'a [VoiceModel], onnx_path: &str) -> Option<&'a VoiceModel> {
    models
        .iter()
        .find(|model| model.onnx_path == Path::new(onnx_path))
}
