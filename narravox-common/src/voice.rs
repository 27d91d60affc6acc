//! Voice registry
//!
//! Per-character voice records with named audio variants (raw sample bytes,
//! original file name, duration). The registry guarantees a `"narrator"`
//! voice with a `"default"` variant at all times; neither can be deleted or
//! renamed. Persisted as JSON with base64-encoded sample data.

use crate::error::{Error, Result};
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::Path;
use tracing::{debug, warn};

/// The reserved voice id that always exists
pub const NARRATOR_VOICE_ID: &str = "narrator";

/// The reserved variant name that always exists per voice
pub const DEFAULT_VARIANT: &str = "default";

/// The display name of the narrator voice
pub const NARRATOR_NAME: &str = "Narrator";

/// One stored audio sample for a voice
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AudioVariant {
    /// Raw audio bytes (any container the synthesis service accepts)
    #[serde(with = "b64_bytes", default)]
    pub data: Option<Vec<u8>>,

    /// Original file name, for display
    pub file_name: Option<String>,

    /// Sample duration in seconds, when known
    pub duration_seconds: Option<f32>,
}

impl AudioVariant {
    /// Whether a sample has actually been uploaded
    pub fn has_data(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_empty()).unwrap_or(false)
    }
}

/// A configured character voice
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Voice {
    /// Stable identifier (registry key)
    pub id: String,

    /// Name the LLM refers to this voice by in markers
    pub display_name: String,

    /// Named audio variants; `"default"` always present
    pub variants: BTreeMap<String, AudioVariant>,
}

impl Voice {
    fn new(id: &str, display_name: &str) -> Self {
        let mut variants = BTreeMap::new();
        variants.insert(DEFAULT_VARIANT.to_string(), AudioVariant::default());
        Self {
            id: id.to_string(),
            display_name: display_name.to_string(),
            variants,
        }
    }
}

/// All configured voices, keyed by voice id
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VoiceRegistry {
    voices: BTreeMap<String, Voice>,
}

impl VoiceRegistry {
    /// New registry containing only the narrator voice
    pub fn new() -> Self {
        let mut voices = BTreeMap::new();
        voices.insert(
            NARRATOR_VOICE_ID.to_string(),
            Voice::new(NARRATOR_VOICE_ID, NARRATOR_NAME),
        );
        Self { voices }
    }

    /// Load from a JSON file, repairing the narrator/default invariants
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut registry: VoiceRegistry = serde_json::from_str(&content)?;
        registry.repair();
        debug!(
            "Loaded {} voices from {}",
            registry.voices.len(),
            path.display()
        );
        Ok(registry)
    }

    /// Load from a JSON file, falling back to a fresh registry
    pub fn load_or_default(path: &Path) -> Self {
        if path.exists() {
            match Self::load(path) {
                Ok(r) => return r,
                Err(e) => warn!("Failed to load voices from {}: {}", path.display(), e),
            }
        }
        Self::new()
    }

    /// Save to a JSON file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!("Saved {} voices to {}", self.voices.len(), path.display());
        Ok(())
    }

    /// Restore the invariants a hand-edited file may have broken
    fn repair(&mut self) {
        let narrator = self
            .voices
            .entry(NARRATOR_VOICE_ID.to_string())
            .or_insert_with(|| Voice::new(NARRATOR_VOICE_ID, NARRATOR_NAME));
        narrator.display_name = NARRATOR_NAME.to_string();
        for voice in self.voices.values_mut() {
            voice
                .variants
                .entry(DEFAULT_VARIANT.to_string())
                .or_insert_with(AudioVariant::default);
        }
    }

    /// Look up a voice by id
    pub fn get(&self, voice_id: &str) -> Option<&Voice> {
        self.voices.get(voice_id)
    }

    /// Linear scan for a voice whose display name matches exactly
    pub fn find_by_display_name(&self, name: &str) -> Option<&Voice> {
        self.voices.values().find(|v| v.display_name == name)
    }

    /// Sample bytes for `(voice_id, variant)`, if uploaded
    pub fn sample(&self, voice_id: &str, variant: &str) -> Option<&[u8]> {
        self.voices
            .get(voice_id)?
            .variants
            .get(variant)?
            .data
            .as_deref()
            .filter(|d| !d.is_empty())
    }

    /// Add a new character voice
    pub fn add_voice(&mut self, id: &str, display_name: &str) -> Result<()> {
        if self.voices.contains_key(id) {
            return Err(Error::Voice(format!("Voice '{}' already exists", id)));
        }
        self.voices
            .insert(id.to_string(), Voice::new(id, display_name));
        Ok(())
    }

    /// Remove a character voice; the narrator cannot be removed
    pub fn remove_voice(&mut self, id: &str) -> Result<()> {
        if id == NARRATOR_VOICE_ID {
            return Err(Error::Voice("Cannot delete the Narrator".to_string()));
        }
        self.voices
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| Error::Voice(format!("Voice '{}' not found", id)))
    }

    /// Rename a character voice; the narrator cannot be renamed
    pub fn rename_voice(&mut self, id: &str, display_name: &str) -> Result<()> {
        if id == NARRATOR_VOICE_ID {
            return Err(Error::Voice("Cannot rename the Narrator".to_string()));
        }
        let voice = self
            .voices
            .get_mut(id)
            .ok_or_else(|| Error::Voice(format!("Voice '{}' not found", id)))?;
        voice.display_name = display_name.to_string();
        Ok(())
    }

    /// Store a sample under a named variant, creating the variant if needed
    pub fn set_variant(&mut self, voice_id: &str, variant: &str, sample: AudioVariant) -> Result<()> {
        let voice = self
            .voices
            .get_mut(voice_id)
            .ok_or_else(|| Error::Voice(format!("Voice '{}' not found", voice_id)))?;
        voice.variants.insert(variant.to_string(), sample);
        Ok(())
    }

    /// Remove a variant; `"default"` cannot be removed
    pub fn remove_variant(&mut self, voice_id: &str, variant: &str) -> Result<()> {
        if variant == DEFAULT_VARIANT {
            return Err(Error::Voice("Cannot delete default audio".to_string()));
        }
        let voice = self
            .voices
            .get_mut(voice_id)
            .ok_or_else(|| Error::Voice(format!("Voice '{}' not found", voice_id)))?;
        voice
            .variants
            .remove(variant)
            .map(|_| ())
            .ok_or_else(|| Error::Voice(format!("Variant '{}' not found", variant)))
    }

    /// Rename a variant; `"default"` cannot be renamed
    pub fn rename_variant(&mut self, voice_id: &str, old: &str, new: &str) -> Result<()> {
        if old == DEFAULT_VARIANT {
            return Err(Error::Voice("Cannot rename default audio".to_string()));
        }
        let voice = self
            .voices
            .get_mut(voice_id)
            .ok_or_else(|| Error::Voice(format!("Voice '{}' not found", voice_id)))?;
        if voice.variants.contains_key(new) {
            return Err(Error::Voice(format!("Variant '{}' already exists", new)));
        }
        let sample = voice
            .variants
            .remove(old)
            .ok_or_else(|| Error::Voice(format!("Variant '{}' not found", old)))?;
        voice.variants.insert(new.to_string(), sample);
        Ok(())
    }

    /// All voices, for iteration
    pub fn voices(&self) -> impl Iterator<Item = &Voice> {
        self.voices.values()
    }

    /// One line per voice with uploaded samples, for prompt injection:
    /// `DisplayName - variant1.mp3, variant2.mp3`
    pub fn character_list(&self) -> String {
        let mut lines = Vec::new();
        for voice in self.voices.values() {
            let variants: Vec<String> = voice
                .variants
                .iter()
                .filter(|(_, v)| v.has_data())
                .map(|(name, _)| format!("{}.mp3", name))
                .collect();
            if !variants.is_empty() {
                lines.push(format!("{} - {}", voice.display_name, variants.join(", ")));
            }
        }
        lines.join("\n")
    }
}

impl Default for VoiceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Base64 (de)serialization for optional sample bytes
mod b64_bytes {
    use super::*;
    use serde::{Deserializer, Serializer};

    pub fn serialize<S: Serializer>(data: &Option<Vec<u8>>, ser: S) -> std::result::Result<S::Ok, S::Error> {
        match data {
            Some(bytes) => ser.serialize_some(&BASE64.encode(bytes)),
            None => ser.serialize_none(),
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        de: D,
    ) -> std::result::Result<Option<Vec<u8>>, D::Error> {
        let encoded: Option<String> = Option::deserialize(de)?;
        match encoded {
            Some(s) => BASE64
                .decode(s.as_bytes())
                .map(Some)
                .map_err(serde::de::Error::custom),
            None => Ok(None),
        }
    }
}
