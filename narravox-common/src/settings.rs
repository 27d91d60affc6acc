//! Typed configuration for the narration engine
//!
//! All persisted parameters live in a single `Settings` struct loaded from a
//! TOML file. Mutation goes through [`SettingsStore::update`], which emits a
//! `SettingsChanged` event so derived state (prompt instructions, scheduler
//! pacing) can be recomputed instead of being patched field by field.

use crate::error::{Error, Result};
use crate::events::{EventBus, NarrationEvent};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{debug, info};

/// How action-kind segments are voiced
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionHandling {
    /// Speak actions with the narrator voice
    Narrator,
    /// Skip action segments entirely
    Silence,
}

impl Default for ActionHandling {
    fn default() -> Self {
        ActionHandling::Narrator
    }
}

/// Engine configuration
///
/// Field defaults match the values a fresh installation starts with; any
/// subset may be present in the config file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// Master switch; when false the engine ignores host events
    pub enabled: bool,

    /// API key for the cloud synthesis backend
    pub api_key: String,

    /// Route synthesis requests to a local server instead of the cloud
    pub use_local_api: bool,

    /// Base URL of the local synthesis server
    pub local_api_url: String,

    /// Base URL of the cloud synthesis service
    pub cloud_api_url: String,

    /// Synthesis model identifier
    pub model: String,

    /// Spoken language (ISO code understood by the synthesis service)
    pub language_iso_code: String,

    /// Speaking rate, valid range [5.0, 35.0]
    pub speaking_rate: f32,

    /// Voice quality score, hybrid model only, valid range [0.6, 0.8]
    pub vqscore: f32,

    /// Speaker denoising, hybrid model only
    pub speaker_noised: bool,

    /// Skip narrator-kind segments entirely
    pub disable_narrator: bool,

    /// Whether action-kind segments are narrated or silenced
    pub action_handling: ActionHandling,

    /// Replace narrator/action emotion vectors with pure neutral
    pub force_neutral_narrator: bool,

    /// Maximum segments fetched speculatively ahead of the playhead,
    /// valid range [1, 10]
    pub max_preload: usize,

    /// Pause between the end of one segment and the start of the next,
    /// in seconds, valid range [0.0, 2.0]
    pub segment_gap: f32,

    /// Segment and speak streaming generations as they arrive
    pub auto_generation: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            enabled: false,
            api_key: String::new(),
            use_local_api: true,
            local_api_url: "http://localhost:8181".to_string(),
            cloud_api_url: "https://api.zyphra.com".to_string(),
            model: "zonos-v0.1-hybrid".to_string(),
            language_iso_code: "en-us".to_string(),
            speaking_rate: 15.0,
            vqscore: 0.78,
            speaker_noised: false,
            disable_narrator: false,
            action_handling: ActionHandling::default(),
            force_neutral_narrator: false,
            max_preload: 5,
            segment_gap: 0.5,
            auto_generation: false,
        }
    }
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let settings: Settings = toml::from_str(&content)?;
        debug!("Loaded settings from {}", path.display());
        Ok(settings)
    }

    /// Save settings to a TOML file, creating parent directories
    pub fn save(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = toml::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        debug!("Saved settings to {}", path.display());
        Ok(())
    }

    /// Base URL of the selected synthesis backend
    pub fn synthesis_base_url(&self) -> &str {
        if self.use_local_api {
            &self.local_api_url
        } else {
            &self.cloud_api_url
        }
    }

    /// Whether the hybrid model's extra tuning fields apply
    pub fn is_hybrid_model(&self) -> bool {
        self.model == "zonos-v0.1-hybrid"
    }
}

/// Config file resolution following priority order:
/// 1. Explicit path argument (highest priority)
/// 2. `NARRAVOX_CONFIG` environment variable
/// 3. Platform config directory (`<config_dir>/narravox/config.toml`)
///
/// Returns the first existing candidate, or the platform default path (which
/// may not exist yet) when none do.
pub fn resolve_config_path(explicit: Option<&Path>) -> PathBuf {
    if let Some(path) = explicit {
        return path.to_path_buf();
    }

    if let Ok(path) = std::env::var("NARRAVOX_CONFIG") {
        return PathBuf::from(path);
    }

    default_config_path()
}

/// Platform default config file path
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("narravox")
        .join("config.toml")
}

/// Shared, mutable settings handle
///
/// Read-frequently, write-rarely. Reads take a snapshot; writes go through
/// [`SettingsStore::update`] and notify subscribers via the event bus.
#[derive(Clone)]
pub struct SettingsStore {
    inner: Arc<RwLock<Settings>>,
    events: EventBus,
}

impl SettingsStore {
    pub fn new(settings: Settings, events: EventBus) -> Self {
        Self {
            inner: Arc::new(RwLock::new(settings)),
            events,
        }
    }

    /// Load from the resolved config path, falling back to defaults when no
    /// file exists
    pub fn load_or_default(path: &Path, events: EventBus) -> Self {
        let settings = if path.exists() {
            match Settings::load(path) {
                Ok(s) => s,
                Err(e) => {
                    tracing::warn!("Failed to load settings from {}: {}", path.display(), e);
                    Settings::default()
                }
            }
        } else {
            info!(
                "No settings file at {}, using defaults",
                path.display()
            );
            Settings::default()
        };
        Self::new(settings, events)
    }

    /// Snapshot of the current settings
    pub fn get(&self) -> Settings {
        self.inner.read().expect("settings lock poisoned").clone()
    }

    /// Apply a mutation and notify subscribers
    pub fn update<F: FnOnce(&mut Settings)>(&self, f: F) {
        {
            let mut guard = self.inner.write().expect("settings lock poisoned");
            f(&mut guard);
        }
        self.events.emit_lossy(NarrationEvent::SettingsChanged {
            timestamp: chrono::Utc::now(),
        });
    }
}

impl std::fmt::Debug for SettingsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SettingsStore").finish_non_exhaustive()
    }
}
