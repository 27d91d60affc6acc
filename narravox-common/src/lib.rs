//! # Narravox shared library (narravox-common)
//!
//! Types shared between the narration engine and any host integration:
//! error type, event bus, emotion codes, typed settings, and the voice
//! registry.

pub mod emotion;
pub mod error;
pub mod events;
pub mod settings;
pub mod voice;

pub use emotion::EmotionCode;
pub use error::{Error, Result};
pub use events::{EventBus, NarrationEvent, SkipReason};
pub use settings::{ActionHandling, Settings, SettingsStore};
pub use voice::{AudioVariant, Voice, VoiceRegistry};
