//! Emotion codes carried by voice markers
//!
//! The marker grammar expresses affect as `<code>:<value>` pairs where the
//! code is one of eight fixed identifiers (e1..e8). Values are floats,
//! contractually in [0.0, 1.0] but never validated or clamped here.

use serde::{Deserialize, Serialize};

/// One of the eight fixed affect dimensions
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EmotionCode {
    E1,
    E2,
    E3,
    E4,
    E5,
    E6,
    E7,
    E8,
}

impl EmotionCode {
    /// All codes in grammar order
    pub const ALL: [EmotionCode; 8] = [
        EmotionCode::E1,
        EmotionCode::E2,
        EmotionCode::E3,
        EmotionCode::E4,
        EmotionCode::E5,
        EmotionCode::E6,
        EmotionCode::E7,
        EmotionCode::E8,
    ];

    /// Parse a grammar code string ("e1".."e8")
    ///
    /// Returns None for anything else; callers decide whether to keep the
    /// raw string (marker level) or drop it (segment level).
    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "e1" => Some(EmotionCode::E1),
            "e2" => Some(EmotionCode::E2),
            "e3" => Some(EmotionCode::E3),
            "e4" => Some(EmotionCode::E4),
            "e5" => Some(EmotionCode::E5),
            "e6" => Some(EmotionCode::E6),
            "e7" => Some(EmotionCode::E7),
            "e8" => Some(EmotionCode::E8),
            _ => None,
        }
    }

    /// The grammar code string for this emotion
    pub fn code(&self) -> &'static str {
        match self {
            EmotionCode::E1 => "e1",
            EmotionCode::E2 => "e2",
            EmotionCode::E3 => "e3",
            EmotionCode::E4 => "e4",
            EmotionCode::E5 => "e5",
            EmotionCode::E6 => "e6",
            EmotionCode::E7 => "e7",
            EmotionCode::E8 => "e8",
        }
    }

    /// The named affect used by the synthesis service
    pub fn affect_name(&self) -> &'static str {
        match self {
            EmotionCode::E1 => "happiness",
            EmotionCode::E2 => "sadness",
            EmotionCode::E3 => "disgust",
            EmotionCode::E4 => "fear",
            EmotionCode::E5 => "surprise",
            EmotionCode::E6 => "anger",
            EmotionCode::E7 => "other",
            EmotionCode::E8 => "neutral",
        }
    }
}

impl std::fmt::Display for EmotionCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.code())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_code_round_trip() {
        for code in EmotionCode::ALL {
            assert_eq!(EmotionCode::from_code(code.code()), Some(code));
        }
    }

    #[test]
    fn test_unknown_codes_rejected() {
        assert_eq!(EmotionCode::from_code("e9"), None);
        assert_eq!(EmotionCode::from_code("E1"), None);
        assert_eq!(EmotionCode::from_code(""), None);
        assert_eq!(EmotionCode::from_code("happiness"), None);
    }

    #[test]
    fn test_affect_names() {
        assert_eq!(EmotionCode::E1.affect_name(), "happiness");
        assert_eq!(EmotionCode::E6.affect_name(), "anger");
        assert_eq!(EmotionCode::E8.affect_name(), "neutral");
    }
}
