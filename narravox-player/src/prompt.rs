//! Prompt instruction block
//!
//! Renders the marker-grammar instructions the host injects into the
//! outbound LLM prompt, including the currently configured character/voice
//! list.

use narravox_common::voice::VoiceRegistry;

const CHARACTER_LIST_PLACEHOLDER: &str = "{{CHARACTER_LIST}}";

const INSTRUCTIONS_TEMPLATE: &str = r#"
-----

!!! IMPORTANT TTS INSTRUCTIONS !!!

The following are instructions for inserting TTS markers into your responses. You will ALWAYS insert these TTS markers in the text.
Read them VERY carefully and follow them to the letter:

AVAILABLE CHARACTERS AND VOICE FILES:
{{CHARACTER_LIST}}

MARKER EXPLANATION:
- §n|voiceFile.mp3|emotionValues§ = Narrator speaking
- §a§ = Action description (Another narrator but without the emotion values)
- §c:CharacterName|voiceFile.mp3|emotionValues§ = Character speaking

EMOTION VALUES EXPLANATION:
- e1: Happiness (0.0-1.0)
- e2: Sadness (0.0-1.0)
- e3: Disgust (0.0-1.0)
- e4: Fear (0.0-1.0)
- e5: Surprise (0.0-1.0)
- e6: Anger (0.0-1.0)
- e7: Other (0.0-1.0)
- e8: Neutral (0.0-1.0)

EXAMPLE:
*§n|narrator.mp3|e1:0.1,e8:0.9§The sun was setting over the quiet village as the travelers approached the inn.*

"§c:Elara|female_young.mp3|e1:0.7,e5:0.3§Welcome to Rivermist Inn!" *§a§she says with a warm smile, gesturing toward the entrance.* "§c:Elara§We have rooms available if you're looking to stay the night."

When inserting these markers:
- Place them exactly where the narration, action, or dialogue begins
- Use the complete format for the first appearance of each character
- For subsequent appearances, you can use shorter versions like §c:CharacterName§ if the voice and emotions remain the same
- Don't place markers inside quotes unless the marker itself is for dialogue
- Use appropriate emotion values based on the context
- If a character in a marker is not found from the given list above, it will default to Narrator + default.mp3
- If a given voice file is not found from the given list above / doesn't correspond with the character, it will default to default.mp3
- If the only available character is Narrator, just use it for everything

-----
"#;

/// Render the instruction block for the configured voices
pub fn instructions(voices: &VoiceRegistry) -> String {
    let list = voices.character_list();
    let list = if list.is_empty() {
        "Narrator - default.mp3".to_string()
    } else {
        list
    };
    INSTRUCTIONS_TEMPLATE.replace(CHARACTER_LIST_PLACEHOLDER, &list)
}
