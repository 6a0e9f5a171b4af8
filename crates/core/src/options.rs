//! Derivation of the displayable choice tiles from the latest model reply.

use crate::contract::ModelReply;
use crate::intent::UniversalIntent;
use serde::{Deserialize, Serialize};

/// Generic speech-bubble glyph shown when a suggestion has no emoji.
pub const FALLBACK_GLYPH: &str = "🗨️";
/// Tile offered when the model returned no usable suggestions at all, so the
/// user always has a way to continue.
pub const DEFAULT_GREETING_GLYPH: &str = "🤝";
pub const DEFAULT_GREETING_MEANING: &str = "Hej";

/// Which kind of tiles the user has chosen to interact with.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum InputModality {
    Text,
    Pictorial,
}

/// One renderable, selectable choice. Ephemeral: rebuilt from the latest
/// reply every turn, never persisted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OptionTile {
    /// What the tile shows (text or emoji).
    pub display: String,
    /// What selecting the tile says; never empty when the underlying
    /// suggestion has text.
    pub meaning: String,
    /// Set only on the four universal quick-response tiles.
    pub intent: Option<UniversalIntent>,
}

/// At most this many generic-glyph tiles when the reply carried no emojis.
pub const FALLBACK_TILE_LIMIT: usize = 5;

/// Builds the option tiles for a reply under the given modality.
///
/// Text modality mirrors the text suggestions exactly, one tile per
/// suggestion with display equal to meaning, possibly none. Pictorial
/// modality pairs emoji and text positionally; with no emojis at all the
/// text suggestions become a list of [`FALLBACK_GLYPH`] tiles capped at
/// [`FALLBACK_TILE_LIMIT`], and with nothing usable a single default
/// greeting tile is emitted. Pure and deterministic in its two inputs.
pub fn build_options(reply: &ModelReply, modality: InputModality) -> Vec<OptionTile> {
    let mut tiles = Vec::new();
    match modality {
        InputModality::Text => {
            for text in &reply.text_suggestions {
                tiles.push(OptionTile {
                    display: text.clone(),
                    meaning: text.clone(),
                    intent: None,
                });
            }
        }
        InputModality::Pictorial => {
            if reply.emoji_suggestions.is_empty() {
                for text in reply.text_suggestions.iter().take(FALLBACK_TILE_LIMIT) {
                    tiles.push(OptionTile {
                        display: FALLBACK_GLYPH.to_string(),
                        meaning: text.clone(),
                        intent: None,
                    });
                }
            } else {
                let count = reply
                    .text_suggestions
                    .len()
                    .max(reply.emoji_suggestions.len());
                for i in 0..count {
                    let text = reply.text_suggestions.get(i).map_or("", String::as_str);
                    let emoji = reply.emoji_suggestions.get(i).map_or("", String::as_str);
                    let display = if emoji.is_empty() { FALLBACK_GLYPH } else { emoji };
                    let meaning = if text.is_empty() { display } else { text };
                    tiles.push(OptionTile {
                        display: display.to_string(),
                        meaning: meaning.to_string(),
                        intent: None,
                    });
                }
            }
            // The pictorial surface always offers at least one tile.
            if tiles.is_empty() {
                tiles.push(OptionTile {
                    display: DEFAULT_GREETING_GLYPH.to_string(),
                    meaning: DEFAULT_GREETING_MEANING.to_string(),
                    intent: None,
                });
            }
        }
    }
    tiles
}

/// The four fixed quick-response tiles, shown alongside every option set.
pub fn universal_tiles() -> Vec<OptionTile> {
    UniversalIntent::ALL
        .iter()
        .map(|&intent| OptionTile {
            display: intent.glyph().to_string(),
            meaning: intent.meaning().to_string(),
            intent: Some(intent),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reply(texts: &[&str], emojis: &[&str]) -> ModelReply {
        ModelReply {
            assistant_reply: "Hej".to_string(),
            text_suggestions: texts.iter().map(|s| s.to_string()).collect(),
            emoji_suggestions: emojis.iter().map(|s| s.to_string()).collect(),
        }
    }

    #[test]
    fn text_modality_mirrors_suggestions() {
        let tiles = build_options(&reply(&["Mælk", "Brød", "Nej tak"], &[]), InputModality::Text);
        assert_eq!(tiles.len(), 3);
        for (tile, expected) in tiles.iter().zip(["Mælk", "Brød", "Nej tak"]) {
            assert_eq!(tile.display, expected);
            assert_eq!(tile.meaning, expected);
            assert_eq!(tile.intent, None);
        }
    }

    #[test]
    fn pictorial_pairs_positionally() {
        let tiles = build_options(
            &reply(&["Mælk", "Brød"], &["🥛", "🍞"]),
            InputModality::Pictorial,
        );
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].display, "🥛");
        assert_eq!(tiles[0].meaning, "Mælk");
        assert_eq!(tiles[1].display, "🍞");
        assert_eq!(tiles[1].meaning, "Brød");
    }

    #[test]
    fn missing_emojis_fall_back_to_generic_glyph() {
        let tiles = build_options(
            &reply(&["Mælk", "Brød", "Ost"], &[]),
            InputModality::Pictorial,
        );
        assert_eq!(tiles.len(), 3);
        for (tile, text) in tiles.iter().zip(["Mælk", "Brød", "Ost"]) {
            assert_eq!(tile.display, FALLBACK_GLYPH);
            assert_eq!(tile.meaning, text);
        }
    }

    #[test]
    fn glyph_fallback_list_is_capped() {
        let texts: Vec<String> = (1..=8).map(|i| format!("Svar {i}")).collect();
        let texts: Vec<&str> = texts.iter().map(String::as_str).collect();
        let tiles = build_options(&reply(&texts, &[]), InputModality::Pictorial);
        assert_eq!(tiles.len(), FALLBACK_TILE_LIMIT);
        assert!(tiles.iter().all(|t| t.display == FALLBACK_GLYPH));
        assert_eq!(tiles[4].meaning, "Svar 5");
    }

    #[test]
    fn empty_pictorial_reply_yields_default_greeting_tile() {
        let tiles = build_options(&reply(&[], &[]), InputModality::Pictorial);
        assert_eq!(tiles.len(), 1);
        assert_eq!(tiles[0].display, DEFAULT_GREETING_GLYPH);
        assert_eq!(tiles[0].meaning, DEFAULT_GREETING_MEANING);
    }

    #[test]
    fn empty_text_reply_yields_no_tiles() {
        let tiles = build_options(&ModelReply::default(), InputModality::Text);
        assert!(tiles.is_empty());
    }

    #[test]
    fn emoji_without_text_keeps_the_emoji_as_meaning() {
        let tiles = build_options(&reply(&[], &["🥛", "🍞"]), InputModality::Pictorial);
        assert_eq!(tiles.len(), 2);
        assert_eq!(tiles[0].display, "🥛");
        assert_eq!(tiles[0].meaning, "🥛");
    }

    #[test]
    fn universal_tiles_carry_intent_tags() {
        let tiles = universal_tiles();
        assert_eq!(tiles.len(), 4);
        assert_eq!(tiles[0].display, "🆘");
        assert_eq!(tiles[0].meaning, "Hjælp");
        assert_eq!(tiles[0].intent, Some(UniversalIntent::Help));
        assert!(tiles.iter().all(|t| t.intent.is_some()));
    }
}
