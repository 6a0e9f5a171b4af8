//! The four universal quick-response intents available regardless of
//! scenario.
//!
//! The escape hatch is encoded as a tagged string inside free text rather
//! than a structured side-channel, so the model can recognize it with
//! nothing but its fixed policy prompt. The tag format is load-bearing and
//! must match the policy; it is produced in exactly one place
//! ([`UniversalIntent::to_model_text`]).

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum UniversalIntent {
    Help,
    Confused,
    Yes,
    No,
}

impl UniversalIntent {
    pub const ALL: [UniversalIntent; 4] = [
        UniversalIntent::Help,
        UniversalIntent::Confused,
        UniversalIntent::Yes,
        UniversalIntent::No,
    ];

    /// The machine-parseable tag the policy prompt keys on.
    pub fn tag(self) -> &'static str {
        match self {
            UniversalIntent::Help => "HELP",
            UniversalIntent::Confused => "CONFUSED",
            UniversalIntent::Yes => "YES",
            UniversalIntent::No => "NO",
        }
    }

    /// The glyph shown on the intent's tile.
    pub fn glyph(self) -> &'static str {
        match self {
            UniversalIntent::Help => "🆘",
            UniversalIntent::Confused => "😕",
            UniversalIntent::Yes => "👍",
            UniversalIntent::No => "👎",
        }
    }

    /// The natural-language meaning, spoken on hover and sent to the model.
    pub fn meaning(self) -> &'static str {
        match self {
            UniversalIntent::Help => "Hjælp",
            UniversalIntent::Confused => "Forstår ikke",
            UniversalIntent::Yes => "Ja",
            UniversalIntent::No => "Nej",
        }
    }

    /// Formats the intent as the tagged string recorded in the history and
    /// sent to the model, e.g. `<meta:HELP> Hjælp`.
    pub fn to_model_text(self) -> String {
        format!("<meta:{}> {}", self.tag(), self.meaning())
    }
}
