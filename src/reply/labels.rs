//! Spoken labels for bot reactions

/// Known reaction emoji and their Hebrew descriptions for TTS
const REACTION_LABELS: &[(&str, &str)] = &[
    ("👍", "אישור"),
    ("✅", "בוצע"),
    ("❤️", "לב"),
    ("😂", "צחוק"),
    ("😮", "הפתעה"),
    ("😢", "עצוב"),
    ("🙏", "תודה"),
];

/// Look up the spoken label for a reaction emoji
///
/// Unknown emoji are their own label.
#[must_use]
pub fn reaction_label(emoji: &str) -> &str {
    REACTION_LABELS
        .iter()
        .find(|(known, _)| *known == emoji)
        .map_or(emoji, |(_, label)| *label)
}
