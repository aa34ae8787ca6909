//! Announcement phrasing
//!
//! Short, front-loaded phrases: the object first, then distance, then
//! direction, so the critical word lands even if the utterance is cut off.

/// Horizontal third of the image an entity occupies
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Position {
    Left,
    Center,
    Right,
}

impl Position {
    /// Classify a normalized center x coordinate into image thirds
    pub fn from_center_x(cx: f32) -> Self {
        if cx < 1.0 / 3.0 {
            Position::Left
        } else if cx < 2.0 / 3.0 {
            Position::Center
        } else {
            Position::Right
        }
    }

    pub fn phrase(&self) -> &'static str {
        match self {
            Position::Left => "on your left",
            Position::Center => "ahead",
            Position::Right => "on your right",
        }
    }
}

/// Coarse verbal distance category for an estimate in meters
pub fn distance_phrase(meters: f32) -> &'static str {
    if meters < 1.5 {
        "very close"
    } else if meters < 3.0 {
        "close"
    } else if meters < 6.0 {
        "nearby"
    } else {
        "in the distance"
    }
}

/// Phrase for a tracked entity, e.g. "person very close, ahead"
pub fn entity_phrase(label: &str, meters: f32, position: Position) -> String {
    format!("{} {}, {}", label, distance_phrase(meters), position.phrase())
}

/// Phrase for an approaching entity, e.g. "person approaching on your left"
pub fn approaching_phrase(label: &str, position: Position) -> String {
    format!("{} approaching {}", label, position.phrase())
}

/// Phrase for recognized wayfinding text
pub fn text_phrase(text: &str) -> String {
    format!("sign reads {}", text)
}
