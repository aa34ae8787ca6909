//! Audio cue records exchanged between the prioritizer and the scheduler

use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::{Duration, Instant};

/// Kind of navigation announcement
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CueKind {
    /// Entity on a collision-relevant path
    ObstacleWarning,
    /// Walkable-surface clarity changed
    SurfaceChange,
    /// Wayfinding text worth reading aloud
    TextReadAloud,
    /// Non-critical positional guidance
    DirectionalGuidance,
}

impl CueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            CueKind::ObstacleWarning => "obstacle_warning",
            CueKind::SurfaceChange => "surface_change",
            CueKind::TextReadAloud => "text_read_aloud",
            CueKind::DirectionalGuidance => "directional_guidance",
        }
    }
}

impl fmt::Display for CueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// What a cue refers to. Used together with the kind as the deduplication
/// key for cooldown tracking.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum CueTarget {
    /// A tracked scene entity
    Entity(u64),
    /// A recognized text, keyed by its normalized content
    Text(String),
    /// The walkable path itself
    Path,
}

/// Cooldown deduplication key
pub type CuePair = (CueKind, CueTarget);

/// A single candidate audio announcement.
///
/// Created by the cue prioritizer, consumed (dispatched or suppressed) by
/// the audio cue scheduler.
#[derive(Debug, Clone)]
pub struct Cue {
    pub kind: CueKind,
    /// Urgency score, higher is more urgent
    pub urgency: f32,
    pub target: CueTarget,
    /// Announcement text handed to the speech output port
    pub message: String,
    pub created_at: Instant,
    /// Minimum re-announcement interval for this kind/target pair
    pub cooldown: Duration,
}

impl Cue {
    pub fn new(
        kind: CueKind,
        urgency: f32,
        target: CueTarget,
        message: String,
        cooldown: Duration,
    ) -> Self {
        Self {
            kind,
            urgency,
            target,
            message,
            created_at: Instant::now(),
            cooldown,
        }
    }

    /// Deduplication key for cooldown state
    pub fn pair(&self) -> CuePair {
        (self.kind, self.target.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cue_pair_distinguishes_targets() {
        let a = Cue::new(
            CueKind::ObstacleWarning,
            5.0,
            CueTarget::Entity(1),
            "person ahead".to_string(),
            Duration::from_secs(2),
        );
        let b = Cue::new(
            CueKind::ObstacleWarning,
            5.0,
            CueTarget::Entity(2),
            "person ahead".to_string(),
            Duration::from_secs(2),
        );
        assert_ne!(a.pair(), b.pair());
        assert_eq!(a.pair(), a.pair());
    }

    #[test]
    fn test_cue_pair_distinguishes_kinds() {
        let warn = Cue::new(
            CueKind::ObstacleWarning,
            5.0,
            CueTarget::Entity(1),
            "m".to_string(),
            Duration::from_secs(2),
        );
        let guide = Cue::new(
            CueKind::DirectionalGuidance,
            5.0,
            CueTarget::Entity(1),
            "m".to_string(),
            Duration::from_secs(2),
        );
        assert_ne!(warn.pair(), guide.pair());
    }

    #[test]
    fn test_kind_as_str() {
        assert_eq!(CueKind::TextReadAloud.as_str(), "text_read_aloud");
        assert_eq!(CueKind::SurfaceChange.to_string(), "surface_change");
    }
}
