//! Per-anchor presentation settings.

use crate::segment::Speaker;
use serde::{Deserialize, Serialize};

/// Wire shape: `{ name, voice, accent, image }`. Missing fields default to empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarConfig {
    /// Display name shown under the active anchor.
    #[serde(default)]
    pub name: String,
    /// Voice locale code (e.g. en-GB).
    #[serde(default)]
    pub voice: String,
    /// Accent code matched against synthesis voice locales (e.g. US).
    #[serde(default)]
    pub accent: String,
    /// Portrait reference.
    #[serde(default)]
    pub image: String,
}

/// Both anchors' settings, replaced wholesale on `avatars.update`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AvatarRoster {
    #[serde(rename = "A", default)]
    pub a: AvatarConfig,
    #[serde(rename = "B", default)]
    pub b: AvatarConfig,
}

impl AvatarRoster {
    pub fn get(&self, speaker: Speaker) -> &AvatarConfig {
        match speaker {
            Speaker::A => &self.a,
            Speaker::B => &self.b,
        }
    }
}
