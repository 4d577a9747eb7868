//! Activity states and their power profiles
//!
//! The kiosk is always in exactly one of three energy states:
//! - Awake: full brightness, full frame rate, playing
//! - LowPower: dimmed, reduced frame rate, still playing
//! - Sleep: display off, minimal frame rate, playback paused

use serde::{Deserialize, Serialize};

/// Energy/activity state of the device
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[repr(u8)]
pub enum ActivityState {
    /// Someone is (or recently was) handling the device
    #[default]
    Awake = 0x00,

    /// Idle for a while; render rate reduced, playback continues
    LowPower = 0x01,

    /// Idle for long; display blanked, playback paused
    Sleep = 0x02,
}

impl ActivityState {
    /// Depth of the state (0 = Awake, 2 = Sleep)
    #[inline]
    pub fn depth(self) -> u8 {
        self as u8
    }

    /// Is `self` a deeper state than `other`?
    #[inline]
    pub fn is_deeper_than(self, other: ActivityState) -> bool {
        self.depth() > other.depth()
    }

    #[inline]
    pub fn is_asleep(self) -> bool {
        self == ActivityState::Sleep
    }

    /// May the playback resource be touched in this state?
    #[inline]
    pub fn allows_playback(self) -> bool {
        !self.is_asleep()
    }

    /// May camera orientation be applied in this state?
    #[inline]
    pub fn applies_orientation(self) -> bool {
        !self.is_asleep()
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ActivityState::Awake => "awake",
            ActivityState::LowPower => "low_power",
            ActivityState::Sleep => "sleep",
        }
    }
}

impl std::fmt::Display for ActivityState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display/render/playback settings applied while in a state
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PowerProfile {
    /// Display brightness in [0, 1]
    pub brightness: f32,
    /// Render frame-rate cap
    pub max_frame_rate: u32,
    /// Render surface hidden/blanked
    pub surface_hidden: bool,
    /// Playback paused
    pub playback_paused: bool,
}

impl PowerProfile {
    /// Reference profile for a state
    pub fn for_state(state: ActivityState) -> Self {
        match state {
            ActivityState::Awake => PowerProfile {
                brightness: 1.0,
                max_frame_rate: 60,
                surface_hidden: false,
                playback_paused: false,
            },
            ActivityState::LowPower => PowerProfile {
                brightness: 0.6,
                max_frame_rate: 30,
                surface_hidden: false,
                playback_paused: false,
            },
            ActivityState::Sleep => PowerProfile {
                brightness: 0.0,
                max_frame_rate: 1,
                surface_hidden: true,
                playback_paused: true,
            },
        }
    }
}
