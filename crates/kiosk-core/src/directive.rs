//! Side-effect directives
//!
//! Engines never touch the display, renderer or player directly. They
//! return directives and the runtime applies them.

use crate::{CameraOrientation, PowerProfile};

/// A side effect requested by an engine
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Directive {
    /// Set display brightness in [0, 1]
    SetBrightness(f32),
    /// Cap the render frame rate
    SetFrameRateCap(u32),
    /// Hide (true) or show (false) the render surface
    SetSurfaceHidden(bool),
    /// Pause the playback resource
    PausePlayback,
    /// Resume the playback resource
    ResumePlayback,
    /// Point the virtual camera
    ApplyOrientation(CameraOrientation),
    /// Set the camera field of view (degrees)
    SetFieldOfView(f64),
}

impl Directive {
    /// Directives needed to move the device from one power profile to another.
    ///
    /// Only fields that differ produce a directive. When going dark the
    /// player is paused first and brightness dropped last; when coming
    /// back the display is restored before playback resumes.
    pub fn for_transition(from: &PowerProfile, to: &PowerProfile) -> Vec<Directive> {
        let mut out = Vec::with_capacity(4);

        let brightness = (to.brightness != from.brightness).then_some(Directive::SetBrightness(to.brightness));
        let frame_rate =
            (to.max_frame_rate != from.max_frame_rate).then_some(Directive::SetFrameRateCap(to.max_frame_rate));
        let surface =
            (to.surface_hidden != from.surface_hidden).then_some(Directive::SetSurfaceHidden(to.surface_hidden));
        let playback = (to.playback_paused != from.playback_paused).then_some(if to.playback_paused {
            Directive::PausePlayback
        } else {
            Directive::ResumePlayback
        });

        let going_dark = (to.playback_paused && !from.playback_paused) || (to.surface_hidden && !from.surface_hidden);

        let ordered = if going_dark {
            [playback, surface, frame_rate, brightness]
        } else {
            [brightness, surface, playback, frame_rate]
        };
        out.extend(ordered.into_iter().flatten());
        out
    }

    /// Does this directive touch the playback resource?
    pub fn is_playback(&self) -> bool {
        matches!(self, Directive::PausePlayback | Directive::ResumePlayback)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ActivityState;

    #[test]
    fn test_sleep_directives_order() {
        let awake = PowerProfile::for_state(ActivityState::Awake);
        let sleep = PowerProfile::for_state(ActivityState::Sleep);

        let directives = Directive::for_transition(&awake, &sleep);
        assert_eq!(
            directives,
            vec![
                Directive::PausePlayback,
                Directive::SetSurfaceHidden(true),
                Directive::SetFrameRateCap(1),
                Directive::SetBrightness(0.0),
            ]
        );
    }

    #[test]
    fn test_wake_directives_are_inverse() {
        let awake = PowerProfile::for_state(ActivityState::Awake);
        let sleep = PowerProfile::for_state(ActivityState::Sleep);

        let directives = Directive::for_transition(&sleep, &awake);
        assert_eq!(
            directives,
            vec![
                Directive::SetBrightness(1.0),
                Directive::SetSurfaceHidden(false),
                Directive::ResumePlayback,
                Directive::SetFrameRateCap(60),
            ]
        );
    }

    #[test]
    fn test_identical_profiles_produce_nothing() {
        let awake = PowerProfile::for_state(ActivityState::Awake);
        assert!(Directive::for_transition(&awake, &awake).is_empty());
    }

    #[test]
    fn test_low_power_keeps_playback() {
        let awake = PowerProfile::for_state(ActivityState::Awake);
        let low = PowerProfile::for_state(ActivityState::LowPower);

        let directives = Directive::for_transition(&awake, &low);
        assert!(directives.iter().all(|d| !d.is_playback()));
        assert!(directives.contains(&Directive::SetFrameRateCap(30)));
    }
}
