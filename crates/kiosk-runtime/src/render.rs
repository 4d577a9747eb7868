//! Render service seam
//!
//! The sphere renderer is an external collaborator. The controller only
//! points its camera and applies display directives through [`RenderSurface`].

use std::sync::Arc;

use parking_lot::Mutex;

use kiosk_core::CameraOrientation;

pub trait RenderSurface: Send {
    fn set_orientation(&mut self, orientation: CameraOrientation);
    /// Degrees
    fn set_field_of_view(&mut self, fov: f64);
    fn set_brightness(&mut self, brightness: f32);
    fn set_frame_rate_cap(&mut self, fps: u32);
    fn set_hidden(&mut self, hidden: bool);
}

/// Last values applied to a surface
#[derive(Clone, Debug, Default, PartialEq)]
pub struct SurfaceState {
    pub orientation: CameraOrientation,
    pub field_of_view: Option<f64>,
    pub brightness: Option<f32>,
    pub frame_rate_cap: Option<u32>,
    pub hidden: bool,
    pub orientation_updates: u64,
}

/// Headless surface: records what it is told and logs display changes
#[derive(Clone, Debug, Default)]
pub struct LoggingSurface {
    state: Arc<Mutex<SurfaceState>>,
}

impl LoggingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> SurfaceState {
        self.state.lock().clone()
    }
}

impl RenderSurface for LoggingSurface {
    fn set_orientation(&mut self, orientation: CameraOrientation) {
        let mut state = self.state.lock();
        state.orientation = orientation;
        state.orientation_updates += 1;
        tracing::trace!(yaw = orientation.yaw, pitch = orientation.pitch, "camera");
    }

    fn set_field_of_view(&mut self, fov: f64) {
        self.state.lock().field_of_view = Some(fov);
        tracing::info!(fov, "field of view");
    }

    fn set_brightness(&mut self, brightness: f32) {
        self.state.lock().brightness = Some(brightness);
        tracing::info!(brightness, "brightness");
    }

    fn set_frame_rate_cap(&mut self, fps: u32) {
        self.state.lock().frame_rate_cap = Some(fps);
        tracing::info!(fps, "frame rate cap");
    }

    fn set_hidden(&mut self, hidden: bool) {
        self.state.lock().hidden = hidden;
        tracing::info!(hidden, "surface visibility");
    }
}
