//! Render configuration.

use std::path::PathBuf;

use glam::Vec3;

/// Static configuration for a render session.
///
/// Everything here is decided before the first frame and never changes at
/// runtime. Window sizes are requested sizes; the swapchain always follows
/// the actual surface extent reported by the driver.
#[derive(Debug, Clone)]
pub struct RenderConfig {
    /// Window title.
    pub title: String,
    /// Requested initial window width in physical pixels.
    pub width: u32,
    /// Requested initial window height in physical pixels.
    pub height: u32,
    /// Path to the glTF model rendered by the single opaque pass.
    pub model_path: PathBuf,
    /// Directory containing the GLSL shader sources.
    pub shader_dir: PathBuf,
    /// Clear color for the color attachment (linear RGB).
    pub clear_color: [f32; 4],
    /// Vertical field of view in radians.
    pub fov_y: f32,
    /// Near clip plane distance.
    pub z_near: f32,
    /// Far clip plane distance.
    pub z_far: f32,
    /// Fixed camera eye position.
    pub camera_eye: Vec3,
    /// Point the camera looks at.
    pub camera_target: Vec3,
    /// Enable Vulkan validation layers when available.
    pub validation: bool,
}

impl Default for RenderConfig {
    fn default() -> Self {
        Self {
            title: "Lantern".to_string(),
            width: 1280,
            height: 720,
            model_path: PathBuf::from("assets/models/monkey.glb"),
            shader_dir: PathBuf::from("shaders"),
            clear_color: [0.02, 0.02, 0.03, 1.0],
            fov_y: 60f32.to_radians(),
            z_near: 0.1,
            z_far: 100.0,
            camera_eye: Vec3::new(0.0, 1.0, 3.0),
            camera_target: Vec3::ZERO,
            validation: cfg!(debug_assertions),
        }
    }
}

impl RenderConfig {
    /// Aspect ratio for the given framebuffer extent.
    ///
    /// Falls back to the configured window size when the extent is
    /// degenerate (minimized window).
    pub fn aspect_ratio(&self, width: u32, height: u32) -> f32 {
        if width == 0 || height == 0 {
            self.width as f32 / self.height as f32
        } else {
            width as f32 / height as f32
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_sane() {
        let config = RenderConfig::default();
        assert!(config.width > 0 && config.height > 0);
        assert!(config.z_near > 0.0);
        assert!(config.z_far > config.z_near);
    }

    #[test]
    fn aspect_ratio_ignores_degenerate_extent() {
        let config = RenderConfig::default();
        let fallback = config.width as f32 / config.height as f32;
        assert_eq!(config.aspect_ratio(0, 0), fallback);
        assert_eq!(config.aspect_ratio(1920, 0), fallback);
        assert_eq!(config.aspect_ratio(800, 400), 2.0);
    }
}
