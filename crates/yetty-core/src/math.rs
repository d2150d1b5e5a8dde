//! Math types used across the rendering crates.
//!
//! Re-exports the `glam` vector types so downstream crates share a single
//! version without naming the dependency themselves.

pub use glam::{Mat4, Vec2, Vec3, Vec4};

/// Build an orthographic projection mapping pixel coordinates (origin at the
/// top-left, Y down) to normalized device coordinates.
pub fn ortho_pixel(width: f32, height: f32) -> Mat4 {
    Mat4::orthographic_rh(0.0, width, height, 0.0, -1.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ortho_maps_top_left_to_minus_one_one() {
        let m = ortho_pixel(800.0, 600.0);
        let p = m * Vec4::new(0.0, 0.0, 0.0, 1.0);
        assert!((p.x - -1.0).abs() < 1e-6);
        assert!((p.y - 1.0).abs() < 1e-6);
    }

    #[test]
    fn ortho_maps_bottom_right_to_one_minus_one() {
        let m = ortho_pixel(800.0, 600.0);
        let p = m * Vec4::new(800.0, 600.0, 0.0, 1.0);
        assert!((p.x - 1.0).abs() < 1e-6);
        assert!((p.y - -1.0).abs() < 1e-6);
    }
}
