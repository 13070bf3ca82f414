// Re-export glam for convenience
pub use glam::*;

// TMF math types
mod aabb;
mod transform;
pub use aabb::Aabb;
pub use transform::{DMat4Ext, TransformError, TransformResult};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dvec3_creation() {
        let v = DVec3::new(1.0, 2.0, 3.0);
        assert_eq!(v.x, 1.0);
        assert_eq!(v.y, 2.0);
        assert_eq!(v.z, 3.0);
    }

    #[test]
    fn test_dmat4_product_order() {
        let t = DMat4::from_translation(DVec3::new(1.0, 0.0, 0.0));
        let s = DMat4::from_scale(DVec3::splat(2.0));

        // Right-most operand applies first
        let p = (t * s).transform_point3(DVec3::ONE);
        assert_eq!(p, DVec3::new(3.0, 2.0, 2.0));
    }
}
