// Transform utilities for DMat4
//
// Extends glam::DMat4 with the 3MF `transform` attribute codec and box
// transformation. 3MF stores an affine transform as twelve numbers: four rows
// of three, where the fourth row is the translation. Transposed, those rows are
// the top 3x4 block of a column-vector homogeneous matrix.

use glam::{DMat4, DVec4};
use thiserror::Error;

use crate::Aabb;

/// Errors that can occur while decoding a transform attribute.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TransformError {
    #[error("transform must have exactly 12 values (got {0})")]
    WrongCount(usize),

    #[error("invalid number in transform: {0:?}")]
    InvalidNumber(String),

    #[error("transform value at index {index} is not finite ({value})")]
    NotFinite { index: usize, value: f64 },
}

/// Result type for transform decoding.
pub type TransformResult<T> = Result<T, TransformError>;

/// Extension trait for DMat4 to read and write 3MF transforms.
pub trait DMat4Ext: Sized {
    /// Decode a 3MF `transform` attribute value.
    fn from_3mf(value: &str) -> TransformResult<Self>;

    /// Decode an optional attribute; an absent attribute is the identity.
    fn from_3mf_attr(value: Option<&str>) -> TransformResult<Self> {
        value.map_or_else(|| Ok(Self::identity()), Self::from_3mf)
    }

    /// Encode as a 3MF `transform` attribute value (inverse of `from_3mf`).
    fn to_3mf(&self) -> String;

    /// The identity transform.
    fn identity() -> Self;

    /// True if this is exactly the identity matrix.
    fn is_identity(&self) -> bool;

    /// Transform an axis-aligned bounding box.
    /// Computes the bounding box of all 8 transformed corners.
    fn transform_aabb(&self, aabb: &Aabb) -> Aabb;
}

impl DMat4Ext for DMat4 {
    fn from_3mf(value: &str) -> TransformResult<Self> {
        let mut values = [0.0f64; 12];
        let mut count = 0;

        for token in value.split_ascii_whitespace() {
            let parsed: f64 = token
                .parse()
                .map_err(|_| TransformError::InvalidNumber(token.to_string()))?;
            if !parsed.is_finite() {
                return Err(TransformError::NotFinite {
                    index: count,
                    value: parsed,
                });
            }
            if count < values.len() {
                values[count] = parsed;
            }
            count += 1;
        }

        if count != values.len() {
            return Err(TransformError::WrongCount(count));
        }

        // Row r of the attribute becomes column r of the matrix
        let column = |r: usize, w: f64| DVec4::new(values[3 * r], values[3 * r + 1], values[3 * r + 2], w);
        Ok(DMat4::from_cols(
            column(0, 0.0),
            column(1, 0.0),
            column(2, 0.0),
            column(3, 1.0),
        ))
    }

    fn to_3mf(&self) -> String {
        let cols = [self.x_axis, self.y_axis, self.z_axis, self.w_axis];
        cols.iter()
            .flat_map(|c| [c.x, c.y, c.z])
            .map(|v| v.to_string())
            .collect::<Vec<_>>()
            .join(" ")
    }

    fn identity() -> Self {
        DMat4::IDENTITY
    }

    fn is_identity(&self) -> bool {
        *self == DMat4::IDENTITY
    }

    fn transform_aabb(&self, aabb: &Aabb) -> Aabb {
        if aabb.is_empty() {
            return Aabb::EMPTY;
        }
        Aabb::enclosing(aabb.corners().into_iter().map(|c| self.transform_point3(c)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::DVec3;

    #[test]
    fn test_absent_transform_is_identity() {
        let mat = DMat4::from_3mf_attr(None).unwrap();
        assert_eq!(mat, DMat4::IDENTITY);
        assert!(mat.is_identity());
    }

    #[test]
    fn test_parse_identity_string() {
        let mat = DMat4::from_3mf("1 0 0 0 1 0 0 0 1 0 0 0").unwrap();
        assert_eq!(mat, DMat4::IDENTITY);
    }

    #[test]
    fn test_parse_translation() {
        let mat = DMat4::from_3mf("1 0 0 0 1 0 0 0 1 10 20 30").unwrap();
        let p = mat.transform_point3(DVec3::new(1.0, 2.0, 3.0));

        assert_eq!(p, DVec3::new(11.0, 22.0, 33.0));
    }

    #[test]
    fn test_parse_is_transposed() {
        // First attribute row is the image of the X axis
        let mat = DMat4::from_3mf("0 1 0 -1 0 0 0 0 1 0 0 0").unwrap();
        let x = mat.transform_vector3(DVec3::X);

        assert!((x - DVec3::Y).length() < 1e-12);
        assert_eq!(mat.row(3), DVec4::new(0.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_parse_tolerates_extra_whitespace() {
        let mat = DMat4::from_3mf("  1 0 0\n0 1 0\t0 0 1   5 0 0 ").unwrap();
        assert_eq!(mat.w_axis, DVec4::new(5.0, 0.0, 0.0, 1.0));
    }

    #[test]
    fn test_parse_wrong_count() {
        assert_eq!(
            DMat4::from_3mf("1 0 0 0 1 0 0 0 1"),
            Err(TransformError::WrongCount(9))
        );
        assert_eq!(
            DMat4::from_3mf("1 0 0 0 1 0 0 0 1 0 0 0 7"),
            Err(TransformError::WrongCount(13))
        );
    }

    #[test]
    fn test_parse_invalid_number() {
        let err = DMat4::from_3mf("1 0 0 0 1 0 0 0 one 0 0 0").unwrap_err();
        assert_eq!(err, TransformError::InvalidNumber("one".to_string()));
    }

    #[test]
    fn test_parse_rejects_non_finite() {
        let err = DMat4::from_3mf("1 0 0 0 1 0 0 0 1 inf 0 0").unwrap_err();
        assert!(matches!(err, TransformError::NotFinite { index: 9, .. }));
    }

    #[test]
    fn test_encode_inverts_decode() {
        let text = "0.5 0 0 0 0.5 0 0 0 0.5 1.25 -3 7";
        let mat = DMat4::from_3mf(text).unwrap();

        assert_eq!(mat.to_3mf(), text);
        assert_eq!(DMat4::from_3mf(&mat.to_3mf()).unwrap(), mat);
    }

    #[test]
    fn test_transform_aabb_translation() {
        let mat = DMat4::from_translation(DVec3::splat(5.0));
        let aabb = Aabb::from_points(DVec3::ZERO, DVec3::ONE);
        let transformed = mat.transform_aabb(&aabb);

        assert!((transformed.min - DVec3::splat(5.0)).length() < 1e-12);
        assert!((transformed.max - DVec3::splat(6.0)).length() < 1e-12);
    }

    #[test]
    fn test_transform_aabb_empty_stays_empty() {
        let mat = DMat4::from_translation(DVec3::splat(5.0));
        assert!(mat.transform_aabb(&Aabb::EMPTY).is_empty());
    }
}
