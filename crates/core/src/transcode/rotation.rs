//! Rotation conflict resolution.
//!
//! Phone footage often carries two rotation signals: the legacy `rotate`
//! stream tag and the display matrix side data. They frequently disagree
//! (the matrix is expressed counter-clockwise, so `-90` there means 270
//! clockwise). When both are present the legacy tag wins.

use tracing::{debug, warn};

use super::types::{RawStreamInfo, Rotation};

/// Merges the two rotation signals of a stream into one canonical value.
pub fn resolve(legacy_rotate_tag: Option<i32>, display_matrix_angle: Option<f64>) -> Rotation {
    let tag = legacy_rotate_tag.map(|t| canonicalize(f64::from(t)));
    let matrix = display_matrix_angle
        .filter(|a| a.is_finite())
        .map(canonicalize);

    match (tag, matrix) {
        (None, None) => Rotation::None,
        (Some(tag), None) => tag,
        (None, Some(matrix)) => matrix,
        (Some(tag), Some(matrix)) if tag == matrix => tag,
        (Some(tag), Some(matrix)) => {
            warn!(
                rotate_tag = ?legacy_rotate_tag,
                display_matrix = ?display_matrix_angle,
                "Rotation signals disagree ({} vs {}), using rotate tag",
                tag,
                matrix
            );
            tag
        }
    }
}

/// Resolves the rotation of a probed stream.
pub fn resolve_stream(stream: &RawStreamInfo) -> Rotation {
    let rotation = resolve(stream.rotate_tag, stream.display_matrix_rotation);
    debug!(
        rotate_tag = ?stream.rotate_tag,
        display_matrix = ?stream.display_matrix_rotation,
        "Resolved rotation {}",
        rotation
    );
    rotation
}

/// Turn ffmpeg's decoder gives the frames of `stream` when autorotation is on.
///
/// The decoder reads only the display matrix and turns clockwise by its
/// negated angle. `None` when the stream carries no usable matrix.
pub fn decoder_rotation(stream: &RawStreamInfo) -> Option<Rotation> {
    stream
        .display_matrix_rotation
        .filter(|a| a.is_finite())
        .map(|a| canonicalize(-a))
}

/// Snaps an arbitrary angle to the nearest quarter turn.
///
/// Bins are half-open: [315, 45) -> 0, [45, 135) -> 90, [135, 225) -> 180,
/// [225, 315) -> 270.
pub fn canonicalize(angle: f64) -> Rotation {
    let normalized = angle.rem_euclid(360.0);

    if !(45.0..315.0).contains(&normalized) {
        Rotation::None
    } else if normalized < 135.0 {
        Rotation::Cw90
    } else if normalized < 225.0 {
        Rotation::Cw180
    } else {
        Rotation::Cw270
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_no_signals() {
        assert_eq!(resolve(None, None), Rotation::None);
    }

    #[test]
    fn test_single_signal() {
        assert_eq!(resolve(Some(90), None), Rotation::Cw90);
        assert_eq!(resolve(None, Some(-90.0)), Rotation::Cw270);
        assert_eq!(resolve(None, Some(90.0)), Rotation::Cw90);
        assert_eq!(resolve(None, Some(-180.0)), Rotation::Cw180);
        assert_eq!(resolve(None, Some(-270.0)), Rotation::Cw90);
    }

    #[test]
    fn test_agreeing_signals() {
        assert_eq!(resolve(Some(270), Some(-90.0)), Rotation::Cw270);
        assert_eq!(resolve(Some(0), Some(0.0)), Rotation::None);
    }

    #[test]
    fn test_conflict_prefers_rotate_tag() {
        assert_eq!(resolve(Some(90), Some(180.0)), Rotation::Cw90);
        assert_eq!(resolve(Some(90), Some(-90.0)), Rotation::Cw90);

        // Stable across repeated calls.
        let first = resolve(Some(90), Some(180.0));
        for _ in 0..10 {
            assert_eq!(resolve(Some(90), Some(180.0)), first);
        }
    }

    #[test]
    fn test_canonicalize_bins() {
        assert_eq!(canonicalize(0.0), Rotation::None);
        assert_eq!(canonicalize(44.9), Rotation::None);
        assert_eq!(canonicalize(45.0), Rotation::Cw90);
        assert_eq!(canonicalize(134.9), Rotation::Cw90);
        assert_eq!(canonicalize(135.0), Rotation::Cw180);
        assert_eq!(canonicalize(224.9), Rotation::Cw180);
        assert_eq!(canonicalize(225.0), Rotation::Cw270);
        assert_eq!(canonicalize(314.9), Rotation::Cw270);
        assert_eq!(canonicalize(315.0), Rotation::None);
        assert_eq!(canonicalize(360.0), Rotation::None);
        assert_eq!(canonicalize(450.0), Rotation::Cw90);
        assert_eq!(canonicalize(-45.0), Rotation::None);
        assert_eq!(canonicalize(-46.0), Rotation::Cw270);
    }

    #[test]
    fn test_decoder_rotation_follows_matrix_only() {
        let mut stream = RawStreamInfo {
            width: 1920,
            height: 1080,
            duration_secs: 1.0,
            bitrate: None,
            codec_name: "h264".to_string(),
            rotate_tag: Some(90),
            display_matrix_rotation: None,
        };
        assert_eq!(decoder_rotation(&stream), None);

        stream.display_matrix_rotation = Some(-90.0);
        assert_eq!(decoder_rotation(&stream), Some(Rotation::Cw90));
        stream.display_matrix_rotation = Some(90.0);
        assert_eq!(decoder_rotation(&stream), Some(Rotation::Cw270));
        stream.display_matrix_rotation = Some(f64::NAN);
        assert_eq!(decoder_rotation(&stream), None);
    }

    #[test]
    fn test_non_finite_matrix_is_ignored() {
        assert_eq!(resolve(None, Some(f64::NAN)), Rotation::None);
        assert_eq!(resolve(Some(180), Some(f64::INFINITY)), Rotation::Cw180);
    }

    #[test]
    fn test_output_is_always_canonical() {
        let tags = [
            None,
            Some(-720),
            Some(-90),
            Some(0),
            Some(89),
            Some(181),
            Some(359),
            Some(i32::MAX),
            Some(i32::MIN),
        ];
        let angles = [
            None,
            Some(-359.9),
            Some(-90.0),
            Some(0.0),
            Some(44.99),
            Some(270.0),
            Some(1e9),
            Some(f64::NAN),
        ];

        for tag in tags {
            for angle in angles {
                let degrees = resolve(tag, angle).degrees();
                assert!(matches!(degrees, 0 | 90 | 180 | 270));
            }
        }
    }
}
