//! Geometry utilities
//!
//! Stateless helpers shared by every detector: distances, angles, aspect
//! ratios, exponential smoothing and motion statistics over point windows.

use crate::types::Point;

/// Guard added to denominators of aspect ratios
pub const EPSILON: f64 = 1e-6;

/// Euclidean distance in the image plane
pub fn distance_2d(a: &Point, b: &Point) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2)).sqrt()
}

/// Euclidean distance including depth
pub fn distance_3d(a: &Point, b: &Point) -> f64 {
    ((a.x - b.x).powi(2) + (a.y - b.y).powi(2) + (a.z - b.z).powi(2)).sqrt()
}

/// Angle at vertex `b` formed by `a-b-c`, in degrees (0-180).
///
/// Returns 0 when either arm has zero length.
pub fn angle_at_vertex(a: &Point, b: &Point, c: &Point) -> f64 {
    let (v1x, v1y) = (a.x - b.x, a.y - b.y);
    let (v2x, v2y) = (c.x - b.x, c.y - b.y);
    let n1 = (v1x * v1x + v1y * v1y).sqrt();
    let n2 = (v2x * v2x + v2y * v2y).sqrt();
    if n1 < EPSILON || n2 < EPSILON {
        return 0.0;
    }
    let cos = ((v1x * v2x + v1y * v2y) / (n1 * n2)).clamp(-1.0, 1.0);
    cos.acos().to_degrees()
}

/// Signed angle of a segment from the vertical axis, in degrees.
///
/// `horizontal` is the sideways (or depth) offset of the upper point relative
/// to the lower one, `vertical` the downward extent. A perfectly vertical
/// segment gives 0; a positive offset gives a positive angle.
pub fn angle_from_vertical(horizontal: f64, vertical: f64) -> f64 {
    horizontal.atan2(vertical.abs()).to_degrees()
}

/// Image-plane angle from vertical of the segment `top -> bottom`
pub fn segment_angle_from_vertical(top: &Point, bottom: &Point) -> f64 {
    angle_from_vertical(top.x - bottom.x, bottom.y - top.y)
}

/// Eye aspect ratio from six ordered points:
/// `[outer, top_outer, top_inner, inner, bottom_inner, bottom_outer]`.
///
/// `(|p1-p5| + |p2-p4|) / (2 * |p0-p3|)`
pub fn eye_aspect_ratio(points: &[Point; 6]) -> f64 {
    let v1 = distance_2d(&points[1], &points[5]);
    let v2 = distance_2d(&points[2], &points[4]);
    let h = distance_2d(&points[0], &points[3]);
    (v1 + v2) / (2.0 * h + EPSILON)
}

/// Mouth aspect ratio from eight ordered points:
/// `[left_corner, top_left, top_center, top_right, right_corner,
///   bottom_right, bottom_center, bottom_left]`.
pub fn mouth_aspect_ratio(points: &[Point; 8]) -> f64 {
    let v1 = distance_2d(&points[1], &points[7]);
    let v2 = distance_2d(&points[2], &points[6]);
    let v3 = distance_2d(&points[3], &points[5]);
    let h = distance_2d(&points[0], &points[4]);
    (v1 + v2 + v3) / (3.0 * h + EPSILON)
}

/// Exponential smoothing: `alpha * previous + (1 - alpha) * value`
pub fn exponential_smooth(previous: f64, value: f64, alpha: f64) -> f64 {
    alpha * previous + (1.0 - alpha) * value
}

/// Mean position of a set of points
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy, sz) = points
        .iter()
        .fold((0.0, 0.0, 0.0), |(x, y, z), p| (x + p.x, y + p.y, z + p.z));
    Some(Point::new_3d(sx / n, sy / n, sz / n))
}

/// Positional variance: per-axis variance of x and y, summed.
pub fn position_variance(points: &[Point]) -> f64 {
    let Some(center) = centroid(points) else {
        return 0.0;
    };
    let n = points.len() as f64;
    points
        .iter()
        .map(|p| (p.x - center.x).powi(2) + (p.y - center.y).powi(2))
        .sum::<f64>()
        / n
}

/// Mean frame-to-frame displacement in the image plane
pub fn mean_velocity(points: &[Point]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    let total: f64 = points
        .windows(2)
        .map(|w| distance_2d(&w[0], &w[1]))
        .sum();
    total / (points.len() - 1) as f64
}

/// Largest of the x and y ranges (max - min) over the points
pub fn range_of_motion(points: &[Point]) -> f64 {
    if points.is_empty() {
        return 0.0;
    }
    let (mut min_x, mut max_x) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut min_y, mut max_y) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        min_x = min_x.min(p.x);
        max_x = max_x.max(p.x);
        min_y = min_y.min(p.y);
        max_y = max_y.max(p.y);
    }
    (max_x - min_x).max(max_y - min_y)
}

/// Mean and population variance of a slice
pub fn mean_and_variance(values: &[f64]) -> (f64, f64) {
    if values.is_empty() {
        return (0.0, 0.0);
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    (mean, variance)
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn p(x: f64, y: f64) -> Point {
        Point::new(x, y)
    }

    #[test]
    fn test_distances() {
        assert!((distance_2d(&p(0.0, 0.0), &p(3.0, 4.0)) - 5.0).abs() < 1e-12);
        let a = Point::new_3d(0.0, 0.0, 0.0);
        let b = Point::new_3d(1.0, 2.0, 2.0);
        assert!((distance_3d(&a, &b) - 3.0).abs() < 1e-12);
    }

    #[test]
    fn test_angle_at_vertex_right_angle() {
        let angle = angle_at_vertex(&p(1.0, 0.0), &p(0.0, 0.0), &p(0.0, 1.0));
        assert!((angle - 90.0).abs() < 1e-9);
    }

    #[test]
    fn test_angle_from_vertical() {
        assert!(angle_from_vertical(0.0, 1.0).abs() < 1e-12);
        assert!((angle_from_vertical(1.0, 1.0) - 45.0).abs() < 1e-9);
        assert!((angle_from_vertical(-1.0, 1.0) + 45.0).abs() < 1e-9);
        // Upper point to the right of the lower point
        let angle = segment_angle_from_vertical(&p(0.6, 0.2), &p(0.5, 0.3));
        assert!((angle - 45.0).abs() < 1e-9);
    }

    #[test]
    fn test_eye_aspect_ratio_open_eye() {
        let eye = [
            p(0.0, 0.5),
            p(0.3, 0.4),
            p(0.7, 0.4),
            p(1.0, 0.5),
            p(0.7, 0.6),
            p(0.3, 0.6),
        ];
        let ear = eye_aspect_ratio(&eye);
        assert!((ear - 0.2).abs() < 1e-4);
    }

    #[test]
    fn test_aspect_ratio_degenerate_points() {
        let eye = [p(0.5, 0.5); 6];
        assert_eq!(eye_aspect_ratio(&eye), 0.0);
        let mouth = [p(0.5, 0.5); 8];
        assert_eq!(mouth_aspect_ratio(&mouth), 0.0);
    }

    #[test]
    fn test_exponential_smooth() {
        assert!((exponential_smooth(1.0, 0.0, 0.6) - 0.6).abs() < 1e-12);
        assert!((exponential_smooth(0.0, 1.0, 0.6) - 0.4).abs() < 1e-12);
    }

    #[test]
    fn test_motion_statistics() {
        let still = vec![p(0.5, 0.5); 10];
        assert_eq!(position_variance(&still), 0.0);
        assert_eq!(mean_velocity(&still), 0.0);
        assert_eq!(range_of_motion(&still), 0.0);

        let line: Vec<Point> = (0..5).map(|i| p(i as f64 * 0.1, 0.5)).collect();
        assert!((mean_velocity(&line) - 0.1).abs() < 1e-9);
        assert!((range_of_motion(&line) - 0.4).abs() < 1e-9);
        assert!(position_variance(&line) > 0.0);
    }

    #[test]
    fn test_mean_and_variance() {
        let (mean, var) = mean_and_variance(&[1.0, 2.0, 3.0]);
        assert!((mean - 2.0).abs() < 1e-12);
        assert!((var - 2.0 / 3.0).abs() < 1e-12);
        assert_eq!(mean_and_variance(&[]), (0.0, 0.0));
    }

    fn coord() -> impl Strategy<Value = f64> {
        -10.0f64..10.0
    }

    fn point() -> impl Strategy<Value = Point> {
        (coord(), coord()).prop_map(|(x, y)| Point::new(x, y))
    }

    proptest! {
        #[test]
        fn prop_eye_aspect_ratio_defined(pts in proptest::array::uniform6(point())) {
            let ear = eye_aspect_ratio(&pts);
            prop_assert!(ear.is_finite());
            prop_assert!(ear >= 0.0);
        }

        #[test]
        fn prop_mouth_aspect_ratio_defined(pts in proptest::array::uniform8(point())) {
            let mar = mouth_aspect_ratio(&pts);
            prop_assert!(mar.is_finite());
            prop_assert!(mar >= 0.0);
        }

        #[test]
        fn prop_coincident_points_give_zero_ratio(pt in point()) {
            prop_assert_eq!(eye_aspect_ratio(&[pt; 6]), 0.0);
            prop_assert_eq!(mouth_aspect_ratio(&[pt; 8]), 0.0);
        }

        #[test]
        fn prop_smoothing_stays_between_inputs(
            prev in coord(),
            value in coord(),
            alpha in 0.0f64..=1.0,
        ) {
            let s = exponential_smooth(prev, value, alpha);
            let lo = prev.min(value) - 1e-9;
            let hi = prev.max(value) + 1e-9;
            prop_assert!(s >= lo && s <= hi);
        }

        #[test]
        fn prop_functions_are_deterministic(pts in proptest::collection::vec(point(), 0..40)) {
            prop_assert_eq!(position_variance(&pts), position_variance(&pts));
            prop_assert_eq!(mean_velocity(&pts), mean_velocity(&pts));
            prop_assert!(position_variance(&pts) >= 0.0);
            prop_assert!(mean_velocity(&pts) >= 0.0);
            prop_assert!(range_of_motion(&pts) >= 0.0);
        }

        #[test]
        fn prop_vertex_angle_in_range(a in point(), b in point(), c in point()) {
            let angle = angle_at_vertex(&a, &b, &c);
            prop_assert!((0.0..=180.0).contains(&angle));
        }
    }
}
