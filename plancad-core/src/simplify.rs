//! 手绘采样与 Douglas–Peucker 路径简化。
//!
//! 所有函数都作用于扁平坐标数组 `[x0, y0, x1, y1, ...]`，保持点的原始顺序。

use crate::geometry::{Point2, flatten_points, iter_points};

/// 手绘采样默认最小间距。
pub const DEFAULT_MIN_DISTANCE: f64 = 1.0;
/// 手绘收尾时的简化容差，比多段线更激进。
pub const FREEHAND_TOLERANCE: f64 = 2.0;
/// 多段线收尾时的简化容差，尽量保留用户放置的顶点。
pub const POLYLINE_TOLERANCE: f64 = 0.5;

/// 点到弦 `start → end` 所在直线的垂直距离：三角形面积的两倍除以底边长。
/// 弦长退化为 0 时返回点到 `start` 的距离。
pub fn perpendicular_distance(point: Point2, start: Point2, end: Point2) -> f64 {
    let base = start.distance(end);
    if base <= f64::EPSILON {
        return point.distance(start);
    }
    let chord = start.vector_to(end).as_vec2();
    let to_point = start.vector_to(point).as_vec2();
    let double_area = chord.perp_dot(to_point).abs();
    double_area / base
}

/// 追加一个手绘采样点。与最后记录点的距离不超过 `min_distance` 时丢弃采样；
/// 第一个点总会被接受。返回是否追加。
pub fn append_freehand_point(points: &mut Vec<f64>, sample: Point2, min_distance: f64) -> bool {
    if points.len() < 2 {
        points.truncate(0);
        points.extend([sample.x(), sample.y()]);
        return true;
    }
    let last_index = points.len() - points.len() % 2 - 2;
    let last = Point2::new(points[last_index], points[last_index + 1]);
    if sample.distance(last) > min_distance {
        points.truncate(last_index + 2);
        points.extend([sample.x(), sample.y()]);
        true
    } else {
        false
    }
}

/// Douglas–Peucker 简化。不超过两个点（4 个坐标）的输入原样返回。
pub fn simplify_path(coords: &[f64], tolerance: f64) -> Vec<f64> {
    if coords.len() <= 4 {
        return coords.to_vec();
    }
    let points: Vec<Point2> = iter_points(coords).collect();
    let kept = simplified_indices(&points, tolerance);
    flatten_points(kept.into_iter().map(|index| points[index]))
}

/// 返回简化后保留的点下标（升序）。
///
/// 用显式栈代替递归，避免长笔画导致调用栈过深；拆分顺序与递归版本一致。
pub(crate) fn simplified_indices(points: &[Point2], tolerance: f64) -> Vec<usize> {
    let count = points.len();
    if count <= 2 {
        return (0..count).collect();
    }

    let mut keep = vec![false; count];
    keep[0] = true;
    keep[count - 1] = true;

    let mut spans = vec![(0usize, count - 1)];
    while let Some((first, last)) = spans.pop() {
        if last <= first + 1 {
            continue;
        }
        let mut max_distance = -1.0;
        let mut max_index = first + 1;
        for index in (first + 1)..last {
            let distance = perpendicular_distance(points[index], points[first], points[last]);
            if distance > max_distance {
                max_distance = distance;
                max_index = index;
            }
        }
        if max_distance >= tolerance {
            keep[max_index] = true;
            spans.push((first, max_index));
            spans.push((max_index, last));
        }
    }

    keep.iter()
        .enumerate()
        .filter_map(|(index, keep)| keep.then_some(index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn collinear_points_collapse_to_endpoints() {
        let coords = [0.0, 0.0, 1.0, 1.0, 2.0, 2.0, 3.0, 3.0];
        assert_eq!(simplify_path(&coords, 0.05), vec![0.0, 0.0, 3.0, 3.0]);
    }

    #[test]
    fn corners_survive_simplification() {
        let coords = [0.0, 0.0, 1.0, 0.0, 2.0, 0.0, 2.0, 1.0, 2.0, 2.0];
        assert_eq!(
            simplify_path(&coords, 0.05),
            vec![0.0, 0.0, 2.0, 0.0, 2.0, 2.0]
        );
    }

    #[test]
    fn short_paths_are_returned_unchanged() {
        let coords = [0.0, 0.0, 5.0, 5.0];
        assert_eq!(simplify_path(&coords, 100.0), coords.to_vec());
        let single = [3.0, 4.0];
        assert_eq!(simplify_path(&single, 1.0), single.to_vec());
    }

    #[test]
    fn trailing_odd_coordinate_is_ignored() {
        let coords = [0.0, 0.0, 5.0, 0.1, 10.0, 0.0, 42.0];
        assert_eq!(simplify_path(&coords, 1.0), vec![0.0, 0.0, 10.0, 0.0]);
    }

    #[test]
    fn degenerate_chord_uses_point_distance() {
        let start = Point2::new(1.0, 1.0);
        let distance = perpendicular_distance(Point2::new(4.0, 5.0), start, start);
        assert!((distance - 5.0).abs() < 1e-12);
    }

    #[test]
    fn closed_loop_keeps_far_point() {
        // 首尾重合的闭合笔画：弦退化，按到起点的距离挑选
        let coords = [0.0, 0.0, 10.0, 0.0, 10.0, 10.0, 0.0, 10.0, 0.0, 0.0];
        let simplified = simplify_path(&coords, 1.0);
        assert!(simplified.len() >= 6);
        assert_eq!(&simplified[..2], &[0.0, 0.0]);
        assert_eq!(&simplified[simplified.len() - 2..], &[0.0, 0.0]);
    }

    #[test]
    fn freehand_samples_below_threshold_are_dropped() {
        let mut points = Vec::new();
        let samples = [
            Point2::new(0.0, 0.0),
            Point2::new(0.2, 0.1),
            Point2::new(5.0, 5.0),
            Point2::new(10.0, 0.0),
        ];
        let accepted: Vec<bool> = samples
            .iter()
            .map(|sample| append_freehand_point(&mut points, *sample, 1.0))
            .collect();
        assert_eq!(accepted, vec![true, false, true, true]);
        assert_eq!(points, vec![0.0, 0.0, 5.0, 5.0, 10.0, 0.0]);

        let simplified = simplify_path(&points, FREEHAND_TOLERANCE);
        assert_eq!(simplified, points);
    }

    fn point_list() -> impl Strategy<Value = Vec<f64>> {
        prop::collection::vec((-500.0f64..500.0, -500.0f64..500.0), 0..48)
            .prop_map(|pairs| pairs.into_iter().flat_map(|(x, y)| [x, y]).collect())
    }

    proptest! {
        #[test]
        fn simplification_is_idempotent(coords in point_list(), tolerance in 0.0f64..25.0) {
            let once = simplify_path(&coords, tolerance);
            let twice = simplify_path(&once, tolerance);
            prop_assert_eq!(once, twice);
        }

        #[test]
        fn simplification_stays_within_tolerance(coords in point_list(), tolerance in 0.01f64..25.0) {
            let points: Vec<Point2> = iter_points(&coords).collect();
            let kept = simplified_indices(&points, tolerance);
            if points.len() >= 2 {
                prop_assert_eq!(kept.first().copied(), Some(0));
                prop_assert_eq!(kept.last().copied(), Some(points.len() - 1));
            }
            for window in kept.windows(2) {
                let (first, last) = (window[0], window[1]);
                for index in (first + 1)..last {
                    let distance =
                        perpendicular_distance(points[index], points[first], points[last]);
                    prop_assert!(distance < tolerance);
                }
            }
        }

        #[test]
        fn near_samples_never_grow_the_stroke(
            x in -100.0f64..100.0,
            y in -100.0f64..100.0,
            dx in -0.7f64..0.7,
            dy in -0.7f64..0.7,
        ) {
            let mut points = vec![x, y];
            let accepted = append_freehand_point(&mut points, Point2::new(x + dx, y + dy), 1.0);
            prop_assert!(!accepted);
            prop_assert_eq!(points.len(), 2);
        }
    }
}
