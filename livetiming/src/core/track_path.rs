use helpers::general::wrap_progress;
use helpers::geometry::{Point2d, Vector2d};

/// TrackPath is the arc-length index of a closed track centerline. The last point is expected to
/// equal the first one such that the loop closes.
///
/// * `points` - (m) Vertices of the centerline
/// * `s_cum` - (m) Cumulative arc length at each vertex (starts with 0.0)
#[derive(Debug, Clone)]
pub struct TrackPath {
    points: Vec<Point2d>,
    s_cum: Vec<f64>,
}

impl TrackPath {
    /// build returns None if the geometry is unusable, i.e. fewer than 2 points or a total length
    /// of zero.
    pub fn build(points: &[Point2d]) -> Option<TrackPath> {
        if points.len() < 2 {
            return None;
        }

        let mut s_cum = Vec::with_capacity(points.len());
        s_cum.push(0.0);

        for i in 1..points.len() {
            s_cum.push(s_cum[i - 1] + points[i - 1].dist(&points[i]));
        }

        let length = s_cum[s_cum.len() - 1];
        if !(length > 0.0 && length.is_finite()) {
            return None;
        }

        Some(TrackPath {
            points: points.to_vec(),
            s_cum,
        })
    }

    pub fn length(&self) -> f64 {
        self.s_cum[self.s_cum.len() - 1]
    }

    pub fn points(&self) -> &[Point2d] {
        &self.points
    }

    /// locate returns the index of the first vertex of the segment containing lap fraction `p`
    /// and the interpolation fraction within that segment.
    fn locate(&self, p: f64) -> (usize, f64) {
        let s = wrap_progress(p) * self.length();

        // first vertex whose cumulative length exceeds s, zero-length segments are skipped
        let idx_next = self.s_cum.partition_point(|&s_el| s_el <= s);
        let idx = idx_next.saturating_sub(1).min(self.points.len() - 2);

        let seg_length = self.s_cum[idx + 1] - self.s_cum[idx];
        let u = if seg_length > 0.0 {
            ((s - self.s_cum[idx]) / seg_length).clamp(0.0, 1.0)
        } else {
            0.0
        };

        (idx, u)
    }

    /// point_at_progress maps a lap fraction onto the centerline.
    pub fn point_at_progress(&self, p: f64) -> Point2d {
        let (idx, u) = self.locate(p);
        self.points[idx].lerp(&self.points[idx + 1], u)
    }

    /// point_and_tangent_at_progress additionally returns the unit direction of the segment the
    /// point lies on. This tangent jumps at the vertices and at the seam, see
    /// stable_tangent_at_progress.
    pub fn point_and_tangent_at_progress(&self, p: f64) -> Option<(Point2d, Vector2d)> {
        let (idx, u) = self.locate(p);
        let point = self.points[idx].lerp(&self.points[idx + 1], u);
        let tangent = self.points[idx + 1]
            .as_vector2d()
            .sub(&self.points[idx].as_vector2d())
            .normalized()?;

        Some((point, tangent))
    }

    /// stable_tangent_at_progress returns the direction between two points straddling `p` at
    /// +-`eps`, which does not flicker when the target sits on the seam of the loop.
    pub fn stable_tangent_at_progress(&self, p: f64, eps: f64) -> Option<Vector2d> {
        let p_before = self.point_at_progress(wrap_progress(p - eps));
        let p_after = self.point_at_progress(wrap_progress(p + eps));

        p_after
            .as_vector2d()
            .sub(&p_before.as_vector2d())
            .normalized()
    }

    /// sub_path returns the points tracing the loop from `p_start` to `p_end`, wrapping through
    /// the start/finish line if `p_end < p_start`.
    pub fn sub_path(&self, p_start: f64, p_end: f64) -> Vec<Point2d> {
        let p_start = wrap_progress(p_start);
        let p_end = wrap_progress(p_end);
        let s_start = p_start * self.length();
        let s_end = p_end * self.length();

        let mut path = vec![self.point_at_progress(p_start)];

        if p_end >= p_start {
            path.extend(
                self.points
                    .iter()
                    .zip(self.s_cum.iter())
                    .filter(|&(_, &s)| s_start < s && s < s_end)
                    .map(|(point, _)| *point),
            );
        } else {
            // up to the closing vertex ...
            path.extend(
                self.points
                    .iter()
                    .zip(self.s_cum.iter())
                    .filter(|&(_, &s)| s_start < s)
                    .map(|(point, _)| *point),
            );
            // ... and on from the start of the loop (vertex 0 equals the closing vertex)
            path.extend(
                self.points
                    .iter()
                    .zip(self.s_cum.iter())
                    .filter(|&(_, &s)| 0.0 < s && s < s_end)
                    .map(|(point, _)| *point),
            );
        }

        path.push(self.point_at_progress(p_end));
        path
    }
}
