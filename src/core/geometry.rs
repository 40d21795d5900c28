//! Planar geometry on contours and circles
//!
//! Everything here operates on plain point lists so the same code serves CAD
//! primitives (millimeters) and image contours (pixels).

use glam::DVec2;
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;

const EPS: f64 = 1e-9;

/// A 2D point; serialized as `[x, y]`
pub type Point2 = DVec2;

/// A circle; serialized as `{ "center": [x, y], "radius": r }`
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Circle {
    pub center: Point2,
    pub radius: f64,
}

impl Circle {
    pub const fn new(center: Point2, radius: f64) -> Self {
        Self { center, radius }
    }

    pub fn diameter(&self) -> f64 {
        2.0 * self.radius
    }

    pub fn area(&self) -> f64 {
        PI * self.radius * self.radius
    }

    fn contains(&self, p: &Point2) -> bool {
        self.center.distance(*p) <= self.radius + 1e-7
    }
}

/// Axis-aligned bounds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bounds {
    pub min: Point2,
    pub max: Point2,
}

impl Bounds {
    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }
}

/// Minimum-area bounding rectangle
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RotatedRect {
    pub center: Point2,
    pub width: f64,
    pub height: f64,
    /// Orientation of the `width` side, degrees
    pub angle_deg: f64,
}

pub fn bounds(points: &[Point2]) -> Option<Bounds> {
    let first = points.first()?;
    let mut min = *first;
    let mut max = *first;
    for p in &points[1..] {
        min.x = min.x.min(p.x);
        min.y = min.y.min(p.y);
        max.x = max.x.max(p.x);
        max.y = max.y.max(p.y);
    }
    Some(Bounds { min, max })
}

fn signed_area(points: &[Point2]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut sum = 0.0;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        sum += p.perp_dot(*q);
    }
    sum / 2.0
}

/// Enclosed area of a closed polygon (shoelace)
pub fn polygon_area(points: &[Point2]) -> f64 {
    signed_area(points).abs()
}

/// Perimeter of a closed polygon
pub fn perimeter(points: &[Point2]) -> f64 {
    if points.len() < 2 {
        return 0.0;
    }
    points
        .iter()
        .enumerate()
        .map(|(i, p)| p.distance(points[(i + 1) % points.len()]))
        .sum()
}

/// `4*pi*A / P^2`: 1.0 for a circle, ~0.785 for a square, 0 when degenerate
pub fn circularity(points: &[Point2]) -> f64 {
    let p = perimeter(points);
    if p <= EPS {
        return 0.0;
    }
    4.0 * PI * polygon_area(points) / (p * p)
}

/// Area centroid, falling back to the vertex mean for degenerate polygons
pub fn centroid(points: &[Point2]) -> Option<Point2> {
    if points.is_empty() {
        return None;
    }

    let a = signed_area(points);
    if a.abs() > EPS {
        let mut cx = 0.0;
        let mut cy = 0.0;
        for (i, p) in points.iter().enumerate() {
            let q = &points[(i + 1) % points.len()];
            let c = p.perp_dot(*q);
            cx += (p.x + q.x) * c;
            cy += (p.y + q.y) * c;
        }
        return Some(Point2::new(cx / (6.0 * a), cy / (6.0 * a)));
    }

    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point2::new(sx / n, sy / n))
}

/// Convex hull, counter-clockwise, without collinear points (monotone chain)
pub fn convex_hull(points: &[Point2]) -> Vec<Point2> {
    let mut pts: Vec<Point2> = points.to_vec();
    pts.sort_by(|a, b| a.x.total_cmp(&b.x).then(a.y.total_cmp(&b.y)));
    pts.dedup_by(|a, b| (a.x - b.x).abs() < EPS && (a.y - b.y).abs() < EPS);

    if pts.len() < 3 {
        return pts;
    }

    let turn = |o: &Point2, a: &Point2, b: &Point2| (*a - *o).perp_dot(*b - *o);

    let mut lower: Vec<Point2> = Vec::with_capacity(pts.len());
    for p in &pts {
        while lower.len() >= 2 && turn(&lower[lower.len() - 2], &lower[lower.len() - 1], p) <= EPS {
            lower.pop();
        }
        lower.push(*p);
    }

    let mut upper: Vec<Point2> = Vec::with_capacity(pts.len());
    for p in pts.iter().rev() {
        while upper.len() >= 2 && turn(&upper[upper.len() - 2], &upper[upper.len() - 1], p) <= EPS {
            upper.pop();
        }
        upper.push(*p);
    }

    lower.pop();
    upper.pop();
    lower.extend(upper);
    lower
}

/// Contour area over hull area; 0 for degenerate input
pub fn solidity(points: &[Point2]) -> f64 {
    let hull_area = polygon_area(&convex_hull(points));
    if hull_area <= EPS {
        return 0.0;
    }
    polygon_area(points) / hull_area
}

/// Ray-casting point-in-polygon test
pub fn point_in_polygon(p: &Point2, polygon: &[Point2]) -> bool {
    let n = polygon.len();
    if n < 3 {
        return false;
    }
    let mut inside = false;
    let mut j = n - 1;
    for i in 0..n {
        let (a, b) = (&polygon[i], &polygon[j]);
        if (a.y > p.y) != (b.y > p.y) {
            let x_cross = (b.x - a.x) * (p.y - a.y) / (b.y - a.y) + a.x;
            if p.x < x_cross {
                inside = !inside;
            }
        }
        j = i;
    }
    inside
}

fn circle_from_two(a: &Point2, b: &Point2) -> Circle {
    Circle::new((*a + *b) / 2.0, a.distance(*b) / 2.0)
}

fn circle_from_three(a: &Point2, b: &Point2, c: &Point2) -> Option<Circle> {
    let d = 2.0 * (a.x * (b.y - c.y) + b.x * (c.y - a.y) + c.x * (a.y - b.y));
    if d.abs() < EPS {
        return None;
    }
    let a2 = a.x * a.x + a.y * a.y;
    let b2 = b.x * b.x + b.y * b.y;
    let c2 = c.x * c.x + c.y * c.y;
    let ux = (a2 * (b.y - c.y) + b2 * (c.y - a.y) + c2 * (a.y - b.y)) / d;
    let uy = (a2 * (c.x - b.x) + b2 * (a.x - c.x) + c2 * (b.x - a.x)) / d;
    let center = Point2::new(ux, uy);
    Some(Circle::new(center, center.distance(*a)))
}

/// Smallest circle containing every point
///
/// Runs the incremental Welzl construction on the convex hull, which keeps
/// the point count small for dense image contours.
pub fn min_enclosing_circle(points: &[Point2]) -> Option<Circle> {
    let hull = convex_hull(points);
    let pts = if hull.is_empty() { points.to_vec() } else { hull };
    let first = pts.first()?;

    let mut circle = Circle::new(*first, 0.0);
    for i in 1..pts.len() {
        if circle.contains(&pts[i]) {
            continue;
        }
        circle = Circle::new(pts[i], 0.0);
        for j in 0..i {
            if circle.contains(&pts[j]) {
                continue;
            }
            circle = circle_from_two(&pts[i], &pts[j]);
            for k in 0..j {
                if circle.contains(&pts[k]) {
                    continue;
                }
                circle = circle_from_three(&pts[i], &pts[j], &pts[k])
                    .unwrap_or_else(|| circle_from_two(&pts[i], &pts[k]));
            }
        }
    }
    Some(circle)
}

/// Minimum-area enclosing rectangle (rotating the frame onto each hull edge)
pub fn min_area_rect(points: &[Point2]) -> Option<RotatedRect> {
    let hull = convex_hull(points);
    if hull.len() < 3 {
        let b = bounds(points)?;
        return Some(RotatedRect {
            center: Point2::new((b.min.x + b.max.x) / 2.0, (b.min.y + b.max.y) / 2.0),
            width: b.width(),
            height: b.height(),
            angle_deg: 0.0,
        });
    }

    let mut best: Option<RotatedRect> = None;
    let mut best_area = f64::INFINITY;

    for i in 0..hull.len() {
        let edge = hull[(i + 1) % hull.len()] - hull[i];
        let len = edge.length();
        if len <= EPS {
            continue;
        }
        let u = edge / len;
        let v = u.perp();

        let (mut min_u, mut max_u) = (f64::INFINITY, f64::NEG_INFINITY);
        let (mut min_v, mut max_v) = (f64::INFINITY, f64::NEG_INFINITY);
        for p in &hull {
            let pu = p.dot(u);
            let pv = p.dot(v);
            min_u = min_u.min(pu);
            max_u = max_u.max(pu);
            min_v = min_v.min(pv);
            max_v = max_v.max(pv);
        }

        let width = max_u - min_u;
        let height = max_v - min_v;
        let area = width * height;
        if area < best_area {
            best_area = area;
            let cu = (min_u + max_u) / 2.0;
            let cv = (min_v + max_v) / 2.0;
            best = Some(RotatedRect {
                center: u * cu + v * cv,
                width,
                height,
                angle_deg: u.y.atan2(u.x).to_degrees(),
            });
        }
    }

    best
}

fn perpendicular_distance(p: &Point2, a: &Point2, b: &Point2) -> f64 {
    let ab = *b - *a;
    let len = ab.length();
    if len <= EPS {
        return p.distance(*a);
    }
    ab.perp_dot(*p - *a).abs() / len
}

fn douglas_peucker(points: &[Point2], epsilon: f64, out: &mut Vec<Point2>) {
    let (first, last) = (points[0], points[points.len() - 1]);
    let mut max_dist = 0.0;
    let mut index = 0;
    for (i, p) in points.iter().enumerate().take(points.len() - 1).skip(1) {
        let d = perpendicular_distance(p, &first, &last);
        if d > max_dist {
            max_dist = d;
            index = i;
        }
    }

    if max_dist > epsilon {
        douglas_peucker(&points[..=index], epsilon, out);
        out.pop();
        douglas_peucker(&points[index..], epsilon, out);
    } else {
        out.push(first);
        out.push(last);
    }
}

/// Polygon approximation of a closed contour (Douglas-Peucker)
///
/// The contour is split at its first point and the point farthest from it,
/// each half is simplified, and the halves are rejoined.
pub fn approx_polygon(points: &[Point2], epsilon: f64) -> Vec<Point2> {
    if points.len() < 3 {
        return points.to_vec();
    }

    let start = points[0];
    let far = points
        .iter()
        .enumerate()
        .max_by(|a, b| start.distance(*a.1).total_cmp(&start.distance(*b.1)))
        .map(|(i, _)| i)
        .unwrap_or(0);
    if far == 0 {
        return vec![start];
    }

    let mut first_half = Vec::new();
    douglas_peucker(&points[..=far], epsilon, &mut first_half);

    let mut second: Vec<Point2> = points[far..].to_vec();
    second.push(start);
    let mut second_half = Vec::new();
    douglas_peucker(&second, epsilon, &mut second_half);

    first_half.pop();
    second_half.pop();
    first_half.extend(second_half);
    first_half
}

/// Width of the point set measured along each hull edge normal
///
/// For a regular hexagon every entry equals the across-flats distance.
pub fn edge_normal_spans(hull: &[Point2]) -> Vec<f64> {
    let mut spans = Vec::with_capacity(hull.len());
    for i in 0..hull.len() {
        let edge = hull[(i + 1) % hull.len()] - hull[i];
        let len = edge.length();
        if len <= EPS {
            continue;
        }
        let normal = edge.perp() / len;
        let (lo, hi) = hull.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
            let proj = p.dot(normal);
            (lo.min(proj), hi.max(proj))
        });
        spans.push(hi - lo);
    }
    spans
}

/// Median by sorted position `len / 2` (upper median for even counts)
pub fn median(values: &[f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    Some(sorted[sorted.len() / 2])
}
