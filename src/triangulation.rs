//! Delaunay triangulation of scattered points in the plane.
//!
//! This is a plain Bowyer-Watson insertion: points are added one at a time,
//! every triangle whose circumcircle contains the new point is removed, and the
//! resulting cavity is re-triangulated around the new point. It is quadratic in
//! the worst case, which is fine for the few thousand soundings a single
//! retrieval file contributes to a regional box.
//!
//! Points are inserted in input order and the boundary of each cavity is walked
//! in a fixed order, so the same input always gives the same triangles.
use std::collections::{HashMap, HashSet};

use itertools::Itertools;

/// Relative size of the initial enclosing triangle compared to the point cloud.
/// Too small and triangles along the convex hull can go missing.
const SUPER_TRIANGLE_SCALE: f64 = 1000.0;

/// Relative area below which a point set is treated as collinear.
const COLLINEAR_TOLERANCE: f64 = 1e-12;

#[derive(Debug, Clone)]
pub struct Triangulation {
    points: Vec<[f64; 2]>,
    triangles: Vec<[usize; 3]>,
}

impl Triangulation {
    /// Triangulate `points`, given as `[x, y]` pairs.
    ///
    /// Points with a non-finite coordinate are ignored, and if the same location
    /// appears more than once only its first occurrence is used. If fewer than three
    /// usable points remain, or all of them lie on one line, the triangulation is
    /// empty. Vertex indices in [`Triangulation::triangles`] always refer to
    /// positions in the original `points` slice.
    pub fn new(points: &[[f64; 2]]) -> Self {
        let mut seen = HashSet::new();
        let kept = points
            .iter()
            .enumerate()
            .filter(|(_, p)| p[0].is_finite() && p[1].is_finite())
            .filter(|(_, p)| seen.insert((p[0].to_bits(), p[1].to_bits())))
            .map(|(i, _)| i)
            .collect_vec();

        let triangles = if kept.len() < 3 || is_collinear(points, &kept) {
            vec![]
        } else {
            bowyer_watson(points, &kept)
        };

        Self { points: points.to_vec(), triangles }
    }

    pub fn triangles(&self) -> &[[usize; 3]] {
        &self.triangles
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    /// The three vertices of triangle `itri`, in counter-clockwise order.
    pub fn vertices(&self, itri: usize) -> [[f64; 2]; 3] {
        let [a, b, c] = self.triangles[itri];
        [self.points[a], self.points[b], self.points[c]]
    }
}

/// Twice the signed area of (a, b, c); positive when counter-clockwise.
fn orient(a: [f64; 2], b: [f64; 2], c: [f64; 2]) -> f64 {
    (b[0] - a[0]) * (c[1] - a[1]) - (b[1] - a[1]) * (c[0] - a[0])
}

fn is_collinear(points: &[[f64; 2]], kept: &[usize]) -> bool {
    let (xmin, xmax, ymin, ymax) = extent(points, kept);
    let scale = (xmax - xmin).max(ymax - ymin);
    if scale == 0.0 {
        return true;
    }

    let a = points[kept[0]];
    // Use the point furthest from the first as the second anchor, so that the
    // line through the anchors is as well-conditioned as possible.
    let b = kept
        .iter()
        .map(|&i| points[i])
        .max_by(|p, q| dist2(a, *p).total_cmp(&dist2(a, *q)))
        .unwrap_or(a);

    let tol = COLLINEAR_TOLERANCE * scale * scale;
    kept.iter().all(|&i| orient(a, b, points[i]).abs() <= tol)
}

fn dist2(a: [f64; 2], b: [f64; 2]) -> f64 {
    (a[0] - b[0]).powi(2) + (a[1] - b[1]).powi(2)
}

fn extent(points: &[[f64; 2]], kept: &[usize]) -> (f64, f64, f64, f64) {
    kept.iter().map(|&i| points[i]).fold(
        (f64::INFINITY, f64::NEG_INFINITY, f64::INFINITY, f64::NEG_INFINITY),
        |(xmin, xmax, ymin, ymax), p| (xmin.min(p[0]), xmax.max(p[0]), ymin.min(p[1]), ymax.max(p[1])),
    )
}

/// Is `d` strictly inside the circumcircle of the counter-clockwise triangle (a, b, c)?
fn in_circumcircle(a: [f64; 2], b: [f64; 2], c: [f64; 2], d: [f64; 2]) -> bool {
    let (adx, ady) = (a[0] - d[0], a[1] - d[1]);
    let (bdx, bdy) = (b[0] - d[0], b[1] - d[1]);
    let (cdx, cdy) = (c[0] - d[0], c[1] - d[1]);

    let ad = adx * adx + ady * ady;
    let bd = bdx * bdx + bdy * bdy;
    let cd = cdx * cdx + cdy * cdy;

    let det = adx * (bdy * cd - bd * cdy) - ady * (bdx * cd - bd * cdx) + ad * (bdx * cdy - bdy * cdx);
    det > 0.0
}

fn bowyer_watson(points: &[[f64; 2]], kept: &[usize]) -> Vec<[usize; 3]> {
    // Work in a local vertex list: the kept points first, then the three super
    // triangle corners.
    let mut verts = kept.iter().map(|&i| points[i]).collect_vec();
    let n = verts.len();

    let (xmin, xmax, ymin, ymax) = extent(points, kept);
    let cx = 0.5 * (xmin + xmax);
    let cy = 0.5 * (ymin + ymax);
    let d = (xmax - xmin).max(ymax - ymin) * SUPER_TRIANGLE_SCALE;
    verts.push([cx - 2.0 * d, cy - d]);
    verts.push([cx + 2.0 * d, cy - d]);
    verts.push([cx, cy + 2.0 * d]);

    let mut tris: Vec<[usize; 3]> = vec![[n, n + 1, n + 2]];

    for ip in 0..n {
        let p = verts[ip];
        let (bad, good): (Vec<[usize; 3]>, Vec<[usize; 3]>) = tris
            .into_iter()
            .partition(|t| in_circumcircle(verts[t[0]], verts[t[1]], verts[t[2]], p));

        // An edge shared by two removed triangles is interior to the cavity; the
        // rest form its boundary. Keep the boundary in discovery order.
        let mut edge_count: HashMap<(usize, usize), usize> = HashMap::new();
        for t in bad.iter() {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                *edge_count.entry((a.min(b), a.max(b))).or_insert(0) += 1;
            }
        }

        tris = good;
        for t in bad.iter() {
            for (a, b) in [(t[0], t[1]), (t[1], t[2]), (t[2], t[0])] {
                if edge_count[&(a.min(b), a.max(b))] == 1 {
                    let new_tri = [a, b, ip];
                    // Boundary edges keep the counter-clockwise direction of their
                    // old triangle, so the point is on their left. Guard against
                    // slivers from round-off anyway.
                    if orient(verts[a], verts[b], p) > 0.0 {
                        tris.push(new_tri);
                    } else {
                        log::trace!("Dropping degenerate triangle {new_tri:?}");
                    }
                }
            }
        }
    }

    tris.into_iter()
        .filter(|t| t.iter().all(|&v| v < n))
        .map(|t| [kept[t[0]], kept[t[1]], kept[t[2]]])
        .collect()
}
