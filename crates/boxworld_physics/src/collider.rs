//! Oriented box collider
//!
//! Narrow-phase detection between two oriented boxes uses the separating axis
//! test restricted to the 3 + 3 face normals of the boxes. Edge-edge axes are
//! not tested. When the boxes overlap, contact points are produced by clipping
//! the incident face against the side planes of the reference face.

use boxworld_math::{Quaternion, Vec3};
use serde::{Deserialize, Serialize};

use crate::contact::{ContactPoint, Manifold};
use crate::raycast::Triangle;

/// Axes shorter than this are skipped by the separating axis test
const AXIS_EPSILON: f32 = 1e-6;

/// Contact points closer than this are merged
const MERGE_EPSILON: f32 = 1e-5;

/// Slack used when testing whether a corner lies inside a box
const CONTAINMENT_TOLERANCE: f32 = 1e-4;

/// Corner indices of each of the six faces, in cyclic order
const FACE_CORNERS: [[usize; 4]; 6] = [
    [0, 4, 6, 2], // -X
    [1, 3, 7, 5], // +X
    [0, 1, 5, 4], // -Y
    [2, 6, 7, 3], // +Y
    [0, 2, 3, 1], // -Z
    [4, 5, 7, 6], // +Z
];

/// Box collision shape attached to a scene node
///
/// The collider stores no world state: the owning node's position and
/// orientation are supplied on every query through [`BoxCollider::pose`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BoxCollider {
    /// Full extent of the box on each axis
    pub size: Vec3,
    /// Trigger colliders report overlaps but are not resolved physically
    pub is_trigger: bool,
}

impl Default for BoxCollider {
    fn default() -> Self {
        Self::new(Vec3::ONE)
    }
}

impl BoxCollider {
    /// Create a solid box collider of the given size
    pub fn new(size: Vec3) -> Self {
        Self {
            size,
            is_trigger: false,
        }
    }

    /// Set whether this collider is a trigger
    pub fn with_trigger(mut self, is_trigger: bool) -> Self {
        self.is_trigger = is_trigger;
        self
    }

    /// Half of the box size on each axis
    #[inline]
    pub fn half_extents(&self) -> Vec3 {
        self.size * 0.5
    }

    /// World-space pose of this box for a node at `position` with `orientation`
    pub fn pose(&self, position: Vec3, orientation: Quaternion) -> BoxPose {
        BoxPose::new(position, orientation, self.half_extents())
    }

    /// Test this box against another and generate contacts
    ///
    /// Normals in the returned manifold point from `other` toward `self`.
    pub fn check_collision(
        &self,
        position: Vec3,
        orientation: Quaternion,
        other: &BoxCollider,
        other_position: Vec3,
        other_orientation: Quaternion,
    ) -> Option<Manifold> {
        collide_boxes(
            &self.pose(position, orientation),
            &other.pose(other_position, other_orientation),
        )
    }
}

/// Axis-aligned bounding box
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Aabb {
    pub min: Vec3,
    pub max: Vec3,
}

impl Aabb {
    /// Smallest box enclosing all `points`
    pub fn from_points(points: &[Vec3]) -> Self {
        let first = points.first().copied().unwrap_or(Vec3::ZERO);
        points.iter().fold(Self { min: first, max: first }, |acc, &p| Self {
            min: acc.min.min_components(p),
            max: acc.max.max_components(p),
        })
    }

    /// Check if two boxes overlap (touching counts as overlapping)
    pub fn intersects(&self, other: &Self) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    /// Check if a point lies inside (inclusive)
    pub fn contains(&self, p: Vec3) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Vec3 {
        (self.min + self.max) * 0.5
    }
}

/// An oriented box in world space
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct BoxPose {
    pub center: Vec3,
    pub orientation: Quaternion,
    pub half_extents: Vec3,
}

impl BoxPose {
    pub fn new(center: Vec3, orientation: Quaternion, half_extents: Vec3) -> Self {
        Self {
            center,
            orientation,
            half_extents,
        }
    }

    /// World-space directions of the box's local X, Y and Z axes
    pub fn axes(&self) -> [Vec3; 3] {
        self.orientation.axes()
    }

    /// The eight world-space corners
    ///
    /// Corner `i` uses the positive half extent on X when bit 0 is set,
    /// on Y when bit 1 is set and on Z when bit 2 is set.
    pub fn corners(&self) -> [Vec3; 8] {
        let axes = self.axes();
        let h = self.half_extents;
        let mut corners = [Vec3::ZERO; 8];
        for (i, corner) in corners.iter_mut().enumerate() {
            let sx = if i & 1 != 0 { h.x } else { -h.x };
            let sy = if i & 2 != 0 { h.y } else { -h.y };
            let sz = if i & 4 != 0 { h.z } else { -h.z };
            *corner = self.center + axes[0] * sx + axes[1] * sy + axes[2] * sz;
        }
        corners
    }

    /// World-space axis-aligned bounds
    pub fn aabb(&self) -> Aabb {
        Aabb::from_points(&self.corners())
    }

    /// The twelve triangles of the box surface
    pub fn triangles(&self) -> [Triangle; 12] {
        let c = self.corners();
        let mut triangles = [[Vec3::ZERO; 3]; 12];
        for (face, quad) in FACE_CORNERS.iter().enumerate() {
            triangles[face * 2] = [c[quad[0]], c[quad[1]], c[quad[2]]];
            triangles[face * 2 + 1] = [c[quad[0]], c[quad[2]], c[quad[3]]];
        }
        triangles
    }

    /// Check if a world-space point lies inside the box, within `tolerance`
    pub fn contains_point(&self, p: Vec3, tolerance: f32) -> bool {
        let local = p - self.center;
        let axes = self.axes();
        let h = self.half_extents.to_array();
        (0..3).all(|i| local.dot(axes[i]).abs() <= h[i] + tolerance)
    }

    /// Projection interval of the box onto `axis`
    fn project(&self, axes: &[Vec3; 3], axis: Vec3) -> (f32, f32) {
        let center = self.center.dot(axis);
        let h = self.half_extents.to_array();
        let radius: f32 = (0..3).map(|i| axis.dot(axes[i]).abs() * h[i]).sum();
        (center - radius, center + radius)
    }
}

/// Which box of the pair supplied the collision axis
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum AxisSource {
    First,
    Second,
}

/// Separating axis test and contact generation between two oriented boxes
///
/// Returns `None` when any face axis separates the boxes. Otherwise the
/// axis of smallest overlap becomes the collision normal (pointing from `b`
/// toward `a`) and its overlap the penetration depth. On ties the first axis
/// tested wins, testing `a`'s three axes before `b`'s.
pub fn collide_boxes(a: &BoxPose, b: &BoxPose) -> Option<Manifold> {
    let a_axes = a.axes();
    let b_axes = b.axes();

    let candidates = [
        (AxisSource::First, 0, a_axes[0]),
        (AxisSource::First, 1, a_axes[1]),
        (AxisSource::First, 2, a_axes[2]),
        (AxisSource::Second, 0, b_axes[0]),
        (AxisSource::Second, 1, b_axes[1]),
        (AxisSource::Second, 2, b_axes[2]),
    ];

    let mut best: Option<(f32, AxisSource, usize, Vec3)> = None;
    for (source, index, axis) in candidates {
        let length = axis.length();
        if length < AXIS_EPSILON {
            continue;
        }
        let axis = axis / length;

        let (a_min, a_max) = a.project(&a_axes, axis);
        let (b_min, b_max) = b.project(&b_axes, axis);
        let overlap = a_max.min(b_max) - a_min.max(b_min);
        if overlap <= 0.0 {
            return None;
        }

        if best.map_or(true, |(smallest, ..)| overlap < smallest) {
            best = Some((overlap, source, index, axis));
        }
    }

    let (depth, source, index, axis) = best?;
    let normal = if (a.center - b.center).dot(axis) < 0.0 {
        -axis
    } else {
        axis
    };

    let (reference, ref_axes, incident, inc_axes, reference_normal) = match source {
        AxisSource::First => (a, a_axes, b, b_axes, -normal),
        AxisSource::Second => (b, b_axes, a, a_axes, normal),
    };

    let mut points = clip_incident_face(
        reference,
        &ref_axes,
        index,
        reference_normal,
        incident,
        &inc_axes,
        normal,
        depth,
    );

    if points.is_empty() {
        points = contained_corners(a, b, normal, depth);
    }

    if points.is_empty() {
        // Edge-on overlap with no face or corner containment: use the
        // incident corner deepest behind the reference face.
        log::debug!("box overlap produced no clipped points, using deepest corner");
        let ref_face_center = reference.center + reference_normal * reference.half_extents.to_array()[index];
        let deepest = incident.corners().into_iter().min_by(|p, q| {
            let dp = (*p - ref_face_center).dot(reference_normal);
            let dq = (*q - ref_face_center).dot(reference_normal);
            dp.total_cmp(&dq)
        });
        if let Some(point) = deepest {
            points.push(ContactPoint::new(point, normal, depth));
        }
    }

    Some(Manifold {
        normal,
        depth,
        points,
    })
}

/// Clip the incident face against the reference face's side planes
///
/// Keeps clipped points that lie on or behind the reference face.
#[allow(clippy::too_many_arguments)]
fn clip_incident_face(
    reference: &BoxPose,
    ref_axes: &[Vec3; 3],
    ref_index: usize,
    reference_normal: Vec3,
    incident: &BoxPose,
    inc_axes: &[Vec3; 3],
    normal: Vec3,
    depth: f32,
) -> Vec<ContactPoint> {
    let ref_half = reference.half_extents.to_array();
    let inc_half = incident.half_extents.to_array();

    // Incident face: the face of the other box most anti-parallel to the reference face
    let mut inc_index = 0;
    let mut best_alignment = f32::NEG_INFINITY;
    for (i, axis) in inc_axes.iter().enumerate() {
        let alignment = axis.dot(reference_normal).abs();
        if alignment > best_alignment {
            best_alignment = alignment;
            inc_index = i;
        }
    }
    let inc_sign = if inc_axes[inc_index].dot(reference_normal) > 0.0 { -1.0 } else { 1.0 };
    let inc_face_center = incident.center + inc_axes[inc_index] * (inc_half[inc_index] * inc_sign);

    let (u, v) = other_axes(inc_index);
    let du = inc_axes[u] * inc_half[u];
    let dv = inc_axes[v] * inc_half[v];
    let mut polygon = vec![
        inc_face_center - du - dv,
        inc_face_center + du - dv,
        inc_face_center + du + dv,
        inc_face_center - du + dv,
    ];

    let (su, sv) = other_axes(ref_index);
    for side in [su, sv] {
        let axis = ref_axes[side];
        let extent = ref_half[side];
        let center = reference.center;
        polygon = clip_polygon(&polygon, |p| extent - (p - center).dot(axis));
        polygon = clip_polygon(&polygon, |p| extent + (p - center).dot(axis));
        if polygon.is_empty() {
            return Vec::new();
        }
    }

    let ref_face_center = reference.center + reference_normal * ref_half[ref_index];
    let mut points: Vec<ContactPoint> = Vec::with_capacity(polygon.len());
    for p in polygon {
        let point_depth = -(p - ref_face_center).dot(reference_normal);
        if point_depth >= 0.0 {
            push_unique(&mut points, ContactPoint::new(p, normal, point_depth.min(depth)));
        }
    }
    points
}

/// Corners of either box lying inside the other
fn contained_corners(a: &BoxPose, b: &BoxPose, normal: Vec3, depth: f32) -> Vec<ContactPoint> {
    let mut points = Vec::new();
    for corner in b.corners() {
        if a.contains_point(corner, CONTAINMENT_TOLERANCE) {
            push_unique(&mut points, ContactPoint::new(corner, normal, depth));
        }
    }
    for corner in a.corners() {
        if b.contains_point(corner, CONTAINMENT_TOLERANCE) {
            push_unique(&mut points, ContactPoint::new(corner, normal, depth));
        }
    }
    points
}

/// Sutherland-Hodgman clip of a convex polygon; keeps points where `distance >= 0`
fn clip_polygon(polygon: &[Vec3], distance: impl Fn(Vec3) -> f32) -> Vec<Vec3> {
    let mut clipped = Vec::with_capacity(polygon.len() + 2);
    for (i, &start) in polygon.iter().enumerate() {
        let end = polygon[(i + 1) % polygon.len()];
        let d_start = distance(start);
        let d_end = distance(end);

        if d_start >= 0.0 {
            clipped.push(start);
        }
        if (d_start >= 0.0) != (d_end >= 0.0) {
            let t = d_start / (d_start - d_end);
            clipped.push(start + (end - start) * t);
        }
    }
    clipped
}

fn push_unique(points: &mut Vec<ContactPoint>, contact: ContactPoint) {
    if !points
        .iter()
        .any(|p| p.point.approx_eq(contact.point, MERGE_EPSILON))
    {
        points.push(contact);
    }
}

fn other_axes(index: usize) -> (usize, usize) {
    match index {
        0 => (1, 2),
        1 => (0, 2),
        _ => (0, 1),
    }
}
