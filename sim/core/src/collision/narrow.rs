//! Narrow phase: pairwise shape queries producing a single deepest
//! contact per pair.

use nalgebra::Vector3;
use strider_types::Pose;

use super::Shape;

/// Raw result of a shape-pair query, before tangent frames and ownership
/// metadata are attached.
#[derive(Debug, Clone, Copy)]
pub struct ContactGeometry {
    /// Contact point in world space.
    pub point: Vector3<f64>,
    /// Unit normal from the first shape toward the second.
    pub normal: Vector3<f64>,
    /// Penetration depth (positive = overlapping).
    pub depth: f64,
}

/// Query a shape pair for penetration.
///
/// Returns `None` when the shapes are separated or when the pair has no
/// supported query (two half spaces). The normal always points from the
/// first shape toward the second.
#[must_use]
pub fn collide(
    shape_a: &Shape,
    pose_a: &Pose,
    shape_b: &Shape,
    pose_b: &Pose,
) -> Option<ContactGeometry> {
    if let Some(geometry) = collide_ordered(shape_a, pose_a, shape_b, pose_b) {
        return Some(geometry);
    }
    collide_ordered(shape_b, pose_b, shape_a, pose_a).map(|geometry| ContactGeometry {
        normal: -geometry.normal,
        ..geometry
    })
}

fn collide_ordered(
    shape_a: &Shape,
    pose_a: &Pose,
    shape_b: &Shape,
    pose_b: &Pose,
) -> Option<ContactGeometry> {
    match (*shape_a, *shape_b) {
        (Shape::Sphere { radius: ra }, Shape::Sphere { radius: rb }) => {
            sphere_sphere(&pose_a.translation, ra, &pose_b.translation, rb)
        }
        (Shape::Sphere { radius }, Shape::HalfSpace) => {
            sphere_half_space(&pose_a.translation, radius, pose_b)
        }
        (Shape::Sphere { radius }, Shape::Cuboid { half_extents }) => {
            sphere_cuboid(&pose_a.translation, radius, &half_extents, pose_b)
        }
        (
            Shape::Sphere { radius: ra },
            Shape::Capsule {
                radius: rb,
                half_length,
            },
        ) => {
            let (top, bottom) = capsule_segment(pose_b, half_length);
            let closest = closest_point_on_segment(&pose_a.translation, &top, &bottom);
            sphere_sphere(&pose_a.translation, ra, &closest, rb)
        }
        (
            Shape::Capsule {
                radius,
                half_length,
            },
            Shape::HalfSpace,
        ) => capsule_half_space(pose_a, radius, half_length, pose_b),
        (
            Shape::Capsule {
                radius: ra,
                half_length: la,
            },
            Shape::Capsule {
                radius: rb,
                half_length: lb,
            },
        ) => {
            let (a0, a1) = capsule_segment(pose_a, la);
            let (b0, b1) = capsule_segment(pose_b, lb);
            let (pa, pb) = closest_points_between_segments(&a0, &a1, &b0, &b1);
            sphere_sphere(&pa, ra, &pb, rb)
        }
        (
            Shape::Capsule {
                radius,
                half_length,
            },
            Shape::Cuboid { half_extents },
        ) => capsule_cuboid(pose_a, radius, half_length, &half_extents, pose_b),
        (Shape::Cuboid { half_extents }, Shape::HalfSpace) => {
            cuboid_half_space(&half_extents, pose_a, pose_b)
        }
        (Shape::Cuboid { half_extents: ha }, Shape::Cuboid { half_extents: hb }) => {
            cuboid_cuboid(&ha, pose_a, &hb, pose_b)
        }
        _ => None,
    }
}

fn sphere_sphere(
    center_a: &Vector3<f64>,
    radius_a: f64,
    center_b: &Vector3<f64>,
    radius_b: f64,
) -> Option<ContactGeometry> {
    let delta = center_b - center_a;
    let distance = delta.norm();
    let depth = radius_a + radius_b - distance;
    if depth <= 0.0 {
        return None;
    }
    // Coincident centers give no usable normal direction.
    if distance < 1e-10 {
        return None;
    }
    let normal = delta / distance;
    Some(ContactGeometry {
        point: center_a + normal * (radius_a - 0.5 * depth),
        normal,
        depth,
    })
}

fn half_space_normal(pose: &Pose) -> Vector3<f64> {
    pose.transform_vector(&Vector3::z())
}

fn sphere_half_space(
    center: &Vector3<f64>,
    radius: f64,
    plane: &Pose,
) -> Option<ContactGeometry> {
    let n = half_space_normal(plane);
    let distance = n.dot(&(center - plane.translation));
    let depth = radius - distance;
    if depth <= 0.0 {
        return None;
    }
    Some(ContactGeometry {
        point: center - n * radius,
        normal: -n,
        depth,
    })
}

fn capsule_segment(pose: &Pose, half_length: f64) -> (Vector3<f64>, Vector3<f64>) {
    let axis = pose.transform_vector(&Vector3::new(0.0, 0.0, half_length));
    (pose.translation + axis, pose.translation - axis)
}

fn capsule_half_space(
    capsule: &Pose,
    radius: f64,
    half_length: f64,
    plane: &Pose,
) -> Option<ContactGeometry> {
    let n = half_space_normal(plane);
    let (top, bottom) = capsule_segment(capsule, half_length);
    // The deeper cap center decides the contact.
    let d_top = n.dot(&(top - plane.translation));
    let d_bottom = n.dot(&(bottom - plane.translation));
    let (center, distance) = if d_top < d_bottom {
        (top, d_top)
    } else {
        (bottom, d_bottom)
    };
    let depth = radius - distance;
    if depth <= 0.0 {
        return None;
    }
    Some(ContactGeometry {
        point: center - n * radius,
        normal: -n,
        depth,
    })
}

fn sphere_cuboid(
    center: &Vector3<f64>,
    radius: f64,
    half_extents: &Vector3<f64>,
    cuboid: &Pose,
) -> Option<ContactGeometry> {
    let inverse = cuboid.inverse();
    let local = inverse.transform_point(center);
    let clamped = Vector3::new(
        local.x.clamp(-half_extents.x, half_extents.x),
        local.y.clamp(-half_extents.y, half_extents.y),
        local.z.clamp(-half_extents.z, half_extents.z),
    );
    let delta = local - clamped;
    let distance = delta.norm();

    if distance > 1e-10 {
        // Center outside the box: surface point is the clamp.
        let depth = radius - distance;
        if depth <= 0.0 {
            return None;
        }
        let normal_local = delta / distance;
        let surface = cuboid.transform_point(&clamped);
        // Normal from sphere toward box.
        let normal = -cuboid.transform_vector(&normal_local);
        Some(ContactGeometry {
            point: surface,
            normal,
            depth,
        })
    } else {
        // Center inside the box: exit through the nearest face.
        let mut best_axis = 0;
        let mut best_margin = half_extents.x - local.x.abs();
        for axis in 1..3 {
            let margin = half_extents[axis] - local[axis].abs();
            if margin < best_margin {
                best_margin = margin;
                best_axis = axis;
            }
        }
        let mut normal_local = Vector3::zeros();
        normal_local[best_axis] = local[best_axis].signum();
        let mut surface_local = local;
        surface_local[best_axis] = half_extents[best_axis] * normal_local[best_axis];
        Some(ContactGeometry {
            point: cuboid.transform_point(&surface_local),
            normal: -cuboid.transform_vector(&normal_local),
            depth: radius + best_margin,
        })
    }
}

fn capsule_cuboid(
    capsule: &Pose,
    radius: f64,
    half_length: f64,
    half_extents: &Vector3<f64>,
    cuboid: &Pose,
) -> Option<ContactGeometry> {
    let (top, bottom) = capsule_segment(capsule, half_length);
    // Distance from a segment point to the box is convex along the
    // segment; ternary search isolates the closest parameter.
    let inverse = cuboid.inverse();
    let distance_at = |t: f64| -> f64 {
        let p = top + (bottom - top) * t;
        let local = inverse.transform_point(&p);
        let clamped = Vector3::new(
            local.x.clamp(-half_extents.x, half_extents.x),
            local.y.clamp(-half_extents.y, half_extents.y),
            local.z.clamp(-half_extents.z, half_extents.z),
        );
        (local - clamped).norm()
    };
    let (mut lo, mut hi) = (0.0_f64, 1.0_f64);
    for _ in 0..48 {
        let m1 = lo + (hi - lo) / 3.0;
        let m2 = hi - (hi - lo) / 3.0;
        if distance_at(m1) <= distance_at(m2) {
            hi = m2;
        } else {
            lo = m1;
        }
    }
    let t = 0.5 * (lo + hi);
    let closest = top + (bottom - top) * t;
    sphere_cuboid(&closest, radius, half_extents, cuboid)
}

fn cuboid_vertices(half_extents: &Vector3<f64>, pose: &Pose) -> [Vector3<f64>; 8] {
    let mut vertices = [Vector3::zeros(); 8];
    for (i, vertex) in vertices.iter_mut().enumerate() {
        let sx = if i & 1 == 0 { -1.0 } else { 1.0 };
        let sy = if i & 2 == 0 { -1.0 } else { 1.0 };
        let sz = if i & 4 == 0 { -1.0 } else { 1.0 };
        let local = Vector3::new(
            sx * half_extents.x,
            sy * half_extents.y,
            sz * half_extents.z,
        );
        *vertex = pose.transform_point(&local);
    }
    vertices
}

fn cuboid_half_space(
    half_extents: &Vector3<f64>,
    cuboid: &Pose,
    plane: &Pose,
) -> Option<ContactGeometry> {
    let n = half_space_normal(plane);
    let mut best: Option<(Vector3<f64>, f64)> = None;
    for vertex in cuboid_vertices(half_extents, cuboid) {
        let distance = n.dot(&(vertex - plane.translation));
        let deeper = best.is_none_or(|(_, d)| distance < d);
        if deeper {
            best = Some((vertex, distance));
        }
    }
    let (vertex, distance) = best?;
    if distance >= 0.0 {
        return None;
    }
    Some(ContactGeometry {
        point: vertex,
        normal: -n,
        depth: -distance,
    })
}

/// Separating-axis query over the 15 candidate axes. The minimum-overlap
/// axis provides the normal; the contact point is the midpoint between
/// the two support points along it, which is adequate for a single-point
/// contact model.
fn cuboid_cuboid(
    half_a: &Vector3<f64>,
    pose_a: &Pose,
    half_b: &Vector3<f64>,
    pose_b: &Pose,
) -> Option<ContactGeometry> {
    let ra = pose_a.rotation.to_rotation_matrix().into_inner();
    let rb = pose_b.rotation.to_rotation_matrix().into_inner();
    let d = pose_b.translation - pose_a.translation;

    let mut axes: Vec<Vector3<f64>> = Vec::with_capacity(15);
    for i in 0..3 {
        axes.push(ra.column(i).into_owned());
        axes.push(rb.column(i).into_owned());
    }
    for i in 0..3 {
        for j in 0..3 {
            let cross = ra.column(i).cross(&rb.column(j));
            // Parallel edges contribute no new axis.
            if cross.norm_squared() > 1e-12 {
                axes.push(cross.normalize());
            }
        }
    }

    let mut best: Option<(f64, Vector3<f64>)> = None;
    for axis in axes {
        let project = |r: &nalgebra::Matrix3<f64>, half: &Vector3<f64>| -> f64 {
            (0..3)
                .map(|i| half[i] * r.column(i).dot(&axis).abs())
                .sum()
        };
        let overlap = project(&ra, half_a) + project(&rb, half_b) - d.dot(&axis).abs();
        if overlap <= 0.0 {
            return None;
        }
        if best.is_none_or(|(o, _)| overlap < o) {
            let oriented = if d.dot(&axis) >= 0.0 { axis } else { -axis };
            best = Some((overlap, oriented));
        }
    }
    let (depth, normal) = best?;

    let support = |r: &nalgebra::Matrix3<f64>,
                   half: &Vector3<f64>,
                   center: &Vector3<f64>,
                   direction: &Vector3<f64>|
     -> Vector3<f64> {
        let mut point = *center;
        for i in 0..3 {
            let axis = r.column(i).into_owned();
            let sign = if axis.dot(direction) >= 0.0 { 1.0 } else { -1.0 };
            point += axis * (sign * half[i]);
        }
        point
    };
    let deepest_a = support(&ra, half_a, &pose_a.translation, &normal);
    let deepest_b = support(&rb, half_b, &pose_b.translation, &-normal);

    Some(ContactGeometry {
        point: 0.5 * (deepest_a + deepest_b),
        normal,
        depth,
    })
}

fn closest_point_on_segment(
    point: &Vector3<f64>,
    a: &Vector3<f64>,
    b: &Vector3<f64>,
) -> Vector3<f64> {
    let ab = b - a;
    let len_sq = ab.norm_squared();
    if len_sq < 1e-20 {
        return *a;
    }
    let t = ((point - a).dot(&ab) / len_sq).clamp(0.0, 1.0);
    a + ab * t
}

/// Closest points between segments `[a0, a1]` and `[b0, b1]`.
fn closest_points_between_segments(
    a0: &Vector3<f64>,
    a1: &Vector3<f64>,
    b0: &Vector3<f64>,
    b1: &Vector3<f64>,
) -> (Vector3<f64>, Vector3<f64>) {
    let d1 = a1 - a0;
    let d2 = b1 - b0;
    let r = a0 - b0;
    let aa = d1.norm_squared();
    let ee = d2.norm_squared();
    let f = d2.dot(&r);

    let (s, t);
    if aa < 1e-20 && ee < 1e-20 {
        return (*a0, *b0);
    }
    if aa < 1e-20 {
        s = 0.0;
        t = (f / ee).clamp(0.0, 1.0);
    } else {
        let c = d1.dot(&r);
        if ee < 1e-20 {
            t = 0.0;
            s = (-c / aa).clamp(0.0, 1.0);
        } else {
            let b = d1.dot(&d2);
            let denom = aa * ee - b * b;
            let mut s_val = if denom > 1e-20 {
                ((b * f - c * ee) / denom).clamp(0.0, 1.0)
            } else {
                0.0
            };
            let mut t_val = (b * s_val + f) / ee;
            if t_val < 0.0 {
                t_val = 0.0;
                s_val = (-c / aa).clamp(0.0, 1.0);
            } else if t_val > 1.0 {
                t_val = 1.0;
                s_val = ((b - c) / aa).clamp(0.0, 1.0);
            }
            s = s_val;
            t = t_val;
        }
    }
    (a0 + d1 * s, b0 + d2 * t)
}
