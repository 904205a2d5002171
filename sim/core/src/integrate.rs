//! Semi-implicit state integration.
//!
//! Velocities absorb the full acceleration step and the full impulse
//! delta; positions advance with the updated-velocity midpoint rule,
//! counting only half the impulse delta (the impulse acts at the start
//! of the step, so its average position contribution over the step is
//! half). Rotational coordinates advance through a local rotation-vector
//! exponential rather than coordinate-wise addition.

use nalgebra::{UnitQuaternion, Vector2, Vector3};

use crate::multibody::joint::{JointKind, JointPosition};
use crate::multibody::{RobotModel, RobotState};

/// Advance joint positions and velocities by one step of `dt`.
///
/// Consumes `state.qd` (start-of-tick velocities), `state.qdd` (forward
/// dynamics), and `state.delta_qd` (impulse resolution), then refreshes
/// the body poses. Accumulators are left untouched; the engine clears
/// them at the start of the next tick.
pub fn integrate(model: &RobotModel, state: &mut RobotState, dt: f64) {
    for (i, joint) in model.joints.iter().enumerate() {
        let range = model.dof_range(i.into());
        match (joint.kind, &mut state.positions[i]) {
            (JointKind::Fixed, JointPosition::Empty) => {}
            (
                JointKind::Revolute { .. } | JointKind::Prismatic { .. },
                JointPosition::Scalar(q),
            ) => {
                let dof = range.start;
                let qd = state.qd[dof];
                let qdd = state.qdd[dof];
                let dv = state.delta_qd[dof];
                *q += (qd + 0.5 * dv) * dt + 0.5 * qdd * dt * dt;
                state.qd[dof] = qd + qdd * dt + dv;
            }
            (JointKind::Spherical, JointPosition::Orientation(orientation)) => {
                let o = range.start;
                let omega = Vector3::new(state.qd[o], state.qd[o + 1], state.qd[o + 2]);
                let alpha = Vector3::new(state.qdd[o], state.qdd[o + 1], state.qdd[o + 2]);
                let dv = Vector3::new(
                    state.delta_qd[o],
                    state.delta_qd[o + 1],
                    state.delta_qd[o + 2],
                );
                let rotation_vector = (omega + 0.5 * dv) * dt + 0.5 * alpha * dt * dt;
                // Velocities live in the frame after the joint, so the
                // increment appends on the right.
                *orientation *= UnitQuaternion::from_scaled_axis(rotation_vector);
                let omega_new = omega + alpha * dt + dv;
                for k in 0..3 {
                    state.qd[o + k] = omega_new[k];
                }
            }
            (JointKind::Planar, JointPosition::Planar { x, z, pitch }) => {
                let o = range.start;
                // DoF order: in-plane x, in-plane z, pitch about y, all in
                // the frame after the joint.
                let vx = state.qd[o];
                let vz = state.qd[o + 1];
                let wy = state.qd[o + 2];
                let (ax, az, ay) = (state.qdd[o], state.qdd[o + 1], state.qdd[o + 2]);
                let (dvx, dvz, dwy) = (
                    state.delta_qd[o],
                    state.delta_qd[o + 1],
                    state.delta_qd[o + 2],
                );

                let dpitch = (wy + 0.5 * dwy) * dt + 0.5 * ay * dt * dt;
                let local_delta = Vector2::new(
                    (vx + 0.5 * dvx) * dt + 0.5 * ax * dt * dt,
                    (vz + 0.5 * dvz) * dt + 0.5 * az * dt * dt,
                );
                // Rotate the in-plane delta by the pre-update pitch. A
                // positive pitch about +y maps +x toward -z.
                let (sin, cos) = pitch.sin_cos();
                *x += cos * local_delta.x + sin * local_delta.y;
                *z += -sin * local_delta.x + cos * local_delta.y;
                *pitch += dpitch;

                // Re-express the in-plane velocity in the rotated frame.
                let vx_new = vx + ax * dt + dvx;
                let vz_new = vz + az * dt + dvz;
                let (dsin, dcos) = dpitch.sin_cos();
                state.qd[o] = dcos * vx_new - dsin * vz_new;
                state.qd[o + 1] = dsin * vx_new + dcos * vz_new;
                state.qd[o + 2] = wy + ay * dt + dwy;
            }
            (JointKind::Floating, JointPosition::Pose(pose)) => {
                let o = range.start;
                let omega = Vector3::new(state.qd[o], state.qd[o + 1], state.qd[o + 2]);
                let v = Vector3::new(state.qd[o + 3], state.qd[o + 4], state.qd[o + 5]);
                let alpha = Vector3::new(state.qdd[o], state.qdd[o + 1], state.qdd[o + 2]);
                let a = Vector3::new(state.qdd[o + 3], state.qdd[o + 4], state.qdd[o + 5]);
                let domega = Vector3::new(
                    state.delta_qd[o],
                    state.delta_qd[o + 1],
                    state.delta_qd[o + 2],
                );
                let dv = Vector3::new(
                    state.delta_qd[o + 3],
                    state.delta_qd[o + 4],
                    state.delta_qd[o + 5],
                );

                let rotation_vector = (omega + 0.5 * domega) * dt + 0.5 * alpha * dt * dt;
                let orientation_change = UnitQuaternion::from_scaled_axis(rotation_vector);

                // Translation advances in the pre-update body frame, then
                // maps to the parent through the pre-update orientation.
                let local_translation = (v + 0.5 * dv) * dt + 0.5 * a * dt * dt;
                pose.translation += pose.rotation * local_translation;
                pose.rotation *= orientation_change;

                let omega_new = omega + alpha * dt + domega;
                // Linear velocity stays expressed in the (now rotated)
                // body frame.
                let v_new = orientation_change.inverse_transform_vector(&(v + a * dt + dv));
                for k in 0..3 {
                    state.qd[o + k] = omega_new[k];
                    state.qd[o + 3 + k] = v_new[k];
                }
            }
            // The builder pairs every kind with its representation.
            _ => unreachable!("joint position representation mismatch"),
        }
    }
    state.update_frames(model);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multibody::RobotBuilder;
    use approx::assert_relative_eq;
    use strider_types::{MassProperties, Pose};

    #[test]
    fn scalar_joint_follows_constant_acceleration() {
        let mut builder = RobotBuilder::new("slider");
        builder.add_body(
            "mass",
            "slide",
            JointKind::Prismatic {
                axis: Vector3::z_axis(),
            },
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        let (model, mut state) = builder.finish().expect("valid robot");

        let dt = 0.01;
        state.qdd[0] = -9.81;
        integrate(&model, &mut state, dt);

        assert_relative_eq!(state.qd[0], -9.81 * dt, epsilon = 1e-12);
        let JointPosition::Scalar(q) = state.positions[0] else {
            panic!("scalar joint");
        };
        assert_relative_eq!(q, -0.5 * 9.81 * dt * dt, epsilon = 1e-12);
    }

    #[test]
    fn impulse_delta_counts_half_in_position() {
        let mut builder = RobotBuilder::new("slider");
        let body = builder.add_body(
            "mass",
            "slide",
            JointKind::Prismatic {
                axis: Vector3::z_axis(),
            },
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        builder.set_initial_velocity(body, &[1.0]);
        let (model, mut state) = builder.finish().expect("valid robot");

        let dt = 0.1;
        state.delta_qd[0] = -2.0;
        integrate(&model, &mut state, dt);

        // Velocity reverses fully, position sees the midpoint.
        assert_relative_eq!(state.qd[0], -1.0, epsilon = 1e-12);
        let JointPosition::Scalar(q) = state.positions[0] else {
            panic!("scalar joint");
        };
        assert_relative_eq!(q, (1.0 - 1.0) * dt, epsilon = 1e-12);
    }

    #[test]
    fn spherical_spin_accumulates_orientation() {
        let mut builder = RobotBuilder::new("gyro");
        let body = builder.add_body(
            "rotor",
            "ball",
            JointKind::Spherical,
            None,
            Pose::identity(),
            MassProperties::solid_sphere(1.0, 0.1),
        );
        builder.set_initial_velocity(body, &[0.0, 1.0, 0.0]);
        let (model, mut state) = builder.finish().expect("valid robot");

        let dt = 0.01;
        for _ in 0..100 {
            integrate(&model, &mut state, dt);
        }
        let JointPosition::Orientation(orientation) = state.positions[0] else {
            panic!("spherical joint");
        };
        // One second of 1 rad/s about y.
        let expected = UnitQuaternion::from_axis_angle(&Vector3::y_axis(), 1.0);
        assert_relative_eq!(orientation.angle_to(&expected), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn floating_translation_uses_body_frame_velocity() {
        let mut builder = RobotBuilder::new("brick");
        let body = builder.add_body(
            "brick",
            "root",
            JointKind::Floating,
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        // Body yawed 90° about z; +x body velocity should move it along +y.
        builder.set_initial_position(
            body,
            JointPosition::Pose(Pose::from_rotation(UnitQuaternion::from_axis_angle(
                &Vector3::z_axis(),
                std::f64::consts::FRAC_PI_2,
            ))),
        );
        builder.set_initial_velocity(body, &[0.0, 0.0, 0.0, 1.0, 0.0, 0.0]);
        let (model, mut state) = builder.finish().expect("valid robot");

        integrate(&model, &mut state, 0.1);
        let JointPosition::Pose(pose) = state.positions[0] else {
            panic!("floating joint");
        };
        assert_relative_eq!(pose.translation, Vector3::new(0.0, 0.1, 0.0), epsilon = 1e-12);
    }

    #[test]
    fn floating_linear_velocity_is_re_expressed_after_rotation() {
        let mut builder = RobotBuilder::new("spinner");
        let body = builder.add_body(
            "spinner",
            "root",
            JointKind::Floating,
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        // Yawing at 1 rad/s while translating +x in the body frame.
        builder.set_initial_velocity(body, &[0.0, 0.0, 1.0, 1.0, 0.0, 0.0]);
        let (model, mut state) = builder.finish().expect("valid robot");

        let dt = 1e-3;
        for _ in 0..1000 {
            integrate(&model, &mut state, dt);
        }
        let JointPosition::Pose(pose) = state.positions[0] else {
            panic!("floating joint");
        };
        // Each step counter-rotates the stored linear velocity by exactly
        // the step's orientation change, so the world-frame velocity is
        // constant and the body travels a straight line along +x.
        assert_relative_eq!(pose.translation.x, 1.0, epsilon = 1e-9);
        assert_relative_eq!(pose.translation.y, 0.0, epsilon = 1e-9);
        // After one second of yaw the body frame has turned by 1 rad, so
        // the stored velocity is the world +x axis seen from that frame.
        assert_relative_eq!(state.qd[3], 1.0_f64.cos(), epsilon = 1e-9);
        assert_relative_eq!(state.qd[4], -1.0_f64.sin(), epsilon = 1e-9);
    }

    #[test]
    fn planar_joint_advances_in_plane() {
        let mut builder = RobotBuilder::new("cart");
        let body = builder.add_body(
            "cart",
            "plane",
            JointKind::Planar,
            None,
            Pose::identity(),
            MassProperties::point_mass(1.0),
        );
        builder.set_initial_velocity(body, &[2.0, 0.0, 0.0]);
        let (model, mut state) = builder.finish().expect("valid robot");

        integrate(&model, &mut state, 0.05);
        let JointPosition::Planar { x, z, pitch } = state.positions[0] else {
            panic!("planar joint");
        };
        assert_relative_eq!(x, 0.1, epsilon = 1e-12);
        assert_relative_eq!(z, 0.0, epsilon = 1e-12);
        assert_relative_eq!(pitch, 0.0, epsilon = 1e-12);
    }
}
