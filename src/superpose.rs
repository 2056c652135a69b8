//! Least-squares rigid superposition (Kabsch).

use crate::error::{QsError, Result};
use crate::structure::centroid;
use nalgebra as na;
use na::{Matrix3, Point3, Rotation3, Vector3};
use serde::Serialize;

/// A rotation followed by a translation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RigidTransform {
    pub rotation: Matrix3<f64>,
    pub translation: Vector3<f64>,
}

impl RigidTransform {
    pub fn apply(&self, p: &Point3<f64>) -> Point3<f64> {
        Point3::from(self.rotation * p.coords + self.translation)
    }

    pub fn apply_all(&self, points: &[Point3<f64>]) -> Vec<Point3<f64>> {
        points.iter().map(|p| self.apply(p)).collect()
    }

    /// Euler angles (roll, pitch, yaw) of the rotation in radians.
    pub fn euler_angles(&self) -> [f64; 3] {
        let (roll, pitch, yaw) = Rotation3::from_matrix_unchecked(self.rotation).euler_angles();
        [roll, pitch, yaw]
    }

    /// Unit rotation axis, or the zero vector for a rotation by 0.
    ///
    /// The sign is only meaningful away from half turns.
    pub fn axis(&self) -> Vector3<f64> {
        let r = &self.rotation;
        let cos = ((r.trace() - 1.0) / 2.0).clamp(-1.0, 1.0);
        if cos > 1.0 - 1e-9 {
            return Vector3::zeros();
        }
        let skew = Vector3::new(r[(2, 1)] - r[(1, 2)], r[(0, 2)] - r[(2, 0)], r[(1, 0)] - r[(0, 1)]);
        if cos > 0.0 {
            return skew.normalize();
        }
        // Near a half turn the skew part vanishes; read the axis from the
        // symmetric part (R + R^T) / 2 = cos * I + (1 - cos) * n * n^T
        let outer = ((r + r.transpose()) / 2.0 - Matrix3::identity() * cos) / (1.0 - cos);
        let k = (0..3)
            .max_by(|&i, &j| outer[(i, i)].total_cmp(&outer[(j, j)]))
            .unwrap_or(0);
        let axis = outer.column(k) / outer[(k, k)].sqrt();
        let axis = if skew.dot(&axis) < 0.0 { -axis } else { axis };
        axis.normalize()
    }
}

/// Outcome of a superposition; the inputs are never moved.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Superposition {
    pub transform: RigidTransform,
    /// RMSD of the transformed mobile set against the target
    pub rmsd: f64,
    pub n_atoms: usize,
}

impl Serialize for Superposition {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let r = &self.transform.rotation;
        let t = &self.transform.translation;
        let mut s = serializer.serialize_struct("Superposition", 4)?;
        s.serialize_field(
            "rotation",
            &[
                [r[(0, 0)], r[(0, 1)], r[(0, 2)]],
                [r[(1, 0)], r[(1, 1)], r[(1, 2)]],
                [r[(2, 0)], r[(2, 1)], r[(2, 2)]],
            ],
        )?;
        s.serialize_field("translation", &[t.x, t.y, t.z])?;
        s.serialize_field("rmsd", &self.rmsd)?;
        s.serialize_field("n_atoms", &self.n_atoms)?;
        s.end()
    }
}

/// Find the transform that best maps `mobile` onto `target`.
pub fn superpose(mobile: &[Point3<f64>], target: &[Point3<f64>]) -> Result<Superposition> {
    if mobile.len() != target.len() {
        return Err(QsError::Superposition(format!(
            "Point sets differ in size: {} vs {}",
            mobile.len(),
            target.len()
        )));
    }
    if mobile.len() < 3 {
        return Err(QsError::Superposition(format!(
            "Need at least 3 points, got {}",
            mobile.len()
        )));
    }

    let c_mobile = centroid(mobile.iter());
    let c_target = centroid(target.iter());

    // Cross-covariance of the centered sets
    let h = mobile
        .iter()
        .zip(target)
        .fold(Matrix3::zeros(), |acc, (p, q)| {
            acc + (p - c_mobile) * (q - c_target).transpose()
        });

    let svd = h.svd(true, true);
    let (Some(u), Some(v_t)) = (svd.u, svd.v_t) else {
        return Err(QsError::Superposition("SVD did not converge".to_string()));
    };
    let v = v_t.transpose();
    // Avoid reflections
    let d = (v * u.transpose()).determinant().signum();
    let correction = Matrix3::from_diagonal(&Vector3::new(1.0, 1.0, d));
    let rotation = v * correction * u.transpose();
    let translation = c_target.coords - rotation * c_mobile.coords;

    let transform = RigidTransform {
        rotation,
        translation,
    };
    let rmsd = rmsd(&transform.apply_all(mobile), target);
    Ok(Superposition {
        transform,
        rmsd,
        n_atoms: mobile.len(),
    })
}

/// Sum of squared distances between paired points.
pub fn sum_squared_deviation(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
    a.iter().zip(b).map(|(p, q)| (p - q).norm_squared()).sum()
}

/// RMSD between paired points; 0 for empty sets.
pub fn rmsd(a: &[Point3<f64>], b: &[Point3<f64>]) -> f64 {
    let n = a.len().min(b.len());
    if n == 0 {
        return 0.0;
    }
    (sum_squared_deviation(a, b) / n as f64).sqrt()
}

/// Combine per-chain (RMSD, atom count) pairs into one atom-weighted RMSD.
pub fn multi_chain_rmsd(per_chain: impl IntoIterator<Item = (f64, usize)>) -> f64 {
    let (ssd, n) = per_chain
        .into_iter()
        .fold((0.0, 0usize), |(ssd, n), (r, k)| (ssd + r * r * k as f64, n + k));
    if n == 0 {
        0.0
    } else {
        (ssd / n as f64).sqrt()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{helix_chain, SEQ_1};

    fn helix_points() -> Vec<Point3<f64>> {
        helix_chain("A", SEQ_1).ca_positions()
    }

    #[test]
    fn recovers_rigid_motion() {
        let target = helix_points();
        let rot = Rotation3::from_euler_angles(0.3, -1.1, 2.0);
        let shift = Vector3::new(4.0, -7.5, 12.0);
        let mobile: Vec<_> = target.iter().map(|p| rot * p + shift).collect();

        let sup = superpose(&mobile, &target).unwrap();
        assert!(sup.rmsd < 1e-6, "RMSD should vanish, got {}", sup.rmsd);
        assert_eq!(sup.n_atoms, target.len());
        let expected = rot.inverse();
        assert!((sup.transform.rotation - expected.matrix()).norm() < 1e-6);
        assert!((sup.transform.rotation.determinant() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rotation_descriptors() {
        let angle = std::f64::consts::FRAC_PI_3;
        let rot = Rotation3::from_axis_angle(&Vector3::z_axis(), angle);
        let tf = RigidTransform {
            rotation: *rot.matrix(),
            translation: Vector3::zeros(),
        };
        let [roll, pitch, yaw] = tf.euler_angles();
        assert!(roll.abs() < 1e-9 && pitch.abs() < 1e-9);
        assert!((yaw - angle).abs() < 1e-9);
        assert!((tf.axis() - Vector3::z()).norm() < 1e-9);
        let still = RigidTransform {
            rotation: Matrix3::identity(),
            translation: Vector3::zeros(),
        };
        assert_eq!(still.axis(), Vector3::zeros());

        let half_turn = RigidTransform {
            rotation: *Rotation3::from_axis_angle(&Vector3::x_axis(), std::f64::consts::PI).matrix(),
            translation: Vector3::zeros(),
        };
        let axis = half_turn.axis();
        assert!((axis - Vector3::x()).norm() < 1e-9 || (axis + Vector3::x()).norm() < 1e-9);
    }

    #[test]
    fn rejects_mismatched_sets() {
        let pts = helix_points();
        assert!(matches!(
            superpose(&pts[..10], &pts[..9]),
            Err(QsError::Superposition(_))
        ));
        assert!(matches!(
            superpose(&pts[..2], &pts[..2]),
            Err(QsError::Superposition(_))
        ));
    }

    #[test]
    fn weighted_rmsd() {
        assert!((multi_chain_rmsd([(1.0, 10), (1.0, 30)]) - 1.0).abs() < 1e-12);
        let combined = multi_chain_rmsd([(2.0, 10), (0.0, 30)]);
        assert!((combined - (40.0f64 / 40.0).sqrt()).abs() < 1e-12);
        assert_eq!(multi_chain_rmsd(Vec::<(f64, usize)>::new()), 0.0);
    }
}
