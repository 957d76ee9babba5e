//! Mahalanobis gating: flags measurements inconsistent with the predicted
//! state before they can corrupt the filter.
//!
//! # Gating criterion
//! d²(z) = νᵀ S⁻¹ ν  where ν = z − H·x̂,  S = H·P·Hᵀ + R
//!
//! Accept if d² < χ²(dof). Rejection is applied only when configured; the
//! test ratio d²/χ² is always published with the innovation record.

use nalgebra::{DMatrix, DVector};

/// χ² gate by observation dimension: 95% for 1 and 3 dof, 99% for 2 dof
/// (the horizontal-only case tolerates less clutter).
pub fn chi2_gate(dof: usize) -> f64 {
    match dof {
        0 | 1 => 3.84,
        2 => 9.21,
        _ => 7.82,
    }
}

/// Result of a gate check for one observation.
#[derive(Clone, Copy, Debug)]
pub struct GateResult {
    /// Mahalanobis distance squared.
    pub d2: f64,
    /// d² normalized by the gate threshold; > 1 means inconsistent.
    pub test_ratio: f64,
    pub passes: bool,
}

/// Gate a vector innovation given the inverted innovation covariance.
pub fn check(innovation: &DVector<f64>, s_inv: &DMatrix<f64>, threshold: f64) -> GateResult {
    let d2 = (s_inv * innovation).dot(innovation);
    GateResult {
        d2,
        test_ratio: d2 / threshold,
        passes: d2 < threshold,
    }
}

/// Gate a scalar innovation (the per-axis decoupled update path).
pub fn check_scalar(innovation: f64, innov_var: f64, threshold: f64) -> GateResult {
    let d2 = innovation * innovation / innov_var;
    GateResult {
        d2,
        test_ratio: d2 / threshold,
        passes: d2 < threshold,
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn consistent_innovation_passes() {
        let nu = DVector::from_vec(vec![0.1, -0.1]);
        let s_inv = DMatrix::from_diagonal(&DVector::from_vec(vec![1.0, 1.0]));
        let res = check(&nu, &s_inv, chi2_gate(2));
        assert!(res.passes);
        assert!(res.test_ratio < 0.01);
    }

    #[test]
    fn outlier_fails_gate() {
        let res = check_scalar(5.0, 0.01, chi2_gate(1));
        assert!(!res.passes);
        assert!(res.test_ratio > 1.0);
    }
}
