//! # Heading controller
//!
//! PID controller used by segment control to turn the robot towards its target.

// ---------------------------------------------------------------------------
// IMPORTS
// ---------------------------------------------------------------------------

use serde::Serialize;
use util::maths::clamp_sym;

// ---------------------------------------------------------------------------
// DATA STRUCTURES
// ---------------------------------------------------------------------------

/// A PID controller
#[derive(Debug, Serialize, Clone)]
pub struct PidController {
    /// Proportional gain
    k_p: f64,

    /// Integral gain
    k_i: f64,

    /// Dervative gain
    k_d: f64,

    /// Limit on the magnitude of the integral accumulation
    integral_limit: f64,

    /// Previous error
    prev_error: Option<f64>,

    /// The integral accumulation
    integral: f64
}

// ---------------------------------------------------------------------------
// IMPLEMENTATIONS
// ---------------------------------------------------------------------------

impl PidController {

    /// Create a new controller with the given gains.
    pub fn new(k_p: f64, k_i: f64, k_d: f64, integral_limit: f64) -> Self {
        Self {
            k_p, k_i, k_d,
            integral_limit,
            integral: 0f64,
            prev_error: None
        }
    }

    /// Change the gains, keeping the accumulated state.
    pub fn set_gains(&mut self, k_p: f64, k_i: f64, k_d: f64, integral_limit: f64) {
        self.k_p = k_p;
        self.k_i = k_i;
        self.k_d = k_d;
        self.integral_limit = integral_limit;
        self.integral = clamp_sym(self.integral, integral_limit);
    }

    /// Clear the integral and error history.
    pub fn reset(&mut self) {
        self.integral = 0f64;
        self.prev_error = None;
    }

    /// Record an error without producing an output.
    ///
    /// Used on the first sample after a reset, when there is no time difference to work with.
    pub fn observe(&mut self, error: f64) {
        self.prev_error = Some(error);
    }

    /// Get the value of the controller for the given error and time step.
    ///
    /// If `dt` is not positive the integral is not accumulated and the derivative is taken as
    /// zero, as is the derivative on the first sample after a reset.
    ///
    /// A zero error with a zero integral only gives a zero output when the error is unchanged
    /// from the previous sample. If the error has just fallen to zero the derivative term still
    /// contributes.
    pub fn get(&mut self, error: f64, dt: f64) -> f64 {
        let dt = if dt.is_finite() && dt > 0f64 { Some(dt) } else { None };

        // Accumulate the integral term, with windup limited by clamping
        if let Some(t) = dt {
            self.integral = clamp_sym(self.integral + error * t, self.integral_limit);
        }

        let deriv = match (self.prev_error, dt) {
            (Some(e), Some(t)) => (error - e) / t,
            _ => 0f64
        };

        self.prev_error = Some(error);

        self.k_p * error 
            + self.k_i * self.integral 
            + self.k_d * deriv
    }

    pub fn integral(&self) -> f64 {
        self.integral
    }

    pub fn prev_error(&self) -> Option<f64> {
        self.prev_error
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn test_proportional() {
        let mut pid = PidController::new(2.0, 0.0, 0.0, 1.0);
        assert_eq!(pid.get(0.5, 0.1), 1.0);
        assert_eq!(pid.get(-0.25, 0.1), -0.5);
    }

    #[test]
    fn test_no_derivative_spike_after_reset() {
        let mut pid = PidController::new(0.0, 0.0, 1.0, 1.0);
        assert_eq!(pid.get(1.0, 0.1), 0.0);

        // Derivative from the previous error
        assert!((pid.get(1.5, 0.1) - 5.0).abs() < 1e-9);

        pid.reset();
        assert_eq!(pid.get(-1.0, 0.1), 0.0);
    }

    #[test]
    fn test_zero_error_output() {
        let mut pid = PidController::new(2.0, 0.0, 1.0, 1.0);

        // Steady state at zero error gives zero output
        pid.observe(0.0);
        assert_eq!(pid.get(0.0, 0.1), 0.0);
        assert_eq!(pid.integral(), 0.0);

        // Falling to zero error still has a derivative contribution
        pid.reset();
        pid.observe(0.5);
        assert!((pid.get(0.0, 0.1) - (-5.0)).abs() < 1e-9);
    }

    #[test]
    fn test_zero_dt() {
        let mut pid = PidController::new(1.0, 1.0, 1.0, 10.0);
        pid.observe(0.2);
        assert_eq!(pid.get(0.4, 0.0), 0.4);
        assert_eq!(pid.integral(), 0.0);
    }

    #[test]
    fn test_integral_clamped() {
        let mut pid = PidController::new(0.0, 1.0, 0.0, 0.5);
        for _ in 0..100 {
            pid.get(1.0, 0.1);
        }
        assert_eq!(pid.integral(), 0.5);

        for _ in 0..100 {
            pid.get(-1.0, 0.1);
        }
        assert_eq!(pid.integral(), -0.5);
    }

    #[test]
    fn test_zero_error_zero_integral_zero_output() {
        let mut pid = PidController::new(5.0, 0.3, 1.0, 1.0);
        pid.observe(0.0);
        assert_eq!(pid.get(0.0, 0.05), 0.0);
    }
}
