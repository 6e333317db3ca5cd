use crate::utils::{config::D_BUFFER_LEN, math::rolling_average::RollingAverage};

/// A discrete PID controller with a variable timestep.
///
/// The derivative of the error is smoothed over the last `D_BUFFER_LEN`
/// updates before the `kd` gain is applied. The integral term is clamped to
/// `±integral_limit` so a saturated output cannot wind it up.
#[derive(Debug, Clone)]
pub struct PidController {
    kp: f32,
    ki: f32,
    kd: f32,
    prev_err: Option<f32>,
    integral: f32,
    /// Largest magnitude of `ki * integral`.
    integral_limit: f32,
    derivative: RollingAverage<D_BUFFER_LEN>,
}

impl PidController {
    pub fn new(
        kp: f32,
        ki: f32,
        kd: f32,
    ) -> Self {
        Self {
            kp,
            ki,
            kd,
            prev_err: None,
            integral: 0.0,
            integral_limit: f32::INFINITY,
            derivative: RollingAverage::new(),
        }
    }

    /// Set integral limits for anti-windup.
    pub fn with_integral_limit(
        mut self,
        limit: f32,
    ) -> Self {
        self.set_integral_limit(limit);
        self
    }

    pub fn set_integral_limit(
        &mut self,
        limit: f32,
    ) {
        self.integral_limit = libm::fabsf(limit);
        self.clamp_integral();
    }

    /// Compute control output for the current error over `dt` seconds.
    ///
    /// A non-positive `dt` contributes only the proportional term.
    pub fn update(
        &mut self,
        error: f32,
        dt: f32,
    ) -> f32 {
        if dt <= 0.0 {
            return self.kp * error + self.ki * self.integral;
        }
        self.integral += error * dt;
        self.clamp_integral();
        let derivative = match self.prev_err {
            Some(prev) => self.derivative.average_with((error - prev) / dt),
            None => 0.0,
        };
        self.prev_err = Some(error);
        self.kp * error + self.ki * self.integral + self.kd * derivative
    }

    pub fn integral(&self) -> f32 {
        self.integral
    }

    /// Reset integrator and derivative history.
    pub fn reset(&mut self) {
        self.prev_err = None;
        self.integral = 0.0;
        self.derivative.clear();
    }

    fn clamp_integral(&mut self) {
        if self.ki == 0.0 {
            return;
        }
        let max = self.integral_limit / libm::fabsf(self.ki);
        self.integral = self.integral.max(-max).min(max);
    }
}
