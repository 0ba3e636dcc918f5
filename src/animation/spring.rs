use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SpringParams {
    pub damping: f64,
    pub mass: f64,
    pub stiffness: f64,
    pub epsilon: f64,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spring {
    pub from: f64,
    pub to: f64,
    pub initial_velocity: f64,
    pub params: SpringParams,
}

impl SpringParams {
    pub fn new(damping_ratio: f64, stiffness: f64, epsilon: f64) -> Self {
        let damping_ratio = damping_ratio.max(0.);
        let stiffness = stiffness.max(0.);
        let epsilon = epsilon.max(0.);

        let mass = 1.;
        let critical_damping = 2. * (mass * stiffness).sqrt();
        let damping = damping_ratio * critical_damping;

        Self {
            damping,
            mass,
            stiffness,
            epsilon,
        }
    }
}

impl From<&quickstep_config::SpringParams> for SpringParams {
    fn from(config: &quickstep_config::SpringParams) -> Self {
        Self::new(
            config.damping_ratio,
            f64::from(config.stiffness),
            config.epsilon,
        )
    }
}

impl Spring {
    pub fn value_at(&self, t: Duration) -> f64 {
        self.oscillate(t.as_secs_f64())
    }

    /// Time until the spring settles within `epsilon` of the target.
    pub fn duration(&self) -> Duration {
        const DELTA: f64 = 0.001;

        let beta = self.params.damping / (2. * self.params.mass);

        if beta.abs() <= f64::EPSILON || beta < 0. {
            return Duration::MAX;
        }

        if (self.to - self.from).abs() <= f64::EPSILON {
            return Duration::ZERO;
        }

        let omega0 = (self.params.stiffness / self.params.mass).sqrt();

        // The envelope bounds an underdamped spring, so it settles no later than this.
        let mut x0 = -self.params.epsilon.ln() / beta;

        if (beta - omega0).abs() <= f64::EPSILON || beta < omega0 {
            return secs(x0);
        }

        // Overdamped: find the settle point with Newton's method.
        let mut y0 = self.oscillate(x0);
        let m = (self.oscillate(x0 + DELTA) - y0) / DELTA;

        let mut x1 = (self.to - y0 + m * x0) / m;
        let mut y1 = self.oscillate(x1);

        let mut i = 0;
        while (self.to - y1).abs() > self.params.epsilon {
            if i > 1000 {
                return Duration::ZERO;
            }

            x0 = x1;
            y0 = y1;

            let m = (self.oscillate(x0 + DELTA) - y0) / DELTA;

            x1 = (self.to - y0 + m * x0) / m;
            y1 = self.oscillate(x1);

            if !y1.is_finite() {
                return secs(x0);
            }

            i += 1;
        }

        secs(x1)
    }

    fn oscillate(&self, t: f64) -> f64 {
        let b = self.params.damping;
        let m = self.params.mass;
        let k = self.params.stiffness;
        let v0 = self.initial_velocity;

        let beta = b / (2. * m);
        let omega0 = (k / m).sqrt();

        let x0 = self.from - self.to;

        let envelope = (-beta * t).exp();

        // Solutions of the spring equation for the three damping regimes.
        if (beta - omega0).abs() <= f64::EPSILON {
            self.to + envelope * (x0 + (beta * x0 + v0) * t)
        } else if beta < omega0 {
            let omega1 = ((omega0 * omega0) - (beta * beta)).sqrt();

            self.to
                + envelope
                    * (x0 * (omega1 * t).cos() + ((beta * x0 + v0) / omega1) * (omega1 * t).sin())
        } else {
            let omega2 = ((beta * beta) - (omega0 * omega0)).sqrt();

            self.to
                + envelope
                    * (x0 * (omega2 * t).cosh()
                        + ((beta * x0 + v0) / omega2) * (omega2 * t).sinh())
        }
    }
}

fn secs(value: f64) -> Duration {
    Duration::try_from_secs_f64(value).unwrap_or(Duration::ZERO)
}

#[cfg(test)]
mod tests {
    use approx::assert_abs_diff_eq;

    use super::*;

    fn spring(damping_ratio: f64) -> Spring {
        Spring {
            from: 0.,
            to: 1.,
            initial_velocity: 0.,
            params: SpringParams::new(damping_ratio, 200., 0.001),
        }
    }

    #[test]
    fn settles_at_target() {
        for damping_ratio in [0.5, 1., 2.] {
            let spring = spring(damping_ratio);
            let duration = spring.duration();
            assert!(duration > Duration::ZERO && duration < Duration::from_secs(5));
            assert_abs_diff_eq!(spring.value_at(duration), 1., epsilon = 0.01);
        }
    }

    #[test]
    fn starts_at_origin() {
        assert_abs_diff_eq!(spring(0.75).value_at(Duration::ZERO), 0.);
    }

    #[test]
    fn zero_distance_takes_no_time() {
        let mut spring = spring(0.75);
        spring.to = spring.from;
        assert_eq!(spring.duration(), Duration::ZERO);
    }
}
