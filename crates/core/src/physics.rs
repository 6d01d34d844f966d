//! Spin physics
//!
//! A friction-only deceleration model advanced once per animation frame.
//! Angles are in degrees, velocities in degrees per tick.

use rand::Rng;

/// Per-tick velocity decay factor
pub const FRICTION: f64 = 0.985;

/// A spin stops once the decayed velocity drops below this
pub const MIN_VELOCITY: f64 = 0.1;

/// Lower bound of the initial velocity draw
pub const MIN_INITIAL_VELOCITY: f64 = 15.0;

/// Upper bound of the initial velocity draw
pub const MAX_INITIAL_VELOCITY: f64 = 30.0;

/// Angle and velocity of the wheel at one instant
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct SpinState {
    /// Degrees in `[0, 360)`
    pub angle: f64,
    /// Degrees per tick, never negative
    pub velocity: f64,
}

impl SpinState {
    pub fn new(angle: f64, velocity: f64) -> Self {
        Self {
            angle: angle.rem_euclid(360.0),
            velocity,
        }
    }
}

/// Outcome of one physics step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Step {
    pub state: SpinState,
    pub stopped: bool,
}

/// Draw a fresh initial velocity, uniform in `[15, 30]`
pub fn initial_velocity<R: Rng + ?Sized>(rng: &mut R) -> f64 {
    rng.gen_range(MIN_INITIAL_VELOCITY..=MAX_INITIAL_VELOCITY)
}

/// Advance the wheel by one tick
pub fn step(state: SpinState) -> Step {
    let velocity = state.velocity * FRICTION;
    let angle = (state.angle + velocity).rem_euclid(360.0);
    Step {
        state: SpinState { angle, velocity },
        stopped: velocity.abs() < MIN_VELOCITY || !velocity.is_finite(),
    }
}

/// Upper bound on the ticks a spin starting at `velocity` can take
///
/// Smallest `n` with `velocity * FRICTION^n < MIN_VELOCITY`.
pub fn max_steps_to_rest(velocity: f64) -> u32 {
    let velocity = velocity.abs();
    if velocity * FRICTION < MIN_VELOCITY {
        return 1;
    }
    let n = (MIN_VELOCITY / velocity).ln() / FRICTION.ln();
    n.floor() as u32 + 1
}

/// Run the simulation to rest, returning the final state and tick count
pub fn run_to_rest(mut state: SpinState) -> (SpinState, u32) {
    let mut ticks = 0;
    loop {
        let next = step(state);
        ticks += 1;
        state = next.state;
        if next.stopped {
            return (state, ticks);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn test_step_decays_and_wraps() {
        let next = step(SpinState::new(350.0, 20.0));
        assert!((next.state.velocity - 19.7).abs() < 1e-9);
        assert!((next.state.angle - 9.7).abs() < 1e-9);
        assert!(!next.stopped);
    }

    #[test]
    fn test_step_is_deterministic() {
        let state = SpinState::new(123.4, 17.5);
        assert_eq!(step(state), step(state));
    }

    #[test]
    fn test_initial_velocity_in_range() {
        let mut rng = StdRng::seed_from_u64(42);
        for _ in 0..1_000 {
            let v = initial_velocity(&mut rng);
            assert!((MIN_INITIAL_VELOCITY..=MAX_INITIAL_VELOCITY).contains(&v));
        }
    }

    #[test]
    fn test_velocity_strictly_decreases_until_stop() {
        for v0 in [15.0, 17.25, 22.0, 28.9, 30.0] {
            let bound = max_steps_to_rest(v0);
            let mut state = SpinState::new(0.0, v0);
            let mut ticks = 0;
            loop {
                let next = step(state);
                ticks += 1;
                assert!(next.state.velocity < state.velocity);
                assert!((0.0..360.0).contains(&next.state.angle));
                state = next.state;
                if next.stopped {
                    break;
                }
                assert!(ticks <= bound, "v0={} exceeded bound {}", v0, bound);
            }
            assert!(ticks <= bound);
        }
    }

    #[test]
    fn test_settle_takes_several_seconds_at_60hz() {
        let (_, fast) = run_to_rest(SpinState::new(0.0, MIN_INITIAL_VELOCITY));
        let (_, slow) = run_to_rest(SpinState::new(0.0, MAX_INITIAL_VELOCITY));
        assert!(fast > 3 * 60);
        assert!(slow < 8 * 60);
        assert!(fast < slow);
    }

    #[test]
    fn test_slow_wheel_stops_in_one_step() {
        assert_eq!(max_steps_to_rest(0.05), 1);
        assert!(step(SpinState::new(10.0, 0.05)).stopped);
    }
}
