#![cfg_attr(not(feature = "std"), no_std)]

extern crate alloc;

use alloc::vec::Vec;
use rand::Rng;

/// Number of past positions each boid remembers for trail rendering
pub const HISTORY_LEN: usize = 50;

/// Range of the initial velocity on each axis
const INITIAL_SPEED: f32 = 5.0;

/// Errors raised while setting up a flock
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FlockError {
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(&'static str),
}

/// A 2D vector used for position and velocity
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vector2D {
    pub x: f32,
    pub y: f32,
}

impl Vector2D {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    pub fn zero() -> Self {
        Self { x: 0.0, y: 0.0 }
    }

    pub fn magnitude(&self) -> f32 {
        #[cfg(feature = "std")]
        {
            (self.x * self.x + self.y * self.y).sqrt()
        }
        #[cfg(not(feature = "std"))]
        {
            libm::sqrtf(self.x * self.x + self.y * self.y)
        }
    }

    pub fn distance(&self, other: &Vector2D) -> f32 {
        (*self - *other).magnitude()
    }

    /// Angle of the vector in radians, measured from the positive x axis
    pub fn heading(&self) -> f32 {
        #[cfg(feature = "std")]
        {
            self.y.atan2(self.x)
        }
        #[cfg(not(feature = "std"))]
        {
            libm::atan2f(self.y, self.x)
        }
    }
}

impl core::ops::Add for Vector2D {
    type Output = Self;

    fn add(self, other: Self) -> Self {
        Self {
            x: self.x + other.x,
            y: self.y + other.y,
        }
    }
}

impl core::ops::Sub for Vector2D {
    type Output = Self;

    fn sub(self, other: Self) -> Self {
        Self {
            x: self.x - other.x,
            y: self.y - other.y,
        }
    }
}

impl core::ops::Mul<f32> for Vector2D {
    type Output = Self;

    fn mul(self, scalar: f32) -> Self {
        Self {
            x: self.x * scalar,
            y: self.y * scalar,
        }
    }
}

impl core::ops::Div<f32> for Vector2D {
    type Output = Self;

    fn div(self, scalar: f32) -> Self {
        Self {
            x: self.x / scalar,
            y: self.y / scalar,
        }
    }
}

impl core::ops::AddAssign for Vector2D {
    fn add_assign(&mut self, other: Self) {
        self.x += other.x;
        self.y += other.y;
    }
}

/// A single boid entity
#[derive(Debug, Clone)]
pub struct Boid {
    pub position: Vector2D,
    pub velocity: Vector2D,
    pub is_predator: bool,
    history: heapless::Deque<Vector2D, HISTORY_LEN>,
}

impl Boid {
    pub fn new(position: Vector2D, velocity: Vector2D) -> Self {
        Self {
            position,
            velocity,
            is_predator: false,
            history: heapless::Deque::new(),
        }
    }

    pub fn predator(position: Vector2D, velocity: Vector2D) -> Self {
        Self {
            is_predator: true,
            ..Self::new(position, velocity)
        }
    }

    /// Random position inside the viewport, random velocity in [-5, 5) per axis
    pub fn random<R: Rng + ?Sized>(width: f32, height: f32, rng: &mut R) -> Self {
        let position = Vector2D::new(rng.gen_range(0.0..width), rng.gen_range(0.0..height));
        let velocity = Vector2D::new(
            rng.gen_range(-INITIAL_SPEED..INITIAL_SPEED),
            rng.gen_range(-INITIAL_SPEED..INITIAL_SPEED),
        );
        Self::new(position, velocity)
    }

    pub fn speed(&self) -> f32 {
        self.velocity.magnitude()
    }

    /// Direction of travel, `atan2(dy, dx)`
    pub fn heading(&self) -> f32 {
        self.velocity.heading()
    }

    /// Past positions, oldest first
    pub fn history(&self) -> impl Iterator<Item = &Vector2D> + '_ {
        self.history.iter()
    }

    pub fn history_len(&self) -> usize {
        self.history.len()
    }

    /// Appends a position, evicting the oldest one once the trail is full
    pub fn record_position(&mut self, position: Vector2D) {
        if self.history.is_full() {
            self.history.pop_front();
        }
        // Cannot fail: a slot was freed above.
        let _ = self.history.push_back(position);
    }

    /// Euler step with unit time, then remember where we ended up
    pub fn integrate(&mut self) {
        self.position += self.velocity;
        self.record_position(self.position);
    }
}

/// Tunable parameters for a simulation step
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FlockParams {
    pub speed_limit: f32,
    pub visual_range: f32,
    pub centering_factor: f32,
    pub avoid_factor: f32,
    pub velocity_factor: f32,
    pub min_separation: f32,
    pub predator_proximity: f32,
    pub margin: f32,
    pub turn_factor: f32,
    pub predator_avoid_range: f32,
    pub predator_avoid_factor: f32,
    pub predator_speed_offset: f32,
}

impl Default for FlockParams {
    fn default() -> Self {
        Self {
            speed_limit: 15.0,
            visual_range: 100.0,
            centering_factor: 0.005,
            avoid_factor: 0.05,
            velocity_factor: 0.05,
            min_separation: 20.0,
            predator_proximity: 50.0,
            margin: 200.0,
            turn_factor: 1.0,
            predator_avoid_range: 60.0,
            predator_avoid_factor: 1.05,
            predator_speed_offset: 6.0,
        }
    }
}

impl FlockParams {
    /// Stricter clamp applied to the predator, never below zero
    pub fn predator_speed_limit(&self) -> f32 {
        (self.speed_limit - self.predator_speed_offset).max(0.0)
    }
}

/// The per-boid steering rules, in the order `Flock::step` applies them.
///
/// Each rule mutates `boid.velocity` in place. `others` must not contain
/// `boid` itself.
pub mod behavior {
    use super::*;

    /// Steer toward the mean position of neighbours within visual range
    pub fn fly_towards_center<'a, I>(boid: &mut Boid, others: I, params: &FlockParams)
    where
        I: Iterator<Item = &'a Boid>,
    {
        let mut center = Vector2D::zero();
        let mut count = 0;

        for other in others {
            if boid.position.distance(&other.position) < params.visual_range {
                center += other.position;
                count += 1;
            }
        }

        if count > 0 {
            center = center / count as f32;
            boid.velocity += (center - boid.position) * params.centering_factor;
        }
    }

    /// Repel from close flock-mates. The predator instead accumulates
    /// `pos + other_pos` for everything within `predator_proximity`.
    pub fn avoid_others<'a, I>(boid: &mut Boid, others: I, params: &FlockParams)
    where
        I: Iterator<Item = &'a Boid>,
    {
        let mut movement = Vector2D::zero();

        for other in others {
            let distance = boid.position.distance(&other.position);
            if boid.is_predator {
                if distance < params.predator_proximity {
                    movement += boid.position + other.position;
                }
            } else if distance < params.min_separation {
                movement += boid.position - other.position;
            }
        }

        boid.velocity += movement * params.avoid_factor;
    }

    /// Steer toward the mean velocity of neighbours within visual range
    pub fn match_velocity<'a, I>(boid: &mut Boid, others: I, params: &FlockParams)
    where
        I: Iterator<Item = &'a Boid>,
    {
        let mut sum = Vector2D::zero();
        let mut count = 0;

        for other in others {
            if boid.position.distance(&other.position) < params.visual_range {
                sum += other.velocity;
                count += 1;
            }
        }

        if count > 0 {
            let average = sum / count as f32;
            boid.velocity += (average - boid.velocity) * params.velocity_factor;
        }
    }

    /// Clamp speed to `speed_limit`. The predator gets a second clamp that
    /// rescales by the speed measured before the first one.
    pub fn limit_speed(boid: &mut Boid, params: &FlockParams) {
        let speed = boid.speed();
        let limit = params.speed_limit.max(0.0);

        if speed > limit {
            boid.velocity = boid.velocity / speed * limit;
        }

        let predator_limit = params.predator_speed_limit();
        if boid.is_predator && speed > predator_limit {
            boid.velocity = boid.velocity / speed * predator_limit;
        }
    }

    /// Nudge the boid back inward when it is within `margin` of an edge
    pub fn stay_in_bounds(boid: &mut Boid, width: f32, height: f32, params: &FlockParams) {
        if boid.position.x < params.margin {
            boid.velocity.x += params.turn_factor;
        }
        if boid.position.x > width - params.margin {
            boid.velocity.x -= params.turn_factor;
        }
        if boid.position.y < params.margin {
            boid.velocity.y += params.turn_factor;
        }
        if boid.position.y > height - params.margin {
            boid.velocity.y -= params.turn_factor;
        }
    }

    /// Flee from any predator within `predator_avoid_range`
    pub fn avoid_predator<'a, I>(boid: &mut Boid, others: I, params: &FlockParams)
    where
        I: Iterator<Item = &'a Boid>,
    {
        if boid.is_predator {
            return;
        }

        let mut movement = Vector2D::zero();

        for predator in others.filter(|other| other.is_predator) {
            if boid.position.distance(&predator.position) < params.predator_avoid_range {
                movement += boid.position - predator.position;
            }
        }

        boid.velocity += movement * params.predator_avoid_factor;
    }
}

/// A fixed-size, ordered collection of boids
#[derive(Debug, Clone)]
pub struct Flock {
    boids: Vec<Boid>,
}

impl Flock {
    /// Creates `count` random boids. With `predator` set, the first one hunts.
    pub fn initialize<R: Rng + ?Sized>(
        count: usize,
        width: f32,
        height: f32,
        predator: bool,
        rng: &mut R,
    ) -> Result<Self, FlockError> {
        if count == 0 {
            return Err(FlockError::InvalidConfiguration(
                "boid count must be positive",
            ));
        }
        if !(width.is_finite() && width > 0.0 && height.is_finite() && height > 0.0) {
            return Err(FlockError::InvalidConfiguration(
                "viewport dimensions must be positive",
            ));
        }

        let boids = (0..count)
            .map(|index| {
                let mut boid = Boid::random(width, height, rng);
                boid.is_predator = predator && index == 0;
                boid
            })
            .collect();

        log::debug!(
            "initialized flock of {} boids in {}x{} viewport (predator: {})",
            count,
            width,
            height,
            predator
        );

        Ok(Self { boids })
    }

    #[cfg(feature = "std")]
    pub fn random(count: usize, width: f32, height: f32, predator: bool) -> Result<Self, FlockError> {
        Self::initialize(count, width, height, predator, &mut rand::thread_rng())
    }

    /// Same seed, same flock
    pub fn seeded(
        count: usize,
        width: f32,
        height: f32,
        predator: bool,
        seed: u64,
    ) -> Result<Self, FlockError> {
        use rand::SeedableRng;
        let mut rng = rand::rngs::StdRng::seed_from_u64(seed);
        Self::initialize(count, width, height, predator, &mut rng)
    }

    /// Builds a flock from explicit boids, keeping their order
    pub fn from_boids(boids: Vec<Boid>) -> Result<Self, FlockError> {
        if boids.is_empty() {
            return Err(FlockError::InvalidConfiguration(
                "boid count must be positive",
            ));
        }
        if boids.iter().filter(|boid| boid.is_predator).count() > 1 {
            return Err(FlockError::InvalidConfiguration(
                "a flock holds at most one predator",
            ));
        }
        Ok(Self { boids })
    }

    pub fn boids(&self) -> &[Boid] {
        &self.boids
    }

    pub fn len(&self) -> usize {
        self.boids.len()
    }

    pub fn is_empty(&self) -> bool {
        self.boids.is_empty()
    }

    pub fn predator(&self) -> Option<&Boid> {
        self.boids.iter().find(|boid| boid.is_predator)
    }

    /// Advances every boid by one tick.
    ///
    /// Boids are updated one at a time in insertion order, so a boid sees
    /// the already-moved state of every boid before it. Cost is O(n²).
    pub fn step(&mut self, width: f32, height: f32, params: &FlockParams) {
        for index in 0..self.boids.len() {
            let (before, rest) = self.boids.split_at_mut(index);
            let Some((boid, after)) = rest.split_first_mut() else {
                continue;
            };
            let before: &[Boid] = before;
            let after: &[Boid] = after;
            let others = move || before.iter().chain(after.iter());

            behavior::fly_towards_center(boid, others(), params);
            behavior::avoid_others(boid, others(), params);
            behavior::match_velocity(boid, others(), params);
            behavior::limit_speed(boid, params);
            behavior::stay_in_bounds(boid, width, height, params);
            behavior::avoid_predator(boid, others(), params);

            boid.integrate();
        }

        log::trace!("stepped {} boids", self.boids.len());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn approx(a: f32, b: f32) -> bool {
        (a - b).abs() < 1e-4
    }

    #[test]
    fn test_vector2d_magnitude() {
        let v = Vector2D::new(3.0, 4.0);
        assert_eq!(v.magnitude(), 5.0);
    }

    #[test]
    fn test_vector2d_operations() {
        let v1 = Vector2D::new(1.0, 2.0);
        let v2 = Vector2D::new(3.0, 4.0);

        let sum = v1 + v2;
        assert_eq!(sum, Vector2D::new(4.0, 6.0));

        let diff = v2 - v1;
        assert_eq!(diff, Vector2D::new(2.0, 2.0));

        let scaled = v1 * 2.0;
        assert_eq!(scaled, Vector2D::new(2.0, 4.0));

        let halved = v2 / 2.0;
        assert_eq!(halved, Vector2D::new(1.5, 2.0));
    }

    #[test]
    fn test_heading() {
        let boid = Boid::new(Vector2D::zero(), Vector2D::new(0.0, 1.0));
        assert!(approx(boid.heading(), core::f32::consts::FRAC_PI_2));

        let boid = Boid::new(Vector2D::zero(), Vector2D::new(-1.0, 0.0));
        assert!(approx(boid.heading(), core::f32::consts::PI));
    }

    #[test]
    fn test_boid_integrate_records_history() {
        let mut boid = Boid::new(Vector2D::new(0.0, 0.0), Vector2D::new(1.0, 2.0));
        boid.integrate();

        assert_eq!(boid.position, Vector2D::new(1.0, 2.0));
        assert_eq!(boid.history().copied().collect::<Vec<_>>(), vec![Vector2D::new(1.0, 2.0)]);
    }

    #[test]
    fn test_history_evicts_oldest() {
        let mut boid = Boid::new(Vector2D::zero(), Vector2D::zero());
        for i in 0..(HISTORY_LEN + 7) {
            boid.record_position(Vector2D::new(i as f32, 0.0));
        }

        assert_eq!(boid.history_len(), HISTORY_LEN);
        assert_eq!(boid.history().next().map(|p| p.x), Some(7.0));
        assert_eq!(boid.history().last().map(|p| p.x), Some((HISTORY_LEN + 6) as f32));
    }

    #[test]
    fn test_cohesion_moves_toward_mean() {
        let params = FlockParams::default();
        let mut boid = Boid::new(Vector2D::new(0.0, 0.0), Vector2D::zero());
        let others = [
            Boid::new(Vector2D::new(10.0, 0.0), Vector2D::zero()),
            Boid::new(Vector2D::new(30.0, 0.0), Vector2D::zero()),
            Boid::new(Vector2D::new(500.0, 0.0), Vector2D::zero()),
        ];

        behavior::fly_towards_center(&mut boid, others.iter(), &params);

        assert!(approx(boid.velocity.x, 20.0 * params.centering_factor));
        assert_eq!(boid.velocity.y, 0.0);
    }

    #[test]
    fn test_cohesion_without_neighbours_is_noop() {
        let params = FlockParams {
            visual_range: 0.0,
            ..FlockParams::default()
        };
        let mut boid = Boid::new(Vector2D::zero(), Vector2D::new(1.0, 1.0));
        let others = [Boid::new(Vector2D::zero(), Vector2D::zero())];

        behavior::fly_towards_center(&mut boid, others.iter(), &params);
        behavior::match_velocity(&mut boid, others.iter(), &params);

        assert_eq!(boid.velocity, Vector2D::new(1.0, 1.0));
    }

    #[test]
    fn test_predator_separation_sums_positions() {
        let params = FlockParams::default();
        let mut predator = Boid::predator(Vector2D::new(100.0, 100.0), Vector2D::zero());
        let others = [
            Boid::new(Vector2D::new(130.0, 100.0), Vector2D::zero()),
            Boid::new(Vector2D::new(300.0, 100.0), Vector2D::zero()),
        ];

        behavior::avoid_others(&mut predator, others.iter(), &params);

        assert!(approx(predator.velocity.x, 230.0 * params.avoid_factor));
        assert!(approx(predator.velocity.y, 200.0 * params.avoid_factor));
    }

    #[test]
    fn test_alignment_moves_toward_mean_velocity() {
        let params = FlockParams::default();
        let mut boid = Boid::new(Vector2D::zero(), Vector2D::new(0.0, 0.0));
        let others = [
            Boid::new(Vector2D::new(5.0, 0.0), Vector2D::new(2.0, 0.0)),
            Boid::new(Vector2D::new(0.0, 5.0), Vector2D::new(4.0, 2.0)),
        ];

        behavior::match_velocity(&mut boid, others.iter(), &params);

        assert!(approx(boid.velocity.x, 3.0 * params.velocity_factor));
        assert!(approx(boid.velocity.y, 1.0 * params.velocity_factor));
    }

    #[test]
    fn test_limit_speed_clamps_to_limit() {
        let params = FlockParams::default();
        let mut boid = Boid::new(Vector2D::zero(), Vector2D::new(30.0, 40.0));

        behavior::limit_speed(&mut boid, &params);

        assert!(approx(boid.speed(), params.speed_limit));
        assert!(approx(boid.velocity.x, 9.0));
        assert!(approx(boid.velocity.y, 12.0));
    }

    #[test]
    fn test_predator_double_clamp_reuses_original_speed() {
        let params = FlockParams::default();
        let mut predator = Boid::predator(Vector2D::zero(), Vector2D::new(30.0, 40.0));

        behavior::limit_speed(&mut predator, &params);

        // 50 -> 15 by the general clamp, then scaled by 9 / 50 again.
        let expected = params.speed_limit * params.predator_speed_limit() / 50.0;
        assert!(approx(predator.speed(), expected));
    }

    #[test]
    fn test_predator_clamp_between_limits() {
        let params = FlockParams::default();
        let mut predator = Boid::predator(Vector2D::zero(), Vector2D::new(12.0, 0.0));

        behavior::limit_speed(&mut predator, &params);

        assert!(approx(predator.velocity.x, params.predator_speed_limit()));
    }

    #[test]
    fn test_stay_in_bounds_corner_gets_two_nudges() {
        let params = FlockParams::default();
        let mut boid = Boid::new(Vector2D::new(10.0, 10.0), Vector2D::zero());

        behavior::stay_in_bounds(&mut boid, 1000.0, 1000.0, &params);

        assert_eq!(boid.velocity, Vector2D::new(1.0, 1.0));
    }

    #[test]
    fn test_predator_ignores_predator_avoidance() {
        let params = FlockParams::default();
        let mut predator = Boid::predator(Vector2D::zero(), Vector2D::zero());
        let others = [Boid::new(Vector2D::new(10.0, 0.0), Vector2D::zero())];

        behavior::avoid_predator(&mut predator, others.iter(), &params);

        assert_eq!(predator.velocity, Vector2D::zero());
    }

    #[test]
    fn test_initialize_rejects_zero_count() {
        let result = Flock::seeded(0, 800.0, 600.0, false, 1);
        assert!(matches!(result, Err(FlockError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_initialize_rejects_empty_viewport() {
        let result = Flock::seeded(10, 0.0, 600.0, false, 1);
        assert!(matches!(result, Err(FlockError::InvalidConfiguration(_))));
    }

    #[test]
    fn test_from_boids_rejects_two_predators() {
        let boids = vec![
            Boid::predator(Vector2D::zero(), Vector2D::zero()),
            Boid::predator(Vector2D::new(1.0, 1.0), Vector2D::zero()),
        ];
        assert!(Flock::from_boids(boids).is_err());
    }

    #[test]
    fn test_flock_creation() {
        let flock = Flock::random(50, 800.0, 600.0, false).unwrap();
        assert_eq!(flock.len(), 50);
        assert!(flock.predator().is_none());
    }

    #[test]
    fn test_flock_update() {
        let mut flock = Flock::seeded(10, 800.0, 600.0, false, 7).unwrap();
        let initial_positions: Vec<_> = flock.boids().iter().map(|b| b.position).collect();

        flock.step(800.0, 600.0, &FlockParams::default());

        let changed = flock
            .boids()
            .iter()
            .zip(initial_positions.iter())
            .any(|(b, &initial)| b.position != initial);

        assert!(changed);
    }
}
