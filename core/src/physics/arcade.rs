//! Arcade kart integrator.
//!
//! Bicycle-model steering, engine force over mass, rolling drag and lateral
//! grip on the ground; gravity in the air; sphere-sphere bumps between karts.

use glam::Vec3;

use super::{BodyHandle, DriveInput, KartContact, PhysicsBackend, RigidBody};
use crate::config::{KartConfig, PhysicsConfig};
use crate::track::GroundQuery;

/// Below this forward speed the brake turns into reverse.
const REVERSE_THRESHOLD: f32 = 0.1;
const REVERSE_FORCE_FRACTION: f32 = 0.5;

#[derive(Debug, Clone)]
pub struct ArcadePhysics {
    kart: KartConfig,
    physics: PhysicsConfig,
    bodies: Vec<RigidBody>,
    drives: Vec<DriveInput>,
    contacts: Vec<KartContact>,
}

impl ArcadePhysics {
    pub fn new(kart: KartConfig, physics: PhysicsConfig) -> Self {
        Self {
            kart,
            physics,
            bodies: Vec::new(),
            drives: Vec::new(),
            contacts: Vec::new(),
        }
    }

    pub fn body_count(&self) -> usize {
        self.bodies.len()
    }

    fn integrate(&self, body: &mut RigidBody, drive: &DriveInput, dt: f32, ground: &dyn GroundQuery) {
        if body.on_ground {
            let speed = body.speed();
            let yaw_rate = -speed * drive.steer_angle.tan() / self.kart.wheel_base;
            body.yaw += yaw_rate * dt;
            body.angular_velocity = Vec3::new(0.0, yaw_rate, 0.0);

            let forward = body.forward();
            let right = Vec3::new(-forward.z, 0.0, forward.x);
            let mut forward_speed = body.velocity.dot(forward);
            let mut lateral_speed = body.velocity.dot(right);

            let accel = if drive.brake {
                if forward_speed > REVERSE_THRESHOLD {
                    -self.kart.brake_deceleration
                } else {
                    -self.kart.engine_force * REVERSE_FORCE_FRACTION / body.mass
                }
            } else {
                drive.throttle.clamp(0.0, 1.0) * (self.kart.engine_force + drive.extra_force)
                    / body.mass
            };

            let drag = (1.0 - self.kart.rolling_drag * drive.drag_multiplier * dt).max(0.0);
            forward_speed = (forward_speed * drag + accel * dt)
                .clamp(-self.kart.max_speed_reverse, drive.max_speed);

            let grip = self.kart.lateral_grip / drive.skid_factor.max(1.0);
            lateral_speed *= (1.0 - grip * dt).max(0.0);

            body.velocity = forward * forward_speed + right * lateral_speed;
        } else {
            body.velocity.y -= self.physics.gravity * dt;
        }

        body.position += body.velocity * dt;

        match ground.ground_height(body.position) {
            Some(height)
                if body.position.y <= height + self.physics.ground_snap
                    && body.velocity.y <= 0.0 =>
            {
                body.position.y = height;
                body.velocity.y = 0.0;
                body.on_ground = true;
            }
            _ => body.on_ground = false,
        }
    }

    fn resolve_contacts(&mut self) {
        self.contacts.clear();
        let min_dist = 2.0 * self.kart.radius;
        let restitution = self.physics.restitution;

        for i in 0..self.bodies.len() {
            for j in (i + 1)..self.bodies.len() {
                let (left, right) = self.bodies.split_at_mut(j);
                let a = &mut left[i];
                let b = &mut right[0];
                if !a.attached || !b.attached {
                    continue;
                }

                let delta = b.position - a.position;
                let dist = delta.length();
                if dist >= min_dist {
                    continue;
                }

                let flat = Vec3::new(delta.x, 0.0, delta.z);
                let normal = flat.try_normalize().unwrap_or(Vec3::X);
                let push = (min_dist - dist) * 0.5;
                a.position -= normal * push;
                b.position += normal * push;

                let closing = (b.velocity - a.velocity).dot(normal);
                if closing < 0.0 {
                    let impulse = -(1.0 + restitution) * closing / (1.0 / a.mass + 1.0 / b.mass);
                    a.velocity -= normal * (impulse / a.mass);
                    b.velocity += normal * (impulse / b.mass);
                }

                self.contacts.push(KartContact {
                    a: BodyHandle(i as u32),
                    b: BodyHandle(j as u32),
                });
            }
        }
    }
}

impl PhysicsBackend for ArcadePhysics {
    fn add_body(&mut self, position: Vec3, yaw: f32, mass: f32) -> BodyHandle {
        let handle = BodyHandle(self.bodies.len() as u32);
        self.bodies.push(RigidBody {
            position,
            yaw,
            velocity: Vec3::ZERO,
            angular_velocity: Vec3::ZERO,
            mass,
            on_ground: true,
            attached: true,
        });
        self.drives.push(DriveInput::default());
        handle
    }

    fn body(&self, handle: BodyHandle) -> Option<&RigidBody> {
        self.bodies.get(handle.index())
    }

    fn body_mut(&mut self, handle: BodyHandle) -> Option<&mut RigidBody> {
        self.bodies.get_mut(handle.index())
    }

    fn set_drive(&mut self, handle: BodyHandle, drive: DriveInput) {
        if let Some(slot) = self.drives.get_mut(handle.index()) {
            *slot = drive;
        }
    }

    fn step(&mut self, dt: f32, ground: &dyn GroundQuery) {
        if dt <= 0.0 {
            self.contacts.clear();
            return;
        }
        let mut bodies = std::mem::take(&mut self.bodies);
        for (body, drive) in bodies.iter_mut().zip(&self.drives) {
            if body.attached {
                self.integrate(body, drive, dt, ground);
            }
        }
        self.bodies = bodies;
        self.resolve_contacts();
    }

    fn contacts(&self) -> &[KartContact] {
        &self.contacts
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DT: f32 = 1.0 / 60.0;

    struct Flat;

    impl GroundQuery for Flat {
        fn ground_height(&self, _position: Vec3) -> Option<f32> {
            Some(0.0)
        }
    }

    struct Void;

    impl GroundQuery for Void {
        fn ground_height(&self, _position: Vec3) -> Option<f32> {
            None
        }
    }

    fn physics() -> ArcadePhysics {
        ArcadePhysics::new(KartConfig::default(), PhysicsConfig::default())
    }

    fn full_throttle(max_speed: f32) -> DriveInput {
        DriveInput {
            throttle: 1.0,
            max_speed,
            ..DriveInput::default()
        }
    }

    #[test]
    fn test_throttle_accelerates_forward() {
        let mut p = physics();
        let h = p.add_body(Vec3::ZERO, 0.0, 225.0);
        p.set_drive(h, full_throttle(25.0));
        for _ in 0..60 {
            p.step(DT, &Flat);
        }
        let body = p.body(h).unwrap();
        assert!(body.speed() > 5.0);
        assert!(body.position.z > 1.0);
        assert!(body.position.x.abs() < 1e-4);
        assert!(body.on_ground);
    }

    #[test]
    fn test_speed_clamped_to_max() {
        let mut p = physics();
        let h = p.add_body(Vec3::ZERO, 0.0, 225.0);
        p.set_drive(h, full_throttle(10.0));
        for _ in 0..600 {
            p.step(DT, &Flat);
        }
        assert!(p.body(h).unwrap().speed() <= 10.0 + 1e-4);
    }

    #[test]
    fn test_heavier_body_accelerates_slower() {
        let mut p = physics();
        let light = p.add_body(Vec3::ZERO, 0.0, 225.0);
        let heavy = p.add_body(Vec3::new(50.0, 0.0, 0.0), 0.0, 375.0);
        p.set_drive(light, full_throttle(25.0));
        p.set_drive(heavy, full_throttle(25.0));
        for _ in 0..30 {
            p.step(DT, &Flat);
        }
        assert!(p.body(light).unwrap().speed() > p.body(heavy).unwrap().speed());
    }

    #[test]
    fn test_positive_steer_turns_right() {
        let mut p = physics();
        let h = p.add_body(Vec3::ZERO, 0.0, 225.0);
        p.body_mut(h).unwrap().velocity = Vec3::new(0.0, 0.0, 10.0);
        p.set_drive(
            h,
            DriveInput {
                throttle: 0.5,
                steer_angle: 0.3,
                max_speed: 25.0,
                ..DriveInput::default()
            },
        );
        for _ in 0..30 {
            p.step(DT, &Flat);
        }
        let body = p.body(h).unwrap();
        assert!(body.yaw < 0.0);
        // Heading +Z, right is -X.
        assert!(body.position.x < 0.0);
    }

    #[test]
    fn test_brake_then_reverse() {
        let mut p = physics();
        let h = p.add_body(Vec3::ZERO, 0.0, 225.0);
        p.body_mut(h).unwrap().velocity = Vec3::new(0.0, 0.0, 5.0);
        p.set_drive(
            h,
            DriveInput {
                brake: true,
                max_speed: 25.0,
                ..DriveInput::default()
            },
        );
        for _ in 0..120 {
            p.step(DT, &Flat);
        }
        let speed = p.body(h).unwrap().speed();
        assert!(speed < 0.0);
        assert!(speed >= -KartConfig::default().max_speed_reverse - 1e-4);
    }

    #[test]
    fn test_falls_without_ground() {
        let mut p = physics();
        let h = p.add_body(Vec3::new(0.0, 5.0, 0.0), 0.0, 225.0);
        p.body_mut(h).unwrap().on_ground = false;
        for _ in 0..30 {
            p.step(DT, &Void);
        }
        let body = p.body(h).unwrap();
        assert!(!body.on_ground);
        assert!(body.position.y < 5.0);
        assert!(body.velocity.y < 0.0);
    }

    #[test]
    fn test_lands_on_ground() {
        let mut p = physics();
        let h = p.add_body(Vec3::new(0.0, 1.0, 0.0), 0.0, 225.0);
        p.body_mut(h).unwrap().on_ground = false;
        for _ in 0..120 {
            p.step(DT, &Flat);
        }
        let body = p.body(h).unwrap();
        assert!(body.on_ground);
        assert_eq!(body.position.y, 0.0);
    }

    #[test]
    fn test_detached_body_is_frozen() {
        let mut p = physics();
        let h = p.add_body(Vec3::ZERO, 0.0, 225.0);
        p.body_mut(h).unwrap().velocity = Vec3::new(0.0, 0.0, 10.0);
        p.detach(h);
        p.step(DT, &Flat);
        assert_eq!(p.body(h).unwrap().position, Vec3::ZERO);

        p.attach(h);
        let body = p.body(h).unwrap();
        assert!(body.attached);
        assert_eq!(body.velocity, Vec3::ZERO);
        assert_eq!(body.angular_velocity, Vec3::ZERO);
    }

    #[test]
    fn test_overlapping_karts_are_pushed_apart() {
        let mut p = physics();
        let a = p.add_body(Vec3::ZERO, 0.0, 225.0);
        let b = p.add_body(Vec3::new(1.0, 0.0, 0.0), 0.0, 225.0);
        p.body_mut(a).unwrap().velocity = Vec3::new(2.0, 0.0, 0.0);
        p.step(DT, &Flat);

        assert_eq!(p.contacts(), &[KartContact { a, b }]);
        let pa = p.body(a).unwrap().position;
        let pb = p.body(b).unwrap().position;
        assert!((pb - pa).length() >= 2.0 - 1e-4);
        // Closing velocity was reflected into b.
        assert!(p.body(b).unwrap().velocity.x > 0.0);
    }

    #[test]
    fn test_detached_bodies_never_collide() {
        let mut p = physics();
        let a = p.add_body(Vec3::ZERO, 0.0, 225.0);
        p.add_body(Vec3::new(0.5, 0.0, 0.0), 0.0, 225.0);
        p.detach(a);
        p.step(DT, &Flat);
        assert!(p.contacts().is_empty());
    }

    #[test]
    fn test_zero_dt_is_noop() {
        let mut p = physics();
        let h = p.add_body(Vec3::ZERO, 0.0, 225.0);
        p.set_drive(h, full_throttle(25.0));
        p.step(0.0, &Flat);
        assert_eq!(p.body(h).unwrap().velocity, Vec3::ZERO);
        assert_eq!(p.body_count(), 1);
    }
}
