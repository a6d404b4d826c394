//! Projectile and explosion pools.

use glam::Vec3;
use racekit_shared::KartId;
use smallvec::SmallVec;

use super::arena::{Arena, Handle};
use super::explosion::ExplosionEffect;
use super::projectile::{KartTarget, Projectile, ProjectileHit, ProjectileKind};
use crate::config::{ProjectileConfig, ProjectileParams};
use crate::track::GroundQuery;

/// A projectile went off this tick.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Impact {
    pub kind: ProjectileKind,
    pub owner: KartId,
    pub position: Vec3,
    /// Kart hit directly, if any.
    pub direct: Option<KartId>,
}

pub type Impacts = SmallVec<[Impact; 4]>;

#[derive(Debug)]
pub struct ItemManager {
    projectiles: Arena<Projectile>,
    explosions: Arena<ExplosionEffect>,
}

impl Default for ItemManager {
    fn default() -> Self {
        Self::new()
    }
}

impl ItemManager {
    pub fn new() -> Self {
        Self {
            projectiles: Arena::with_capacity("projectile", 16),
            explosions: Arena::with_capacity("explosion", 16),
        }
    }

    pub fn projectiles(&self) -> impl Iterator<Item = (Handle<Projectile>, &Projectile)> {
        self.projectiles.iter()
    }

    pub fn explosions(&self) -> impl Iterator<Item = (Handle<ExplosionEffect>, &ExplosionEffect)> {
        self.explosions.iter()
    }

    pub fn projectile_count(&self) -> usize {
        self.projectiles.len()
    }

    pub fn explosion_count(&self) -> usize {
        self.explosions.len()
    }

    /// Launch a projectile. Homing projectiles lock onto the closest
    /// eligible kart in range.
    pub fn fire(
        &mut self,
        kind: ProjectileKind,
        owner: KartId,
        position: Vec3,
        yaw: f32,
        owner_speed: f32,
        karts: &[KartTarget],
        config: &ProjectileConfig,
    ) -> Handle<Projectile> {
        let params = params_for(kind, config);
        let target = if params.homing_turn_rate > 0.0 {
            closest_kart(position, owner, karts, params.max_homing_distance).map(|(id, _)| id)
        } else {
            None
        };
        tracing::trace!(?kind, %owner, ?target, "projectile fired");
        self.projectiles.insert(Projectile::launch(
            kind,
            owner,
            position,
            yaw,
            owner_speed,
            params,
            target,
        ))
    }

    /// Add a visual explosion not caused by a projectile (bombs).
    pub fn add_explosion(&mut self, position: Vec3, config: &ProjectileConfig) -> Handle<ExplosionEffect> {
        self.explosions
            .insert(ExplosionEffect::new(position, config.explosion_effect_time))
    }

    /// Advance projectiles then explosions. Projectiles that hit something
    /// are released and replaced by an explosion at their position.
    pub fn update(
        &mut self,
        dt: f32,
        karts: &[KartTarget],
        config: &ProjectileConfig,
        ground: &dyn GroundQuery,
    ) -> Impacts {
        let mut impacts = Impacts::new();

        for handle in self.projectiles.handles() {
            let Some(projectile) = self.projectiles.get_mut(handle) else {
                continue;
            };
            let params = params_for(projectile.kind, config);
            let Some(hit) = projectile.update(dt, karts, params, config.owner_grace_time, ground)
            else {
                continue;
            };
            let Some(projectile) = self.projectiles.remove(handle) else {
                continue;
            };
            self.add_explosion(projectile.position, config);
            impacts.push(Impact {
                kind: projectile.kind,
                owner: projectile.owner,
                position: projectile.position,
                direct: match hit {
                    ProjectileHit::Kart(id) => Some(id),
                    ProjectileHit::Expired => None,
                },
            });
        }

        for handle in self.explosions.handles() {
            let finished = self
                .explosions
                .get_mut(handle)
                .is_some_and(|effect| effect.update(dt));
            if finished {
                self.explosions.remove(handle);
            }
        }

        impacts
    }

    pub fn clear(&mut self) {
        self.projectiles.clear();
        self.explosions.clear();
    }
}

fn params_for(kind: ProjectileKind, config: &ProjectileConfig) -> &ProjectileParams {
    match kind {
        ProjectileKind::Bowling => &config.bowling,
        ProjectileKind::Cake => &config.cake,
    }
}

/// Closest kart to `from` that can be targeted, and its distance.
///
/// Skips `owner`, eliminated karts, karts in the air and animating karts.
pub fn closest_kart(
    from: Vec3,
    owner: KartId,
    karts: &[KartTarget],
    max_distance: f32,
) -> Option<(KartId, f32)> {
    karts
        .iter()
        .filter(|k| k.id != owner && !k.eliminated && k.on_ground && !k.animating)
        .map(|k| (k.id, (k.position - from).length()))
        .filter(|(_, d)| *d <= max_distance)
        .min_by(|a, b| a.1.total_cmp(&b.1))
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

    fn target(id: u8, position: Vec3) -> KartTarget {
        KartTarget {
            id: KartId(id),
            position,
            eliminated: false,
            on_ground: true,
            animating: false,
        }
    }

    #[test]
    fn test_closest_kart_filters() {
        let mut karts = vec![
            target(0, Vec3::ZERO),
            target(1, Vec3::new(0.0, 0.0, 5.0)),
            target(2, Vec3::new(0.0, 0.0, 3.0)),
            target(3, Vec3::new(0.0, 0.0, 1.0)),
        ];
        karts[3].on_ground = false;
        karts[2].eliminated = true;
        assert_eq!(
            closest_kart(Vec3::ZERO, KartId(0), &karts, 100.0).map(|(id, _)| id),
            Some(KartId(1))
        );
        assert_eq!(closest_kart(Vec3::ZERO, KartId(0), &karts, 4.0), None);
    }

    #[test]
    fn test_hit_releases_projectile_and_spawns_explosion() {
        let config = ProjectileConfig::default();
        let mut items = ItemManager::new();
        let karts = [target(0, Vec3::ZERO), target(1, Vec3::new(0.0, 0.0, 6.0))];
        let handle = items.fire(ProjectileKind::Bowling, KartId(0), Vec3::ZERO, 0.0, 0.0, &karts, &config);

        let mut impacts = Impacts::new();
        for _ in 0..60 {
            impacts.extend(items.update(DT, &karts, &config, &Flat));
            if !impacts.is_empty() {
                break;
            }
        }
        assert_eq!(impacts.len(), 1);
        assert_eq!(impacts[0].direct, Some(KartId(1)));
        assert_eq!(impacts[0].owner, KartId(0));
        assert_eq!(items.projectile_count(), 0);
        assert_eq!(items.explosion_count(), 1);
        assert!(items.projectiles().all(|(h, _)| h != handle));
    }

    #[test]
    fn test_explosions_expire() {
        let config = ProjectileConfig::default();
        let mut items = ItemManager::new();
        items.add_explosion(Vec3::ZERO, &config);
        let ticks = (config.explosion_effect_time / DT).ceil() as usize + 1;
        for _ in 0..ticks {
            items.update(DT, &[], &config, &Flat);
        }
        assert_eq!(items.explosion_count(), 0);
    }

    #[test]
    fn test_cake_locks_closest_target() {
        let config = ProjectileConfig::default();
        let mut items = ItemManager::new();
        let karts = [
            target(0, Vec3::ZERO),
            target(1, Vec3::new(0.0, 0.0, 40.0)),
            target(2, Vec3::new(5.0, 0.0, 10.0)),
        ];
        let handle = items.fire(ProjectileKind::Cake, KartId(0), Vec3::ZERO, 0.0, 0.0, &karts, &config);
        let (_, cake) = items.projectiles().find(|(h, _)| *h == handle).unwrap();
        assert_eq!(cake.target, Some(KartId(2)));

        let bowl = items.fire(ProjectileKind::Bowling, KartId(0), Vec3::ZERO, 0.0, 0.0, &karts, &config);
        let (_, ball) = items.projectiles().find(|(h, _)| *h == bowl).unwrap();
        assert_eq!(ball.target, None);
    }

    #[test]
    fn test_pool_slots_are_reused() {
        let config = ProjectileConfig::default();
        let mut items = ItemManager::new();
        for _ in 0..3 {
            items.fire(ProjectileKind::Bowling, KartId(0), Vec3::ZERO, 0.0, 0.0, &[], &config);
            let ticks = (config.bowling.lifetime / DT) as usize + 2;
            for _ in 0..ticks {
                items.update(DT, &[], &config, &Flat);
            }
        }
        assert_eq!(items.projectile_count(), 0);
        assert_eq!(items.projectiles.slot_count(), 1);
    }
}
