//! Items lying on the track: bonus boxes, bananas and herrings.

use glam::Vec3;

use crate::track::Track;

/// Karts closer than this to an item collect it.
const PICKUP_RADIUS: f32 = 1.5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PickupKind {
    /// Random powerup.
    BonusBox,
    /// Random attachment.
    Banana,
    /// One herring.
    SmallHerring,
    /// Three herrings.
    BigHerring,
}

impl PickupKind {
    pub fn herrings(self) -> u32 {
        match self {
            PickupKind::SmallHerring => 1,
            PickupKind::BigHerring => 3,
            PickupKind::BonusBox | PickupKind::Banana => 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct TrackItem {
    pub kind: PickupKind,
    pub position: Vec3,
    disabled_for: f32,
}

impl TrackItem {
    pub fn new(kind: PickupKind, position: Vec3) -> Self {
        Self {
            kind,
            position,
            disabled_for: 0.0,
        }
    }

    pub fn is_active(&self) -> bool {
        self.disabled_for <= 0.0
    }

    pub fn disabled_for(&self) -> f32 {
        self.disabled_for
    }

    /// Disable for at least `seconds`.
    pub fn disable(&mut self, seconds: f32) {
        self.disabled_for = self.disabled_for.max(seconds);
    }
}

#[derive(Debug, Clone, Default)]
pub struct PickupField {
    items: Vec<TrackItem>,
}

impl PickupField {
    pub fn new(items: Vec<TrackItem>) -> Self {
        Self { items }
    }

    /// One row of items every `spacing` metres, cycling boxes, herrings and
    /// bananas. The start straight is left clear.
    pub fn along_track(track: &Track, spacing: f32) -> Self {
        const PATTERN: [PickupKind; 4] = [
            PickupKind::BonusBox,
            PickupKind::SmallHerring,
            PickupKind::Banana,
            PickupKind::BigHerring,
        ];
        if spacing <= 0.0 {
            return Self::default();
        }
        let mut items = Vec::new();
        let mut distance = spacing * 2.0;
        let mut row = 0;
        while distance < track.length() - spacing {
            let kind = PATTERN[row % PATTERN.len()];
            for lateral in [-0.5, 0.0, 0.5] {
                let (position, _) = track.transform_at(distance, lateral * track.half_width());
                items.push(TrackItem::new(kind, position));
            }
            distance += spacing;
            row += 1;
        }
        Self { items }
    }

    pub fn items(&self) -> &[TrackItem] {
        &self.items
    }

    pub fn get_mut(&mut self, index: usize) -> Option<&mut TrackItem> {
        self.items.get_mut(index)
    }

    pub fn update(&mut self, dt: f32) {
        for item in &mut self.items {
            if item.disabled_for > 0.0 {
                item.disabled_for = (item.disabled_for - dt).max(0.0);
            }
        }
    }

    /// First active item touching `position`. The item is disabled for
    /// `respawn_time` seconds.
    pub fn collect(&mut self, position: Vec3, respawn_time: f32) -> Option<(usize, PickupKind)> {
        let index = self
            .items
            .iter()
            .position(|item| item.is_active() && (item.position - position).length() <= PICKUP_RADIUS)?;
        let item = &mut self.items[index];
        item.disable(respawn_time);
        Some((index, item.kind))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collect_disables_until_respawn() {
        let mut field = PickupField::new(vec![TrackItem::new(PickupKind::BonusBox, Vec3::ZERO)]);
        assert_eq!(field.collect(Vec3::new(0.5, 0.0, 0.0), 2.0), Some((0, PickupKind::BonusBox)));
        assert_eq!(field.collect(Vec3::ZERO, 2.0), None);
        field.update(1.0);
        assert_eq!(field.collect(Vec3::ZERO, 2.0), None);
        field.update(1.0);
        assert!(field.items()[0].is_active());
        assert!(field.collect(Vec3::ZERO, 2.0).is_some());
    }

    #[test]
    fn test_out_of_reach() {
        let mut field = PickupField::new(vec![TrackItem::new(PickupKind::Banana, Vec3::ZERO)]);
        assert_eq!(field.collect(Vec3::new(3.0, 0.0, 0.0), 2.0), None);
    }

    #[test]
    fn test_disable_keeps_longest() {
        let mut item = TrackItem::new(PickupKind::Banana, Vec3::ZERO);
        item.disable(4.0);
        item.disable(2.0);
        assert_eq!(item.disabled_for(), 4.0);
    }

    #[test]
    fn test_along_track_layout() {
        let track = Track::oval("oval", 100.0, 20.0, 6.0, 16).unwrap();
        let field = PickupField::along_track(&track, 25.0);
        assert!(!field.items().is_empty());
        assert_eq!(field.items().len() % 3, 0);
        assert_eq!(field.items()[0].kind, PickupKind::BonusBox);
        // Nothing on the start grid.
        assert!(field
            .items()
            .iter()
            .all(|item| track.distance_down_track(item.position) >= 25.0));
        assert_eq!(PickupKind::BigHerring.herrings(), 3);
    }
}
