//! Track centerline and ground queries.
//!
//! A track is a closed polyline on the XZ plane with per-point heights and a
//! constant drivable half-width. Distance down the track is measured along
//! the centerline from point 0, which is also the start/finish line.

use glam::Vec3;

use crate::error::SetupError;

/// Distance between grid rows at the start line.
const GRID_ROW_SPACING: f32 = 4.0;
/// Distance of the front row past the start line.
const GRID_FRONT_OFFSET: f32 = 2.0;
/// Karts per grid row.
const GRID_COLUMNS: usize = 2;
const MIN_SEGMENT_LENGTH: f32 = 1e-3;

/// Ground collision service used by physics.
pub trait GroundQuery {
    /// Ground height under `position`, or `None` when nothing is below.
    fn ground_height(&self, position: Vec3) -> Option<f32>;
}

/// Closest centerline point to a world position.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackProjection {
    /// Distance down the track in `[0, length)`.
    pub distance: f32,
    /// Signed offset from the centerline, positive to the right.
    pub lateral: f32,
    /// Centerline height at the projection.
    pub height: f32,
}

/// Grid slot at race start.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StartPosition {
    pub position: Vec3,
    pub yaw: f32,
}

#[derive(Debug, Clone)]
pub struct Track {
    name: String,
    points: Vec<Vec3>,
    /// `cumulative[i]` is the distance at point `i`; the last entry is the
    /// full lap length.
    cumulative: Vec<f32>,
    half_width: f32,
    lowest: f32,
}

impl Track {
    pub fn new(
        name: impl Into<String>,
        points: Vec<Vec3>,
        half_width: f32,
    ) -> Result<Self, SetupError> {
        let name = name.into();
        if points.len() < 3 {
            return Err(SetupError::TrackTooShort {
                track: name,
                points: points.len(),
            });
        }

        let mut cumulative = Vec::with_capacity(points.len() + 1);
        let mut total = 0.0;
        cumulative.push(0.0);
        for i in 0..points.len() {
            let a = points[i];
            let b = points[(i + 1) % points.len()];
            let len = flat(b - a).length();
            if len < MIN_SEGMENT_LENGTH {
                return Err(SetupError::DegenerateSegment { track: name, index: i });
            }
            total += len;
            cumulative.push(total);
        }

        let lowest = points.iter().map(|p| p.y).fold(f32::INFINITY, f32::min);
        Ok(Self {
            name,
            points,
            cumulative,
            half_width,
            lowest,
        })
    }

    /// Stadium-shaped test track.
    ///
    /// Starts at the origin heading +Z, runs `straight` metres, then turns
    /// right through two semicircles of `radius`.
    pub fn oval(
        name: impl Into<String>,
        straight: f32,
        radius: f32,
        half_width: f32,
        segments_per_turn: usize,
    ) -> Result<Self, SetupError> {
        let segs = segments_per_turn.max(2);
        let mut points = Vec::with_capacity(2 * segs + 2);
        points.push(Vec3::ZERO);
        points.push(Vec3::new(0.0, 0.0, straight));
        for k in 1..=segs {
            let theta = std::f32::consts::PI * k as f32 / segs as f32;
            points.push(Vec3::new(
                -radius + radius * theta.cos(),
                0.0,
                straight + radius * theta.sin(),
            ));
        }
        points.push(Vec3::new(-2.0 * radius, 0.0, 0.0));
        for k in 1..segs {
            let phi = std::f32::consts::PI * (1.0 + k as f32 / segs as f32);
            points.push(Vec3::new(-radius + radius * phi.cos(), 0.0, radius * phi.sin()));
        }
        Self::new(name, points, half_width)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn length(&self) -> f32 {
        self.cumulative[self.points.len()]
    }

    pub fn half_width(&self) -> f32 {
        self.half_width
    }

    /// Height of the lowest centerline point.
    pub fn lowest_point(&self) -> f32 {
        self.lowest
    }

    /// Project `position` onto the closest centerline segment.
    pub fn project(&self, position: Vec3) -> TrackProjection {
        let n = self.points.len();
        let mut best = (f32::INFINITY, 0usize, 0.0f32);
        for i in 0..n {
            let a = self.points[i];
            let b = self.points[(i + 1) % n];
            let d = flat(b - a);
            let t = (flat(position - a).dot(d) / d.length_squared()).clamp(0.0, 1.0);
            let dist2 = flat(position - (a + (b - a) * t)).length_squared();
            if dist2 < best.0 {
                best = (dist2, i, t);
            }
        }

        let (_, i, t) = best;
        let a = self.points[i];
        let b = self.points[(i + 1) % n];
        let on_line = a + (b - a) * t;
        let forward = flat(b - a).normalize();
        let offset = flat(position - on_line);
        let seg_len = self.cumulative[i + 1] - self.cumulative[i];
        TrackProjection {
            distance: wrap(self.cumulative[i] + seg_len * t, self.length()),
            lateral: dot_right(forward, offset),
            height: on_line.y,
        }
    }

    pub fn distance_down_track(&self, position: Vec3) -> f32 {
        self.project(position).distance
    }

    /// World position and yaw at `distance` along the centerline, offset
    /// sideways by `lateral`.
    pub fn transform_at(&self, distance: f32, lateral: f32) -> (Vec3, f32) {
        let n = self.points.len();
        let d = wrap(distance, self.length());
        let i = match self.cumulative.binary_search_by(|c| c.total_cmp(&d)) {
            Ok(i) => i.min(n - 1),
            Err(i) => i.saturating_sub(1).min(n - 1),
        };
        let a = self.points[i];
        let b = self.points[(i + 1) % n];
        let seg_len = self.cumulative[i + 1] - self.cumulative[i];
        let t = ((d - self.cumulative[i]) / seg_len).clamp(0.0, 1.0);
        let forward = flat(b - a).normalize();
        let right = Vec3::new(-forward.z, 0.0, forward.x);
        let position = a + (b - a) * t + right * lateral;
        (position, forward.x.atan2(forward.z))
    }

    /// Lap change implied by moving from `previous` to `current` distance.
    ///
    /// A jump of more than half a lap is a wrap across the start line.
    pub fn lap_delta(&self, previous: f32, current: f32) -> i32 {
        let half = self.length() * 0.5;
        let delta = current - previous;
        if delta < -half {
            1
        } else if delta > half {
            -1
        } else {
            0
        }
    }

    /// Grid slots for `count` karts, leader first, dropped onto `ground`.
    pub fn start_positions(
        &self,
        count: usize,
        ground: &impl GroundQuery,
    ) -> Result<Vec<StartPosition>, SetupError> {
        let rows = count.div_ceil(GRID_COLUMNS);
        let grid_length = GRID_FRONT_OFFSET + rows as f32 * GRID_ROW_SPACING;
        if grid_length > self.length() * 0.5 {
            let available =
                ((self.length() * 0.5 - GRID_FRONT_OFFSET) / GRID_ROW_SPACING).max(0.0) as usize
                    * GRID_COLUMNS;
            return Err(SetupError::NotEnoughStartPositions {
                available,
                karts: count,
            });
        }

        (0..count)
            .map(|index| {
                let row = index / GRID_COLUMNS;
                let distance = GRID_FRONT_OFFSET + (rows - 1 - row) as f32 * GRID_ROW_SPACING;
                let side = if index % GRID_COLUMNS == 0 { -0.5 } else { 0.5 };
                let (mut position, yaw) = self.transform_at(distance, side * self.half_width);
                let height = ground
                    .ground_height(position)
                    .ok_or(SetupError::NoGroundAtStart {
                        index,
                        x: position.x,
                        z: position.z,
                    })?;
                position.y = height;
                Ok(StartPosition { position, yaw })
            })
            .collect()
    }
}

impl GroundQuery for Track {
    fn ground_height(&self, position: Vec3) -> Option<f32> {
        let projection = self.project(position);
        (projection.lateral.abs() <= self.half_width).then_some(projection.height)
    }
}

fn flat(v: Vec3) -> Vec3 {
    Vec3::new(v.x, 0.0, v.z)
}

/// Signed component of `offset` along the right-hand side of `forward`.
fn dot_right(forward: Vec3, offset: Vec3) -> f32 {
    -offset.x * forward.z + offset.z * forward.x
}

fn wrap(distance: f32, length: f32) -> f32 {
    let d = distance.rem_euclid(length);
    if d >= length { 0.0 } else { d }
}
