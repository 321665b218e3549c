use glam::Vec2;

/// Axis-aligned bounding box. Boundaries are inclusive, so a zero-area box
/// still intersects anything touching its point.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Box2 {
    pub min: Vec2,
    pub max: Vec2,
}

impl Box2 {
    pub fn new(min: Vec2, max: Vec2) -> Self {
        Self {
            min: min.min(max),
            max: min.max(max),
        }
    }

    pub fn from_point(point: Vec2) -> Self {
        Self {
            min: point,
            max: point,
        }
    }

    pub fn centered(center: Vec2, half_extents: Vec2) -> Self {
        let half = half_extents.abs();
        Self {
            min: center - half,
            max: center + half,
        }
    }

    #[inline]
    pub fn intersects(&self, other: &Box2) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
    }

    #[inline]
    pub fn contains_point(&self, point: Vec2) -> bool {
        point.x >= self.min.x && point.x <= self.max.x && point.y >= self.min.y && point.y <= self.max.y
    }

    #[inline]
    pub fn contains(&self, other: &Box2) -> bool {
        self.min.x <= other.min.x
            && self.min.y <= other.min.y
            && self.max.x >= other.max.x
            && self.max.y >= other.max.y
    }

    #[inline]
    pub fn union(&self, other: &Box2) -> Box2 {
        Box2 {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Enlarges the box by `amount` on every side.
    pub fn grow(&self, amount: f32) -> Box2 {
        let delta = Vec2::splat(amount);
        Box2 {
            min: self.min - delta,
            max: self.max + delta,
        }
    }

    pub fn center(&self) -> Vec2 {
        (self.min + self.max) * 0.5
    }

    pub fn size(&self) -> Vec2 {
        self.max - self.min
    }

    /// Surface heuristic used by the tree when choosing where to insert.
    #[inline]
    pub fn perimeter(&self) -> f32 {
        let size = self.size();
        2.0 * (size.x + size.y)
    }

    pub fn is_degenerate(&self) -> bool {
        let size = self.size();
        size.x == 0.0 || size.y == 0.0
    }
}
