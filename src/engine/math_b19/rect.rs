use bitcode::{Decode, Encode};
use glam::Vec2;

// 2D counterpart of AABB, used by the quadtree
#[derive(Default, Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub struct Rect
{
    pub min: Vec2,
    pub max: Vec2,
}
impl Rect
{
    #[inline] #[must_use] pub const fn new(min: Vec2, max: Vec2) -> Self { Self { min, max } }
    #[inline] #[must_use] pub const fn empty() -> Self { Self { min: Vec2::ZERO, max: Vec2::ZERO } }

    #[inline] #[must_use] pub fn size(self) -> Vec2 { self.max - self.min }
    #[inline] #[must_use] pub fn center(self) -> Vec2 { (self.min + self.max) / 2.0 }

    #[must_use]
    pub fn fully_contains(self, rhs: Self) -> bool
    {
        self.min.cmple(rhs.min).all() &&
        self.max.cmpge(rhs.max).all()
    }

    #[must_use]
    pub fn overlaps(self, rhs: Self) -> bool
    {
        self.min.cmple(rhs.max).all() &&
        self.max.cmpge(rhs.min).all()
    }

    #[must_use]
    pub fn clamped_to(self, bounds: Self) -> Self
    {
        Self
        {
            min: self.min.clamp(bounds.min, bounds.max),
            max: self.max.clamp(bounds.min, bounds.max),
        }
    }
}
