use bitcode::{Decode, Encode};
use glam::Vec3;

#[derive(Default, Debug, Clone, Copy, PartialEq, Encode, Decode)]
pub struct AABB
{
    pub min: Vec3,
    pub max: Vec3,
}
impl AABB
{
    pub const MIN_MAX: Self = Self { min: Vec3::MIN, max: Vec3::MAX }; // for 'universe' queries

    #[inline] #[must_use] pub const fn new(min: Vec3, max: Vec3) -> Self { Self { min, max } }
    #[inline] #[must_use] pub const fn empty() -> Self { Self { min: Vec3::ZERO, max: Vec3::ZERO } }

    #[inline] #[must_use] pub fn size(self) -> Vec3 { self.max - self.min }
    #[inline] #[must_use] pub fn center(self) -> Vec3 { (self.min + self.max) / 2.0 }

    #[inline]
    pub fn union_with(&mut self, other: Self)
    {
        *self = self.unioned_with(other);
    }

    #[inline] #[must_use]
    pub fn unioned_with(self, rhs: Self) -> Self
    {
        Self
        {
            min: self.min.min(rhs.min),
            max: self.max.max(rhs.max),
        }
    }

    #[must_use]
    pub fn expanded(self, amount: f32) -> Self
    {
        Self
        {
            min: self.min - amount,
            max: self.max + amount,
        }
    }

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

    #[inline] #[must_use]
    pub fn closest_point(self, point: Vec3) -> Vec3
    {
        point.clamp(self.min, self.max)
    }
}
