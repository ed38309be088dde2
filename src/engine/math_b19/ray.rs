use bitcode::{Decode, Encode};
use glam::Vec3;
use crate::AABB;

// a directed segment: points origin + s*direction for s in [0, t].
// direction is expected to be normalized by the caller
#[derive(Clone, Copy, Debug, PartialEq, Encode, Decode)]
pub struct Ray
{
    pub origin: Vec3,
    pub direction: Vec3,
    pub t: f32,
}
impl Ray
{
    #[inline] #[must_use]
    pub const fn new(origin: Vec3, direction: Vec3, t: f32) -> Self
    {
        Self { origin, direction, t }
    }

    #[inline] #[must_use]
    pub fn point_at(&self, t: f32) -> Vec3
    {
        self.origin + self.direction * t
    }

    #[inline] #[must_use]
    pub fn end(&self) -> Vec3
    {
        self.point_at(self.t)
    }

    #[must_use]
    pub fn bounding_box(&self) -> AABB
    {
        let end = self.end();
        AABB::new(self.origin.min(end), self.origin.max(end))
    }
}
