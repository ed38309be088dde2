use bitcode::{Decode, Encode};
use glam::Vec3;
use crate::AABB;

// segment p0-p1 swept by a sphere of the given radius
#[derive(Clone, Copy, Debug, PartialEq, Encode, Decode)]
pub struct Capsule
{
    pub p0: Vec3,
    pub p1: Vec3,
    pub radius: f32,
}
impl Capsule
{
    #[inline] #[must_use]
    pub const fn new(p0: Vec3, p1: Vec3, radius: f32) -> Self
    {
        Self { p0, p1, radius }
    }

    #[must_use]
    pub fn bounding_box(&self) -> AABB
    {
        AABB::new(self.p0.min(self.p1) - self.radius, self.p0.max(self.p1) + self.radius)
    }
}
