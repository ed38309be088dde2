use bitcode::{Decode, Encode};
use glam::{Vec3, Vec4, Vec4Swizzles};
use crate::AABB;

// center in xyz, radius in w
#[derive(Default, Clone, Copy, Debug, PartialEq, Encode, Decode)]
pub struct Sphere(pub Vec4);
impl Sphere
{
    pub const EMPTY: Self = Self(Vec4::ZERO);

    pub fn new(center: Vec3, radius: f32) -> Self
    {
        Self(Vec4::new(center.x, center.y, center.z, radius))
    }

    #[inline] #[must_use] pub fn center(&self) -> Vec3 { self.0.xyz() }
    #[inline] #[must_use] pub fn radius(&self) -> f32 { self.0.w }
    #[inline] #[must_use] pub fn radius_sq(&self) -> f32 { self.0.w * self.0.w }

    #[must_use]
    pub fn expanded(self, add_radius: f32) -> Self
    {
        Self(Vec4::new(self.0.x, self.0.y, self.0.z, self.0.w + add_radius))
    }

    #[must_use]
    pub fn bounding_box(&self) -> AABB
    {
        AABB::new(self.center() - self.radius(), self.center() + self.radius())
    }
}

#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn basic()
    {
        let s = Sphere::new(Vec3::new(1.0, 2.0, 3.0), 4.0);
        assert_eq!(s.center(), Vec3::new(1.0, 2.0, 3.0));
        assert_eq!(s.radius(), 4.0);
        assert_eq!(s.radius_sq(), 16.0);
        assert_eq!(s.expanded(1.0).radius(), 5.0);
    }

    #[test]
    fn bounds()
    {
        let s = Sphere::new(Vec3::ZERO, 2.0);
        assert_eq!(s.bounding_box(), AABB::new(Vec3::splat(-2.0), Vec3::splat(2.0)));
    }
}
