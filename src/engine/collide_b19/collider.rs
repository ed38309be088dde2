use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use containers_b19::Slot;
use math_b19::{test_ray_aabb, test_ray_capsule, test_ray_sphere, Capsule, Ray, Rect, Sphere, AABB};

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum ShapeType
{
    Sphere,
    Ray,
    Aabb,
    Capsule,
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub enum Shape
{
    Sphere(Sphere),
    Ray(Ray),
    Aabb(AABB),
    Capsule(Capsule),
}
impl Shape
{
    #[must_use]
    pub fn shape_type(&self) -> ShapeType
    {
        match self
        {
            Shape::Sphere(_) => ShapeType::Sphere,
            Shape::Ray(_) => ShapeType::Ray,
            Shape::Aabb(_) => ShapeType::Aabb,
            Shape::Capsule(_) => ShapeType::Capsule,
        }
    }

    #[must_use]
    pub fn bounding_box(&self) -> AABB
    {
        match self
        {
            Shape::Sphere(sphere) => sphere.bounding_box(),
            Shape::Ray(ray) => ray.bounding_box(),
            Shape::Aabb(aabb) => *aabb,
            Shape::Capsule(capsule) => capsule.bounding_box(),
        }
    }

    // entry t along the ray, for ray queries against this shape
    #[must_use]
    pub fn test_ray(&self, ray: &Ray) -> Option<f32>
    {
        match self
        {
            Shape::Sphere(sphere) => test_ray_sphere(ray, sphere),
            Shape::Aabb(aabb) => test_ray_aabb(ray, aabb).map(|(tmin, _)| tmin),
            Shape::Capsule(capsule) => test_ray_capsule(ray, capsule),
            Shape::Ray(_) => None, // ray vs ray never hits by definition
        }
    }
}

// identity of a collider registered with a tree, valid until the next clear()
#[derive(Copy, Clone, PartialEq, Eq, Debug)]
pub struct ColliderId(pub(crate) u16);
impl ColliderId
{
    #[inline] #[must_use] pub const fn index(self) -> usize { self.0 as usize }
}

// caller-described volume; `key` is an opaque tag handed back in pair reports
pub struct Collider
{
    pub shape: Shape,
    pub group: u16,
    pub key: u32,
    pub(crate) next: Slot,
}
impl Collider
{
    #[must_use]
    pub fn new(shape: Shape, group: u16, key: u32) -> Self
    {
        Self { shape, group, key, next: Slot::none() }
    }
}

// 2D counterpart for the quadtree
pub struct Collider2
{
    pub rect: Rect,
    pub group: u16,
    pub key: u32,
    pub(crate) next: Slot,
}
impl Collider2
{
    #[must_use]
    pub fn new(rect: Rect, group: u16, key: u32) -> Self
    {
        Self { rect, group, key, next: Slot::none() }
    }
}

// registering past a tree's collider capacity
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CapacityError;
impl Display for CapacityError
{
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result { Debug::fmt(self, f) }
}
impl Error for CapacityError { }
