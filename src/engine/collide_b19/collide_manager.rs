use glam::Vec3;
use math_b19::{closest_point_point_segment, closest_point_segment_segment, test_aabb_aabb, test_ray_aabb, test_ray_sphere, test_sphere_aabb, test_sphere_sphere, Capsule, Ray, Sphere, AABB};
use crate::{CapacityError, Collider, ColliderId, Octree, RayHit, Shape};

pub const MAX_COLLISION_GROUP: usize = 16;

// narrow-phase result delivered to both colliders of a pair
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum CollisionInfo
{
    ClosestPoint(Vec3),
    NormalDepth(Vec3, f32),
}
impl CollisionInfo
{
    // flip for delivery to the second collider of a pair
    #[must_use]
    pub fn negated(self) -> Self
    {
        match self
        {
            CollisionInfo::NormalDepth(normal, depth) => CollisionInfo::NormalDepth(-normal, -depth),
            info => info,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Statistics
{
    pub num_candidates: usize,
    pub num_collides: usize,
}

// One collision world: an octree, a symmetric group filter and the
// narrow-phase dispatch. Colliders are re-registered every frame; collide_all
// empties the tree when it is done.
pub struct CollideManager
{
    octree: Octree,
    group_flags: [u16; MAX_COLLISION_GROUP],
    pairs: Vec<(ColliderId, ColliderId)>,
    statistics: Statistics,
}
impl CollideManager
{
    #[must_use]
    pub fn new(bmin: Vec3, bmax: Vec3) -> Self
    {
        Self
        {
            octree: Octree::new(bmin, bmax),
            group_flags: [0; MAX_COLLISION_GROUP],
            pairs: Vec::new(),
            statistics: Statistics::default(),
        }
    }

    pub fn set_range(&mut self, bmin: Vec3, bmax: Vec3)
    {
        self.octree.set_range(bmin, bmax);
        self.octree.reset();
    }

    // both [group0][group1] and [group1][group0] change; the mask stays symmetric
    pub fn set_collision_group(&mut self, collidable: bool, group0: u16, group1: u16)
    {
        assert!((group0 as usize) < MAX_COLLISION_GROUP);
        assert!((group1 as usize) < MAX_COLLISION_GROUP);

        if collidable
        {
            self.group_flags[group0 as usize] |= 1 << group1;
            self.group_flags[group1 as usize] |= 1 << group0;
        }
        else
        {
            self.group_flags[group0 as usize] &= !(1 << group1);
            self.group_flags[group1 as usize] &= !(1 << group0);
        }
    }

    #[must_use]
    pub fn is_group_collidable(&self, group0: u16, group1: u16) -> bool
    {
        self.group_flags[group0 as usize] & (1 << group1) != 0
    }

    pub fn add(&mut self, collider: Collider) -> Result<ColliderId, CapacityError>
    {
        self.octree.add(collider)
    }

    pub fn clear(&mut self)
    {
        self.octree.clear();
    }

    #[must_use]
    pub fn statistics(&self) -> Statistics { self.statistics }

    #[must_use]
    pub fn test(&self, ray: &Ray, group: u16) -> Option<RayHit>
    {
        self.octree.test(ray, group)
    }

    #[must_use]
    pub fn collider(&self, id: ColliderId) -> &Collider { self.octree.collider(id) }

    // Narrow-phase over the broadphase candidates. The callback runs for both
    // orderings of each colliding pair, with the info negated for the second.
    pub fn collide_all(&mut self, mut on_collision: impl FnMut(&Collider, &Collider, &CollisionInfo))
    {
        self.pairs.clear();
        self.octree.collide_all(&mut self.pairs);

        self.statistics.num_candidates = self.pairs.len();
        self.statistics.num_collides = 0;

        for &(id0, id1) in &self.pairs
        {
            let c0 = self.octree.collider(id0);
            let c1 = self.octree.collider(id1);
            if !self.is_group_collidable(c0.group, c1.group)
            {
                continue;
            }

            if let Some(info) = collide_shapes(&c0.shape, &c1.shape)
            {
                self.statistics.num_collides += 1;
                on_collision(c0, c1, &info);
                let info = info.negated();
                on_collision(c1, c0, &info);
            }
        }

        self.octree.clear();
    }
}

// the ShapeType x ShapeType dispatch matrix; swapped arms delegate with the
// arguments reversed, ray/ray and capsule/aabb are defined misses
fn collide_shapes(s0: &Shape, s1: &Shape) -> Option<CollisionInfo>
{
    match (s0, s1)
    {
        (Shape::Sphere(a), Shape::Sphere(b)) => sphere_vs_sphere(a, b),
        (Shape::Sphere(a), Shape::Ray(b)) => sphere_vs_ray(a, b),
        (Shape::Ray(a), Shape::Sphere(b)) => sphere_vs_ray(b, a),
        (Shape::Sphere(a), Shape::Aabb(b)) => sphere_vs_aabb(a, b),
        (Shape::Aabb(a), Shape::Sphere(b)) => sphere_vs_aabb(b, a),
        (Shape::Sphere(a), Shape::Capsule(b)) => sphere_vs_capsule(a, b),
        (Shape::Capsule(a), Shape::Sphere(b)) => sphere_vs_capsule(b, a),
        (Shape::Aabb(a), Shape::Aabb(b)) => aabb_vs_aabb(a, b),
        (Shape::Aabb(a), Shape::Ray(b)) => aabb_vs_ray(a, b),
        (Shape::Ray(a), Shape::Aabb(b)) => aabb_vs_ray(b, a),
        (Shape::Ray(a), Shape::Capsule(b)) => ray_vs_capsule(a, b),
        (Shape::Capsule(a), Shape::Ray(b)) => ray_vs_capsule(b, a),
        (Shape::Capsule(a), Shape::Capsule(b)) => capsule_vs_capsule(a, b),
        (Shape::Ray(_), Shape::Ray(_)) => None,
        (Shape::Aabb(_), Shape::Capsule(_)) | (Shape::Capsule(_), Shape::Aabb(_)) => None,
    }
}

fn sphere_vs_sphere(s0: &Sphere, s1: &Sphere) -> Option<CollisionInfo>
{
    let distance = test_sphere_sphere(s0, s1)?;
    let depth = 0.5 * (s0.radius() + s1.radius() - distance);
    let normal = (s1.center() - s0.center()).normalize_or_zero();
    Some(CollisionInfo::NormalDepth(normal, depth))
}

fn sphere_vs_ray(sphere: &Sphere, ray: &Ray) -> Option<CollisionInfo>
{
    let t = test_ray_sphere(ray, sphere)?;
    Some(CollisionInfo::ClosestPoint(ray.point_at(t)))
}

fn sphere_vs_aabb(sphere: &Sphere, aabb: &AABB) -> Option<CollisionInfo>
{
    let close = test_sphere_aabb(sphere, aabb)?;
    Some(CollisionInfo::ClosestPoint(close))
}

fn aabb_vs_aabb(a: &AABB, b: &AABB) -> Option<CollisionInfo>
{
    if test_aabb_aabb(a, b)
    {
        Some(CollisionInfo::ClosestPoint(Vec3::ZERO))
    }
    else
    {
        None
    }
}

fn aabb_vs_ray(aabb: &AABB, ray: &Ray) -> Option<CollisionInfo>
{
    let (tmin, _) = test_ray_aabb(ray, aabb)?;
    Some(CollisionInfo::ClosestPoint(ray.point_at(tmin)))
}

fn sphere_vs_capsule(sphere: &Sphere, capsule: &Capsule) -> Option<CollisionInfo>
{
    let (p, _) = closest_point_point_segment(sphere.center(), capsule.p0, capsule.p1);
    let d = p.distance_squared(sphere.center());

    let radius = sphere.radius() + capsule.radius;
    if d <= radius * radius
    {
        Some(CollisionInfo::ClosestPoint((p + sphere.center()) * 0.5))
    }
    else
    {
        None
    }
}

fn ray_vs_capsule(ray: &Ray, capsule: &Capsule) -> Option<CollisionInfo>
{
    let closest = closest_point_segment_segment(ray.origin, ray.end(), capsule.p0, capsule.p1);
    if closest.distance_sq <= capsule.radius * capsule.radius
    {
        Some(CollisionInfo::ClosestPoint(closest.c0))
    }
    else
    {
        None
    }
}

fn capsule_vs_capsule(c0: &Capsule, c1: &Capsule) -> Option<CollisionInfo>
{
    let closest = closest_point_segment_segment(c0.p0, c0.p1, c1.p0, c1.p1);
    let radius = c0.radius + c1.radius;
    if closest.distance_sq <= radius * radius
    {
        Some(CollisionInfo::ClosestPoint((closest.c0 + closest.c1) * 0.5))
    }
    else
    {
        None
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use approx::assert_relative_eq;

    fn world() -> CollideManager
    {
        CollideManager::new(Vec3::splat(-128.0), Vec3::splat(128.0))
    }

    #[test]
    fn group_symmetry()
    {
        let mut manager = world();
        assert!(!manager.is_group_collidable(2, 5));

        manager.set_collision_group(true, 2, 5);
        assert!(manager.is_group_collidable(2, 5));
        assert!(manager.is_group_collidable(5, 2));

        manager.set_collision_group(false, 5, 2);
        assert!(!manager.is_group_collidable(2, 5));
        assert!(!manager.is_group_collidable(5, 2));
    }

    #[test]
    fn both_callbacks_with_negated_normal()
    {
        let mut manager = world();
        manager.set_collision_group(true, 0, 0);

        manager.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::ZERO, 2.0)), 0, 10)).unwrap();
        manager.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::new(3.0, 0.0, 0.0), 2.0)), 0, 20)).unwrap();

        let mut deliveries = Vec::new();
        manager.collide_all(|c0, c1, info| deliveries.push((c0.key, c1.key, *info)));

        assert_eq!(deliveries.len(), 2);
        let (k0, k1, info0) = deliveries[0];
        let (k2, k3, info1) = deliveries[1];
        assert_eq!((k1, k0), (k2, k3));

        match (info0, info1)
        {
            (CollisionInfo::NormalDepth(n0, d0), CollisionInfo::NormalDepth(n1, d1)) =>
            {
                assert_eq!(n0, -n1);
                assert_eq!(d0, -d1);
                assert_relative_eq!(d0.abs(), 0.5); // 0.5 * (2 + 2 - 3)
                assert_relative_eq!(n0.dot(n1), -1.0);
            }
            other => panic!("expected normal/depth infos, got {other:?}"),
        }

        let stats = manager.statistics();
        assert_eq!(stats.num_candidates, 1);
        assert_eq!(stats.num_collides, 1);
    }

    #[test]
    fn group_filter_blocks()
    {
        let mut manager = world();
        // groups 0 and 1 never enabled

        manager.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::ZERO, 2.0)), 0, 0)).unwrap();
        manager.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::ONE, 2.0)), 1, 1)).unwrap();

        let mut count = 0;
        manager.collide_all(|_, _, _| count += 1);
        assert_eq!(count, 0);
        assert_eq!(manager.statistics().num_candidates, 1);
        assert_eq!(manager.statistics().num_collides, 0);
    }

    #[test]
    fn unsupported_pairs_are_silent()
    {
        let mut manager = world();
        manager.set_collision_group(true, 0, 0);

        manager.add(Collider::new(Shape::Ray(Ray::new(Vec3::ZERO, Vec3::X, 10.0)), 0, 0)).unwrap();
        manager.add(Collider::new(Shape::Ray(Ray::new(Vec3::new(5.0, -5.0, 0.0), Vec3::Y, 10.0)), 0, 1)).unwrap();

        let mut count = 0;
        manager.collide_all(|_, _, _| count += 1);
        assert_eq!(count, 0); // ray vs ray is a defined miss

        let capsule = Capsule::new(Vec3::ZERO, Vec3::Y, 1.0);
        let aabb = AABB::new(Vec3::splat(-1.0), Vec3::ONE);
        assert_eq!(collide_shapes(&Shape::Capsule(capsule), &Shape::Aabb(aabb)), None);
        assert_eq!(collide_shapes(&Shape::Aabb(aabb), &Shape::Capsule(capsule)), None);
    }

    #[test]
    fn mixed_shape_dispatch()
    {
        let sphere = Shape::Sphere(Sphere::new(Vec3::ZERO, 2.0));
        let aabb = Shape::Aabb(AABB::new(Vec3::new(1.0, -1.0, -1.0), Vec3::new(4.0, 1.0, 1.0)));
        let ray = Shape::Ray(Ray::new(Vec3::new(-10.0, 0.0, 0.0), Vec3::X, 100.0));
        let capsule = Shape::Capsule(Capsule::new(Vec3::new(0.0, -3.0, 0.0), Vec3::new(0.0, 3.0, 0.0), 1.0));

        assert!(collide_shapes(&sphere, &aabb).is_some());
        assert!(collide_shapes(&aabb, &sphere).is_some());

        // ray enters the sphere at x = -2
        assert_eq!(collide_shapes(&sphere, &ray), Some(CollisionInfo::ClosestPoint(Vec3::new(-2.0, 0.0, 0.0))));
        assert_eq!(collide_shapes(&ray, &sphere), Some(CollisionInfo::ClosestPoint(Vec3::new(-2.0, 0.0, 0.0))));

        // ray enters the box at x = 1
        assert_eq!(collide_shapes(&aabb, &ray), Some(CollisionInfo::ClosestPoint(Vec3::new(1.0, 0.0, 0.0))));

        assert!(collide_shapes(&sphere, &capsule).is_some());
        assert!(collide_shapes(&capsule, &sphere).is_some());
        assert!(collide_shapes(&ray, &capsule).is_some());
        assert!(collide_shapes(&capsule, &capsule).is_some());
    }

    #[test]
    fn frame_rebuild()
    {
        let mut manager = world();
        manager.set_collision_group(true, 0, 0);

        manager.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::ZERO, 2.0)), 0, 0)).unwrap();
        manager.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::ONE, 2.0)), 0, 1)).unwrap();

        let mut count = 0;
        manager.collide_all(|_, _, _| count += 1);
        assert_eq!(count, 2);

        // the tree was cleared; next frame starts empty
        count = 0;
        manager.collide_all(|_, _, _| count += 1);
        assert_eq!(count, 0);
        assert_eq!(manager.statistics().num_candidates, 0);
    }
}
