use glam::Vec3;
use smallvec::SmallVec;
use containers_b19::Slot;
use math_b19::{Morton3, Ray, AABB};
use crate::{CapacityError, Collider, ColliderId};

pub const MAX_LEVELS: usize = 4;
pub const NUM_NODES: usize = 585; // sum of 8^level over all levels
pub const MAX_COLLIDERS: usize = 0xFFFF;

const LEVEL_INDEX_START: [usize; MAX_LEVELS] = [0, 1, 9, 73];
const NUM_SPLITS: u32 = 1 << MAX_LEVELS;

#[inline] #[must_use] pub const fn child_start_index(index: usize) -> usize { (index << 3) + 1 }
#[inline] #[must_use]
pub const fn parent_index(index: usize) -> usize
{
    debug_assert!(0 < index);
    (index - 1) >> 3
}

// deepest (level, child) whose cell contains both codes; 3-bit groups
fn calc_contains(min_code: u32, max_code: u32) -> (usize, usize)
{
    let mut x = min_code ^ max_code;
    let mut hi = 1;
    for i in 0..MAX_LEVELS
    {
        if x & 0x07 != 0
        {
            hi = i + 1;
        }
        x >>= 3;
    }
    (MAX_LEVELS - hi, (max_code >> (hi * 3)) as usize)
}

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct RayHit
{
    pub id: ColliderId,
    pub t: f32,
}

// 3D counterpart of the quadtree, plus front-to-back ray traversal
pub struct Octree
{
    bmin: Vec3,
    bmax: Vec3,
    inv_unit: Vec3,
    node_tops: [Slot; NUM_NODES],
    colliders: Vec<Collider>,
}
impl Octree
{
    #[must_use]
    pub fn new(bmin: Vec3, bmax: Vec3) -> Self
    {
        let mut tree = Self
        {
            bmin: Vec3::ZERO,
            bmax: Vec3::ZERO,
            inv_unit: Vec3::ONE,
            node_tops: [Slot::none(); NUM_NODES],
            colliders: Vec::new(),
        };
        tree.set_range(bmin, bmax);
        tree
    }

    // must not be called while colliders are bucketed; reset() re-buckets
    pub fn set_range(&mut self, bmin: Vec3, bmax: Vec3)
    {
        assert!(bmin.is_finite() && bmax.is_finite(), "non-finite tree bounds");
        assert!(bmin.cmplt(bmax).all(), "degenerate tree bounds");

        self.bmin = bmin;
        self.bmax = bmax;
        self.inv_unit = Vec3::splat(NUM_SPLITS as f32) / (bmax - bmin);
    }

    #[inline] #[must_use] pub fn len(&self) -> usize { self.colliders.len() }
    #[inline] #[must_use] pub fn is_empty(&self) -> bool { self.colliders.is_empty() }

    #[inline] #[must_use]
    pub fn collider(&self, id: ColliderId) -> &Collider { &self.colliders[id.index()] }

    pub fn add(&mut self, collider: Collider) -> Result<ColliderId, CapacityError>
    {
        if self.colliders.len() >= MAX_COLLIDERS
        {
            log::warn!("Octree::add: collider capacity ({MAX_COLLIDERS}) exceeded");
            return Err(CapacityError);
        }

        let index = self.calc_node_index(collider.shape.bounding_box());
        let id = ColliderId(self.colliders.len() as u16);
        self.colliders.push(collider);
        self.push(id, index);
        Ok(id)
    }

    // re-bucket one collider after its shape moved; identity is kept
    pub fn recalc(&mut self, id: ColliderId)
    {
        let index = self.calc_node_index(self.colliders[id.index()].shape.bounding_box());
        self.push(id, index);
    }

    pub fn reset(&mut self)
    {
        self.node_tops = [Slot::none(); NUM_NODES];
        for i in 0..self.colliders.len()
        {
            self.recalc(ColliderId(i as u16));
        }
    }

    pub fn clear(&mut self)
    {
        self.node_tops = [Slot::none(); NUM_NODES];
        self.colliders.clear();
    }

    pub fn collide_all(&self, pairs: &mut Vec<(ColliderId, ColliderId)>)
    {
        let mut ancestors = SmallVec::new();
        self.inner_collide_all(0, &mut ancestors, pairs);
    }

    fn inner_collide_all(&self, node_index: usize, ancestors: &mut SmallVec<[usize; MAX_LEVELS]>, pairs: &mut Vec<(ColliderId, ColliderId)>)
    {
        let mut n0 = self.node_tops[node_index];
        while let Some(i0) = n0.get()
        {
            let mut n1 = self.colliders[i0 as usize].next;
            while let Some(i1) = n1.get()
            {
                pairs.push((ColliderId(i0), ColliderId(i1)));
                n1 = self.colliders[i1 as usize].next;
            }

            for &ancestor in ancestors.iter()
            {
                let mut n1 = self.node_tops[ancestor];
                while let Some(i1) = n1.get()
                {
                    pairs.push((ColliderId(i0), ColliderId(i1)));
                    n1 = self.colliders[i1 as usize].next;
                }
            }

            n0 = self.colliders[i0 as usize].next;
        }

        if MAX_LEVELS - 1 <= ancestors.len()
        {
            return;
        }

        ancestors.push(node_index);
        let child = child_start_index(node_index);
        for i in 0..8
        {
            self.inner_collide_all(child + i, ancestors, pairs);
        }
        ancestors.pop();
    }

    // Closest group-matching collider hit by the ray, front to back. Negative
    // direction components are handled by mirroring the octants instead of
    // branching per node.
    #[must_use]
    pub fn test(&self, ray: &Ray, group: u16) -> Option<RayHit>
    {
        let size = self.bmax + self.bmin;

        let mut negative_bits = 0usize;
        let mut origin = ray.origin;
        let mut direction = ray.direction;
        for i in 0..3
        {
            if ray.direction[i] < 0.0
            {
                origin[i] = size[i] - ray.origin[i];
                direction[i] = -ray.direction[i];
                negative_bits |= 1 << (2 - i);
            }
        }

        let inv = invert(direction);
        let t0 = (self.bmin - origin) * inv;
        let t1 = (self.bmax - origin) * inv;

        // root slab interval must be non-empty
        if t0.max_element() >= t1.min_element()
        {
            return None;
        }

        let mut best = (Slot::none(), f32::MAX);
        self.inner_test(ray, 0, t0, t1, negative_bits, group, &mut best);
        best.0.get().map(|i| RayHit { id: ColliderId(i), t: best.1 })
    }

    fn inner_test(&self, ray: &Ray, node_index: usize, t0: Vec3, t1: Vec3, negative_bits: usize, group: u16, best: &mut (Slot, f32))
    {
        // cell exits behind the ray origin
        if t1.x < 0.0 || t1.y < 0.0 || t1.z < 0.0
        {
            return;
        }

        let mut n0 = self.node_tops[node_index];
        while let Some(i0) = n0.get()
        {
            let collider = &self.colliders[i0 as usize];
            if collider.group == group
            {
                if let Some(t) = collider.shape.test_ray(ray)
                {
                    if t < best.1
                    {
                        *best = (Slot::some(i0), t);
                    }
                }
            }
            n0 = collider.next;
        }

        let child = child_start_index(node_index);
        if NUM_NODES <= child
        {
            return;
        }

        let tm = (t0 + t1) * 0.5;

        let mut node = first_node(t0, tm);
        loop
        {
            match node
            {
                0 =>
                {
                    self.inner_test(ray, child + negative_bits, t0, tm, negative_bits, group, best);
                    node = next_node(tm, 4, 2, 1);
                }
                1 =>
                {
                    let tt1 = Vec3::new(tm.x, tm.y, t1.z);
                    self.inner_test(ray, child + (1 ^ negative_bits), Vec3::new(t0.x, t0.y, tm.z), tt1, negative_bits, group, best);
                    node = next_node(tt1, 5, 3, 8);
                }
                2 =>
                {
                    let tt1 = Vec3::new(tm.x, t1.y, tm.z);
                    self.inner_test(ray, child + (2 ^ negative_bits), Vec3::new(t0.x, tm.y, t0.z), tt1, negative_bits, group, best);
                    node = next_node(tt1, 6, 8, 3);
                }
                3 =>
                {
                    let tt1 = Vec3::new(tm.x, t1.y, t1.z);
                    self.inner_test(ray, child + (3 ^ negative_bits), Vec3::new(t0.x, tm.y, tm.z), tt1, negative_bits, group, best);
                    node = next_node(tt1, 7, 8, 8);
                }
                4 =>
                {
                    let tt1 = Vec3::new(t1.x, tm.y, tm.z);
                    self.inner_test(ray, child + (4 ^ negative_bits), Vec3::new(tm.x, t0.y, t0.z), tt1, negative_bits, group, best);
                    node = next_node(tt1, 8, 6, 5);
                }
                5 =>
                {
                    let tt1 = Vec3::new(t1.x, tm.y, t1.z);
                    self.inner_test(ray, child + (5 ^ negative_bits), Vec3::new(tm.x, t0.y, tm.z), tt1, negative_bits, group, best);
                    node = next_node(tt1, 8, 7, 8);
                }
                6 =>
                {
                    let tt1 = Vec3::new(t1.x, t1.y, tm.z);
                    self.inner_test(ray, child + (6 ^ negative_bits), Vec3::new(tm.x, tm.y, t0.z), tt1, negative_bits, group, best);
                    node = next_node(tt1, 8, 8, 7);
                }
                7 =>
                {
                    self.inner_test(ray, child + (7 ^ negative_bits), tm, t1, negative_bits, group, best);
                    node = 8;
                }
                _ => break,
            }
        }
    }

    // world-space cell of one bucket
    #[must_use]
    pub fn node_bounds(&self, index: usize) -> AABB
    {
        debug_assert!(index < NUM_NODES);

        let mut level = 0;
        for l in (0..MAX_LEVELS).rev()
        {
            if LEVEL_INDEX_START[l] <= index
            {
                level = l;
                break;
            }
        }

        let (x, y, z) = Morton3((index - LEVEL_INDEX_START[level]) as u32).decode();
        let cell_size = (self.bmax - self.bmin) / (1u32 << level) as f32;
        let min = self.bmin + cell_size * Vec3::new(x as f32, y as f32, z as f32);
        AABB::new(min, min + cell_size)
    }

    fn calc_node_index(&self, aabb: AABB) -> usize
    {
        let min_code = self.calc_morton_code(aabb.min);
        let max_code = self.calc_morton_code(aabb.max);
        let (level, child) = calc_contains(min_code, max_code);
        let index = LEVEL_INDEX_START[level] + child;
        debug_assert!(index < NUM_NODES);
        index
    }

    fn calc_morton_code(&self, position: Vec3) -> u32
    {
        // the saturating cast clamps positions outside the range to the edge cells
        let d = (position - self.bmin) * self.inv_unit;
        let x = (d.x as u32).min(NUM_SPLITS - 1);
        let y = (d.y as u32).min(NUM_SPLITS - 1);
        let z = (d.z as u32).min(NUM_SPLITS - 1);
        Morton3::encode(x, y, z).0
    }

    fn push(&mut self, id: ColliderId, node_index: usize)
    {
        self.colliders[id.index()].next = self.node_tops[node_index];
        self.node_tops[node_index] = Slot::some(id.0);
    }
}

// reciprocal with +-0 mapped to +-MAX so the parametric planes stay ordered
fn invert(v: Vec3) -> Vec3
{
    let mut inv = Vec3::ZERO;
    for i in 0..3
    {
        inv[i] = if v[i] == 0.0
        {
            if v[i].is_sign_positive() { f32::MAX } else { f32::MIN }
        }
        else
        {
            1.0 / v[i]
        };
    }
    inv
}

// first octant the (mirrored) ray enters, from the entry-plane comparison
fn first_node(t0: Vec3, tm: Vec3) -> usize
{
    let mut node = 0;

    if t0.y < t0.x
    {
        if t0.z < t0.x
        {
            // enters through the YZ plane
            if tm.y < t0.x
            {
                node |= 2;
            }
            if tm.z < t0.x
            {
                node |= 1;
            }
            return node;
        }
    }
    else if t0.z < t0.y
    {
        // enters through the XZ plane
        if tm.x < t0.y
        {
            node |= 4;
        }
        if tm.z < t0.y
        {
            node |= 1;
        }
        return node;
    }

    // enters through the XY plane
    if tm.x < t0.z
    {
        node |= 4;
    }
    if tm.y < t0.z
    {
        node |= 2;
    }
    node
}

// next octant along the exit plane: whichever exit t is smallest wins
fn next_node(t: Vec3, x: usize, y: usize, z: usize) -> usize
{
    if t.x < t.y
    {
        if t.x < t.z
        {
            return x;
        }
    }
    else if t.y < t.z
    {
        return y;
    }
    z
}

#[cfg(test)]
mod tests
{
    use super::*;
    use approx::assert_relative_eq;
    use math_b19::Sphere;
    use crate::Shape;

    fn world() -> Octree
    {
        Octree::new(Vec3::ZERO, Vec3::splat(256.0))
    }

    fn aabb_collider(min: Vec3, max: Vec3, key: u32) -> Collider
    {
        Collider::new(Shape::Aabb(AABB::new(min, max)), 0, key)
    }

    #[test]
    fn implicit_indexing()
    {
        assert_eq!(child_start_index(0), 1);
        assert_eq!(child_start_index(1), 9);
        for i in 1..NUM_NODES
        {
            let parent = parent_index(i);
            assert!(child_start_index(parent) <= i && i < child_start_index(parent) + 8);
        }
    }

    #[test]
    fn bucket_containment()
    {
        let tree = world();
        let range = AABB::new(Vec3::ZERO, Vec3::splat(256.0));

        let mut x = 17u32;
        for _ in 0..256
        {
            x = x.wrapping_mul(1664525).wrapping_add(1013904223);
            let px = (x >> 16 & 0xFF) as f32;
            let py = (x >> 8 & 0xFF) as f32;
            let pz = (x >> 4 & 0xFF) as f32;
            let w = (x & 0x07) as f32 + 1.0;
            let aabb = AABB::new(Vec3::new(px, py, pz), Vec3::new(px + w, py + w, pz + w));

            let bounds = tree.node_bounds(tree.calc_node_index(aabb));
            let clamped = AABB::new(aabb.min.clamp(range.min, range.max), aabb.max.clamp(range.min, range.max));
            assert!(bounds.fully_contains(clamped), "{aabb:?} not inside {bounds:?}");
        }
    }

    #[test]
    fn no_false_negatives()
    {
        let mut tree = world();

        let mut boxes = Vec::new();
        let mut x = 3u32;
        for i in 0..96u32
        {
            x = x.wrapping_mul(1664525).wrapping_add(1013904223);
            let px = (x >> 16 & 0xFF) as f32;
            let py = (x >> 8 & 0xFF) as f32;
            let pz = (x >> 4 & 0xFF) as f32;
            let w = (x & 0x0F) as f32 + 1.0;
            let aabb = AABB::new(Vec3::new(px, py, pz), Vec3::new(px + w, py + w, pz + w));
            boxes.push(aabb);
            tree.add(aabb_collider(aabb.min, aabb.max, i)).unwrap();
        }

        let mut pairs = Vec::new();
        tree.collide_all(&mut pairs);
        let mut candidates: Vec<_> = pairs.iter()
            .map(|(a, b)| (a.0.min(b.0), a.0.max(b.0)))
            .collect();
        candidates.sort_unstable();
        candidates.dedup();

        for i in 0..boxes.len()
        {
            for j in (i + 1)..boxes.len()
            {
                if boxes[i].overlaps(boxes[j])
                {
                    assert!(candidates.contains(&(i as u16, j as u16)), "missed overlapping pair ({i}, {j})");
                }
            }
        }
    }

    #[test]
    fn ray_hits_closest()
    {
        let mut tree = world();

        let near = tree.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::new(50.0, 128.0, 128.0), 4.0)), 0, 0)).unwrap();
        let _far = tree.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::new(200.0, 128.0, 128.0), 4.0)), 0, 1)).unwrap();

        let ray = Ray::new(Vec3::new(1.0, 128.0, 128.0), Vec3::X, 1000.0);
        let hit = tree.test(&ray, 0).unwrap();
        assert_eq!(hit.id, near);
        assert_relative_eq!(hit.t, 45.0, epsilon = 1.0e-4);
    }

    #[test]
    fn ray_mirrored_direction()
    {
        let mut tree = world();
        let target = tree.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::new(50.0, 100.0, 60.0), 4.0)), 0, 0)).unwrap();

        // negative components on every axis
        let origin = Vec3::new(200.0, 250.0, 210.0);
        let direction = (Vec3::new(50.0, 100.0, 60.0) - origin).normalize();
        let ray = Ray::new(origin, direction, 1000.0);

        let hit = tree.test(&ray, 0).unwrap();
        assert_eq!(hit.id, target);

        let expected = origin.distance(Vec3::new(50.0, 100.0, 60.0)) - 4.0;
        assert_relative_eq!(hit.t, expected, epsilon = 1.0e-3);
    }

    #[test]
    fn ray_group_filter()
    {
        let mut tree = world();
        tree.add(Collider::new(Shape::Sphere(Sphere::new(Vec3::splat(128.0), 4.0)), 3, 0)).unwrap();

        let ray = Ray::new(Vec3::new(1.0, 128.0, 128.0), Vec3::X, 1000.0);
        assert!(tree.test(&ray, 0).is_none());
        assert!(tree.test(&ray, 3).is_some());
    }

    #[test]
    fn ray_misses_world()
    {
        let tree = world();
        let ray = Ray::new(Vec3::new(-10.0, -10.0, -10.0), -Vec3::X, 1000.0);
        assert!(tree.test(&ray, 0).is_none());
    }
}
