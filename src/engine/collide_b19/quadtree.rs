use glam::Vec2;
use smallvec::SmallVec;
use containers_b19::Slot;
use math_b19::{Morton2, Rect};
use crate::{CapacityError, Collider2, ColliderId};

pub const MAX_LEVELS: usize = 4;
pub const NUM_NODES: usize = 85; // sum of 4^level over all levels
pub const MAX_COLLIDERS: usize = 0xFFFF;

const LEVEL_INDEX_START: [usize; MAX_LEVELS] = [0, 1, 5, 21];
const NUM_SPLITS: u32 = 1 << MAX_LEVELS;

#[inline] #[must_use] pub const fn child_start_index(index: usize) -> usize { (index << 2) + 1 }
#[inline] #[must_use]
pub const fn parent_index(index: usize) -> usize
{
    debug_assert!(0 < index);
    (index - 1) >> 2
}

// deepest (level, child) whose cell contains both codes: the highest differing
// 2-bit group decides how far down the pair can go together
fn calc_contains(min_code: u32, max_code: u32) -> (usize, usize)
{
    let mut x = min_code ^ max_code;
    let mut hi = 1;
    for i in 0..MAX_LEVELS
    {
        if x & 0x03 != 0
        {
            hi = i + 1;
        }
        x >>= 2;
    }
    (MAX_LEVELS - hi, (max_code >> (hi * 2)) as usize)
}

// Fixed-depth implicit quadtree over Morton-bucketed rects. Buckets hold
// intrusive lists of collider indices; the index space is static, only the
// list heads change between frames.
pub struct Quadtree
{
    bmin: Vec2,
    bmax: Vec2,
    inv_unit: Vec2,
    node_tops: [Slot; NUM_NODES],
    colliders: Vec<Collider2>,
}
impl Quadtree
{
    #[must_use]
    pub fn new(bmin: Vec2, bmax: Vec2) -> Self
    {
        let mut tree = Self
        {
            bmin: Vec2::ZERO,
            bmax: Vec2::ZERO,
            inv_unit: Vec2::ONE,
            node_tops: [Slot::none(); NUM_NODES],
            colliders: Vec::new(),
        };
        tree.set_range(bmin, bmax);
        tree
    }

    // must not be called while colliders are bucketed (bucket assignment
    // becomes stale); reset() afterwards re-buckets
    pub fn set_range(&mut self, bmin: Vec2, bmax: Vec2)
    {
        assert!(bmin.is_finite() && bmax.is_finite(), "non-finite tree bounds");
        assert!(bmin.cmplt(bmax).all(), "degenerate tree bounds");

        self.bmin = bmin;
        self.bmax = bmax;
        self.inv_unit = Vec2::splat(NUM_SPLITS as f32) / (bmax - bmin);
    }

    #[inline] #[must_use] pub fn len(&self) -> usize { self.colliders.len() }
    #[inline] #[must_use] pub fn is_empty(&self) -> bool { self.colliders.is_empty() }

    #[inline] #[must_use]
    pub fn collider(&self, id: ColliderId) -> &Collider2 { &self.colliders[id.index()] }

    pub fn add(&mut self, collider: Collider2) -> Result<ColliderId, CapacityError>
    {
        if self.colliders.len() >= MAX_COLLIDERS
        {
            log::warn!("Quadtree::add: collider capacity ({MAX_COLLIDERS}) exceeded");
            return Err(CapacityError);
        }

        let index = self.calc_node_index(collider.rect);
        let id = ColliderId(self.colliders.len() as u16);
        self.colliders.push(collider);
        self.push(id, index);
        Ok(id)
    }

    // re-bucket one collider after its rect moved; identity is kept
    pub fn recalc(&mut self, id: ColliderId)
    {
        let index = self.calc_node_index(self.colliders[id.index()].rect);
        self.push(id, index);
    }

    // rebuild every bucket assignment, keeping collider identities
    pub fn reset(&mut self)
    {
        self.node_tops = [Slot::none(); NUM_NODES];
        for i in 0..self.colliders.len()
        {
            self.recalc(ColliderId(i as u16));
        }
    }

    // drop everything; previously returned ids are invalid afterwards
    pub fn clear(&mut self)
    {
        self.node_tops = [Slot::none(); NUM_NODES];
        self.colliders.clear();
    }

    // All candidate pairs: within each bucket, plus each bucket against every
    // bucket on its path from the root.
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
        for i in 0..4
        {
            self.inner_collide_all(child + i, ancestors, pairs);
        }
        ancestors.pop();
    }

    // world-space cell of one bucket
    #[must_use]
    pub fn node_bounds(&self, index: usize) -> Rect
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

        let (x, y) = Morton2((index - LEVEL_INDEX_START[level]) as u32).decode();
        let cell_size = (self.bmax - self.bmin) / (1u32 << level) as f32;
        let min = self.bmin + cell_size * Vec2::new(x as f32, y as f32);
        Rect::new(min, min + cell_size)
    }

    fn calc_node_index(&self, rect: Rect) -> usize
    {
        let min_code = self.calc_morton_code(rect.min);
        let max_code = self.calc_morton_code(rect.max);
        let (level, child) = calc_contains(min_code, max_code);
        let index = LEVEL_INDEX_START[level] + child;
        debug_assert!(index < NUM_NODES);
        index
    }

    fn calc_morton_code(&self, position: Vec2) -> u32
    {
        // the saturating cast clamps positions outside the range to the edge cells
        let d = (position - self.bmin) * self.inv_unit;
        let x = (d.x as u32).min(NUM_SPLITS - 1);
        let y = (d.y as u32).min(NUM_SPLITS - 1);
        Morton2::encode(x, y).0
    }

    fn push(&mut self, id: ColliderId, node_index: usize)
    {
        self.colliders[id.index()].next = self.node_tops[node_index];
        self.node_tops[node_index] = Slot::some(id.0);
    }
}
