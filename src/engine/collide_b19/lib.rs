mod collider;
pub use collider::*;

pub mod quadtree;
pub use quadtree::Quadtree;

pub mod octree;
pub use octree::{Octree, RayHit};

mod collide_manager;
pub use collide_manager::*;
