mod morton;
pub use morton::*;

mod aabb;
pub use aabb::*;

mod rect;
pub use rect::*;

mod sphere;
pub use sphere::*;

mod ray;
pub use ray::*;

mod capsule;
pub use capsule::*;

pub use primitive_tests::*;
