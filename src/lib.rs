pub use collide_b19 as collide;
pub use containers_b19 as containers;
pub use math_b19 as math;
