pub mod context;
pub mod modular;
pub mod multiply;
pub mod ntt;
pub mod poly;
pub mod wide;

pub use context::RingContext;
pub use modular::{barrett_reduce, mod_mul, mod_add, mod_sub, mod_neg};
pub use multiply::{MultiplierKind, PolyMultiplier, SchoolbookMultiplier};
pub use ntt::NttMultiplier;
pub use poly::RingElement;
