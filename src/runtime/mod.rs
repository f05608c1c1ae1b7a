//! Runtime vocabulary shared by the object model and the caches

pub mod function;
pub mod intern;
pub mod key;
pub mod value;

pub use function::{call, native, NativeFn};
pub use intern::Atom;
pub use key::{PropertyKey, Symbol};
pub use value::{PrimitiveKind, Value};
