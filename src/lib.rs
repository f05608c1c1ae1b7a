//! Shapeshift: adaptive property-access caches and typed frame slots
//!
//! Shapeshift is the speculation layer of a dynamic-language interpreter. It
//! gives every property access site an inline cache that specializes on the
//! layouts it actually sees, gives megamorphic keyed sites dedicated caches
//! for their hot keys, and stores local variables in slots whose
//! representation is speculated and generalized monotonically.
//!
//! # Quick Start
//!
//! ```
//! use shapeshift::ic::{Context, GetCache, GetOptions, SetCache, SetOptions};
//! use shapeshift::object::JsObject;
//! use shapeshift::Value;
//!
//! fn main() -> shapeshift::Result<()> {
//!     let ctx = Context::new();
//!     let store = SetCache::new(&ctx, "count", SetOptions::default());
//!     let load = GetCache::new(&ctx, "count", GetOptions::default());
//!
//!     let obj = Value::Object(JsObject::new(None));
//!     store.set(&obj, Value::Int(1))?;
//!     assert_eq!(load.get(&obj)?, Value::Int(1));
//!     Ok(())
//! }
//! ```
//!
//! # Module Overview
//!
//! | Category | Modules |
//! |----------|---------|
//! | **Caches** | [`ic`] |
//! | **Locals** | [`frame`] |
//! | **Object model** | [`object`], [`runtime`] |
//! | **Support** | [`config`], [`error`](Error) |
#![allow(clippy::type_complexity)]
#![allow(clippy::new_without_default)]

pub mod config;
pub mod frame;
pub mod ic;
pub mod object;
pub mod prelude;
pub mod runtime;

mod error;

pub use config::CacheConfig;
pub use error::{messages, Error, ErrorKind, Result};
pub use runtime::{PropertyKey, Value};

/// Shapeshift version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
