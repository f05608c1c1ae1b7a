//! Prelude module for convenient imports
//!
//! ```
//! use shapeshift::prelude::*;
//!
//! fn main() -> Result<()> {
//!     let ctx = Context::new();
//!     let cache = HasCache::new(&ctx, "x", false);
//!     let obj = Value::Object(JsObject::with_properties(None, &[("x", Value::Int(1))]));
//!     assert!(cache.has(&obj)?);
//!     Ok(())
//! }
//! ```

// Values and keys
pub use crate::runtime::{native, PropertyKey, Symbol, Value};

// Error handling
pub use crate::error::{Error, ErrorKind, Result};

// Configuration
pub use crate::config::CacheConfig;

// Caches
pub use crate::ic::{
    CacheState, Context, GetCache, GetOptions, HasCache, KeyedGetCache, KeyedHasCache, KeyedSetCache, SetCache,
    SetOptions,
};

// Object model
pub use crate::object::{new_proxy, JsObject, ModuleNamespace, ObjectRef, PropertyFlags};

// Frame slots
pub use crate::frame::{Fixity, Frame, FrameDescriptor, FrameSlot, IncDecOp, SlotKind};
