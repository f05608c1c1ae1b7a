//! Inline caches for property access
//!
//! Every property access site owns one cache. A cache keeps a short chain of
//! specializations, each a receiver guard plus a strategy, and falls back to
//! the full object-model semantics once the chain overflows. Keyed sites
//! (`o[k]`) add frequency sampling to give hot keys their own caches.
//!
//! ```
//! use shapeshift::ic::{Context, GetCache, GetOptions};
//! use shapeshift::object::JsObject;
//! use shapeshift::runtime::Value;
//!
//! let ctx = Context::new();
//! let cache = GetCache::new(&ctx, "answer", GetOptions::default());
//! let obj = Value::Object(JsObject::with_properties(None, &[("answer", Value::Int(42))]));
//! assert_eq!(cache.get(&obj).unwrap(), Value::Int(42));
//! ```

mod chain;
mod check;
pub mod context;
pub mod frequency;
pub mod get;
pub mod has;
pub mod keyed;
pub mod set;
pub mod stats;

pub use chain::CacheState;
pub use context::{Context, ContextBuilder};
pub use frequency::{FrequencySampler, SampleOutcome};
pub use get::{GetCache, GetOptions};
pub use has::HasCache;
pub use keyed::{KeyedGetCache, KeyedHasCache, KeyedSetCache};
pub use set::{SetCache, SetOptions};
pub use stats::{CacheStats, StatsSnapshot};
