//! Integration tests for property get/set/has caches

mod common;
use common::*;
use pretty_assertions::assert_eq;
use shapeshift::ic::{CacheState, Context, GetCache, GetOptions, HasCache, SetCache, SetOptions};
use shapeshift::object::{new_proxy, HostObject, JsObject, LazyValueHook, ModuleNamespace, PropertyFlags};
use shapeshift::runtime::PrimitiveKind;
use shapeshift::{CacheConfig, Error, ErrorKind, Value};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

mod chains {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_second_layout_adds_one_entry() {
        let ctx = Context::new();
        let a = unique("a");
        let extra = unique("b");
        let o1 = object(&[(&a, Value::Int(1))]);
        let o2 = object(&[(&a, Value::Int(2)), (&extra, Value::Int(3))]);
        let cache = GetCache::new(&ctx, a.as_str(), GetOptions::default());

        for _ in 0..3 {
            assert_eq!(cache.get(&o1).unwrap(), Value::Int(1));
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.state(), CacheState::Monomorphic);

        assert_eq!(cache.get(&o2).unwrap(), Value::Int(2));
        assert_eq!(cache.len(), 2);
        for _ in 0..5 {
            assert_eq!(cache.get(&o1).unwrap(), Value::Int(1));
            assert_eq!(cache.get(&o2).unwrap(), Value::Int(2));
        }
        assert_eq!(cache.len(), 2);
        assert_eq!(cache.state(), CacheState::Polymorphic);
        assert_eq!(ctx.snapshot().entries_added, 2);
        assert_eq!(ctx.snapshot().polymorphic_inserts, 1);
    }

    #[test]
    fn test_overflow_goes_generic_once() {
        let ctx = Context::new();
        let x = unique("x");
        let layouts: Vec<Value> = (0..5)
            .map(|i| {
                let pad = unique("pad");
                let obj = JsObject::new(None);
                if i > 0 {
                    obj.define_data(&key(&pad), Value::Int(0), PropertyFlags::default()).unwrap();
                }
                obj.define_data(&key(&x), Value::Int(i), PropertyFlags::default()).unwrap();
                Value::Object(obj)
            })
            .collect();
        let cache = GetCache::new(&ctx, x.as_str(), GetOptions::default());

        for (i, obj) in layouts.iter().enumerate() {
            assert_eq!(cache.get(obj).unwrap(), Value::Int(i as i32));
            assert!(cache.len() <= 2);
        }
        assert_eq!(cache.state(), CacheState::Megamorphic);
        assert_eq!(cache.len(), 0);
        for obj in &layouts {
            cache.get(obj).unwrap();
        }
        assert_eq!(ctx.snapshot().megamorphic_rewrites, 1);
    }

    #[test]
    fn test_delete_respecializes() {
        let ctx = Context::new();
        let p = unique("p");
        let q = unique("q");
        let obj = object(&[(&p, Value::Int(1)), (&q, Value::Int(2))]);
        let sibling = object(&[(&p, Value::Int(3)), (&q, Value::Int(4))]);
        let cache = GetCache::new(&ctx, q.as_str(), GetOptions::default());
        assert_eq!(cache.get(&obj).unwrap(), Value::Int(2));

        assert!(as_object(&obj).delete(&key(&p)).unwrap());
        assert_eq!(cache.get(&obj).unwrap(), Value::Int(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(ctx.snapshot().invalidation_restarts, 1);

        // The sibling still sits on the invalidated layout and migrates on access
        assert_eq!(cache.get(&sibling).unwrap(), Value::Int(4));
        assert!(as_object(&sibling).shape().is_valid());
        assert_eq!(cache.get(&obj).unwrap(), Value::Int(2));
    }

    #[test]
    fn test_prototype_change_is_observed() {
        let ctx = Context::new();
        let m = unique("method");
        let proto = JsObject::with_properties(None, &[(&m, Value::Int(1))]);
        let obj = object_with_proto(&proto, &[]);
        let cache = GetCache::new(&ctx, m.as_str(), GetOptions::default());
        assert_eq!(cache.get(&obj).unwrap(), Value::Int(1));

        proto.define_data(&key(&m), Value::Int(2), PropertyFlags::default()).unwrap();
        assert_eq!(cache.get(&obj).unwrap(), Value::Int(2));

        as_object(&obj)
            .define_data(&key(&m), Value::Int(3), PropertyFlags::default())
            .unwrap();
        assert_eq!(cache.get(&obj).unwrap(), Value::Int(3));
    }

    #[test]
    fn test_compatible_layouts_merge_when_enabled() {
        let ctx = Context::with_config(CacheConfig::default().with_merge_compatible_layouts(true)).unwrap();
        let a = unique("a");
        let o1 = object(&[(&unique("m"), Value::Int(0)), (&a, Value::Int(1))]);
        let o2 = object(&[(&unique("n"), Value::Int(0)), (&a, Value::Int(2))]);
        let cache = GetCache::new(&ctx, a.as_str(), GetOptions::default());
        assert_eq!(cache.get(&o1).unwrap(), Value::Int(1));
        assert_eq!(cache.get(&o2).unwrap(), Value::Int(2));
        assert_eq!(cache.len(), 1);
        assert_eq!(ctx.snapshot().layout_merges, 1);
        assert_eq!(cache.get(&o1).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_combined_entry_keeps_absorbing_layouts() {
        let ctx = Context::with_config(CacheConfig::default().with_merge_compatible_layouts(true)).unwrap();
        let a = unique("a");
        let layouts: Vec<Value> = (0..3)
            .map(|i| object(&[(&unique("pad"), Value::Int(0)), (&a, Value::Int(i))]))
            .collect();
        let cache = GetCache::new(&ctx, a.as_str(), GetOptions::default());
        for (i, obj) in layouts.iter().enumerate() {
            assert_eq!(cache.get(obj).unwrap(), Value::Int(i as i32));
        }
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.state(), CacheState::Monomorphic);
        assert_eq!(ctx.snapshot().layout_merges, 2);
        for (i, obj) in layouts.iter().enumerate() {
            assert_eq!(cache.get(obj).unwrap(), Value::Int(i as i32));
        }
        assert_eq!(ctx.snapshot().layout_merges, 2);
    }

    #[test]
    fn test_dictionary_receiver_goes_generic() {
        let ctx = Context::with_config(CacheConfig::default().with_dictionary_threshold(4)).unwrap();
        let obj = JsObject::new(None);
        for _ in 0..5 {
            obj.define_data(&key(&unique("d")), Value::Int(0), PropertyFlags::default()).unwrap();
        }
        let target = unique("target");
        obj.define_data(&key(&target), Value::Int(9), PropertyFlags::default()).unwrap();
        let cache = GetCache::new(&ctx, target.as_str(), GetOptions::default());
        assert_eq!(cache.get(&Value::Object(obj)).unwrap(), Value::Int(9));
        assert_eq!(cache.state(), CacheState::Megamorphic);
    }
}

mod get {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_absent_returns_default() {
        let ctx = Context::new();
        let cache = GetCache::new(&ctx, unique("missing").as_str(), GetOptions::default());
        let obj = object(&[]);
        assert_eq!(cache.get(&obj).unwrap(), Value::Undefined);
        assert_eq!(cache.get_or_default(&obj, Value::Int(7)).unwrap(), Value::Int(7));
    }

    #[test]
    fn test_accessor_runs_with_actual_receiver() {
        let ctx = Context::new();
        let field = unique("field");
        let prop = unique("prop");
        let proto = JsObject::new(None);
        proto
            .define_accessor(&key(&prop), Some(getter_of(&field)), None, PropertyFlags::default())
            .unwrap();
        let a = object_with_proto(&proto, &[(&field, Value::Int(1))]);
        let b = object_with_proto(&proto, &[(&field, Value::Int(2))]);
        let cache = GetCache::new(&ctx, prop.as_str(), GetOptions::default());
        assert_eq!(cache.get(&a).unwrap(), Value::Int(1));
        assert_eq!(cache.get(&b).unwrap(), Value::Int(2));

        // super.prop: look up on the prototype, run the getter against `a`
        let home = Value::Object(proto.clone());
        let sup = GetCache::new(&ctx, prop.as_str(), GetOptions::default());
        assert_eq!(sup.get_with_receiver(&home, &a, Value::Undefined).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_missing_getter_reads_undefined() {
        let ctx = Context::new();
        let prop = unique("setter_only");
        let obj = JsObject::new(None);
        let setter = Value::Object(JsObject::function("set", shapeshift::runtime::native(|_, _| Ok(Value::Undefined))));
        obj.define_accessor(&key(&prop), None, Some(setter), PropertyFlags::default())
            .unwrap();
        let cache = GetCache::new(&ctx, prop.as_str(), GetOptions::default());
        assert_eq!(cache.get(&Value::Object(obj)).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_getter_errors_propagate() {
        let ctx = Context::new();
        let prop = unique("throws");
        let obj = JsObject::new(None);
        let getter = Value::Object(JsObject::function(
            "get",
            shapeshift::runtime::native(|_, _| Err(Error::range_error("boom"))),
        ));
        obj.define_accessor(&key(&prop), Some(getter), None, PropertyFlags::default())
            .unwrap();
        let cache = GetCache::new(&ctx, prop.as_str(), GetOptions::default());
        let err = cache.get(&Value::Object(obj)).unwrap_err();
        assert!(err.is(ErrorKind::RangeError));
    }

    #[test]
    fn test_hooked_property_computes_lazily() {
        let ctx = Context::new();
        let prop = unique("message");
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let hook = Arc::new(LazyValueHook::new(move |_| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(Value::string("formatted"))
        }));
        let obj = JsObject::new(None);
        obj.define_hooked(&key(&prop), hook.clone(), PropertyFlags::default())
            .unwrap();
        let obj = Value::Object(obj);
        let cache = GetCache::new(&ctx, prop.as_str(), GetOptions::default());
        assert!(!hook.is_materialized());
        assert_eq!(cache.get(&obj).unwrap(), Value::string("formatted"));
        assert_eq!(cache.get(&obj).unwrap(), Value::string("formatted"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_primitive_prototype_lookup() {
        let method = unique("describe");
        let number_proto = JsObject::with_properties(None, &[(&method, Value::Int(7))]);
        let ctx = Context::builder()
            .primitive_prototype(PrimitiveKind::Number, number_proto)
            .build()
            .unwrap();
        let cache = GetCache::new(&ctx, method.as_str(), GetOptions::default());
        assert_eq!(cache.get(&Value::Number(1.5)).unwrap(), Value::Int(7));
        assert_eq!(cache.get(&Value::Int(3)).unwrap(), Value::Int(7));
        assert_eq!(cache.len(), 1);
        assert_eq!(cache.get(&Value::Boolean(true)).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_required_global_read() {
        let ctx = Context::new();
        let name = unique("undeclared");
        let global = object(&[]);
        let cache = GetCache::new(&ctx, name.as_str(), GetOptions::required());
        let err = cache.get(&global).unwrap_err();
        assert_eq!(err.to_string(), format!("ReferenceError: {} is not defined", name));

        as_object(&global)
            .define_data(&key(&name), Value::Int(1), PropertyFlags::default())
            .unwrap();
        assert_eq!(cache.get(&global).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_narrow_reads_widen_only_losslessly() {
        let ctx = Context::new();
        let n = unique("n");
        let long_obj = object(&[(&n, Value::Long(1 << 40))]);
        let cache = GetCache::new(&ctx, n.as_str(), GetOptions::default());
        assert_eq!(cache.get_long(&long_obj).unwrap(), 1 << 40);
        assert_eq!(cache.get_double(&long_obj).unwrap(), (1u64 << 40) as f64);
        let err = cache.get_int(&long_obj).unwrap_err();
        assert!(matches!(err, Error::UnexpectedResult { .. }));
    }
}

mod set {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_set_then_get() {
        let ctx = Context::new();
        let name = unique("v");
        let set = SetCache::new(&ctx, name.as_str(), SetOptions::default());
        let get = GetCache::new(&ctx, name.as_str(), GetOptions::default());
        let objects = [object(&[]), object(&[(&unique("other"), Value::Null)]), object(&[(&name, Value::Null)])];
        for (i, obj) in objects.iter().enumerate() {
            for v in [Value::Int(i as i32), Value::string("s"), Value::Boolean(true)] {
                set.set(obj, v.clone()).unwrap();
                assert_eq!(get.get(obj).unwrap(), v);
            }
        }
    }

    #[test]
    fn test_non_extensible_receiver_rejects_new_property() {
        let ctx = Context::new();
        let name = unique("new");
        let obj = object(&[]);
        as_object(&obj).prevent_extensions().unwrap();
        let sloppy = SetCache::new(&ctx, name.as_str(), SetOptions::default());
        assert!(!sloppy.try_set(&obj, Value::Int(1)).unwrap());
        let strict = SetCache::new(&ctx, name.as_str(), SetOptions::strict());
        assert!(strict.set(&obj, Value::Int(1)).unwrap_err().is(ErrorKind::TypeError));
        assert!(!as_object(&obj).has_own_property(&key(&name)).unwrap());
    }

    #[test]
    fn test_inherited_read_only_blocks_assignment() {
        let ctx = Context::new();
        let name = unique("ro");
        let proto = JsObject::new(None);
        define_frozen(&proto, &name, Value::Int(1));
        let obj = object_with_proto(&proto, &[]);
        let cache = SetCache::new(&ctx, name.as_str(), SetOptions::strict());
        let err = cache.set(&obj, Value::Int(2)).unwrap_err();
        assert!(err.is(ErrorKind::TypeError));
        assert_eq!(read(&obj, &name), Value::Int(1));
    }

    #[test]
    fn test_inherited_writable_data_shadows() {
        let ctx = Context::new();
        let name = unique("shadow");
        let proto = JsObject::with_properties(None, &[(&name, Value::Int(1))]);
        let a = object_with_proto(&proto, &[]);
        let b = object_with_proto(&proto, &[]);
        let cache = SetCache::new(&ctx, name.as_str(), SetOptions::default());
        cache.set(&a, Value::Int(2)).unwrap();
        cache.set(&b, Value::Int(3)).unwrap();
        assert_eq!(read(&a, &name), Value::Int(2));
        assert_eq!(read(&b, &name), Value::Int(3));
        assert_eq!(read(&Value::Object(proto), &name), Value::Int(1));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_setter_added_to_prototype_is_observed() {
        let ctx = Context::new();
        let name = unique("late_setter");
        let proto = JsObject::new(None);
        let a = object_with_proto(&proto, &[]);
        let b = object_with_proto(&proto, &[]);
        let cache = SetCache::new(&ctx, name.as_str(), SetOptions::default());
        cache.set(&a, Value::Int(1)).unwrap();

        let seen = Arc::new(AtomicUsize::new(0));
        let counter = seen.clone();
        let setter = JsObject::function(
            "set",
            shapeshift::runtime::native(move |_, _| {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok(Value::Undefined)
            }),
        );
        proto
            .define_accessor(&key(&name), None, Some(Value::Object(setter)), PropertyFlags::default())
            .unwrap();
        cache.set(&b, Value::Int(2)).unwrap();
        assert_eq!(seen.load(Ordering::SeqCst), 1);
        assert!(!as_object(&b).has_own_property(&key(&name)).unwrap());
    }

    #[test]
    fn test_hooked_write() {
        let ctx = Context::new();
        let name = unique("hooked");
        let obj = JsObject::new(None);
        let hook = Arc::new(LazyValueHook::new(|_| Ok(Value::Int(0))));
        obj.define_hooked(&key(&name), hook.clone(), PropertyFlags::default())
            .unwrap();
        let obj = Value::Object(obj);
        let set = SetCache::new(&ctx, name.as_str(), SetOptions::default());
        set.set(&obj, Value::Int(5)).unwrap();
        assert_eq!(read(&obj, &name), Value::Int(5));
        assert!(hook.is_materialized());
    }
}

mod proxies {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_get_trap_invariant() {
        let ctx = Context::new();
        let x = unique("x");
        let target = JsObject::new(None);
        define_frozen(&target, &x, Value::Int(5));

        let lying = Value::Object(new_proxy(target.clone(), handler_returning("get", Value::Int(6))));
        let honest = Value::Object(new_proxy(target, handler_returning("get", Value::Int(5))));
        let cache = GetCache::new(&ctx, x.as_str(), GetOptions::default());
        assert!(cache.get(&lying).unwrap_err().is(ErrorKind::TypeError));
        assert_eq!(cache.get(&honest).unwrap(), Value::Int(5));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_set_trap_rejection_and_invariant() {
        let ctx = Context::new();
        let x = unique("x");
        let target = JsObject::new(None);
        define_frozen(&target, &x, Value::Int(5));

        let refusing = Value::Object(new_proxy(target.clone(), handler_returning("set", Value::Boolean(false))));
        let cache = SetCache::new(&ctx, x.as_str(), SetOptions::default());
        assert!(!cache.try_set(&refusing, Value::Int(1)).unwrap());

        let accepting = Value::Object(new_proxy(target, handler_returning("set", Value::Boolean(true))));
        assert!(cache.try_set(&accepting, Value::Int(1)).unwrap_err().is(ErrorKind::TypeError));
        assert!(cache.try_set(&accepting, Value::Int(5)).unwrap());
    }

    #[test]
    fn test_revoked_proxy() {
        let ctx = Context::new();
        let proxy = new_proxy(JsObject::new(None), JsObject::new(None));
        let value = Value::Object(proxy.clone());
        let cache = HasCache::new(&ctx, unique("k").as_str(), false);
        assert!(!cache.has(&value).unwrap());
        proxy.as_proxy().unwrap().revoke();
        assert!(proxy.as_proxy().unwrap().is_revoked());
        assert!(cache.has(&value).unwrap_err().is(ErrorKind::TypeError));
    }
}

mod namespaces {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_bindings_and_dead_zone() {
        let ctx = Context::new();
        let ns = ModuleNamespace::builder("app").export("ready", Value::Int(1)).uninitialized("late").build();
        let value = Value::Object(ns.clone());

        let ready = GetCache::new(&ctx, "ready", GetOptions::default());
        let late = GetCache::new(&ctx, "late", GetOptions::default());
        assert_eq!(ready.get(&value).unwrap(), Value::Int(1));
        assert!(late.get(&value).unwrap_err().is(ErrorKind::ReferenceError));

        ns.as_namespace().unwrap().initialize("late", Value::Int(2)).unwrap();
        assert_eq!(late.get(&value).unwrap(), Value::Int(2));

        let absent = GetCache::new(&ctx, "nope", GetOptions::default());
        assert_eq!(absent.get(&value).unwrap(), Value::Undefined);
    }

    #[test]
    fn test_deferred_module_evaluates_once() {
        let ctx = Context::new();
        let runs = Arc::new(AtomicUsize::new(0));
        let counter = runs.clone();
        let ns = ModuleNamespace::builder("lazy")
            .uninitialized("value")
            .deferred(move |ns| {
                counter.fetch_add(1, Ordering::SeqCst);
                ns.initialize("value", Value::Int(42))
            })
            .build();
        let value = Value::Object(ns);
        let has = HasCache::new(&ctx, "value", false);
        let get = GetCache::new(&ctx, "value", GetOptions::default());
        assert!(has.has(&value).unwrap());
        assert_eq!(get.get(&value).unwrap(), Value::Int(42));
        assert_eq!(get.get(&value).unwrap(), Value::Int(42));
        assert_eq!(runs.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_namespace_is_immutable() {
        let ctx = Context::new();
        let value = Value::Object(ModuleNamespace::builder("m").export("a", Value::Int(1)).build());
        let sloppy = SetCache::new(&ctx, "a", SetOptions::default());
        assert!(!sloppy.try_set(&value, Value::Int(2)).unwrap());
        let strict = SetCache::new(&ctx, "a", SetOptions::strict());
        assert!(strict.set(&value, Value::Int(2)).unwrap_err().is(ErrorKind::TypeError));
        assert_eq!(GetCache::new(&ctx, "a", GetOptions::default()).get(&value).unwrap(), Value::Int(1));
    }
}

mod foreign {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_member_access() {
        let ctx = Context::new();
        let host = HostObject::new("python").with_member("size", Value::Int(3)).into_value();
        let get = GetCache::new(&ctx, "size", GetOptions::default());
        let set = SetCache::new(&ctx, "size", SetOptions::default());
        let has = HasCache::new(&ctx, "size", false);
        assert_eq!(get.get(&host).unwrap(), Value::Int(3));
        set.set(&host, Value::Int(4)).unwrap();
        assert_eq!(get.get(&host).unwrap(), Value::Int(4));
        assert!(has.has(&host).unwrap());
    }

    #[test]
    fn test_read_only_host() {
        let ctx = Context::new();
        let host = HostObject::new("ruby").read_only().with_member("frozen", Value::Int(1)).into_value();
        let set = SetCache::new(&ctx, "frozen", SetOptions::strict());
        let err = set.set(&host, Value::Int(2)).unwrap_err();
        assert_eq!(err.to_string(), "TypeError: Cannot assign to read only property 'frozen' of foreign ruby object");
    }
}
