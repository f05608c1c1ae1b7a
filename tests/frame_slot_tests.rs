//! Integration tests for typed frame slots

use pretty_assertions::assert_eq;
use shapeshift::frame::{Fixity, Frame, FrameDescriptor, FrameSlot, IncDecOp, SlotKind};
use shapeshift::{Error, ErrorKind, Value};
use std::sync::Arc;

fn slots(desc: &Arc<FrameDescriptor>, names: &[&str]) -> Vec<FrameSlot> {
    names.iter().map(|n| desc.slot(n).cloned().unwrap()).collect()
}

mod speculation {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_int_slot_widens_to_double_for_good() {
        let desc = FrameDescriptor::builder().slot("i").build();
        let i = &slots(&desc, &["i"])[0];
        let mut frame = Frame::new(&desc);
        frame.write(i, Value::Int(1)).unwrap();
        frame.write(i, Value::Number(1.5)).unwrap();
        frame.write(i, Value::Int(2)).unwrap();
        assert_eq!(desc.kind(i), SlotKind::Double);
        assert_eq!(frame.read_double(i).unwrap(), 2.0);
        match frame.read_int(i) {
            Err(Error::UnexpectedResult { value }) => assert_eq!(value, Value::Number(2.0)),
            other => panic!("expected UnexpectedResult, got {:?}", other),
        }
    }

    #[test]
    fn test_kind_is_shared_by_frames_of_one_descriptor() {
        let desc = FrameDescriptor::builder().slot("n").build();
        let n = &slots(&desc, &["n"])[0];
        let mut first = Frame::new(&desc);
        let mut second = Frame::new(&desc);
        first.write(n, Value::Int(1)).unwrap();
        second.write(n, Value::Long(1 << 40)).unwrap();
        assert_eq!(desc.kind(n), SlotKind::Long);

        // The first frame still holds an int; typed reads follow the shared kind
        assert_eq!(first.read_long(n).unwrap(), 1);
        assert!(first.read_int(n).is_err());
        assert_eq!(Frame::new(&desc).write(n, Value::Int(3)).unwrap(), Value::Long(3));
    }

    #[test]
    fn test_mixed_kinds_settle_on_object() {
        let desc = FrameDescriptor::builder().slot("v").build();
        let v = &slots(&desc, &["v"])[0];
        let mut frame = Frame::new(&desc);
        frame.write(v, Value::Boolean(true)).unwrap();
        assert!(frame.read_boolean(v).unwrap());
        frame.write(v, Value::Int(1)).unwrap();
        assert_eq!(desc.kind(v), SlotKind::Object);
        frame.write(v, Value::string("s")).unwrap();
        assert_eq!(frame.read_object(v).unwrap(), Value::string("s"));
        assert!(matches!(frame.read_boolean(v), Err(Error::UnexpectedResult { .. })));
    }

    #[test]
    fn test_generation_counts_generalizations() {
        let desc = FrameDescriptor::builder().slot("a").slot("b").build();
        let s = slots(&desc, &["a", "b"]);
        let mut frame = Frame::new(&desc);
        assert_eq!(desc.generation(), 0);
        frame.write(&s[0], Value::Int(1)).unwrap();
        frame.write(&s[0], Value::Int(2)).unwrap();
        frame.write(&s[1], Value::Null).unwrap();
        assert_eq!(desc.generation(), 2);
        frame.write(&s[1], Value::Int(1)).unwrap();
        assert_eq!(desc.generation(), 2);
    }

    #[test]
    fn test_foreign_slot_is_rejected() {
        let one = FrameDescriptor::builder().slot("x").build();
        let other = FrameDescriptor::builder().slot("y").slot("x").build();
        let foreign = other.slot("x").cloned().unwrap();
        let mut frame = Frame::new(&one);
        assert!(matches!(frame.write(&foreign, Value::Int(1)), Err(Error::InternalError(_))));
    }

    #[test]
    fn test_same_layout_from_another_descriptor_is_rejected() {
        let one = FrameDescriptor::builder().slot("a").tdz_slot("b").build();
        let twin = FrameDescriptor::builder().slot("a").tdz_slot("b").build();
        let own = one.slot("b").cloned().unwrap();
        let look_alike = twin.slot("b").cloned().unwrap();
        assert_eq!(own.index(), look_alike.index());

        let mut frame = Frame::new(&one);
        assert!(matches!(frame.write(&look_alike, Value::Int(1)), Err(Error::InternalError(_))));
        assert!(matches!(frame.read(&look_alike), Err(Error::InternalError(_))));
        assert_eq!(frame.write(&own, Value::Int(1)).unwrap(), Value::Int(1));
    }
}

mod dead_zone {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_read_before_write() {
        let desc = FrameDescriptor::builder().tdz_slot("late").slot("early").build();
        let s = slots(&desc, &["late", "early"]);
        let mut frame = Frame::new(&desc);
        assert_eq!(frame.read(&s[1]).unwrap(), Value::Undefined);
        assert!(frame.is_dead(&s[0]).unwrap());

        let err = frame.read(&s[0]).unwrap_err();
        assert!(err.is(ErrorKind::ReferenceError));
        assert_eq!(err.to_string(), "ReferenceError: Cannot access 'late' before initialization");
        assert!(frame.read_int(&s[0]).unwrap_err().is(ErrorKind::ReferenceError));

        frame.write(&s[0], Value::Int(1)).unwrap();
        assert_eq!(frame.read(&s[0]).unwrap(), Value::Int(1));
    }

    #[test]
    fn test_clear_restores_dead_zone() {
        let desc = FrameDescriptor::builder().tdz_slot("x").slot("y").build();
        let s = slots(&desc, &["x", "y"]);
        let mut frame = Frame::new(&desc);
        frame.write(&s[0], Value::Int(1)).unwrap();
        frame.clear(&s[0]).unwrap();
        assert!(frame.is_dead(&s[0]).unwrap());
        assert!(frame.read(&s[0]).is_err());
        assert!(matches!(frame.clear(&s[1]), Err(Error::InternalError(_))));
    }

    #[test]
    fn test_dead_zone_slot_starts_boxed() {
        let desc = FrameDescriptor::builder().tdz_slot("t").build();
        let t = &slots(&desc, &["t"])[0];
        assert_eq!(desc.kind(t), SlotKind::Object);
        let mut frame = Frame::new(&desc);
        frame.write(t, Value::Int(5)).unwrap();
        assert_eq!(frame.read_object(t).unwrap(), Value::Int(5));
        assert_eq!(desc.generation(), 0);
    }
}

mod inc_dec {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_counting_loop_stays_int() {
        let desc = FrameDescriptor::builder().slot("i").build();
        let i = &slots(&desc, &["i"])[0];
        let mut frame = Frame::new(&desc);
        frame.write(i, Value::Int(0)).unwrap();
        while frame.read_int(i).unwrap() < 1000 {
            frame.increment(i, IncDecOp::Increment, Fixity::Postfix).unwrap();
        }
        assert_eq!(frame.read_int(i).unwrap(), 1000);
        assert_eq!(desc.kind(i), SlotKind::Int);
    }

    #[test]
    fn test_decrement_below_minimum() {
        let desc = FrameDescriptor::builder().slot("n").build();
        let n = &slots(&desc, &["n"])[0];
        let mut frame = Frame::new(&desc);
        frame.write(n, Value::Int(i32::MIN)).unwrap();
        let old = frame.increment(n, IncDecOp::Decrement, Fixity::Postfix).unwrap();
        assert_eq!(old, Value::Int(i32::MIN));
        assert_eq!(frame.read_double(n).unwrap(), i32::MIN as f64 - 1.0);
        assert_eq!(desc.kind(n), SlotKind::Double);
    }

    #[test]
    fn test_long_slot_keeps_long() {
        let desc = FrameDescriptor::builder().slot("n").build();
        let n = &slots(&desc, &["n"])[0];
        let mut frame = Frame::new(&desc);
        frame.write(n, Value::Long(i32::MAX as i64 + 1)).unwrap();
        frame.increment(n, IncDecOp::Increment, Fixity::Prefix).unwrap();
        assert_eq!(frame.read_long(n).unwrap(), i32::MAX as i64 + 2);
        assert_eq!(desc.kind(n), SlotKind::Long);
    }
}
