mod common;

use std::io::Cursor;

use binrw::BinWrite;
use classfile_stripper::constant_info::{ConstantInfo, LongConstant};
use classfile_stripper::field_info::FieldAccessFlags;
use classfile_stripper::method_info::MethodAccessFlags;
use classfile_stripper::{parse_class_bytes, ClassError, ClassFile};

use common::reparse;

#[test]
fn empty_class_round_trips() {
    let class_file = ClassFile::new("example/Empty", "java/lang/Object");
    let parsed = reparse(class_file);

    assert_eq!(parsed.this_class_name(), Some("example/Empty"));
    assert_eq!(parsed.super_class_name(), Some("java/lang/Object"));
    assert_eq!(parsed.major_version, 52);
    assert!(parsed.fields.is_empty());
    assert!(parsed.methods.is_empty());
    assert!(parsed.interfaces.is_empty());
}

#[test]
fn members_survive_round_trip() {
    let mut class_file = ClassFile::new("example/Members", "java/lang/Object");
    class_file.add_field(FieldAccessFlags::PRIVATE, "count", "I");
    class_file.add_method(MethodAccessFlags::PUBLIC | MethodAccessFlags::ABSTRACT, "run", "()V");
    class_file.access_flags |= classfile_stripper::ClassAccessFlags::ABSTRACT;
    class_file.add_interface("java/lang/Runnable");

    let parsed = reparse(class_file);
    assert_eq!(parsed.find_field("count", "I"), Some(0));
    assert_eq!(parsed.find_method("run", "()V"), Some(0));
    assert_eq!(parsed.interfaces.len(), 1);
    assert_eq!(
        parsed.get_class_name(parsed.interfaces[0]),
        Some("java/lang/Runnable")
    );
}

#[test]
fn rejects_bad_magic() {
    let bytes = [0xDE, 0xAD, 0xBE, 0xEF, 0, 0, 0, 52, 0, 1];
    match parse_class_bytes(&bytes) {
        Err(ClassError::Malformed { .. }) => {}
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn rejects_truncated_input() {
    let bytes = ClassFile::new("example/Trunc", "java/lang/Object")
        .into_bytes()
        .unwrap();
    match parse_class_bytes(&bytes[..bytes.len() - 3]) {
        Err(ClassError::Malformed { .. }) => {}
        other => panic!("expected Malformed, got {other:?}"),
    }
    match parse_class_bytes(&bytes[..6]) {
        Err(ClassError::Malformed { .. }) => {}
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn rejects_unsupported_version() {
    let mut bytes = ClassFile::new("example/New", "java/lang/Object")
        .into_bytes()
        .unwrap();
    // Patch the major version to something from the future.
    bytes[6..8].copy_from_slice(&99u16.to_be_bytes());
    match parse_class_bytes(&bytes) {
        Err(ClassError::UnsupportedVersion { major: 99, .. }) => {}
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }

    bytes[6..8].copy_from_slice(&30u16.to_be_bytes());
    match parse_class_bytes(&bytes) {
        Err(ClassError::UnsupportedVersion { major: 30, .. }) => {}
        other => panic!("expected UnsupportedVersion, got {other:?}"),
    }
}

#[test]
fn rejects_unknown_pool_tag() {
    let mut bytes = ClassFile::new("example/BadTag", "java/lang/Object")
        .into_bytes()
        .unwrap();
    // First pool entry's tag byte sits right after the header.
    bytes[10] = 2;
    match parse_class_bytes(&bytes) {
        Err(ClassError::Malformed { .. }) => {}
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn rejects_wrong_tag_reference_on_read() {
    // Serialize without the writer's validation: this_class pointing at a
    // Utf8 entry must be caught by the reader.
    let mut class_file = ClassFile::new("example/WrongTag", "java/lang/Object");
    class_file.this_class = class_file.get_or_add_utf8("oops");
    class_file.sync_counts();

    let mut cursor = Cursor::new(Vec::new());
    class_file.write(&mut cursor).unwrap();
    match parse_class_bytes(&cursor.into_inner()) {
        Err(ClassError::Malformed { message }) => {
            assert!(message.contains("Utf8"), "unexpected message: {message}");
        }
        other => panic!("expected Malformed, got {other:?}"),
    }
}

#[test]
fn writer_rejects_out_of_bounds_reference() {
    let mut class_file = ClassFile::new("example/Dangling", "java/lang/Object");
    class_file.super_class = 999;
    match class_file.into_bytes() {
        Err(ClassError::UnresolvedReference { message }) => {
            assert!(message.contains("999"), "unexpected message: {message}");
        }
        other => panic!("expected UnresolvedReference, got {other:?}"),
    }
}

#[test]
fn unicode_constants_round_trip() {
    let strings = [
        "2H₂ + O₂ ⇌ 2H₂O, R = 4.7 kΩ, ⌀ 200 mm",
        "ᚻᛖ ᚳᚹᚫᚦ ᚦᚫᛏ ᚻᛖ ᛒᚢᛞᛖ ᚩᚾ ᚦᚫᛗ ᛚᚪᚾᛞᛖ",
        "with \0 nul",
        "outside the BMP: \u{1F600}\u{10348}",
    ];
    let mut class_file = ClassFile::new("example/Unicode", "java/lang/Object");
    for s in strings {
        // Anchor each string through a field so compaction keeps it live.
        class_file.add_field(FieldAccessFlags::STATIC, s, "I");
    }

    let parsed = reparse(class_file);
    for s in strings {
        assert_eq!(common::count_utf8(&parsed, s), 1, "missing {s:?}");
    }
}

#[test]
fn long_constants_occupy_two_slots() {
    let mut class_file = ClassFile::new("example/Longs", "java/lang/Object");
    let long_index =
        class_file.get_or_add_constant(ConstantInfo::Long(LongConstant { value: 42 }));
    let after = class_file.get_or_add_utf8("marker");
    assert_eq!(after, long_index + 2);

    // Anchor both through a field and a ConstantValue attribute.
    let field = class_file.add_field(
        classfile_stripper::field_info::FieldAccessFlags::STATIC
            | classfile_stripper::field_info::FieldAccessFlags::FINAL,
        "marker",
        "J",
    );
    class_file
        .attach_field_attribute(
            field,
            "ConstantValue",
            classfile_stripper::attribute_info::AttributeInfoVariant::ConstantValue(
                classfile_stripper::attribute_info::ConstantValueAttribute {
                    constant_value_index: long_index,
                },
            ),
        )
        .unwrap();

    let parsed = reparse(class_file);
    let long_entries = parsed
        .const_pool
        .iter()
        .filter(|e| matches!(e, ConstantInfo::Long(l) if l.value == 42))
        .count();
    assert_eq!(long_entries, 1);
    let unusable = parsed
        .const_pool
        .iter()
        .filter(|e| matches!(e, ConstantInfo::Unusable))
        .count();
    assert_eq!(unusable, 1);
    assert_eq!(parsed.const_pool_size as usize, parsed.const_pool.len() + 1);
}
