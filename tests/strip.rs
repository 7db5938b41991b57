mod common;

use classfile_stripper::code_attribute::Instruction;
use classfile_stripper::field_info::FieldAccessFlags;
use classfile_stripper::method_info::MethodAccessFlags;
use classfile_stripper::strip::{strip_class, ClassStripper, StripError, StripOutcome};
use classfile_stripper::ClassFile;

use common::{
    code_attr, extends_type_annotation, lambda_invokedynamic, marker_annotation,
    marker_annotation_with_bool, reparse,
};

const CLIENT_ONLY: &str = "Lexample/ClientOnly;";
const SERVER_ONLY: &str = "Lexample/ServerOnly;";

fn stripper_for(environment: &str) -> ClassStripper {
    ClassStripper::builder()
        .annotation("client", CLIENT_ONLY)
        .annotation("server", SERVER_ONLY)
        .build(environment)
}

/// A class with one client-only field and method next to shared ones, and a
/// constructor that initializes both fields.
fn mixed_class() -> ClassFile {
    let mut class_file = ClassFile::new("example/Mixed", "java/lang/Object");

    let client_field = class_file.add_field(FieldAccessFlags::PRIVATE, "clientCount", "I");
    let annotation = marker_annotation(&mut class_file, CLIENT_ONLY);
    class_file
        .attach_field_attribute(client_field, "RuntimeInvisibleAnnotations", annotation)
        .unwrap();
    class_file.add_field(FieldAccessFlags::PRIVATE, "sharedCount", "I");

    let client_method = class_file.add_method(MethodAccessFlags::PUBLIC, "clientTick", "()V");
    let annotation = marker_annotation(&mut class_file, CLIENT_ONLY);
    class_file
        .attach_method_attribute(client_method, "RuntimeInvisibleAnnotations", annotation)
        .unwrap();
    class_file
        .attach_code(client_method, code_attr(1, 1, vec![Instruction::Return]))
        .unwrap();

    let shared_method = class_file.add_method(MethodAccessFlags::PUBLIC, "sharedTick", "()V");
    class_file
        .attach_code(shared_method, code_attr(1, 1, vec![Instruction::Return]))
        .unwrap();

    let ctor = class_file.add_method(MethodAccessFlags::PUBLIC, "<init>", "()V");
    let super_init = class_file.get_or_add_method_ref("java/lang/Object", "<init>", "()V");
    let client_ref = class_file.get_or_add_field_ref("example/Mixed", "clientCount", "I");
    let shared_ref = class_file.get_or_add_field_ref("example/Mixed", "sharedCount", "I");
    class_file
        .attach_code(
            ctor,
            code_attr(
                2,
                1,
                vec![
                    Instruction::Aload0,
                    Instruction::Invokespecial(super_init),
                    Instruction::Aload0,
                    Instruction::Iconst1,
                    Instruction::Putfield(client_ref),
                    Instruction::Aload0,
                    Instruction::Iconst2,
                    Instruction::Putfield(shared_ref),
                    Instruction::Return,
                ],
            ),
        )
        .unwrap();

    class_file
}

#[test]
fn strips_members_for_other_environment() {
    let mut class_file = mixed_class();
    let outcome = strip_class(&stripper_for("server"), &mut class_file).unwrap();
    assert_eq!(outcome, StripOutcome::Stripped);

    let parsed = reparse(class_file);
    assert!(parsed.find_method("clientTick", "()V").is_none());
    assert!(parsed.find_method("sharedTick", "()V").is_some());
    assert!(parsed.find_field("clientCount", "I").is_none());
    assert!(parsed.find_field("sharedCount", "I").is_some());

    // The stripped member's names are garbage-collected with it.
    assert_eq!(common::count_utf8(&parsed, "clientTick"), 0);
    assert_eq!(common::count_utf8(&parsed, "clientCount"), 0);
}

#[test]
fn matching_environment_is_untouched() {
    let mut class_file = mixed_class();
    let outcome = strip_class(&stripper_for("client"), &mut class_file).unwrap();
    assert_eq!(outcome, StripOutcome::Unchanged);
    assert!(class_file.find_method("clientTick", "()V").is_some());
}

#[test]
fn constructor_field_writes_become_pops() {
    let mut class_file = mixed_class();
    strip_class(&stripper_for("server"), &mut class_file).unwrap();

    let ctor = class_file.find_method("<init>", "()V").unwrap();
    let code = class_file.methods[ctor].code().unwrap();
    // putfield clientCount (3 bytes) became pop; pop; nop — same length,
    // same stack effect, no offset moved.
    assert_eq!(code.code[4], Instruction::Pop);
    assert_eq!(code.code[5], Instruction::Pop);
    assert_eq!(code.code[6], Instruction::Nop);
    // The shared field's write is untouched.
    assert!(matches!(code.code[9], Instruction::Putfield(_)));

    let parsed = reparse(class_file);
    let ctor = parsed.find_method("<init>", "()V").unwrap();
    let code = parsed.methods[ctor].code().unwrap();
    assert_eq!(code.code.len(), 11);
}

#[test]
fn wide_field_write_pops_two_slots() {
    let mut class_file = ClassFile::new("example/Wide", "java/lang/Object");
    let field = class_file.add_field(FieldAccessFlags::STATIC, "clientTime", "J");
    let annotation = marker_annotation(&mut class_file, CLIENT_ONLY);
    class_file
        .attach_field_attribute(field, "RuntimeInvisibleAnnotations", annotation)
        .unwrap();

    let clinit = class_file.add_method(MethodAccessFlags::STATIC, "<clinit>", "()V");
    let field_ref = class_file.get_or_add_field_ref("example/Wide", "clientTime", "J");
    class_file
        .attach_code(
            clinit,
            code_attr(
                2,
                0,
                vec![
                    Instruction::Lconst1,
                    Instruction::Putstatic(field_ref),
                    Instruction::Return,
                ],
            ),
        )
        .unwrap();

    strip_class(&stripper_for("server"), &mut class_file).unwrap();
    let clinit = class_file.find_method("<clinit>", "()V").unwrap();
    let code = class_file.methods[clinit].code().unwrap();
    assert_eq!(
        code.code,
        vec![
            Instruction::Lconst1,
            Instruction::Pop2,
            Instruction::Nop,
            Instruction::Nop,
            Instruction::Return,
        ]
    );
    reparse(class_file);
}

#[test]
fn class_level_annotation_removes_class() {
    let mut class_file = ClassFile::new("example/ClientScreen", "java/lang/Object");
    let annotation = marker_annotation(&mut class_file, CLIENT_ONLY);
    class_file
        .attach_class_attribute("RuntimeInvisibleAnnotations", annotation)
        .unwrap();

    let outcome = strip_class(&stripper_for("server"), &mut class_file).unwrap();
    assert_eq!(outcome, StripOutcome::RemoveClass);
}

#[test]
fn annotated_interface_is_stripped() {
    let mut class_file = ClassFile::new("example/Impl", "java/lang/Object");
    class_file.add_interface("example/ClientApi");
    class_file.add_interface("example/SharedApi");
    let annotation = extends_type_annotation(&mut class_file, CLIENT_ONLY, 0);
    class_file
        .attach_class_attribute("RuntimeInvisibleTypeAnnotations", annotation)
        .unwrap();

    let outcome = strip_class(&stripper_for("server"), &mut class_file).unwrap();
    assert_eq!(outcome, StripOutcome::Stripped);

    let parsed = reparse(class_file);
    assert_eq!(parsed.interfaces.len(), 1);
    assert_eq!(
        parsed.get_class_name(parsed.interfaces[0]),
        Some("example/SharedApi")
    );
    // The emptied type-annotation attribute disappears with its annotation.
    assert!(parsed
        .find_class_attribute("RuntimeInvisibleTypeAnnotations")
        .is_none());
}

#[test]
fn superclass_annotation_is_an_error() {
    let mut class_file = ClassFile::new("example/Child", "example/ClientBase");
    let annotation = extends_type_annotation(&mut class_file, CLIENT_ONLY, 0xFFFF);
    class_file
        .attach_class_attribute("RuntimeInvisibleTypeAnnotations", annotation)
        .unwrap();

    match strip_class(&stripper_for("server"), &mut class_file) {
        Err(StripError::SuperclassStrip { class, super_name }) => {
            assert_eq!(class, "example/Child");
            assert_eq!(super_name, "example/ClientBase");
        }
        other => panic!("expected SuperclassStrip, got {other:?}"),
    }
}

fn lambda_class(shared_uses_lambda: bool) -> ClassFile {
    let mut class_file = ClassFile::new("example/Lambdas", "java/lang/Object");

    let lambda_impl = class_file.add_method(
        MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
        "lambda$clientTick$0",
        "()V",
    );
    class_file
        .attach_code(lambda_impl, code_attr(1, 0, vec![Instruction::Return]))
        .unwrap();

    let indy = lambda_invokedynamic(&mut class_file, "lambda$clientTick$0", "()V");

    let client_method = class_file.add_method(MethodAccessFlags::PUBLIC, "clientTick", "()V");
    let annotation = marker_annotation(&mut class_file, CLIENT_ONLY);
    class_file
        .attach_method_attribute(client_method, "RuntimeInvisibleAnnotations", annotation)
        .unwrap();
    class_file
        .attach_code(
            client_method,
            code_attr(
                1,
                1,
                vec![indy.clone(), Instruction::Pop, Instruction::Return],
            ),
        )
        .unwrap();

    if shared_uses_lambda {
        let shared_method = class_file.add_method(MethodAccessFlags::PUBLIC, "sharedTick", "()V");
        class_file
            .attach_code(
                shared_method,
                code_attr(1, 1, vec![indy, Instruction::Pop, Instruction::Return]),
            )
            .unwrap();
    }

    class_file
}

#[test]
fn lambda_body_is_stripped_with_its_method() {
    let mut class_file = lambda_class(false);
    let outcome = strip_class(&stripper_for("server"), &mut class_file).unwrap();
    assert_eq!(outcome, StripOutcome::Stripped);

    assert!(class_file.find_method("clientTick", "()V").is_none());
    assert!(class_file
        .find_method("lambda$clientTick$0", "()V")
        .is_none());
}

#[test]
fn shared_lambda_body_survives() {
    let mut class_file = lambda_class(true);
    strip_class(&stripper_for("server"), &mut class_file).unwrap();

    assert!(class_file.find_method("clientTick", "()V").is_none());
    assert!(class_file.find_method("sharedTick", "()V").is_some());
    assert!(class_file
        .find_method("lambda$clientTick$0", "()V")
        .is_some());

    let parsed = reparse(class_file);
    assert!(parsed.find_method("lambda$clientTick$0", "()V").is_some());
}

#[test]
fn lambda_element_can_opt_out() {
    let mut class_file = ClassFile::new("example/OptOut", "java/lang/Object");

    let lambda_impl = class_file.add_method(
        MethodAccessFlags::PRIVATE | MethodAccessFlags::STATIC | MethodAccessFlags::SYNTHETIC,
        "lambda$clientTick$0",
        "()V",
    );
    class_file
        .attach_code(lambda_impl, code_attr(1, 0, vec![Instruction::Return]))
        .unwrap();

    let indy = lambda_invokedynamic(&mut class_file, "lambda$clientTick$0", "()V");
    let client_method = class_file.add_method(MethodAccessFlags::PUBLIC, "clientTick", "()V");
    let annotation =
        marker_annotation_with_bool(&mut class_file, CLIENT_ONLY, "stripLambdas", false);
    class_file
        .attach_method_attribute(client_method, "RuntimeInvisibleAnnotations", annotation)
        .unwrap();
    class_file
        .attach_code(
            client_method,
            code_attr(1, 1, vec![indy, Instruction::Pop, Instruction::Return]),
        )
        .unwrap();

    let stripper = ClassStripper::builder()
        .annotation_with_lambda_key("client", CLIENT_ONLY, "stripLambdas")
        .annotation("server", SERVER_ONLY)
        .build("server");
    strip_class(&stripper, &mut class_file).unwrap();

    assert!(class_file.find_method("clientTick", "()V").is_none());
    // stripLambdas = false keeps the implementation method.
    assert!(class_file
        .find_method("lambda$clientTick$0", "()V")
        .is_some());
}

#[test]
fn scan_reports_without_mutating() {
    let class_file = mixed_class();
    let data = stripper_for("server").scan(&class_file).unwrap();
    assert!(!data.is_empty());
    assert!(!data.strip_entire_class());
    assert_eq!(data.methods().len(), 1);
    assert_eq!(data.fields().len(), 1);
    // Scanning twice from one stripper works; the configuration is reusable.
    let again = stripper_for("server").scan(&class_file).unwrap();
    assert_eq!(again.methods().len(), 1);
}
