#![allow(dead_code)]

use classfile_stripper::attribute_info::{
    AnnotationsAttribute, AttributeInfoVariant, BootstrapMethod, BootstrapMethodsAttribute,
    CodeAttribute, ElementValue, ElementValuePair, RuntimeAnnotation, TargetInfo, TypeAnnotation,
    TypeAnnotationsAttribute, TypePath, TARGET_CLASS_EXTENDS,
};
use classfile_stripper::code_attribute::Instruction;
use classfile_stripper::constant_info::{
    ConstantInfo, IntegerConstant, MethodHandleConstant, MethodTypeConstant,
};
use classfile_stripper::ClassFile;

pub const LAMBDA_METAFACTORY_DESC: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;\
Ljava/lang/String;\
Ljava/lang/invoke/MethodType;\
Ljava/lang/invoke/MethodType;\
Ljava/lang/invoke/MethodHandle;\
Ljava/lang/invoke/MethodType;)\
Ljava/lang/invoke/CallSite;";

/// A Code attribute with everything but the instructions defaulted; counts
/// and lengths are fixed up when the class is written.
pub fn code_attr(max_stack: u16, max_locals: u16, code: Vec<Instruction>) -> CodeAttribute {
    CodeAttribute {
        max_stack,
        max_locals,
        code_length: 0,
        code,
        exception_table_length: 0,
        exception_table: Vec::new(),
        attributes_count: 0,
        attributes: Vec::new(),
    }
}

/// A RuntimeInvisibleAnnotations payload with one marker annotation.
pub fn marker_annotation(class_file: &mut ClassFile, descriptor: &str) -> AttributeInfoVariant {
    let type_index = class_file.get_or_add_utf8(descriptor);
    AttributeInfoVariant::RuntimeInvisibleAnnotations(AnnotationsAttribute {
        num_annotations: 1,
        annotations: vec![RuntimeAnnotation {
            type_index,
            num_element_value_pairs: 0,
            element_value_pairs: Vec::new(),
        }],
    })
}

/// Like `marker_annotation`, with one boolean element.
pub fn marker_annotation_with_bool(
    class_file: &mut ClassFile,
    descriptor: &str,
    element: &str,
    value: bool,
) -> AttributeInfoVariant {
    let type_index = class_file.get_or_add_utf8(descriptor);
    let element_name_index = class_file.get_or_add_utf8(element);
    let const_index = class_file.get_or_add_constant(ConstantInfo::Integer(IntegerConstant {
        value: value as i32,
    }));
    AttributeInfoVariant::RuntimeInvisibleAnnotations(AnnotationsAttribute {
        num_annotations: 1,
        annotations: vec![RuntimeAnnotation {
            type_index,
            num_element_value_pairs: 1,
            element_value_pairs: vec![ElementValuePair {
                element_name_index,
                value: ElementValue::ConstValueIndex {
                    tag: 'Z',
                    value: const_index,
                },
            }],
        }],
    })
}

/// A RuntimeInvisibleTypeAnnotations payload carrying one CLASS_EXTENDS
/// annotation. `supertype_index` of 0xFFFF designates the superclass.
pub fn extends_type_annotation(
    class_file: &mut ClassFile,
    descriptor: &str,
    supertype_index: u16,
) -> AttributeInfoVariant {
    let type_index = class_file.get_or_add_utf8(descriptor);
    AttributeInfoVariant::RuntimeInvisibleTypeAnnotations(TypeAnnotationsAttribute {
        num_annotations: 1,
        type_annotations: vec![TypeAnnotation {
            target_type: TARGET_CLASS_EXTENDS,
            target_info: TargetInfo::SuperType { supertype_index },
            target_path: TypePath {
                path_length: 0,
                paths: Vec::new(),
            },
            type_index,
            num_element_value_pairs: 0,
            element_value_pairs: Vec::new(),
        }],
    })
}

fn add_bootstrap_method(class_file: &mut ClassFile, bsm: BootstrapMethod) -> u16 {
    for attr in &mut class_file.attributes {
        if let Some(AttributeInfoVariant::BootstrapMethods(table)) = &mut attr.info_parsed {
            table.bootstrap_methods.push(bsm);
            return (table.bootstrap_methods.len() - 1) as u16;
        }
    }
    class_file
        .attach_class_attribute(
            "BootstrapMethods",
            AttributeInfoVariant::BootstrapMethods(BootstrapMethodsAttribute {
                num_bootstrap_methods: 1,
                bootstrap_methods: vec![bsm],
            }),
        )
        .unwrap();
    0
}

/// An `invokedynamic` whose bootstrap is `LambdaMetafactory.metafactory`
/// and whose implementation handle is `invokestatic this.impl_name`, the
/// shape javac emits for a lambda capturing nothing.
pub fn lambda_invokedynamic(
    class_file: &mut ClassFile,
    impl_name: &str,
    impl_descriptor: &str,
) -> Instruction {
    let this_name = class_file.this_class_name().unwrap().to_string();

    let metafactory_ref = class_file.get_or_add_method_ref(
        "java/lang/invoke/LambdaMetafactory",
        "metafactory",
        LAMBDA_METAFACTORY_DESC,
    );
    let metafactory_handle =
        class_file.get_or_add_constant(ConstantInfo::MethodHandle(MethodHandleConstant {
            reference_kind: 6,
            reference_index: metafactory_ref,
        }));

    let impl_ref = class_file.get_or_add_method_ref(&this_name, impl_name, impl_descriptor);
    let impl_handle =
        class_file.get_or_add_constant(ConstantInfo::MethodHandle(MethodHandleConstant {
            reference_kind: 6,
            reference_index: impl_ref,
        }));

    let sam_descriptor = class_file.get_or_add_utf8("()V");
    let sam_type = class_file.get_or_add_constant(ConstantInfo::MethodType(MethodTypeConstant {
        descriptor_index: sam_descriptor,
    }));

    let bsm_index = add_bootstrap_method(
        class_file,
        BootstrapMethod {
            bootstrap_method_ref: metafactory_handle,
            num_bootstrap_arguments: 3,
            bootstrap_arguments: vec![sam_type, impl_handle, sam_type],
        },
    );

    let name_and_type = class_file.get_or_add_name_and_type("run", "()Ljava/lang/Runnable;");
    let indy = class_file.get_or_add_constant(ConstantInfo::InvokeDynamic(
        classfile_stripper::constant_info::InvokeDynamicConstant {
            bootstrap_method_attr_index: bsm_index,
            name_and_type_index: name_and_type,
        },
    ));
    Instruction::Invokedynamic {
        index: indy,
        filler: 0,
    }
}

/// Write, then parse back through the full validating pipeline.
pub fn reparse(class_file: ClassFile) -> ClassFile {
    let bytes = class_file.into_bytes().expect("failed to write class");
    classfile_stripper::parse_class_bytes(&bytes).expect("failed to re-parse written class")
}

/// Count pool entries holding the given UTF-8 string.
pub fn count_utf8(class_file: &ClassFile, value: &str) -> usize {
    class_file
        .const_pool
        .iter()
        .filter(|entry| matches!(entry, ConstantInfo::Utf8(u) if u.utf8_string == value))
        .count()
}
