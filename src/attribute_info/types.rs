use binrw::binrw;
use binrw::helpers::until_eof;

use crate::code_attribute::{
    instruction_parser, instruction_writer, Instruction, LocalVariableTableAttribute,
    LocalVariableTypeTableAttribute,
};

/// A raw attribute as it sits in the class file, plus the typed form filled
/// in by `interpret_inner`. `info` and `info_parsed` are reconciled by
/// `sync_from_parsed` before writing; `info` is authoritative on the wire.
#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct AttributeInfo {
    pub attribute_name_index: u16,
    pub attribute_length: u32,
    #[br(count = attribute_length)]
    pub info: Vec<u8>,
    #[br(ignore)]
    #[bw(ignore)]
    pub info_parsed: Option<AttributeInfoVariant>,
}

/// Typed attribute payloads. `Unknown` marks an attribute this library does
/// not model; its raw bytes pass through untouched and are assumed to hold
/// no constant-pool references (the same contract ASM applies to opaque
/// attributes).
#[derive(Clone, Debug)]
pub enum AttributeInfoVariant {
    Code(CodeAttribute),
    StackMapTable(StackMapTableAttribute),
    Exceptions(ExceptionsAttribute),
    ConstantValue(ConstantValueAttribute),
    SourceFile(SourceFileAttribute),
    SourceDebugExtension(SourceDebugExtensionAttribute),
    Signature(SignatureAttribute),
    LineNumberTable(LineNumberTableAttribute),
    LocalVariableTable(LocalVariableTableAttribute),
    LocalVariableTypeTable(LocalVariableTypeTableAttribute),
    InnerClasses(InnerClassesAttribute),
    EnclosingMethod(EnclosingMethodAttribute),
    Synthetic(SyntheticAttribute),
    Deprecated(DeprecatedAttribute),
    BootstrapMethods(BootstrapMethodsAttribute),
    NestHost(NestHostAttribute),
    NestMembers(NestMembersAttribute),
    PermittedSubclasses(PermittedSubclassesAttribute),
    MethodParameters(MethodParametersAttribute),
    Record(RecordAttribute),
    Module(ModuleAttribute),
    RuntimeVisibleAnnotations(AnnotationsAttribute),
    RuntimeInvisibleAnnotations(AnnotationsAttribute),
    RuntimeVisibleParameterAnnotations(ParameterAnnotationsAttribute),
    RuntimeInvisibleParameterAnnotations(ParameterAnnotationsAttribute),
    RuntimeVisibleTypeAnnotations(TypeAnnotationsAttribute),
    RuntimeInvisibleTypeAnnotations(TypeAnnotationsAttribute),
    AnnotationDefault(AnnotationDefaultAttribute),
    Unknown,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct ExceptionEntry {
    pub start_pc: u16,
    pub end_pc: u16,
    pub handler_pc: u16,
    pub catch_type: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct CodeAttribute {
    pub max_stack: u16,
    pub max_locals: u16,
    pub code_length: u32,
    #[br(parse_with = instruction_parser, args(code_length))]
    #[bw(write_with = instruction_writer)]
    pub code: Vec<Instruction>,
    pub exception_table_length: u16,
    #[br(count = exception_table_length)]
    pub exception_table: Vec<ExceptionEntry>,
    pub attributes_count: u16,
    #[br(count = attributes_count)]
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct MethodParametersAttribute {
    pub parameters_count: u8,
    #[br(count = parameters_count)]
    pub parameters: Vec<ParameterAttribute>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ParameterAttribute {
    pub name_index: u16,
    pub access_flags: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct InnerClassesAttribute {
    pub number_of_classes: u16,
    #[br(count = number_of_classes)]
    pub classes: Vec<InnerClassInfo>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct InnerClassInfo {
    pub inner_class_info_index: u16,
    pub outer_class_info_index: u16,
    pub inner_name_index: u16,
    pub inner_class_access_flags: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct EnclosingMethodAttribute {
    pub class_index: u16,
    pub method_index: u16,
}

// Zero sized; "Synthetic" is a marker attribute.
#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct SyntheticAttribute {}

// Marker as well.
#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct DeprecatedAttribute {}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct SignatureAttribute {
    pub signature_index: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct SourceDebugExtensionAttribute {
    #[br(parse_with = until_eof)]
    pub debug_extension: Vec<u8>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct LineNumberTableAttribute {
    pub line_number_table_length: u16,
    #[br(count = line_number_table_length)]
    pub line_number_table: Vec<LineNumberTableEntry>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct LineNumberTableEntry {
    pub start_pc: u16,
    pub line_number: u16,
}

// -- Annotations --

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct AnnotationsAttribute {
    pub num_annotations: u16,
    #[br(count = num_annotations)]
    pub annotations: Vec<RuntimeAnnotation>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ParameterAnnotationsAttribute {
    pub num_parameters: u8,
    #[br(count = num_parameters)]
    pub parameter_annotations: Vec<AnnotationsAttribute>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct RuntimeAnnotation {
    pub type_index: u16,
    pub num_element_value_pairs: u16,
    #[br(count = num_element_value_pairs)]
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ElementValuePair {
    pub element_name_index: u16,
    pub value: ElementValue,
}

/// An annotation element value, dispatched on its one-byte tag.
/// Read/write impls live in `attribute_info::parser`.
#[derive(Clone, Debug)]
pub enum ElementValue {
    ConstValueIndex { tag: char, value: u16 },
    EnumConst(EnumConstValue),
    ClassInfoIndex(u16),
    AnnotationValue(RuntimeAnnotation),
    ElementArray(ElementArrayValue),
}

#[derive(Clone, Debug)]
pub struct ElementArrayValue {
    pub num_values: u16,
    pub values: Vec<ElementValue>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct EnumConstValue {
    pub type_name_index: u16,
    pub const_name_index: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct AnnotationDefaultAttribute {
    pub default_value: ElementValue,
}

// -- Type annotations --

/// Type annotation target on the `extends`/`implements` clause.
pub const TARGET_CLASS_EXTENDS: u8 = 0x10;

/// `supertype_index` value that designates the superclass rather than an
/// entry of the interfaces list.
pub const SUPERTYPE_INDEX_SUPERCLASS: u16 = 0xFFFF;

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct TypeAnnotationsAttribute {
    pub num_annotations: u16,
    #[br(count = num_annotations)]
    pub type_annotations: Vec<TypeAnnotation>,
}

/// Read/write impls live in `attribute_info::parser` (the target_info shape
/// is selected by `target_type`).
#[derive(Clone, Debug)]
pub struct TypeAnnotation {
    pub target_type: u8,
    pub target_info: TargetInfo,
    pub target_path: TypePath,
    pub type_index: u16,
    pub num_element_value_pairs: u16,
    pub element_value_pairs: Vec<ElementValuePair>,
}

#[derive(Clone, Debug)]
pub enum TargetInfo {
    TypeParameter {
        type_parameter_index: u8,
    },
    SuperType {
        supertype_index: u16,
    },
    TypeParameterBound {
        type_parameter_index: u8,
        bound_index: u8,
    },
    Empty,
    FormalParameter {
        formal_parameter_index: u8,
    },
    Throws {
        throws_type_index: u16,
    },
    LocalVar {
        table_length: u16,
        tables: Vec<LocalVarTableAnnotation>,
    },
    Catch {
        exception_table_index: u16,
    },
    Offset {
        offset: u16,
    },
    TypeArgument {
        offset: u16,
        type_argument_index: u8,
    },
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct LocalVarTableAnnotation {
    pub start_pc: u16,
    pub length: u16,
    pub index: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct TypePath {
    pub path_length: u8,
    #[br(count = path_length)]
    pub paths: Vec<TypePathEntry>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct TypePathEntry {
    pub type_path_kind: u8,
    pub type_argument_index: u8,
}

// -- Stack map frames --

#[derive(Clone, Debug, PartialEq)]
#[binrw]
#[brw(big)]
pub enum VerificationTypeInfo {
    #[brw(magic = 0u8)]
    Top,
    #[brw(magic = 1u8)]
    Integer,
    #[brw(magic = 2u8)]
    Float,
    #[brw(magic = 3u8)]
    Double,
    #[brw(magic = 4u8)]
    Long,
    #[brw(magic = 5u8)]
    Null,
    #[brw(magic = 6u8)]
    UninitializedThis,
    #[brw(magic = 7u8)]
    Object {
        /// An index into the constant pool for the class of the object.
        class: u16,
    },
    #[brw(magic = 8u8)]
    Uninitialized {
        /// Offset into the code array of the `new` instruction that created
        /// the object being stored here.
        offset: u16,
    },
}

/// `frame_type` both tags the variant and, for the compact forms, encodes
/// the offset delta. Read/write impls live in `attribute_info::parser`.
#[derive(Clone, Debug, PartialEq)]
pub struct StackMapFrame {
    pub frame_type: u8,
    pub inner: StackMapFrameInner,
}

#[derive(Clone, Debug, PartialEq)]
pub enum StackMapFrameInner {
    SameFrame {},
    SameLocals1StackItemFrame {
        stack: VerificationTypeInfo,
    },
    SameLocals1StackItemFrameExtended {
        offset_delta: u16,
        stack: VerificationTypeInfo,
    },
    ChopFrame {
        offset_delta: u16,
    },
    SameFrameExtended {
        offset_delta: u16,
    },
    AppendFrame {
        offset_delta: u16,
        locals: Vec<VerificationTypeInfo>,
    },
    FullFrame {
        offset_delta: u16,
        number_of_locals: u16,
        locals: Vec<VerificationTypeInfo>,
        number_of_stack_items: u16,
        stack: Vec<VerificationTypeInfo>,
    },
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct StackMapTableAttribute {
    pub number_of_entries: u16,
    #[br(count = number_of_entries)]
    pub entries: Vec<StackMapFrame>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ExceptionsAttribute {
    pub exception_table_length: u16,
    #[br(count = exception_table_length)]
    pub exception_table: Vec<u16>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ConstantValueAttribute {
    pub constant_value_index: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct BootstrapMethod {
    pub bootstrap_method_ref: u16,
    pub num_bootstrap_arguments: u16,
    #[br(count = num_bootstrap_arguments)]
    pub bootstrap_arguments: Vec<u16>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct BootstrapMethodsAttribute {
    pub num_bootstrap_methods: u16,
    #[br(count = num_bootstrap_methods)]
    pub bootstrap_methods: Vec<BootstrapMethod>,
}

/// There may be at most one SourceFile attribute in the attributes table of
/// a ClassFile structure; the entry at `sourcefile_index` must be Utf8.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
#[binrw]
#[brw(big)]
pub struct SourceFileAttribute {
    pub sourcefile_index: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct NestHostAttribute {
    pub host_class_index: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct NestMembersAttribute {
    pub number_of_classes: u16,
    #[br(count = number_of_classes)]
    pub classes: Vec<u16>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct PermittedSubclassesAttribute {
    pub number_of_classes: u16,
    #[br(count = number_of_classes)]
    pub classes: Vec<u16>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct RecordAttribute {
    pub components_count: u16,
    #[br(count = components_count)]
    pub components: Vec<RecordComponentInfo>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct RecordComponentInfo {
    pub name_index: u16,
    pub descriptor_index: u16,
    pub attributes_count: u16,
    #[br(count = attributes_count)]
    pub attributes: Vec<AttributeInfo>,
}

// -- Module --

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ModuleAttribute {
    pub module_name_index: u16,
    pub module_flags: u16,
    pub module_version_index: u16,
    pub requires_count: u16,
    #[br(count = requires_count)]
    pub requires: Vec<ModuleRequires>,
    pub exports_count: u16,
    #[br(count = exports_count)]
    pub exports: Vec<ModuleExports>,
    pub opens_count: u16,
    #[br(count = opens_count)]
    pub opens: Vec<ModuleOpens>,
    pub uses_count: u16,
    #[br(count = uses_count)]
    pub uses_index: Vec<u16>,
    pub provides_count: u16,
    #[br(count = provides_count)]
    pub provides: Vec<ModuleProvides>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ModuleRequires {
    pub requires_index: u16,
    pub requires_flags: u16,
    pub requires_version_index: u16,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ModuleExports {
    pub exports_index: u16,
    pub exports_flags: u16,
    pub exports_to_count: u16,
    #[br(count = exports_to_count)]
    pub exports_to_index: Vec<u16>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ModuleOpens {
    pub opens_index: u16,
    pub opens_flags: u16,
    pub opens_to_count: u16,
    #[br(count = opens_to_count)]
    pub opens_to_index: Vec<u16>,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct ModuleProvides {
    pub provides_index: u16,
    pub provides_with_count: u16,
    #[br(count = provides_with_count)]
    pub provides_with_index: Vec<u16>,
}
