use std::io::{Cursor, Read, Seek, Write};

use binrw::{BinRead, BinResult, BinWrite, Endian};

use crate::attribute_info::*;
use crate::code_attribute::encoded_code_len;
use crate::constant_info::{get_utf8, ConstantInfo};
use crate::types::ClassError;

impl AttributeInfo {
    /// Resolve this attribute's name through the constant pool.
    pub fn name<'a>(&self, const_pool: &'a [ConstantInfo]) -> Option<&'a str> {
        get_utf8(const_pool, self.attribute_name_index)
    }

    /// Build an attribute from a typed payload, serializing it immediately.
    pub fn from_variant(
        attribute_name_index: u16,
        variant: AttributeInfoVariant,
    ) -> Result<AttributeInfo, ClassError> {
        let mut attr = AttributeInfo {
            attribute_name_index,
            attribute_length: 0,
            info: Vec::new(),
            info_parsed: Some(variant),
        };
        attr.sync_from_parsed()?;
        Ok(attr)
    }

    /// Parse `info` into the typed payload for this attribute's name.
    /// Unrecognized names become `Unknown` and keep their bytes verbatim.
    pub fn interpret_inner(&mut self, const_pool: &[ConstantInfo]) -> Result<(), ClassError> {
        use AttributeInfoVariant as V;

        let name = self
            .name(const_pool)
            .ok_or_else(|| ClassError::Malformed {
                message: format!(
                    "attribute name index {} does not resolve to a Utf8 entry",
                    self.attribute_name_index
                ),
            })?
            .to_string();

        let mut cursor = Cursor::new(self.info.as_slice());
        let mut parsed = match name.as_str() {
            "Code" => V::Code(read_payload(&mut cursor, &name)?),
            "StackMapTable" => V::StackMapTable(read_payload(&mut cursor, &name)?),
            "Exceptions" => V::Exceptions(read_payload(&mut cursor, &name)?),
            "ConstantValue" => V::ConstantValue(read_payload(&mut cursor, &name)?),
            "SourceFile" => V::SourceFile(read_payload(&mut cursor, &name)?),
            "SourceDebugExtension" => V::SourceDebugExtension(read_payload(&mut cursor, &name)?),
            "Signature" => V::Signature(read_payload(&mut cursor, &name)?),
            "LineNumberTable" => V::LineNumberTable(read_payload(&mut cursor, &name)?),
            "LocalVariableTable" => V::LocalVariableTable(read_payload(&mut cursor, &name)?),
            "LocalVariableTypeTable" => {
                V::LocalVariableTypeTable(read_payload(&mut cursor, &name)?)
            }
            "InnerClasses" => V::InnerClasses(read_payload(&mut cursor, &name)?),
            "EnclosingMethod" => V::EnclosingMethod(read_payload(&mut cursor, &name)?),
            "Synthetic" => V::Synthetic(read_payload(&mut cursor, &name)?),
            "Deprecated" => V::Deprecated(read_payload(&mut cursor, &name)?),
            "BootstrapMethods" => V::BootstrapMethods(read_payload(&mut cursor, &name)?),
            "NestHost" => V::NestHost(read_payload(&mut cursor, &name)?),
            "NestMembers" => V::NestMembers(read_payload(&mut cursor, &name)?),
            "PermittedSubclasses" => V::PermittedSubclasses(read_payload(&mut cursor, &name)?),
            "MethodParameters" => V::MethodParameters(read_payload(&mut cursor, &name)?),
            "Record" => V::Record(read_payload(&mut cursor, &name)?),
            "Module" => V::Module(read_payload(&mut cursor, &name)?),
            "RuntimeVisibleAnnotations" => {
                V::RuntimeVisibleAnnotations(read_payload(&mut cursor, &name)?)
            }
            "RuntimeInvisibleAnnotations" => {
                V::RuntimeInvisibleAnnotations(read_payload(&mut cursor, &name)?)
            }
            "RuntimeVisibleParameterAnnotations" => {
                V::RuntimeVisibleParameterAnnotations(read_payload(&mut cursor, &name)?)
            }
            "RuntimeInvisibleParameterAnnotations" => {
                V::RuntimeInvisibleParameterAnnotations(read_payload(&mut cursor, &name)?)
            }
            "RuntimeVisibleTypeAnnotations" => {
                V::RuntimeVisibleTypeAnnotations(read_payload(&mut cursor, &name)?)
            }
            "RuntimeInvisibleTypeAnnotations" => {
                V::RuntimeInvisibleTypeAnnotations(read_payload(&mut cursor, &name)?)
            }
            "AnnotationDefault" => V::AnnotationDefault(read_payload(&mut cursor, &name)?),
            _ => {
                log::debug!("unrecognized attribute {name:?} kept as raw bytes");
                V::Unknown
            }
        };

        if !matches!(parsed, V::Unknown) && (cursor.position() as usize) < self.info.len() {
            return Err(ClassError::Malformed {
                message: format!(
                    "{} bytes left over after parsing {name} attribute",
                    self.info.len() - cursor.position() as usize
                ),
            });
        }

        // Nested attribute tables get interpreted in turn.
        match &mut parsed {
            V::Code(code) => {
                for attr in &mut code.attributes {
                    attr.interpret_inner(const_pool)?;
                }
            }
            V::Record(record) => {
                for component in &mut record.components {
                    for attr in &mut component.attributes {
                        attr.interpret_inner(const_pool)?;
                    }
                }
            }
            _ => {}
        }

        self.info_parsed = Some(parsed);
        Ok(())
    }

    /// Re-serialize the typed payload into `info` and refresh
    /// `attribute_length`. A `None` or `Unknown` payload leaves the raw
    /// bytes untouched.
    pub fn sync_from_parsed(&mut self) -> Result<(), ClassError> {
        use AttributeInfoVariant as V;

        let Some(variant) = &mut self.info_parsed else {
            return Ok(());
        };
        if matches!(variant, V::Unknown) {
            return Ok(());
        }

        variant.sync_counts()?;

        let mut cursor = Cursor::new(Vec::new());
        match variant {
            V::Code(x) => write_payload(&mut cursor, x)?,
            V::StackMapTable(x) => write_payload(&mut cursor, x)?,
            V::Exceptions(x) => write_payload(&mut cursor, x)?,
            V::ConstantValue(x) => write_payload(&mut cursor, x)?,
            V::SourceFile(x) => write_payload(&mut cursor, x)?,
            V::SourceDebugExtension(x) => write_payload(&mut cursor, x)?,
            V::Signature(x) => write_payload(&mut cursor, x)?,
            V::LineNumberTable(x) => write_payload(&mut cursor, x)?,
            V::LocalVariableTable(x) => write_payload(&mut cursor, x)?,
            V::LocalVariableTypeTable(x) => write_payload(&mut cursor, x)?,
            V::InnerClasses(x) => write_payload(&mut cursor, x)?,
            V::EnclosingMethod(x) => write_payload(&mut cursor, x)?,
            V::Synthetic(x) => write_payload(&mut cursor, x)?,
            V::Deprecated(x) => write_payload(&mut cursor, x)?,
            V::BootstrapMethods(x) => write_payload(&mut cursor, x)?,
            V::NestHost(x) => write_payload(&mut cursor, x)?,
            V::NestMembers(x) => write_payload(&mut cursor, x)?,
            V::PermittedSubclasses(x) => write_payload(&mut cursor, x)?,
            V::MethodParameters(x) => write_payload(&mut cursor, x)?,
            V::Record(x) => write_payload(&mut cursor, x)?,
            V::Module(x) => write_payload(&mut cursor, x)?,
            V::RuntimeVisibleAnnotations(x) => write_payload(&mut cursor, x)?,
            V::RuntimeInvisibleAnnotations(x) => write_payload(&mut cursor, x)?,
            V::RuntimeVisibleParameterAnnotations(x) => write_payload(&mut cursor, x)?,
            V::RuntimeInvisibleParameterAnnotations(x) => write_payload(&mut cursor, x)?,
            V::RuntimeVisibleTypeAnnotations(x) => write_payload(&mut cursor, x)?,
            V::RuntimeInvisibleTypeAnnotations(x) => write_payload(&mut cursor, x)?,
            V::AnnotationDefault(x) => write_payload(&mut cursor, x)?,
            V::Unknown => unreachable!(),
        }

        self.info = cursor.into_inner();
        self.attribute_length = self.info.len() as u32;
        Ok(())
    }
}

fn read_payload<T>(cursor: &mut Cursor<&[u8]>, name: &str) -> Result<T, ClassError>
where
    T: for<'a> BinRead<Args<'a> = ()>,
{
    T::read_options(cursor, Endian::Big, ()).map_err(|e| ClassError::Malformed {
        message: format!("failed to parse {name} attribute: {e}"),
    })
}

fn write_payload<T>(cursor: &mut Cursor<Vec<u8>>, value: &T) -> Result<(), ClassError>
where
    T: for<'a> BinWrite<Args<'a> = ()>,
{
    value
        .write_options(cursor, Endian::Big, ())
        .map_err(|e| ClassError::Malformed {
            message: format!("failed to serialize attribute: {e}"),
        })
}

impl AttributeInfoVariant {
    /// Recompute every stored count/length field from the actual contents,
    /// recursing into nested attribute tables.
    pub fn sync_counts(&mut self) -> Result<(), ClassError> {
        use AttributeInfoVariant as V;
        match self {
            V::Code(code) => code.sync_counts()?,
            V::StackMapTable(table) => {
                table.number_of_entries = table.entries.len() as u16;
                for frame in &mut table.entries {
                    sync_frame(frame);
                }
            }
            V::Exceptions(x) => x.exception_table_length = x.exception_table.len() as u16,
            V::LineNumberTable(x) => {
                x.line_number_table_length = x.line_number_table.len() as u16
            }
            V::LocalVariableTable(x) => {
                x.local_variable_table_length = x.items.len() as u16;
            }
            V::LocalVariableTypeTable(x) => {
                x.local_variable_type_table_length = x.local_variable_type_table.len() as u16;
            }
            V::InnerClasses(x) => x.number_of_classes = x.classes.len() as u16,
            V::BootstrapMethods(x) => {
                x.num_bootstrap_methods = x.bootstrap_methods.len() as u16;
                for bsm in &mut x.bootstrap_methods {
                    bsm.num_bootstrap_arguments = bsm.bootstrap_arguments.len() as u16;
                }
            }
            V::NestMembers(x) => x.number_of_classes = x.classes.len() as u16,
            V::PermittedSubclasses(x) => x.number_of_classes = x.classes.len() as u16,
            V::MethodParameters(x) => x.parameters_count = x.parameters.len() as u8,
            V::Record(record) => {
                record.components_count = record.components.len() as u16;
                for component in &mut record.components {
                    for attr in &mut component.attributes {
                        attr.sync_from_parsed()?;
                    }
                    component.attributes_count = component.attributes.len() as u16;
                }
            }
            V::Module(module) => {
                module.requires_count = module.requires.len() as u16;
                module.exports_count = module.exports.len() as u16;
                for export in &mut module.exports {
                    export.exports_to_count = export.exports_to_index.len() as u16;
                }
                module.opens_count = module.opens.len() as u16;
                for open in &mut module.opens {
                    open.opens_to_count = open.opens_to_index.len() as u16;
                }
                module.uses_count = module.uses_index.len() as u16;
                module.provides_count = module.provides.len() as u16;
                for provide in &mut module.provides {
                    provide.provides_with_count = provide.provides_with_index.len() as u16;
                }
            }
            V::RuntimeVisibleAnnotations(x) | V::RuntimeInvisibleAnnotations(x) => {
                sync_annotation_list(x);
            }
            V::RuntimeVisibleParameterAnnotations(x)
            | V::RuntimeInvisibleParameterAnnotations(x) => {
                x.num_parameters = x.parameter_annotations.len() as u8;
                for list in &mut x.parameter_annotations {
                    sync_annotation_list(list);
                }
            }
            V::RuntimeVisibleTypeAnnotations(x) | V::RuntimeInvisibleTypeAnnotations(x) => {
                x.num_annotations = x.type_annotations.len() as u16;
                for annotation in &mut x.type_annotations {
                    sync_type_annotation(annotation);
                }
            }
            V::AnnotationDefault(x) => sync_element_value(&mut x.default_value),
            V::ConstantValue(_)
            | V::SourceFile(_)
            | V::SourceDebugExtension(_)
            | V::Signature(_)
            | V::EnclosingMethod(_)
            | V::Synthetic(_)
            | V::Deprecated(_)
            | V::NestHost(_)
            | V::Unknown => {}
        }
        Ok(())
    }
}

impl CodeAttribute {
    /// Program-order traversal: every instruction with its bytecode offset.
    /// Dispatch over [`crate::code_attribute::InstructionKind`] replaces
    /// per-opcode visitor callbacks.
    pub fn instructions_with_addresses(&self) -> Vec<(u32, &crate::code_attribute::Instruction)> {
        crate::code_attribute::compute_addresses(&self.code)
    }

    /// Refresh `code_length`, the exception table length, and the nested
    /// attribute table (serializing parsed sub-attributes first).
    pub fn sync_counts(&mut self) -> Result<(), ClassError> {
        for attr in &mut self.attributes {
            attr.sync_from_parsed()?;
        }
        self.attributes_count = self.attributes.len() as u16;
        self.exception_table_length = self.exception_table.len() as u16;
        self.code_length = encoded_code_len(&self.code);
        Ok(())
    }
}

fn sync_annotation_list(list: &mut AnnotationsAttribute) {
    list.num_annotations = list.annotations.len() as u16;
    for annotation in &mut list.annotations {
        sync_annotation(annotation);
    }
}

fn sync_annotation(annotation: &mut RuntimeAnnotation) {
    annotation.num_element_value_pairs = annotation.element_value_pairs.len() as u16;
    for pair in &mut annotation.element_value_pairs {
        sync_element_value(&mut pair.value);
    }
}

fn sync_element_value(value: &mut ElementValue) {
    match value {
        ElementValue::AnnotationValue(inner) => sync_annotation(inner),
        ElementValue::ElementArray(array) => {
            array.num_values = array.values.len() as u16;
            for v in &mut array.values {
                sync_element_value(v);
            }
        }
        _ => {}
    }
}

fn sync_type_annotation(annotation: &mut TypeAnnotation) {
    if let TargetInfo::LocalVar {
        table_length,
        tables,
    } = &mut annotation.target_info
    {
        *table_length = tables.len() as u16;
    }
    annotation.target_path.path_length = annotation.target_path.paths.len() as u8;
    annotation.num_element_value_pairs = annotation.element_value_pairs.len() as u16;
    for pair in &mut annotation.element_value_pairs {
        sync_element_value(&mut pair.value);
    }
}

fn sync_frame(frame: &mut StackMapFrame) {
    match &mut frame.inner {
        StackMapFrameInner::AppendFrame { locals, .. } => {
            // The local count is carried by the frame type itself.
            frame.frame_type = 251 + locals.len() as u8;
        }
        StackMapFrameInner::FullFrame {
            number_of_locals,
            locals,
            number_of_stack_items,
            stack,
            ..
        } => {
            *number_of_locals = locals.len() as u16;
            *number_of_stack_items = stack.len() as u16;
        }
        _ => {}
    }
}

// ---------------------------------------------------------------------------
// Tag-dispatched wire shapes
// ---------------------------------------------------------------------------

impl BinRead for ElementValue {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: (),
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let tag = u8::read_options(reader, endian, ())?;
        match tag as char {
            'B' | 'C' | 'I' | 'S' | 'Z' | 'D' | 'F' | 'J' | 's' => {
                let value = u16::read_options(reader, endian, ())?;
                Ok(ElementValue::ConstValueIndex {
                    tag: tag as char,
                    value,
                })
            }
            'e' => Ok(ElementValue::EnumConst(EnumConstValue::read_options(
                reader, endian, (),
            )?)),
            'c' => Ok(ElementValue::ClassInfoIndex(u16::read_options(
                reader, endian, (),
            )?)),
            '@' => Ok(ElementValue::AnnotationValue(
                RuntimeAnnotation::read_options(reader, endian, ())?,
            )),
            '[' => {
                let num_values = u16::read_options(reader, endian, ())?;
                let mut values = Vec::with_capacity(num_values as usize);
                for _ in 0..num_values {
                    values.push(ElementValue::read_options(reader, endian, ())?);
                }
                Ok(ElementValue::ElementArray(ElementArrayValue {
                    num_values,
                    values,
                }))
            }
            _ => Err(binrw::Error::AssertFail {
                pos,
                message: format!("unknown element value tag {tag:#04x}"),
            }),
        }
    }
}

impl BinWrite for ElementValue {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: (),
    ) -> BinResult<()> {
        match self {
            ElementValue::ConstValueIndex { tag, value } => {
                (*tag as u8).write_options(writer, endian, ())?;
                value.write_options(writer, endian, ())
            }
            ElementValue::EnumConst(enum_const) => {
                b'e'.write_options(writer, endian, ())?;
                enum_const.write_options(writer, endian, ())
            }
            ElementValue::ClassInfoIndex(index) => {
                b'c'.write_options(writer, endian, ())?;
                index.write_options(writer, endian, ())
            }
            ElementValue::AnnotationValue(annotation) => {
                b'@'.write_options(writer, endian, ())?;
                annotation.write_options(writer, endian, ())
            }
            ElementValue::ElementArray(array) => {
                b'['.write_options(writer, endian, ())?;
                array.num_values.write_options(writer, endian, ())?;
                for value in &array.values {
                    value.write_options(writer, endian, ())?;
                }
                Ok(())
            }
        }
    }
}

impl BinRead for TypeAnnotation {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: (),
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let target_type = u8::read_options(reader, endian, ())?;
        let target_info = match target_type {
            0x00 | 0x01 => TargetInfo::TypeParameter {
                type_parameter_index: u8::read_options(reader, endian, ())?,
            },
            0x10 => TargetInfo::SuperType {
                supertype_index: u16::read_options(reader, endian, ())?,
            },
            0x11 | 0x12 => TargetInfo::TypeParameterBound {
                type_parameter_index: u8::read_options(reader, endian, ())?,
                bound_index: u8::read_options(reader, endian, ())?,
            },
            0x13..=0x15 => TargetInfo::Empty,
            0x16 => TargetInfo::FormalParameter {
                formal_parameter_index: u8::read_options(reader, endian, ())?,
            },
            0x17 => TargetInfo::Throws {
                throws_type_index: u16::read_options(reader, endian, ())?,
            },
            0x40 | 0x41 => {
                let table_length = u16::read_options(reader, endian, ())?;
                let mut tables = Vec::with_capacity(table_length as usize);
                for _ in 0..table_length {
                    tables.push(LocalVarTableAnnotation::read_options(reader, endian, ())?);
                }
                TargetInfo::LocalVar {
                    table_length,
                    tables,
                }
            }
            0x42 => TargetInfo::Catch {
                exception_table_index: u16::read_options(reader, endian, ())?,
            },
            0x43..=0x46 => TargetInfo::Offset {
                offset: u16::read_options(reader, endian, ())?,
            },
            0x47..=0x4B => TargetInfo::TypeArgument {
                offset: u16::read_options(reader, endian, ())?,
                type_argument_index: u8::read_options(reader, endian, ())?,
            },
            _ => {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!("unknown type annotation target {target_type:#04x}"),
                })
            }
        };
        let target_path = TypePath::read_options(reader, endian, ())?;
        let type_index = u16::read_options(reader, endian, ())?;
        let num_element_value_pairs = u16::read_options(reader, endian, ())?;
        let mut element_value_pairs = Vec::with_capacity(num_element_value_pairs as usize);
        for _ in 0..num_element_value_pairs {
            element_value_pairs.push(ElementValuePair::read_options(reader, endian, ())?);
        }
        Ok(TypeAnnotation {
            target_type,
            target_info,
            target_path,
            type_index,
            num_element_value_pairs,
            element_value_pairs,
        })
    }
}

impl BinWrite for TypeAnnotation {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: (),
    ) -> BinResult<()> {
        self.target_type.write_options(writer, endian, ())?;
        match &self.target_info {
            TargetInfo::TypeParameter {
                type_parameter_index,
            } => type_parameter_index.write_options(writer, endian, ())?,
            TargetInfo::SuperType { supertype_index } => {
                supertype_index.write_options(writer, endian, ())?
            }
            TargetInfo::TypeParameterBound {
                type_parameter_index,
                bound_index,
            } => {
                type_parameter_index.write_options(writer, endian, ())?;
                bound_index.write_options(writer, endian, ())?;
            }
            TargetInfo::Empty => {}
            TargetInfo::FormalParameter {
                formal_parameter_index,
            } => formal_parameter_index.write_options(writer, endian, ())?,
            TargetInfo::Throws { throws_type_index } => {
                throws_type_index.write_options(writer, endian, ())?
            }
            TargetInfo::LocalVar {
                table_length,
                tables,
            } => {
                table_length.write_options(writer, endian, ())?;
                for table in tables {
                    table.write_options(writer, endian, ())?;
                }
            }
            TargetInfo::Catch {
                exception_table_index,
            } => exception_table_index.write_options(writer, endian, ())?,
            TargetInfo::Offset { offset } => offset.write_options(writer, endian, ())?,
            TargetInfo::TypeArgument {
                offset,
                type_argument_index,
            } => {
                offset.write_options(writer, endian, ())?;
                type_argument_index.write_options(writer, endian, ())?;
            }
        }
        self.target_path.write_options(writer, endian, ())?;
        self.type_index.write_options(writer, endian, ())?;
        self.num_element_value_pairs.write_options(writer, endian, ())?;
        for pair in &self.element_value_pairs {
            pair.write_options(writer, endian, ())?;
        }
        Ok(())
    }
}

impl BinRead for StackMapFrame {
    type Args<'a> = ();

    fn read_options<R: Read + Seek>(
        reader: &mut R,
        endian: Endian,
        _args: (),
    ) -> BinResult<Self> {
        let pos = reader.stream_position()?;
        let frame_type = u8::read_options(reader, endian, ())?;
        let inner = match frame_type {
            0..=63 => StackMapFrameInner::SameFrame {},
            64..=127 => StackMapFrameInner::SameLocals1StackItemFrame {
                stack: VerificationTypeInfo::read_options(reader, endian, ())?,
            },
            247 => StackMapFrameInner::SameLocals1StackItemFrameExtended {
                offset_delta: u16::read_options(reader, endian, ())?,
                stack: VerificationTypeInfo::read_options(reader, endian, ())?,
            },
            248..=250 => StackMapFrameInner::ChopFrame {
                offset_delta: u16::read_options(reader, endian, ())?,
            },
            251 => StackMapFrameInner::SameFrameExtended {
                offset_delta: u16::read_options(reader, endian, ())?,
            },
            252..=254 => {
                let offset_delta = u16::read_options(reader, endian, ())?;
                let count = (frame_type - 251) as usize;
                let mut locals = Vec::with_capacity(count);
                for _ in 0..count {
                    locals.push(VerificationTypeInfo::read_options(reader, endian, ())?);
                }
                StackMapFrameInner::AppendFrame {
                    offset_delta,
                    locals,
                }
            }
            255 => {
                let offset_delta = u16::read_options(reader, endian, ())?;
                let number_of_locals = u16::read_options(reader, endian, ())?;
                let mut locals = Vec::with_capacity(number_of_locals as usize);
                for _ in 0..number_of_locals {
                    locals.push(VerificationTypeInfo::read_options(reader, endian, ())?);
                }
                let number_of_stack_items = u16::read_options(reader, endian, ())?;
                let mut stack = Vec::with_capacity(number_of_stack_items as usize);
                for _ in 0..number_of_stack_items {
                    stack.push(VerificationTypeInfo::read_options(reader, endian, ())?);
                }
                StackMapFrameInner::FullFrame {
                    offset_delta,
                    number_of_locals,
                    locals,
                    number_of_stack_items,
                    stack,
                }
            }
            _ => {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: format!("reserved stack map frame type {frame_type}"),
                })
            }
        };
        Ok(StackMapFrame { frame_type, inner })
    }
}

impl BinWrite for StackMapFrame {
    type Args<'a> = ();

    fn write_options<W: Write + Seek>(
        &self,
        writer: &mut W,
        endian: Endian,
        _args: (),
    ) -> BinResult<()> {
        self.frame_type.write_options(writer, endian, ())?;
        match &self.inner {
            StackMapFrameInner::SameFrame {} => Ok(()),
            StackMapFrameInner::SameLocals1StackItemFrame { stack } => {
                stack.write_options(writer, endian, ())
            }
            StackMapFrameInner::SameLocals1StackItemFrameExtended {
                offset_delta,
                stack,
            } => {
                offset_delta.write_options(writer, endian, ())?;
                stack.write_options(writer, endian, ())
            }
            StackMapFrameInner::ChopFrame { offset_delta }
            | StackMapFrameInner::SameFrameExtended { offset_delta } => {
                offset_delta.write_options(writer, endian, ())
            }
            StackMapFrameInner::AppendFrame {
                offset_delta,
                locals,
            } => {
                offset_delta.write_options(writer, endian, ())?;
                for local in locals {
                    local.write_options(writer, endian, ())?;
                }
                Ok(())
            }
            StackMapFrameInner::FullFrame {
                offset_delta,
                number_of_locals,
                locals,
                number_of_stack_items,
                stack,
            } => {
                offset_delta.write_options(writer, endian, ())?;
                number_of_locals.write_options(writer, endian, ())?;
                for local in locals {
                    local.write_options(writer, endian, ())?;
                }
                number_of_stack_items.write_options(writer, endian, ())?;
                for item in stack {
                    item.write_options(writer, endian, ())?;
                }
                Ok(())
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Pool reference traversal
// ---------------------------------------------------------------------------

use crate::constant_info::ConstantExpectation;

fn element_value_tag_expectation(tag: char) -> ConstantExpectation {
    use ConstantExpectation as E;
    match tag {
        'B' | 'C' | 'I' | 'S' | 'Z' => E::Integer,
        'D' => E::Double,
        'F' => E::Float,
        'J' => E::Long,
        's' => E::Utf8,
        _ => E::Any,
    }
}

fn collect_element_value_refs(value: &ElementValue, out: &mut Vec<(u16, ConstantExpectation)>) {
    use ConstantExpectation as E;
    match value {
        ElementValue::ConstValueIndex { tag, value } => {
            out.push((*value, element_value_tag_expectation(*tag)))
        }
        ElementValue::EnumConst(e) => {
            out.push((e.type_name_index, E::Utf8));
            out.push((e.const_name_index, E::Utf8));
        }
        ElementValue::ClassInfoIndex(index) => out.push((*index, E::Utf8)),
        ElementValue::AnnotationValue(a) => collect_annotation_refs(a, out),
        ElementValue::ElementArray(array) => {
            for v in &array.values {
                collect_element_value_refs(v, out);
            }
        }
    }
}

fn remap_element_value_refs(value: &mut ElementValue, map: &dyn Fn(u16) -> u16) {
    match value {
        ElementValue::ConstValueIndex { value, .. } => *value = map(*value),
        ElementValue::EnumConst(e) => {
            e.type_name_index = map(e.type_name_index);
            e.const_name_index = map(e.const_name_index);
        }
        ElementValue::ClassInfoIndex(index) => *index = map(*index),
        ElementValue::AnnotationValue(a) => remap_annotation_refs(a, map),
        ElementValue::ElementArray(array) => {
            for v in &mut array.values {
                remap_element_value_refs(v, map);
            }
        }
    }
}

fn collect_annotation_refs(
    annotation: &RuntimeAnnotation,
    out: &mut Vec<(u16, ConstantExpectation)>,
) {
    out.push((annotation.type_index, ConstantExpectation::Utf8));
    for pair in &annotation.element_value_pairs {
        out.push((pair.element_name_index, ConstantExpectation::Utf8));
        collect_element_value_refs(&pair.value, out);
    }
}

fn remap_annotation_refs(annotation: &mut RuntimeAnnotation, map: &dyn Fn(u16) -> u16) {
    annotation.type_index = map(annotation.type_index);
    for pair in &mut annotation.element_value_pairs {
        pair.element_name_index = map(pair.element_name_index);
        remap_element_value_refs(&mut pair.value, map);
    }
}

fn collect_type_annotation_refs(
    annotation: &TypeAnnotation,
    out: &mut Vec<(u16, ConstantExpectation)>,
) {
    out.push((annotation.type_index, ConstantExpectation::Utf8));
    for pair in &annotation.element_value_pairs {
        out.push((pair.element_name_index, ConstantExpectation::Utf8));
        collect_element_value_refs(&pair.value, out);
    }
}

fn remap_type_annotation_refs(annotation: &mut TypeAnnotation, map: &dyn Fn(u16) -> u16) {
    annotation.type_index = map(annotation.type_index);
    for pair in &mut annotation.element_value_pairs {
        pair.element_name_index = map(pair.element_name_index);
        remap_element_value_refs(&mut pair.value, map);
    }
}

fn collect_frame_refs(frame: &StackMapFrame, out: &mut Vec<(u16, ConstantExpectation)>) {
    fn collect_vtype(vtype: &VerificationTypeInfo, out: &mut Vec<(u16, ConstantExpectation)>) {
        if let VerificationTypeInfo::Object { class } = vtype {
            out.push((*class, ConstantExpectation::Class));
        }
    }
    match &frame.inner {
        StackMapFrameInner::SameLocals1StackItemFrame { stack }
        | StackMapFrameInner::SameLocals1StackItemFrameExtended { stack, .. } => {
            collect_vtype(stack, out)
        }
        StackMapFrameInner::AppendFrame { locals, .. } => {
            for local in locals {
                collect_vtype(local, out);
            }
        }
        StackMapFrameInner::FullFrame { locals, stack, .. } => {
            for local in locals {
                collect_vtype(local, out);
            }
            for item in stack {
                collect_vtype(item, out);
            }
        }
        _ => {}
    }
}

fn remap_frame_refs(frame: &mut StackMapFrame, map: &dyn Fn(u16) -> u16) {
    fn remap_vtype(vtype: &mut VerificationTypeInfo, map: &dyn Fn(u16) -> u16) {
        if let VerificationTypeInfo::Object { class } = vtype {
            *class = map(*class);
        }
    }
    match &mut frame.inner {
        StackMapFrameInner::SameLocals1StackItemFrame { stack }
        | StackMapFrameInner::SameLocals1StackItemFrameExtended { stack, .. } => {
            remap_vtype(stack, map)
        }
        StackMapFrameInner::AppendFrame { locals, .. } => {
            for local in locals {
                remap_vtype(local, map);
            }
        }
        StackMapFrameInner::FullFrame { locals, stack, .. } => {
            for local in locals {
                remap_vtype(local, map);
            }
            for item in stack {
                remap_vtype(item, map);
            }
        }
        _ => {}
    }
}

impl AttributeInfo {
    /// Collect every constant-pool reference this attribute (and anything
    /// nested in it) holds. Optional zero-valued indices are skipped.
    /// `Unknown` payloads contribute nothing by contract.
    pub fn collect_pool_refs(&self, out: &mut Vec<(u16, ConstantExpectation)>) {
        use AttributeInfoVariant as V;
        use ConstantExpectation as E;

        out.push((self.attribute_name_index, E::Utf8));
        let Some(variant) = &self.info_parsed else {
            return;
        };
        let push_opt = |out: &mut Vec<(u16, E)>, index: u16, expect: E| {
            if index != 0 {
                out.push((index, expect));
            }
        };
        match variant {
            V::Code(code) => {
                for instr in &code.code {
                    instr.collect_pool_refs(out);
                }
                for entry in &code.exception_table {
                    push_opt(out, entry.catch_type, E::Class);
                }
                for attr in &code.attributes {
                    attr.collect_pool_refs(out);
                }
            }
            V::StackMapTable(table) => {
                for frame in &table.entries {
                    collect_frame_refs(frame, out);
                }
            }
            V::Exceptions(x) => {
                for &class in &x.exception_table {
                    out.push((class, E::Class));
                }
            }
            V::ConstantValue(x) => out.push((x.constant_value_index, E::ConstantValue)),
            V::SourceFile(x) => out.push((x.sourcefile_index, E::Utf8)),
            V::Signature(x) => out.push((x.signature_index, E::Utf8)),
            V::LocalVariableTable(x) => {
                for item in &x.items {
                    out.push((item.name_index, E::Utf8));
                    out.push((item.descriptor_index, E::Utf8));
                }
            }
            V::LocalVariableTypeTable(x) => {
                for item in &x.local_variable_type_table {
                    out.push((item.name_index, E::Utf8));
                    out.push((item.signature_index, E::Utf8));
                }
            }
            V::InnerClasses(x) => {
                for info in &x.classes {
                    out.push((info.inner_class_info_index, E::Class));
                    push_opt(out, info.outer_class_info_index, E::Class);
                    push_opt(out, info.inner_name_index, E::Utf8);
                }
            }
            V::EnclosingMethod(x) => {
                out.push((x.class_index, E::Class));
                push_opt(out, x.method_index, E::NameAndType);
            }
            V::BootstrapMethods(x) => {
                for bsm in &x.bootstrap_methods {
                    out.push((bsm.bootstrap_method_ref, E::MethodHandle));
                    for &arg in &bsm.bootstrap_arguments {
                        out.push((arg, E::AnyLoadable));
                    }
                }
            }
            V::NestHost(x) => out.push((x.host_class_index, E::Class)),
            V::NestMembers(x) => {
                for &class in &x.classes {
                    out.push((class, E::Class));
                }
            }
            V::PermittedSubclasses(x) => {
                for &class in &x.classes {
                    out.push((class, E::Class));
                }
            }
            V::MethodParameters(x) => {
                for parameter in &x.parameters {
                    push_opt(out, parameter.name_index, E::Utf8);
                }
            }
            V::Record(record) => {
                for component in &record.components {
                    out.push((component.name_index, E::Utf8));
                    out.push((component.descriptor_index, E::Utf8));
                    for attr in &component.attributes {
                        attr.collect_pool_refs(out);
                    }
                }
            }
            V::Module(module) => {
                out.push((module.module_name_index, E::Module));
                push_opt(out, module.module_version_index, E::Utf8);
                for require in &module.requires {
                    out.push((require.requires_index, E::Module));
                    push_opt(out, require.requires_version_index, E::Utf8);
                }
                for export in &module.exports {
                    out.push((export.exports_index, E::Package));
                    for &to in &export.exports_to_index {
                        out.push((to, E::Module));
                    }
                }
                for open in &module.opens {
                    out.push((open.opens_index, E::Package));
                    for &to in &open.opens_to_index {
                        out.push((to, E::Module));
                    }
                }
                for &uses in &module.uses_index {
                    out.push((uses, E::Class));
                }
                for provide in &module.provides {
                    out.push((provide.provides_index, E::Class));
                    for &with in &provide.provides_with_index {
                        out.push((with, E::Class));
                    }
                }
            }
            V::RuntimeVisibleAnnotations(x) | V::RuntimeInvisibleAnnotations(x) => {
                for annotation in &x.annotations {
                    collect_annotation_refs(annotation, out);
                }
            }
            V::RuntimeVisibleParameterAnnotations(x)
            | V::RuntimeInvisibleParameterAnnotations(x) => {
                for list in &x.parameter_annotations {
                    for annotation in &list.annotations {
                        collect_annotation_refs(annotation, out);
                    }
                }
            }
            V::RuntimeVisibleTypeAnnotations(x) | V::RuntimeInvisibleTypeAnnotations(x) => {
                for annotation in &x.type_annotations {
                    collect_type_annotation_refs(annotation, out);
                }
            }
            V::AnnotationDefault(x) => collect_element_value_refs(&x.default_value, out),
            V::LineNumberTable(_)
            | V::SourceDebugExtension(_)
            | V::Synthetic(_)
            | V::Deprecated(_)
            | V::Unknown => {}
        }
    }

    /// Rewrite every constant-pool reference through `map`, which must send
    /// 0 to 0 (optional absent indices stay absent).
    pub fn remap_pool_refs(&mut self, map: &dyn Fn(u16) -> u16) {
        use AttributeInfoVariant as V;

        self.attribute_name_index = map(self.attribute_name_index);
        let Some(variant) = &mut self.info_parsed else {
            return;
        };
        match variant {
            V::Code(code) => {
                for instr in &mut code.code {
                    instr.remap_pool_refs(map);
                }
                for entry in &mut code.exception_table {
                    entry.catch_type = map(entry.catch_type);
                }
                for attr in &mut code.attributes {
                    attr.remap_pool_refs(map);
                }
            }
            V::StackMapTable(table) => {
                for frame in &mut table.entries {
                    remap_frame_refs(frame, map);
                }
            }
            V::Exceptions(x) => {
                for class in &mut x.exception_table {
                    *class = map(*class);
                }
            }
            V::ConstantValue(x) => x.constant_value_index = map(x.constant_value_index),
            V::SourceFile(x) => x.sourcefile_index = map(x.sourcefile_index),
            V::Signature(x) => x.signature_index = map(x.signature_index),
            V::LocalVariableTable(x) => {
                for item in &mut x.items {
                    item.name_index = map(item.name_index);
                    item.descriptor_index = map(item.descriptor_index);
                }
            }
            V::LocalVariableTypeTable(x) => {
                for item in &mut x.local_variable_type_table {
                    item.name_index = map(item.name_index);
                    item.signature_index = map(item.signature_index);
                }
            }
            V::InnerClasses(x) => {
                for info in &mut x.classes {
                    info.inner_class_info_index = map(info.inner_class_info_index);
                    info.outer_class_info_index = map(info.outer_class_info_index);
                    info.inner_name_index = map(info.inner_name_index);
                }
            }
            V::EnclosingMethod(x) => {
                x.class_index = map(x.class_index);
                x.method_index = map(x.method_index);
            }
            V::BootstrapMethods(x) => {
                for bsm in &mut x.bootstrap_methods {
                    bsm.bootstrap_method_ref = map(bsm.bootstrap_method_ref);
                    for arg in &mut bsm.bootstrap_arguments {
                        *arg = map(*arg);
                    }
                }
            }
            V::NestHost(x) => x.host_class_index = map(x.host_class_index),
            V::NestMembers(x) => {
                for class in &mut x.classes {
                    *class = map(*class);
                }
            }
            V::PermittedSubclasses(x) => {
                for class in &mut x.classes {
                    *class = map(*class);
                }
            }
            V::MethodParameters(x) => {
                for parameter in &mut x.parameters {
                    parameter.name_index = map(parameter.name_index);
                }
            }
            V::Record(record) => {
                for component in &mut record.components {
                    component.name_index = map(component.name_index);
                    component.descriptor_index = map(component.descriptor_index);
                    for attr in &mut component.attributes {
                        attr.remap_pool_refs(map);
                    }
                }
            }
            V::Module(module) => {
                module.module_name_index = map(module.module_name_index);
                module.module_version_index = map(module.module_version_index);
                for require in &mut module.requires {
                    require.requires_index = map(require.requires_index);
                    require.requires_version_index = map(require.requires_version_index);
                }
                for export in &mut module.exports {
                    export.exports_index = map(export.exports_index);
                    for to in &mut export.exports_to_index {
                        *to = map(*to);
                    }
                }
                for open in &mut module.opens {
                    open.opens_index = map(open.opens_index);
                    for to in &mut open.opens_to_index {
                        *to = map(*to);
                    }
                }
                for uses in &mut module.uses_index {
                    *uses = map(*uses);
                }
                for provide in &mut module.provides {
                    provide.provides_index = map(provide.provides_index);
                    for with in &mut provide.provides_with_index {
                        *with = map(*with);
                    }
                }
            }
            V::RuntimeVisibleAnnotations(x) | V::RuntimeInvisibleAnnotations(x) => {
                for annotation in &mut x.annotations {
                    remap_annotation_refs(annotation, map);
                }
            }
            V::RuntimeVisibleParameterAnnotations(x)
            | V::RuntimeInvisibleParameterAnnotations(x) => {
                for list in &mut x.parameter_annotations {
                    for annotation in &mut list.annotations {
                        remap_annotation_refs(annotation, map);
                    }
                }
            }
            V::RuntimeVisibleTypeAnnotations(x) | V::RuntimeInvisibleTypeAnnotations(x) => {
                for annotation in &mut x.type_annotations {
                    remap_type_annotation_refs(annotation, map);
                }
            }
            V::AnnotationDefault(x) => remap_element_value_refs(&mut x.default_value, map),
            V::LineNumberTable(_)
            | V::SourceDebugExtension(_)
            | V::Synthetic(_)
            | V::Deprecated(_)
            | V::Unknown => {}
        }
    }
}
