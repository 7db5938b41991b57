use std::io::Seek;

use binrw::{binrw, BinRead, BinResult, BinWrite};

use super::mutf8;

/// One constant pool entry, tagged per the class-file format.
///
/// `Unusable` is never present on the wire: it fills the phantom second slot
/// that Long and Double entries occupy, so that `const_pool[index - 1]`
/// addresses entry `index` directly.
#[derive(Clone, Debug, PartialEq)]
#[binrw]
#[brw(big)]
pub enum ConstantInfo {
    #[brw(magic = 1u8)]
    Utf8(Utf8Constant),
    #[brw(magic = 3u8)]
    Integer(IntegerConstant),
    #[brw(magic = 4u8)]
    Float(FloatConstant),
    #[brw(magic = 5u8)]
    Long(LongConstant),
    #[brw(magic = 6u8)]
    Double(DoubleConstant),
    #[brw(magic = 7u8)]
    Class(ClassConstant),
    #[brw(magic = 8u8)]
    String(StringConstant),
    #[brw(magic = 9u8)]
    FieldRef(FieldRefConstant),
    #[brw(magic = 10u8)]
    MethodRef(MethodRefConstant),
    #[brw(magic = 11u8)]
    InterfaceMethodRef(InterfaceMethodRefConstant),
    #[brw(magic = 12u8)]
    NameAndType(NameAndTypeConstant),
    #[brw(magic = 15u8)]
    MethodHandle(MethodHandleConstant),
    #[brw(magic = 16u8)]
    MethodType(MethodTypeConstant),
    #[brw(magic = 17u8)]
    Dynamic(DynamicConstant),
    #[brw(magic = 18u8)]
    InvokeDynamic(InvokeDynamicConstant),
    #[brw(magic = 19u8)]
    Module(ModuleConstant),
    #[brw(magic = 20u8)]
    Package(PackageConstant),
    #[br(pre_assert(false))]
    Unusable,
}

impl ConstantInfo {
    /// Long and Double entries take two pool slots.
    pub fn is_two_slot(&self) -> bool {
        matches!(self, ConstantInfo::Long(_) | ConstantInfo::Double(_))
    }

    /// Loadable by `ldc`/`ldc_w` (single-slot loadable constants).
    pub fn is_loadable_single(&self) -> bool {
        matches!(
            self,
            ConstantInfo::Integer(_)
                | ConstantInfo::Float(_)
                | ConstantInfo::String(_)
                | ConstantInfo::Class(_)
                | ConstantInfo::MethodHandle(_)
                | ConstantInfo::MethodType(_)
                | ConstantInfo::Dynamic(_)
        )
    }

    pub fn tag_name(&self) -> &'static str {
        match self {
            ConstantInfo::Utf8(_) => "Utf8",
            ConstantInfo::Integer(_) => "Integer",
            ConstantInfo::Float(_) => "Float",
            ConstantInfo::Long(_) => "Long",
            ConstantInfo::Double(_) => "Double",
            ConstantInfo::Class(_) => "Class",
            ConstantInfo::String(_) => "String",
            ConstantInfo::FieldRef(_) => "FieldRef",
            ConstantInfo::MethodRef(_) => "MethodRef",
            ConstantInfo::InterfaceMethodRef(_) => "InterfaceMethodRef",
            ConstantInfo::NameAndType(_) => "NameAndType",
            ConstantInfo::MethodHandle(_) => "MethodHandle",
            ConstantInfo::MethodType(_) => "MethodType",
            ConstantInfo::Dynamic(_) => "Dynamic",
            ConstantInfo::InvokeDynamic(_) => "InvokeDynamic",
            ConstantInfo::Module(_) => "Module",
            ConstantInfo::Package(_) => "Package",
            ConstantInfo::Unusable => "Unusable",
        }
    }
}

/// Length-prefixed modified UTF-8 on the wire, a `String` in the model.
#[binrw]
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
#[brw(big)]
pub struct Utf8Constant {
    #[br(temp)]
    #[bw(calc = mutf8::encode(utf8_string).len() as u16)]
    length: u16,
    #[br(count = length, try_map = |bytes: Vec<u8>| mutf8::decode(&bytes))]
    #[bw(map = |s: &String| mutf8::encode(s))]
    pub utf8_string: String,
}

impl Utf8Constant {
    pub fn new(s: impl Into<String>) -> Self {
        Utf8Constant {
            utf8_string: s.into(),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct IntegerConstant {
    pub value: i32,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct FloatConstant {
    pub value: f32,
}

// Compared by bit pattern so NaN payloads intern like any other value.
impl PartialEq for FloatConstant {
    fn eq(&self, other: &Self) -> bool {
        self.value.to_bits() == other.value.to_bits()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct LongConstant {
    pub value: i64,
}

#[derive(Clone, Debug)]
#[binrw]
#[brw(big)]
pub struct DoubleConstant {
    pub value: f64,
}

impl PartialEq for DoubleConstant {
    fn eq(&self, other: &Self) -> bool {
        self.value.to_bits() == other.value.to_bits()
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct ClassConstant {
    pub name_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct StringConstant {
    pub string_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct FieldRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct MethodRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct InterfaceMethodRefConstant {
    pub class_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct NameAndTypeConstant {
    pub name_index: u16,
    pub descriptor_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct MethodHandleConstant {
    pub reference_kind: u8,
    pub reference_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct MethodTypeConstant {
    pub descriptor_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct DynamicConstant {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct InvokeDynamicConstant {
    pub bootstrap_method_attr_index: u16,
    pub name_and_type_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct ModuleConstant {
    pub name_index: u16,
}

#[derive(Clone, Debug, PartialEq, Eq)]
#[binrw]
#[brw(big)]
pub struct PackageConstant {
    pub name_index: u16,
}

/// Reads `const_pool_size - 1` logical slots, inserting an `Unusable` filler
/// after every Long/Double so vector positions line up with pool indices.
#[binrw::parser(reader, endian)]
pub fn constant_pool_parser(const_pool_size: u16) -> BinResult<Vec<ConstantInfo>> {
    let mut pool = Vec::new();
    let mut slot: u32 = 1;
    while slot < const_pool_size as u32 {
        let entry = ConstantInfo::read_options(reader, endian, ())?;
        let two_slot = entry.is_two_slot();
        pool.push(entry);
        slot += 1;
        if two_slot {
            if slot >= const_pool_size as u32 {
                return Err(binrw::Error::AssertFail {
                    pos: reader.stream_position()?,
                    message: "two-slot constant overruns the constant pool".into(),
                });
            }
            pool.push(ConstantInfo::Unusable);
            slot += 1;
        }
    }
    Ok(pool)
}

/// Writes every real entry; `Unusable` fillers produce no bytes.
#[binrw::writer(writer, endian)]
pub fn constant_pool_writer(pool: &Vec<ConstantInfo>) -> BinResult<()> {
    for entry in pool {
        if matches!(entry, ConstantInfo::Unusable) {
            continue;
        }
        entry.write_options(writer, endian, ())?;
    }
    Ok(())
}
