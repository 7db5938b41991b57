use std::fmt;
use std::io::Cursor;

use binrw::{binrw, BinWrite};

use crate::attribute_info::{
    AttributeInfo, AttributeInfoVariant, BootstrapMethodsAttribute, CodeAttribute,
};
use crate::code_attribute;
use crate::constant_info::{
    entry_internal_refs, get_class_name, get_utf8, matches_expectation, remap_entry_refs,
    ClassConstant, ConstantExpectation, ConstantInfo, FieldRefConstant, MethodRefConstant,
    NameAndTypeConstant, StringConstant, Utf8Constant,
};
use crate::field_info::{FieldAccessFlags, FieldInfo};
use crate::method_info::{MethodAccessFlags, MethodInfo};
use crate::InterpretInner;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Failures of the read → transform → write pipeline. Either a fully valid
/// byte sequence is produced or one of these is returned; no partial output.
#[derive(Debug)]
pub enum ClassError {
    /// The input is not a well-formed class file.
    Malformed { message: String },
    /// The class-file version lies outside the supported range.
    UnsupportedVersion { major: u16, minor: u16 },
    /// A dangling index or label was found at write time.
    UnresolvedReference { message: String },
    /// I/O failure in a path-based convenience function.
    Io(std::io::Error),
}

impl fmt::Display for ClassError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ClassError::Malformed { message } => write!(f, "malformed class: {message}"),
            ClassError::UnsupportedVersion { major, minor } => {
                write!(f, "unsupported class file version {major}.{minor}")
            }
            ClassError::UnresolvedReference { message } => {
                write!(f, "unresolved reference: {message}")
            }
            ClassError::Io(e) => write!(f, "I/O error: {e}"),
        }
    }
}

impl std::error::Error for ClassError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            ClassError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<binrw::Error> for ClassError {
    fn from(e: binrw::Error) -> Self {
        ClassError::Malformed {
            message: e.to_string(),
        }
    }
}

impl From<std::io::Error> for ClassError {
    fn from(e: std::io::Error) -> Self {
        ClassError::Io(e)
    }
}

// ---------------------------------------------------------------------------
// ClassFile
// ---------------------------------------------------------------------------

#[derive(Clone, Debug)]
#[binrw]
#[brw(big, magic = b"\xca\xfe\xba\xbe")]
pub struct ClassFile {
    pub minor_version: u16,
    pub major_version: u16,
    pub const_pool_size: u16,
    #[br(parse_with = crate::constant_info::constant_pool_parser, args(const_pool_size))]
    #[bw(write_with = crate::constant_info::constant_pool_writer)]
    pub const_pool: Vec<ConstantInfo>,
    pub access_flags: ClassAccessFlags,
    pub this_class: u16,
    pub super_class: u16,
    pub interfaces_count: u16,
    #[br(count = interfaces_count)]
    pub interfaces: Vec<u16>,
    pub fields_count: u16,
    #[br(count = fields_count)]
    pub fields: Vec<FieldInfo>,
    pub methods_count: u16,
    #[br(count = methods_count)]
    pub methods: Vec<MethodInfo>,
    pub attributes_count: u16,
    #[br(count = attributes_count)]
    pub attributes: Vec<AttributeInfo>,
}

#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug)]
#[binrw]
pub struct ClassAccessFlags(u16);

bitflags! {
    impl ClassAccessFlags: u16 {
        const PUBLIC = 0x0001;     //	Declared public; may be accessed from outside its package.
        const FINAL = 0x0010;      //	Declared final; no subclasses allowed.
        const SUPER = 0x0020;      //	Treat superclass methods specially when invoked by the invokespecial instruction.
        const INTERFACE = 0x0200;  //	Is an interface, not a class.
        const ABSTRACT = 0x0400;   //	Declared abstract; must not be instantiated.
        const SYNTHETIC = 0x1000;  //	Declared synthetic; not present in the source code.
        const ANNOTATION = 0x2000; //	Declared as an annotation type.
        const ENUM = 0x4000;       //	Declared as an enum type.
        const MODULE = 0x8000;     //	Declared as a module type.
    }
}

/// JDK 1.1.
pub const MIN_MAJOR_VERSION: u16 = 45;
/// JDK 21, the ceiling of the supported format range.
pub const MAX_MAJOR_VERSION: u16 = 65;

impl ClassFile {
    /// A minimal public class with the given internal names, Java 8 format.
    pub fn new(this_class: &str, super_class: &str) -> ClassFile {
        let mut class = ClassFile {
            minor_version: 0,
            major_version: 52,
            const_pool_size: 1,
            const_pool: Vec::new(),
            access_flags: ClassAccessFlags::PUBLIC | ClassAccessFlags::SUPER,
            this_class: 0,
            super_class: 0,
            interfaces_count: 0,
            interfaces: Vec::new(),
            fields_count: 0,
            fields: Vec::new(),
            methods_count: 0,
            methods: Vec::new(),
            attributes_count: 0,
            attributes: Vec::new(),
        };
        class.this_class = class.get_or_add_class(this_class);
        class.super_class = class.get_or_add_class(super_class);
        class.sync_counts();
        class
    }

    pub fn check_version(&self) -> Result<(), ClassError> {
        if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&self.major_version) {
            return Err(ClassError::UnsupportedVersion {
                major: self.major_version,
                minor: self.minor_version,
            });
        }
        Ok(())
    }

    // -- Pool access --

    /// 1-based constant pool lookup.
    pub fn constant(&self, index: u16) -> Option<&ConstantInfo> {
        self.const_pool.get((index as usize).checked_sub(1)?)
    }

    pub fn get_utf8(&self, index: u16) -> Option<&str> {
        get_utf8(&self.const_pool, index)
    }

    pub fn get_class_name(&self, index: u16) -> Option<&str> {
        get_class_name(&self.const_pool, index)
    }

    pub fn this_class_name(&self) -> Option<&str> {
        self.get_class_name(self.this_class)
    }

    pub fn super_class_name(&self) -> Option<&str> {
        self.get_class_name(self.super_class)
    }

    /// Intern a constant: an equal entry is reused, otherwise the entry is
    /// appended (with its filler slot for Long/Double). Returns the 1-based
    /// index.
    pub fn get_or_add_constant(&mut self, entry: ConstantInfo) -> u16 {
        for (i, existing) in self.const_pool.iter().enumerate() {
            if *existing == entry {
                return (i + 1) as u16;
            }
        }
        let index = (self.const_pool.len() + 1) as u16;
        let two_slot = entry.is_two_slot();
        self.const_pool.push(entry);
        if two_slot {
            self.const_pool.push(ConstantInfo::Unusable);
        }
        self.const_pool_size = (self.const_pool.len() + 1) as u16;
        index
    }

    pub fn get_or_add_utf8(&mut self, value: &str) -> u16 {
        self.get_or_add_constant(ConstantInfo::Utf8(Utf8Constant::new(value)))
    }

    pub fn get_or_add_class(&mut self, name: &str) -> u16 {
        let name_index = self.get_or_add_utf8(name);
        self.get_or_add_constant(ConstantInfo::Class(ClassConstant { name_index }))
    }

    pub fn get_or_add_string(&mut self, value: &str) -> u16 {
        let string_index = self.get_or_add_utf8(value);
        self.get_or_add_constant(ConstantInfo::String(StringConstant { string_index }))
    }

    pub fn get_or_add_name_and_type(&mut self, name: &str, descriptor: &str) -> u16 {
        let name_index = self.get_or_add_utf8(name);
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.get_or_add_constant(ConstantInfo::NameAndType(NameAndTypeConstant {
            name_index,
            descriptor_index,
        }))
    }

    pub fn get_or_add_field_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.get_or_add_class(class);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.get_or_add_constant(ConstantInfo::FieldRef(FieldRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    pub fn get_or_add_method_ref(&mut self, class: &str, name: &str, descriptor: &str) -> u16 {
        let class_index = self.get_or_add_class(class);
        let name_and_type_index = self.get_or_add_name_and_type(name, descriptor);
        self.get_or_add_constant(ConstantInfo::MethodRef(MethodRefConstant {
            class_index,
            name_and_type_index,
        }))
    }

    // -- Member management --

    pub fn add_interface(&mut self, name: &str) {
        let index = self.get_or_add_class(name);
        if !self.interfaces.contains(&index) {
            self.interfaces.push(index);
            self.interfaces_count = self.interfaces.len() as u16;
        }
    }

    pub fn add_field(&mut self, access_flags: FieldAccessFlags, name: &str, descriptor: &str) -> usize {
        let name_index = self.get_or_add_utf8(name);
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.fields.push(FieldInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes_count: 0,
            attributes: Vec::new(),
        });
        self.fields_count = self.fields.len() as u16;
        self.fields.len() - 1
    }

    pub fn add_method(
        &mut self,
        access_flags: MethodAccessFlags,
        name: &str,
        descriptor: &str,
    ) -> usize {
        let name_index = self.get_or_add_utf8(name);
        let descriptor_index = self.get_or_add_utf8(descriptor);
        self.methods.push(MethodInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes_count: 0,
            attributes: Vec::new(),
        });
        self.methods_count = self.methods.len() as u16;
        self.methods.len() - 1
    }

    /// (name, descriptor) of a member, resolved through the pool.
    fn member_key(&self, name_index: u16, descriptor_index: u16) -> Option<(&str, &str)> {
        Some((
            self.get_utf8(name_index)?,
            self.get_utf8(descriptor_index)?,
        ))
    }

    pub fn find_method(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.methods.iter().position(|m| {
            self.member_key(m.name_index, m.descriptor_index) == Some((name, descriptor))
        })
    }

    pub fn find_field(&self, name: &str, descriptor: &str) -> Option<usize> {
        self.fields.iter().position(|f| {
            self.member_key(f.name_index, f.descriptor_index) == Some((name, descriptor))
        })
    }

    /// Remove a method. The pool entries it referenced become garbage and
    /// are collected on the next write.
    pub fn remove_method(&mut self, name: &str, descriptor: &str) -> Option<MethodInfo> {
        let index = self.find_method(name, descriptor)?;
        let removed = self.methods.remove(index);
        self.methods_count = self.methods.len() as u16;
        Some(removed)
    }

    pub fn remove_field(&mut self, name: &str, descriptor: &str) -> Option<FieldInfo> {
        let index = self.find_field(name, descriptor)?;
        let removed = self.fields.remove(index);
        self.fields_count = self.fields.len() as u16;
        Some(removed)
    }

    pub fn find_class_attribute(&self, name: &str) -> Option<&AttributeInfo> {
        self.attributes
            .iter()
            .find(|a| a.name(&self.const_pool) == Some(name))
    }

    /// Attach a typed attribute to the class itself.
    pub fn attach_class_attribute(
        &mut self,
        name: &str,
        variant: AttributeInfoVariant,
    ) -> Result<(), ClassError> {
        let name_index = self.get_or_add_utf8(name);
        let attr = AttributeInfo::from_variant(name_index, variant)?;
        self.attributes.push(attr);
        self.attributes_count = self.attributes.len() as u16;
        Ok(())
    }

    pub fn attach_method_attribute(
        &mut self,
        method_index: usize,
        name: &str,
        variant: AttributeInfoVariant,
    ) -> Result<(), ClassError> {
        let name_index = self.get_or_add_utf8(name);
        let attr = AttributeInfo::from_variant(name_index, variant)?;
        let method = &mut self.methods[method_index];
        method.attributes.push(attr);
        method.attributes_count = method.attributes.len() as u16;
        Ok(())
    }

    pub fn attach_field_attribute(
        &mut self,
        field_index: usize,
        name: &str,
        variant: AttributeInfoVariant,
    ) -> Result<(), ClassError> {
        let name_index = self.get_or_add_utf8(name);
        let attr = AttributeInfo::from_variant(name_index, variant)?;
        let field = &mut self.fields[field_index];
        field.attributes.push(attr);
        field.attributes_count = field.attributes.len() as u16;
        Ok(())
    }

    /// Attach a Code attribute to a method (interning the "Code" name).
    pub fn attach_code(
        &mut self,
        method_index: usize,
        code: CodeAttribute,
    ) -> Result<(), ClassError> {
        self.attach_method_attribute(method_index, "Code", AttributeInfoVariant::Code(code))
    }

    // -- Interpretation --

    /// Parse every attribute payload (and nested instruction stream) into
    /// its typed form.
    pub fn interpret(&mut self) -> Result<(), ClassError> {
        let pool = &self.const_pool;
        for field in &mut self.fields {
            field.interpret_inner(pool)?;
        }
        for method in &mut self.methods {
            method.interpret_inner(pool)?;
        }
        for attr in &mut self.attributes {
            attr.interpret_inner(pool)?;
        }
        Ok(())
    }

    // -- Count/length maintenance --

    /// Recompute all stored counts from the actual collections.
    pub fn sync_counts(&mut self) {
        self.const_pool_size = (self.const_pool.len() + 1) as u16;
        self.interfaces_count = self.interfaces.len() as u16;
        self.fields_count = self.fields.len() as u16;
        self.methods_count = self.methods.len() as u16;
        self.attributes_count = self.attributes.len() as u16;
        for field in &mut self.fields {
            field.attributes_count = field.attributes.len() as u16;
        }
        for method in &mut self.methods {
            method.attributes_count = method.attributes.len() as u16;
        }
    }

    /// Serialize every parsed attribute back into its raw bytes.
    pub fn sync_attributes(&mut self) -> Result<(), ClassError> {
        for field in &mut self.fields {
            for attr in &mut field.attributes {
                attr.sync_from_parsed()?;
            }
        }
        for method in &mut self.methods {
            for attr in &mut method.attributes {
                attr.sync_from_parsed()?;
            }
        }
        for attr in &mut self.attributes {
            attr.sync_from_parsed()?;
        }
        Ok(())
    }

    // -- Reference verification --

    fn check_index(&self, index: u16, expect: ConstantExpectation, site: &str) -> Result<(), String> {
        match self.constant(index) {
            Some(entry) if matches_expectation(entry, expect) => Ok(()),
            Some(entry) => Err(format!(
                "{site}: pool index {index} is a {} entry, expected {expect:?}",
                entry.tag_name()
            )),
            None => Err(format!(
                "{site}: pool index {index} is out of bounds (pool has {} slots)",
                self.const_pool.len()
            )),
        }
    }

    /// Validate every reference between pool entries.
    pub fn check_pool(&self) -> Result<(), String> {
        let mut refs = Vec::new();
        for (i, entry) in self.const_pool.iter().enumerate() {
            refs.clear();
            entry_internal_refs(entry, &mut refs);
            for &(index, expect) in &refs {
                self.check_index(index, expect, &format!("pool entry {}", i + 1))?;
            }
        }
        Ok(())
    }

    fn bootstrap_methods(&self) -> Option<&BootstrapMethodsAttribute> {
        self.attributes.iter().find_map(|a| match &a.info_parsed {
            Some(AttributeInfoVariant::BootstrapMethods(b)) => Some(b),
            _ => None,
        })
    }

    /// Validate every reference from the model into the pool, plus code
    /// stream integrity (branch boundaries, exception ranges, stack map
    /// offsets, invokedynamic bootstrap indices).
    pub fn check_model(&self) -> Result<(), String> {
        let mut refs = Vec::new();
        self.collect_model_refs(&mut refs);
        for &(index, expect) in &refs {
            self.check_index(index, expect, "class structure")?;
        }

        let bootstrap_len = self.bootstrap_methods().map(|b| b.bootstrap_methods.len());
        for entry in &self.const_pool {
            let bsm_index = match entry {
                ConstantInfo::Dynamic(d) => d.bootstrap_method_attr_index,
                ConstantInfo::InvokeDynamic(d) => d.bootstrap_method_attr_index,
                _ => continue,
            };
            match bootstrap_len {
                Some(len) if (bsm_index as usize) < len => {}
                Some(len) => {
                    return Err(format!(
                        "bootstrap method index {bsm_index} out of range ({len} available)"
                    ))
                }
                None => return Err("dynamic constant without a BootstrapMethods attribute".into()),
            }
        }

        for method in &self.methods {
            let name = self.get_utf8(method.name_index).unwrap_or("<bad name>");
            if let Some(code) = method.code() {
                check_code(code, name)?;
            }
        }
        Ok(())
    }

    /// Every pool reference held by the model (not the pool-internal ones).
    fn collect_model_refs(&self, out: &mut Vec<(u16, ConstantExpectation)>) {
        use ConstantExpectation as E;
        out.push((self.this_class, E::Class));
        if self.super_class != 0 {
            out.push((self.super_class, E::Class));
        }
        for &interface in &self.interfaces {
            out.push((interface, E::Class));
        }
        for field in &self.fields {
            out.push((field.name_index, E::Utf8));
            out.push((field.descriptor_index, E::Utf8));
            for attr in &field.attributes {
                attr.collect_pool_refs(out);
            }
        }
        for method in &self.methods {
            out.push((method.name_index, E::Utf8));
            out.push((method.descriptor_index, E::Utf8));
            for attr in &method.attributes {
                attr.collect_pool_refs(out);
            }
        }
        for attr in &self.attributes {
            attr.collect_pool_refs(out);
        }
    }

    fn remap_model_refs(&mut self, map: &dyn Fn(u16) -> u16) {
        self.this_class = map(self.this_class);
        self.super_class = map(self.super_class);
        for interface in &mut self.interfaces {
            *interface = map(*interface);
        }
        for field in &mut self.fields {
            field.name_index = map(field.name_index);
            field.descriptor_index = map(field.descriptor_index);
            for attr in &mut field.attributes {
                attr.remap_pool_refs(map);
            }
        }
        for method in &mut self.methods {
            method.name_index = map(method.name_index);
            method.descriptor_index = map(method.descriptor_index);
            for attr in &mut method.attributes {
                attr.remap_pool_refs(map);
            }
        }
        for attr in &mut self.attributes {
            attr.remap_pool_refs(map);
        }
    }

    fn all_known_attributes_interpreted(&self) -> bool {
        fn interpreted(attrs: &[AttributeInfo]) -> bool {
            attrs.iter().all(|a| match &a.info_parsed {
                None => false,
                Some(AttributeInfoVariant::Code(code)) => interpreted(&code.attributes),
                Some(AttributeInfoVariant::Record(record)) => record
                    .components
                    .iter()
                    .all(|c| interpreted(&c.attributes)),
                Some(_) => true,
            })
        }
        self.fields.iter().all(|f| interpreted(&f.attributes))
            && self.methods.iter().all(|m| interpreted(&m.attributes))
            && interpreted(&self.attributes)
    }

    // -- Constant pool compaction --

    /// Deduplicate equal entries and drop entries nothing references,
    /// rewriting every index in the model. Entry order is preserved, so
    /// indices only ever decrease. Requires an interpreted model; if raw
    /// uninterpreted attributes are present the pool is left as is.
    pub fn rebuild_const_pool(&mut self) -> Result<(), ClassError> {
        if !self.all_known_attributes_interpreted() {
            log::debug!("constant pool compaction skipped: uninterpreted attributes present");
            return Ok(());
        }
        let slots = self.const_pool.len();

        // Liveness: roots from the model, closed over pool-internal refs.
        let mut live = vec![false; slots + 1];
        let mut work = Vec::new();
        self.collect_model_refs(&mut work);
        let mut stack: Vec<u16> = work.iter().map(|&(i, _)| i).collect();
        let mut refs = Vec::new();
        while let Some(index) = stack.pop() {
            if index == 0 || index as usize > slots || live[index as usize] {
                continue;
            }
            live[index as usize] = true;
            refs.clear();
            entry_internal_refs(&self.const_pool[index as usize - 1], &mut refs);
            stack.extend(refs.iter().map(|&(i, _)| i));
        }

        // Canonicalization to a fixpoint: entries are equal when their
        // remapped contents are equal, which can cascade (two Class entries
        // pointing at duplicate Utf8 entries merge on the second pass).
        let mut canonical: Vec<u16> = (0..=slots as u16).collect();
        loop {
            let mut changed = false;
            let mut seen: Vec<(ConstantInfo, u16)> = Vec::new();
            for index in 1..=slots as u16 {
                if !live[index as usize] {
                    continue;
                }
                let entry = &self.const_pool[index as usize - 1];
                if matches!(entry, ConstantInfo::Unusable) {
                    continue;
                }
                let mut normalized = entry.clone();
                remap_entry_refs(&mut normalized, &|i| canonical[i as usize]);
                match seen.iter().find(|(e, _)| *e == normalized) {
                    Some(&(_, first)) => {
                        if canonical[index as usize] != first {
                            canonical[index as usize] = first;
                            changed = true;
                        }
                    }
                    None => seen.push((normalized, index)),
                }
            }
            if !changed {
                break;
            }
        }

        // Assign compacted indices first (pool-internal references may point
        // forward), then rebuild. Surviving entries keep their relative
        // order.
        let mut final_map = vec![0u16; slots + 1];
        let mut next_index: u16 = 1;
        for index in 1..=slots as u16 {
            if !live[index as usize] || canonical[index as usize] != index {
                continue;
            }
            let entry = &self.const_pool[index as usize - 1];
            if matches!(entry, ConstantInfo::Unusable) {
                continue;
            }
            final_map[index as usize] = next_index;
            next_index += if entry.is_two_slot() { 2 } else { 1 };
        }
        // Duplicates point at their canonical entry's new index.
        for index in 1..=slots {
            if final_map[index] == 0 && live[index] {
                final_map[index] = final_map[canonical[index] as usize];
            }
        }

        let mut new_pool = Vec::with_capacity(slots);
        for index in 1..=slots as u16 {
            if !live[index as usize] || canonical[index as usize] != index {
                continue;
            }
            let mut entry = self.const_pool[index as usize - 1].clone();
            if matches!(entry, ConstantInfo::Unusable) {
                continue;
            }
            let two_slot = entry.is_two_slot();
            remap_entry_refs(&mut entry, &|i| {
                final_map[canonical[i as usize] as usize]
            });
            new_pool.push(entry);
            if two_slot {
                new_pool.push(ConstantInfo::Unusable);
            }
        }

        let dropped = self
            .const_pool
            .iter()
            .filter(|e| !matches!(e, ConstantInfo::Unusable))
            .count()
            - new_pool
                .iter()
                .filter(|e| !matches!(e, ConstantInfo::Unusable))
                .count();
        if dropped > 0 {
            log::debug!("constant pool compaction dropped {dropped} entries");
        }

        // Entries earlier in the pool can only move toward lower indices.
        debug_assert!((1..=slots).all(|i| final_map[i] as usize <= i));

        self.const_pool = new_pool;
        self.remap_model_refs(&|i| final_map[i as usize]);
        self.const_pool_size = (self.const_pool.len() + 1) as u16;
        Ok(())
    }

    // -- Writer --

    /// Serialize to class-file bytes, consuming the model: syncs every
    /// count and attribute payload, compacts the constant pool, verifies
    /// all references, and writes. Consuming `self` is what forbids further
    /// transformation of a written class without a fresh read.
    pub fn into_bytes(mut self) -> Result<Vec<u8>, ClassError> {
        self.sync_attributes()?;
        self.sync_counts();
        self.check_pool()
            .and_then(|_| self.check_model())
            .map_err(|message| ClassError::UnresolvedReference { message })?;
        self.rebuild_const_pool()?;
        self.sync_attributes()?;
        self.sync_counts();

        let mut cursor = Cursor::new(Vec::new());
        self.write(&mut cursor)
            .map_err(|e| ClassError::Malformed {
                message: format!("serialization failed: {e}"),
            })?;
        Ok(cursor.into_inner())
    }

    /// Read-side reference validation; failures are malformed input.
    pub fn verify(&self) -> Result<(), ClassError> {
        self.check_pool()
            .and_then(|_| self.check_model())
            .map_err(|message| ClassError::Malformed { message })
    }
}

/// Code stream integrity: branches land on instruction boundaries,
/// exception ranges and stack map offsets stay inside the method.
fn check_code(code: &CodeAttribute, method_name: &str) -> Result<(), String> {
    code_attribute::verify_branch_targets(&code.code)
        .map_err(|e| format!("method {method_name}: {e}"))?;

    let code_len = code_attribute::encoded_code_len(&code.code);
    let boundaries: std::collections::HashSet<u32> = code_attribute::compute_addresses(&code.code)
        .iter()
        .map(|&(a, _)| a)
        .collect();

    for entry in &code.exception_table {
        let (start, end, handler) = (
            entry.start_pc as u32,
            entry.end_pc as u32,
            entry.handler_pc as u32,
        );
        if !boundaries.contains(&start) || end > code_len || start >= end {
            return Err(format!(
                "method {method_name}: exception range {start}..{end} is not instruction-aligned"
            ));
        }
        if !boundaries.contains(&handler) {
            return Err(format!(
                "method {method_name}: exception handler offset {handler} is not an instruction boundary"
            ));
        }
    }

    for attr in &code.attributes {
        if let Some(AttributeInfoVariant::StackMapTable(table)) = &attr.info_parsed {
            for (offset, _) in crate::code_attribute::stackmap::absolute_offsets(table) {
                if !boundaries.contains(&offset) {
                    return Err(format!(
                        "method {method_name}: stack map frame at {offset} is not an instruction boundary"
                    ));
                }
            }
        }
    }
    Ok(())
}
