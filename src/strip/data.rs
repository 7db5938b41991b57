use std::collections::HashSet;
use std::fmt;

use crate::attribute_info::{AttributeInfo, AttributeInfoVariant};
use crate::code_attribute::Instruction;
use crate::constant_info::{get_utf8, resolve_ref, ConstantInfo};
use crate::strip::{StripError, StripResult};
use crate::types::{ClassError, ClassFile};

/// A field or method, identified by name and descriptor. Descriptors
/// starting with `(` are methods.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Member {
    pub name: String,
    pub descriptor: String,
}

impl Member {
    pub fn new(name: impl Into<String>, descriptor: impl Into<String>) -> Member {
        Member {
            name: name.into(),
            descriptor: descriptor.into(),
        }
    }

    pub fn is_method(&self) -> bool {
        self.descriptor.starts_with('(')
    }
}

impl fmt::Display for Member {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_method() {
            write!(f, "{}{}", self.name, self.descriptor)
        } else {
            write!(f, "{}:{}", self.name, self.descriptor)
        }
    }
}

/// The outcome of a scan: everything a strip pass would remove.
#[derive(Clone, Debug)]
pub struct StripData {
    entire_class: bool,
    fields: HashSet<Member>,
    methods: HashSet<Member>,
    interfaces: HashSet<String>,
    /// Descriptors of the annotations that drove the scan; matching type
    /// annotations are dropped during apply.
    annotations: HashSet<String>,
}

impl StripData {
    pub(crate) fn new(
        entire_class: bool,
        fields: HashSet<Member>,
        methods: HashSet<Member>,
        interfaces: HashSet<String>,
        annotations: HashSet<String>,
    ) -> StripData {
        StripData {
            entire_class,
            fields,
            methods,
            interfaces,
            annotations,
        }
    }

    pub fn is_empty(&self) -> bool {
        !self.entire_class
            && self.fields.is_empty()
            && self.methods.is_empty()
            && self.interfaces.is_empty()
    }

    pub fn strip_entire_class(&self) -> bool {
        self.entire_class
    }

    pub fn fields(&self) -> &HashSet<Member> {
        &self.fields
    }

    pub fn methods(&self) -> &HashSet<Member> {
        &self.methods
    }

    pub fn interfaces(&self) -> &HashSet<String> {
        &self.interfaces
    }

    /// Remove everything the scan found from the class model. Pool entries
    /// orphaned here are garbage-collected when the class is written.
    pub fn apply(&self, class_file: &mut ClassFile) -> StripResult<()> {
        let this_name = class_name(class_file)?;

        // Interfaces.
        if !self.interfaces.is_empty() {
            let keep: Vec<u16> = class_file
                .interfaces
                .iter()
                .copied()
                .filter(|&index| match class_file.get_class_name(index) {
                    Some(name) => !self.interfaces.contains(name),
                    None => true,
                })
                .collect();
            if keep.len() != class_file.interfaces.len() {
                log::debug!(
                    "{this_name}: stripping {} interface(s)",
                    class_file.interfaces.len() - keep.len()
                );
                class_file.interfaces = keep;
            }
        }

        // Type annotations naming a strip annotation disappear with the
        // things they annotated.
        {
            let pool = &class_file.const_pool;
            let annotations = &self.annotations;
            retain_type_annotations(&mut class_file.attributes, pool, annotations);
        }

        // Members.
        {
            let pool = &class_file.const_pool;
            let fields = &self.fields;
            class_file
                .fields
                .retain(|f| match member_of(pool, f.name_index, f.descriptor_index) {
                    Some(member) => !fields.contains(&member),
                    None => true,
                });
            let methods = &self.methods;
            class_file
                .methods
                .retain(|m| match member_of(pool, m.name_index, m.descriptor_index) {
                    Some(member) => !methods.contains(&member),
                    None => true,
                });
        }

        // Constructors still initialize stripped fields; neutralize those
        // writes with an equal-length pop sequence so no offset moves.
        if !self.fields.is_empty() {
            let pool = &class_file.const_pool;
            let methods = &mut class_file.methods;
            for method in methods.iter_mut() {
                let name = get_utf8(pool, method.name_index).unwrap_or_default();
                if name != "<init>" && name != "<clinit>" {
                    continue;
                }
                if let Some(code) = method.code_mut() {
                    let mut rewritten = Vec::with_capacity(code.code.len());
                    for instr in code.code.drain(..) {
                        match pop_replacement(pool, &this_name, &self.fields, &instr) {
                            Some(pops) => rewritten.extend(pops),
                            None => rewritten.push(instr),
                        }
                    }
                    code.code = rewritten;
                }
            }
        }

        class_file.sync_counts();
        Ok(())
    }
}

fn class_name(class_file: &ClassFile) -> StripResult<String> {
    class_file
        .this_class_name()
        .map(str::to_string)
        .ok_or_else(|| {
            StripError::Class(ClassError::Malformed {
                message: "this_class does not resolve to a class name".into(),
            })
        })
}

fn member_of(pool: &[ConstantInfo], name_index: u16, descriptor_index: u16) -> Option<Member> {
    Some(Member::new(
        get_utf8(pool, name_index)?,
        get_utf8(pool, descriptor_index)?,
    ))
}

/// For a putfield/putstatic on a stripped field, the same-length pop
/// sequence that discards its operands; `None` leaves the instruction
/// alone.
fn pop_replacement(
    pool: &[ConstantInfo],
    this_name: &str,
    fields: &HashSet<Member>,
    instr: &Instruction,
) -> Option<[Instruction; 3]> {
    let (index, is_putfield) = match instr {
        Instruction::Putfield(index) => (*index, true),
        Instruction::Putstatic(index) => (*index, false),
        _ => return None,
    };
    let (owner, name, descriptor) = resolve_ref(pool, index)?;
    if owner != this_name || !fields.contains(&Member::new(name, descriptor)) {
        return None;
    }
    let value_pop = if descriptor == "J" || descriptor == "D" {
        Instruction::Pop2
    } else {
        Instruction::Pop
    };
    let receiver = if is_putfield {
        Instruction::Pop
    } else {
        Instruction::Nop
    };
    Some([value_pop, receiver, Instruction::Nop])
}

/// Drop type annotations whose descriptor is one of the strip annotations;
/// annotation attributes emptied out this way are removed entirely.
fn retain_type_annotations(
    attributes: &mut Vec<AttributeInfo>,
    pool: &[ConstantInfo],
    strip_descriptors: &HashSet<String>,
) {
    for attr in attributes.iter_mut() {
        if let Some(
            AttributeInfoVariant::RuntimeVisibleTypeAnnotations(table)
            | AttributeInfoVariant::RuntimeInvisibleTypeAnnotations(table),
        ) = &mut attr.info_parsed
        {
            table.type_annotations.retain(|ta| {
                match get_utf8(pool, ta.type_index) {
                    Some(descriptor) => !strip_descriptors.contains(descriptor),
                    None => true,
                }
            });
        }
    }
    attributes.retain(|attr| {
        !matches!(
            &attr.info_parsed,
            Some(
                AttributeInfoVariant::RuntimeVisibleTypeAnnotations(table)
                    | AttributeInfoVariant::RuntimeInvisibleTypeAnnotations(table),
            ) if table.type_annotations.is_empty()
        )
    });
}
