use std::collections::{HashMap, HashSet};

use crate::attribute_info::{
    AttributeInfo, AttributeInfoVariant, BootstrapMethodsAttribute, ElementValue,
    RuntimeAnnotation, TargetInfo, SUPERTYPE_INDEX_SUPERCLASS, TARGET_CLASS_EXTENDS,
};
use crate::code_attribute::Instruction;
use crate::constant_info::{get_utf8, resolve_ref, ConstantInfo};
use crate::method_info::MethodInfo;
use crate::strip::data::{Member, StripData};
use crate::strip::{AnnotationSpec, StripError, StripResult};
use crate::types::ClassFile;

const LAMBDA_CLASS_NAME: &str = "java/lang/invoke/LambdaMetafactory";
const LAMBDA_METHOD_DESCRIPTOR: &str = "(Ljava/lang/invoke/MethodHandles$Lookup;\
Ljava/lang/String;\
Ljava/lang/invoke/MethodType;\
Ljava/lang/invoke/MethodType;\
Ljava/lang/invoke/MethodHandle;\
Ljava/lang/invoke/MethodType;)\
Ljava/lang/invoke/CallSite;";

/// invokestatic reference kind for a MethodHandle constant.
const H_INVOKESTATIC: u8 = 6;

/// Configured scan pass. One stripper, built for a target environment,
/// serves any number of classes.
#[derive(Clone, Debug)]
pub struct ClassStripper {
    /// Annotation descriptor → its registration. Only annotations for
    /// *other* environments are present: those mark code to remove.
    annotations: HashMap<String, AnnotationSpec>,
}

impl ClassStripper {
    pub fn builder() -> ClassStripperBuilder {
        ClassStripperBuilder {
            annotations: Vec::new(),
            default_strip_lambdas: true,
        }
    }

    /// Determine everything that would be stripped from `class_file`.
    pub fn scan(&self, class_file: &ClassFile) -> StripResult<StripData> {
        let pool = &class_file.const_pool;
        let this_name = class_file.this_class_name().unwrap_or("<unknown>");

        let mut entire_class = false;
        let mut strip_fields = HashSet::new();
        let mut strip_methods = HashSet::new();
        let mut strip_interfaces = HashSet::new();

        // Class-level annotations take the whole class with them.
        if self
            .matched_annotation(pool, &class_file.attributes)
            .is_some()
        {
            log::debug!("{this_name}: annotated for another environment, stripping entirely");
            entire_class = true;
        }

        // A strip annotation on the extends/implements clause removes that
        // interface; the superclass cannot be removed.
        for annotation in type_annotations(pool, &class_file.attributes) {
            if !self.annotations.contains_key(annotation.descriptor) {
                continue;
            }
            if let TargetInfo::SuperType { supertype_index } = annotation.target {
                if supertype_index == SUPERTYPE_INDEX_SUPERCLASS {
                    return Err(StripError::SuperclassStrip {
                        class: this_name.to_string(),
                        super_name: class_file
                            .super_class_name()
                            .unwrap_or("<unknown>")
                            .to_string(),
                    });
                }
                let interface = class_file
                    .interfaces
                    .get(supertype_index as usize)
                    .and_then(|&index| class_file.get_class_name(index));
                if let Some(interface) = interface {
                    strip_interfaces.insert(interface.to_string());
                }
            }
        }

        for field in &class_file.fields {
            if self.matched_annotation(pool, &field.attributes).is_some() {
                if let Some(member) = member_of(pool, field.name_index, field.descriptor_index) {
                    strip_fields.insert(member);
                }
            }
        }

        // Methods; matched ones may also volunteer their lambda bodies.
        let mut lambda_roots: HashSet<Member> = HashSet::new();
        for method in &class_file.methods {
            let Some((spec, annotation)) = self.matched_annotation(pool, &method.attributes)
            else {
                continue;
            };
            let Some(member) = member_of(pool, method.name_index, method.descriptor_index) else {
                continue;
            };
            if strip_lambdas_for(pool, spec, annotation) {
                lambda_roots.insert(member.clone());
            }
            strip_methods.insert(member);
        }

        // Close over lambda implementation methods: a body referenced only
        // from stripped methods goes too; one shared with surviving code
        // stays.
        let mut to_check = lambda_roots;
        while !to_check.is_empty() {
            let mut candidates: HashSet<Member> = HashSet::new();
            let mut protected: HashSet<Member> = HashSet::new();
            for method in &class_file.methods {
                let Some(member) = member_of(pool, method.name_index, method.descriptor_index)
                else {
                    continue;
                };
                let targets = lambda_targets(class_file, this_name, method);
                if to_check.contains(&member) {
                    candidates.extend(targets);
                } else if !strip_methods.contains(&member) {
                    protected.extend(targets);
                }
            }
            let fresh: HashSet<Member> = candidates
                .into_iter()
                .filter(|m| !protected.contains(m) && !strip_methods.contains(m))
                .collect();
            for member in &fresh {
                log::debug!("{this_name}: stripping lambda body {member}");
            }
            strip_methods.extend(fresh.iter().cloned());
            to_check = fresh;
        }

        Ok(StripData::new(
            entire_class,
            strip_fields,
            strip_methods,
            strip_interfaces,
            self.annotations.keys().cloned().collect(),
        ))
    }

    /// First annotation (visible or invisible) on `attributes` that is
    /// registered for removal.
    fn matched_annotation<'a>(
        &'a self,
        pool: &[ConstantInfo],
        attributes: &'a [AttributeInfo],
    ) -> Option<(&'a AnnotationSpec, &'a RuntimeAnnotation)> {
        for attr in attributes {
            let annotations = match &attr.info_parsed {
                Some(
                    AttributeInfoVariant::RuntimeVisibleAnnotations(table)
                    | AttributeInfoVariant::RuntimeInvisibleAnnotations(table),
                ) => &table.annotations,
                _ => continue,
            };
            for annotation in annotations {
                let Some(descriptor) = get_utf8(pool, annotation.type_index) else {
                    continue;
                };
                if let Some(spec) = self.annotations.get(descriptor) {
                    return Some((spec, annotation));
                }
            }
        }
        None
    }
}

/// Factory for configured strippers; hold onto one to build per-environment
/// passes from the same registrations.
#[derive(Clone, Debug)]
pub struct ClassStripperBuilder {
    annotations: Vec<AnnotationSpec>,
    default_strip_lambdas: bool,
}

impl ClassStripperBuilder {
    /// Register `descriptor` (e.g. `"Lexample/ClientOnly;"`) as marking
    /// code that only belongs to `environment`.
    pub fn annotation(self, environment: &str, descriptor: &str) -> Self {
        self.register(environment, descriptor, None)
    }

    /// Like [`Self::annotation`], with a boolean annotation element that
    /// controls lambda stripping per use site.
    pub fn annotation_with_lambda_key(
        self,
        environment: &str,
        descriptor: &str,
        strip_lambdas_key: &str,
    ) -> Self {
        self.register(environment, descriptor, Some(strip_lambdas_key.to_string()))
    }

    fn register(
        mut self,
        environment: &str,
        descriptor: &str,
        strip_lambdas_key: Option<String>,
    ) -> Self {
        self.annotations.push(AnnotationSpec {
            environment: environment.to_string(),
            descriptor: descriptor.to_string(),
            strip_lambdas_key,
            default_strip_lambdas: self.default_strip_lambdas,
        });
        self
    }

    /// Whether annotations registered from here on strip lambda bodies when
    /// no per-site element says otherwise.
    pub fn default_strip_lambdas(mut self, default_strip_lambdas: bool) -> Self {
        self.default_strip_lambdas = default_strip_lambdas;
        self
    }

    /// Build a stripper for `environment`: annotations registered for any
    /// other environment mark code to remove.
    pub fn build(&self, environment: &str) -> ClassStripper {
        ClassStripper {
            annotations: self
                .annotations
                .iter()
                .filter(|spec| spec.environment != environment)
                .map(|spec| (spec.descriptor.clone(), spec.clone()))
                .collect(),
        }
    }
}

fn member_of(pool: &[ConstantInfo], name_index: u16, descriptor_index: u16) -> Option<Member> {
    Some(Member::new(
        get_utf8(pool, name_index)?,
        get_utf8(pool, descriptor_index)?,
    ))
}

struct ClassTypeAnnotation<'a> {
    descriptor: &'a str,
    target: TargetInfo,
}

fn type_annotations<'a>(
    pool: &'a [ConstantInfo],
    attributes: &'a [AttributeInfo],
) -> Vec<ClassTypeAnnotation<'a>> {
    let mut result = Vec::new();
    for attr in attributes {
        let table = match &attr.info_parsed {
            Some(
                AttributeInfoVariant::RuntimeVisibleTypeAnnotations(table)
                | AttributeInfoVariant::RuntimeInvisibleTypeAnnotations(table),
            ) => table,
            _ => continue,
        };
        for annotation in &table.type_annotations {
            if annotation.target_type != TARGET_CLASS_EXTENDS {
                continue;
            }
            if let Some(descriptor) = get_utf8(pool, annotation.type_index) {
                result.push(ClassTypeAnnotation {
                    descriptor,
                    target: annotation.target_info.clone(),
                });
            }
        }
    }
    result
}

/// Whether this method's matched annotation asks for lambda stripping:
/// the registered boolean element decides when present, the registration
/// default otherwise.
fn strip_lambdas_for(
    pool: &[ConstantInfo],
    spec: &AnnotationSpec,
    annotation: &RuntimeAnnotation,
) -> bool {
    let Some(key) = &spec.strip_lambdas_key else {
        return spec.default_strip_lambdas;
    };
    for pair in &annotation.element_value_pairs {
        if get_utf8(pool, pair.element_name_index) != Some(key.as_str()) {
            continue;
        }
        if let ElementValue::ConstValueIndex { tag: 'Z', value } = pair.value {
            let entry = (value as usize)
                .checked_sub(1)
                .and_then(|i| pool.get(i));
            if let Some(ConstantInfo::Integer(i)) = entry {
                return i.value != 0;
            }
        }
    }
    spec.default_strip_lambdas
}

fn bootstrap_methods(class_file: &ClassFile) -> Option<&BootstrapMethodsAttribute> {
    class_file
        .attributes
        .iter()
        .find_map(|a| match &a.info_parsed {
            Some(AttributeInfoVariant::BootstrapMethods(b)) => Some(b),
            _ => None,
        })
}

/// Lambda implementation methods of `this_name` that `method` instantiates:
/// every `invokedynamic` whose bootstrap is
/// `LambdaMetafactory.metafactory` and whose implementation handle points
/// back into this class.
fn lambda_targets(class_file: &ClassFile, this_name: &str, method: &MethodInfo) -> Vec<Member> {
    let Some(code) = method.code() else {
        return Vec::new();
    };
    let Some(bootstrap) = bootstrap_methods(class_file) else {
        return Vec::new();
    };
    let pool = &class_file.const_pool;

    let mut targets = Vec::new();
    for instr in &code.code {
        let Instruction::Invokedynamic { index, .. } = instr else {
            continue;
        };
        let Some(ConstantInfo::InvokeDynamic(indy)) = class_file.constant(*index) else {
            continue;
        };
        let Some(bsm) = bootstrap
            .bootstrap_methods
            .get(indy.bootstrap_method_attr_index as usize)
        else {
            continue;
        };
        if bsm.bootstrap_arguments.len() != 3 {
            continue;
        }
        let Some(ConstantInfo::MethodHandle(handle)) =
            class_file.constant(bsm.bootstrap_method_ref)
        else {
            continue;
        };
        if handle.reference_kind != H_INVOKESTATIC {
            continue;
        }
        match resolve_ref(pool, handle.reference_index) {
            Some((owner, name, descriptor))
                if owner == LAMBDA_CLASS_NAME
                    && name == "metafactory"
                    && descriptor == LAMBDA_METHOD_DESCRIPTOR => {}
            _ => continue,
        }
        let Some(ConstantInfo::MethodHandle(impl_handle)) =
            class_file.constant(bsm.bootstrap_arguments[1])
        else {
            continue;
        };
        if let Some((owner, name, descriptor)) = resolve_ref(pool, impl_handle.reference_index) {
            if owner == this_name {
                targets.push(Member::new(name, descriptor));
            }
        }
    }
    targets
}
