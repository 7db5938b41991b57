use std::collections::HashMap;

use crate::attribute_info::{AttributeInfoVariant, CodeAttribute};
use crate::code_attribute::{
    compute_addresses, instruction_byte_size, stack_calc, stackmap, Instruction,
};
use crate::types::ClassError;

/// Label-safe instruction stream editor.
///
/// Instructions live in an arena; program order is a separate list of arena
/// ids, and decoded branch targets refer to arena ids rather than byte
/// offsets. Inserting or removing instructions therefore never invalidates a
/// target — a branch whose target instruction was removed is only detected
/// (and rejected) when the stream is re-encoded.
pub struct CodeEditor {
    slots: Vec<Slot>,
    order: Vec<usize>,
    old_len: u32,
}

struct Slot {
    instruction: Instruction,
    /// Arena ids of branch targets, in operand order (switches: default
    /// first). Empty for non-branching instructions.
    targets: Vec<usize>,
    orig_offset: Option<u32>,
}

/// The outcome of re-encoding an edited stream.
pub struct EditResult {
    pub code: Vec<Instruction>,
    /// Original bytecode offset → new bytecode offset, for every surviving
    /// original instruction.
    pub offset_map: HashMap<u32, u32>,
    pub new_len: u32,
}

impl CodeEditor {
    /// Decode a code array, lifting branch offsets to arena ids.
    pub fn from_code(code: &[Instruction]) -> Result<CodeEditor, ClassError> {
        let addresses = compute_addresses(code);
        let index_of: HashMap<i64, usize> = addresses
            .iter()
            .enumerate()
            .map(|(i, &(address, _))| (address as i64, i))
            .collect();

        let mut slots = Vec::with_capacity(code.len());
        for (i, &(address, instr)) in addresses.iter().enumerate() {
            let mut targets = Vec::new();
            for rel in instr.branch_rel_offsets() {
                let absolute = address as i64 + rel;
                let target = index_of.get(&absolute).copied().ok_or_else(|| {
                    ClassError::Malformed {
                        message: format!(
                            "branch at offset {address} targets {absolute}, which is not an instruction boundary"
                        ),
                    }
                })?;
                targets.push(target);
            }
            slots.push(Slot {
                instruction: code[i].clone(),
                targets,
                orig_offset: Some(address),
            });
        }
        let order = (0..slots.len()).collect();
        Ok(CodeEditor {
            slots,
            order,
            old_len: super::encoded_code_len(code),
        })
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn instruction(&self, pos: usize) -> &Instruction {
        &self.slots[self.order[pos]].instruction
    }

    pub fn instructions(&self) -> impl Iterator<Item = &Instruction> {
        self.order.iter().map(|&id| &self.slots[id].instruction)
    }

    /// Insert before position `pos`. A branching instruction must be given
    /// targets with `retarget` before the stream is re-encoded.
    pub fn insert(&mut self, pos: usize, instruction: Instruction) {
        let id = self.slots.len();
        self.slots.push(Slot {
            instruction,
            targets: Vec::new(),
            orig_offset: None,
        });
        self.order.insert(pos, id);
    }

    pub fn push(&mut self, instruction: Instruction) {
        let at_end = self.len();
        self.insert(at_end, instruction);
    }

    /// Remove the instruction at `pos`. Branches that target it will fail
    /// re-encoding unless they are removed or retargeted as well.
    pub fn remove(&mut self, pos: usize) -> Instruction {
        let id = self.order.remove(pos);
        self.slots[id].instruction.clone()
    }

    /// Replace the instruction at `pos`. Existing targets survive when the
    /// replacement has the same branch arity, otherwise they are cleared.
    pub fn replace(&mut self, pos: usize, instruction: Instruction) -> Instruction {
        let id = self.order[pos];
        let arity = instruction.branch_rel_offsets().len();
        if self.slots[id].targets.len() != arity {
            self.slots[id].targets = Vec::new();
        }
        std::mem::replace(&mut self.slots[id].instruction, instruction)
    }

    /// Point the branch at `pos` at the instructions currently at the given
    /// positions (operand order; switches: default first).
    pub fn retarget(&mut self, pos: usize, target_positions: &[usize]) -> Result<(), ClassError> {
        let id = self.order[pos];
        let arity = self.slots[id].instruction.branch_rel_offsets().len();
        if target_positions.len() != arity {
            return Err(ClassError::UnresolvedReference {
                message: format!(
                    "instruction at position {pos} takes {arity} branch targets, got {}",
                    target_positions.len()
                ),
            });
        }
        let mut targets = Vec::with_capacity(target_positions.len());
        for &target_pos in target_positions {
            let target_id =
                self.order
                    .get(target_pos)
                    .copied()
                    .ok_or_else(|| ClassError::UnresolvedReference {
                        message: format!("branch target position {target_pos} is out of bounds"),
                    })?;
            targets.push(target_id);
        }
        self.slots[id].targets = targets;
        Ok(())
    }

    fn current_addresses(&self) -> HashMap<usize, u32> {
        let mut addresses = HashMap::with_capacity(self.order.len());
        let mut address = 0u32;
        for &id in &self.order {
            addresses.insert(id, address);
            address += instruction_byte_size(&self.slots[id].instruction, address);
        }
        addresses
    }

    /// Re-encode the stream: resolve every branch back to a relative
    /// offset, widening `goto`/`jsr` where the new offset overflows 16 bits.
    pub fn finish(mut self) -> Result<EditResult, ClassError> {
        // Widening can grow the stream and push other offsets out of range,
        // so iterate until the instruction forms are stable.
        loop {
            let addresses = self.current_addresses();
            let mut to_widen: Vec<usize> = Vec::new();
            for &id in &self.order {
                let slot = &self.slots[id];
                let arity = slot.instruction.branch_rel_offsets().len();
                if arity == 0 {
                    continue;
                }
                if slot.targets.len() != arity {
                    return Err(ClassError::UnresolvedReference {
                        message: "branch instruction has no resolved targets".into(),
                    });
                }
                let from = addresses[&id] as i64;
                for &target in &slot.targets {
                    let target_address = match addresses.get(&target) {
                        Some(&a) => a as i64,
                        None => {
                            return Err(ClassError::UnresolvedReference {
                                message: match self.slots[target].orig_offset {
                                    Some(offset) => format!(
                                        "branch targets the removed instruction at original offset {offset}"
                                    ),
                                    None => "branch targets a removed instruction".into(),
                                },
                            })
                        }
                    };
                    let rel = target_address - from;
                    let narrow = matches!(
                        slot.instruction,
                        Instruction::Goto(_) | Instruction::Jsr(_)
                    );
                    if narrow && !(i16::MIN as i64..=i16::MAX as i64).contains(&rel) {
                        to_widen.push(id);
                        break;
                    }
                }
            }
            if to_widen.is_empty() {
                break;
            }
            for id in to_widen {
                let widened = match &self.slots[id].instruction {
                    Instruction::Goto(_) => Instruction::GotoW(0),
                    Instruction::Jsr(_) => Instruction::JsrW(0),
                    other => other.clone(),
                };
                self.slots[id].instruction = widened;
            }
        }

        let addresses = self.current_addresses();
        let mut code = Vec::with_capacity(self.order.len());
        let mut offset_map = HashMap::new();
        for &id in &self.order {
            let slot = &self.slots[id];
            let address = addresses[&id];
            if let Some(orig) = slot.orig_offset {
                offset_map.insert(orig, address);
            }
            let mut instruction = slot.instruction.clone();
            if !slot.targets.is_empty() {
                let rels: Vec<i64> = slot
                    .targets
                    .iter()
                    .map(|&t| addresses[&t] as i64 - address as i64)
                    .collect();
                instruction
                    .set_branch_rel_offsets(&rels)
                    .map_err(|message| ClassError::Malformed { message })?;
            }
            code.push(instruction);
        }
        let new_len = super::encoded_code_len(&code);
        Ok(EditResult {
            code,
            offset_map,
            new_len,
        })
    }

    /// Re-encode into `attr`: swap in the new instructions, remap the
    /// exception table and StackMapTable, drop debug tables whose offsets
    /// went stale, recompute `max_stack`, and refresh all counts.
    pub fn apply(self, attr: &mut CodeAttribute) -> Result<(), ClassError> {
        let old_len = self.old_len;
        let result = self.finish()?;

        // Sorted surviving original offsets, for range-boundary snapping.
        let mut surviving: Vec<u32> = result.offset_map.keys().copied().collect();
        surviving.sort_unstable();
        let snap = |pc: u32| -> Option<u32> {
            if let Some(&mapped) = result.offset_map.get(&pc) {
                return Some(mapped);
            }
            surviving
                .iter()
                .find(|&&s| s > pc)
                .map(|s| result.offset_map[s])
        };

        let mut exception_table = Vec::with_capacity(attr.exception_table.len());
        for entry in &attr.exception_table {
            let start_pc = match snap(entry.start_pc as u32) {
                Some(pc) => pc,
                None => continue,
            };
            let end_pc = if entry.end_pc as u32 == old_len {
                result.new_len
            } else {
                match snap(entry.end_pc as u32) {
                    Some(pc) => pc,
                    None => result.new_len,
                }
            };
            if start_pc >= end_pc {
                continue;
            }
            let handler_pc = result
                .offset_map
                .get(&(entry.handler_pc as u32))
                .copied()
                .ok_or_else(|| ClassError::UnresolvedReference {
                    message: format!(
                        "exception handler at original offset {} was removed",
                        entry.handler_pc
                    ),
                })?;
            let mut remapped = entry.clone();
            remapped.start_pc = start_pc as u16;
            remapped.end_pc = end_pc as u16;
            remapped.handler_pc = handler_pc as u16;
            exception_table.push(remapped);
        }
        attr.exception_table = exception_table;

        for sub_attr in &mut attr.attributes {
            if let Some(AttributeInfoVariant::StackMapTable(table)) = &mut sub_attr.info_parsed {
                stackmap::remap_stack_map_table(table, &result.offset_map)?;
            }
        }
        // Debug tables reference pre-edit offsets; drop them like a code
        // swap does rather than emit lying line numbers.
        attr.attributes.retain(|a| {
            let stale = matches!(
                a.info_parsed,
                Some(AttributeInfoVariant::LineNumberTable(_))
                    | Some(AttributeInfoVariant::LocalVariableTable(_))
                    | Some(AttributeInfoVariant::LocalVariableTypeTable(_))
            );
            if stale {
                log::debug!("dropping stale debug table after code edit");
            }
            !stale
        });

        attr.code = result.code;
        attr.max_stack = stack_calc::compute_max_stack(&attr.code);
        attr.sync_counts()?;
        Ok(())
    }
}
