use std::collections::HashMap;

use crate::attribute_info::{StackMapFrame, StackMapFrameInner, StackMapTableAttribute};
use crate::types::ClassError;

/// The offset delta a frame encodes, whether in its type byte (compact
/// forms) or in an explicit field.
fn frame_delta(frame: &StackMapFrame) -> u16 {
    match &frame.inner {
        StackMapFrameInner::SameFrame {} => frame.frame_type as u16,
        StackMapFrameInner::SameLocals1StackItemFrame { .. } => (frame.frame_type - 64) as u16,
        StackMapFrameInner::SameLocals1StackItemFrameExtended { offset_delta, .. }
        | StackMapFrameInner::ChopFrame { offset_delta }
        | StackMapFrameInner::SameFrameExtended { offset_delta }
        | StackMapFrameInner::AppendFrame { offset_delta, .. }
        | StackMapFrameInner::FullFrame { offset_delta, .. } => *offset_delta,
    }
}

/// Decode the frame chain into absolute bytecode offsets. The first frame's
/// offset is its delta; each subsequent frame sits at `prev + delta + 1`.
pub fn absolute_offsets(table: &StackMapTableAttribute) -> Vec<(u32, StackMapFrame)> {
    let mut result = Vec::with_capacity(table.entries.len());
    let mut prev: i64 = -1;
    for frame in &table.entries {
        let offset = (prev + frame_delta(frame) as i64 + 1) as u32;
        prev = offset as i64;
        result.push((offset, frame.clone()));
    }
    result
}

/// Re-encode a frame at `delta`, choosing the compact form where the delta
/// allows it. Chop/Append/Full frames keep their kind (the type byte also
/// carries the chop/append count), only the delta field changes.
fn encode_at_delta(frame: StackMapFrame, delta: u16) -> StackMapFrame {
    match frame.inner {
        StackMapFrameInner::SameFrame {} | StackMapFrameInner::SameFrameExtended { .. } => {
            if delta <= 63 {
                StackMapFrame {
                    frame_type: delta as u8,
                    inner: StackMapFrameInner::SameFrame {},
                }
            } else {
                StackMapFrame {
                    frame_type: 251,
                    inner: StackMapFrameInner::SameFrameExtended {
                        offset_delta: delta,
                    },
                }
            }
        }
        StackMapFrameInner::SameLocals1StackItemFrame { stack }
        | StackMapFrameInner::SameLocals1StackItemFrameExtended { stack, .. } => {
            if delta <= 63 {
                StackMapFrame {
                    frame_type: 64 + delta as u8,
                    inner: StackMapFrameInner::SameLocals1StackItemFrame { stack },
                }
            } else {
                StackMapFrame {
                    frame_type: 247,
                    inner: StackMapFrameInner::SameLocals1StackItemFrameExtended {
                        offset_delta: delta,
                        stack,
                    },
                }
            }
        }
        StackMapFrameInner::ChopFrame { .. } => StackMapFrame {
            frame_type: frame.frame_type,
            inner: StackMapFrameInner::ChopFrame {
                offset_delta: delta,
            },
        },
        StackMapFrameInner::AppendFrame { locals, .. } => StackMapFrame {
            frame_type: 251 + locals.len() as u8,
            inner: StackMapFrameInner::AppendFrame {
                offset_delta: delta,
                locals,
            },
        },
        StackMapFrameInner::FullFrame {
            number_of_locals,
            locals,
            number_of_stack_items,
            stack,
            ..
        } => StackMapFrame {
            frame_type: 255,
            inner: StackMapFrameInner::FullFrame {
                offset_delta: delta,
                number_of_locals,
                locals,
                number_of_stack_items,
                stack,
            },
        },
    }
}

/// Rewrite every frame offset through `offset_map` (old bytecode offset →
/// new bytecode offset). Frames whose offset no longer exists are dropped:
/// their anchor instruction is gone, so there is no branch target left to
/// describe.
pub fn remap_stack_map_table(
    table: &mut StackMapTableAttribute,
    offset_map: &HashMap<u32, u32>,
) -> Result<(), ClassError> {
    let mut mapped: Vec<(u32, StackMapFrame)> = Vec::with_capacity(table.entries.len());
    for (offset, frame) in absolute_offsets(table) {
        match offset_map.get(&offset) {
            Some(&new_offset) => mapped.push((new_offset, frame)),
            None => {
                log::debug!("dropping stack map frame at removed offset {offset}");
            }
        }
    }
    mapped.sort_by_key(|&(offset, _)| offset);

    let mut entries = Vec::with_capacity(mapped.len());
    let mut prev: i64 = -1;
    for (offset, frame) in mapped {
        let delta = offset as i64 - prev - 1;
        if delta < 0 {
            return Err(ClassError::Malformed {
                message: format!("two stack map frames map to bytecode offset {offset}"),
            });
        }
        entries.push(encode_at_delta(frame, delta as u16));
        prev = offset as i64;
    }

    table.entries = entries;
    table.number_of_entries = table.entries.len() as u16;
    Ok(())
}
