pub mod edit;
pub mod stack_calc;
pub mod stackmap;
pub mod types;

pub use self::edit::CodeEditor;
pub use self::types::*;

use std::io::Seek;

use binrw::{BinRead, BinResult, BinWrite};

/// Returns the byte size of an instruction in the code array.
/// `address` is the bytecode offset of this instruction (needed for switch
/// alignment).
pub fn instruction_byte_size(instr: &Instruction, address: u32) -> u32 {
    use Instruction::*;
    match instr {
        Bipush(_) | Newarray(_) | Ldc(_) | Ret(_) => 2,
        Aload(_) | Astore(_) | Dload(_) | Dstore(_) | Fload(_) | Fstore(_) | Iload(_)
        | Istore(_) | Lload(_) | Lstore(_) => 2,
        Sipush(_) | LdcW(_) | Ldc2W(_) | Iinc { .. } => 3,
        Ifeq(_) | Ifne(_) | Iflt(_) | Ifge(_) | Ifgt(_) | Ifle(_) | IfIcmpeq(_) | IfIcmpne(_)
        | IfIcmplt(_) | IfIcmpge(_) | IfIcmpgt(_) | IfIcmple(_) | IfAcmpeq(_) | IfAcmpne(_)
        | Ifnull(_) | Ifnonnull(_) | Goto(_) | Jsr(_) => 3,
        Getstatic(_) | Putstatic(_) | Getfield(_) | Putfield(_) | Invokevirtual(_)
        | Invokespecial(_) | Invokestatic(_) | New(_) | Anewarray(_) | Checkcast(_)
        | Instanceof(_) => 3,
        Multianewarray { .. } => 4,
        Invokeinterface { .. } | Invokedynamic { .. } | GotoW(_) | JsrW(_) => 5,
        Tableswitch { low, high, .. } => {
            let padding = (4 - (address + 1) % 4) % 4;
            // opcode + padding + default + low + high + offsets
            1 + padding + 4 + 4 + 4 + 4 * (high - low + 1) as u32
        }
        Lookupswitch { npairs, .. } => {
            let padding = (4 - (address + 1) % 4) % 4;
            // opcode + padding + default + npairs + pairs
            1 + padding + 4 + 4 + 8 * npairs
        }
        // wide forms: two magic bytes + 16-bit index
        AloadWide(_) | AstoreWide(_) | DloadWide(_) | DstoreWide(_) | FloadWide(_)
        | FstoreWide(_) | IloadWide(_) | IstoreWide(_) | LloadWide(_) | LstoreWide(_)
        | RetWide(_) => 4,
        IincWide { .. } => 6,
        _ => 1,
    }
}

/// Compute byte addresses for each instruction in a code array.
pub fn compute_addresses(code: &[Instruction]) -> Vec<(u32, &Instruction)> {
    let mut result = Vec::with_capacity(code.len());
    let mut address = 0u32;
    for instr in code {
        result.push((address, instr));
        address += instruction_byte_size(instr, address);
    }
    result
}

/// Total encoded size of an instruction sequence starting at offset 0.
pub fn encoded_code_len(code: &[Instruction]) -> u32 {
    let mut address = 0u32;
    for instr in code {
        address += instruction_byte_size(instr, address);
    }
    address
}

/// Check that every branch (and switch arm) lands on an instruction
/// boundary inside the method. Returns a description of the first bad
/// reference.
pub fn verify_branch_targets(code: &[Instruction]) -> Result<(), String> {
    let addresses = compute_addresses(code);
    let code_len = encoded_code_len(code) as i64;
    let boundaries: std::collections::HashSet<i64> =
        addresses.iter().map(|&(a, _)| a as i64).collect();
    for (address, instr) in &addresses {
        for rel in instr.branch_rel_offsets() {
            let target = *address as i64 + rel;
            if target < 0 || target >= code_len || !boundaries.contains(&target) {
                return Err(format!(
                    "branch at offset {address} targets {target}, which is not an instruction boundary"
                ));
            }
        }
    }
    Ok(())
}

/// Reads instructions until exactly `code_length` bytes are consumed.
#[binrw::parser(reader, endian)]
pub fn instruction_parser(code_length: u32) -> BinResult<Vec<Instruction>> {
    let start = reader.stream_position()?;
    let mut code = Vec::new();
    loop {
        let pos = reader.stream_position()?;
        let address = (pos - start) as u32;
        if address >= code_length {
            if address > code_length {
                return Err(binrw::Error::AssertFail {
                    pos,
                    message: "instruction overruns the code array".into(),
                });
            }
            break;
        }
        let instr = Instruction::read_options(reader, endian, binrw::args! { address })?;
        code.push(instr);
    }
    Ok(code)
}

/// Writes instructions back to back, threading each one's address through
/// for switch-padding computation.
#[binrw::writer(writer, endian)]
pub fn instruction_writer(code: &Vec<Instruction>) -> BinResult<()> {
    let start = writer.stream_position()?;
    for instr in code {
        let address = (writer.stream_position()? - start) as u32;
        instr.write_options(writer, endian, binrw::args! { address })?;
    }
    Ok(())
}
