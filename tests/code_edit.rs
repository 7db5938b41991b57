mod common;

use classfile_stripper::attribute_info::ExceptionEntry;
use classfile_stripper::code_attribute::{CodeEditor, Instruction, InstructionKind};
use classfile_stripper::method_info::MethodAccessFlags;
use classfile_stripper::{ClassError, ClassFile};

use common::{code_attr, reparse};

fn branchy_code() -> Vec<Instruction> {
    vec![
        Instruction::Iload0,  // 0
        Instruction::Ifeq(5), // 1 -> 6 (Iconst0)
        Instruction::Iconst1, // 4
        Instruction::Ireturn, // 5
        Instruction::Iconst0, // 6
        Instruction::Ireturn, // 7
    ]
}

#[test]
fn insert_shifts_branch_offsets() {
    let mut editor = CodeEditor::from_code(&branchy_code()).unwrap();
    editor.insert(2, Instruction::Nop);
    let result = editor.finish().unwrap();

    // 0 iload_0, 1 ifeq, 4 nop, 5 iconst_1, 6 ireturn, 7 iconst_0, 8 ireturn
    assert_eq!(result.code[1], Instruction::Ifeq(6));
    assert_eq!(result.offset_map[&6], 7);
    assert_eq!(result.new_len, 9);
}

#[test]
fn remove_keeps_remaining_targets_valid() {
    let mut editor = CodeEditor::from_code(&branchy_code()).unwrap();
    // Drop the iconst_1 on the fall-through path.
    let removed = editor.remove(2);
    assert_eq!(removed, Instruction::Iconst1);
    let result = editor.finish().unwrap();

    // 0 iload_0, 1 ifeq, 4 ireturn, 5 iconst_0, 6 ireturn
    assert_eq!(result.code[1], Instruction::Ifeq(4));
    assert_eq!(result.code.len(), 5);
}

#[test]
fn removing_branch_target_is_unresolved() {
    let mut editor = CodeEditor::from_code(&branchy_code()).unwrap();
    // The ifeq targets iconst_0 at position 4.
    editor.remove(4);
    match editor.finish() {
        Err(ClassError::UnresolvedReference { message }) => {
            assert!(message.contains("removed"), "unexpected message: {message}");
        }
        other => panic!("expected UnresolvedReference, got {:?}", other.is_ok()),
    }
}

#[test]
fn inserted_branch_requires_retarget() {
    let mut editor = CodeEditor::from_code(&branchy_code()).unwrap();
    editor.insert(0, Instruction::Goto(0));
    match editor.finish() {
        Err(ClassError::UnresolvedReference { .. }) => {}
        other => panic!("expected UnresolvedReference, got {:?}", other.is_ok()),
    }

    let mut editor = CodeEditor::from_code(&branchy_code()).unwrap();
    editor.insert(0, Instruction::Goto(0));
    editor.retarget(0, &[1]).unwrap();
    let result = editor.finish().unwrap();
    // goto at 0 jumps over itself to the old iload_0 at 3.
    assert_eq!(result.code[0], Instruction::Goto(3));
}

#[test]
fn replace_keeps_targets_with_same_arity() {
    let mut editor = CodeEditor::from_code(&branchy_code()).unwrap();
    let old = editor.replace(1, Instruction::Ifne(0));
    assert_eq!(old, Instruction::Ifeq(5));
    let result = editor.finish().unwrap();
    assert_eq!(result.code[1], Instruction::Ifne(5));
}

#[test]
fn apply_remaps_exception_table() {
    let mut class_file = ClassFile::new("example/Handlers", "java/lang/Object");
    let index = class_file.add_method(
        MethodAccessFlags::PUBLIC | MethodAccessFlags::STATIC,
        "guarded",
        "()V",
    );
    let throwable = class_file.get_or_add_class("java/lang/Throwable");
    let mut code = code_attr(
        1,
        1,
        vec![
            Instruction::Nop,     // 0
            Instruction::Iconst0, // 1
            Instruction::Pop,     // 2
            Instruction::Return,  // 3
        ],
    );
    code.exception_table.push(ExceptionEntry {
        start_pc: 0,
        end_pc: 3,
        handler_pc: 3,
        catch_type: throwable,
    });
    code.exception_table_length = 1;
    class_file.attach_code(index, code).unwrap();

    {
        let code = class_file.methods[index].code_mut().unwrap();
        let mut editor = CodeEditor::from_code(&code.code).unwrap();
        editor.remove(1);
        editor.remove(1); // iconst_0 and pop
        editor.apply(code).unwrap();

        assert_eq!(code.code, vec![Instruction::Nop, Instruction::Return]);
        assert_eq!(code.exception_table.len(), 1);
        let entry = &code.exception_table[0];
        assert_eq!((entry.start_pc, entry.end_pc, entry.handler_pc), (0, 1, 1));
    }

    // The edited class still passes the full write/read pipeline.
    let parsed = reparse(class_file);
    assert_eq!(
        parsed.methods[parsed.find_method("guarded", "()V").unwrap()]
            .code()
            .unwrap()
            .exception_table
            .len(),
        1
    );
}

#[test]
fn removing_handler_is_unresolved() {
    let mut code = code_attr(
        1,
        1,
        vec![
            Instruction::Nop,    // 0
            Instruction::Return, // 1
        ],
    );
    code.exception_table.push(ExceptionEntry {
        start_pc: 0,
        end_pc: 1,
        handler_pc: 1,
        catch_type: 0,
    });
    code.exception_table_length = 1;

    let mut editor = CodeEditor::from_code(&code.code).unwrap();
    editor.remove(1);
    editor.push(Instruction::Return);
    match editor.apply(&mut code) {
        Err(ClassError::UnresolvedReference { message }) => {
            assert!(message.contains("handler"), "unexpected message: {message}");
        }
        other => panic!("expected UnresolvedReference, got {:?}", other.is_ok()),
    }
}

#[test]
fn instruction_kinds_classify_traversal() {
    let kinds: Vec<InstructionKind> = branchy_code().iter().map(|i| i.kind()).collect();
    assert_eq!(
        kinds,
        vec![
            InstructionKind::LocalVariable,
            InstructionKind::ControlFlow,
            InstructionKind::ConstantLoad,
            InstructionKind::ControlFlow,
            InstructionKind::ConstantLoad,
            InstructionKind::ControlFlow,
        ]
    );
}

#[test]
fn malformed_branch_target_is_rejected() {
    // ifeq into the middle of the following 3-byte instruction.
    let code = vec![
        Instruction::Ifeq(2),
        Instruction::Sipush(7),
        Instruction::Return,
    ];
    match CodeEditor::from_code(&code) {
        Err(ClassError::Malformed { .. }) => {}
        other => panic!("expected Malformed, got {:?}", other.is_ok()),
    }
}
