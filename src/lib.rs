//! Parsing, transformation, and serialization of [Java class files](https://docs.oracle.com/javase/specs/jvms/se8/html/jvms-4.html),
//! plus annotation-driven member stripping on top.
//!
//! The pipeline is strictly bytes → [`ClassFile`] → edits → bytes. A class
//! is read and validated by [`parse_class_bytes`] (or the file/reader
//! variants), mutated in place through the model API, and consumed by
//! [`ClassFile::into_bytes`], which recomputes every count, compacts the
//! constant pool, and verifies all references before emitting bytes.
//! Because the writer takes the model by value, a written class cannot be
//! transformed further without a fresh parse.
//!
//! ```no_run
//! let mut class_file = classfile_stripper::parse_class("./Example").unwrap();
//! class_file.remove_method("debugDump", "()V");
//! let bytes = class_file.into_bytes().unwrap();
//! std::fs::write("Example.class", bytes).unwrap();
//! ```
//!
//! The `strip` module recovers the library's transformation pass: removing
//! fields, methods, interfaces, or whole classes marked with configured
//! annotations for a different build environment, including transitive
//! lambda bodies. The `jar_strip` module applies it across a JAR.

use std::fs::File;
use std::io::{prelude::*, BufReader, Cursor};
use std::path::Path;

#[macro_use]
extern crate bitflags;

pub mod attribute_info;
pub mod constant_info;
pub mod field_info;
pub mod method_info;

pub mod code_attribute;

pub mod jar_strip;
pub mod jar_utils;
pub mod strip;
pub mod types;

pub use types::*;

use binrw::BinRead;

use crate::constant_info::ConstantInfo;

/// Second-stage parsing: resolve attribute payloads (and nested instruction
/// streams) against the constant pool after the outer structure is read.
pub trait InterpretInner {
    fn interpret_inner(&mut self, const_pool: &[ConstantInfo]) -> Result<(), ClassError>;
}

/// Parse a class file given a path without the `.class` extension.
///
/// ```no_run
/// match classfile_stripper::parse_class("./compiled-classes/BasicClass") {
///     Ok(class_file) => {
///         println!("version {},{}", class_file.major_version, class_file.minor_version);
///     }
///     Err(e) => panic!("Failed to parse: {e}"),
/// }
/// ```
pub fn parse_class(class_name: &str) -> Result<ClassFile, ClassError> {
    let class_file_name = format!("{class_name}.class");
    let file = File::open(Path::new(&class_file_name))?;
    let mut reader = BufReader::new(file);
    parse_class_from_reader(&mut reader)
}

/// Parse a class file from any `std::io::Read` source.
pub fn parse_class_from_reader<T: Read>(reader: &mut T) -> Result<ClassFile, ClassError> {
    let mut class_bytes = Vec::new();
    reader.read_to_end(&mut class_bytes)?;
    parse_class_bytes(&class_bytes)
}

/// Parse and validate a class file: magic and version gates, structural
/// parse, constant pool reference check, attribute interpretation, and code
/// stream integrity. The returned model is fully interpreted.
pub fn parse_class_bytes(bytes: &[u8]) -> Result<ClassFile, ClassError> {
    // Gate on magic and version up front so a newer format is reported as
    // unsupported rather than as an arbitrary parse failure further in.
    if bytes.len() < 8 {
        return Err(ClassError::Malformed {
            message: format!("{} bytes is too short for a class file", bytes.len()),
        });
    }
    if bytes[0..4] != [0xCA, 0xFE, 0xBA, 0xBE] {
        return Err(ClassError::Malformed {
            message: "bad magic number".into(),
        });
    }
    let minor = u16::from_be_bytes([bytes[4], bytes[5]]);
    let major = u16::from_be_bytes([bytes[6], bytes[7]]);
    if !(MIN_MAJOR_VERSION..=MAX_MAJOR_VERSION).contains(&major) {
        return Err(ClassError::UnsupportedVersion { major, minor });
    }

    let mut cursor = Cursor::new(bytes);
    let mut class_file = ClassFile::read(&mut cursor)?;
    if (cursor.position() as usize) < bytes.len() {
        log::warn!(
            "not all bytes were consumed when parsing the class file, {} bytes remaining",
            bytes.len() - cursor.position() as usize
        );
    }

    class_file
        .check_pool()
        .map_err(|message| ClassError::Malformed { message })?;
    class_file.interpret()?;
    class_file
        .check_model()
        .map_err(|message| ClassError::Malformed { message })?;
    Ok(class_file)
}
