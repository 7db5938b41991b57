use std::collections::BTreeMap;
use std::io::{Cursor, Read, Seek, Write};
use std::path::Path;

use zip::write::SimpleFileOptions;
use zip::CompressionMethod;

use crate::types::{ClassError, ClassFile};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum JarError {
    Io(std::io::Error),
    Zip(zip::result::ZipError),
    Class(ClassError),
    EntryNotFound(String),
}

impl std::fmt::Display for JarError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            JarError::Io(e) => write!(f, "I/O error: {e}"),
            JarError::Zip(e) => write!(f, "ZIP error: {e}"),
            JarError::Class(e) => write!(f, "class error: {e}"),
            JarError::EntryNotFound(path) => write!(f, "entry not found: {path}"),
        }
    }
}

impl std::error::Error for JarError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JarError::Io(e) => Some(e),
            JarError::Zip(e) => Some(e),
            JarError::Class(e) => Some(e),
            JarError::EntryNotFound(_) => None,
        }
    }
}

impl From<std::io::Error> for JarError {
    fn from(e: std::io::Error) -> Self {
        JarError::Io(e)
    }
}

impl From<zip::result::ZipError> for JarError {
    fn from(e: zip::result::ZipError) -> Self {
        JarError::Zip(e)
    }
}

impl From<ClassError> for JarError {
    fn from(e: ClassError) -> Self {
        JarError::Class(e)
    }
}

pub type JarResult<T> = Result<T, JarError>;

// ---------------------------------------------------------------------------
// JarFile
// ---------------------------------------------------------------------------

/// In-memory representation of a JAR (ZIP) archive.
///
/// Entries are stored as a `BTreeMap<String, Vec<u8>>` mapping entry paths
/// to raw bytes, so they can be mutated freely between reading and writing.
/// Non-class entries pass through a strip run byte-identical.
#[derive(Clone, Debug, Default)]
pub struct JarFile {
    entries: BTreeMap<String, Vec<u8>>,
}

impl JarFile {
    /// Create an empty JAR.
    pub fn new() -> Self {
        JarFile {
            entries: BTreeMap::new(),
        }
    }

    // -- Reading --

    /// Read a JAR from any reader.
    pub fn read<R: Read + Seek>(reader: R) -> JarResult<Self> {
        let mut archive = zip::ZipArchive::new(reader)?;
        let mut entries = BTreeMap::new();

        for i in 0..archive.len() {
            let mut file = archive.by_index(i)?;
            if file.is_dir() {
                continue;
            }
            let name = file.name().to_string();
            let mut data = Vec::with_capacity(file.size() as usize);
            file.read_to_end(&mut data)?;
            entries.insert(name, data);
        }

        Ok(JarFile { entries })
    }

    /// Read a JAR from a byte slice.
    pub fn from_bytes(bytes: &[u8]) -> JarResult<Self> {
        Self::read(Cursor::new(bytes))
    }

    /// Read a JAR from a file path.
    pub fn open(path: impl AsRef<Path>) -> JarResult<Self> {
        let file = std::fs::File::open(path)?;
        let reader = std::io::BufReader::new(file);
        Self::read(reader)
    }

    // -- Writing --

    /// Write the JAR to any writer using Deflated compression.
    pub fn write<W: Write + Seek>(&self, writer: W) -> JarResult<()> {
        let mut zip_writer = zip::ZipWriter::new(writer);
        let options =
            SimpleFileOptions::default().compression_method(CompressionMethod::Deflated);

        for (name, data) in &self.entries {
            zip_writer.start_file(name.as_str(), options)?;
            zip_writer.write_all(data)?;
        }

        zip_writer.finish()?;
        Ok(())
    }

    /// Serialize the JAR to a byte vector.
    pub fn to_bytes(&self) -> JarResult<Vec<u8>> {
        let mut buf = Cursor::new(Vec::new());
        self.write(&mut buf)?;
        Ok(buf.into_inner())
    }

    /// Write the JAR to a file path.
    pub fn save(&self, path: impl AsRef<Path>) -> JarResult<()> {
        let file = std::fs::File::create(path)?;
        let writer = std::io::BufWriter::new(file);
        self.write(writer)
    }

    // -- Entry access --

    /// Iterate over all entry paths (sorted).
    pub fn entry_names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(|s| s.as_str())
    }

    /// Iterate over `.class` entry paths only.
    pub fn class_names(&self) -> impl Iterator<Item = &str> {
        self.entry_names().filter(|n| n.ends_with(".class"))
    }

    /// Get the raw bytes of an entry.
    pub fn get_entry(&self, path: &str) -> Option<&[u8]> {
        self.entries.get(path).map(|v| v.as_slice())
    }

    /// Insert or replace an entry.
    pub fn set_entry(&mut self, path: impl Into<String>, data: Vec<u8>) {
        self.entries.insert(path.into(), data);
    }

    /// Remove an entry, returning its data if it existed.
    pub fn remove_entry(&mut self, path: &str) -> Option<Vec<u8>> {
        self.entries.remove(path)
    }

    /// Check whether an entry exists.
    pub fn contains_entry(&self, path: &str) -> bool {
        self.entries.contains_key(path)
    }

    // -- ClassFile integration --

    /// Parse a `.class` entry through the full, validating reader pipeline.
    pub fn parse_class(&self, path: &str) -> JarResult<ClassFile> {
        let data = self
            .get_entry(path)
            .ok_or_else(|| JarError::EntryNotFound(path.to_string()))?;
        Ok(crate::parse_class_bytes(data)?)
    }

    /// Serialize a `ClassFile` (consuming it, as writing always does) and
    /// store the bytes as an entry.
    pub fn set_class(&mut self, path: &str, class_file: ClassFile) -> JarResult<()> {
        let bytes = class_file.into_bytes()?;
        self.set_entry(path.to_string(), bytes);
        Ok(())
    }
}
