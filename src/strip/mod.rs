//! Annotation-driven member stripping.
//!
//! A [`ClassStripper`] is configured with `(environment, annotation)` pairs
//! through its builder; building for one environment keeps every annotation
//! registered for the *other* environments, and anything carrying one of
//! those annotations is stripped. `scan` computes what would be removed
//! (including lambda bodies only reachable from stripped methods); the
//! resulting [`StripData`] applies the edit to the class model.
//!
//! ```no_run
//! use classfile_stripper::strip::{strip_class, ClassStripper, StripOutcome};
//!
//! let stripper = ClassStripper::builder()
//!     .annotation("client", "Lexample/ClientOnly;")
//!     .annotation("server", "Lexample/ServerOnly;")
//!     .build("server");
//!
//! let mut class_file = classfile_stripper::parse_class("./Example").unwrap();
//! match strip_class(&stripper, &mut class_file).unwrap() {
//!     StripOutcome::RemoveClass => { /* drop the whole class */ }
//!     StripOutcome::Stripped => {
//!         std::fs::write("Example.class", class_file.into_bytes().unwrap()).unwrap();
//!     }
//!     StripOutcome::Unchanged => {}
//! }
//! ```

pub mod data;
pub mod scanner;

pub use self::data::{Member, StripData};
pub use self::scanner::{ClassStripper, ClassStripperBuilder};

use std::fmt;

use crate::types::{ClassError, ClassFile};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum StripError {
    /// A strip annotation sits on the `extends` clause; a class cannot lose
    /// its superclass.
    SuperclassStrip { class: String, super_name: String },
    /// The class model is not in a usable state.
    Class(ClassError),
}

impl fmt::Display for StripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripError::SuperclassStrip { class, super_name } => {
                write!(f, "cannot strip superclass {super_name} from class {class}")
            }
            StripError::Class(e) => write!(f, "class error: {e}"),
        }
    }
}

impl std::error::Error for StripError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            StripError::Class(e) => Some(e),
            StripError::SuperclassStrip { .. } => None,
        }
    }
}

impl From<ClassError> for StripError {
    fn from(e: ClassError) -> Self {
        StripError::Class(e)
    }
}

pub type StripResult<T> = Result<T, StripError>;

/// One registered annotation: which environment it marks code for, and how
/// lambda stripping is controlled.
#[derive(Clone, Debug)]
pub(crate) struct AnnotationSpec {
    pub environment: String,
    pub descriptor: String,
    pub strip_lambdas_key: Option<String>,
    pub default_strip_lambdas: bool,
}

/// What `strip_class` did to the class.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum StripOutcome {
    /// Nothing in the class matched.
    Unchanged,
    /// Members were removed; the class should be rewritten.
    Stripped,
    /// The class itself is annotated away; the caller should drop it.
    RemoveClass,
}

/// Scan and, when something matched, apply in one step.
pub fn strip_class(
    stripper: &ClassStripper,
    class_file: &mut ClassFile,
) -> StripResult<StripOutcome> {
    let data = stripper.scan(class_file)?;
    if data.strip_entire_class() {
        return Ok(StripOutcome::RemoveClass);
    }
    if data.is_empty() {
        return Ok(StripOutcome::Unchanged);
    }
    data.apply(class_file)?;
    Ok(StripOutcome::Stripped)
}
