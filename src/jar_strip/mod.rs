use std::fmt;

use crate::jar_utils::{JarError, JarFile};
use crate::strip::{strip_class, ClassStripper, StripError, StripOutcome};

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

#[derive(Debug)]
pub enum JarStripError {
    Jar(JarError),
    Strip { class: String, error: StripError },
}

impl fmt::Display for JarStripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            JarStripError::Jar(e) => write!(f, "jar error: {e}"),
            JarStripError::Strip { class, error } => {
                write!(f, "strip error in {class}: {error}")
            }
        }
    }
}

impl std::error::Error for JarStripError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            JarStripError::Jar(e) => Some(e),
            JarStripError::Strip { error, .. } => Some(error),
        }
    }
}

impl From<JarError> for JarStripError {
    fn from(e: JarError) -> Self {
        JarStripError::Jar(e)
    }
}

pub type JarStripResult<T> = Result<T, JarStripError>;

// ---------------------------------------------------------------------------
// Archive-level stripping
// ---------------------------------------------------------------------------

/// What a strip run did to an archive.
#[derive(Clone, Debug, Default)]
pub struct JarStripSummary {
    /// Class entries removed outright (class-level annotation).
    pub removed: Vec<String>,
    /// Class entries rewritten with members stripped.
    pub modified: Vec<String>,
}

impl JarStripSummary {
    pub fn is_empty(&self) -> bool {
        self.removed.is_empty() && self.modified.is_empty()
    }
}

/// Run the strip pass over every `.class` entry of a JAR. Classes annotated
/// away entirely are removed from the archive; classes with stripped
/// members are rewritten; everything else, class or resource, is left
/// byte-identical. Fails on the first class that cannot be parsed,
/// stripped, or rewritten, leaving the archive unchanged from that entry
/// on.
pub fn strip_jar(jar: &mut JarFile, stripper: &ClassStripper) -> JarStripResult<JarStripSummary> {
    let class_paths: Vec<String> = jar.class_names().map(str::to_string).collect();
    let mut summary = JarStripSummary::default();

    for path in class_paths {
        let mut class_file = jar.parse_class(&path)?;
        let outcome = strip_class(stripper, &mut class_file).map_err(|error| {
            JarStripError::Strip {
                class: path.clone(),
                error,
            }
        })?;
        match outcome {
            StripOutcome::Unchanged => {}
            StripOutcome::Stripped => {
                jar.set_class(&path, class_file)?;
                log::info!("stripped members from {path}");
                summary.modified.push(path);
            }
            StripOutcome::RemoveClass => {
                jar.remove_entry(&path);
                log::info!("removed {path}");
                summary.removed.push(path);
            }
        }
    }
    Ok(summary)
}
