pub mod chunker;

pub use chunker::chunk_text;

use std::io::Read;
use std::path::Path;

use crate::error::{PapergraphError, Result};

/// Read a plain-text document from `path`, or from stdin when `path` is `-`.
///
/// Conversion from PDF or other formats happens before this point.
pub fn read_document(path: &Path) -> Result<String> {
    let text = if path == Path::new("-") {
        let mut buf = String::new();
        std::io::stdin().read_to_string(&mut buf)?;
        buf
    } else {
        std::fs::read_to_string(path)?
    };

    if text.trim().is_empty() {
        return Err(PapergraphError::InvalidInput(format!(
            "document {} contains no text",
            path.display()
        )));
    }

    Ok(text)
}
