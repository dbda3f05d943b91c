//! Source locations attached to tokens, AST nodes and errors.

use std::fmt;
use std::sync::Arc;

/// A position in a source file.
///
/// Lines and columns are 1-based; the column counts bytes from the start
/// of the line. `offset` is the byte offset into the whole file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Location {
    pub file: Arc<str>,
    pub line: u32,
    pub column: u32,
    pub offset: u32,
}

impl Location {
    pub fn new(file: Arc<str>, line: u32, column: u32, offset: u32) -> Self {
        Location {
            file,
            line,
            column,
            offset,
        }
    }

    /// Location used for values that do not come from any file.
    pub fn builtin() -> Self {
        Location::new(Arc::from("<builtin>"), 0, 0, 0)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}:{}", self.file, self.line, self.column)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn displays_file_line_and_column() {
        let loc = Location::new(Arc::from("Mybuild"), 3, 14, 40);
        assert_eq!(loc.to_string(), "Mybuild:3:14");
    }
}
