//! # Symbol Records
//!
//! The flat result shape handed across the boundary: one record per resolved
//! symbol, or one per frame of an inlined call chain.
//!
//! A record is either a success (`name` and/or `filename` set) or a failure
//! (`error` set and everything else empty). Failures are data, not control
//! flow: the symbolizer always produces a record, and an inlined resolution
//! that fails still produces a chain of exactly one error record.

use crate::error::{Result, SymlineError};
use crate::types::{DataSymbol, ResolvedFrame};

/// A resolved name and source location, or an error message.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct SymbolRecord
{
    /// Function or data symbol name.
    pub name: Option<String>,
    /// Source file of the frame (code queries only).
    pub filename: Option<String>,
    /// 1-based line number (code queries only).
    pub line: Option<u32>,
    /// 1-based column number (code queries only).
    pub column: Option<u32>,
    /// Engine message when resolution failed.
    pub error: Option<String>,
}

impl SymbolRecord
{
    /// Record for a successfully resolved code frame.
    #[must_use]
    pub fn from_frame(frame: ResolvedFrame) -> Self
    {
        let ResolvedFrame { name, location } = frame;
        match location {
            Some(location) => Self {
                name,
                filename: Some(location.file),
                line: location.line,
                column: location.column,
                error: None,
            },
            None => Self {
                name,
                ..Self::default()
            },
        }
    }

    /// Record for a resolved data symbol. Only `name` is populated.
    #[must_use]
    pub fn from_data(symbol: DataSymbol) -> Self
    {
        Self {
            name: Some(symbol.name),
            ..Self::default()
        }
    }

    /// Record carrying only the error's message.
    #[must_use]
    pub fn from_error(err: &SymlineError) -> Self
    {
        Self {
            error: Some(err.to_string()),
            ..Self::default()
        }
    }

    #[must_use]
    pub fn is_error(&self) -> bool
    {
        self.error.is_some()
    }
}

impl From<Result<ResolvedFrame>> for SymbolRecord
{
    fn from(result: Result<ResolvedFrame>) -> Self
    {
        match result {
            Ok(frame) => SymbolRecord::from_frame(frame),
            Err(err) => SymbolRecord::from_error(&err),
        }
    }
}

impl From<Result<DataSymbol>> for SymbolRecord
{
    fn from(result: Result<DataSymbol>) -> Self
    {
        match result {
            Ok(symbol) => SymbolRecord::from_data(symbol),
            Err(err) => SymbolRecord::from_error(&err),
        }
    }
}

/// Flatten an inlined resolution into records.
///
/// Success yields one record per frame in the order given (innermost first).
/// Failure yields exactly one error record, whatever the chain depth would
/// have been.
pub fn chain_records<I>(result: Result<I>) -> Vec<SymbolRecord>
where
    I: IntoIterator<Item = ResolvedFrame>,
{
    match result {
        Ok(frames) => frames.into_iter().map(SymbolRecord::from_frame).collect(),
        Err(err) => vec![SymbolRecord::from_error(&err)],
    }
}

#[cfg(test)]
mod tests
{
    use super::*;
    use crate::types::SourceLocation;

    fn frame(name: &str, line: u32) -> ResolvedFrame
    {
        ResolvedFrame {
            name: Some(name.to_string()),
            location: Some(SourceLocation {
                file: "/src/main.c".to_string(),
                line: Some(line),
                column: Some(1),
            }),
        }
    }

    #[test]
    fn test_frame_record_has_no_error()
    {
        let record = SymbolRecord::from_frame(frame("main", 3));
        assert_eq!(record.name.as_deref(), Some("main"));
        assert_eq!(record.filename.as_deref(), Some("/src/main.c"));
        assert_eq!(record.line, Some(3));
        assert!(!record.is_error());
    }

    #[test]
    fn test_error_record_is_otherwise_empty()
    {
        let record = SymbolRecord::from(Err::<ResolvedFrame, _>(SymlineError::AddressNotFound(0x40)));
        assert_eq!(record.error.as_deref(), Some("no symbol found at 0x40"));
        assert_eq!(record.name, None);
        assert_eq!(record.filename, None);
        assert_eq!(record.line, None);
        assert_eq!(record.column, None);
    }

    #[test]
    fn test_data_record_only_sets_name()
    {
        let record = SymbolRecord::from(Ok::<_, SymlineError>(DataSymbol {
            name: "counter".to_string(),
            address: 0x10,
            size: 8,
        }));
        assert_eq!(record.name.as_deref(), Some("counter"));
        assert_eq!(record.filename, None);
        assert_eq!(record.line, None);
    }

    #[test]
    fn test_chain_failure_is_single_record()
    {
        let records = chain_records::<Vec<ResolvedFrame>>(Err(SymlineError::Unavailable));
        assert_eq!(records.len(), 1);
        assert!(records[0].is_error());
    }

    #[test]
    fn test_chain_success_keeps_order()
    {
        let records = chain_records(Ok(vec![frame("inner", 5), frame("outer", 20)]));
        let names: Vec<_> = records.iter().map(|r| r.name.as_deref().unwrap()).collect();
        assert_eq!(names, ["inner", "outer"]);
    }
}
