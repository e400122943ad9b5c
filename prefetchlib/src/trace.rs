use std::io::{BufRead, Lines};

use lazy_static::lazy_static;
use regex::Regex;

use crate::cache::Operation;
use crate::error::TraceError;

lazy_static! {
    // `R 0x1f00` or `w 7fff0010`, one reference per line
    static ref TRACE_LINE: Regex =
        Regex::new(r"^(?P<op>[RrWw])\s+(?:0[xX])?(?P<address>[0-9a-fA-F]+)$")
            .expect("trace line pattern should compile");
}

/// A single reference from a trace
#[derive(Debug, Copy, Clone, Eq, PartialEq)]
pub struct MemoryAccess {
    pub operation: Operation,
    pub address: u32,
}

impl MemoryAccess {
    pub fn read(address: u32) -> Self {
        Self {
            operation: Operation::Read,
            address,
        }
    }

    pub fn write(address: u32) -> Self {
        Self {
            operation: Operation::Write,
            address,
        }
    }
}

/// Parses one trace line. Blank lines and `#` comments give `None`
///
/// # Arguments
///
/// * `line`: The text of the line, without its line ending
/// * `line_number`: The 1-based line number, used for error messages
///
/// returns: Result<Option<MemoryAccess>, TraceError>
pub fn parse_line(line: &str, line_number: usize) -> Result<Option<MemoryAccess>, TraceError> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }
    let error = |reason: &'static str| TraceError::Parse {
        line: line_number,
        content: line.to_string(),
        reason,
    };
    let captures = TRACE_LINE
        .captures(trimmed)
        .ok_or_else(|| error("expected `<R|W> <hex address>`"))?;
    let operation = match &captures["op"] {
        "R" | "r" => Operation::Read,
        _ => Operation::Write,
    };
    let address = u32::from_str_radix(&captures["address"], 16)
        .map_err(|_| error("address doesn't fit in 32 bits"))?;
    Ok(Some(MemoryAccess { operation, address }))
}

/// Iterates over the references of a trace, skipping blank and comment lines
pub struct TraceReader<R: BufRead> {
    lines: Lines<R>,
    line_number: usize,
}

impl<R: BufRead> TraceReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_number: 0,
        }
    }
}

impl<R: BufRead> Iterator for TraceReader<R> {
    type Item = Result<MemoryAccess, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let line = match self.lines.next()? {
                Ok(line) => line,
                Err(e) => return Some(Err(e.into())),
            };
            self.line_number += 1;
            match parse_line(&line, self.line_number) {
                Ok(Some(access)) => return Some(Ok(access)),
                Ok(None) => continue,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}
