//! Pre-flight validation of input files
//!
//! Cheap checks run before committing to a conversion attempt. Hard
//! failures are never retried.

use crate::constants::{HEAD_SNIFF_BYTES, reasons};
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// Outcome of validating one input file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Validation {
    /// Proceed
    Ok { size: u64 },
    /// Proceed, but the head holds no delimiter byte
    NoDelimiterInHead { size: u64 },
    /// Abort the task with this reason
    Rejected(Rejection),
}

/// Hard validation failures
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Rejection {
    NotFound,
    CannotStat,
    EmptyFile,
    CannotReadHead,
}

impl Rejection {
    /// Reason code recorded in the task result
    pub fn code(&self) -> &'static str {
        match self {
            Rejection::NotFound => reasons::NOT_FOUND,
            Rejection::CannotStat => reasons::CANNOT_STAT,
            Rejection::EmptyFile => reasons::EMPTY_FILE,
            Rejection::CannotReadHead => reasons::CANNOT_READ_HEAD,
        }
    }
}

/// Validate `path`, sniffing its first bytes for `delimiter`
pub fn validate_file(path: &Path, delimiter: u8) -> Validation {
    if !path.exists() {
        return Validation::Rejected(Rejection::NotFound);
    }

    let size = match std::fs::metadata(path) {
        Ok(meta) => meta.len(),
        Err(_) => return Validation::Rejected(Rejection::CannotStat),
    };
    if size == 0 {
        return Validation::Rejected(Rejection::EmptyFile);
    }

    let head = match read_head(path) {
        Ok(head) => head,
        Err(_) => return Validation::Rejected(Rejection::CannotReadHead),
    };

    if head.contains(&delimiter) {
        Validation::Ok { size }
    } else {
        Validation::NoDelimiterInHead { size }
    }
}

fn read_head(path: &Path) -> std::io::Result<Vec<u8>> {
    let mut head = Vec::with_capacity(HEAD_SNIFF_BYTES);
    File::open(path)?
        .take(HEAD_SNIFF_BYTES as u64)
        .read_to_end(&mut head)?;
    Ok(head)
}
