use std::fmt;

use bcpu::ast::EvalError;
use bcpu::section::SectionError;

use crate::parser::{Rule, MAX_SOURCE_LINE};

pub type PestError = pest::error::Error<Rule>;

#[derive(Debug)]
pub enum Error {
    /// Lexical or grammatical error; pest renders `path:line.col-line.col`.
    Parse(PestError),
    /// Semantic error attributed to a source file and line.
    Asm {
        kind: AsmError,
        path: String,
        line: u32,
    },
    /// A diagnostic has already been reported in full; the driver exits
    /// non-zero without printing anything further.
    Diagnosed,
}

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug)]
pub enum AsmError {
    LineTooLong(usize),
    SurplusOperands,
    MacroWithoutName,
    MacroArity {
        name: String,
        formals: usize,
        actuals: usize,
    },
    DuplicateLabel(String),
    UnknownMnemonic(String),
    Undefined(String),
    Malformed,
    OrgOutOfRange(bcpu::Word),
    Section(SectionError),
}

impl Error {
    /// Attributes the error to a source path.
    pub(crate) fn at_path(self, path: &str) -> Error {
        match self {
            Error::Parse(err) => Error::Parse(err.with_path(path)),
            Error::Asm { kind, line, .. } => Error::Asm {
                kind,
                path: path.to_owned(),
                line,
            },
            other => other,
        }
    }
}

impl From<EvalError> for AsmError {
    fn from(err: EvalError) -> AsmError {
        match err {
            EvalError::Undefined(name) => AsmError::Undefined(name),
            EvalError::Malformed => AsmError::Malformed,
        }
    }
}

impl From<SectionError> for AsmError {
    fn from(err: SectionError) -> AsmError {
        AsmError::Section(err)
    }
}

impl fmt::Display for AsmError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            AsmError::LineTooLong(len) => write!(
                f,
                "source line of {} bytes exceeds the {} byte limit",
                len, MAX_SOURCE_LINE
            ),
            AsmError::SurplusOperands => f.write_str("only one operand permitted"),
            AsmError::MacroWithoutName => f.write_str("macro definition requires a name label"),
            AsmError::MacroArity {
                name,
                formals,
                actuals,
            } => write!(
                f,
                "macro '{}' takes {} operands, given {}",
                name, formals, actuals
            ),
            AsmError::DuplicateLabel(name) => write!(f, "label '{}' redefined", name),
            AsmError::UnknownMnemonic(name) => write!(f, "no such mnemonic '{}'", name),
            AsmError::Undefined(name) => write!(f, "undefined name '{}'", name),
            AsmError::Malformed => f.write_str("malformed expression"),
            AsmError::OrgOutOfRange(value) => {
                write!(f, "origin {} lies outside the store", value)
            }
            AsmError::Section(err) => write!(f, "{}", err),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Error::Parse(err) => write!(f, "{}", err),
            Error::Asm { kind, path, line } => write!(f, "{}:{}: {}", path, line, kind),
            Error::Diagnosed => f.write_str("error already reported"),
        }
    }
}

impl std::error::Error for Error {}
