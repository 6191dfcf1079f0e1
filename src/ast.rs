//! Parse tree for Baby assembly and the constant-expression evaluator.
//!
//! Statement lists are [`AstKind::List`] nodes; operand and formal-parameter
//! lists are right-cons [`AstKind::Tuple`] chains terminated by
//! [`AstKind::Nil`]. Evaluation reduces an expression to a new
//! [`AstKind::Number`] node, resolving names through the scope chain and
//! promoting symbols with pending expressions to plain words along the way.

use std::fmt;

use crate::strtab::{StrIdx, StrTab};
use crate::symbols::{LookupMode, ScopeId, SymRef, SymScopes, SymVal};
use crate::Word;

/// Start and end source position of a node, 1-based line and column.
#[derive(Clone, Copy, PartialEq, Eq, Debug, Default)]
pub struct Loc {
    pub start: (u32, u32),
    pub end: (u32, u32),
}

#[derive(Clone, Debug, PartialEq)]
pub struct Ast {
    pub kind: AstKind,
    pub loc: Loc,
}

#[derive(Clone, Debug, PartialEq)]
pub enum AstKind {
    Nil,
    Number(Word),
    Name(StrIdx),
    Symbol(SymRef),
    Label(SymRef),
    Org(Word),
    /// Cons cell; chains of these form operand and formal lists.
    Tuple(Box<Ast>, Box<Ast>),
    List(Vec<Ast>),
    /// Instruction statement: mnemonic reference and operand tuple chain.
    Instr(SymRef, Box<Ast>),
    /// Macro definition: formal-parameter tuple chain and statement body.
    /// The macro takes its name from the pending label statement.
    Macro(Box<Ast>, Box<Ast>),
    Plus(Box<Ast>, Box<Ast>),
    Minus(Box<Ast>, Box<Ast>),
}

impl Ast {
    pub fn new(kind: AstKind, loc: Loc) -> Ast {
        Ast { kind, loc }
    }

    pub fn number(value: Word, loc: Loc) -> Ast {
        Ast::new(AstKind::Number(value), loc)
    }

    pub fn nil(loc: Loc) -> Ast {
        Ast::new(AstKind::Nil, loc)
    }

    /// Builds a cons cell in front of `rest`.
    pub fn cons(head: Ast, rest: Ast) -> Ast {
        let loc = head.loc;
        Ast::new(AstKind::Tuple(Box::new(head), Box::new(rest)), loc)
    }

    /// Number of elements in a list node (cons chain, `List` or `Nil`).
    pub fn count_list(&self) -> usize {
        match &self.kind {
            AstKind::Tuple(_, rest) => 1 + rest.count_list(),
            AstKind::List(nodes) => nodes.len(),
            AstKind::Nil => 0,
            _ => panic!("count_list: not a list node"),
        }
    }

    /// Iterates the elements of a cons chain.
    pub fn iter_cons(&self) -> ConsIter {
        ConsIter { node: self }
    }
}

pub struct ConsIter<'a> {
    node: &'a Ast,
}

impl<'a> Iterator for ConsIter<'a> {
    type Item = &'a Ast;

    fn next(&mut self) -> Option<&'a Ast> {
        match &self.node.kind {
            AstKind::Tuple(head, rest) => {
                self.node = rest;
                Some(head)
            }
            _ => None,
        }
    }
}

/// Outcome of a successful evaluation.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Reduction {
    /// The expression reduced to a single number.
    Complete,
    /// Unresolved names remain; only returned when partial results are
    /// allowed.
    Partial,
}

#[derive(Clone, Debug, PartialEq)]
pub enum EvalError {
    /// A name could not be resolved anywhere on the scope chain.
    Undefined(String),
    /// The node is not an expression.
    Malformed,
}

impl fmt::Display for EvalError {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            EvalError::Undefined(name) => write!(f, "undefined name '{}'", name),
            EvalError::Malformed => f.write_str("malformed expression"),
        }
    }
}

impl std::error::Error for EvalError {}

/// Evaluates `node` in `scope`, returning a reduced copy.
///
/// With `allow_partial` set, unresolved names are tolerated and the reduced
/// node may still contain them; otherwise the first unresolved name is an
/// error. Arithmetic wraps on the 32-bit word.
pub fn eval(
    node: &Ast,
    scopes: &mut SymScopes,
    strtab: &mut StrTab,
    scope: ScopeId,
    allow_partial: bool,
) -> Result<(Ast, Reduction), EvalError> {
    match &node.kind {
        AstKind::Number(_) => Ok((node.clone(), Reduction::Complete)),
        AstKind::Symbol(re) | AstKind::Label(re) => {
            resolve(node, *re, scopes, strtab, scope, allow_partial)
        }
        AstKind::Plus(l, r) => arith(node, l, r, true, scopes, strtab, scope, allow_partial),
        AstKind::Minus(l, r) => arith(node, l, r, false, scopes, strtab, scope, allow_partial),
        _ => Err(EvalError::Malformed),
    }
}

fn resolve(
    node: &Ast,
    re: SymRef,
    scopes: &mut SymScopes,
    strtab: &mut StrTab,
    scope: ScopeId,
    allow_partial: bool,
) -> Result<(Ast, Reduction), EvalError> {
    let hit = scopes
        .lookup_with_context(strtab, scope, re.typ, re.name, LookupMode::SkipUndef(scope))
        .map(|(owner, sym)| (owner, sym.val.clone()));

    match hit {
        Some((_, SymVal::Word(value))) => Ok((Ast::number(value, node.loc), Reduction::Complete)),
        Some((owner, SymVal::Ast(pending))) => {
            // Mark the symbol in-progress so the recursive evaluation skips
            // it and a macro argument shadowing an outer name resolves to
            // the outer definition.
            scopes.replace_val(strtab, owner, re, SymVal::Undef);
            match eval(&pending, scopes, strtab, owner, allow_partial) {
                Ok((reduced, Reduction::Complete)) => {
                    let value = match reduced.kind {
                        AstKind::Number(value) => value,
                        _ => unreachable!("complete reduction is a number"),
                    };
                    scopes.replace_val(strtab, owner, re, SymVal::Word(value));
                    Ok((Ast::number(value, node.loc), Reduction::Complete))
                }
                Ok((_, Reduction::Partial)) => {
                    scopes.replace_val(strtab, owner, re, SymVal::Ast(pending));
                    Ok((node.clone(), Reduction::Partial))
                }
                Err(err) => {
                    scopes.replace_val(strtab, owner, re, SymVal::Ast(pending));
                    Err(err)
                }
            }
        }
        _ => {
            if allow_partial {
                Ok((node.clone(), Reduction::Partial))
            } else {
                Err(EvalError::Undefined(strtab.get(re.name).to_owned()))
            }
        }
    }
}

#[allow(clippy::too_many_arguments)]
fn arith(
    node: &Ast,
    l: &Ast,
    r: &Ast,
    plus: bool,
    scopes: &mut SymScopes,
    strtab: &mut StrTab,
    scope: ScopeId,
    allow_partial: bool,
) -> Result<(Ast, Reduction), EvalError> {
    let (lhs, lred) = eval(l, scopes, strtab, scope, allow_partial)?;
    let (rhs, rred) = eval(r, scopes, strtab, scope, allow_partial)?;

    if let (AstKind::Number(a), AstKind::Number(b)) = (&lhs.kind, &rhs.kind) {
        let value = if plus {
            a.wrapping_add(*b)
        } else {
            a.wrapping_sub(*b)
        };
        return Ok((Ast::number(value, node.loc), Reduction::Complete));
    }

    debug_assert!(lred == Reduction::Partial || rred == Reduction::Partial);
    let kind = if plus {
        AstKind::Plus(Box::new(lhs), Box::new(rhs))
    } else {
        AstKind::Minus(Box::new(lhs), Box::new(rhs))
    };
    Ok((Ast::new(kind, node.loc), Reduction::Partial))
}
