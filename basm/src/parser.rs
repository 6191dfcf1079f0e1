//! Tokenizes and parses Baby assembly into the core AST.
//!
//! The grammar lives in `grammar.pest`; this module walks the parse pairs
//! into [`Ast`] statements. Identifiers are interned as they are seen, so
//! the tree carries string-table handles only.

use matches::debug_assert_matches;
use num_traits::Num;
use pest::iterators::Pair;
use pest::error::ErrorVariant;
use pest::{Parser, Span};
use pest_derive::Parser;

use bcpu::ast::{Ast, AstKind, Loc};
use bcpu::strtab::StrTab;
use bcpu::symbols::{SymRef, SymType};
use bcpu::Word;

use crate::error::{AsmError, Error, PestError, Result};

/// Longest accepted source line, in bytes.
pub const MAX_SOURCE_LINE: usize = 1024;

#[derive(Parser)]
#[grammar = "grammar.pest"]
pub struct BasmParser;

pub(crate) fn parser_error(span: Span, message: String) -> Error {
    Error::Parse(PestError::new_from_span(
        ErrorVariant::CustomError { message },
        span,
    ))
}

fn loc(span: &Span) -> Loc {
    let (start_line, start_col) = span.start_pos().line_col();
    let (end_line, end_col) = span.end_pos().line_col();
    Loc {
        start: (start_line as u32, start_col as u32),
        end: (end_line as u32, end_col as u32),
    }
}

/// Parses a whole source, returning the statement list.
pub fn parse(input: &str, strtab: &mut StrTab) -> Result<Ast> {
    for (i, line) in input.lines().enumerate() {
        if line.len() > MAX_SOURCE_LINE {
            return Err(Error::Asm {
                kind: AsmError::LineTooLong(line.len()),
                path: String::new(),
                line: i as u32 + 1,
            });
        }
    }

    let program = BasmParser::parse(Rule::program, input)
        .map_err(Error::Parse)?
        .next()
        .unwrap();
    debug_assert_matches!(program.as_rule(), Rule::program);

    let whole = loc(&program.as_span());
    let mut statements = Vec::new();
    for pair in program.into_inner() {
        if pair.as_rule() == Rule::EOI {
            continue;
        }
        statements.push(build_statement(pair, strtab)?);
    }
    Ok(Ast::new(AstKind::List(statements), whole))
}

fn build_statement(pair: Pair<Rule>, strtab: &mut StrTab) -> Result<Ast> {
    match pair.as_rule() {
        Rule::org => build_org(pair),
        Rule::label => build_label(pair, strtab),
        Rule::instr => build_instr(pair, strtab),
        Rule::macro_def => build_macro(pair, strtab),
        other => unreachable!("statement rule {:?}", other),
    }
}

fn build_org(pair: Pair<Rule>) -> Result<Ast> {
    let node_loc = loc(&pair.as_span());
    let span = pair.as_span();
    let text = pair.as_str().trim_end_matches(':');
    let value = parse_int(text, &span)?;
    Ok(Ast::new(AstKind::Org(value), node_loc))
}

fn build_label(pair: Pair<Rule>, strtab: &mut StrTab) -> Result<Ast> {
    let node_loc = loc(&pair.as_span());
    let name = pair.as_str().trim_end_matches(':');
    let re = SymRef {
        typ: SymType::Label,
        name: strtab.put(name),
    };
    Ok(Ast::new(AstKind::Label(re), node_loc))
}

fn build_instr(pair: Pair<Rule>, strtab: &mut StrTab) -> Result<Ast> {
    let node_loc = loc(&pair.as_span());
    let mut inner = pair.into_inner();

    let name = inner.next().unwrap();
    debug_assert_matches!(name.as_rule(), Rule::identifier);
    let re = SymRef {
        typ: SymType::Mnemonic,
        name: strtab.put(name.as_str()),
    };

    let operands: Vec<Ast> = inner
        .map(|p| build_expr(p, strtab))
        .collect::<Result<_>>()?;
    let mut list = Ast::nil(node_loc);
    for operand in operands.into_iter().rev() {
        list = Ast::cons(operand, list);
    }

    Ok(Ast::new(AstKind::Instr(re, Box::new(list)), node_loc))
}

fn build_macro(pair: Pair<Rule>, strtab: &mut StrTab) -> Result<Ast> {
    let node_loc = loc(&pair.as_span());
    let mut formals = Ast::nil(node_loc);
    let mut body = Ast::new(AstKind::List(Vec::new()), node_loc);

    for part in pair.into_inner() {
        match part.as_rule() {
            Rule::kw_macro | Rule::kw_endm => {}
            Rule::formals => {
                let names: Vec<Ast> = part
                    .into_inner()
                    .map(|p| {
                        let l = loc(&p.as_span());
                        Ast::new(AstKind::Name(strtab.put(p.as_str())), l)
                    })
                    .collect();
                for name in names.into_iter().rev() {
                    formals = Ast::cons(name, formals);
                }
            }
            Rule::macro_body => {
                let body_loc = loc(&part.as_span());
                let statements: Vec<Ast> = part
                    .into_inner()
                    .map(|p| build_statement(p, strtab))
                    .collect::<Result<_>>()?;
                body = Ast::new(AstKind::List(statements), body_loc);
            }
            other => unreachable!("macro rule {:?}", other),
        }
    }

    Ok(Ast::new(
        AstKind::Macro(Box::new(formals), Box::new(body)),
        node_loc,
    ))
}

fn build_expr(pair: Pair<Rule>, strtab: &mut StrTab) -> Result<Ast> {
    debug_assert_matches!(pair.as_rule(), Rule::expr);
    let mut inner = pair.into_inner();

    let mut acc = build_operand(inner.next().unwrap(), strtab)?;
    while let Some(op) = inner.next() {
        debug_assert_matches!(op.as_rule(), Rule::add_op);
        let rhs = build_operand(inner.next().unwrap(), strtab)?;
        let op_loc = loc(&op.as_span());
        let kind = match op.as_str() {
            "+" => AstKind::Plus(Box::new(acc), Box::new(rhs)),
            _ => AstKind::Minus(Box::new(acc), Box::new(rhs)),
        };
        acc = Ast::new(kind, op_loc);
    }
    Ok(acc)
}

fn build_operand(pair: Pair<Rule>, strtab: &mut StrTab) -> Result<Ast> {
    let node_loc = loc(&pair.as_span());
    match pair.as_rule() {
        Rule::number => {
            let span = pair.as_span();
            let value = parse_int(pair.as_str(), &span)?;
            Ok(Ast::number(value, node_loc))
        }
        Rule::here | Rule::identifier => {
            let re = SymRef {
                typ: SymType::Label,
                name: strtab.put(pair.as_str()),
            };
            Ok(Ast::new(AstKind::Symbol(re), node_loc))
        }
        other => unreachable!("operand rule {:?}", other),
    }
}

/// Parses a signed decimal or `0x` hexadecimal literal; the value wraps
/// into the 32-bit word.
fn parse_int(text: &str, span: &Span) -> Result<Word> {
    let (digits, negative) = match text.strip_prefix('-') {
        Some(rest) => (rest, true),
        None => (text, false),
    };
    let (digits, radix) = match digits.strip_prefix("0x") {
        Some(rest) => (rest, 16),
        None => (digits, 10),
    };

    let magnitude = <i64 as Num>::from_str_radix(digits, radix)
        .map_err(|err| parser_error(span.clone(), format!("parsing integer failed: {}", err)))?;
    if magnitude > u32::max_value() as i64 {
        return Err(parser_error(
            span.clone(),
            format!("integer {} does not fit in a word", text),
        ));
    }

    let signed = if negative { -magnitude } else { magnitude };
    Ok(signed as Word)
}
