//! The two-pass assembler engine.
//!
//! Parsing produces a flat statement list; [`Assembler::add_source`] folds
//! it into a linear buffer of abstract records, expanding macros as they
//! are applied. Pass 1 lays out the section and collects label addresses,
//! pass 2 evaluates operand expressions and emits words.

use log::debug;

use bcpu::arch::{Arch, Directive, MacroDef, MnemKind};
use bcpu::ast::{self, Ast, AstKind, Reduction};
use bcpu::section::Section;
use bcpu::strtab::{StrIdx, StrTab};
use bcpu::symbols::{LookupMode, ScopeId, SymRef, SymScopes, SymType, SymVal};
use bcpu::{Addr, UWord, Word};

use crate::error::{AsmError, Error, Result};
use crate::parser;

/// One line of abstract assembly: the intermediate form between the parse
/// tree and the emitted section.
#[derive(Debug)]
pub struct Record {
    pub org: Option<Addr>,
    pub label: Option<SymRef>,
    pub instr: Option<SymRef>,
    pub operands: Vec<Ast>,
    /// Evaluated operand, filled in by pass 2.
    pub operand_value: Word,
    /// Scope the record was parsed under; labels and operand names resolve
    /// from here.
    pub scope: ScopeId,
    pub source: usize,
    pub line: u32,
}

impl Record {
    fn new(scope: ScopeId, source: usize) -> Record {
        Record {
            org: None,
            label: None,
            instr: None,
            operands: Vec::new(),
            operand_value: 0,
            scope,
            source,
            line: 0,
        }
    }

    fn is_annotated(&self) -> bool {
        self.org.is_some() || self.label.is_some()
    }
}

/// A source file held for parsing and listings.
#[derive(Debug)]
pub struct Source {
    pub path: String,
    pub text: String,
    /// Stdin is assembled like any file but its text is not replayed in
    /// listings.
    pub listable: bool,
}

impl Source {
    /// Final path component, as shown in listings and logs.
    pub fn leaf(&self) -> &str {
        if !self.listable {
            return "stdin";
        }
        self.path.rsplit('/').next().unwrap_or(&self.path)
    }
}

/// The assembler context: string table, scope arena, mnemonic arena, the
/// output section and the abstract-record buffer. There are no globals;
/// every entry point threads through this struct.
#[derive(Debug)]
pub struct Assembler {
    strtab: StrTab,
    scopes: SymScopes,
    arch: Arch,
    section: Section,
    records: Vec<Record>,
    sources: Vec<Source>,
    dollar: StrIdx,
}

impl Assembler {
    pub fn new() -> Assembler {
        let mut strtab = StrTab::new();
        let mut scopes = SymScopes::new();
        let arch = Arch::new();
        arch.install(&mut strtab, &mut scopes);
        let dollar = strtab.put("$");

        Assembler {
            strtab,
            scopes,
            arch,
            section: Section::new(0),
            records: Vec::new(),
            sources: Vec::new(),
            dollar,
        }
    }

    /// Parses one source and appends its records to the buffer. Sources
    /// accumulate; the passes later run over the whole buffer, so several
    /// sources concatenate into a single section.
    pub fn add_source(&mut self, path: &str, text: &str) -> Result<()> {
        let listable = path != "-";
        let statements =
            parser::parse(text, &mut self.strtab).map_err(|err| err.at_path(path))?;

        let source = self.sources.len();
        self.sources.push(Source {
            path: path.to_owned(),
            text: text.to_owned(),
            listable,
        });

        let root = self.scopes.root();
        self.parse_stmts(&statements, root, source)
    }

    /// Runs both passes over the accumulated records.
    pub fn assemble(&mut self) -> Result<()> {
        self.pass_one()?;
        self.pass_two()
    }

    pub fn section(&self) -> &Section {
        &self.section
    }

    pub fn record(&self, idx: usize) -> &Record {
        &self.records[idx]
    }

    pub fn source(&self, idx: usize) -> &Source {
        &self.sources[idx]
    }

    fn err(&self, kind: AsmError, source: usize, line: u32) -> Error {
        Error::Asm {
            kind,
            path: self.sources[source].path.clone(),
            line,
        }
    }

    /// Folds a statement list into abstract records under `scope`.
    ///
    /// Labels and orgs annotate the record under construction, flushing a
    /// previous annotation first; an instruction completes the record. A
    /// macro definition takes the pending label as its name and installs a
    /// mnemonic; a macro application expands its body here, recursively,
    /// under a fresh child scope.
    fn parse_stmts(&mut self, list: &Ast, scope: ScopeId, source: usize) -> Result<()> {
        let statements = match &list.kind {
            AstKind::List(statements) => statements,
            _ => unreachable!("statement list root"),
        };

        let mut pending = Record::new(scope, source);
        for stmt in statements {
            let line = stmt.loc.start.0;
            match &stmt.kind {
                AstKind::Label(re) => {
                    if pending.is_annotated() {
                        self.flush(&mut pending);
                    }
                    pending.label = Some(*re);
                    pending.line = line;
                }
                AstKind::Org(value) => {
                    if *value < 0 || *value as Addr >= bcpu::MAX_STORE_WORDS {
                        return Err(self.err(AsmError::OrgOutOfRange(*value), source, line));
                    }
                    if pending.is_annotated() {
                        self.flush(&mut pending);
                    }
                    pending.org = Some(*value as Addr);
                    pending.line = line;
                }
                AstKind::Macro(formals, body) => {
                    let label = match pending.label.take() {
                        Some(label) => label,
                        None => return Err(self.err(AsmError::MacroWithoutName, source, line)),
                    };
                    let name = self.strtab.get(label.name).to_owned();
                    let def = MacroDef {
                        formals: (**formals).clone(),
                        body: (**body).clone(),
                    };
                    debug!(
                        target: "basm",
                        "macro '{}' with {} formals, {} statements",
                        name,
                        def.formals.count_list(),
                        def.body.count_list()
                    );
                    let idx = self.arch.define_macro(&name, def);
                    self.scopes.add(
                        &mut self.strtab,
                        scope,
                        SymType::Mnemonic,
                        label.name,
                        SymVal::Mnem(idx),
                    );
                    pending = Record::new(scope, source);
                }
                AstKind::Instr(name, operands) => {
                    if let Some(def) = self.macro_definition(scope, *name) {
                        if pending.is_annotated() {
                            self.flush(&mut pending);
                        }
                        let macro_name = self.strtab.get(name.name).to_owned();
                        self.expand_macro(&macro_name, &def, operands, scope, source, line)?;
                        continue;
                    }

                    pending.instr = Some(*name);
                    pending.line = line;
                    for operand in operands.iter_cons() {
                        pending.operands.push(operand.clone());
                        if pending.operands.len() > 1 {
                            return Err(self.err(AsmError::SurplusOperands, source, line));
                        }
                    }
                    self.flush(&mut pending);
                }
                _ => unreachable!("statement node"),
            }
        }

        // a trailing label or org still binds
        if pending.is_annotated() {
            self.flush(&mut pending);
        }
        Ok(())
    }

    fn flush(&mut self, pending: &mut Record) {
        let scope = pending.scope;
        let source = pending.source;
        self.records
            .push(std::mem::replace(pending, Record::new(scope, source)));
    }

    /// The macro body for a mnemonic reference, if it names one.
    fn macro_definition(&self, scope: ScopeId, re: SymRef) -> Option<MacroDef> {
        let sym = self.scopes.lookup(
            &self.strtab,
            scope,
            SymType::Mnemonic,
            re.name,
            LookupMode::Default,
        )?;
        match sym.val {
            SymVal::Mnem(idx) => match &self.arch.mnemonic(idx).kind {
                MnemKind::Macro(def) => Some(def.clone()),
                _ => None,
            },
            _ => None,
        }
    }

    /// Expands one macro application: binds each formal in a child scope to
    /// the partially evaluated actual argument, then parses the body into
    /// the record buffer under that scope.
    fn expand_macro(
        &mut self,
        name: &str,
        def: &MacroDef,
        actuals: &Ast,
        scope: ScopeId,
        source: usize,
        line: u32,
    ) -> Result<()> {
        let formals: Vec<StrIdx> = def
            .formals
            .iter_cons()
            .map(|node| match &node.kind {
                AstKind::Name(name) => *name,
                _ => unreachable!("macro formal"),
            })
            .collect();
        let actuals: Vec<&Ast> = actuals.iter_cons().collect();

        if formals.len() != actuals.len() {
            let kind = AsmError::MacroArity {
                name: name.to_owned(),
                formals: formals.len(),
                actuals: actuals.len(),
            };
            return Err(self.err(kind, source, line));
        }

        let child = self.scopes.create_context(scope);
        for (formal, actual) in formals.iter().zip(actuals) {
            let (reduced, reduction) =
                ast::eval(actual, &mut self.scopes, &mut self.strtab, scope, true)
                    .map_err(|err| self.err(err.into(), source, line))?;
            let value = match (&reduction, &reduced.kind) {
                (Reduction::Complete, AstKind::Number(n)) => SymVal::Word(*n),
                _ => SymVal::Ast(reduced),
            };
            self.scopes
                .add(&mut self.strtab, child, SymType::Label, *formal, value);
        }

        self.parse_stmts(&def.body, child, source)
    }

    /// Publishes the cursor as `$` so expressions see the current address.
    fn publish_dollar(&mut self) {
        let cursor = self.section.cursor() as Word;
        let root = self.scopes.root();
        let dollar = self.dollar;
        self.scopes
            .add_num(&mut self.strtab, root, SymType::Label, dollar, cursor);
    }

    /// Pass 1: apply orgs, define labels at the cursor, reserve one word
    /// per instruction record. The cursor is restored afterwards.
    fn pass_one(&mut self) -> Result<()> {
        let saved = self.section.cursor();

        for i in 0..self.records.len() {
            let (org, label, has_instr, scope, source, line) = {
                let r = &self.records[i];
                (r.org, r.label, r.instr.is_some(), r.scope, r.source, r.line)
            };

            if let Some(org) = org {
                self.section.set_cursor(org);
            }
            self.publish_dollar();

            if let Some(label) = label {
                let defined = self
                    .scopes
                    .lookup(
                        &self.strtab,
                        scope,
                        SymType::Label,
                        label.name,
                        LookupMode::Local,
                    )
                    .map(|sym| sym.val != SymVal::Undef)
                    .unwrap_or(false);
                if defined {
                    let name = self.strtab.get(label.name).to_owned();
                    return Err(self.err(AsmError::DuplicateLabel(name), source, line));
                }
                let cursor = self.section.cursor() as Word;
                self.scopes
                    .add_num(&mut self.strtab, scope, SymType::Label, label.name, cursor);
            }

            if has_instr {
                if let Err(err) = self.section.put_word(0, None) {
                    return Err(self.err(err.into(), source, line));
                }
            }
        }

        debug!(
            target: "basm",
            "pass 1: {} records, {} words laid out",
            self.records.len(),
            self.section.length()
        );
        self.section.set_cursor(saved);
        Ok(())
    }

    /// Pass 2: evaluate operands strictly in each record's scope and emit
    /// the encoded words. Stops at the first error.
    fn pass_two(&mut self) -> Result<()> {
        for i in 0..self.records.len() {
            let (org, instr, scope, source, line) = {
                let r = &self.records[i];
                (r.org, r.instr, r.scope, r.source, r.line)
            };

            if let Some(org) = org {
                self.section.set_cursor(org);
            }
            self.publish_dollar();

            let instr = match instr {
                Some(instr) => instr,
                None => continue,
            };

            let mut value: Word = 0;
            for k in 0..self.records[i].operands.len() {
                let operand = self.records[i].operands[k].clone();
                let (reduced, _) =
                    ast::eval(&operand, &mut self.scopes, &mut self.strtab, scope, false)
                        .map_err(|err| self.err(err.into(), source, line))?;
                value = match reduced.kind {
                    AstKind::Number(n) => n,
                    _ => unreachable!("strict evaluation yields a number"),
                };
            }
            self.records[i].operand_value = value;

            let mnemonic = match self.mnemonic_for(scope, instr) {
                Some(idx) => self.arch.mnemonic(idx),
                None => {
                    let name = self.strtab.get(instr.name).to_owned();
                    return Err(self.err(AsmError::UnknownMnemonic(name), source, line));
                }
            };

            let word = match &mnemonic.kind {
                MnemKind::Instr(ins) => ins.encode(value as UWord),
                MnemKind::Directive(Directive::Num) => value,
                MnemKind::Directive(Directive::Eja) => value.wrapping_sub(1),
                MnemKind::Macro(_) => unreachable!("macros expand during statement parsing"),
            };

            debug!(
                target: "basm",
                "{}:{}: {:#06x} @ {:#06x} {}",
                self.sources[source].leaf(),
                line,
                word as UWord,
                self.section.cursor(),
                self.strtab.get(instr.name)
            );

            if let Err(err) = self.section.put_word(word, Some(i)) {
                return Err(self.err(err.into(), source, line));
            }
        }
        Ok(())
    }

    fn mnemonic_for(&self, scope: ScopeId, re: SymRef) -> Option<usize> {
        let sym = self.scopes.lookup(
            &self.strtab,
            scope,
            SymType::Mnemonic,
            re.name,
            LookupMode::Default,
        )?;
        match sym.val {
            SymVal::Mnem(idx) => Some(idx),
            _ => None,
        }
    }
}

impl Default for Assembler {
    fn default() -> Assembler {
        Assembler::new()
    }
}
