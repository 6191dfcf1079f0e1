//! Scoped symbol tables.
//!
//! Scopes live in an arena and chain to a parent, forming the lexical lookup
//! path. Each scope lazily owns one table per symbol type; a missing table
//! simply contributes nothing. Mnemonic tables fold names to lower case,
//! label tables are case-sensitive. Keys are string-table handles, never
//! string data.

use std::collections::HashMap;

use crate::ast::Ast;
use crate::strtab::{StrIdx, StrTab};
use crate::Word;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum SymType {
    Mnemonic,
    Label,
}

impl SymType {
    pub const COUNT: usize = 2;

    pub fn name(self) -> &'static str {
        match self {
            SymType::Mnemonic => "MNEMONIC",
            SymType::Label => "LABEL",
        }
    }

    fn index(self) -> usize {
        match self {
            SymType::Mnemonic => 0,
            SymType::Label => 1,
        }
    }

    fn case_insensitive(self) -> bool {
        matches!(self, SymType::Mnemonic)
    }
}

/// Non-owning reference to a symbol: its type and its (unfolded) name.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct SymRef {
    pub typ: SymType,
    pub name: StrIdx,
}

#[derive(Clone, Debug, PartialEq)]
pub enum SymVal {
    Undef,
    Word(Word),
    /// Index into the architecture's mnemonic arena.
    Mnem(usize),
    /// Expression still awaiting evaluation.
    Ast(Ast),
}

#[derive(Clone, Debug)]
pub struct Symbol {
    pub sref: SymRef,
    pub val: SymVal,
}

/// Arena handle of a scope.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct ScopeId(usize);

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum LookupMode {
    /// Walk the parent chain.
    Default,
    /// This scope only.
    Local,
    /// Walk the chain, but ignore a hit in the nominated scope when that
    /// hit is still undefined. Guards macro-argument self-recursion.
    SkipUndef(ScopeId),
}

#[derive(Default, Debug)]
struct SymTable {
    map: HashMap<StrIdx, Symbol>,
}

#[derive(Debug)]
struct Scope {
    parent: Option<ScopeId>,
    tables: [Option<SymTable>; SymType::COUNT],
}

/// The scope arena. Scopes are never freed individually; the whole arena is
/// dropped once assembly is done, children before their parents by
/// construction order being irrelevant at that point.
#[derive(Debug)]
pub struct SymScopes {
    scopes: Vec<Scope>,
}

impl SymScopes {
    pub fn new() -> SymScopes {
        SymScopes {
            scopes: vec![Scope {
                parent: None,
                tables: [None, None],
            }],
        }
    }

    pub fn root(&self) -> ScopeId {
        ScopeId(0)
    }

    pub fn create_context(&mut self, parent: ScopeId) -> ScopeId {
        let id = ScopeId(self.scopes.len());
        self.scopes.push(Scope {
            parent: Some(parent),
            tables: [None, None],
        });
        id
    }

    /// Table key for a name: mnemonic tables fold to lower case.
    fn key(strtab: &mut StrTab, typ: SymType, name: StrIdx) -> StrIdx {
        if typ.case_insensitive() {
            let folded = strtab.get(name).to_ascii_lowercase();
            strtab.put(&folded)
        } else {
            name
        }
    }

    /// As [`Self::key`], but without interning: a name whose folded form was
    /// never interned cannot be present in any table.
    fn find_key(strtab: &StrTab, typ: SymType, name: StrIdx) -> Option<StrIdx> {
        if typ.case_insensitive() {
            strtab.find(&strtab.get(name).to_ascii_lowercase())
        } else {
            Some(name)
        }
    }

    fn table(&self, scope: ScopeId, typ: SymType) -> Option<&SymTable> {
        self.scopes[scope.0].tables[typ.index()].as_ref()
    }

    fn table_mut(&mut self, scope: ScopeId, typ: SymType) -> &mut SymTable {
        self.scopes[scope.0].tables[typ.index()].get_or_insert_with(Default::default)
    }

    /// Returns a reference to the symbol named in *this* scope, inserting an
    /// undefined entry if it is absent.
    pub fn get_ref(
        &mut self,
        strtab: &mut StrTab,
        scope: ScopeId,
        typ: SymType,
        name: StrIdx,
    ) -> SymRef {
        let key = Self::key(strtab, typ, name);
        let sref = SymRef { typ, name };
        self.table_mut(scope, typ).map.entry(key).or_insert(Symbol {
            sref,
            val: SymVal::Undef,
        });
        sref
    }

    pub fn lookup(
        &self,
        strtab: &StrTab,
        scope: ScopeId,
        typ: SymType,
        name: StrIdx,
        mode: LookupMode,
    ) -> Option<&Symbol> {
        self.lookup_with_context(strtab, scope, typ, name, mode)
            .map(|(_, sym)| sym)
    }

    /// As [`Self::lookup`], also reporting the scope that owns the hit.
    pub fn lookup_with_context(
        &self,
        strtab: &StrTab,
        scope: ScopeId,
        typ: SymType,
        name: StrIdx,
        mode: LookupMode,
    ) -> Option<(ScopeId, &Symbol)> {
        let key = Self::find_key(strtab, typ, name)?;
        let mut cursor = Some(scope);

        while let Some(id) = cursor {
            if let Some(sym) = self.table(id, typ).and_then(|t| t.map.get(&key)) {
                let skipped = matches!(mode, LookupMode::SkipUndef(skip)
                    if skip == id && sym.val == SymVal::Undef);
                if !skipped {
                    return Some((id, sym));
                }
            }
            if mode == LookupMode::Local {
                return None;
            }
            cursor = self.scopes[id.0].parent;
        }
        None
    }

    /// Writes the value of an existing symbol, searching the chain from
    /// `scope` for the owning entry.
    ///
    /// # Panics
    /// Panics if the symbol does not exist on the chain; callers hold a
    /// [`SymRef`] obtained from [`Self::get_ref`] or [`Self::add`].
    pub fn set_val(&mut self, strtab: &StrTab, scope: ScopeId, sref: SymRef, val: SymVal) {
        let key = Self::find_key(strtab, sref.typ, sref.name)
            .expect("set_val: name never interned");
        let mut cursor = Some(scope);
        while let Some(id) = cursor {
            if let Some(table) = self.scopes[id.0].tables[sref.typ.index()].as_mut() {
                if let Some(sym) = table.map.get_mut(&key) {
                    sym.val = val;
                    return;
                }
            }
            cursor = self.scopes[id.0].parent;
        }
        panic!("set_val: symbol not reachable from scope");
    }

    /// Swaps the value of a symbol owned by exactly `scope`, returning the
    /// previous value. Used by the evaluator to mark in-progress symbols.
    pub fn replace_val(
        &mut self,
        strtab: &StrTab,
        scope: ScopeId,
        sref: SymRef,
        val: SymVal,
    ) -> SymVal {
        let key = Self::find_key(strtab, sref.typ, sref.name)
            .expect("replace_val: name never interned");
        let sym = self.scopes[scope.0].tables[sref.typ.index()]
            .as_mut()
            .and_then(|t| t.map.get_mut(&key))
            .expect("replace_val: symbol not present in scope");
        std::mem::replace(&mut sym.val, val)
    }

    /// Sets a symbol value in `scope`, adding the entry if necessary.
    pub fn add(
        &mut self,
        strtab: &mut StrTab,
        scope: ScopeId,
        typ: SymType,
        name: StrIdx,
        val: SymVal,
    ) -> SymRef {
        let sref = self.get_ref(strtab, scope, typ, name);
        self.set_val(strtab, scope, sref, val);
        sref
    }

    pub fn add_num(
        &mut self,
        strtab: &mut StrTab,
        scope: ScopeId,
        typ: SymType,
        name: StrIdx,
        value: Word,
    ) -> SymRef {
        self.add(strtab, scope, typ, name, SymVal::Word(value))
    }
}

impl Default for SymScopes {
    fn default() -> SymScopes {
        SymScopes::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn env() -> (SymScopes, StrTab) {
        (SymScopes::new(), StrTab::new())
    }

    #[test]
    fn lookup_walks_the_parent_chain() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();
        let child = scopes.create_context(root);

        let name = strtab.put("outer");
        scopes.add_num(&mut strtab, root, SymType::Label, name, 12);

        let hit = scopes
            .lookup_with_context(&strtab, child, SymType::Label, name, LookupMode::Default)
            .unwrap();
        assert_eq!(hit.0, root);
        assert_eq!(hit.1.val, SymVal::Word(12));
    }

    #[test]
    fn local_lookup_does_not_escape_the_scope() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();
        let child = scopes.create_context(root);

        let name = strtab.put("outer");
        scopes.add_num(&mut strtab, root, SymType::Label, name, 12);

        assert!(scopes
            .lookup(&strtab, child, SymType::Label, name, LookupMode::Local)
            .is_none());
    }

    #[test]
    fn child_definition_shadows_parent() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();
        let child = scopes.create_context(root);

        let name = strtab.put("x");
        scopes.add_num(&mut strtab, root, SymType::Label, name, 1);
        scopes.add_num(&mut strtab, child, SymType::Label, name, 2);

        let hit = scopes
            .lookup(&strtab, child, SymType::Label, name, LookupMode::Default)
            .unwrap();
        assert_eq!(hit.val, SymVal::Word(2));
    }

    #[test]
    fn skip_undef_bypasses_the_nominated_scope() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();
        let child = scopes.create_context(root);

        let name = strtab.put("x");
        scopes.add_num(&mut strtab, root, SymType::Label, name, 5);
        scopes.get_ref(&mut strtab, child, SymType::Label, name); // undefined entry

        let default = scopes
            .lookup_with_context(&strtab, child, SymType::Label, name, LookupMode::Default)
            .unwrap();
        assert_eq!(default.0, child);

        let skipped = scopes
            .lookup_with_context(
                &strtab,
                child,
                SymType::Label,
                name,
                LookupMode::SkipUndef(child),
            )
            .unwrap();
        assert_eq!(skipped.0, root);
        assert_eq!(skipped.1.val, SymVal::Word(5));
    }

    #[test]
    fn mnemonic_lookup_folds_case() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();

        let upper = strtab.put("LDN");
        scopes.add(&mut strtab, root, SymType::Mnemonic, upper, SymVal::Mnem(3));

        let lower = strtab.put("ldn");
        let hit = scopes
            .lookup(&strtab, root, SymType::Mnemonic, lower, LookupMode::Default)
            .unwrap();
        assert_eq!(hit.val, SymVal::Mnem(3));
    }

    #[test]
    fn labels_stay_case_sensitive() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();

        let name = strtab.put("Loop");
        scopes.add_num(&mut strtab, root, SymType::Label, name, 3);

        let other = strtab.put("loop");
        assert!(scopes
            .lookup(&strtab, root, SymType::Label, other, LookupMode::Default)
            .is_none());
    }

    #[test]
    fn get_ref_inserts_an_undefined_entry() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();

        let name = strtab.put("pending");
        let sref = scopes.get_ref(&mut strtab, root, SymType::Label, name);

        let sym = scopes
            .lookup(&strtab, root, SymType::Label, name, LookupMode::Local)
            .unwrap();
        assert_eq!(sym.val, SymVal::Undef);

        scopes.set_val(&strtab, root, sref, SymVal::Word(9));
        let sym = scopes
            .lookup(&strtab, root, SymType::Label, name, LookupMode::Local)
            .unwrap();
        assert_eq!(sym.val, SymVal::Word(9));
    }

    #[test]
    fn set_val_reaches_a_parent_entry() {
        let (mut scopes, mut strtab) = env();
        let root = scopes.root();
        let child = scopes.create_context(root);

        let name = strtab.put("up");
        let sref = scopes.add_num(&mut strtab, root, SymType::Label, name, 0);

        scopes.set_val(&strtab, child, sref, SymVal::Word(31));
        let hit = scopes
            .lookup_with_context(&strtab, child, SymType::Label, name, LookupMode::Default)
            .unwrap();
        assert_eq!(hit.0, root);
        assert_eq!(hit.1.val, SymVal::Word(31));
    }
}
