//! Global name collection.
//!
//! Walks the top-level declarations once, building the five namespaces and
//! the type synonym graph. Procedures and functions share one clash
//! namespace; constants and global variables share another. On a duplicate
//! the first binding wins and every extra occurrence is reported, so one
//! run surfaces all duplicates.

use rustc_hash::FxHashMap;

use veil_ir::{AstArena, Name, Program, Span, TyKind, VarId};

use crate::error::TcError;

/// What a plain identifier resolves to.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
pub enum IdDef {
    /// A constant declaration (index into `program.consts`).
    Const(usize),
    /// A variable declaration of any kind.
    Var(VarId),
}

/// The global namespaces, finalized after collection.
#[derive(Debug, Default)]
pub struct Globals {
    types: FxHashMap<Name, usize>,
    procs: FxHashMap<Name, usize>,
    funcs: FxHashMap<Name, usize>,
    consts: FxHashMap<Name, usize>,
    vars: FxHashMap<Name, VarId>,
}

impl Globals {
    /// Look up a user type declaration (index into `program.types`).
    pub fn type_of(&self, name: Name) -> Option<usize> {
        self.types.get(&name).copied()
    }

    /// Look up a procedure declaration (index into `program.procedures`).
    pub fn proc_of(&self, name: Name) -> Option<usize> {
        self.procs.get(&name).copied()
    }

    /// Look up a function declaration (index into `program.functions`).
    pub fn func_of(&self, name: Name) -> Option<usize> {
        self.funcs.get(&name).copied()
    }

    /// Look up an identifier in the constants-and-globals namespace.
    /// Constants win, mirroring declaration precedence.
    pub fn id_of(&self, name: Name) -> Option<IdDef> {
        if let Some(&c) = self.consts.get(&name) {
            return Some(IdDef::Const(c));
        }
        self.vars.get(&name).copied().map(IdDef::Var)
    }
}

/// Collects global names and reports duplicates and synonym cycles.
pub struct GlobalsCollector<'a> {
    program: &'a Program,
    arena: &'a AstArena,
    globals: Globals,
    /// First-seen span per name-in-namespace-group, for duplicate labels.
    first_seen: FxHashMap<(Namespace, Name), Span>,
    /// Edges of the type synonym graph: declared type -> mentioned types.
    synonyms: FxHashMap<Name, Vec<Name>>,
    errors: Vec<TcError>,
}

/// The two clash namespace groups plus types.
#[derive(Copy, Clone, Eq, PartialEq, Hash, Debug)]
enum Namespace {
    Types,
    Callables,
    Values,
}

impl<'a> GlobalsCollector<'a> {
    /// Collect all global names of `program`.
    #[tracing::instrument(level = "debug", skip_all)]
    pub fn collect(program: &'a Program, arena: &'a AstArena) -> (Globals, Vec<TcError>) {
        let mut collector = GlobalsCollector {
            program,
            arena,
            globals: Globals::default(),
            first_seen: FxHashMap::default(),
            synonyms: FxHashMap::default(),
            errors: Vec::new(),
        };
        collector.run();
        (collector.globals, collector.errors)
    }

    fn run(&mut self) {
        for (i, td) in self.program.types.iter().enumerate() {
            if self.declare(Namespace::Types, td.name, td.span) {
                self.globals.types.insert(td.name, i);
            }
            self.synonyms.entry(td.name).or_default();
            if let Some(body) = td.synonym {
                let mut mentioned = Vec::new();
                self.collect_mentions(body, &mut mentioned);
                self.synonyms.entry(td.name).or_default().extend(mentioned);
            }
        }
        for &vid in &self.program.globals {
            let vd = self.arena.var(vid);
            if self.declare(Namespace::Values, vd.name, vd.span) {
                self.globals.vars.insert(vd.name, vid);
            }
        }
        for (i, cd) in self.program.consts.iter().enumerate() {
            if self.declare(Namespace::Values, cd.name, cd.span) {
                self.globals.consts.insert(cd.name, i);
            }
        }
        for (i, fd) in self.program.functions.iter().enumerate() {
            if self.declare(Namespace::Callables, fd.sig.name, fd.span) {
                self.globals.funcs.insert(fd.sig.name, i);
            }
        }
        for (i, pd) in self.program.procedures.iter().enumerate() {
            if self.declare(Namespace::Callables, pd.sig.name, pd.span) {
                self.globals.procs.insert(pd.sig.name, i);
            }
        }
        self.check_synonym_cycle();
    }

    /// Record a declaration; `false` means it was a duplicate and the
    /// first binding stays in place.
    fn declare(&mut self, ns: Namespace, name: Name, span: Span) -> bool {
        match self.first_seen.get(&(ns, name)) {
            Some(&first) => {
                self.errors.push(TcError::DuplicateName { name, span, first });
                false
            }
            None => {
                self.first_seen.insert((ns, name), span);
                true
            }
        }
    }

    /// Collect every user type name mentioned in a synonym body.
    fn collect_mentions(&self, ty: veil_ir::TyId, out: &mut Vec<Name>) {
        match &self.arena.ty(ty).kind {
            TyKind::Prim(_) => {}
            TyKind::Map { indexes, elem } => {
                for &i in indexes {
                    self.collect_mentions(i, out);
                }
                self.collect_mentions(*elem, out);
            }
            TyKind::User { name, args } => {
                out.push(*name);
                for &a in args {
                    self.collect_mentions(a, out);
                }
            }
            TyKind::Indexed { index, payload } => {
                self.collect_mentions(*index, out);
                self.collect_mentions(*payload, out);
            }
            TyKind::Tuple(elems) => {
                for &e in elems {
                    self.collect_mentions(e, out);
                }
            }
            TyKind::Dep { base, .. } => self.collect_mentions(*base, out),
        }
    }

    /// One cycle check per program: any cycle yields exactly one error.
    fn check_synonym_cycle(&mut self) {
        #[derive(Copy, Clone, Eq, PartialEq)]
        enum Color {
            White,
            Gray,
            Black,
        }

        let mut color: FxHashMap<Name, Color> = FxHashMap::default();
        // Iterate in declaration order so the reported span is stable.
        for td in &self.program.types {
            if color.get(&td.name).copied().unwrap_or(Color::White) != Color::White {
                continue;
            }
            // Iterative DFS; the stack holds (node, next-edge cursor).
            let mut stack: Vec<(Name, usize)> = vec![(td.name, 0)];
            color.insert(td.name, Color::Gray);
            while let Some(&mut (node, ref mut cursor)) = stack.last_mut() {
                let edges = self.synonyms.get(&node).map(Vec::as_slice).unwrap_or(&[]);
                if *cursor < edges.len() {
                    let next = edges[*cursor];
                    *cursor += 1;
                    match color.get(&next).copied().unwrap_or(Color::White) {
                        Color::Gray => {
                            let span = self
                                .globals
                                .type_of(node)
                                .map(|i| self.program.types[i].span)
                                .unwrap_or(Span::DUMMY);
                            self.errors.push(TcError::TypeSynonymCycle { span });
                            return;
                        }
                        Color::White => {
                            // Edges may mention undeclared types; they have
                            // no outgoing edges and cannot close a cycle,
                            // but coloring them keeps the walk uniform.
                            color.insert(next, Color::Gray);
                            stack.push((next, 0));
                        }
                        Color::Black => {}
                    }
                } else {
                    color.insert(node, Color::Black);
                    stack.pop();
                }
            }
        }
    }
}
