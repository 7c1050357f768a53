//! The linked program: every type, global variable and program
//! organization unit (POU) from all compilation units.
use std::collections::HashMap;

use stplc_dsl::core::{Id, SourceSpan};

use crate::builtin::Builtin;
use crate::node::{Body, NodeId};
use crate::resolver::RefPool;
use crate::types::{TypeId, TypeKind, TypeRef, TypeTable};
use crate::variable::{Section, VarDecl};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PouId(pub usize);

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PouKind {
    Program,
    Function,
    FunctionBlock,
}

/// Identifies the place in a type declaration that refers to another type.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TypeSlot {
    /// The parent of an alias.
    Parent,
    /// The base of a subrange.
    Base,
    /// The element of an array.
    Element,
    /// A member of a structure.
    Member(usize),
}

/// The scope that declares a variable.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Owner {
    Global,
    Pou(Id),
}

/// The declaration that holds a type reference.
///
/// Referrers use names rather than positions so that they stay valid when
/// compilation units are merged into the library.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TypeReferrer {
    Type { ty: Id, slot: TypeSlot },
    Variable { owner: Owner, name: Id },
}

/// A `VAR_EXTERNAL` declaration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ExternalReferrer {
    pub pou: Id,
    pub var: usize,
}

/// Names a variable that storage can be found for.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VarRef {
    /// A variable declared by the POU that contains the reference.
    Local(usize),
    Global(usize),
    /// The instance of a program. Only useful as the first part of a
    /// qualified name such as `P.x`.
    Program(PouId),
}

/// What an unqualified name in a body refers to.
#[derive(Clone, Debug, PartialEq)]
pub enum Symbol {
    Var(VarRef),
    /// A value of the enumerated type.
    EnumValue(TypeId),
}

/// What the name of a call refers to.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Callee {
    Function(PouId),
    /// A variable that holds a function block instance.
    Instance(VarRef),
    Builtin(Builtin),
}

pub type TypePool = RefPool<Library, TypeReferrer, TypeId>;
pub type ExternalPool = RefPool<Library, ExternalReferrer, usize>;
pub type VariablePool = RefPool<Body, NodeId, Symbol>;
pub type CallPool = RefPool<Body, NodeId, Callee>;

/// The references in a body of statements or a query.
#[derive(Debug, Default)]
pub struct BodyPools {
    pub variables: VariablePool,
    pub calls: CallPool,
}

/// The references of one POU, resolved by different link stages.
#[derive(Debug, Default)]
pub struct PouPools {
    pub header: TypePool,
    pub externals: ExternalPool,
    pub body: BodyPools,
}

#[derive(Debug)]
pub struct Pou {
    pub name: Id,
    pub kind: PouKind,
    /// Variables in declaration order. A function's result is the variable
    /// in the `Return` section, named the same as the function.
    pub vars: Vec<VarDecl>,
    pub body: Body,
    pub pools: PouPools,
    pub span: SourceSpan,
}

impl Pou {
    pub fn new(name: Id, kind: PouKind, span: SourceSpan) -> Self {
        Self {
            name,
            kind,
            vars: vec![],
            body: Body::default(),
            pools: PouPools::default(),
            span,
        }
    }

    pub fn find_var(&self, name: &Id) -> Option<usize> {
        self.vars.iter().position(|v| &v.name == name)
    }

    /// The position of the variable that holds the result of a function.
    pub fn return_var(&self) -> Option<usize> {
        self.vars.iter().position(|v| v.section == Section::Return)
    }

    /// The parameters that a caller may assign in declaration order.
    pub fn inputs(&self) -> impl Iterator<Item = usize> + '_ {
        self.vars
            .iter()
            .enumerate()
            .filter(|(_, v)| v.section.is_input())
            .map(|(i, _)| i)
    }
}

/// The merged and linked contents of every compilation unit.
#[derive(Debug)]
pub struct Library {
    pub types: TypeTable,
    pub globals: Vec<VarDecl>,
    global_names: HashMap<Id, usize>,
    pub pous: Vec<Pou>,
    pou_names: HashMap<Id, PouId>,
    /// The size of each direct memory area.
    pub memory_size: usize,
}

impl Library {
    pub fn new(memory_size: usize) -> Self {
        Self {
            types: TypeTable::new(),
            globals: vec![],
            global_names: HashMap::new(),
            pous: vec![],
            pou_names: HashMap::new(),
            memory_size,
        }
    }

    /// Adds the global variable. If the name is already declared, returns
    /// the position of the existing declaration.
    pub fn add_global(&mut self, decl: VarDecl) -> Result<usize, usize> {
        if let Some(existing) = self.global_names.get(&decl.name) {
            return Err(*existing);
        }
        let position = self.globals.len();
        self.global_names.insert(decl.name.clone(), position);
        self.globals.push(decl);
        Ok(position)
    }

    /// Adds the POU. A function block also declares a type with the same
    /// name. If the name is already declared, returns the span of the
    /// existing declaration.
    pub fn add_pou(&mut self, pou: Pou) -> Result<PouId, SourceSpan> {
        if let Some(existing) = self.pou_names.get(&pou.name) {
            return Err(self.pous[existing.0].span.clone());
        }
        let id = PouId(self.pous.len());
        if pou.kind == PouKind::FunctionBlock {
            let declared = self.types.add(crate::types::Type {
                name: pou.name.clone(),
                kind: TypeKind::FunctionBlock(id),
                span: pou.span.clone(),
            });
            if let Err(existing) = declared {
                return Err(self
                    .types
                    .get(existing)
                    .map(|ty| ty.span.clone())
                    .unwrap_or_else(|_| SourceSpan::builtin()));
            }
        }
        self.pou_names.insert(pou.name.clone(), id);
        self.pous.push(pou);
        Ok(id)
    }

    pub fn find_global(&self, name: &Id) -> Option<usize> {
        self.global_names.get(name).copied()
    }

    pub fn find_pou(&self, name: &Id) -> Option<PouId> {
        self.pou_names.get(name).copied()
    }

    pub fn pou(&self, id: PouId) -> Option<&Pou> {
        self.pous.get(id.0)
    }

    pub fn pou_mut(&mut self, id: PouId) -> Option<&mut Pou> {
        self.pous.get_mut(id.0)
    }

    pub fn pou_ids(&self) -> impl Iterator<Item = PouId> {
        (0..self.pous.len()).map(PouId)
    }

    /// The global variable names for resolving `VAR_EXTERNAL` declarations.
    pub fn global_table(&self) -> &HashMap<Id, usize> {
        &self.global_names
    }

    /// Finds the variable declaration.
    pub fn var(&self, owner: &Owner, name: &Id) -> Option<&VarDecl> {
        match owner {
            Owner::Global => self.find_global(name).map(|g| &self.globals[g]),
            Owner::Pou(pou) => {
                let pou = self.pou(self.find_pou(pou)?)?;
                pou.find_var(name).map(|v| &pou.vars[v])
            }
        }
    }

    pub fn var_mut(&mut self, owner: &Owner, name: &Id) -> Option<&mut VarDecl> {
        match owner {
            Owner::Global => {
                let g = self.find_global(name)?;
                self.globals.get_mut(g)
            }
            Owner::Pou(pou) => {
                let id = self.find_pou(pou)?;
                let pou = self.pou_mut(id)?;
                let v = pou.find_var(name)?;
                pou.vars.get_mut(v)
            }
        }
    }

    /// Finds the type reference that the referrer holds.
    pub fn type_ref_mut(&mut self, referrer: &TypeReferrer) -> Option<&mut TypeRef> {
        match referrer {
            TypeReferrer::Variable { owner, name } => self.var_mut(owner, name).map(|v| &mut v.ty),
            TypeReferrer::Type { ty, slot } => {
                let id = self.types.lookup(ty)?;
                let declared = self.types.get_mut(id)?;
                match (&mut declared.kind, slot) {
                    (TypeKind::Alias { parent, .. }, TypeSlot::Parent) => Some(parent),
                    (TypeKind::Subrange { base, .. }, TypeSlot::Base) => Some(base),
                    (TypeKind::Array { element, .. }, TypeSlot::Element) => Some(element),
                    (TypeKind::Struct { members }, TypeSlot::Member(position)) => {
                        members.get_mut(*position).map(|m| &mut m.ty)
                    }
                    _ => None,
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::TypeRef;

    fn decl(name: &str) -> VarDecl {
        VarDecl::new(
            Id::from(name),
            Section::Global,
            TypeRef::named(Id::from("INT")),
            SourceSpan::default(),
        )
    }

    #[test]
    fn add_global_when_duplicate_case_insensitive_then_existing() {
        let mut library = Library::new(16);
        assert_eq!(library.add_global(decl("Speed")), Ok(0));
        assert_eq!(library.add_global(decl("SPEED")), Err(0));
    }

    #[test]
    fn add_pou_when_function_block_then_declares_type() {
        let mut library = Library::new(16);
        let id = library
            .add_pou(Pou::new(
                Id::from("TIMER"),
                PouKind::FunctionBlock,
                SourceSpan::default(),
            ))
            .unwrap();
        let ty = library.types.lookup(&Id::from("timer")).unwrap();
        assert_eq!(library.types.function_block_of(ty).unwrap(), Some(id));
    }

    #[test]
    fn add_pou_when_function_block_named_as_elementary_then_error() {
        let mut library = Library::new(16);
        let result = library.add_pou(Pou::new(
            Id::from("INT"),
            PouKind::FunctionBlock,
            SourceSpan::default(),
        ));
        assert!(result.is_err());
        assert!(library.find_pou(&Id::from("INT")).is_none());
    }

    #[test]
    fn type_ref_mut_when_global_variable_then_found() {
        let mut library = Library::new(16);
        library.add_global(decl("x")).unwrap();
        let referrer = TypeReferrer::Variable {
            owner: Owner::Global,
            name: Id::from("X"),
        };
        assert!(library.type_ref_mut(&referrer).is_some());
    }
}
