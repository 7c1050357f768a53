//! Shared setup for unit tests of nodes.
use stplc_dsl::{
    core::{Id, SourceSpan},
    diagnostic::Diagnostic,
};

use crate::array::Dimension;
use crate::cursor::Cursor;
use crate::library::Library;
use crate::machine::Machine;
use crate::memory::DirectMemory;
use crate::node::{Body, NodeId, Step, StepContext};
use crate::options::Options;
use crate::structure::StructMember;
use crate::types::{Type, TypeKind, TypeRef};
use crate::value::Value;
use crate::variable::{Section, VarDecl};

pub struct Fixture {
    pub library: Library,
    pub options: Options,
    pub machine: Machine,
    pub cursor: Cursor,
}

impl Fixture {
    pub fn new() -> Self {
        Self::from_library(Library::new(16))
    }

    fn from_library(library: Library) -> Self {
        let machine = Machine::new(&library, DirectMemory::new(16)).unwrap();
        Self {
            library,
            options: Options::default(),
            machine,
            cursor: Cursor::new(),
        }
    }

    fn type_ref(library: &Library, name: &str) -> TypeRef {
        TypeRef::resolved(Id::from(name), library.types.lookup(&Id::from(name)).unwrap())
    }

    fn global(library: &mut Library, name: &str, ty: &str) {
        let mut decl = VarDecl::new(
            Id::from(name),
            Section::Global,
            Self::type_ref(library, ty),
            SourceSpan::default(),
        );
        decl.create_value(&library.types).unwrap();
        library.add_global(decl).unwrap();
    }

    /// A global `origin : POINT` where `POINT` is `STRUCT x : INT; y : INT := 7; END_STRUCT`.
    pub fn with_point_global() -> Self {
        let mut library = Library::new(16);
        let member = |library: &Library, name: &str, initializer: Option<Value>| StructMember {
            name: Id::from(name),
            ty: Self::type_ref(library, "INT"),
            initializer,
            span: SourceSpan::default(),
        };
        let members = vec![
            member(&library, "x", None),
            member(&library, "y", Some(Value::Integer(7))),
        ];
        library
            .types
            .add(Type {
                name: Id::from("POINT"),
                kind: TypeKind::Struct { members },
                span: SourceSpan::default(),
            })
            .unwrap();
        Self::global(&mut library, "origin", "POINT");
        Self::from_library(library)
    }

    /// A global `table : ARRAY[1..3] OF INT`.
    pub fn with_array_global() -> Self {
        let mut library = Library::new(16);
        let element = Self::type_ref(&library, "INT");
        library
            .types
            .add(Type {
                name: Id::from("TABLE_T"),
                kind: TypeKind::Array {
                    element,
                    dimensions: vec![Dimension::new(1, 3)],
                    initializer: None,
                },
                span: SourceSpan::default(),
            })
            .unwrap();
        Self::global(&mut library, "table", "TABLE_T");
        Self::from_library(library)
    }
}

/// Steps the node outside of any instance until it finishes.
pub fn run_to_completion(fixture: &mut Fixture, body: &mut Body, id: NodeId) -> Result<(), Diagnostic> {
    for _ in 0..10_000 {
        let mut ctx = StepContext {
            library: &fixture.library,
            machine: &mut fixture.machine,
            cursor: &mut fixture.cursor,
            options: &fixture.options,
            instance: None,
        };
        if body.step(id, &mut ctx)? == Step::Finished {
            return Ok(());
        }
    }
    Err(Diagnostic::internal(&SourceSpan::default(), "Node did not finish"))
}
