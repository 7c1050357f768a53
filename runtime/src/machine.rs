//! Storage for a running program: global variables, the instances of
//! programs, functions and function blocks, and the direct memory.
use std::collections::HashMap;
use std::fmt::Write;

use log::trace;

use crate::error::ValueError;
use crate::library::{Library, PouId, PouKind};
use crate::memory::{sync_direct_memory, DirectMemory};
use crate::node::Body;
use crate::types::keep_instances;
use crate::value::{FbRef, Value};
use crate::variable::{Section, VarDecl, VarKind};

/// Instances are nested through function block variables at most this
/// deep.
const MAX_DEPTH: usize = 64;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct InstanceId(pub usize);

/// The storage and the execution state of one POU instance.
#[derive(Clone, Debug)]
pub struct Instance {
    pub pou: PouId,
    /// Values in the declaration order of the POU's variables.
    pub vars: Vec<Value>,
    /// The instance's copy of the POU body. `None` while the body is being
    /// stepped.
    pub body: Option<Body>,
}

/// The variable that holds a value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Slot {
    Global(usize),
    Instance(InstanceId, usize),
}

/// A value inside a variable: a slot and the positions of the array
/// elements and structure members leading to the value.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Place {
    pub slot: Slot,
    pub path: Vec<usize>,
}

impl Place {
    pub fn global(position: usize) -> Self {
        Self {
            slot: Slot::Global(position),
            path: vec![],
        }
    }

    pub fn instance(instance: InstanceId, var: usize) -> Self {
        Self {
            slot: Slot::Instance(instance, var),
            path: vec![],
        }
    }
}

#[derive(Debug, Default)]
pub struct Machine {
    pub globals: Vec<Value>,
    instances: Vec<Instance>,
    programs: HashMap<PouId, InstanceId>,
    functions: HashMap<PouId, InstanceId>,
    pub memory: DirectMemory,
}

impl Machine {
    /// Creates storage with every variable at its default value. Programs
    /// and functions have one instance each and every function block
    /// variable is bound to its own instance.
    pub fn new(library: &Library, memory: DirectMemory) -> Result<Self, ValueError> {
        let mut machine = Machine {
            memory,
            ..Default::default()
        };

        let mut globals: Vec<Value> = library.globals.iter().map(|g| g.default.clone()).collect();
        for value in globals.iter_mut() {
            machine.bind(library, value, 0)?;
        }
        machine.globals = globals;

        for id in library.pou_ids() {
            let Some(pou) = library.pou(id) else {
                continue;
            };
            match pou.kind {
                PouKind::Program => {
                    let instance = machine.instantiate(library, id, 0)?;
                    machine.programs.insert(id, instance);
                }
                PouKind::Function => {
                    let instance = machine.instantiate(library, id, 0)?;
                    machine.functions.insert(id, instance);
                }
                PouKind::FunctionBlock => {}
            }
        }
        trace!("Created {} instances", machine.instances.len());
        Ok(machine)
    }

    fn instantiate(&mut self, library: &Library, id: PouId, depth: usize) -> Result<InstanceId, ValueError> {
        let pou = library
            .pou(id)
            .ok_or_else(|| ValueError::Internal(format!("no POU {}", id.0)))?;
        if depth > MAX_DEPTH {
            return Err(ValueError::Recursive(pou.name.to_string()));
        }
        let mut vars = Vec::with_capacity(pou.vars.len());
        for decl in pou.vars.iter() {
            let mut value = decl.default.clone();
            if !matches!(decl.kind, VarKind::External { .. }) {
                self.bind(library, &mut value, depth)?;
            }
            vars.push(value);
        }
        let instance = InstanceId(self.instances.len());
        self.instances.push(Instance {
            pou: id,
            vars,
            body: Some(pou.body.clone()),
        });
        Ok(instance)
    }

    /// Creates the instances for unbound function blocks in the value.
    fn bind(&mut self, library: &Library, value: &mut Value, depth: usize) -> Result<(), ValueError> {
        match value {
            Value::FunctionBlock(reference) if reference.instance.is_none() => {
                reference.instance = Some(self.instantiate(library, reference.pou, depth + 1)?);
            }
            Value::Array(elements) => {
                for element in elements.iter_mut() {
                    self.bind(library, element, depth)?;
                }
            }
            Value::Struct(members) => {
                for member in members.iter_mut() {
                    self.bind(library, &mut member.value, depth)?;
                }
            }
            _ => {}
        }
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.instances.len()
    }

    pub fn is_empty(&self) -> bool {
        self.instances.is_empty()
    }

    pub fn program(&self, id: PouId) -> Result<InstanceId, ValueError> {
        self.programs
            .get(&id)
            .copied()
            .ok_or_else(|| ValueError::Internal(format!("no instance of program {}", id.0)))
    }

    pub fn function(&self, id: PouId) -> Result<InstanceId, ValueError> {
        self.functions
            .get(&id)
            .copied()
            .ok_or_else(|| ValueError::Internal(format!("no instance of function {}", id.0)))
    }

    pub fn instance(&self, id: InstanceId) -> Result<&Instance, ValueError> {
        self.instances
            .get(id.0)
            .ok_or_else(|| ValueError::Internal(format!("no instance {}", id.0)))
    }

    fn instance_mut(&mut self, id: InstanceId) -> Result<&mut Instance, ValueError> {
        self.instances
            .get_mut(id.0)
            .ok_or_else(|| ValueError::Internal(format!("no instance {}", id.0)))
    }

    /// Finds the slot of a variable of an instance. External variables
    /// are stored in the global they refer to.
    pub fn place_of(&self, library: &Library, instance: InstanceId, var: usize) -> Result<Place, ValueError> {
        let pou = self.instance(instance)?.pou;
        let decl = library
            .pou(pou)
            .and_then(|p| p.vars.get(var))
            .ok_or_else(|| ValueError::Internal(format!("no variable {} in instance {}", var, instance.0)))?;
        match decl.kind {
            VarKind::External { global: Some(global) } => Ok(Place::global(global)),
            VarKind::External { global: None } => Err(ValueError::Internal(format!(
                "external {} is not linked",
                decl.name
            ))),
            _ => Ok(Place::instance(instance, var)),
        }
    }

    /// The declaration of the variable in the slot.
    pub fn decl_of<'l>(&self, library: &'l Library, slot: &Slot) -> Result<&'l VarDecl, ValueError> {
        let decl = match slot {
            Slot::Global(g) => library.globals.get(*g),
            Slot::Instance(instance, var) => {
                let pou = self.instance(*instance)?.pou;
                library.pou(pou).and_then(|p| p.vars.get(*var))
            }
        };
        decl.ok_or_else(|| ValueError::Internal(format!("no declaration for {:?}", slot)))
    }

    fn slot(&self, slot: &Slot) -> Result<&Value, ValueError> {
        let value = match slot {
            Slot::Global(g) => self.globals.get(*g),
            Slot::Instance(instance, var) => self.instance(*instance)?.vars.get(*var),
        };
        value.ok_or_else(|| ValueError::Internal(format!("no storage for {:?}", slot)))
    }

    fn slot_mut(&mut self, slot: &Slot) -> Result<&mut Value, ValueError> {
        let value = match slot {
            Slot::Global(g) => self.globals.get_mut(*g),
            Slot::Instance(instance, var) => self.instance_mut(*instance)?.vars.get_mut(*var),
        };
        value.ok_or_else(|| ValueError::Internal(format!("no storage for {:?}", slot)))
    }

    pub fn value(&self, place: &Place) -> Result<&Value, ValueError> {
        let mut value = self.slot(&place.slot)?;
        for position in place.path.iter() {
            value = value.child(*position)?;
        }
        Ok(value)
    }

    pub fn value_mut(&mut self, place: &Place) -> Result<&mut Value, ValueError> {
        let mut value = self.slot_mut(&place.slot)?;
        for position in place.path.iter() {
            value = value.child_mut(*position)?;
        }
        Ok(value)
    }

    /// Copies between a directly addressed variable and the memory. Does
    /// nothing for other variables.
    pub fn sync_direct(&mut self, library: &Library, slot: &Slot, write: bool) -> Result<(), ValueError> {
        let decl = self.decl_of(library, slot)?;
        let VarKind::Direct(address) = &decl.kind else {
            return Ok(());
        };
        let ty = decl.ty.id()?;
        let value = match slot {
            Slot::Global(g) => self.globals.get_mut(*g),
            Slot::Instance(instance, var) => self
                .instances
                .get_mut(instance.0)
                .and_then(|i| i.vars.get_mut(*var)),
        }
        .ok_or_else(|| ValueError::Internal(format!("no storage for {:?}", slot)))?;
        sync_direct_memory(&library.types, ty, value, address, &mut self.memory, write)
    }

    pub fn take_body(&mut self, instance: InstanceId) -> Result<Body, ValueError> {
        self.instance_mut(instance)?
            .body
            .take()
            .ok_or_else(|| ValueError::Internal(format!("instance {} is already executing", instance.0)))
    }

    pub fn put_body(&mut self, instance: InstanceId, body: Body) {
        if let Some(instance) = self.instances.get_mut(instance.0) {
            instance.body = Some(body);
        }
    }

    /// Abandons execution in progress in every instance.
    pub fn reset_bodies(&mut self) {
        for instance in self.instances.iter_mut() {
            if let Some(body) = instance.body.as_mut() {
                body.reset();
            }
        }
    }

    /// Sets the variables of a function instance to their defaults before
    /// the function is invoked. Function block variables keep their
    /// instances.
    pub fn reset_frame(&mut self, library: &Library, id: InstanceId) -> Result<(), ValueError> {
        let instance = self.instance_mut(id)?;
        let pou = library
            .pou(instance.pou)
            .ok_or_else(|| ValueError::Internal(format!("no POU {}", instance.pou.0)))?;
        for (decl, value) in pou.vars.iter().zip(instance.vars.iter_mut()) {
            let mut fresh = decl.default.clone();
            keep_instances(value, &mut fresh);
            *value = fresh;
        }
        Ok(())
    }

    /// Formats the value. Function block instances show their interface
    /// variables as `(IN:1,Q:true)`.
    pub fn display(&self, library: &Library, value: &Value) -> Result<String, ValueError> {
        let mut out = String::new();
        self.write_value(library, value, &mut out, 0)?;
        Ok(out)
    }

    fn write_value(&self, library: &Library, value: &Value, out: &mut String, depth: usize) -> Result<(), ValueError> {
        if depth > MAX_DEPTH {
            return Err(ValueError::Recursive(value.kind_name().to_string()));
        }
        match value {
            Value::Array(elements) => {
                out.push('[');
                for (i, element) in elements.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    self.write_value(library, element, out, depth + 1)?;
                }
                out.push(']');
            }
            Value::Struct(members) => {
                out.push('(');
                for (i, member) in members.iter().enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}:", member.name);
                    self.write_value(library, &member.value, out, depth + 1)?;
                }
                out.push(')');
            }
            Value::FunctionBlock(FbRef {
                pou,
                instance: Some(instance),
            }) => {
                let declaration = library
                    .pou(*pou)
                    .ok_or_else(|| ValueError::Internal(format!("no POU {}", pou.0)))?;
                let vars = &self.instance(*instance)?.vars;
                out.push('(');
                let interface = declaration
                    .vars
                    .iter()
                    .zip(vars.iter())
                    .filter(|(d, _)| matches!(d.section, Section::Input | Section::Output | Section::InOut));
                for (i, (decl, value)) in interface.enumerate() {
                    if i > 0 {
                        out.push(',');
                    }
                    let _ = write!(out, "{}:", decl.name);
                    self.write_value(library, value, out, depth + 1)?;
                }
                out.push(')');
            }
            other => out.push_str(&other.display()?),
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::library::Pou;
    use crate::types::TypeRef;
    use stplc_dsl::core::{Id, SourceSpan};

    fn var(types: &crate::types::TypeTable, name: &str, section: Section, ty: &str) -> VarDecl {
        let id = types.lookup(&Id::from(ty)).unwrap();
        let mut decl = VarDecl::new(
            Id::from(name),
            section,
            TypeRef::resolved(Id::from(ty), id),
            SourceSpan::default(),
        );
        decl.create_value(types).unwrap();
        decl
    }

    /// A program `MAIN` with an instance `t` of the function block `TIMER`.
    fn library() -> Library {
        let mut library = Library::new(8);
        let mut timer = Pou::new(Id::from("TIMER"), PouKind::FunctionBlock, SourceSpan::default());
        timer.vars.push(var(&library.types, "IN", Section::Input, "BOOL"));
        timer.vars.push(var(&library.types, "Q", Section::Output, "BOOL"));
        timer.vars.push(var(&library.types, "count", Section::Local, "INT"));
        library.add_pou(timer).unwrap();

        let mut main = Pou::new(Id::from("MAIN"), PouKind::Program, SourceSpan::default());
        main.vars.push(var(&library.types, "t", Section::Local, "TIMER"));
        library.add_pou(main).unwrap();
        library
    }

    #[test]
    fn new_when_program_has_function_block_then_binds_instance() {
        let library = library();
        let machine = Machine::new(&library, DirectMemory::new(8)).unwrap();
        let main = machine.program(library.find_pou(&Id::from("MAIN")).unwrap()).unwrap();
        let t = machine.value(&Place::instance(main, 0)).unwrap();
        assert!(matches!(
            t,
            Value::FunctionBlock(FbRef {
                instance: Some(_),
                ..
            })
        ));
        assert_eq!(machine.len(), 2);
    }

    #[test]
    fn display_when_function_block_then_shows_interface() {
        let library = library();
        let machine = Machine::new(&library, DirectMemory::new(8)).unwrap();
        let main = machine.program(library.find_pou(&Id::from("MAIN")).unwrap()).unwrap();
        let t = machine.value(&Place::instance(main, 0)).unwrap();
        assert_eq!(machine.display(&library, t).unwrap(), "(IN:false,Q:false)");
    }

    #[test]
    fn take_body_when_taken_then_error() {
        let library = library();
        let mut machine = Machine::new(&library, DirectMemory::new(8)).unwrap();
        let main = machine.program(library.find_pou(&Id::from("MAIN")).unwrap()).unwrap();
        let body = machine.take_body(main).unwrap();
        assert!(machine.take_body(main).is_err());
        machine.put_body(main, body);
        assert!(machine.take_body(main).is_ok());
    }
}
