//! Deferred resolution of named references.
//!
//! The parser cannot know what a name refers to because the declaration may
//! come later or be in another compilation unit. Instead, it registers each
//! reference in a pool together with a callback that wires the reference up
//! once the name is known.
//!
//! Resolution happens in two steps. `resolve` looks up every name in a
//! symbol table and remembers the result. `trigger_resolve_callbacks` then
//! invokes the callbacks: first the `resolved` callback of every reference
//! and then, only if all of those succeeded, the `check` callbacks. A check
//! may therefore assume that every reference in the pool is wired up.
use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;

use log::trace;
use stplc_dsl::{core::Id, core::SourceSpan, diagnostic::Diagnostic};

/// Maps names to symbols.
pub trait SymbolTable<T> {
    fn lookup(&self, name: &Id) -> Option<T>;
}

impl<K, T> SymbolTable<T> for HashMap<K, T>
where
    K: Eq + Hash + std::borrow::Borrow<Id>,
    T: Clone,
{
    fn lookup(&self, name: &Id) -> Option<T> {
        self.get(name).cloned()
    }
}

/// A reference registered in a pool.
#[derive(Clone, Debug)]
pub struct Reference<R> {
    /// The name of the referenced item. Post-resolve checks have no name.
    pub name: Option<Id>,
    /// Identifies the item that holds the reference.
    pub referrer: R,
    pub span: SourceSpan,
}

impl<R> Reference<R> {
    /// The referenced name as written, or an empty string for checks.
    pub fn text(&self) -> &str {
        self.name.as_ref().map(|n| n.original()).unwrap_or("")
    }
}

/// Invoked once the name is resolved. The symbol is `None` when the name
/// was not found; the callback returns the diagnostic to report.
pub type ResolvedFn<C, R, T> = fn(&mut C, &Reference<R>, Option<&T>) -> Result<(), Diagnostic>;

/// Invoked after every `ResolvedFn` in the pool succeeded.
pub type CheckFn<C, R> = fn(&mut C, &Reference<R>) -> Result<(), Diagnostic>;

/// The result of looking up a name.
#[derive(Clone, Debug, PartialEq)]
pub enum Resolution<T> {
    Unresolved,
    Found(T),
    NotFound,
}

struct Entry<C, R, T> {
    reference: Reference<R>,
    resolved: ResolvedFn<C, R, T>,
    check: Option<CheckFn<C, R>>,
}

/// The references to one name.
struct Group<C, R, T> {
    name: Id,
    resolution: Resolution<T>,
    entries: Vec<Entry<C, R, T>>,
}

/// A pool of references for one scope. Groups are kept in the order that
/// names were first referenced so that diagnostics are deterministic.
pub struct RefPool<C, R, T> {
    groups: Vec<Group<C, R, T>>,
    index: HashMap<Id, usize>,
    post_resolve: Vec<(Reference<R>, CheckFn<C, R>)>,
}

impl<C, R, T> Default for RefPool<C, R, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<C, R, T> fmt::Debug for RefPool<C, R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RefPool")
            .field(
                "names",
                &self.groups.iter().map(|g| &g.name).collect::<Vec<_>>(),
            )
            .field("post_resolve", &self.post_resolve.len())
            .finish()
    }
}

impl<C, R, T> RefPool<C, R, T> {
    pub fn new() -> Self {
        Self {
            groups: vec![],
            index: HashMap::new(),
            post_resolve: vec![],
        }
    }

    fn group(&mut self, name: &Id) -> &mut Group<C, R, T> {
        let position = match self.index.get(name) {
            Some(position) => *position,
            None => {
                let position = self.groups.len();
                self.groups.push(Group {
                    name: name.clone(),
                    resolution: Resolution::Unresolved,
                    entries: vec![],
                });
                self.index.insert(name.clone(), position);
                position
            }
        };
        &mut self.groups[position]
    }

    /// Registers a reference to the name.
    pub fn add(&mut self, name: Id, referrer: R, span: SourceSpan, resolved: ResolvedFn<C, R, T>) {
        self.add_entry(name, referrer, span, resolved, None);
    }

    /// Registers a reference to the name that is checked after every
    /// reference in the pool is resolved.
    pub fn add_two_step(
        &mut self,
        name: Id,
        referrer: R,
        span: SourceSpan,
        resolved: ResolvedFn<C, R, T>,
        check: CheckFn<C, R>,
    ) {
        self.add_entry(name, referrer, span, resolved, Some(check));
    }

    fn add_entry(
        &mut self,
        name: Id,
        referrer: R,
        span: SourceSpan,
        resolved: ResolvedFn<C, R, T>,
        check: Option<CheckFn<C, R>>,
    ) {
        let group = self.group(&name);
        group.entries.push(Entry {
            reference: Reference {
                name: Some(name),
                referrer,
                span,
            },
            resolved,
            check,
        });
    }

    /// Registers a check that does not look up a name. The check runs with
    /// the other checks after every reference is resolved.
    pub fn add_post_resolve(&mut self, referrer: R, span: SourceSpan, check: CheckFn<C, R>) {
        self.post_resolve.push((
            Reference {
                name: None,
                referrer,
                span,
            },
            check,
        ));
    }

    /// Looks up every referenced name in the table and stores the result.
    /// Does not invoke any callbacks.
    pub fn resolve(&mut self, table: &dyn SymbolTable<T>) {
        for group in self.groups.iter_mut() {
            group.resolution = match table.lookup(&group.name) {
                Some(symbol) => Resolution::Found(symbol),
                None => Resolution::NotFound,
            };
            trace!(
                "Resolved {} ({} references): {}",
                group.name,
                group.entries.len(),
                matches!(group.resolution, Resolution::Found(_))
            );
        }
    }

    /// Invokes the callbacks for every reference in the pool.
    ///
    /// Returns every diagnostic from the `resolved` callbacks, or if there
    /// were none, every diagnostic from the checks.
    pub fn trigger_resolve_callbacks(&self, context: &mut C) -> Result<(), Vec<Diagnostic>> {
        let mut errors = vec![];
        for group in &self.groups {
            let symbol = match &group.resolution {
                Resolution::Found(symbol) => Some(symbol),
                Resolution::NotFound => None,
                Resolution::Unresolved => {
                    if let Some(entry) = group.entries.first() {
                        errors.push(Diagnostic::internal(
                            &entry.reference.span,
                            format!("Reference to {} triggered before resolving", group.name),
                        ));
                    }
                    continue;
                }
            };
            for entry in &group.entries {
                if let Err(diagnostic) = (entry.resolved)(context, &entry.reference, symbol) {
                    errors.push(diagnostic);
                }
            }
        }
        if !errors.is_empty() {
            return Err(errors);
        }

        for group in &self.groups {
            for entry in &group.entries {
                if let Some(check) = entry.check {
                    if let Err(diagnostic) = check(context, &entry.reference) {
                        errors.push(diagnostic);
                    }
                }
            }
        }
        for (reference, check) in &self.post_resolve {
            if let Err(diagnostic) = check(context, reference) {
                errors.push(diagnostic);
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Forgets the results of `resolve` so that the pool can be resolved
    /// again.
    pub fn reset_resolved(&mut self) {
        for group in self.groups.iter_mut() {
            group.resolution = Resolution::Unresolved;
        }
    }

    /// The stored result of looking up the name.
    pub fn resolution(&self, name: &Id) -> Option<&Resolution<T>> {
        self.index.get(name).map(|i| &self.groups[*i].resolution)
    }

    /// The number of references, including post-resolve checks.
    pub fn len(&self) -> usize {
        self.groups.iter().map(|g| g.entries.len()).sum::<usize>() + self.post_resolve.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Moves the references of the other pool into this pool.
    pub fn append(&mut self, other: RefPool<C, R, T>) {
        for group in other.groups {
            for entry in group.entries {
                let Entry {
                    reference,
                    resolved,
                    check,
                } = entry;
                if let Some(name) = reference.name {
                    self.add_entry(name, reference.referrer, reference.span, resolved, check);
                }
            }
        }
        self.post_resolve.extend(other.post_resolve);
    }
}
