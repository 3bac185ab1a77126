//! Input contract with the type-checking layer: declaration, type, scope and
//! qualifier tables, receiver values, and the smart-cast oracle. The engine
//! only ever reads these; the tables are populated before resolution starts.

use crate::span::{Span, Spanned, Symbol};
use index_vec::IndexVec;
use indexmap::IndexMap;
use std::cell::RefCell;

index_vec::define_index_type! {
    pub struct DeclarationID = u32;
}

index_vec::define_index_type! {
    pub struct ClassifierID = u32;
}

index_vec::define_index_type! {
    pub struct TypeID = u32;
}

index_vec::define_index_type! {
    pub struct ScopeID = u32;
}

index_vec::define_index_type! {
    pub struct QualifierID = u32;
}

index_vec::define_index_type! {
    pub struct FlowID = u32;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeclarationKind {
    Function,
    Variable,
    Constructor,
}

#[derive(Debug, Clone)]
pub struct Declaration {
    pub name: Symbol,
    pub kind: DeclarationKind,
    /// Value type, when the declaration denotes a value that can itself be
    /// called through the invoke convention.
    pub ty: Option<TypeID>,
    pub has_dispatch_receiver: bool,
    pub requires_extension_receiver: bool,
    pub visible: bool,
    pub synthesized: bool,
    pub error: bool,
}

impl Declaration {
    pub fn function(name: Symbol) -> Declaration {
        Declaration {
            name,
            kind: DeclarationKind::Function,
            ty: None,
            has_dispatch_receiver: false,
            requires_extension_receiver: false,
            visible: true,
            synthesized: false,
            error: false,
        }
    }

    pub fn variable(name: Symbol, ty: Option<TypeID>) -> Declaration {
        Declaration {
            kind: DeclarationKind::Variable,
            ty,
            ..Declaration::function(name)
        }
    }

    pub fn constructor(name: Symbol) -> Declaration {
        Declaration {
            kind: DeclarationKind::Constructor,
            ..Declaration::function(name)
        }
    }
}

/// A classifier visible in some scope. Its constructors are callable through
/// the function namespace; a singleton-like classifier additionally exposes a
/// pseudo-variable for its value.
#[derive(Debug, Clone)]
pub struct Classifier {
    pub name: Symbol,
    pub singleton: bool,
    pub class_value: Option<DeclarationID>,
    pub constructors: Vec<DeclarationID>,
    pub error: bool,
}

impl Classifier {
    pub fn new(name: Symbol) -> Classifier {
        Classifier {
            name,
            singleton: false,
            class_value: None,
            constructors: Vec::new(),
            error: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TypeData {
    pub name: Symbol,
    pub member_scope: ScopeID,
    pub supertype: Option<TypeID>,
    pub dynamic: bool,
    pub error: bool,
    /// Function-shaped type whose first parameter plays the extension
    /// receiver role, making the extension invoke convention applicable.
    pub extension_function: bool,
}

impl TypeData {
    pub fn new(name: Symbol, member_scope: ScopeID) -> TypeData {
        TypeData {
            name,
            member_scope,
            supertype: None,
            dynamic: false,
            error: false,
            extension_function: false,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScopeKind {
    /// Local declarations; these always shadow anything visited later.
    Locals,
    /// A non-local lexical scope, e.g. a type body.
    Declarations,
    /// An imported or importing scope.
    Importing,
}

/// A synthetic extension contributed by an importing scope, attached to the
/// candidate receiver type its declaration was derived for.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticExtension {
    pub receiver: TypeID,
    pub declaration: DeclarationID,
}

#[derive(Debug, Clone)]
pub struct Scope {
    pub kind: ScopeKind,
    pub parent: Option<ScopeID>,
    pub implicit_receiver: Option<ReceiverValue>,
    pub variables: IndexMap<Symbol, Vec<DeclarationID>>,
    pub functions: IndexMap<Symbol, Vec<DeclarationID>>,
    pub classifiers: IndexMap<Symbol, ClassifierID>,
    pub synthetic_variables: IndexMap<Symbol, Vec<SyntheticExtension>>,
    pub synthetic_functions: IndexMap<Symbol, Vec<SyntheticExtension>>,
}

impl Scope {
    pub fn new(kind: ScopeKind, parent: Option<ScopeID>) -> Scope {
        Scope {
            kind,
            parent,
            implicit_receiver: None,
            variables: IndexMap::new(),
            functions: IndexMap::new(),
            classifiers: IndexMap::new(),
            synthetic_variables: IndexMap::new(),
            synthetic_functions: IndexMap::new(),
        }
    }

    pub fn with_receiver(kind: ScopeKind, parent: Option<ScopeID>, receiver: ReceiverValue) -> Scope {
        Scope {
            implicit_receiver: Some(receiver),
            ..Scope::new(kind, parent)
        }
    }
}

/// A resolved receiver expression or implicit receiver: its static type plus
/// an optional handle into the data-flow facts that permit smart casts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ReceiverValue {
    pub ty: TypeID,
    pub flow: Option<FlowID>,
}

impl ReceiverValue {
    pub fn of(ty: TypeID) -> ReceiverValue {
        ReceiverValue { ty, flow: None }
    }
}

/// Data-flow facts for one receiver binding: the extra types it may be
/// treated as, and whether the binding is stable enough to rely on them.
#[derive(Debug, Clone)]
pub struct FlowFact {
    pub cast_types: Vec<TypeID>,
    pub stable: bool,
}

/// A type or namespace reference used without an expression value.
#[derive(Debug, Clone)]
pub struct Qualifier {
    pub name: Symbol,
    /// Nested classifiers and namespace members reachable from the qualifier.
    pub scope: ScopeID,
    /// The qualifier's value, when the referenced classifier has one.
    pub class_value: Option<ReceiverValue>,
}

/// The receiver written at the call site. Anything else is unrepresentable.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExplicitReceiver {
    None,
    Value(ReceiverValue),
    Qualifier(QualifierID),
}

#[derive(Default)]
pub struct SemanticModel {
    pub declarations: IndexVec<DeclarationID, Declaration>,
    pub classifiers: IndexVec<ClassifierID, Classifier>,
    pub types: IndexVec<TypeID, TypeData>,
    pub scopes: IndexVec<ScopeID, Scope>,
    pub qualifiers: IndexVec<QualifierID, Qualifier>,
    pub flow_facts: IndexVec<FlowID, FlowFact>,
    lookups: RefCell<Vec<Spanned<Symbol>>>,
}

impl SemanticModel {
    pub fn new() -> SemanticModel {
        Default::default()
    }

    pub fn create_declaration(&mut self, declaration: Declaration) -> DeclarationID {
        self.declarations.push(declaration)
    }

    pub fn create_classifier(&mut self, classifier: Classifier) -> ClassifierID {
        self.classifiers.push(classifier)
    }

    pub fn create_type(&mut self, data: TypeData) -> TypeID {
        self.types.push(data)
    }

    pub fn create_scope(&mut self, scope: Scope) -> ScopeID {
        self.scopes.push(scope)
    }

    pub fn create_qualifier(&mut self, qualifier: Qualifier) -> QualifierID {
        self.qualifiers.push(qualifier)
    }

    pub fn create_flow_fact(&mut self, fact: FlowFact) -> FlowID {
        self.flow_facts.push(fact)
    }

    pub fn declaration(&self, id: DeclarationID) -> &Declaration {
        &self.declarations[id]
    }

    pub fn classifier(&self, id: ClassifierID) -> &Classifier {
        &self.classifiers[id]
    }

    pub fn type_data(&self, id: TypeID) -> &TypeData {
        &self.types[id]
    }

    pub fn scope(&self, id: ScopeID) -> &Scope {
        &self.scopes[id]
    }

    pub fn qualifier(&self, id: QualifierID) -> &Qualifier {
        &self.qualifiers[id]
    }

    pub fn add_variable(&mut self, scope: ScopeID, declaration: DeclarationID) {
        let name = self.declarations[declaration].name;
        self.scopes[scope].variables.entry(name).or_default().push(declaration);
    }

    pub fn add_function(&mut self, scope: ScopeID, declaration: DeclarationID) {
        let name = self.declarations[declaration].name;
        self.scopes[scope].functions.entry(name).or_default().push(declaration);
    }

    pub fn add_classifier(&mut self, scope: ScopeID, classifier: ClassifierID) {
        let name = self.classifiers[classifier].name;
        self.scopes[scope].classifiers.insert(name, classifier);
    }

    pub fn add_synthetic_variable(&mut self, scope: ScopeID, extension: SyntheticExtension) {
        let name = self.declarations[extension.declaration].name;
        self.scopes[scope]
            .synthetic_variables
            .entry(name)
            .or_default()
            .push(extension);
    }

    pub fn add_synthetic_function(&mut self, scope: ScopeID, extension: SyntheticExtension) {
        let name = self.declarations[extension.declaration].name;
        self.scopes[scope]
            .synthetic_functions
            .entry(name)
            .or_default()
            .push(extension);
    }

    /// Scope chain from `from` outward through its parents.
    pub fn scope_chain(&self, from: ScopeID) -> impl Iterator<Item = ScopeID> + '_ {
        let mut current = Some(from);
        std::iter::from_fn(move || {
            let id = current?;
            current = self.scopes[id].parent;
            Some(id)
        })
    }

    pub fn smart_cast_types(&self, receiver: ReceiverValue) -> &[TypeID] {
        match receiver.flow {
            Some(flow) => &self.flow_facts[flow].cast_types,
            None => &[],
        }
    }

    pub fn is_stable_receiver(&self, receiver: ReceiverValue) -> bool {
        match receiver.flow {
            Some(flow) => self.flow_facts[flow].stable,
            None => true,
        }
    }

    /// The receiver's static type together with every smart-cast type.
    pub fn all_possible_types(&self, receiver: ReceiverValue) -> Vec<TypeID> {
        let mut types = vec![receiver.ty];
        types.extend_from_slice(self.smart_cast_types(receiver));
        types
    }

    pub fn record_lookup(&self, name: Symbol, location: Span) {
        self.lookups.borrow_mut().push(Spanned::new(name, location));
    }

    pub fn recorded_lookups(&self) -> Vec<Spanned<Symbol>> {
        self.lookups.borrow().clone()
    }
}
