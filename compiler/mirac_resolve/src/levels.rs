use crate::candidate::{Diagnostics, MemberCandidate, ResolutionDiagnostic};
use crate::models::{
    ClassifierID, DeclarationID, QualifierID, ReceiverValue, ScopeID, SemanticModel, TypeID,
};
use crate::span::Symbol;
use crate::tower::ScopeTower;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LookupKind {
    Variables,
    Functions,
}

/// One lookup unit within the tower. The set of strategies is closed; the
/// resolver matches exhaustively on it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TowerLevel {
    /// Member lookup on a concrete receiver value.
    Receiver(ReceiverValue),
    /// Static lookup through a type or namespace reference with no value.
    Qualifier(QualifierID),
    /// A plain lexical scope.
    Scope(ScopeID),
    /// An importing scope, which additionally contributes synthetic
    /// extensions.
    ImportingScope(ScopeID),
}

impl TowerLevel {
    pub fn variables(
        &self,
        tower: &ScopeTower<'_>,
        name: Symbol,
        extension_receiver: Option<ReceiverValue>,
    ) -> Vec<MemberCandidate> {
        self.collect(tower, name, LookupKind::Variables, extension_receiver)
    }

    pub fn functions(
        &self,
        tower: &ScopeTower<'_>,
        name: Symbol,
        extension_receiver: Option<ReceiverValue>,
    ) -> Vec<MemberCandidate> {
        self.collect(tower, name, LookupKind::Functions, extension_receiver)
    }

    /// Lookup never fails; an unresolvable name yields an empty collection
    /// and every semantic problem rides along as a candidate diagnostic.
    pub fn collect(
        &self,
        tower: &ScopeTower<'_>,
        name: Symbol,
        kind: LookupKind,
        extension_receiver: Option<ReceiverValue>,
    ) -> Vec<MemberCandidate> {
        tower.model.record_lookup(name, tower.location);
        match *self {
            TowerLevel::Receiver(receiver) => receiver_members(tower, receiver, name, kind),
            TowerLevel::Qualifier(qualifier) => {
                scope_members(tower.model, tower.model.qualifier(qualifier).scope, name, kind)
            }
            TowerLevel::Scope(scope) => scope_members(tower.model, scope, name, kind),
            TowerLevel::ImportingScope(scope) => {
                let mut result = scope_members(tower.model, scope, name, kind);
                result.extend(synthetic_members(tower, scope, name, kind, extension_receiver));
                result
            }
        }
    }
}

fn member_candidate(
    model: &SemanticModel,
    descriptor: DeclarationID,
    dispatch_receiver: Option<ReceiverValue>,
    special: Option<ResolutionDiagnostic>,
    smart_cast: Option<TypeID>,
) -> MemberCandidate {
    let mut diagnostics = Diagnostics::new();
    if let Some(diagnostic) = special {
        diagnostics.push(diagnostic);
    }

    let declaration = model.declaration(descriptor);
    if declaration.error {
        diagnostics.push(ResolutionDiagnostic::ErrorDescriptor);
    } else {
        if declaration.synthesized {
            diagnostics.push(ResolutionDiagnostic::Synthesized);
        }
        if let Some(ty) = smart_cast {
            diagnostics.push(ResolutionDiagnostic::SmartCast(ty));
        }
        if !declaration.visible {
            diagnostics.push(ResolutionDiagnostic::Invisible);
        }
    }

    MemberCandidate {
        descriptor,
        dispatch_receiver,
        diagnostics,
    }
}

fn receiver_members(
    tower: &ScopeTower<'_>,
    receiver: ReceiverValue,
    name: Symbol,
    kind: LookupKind,
) -> Vec<MemberCandidate> {
    let model = tower.model;
    let mut result = Vec::new();

    collect_from_type(model, receiver.ty, receiver, name, kind, None, None, &mut result);

    let stable = model.is_stable_receiver(receiver);
    for &cast in model.smart_cast_types(receiver) {
        let special = (!stable).then_some(ResolutionDiagnostic::UnstableSmartCast);
        collect_from_type(model, cast, receiver, name, kind, special, Some(cast), &mut result);
    }

    if model.type_data(receiver.ty).dynamic {
        if let Some(dynamic) = tower.dynamic_scope {
            let scope = model.scope(dynamic);
            let contributed = match kind {
                LookupKind::Variables => scope.variables.get(&name),
                LookupKind::Functions => scope.functions.get(&name),
            };
            for &descriptor in contributed.into_iter().flatten() {
                result.push(member_candidate(
                    model,
                    descriptor,
                    Some(receiver),
                    Some(ResolutionDiagnostic::DynamicLookup),
                    None,
                ));
            }
        }
    }

    result
}

fn collect_from_type(
    model: &SemanticModel,
    ty: TypeID,
    receiver: ReceiverValue,
    name: Symbol,
    kind: LookupKind,
    special: Option<ResolutionDiagnostic>,
    smart_cast: Option<TypeID>,
    result: &mut Vec<MemberCandidate>,
) {
    let scope = model.scope(model.type_data(ty).member_scope);
    match kind {
        LookupKind::Variables => {
            for &descriptor in scope.variables.get(&name).into_iter().flatten() {
                result.push(member_candidate(model, descriptor, Some(receiver), special, smart_cast));
            }
        }
        LookupKind::Functions => {
            for &descriptor in scope.functions.get(&name).into_iter().flatten() {
                result.push(member_candidate(model, descriptor, Some(receiver), special, smart_cast));
            }
            for descriptor in inner_constructors(model, ty, name) {
                result.push(member_candidate(model, descriptor, Some(receiver), special, smart_cast));
            }
        }
    }
}

/// Constructors of an inner classifier reachable through the receiver type
/// or its supertype chain. Only constructors that need a dispatch receiver
/// belong here; nested (static-like) constructors resolve through scopes.
fn inner_constructors(model: &SemanticModel, ty: TypeID, name: Symbol) -> Vec<DeclarationID> {
    let Some(classifier) = classifier_from_type_and_supers(model, ty, name) else {
        return Vec::new();
    };
    let classifier = model.classifier(classifier);
    if classifier.error || classifier.singleton {
        return Vec::new();
    }
    classifier
        .constructors
        .iter()
        .copied()
        .filter(|&constructor| model.declaration(constructor).has_dispatch_receiver)
        .collect()
}

fn classifier_from_type_and_supers(
    model: &SemanticModel,
    ty: TypeID,
    name: Symbol,
) -> Option<ClassifierID> {
    let mut current = Some(ty);
    while let Some(ty) = current {
        let data = model.type_data(ty);
        if let Some(&classifier) = model.scope(data.member_scope).classifiers.get(&name) {
            return Some(classifier);
        }
        current = data.supertype;
    }
    None
}

fn scope_members(
    model: &SemanticModel,
    scope_id: ScopeID,
    name: Symbol,
    kind: LookupKind,
) -> Vec<MemberCandidate> {
    let scope = model.scope(scope_id);
    let mut result = Vec::new();
    match kind {
        LookupKind::Variables => {
            for &descriptor in scope.variables.get(&name).into_iter().flatten() {
                result.push(member_candidate(model, descriptor, None, None, None));
            }
            // a bare reference to a singleton-like classifier is usable as a value
            if let Some(&classifier) = scope.classifiers.get(&name) {
                if let Some(value) = model.classifier(classifier).class_value {
                    result.push(member_candidate(model, value, None, None, None));
                }
            }
        }
        LookupKind::Functions => {
            for &descriptor in scope.functions.get(&name).into_iter().flatten() {
                result.push(member_candidate(model, descriptor, None, None, None));
            }
            if let Some(&classifier) = scope.classifiers.get(&name) {
                let classifier = model.classifier(classifier);
                if !classifier.error && !classifier.singleton {
                    for &constructor in &classifier.constructors {
                        if !model.declaration(constructor).has_dispatch_receiver {
                            result.push(member_candidate(model, constructor, None, None, None));
                        }
                    }
                }
            }
        }
    }
    result
}

fn synthetic_members(
    tower: &ScopeTower<'_>,
    scope_id: ScopeID,
    name: Symbol,
    kind: LookupKind,
    extension_receiver: Option<ReceiverValue>,
) -> Vec<MemberCandidate> {
    let model = tower.model;
    let scope = model.scope(scope_id);
    let table = match kind {
        LookupKind::Variables => &scope.synthetic_variables,
        LookupKind::Functions => &scope.synthetic_functions,
    };
    let Some(extensions) = table.get(&name) else {
        return Vec::new();
    };

    // with a receiver in hand its possible types gate the lookup, otherwise
    // the tower-wide candidate set does
    let receiver_types = match extension_receiver {
        Some(receiver) => model.all_possible_types(receiver),
        None => tower.synthetic_receiver_types().to_vec(),
    };

    extensions
        .iter()
        .filter(|extension| receiver_types.contains(&extension.receiver))
        .map(|extension| member_candidate(model, extension.declaration, None, None, None))
        .collect()
}
