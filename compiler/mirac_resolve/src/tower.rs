use crate::levels::TowerLevel;
use crate::models::{ExplicitReceiver, ReceiverValue, ScopeID, ScopeKind, SemanticModel, TypeID};
use crate::span::Span;
use std::cell::OnceCell;

/// Everything one call-site resolution consults: the implicit receiver
/// hierarchy, the ordered level list, and the smart-cast facts behind the
/// model handle. Built once per call site and read-only afterwards.
pub struct ScopeTower<'m> {
    pub model: &'m SemanticModel,
    pub location: Span,
    pub lexical_scope: ScopeID,
    pub explicit_receiver: ExplicitReceiver,
    pub dynamic_scope: Option<ScopeID>,
    /// Implicit receivers, nearest scope first. Receivers with an erroneous
    /// static type are dropped up front.
    pub implicit_receivers: Vec<ReceiverValue>,
    levels: Vec<TowerLevel>,
    synthetic_receivers: OnceCell<Vec<TypeID>>,
}

impl<'m> ScopeTower<'m> {
    pub fn new(
        model: &'m SemanticModel,
        lexical_scope: ScopeID,
        explicit_receiver: ExplicitReceiver,
        dynamic_scope: Option<ScopeID>,
        location: Span,
    ) -> ScopeTower<'m> {
        let implicit_receivers = model
            .scope_chain(lexical_scope)
            .filter_map(|scope| model.scope(scope).implicit_receiver)
            .filter(|receiver| !model.type_data(receiver.ty).error)
            .collect();

        ScopeTower {
            model,
            location,
            lexical_scope,
            explicit_receiver,
            dynamic_scope,
            implicit_receivers,
            levels: build_levels(model, lexical_scope),
            synthetic_receivers: OnceCell::new(),
        }
    }

    pub fn levels(&self) -> &[TowerLevel] {
        &self.levels
    }

    /// Candidate receiver types for synthetic extensions. Not needed before
    /// an importing level is actually reached, so computed on first access.
    pub fn synthetic_receiver_types(&self) -> &[TypeID] {
        self.synthetic_receivers.get_or_init(|| match self.explicit_receiver {
            ExplicitReceiver::Value(receiver) => self.model.all_possible_types(receiver),
            ExplicitReceiver::Qualifier(qualifier) => self
                .model
                .qualifier(qualifier)
                .class_value
                .map(|receiver| self.model.all_possible_types(receiver))
                .unwrap_or_default(),
            ExplicitReceiver::None => self
                .implicit_receivers
                .iter()
                .flat_map(|receiver| self.model.all_possible_types(*receiver))
                .collect(),
        })
    }
}

fn build_levels(model: &SemanticModel, from: ScopeID) -> Vec<TowerLevel> {
    let mut levels = Vec::new();

    // locals win
    for scope in model.scope_chain(from) {
        if model.scope(scope).kind == ScopeKind::Locals {
            levels.push(TowerLevel::Scope(scope));
        }
    }

    for scope_id in model.scope_chain(from) {
        let scope = model.scope(scope_id);
        match scope.kind {
            ScopeKind::Locals => {}
            ScopeKind::Declarations => levels.push(TowerLevel::Scope(scope_id)),
            ScopeKind::Importing => {
                levels.push(TowerLevel::ImportingScope(scope_id));
                continue;
            }
        }
        if let Some(receiver) = scope.implicit_receiver {
            levels.push(TowerLevel::Receiver(receiver));
        }
    }

    levels
}
