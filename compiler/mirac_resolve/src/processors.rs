use crate::candidate::{Candidate, ExplicitReceiverKind};
use crate::invoke::{InvokeExtensionTowerProcessor, InvokeTowerProcessor};
use crate::levels::{LookupKind, TowerLevel};
use crate::models::{ExplicitReceiver, QualifierID, ReceiverValue};
use crate::resolver::{ResolutionContext, ScopeTowerProcessor, TowerData};

fn single_group(group: Vec<Candidate>) -> Vec<Vec<Candidate>> {
    if group.is_empty() { Vec::new() } else { vec![group] }
}

/// Injects an already-computed result without re-deriving it. The result is
/// emitted exactly once, at the start of the traversal.
pub struct KnownResultProcessor {
    result: Vec<Candidate>,
    delivered: bool,
}

impl KnownResultProcessor {
    pub fn new(result: Vec<Candidate>) -> KnownResultProcessor {
        KnownResultProcessor {
            result,
            delivered: false,
        }
    }

    pub fn empty() -> KnownResultProcessor {
        KnownResultProcessor::new(Vec::new())
    }
}

impl<'t> ScopeTowerProcessor<'t> for KnownResultProcessor {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        match data {
            TowerData::Empty if !self.delivered => {
                self.delivered = true;
                single_group(std::mem::take(&mut self.result))
            }
            _ => Vec::new(),
        }
    }
}

/// Concatenates the group lists of its children; child order is priority
/// order within every traversal step.
pub struct CompositeProcessor<'t> {
    children: Vec<Box<dyn ScopeTowerProcessor<'t> + 't>>,
}

impl<'t> CompositeProcessor<'t> {
    pub fn new(children: Vec<Box<dyn ScopeTowerProcessor<'t> + 't>>) -> CompositeProcessor<'t> {
        CompositeProcessor { children }
    }
}

impl<'t> ScopeTowerProcessor<'t> for CompositeProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        self.children
            .iter_mut()
            .flat_map(|child| child.process(data))
            .collect()
    }
}

/// Lookup for a call with a written receiver expression: members at the
/// `Empty` step, extension candidates at every level.
pub struct ExplicitReceiverProcessor<'t> {
    context: ResolutionContext<'t>,
    receiver: ReceiverValue,
    lookup: LookupKind,
}

impl<'t> ExplicitReceiverProcessor<'t> {
    pub fn new(
        context: ResolutionContext<'t>,
        receiver: ReceiverValue,
        lookup: LookupKind,
    ) -> ExplicitReceiverProcessor<'t> {
        ExplicitReceiverProcessor {
            context,
            receiver,
            lookup,
        }
    }

    fn resolve_as_member(&self) -> Vec<Candidate> {
        let context = &self.context;
        TowerLevel::Receiver(self.receiver)
            .collect(context.tower, context.name, self.lookup, None)
            .into_iter()
            .filter(|member| {
                !context
                    .tower
                    .model
                    .declaration(member.descriptor)
                    .requires_extension_receiver
            })
            .map(|member| {
                context.create_candidate(member, ExplicitReceiverKind::DispatchReceiver, None)
            })
            .collect()
    }

    fn resolve_as_extension(&self, level: &TowerLevel) -> Vec<Candidate> {
        let context = &self.context;
        level
            .collect(context.tower, context.name, self.lookup, Some(self.receiver))
            .into_iter()
            .filter(|member| {
                context
                    .tower
                    .model
                    .declaration(member.descriptor)
                    .requires_extension_receiver
            })
            .map(|member| {
                context.create_candidate(
                    member,
                    ExplicitReceiverKind::ExtensionReceiver,
                    Some(self.receiver),
                )
            })
            .collect()
    }
}

impl<'t> ScopeTowerProcessor<'t> for ExplicitReceiverProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        let group = match data {
            TowerData::Empty => self.resolve_as_member(),
            TowerData::Level(level) => self.resolve_as_extension(level),
            _ => Vec::new(),
        };
        single_group(group)
    }
}

/// Static members of a qualifier; never active past the `Empty` step.
pub struct QualifierProcessor<'t> {
    context: ResolutionContext<'t>,
    qualifier: QualifierID,
    lookup: LookupKind,
}

impl<'t> QualifierProcessor<'t> {
    pub fn new(
        context: ResolutionContext<'t>,
        qualifier: QualifierID,
        lookup: LookupKind,
    ) -> QualifierProcessor<'t> {
        QualifierProcessor {
            context,
            qualifier,
            lookup,
        }
    }
}

impl<'t> ScopeTowerProcessor<'t> for QualifierProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        if !matches!(data, TowerData::Empty) {
            return Vec::new();
        }
        let context = &self.context;
        let group = TowerLevel::Qualifier(self.qualifier)
            .collect(context.tower, context.name, self.lookup, None)
            .into_iter()
            .filter(|member| {
                !context
                    .tower
                    .model
                    .declaration(member.descriptor)
                    .requires_extension_receiver
            })
            .map(|member| {
                context.create_candidate(member, ExplicitReceiverKind::NoExplicitReceiver, None)
            })
            .collect();
        single_group(group)
    }
}

/// Lookup for a call with no written receiver: plain candidates at each
/// level, extension candidates satisfied by the paired implicit receiver.
pub struct NoExplicitReceiverProcessor<'t> {
    context: ResolutionContext<'t>,
    lookup: LookupKind,
}

impl<'t> NoExplicitReceiverProcessor<'t> {
    pub fn new(context: ResolutionContext<'t>, lookup: LookupKind) -> NoExplicitReceiverProcessor<'t> {
        NoExplicitReceiverProcessor { context, lookup }
    }
}

impl<'t> ScopeTowerProcessor<'t> for NoExplicitReceiverProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        let context = &self.context;
        let group = match data {
            TowerData::Level(level) => level
                .collect(context.tower, context.name, self.lookup, None)
                .into_iter()
                .filter(|member| {
                    !context
                        .tower
                        .model
                        .declaration(member.descriptor)
                        .requires_extension_receiver
                })
                .map(|member| {
                    context.create_candidate(member, ExplicitReceiverKind::NoExplicitReceiver, None)
                })
                .collect(),
            TowerData::LevelAndImplicitReceiver(level, receiver) => level
                .collect(context.tower, context.name, self.lookup, Some(receiver))
                .into_iter()
                .filter(|member| {
                    context
                        .tower
                        .model
                        .declaration(member.descriptor)
                        .requires_extension_receiver
                })
                .map(|member| {
                    // no receiver was written at the call site even though
                    // the implicit receiver fills the extension slot
                    context.create_candidate(
                        member,
                        ExplicitReceiverKind::NoExplicitReceiver,
                        Some(receiver),
                    )
                })
                .collect(),
            _ => Vec::new(),
        };
        single_group(group)
    }
}

pub fn simple_processor<'t>(
    context: ResolutionContext<'t>,
    explicit_receiver: ExplicitReceiver,
    lookup: LookupKind,
    class_value_receiver: bool,
) -> Box<dyn ScopeTowerProcessor<'t> + 't> {
    match explicit_receiver {
        ExplicitReceiver::Value(receiver) => {
            Box::new(ExplicitReceiverProcessor::new(context, receiver, lookup))
        }
        ExplicitReceiver::Qualifier(qualifier) => {
            let qualifier_processor = Box::new(QualifierProcessor::new(context, qualifier, lookup));
            if !class_value_receiver {
                return qualifier_processor;
            }
            match context.tower.model.qualifier(qualifier).class_value {
                Some(class_value) => Box::new(CompositeProcessor::new(vec![
                    qualifier_processor,
                    Box::new(ExplicitReceiverProcessor::new(context, class_value, lookup)),
                ])),
                None => qualifier_processor,
            }
        }
        ExplicitReceiver::None => Box::new(NoExplicitReceiverProcessor::new(context, lookup)),
    }
}

pub fn variable_processor<'t>(
    context: ResolutionContext<'t>,
    explicit_receiver: ExplicitReceiver,
    class_value_receiver: bool,
) -> Box<dyn ScopeTowerProcessor<'t> + 't> {
    simple_processor(context, explicit_receiver, LookupKind::Variables, class_value_receiver)
}

pub fn simple_function_processor<'t>(
    context: ResolutionContext<'t>,
    explicit_receiver: ExplicitReceiver,
) -> Box<dyn ScopeTowerProcessor<'t> + 't> {
    simple_processor(context, explicit_receiver, LookupKind::Functions, true)
}

/// The processor for a plain call: the direct function interpretation, the
/// variable-plus-invoke interpretation, and the extension invoke
/// interpretation, in that priority order.
pub fn function_processor<'t>(
    context: ResolutionContext<'t>,
    explicit_receiver: ExplicitReceiver,
) -> CompositeProcessor<'t> {
    let simple = simple_function_processor(context, explicit_receiver);
    let invoke = Box::new(InvokeTowerProcessor::new(context, explicit_receiver));
    let invoke_extension = with_receiver_value_or_empty(context, explicit_receiver, |receiver| {
        Box::new(InvokeExtensionTowerProcessor::new(context, receiver))
    });
    CompositeProcessor::new(vec![simple, invoke, invoke_extension])
}

/// Runs `create` with the receiver's value form, or yields nothing when a
/// qualifier has no value to offer.
pub fn with_receiver_value_or_empty<'t>(
    context: ResolutionContext<'t>,
    explicit_receiver: ExplicitReceiver,
    create: impl FnOnce(Option<ReceiverValue>) -> Box<dyn ScopeTowerProcessor<'t> + 't>,
) -> Box<dyn ScopeTowerProcessor<'t> + 't> {
    match explicit_receiver {
        ExplicitReceiver::Qualifier(qualifier) => {
            match context.tower.model.qualifier(qualifier).class_value {
                Some(class_value) => create(Some(class_value)),
                None => Box::new(KnownResultProcessor::empty()),
            }
        }
        ExplicitReceiver::Value(receiver) => create(Some(receiver)),
        ExplicitReceiver::None => create(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::DiagnosticJudge;
    use crate::models::{
        Declaration, DeclarationID, Qualifier, Scope, ScopeID, ScopeKind, SemanticModel, TypeData,
        TypeID,
    };
    use crate::span::{FileID, Span, Symbol};
    use crate::tower::ScopeTower;

    fn sym(s: &str) -> Symbol {
        Symbol::new(s)
    }

    fn loc() -> Span {
        Span::empty(FileID::new(0))
    }

    fn ty(model: &mut SemanticModel, name: &str) -> TypeID {
        let members = model.create_scope(Scope::new(ScopeKind::Declarations, None));
        model.create_type(TypeData::new(sym(name), members))
    }

    fn candidate(descriptor: DeclarationID) -> Candidate {
        Candidate {
            descriptor,
            dispatch_receiver: None,
            extension_receiver: None,
            receiver_kind: ExplicitReceiverKind::NoExplicitReceiver,
            diagnostics: Default::default(),
            through_variable: None,
        }
    }

    struct Fixture {
        model: SemanticModel,
        block: ScopeID,
    }

    fn fixture() -> Fixture {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let block = model.create_scope(Scope::new(ScopeKind::Locals, Some(root)));
        Fixture { model, block }
    }

    #[test]
    fn known_result_fires_exactly_once_on_empty() {
        let fx = fixture();
        let injected = candidate(DeclarationID::new(0));
        let mut processor = KnownResultProcessor::new(vec![injected]);
        let level = TowerLevel::Scope(fx.block);

        assert!(processor.process(TowerData::Level(&level)).is_empty());
        assert_eq!(processor.process(TowerData::Empty).len(), 1);
        assert!(processor.process(TowerData::Empty).is_empty());
    }

    #[test]
    fn explicit_receiver_splits_members_and_extensions_by_step() {
        let mut fx = fixture();
        let host = ty(&mut fx.model, "Host");
        let members = fx.model.type_data(host).member_scope;

        let mut member = Declaration::function(sym("f"));
        member.has_dispatch_receiver = true;
        let member = fx.model.create_declaration(member);
        fx.model.add_function(members, member);

        // a member extension must not masquerade as a plain member
        let mut member_extension = Declaration::function(sym("f"));
        member_extension.has_dispatch_receiver = true;
        member_extension.requires_extension_receiver = true;
        let member_extension = fx.model.create_declaration(member_extension);
        fx.model.add_function(members, member_extension);

        let mut extension = Declaration::function(sym("f"));
        extension.requires_extension_receiver = true;
        let extension = fx.model.create_declaration(extension);
        fx.model.add_function(fx.block, extension);

        let receiver = crate::models::ReceiverValue::of(host);
        let tower = ScopeTower::new(
            &fx.model,
            fx.block,
            crate::models::ExplicitReceiver::Value(receiver),
            None,
            loc(),
        );
        let context = ResolutionContext::new(sym("f"), &tower, &DiagnosticJudge);
        let mut processor =
            ExplicitReceiverProcessor::new(context, receiver, LookupKind::Functions);

        let at_empty = processor.process(TowerData::Empty);
        assert_eq!(at_empty.len(), 1);
        assert_eq!(at_empty[0].len(), 1);
        assert_eq!(at_empty[0][0].descriptor, member);
        assert_eq!(at_empty[0][0].receiver_kind, ExplicitReceiverKind::DispatchReceiver);

        let level = TowerLevel::Scope(fx.block);
        let at_level = processor.process(TowerData::Level(&level));
        assert_eq!(at_level.len(), 1);
        assert_eq!(at_level[0].len(), 1);
        assert_eq!(at_level[0][0].descriptor, extension);
        assert_eq!(at_level[0][0].receiver_kind, ExplicitReceiverKind::ExtensionReceiver);
        assert_eq!(at_level[0][0].extension_receiver, Some(receiver));
    }

    #[test]
    fn no_explicit_receiver_binds_implicit_extensions() {
        let mut fx = fixture();
        let host = ty(&mut fx.model, "Host");

        let plain = fx.model.create_declaration(Declaration::function(sym("f")));
        fx.model.add_function(fx.block, plain);
        let mut extension = Declaration::function(sym("f"));
        extension.requires_extension_receiver = true;
        let extension = fx.model.create_declaration(extension);
        fx.model.add_function(fx.block, extension);

        let tower = ScopeTower::new(
            &fx.model,
            fx.block,
            crate::models::ExplicitReceiver::None,
            None,
            loc(),
        );
        let context = ResolutionContext::new(sym("f"), &tower, &DiagnosticJudge);
        let mut processor = NoExplicitReceiverProcessor::new(context, LookupKind::Functions);

        let level = TowerLevel::Scope(fx.block);
        let at_level = processor.process(TowerData::Level(&level));
        assert_eq!(at_level[0].len(), 1);
        assert_eq!(at_level[0][0].descriptor, plain);

        let receiver = crate::models::ReceiverValue::of(host);
        let paired = processor.process(TowerData::LevelAndImplicitReceiver(&level, receiver));
        assert_eq!(paired[0].len(), 1);
        assert_eq!(paired[0][0].descriptor, extension);
        assert_eq!(paired[0][0].receiver_kind, ExplicitReceiverKind::NoExplicitReceiver);
        assert_eq!(paired[0][0].extension_receiver, Some(receiver));
    }

    #[test]
    fn qualifier_processor_is_empty_step_only() {
        let mut fx = fixture();
        let statics = fx.model.create_scope(Scope::new(ScopeKind::Declarations, None));
        let of = fx.model.create_declaration(Declaration::function(sym("of")));
        fx.model.add_function(statics, of);
        let qualifier = fx.model.create_qualifier(Qualifier {
            name: sym("Registry"),
            scope: statics,
            class_value: None,
        });

        let tower = ScopeTower::new(
            &fx.model,
            fx.block,
            crate::models::ExplicitReceiver::Qualifier(qualifier),
            None,
            loc(),
        );
        let context = ResolutionContext::new(sym("of"), &tower, &DiagnosticJudge);
        let mut processor = QualifierProcessor::new(context, qualifier, LookupKind::Functions);

        assert_eq!(processor.process(TowerData::Empty)[0][0].descriptor, of);
        let level = TowerLevel::Scope(fx.block);
        assert!(processor.process(TowerData::Level(&level)).is_empty());
    }

    #[test]
    fn qualifier_with_class_value_also_searches_its_members() {
        let mut fx = fixture();
        let singleton_ty = ty(&mut fx.model, "Config");
        let members = fx.model.type_data(singleton_ty).member_scope;
        let mut member = Declaration::function(sym("load"));
        member.has_dispatch_receiver = true;
        let member = fx.model.create_declaration(member);
        fx.model.add_function(members, member);

        let statics = fx.model.create_scope(Scope::new(ScopeKind::Declarations, None));
        let class_value = crate::models::ReceiverValue::of(singleton_ty);
        let qualifier = fx.model.create_qualifier(Qualifier {
            name: sym("Config"),
            scope: statics,
            class_value: Some(class_value),
        });

        let tower = ScopeTower::new(
            &fx.model,
            fx.block,
            crate::models::ExplicitReceiver::Qualifier(qualifier),
            None,
            loc(),
        );
        let context = ResolutionContext::new(sym("load"), &tower, &DiagnosticJudge);
        let mut processor = simple_processor(
            context,
            crate::models::ExplicitReceiver::Qualifier(qualifier),
            LookupKind::Functions,
            true,
        );

        let at_empty = processor.process(TowerData::Empty);
        assert_eq!(at_empty.len(), 1);
        assert_eq!(at_empty[0][0].descriptor, member);
        assert_eq!(at_empty[0][0].receiver_kind, ExplicitReceiverKind::DispatchReceiver);
    }

    #[test]
    fn composite_preserves_child_order() {
        let first = candidate(DeclarationID::new(0));
        let second = candidate(DeclarationID::new(1));
        let mut processor = CompositeProcessor::new(vec![
            Box::new(KnownResultProcessor::new(vec![first])),
            Box::new(KnownResultProcessor::new(vec![second])),
        ]);

        let groups = processor.process(TowerData::Empty);
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0][0].descriptor, DeclarationID::new(0));
        assert_eq!(groups[1][0].descriptor, DeclarationID::new(1));
    }
}
