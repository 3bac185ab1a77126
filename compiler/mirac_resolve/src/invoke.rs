//! Second-order resolution for calls that may go through a value: resolve
//! the name as a variable, then resolve an invoke call on each discovered
//! variable's value across every tower position already visited.

use crate::candidate::{Candidate, Diagnostics, ExplicitReceiverKind, MemberCandidate};
use crate::levels::LookupKind;
use crate::models::{ExplicitReceiver, ReceiverValue};
use crate::processors::{
    variable_processor, ExplicitReceiverProcessor, CompositeProcessor, KnownResultProcessor,
};
use crate::resolver::{ResolutionContext, ScopeTowerProcessor, TowerData};
use crate::span::Symbol;
use crate::tower::ScopeTower;

pub(crate) fn invoke_name() -> Symbol {
    Symbol::new("invoke")
}

struct VariableInvokeProcessor<'t> {
    variable: Candidate,
    inner: Box<dyn ScopeTowerProcessor<'t> + 't>,
}

impl<'t> VariableInvokeProcessor<'t> {
    fn process(&mut self, context: ResolutionContext<'t>, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        self.inner
            .process(data)
            .into_iter()
            .map(|group| {
                group
                    .into_iter()
                    .map(|candidate| context.transform_candidate(&self.variable, candidate))
                    .collect()
            })
            .collect()
    }
}

fn process_variable_group<'t>(
    context: ResolutionContext<'t>,
    processors: &mut [VariableInvokeProcessor<'t>],
    data: TowerData<'t>,
) -> Vec<Vec<Candidate>> {
    match processors {
        [] => Vec::new(),
        [single] => single.process(context, data),
        // same-name variable overloads at one depth stay a single group;
        // picking between their invoke results belongs to the
        // applicability stage
        _ => {
            let merged: Vec<Candidate> = processors
                .iter_mut()
                .flat_map(|processor| processor.process(context, data).into_iter().flatten())
                .collect();
            if merged.is_empty() { Vec::new() } else { vec![merged] }
        }
    }
}

/// Shared machinery of the invoke processors: runs the variable lookup,
/// keeps an append-only log of visited positions, and replays that log
/// through a fresh invoke sub-processor for every new variable candidate.
/// A variable may surface at a later position than the invoke target it
/// pairs with, so the replay is what makes the search complete.
struct InvokeCore<'t> {
    context: ResolutionContext<'t>,
    variable_processor: Box<dyn ScopeTowerProcessor<'t> + 't>,
    previous_data: Vec<TowerData<'t>>,
    invoke_processors: Vec<Vec<VariableInvokeProcessor<'t>>>,
}

impl<'t> InvokeCore<'t> {
    fn new(
        context: ResolutionContext<'t>,
        variable_processor: Box<dyn ScopeTowerProcessor<'t> + 't>,
    ) -> InvokeCore<'t> {
        InvokeCore {
            context,
            variable_processor,
            previous_data: Vec::new(),
            invoke_processors: Vec::new(),
        }
    }

    fn process(
        &mut self,
        data: TowerData<'t>,
        mut create: impl FnMut(&Candidate) -> Box<dyn ScopeTowerProcessor<'t> + 't>,
    ) -> Vec<Vec<Candidate>> {
        self.previous_data.push(data);
        let context = self.context;

        let mut groups = Vec::new();
        for processors in self.invoke_processors.iter_mut() {
            groups.extend(process_variable_group(context, processors, data));
        }

        for variable_group in self.variable_processor.process(data) {
            let successful: Vec<Candidate> = variable_group
                .into_iter()
                .filter(|candidate| context.applicability(candidate).is_success())
                .collect();
            if successful.is_empty() {
                continue;
            }

            let mut processors: Vec<VariableInvokeProcessor<'t>> = successful
                .into_iter()
                .map(|variable| {
                    let inner = create(&variable);
                    VariableInvokeProcessor { variable, inner }
                })
                .collect();

            for &old in self.previous_data.iter() {
                groups.extend(process_variable_group(context, &mut processors, old));
            }
            self.invoke_processors.push(processors);
        }

        groups
    }
}

/// `a.f()` read as property `a.f` plus `f.invoke()`.
pub struct InvokeTowerProcessor<'t> {
    core: InvokeCore<'t>,
}

impl<'t> InvokeTowerProcessor<'t> {
    pub fn new(
        context: ResolutionContext<'t>,
        explicit_receiver: ExplicitReceiver,
    ) -> InvokeTowerProcessor<'t> {
        let variables = variable_processor(context, explicit_receiver, true);
        InvokeTowerProcessor {
            core: InvokeCore::new(context, variables),
        }
    }
}

impl<'t> ScopeTowerProcessor<'t> for InvokeTowerProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        let context = self.core.context;
        self.core
            .process(data, |variable| plain_invoke_processor(context, variable))
    }
}

fn plain_invoke_processor<'t>(
    context: ResolutionContext<'t>,
    variable: &Candidate,
) -> Box<dyn ScopeTowerProcessor<'t> + 't> {
    match context.context_for_invoke(variable) {
        Some((receiver, invoke_context)) => Box::new(ExplicitReceiverProcessor::new(
            invoke_context,
            receiver,
            LookupKind::Functions,
        )),
        None => Box::new(KnownResultProcessor::empty()),
    }
}

/// `a.f()` where property `f` has an extension-function-shaped type and the
/// written receiver `a` becomes the extension argument of `f.invoke(..)`.
/// The variable itself is resolved receiver-stripped.
pub struct InvokeExtensionTowerProcessor<'t> {
    core: InvokeCore<'t>,
    explicit_receiver: Option<ReceiverValue>,
}

impl<'t> InvokeExtensionTowerProcessor<'t> {
    pub fn new(
        context: ResolutionContext<'t>,
        explicit_receiver: Option<ReceiverValue>,
    ) -> InvokeExtensionTowerProcessor<'t> {
        let variables = variable_processor(context, ExplicitReceiver::None, true);
        InvokeExtensionTowerProcessor {
            core: InvokeCore::new(context, variables),
            explicit_receiver,
        }
    }
}

impl<'t> ScopeTowerProcessor<'t> for InvokeExtensionTowerProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        let context = self.core.context;
        let explicit_receiver = self.explicit_receiver;
        self.core.process(data, |variable| {
            extension_invoke_processor(context, variable, explicit_receiver)
        })
    }
}

fn extension_invoke_processor<'t>(
    context: ResolutionContext<'t>,
    variable: &Candidate,
    explicit_receiver: Option<ReceiverValue>,
) -> Box<dyn ScopeTowerProcessor<'t> + 't> {
    let Some((receiver, invoke_context)) = context.context_for_invoke(variable) else {
        return Box::new(KnownResultProcessor::empty());
    };
    let Some(member) = extension_invoke_member(context.tower, receiver) else {
        return Box::new(KnownResultProcessor::empty());
    };
    Box::new(InvokeExtensionProcessor {
        context: invoke_context,
        member,
        explicit_receiver,
    })
}

/// The invoke member of an extension-function-shaped type, bound to the
/// value it will be called on. It ranks as a member, so no synthesized
/// diagnostic is attached.
fn extension_invoke_member(tower: &ScopeTower<'_>, receiver: ReceiverValue) -> Option<MemberCandidate> {
    let model = tower.model;
    let data = model.type_data(receiver.ty);
    if !data.extension_function {
        return None;
    }
    let invokes = model.scope(data.member_scope).functions.get(&invoke_name())?;
    let [descriptor] = invokes.as_slice() else {
        unreachable!("extension function type must declare exactly one invoke member");
    };
    Some(MemberCandidate {
        descriptor: *descriptor,
        dispatch_receiver: Some(receiver),
        diagnostics: Diagnostics::new(),
    })
}

struct InvokeExtensionProcessor<'t> {
    context: ResolutionContext<'t>,
    member: MemberCandidate,
    explicit_receiver: Option<ReceiverValue>,
}

impl<'t> ScopeTowerProcessor<'t> for InvokeExtensionProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>> {
        match (self.explicit_receiver, data) {
            (Some(receiver), TowerData::Empty) => {
                vec![vec![self.context.create_candidate(
                    self.member.clone(),
                    ExplicitReceiverKind::BothReceivers,
                    Some(receiver),
                )]]
            }
            (None, TowerData::OnlyImplicitReceiver(implicit)) => {
                vec![vec![self.context.create_candidate(
                    self.member.clone(),
                    ExplicitReceiverKind::DispatchReceiver,
                    Some(implicit),
                )]]
            }
            _ => Vec::new(),
        }
    }
}

/// Processor for a call whose callee is already an expression value, e.g.
/// `(f())()`, optionally with a written outer receiver.
pub fn call_processor_for_explicit_invoke<'t>(
    context: ResolutionContext<'t>,
    expression: ReceiverValue,
    explicit_receiver: Option<ReceiverValue>,
) -> Box<dyn ScopeTowerProcessor<'t> + 't> {
    let invoke_context = ResolutionContext {
        name: invoke_name(),
        ..context
    };
    let extension_member = extension_invoke_member(context.tower, expression);

    match explicit_receiver {
        Some(receiver) => match extension_member {
            // with an outer receiver only an extension-function-shaped
            // expression leaves a slot for it
            None => Box::new(KnownResultProcessor::empty()),
            Some(member) => Box::new(InvokeExtensionProcessor {
                context: invoke_context,
                member,
                explicit_receiver: Some(receiver),
            }),
        },
        None => {
            let usual: Box<dyn ScopeTowerProcessor<'t> + 't> = Box::new(
                ExplicitReceiverProcessor::new(invoke_context, expression, LookupKind::Functions),
            );
            match extension_member {
                None => usual,
                Some(member) => Box::new(CompositeProcessor::new(vec![
                    usual,
                    Box::new(InvokeExtensionProcessor {
                        context: invoke_context,
                        member,
                        explicit_receiver: None,
                    }),
                ])),
            }
        }
    }
}
