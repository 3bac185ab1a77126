use crate::candidate::{
    Applicability, ApplicabilityJudge, Candidate, CandidateIdentity, ExplicitReceiverKind,
    MemberCandidate,
};
use crate::error::Resolution;
use crate::invoke::invoke_name;
use crate::levels::TowerLevel;
use crate::models::ReceiverValue;
use crate::processors::{function_processor, variable_processor};
use crate::span::Symbol;
use crate::tower::ScopeTower;
use rustc_hash::FxHashSet;

/// One discrete position the search visits while walking the tower.
#[derive(Debug, Clone, Copy)]
pub enum TowerData<'t> {
    Empty,
    OnlyImplicitReceiver(ReceiverValue),
    Level(&'t TowerLevel),
    LevelAndImplicitReceiver(&'t TowerLevel, ReceiverValue),
}

/// Emits priority-grouped candidates for a traversal step. Candidates in one
/// group share a priority; the first group ranks highest. Dispatch receivers
/// are already bound by the level that produced each candidate.
pub trait ScopeTowerProcessor<'t> {
    fn process(&mut self, data: TowerData<'t>) -> Vec<Vec<Candidate>>;
}

/// The per-call-site context threaded through every processor: the name
/// being resolved, the tower, and the injected applicability judgment.
#[derive(Clone, Copy)]
pub struct ResolutionContext<'t> {
    pub name: Symbol,
    pub tower: &'t ScopeTower<'t>,
    pub judge: &'t dyn ApplicabilityJudge,
}

impl<'t> ResolutionContext<'t> {
    pub fn new(
        name: Symbol,
        tower: &'t ScopeTower<'t>,
        judge: &'t dyn ApplicabilityJudge,
    ) -> ResolutionContext<'t> {
        ResolutionContext { name, tower, judge }
    }

    pub fn applicability(&self, candidate: &Candidate) -> Applicability {
        self.judge.applicability(self.tower.model, candidate)
    }

    pub fn create_candidate(
        &self,
        member: MemberCandidate,
        receiver_kind: ExplicitReceiverKind,
        extension_receiver: Option<ReceiverValue>,
    ) -> Candidate {
        Candidate {
            descriptor: member.descriptor,
            dispatch_receiver: member.dispatch_receiver,
            extension_receiver,
            receiver_kind,
            diagnostics: member.diagnostics,
            through_variable: None,
        }
    }

    /// Stamp an invoke candidate with the variable it was reached through.
    pub fn transform_candidate(&self, variable: &Candidate, invoke: Candidate) -> Candidate {
        Candidate {
            through_variable: Some(Box::new(variable.clone())),
            ..invoke
        }
    }

    /// The receiver and context for resolving an invoke call on a variable
    /// candidate's value. None when the variable denotes no callable value.
    pub fn context_for_invoke(
        &self,
        variable: &Candidate,
    ) -> Option<(ReceiverValue, ResolutionContext<'t>)> {
        let ty = self.tower.model.declaration(variable.descriptor).ty?;
        let receiver = ReceiverValue::of(ty);
        let context = ResolutionContext {
            name: invoke_name(),
            ..*self
        };
        Some((receiver, context))
    }
}

fn tower_data_sequence<'t>(tower: &'t ScopeTower<'t>) -> Vec<TowerData<'t>> {
    // explicit members, qualifiers and injected results come first
    let mut sequence = vec![TowerData::Empty];
    for &receiver in &tower.implicit_receivers {
        sequence.push(TowerData::OnlyImplicitReceiver(receiver));
    }
    for level in tower.levels() {
        sequence.push(TowerData::Level(level));
        for &receiver in &tower.implicit_receivers {
            sequence.push(TowerData::LevelAndImplicitReceiver(level, receiver));
        }
    }
    sequence
}

trait ResultCollector {
    fn push_candidates(&mut self, context: ResolutionContext<'_>, candidates: Vec<Candidate>) {
        let filtered: Vec<Candidate> = candidates
            .into_iter()
            .filter(|candidate| context.applicability(candidate) != Applicability::Hidden)
            .collect();
        if !filtered.is_empty() {
            self.add_candidates(context, filtered);
        }
    }

    fn add_candidates(&mut self, context: ResolutionContext<'_>, candidates: Vec<Candidate>);

    fn has_successful(&self) -> bool;

    fn final_candidates(&mut self) -> Vec<Candidate>;
}

#[derive(Default)]
struct SuccessfulResultCollector {
    candidates: Vec<Candidate>,
    level: Option<Applicability>,
}

impl ResultCollector for SuccessfulResultCollector {
    fn add_candidates(&mut self, context: ResolutionContext<'_>, candidates: Vec<Candidate>) {
        let best = candidates
            .iter()
            .map(|candidate| context.applicability(candidate))
            .min()
            .expect("pushed group is never empty");

        // a later group only displaces the running result when it is
        // strictly better
        let replace = match self.level {
            None => true,
            Some(current) => best < current,
        };
        if replace {
            self.level = Some(best);
            self.candidates = candidates
                .into_iter()
                .filter(|candidate| context.applicability(candidate) == best)
                .collect();
        }
    }

    fn has_successful(&self) -> bool {
        self.level == Some(Applicability::Resolved)
    }

    fn final_candidates(&mut self) -> Vec<Candidate> {
        std::mem::take(&mut self.candidates)
    }
}

#[derive(Default)]
struct AllCandidatesCollector {
    candidates: Vec<Candidate>,
    seen: FxHashSet<CandidateIdentity>,
}

impl ResultCollector for AllCandidatesCollector {
    fn add_candidates(&mut self, _context: ResolutionContext<'_>, candidates: Vec<Candidate>) {
        for candidate in candidates {
            if self.seen.insert(candidate.identity()) {
                self.candidates.push(candidate);
            }
        }
    }

    fn has_successful(&self) -> bool {
        false
    }

    fn final_candidates(&mut self) -> Vec<Candidate> {
        std::mem::take(&mut self.candidates)
    }
}

pub struct TowerResolver;

impl TowerResolver {
    /// Resolve a call whose callee position is a name: plain functions,
    /// variables used through the invoke convention, and extension invokes.
    pub fn resolve_call<'t>(&self, context: ResolutionContext<'t>) -> Resolution {
        let mut processor = function_processor(context, context.tower.explicit_receiver);
        let candidates = self.run_resolve(context, &mut processor, true);
        Resolution::new(context, candidates)
    }

    pub fn resolve_variable<'t>(&self, context: ResolutionContext<'t>) -> Resolution {
        let mut processor = variable_processor(context, context.tower.explicit_receiver, true);
        let candidates = self.run_resolve(context, &mut *processor, true);
        Resolution::new(context, candidates)
    }

    pub fn run_resolve<'t>(
        &self,
        context: ResolutionContext<'t>,
        processor: &mut (dyn ScopeTowerProcessor<'t> + 't),
        use_order: bool,
    ) -> Vec<Candidate> {
        self.run(context, processor, use_order, SuccessfulResultCollector::default())
    }

    /// Tooling mode: never stops early and ignores priority banding.
    pub fn collect_all_candidates<'t>(
        &self,
        context: ResolutionContext<'t>,
        processor: &mut (dyn ScopeTowerProcessor<'t> + 't),
    ) -> Vec<Candidate> {
        self.run(context, processor, false, AllCandidatesCollector::default())
    }

    fn run<'t, R: ResultCollector>(
        &self,
        context: ResolutionContext<'t>,
        processor: &mut (dyn ScopeTowerProcessor<'t> + 't),
        use_order: bool,
        mut collector: R,
    ) -> Vec<Candidate> {
        for data in tower_data_sequence(context.tower) {
            let groups = if use_order {
                processor.process(data)
            } else {
                let flattened: Vec<Candidate> =
                    processor.process(data).into_iter().flatten().collect();
                vec![flattened]
            };

            for group in groups {
                collector.push_candidates(context, group);
                if collector.has_successful() {
                    return collector.final_candidates();
                }
            }
        }
        collector.final_candidates()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::candidate::DiagnosticJudge;
    use crate::models::{
        Declaration, ExplicitReceiver, Scope, ScopeID, ScopeKind, SemanticModel, TypeData, TypeID,
    };
    use crate::span::{FileID, Span};

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

    fn function_in(model: &mut SemanticModel, scope: ScopeID, name: &str) -> crate::models::DeclarationID {
        let id = model.create_declaration(Declaration::function(sym(name)));
        model.add_function(scope, id);
        id
    }

    fn resolve(model: &SemanticModel, scope: ScopeID, name: &str) -> Resolution {
        resolve_with_receiver(model, scope, name, ExplicitReceiver::None)
    }

    fn resolve_with_receiver(
        model: &SemanticModel,
        scope: ScopeID,
        name: &str,
        explicit: ExplicitReceiver,
    ) -> Resolution {
        let tower = ScopeTower::new(model, scope, explicit, None, loc());
        let context = ResolutionContext::new(sym(name), &tower, &DiagnosticJudge);
        TowerResolver.resolve_call(context)
    }

    #[test]
    fn locals_always_shadow_members() {
        let mut model = SemanticModel::new();
        let receiver_ty = ty(&mut model, "Host");
        let member_scope = model.type_data(receiver_ty).member_scope;
        let mut member = Declaration::function(sym("f"));
        member.has_dispatch_receiver = true;
        let member = model.create_declaration(member);
        model.add_function(member_scope, member);

        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let body = model.create_scope(Scope::with_receiver(
            ScopeKind::Declarations,
            Some(root),
            crate::models::ReceiverValue::of(receiver_ty),
        ));
        let block = model.create_scope(Scope::new(ScopeKind::Locals, Some(body)));
        let local = function_in(&mut model, block, "f");

        let resolution = resolve(&model, block, "f");
        assert_eq!(resolution.applicability, Some(Applicability::Resolved));
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].descriptor, local);
    }

    #[test]
    fn early_exit_hides_later_candidates() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let block = model.create_scope(Scope::new(ScopeKind::Locals, Some(root)));
        let inner = function_in(&mut model, block, "f");
        function_in(&mut model, root, "f");

        let resolution = resolve(&model, block, "f");
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].descriptor, inner);
    }

    #[test]
    fn tied_extensions_produce_an_ambiguous_group() {
        let mut model = SemanticModel::new();
        let receiver_ty = ty(&mut model, "Canvas");
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let body = model.create_scope(Scope::with_receiver(
            ScopeKind::Declarations,
            Some(root),
            crate::models::ReceiverValue::of(receiver_ty),
        ));

        for _ in 0..2 {
            let mut extension = Declaration::function(sym("g"));
            extension.requires_extension_receiver = true;
            let extension = model.create_declaration(extension);
            model.add_function(root, extension);
        }

        let resolution = resolve(&model, body, "g");
        assert_eq!(resolution.applicability, Some(Applicability::Resolved));
        assert_eq!(resolution.candidates.len(), 2);
    }

    #[test]
    fn unresolved_names_yield_an_empty_result() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));

        let resolution = resolve(&model, root, "nope");
        assert!(resolution.candidates.is_empty());
        assert_eq!(resolution.applicability, None);
    }

    #[test]
    fn hidden_candidates_never_surface() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let block = model.create_scope(Scope::new(ScopeKind::Locals, Some(root)));

        let mut invisible = Declaration::function(sym("v"));
        invisible.visible = false;
        let invisible = model.create_declaration(invisible);
        model.add_function(block, invisible);

        let mut broken = Declaration::function(sym("v"));
        broken.error = true;
        let broken = model.create_declaration(broken);
        model.add_function(root, broken);

        // the all-hidden local group must not displace the later error group
        let resolution = resolve(&model, block, "v");
        assert_eq!(resolution.applicability, Some(Applicability::Inapplicable));
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].descriptor, broken);

        let tower = ScopeTower::new(&model, block, ExplicitReceiver::None, None, loc());
        let context = ResolutionContext::new(sym("v"), &tower, &DiagnosticJudge);
        let mut processor = function_processor(context, ExplicitReceiver::None);
        let all = TowerResolver.collect_all_candidates(context, &mut processor);
        assert!(all.iter().all(|candidate| candidate.descriptor != invisible));
    }

    #[test]
    fn synthesized_results_do_not_stop_the_search() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let block = model.create_scope(Scope::new(ScopeKind::Locals, Some(root)));

        let mut generated = Declaration::function(sym("s"));
        generated.synthesized = true;
        let generated = model.create_declaration(generated);
        model.add_function(block, generated);
        let real = function_in(&mut model, root, "s");

        let resolution = resolve(&model, block, "s");
        assert_eq!(resolution.applicability, Some(Applicability::Resolved));
        assert_eq!(resolution.candidates[0].descriptor, real);
    }

    #[test]
    fn synthesized_results_are_the_fallback_on_exhaustion() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let mut generated = Declaration::function(sym("s"));
        generated.synthesized = true;
        let generated = model.create_declaration(generated);
        model.add_function(root, generated);

        let resolution = resolve(&model, root, "s");
        assert_eq!(resolution.applicability, Some(Applicability::ResolvedSynthesized));
        assert_eq!(resolution.candidates[0].descriptor, generated);
    }

    #[test]
    fn resolution_is_idempotent() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let block = model.create_scope(Scope::new(ScopeKind::Locals, Some(root)));
        function_in(&mut model, block, "f");
        function_in(&mut model, root, "f");

        let first: Vec<_> = resolve(&model, block, "f")
            .candidates
            .iter()
            .map(|candidate| candidate.identity())
            .collect();
        let second: Vec<_> = resolve(&model, block, "f")
            .candidates
            .iter()
            .map(|candidate| candidate.identity())
            .collect();
        assert_eq!(first, second);
    }

    #[test]
    fn all_candidates_mode_sees_every_step() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let block = model.create_scope(Scope::new(ScopeKind::Locals, Some(root)));
        let inner = function_in(&mut model, block, "f");
        let outer = function_in(&mut model, root, "f");

        let tower = ScopeTower::new(&model, block, ExplicitReceiver::None, None, loc());
        let context = ResolutionContext::new(sym("f"), &tower, &DiagnosticJudge);
        let mut processor = function_processor(context, ExplicitReceiver::None);
        let all = TowerResolver.collect_all_candidates(context, &mut processor);

        let descriptors: Vec<_> = all.iter().map(|candidate| candidate.descriptor).collect();
        assert!(descriptors.contains(&inner));
        assert!(descriptors.contains(&outer));
    }

    #[test]
    fn variable_resolution_finds_singleton_values() {
        let mut model = SemanticModel::new();
        let root = model.create_scope(Scope::new(ScopeKind::Importing, None));
        let value = model.create_declaration(Declaration::variable(sym("Config"), None));
        let mut classifier = crate::models::Classifier::new(sym("Config"));
        classifier.singleton = true;
        classifier.class_value = Some(value);
        let classifier = model.create_classifier(classifier);
        model.add_classifier(root, classifier);

        let tower = ScopeTower::new(&model, root, ExplicitReceiver::None, None, loc());
        let context = ResolutionContext::new(sym("Config"), &tower, &DiagnosticJudge);
        let resolution = TowerResolver.resolve_variable(context);
        assert_eq!(resolution.candidates.len(), 1);
        assert_eq!(resolution.candidates[0].descriptor, value);
    }
}
