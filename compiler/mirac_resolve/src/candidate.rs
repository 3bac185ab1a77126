use crate::models::{DeclarationID, ReceiverValue, SemanticModel, TypeID};
use smallvec::SmallVec;

/// How the receiver written at the call site maps onto a candidate's
/// dispatch and extension parameter slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExplicitReceiverKind {
    NoExplicitReceiver,
    DispatchReceiver,
    ExtensionReceiver,
    BothReceivers,
}

/// A semantic problem attached to a candidate. Diagnostics never abort the
/// search; the applicability judgment decides whether one is fatal.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolutionDiagnostic {
    ErrorDescriptor,
    Synthesized,
    Invisible,
    SmartCast(TypeID),
    UnstableSmartCast,
    DynamicLookup,
}

impl ResolutionDiagnostic {
    pub fn format(self, model: &SemanticModel) -> String {
        match self {
            ResolutionDiagnostic::ErrorDescriptor => "erroneous declaration".into(),
            ResolutionDiagnostic::Synthesized => "synthesized declaration".into(),
            ResolutionDiagnostic::Invisible => "not visible from the call site".into(),
            ResolutionDiagnostic::SmartCast(ty) => {
                format!("smart cast to {}", model.type_data(ty).name)
            }
            ResolutionDiagnostic::UnstableSmartCast => "unstable smart cast".into(),
            ResolutionDiagnostic::DynamicLookup => "dynamic member lookup".into(),
        }
    }
}

pub type Diagnostics = SmallVec<[ResolutionDiagnostic; 2]>;

/// A declaration match with its dispatch receiver already bound by the
/// level that produced it, before the explicit-receiver kind is decided.
#[derive(Debug, Clone)]
pub struct MemberCandidate {
    pub descriptor: DeclarationID,
    pub dispatch_receiver: Option<ReceiverValue>,
    pub diagnostics: Diagnostics,
}

/// A resolved reference to a declaration bound to one receiver
/// interpretation. Candidates are produced, never mutated.
#[derive(Debug, Clone)]
pub struct Candidate {
    pub descriptor: DeclarationID,
    pub dispatch_receiver: Option<ReceiverValue>,
    pub extension_receiver: Option<ReceiverValue>,
    pub receiver_kind: ExplicitReceiverKind,
    pub diagnostics: Diagnostics,
    /// The variable candidate this one was invoked through, when the call
    /// was resolved via the invoke convention.
    pub through_variable: Option<Box<Candidate>>,
}

/// Structural identity of a candidate: the descriptor and its receiver
/// interpretation. Diagnostics do not participate.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CandidateIdentity {
    pub descriptor: DeclarationID,
    pub receiver_kind: ExplicitReceiverKind,
    pub dispatch_receiver: Option<ReceiverValue>,
    pub extension_receiver: Option<ReceiverValue>,
    pub through_variable: Option<Box<CandidateIdentity>>,
}

impl Candidate {
    pub fn identity(&self) -> CandidateIdentity {
        CandidateIdentity {
            descriptor: self.descriptor,
            receiver_kind: self.receiver_kind,
            dispatch_receiver: self.dispatch_receiver,
            extension_receiver: self.extension_receiver,
            through_variable: self
                .through_variable
                .as_ref()
                .map(|variable| Box::new(variable.identity())),
        }
    }
}

/// Total order over resolution outcomes, best first. "Strictly better"
/// throughout the resolver means strictly smaller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Applicability {
    Resolved,
    ResolvedSynthesized,
    ConventionError,
    Inapplicable,
    Hidden,
}

impl Applicability {
    pub fn is_success(self) -> bool {
        matches!(self, Applicability::Resolved | Applicability::ResolvedSynthesized)
    }
}

/// The injected applicability judgment. The tower only needs an ordered
/// classification; argument and type compatibility live behind this seam.
pub trait ApplicabilityJudge {
    fn applicability(&self, model: &SemanticModel, candidate: &Candidate) -> Applicability;
}

/// Judges a candidate purely by its attached diagnostics. This is the
/// default judgment used before argument checking runs.
pub struct DiagnosticJudge;

impl ApplicabilityJudge for DiagnosticJudge {
    fn applicability(&self, model: &SemanticModel, candidate: &Candidate) -> Applicability {
        let mut level = Applicability::Resolved;
        for diagnostic in &candidate.diagnostics {
            let this = match diagnostic {
                ResolutionDiagnostic::Invisible => Applicability::Hidden,
                ResolutionDiagnostic::ErrorDescriptor => Applicability::Inapplicable,
                ResolutionDiagnostic::UnstableSmartCast => Applicability::ConventionError,
                ResolutionDiagnostic::Synthesized => Applicability::ResolvedSynthesized,
                ResolutionDiagnostic::SmartCast(_) | ResolutionDiagnostic::DynamicLookup => {
                    Applicability::Resolved
                }
            };
            level = level.max(this);
        }
        if let Some(variable) = &candidate.through_variable {
            level = level.max(self.applicability(model, variable));
        }
        level
    }
}
