use crate::candidate::{Applicability, Candidate};
use crate::models::{DeclarationKind, SemanticModel};
use crate::resolver::ResolutionContext;
use crate::span::Symbol;

/// The final candidate group of one resolution attempt, together with the
/// applicability its members are tied at.
#[derive(Debug)]
pub struct Resolution {
    pub candidates: Vec<Candidate>,
    pub applicability: Option<Applicability>,
}

impl Resolution {
    pub fn new(context: ResolutionContext<'_>, candidates: Vec<Candidate>) -> Resolution {
        let applicability = candidates
            .iter()
            .map(|candidate| context.applicability(candidate))
            .min();
        Resolution {
            candidates,
            applicability,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self.applicability, Some(applicability) if applicability.is_success())
    }

    /// The unique winner, when there is one.
    pub fn single(&self) -> Option<&Candidate> {
        if self.is_success() && self.candidates.len() == 1 {
            self.candidates.first()
        } else {
            None
        }
    }

    pub fn into_result(self, name: Symbol) -> Result<Candidate, ResolutionError> {
        if !self.is_success() {
            return Err(ResolutionError::Unresolved {
                name,
                rejected: self.candidates,
            });
        }
        if self.candidates.len() > 1 {
            return Err(ResolutionError::Ambiguous {
                name,
                candidates: self.candidates,
            });
        }
        Ok(self
            .candidates
            .into_iter()
            .next()
            .expect("successful resolution carries a candidate"))
    }
}

#[derive(Debug)]
pub enum ResolutionError {
    /// No candidate at any tower position survived; `rejected` holds the
    /// best error-level near misses, possibly none.
    Unresolved {
        name: Symbol,
        rejected: Vec<Candidate>,
    },
    /// Several candidates tied at the best applicability.
    Ambiguous {
        name: Symbol,
        candidates: Vec<Candidate>,
    },
}

impl ResolutionError {
    pub fn format(&self, model: &SemanticModel) -> String {
        match self {
            ResolutionError::Unresolved { name, rejected } => {
                if rejected.is_empty() {
                    return format!("unresolved reference '{name}'");
                }
                let reasons: Vec<String> = rejected
                    .iter()
                    .map(|candidate| {
                        let declaration = model.declaration(candidate.descriptor);
                        let diagnostics: Vec<String> = candidate
                            .diagnostics
                            .iter()
                            .map(|diagnostic| diagnostic.format(model))
                            .collect();
                        format!(
                            "{} '{}': {}",
                            describe(declaration.kind),
                            name,
                            diagnostics.join(", ")
                        )
                    })
                    .collect();
                format!(
                    "no applicable candidate for '{}'; rejected: {}",
                    name,
                    reasons.join("; ")
                )
            }
            ResolutionError::Ambiguous { name, candidates } => format!(
                "ambiguous use of '{}'; {} candidates are equally applicable",
                name,
                candidates.len()
            ),
        }
    }
}

fn describe(kind: DeclarationKind) -> &'static str {
    match kind {
        DeclarationKind::Function => "function",
        DeclarationKind::Variable => "variable",
        DeclarationKind::Constructor => "constructor",
    }
}
