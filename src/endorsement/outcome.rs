use serde::{Deserialize, Serialize};

use crate::endorsement::types::{Endorsement, EndorsementRequest, User};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndorserCapability {
    #[default]
    Unknown,
    Credited,
    Uncredited,
    Prohibited,
    Oneself,
}

/// Result of one evaluation. Gates write into it; callers read it back.
///
/// `reason` can carry veto, suspect or e-mail details. Anything leaving the
/// process must go through [`EndorsementOutcome::redacted`].
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementOutcome {
    pub submitted: bool,
    pub accepted: bool,
    pub request_acceptable: bool,
    pub endorser_capability: EndorserCapability,
    #[serde(default)]
    pub endorser_n_papers: Option<usize>,
    pub reason: String,
    pub public_reason: bool,
    #[serde(default)]
    pub endorsement: Option<Endorsement>,
    #[serde(default)]
    pub endorsement_request: Option<EndorsementRequest>,
    #[serde(default)]
    pub endorsee: Option<User>,
}

impl EndorsementOutcome {
    pub fn new(endorsee: Option<User>, endorsement_request: Option<EndorsementRequest>) -> Self {
        Self {
            endorsee,
            endorsement_request,
            ..Self::default()
        }
    }

    pub fn accept(
        &mut self,
        reason: impl Into<String>,
        public_reason: bool,
        capability: EndorserCapability,
        request_acceptable: bool,
        n_papers: Option<usize>,
    ) -> bool {
        self.accepted = true;
        self.settle(reason, public_reason, capability, request_acceptable, n_papers)
    }

    pub fn reject(
        &mut self,
        reason: impl Into<String>,
        public_reason: bool,
        capability: EndorserCapability,
        request_acceptable: bool,
        n_papers: Option<usize>,
    ) -> bool {
        self.accepted = false;
        self.settle(reason, public_reason, capability, request_acceptable, n_papers)
    }

    fn settle(
        &mut self,
        reason: impl Into<String>,
        public_reason: bool,
        capability: EndorserCapability,
        request_acceptable: bool,
        n_papers: Option<usize>,
    ) -> bool {
        self.reason = reason.into();
        self.public_reason = public_reason;
        self.endorser_capability = capability;
        self.request_acceptable = request_acceptable;
        if n_papers.is_some() {
            self.endorser_n_papers = n_papers;
        }
        capability == EndorserCapability::Credited && request_acceptable
    }

    pub fn redacted(&self) -> Self {
        let mut outcome = self.clone();
        if !outcome.public_reason {
            outcome.reason.clear();
        }
        outcome
    }
}
