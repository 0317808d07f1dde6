use std::ops::ControlFlow;

use tracing::{info, warn};

use crate::endorsement::{
    error::{EndorsementError, conflict, invalid_request},
    gates::{self, GateEnv},
    outcome::{EndorsementOutcome, EndorserCapability},
    policy::EndorsementPolicy,
    ports::EndorsementAccessor,
    types::{Endorsement, EndorsementContext},
};

/// Runs one gate; a break ends the evaluation with the gate's verdict.
macro_rules! gate {
    ($gate:expr) => {
        match $gate? {
            ControlFlow::Break(verdict) => return Ok(verdict),
            ControlFlow::Continue(value) => value,
        }
    };
}

/// One eligibility decision. Build it, call one entry point, read the outcome.
pub struct EndorsementBusiness<'a> {
    accessor: &'a dyn EndorsementAccessor,
    policy: EndorsementPolicy,
    ctx: EndorsementContext,
    outcome: EndorsementOutcome,
}

impl<'a> EndorsementBusiness<'a> {
    pub fn new(
        accessor: &'a dyn EndorsementAccessor,
        policy: EndorsementPolicy,
        ctx: EndorsementContext,
    ) -> Self {
        let outcome = EndorsementOutcome::new(ctx.endorsee.clone(), ctx.request.clone());
        Self {
            accessor,
            policy,
            ctx,
            outcome,
        }
    }

    pub fn outcome(&self) -> &EndorsementOutcome {
        &self.outcome
    }

    pub fn into_outcome(self) -> EndorsementOutcome {
        self.outcome
    }

    fn parts(&mut self) -> (GateEnv<'_>, &mut EndorsementOutcome) {
        let env = GateEnv {
            accessor: self.accessor,
            policy: &self.policy,
            ctx: &self.ctx,
        };
        (env, &mut self.outcome)
    }

    /// Can the endorser vote on the endorsee's request for this category?
    pub fn can_submit(&mut self) -> Result<bool, EndorsementError> {
        let (env, outcome) = self.parts();
        let Some(endorser) = env.ctx.endorser.as_ref() else {
            return Err(invalid_request("an endorser is required to submit an endorsement"));
        };

        gate!(gates::existing_endorsement(&env, outcome));
        gate!(gates::self_endorsement(&env, endorser, outcome));
        gate!(gates::endorser_veto(&env, endorser, outcome));
        gate!(gates::endorser_proxy(&env, endorser, outcome));
        let resolved = gate!(gates::resolve_category(&env, outcome));
        gate!(gates::endorse_all(&env, &resolved, outcome));
        gate!(gates::archive_moderator(&env, endorser, &resolved, outcome));
        gate!(gates::category_moderator(&env, endorser, outcome));
        if let Some(endorsee) = env.ctx.endorsee.as_ref() {
            gate!(gates::endorsee_veto(&env, endorsee, outcome));
            gate!(gates::check_rejected_endorsements(&env, endorsee, outcome));
            gate!(gates::check_negative_auto_endorsement(
                &env, endorsee, &resolved, outcome
            ));
        }
        gates::endorser_papers(&env, endorser, &resolved, outcome)
    }

    /// Who may endorse for this category, without an endorsee in view.
    pub fn can_endorser_endorse(&mut self) -> Result<bool, EndorsementError> {
        let (env, outcome) = self.parts();
        let Some(endorser) = env.ctx.endorser.as_ref() else {
            return Err(invalid_request("an endorser is required to check endorsing rights"));
        };

        let resolved = gate!(gates::resolve_category(&env, outcome));
        gate!(gates::endorse_all(&env, &resolved, outcome));
        gate!(gates::archive_moderator(&env, endorser, &resolved, outcome));
        gate!(gates::category_moderator(&env, endorser, outcome));
        gates::endorser_papers(&env, endorser, &resolved, outcome)
    }

    /// Administrators skip the endorser checks entirely.
    pub fn admin_approve(&mut self) -> Result<bool, EndorsementError> {
        let (env, outcome) = self.parts();

        let resolved = gate!(gates::resolve_category(&env, outcome));
        gate!(gates::endorse_all(&env, &resolved, outcome));
        if let Some(endorsee) = env.ctx.endorsee.as_ref() {
            gate!(gates::endorsee_veto(&env, endorsee, outcome));
        }

        let verdict = outcome.accept(
            "Endorsement issued by an administrator.",
            true,
            EndorserCapability::Credited,
            true,
            None,
        );
        gates::log_terminal("admin_approve", &env, outcome);
        Ok(verdict)
    }

    /// Does the endorsee qualify for submission rights with no human endorser?
    pub fn can_auto_endorse(&mut self) -> Result<bool, EndorsementError> {
        let (env, outcome) = self.parts();
        if env.ctx.endorser.is_some() {
            return Err(invalid_request("automatic endorsement cannot name an endorser"));
        }
        let Some(endorsee) = env.ctx.endorsee.as_ref() else {
            return Err(invalid_request("an endorsee is required for automatic endorsement"));
        };

        let resolved = gate!(gates::resolve_category(&env, outcome));
        gate!(gates::endorse_all(&env, &resolved, outcome));
        gate!(gates::category_moderator(&env, endorsee, outcome));
        gate!(gates::endorsee_veto(&env, endorsee, outcome));
        gate!(gates::check_rejected_endorsements(&env, endorsee, outcome));
        gate!(gates::has_endorsements(&env, endorsee, outcome));
        gates::auto_qualification(&env, endorsee, &resolved, outcome)
    }

    /// Persists the accepted decision. A concurrent duplicate surfaces as a
    /// conflict error, never as a second row.
    pub fn submit_endorsement(&mut self) -> Result<Endorsement, EndorsementError> {
        if !self.outcome.accepted {
            return Err(invalid_request("only accepted endorsements can be submitted"));
        }
        if self.outcome.submitted {
            return Err(invalid_request("an endorsement is already on file"));
        }
        if self.ctx.vote.preflight {
            return Err(invalid_request("preflight evaluations are never stored"));
        }
        let Some(endorsee) = self.ctx.endorsee.as_ref() else {
            return Err(invalid_request("an endorsee is required to submit an endorsement"));
        };

        let point_value = self.ctx.point_value(self.policy.positive_point_value);
        match self.accessor.submit_endorsement(&self.ctx, point_value)? {
            Some(endorsement) => {
                info!(
                    target: "endorsement",
                    endorsement_id = endorsement.id,
                    endorser_id = ?endorsement.endorser_id,
                    endorsee_id = endorsement.endorsee_id,
                    category = %self.ctx.category,
                    endorsement_type = %endorsement.endorsement_type,
                    point_value = endorsement.point_value,
                    "endorsement_submitted"
                );
                self.outcome.submitted = true;
                self.outcome.endorsement = Some(endorsement.clone());
                Ok(endorsement)
            }
            None => {
                warn!(
                    target: "endorsement",
                    endorser_id = ?self.ctx.endorser_id(),
                    endorsee_id = endorsee.id,
                    category = %self.ctx.category,
                    "endorsement_conflict"
                );
                Err(conflict(format!(
                    "an endorsement for {} by this endorser already exists",
                    self.ctx.category.pretty()
                )))
            }
        }
    }
}
