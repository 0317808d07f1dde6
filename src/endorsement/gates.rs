//! Individual decision gates.
//!
//! Each gate reads from [`GateEnv`], may write into the outcome, and either
//! lets evaluation continue or breaks with the value returned by
//! `accept`/`reject`. A gate that breaks has always called exactly one of them.

use std::ops::ControlFlow;

use tracing::debug;

use crate::endorsement::{
    error::EndorsementError,
    outcome::{EndorsementOutcome, EndorserCapability},
    policy::EndorsementPolicy,
    ports::EndorsementAccessor,
    types::{
        Category, EndorsementContext, EndorsementDomain, PaperProps, PaperWindow, User, VetoStatus,
    },
};

pub type Gate<T = ()> = ControlFlow<bool, T>;
pub type GateResult<T = ()> = Result<Gate<T>, EndorsementError>;

pub struct GateEnv<'a> {
    pub accessor: &'a dyn EndorsementAccessor,
    pub policy: &'a EndorsementPolicy,
    pub ctx: &'a EndorsementContext,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCategory {
    pub category: Category,
    pub domain: EndorsementDomain,
}

pub(crate) fn log_terminal(gate: &'static str, env: &GateEnv<'_>, outcome: &EndorsementOutcome) {
    debug!(
        target: "endorsement",
        gate,
        category = %env.ctx.category,
        accepted = outcome.accepted,
        capability = ?outcome.endorser_capability,
        request_acceptable = outcome.request_acceptable,
        "endorsement_gate_terminal"
    );
}

fn stop<T>(
    gate: &'static str,
    env: &GateEnv<'_>,
    outcome: &EndorsementOutcome,
    verdict: bool,
) -> Gate<T> {
    log_terminal(gate, env, outcome);
    ControlFlow::Break(verdict)
}

pub fn existing_endorsement(env: &GateEnv<'_>, outcome: &mut EndorsementOutcome) -> GateResult {
    if env.ctx.endorser.is_none() {
        return Ok(ControlFlow::Continue(()));
    }
    let Some(existing) = env.accessor.get_existing_endorsement(env.ctx)? else {
        return Ok(ControlFlow::Continue(()));
    };

    outcome.submitted = true;
    outcome.endorsement = Some(existing);
    let verdict = outcome.reject(
        "You have already submitted an endorsement for this request.",
        true,
        EndorserCapability::Credited,
        false,
        None,
    );
    Ok(stop("existing_endorsement", env, outcome, verdict))
}

pub fn self_endorsement(
    env: &GateEnv<'_>,
    endorser: &User,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    let is_self = env
        .ctx
        .endorsee
        .as_ref()
        .is_some_and(|endorsee| endorsee.id == endorser.id);
    if !is_self {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.reject(
        "You can't endorse yourself.",
        true,
        EndorserCapability::Oneself,
        false,
        None,
    );
    Ok(stop("self_endorsement", env, outcome, verdict))
}

pub fn endorser_veto(
    env: &GateEnv<'_>,
    endorser: &User,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    if endorser.veto_status == VetoStatus::Ok {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.reject(
        "Your ability to endorse has been suspended by administrative action.",
        true,
        EndorserCapability::Prohibited,
        false,
        None,
    );
    Ok(stop("endorser_veto", env, outcome, verdict))
}

pub fn endorser_proxy(
    env: &GateEnv<'_>,
    endorser: &User,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    if !endorser.flag_proxy {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.reject(
        format!("{} is a proxy submitter and cannot endorse.", endorser.username),
        false,
        EndorserCapability::Uncredited,
        false,
        None,
    );
    Ok(stop("endorser_proxy", env, outcome, verdict))
}

/// Looks the category up under its canonical name first, then as given.
pub fn resolve_category(
    env: &GateEnv<'_>,
    outcome: &mut EndorsementOutcome,
) -> GateResult<ResolvedCategory> {
    let canonical = &env.ctx.category;
    let raw = &env.ctx.raw_category;

    let mut category = env
        .accessor
        .get_category(&canonical.archive, &canonical.subject_class)?;
    if category.is_none() && raw != canonical {
        category = env.accessor.get_category(&raw.archive, &raw.subject_class)?;
    }

    let resolved = match category {
        Some(category) if category.definitive => env
            .accessor
            .get_domain_info(&category)?
            .map(|domain| ResolvedCategory { category, domain }),
        _ => None,
    };

    match resolved {
        Some(resolved) => Ok(ControlFlow::Continue(resolved)),
        None => {
            let capability = outcome.endorser_capability;
            let verdict = outcome.reject(
                format!(
                    "We don't issue endorsements for non-definitive categories; {} is not a definitive category.",
                    canonical.pretty()
                ),
                true,
                capability,
                false,
                None,
            );
            Ok(stop("resolve_category", env, outcome, verdict))
        }
    }
}

pub fn endorse_all(
    env: &GateEnv<'_>,
    resolved: &ResolvedCategory,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    if !resolved.domain.endorse_all {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.accept(
        format!(
            "Endorsements are automatic for {}.",
            env.ctx.category.pretty()
        ),
        true,
        EndorserCapability::Credited,
        true,
        None,
    );
    Ok(stop("endorse_all", env, outcome, verdict))
}

pub fn archive_moderator(
    env: &GateEnv<'_>,
    user: &User,
    resolved: &ResolvedCategory,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    if !resolved.domain.mods_endorse_all {
        return Ok(ControlFlow::Continue(()));
    }
    let archive = &env.ctx.category.archive;
    if !env.accessor.is_moderator(user.id, archive, None)? {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.accept(
        format!(
            "{} is a moderator for {} and its moderators may endorse for every subject.",
            user.username, archive
        ),
        true,
        EndorserCapability::Credited,
        true,
        None,
    );
    Ok(stop("archive_moderator", env, outcome, verdict))
}

pub fn category_moderator(
    env: &GateEnv<'_>,
    user: &User,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    let category = &env.ctx.category;
    // An archive-only category matches only archive-only moderator rows.
    if !env
        .accessor
        .is_moderator(user.id, &category.archive, Some(category.subject_class.as_str()))?
    {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.accept(
        format!("{} is a moderator for {}.", user.username, category.pretty()),
        true,
        EndorserCapability::Credited,
        true,
        None,
    );
    Ok(stop("category_moderator", env, outcome, verdict))
}

pub fn endorsee_veto(
    env: &GateEnv<'_>,
    endorsee: &User,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    if endorsee.veto_status != VetoStatus::NoUpload {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.reject(
        format!(
            "{} has been blocked from submitting ({}).",
            endorsee.username,
            endorsee.veto_status.as_str()
        ),
        false,
        EndorserCapability::Unknown,
        false,
        None,
    );
    Ok(stop("endorsee_veto", env, outcome, verdict))
}

/// Blocks endorsees whose automatic endorsement was revoked, or who are
/// flagged suspect. Questionable categories get their own reason text.
pub fn check_rejected_endorsements(
    env: &GateEnv<'_>,
    endorsee: &User,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    let category = &env.ctx.category;
    let endorsements =
        env.accessor
            .get_endorsements(endorsee.id, &category.archive, &category.subject_class)?;
    let questionable = !env
        .accessor
        .get_questionable_categories(&category.archive, &category.subject_class)?
        .is_empty();
    let revoked_auto: Vec<_> = endorsements
        .iter()
        .filter(|endorsement| endorsement.is_auto() && !endorsement.flag_valid)
        .collect();

    let reason = if questionable && !revoked_auto.is_empty() {
        Some(format!(
            "{} had an automatic endorsement for {} revoked and the category is under review.",
            endorsee.username,
            category.pretty()
        ))
    } else if !revoked_auto.is_empty() {
        Some(format!(
            "{} had an automatic endorsement for {} revoked.",
            endorsee.username,
            category.pretty()
        ))
    } else if endorsee.flag_suspect {
        Some(format!("{} is flagged as suspect.", endorsee.username))
    } else {
        None
    };

    match reason {
        None => Ok(ControlFlow::Continue(())),
        Some(reason) => {
            let verdict = outcome.reject(reason, false, EndorserCapability::Unknown, false, None);
            Ok(stop("check_rejected_endorsements", env, outcome, verdict))
        }
    }
}

/// Rejects only when every condition holds: the endorsee is short of
/// papers inside the eligibility window, the domain does not accept their
/// e-mail as academic, and the domain does not endorse by e-mail.
pub fn check_negative_auto_endorsement(
    env: &GateEnv<'_>,
    endorsee: &User,
    resolved: &ResolvedCategory,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    let domain = &resolved.domain;
    let window = env.policy.window.at(env.ctx.issued_when)?;
    let papers = env
        .accessor
        .get_papers_by_user(endorsee.id, &domain.name, window, false)?;
    let short_of_papers = papers.len() < domain.papers_to_endorse as usize;
    if !short_of_papers {
        return Ok(ControlFlow::Continue(()));
    }

    let (academic, email_reason) = env.accessor.is_academic_email(&endorsee.email)?;
    let email_not_accepted = !domain.endorse_email || !academic;
    if !(email_not_accepted && !domain.endorse_email) {
        return Ok(ControlFlow::Continue(()));
    }

    let verdict = outcome.reject(
        format!(
            "{} has {} of the {} papers needed in the {} domain and the e-mail check did not pass ({}).",
            endorsee.username,
            papers.len(),
            domain.papers_to_endorse,
            domain.name,
            email_reason
        ),
        false,
        EndorserCapability::Unknown,
        false,
        None,
    );
    Ok(stop("check_negative_auto_endorsement", env, outcome, verdict))
}

fn titles(papers: &[&PaperProps], limit: usize) -> String {
    papers
        .iter()
        .take(limit)
        .map(|paper| paper.title.as_str())
        .collect::<Vec<_>>()
        .join("; ")
}

/// Paper check for the endorser. Looks at all time, unlike the windowed
/// check applied to endorsees.
pub fn endorser_papers(
    env: &GateEnv<'_>,
    endorser: &User,
    resolved: &ResolvedCategory,
    outcome: &mut EndorsementOutcome,
) -> Result<bool, EndorsementError> {
    let domain = &resolved.domain;
    let papers = env
        .accessor
        .get_papers_by_user(endorser.id, &domain.name, PaperWindow::Unrestricted, false)?;

    if papers.is_empty() {
        let verdict = outcome.reject(
            format!(
                "{} has no papers in the {} endorsement domain.",
                endorser.username, domain.name
            ),
            true,
            EndorserCapability::Uncredited,
            true,
            Some(0),
        );
        log_terminal("endorser_papers", env, outcome);
        return Ok(verdict);
    }

    let required = domain.papers_to_endorse as usize;
    let (authored, not_authored): (Vec<&PaperProps>, Vec<&PaperProps>) =
        papers.iter().partition(|paper| paper.flag_author);

    let verdict = if authored.len() >= required {
        outcome.accept(
            format!(
                "{} is an author of {} paper(s) in the {} domain: {}",
                endorser.username,
                authored.len(),
                domain.name,
                titles(&authored, required)
            ),
            true,
            EndorserCapability::Credited,
            true,
            Some(authored.len()),
        )
    } else if papers.len() >= required {
        outcome.reject(
            format!(
                "{} owns {} paper(s) in the {} domain but is not registered as an author of: {}",
                endorser.username,
                papers.len(),
                domain.name,
                titles(&not_authored, not_authored.len())
            ),
            true,
            EndorserCapability::Uncredited,
            true,
            Some(authored.len()),
        )
    } else {
        outcome.reject(
            format!(
                "Endorsers for {} need {} authored paper(s) in the {} domain; {} has {} authored and {} not authored.",
                env.ctx.category.pretty(),
                required,
                domain.name,
                endorser.username,
                authored.len(),
                not_authored.len()
            ),
            true,
            EndorserCapability::Uncredited,
            true,
            Some(authored.len()),
        )
    };
    log_terminal("endorser_papers", env, outcome);
    Ok(verdict)
}

/// Accepts when the endorsee already holds enough valid points.
pub fn has_endorsements(
    env: &GateEnv<'_>,
    endorsee: &User,
    outcome: &mut EndorsementOutcome,
) -> GateResult {
    let category = &env.ctx.category;
    let total: i32 = env
        .accessor
        .get_endorsements(endorsee.id, &category.archive, &category.subject_class)?
        .iter()
        .filter(|endorsement| endorsement.flag_valid)
        .map(|endorsement| endorsement.point_value)
        .sum();
    if total < env.policy.endorsement_threshold {
        return Ok(ControlFlow::Continue(()));
    }

    outcome.submitted = true;
    let verdict = outcome.accept(
        format!("{} is already endorsed for {}.", endorsee.username, category.pretty()),
        true,
        EndorserCapability::Credited,
        false,
        None,
    );
    Ok(stop("has_endorsements", env, outcome, verdict))
}

/// Positive automatic endorsement: enough papers inside the window, or an
/// academic e-mail where the domain endorses by e-mail.
pub fn auto_qualification(
    env: &GateEnv<'_>,
    endorsee: &User,
    resolved: &ResolvedCategory,
    outcome: &mut EndorsementOutcome,
) -> Result<bool, EndorsementError> {
    let domain = &resolved.domain;
    let window = env.policy.window.at(env.ctx.issued_when)?;
    let papers = env
        .accessor
        .get_papers_by_user(endorsee.id, &domain.name, window, false)?;

    if papers.len() >= domain.papers_to_endorse as usize {
        let verdict = outcome.accept(
            format!(
                "{} has {} recent paper(s) in the {} domain.",
                endorsee.username,
                papers.len(),
                domain.name
            ),
            false,
            EndorserCapability::Credited,
            true,
            Some(papers.len()),
        );
        log_terminal("auto_qualification", env, outcome);
        return Ok(verdict);
    }

    if domain.endorse_email {
        let (academic, email_reason) = env.accessor.is_academic_email(&endorsee.email)?;
        if academic {
            let verdict = outcome.accept(
                format!("{} has an academic e-mail address ({}).", endorsee.username, email_reason),
                false,
                EndorserCapability::Credited,
                true,
                Some(papers.len()),
            );
            log_terminal("auto_qualification", env, outcome);
            return Ok(verdict);
        }
    }

    let verdict = outcome.reject(
        format!(
            "{} does not qualify for automatic endorsement in {}.",
            endorsee.username,
            env.ctx.category.pretty()
        ),
        true,
        EndorserCapability::Uncredited,
        true,
        Some(papers.len()),
    );
    log_terminal("auto_qualification", env, outcome);
    Ok(verdict)
}
