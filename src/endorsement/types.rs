use std::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

use crate::category::CategoryRef;

pub type UserId = i64;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum VetoStatus {
    #[default]
    Ok,
    NoEndorse,
    NoUpload,
    NoReplace,
}

impl VetoStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            VetoStatus::Ok => "ok",
            VetoStatus::NoEndorse => "no-endorse",
            VetoStatus::NoUpload => "no-upload",
            VetoStatus::NoReplace => "no-replace",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "ok" => Some(VetoStatus::Ok),
            "no-endorse" => Some(VetoStatus::NoEndorse),
            "no-upload" => Some(VetoStatus::NoUpload),
            "no-replace" => Some(VetoStatus::NoReplace),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct User {
    pub id: UserId,
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub veto_status: VetoStatus,
    #[serde(default)]
    pub flag_proxy: bool,
    #[serde(default)]
    pub flag_suspect: bool,
    #[serde(default)]
    pub is_admin: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub archive: String,
    pub subject_class: String,
    pub definitive: bool,
    pub category_name: String,
    #[serde(default)]
    pub endorsement_domain: Option<String>,
}

/// Policy bucket shared by one or more categories.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementDomain {
    pub name: String,
    pub endorse_all: bool,
    pub mods_endorse_all: bool,
    pub endorse_email: bool,
    pub papers_to_endorse: u32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementRequest {
    pub id: i64,
    pub endorsee_id: UserId,
    pub archive: String,
    pub subject_class: String,
    pub secret: String,
    pub point_value: i32,
    pub flag_valid: bool,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_when: OffsetDateTime,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndorsementType {
    User,
    Admin,
    Auto,
}

impl EndorsementType {
    /// Admin wins over everything; a missing endorser means the system
    /// granted it.
    pub fn for_endorser(endorser: Option<&User>) -> Self {
        match endorser {
            Some(user) if user.is_admin => EndorsementType::Admin,
            Some(_) => EndorsementType::User,
            None => EndorsementType::Auto,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            EndorsementType::User => "user",
            EndorsementType::Admin => "admin",
            EndorsementType::Auto => "auto",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(EndorsementType::User),
            "admin" => Some(EndorsementType::Admin),
            "auto" => Some(EndorsementType::Auto),
            _ => None,
        }
    }
}

impl fmt::Display for EndorsementType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Endorsement {
    pub id: i64,
    pub endorser_id: Option<UserId>,
    #[serde(default)]
    pub endorser_username: Option<String>,
    pub endorsee_id: UserId,
    pub archive: String,
    pub subject_class: String,
    pub flag_valid: bool,
    pub endorsement_type: EndorsementType,
    pub point_value: i32,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_when: OffsetDateTime,
    #[serde(default)]
    pub request_id: Option<i64>,
}

impl Endorsement {
    pub fn is_auto(&self) -> bool {
        self.endorser_id.is_none()
    }

    pub fn category(&self) -> CategoryRef {
        CategoryRef::raw(&self.archive, &self.subject_class)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaperProps {
    pub document_id: i64,
    pub flag_author: bool,
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub dated: OffsetDateTime,
}

/// Time range a paper must fall into to count.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaperWindow {
    Unrestricted,
    Between {
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
}

impl PaperWindow {
    pub fn contains(&self, dated: OffsetDateTime) -> bool {
        match self {
            PaperWindow::Unrestricted => true,
            PaperWindow::Between { start, end } => *start <= dated && dated <= *end,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsementVote {
    #[serde(default)]
    pub preflight: bool,
    #[serde(default = "default_positive")]
    pub positive: bool,
    #[serde(default)]
    pub comment: String,
    #[serde(default)]
    pub knows_personally: bool,
    #[serde(default)]
    pub seen_paper: bool,
}

fn default_positive() -> bool {
    true
}

impl EndorsementVote {
    pub fn positive() -> Self {
        Self {
            positive: true,
            ..Self::default()
        }
    }

    pub fn negative(comment: impl Into<String>) -> Self {
        Self {
            positive: false,
            comment: comment.into(),
            ..Self::default()
        }
    }

    pub fn preflight(mut self) -> Self {
        self.preflight = true;
        self
    }
}

/// Request metadata kept for the audit trail. Never a decision input.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrackingInfo {
    #[serde(default)]
    pub session_id: Option<i64>,
    #[serde(default)]
    pub remote_addr: String,
    #[serde(default)]
    pub remote_host: String,
    #[serde(default)]
    pub tracking_cookie: String,
}

/// Everything one evaluation knows about its participants and the request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EndorsementContext {
    pub endorser: Option<User>,
    pub endorsee: Option<User>,
    pub category: CategoryRef,
    pub raw_category: CategoryRef,
    pub request: Option<EndorsementRequest>,
    pub vote: EndorsementVote,
    pub issued_when: OffsetDateTime,
    pub tracking: TrackingInfo,
}

impl EndorsementContext {
    pub fn new(archive: &str, subject_class: &str, issued_when: OffsetDateTime) -> Self {
        Self {
            endorser: None,
            endorsee: None,
            category: CategoryRef::canonical(archive, subject_class),
            raw_category: CategoryRef::raw(archive, subject_class),
            request: None,
            vote: EndorsementVote::positive(),
            issued_when,
            tracking: TrackingInfo::default(),
        }
    }

    pub fn with_endorser(mut self, endorser: User) -> Self {
        self.endorser = Some(endorser);
        self
    }

    pub fn with_endorsee(mut self, endorsee: User) -> Self {
        self.endorsee = Some(endorsee);
        self
    }

    pub fn with_request(mut self, request: EndorsementRequest) -> Self {
        self.request = Some(request);
        self
    }

    pub fn with_vote(mut self, vote: EndorsementVote) -> Self {
        self.vote = vote;
        self
    }

    pub fn with_tracking(mut self, tracking: TrackingInfo) -> Self {
        self.tracking = tracking;
        self
    }

    pub fn endorser_id(&self) -> Option<UserId> {
        self.endorser.as_ref().map(|user| user.id)
    }

    pub fn endorsement_type(&self) -> EndorsementType {
        EndorsementType::for_endorser(self.endorser.as_ref())
    }

    pub fn point_value(&self, positive_point_value: i32) -> i32 {
        if self.vote.positive {
            positive_point_value
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AdminAuditAction {
    EndorsedBySuspect,
    GotNegativeEndorsement,
}

impl AdminAuditAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AdminAuditAction::EndorsedBySuspect => "endorsed-by-suspect",
            AdminAuditAction::GotNegativeEndorsement => "got-negative-endorsement",
        }
    }
}

/// One row of the endorsement or admin audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub action: String,
    pub user_id: Option<UserId>,
    pub affected_user: UserId,
    pub data: String,
    pub comment: String,
    pub session_id: Option<i64>,
    pub remote_addr: String,
    pub remote_host: String,
    pub tracking_cookie: String,
    #[serde(with = "time::serde::rfc3339")]
    pub issued_when: OffsetDateTime,
}

impl AuditRecord {
    /// Audit row written alongside every stored endorsement.
    pub fn for_endorsement(ctx: &EndorsementContext, endorsement: &Endorsement) -> Self {
        let endorser = match endorsement.endorser_id {
            Some(id) => id.to_string(),
            None => "auto".to_string(),
        };
        Self {
            action: "endorse".to_string(),
            user_id: endorsement.endorser_id,
            affected_user: endorsement.endorsee_id,
            data: format!(
                "{} {} {} {}",
                endorser,
                endorsement.category().pretty(),
                endorsement.endorsement_type,
                endorsement.point_value
            ),
            comment: ctx.vote.comment.clone(),
            session_id: ctx.tracking.session_id,
            remote_addr: ctx.tracking.remote_addr.clone(),
            remote_host: ctx.tracking.remote_host.clone(),
            tracking_cookie: ctx.tracking.tracking_cookie.clone(),
            issued_when: ctx.issued_when,
        }
    }

    pub fn for_admin_action(
        ctx: &EndorsementContext,
        affected_user: UserId,
        action: AdminAuditAction,
        data: &str,
        comment: &str,
        user_id: Option<UserId>,
        session_id: Option<i64>,
    ) -> Self {
        Self {
            action: action.as_str().to_string(),
            user_id,
            affected_user,
            data: data.to_string(),
            comment: comment.to_string(),
            session_id,
            remote_addr: ctx.tracking.remote_addr.clone(),
            remote_host: ctx.tracking.remote_host.clone(),
            tracking_cookie: ctx.tracking.tracking_cookie.clone(),
            issued_when: ctx.issued_when,
        }
    }
}

/// Admin audit rows a submission has to write for the endorsee, if any.
pub fn suspect_actions(ctx: &EndorsementContext) -> Vec<AdminAuditAction> {
    let mut actions = Vec::new();
    let endorser_suspect = ctx.endorser.as_ref().is_some_and(|user| user.flag_suspect);
    if ctx.vote.positive && endorser_suspect {
        actions.push(AdminAuditAction::EndorsedBySuspect);
    }
    if !ctx.vote.positive {
        actions.push(AdminAuditAction::GotNegativeEndorsement);
    }
    actions
}
