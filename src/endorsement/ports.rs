use crate::{
    accessor::AccessorError,
    endorsement::types::{
        AdminAuditAction, Category, Endorsement, EndorsementContext, EndorsementDomain,
        PaperProps, PaperWindow, User, UserId,
    },
};

/// Read/write capabilities the decision engine needs from the outside world.
///
/// Implementations own all race safety; the engine never locks.
pub trait EndorsementAccessor: Send + Sync {
    /// `subject_class` of `None` or `"*"` matches every subject in the archive.
    fn is_moderator(
        &self,
        user_id: UserId,
        archive: &str,
        subject_class: Option<&str>,
    ) -> Result<bool, AccessorError>;

    fn get_category(
        &self,
        archive: &str,
        subject_class: &str,
    ) -> Result<Option<Category>, AccessorError>;

    fn get_domain_info(
        &self,
        category: &Category,
    ) -> Result<Option<EndorsementDomain>, AccessorError>;

    /// Endorsements received by `user_id` for exactly this pair, with the
    /// endorser's username filled in.
    fn get_endorsements(
        &self,
        user_id: UserId,
        archive: &str,
        subject_class: &str,
    ) -> Result<Vec<Endorsement>, AccessorError>;

    fn get_questionable_categories(
        &self,
        archive: &str,
        subject_class: &str,
    ) -> Result<Vec<Category>, AccessorError>;

    fn get_papers_by_user(
        &self,
        user_id: UserId,
        domain: &str,
        window: PaperWindow,
        require_author: bool,
    ) -> Result<Vec<PaperProps>, AccessorError>;

    /// Blacklist match wins over whitelist match. No match is not academic.
    fn is_academic_email(&self, email: &str) -> Result<(bool, String), AccessorError>;

    fn get_user(&self, id: UserId) -> Result<Option<User>, AccessorError>;

    #[allow(clippy::too_many_arguments)]
    fn record_admin_audit(
        &self,
        ctx: &EndorsementContext,
        affected_user: UserId,
        action: AdminAuditAction,
        data: &str,
        comment: &str,
        user_id: Option<UserId>,
        session_id: Option<i64>,
    ) -> Result<(), AccessorError>;

    /// Stores the endorsement described by `ctx`, worth `point_value`, in
    /// one transaction. Returns `Ok(None)` when a conflicting endorsement
    /// already exists.
    fn submit_endorsement(
        &self,
        ctx: &EndorsementContext,
        point_value: i32,
    ) -> Result<Option<Endorsement>, AccessorError>;

    fn get_existing_endorsement(
        &self,
        ctx: &EndorsementContext,
    ) -> Result<Option<Endorsement>, AccessorError>;
}
