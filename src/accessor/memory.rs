use std::{
    collections::BTreeMap,
    sync::{Mutex, MutexGuard},
};

use crate::{
    accessor::{
        AccessorError,
        email::{EmailList, EmailPattern, classify_email},
    },
    category::CategoryRef,
    endorsement::{
        ports::EndorsementAccessor,
        types::{
            AdminAuditAction, AuditRecord, Category, Endorsement, EndorsementContext,
            EndorsementDomain, EndorsementRequest, PaperProps, PaperWindow, User, UserId,
            suspect_actions,
        },
    },
};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnedPaper {
    pub user_id: UserId,
    pub domain: String,
    pub valid: bool,
    pub paper: PaperProps,
}

/// Plain tables behind [`InMemoryAccessor`]. Built up front, then frozen
/// behind the accessor's lock.
#[derive(Debug, Clone, Default)]
pub struct MemoryState {
    pub users: BTreeMap<UserId, User>,
    pub moderators: Vec<(UserId, CategoryRef)>,
    pub categories: Vec<Category>,
    pub domains: BTreeMap<String, EndorsementDomain>,
    pub questionable: Vec<CategoryRef>,
    pub papers: Vec<OwnedPaper>,
    pub email_patterns: Vec<EmailPattern>,
    pub requests: BTreeMap<i64, EndorsementRequest>,
    pub endorsements: Vec<Endorsement>,
    pub audit_log: Vec<AuditRecord>,
    pub admin_audit: Vec<AuditRecord>,
    next_endorsement_id: i64,
}

impl MemoryState {
    pub fn with_user(mut self, user: User) -> Self {
        self.users.insert(user.id, user);
        self
    }

    pub fn with_domain(mut self, domain: EndorsementDomain) -> Self {
        self.domains.insert(domain.name.clone(), domain);
        self
    }

    pub fn with_category(mut self, category: Category) -> Self {
        self.categories.push(category);
        self
    }

    /// An empty subject class registers an archive-wide moderator.
    pub fn with_moderator(mut self, user_id: UserId, archive: &str, subject_class: &str) -> Self {
        self.moderators
            .push((user_id, CategoryRef::raw(archive, subject_class)));
        self
    }

    pub fn with_questionable(mut self, archive: &str, subject_class: &str) -> Self {
        self.questionable
            .push(CategoryRef::raw(archive, subject_class));
        self
    }

    pub fn with_paper(mut self, user_id: UserId, domain: &str, paper: PaperProps) -> Self {
        self.papers.push(OwnedPaper {
            user_id,
            domain: domain.to_string(),
            valid: true,
            paper,
        });
        self
    }

    pub fn with_email_pattern(mut self, list: EmailList, pattern: &str) -> Self {
        self.email_patterns.push(EmailPattern::new(list, pattern));
        self
    }

    pub fn with_request(mut self, request: EndorsementRequest) -> Self {
        self.requests.insert(request.id, request);
        self
    }

    pub fn with_endorsement(mut self, endorsement: Endorsement) -> Self {
        self.next_endorsement_id = self.next_endorsement_id.max(endorsement.id);
        self.endorsements.push(endorsement);
        self
    }

    fn username(&self, user_id: Option<UserId>) -> Option<String> {
        user_id
            .and_then(|id| self.users.get(&id))
            .map(|user| user.username.clone())
    }

    fn find_conflict(&self, ctx: &EndorsementContext, endorsee_id: UserId) -> Option<&Endorsement> {
        let endorser_id = ctx.endorser_id();
        self.endorsements.iter().find(|endorsement| {
            endorsement.endorser_id == endorser_id
                && endorsement.endorsee_id == endorsee_id
                && endorsement.category() == ctx.category
        })
    }

    fn point_total(&self, endorsee_id: UserId, category: &CategoryRef) -> i32 {
        self.endorsements
            .iter()
            .filter(|endorsement| {
                endorsement.endorsee_id == endorsee_id
                    && endorsement.flag_valid
                    && endorsement.category() == *category
            })
            .map(|endorsement| endorsement.point_value)
            .sum()
    }
}

/// Fully working accessor over in-process tables. One lock guards every
/// table, so submission is atomic.
#[derive(Debug, Default)]
pub struct InMemoryAccessor {
    state: Mutex<MemoryState>,
}

impl InMemoryAccessor {
    pub fn new(state: MemoryState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    fn lock(&self) -> Result<MutexGuard<'_, MemoryState>, AccessorError> {
        self.state
            .lock()
            .map_err(|err| AccessorError::LockPoisoned(err.to_string()))
    }

    pub fn snapshot(&self) -> Result<MemoryState, AccessorError> {
        Ok(self.lock()?.clone())
    }
}

impl EndorsementAccessor for InMemoryAccessor {
    fn is_moderator(
        &self,
        user_id: UserId,
        archive: &str,
        subject_class: Option<&str>,
    ) -> Result<bool, AccessorError> {
        let state = self.lock()?;
        let any_subject = matches!(subject_class, None | Some("*"));
        Ok(state.moderators.iter().any(|(moderator, category)| {
            *moderator == user_id
                && category.archive == archive
                && (any_subject || Some(category.subject_class.as_str()) == subject_class)
        }))
    }

    fn get_category(
        &self,
        archive: &str,
        subject_class: &str,
    ) -> Result<Option<Category>, AccessorError> {
        let state = self.lock()?;
        Ok(state
            .categories
            .iter()
            .find(|category| category.archive == archive && category.subject_class == subject_class)
            .cloned())
    }

    fn get_domain_info(
        &self,
        category: &Category,
    ) -> Result<Option<EndorsementDomain>, AccessorError> {
        let state = self.lock()?;
        Ok(category
            .endorsement_domain
            .as_ref()
            .and_then(|name| state.domains.get(name))
            .cloned())
    }

    fn get_endorsements(
        &self,
        user_id: UserId,
        archive: &str,
        subject_class: &str,
    ) -> Result<Vec<Endorsement>, AccessorError> {
        let state = self.lock()?;
        Ok(state
            .endorsements
            .iter()
            .filter(|endorsement| {
                endorsement.endorsee_id == user_id
                    && endorsement.archive == archive
                    && endorsement.subject_class == subject_class
            })
            .map(|endorsement| Endorsement {
                endorser_username: state.username(endorsement.endorser_id),
                ..endorsement.clone()
            })
            .collect())
    }

    fn get_questionable_categories(
        &self,
        archive: &str,
        subject_class: &str,
    ) -> Result<Vec<Category>, AccessorError> {
        let state = self.lock()?;
        let wanted = CategoryRef::raw(archive, subject_class);
        if !state.questionable.contains(&wanted) {
            return Ok(Vec::new());
        }
        Ok(state
            .categories
            .iter()
            .filter(|category| category.archive == archive && category.subject_class == subject_class)
            .cloned()
            .collect())
    }

    fn get_papers_by_user(
        &self,
        user_id: UserId,
        domain: &str,
        window: PaperWindow,
        require_author: bool,
    ) -> Result<Vec<PaperProps>, AccessorError> {
        let state = self.lock()?;
        let mut papers: Vec<PaperProps> = state
            .papers
            .iter()
            .filter(|owned| {
                owned.user_id == user_id
                    && owned.domain == domain
                    && owned.valid
                    && window.contains(owned.paper.dated)
                    && (!require_author || owned.paper.flag_author)
            })
            .map(|owned| owned.paper.clone())
            .collect();
        papers.sort_by_key(|paper| paper.dated);
        Ok(papers)
    }

    fn is_academic_email(&self, email: &str) -> Result<(bool, String), AccessorError> {
        let state = self.lock()?;
        Ok(classify_email(email, &state.email_patterns)?)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, AccessorError> {
        Ok(self.lock()?.users.get(&id).cloned())
    }

    fn record_admin_audit(
        &self,
        ctx: &EndorsementContext,
        affected_user: UserId,
        action: AdminAuditAction,
        data: &str,
        comment: &str,
        user_id: Option<UserId>,
        session_id: Option<i64>,
    ) -> Result<(), AccessorError> {
        let record = AuditRecord::for_admin_action(
            ctx,
            affected_user,
            action,
            data,
            comment,
            user_id,
            session_id,
        );
        self.lock()?.admin_audit.push(record);
        Ok(())
    }

    fn submit_endorsement(
        &self,
        ctx: &EndorsementContext,
        point_value: i32,
    ) -> Result<Option<Endorsement>, AccessorError> {
        let Some(endorsee) = ctx.endorsee.as_ref() else {
            return Err(AccessorError::InvalidContext(
                "endorsement submission without an endorsee".to_string(),
            ));
        };

        let mut state = self.lock()?;
        if state.find_conflict(ctx, endorsee.id).is_some() {
            return Ok(None);
        }

        state.next_endorsement_id += 1;
        let endorsement = Endorsement {
            id: state.next_endorsement_id,
            endorser_id: ctx.endorser_id(),
            endorser_username: ctx.endorser.as_ref().map(|user| user.username.clone()),
            endorsee_id: endorsee.id,
            archive: ctx.category.archive.clone(),
            subject_class: ctx.category.subject_class.clone(),
            flag_valid: true,
            endorsement_type: ctx.endorsement_type(),
            point_value,
            issued_when: ctx.issued_when,
            request_id: ctx.request.as_ref().map(|request| request.id),
        };
        state.endorsements.push(endorsement.clone());
        state
            .audit_log
            .push(AuditRecord::for_endorsement(ctx, &endorsement));

        for action in suspect_actions(ctx) {
            if let Some(user) = state.users.get_mut(&endorsee.id) {
                user.flag_suspect = true;
            }
            state.admin_audit.push(AuditRecord::for_admin_action(
                ctx,
                endorsee.id,
                action,
                &ctx.category.pretty(),
                &ctx.vote.comment,
                ctx.endorser_id(),
                ctx.tracking.session_id,
            ));
        }

        if let Some(request_id) = endorsement.request_id {
            let total = state.point_total(endorsee.id, &ctx.category);
            if let Some(request) = state.requests.get_mut(&request_id) {
                request.point_value = total;
            }
        }

        Ok(Some(endorsement))
    }

    fn get_existing_endorsement(
        &self,
        ctx: &EndorsementContext,
    ) -> Result<Option<Endorsement>, AccessorError> {
        let Some(endorsee) = ctx.endorsee.as_ref() else {
            return Ok(None);
        };
        let state = self.lock()?;
        Ok(state.find_conflict(ctx, endorsee.id).map(|endorsement| Endorsement {
            endorser_username: state.username(endorsement.endorser_id),
            ..endorsement.clone()
        }))
    }
}
