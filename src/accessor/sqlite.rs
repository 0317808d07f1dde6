use std::{path::Path, sync::Mutex, time::Duration};

use rusqlite::{
    Connection, ErrorCode, OptionalExtension, Row, TransactionBehavior, params, types::Type,
};
use time::OffsetDateTime;
use tracing::{debug, info};

use crate::{
    accessor::{
        AccessorError,
        email::{EmailList, EmailPattern, classify_email},
        schema,
    },
    endorsement::{
        ports::EndorsementAccessor,
        types::{
            AdminAuditAction, AuditRecord, Category, Endorsement, EndorsementContext,
            EndorsementDomain, EndorsementRequest, EndorsementType, PaperProps, PaperWindow, User,
            UserId, VetoStatus, suspect_actions,
        },
    },
};

const ENDORSEMENT_COLUMNS: &str = "e.id, e.endorser_id, u.username, e.endorsee_id, e.archive, \
     e.subject_class, e.flag_valid, e.type, e.point_value, e.issued_when, e.request_id";

fn conversion_error(idx: usize, kind: Type, message: String) -> rusqlite::Error {
    rusqlite::Error::FromSqlConversionFailure(idx, kind, Box::new(AccessorError::Corrupt(message)))
}

fn timestamp_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<OffsetDateTime> {
    let seconds: i64 = row.get(idx)?;
    OffsetDateTime::from_unix_timestamp(seconds)
        .map_err(|err| conversion_error(idx, Type::Integer, err.to_string()))
}

fn flag_at(row: &Row<'_>, idx: usize) -> rusqlite::Result<bool> {
    let value: String = row.get(idx)?;
    Ok(value == "y")
}

fn yes_no(value: bool) -> &'static str {
    if value { "y" } else { "n" }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<User> {
    let veto: String = row.get(3)?;
    let veto_status = VetoStatus::parse(&veto)
        .ok_or_else(|| conversion_error(3, Type::Text, format!("unknown veto status '{veto}'")))?;
    Ok(User {
        id: row.get(0)?,
        username: row.get(1)?,
        email: row.get(2)?,
        veto_status,
        flag_proxy: row.get(4)?,
        flag_suspect: row.get(5)?,
        is_admin: row.get(6)?,
    })
}

fn category_from_row(row: &Row<'_>) -> rusqlite::Result<Category> {
    Ok(Category {
        archive: row.get(0)?,
        subject_class: row.get(1)?,
        definitive: row.get(2)?,
        category_name: row.get(3)?,
        endorsement_domain: row.get(4)?,
    })
}

fn endorsement_from_row(row: &Row<'_>) -> rusqlite::Result<Endorsement> {
    let kind: String = row.get(7)?;
    let endorsement_type = EndorsementType::parse(&kind).ok_or_else(|| {
        conversion_error(7, Type::Text, format!("unknown endorsement type '{kind}'"))
    })?;
    Ok(Endorsement {
        id: row.get(0)?,
        endorser_id: row.get(1)?,
        endorser_username: row.get(2)?,
        endorsee_id: row.get(3)?,
        archive: row.get(4)?,
        subject_class: row.get(5)?,
        flag_valid: row.get(6)?,
        endorsement_type,
        point_value: row.get(8)?,
        issued_when: timestamp_at(row, 9)?,
        request_id: row.get(10)?,
    })
}

fn request_from_row(row: &Row<'_>) -> rusqlite::Result<EndorsementRequest> {
    Ok(EndorsementRequest {
        id: row.get(0)?,
        endorsee_id: row.get(1)?,
        archive: row.get(2)?,
        subject_class: row.get(3)?,
        secret: row.get(4)?,
        point_value: row.get(5)?,
        flag_valid: row.get(6)?,
        issued_when: timestamp_at(row, 7)?,
    })
}

fn audit_from_row(row: &Row<'_>) -> rusqlite::Result<AuditRecord> {
    Ok(AuditRecord {
        action: row.get(0)?,
        user_id: row.get(1)?,
        affected_user: row.get(2)?,
        data: row.get(3)?,
        comment: row.get(4)?,
        session_id: row.get(5)?,
        remote_addr: row.get(6)?,
        remote_host: row.get(7)?,
        tracking_cookie: row.get(8)?,
        issued_when: timestamp_at(row, 9)?,
    })
}

fn insert_audit(conn: &Connection, table: &str, record: &AuditRecord) -> Result<(), AccessorError> {
    let sql = format!(
        "INSERT INTO {table} (action, user_id, affected_user, data, comment, session_id, \
         remote_addr, remote_host, tracking_cookie, issued_when) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)"
    );
    conn.execute(
        &sql,
        params![
            record.action,
            record.user_id,
            record.affected_user,
            record.data,
            record.comment,
            record.session_id,
            record.remote_addr,
            record.remote_host,
            record.tracking_cookie,
            record.issued_when.unix_timestamp(),
        ],
    )?;
    Ok(())
}

fn find_endorsement(
    conn: &Connection,
    endorser_id: Option<UserId>,
    endorsee_id: UserId,
    archive: &str,
    subject_class: &str,
) -> Result<Option<Endorsement>, AccessorError> {
    let sql = format!(
        "SELECT {ENDORSEMENT_COLUMNS} FROM endorsements e \
         LEFT JOIN users u ON u.id = e.endorser_id \
         WHERE e.endorser_id IS ?1 AND e.endorsee_id = ?2 \
           AND e.archive = ?3 AND e.subject_class = ?4"
    );
    Ok(conn
        .query_row(
            &sql,
            params![endorser_id, endorsee_id, archive, subject_class],
            endorsement_from_row,
        )
        .optional()?)
}

fn is_constraint_violation(err: &rusqlite::Error) -> bool {
    matches!(err.sqlite_error_code(), Some(ErrorCode::ConstraintViolation))
}

/// Production accessor over a SQLite database.
pub struct SqliteAccessor {
    conn: Mutex<Connection>,
}

impl SqliteAccessor {
    /// Open or create the endorsement database at `path`
    pub fn open(path: &Path) -> Result<Self, AccessorError> {
        info!(target: "accessor", path = %path.display(), "opening_sqlite_database");
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL; PRAGMA foreign_keys=ON;")?;
        conn.busy_timeout(Duration::from_secs(5))?;
        Self::from_connection(conn)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self, AccessorError> {
        debug!(target: "accessor", "opening_in_memory_sqlite_database");
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys=ON;")?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self, AccessorError> {
        schema::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    pub fn with_conn<F, T>(&self, f: F) -> Result<T, AccessorError>
    where
        F: FnOnce(&Connection) -> Result<T, AccessorError>,
    {
        let conn = self
            .conn
            .lock()
            .map_err(|err| AccessorError::LockPoisoned(err.to_string()))?;
        f(&conn)
    }

    pub fn with_conn_mut<F, T>(&self, f: F) -> Result<T, AccessorError>
    where
        F: FnOnce(&mut Connection) -> Result<T, AccessorError>,
    {
        let mut conn = self
            .conn
            .lock()
            .map_err(|err| AccessorError::LockPoisoned(err.to_string()))?;
        f(&mut conn)
    }

    pub fn insert_user(&self, user: &User) -> Result<(), AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO users (id, username, email, veto_status, flag_proxy, flag_suspect, is_admin) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    user.id,
                    user.username,
                    user.email,
                    user.veto_status.as_str(),
                    user.flag_proxy,
                    user.flag_suspect,
                    user.is_admin,
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_domain(&self, domain: &EndorsementDomain) -> Result<(), AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO endorsement_domains \
                 (name, endorse_all, mods_endorse_all, endorse_email, papers_to_endorse) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    domain.name,
                    yes_no(domain.endorse_all),
                    yes_no(domain.mods_endorse_all),
                    yes_no(domain.endorse_email),
                    domain.papers_to_endorse,
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_category(&self, category: &Category) -> Result<(), AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO categories \
                 (archive, subject_class, definitive, category_name, endorsement_domain) \
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    category.archive,
                    category.subject_class,
                    category.definitive,
                    category.category_name,
                    category.endorsement_domain,
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_moderator(
        &self,
        user_id: UserId,
        archive: &str,
        subject_class: &str,
    ) -> Result<(), AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO moderators (user_id, archive, subject_class) VALUES (?1, ?2, ?3)",
                params![user_id, archive, subject_class],
            )?;
            Ok(())
        })
    }

    pub fn insert_questionable(&self, archive: &str, subject_class: &str) -> Result<(), AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO questionable_categories (archive, subject_class) VALUES (?1, ?2)",
                params![archive, subject_class],
            )?;
            Ok(())
        })
    }

    pub fn insert_paper(
        &self,
        user_id: UserId,
        domain: &str,
        paper: &PaperProps,
    ) -> Result<(), AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO papers (document_id, user_id, domain, title, dated, flag_author) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    paper.document_id,
                    user_id,
                    domain,
                    paper.title,
                    paper.dated.unix_timestamp(),
                    paper.flag_author,
                ],
            )?;
            Ok(())
        })
    }

    pub fn insert_email_pattern(&self, pattern: &EmailPattern) -> Result<(), AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO email_patterns (pattern, list) VALUES (?1, ?2)",
                params![pattern.pattern, pattern.list.as_str()],
            )?;
            Ok(())
        })
    }

    /// Stores a new request; the returned copy carries the assigned id.
    pub fn insert_request(&self, request: &EndorsementRequest) -> Result<EndorsementRequest, AccessorError> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO endorsement_requests \
                 (endorsee_id, archive, subject_class, secret, point_value, flag_valid, issued_when) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    request.endorsee_id,
                    request.archive,
                    request.subject_class,
                    request.secret,
                    request.point_value,
                    request.flag_valid,
                    request.issued_when.unix_timestamp(),
                ],
            )?;
            Ok(EndorsementRequest {
                id: conn.last_insert_rowid(),
                ..request.clone()
            })
        })
    }

    pub fn get_request(&self, id: i64) -> Result<Option<EndorsementRequest>, AccessorError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, endorsee_id, archive, subject_class, secret, point_value, \
                     flag_valid, issued_when FROM endorsement_requests WHERE id = ?1",
                    params![id],
                    request_from_row,
                )
                .optional()?)
        })
    }

    pub fn audit_log(&self, admin: bool) -> Result<Vec<AuditRecord>, AccessorError> {
        let table = if admin { "admin_audit" } else { "audit_log" };
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT action, user_id, affected_user, data, comment, session_id, remote_addr, \
                 remote_host, tracking_cookie, issued_when FROM {table} ORDER BY id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map([], audit_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }
}

impl EndorsementAccessor for SqliteAccessor {
    fn is_moderator(
        &self,
        user_id: UserId,
        archive: &str,
        subject_class: Option<&str>,
    ) -> Result<bool, AccessorError> {
        self.with_conn(|conn| {
            let found: Option<i64> = match subject_class {
                None | Some("*") => conn
                    .query_row(
                        "SELECT 1 FROM moderators WHERE user_id = ?1 AND archive = ?2 LIMIT 1",
                        params![user_id, archive],
                        |row| row.get(0),
                    )
                    .optional()?,
                Some(subject_class) => conn
                    .query_row(
                        "SELECT 1 FROM moderators \
                         WHERE user_id = ?1 AND archive = ?2 AND subject_class = ?3 LIMIT 1",
                        params![user_id, archive, subject_class],
                        |row| row.get(0),
                    )
                    .optional()?,
            };
            Ok(found.is_some())
        })
    }

    fn get_category(
        &self,
        archive: &str,
        subject_class: &str,
    ) -> Result<Option<Category>, AccessorError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT archive, subject_class, definitive, category_name, endorsement_domain \
                     FROM categories WHERE archive = ?1 AND subject_class = ?2",
                    params![archive, subject_class],
                    category_from_row,
                )
                .optional()?)
        })
    }

    fn get_domain_info(
        &self,
        category: &Category,
    ) -> Result<Option<EndorsementDomain>, AccessorError> {
        let Some(name) = category.endorsement_domain.as_deref() else {
            return Ok(None);
        };
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT name, endorse_all, mods_endorse_all, endorse_email, papers_to_endorse \
                     FROM endorsement_domains WHERE name = ?1",
                    params![name],
                    |row| {
                        Ok(EndorsementDomain {
                            name: row.get(0)?,
                            endorse_all: flag_at(row, 1)?,
                            mods_endorse_all: flag_at(row, 2)?,
                            endorse_email: flag_at(row, 3)?,
                            papers_to_endorse: row.get(4)?,
                        })
                    },
                )
                .optional()?)
        })
    }

    fn get_endorsements(
        &self,
        user_id: UserId,
        archive: &str,
        subject_class: &str,
    ) -> Result<Vec<Endorsement>, AccessorError> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {ENDORSEMENT_COLUMNS} FROM endorsements e \
                 LEFT JOIN users u ON u.id = e.endorser_id \
                 WHERE e.endorsee_id = ?1 AND e.archive = ?2 AND e.subject_class = ?3 \
                 ORDER BY e.id"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt.query_map(params![user_id, archive, subject_class], endorsement_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    fn get_questionable_categories(
        &self,
        archive: &str,
        subject_class: &str,
    ) -> Result<Vec<Category>, AccessorError> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT c.archive, c.subject_class, c.definitive, c.category_name, c.endorsement_domain \
                 FROM questionable_categories q \
                 JOIN categories c ON c.archive = q.archive AND c.subject_class = q.subject_class \
                 WHERE q.archive = ?1 AND q.subject_class = ?2",
            )?;
            let rows = stmt.query_map(params![archive, subject_class], category_from_row)?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    fn get_papers_by_user(
        &self,
        user_id: UserId,
        domain: &str,
        window: PaperWindow,
        require_author: bool,
    ) -> Result<Vec<PaperProps>, AccessorError> {
        let (start, end) = match window {
            PaperWindow::Unrestricted => (i64::MIN, i64::MAX),
            PaperWindow::Between { start, end } => (start.unix_timestamp(), end.unix_timestamp()),
        };
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT document_id, flag_author, title, dated FROM papers \
                 WHERE user_id = ?1 AND domain = ?2 AND valid = 1 \
                   AND dated BETWEEN ?3 AND ?4 AND (?5 = 0 OR flag_author = 1) \
                 ORDER BY dated, document_id",
            )?;
            let rows = stmt.query_map(
                params![user_id, domain, start, end, require_author],
                |row| {
                    Ok(PaperProps {
                        document_id: row.get(0)?,
                        flag_author: row.get(1)?,
                        title: row.get(2)?,
                        dated: timestamp_at(row, 3)?,
                    })
                },
            )?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })
    }

    fn is_academic_email(&self, email: &str) -> Result<(bool, String), AccessorError> {
        let patterns = self.with_conn(|conn| {
            let mut stmt = conn.prepare("SELECT pattern, list FROM email_patterns ORDER BY pattern")?;
            let rows = stmt.query_map([], |row| {
                let list: String = row.get(1)?;
                let list = EmailList::parse(&list).ok_or_else(|| {
                    conversion_error(1, Type::Text, format!("unknown email list '{list}'"))
                })?;
                Ok(EmailPattern {
                    pattern: row.get(0)?,
                    list,
                })
            })?;
            Ok(rows.collect::<Result<Vec<_>, _>>()?)
        })?;
        Ok(classify_email(email, &patterns)?)
    }

    fn get_user(&self, id: UserId) -> Result<Option<User>, AccessorError> {
        self.with_conn(|conn| {
            Ok(conn
                .query_row(
                    "SELECT id, username, email, veto_status, flag_proxy, flag_suspect, is_admin \
                     FROM users WHERE id = ?1",
                    params![id],
                    user_from_row,
                )
                .optional()?)
        })
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
        self.with_conn(|conn| insert_audit(conn, "admin_audit", &record))
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
        let category = &ctx.category;
        let endorser_id = ctx.endorser_id();
        let endorsement_type = ctx.endorsement_type();
        let request_id = ctx.request.as_ref().map(|request| request.id);

        self.with_conn_mut(|conn| {
            // IMMEDIATE takes the write lock before the duplicate check.
            let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;

            if find_endorsement(&tx, endorser_id, endorsee.id, &category.archive, &category.subject_class)?
                .is_some()
            {
                return Ok(None);
            }

            let inserted = tx.execute(
                "INSERT INTO endorsements \
                 (endorser_id, endorsee_id, archive, subject_class, flag_valid, type, point_value, \
                  issued_when, request_id) \
                 VALUES (?1, ?2, ?3, ?4, 1, ?5, ?6, ?7, ?8)",
                params![
                    endorser_id,
                    endorsee.id,
                    category.archive,
                    category.subject_class,
                    endorsement_type.as_str(),
                    point_value,
                    ctx.issued_when.unix_timestamp(),
                    request_id,
                ],
            );
            match inserted {
                Ok(_) => {}
                Err(err) if is_constraint_violation(&err) => return Ok(None),
                Err(err) => return Err(err.into()),
            }

            let endorsement = Endorsement {
                id: tx.last_insert_rowid(),
                endorser_id,
                endorser_username: ctx.endorser.as_ref().map(|user| user.username.clone()),
                endorsee_id: endorsee.id,
                archive: category.archive.clone(),
                subject_class: category.subject_class.clone(),
                flag_valid: true,
                endorsement_type,
                point_value,
                issued_when: ctx.issued_when,
                request_id,
            };
            insert_audit(&tx, "audit_log", &AuditRecord::for_endorsement(ctx, &endorsement))?;

            for action in suspect_actions(ctx) {
                tx.execute(
                    "UPDATE users SET flag_suspect = 1 WHERE id = ?1",
                    params![endorsee.id],
                )?;
                let record = AuditRecord::for_admin_action(
                    ctx,
                    endorsee.id,
                    action,
                    &category.pretty(),
                    &ctx.vote.comment,
                    endorser_id,
                    ctx.tracking.session_id,
                );
                insert_audit(&tx, "admin_audit", &record)?;
            }

            if let Some(request_id) = request_id {
                tx.execute(
                    "UPDATE endorsement_requests SET point_value = ( \
                         SELECT COALESCE(SUM(point_value), 0) FROM endorsements \
                         WHERE endorsee_id = ?1 AND archive = ?2 AND subject_class = ?3 \
                           AND flag_valid = 1) \
                     WHERE id = ?4",
                    params![endorsee.id, category.archive, category.subject_class, request_id],
                )?;
            }

            tx.commit()?;
            Ok(Some(endorsement))
        })
    }

    fn get_existing_endorsement(
        &self,
        ctx: &EndorsementContext,
    ) -> Result<Option<Endorsement>, AccessorError> {
        let Some(endorsee) = ctx.endorsee.as_ref() else {
            return Ok(None);
        };
        self.with_conn(|conn| {
            find_endorsement(
                conn,
                ctx.endorser_id(),
                endorsee.id,
                &ctx.category.archive,
                &ctx.category.subject_class,
            )
        })
    }
}
