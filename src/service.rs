//! Service layer API for the request workflow
use crate::activity::{ActivityActor, ActivityKind, Labels, transition_entry};
use crate::actor::Actor;
use crate::config::{RequestFilter, ServiceConfig};
use crate::editor::{LineAction, RequestEditor, SaveMode, finalize_write};
use crate::error::{RequestError, Result};
use crate::lifecycle::RequestStatus;
use crate::permissions::Permissions;
use crate::request::{RequestDoc, counter_id, dept_code, format_rq_code};
use crate::revision::{Revision, RevisionClock};
use crate::store::{Store, missing_request};
use crate::transition::StoreTransition;
use crate::utils::now_ms;
use chrono::Local;
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub struct RequestService {
    store: Store,
    config: ServiceConfig,
    clock: RevisionClock,
}

fn report<T>(outcome: Result<T>, rq_code: &str) -> Result<T> {
    if let Err(err) = &outcome {
        match err {
            RequestError::RevisionConflict { expected, live } => {
                warn!(rq_code, expected, live, "stale write rejected")
            }
            RequestError::StockShortage { .. } | RequestError::MissingStock(_) => {
                warn!(rq_code, error = %err, "fulfilment aborted")
            }
            RequestError::InventoryViolation { .. } => {
                warn!(rq_code, error = %err, "inventory check failed")
            }
            RequestError::PermissionDenied(_) => warn!(rq_code, error = %err, "action denied"),
            _ => {}
        }
    }
    outcome
}

impl RequestService {
    pub fn new(instance: Arc<sled::Db>, config: ServiceConfig) -> Result<Self> {
        let store = Store::new(&instance)?;
        Ok(Self {
            store,
            config,
            clock: RevisionClock::new(),
        })
    }

    /// Opens the database at the configured path.
    pub fn open(config: ServiceConfig) -> Result<Self> {
        let db = sled::open(&config.db_path)?;
        Self::new(Arc::new(db), config)
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn flush(&self) -> Result<()> {
        self.store.flush()
    }

    fn store_department(&self) -> &str {
        &self.config.store_department
    }

    pub fn new_editor(&self, actor: Actor) -> RequestEditor {
        RequestEditor::create(actor, self.store_department())
    }

    pub fn open_editor(&self, actor: Actor, rq_code: &str) -> Result<RequestEditor> {
        let doc = self.store.load_request(rq_code)?;
        Ok(RequestEditor::open(actor, doc, self.store_department()))
    }

    /// Mints `DEPT-MMDD###` from today's counter of the origin department.
    fn mint_rq_code(&self, from_dept: Option<&str>) -> Result<String> {
        let code = dept_code(
            from_dept,
            &self.config.store_dept_code_source,
            &self.config.default_dept_code,
        );
        let today = Local::now().date_naive();
        let seq = self.store.next_sequence(&counter_id(&code, today))?;
        Ok(format_rq_code(&code, today, seq, self.config.sequence_digits))
    }

    fn finalize(
        &self,
        live: Option<&RequestDoc>,
        next: RequestDoc,
        actor: &Actor,
        labels: &dyn Labels,
    ) -> RequestDoc {
        let live_rev = live.map(|d| d.updated_at).unwrap_or(Revision::NONE);
        finalize_write(
            live,
            next,
            actor,
            labels,
            self.clock.next_after(live_rev),
            now_ms(),
            self.config.activity_log_limit,
        )
    }

    /// Saves the editor's pending changes and rebases the editor on the
    /// written document.
    #[instrument(skip_all, fields(uid = %editor.actor().uid, mode = ?mode))]
    pub fn save(&self, editor: &mut RequestEditor, mode: SaveMode) -> Result<RequestDoc> {
        // Build the next document; validation and inventory happen here
        let catalog = self.store.catalog()?;
        let mut next = editor.prepare_save(mode, &catalog)?;

        // New requests get their code only once they are valid
        let rq_code = match editor.rq_code() {
            Some(code) => code.to_string(),
            None => self.mint_rq_code(next.from_dept())?,
        };
        next.rq_code = rq_code.clone();

        let labels = self.store.label_index()?;
        let actor = editor.actor();
        let outcome = self
            .store
            .commit_request(&rq_code, editor.expected_revision(), |live| {
                Ok(self.finalize(live, next.clone(), actor, &labels))
            });
        let doc = report(outcome, &rq_code)?;

        info!(rq_code = %doc.rq_code, status = %doc.status, revision = %doc.updated_at, "request saved");
        editor.mark_saved(doc.clone());
        Ok(doc)
    }

    /// Approve, reject, remove or restore one line as its own write.
    #[instrument(skip(self, actor), fields(uid = %actor.uid))]
    pub fn apply_line_action(
        &self,
        rq_code: &str,
        expected: Revision,
        actor: &Actor,
        line_key: &str,
        action: LineAction,
    ) -> Result<RequestDoc> {
        let catalog = self.store.catalog()?;
        let labels = self.store.label_index()?;
        let outcome = self.store.commit_request(rq_code, expected, |live| {
            let live = live.ok_or_else(|| missing_request(rq_code))?;
            let mut editor =
                RequestEditor::open(actor.clone(), live.clone(), self.store_department());
            editor.apply(line_key, action, &catalog)?;
            let next = editor.prepare_line_update()?;
            Ok(self.finalize(Some(live), next, actor, &labels))
        });
        let doc = report(outcome, rq_code)?;

        info!(rq_code, line_key, status = %doc.status, "line updated");
        Ok(doc)
    }

    /// Runs a store transition. Marking a request READY takes the fulfilled
    /// quantities out of stock in the same transaction.
    #[instrument(skip(self, actor), fields(uid = %actor.uid))]
    pub fn transition(
        &self,
        rq_code: &str,
        expected: Revision,
        actor: &Actor,
        transition: StoreTransition,
    ) -> Result<RequestDoc> {
        let build = |live: &RequestDoc| -> Result<RequestDoc> {
            let perms = Permissions::new(actor, Some(live), self.store_department());
            transition.authorize(&perms, live)?;
            Ok(transition.apply(
                live,
                actor,
                self.clock.next_after(live.updated_at),
                now_ms(),
                self.config.activity_log_limit,
            ))
        };

        let outcome = if transition.moves_stock() {
            self.store.commit_fulfilment(rq_code, expected, build)
        } else {
            self.store.commit_request(rq_code, expected, |live| {
                build(live.ok_or_else(|| missing_request(rq_code))?)
            })
        };
        let doc = report(outcome, rq_code)?;

        info!(rq_code, from = %transition.from(), to = %doc.status, "status transition");
        Ok(doc)
    }

    /// Explicitly cancels a request.
    #[instrument(skip(self, actor), fields(uid = %actor.uid))]
    pub fn cancel_request(
        &self,
        rq_code: &str,
        expected: Revision,
        actor: &Actor,
    ) -> Result<RequestDoc> {
        let outcome = self.store.commit_request(rq_code, expected, |live| {
            let live = live.ok_or_else(|| missing_request(rq_code))?;
            if !live.status.is_cancelable() {
                return Err(RequestError::InvalidTransition {
                    from: live.status,
                    to: RequestStatus::Canceled,
                });
            }
            let perms = Permissions::new(actor, Some(live), self.store_department());
            if !perms.can_cancel_request() {
                return Err(RequestError::denied(format!(
                    "{} cannot cancel {rq_code}",
                    actor.display_name()
                )));
            }

            let now = now_ms();
            let who = ActivityActor::from_actor(actor, actor.primary_department());
            let entry = transition_entry(
                ActivityKind::RequestCanceled,
                &format!("{} canceled the request", who.summary_label()),
                live.status,
                RequestStatus::Canceled,
                who,
                now,
            );
            let mut next = live.clone();
            next.status = RequestStatus::Canceled;
            next.canceled_by = Some(actor.stamp(actor.primary_department(), now));
            next.updated_at = self.clock.next_after(live.updated_at);
            next.activity_log = live
                .activity_log
                .prepended(entry, self.config.activity_log_limit);
            Ok(next)
        });
        let doc = report(outcome, rq_code)?;

        info!(rq_code, "request canceled");
        Ok(doc)
    }

    /// Transitions `actor` may run on the stored request.
    pub fn available_transitions(&self, rq_code: &str, actor: &Actor) -> Result<Vec<StoreTransition>> {
        let doc = self.store.load_request(rq_code)?;
        Ok(StoreTransition::available(&doc, actor, self.store_department()))
    }

    pub fn visible_requests(
        &self,
        actor: &Actor,
        filter: &RequestFilter,
        max: usize,
    ) -> Result<Vec<RequestDoc>> {
        self.store
            .visible_requests(actor, self.store_department(), filter, max)
    }
}
