//! Document store on sled.
//!
//! One tree per collection, documents encoded as CBOR. Every write goes
//! through a sled transaction: an abort anywhere in the closure discards all
//! of that transaction's writes, which is what makes the revision check and
//! the READY stock decrements all-or-nothing.
use crate::activity::LabelIndex;
use crate::actor::Actor;
use crate::catalog::{CatalogItem, Reference};
use crate::config::RequestFilter;
use crate::error::{RequestError, Result};
use crate::inventory::CatalogSnapshot;
use crate::request::{RequestDoc, aggregate_quantities};
use crate::revision::{Revision, ensure_revision_unchanged};
use crate::transition::plan_fulfilment;
use sled::Transactional;
use sled::transaction::{ConflictableTransactionError, TransactionError, TransactionResult};
use std::collections::{BTreeMap, HashMap};
use tracing::debug;

const REQUESTS: &str = "requests";
const ITEMS: &str = "items";
const COUNTERS: &str = "counters";
const PROJECTS: &str = "projects";
const ENGINEERS: &str = "engineers";

#[derive(minicbor::Encode, minicbor::Decode, Debug, Clone, Copy, PartialEq, Eq)]
struct Counter {
    #[n(0)]
    next: u64,
}

fn encode<T: minicbor::Encode<()>>(value: &T) -> Result<Vec<u8>> {
    minicbor::to_vec(value).map_err(|e| RequestError::Encode(e.to_string()))
}

fn decode<T>(bytes: &[u8]) -> Result<T>
where
    T: for<'b> minicbor::Decode<'b, ()>,
{
    Ok(minicbor::decode(bytes)?)
}

pub(crate) fn missing_request(rq_code: &str) -> RequestError {
    RequestError::NotFound {
        collection: REQUESTS,
        key: rq_code.to_string(),
    }
}

fn abort(err: RequestError) -> ConflictableTransactionError<RequestError> {
    ConflictableTransactionError::Abort(err)
}

fn settle<T>(outcome: TransactionResult<T, RequestError>) -> Result<T> {
    outcome.map_err(|err| match err {
        TransactionError::Abort(err) => err,
        TransactionError::Storage(err) => RequestError::Storage(err),
    })
}

#[derive(Clone)]
pub struct Store {
    db: sled::Db,
    requests: sled::Tree,
    items: sled::Tree,
    counters: sled::Tree,
    projects: sled::Tree,
    engineers: sled::Tree,
}

impl Store {
    pub fn new(db: &sled::Db) -> Result<Self> {
        Ok(Self {
            db: db.clone(),
            requests: db.open_tree(REQUESTS)?,
            items: db.open_tree(ITEMS)?,
            counters: db.open_tree(COUNTERS)?,
            projects: db.open_tree(PROJECTS)?,
            engineers: db.open_tree(ENGINEERS)?,
        })
    }

    pub fn flush(&self) -> Result<()> {
        self.db.flush()?;
        Ok(())
    }

    fn get<T>(tree: &sled::Tree, key: &str) -> Result<Option<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        tree.get(key.as_bytes())?
            .map(|bytes| decode(&bytes))
            .transpose()
    }

    fn all<T>(tree: &sled::Tree) -> Result<Vec<T>>
    where
        T: for<'b> minicbor::Decode<'b, ()>,
    {
        tree.iter()
            .values()
            .map(|bytes| -> Result<T> { decode(&bytes?) })
            .collect()
    }

    pub fn request(&self, rq_code: &str) -> Result<Option<RequestDoc>> {
        Self::get(&self.requests, rq_code)
    }

    pub fn load_request(&self, rq_code: &str) -> Result<RequestDoc> {
        self.request(rq_code)?
            .ok_or_else(|| missing_request(rq_code))
    }

    pub fn item(&self, item_code: &str) -> Result<Option<CatalogItem>> {
        Self::get(&self.items, item_code)
    }

    /// Catalog items are maintained outside the request flow; this is the
    /// seeding path.
    pub fn put_item(&self, item: &CatalogItem) -> Result<()> {
        self.items
            .insert(item.item_code.as_bytes(), encode(item)?)?;
        Ok(())
    }

    pub fn catalog(&self) -> Result<CatalogSnapshot> {
        Ok(CatalogSnapshot::new(Self::all::<CatalogItem>(&self.items)?))
    }

    pub fn put_project(&self, project: &Reference) -> Result<()> {
        self.projects.insert(project.id.as_bytes(), encode(project)?)?;
        Ok(())
    }

    pub fn put_engineer(&self, engineer: &Reference) -> Result<()> {
        self.engineers
            .insert(engineer.id.as_bytes(), encode(engineer)?)?;
        Ok(())
    }

    /// Display names for the project and engineer ids used in the log.
    pub fn label_index(&self) -> Result<LabelIndex> {
        let named = |refs: Vec<Reference>| -> HashMap<String, String> {
            refs.into_iter()
                .map(|r| (r.id, r.name))
                .collect()
        };
        Ok(LabelIndex {
            projects: named(Self::all(&self.projects)?),
            engineers: named(Self::all(&self.engineers)?),
        })
    }

    /// Takes the next number of a daily sequence. Sequences start at 1.
    pub fn next_sequence(&self, counter_id: &str) -> Result<u64> {
        let outcome: TransactionResult<u64, RequestError> = self.counters.transaction(|tx| {
            let next = match tx.get(counter_id.as_bytes())? {
                Some(bytes) => decode::<Counter>(&bytes).map_err(abort)?.next.max(1),
                None => 1,
            };
            let bumped = encode(&Counter { next: next + 1 }).map_err(abort)?;
            tx.insert(counter_id.as_bytes(), bumped)?;
            Ok(next)
        });
        settle(outcome)
    }

    /// Read-modify-write of one request, fenced by its revision.
    ///
    /// `build` sees the live document (`None` when it does not exist yet) and
    /// returns the document to store. It runs only after the live revision
    /// matched `expected`, and may run more than once if sled retries.
    pub fn commit_request<F>(&self, rq_code: &str, expected: Revision, build: F) -> Result<RequestDoc>
    where
        F: Fn(Option<&RequestDoc>) -> Result<RequestDoc>,
    {
        let outcome: TransactionResult<RequestDoc, RequestError> = self.requests.transaction(|tx| {
            let live = match tx.get(rq_code.as_bytes())? {
                Some(bytes) => Some(decode::<RequestDoc>(&bytes).map_err(abort)?),
                None => None,
            };
            let live_rev = live.as_ref().map(|d| d.updated_at).unwrap_or(Revision::NONE);
            ensure_revision_unchanged(expected, live_rev).map_err(abort)?;

            let next = build(live.as_ref()).map_err(abort)?;
            tx.insert(rq_code.as_bytes(), encode(&next).map_err(abort)?)?;
            Ok(next)
        });
        let next = settle(outcome)?;
        debug!(rq_code, revision = %next.updated_at, "request committed");
        Ok(next)
    }

    /// Like [`Store::commit_request`] for an existing request, additionally
    /// taking the fulfilled quantities out of stock in the same transaction.
    /// Any missing or short item aborts the status write and every decrement.
    pub fn commit_fulfilment<F>(&self, rq_code: &str, expected: Revision, build: F) -> Result<RequestDoc>
    where
        F: Fn(&RequestDoc) -> Result<RequestDoc>,
    {
        let outcome: TransactionResult<RequestDoc, RequestError> =
            (&self.requests, &self.items).transaction(|(requests, items)| {
                let live = match requests.get(rq_code.as_bytes())? {
                    Some(bytes) => decode::<RequestDoc>(&bytes).map_err(abort)?,
                    None => return Err(abort(missing_request(rq_code))),
                };
                ensure_revision_unchanged(expected, live.updated_at).map_err(abort)?;
                let next = build(&live).map_err(abort)?;

                let mut catalog: BTreeMap<String, CatalogItem> = BTreeMap::new();
                let mut stock: BTreeMap<String, Option<u64>> = BTreeMap::new();
                for item_id in aggregate_quantities(&live.lines).into_keys() {
                    let item = match items.get(item_id.as_bytes())? {
                        Some(bytes) => Some(decode::<CatalogItem>(&bytes).map_err(abort)?),
                        None => None,
                    };
                    stock.insert(item_id.clone(), item.as_ref().and_then(|i| i.qty));
                    if let Some(item) = item {
                        catalog.insert(item_id, item);
                    }
                }
                let remaining = plan_fulfilment(&live, &stock).map_err(abort)?;
                for (item_id, qty) in remaining {
                    if let Some(mut item) = catalog.remove(&item_id) {
                        item.qty = Some(qty);
                        items.insert(item_id.as_bytes(), encode(&item).map_err(abort)?)?;
                    }
                }
                requests.insert(rq_code.as_bytes(), encode(&next).map_err(abort)?)?;
                Ok(next)
            });
        settle(outcome)
    }

    pub fn requests(&self) -> Result<Vec<RequestDoc>> {
        Self::all(&self.requests)
    }

    /// Requests with a line owned by, or originating from, `dept`.
    pub fn requests_by_department(&self, dept: &str) -> Result<Vec<RequestDoc>> {
        let wanted = [dept.to_string()];
        Ok(self
            .requests()?
            .into_iter()
            .filter(|doc| doc.touches_any_department(&wanted))
            .collect())
    }

    pub fn requests_by_creator(&self, uid: &str) -> Result<Vec<RequestDoc>> {
        Ok(self
            .requests()?
            .into_iter()
            .filter(|doc| doc.created_by.uid == uid)
            .collect())
    }

    /// What `actor` may list, newest revision first. Admins and store
    /// department members see everything; everyone else sees requests that
    /// touch one of their departments or that they created.
    pub fn visible_requests(
        &self,
        actor: &Actor,
        store_department: &str,
        filter: &RequestFilter,
        max: usize,
    ) -> Result<Vec<RequestDoc>> {
        let sees_all = actor.roles.admin || actor.in_department(store_department);
        let mut docs: Vec<RequestDoc> = self
            .requests()?
            .into_iter()
            .filter(|doc| {
                sees_all
                    || doc.created_by.uid == actor.uid
                    || doc.touches_any_department(actor.department_ids())
            })
            .filter(|doc| filter.matches(doc))
            .collect();
        docs.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        docs.truncate(max);
        Ok(docs)
    }
}
