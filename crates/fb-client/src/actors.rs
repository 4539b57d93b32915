//! Actor reference data: `/api/v1/{client,agence,iob,tcc,financial-institution}`.
//!
//! Plain request/response mapping. The only local logic is the
//! code/libelle check before a write and the short-lived cache of the
//! financial institution list, which nearly every form needs.

use std::collections::HashMap;
use std::time::{Duration, Instant};

use fb_schemas::{ActorKind, ActorRecord};
use fb_workflow::{BackendError, Session};
use reqwest::Url;
use tokio::sync::RwLock;
use tracing::debug;

use crate::http::{endpoint, parse_base_url, send, send_json};

#[derive(Debug, Clone)]
pub struct ActorClient {
    http: reqwest::Client,
    base: Url,
}

impl ActorClient {
    pub fn new(http: reqwest::Client, base_url: &str) -> Result<Self, BackendError> {
        Ok(Self {
            http,
            base: parse_base_url(base_url)?,
        })
    }

    fn collection(&self, kind: ActorKind) -> Url {
        endpoint(&self.base, ["api", "v1", kind.path_segment()])
    }

    fn item(&self, kind: ActorKind, code: &str) -> Url {
        endpoint(&self.base, ["api", "v1", kind.path_segment(), code])
    }

    pub async fn list(
        &self,
        session: &Session,
        kind: ActorKind,
    ) -> Result<Vec<ActorRecord>, BackendError> {
        send_json(self.http.get(self.collection(kind)), session, "GET actors").await
    }

    pub async fn get(
        &self,
        session: &Session,
        kind: ActorKind,
        code: &str,
    ) -> Result<ActorRecord, BackendError> {
        send_json(self.http.get(self.item(kind, code)), session, "GET actor").await
    }

    pub async fn create(
        &self,
        session: &Session,
        kind: ActorKind,
        record: &ActorRecord,
    ) -> Result<ActorRecord, BackendError> {
        check(record)?;
        let req = self.http.post(self.collection(kind)).json(record);
        send_json(req, session, "POST actor").await
    }

    pub async fn update(
        &self,
        session: &Session,
        kind: ActorKind,
        record: &ActorRecord,
    ) -> Result<ActorRecord, BackendError> {
        check(record)?;
        let req = self.http.put(self.item(kind, &record.code)).json(record);
        send_json(req, session, "PUT actor").await
    }

    /// Soft delete: the backend flips the record to `INACTIVE`.
    pub async fn delete(
        &self,
        session: &Session,
        kind: ActorKind,
        code: &str,
    ) -> Result<(), BackendError> {
        send(self.http.delete(self.item(kind, code)), session, "DELETE actor").await?;
        Ok(())
    }
}

fn check(record: &ActorRecord) -> Result<(), BackendError> {
    record.validate().map_err(|e| BackendError::Rejected {
        status: 422,
        message: e.to_string(),
    })
}

// ---------------------------------------------------------------------------
// InstitutionCache
// ---------------------------------------------------------------------------

/// Financial institution list, reused for `ttl` after each fetch.
///
/// Entries are keyed by bearer token: a list is only served back to the
/// credential the backend accepted when it was fetched.
#[derive(Debug)]
pub struct InstitutionCache {
    ttl: Duration,
    slots: RwLock<HashMap<String, (Instant, Vec<ActorRecord>)>>,
}

impl InstitutionCache {
    pub const DEFAULT_TTL: Duration = Duration::from_secs(30);

    pub fn new(ttl: Duration) -> Self {
        Self {
            ttl,
            slots: RwLock::new(HashMap::new()),
        }
    }

    fn fresh(
        &self,
        slots: &HashMap<String, (Instant, Vec<ActorRecord>)>,
        key: &str,
    ) -> Option<Vec<ActorRecord>> {
        slots
            .get(key)
            .filter(|(at, _)| at.elapsed() < self.ttl)
            .map(|(_, list)| list.clone())
    }

    pub async fn institutions(
        &self,
        client: &ActorClient,
        session: &Session,
    ) -> Result<Vec<ActorRecord>, BackendError> {
        let key = session.bearer_token();
        if let Some(list) = self.fresh(&*self.slots.read().await, key) {
            return Ok(list);
        }

        let mut slots = self.slots.write().await;
        // Another request with the same token may have refreshed meanwhile.
        if let Some(list) = self.fresh(&slots, key) {
            return Ok(list);
        }
        let list = client
            .list(session, ActorKind::FinancialInstitution)
            .await?;
        debug!(count = list.len(), "institution list refreshed");
        let ttl = self.ttl;
        slots.retain(|_, (at, _)| at.elapsed() < ttl);
        slots.insert(key.to_string(), (Instant::now(), list.clone()));
        Ok(list)
    }

    /// Drop every cached list, e.g. after an institution was edited.
    pub async fn invalidate(&self) {
        self.slots.write().await.clear();
    }
}

impl Default for InstitutionCache {
    fn default() -> Self {
        Self::new(Self::DEFAULT_TTL)
    }
}
