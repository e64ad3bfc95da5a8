//! Test doubles: an in-memory repository, a scripted provider adapter, a
//! recording notifier and a log capture layer.

use std::{
  collections::{HashMap, HashSet},
  sync::{
    Arc, Mutex,
    atomic::{AtomicBool, AtomicU32, AtomicUsize, Ordering},
  },
};

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use kyc_core::{
  event::{ProviderStatus, WebhookEvent},
  notify::Notifier,
  record::{KycRecord, KycStatus, UserId},
  session::VerificationSession,
  store::{KycRepository, UpsertResult},
};
use kyc_providers::{
  HeaderMap, ProviderAdapter, ProviderError, ProviderRegistry, Url,
  signature::{DigestAlgorithm, HmacKey},
};
use serde::Deserialize;
use uuid::Uuid;

use crate::{EngineConfig, KycEngine};

pub fn at(secs: i64) -> DateTime<Utc> { Utc.timestamp_opt(secs, 0).unwrap() }

// ─── Repository ──────────────────────────────────────────────────────────────

#[derive(Debug, thiserror::Error)]
#[error("memory repository: {0}")]
pub struct MemoryError(&'static str);

#[derive(Default)]
pub struct MemoryRepo {
  users:   Mutex<HashSet<UserId>>,
  records: Mutex<HashMap<UserId, KycRecord>>,
  pub writes: AtomicUsize,
}

impl MemoryRepo {
  pub fn add_user(&self) -> UserId {
    let id = Uuid::new_v4();
    self.users.lock().unwrap().insert(id);
    id
  }

  pub fn record(&self, user_id: UserId) -> Option<KycRecord> {
    self.records.lock().unwrap().get(&user_id).cloned()
  }

  /// Overwrite a record directly, bypassing the engine.
  pub fn put(&self, record: KycRecord) {
    self.records.lock().unwrap().insert(record.user_id, record);
  }
}

impl KycRepository for MemoryRepo {
  type Error = MemoryError;

  async fn register_user(&self, user_id: UserId) -> Result<(), MemoryError> {
    self.users.lock().unwrap().insert(user_id);
    Ok(())
  }

  async fn user_exists(&self, user_id: UserId) -> Result<bool, MemoryError> {
    Ok(self.users.lock().unwrap().contains(&user_id))
  }

  async fn get_by_user_id(
    &self,
    user_id: UserId,
  ) -> Result<Option<KycRecord>, MemoryError> {
    // Give concurrent callers a chance to interleave.
    tokio::task::yield_now().await;
    Ok(self.record(user_id))
  }

  async fn get_by_provider_reference(
    &self,
    provider: &str,
    reference_id: &str,
  ) -> Result<Option<KycRecord>, MemoryError> {
    tokio::task::yield_now().await;
    Ok(
      self
        .records
        .lock()
        .unwrap()
        .values()
        .find(|r| r.is_for(provider, reference_id))
        .cloned(),
    )
  }

  async fn upsert(
    &self,
    record: KycRecord,
    expected_version: Option<u64>,
  ) -> Result<UpsertResult, MemoryError> {
    tokio::task::yield_now().await;
    let mut records = self.records.lock().unwrap();

    if records.values().any(|r| {
      r.user_id != record.user_id && r.is_for(&record.provider, &record.reference_id)
    }) {
      return Err(MemoryError("duplicate provider reference"));
    }

    if expected_version.is_some_and(|v| record.version <= v) {
      return Err(MemoryError("write must advance the record version"));
    }

    let matches = match (records.get(&record.user_id), expected_version) {
      (None, None) => true,
      (Some(current), Some(expected)) => current.version == expected,
      _ => false,
    };
    if !matches {
      return Ok(UpsertResult::Conflict);
    }

    records.insert(record.user_id, record);
    self.writes.fetch_add(1, Ordering::SeqCst);
    Ok(UpsertResult::Written)
  }

  async fn find_stale_pending(
    &self,
    older_than: DateTime<Utc>,
    limit: usize,
  ) -> Result<Vec<KycRecord>, MemoryError> {
    let mut stale: Vec<_> = self
      .records
      .lock()
      .unwrap()
      .values()
      .filter(|r| {
        r.status() == KycStatus::Pending && sweep_position(r) < older_than
      })
      .cloned()
      .collect();
    stale.sort_by_key(|r| (sweep_position(r), r.user_id));
    stale.truncate(limit);
    Ok(stale)
  }
}

fn sweep_position(r: &KycRecord) -> DateTime<Utc> {
  r.last_polled_at.unwrap_or(r.updated_at)
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

pub const FAKE_PROVIDER: &str = "fake";
pub const SIGNATURE_HEADER: &str = "x-fake-signature";
const WEBHOOK_SECRET: &[u8] = b"fake-webhook-secret";

/// A provider whose behaviour tests script through its public fields.
pub struct FakeAdapter {
  next_reference:    AtomicU32,
  /// Transient failures to return from `init_verification` before succeeding.
  pub init_failures: AtomicU32,
  pub init_calls:    AtomicU32,
  pub status_calls:  AtomicU32,
  /// When set, `get_status` fails with a transient error.
  pub status_down:   AtomicBool,
  pub remote_status: Mutex<ProviderStatus>,
  key:               HmacKey,
}

impl FakeAdapter {
  pub fn new() -> Self {
    Self {
      next_reference: AtomicU32::new(1),
      init_failures:  AtomicU32::new(0),
      init_calls:     AtomicU32::new(0),
      status_calls:   AtomicU32::new(0),
      status_down:    AtomicBool::new(false),
      remote_status:  Mutex::new(ProviderStatus::pending()),
      key:            HmacKey::new(WEBHOOK_SECRET),
    }
  }

  pub fn set_remote_status(&self, status: ProviderStatus) {
    *self.remote_status.lock().unwrap() = status;
  }

  /// Headers carrying a valid signature for `body`.
  pub fn sign(&self, body: &[u8]) -> HeaderMap {
    let digest = self.key.sign_hex(DigestAlgorithm::Sha256, body).unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(SIGNATURE_HEADER, digest.parse().unwrap());
    headers
  }
}

#[derive(Deserialize)]
struct FakePayload {
  reference_id: String,
  status:       KycStatus,
  reason:       Option<String>,
  occurred_at:  Option<DateTime<Utc>>,
}

#[async_trait]
impl ProviderAdapter for FakeAdapter {
  fn id(&self) -> &str { FAKE_PROVIDER }

  async fn init_verification(
    &self,
    user_id: UserId,
    _redirect_url: &Url,
  ) -> kyc_providers::Result<VerificationSession> {
    self.init_calls.fetch_add(1, Ordering::SeqCst);
    let failing = self
      .init_failures
      .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
      .is_ok();
    if failing {
      return Err(ProviderError::Status { status: 503, body: "down".into() });
    }

    let n = self.next_reference.fetch_add(1, Ordering::SeqCst);
    Ok(VerificationSession {
      user_id,
      provider: FAKE_PROVIDER.to_owned(),
      reference_id: format!("fake-ref-{n}"),
      redirect_url: format!("https://verify.example/session/{n}"),
      expires_at: Utc::now() + chrono::Duration::minutes(30),
    })
  }

  async fn get_status(&self, _reference_id: &str) -> kyc_providers::Result<ProviderStatus> {
    self.status_calls.fetch_add(1, Ordering::SeqCst);
    if self.status_down.load(Ordering::SeqCst) {
      return Err(ProviderError::Timeout);
    }
    Ok(self.remote_status.lock().unwrap().clone())
  }

  fn verify_webhook_signature(
    &self,
    headers: &HeaderMap,
    raw_body: &[u8],
  ) -> kyc_providers::Result<()> {
    let digest = headers
      .get(SIGNATURE_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or(ProviderError::InvalidSignature("missing signature"))?;
    if self.key.verify_hex(DigestAlgorithm::Sha256, raw_body, digest) {
      Ok(())
    } else {
      Err(ProviderError::InvalidSignature("signature mismatch"))
    }
  }

  fn parse_webhook_payload(&self, raw_body: &[u8]) -> kyc_providers::Result<WebhookEvent> {
    let payload: FakePayload = serde_json::from_slice(raw_body).map_err(|e| {
      match e.classify() {
        serde_json::error::Category::Data => ProviderError::MalformedPayload(e.to_string()),
        _ => ProviderError::InvalidJson(e),
      }
    })?;
    Ok(WebhookEvent {
      provider:     FAKE_PROVIDER.to_owned(),
      event_type:   "status".to_owned(),
      reference_id: payload.reference_id,
      status:       ProviderStatus {
        status:      payload.status,
        reason:      payload.reason,
        observed_at: payload.occurred_at,
      },
      occurred_at:  payload.occurred_at,
      received_at:  Utc::now(),
    })
  }
}

/// A webhook body understood by [`FakeAdapter`].
pub fn webhook_body(reference_id: &str, status: &str, occurred_at: i64) -> Vec<u8> {
  let reason = (status == "REJECTED").then_some("document expired");
  serde_json::to_vec(&serde_json::json!({
    "reference_id": reference_id,
    "status": status,
    "reason": reason,
    "occurred_at": at(occurred_at),
  }))
  .unwrap()
}

// ─── Notifier ────────────────────────────────────────────────────────────────

#[derive(Default)]
pub struct RecordingNotifier {
  pub sent: Mutex<Vec<(UserId, KycStatus, KycStatus)>>,
}

impl RecordingNotifier {
  pub fn sent(&self) -> Vec<(UserId, KycStatus, KycStatus)> {
    self.sent.lock().unwrap().clone()
  }
}

#[async_trait]
impl Notifier for RecordingNotifier {
  async fn notify_status_changed(&self, user_id: UserId, old: KycStatus, new: KycStatus) {
    self.sent.lock().unwrap().push((user_id, old, new));
  }
}

// ─── Log capture ─────────────────────────────────────────────────────────────

/// A `tracing` layer that keeps the target and level of every event.
#[derive(Clone, Default)]
pub struct CapturedEvents(Arc<Mutex<Vec<(String, tracing::Level, String)>>>);

impl CapturedEvents {
  /// Route events on this thread into the capture until the guard drops.
  pub fn install(&self) -> tracing::subscriber::DefaultGuard {
    use tracing_subscriber::layer::SubscriberExt as _;
    tracing::subscriber::set_default(tracing_subscriber::registry().with(self.clone()))
  }

  /// Messages logged under `target` at `level`.
  pub fn messages(&self, target: &str, level: tracing::Level) -> Vec<String> {
    self
      .0
      .lock()
      .unwrap()
      .iter()
      .filter(|(t, l, _)| t == target && *l == level)
      .map(|(_, _, message)| message.clone())
      .collect()
  }
}

impl<S: tracing::Subscriber> tracing_subscriber::Layer<S> for CapturedEvents {
  fn on_event(
    &self,
    event: &tracing::Event<'_>,
    _ctx: tracing_subscriber::layer::Context<'_, S>,
  ) {
    let mut message = MessageVisitor::default();
    event.record(&mut message);
    let meta = event.metadata();
    self
      .0
      .lock()
      .unwrap()
      .push((meta.target().to_owned(), *meta.level(), message.0));
  }
}

#[derive(Default)]
struct MessageVisitor(String);

impl tracing::field::Visit for MessageVisitor {
  fn record_debug(&mut self, field: &tracing::field::Field, value: &dyn std::fmt::Debug) {
    if field.name() == "message" {
      self.0 = format!("{value:?}");
    }
  }
}

// ─── Harness ─────────────────────────────────────────────────────────────────

pub struct Harness {
  pub repo:     Arc<MemoryRepo>,
  pub adapter:  Arc<FakeAdapter>,
  pub notifier: Arc<RecordingNotifier>,
  pub engine:   Arc<KycEngine<MemoryRepo>>,
}

impl Harness {
  pub fn new() -> Self { Self::with_config(EngineConfig::default()) }

  pub fn with_config(config: EngineConfig) -> Self {
    let config = EngineConfig { retry_base_delay_ms: 1, ..config };
    let repo = Arc::new(MemoryRepo::default());
    let adapter = Arc::new(FakeAdapter::new());
    let notifier = Arc::new(RecordingNotifier::default());
    let registry = ProviderRegistry::new()
      .with(FAKE_PROVIDER, adapter.clone() as Arc<dyn ProviderAdapter>)
      .unwrap();
    let engine = Arc::new(KycEngine::new(
      repo.clone(),
      Arc::new(registry),
      notifier.clone() as Arc<dyn Notifier>,
      config,
    ));
    Self { repo, adapter, notifier, engine }
  }

  pub fn user(&self) -> UserId { self.repo.add_user() }

  /// A user with an open pending submission; returns its reference.
  pub async fn submitted(&self) -> (UserId, String) {
    let user = self.user();
    let session = self
      .engine
      .initiate(user, FAKE_PROVIDER, "https://app.example/done")
      .await
      .unwrap();
    (user, session.reference_id)
  }

  /// Deliver a correctly signed webhook.
  pub async fn deliver(&self, body: &[u8]) -> crate::Result<crate::Ingested> {
    let headers = self.adapter.sign(body);
    self.engine.ingest(FAKE_PROVIDER, &headers, body).await
  }
}
