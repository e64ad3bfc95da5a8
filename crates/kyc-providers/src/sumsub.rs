//! Reference adapter for a Sumsub-style provider.
//!
//! - API requests are signed with `X-App-Access-Sig`: HMAC-SHA256 over
//!   `timestamp + METHOD + path?query + body` using the app secret key.
//! - A check is an *applicant*; its ID is the reference ID.
//! - Webhooks carry `X-Payload-Digest` (hex HMAC of the raw body with the
//!   webhook secret) and optionally `X-Payload-Digest-Alg`.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use kyc_core::{
  event::{ProviderStatus, WebhookEvent},
  record::UserId,
  session::VerificationSession,
};
use reqwest::{Client, Method, RequestBuilder, Url};
use serde::{Deserialize, de::DeserializeOwned};
use serde_json::json;
use uuid::Uuid;

use crate::{
  HeaderMap, ProviderAdapter, ProviderError, Result,
  signature::{DigestAlgorithm, HmacKey},
};

pub const DIGEST_HEADER: &str = "x-payload-digest";
pub const DIGEST_ALG_HEADER: &str = "x-payload-digest-alg";

const APP_TOKEN_HEADER: &str = "x-app-token";
const ACCESS_TS_HEADER: &str = "x-app-access-ts";
const ACCESS_SIG_HEADER: &str = "x-app-access-sig";

// ─── Configuration ────────────────────────────────────────────────────────────

fn default_base_url() -> String { "https://api.sumsub.com".to_owned() }
fn default_link_ttl_secs() -> u64 { 1800 }
fn default_request_timeout_secs() -> u64 { 10 }

/// Per-provider settings, deserialised from the `providers.<id>` table.
#[derive(Deserialize, Clone)]
pub struct SumsubConfig {
  #[serde(default = "default_base_url")]
  pub base_url:             String,
  pub app_token:            String,
  pub secret_key:           String,
  pub webhook_secret:       String,
  /// Verification level applicants are created at.
  pub level_name:           String,
  #[serde(default = "default_link_ttl_secs")]
  pub link_ttl_secs:        u64,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs: u64,
}

impl SumsubConfig {
  pub fn new(
    app_token: impl Into<String>,
    secret_key: impl Into<String>,
    webhook_secret: impl Into<String>,
    level_name: impl Into<String>,
  ) -> Self {
    Self {
      base_url:             default_base_url(),
      app_token:            app_token.into(),
      secret_key:           secret_key.into(),
      webhook_secret:       webhook_secret.into(),
      level_name:           level_name.into(),
      link_ttl_secs:        default_link_ttl_secs(),
      request_timeout_secs: default_request_timeout_secs(),
    }
  }

  pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
    self.base_url = base_url.into();
    self
  }
}

// ─── Wire types ──────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct ApplicantCreated {
  id: String,
}

#[derive(Debug, Deserialize)]
struct WebSdkLink {
  url: String,
}

#[derive(Debug, Deserialize)]
struct Applicant {
  review: Option<Review>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct Review {
  review_status: String,
  review_result: Option<ReviewResult>,
  review_date:   Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReviewResult {
  review_answer:      String,
  #[serde(default)]
  reject_labels:      Vec<String>,
  moderation_comment: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct WebhookPayload {
  applicant_id:  Option<String>,
  #[serde(rename = "type")]
  event_type:    Option<String>,
  review_status: Option<String>,
  review_result: Option<ReviewResult>,
  created_at_ms: Option<String>,
}

// ─── Adapter ─────────────────────────────────────────────────────────────────

/// The inner [`reqwest::Client`] pools connections; build one adapter per provider.
pub struct SumsubAdapter {
  id:          String,
  client:      Client,
  base_url:    Url,
  level_name:  String,
  app_token:   String,
  link_ttl:    Duration,
  request_key: HmacKey,
  webhook_key: HmacKey,
}

impl SumsubAdapter {
  pub fn new(id: impl Into<String>, config: SumsubConfig) -> Result<Self> {
    let base_url = Url::parse(&config.base_url)
      .map_err(|e| ProviderError::Config(format!("invalid base_url: {e}")))?;
    if base_url.cannot_be_a_base() {
      return Err(ProviderError::Config(format!(
        "base_url {base_url} cannot carry a path"
      )));
    }
    let client = Client::builder()
      .timeout(Duration::from_secs(config.request_timeout_secs))
      .build()?;
    Ok(Self {
      id: id.into(),
      client,
      base_url,
      level_name: config.level_name,
      app_token: config.app_token,
      link_ttl: Duration::from_secs(config.link_ttl_secs),
      request_key: HmacKey::new(config.secret_key),
      webhook_key: HmacKey::new(config.webhook_secret),
    })
  }

  fn endpoint(&self, segments: &[&str], query: &[(&str, &str)]) -> Url {
    let mut url = self.base_url.clone();
    if let Ok(mut path) = url.path_segments_mut() {
      path.pop_if_empty().extend(segments);
    }
    if !query.is_empty() {
      url.query_pairs_mut().extend_pairs(query);
    }
    url
  }

  /// Build a request carrying the app token and access signature.
  fn signed(
    &self,
    method: Method,
    url: Url,
    body: Option<&serde_json::Value>,
  ) -> Result<RequestBuilder> {
    let ts = Utc::now().timestamp().to_string();
    let body_bytes = body.map(serde_json::to_vec).transpose().map_err(|e| {
      ProviderError::Config(format!("unserialisable request body: {e}"))
    })?;

    let mut target = url.path().to_owned();
    if let Some(q) = url.query() {
      target.push('?');
      target.push_str(q);
    }
    let mut message = format!("{ts}{}{target}", method.as_str()).into_bytes();
    if let Some(b) = &body_bytes {
      message.extend_from_slice(b);
    }
    let sig = self.request_key.sign_hex(DigestAlgorithm::Sha256, &message)?;

    let mut req = self
      .client
      .request(method, url)
      .header(APP_TOKEN_HEADER, &self.app_token)
      .header(ACCESS_TS_HEADER, ts)
      .header(ACCESS_SIG_HEADER, sig);
    if let Some(b) = body_bytes {
      req = req
        .header(reqwest::header::CONTENT_TYPE, "application/json")
        .body(b);
    }
    Ok(req)
  }

  async fn send<T: DeserializeOwned>(&self, req: RequestBuilder) -> Result<T> {
    let resp = req.send().await?;
    let status = resp.status();
    if !status.is_success() {
      let body = resp.text().await.unwrap_or_default();
      return Err(ProviderError::Status { status: status.as_u16(), body });
    }
    Ok(resp.json().await?)
  }
}

#[async_trait]
impl ProviderAdapter for SumsubAdapter {
  fn id(&self) -> &str { &self.id }

  async fn init_verification(
    &self,
    user_id: UserId,
    redirect_url: &Url,
  ) -> Result<VerificationSession> {
    // A fresh external ID per session so resubmissions get a new applicant.
    let external_id = format!("{user_id}.{}", Uuid::new_v4().simple());

    let url = self.endpoint(
      &["resources", "applicants"],
      &[("levelName", self.level_name.as_str())],
    );
    let body = json!({ "externalUserId": external_id });
    let applicant: ApplicantCreated =
      self.send(self.signed(Method::POST, url, Some(&body))?).await?;

    let ttl = self.link_ttl.as_secs().to_string();
    let url = self.endpoint(
      &["resources", "sdkIntegrations", "levels", self.level_name.as_str(), "websdkLink"],
      &[("ttlInSecs", ttl.as_str()), ("externalUserId", external_id.as_str())],
    );
    let body = json!({
      "redirect": {
        "successUrl": redirect_url.as_str(),
        "rejectUrl":  redirect_url.as_str(),
      }
    });
    let link: WebSdkLink =
      self.send(self.signed(Method::POST, url, Some(&body))?).await?;

    let ttl = chrono::Duration::from_std(self.link_ttl)
      .map_err(|e| ProviderError::Config(e.to_string()))?;
    Ok(VerificationSession {
      user_id,
      provider: self.id.clone(),
      reference_id: applicant.id,
      redirect_url: link.url,
      expires_at: Utc::now() + ttl,
    })
  }

  async fn get_status(&self, reference_id: &str) -> Result<ProviderStatus> {
    let url = self.endpoint(&["resources", "applicants", reference_id, "one"], &[]);
    let applicant: Applicant = self.send(self.signed(Method::GET, url, None)?).await?;

    match applicant.review {
      Some(review) => map_review(
        &review.review_status,
        review.review_result.as_ref(),
        review.review_date.as_deref().and_then(parse_provider_time),
      ),
      None => Ok(ProviderStatus::pending()),
    }
  }

  fn verify_webhook_signature(&self, headers: &HeaderMap, raw_body: &[u8]) -> Result<()> {
    let digest = headers
      .get(DIGEST_HEADER)
      .and_then(|v| v.to_str().ok())
      .ok_or(ProviderError::InvalidSignature("missing digest header"))?;

    let algorithm = match headers.get(DIGEST_ALG_HEADER) {
      None => DigestAlgorithm::Sha256,
      Some(v) => v
        .to_str()
        .ok()
        .and_then(DigestAlgorithm::from_header)
        .ok_or(ProviderError::InvalidSignature("unsupported digest algorithm"))?,
    };

    if self.webhook_key.verify_hex(algorithm, raw_body, digest) {
      Ok(())
    } else {
      Err(ProviderError::InvalidSignature("digest mismatch"))
    }
  }

  fn parse_webhook_payload(&self, raw_body: &[u8]) -> Result<WebhookEvent> {
    let payload: WebhookPayload =
      serde_json::from_slice(raw_body).map_err(|e| match e.classify() {
        serde_json::error::Category::Data => {
          ProviderError::MalformedPayload(e.to_string())
        }
        _ => ProviderError::InvalidJson(e),
      })?;

    let reference_id = payload
      .applicant_id
      .filter(|s| !s.is_empty())
      .ok_or_else(|| ProviderError::MalformedPayload("missing applicantId".into()))?;
    let event_type = payload
      .event_type
      .filter(|s| !s.is_empty())
      .ok_or_else(|| ProviderError::MalformedPayload("missing type".into()))?;
    let occurred_at = payload.created_at_ms.as_deref().and_then(parse_provider_time);

    let status = if event_type == "applicantReviewed" {
      let review_status = payload.review_status.as_deref().unwrap_or("completed");
      map_review(review_status, payload.review_result.as_ref(), occurred_at).map_err(
        |e| match e {
          ProviderError::UnknownStatus(s) => {
            ProviderError::MalformedPayload(format!("unknown review value {s:?}"))
          }
          other => other,
        },
      )?
    } else {
      ProviderStatus::pending()
    };

    Ok(WebhookEvent {
      provider: self.id.clone(),
      event_type,
      reference_id,
      status,
      occurred_at,
      received_at: Utc::now(),
    })
  }
}

// ─── Mapping ─────────────────────────────────────────────────────────────────

fn map_review(
  review_status: &str,
  result: Option<&ReviewResult>,
  observed_at: Option<DateTime<Utc>>,
) -> Result<ProviderStatus> {
  match review_status {
    "completed" => {
      let result = result.ok_or_else(|| {
        ProviderError::MalformedPayload("completed review without reviewResult".into())
      })?;
      match result.review_answer.as_str() {
        "GREEN" => Ok(ProviderStatus::verified(observed_at)),
        "RED" => Ok(ProviderStatus::rejected(rejection_reason(result), observed_at)),
        other => Err(ProviderError::UnknownStatus(other.to_owned())),
      }
    }
    "init" | "pending" | "prechecked" | "queued" | "onHold" | "awaitingUser" => {
      Ok(ProviderStatus::pending())
    }
    other => Err(ProviderError::UnknownStatus(other.to_owned())),
  }
}

/// Prefer the moderator's comment; otherwise describe the reject labels.
fn rejection_reason(result: &ReviewResult) -> Option<String> {
  if let Some(comment) = result
    .moderation_comment
    .as_deref()
    .map(str::trim)
    .filter(|c| !c.is_empty())
  {
    return Some(comment.to_owned());
  }
  if result.reject_labels.is_empty() {
    return None;
  }
  Some(
    result
      .reject_labels
      .iter()
      .map(|l| describe_label(l))
      .collect::<Vec<_>>()
      .join("; "),
  )
}

fn describe_label(label: &str) -> String {
  match label {
    "FORGERY" => "document appears to be forged".to_owned(),
    "DOCUMENT_PAGE_MISSING" => "a document page is missing".to_owned(),
    "EXPIRATION_DATE" => "document has expired".to_owned(),
    "SELFIE_MISMATCH" => "selfie does not match the document".to_owned(),
    "BAD_PROOF_OF_ADDRESS" => "proof of address was not accepted".to_owned(),
    "UNSATISFACTORY_PHOTOS" => "photos are unreadable".to_owned(),
    "BLACKLIST" | "SANCTIONS" => "failed compliance screening".to_owned(),
    other => other.to_lowercase().replace('_', " "),
  }
}

/// Parse provider timestamps: RFC 3339, `2024-01-02 10:00:00+0000`, or the
/// naive UTC `2024-01-02 10:00:00.123` used by `createdAtMs`.
fn parse_provider_time(s: &str) -> Option<DateTime<Utc>> {
  if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
    return Some(dt.with_timezone(&Utc));
  }
  if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f%z") {
    return Some(dt.with_timezone(&Utc));
  }
  NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S%.f")
    .ok()
    .map(|naive| naive.and_utc())
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone;
  use httpmock::prelude::*;
  use kyc_core::record::KycStatus;
  use reqwest::header::HeaderValue;

  use super::*;

  const WEBHOOK_SECRET: &str = "webhook-secret";

  fn adapter(base_url: &str) -> SumsubAdapter {
    let config =
      SumsubConfig::new("app-token", "secret-key", WEBHOOK_SECRET, "basic-kyc")
        .with_base_url(base_url);
    SumsubAdapter::new("sumsub", config).unwrap()
  }

  fn offline() -> SumsubAdapter { adapter("http://127.0.0.1:9") }

  fn signed_headers(body: &[u8]) -> HeaderMap {
    let sig = HmacKey::new(WEBHOOK_SECRET)
      .sign_hex(DigestAlgorithm::Sha256, body)
      .unwrap();
    let mut headers = HeaderMap::new();
    headers.insert(DIGEST_HEADER, HeaderValue::from_str(&sig).unwrap());
    headers.insert(DIGEST_ALG_HEADER, HeaderValue::from_static("HMAC_SHA256_HEX"));
    headers
  }

  const REVIEWED_GREEN: &str = r#"{
    "applicantId": "5cb56e8e0a975a35f333cb83",
    "inspectionId": "5cb56e8e0a975a35f333cb84",
    "externalUserId": "user.1",
    "type": "applicantReviewed",
    "reviewStatus": "completed",
    "reviewResult": { "reviewAnswer": "GREEN" },
    "createdAtMs": "2024-03-01 12:30:45.123"
  }"#;

  // ── Webhooks ────────────────────────────────────────────────────────────

  #[test]
  fn signed_webhook_verifies() {
    let body = REVIEWED_GREEN.as_bytes();
    assert!(offline().verify_webhook_signature(&signed_headers(body), body).is_ok());
  }

  #[test]
  fn tampered_webhook_body_fails() {
    let body = REVIEWED_GREEN.as_bytes();
    let headers = signed_headers(body);
    let tampered = REVIEWED_GREEN.replace("GREEN", "RED ");
    assert!(matches!(
      offline().verify_webhook_signature(&headers, tampered.as_bytes()),
      Err(ProviderError::InvalidSignature(_))
    ));
  }

  #[test]
  fn missing_or_unsupported_digest_fails() {
    let body = REVIEWED_GREEN.as_bytes();
    assert!(matches!(
      offline().verify_webhook_signature(&HeaderMap::new(), body),
      Err(ProviderError::InvalidSignature("missing digest header"))
    ));

    let mut headers = signed_headers(body);
    headers.insert(DIGEST_ALG_HEADER, HeaderValue::from_static("HMAC_SHA1_HEX"));
    assert!(matches!(
      offline().verify_webhook_signature(&headers, body),
      Err(ProviderError::InvalidSignature("unsupported digest algorithm"))
    ));
  }

  #[test]
  fn parses_reviewed_green_webhook() {
    let event = offline().parse_webhook_payload(REVIEWED_GREEN.as_bytes()).unwrap();
    assert_eq!(event.provider, "sumsub");
    assert_eq!(event.reference_id, "5cb56e8e0a975a35f333cb83");
    assert_eq!(event.status.status, KycStatus::Verified);
    let expected = Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 45).unwrap()
      + chrono::Duration::milliseconds(123);
    assert_eq!(event.occurred_at, Some(expected));
  }

  #[test]
  fn parses_red_webhook_with_labels() {
    let body = r#"{
      "applicantId": "abc",
      "type": "applicantReviewed",
      "reviewStatus": "completed",
      "reviewResult": {
        "reviewAnswer": "RED",
        "rejectLabels": ["EXPIRATION_DATE", "SELFIE_MISMATCH"]
      }
    }"#;
    let event = offline().parse_webhook_payload(body.as_bytes()).unwrap();
    assert_eq!(event.status.status, KycStatus::Rejected);
    assert_eq!(
      event.status.reason.as_deref(),
      Some("document has expired; selfie does not match the document")
    );
    assert_eq!(event.occurred_at, None);
  }

  #[test]
  fn non_review_events_are_pending() {
    let body = r#"{"applicantId":"abc","type":"applicantPending"}"#;
    let event = offline().parse_webhook_payload(body.as_bytes()).unwrap();
    assert_eq!(event.status.status, KycStatus::Pending);
  }

  #[test]
  fn missing_fields_are_malformed() {
    for body in [
      r#"{"type":"applicantReviewed"}"#,
      r#"{"applicantId":"abc"}"#,
      r#"{"applicantId":"abc","type":"applicantReviewed","reviewStatus":"completed"}"#,
      r#"{"applicantId":"abc","type":"applicantReviewed","reviewResult":{"reviewAnswer":"BLUE"}}"#,
      r#"{"applicantId":42,"type":"applicantReviewed"}"#,
    ] {
      assert!(
        matches!(
          offline().parse_webhook_payload(body.as_bytes()),
          Err(ProviderError::MalformedPayload(_))
        ),
        "{body}"
      );
    }
  }

  #[test]
  fn non_json_is_invalid_json() {
    assert!(matches!(
      offline().parse_webhook_payload(b"applicantId=abc"),
      Err(ProviderError::InvalidJson(_))
    ));
  }

  // ── API calls ───────────────────────────────────────────────────────────

  #[tokio::test]
  async fn init_verification_creates_applicant_and_link() {
    let server = MockServer::start_async().await;
    let create = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path("/resources/applicants")
          .query_param("levelName", "basic-kyc")
          .header("x-app-token", "app-token")
          .header_exists("x-app-access-sig")
          .header_exists("x-app-access-ts");
        then.status(201).json_body(serde_json::json!({ "id": "applicant-1" }));
      })
      .await;
    let link = server
      .mock_async(|when, then| {
        when
          .method(POST)
          .path("/resources/sdkIntegrations/levels/basic-kyc/websdkLink")
          .query_param("ttlInSecs", "1800");
        then
          .status(200)
          .json_body(serde_json::json!({ "url": "https://in.sumsub.com/websdk/p/abc" }));
      })
      .await;

    let user_id = Uuid::new_v4();
    let redirect = Url::parse("https://app.example.com/kyc/done").unwrap();
    let before = Utc::now();
    let session = adapter(&server.base_url())
      .init_verification(user_id, &redirect)
      .await
      .unwrap();

    create.assert_async().await;
    link.assert_async().await;
    assert_eq!(session.user_id, user_id);
    assert_eq!(session.provider, "sumsub");
    assert_eq!(session.reference_id, "applicant-1");
    assert_eq!(session.redirect_url, "https://in.sumsub.com/websdk/p/abc");
    assert!(session.expires_at >= before + chrono::Duration::seconds(1800));
  }

  #[tokio::test]
  async fn get_status_maps_rejection() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/resources/applicants/applicant-1/one");
        then.status(200).json_body(serde_json::json!({
          "id": "applicant-1",
          "review": {
            "reviewStatus": "completed",
            "reviewDate": "2024-03-01 12:00:00+0000",
            "reviewResult": {
              "reviewAnswer": "RED",
              "moderationComment": "Document is a photocopy",
              "rejectLabels": ["FORGERY"]
            }
          }
        }));
      })
      .await;

    let status = adapter(&server.base_url()).get_status("applicant-1").await.unwrap();
    assert_eq!(status.status, KycStatus::Rejected);
    assert_eq!(status.reason.as_deref(), Some("Document is a photocopy"));
    assert_eq!(
      status.observed_at,
      Some(Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap())
    );
  }

  #[tokio::test]
  async fn get_status_without_review_is_pending() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/resources/applicants/applicant-2/one");
        then.status(200).json_body(serde_json::json!({ "id": "applicant-2" }));
      })
      .await;

    let status = adapter(&server.base_url()).get_status("applicant-2").await.unwrap();
    assert_eq!(status, ProviderStatus::pending());
  }

  #[tokio::test]
  async fn server_error_is_transient() {
    let server = MockServer::start_async().await;
    server
      .mock_async(|when, then| {
        when.method(GET).path("/resources/applicants/applicant-3/one");
        then.status(503).body("maintenance");
      })
      .await;

    let err = adapter(&server.base_url()).get_status("applicant-3").await.unwrap_err();
    assert!(matches!(err, ProviderError::Status { status: 503, .. }));
    assert!(err.is_transient());
  }
}
