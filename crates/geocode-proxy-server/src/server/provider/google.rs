//! Google Maps Geocoding API client.
//!
//! Requests authenticate with an API key, or, for premium clients, with a
//! `client` id and an HMAC-SHA1 `signature` of the request path and query.
//! The response `status` field decides the outcome:
//!
//! | status                                 | outcome                      |
//! |----------------------------------------|------------------------------|
//! | `OK` with results                      | first result's location      |
//! | `OK` without results, `ZERO_RESULTS`   | [`ProviderError::NoResults`] |
//! | `OVER_QUERY_LIMIT`, `OVER_DAILY_LIMIT` | [`ProviderError::RateLimited`] |
//! | anything else                          | [`ProviderError::Transport`] |
//!
//! HTTP 429 also maps to [`ProviderError::RateLimited`]; other non-2xx
//! statuses, network and decoding failures are transport errors.

use crate::server::config::{GoogleConfig, PremiumCredentials};
use anyhow::Context;
use base64::{
    Engine,
    engine::general_purpose::{URL_SAFE, URL_SAFE_NO_PAD},
};
use core::{fmt, time::Duration};
use futures::future::BoxFuture;
use geocode_proxy_core::{
    provider::{Provider, ProviderError},
    types::Location,
};
use hmac::{Hmac, Mac, digest::KeyInit as HmacKeyInit};
use reqwest::{StatusCode, Url};
use serde::Deserialize;
use sha1::Sha1;

type HmacSha1 = Hmac<Sha1>;

const GEOCODE_PATH: &str = "/maps/api/geocode/json";

#[derive(Debug, Deserialize)]
struct GeocodeResponse {
    status: String,
    #[serde(default)]
    results: Vec<GeocodeEntry>,
    #[serde(default)]
    error_message: Option<String>,
}

#[derive(Debug, Deserialize)]
struct GeocodeEntry {
    geometry: Geometry,
}

#[derive(Debug, Deserialize)]
struct Geometry {
    location: LatLng,
}

#[derive(Debug, Deserialize)]
struct LatLng {
    lat: f64,
    lng: f64,
}

/// Signs request URLs for Google Maps premium clients.
#[derive(Clone)]
struct UrlSigner {
    client_id: String,
    mac: HmacSha1,
}

impl UrlSigner {
    /// The secret is url-safe base64, with or without padding.
    fn new(credentials: &PremiumCredentials) -> anyhow::Result<Self> {
        let key = URL_SAFE_NO_PAD
            .decode(credentials.client_secret.trim_end_matches('='))
            .context("Google client secret is not url-safe base64")?;
        let mac = <HmacSha1 as HmacKeyInit>::new_from_slice(&key)
            .map_err(|e| anyhow::anyhow!("Invalid HMAC key: {e}"))?;
        Ok(Self {
            client_id: credentials.client_id.clone(),
            mac,
        })
    }

    /// Appends the `signature` of the path and query already in `url`. Must
    /// be the last parameter added.
    fn sign(&self, url: &mut Url) {
        let payload = match url.query() {
            Some(query) => format!("{}?{query}", url.path()),
            None => url.path().to_string(),
        };
        let mut mac = self.mac.clone();
        mac.update(payload.as_bytes());
        let signature = URL_SAFE.encode(mac.finalize().into_bytes());
        url.query_pairs_mut().append_pair("signature", &signature);
    }
}

impl fmt::Debug for UrlSigner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UrlSigner")
            .field("client_id", &self.client_id)
            .finish_non_exhaustive()
    }
}

/// [`Provider`] backed by the Google Geocoding web service.
#[derive(Debug, Clone)]
pub struct GoogleGeocoder {
    client: reqwest::Client,
    endpoint: Url,
    api_key: String,
    signer: Option<UrlSigner>,
    channel: Option<String>,
}

impl GoogleGeocoder {
    /// Builds a client whose every request is bounded by `timeout`.
    ///
    /// Premium credentials, when present, take precedence over the API key.
    pub fn new(config: &GoogleConfig, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        let endpoint = format!("{}{GEOCODE_PATH}", config.base_url.trim_end_matches('/'));
        let endpoint = Url::parse(&endpoint)
            .with_context(|| format!("invalid Google base URL `{}`", config.base_url))?;
        let signer = config.premium.as_ref().map(UrlSigner::new).transpose()?;

        Ok(Self {
            client,
            endpoint,
            api_key: config.api_key.clone(),
            signer,
            channel: config.channel.clone(),
        })
    }

    pub fn endpoint(&self) -> &str {
        self.endpoint.as_str()
    }

    fn request_url(&self, address: &str) -> Url {
        let mut url = self.endpoint.clone();
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("address", address);
            match &self.signer {
                Some(signer) => {
                    query.append_pair("client", &signer.client_id);
                }
                None if !self.api_key.is_empty() => {
                    query.append_pair("key", &self.api_key);
                }
                None => {}
            }
            if let Some(channel) = &self.channel {
                query.append_pair("channel", channel);
            }
        }
        if let Some(signer) = &self.signer {
            signer.sign(&mut url);
        }
        url
    }

    async fn geocode(&self, address: &str) -> Result<Location, ProviderError> {
        if address.trim().is_empty() {
            return Err(ProviderError::NoResults);
        }

        let response = self
            .client
            .get(self.request_url(address))
            .send()
            .await
            .map_err(|e| ProviderError::transport(format!("Geocoding request failed: {e}")))?;

        let status = response.status();
        if status == StatusCode::TOO_MANY_REQUESTS {
            return Err(ProviderError::RateLimited);
        }
        if !status.is_success() {
            return Err(ProviderError::transport(format!(
                "Geocoding API returned HTTP {status}"
            )));
        }

        let body: GeocodeResponse = response.json().await.map_err(|e| {
            ProviderError::transport(format!("Failed to decode geocoding response: {e}"))
        })?;
        interpret(body)
    }
}

impl Provider for GoogleGeocoder {
    fn resolve<'a>(&'a self, address: &'a str) -> BoxFuture<'a, Result<Location, ProviderError>> {
        Box::pin(self.geocode(address))
    }
}

fn interpret(response: GeocodeResponse) -> Result<Location, ProviderError> {
    match response.status.as_str() {
        "OK" => response
            .results
            .into_iter()
            .next()
            .map(|entry| Location::new(entry.geometry.location.lat, entry.geometry.location.lng))
            .ok_or(ProviderError::NoResults),
        "ZERO_RESULTS" => Err(ProviderError::NoResults),
        "OVER_QUERY_LIMIT" | "OVER_DAILY_LIMIT" => Err(ProviderError::RateLimited),
        other => Err(ProviderError::transport(match response.error_message {
            Some(message) => format!("maps: {other} - {message}"),
            None => format!("maps: {other}"),
        })),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{
        Json, Router,
        extract::{Query, RawQuery},
        response::{IntoResponse, Response},
        routing::get,
    };
    use serde_json::json;
    use std::collections::HashMap;

    fn parse(body: &str) -> Result<Location, ProviderError> {
        interpret(serde_json::from_str(body).unwrap())
    }

    #[test]
    fn ok_status_takes_the_first_result() {
        let location = parse(
            r#"{"status":"OK","results":[
                {"geometry":{"location":{"lat":39.7392,"lng":-104.9903}},"formatted_address":"Denver, CO, USA"},
                {"geometry":{"location":{"lat":1.0,"lng":2.0}}}
            ]}"#,
        )
        .unwrap();
        assert_eq!(location, Location::new(39.7392, -104.9903));
    }

    #[test]
    fn empty_results_are_unresolved() {
        assert_eq!(
            parse(r#"{"status":"ZERO_RESULTS","results":[]}"#),
            Err(ProviderError::NoResults)
        );
        assert_eq!(
            parse(r#"{"status":"OK","results":[]}"#),
            Err(ProviderError::NoResults)
        );
    }

    #[test]
    fn quota_statuses_are_rate_limits() {
        assert_eq!(
            parse(r#"{"status":"OVER_QUERY_LIMIT"}"#),
            Err(ProviderError::RateLimited)
        );
        assert_eq!(
            parse(r#"{"status":"OVER_DAILY_LIMIT","results":[]}"#),
            Err(ProviderError::RateLimited)
        );
    }

    #[test]
    fn other_statuses_are_transport_errors() {
        assert_eq!(
            parse(r#"{"status":"REQUEST_DENIED","error_message":"The provided API key is invalid."}"#),
            Err(ProviderError::transport(
                "maps: REQUEST_DENIED - The provided API key is invalid."
            ))
        );
        assert_eq!(
            parse(r#"{"status":"UNKNOWN_ERROR"}"#),
            Err(ProviderError::transport("maps: UNKNOWN_ERROR"))
        );
    }

    async fn stub(Query(params): Query<HashMap<String, String>>) -> Response {
        if params.get("key").map(String::as_str) != Some("test-key") {
            return Json(json!({"status": "REQUEST_DENIED", "results": []})).into_response();
        }
        match params.get("address").map(String::as_str) {
            Some("Denver, CO, USA") => Json(json!({
                "status": "OK",
                "results": [{"geometry": {"location": {"lat": 39.7392, "lng": -104.9903}}}]
            }))
            .into_response(),
            Some("throttled") => (StatusCode::TOO_MANY_REQUESTS, "slow down").into_response(),
            Some("over") => Json(json!({"status": "OVER_QUERY_LIMIT"})).into_response(),
            Some("broken") => (StatusCode::BAD_GATEWAY, "upstream down").into_response(),
            Some("garbage") => "not json".into_response(),
            _ => Json(json!({"status": "ZERO_RESULTS", "results": []})).into_response(),
        }
    }

    async fn spawn_stub() -> String {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route(GEOCODE_PATH, get(stub));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        format!("http://{addr}/")
    }

    fn geocoder(base_url: String, api_key: &str) -> GoogleGeocoder {
        let config = GoogleConfig {
            api_key: api_key.to_string(),
            channel: Some("tests".to_string()),
            base_url,
            ..GoogleConfig::default()
        };
        GoogleGeocoder::new(&config, Duration::from_secs(5)).unwrap()
    }

    fn premium() -> PremiumCredentials {
        PremiumCredentials {
            client_id: "gme-tests".to_string(),
            client_secret: "vNIXE0xscrmjlyV-12Nj_BvUPaw=".to_string(),
        }
    }

    fn signature_of(url: &Url) -> Option<String> {
        url.query_pairs()
            .find(|(name, _)| name == "signature")
            .map(|(_, value)| value.into_owned())
    }

    #[test]
    fn signs_the_documented_example() {
        let signer = UrlSigner::new(&PremiumCredentials {
            client_id: "clientID".to_string(),
            client_secret: "vNIXE0xscrmjlyV-12Nj_BvUPaw=".to_string(),
        })
        .unwrap();
        let mut url = Url::parse(
            "https://maps.googleapis.com/maps/api/geocode/json?address=New+York&client=clientID",
        )
        .unwrap();

        signer.sign(&mut url);
        assert_eq!(
            signature_of(&url).as_deref(),
            Some("chaRF2hTJKOScPr-RQCEhZbSzIE=")
        );
    }

    #[test]
    fn unpadded_secret_signs_the_same() {
        let padded = UrlSigner::new(&premium()).unwrap();
        let unpadded = UrlSigner::new(&PremiumCredentials {
            client_secret: "vNIXE0xscrmjlyV-12Nj_BvUPaw".to_string(),
            ..premium()
        })
        .unwrap();

        let mut a = Url::parse("https://example.com/maps/api/geocode/json?address=x").unwrap();
        let mut b = a.clone();
        padded.sign(&mut a);
        unpadded.sign(&mut b);
        assert_eq!(a, b);
    }

    #[test]
    fn malformed_secret_is_rejected() {
        let config = GoogleConfig {
            premium: Some(PremiumCredentials {
                client_secret: "not base64!".to_string(),
                ..premium()
            }),
            ..GoogleConfig::default()
        };
        let err = GoogleGeocoder::new(&config, Duration::from_secs(1)).unwrap_err();
        assert!(err.to_string().contains("base64"));
    }

    #[test]
    fn premium_requests_carry_client_and_trailing_signature() {
        let config = GoogleConfig {
            api_key: "ignored-key".to_string(),
            premium: Some(premium()),
            channel: Some("web".to_string()),
            ..GoogleConfig::default()
        };
        let google = GoogleGeocoder::new(&config, Duration::from_secs(1)).unwrap();
        let url = google.request_url("Denver, CO, USA");

        let names: Vec<String> = url.query_pairs().map(|(name, _)| name.into_owned()).collect();
        assert_eq!(names, ["address", "client", "channel", "signature"]);
        assert!(signature_of(&url).is_some());
    }

    async fn signed_stub(RawQuery(query): RawQuery) -> Response {
        let query = query.unwrap_or_default();
        let Some((unsigned, _)) = query.rsplit_once("&signature=") else {
            return Json(json!({"status": "REQUEST_DENIED"})).into_response();
        };
        let mut expected = Url::parse(&format!("http://stub{GEOCODE_PATH}?{unsigned}")).unwrap();
        UrlSigner::new(&premium()).unwrap().sign(&mut expected);

        if expected.query() == Some(query.as_str()) && unsigned.contains("client=gme-tests") {
            Json(json!({
                "status": "OK",
                "results": [{"geometry": {"location": {"lat": 39.7392, "lng": -104.9903}}}]
            }))
            .into_response()
        } else {
            Json(json!({"status": "REQUEST_DENIED"})).into_response()
        }
    }

    #[tokio::test]
    async fn signed_requests_are_accepted() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let router = Router::new().route(GEOCODE_PATH, get(signed_stub));
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });

        let config = GoogleConfig {
            premium: Some(premium()),
            base_url: format!("http://{addr}"),
            ..GoogleConfig::default()
        };
        let google = GoogleGeocoder::new(&config, Duration::from_secs(5)).unwrap();
        assert_eq!(
            google.resolve("Denver, CO, USA").await,
            Ok(Location::new(39.7392, -104.9903))
        );

        let unsigned = geocoder(format!("http://{addr}"), "test-key");
        assert_eq!(
            unsigned.resolve("Denver, CO, USA").await,
            Err(ProviderError::transport("maps: REQUEST_DENIED"))
        );
    }

    #[tokio::test]
    async fn resolves_against_a_live_endpoint() {
        let base_url = spawn_stub().await;
        let google = geocoder(base_url.clone(), "test-key");
        assert_eq!(google.endpoint(), format!("{base_url}maps/api/geocode/json"));

        assert_eq!(
            google.resolve("Denver, CO, USA").await,
            Ok(Location::new(39.7392, -104.9903))
        );
        assert_eq!(
            google.resolve("Atlantis").await,
            Err(ProviderError::NoResults)
        );
        assert_eq!(
            google.resolve("throttled").await,
            Err(ProviderError::RateLimited)
        );
        assert_eq!(google.resolve("over").await, Err(ProviderError::RateLimited));
        assert!(matches!(
            google.resolve("broken").await,
            Err(ProviderError::Transport { context }) if context.contains("502")
        ));
        assert!(matches!(
            google.resolve("garbage").await,
            Err(ProviderError::Transport { .. })
        ));
    }

    #[tokio::test]
    async fn rejected_key_is_a_transport_error() {
        let google = geocoder(spawn_stub().await, "wrong-key");
        assert_eq!(
            google.resolve("Denver, CO, USA").await,
            Err(ProviderError::transport("maps: REQUEST_DENIED"))
        );
    }

    #[tokio::test]
    async fn empty_address_never_leaves_the_process() {
        // Nothing listens here; a request would fail with a transport error.
        let google = geocoder("http://127.0.0.1:9".to_string(), "test-key");
        assert_eq!(google.resolve("").await, Err(ProviderError::NoResults));
        assert_eq!(google.resolve("   ").await, Err(ProviderError::NoResults));
    }
}
