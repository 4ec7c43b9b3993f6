//! JSON bodies of the `/geocode` endpoint.
//!
//! Request:
//!
//! ```json
//! { "addresses": [{ "id": "1", "address": "Denver, CO, USA" }] }
//! ```
//!
//! Response:
//!
//! ```json
//! {
//!   "addresses": [
//!     { "id": "1", "address": "Denver, CO, USA", "lat": 39.74, "lng": -104.99, "error": "" }
//!   ],
//!   "error": ""
//! }
//! ```
//!
//! Missing fields decode to their empty value, and errors are reported as
//! strings with `""` meaning "no error". Errored addresses carry `0.0`
//! coordinates, which callers must not read as a location.

use crate::{
    error::Error,
    types::{GeocodeRequest, GeocodeResult},
};
use serde::{Deserialize, Serialize};

/// One entry of the inbound `addresses` array.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AddressRequest {
    pub id: String,
    pub address: String,
}

/// The inbound batch body.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchRequest {
    pub addresses: Option<Vec<AddressRequest>>,
}

impl BatchRequest {
    /// Decodes a raw body into the batch it describes.
    ///
    /// # Errors
    ///
    /// Returns [`Error::RequestDecode`] when the body is not valid JSON of the
    /// expected shape.
    pub fn decode(body: &[u8]) -> Result<Vec<GeocodeRequest>, Error> {
        let batch: Self = serde_json::from_slice(body).map_err(|e| Error::RequestDecode {
            reason: e.to_string(),
        })?;
        Ok(batch.into_requests())
    }

    pub fn into_requests(self) -> Vec<GeocodeRequest> {
        self.addresses
            .unwrap_or_default()
            .into_iter()
            .map(|a| GeocodeRequest {
                id: a.id,
                address: a.address,
            })
            .collect()
    }
}

/// One entry of the outbound `addresses` array.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct AddressResponse {
    pub id: String,
    pub address: String,
    pub lat: f64,
    pub lng: f64,
    pub error: String,
}

impl From<GeocodeResult> for AddressResponse {
    fn from(result: GeocodeResult) -> Self {
        let GeocodeResult { request, outcome } = result;
        let (lat, lng, error) = match outcome {
            Ok(location) => (location.lat, location.lng, String::new()),
            Err(e) => (0.0, 0.0, e.to_string()),
        };
        Self {
            id: request.id,
            address: request.address,
            lat,
            lng,
            error,
        }
    }
}

/// The outbound body. Always sent with HTTP 200.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResponse {
    pub addresses: Vec<AddressResponse>,
    pub error: String,
}

impl BatchResponse {
    pub fn new(results: Vec<GeocodeResult>, error: Option<&Error>) -> Self {
        Self {
            addresses: results.into_iter().map(AddressResponse::from).collect(),
            error: error.map(ToString::to_string).unwrap_or_default(),
        }
    }

    /// A response carrying only a batch-level error.
    pub fn from_error(error: &Error) -> Self {
        Self::new(Vec::new(), Some(error))
    }
}
