use log::trace;
use serde_json::Value;
use url::Url;

use crate::repo::Error;

/// Header carrying the authentication token on every Data API request
const TOKEN_HEADER: &str = "Token";

/// Deployment flavor, it determines where the Data API is mounted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ApiFlavor {
    /// Self-managed HCD, the API is served at `/v1`
    Hcd,
    /// Astra DB, the API is served at `/api/json/v1`
    Astra,
}

impl ApiFlavor {
    fn path(&self) -> &'static [&'static str] {
        match self {
            Self::Hcd => &["v1"],
            Self::Astra => &["api", "json", "v1"],
        }
    }
}

/// Minimal Data API client: every request is a JSON command posted to the
/// database, a keyspace or a collection path.
pub struct DataApiClient {
    http: reqwest::Client,
    base: Url,
    token: String,
}

impl DataApiClient {
    pub fn new(api_endpoint: &str, flavor: ApiFlavor, token: String) -> Result<Self, Error> {
        let mut base = Url::parse(api_endpoint)?;
        base.path_segments_mut()
            .map_err(|_| Error::InvalidEndpoint(api_endpoint.to_owned()))?
            .pop_if_empty()
            .extend(flavor.path());

        Ok(Self {
            http: reqwest::Client::new(),
            base,
            token,
        })
    }

    /// Address of the resource identified by `segments` (keyspace, collection).
    pub fn url(&self, segments: &[&str]) -> Result<Url, Error> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidEndpoint(self.base.to_string()))?
            .extend(segments);
        Ok(url)
    }

    /// Posts `command` to the resource at `segments` and returns the response
    /// body, a body reporting errors is turned into [`Error::DataApi`].
    pub async fn command(&self, segments: &[&str], command: Value) -> Result<Value, Error> {
        let url = self.url(segments)?;
        trace!("data api command on {}", url);

        let response = self
            .http
            .post(url)
            .header(TOKEN_HEADER, &self.token)
            .json(&command)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            // error bodies are JSON whenever the request reached the API
            if let Ok(body) = serde_json::from_str::<Value>(&text) {
                check_response(body)?;
            }
            return Err(Error::UnexpectedResponse(format!(
                "http status {status}: {text}"
            )));
        }

        check_response(response.json().await?)
    }
}

/// Fails when the response body carries a non-empty `errors` list, the first
/// error is reported.
pub fn check_response(body: Value) -> Result<Value, Error> {
    let first_error = body
        .get("errors")
        .and_then(Value::as_array)
        .and_then(|errors| errors.first());

    if let Some(error) = first_error {
        let code = error
            .get("errorCode")
            .and_then(Value::as_str)
            .unwrap_or("UNKNOWN")
            .to_owned();
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_owned();
        return Err(Error::DataApi { code, message });
    }

    Ok(body)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn hcd_urls() {
        let client =
            DataApiClient::new("http://localhost:8181/", ApiFlavor::Hcd, "t".into()).unwrap();
        assert_eq!(client.url(&[]).unwrap().as_str(), "http://localhost:8181/v1");
        assert_eq!(
            client.url(&["ks", "users"]).unwrap().as_str(),
            "http://localhost:8181/v1/ks/users"
        );
    }

    #[test]
    fn astra_urls() {
        let client = DataApiClient::new(
            "https://db-us-east1.apps.astra.datastax.com",
            ApiFlavor::Astra,
            "t".into(),
        )
        .unwrap();
        assert_eq!(
            client.url(&["default_keyspace"]).unwrap().as_str(),
            "https://db-us-east1.apps.astra.datastax.com/api/json/v1/default_keyspace"
        );
    }

    #[test]
    fn invalid_endpoint() {
        assert!(matches!(
            DataApiClient::new("not an url", ApiFlavor::Hcd, "t".into()),
            Err(Error::Url(_))
        ));
        assert!(matches!(
            DataApiClient::new("mailto:admin@example.com", ApiFlavor::Hcd, "t".into()),
            Err(Error::InvalidEndpoint(_))
        ));
    }

    #[test]
    fn response_errors() {
        let ok = json!({ "status": { "ok": 1 } });
        assert_eq!(check_response(ok.clone()).unwrap(), ok);

        let err = check_response(json!({
            "errors": [
                { "errorCode": "DOCUMENT_ALREADY_EXISTS", "message": "duplicate _id" },
                { "errorCode": "OTHER", "message": "ignored" },
            ]
        }))
        .unwrap_err();
        assert!(matches!(
            err,
            Error::DataApi { ref code, ref message }
                if code == "DOCUMENT_ALREADY_EXISTS" && message == "duplicate _id"
        ));

        let empty = json!({ "errors": [], "status": { "ok": 1 } });
        assert!(check_response(empty).is_ok());
    }
}
