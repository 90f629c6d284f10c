//! Per-request view used for phase detection and return URLs

use actix_web::HttpRequest;
use std::collections::BTreeMap;
use url::Url;

/// Query (or form) parameters of the current request
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CallbackParams(BTreeMap<String, String>);

impl CallbackParams {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse an `application/x-www-form-urlencoded` string
    #[must_use]
    pub fn parse(query: &str) -> Self {
        url::form_urlencoded::parse(query.as_bytes())
            .into_owned()
            .collect()
    }

    #[must_use]
    pub fn get(&self, name: &str) -> Option<&str> {
        self.0.get(name).map(String::as_str)
    }

    #[must_use]
    pub fn contains(&self, name: &str) -> bool {
        self.0.contains_key(name)
    }

    pub fn insert(&mut self, name: &str, value: &str) {
        self.0.insert(name.to_string(), value.to_string());
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl FromIterator<(String, String)> for CallbackParams {
    fn from_iter<T: IntoIterator<Item = (String, String)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}

/// Request-scoped information the orchestrator reads
pub trait RequestContext {
    fn params(&self) -> &CallbackParams;

    fn param(&self, name: &str) -> Option<&str> {
        self.params().get(name)
    }

    /// Absolute URL back to the current endpoint carrying only `extra` as
    /// query parameters
    fn url_for(&self, extra: &[(&str, &str)]) -> String;
}

/// A request as seen by the handshake: its URL and its parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallbackRequest {
    url: Url,
    params: CallbackParams,
}

impl CallbackRequest {
    /// Build from an absolute URL, taking parameters from its query string
    #[must_use]
    pub fn from_url(url: Url) -> Self {
        let params = CallbackParams::parse(url.query().unwrap_or_default());
        Self { url, params }
    }

    /// Parse an absolute URL
    ///
    /// # Errors
    ///
    /// Returns an error if `url` is not an absolute URL
    pub fn parse(url: &str) -> Result<Self, url::ParseError> {
        Url::parse(url).map(Self::from_url)
    }

    /// Build from an actix-web request, using the connection info for
    /// scheme and host
    ///
    /// # Errors
    ///
    /// Returns an error if the reconstructed URL does not parse
    pub fn from_http_request(req: &HttpRequest) -> Result<Self, url::ParseError> {
        let info = req.connection_info();
        let path_and_query = req
            .uri()
            .path_and_query()
            .map_or("/", |pq| pq.as_str());
        Self::parse(&format!("{}://{}{}", info.scheme(), info.host(), path_and_query))
    }

    /// Merge additional parameters, e.g. a POSTed provider response
    #[must_use]
    pub fn with_params<'a, I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in params {
            self.params.insert(name, value);
        }
        self
    }

    #[must_use]
    pub fn url(&self) -> &Url {
        &self.url
    }
}

impl RequestContext for CallbackRequest {
    fn params(&self) -> &CallbackParams {
        &self.params
    }

    fn url_for(&self, extra: &[(&str, &str)]) -> String {
        let mut url = self.url.clone();
        url.set_query(None);
        url.set_fragment(None);
        if !extra.is_empty() {
            url.query_pairs_mut().extend_pairs(extra.iter().copied());
        }
        url.to_string()
    }
}
