use std::time::Duration;

use anyhow::Context;
use reqwest::{
    Method,
    blocking::{RequestBuilder, Response},
    header::HeaderMap,
};
use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::error::{ForgeError, HubError};

const USER_AGENT: &str = concat!("hub/", env!("CARGO_PKG_VERSION"));
const ACCEPT: &str = "application/vnd.github+json";
const TIMEOUT: Duration = Duration::from_secs(30);

/// Credential attached to every request.
#[derive(Clone, Debug, Default)]
pub enum Auth {
    #[default]
    None,
    Token(String),
    Basic { user: String, password: String },
}

/// JSON-over-HTTPS client bound to one API base URL.
pub struct HttpClient {
    reqwest_client: reqwest::blocking::Client,
    base_url: String,
    auth: Auth,
}

impl HttpClient {
    pub fn new(base_url: &str, auth: Auth) -> anyhow::Result<Self> {
        let reqwest_client = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(TIMEOUT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            reqwest_client,
            base_url: base_url.trim_end_matches('/').to_string(),
            auth,
        })
    }

    pub fn get<T: DeserializeOwned>(&self, path: &str) -> anyhow::Result<T> {
        self.get_with_query(path, &())
    }

    pub fn get_with_query<T, Q>(&self, path: &str, query: &Q) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        let request = self.request(Method::GET, &url).query(query);

        self.send(&Method::GET, request)?
            .json()
            .with_context(|| format!("Failed to parse response from {url}"))
    }

    pub fn post<T, B>(&self, path: &str, body: &B) -> anyhow::Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.send_json(Method::POST, path, body)?
            .json()
            .with_context(|| format!("Failed to parse response from {}", self.url(path)))
    }

    /// Sends a JSON body and ignores the response body.
    pub fn send_json<B>(&self, method: Method, path: &str, body: &B) -> anyhow::Result<Response>
    where
        B: Serialize + ?Sized,
    {
        let url = self.url(path);
        let request = self.request(method.clone(), &url).json(body);

        self.send(&method, request)
    }

    /// Lazily walks the pages of a listing, following `Link: rel="next"`.
    ///
    /// The next page is only requested once every item of the current one
    /// was consumed, so `take(n)` on the iterator bounds the requests made.
    pub fn paginate<W, Q>(&self, path: &str, query: &Q, per_page: u32) -> Pages<'_, W>
    where
        W: DeserializeOwned,
        Q: Serialize + ?Sized,
    {
        let url = self.url(path);
        let first = self
            .request(Method::GET, &url)
            .query(query)
            .query(&[("per_page", per_page)]);

        Pages {
            http_client: self,
            url,
            next: Some(first),
            buffer: Vec::new().into_iter(),
        }
    }

    fn url(&self, path: &str) -> String {
        if path.starts_with("http://") || path.starts_with("https://") {
            path.to_string()
        } else {
            format!("{}/{}", self.base_url, path.trim_start_matches('/'))
        }
    }

    fn request(&self, method: Method, url: &str) -> RequestBuilder {
        let request = self
            .reqwest_client
            .request(method, url)
            .header("Accept", ACCEPT);

        match &self.auth {
            Auth::None => request,
            Auth::Token(token) => request.header("Authorization", format!("token {token}")),
            Auth::Basic { user, password } => request.basic_auth(user, Some(password)),
        }
    }

    /// Sends the request, retrying GETs once on timeouts and connection
    /// failures, and turns non-2xx responses into [`ForgeError`]s.
    fn send(&self, method: &Method, request: RequestBuilder) -> anyhow::Result<Response> {
        let retry = if *method == Method::GET {
            request.try_clone()
        } else {
            None
        };

        let response = match request.send() {
            Ok(response) => response,
            Err(e) if is_transient(&e) && retry.is_some() => {
                tracing::debug!("{method} failed ({e}), retrying once");

                retry
                    .map(RequestBuilder::send)
                    .transpose()
                    .map_err(HubError::Network)?
                    .ok_or_else(|| anyhow::anyhow!("Request could not be retried"))?
            }
            Err(e) => return Err(HubError::Network(e).into()),
        };

        tracing::debug!("{method} {} -> {}", response.url(), response.status());

        check_status(response)
    }
}

/// Iterator over the items of a paginated listing.
pub struct Pages<'a, W> {
    http_client: &'a HttpClient,
    url: String,
    next: Option<RequestBuilder>,
    buffer: std::vec::IntoIter<W>,
}

impl<W: DeserializeOwned> Pages<'_, W> {
    fn fetch(&mut self, request: RequestBuilder) -> anyhow::Result<Vec<W>> {
        let response = self.http_client.send(&Method::GET, request)?;

        self.next = next_page_url(response.headers())
            .map(|url| self.http_client.request(Method::GET, &url));

        response
            .json()
            .with_context(|| format!("Failed to parse page of {}", self.url))
    }
}

impl<W: DeserializeOwned> Iterator for Pages<'_, W> {
    type Item = anyhow::Result<W>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(item) = self.buffer.next() {
                return Some(Ok(item));
            }

            // An error ends the iteration since `next` was taken.
            let request = self.next.take()?;

            match self.fetch(request) {
                Ok(page) => self.buffer = page.into_iter(),
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_timeout() || err.is_connect()
}

#[derive(Debug, Default, Deserialize)]
struct ErrorBody {
    #[serde(default)]
    message: String,
    #[serde(default)]
    errors: Vec<ErrorDetail>,
}

#[derive(Debug, Deserialize)]
struct ErrorDetail {
    message: Option<String>,
    resource: Option<String>,
    field: Option<String>,
    code: Option<String>,
}

impl ErrorDetail {
    fn describe(&self) -> String {
        if let Some(message) = &self.message {
            return message.clone();
        }

        match (&self.resource, &self.field, &self.code) {
            (Some(resource), Some(field), Some(code)) => format!("{resource}.{field} {code}"),
            (_, _, Some(code)) => code.clone(),
            _ => String::new(),
        }
    }
}

fn check_status(response: Response) -> anyhow::Result<Response> {
    let status = response.status();

    if status.is_success() {
        return Ok(response);
    }

    let url = response.url().to_string();
    let rate_limit_remaining = if status.as_u16() == 403 || status.as_u16() == 429 {
        response
            .headers()
            .get("x-ratelimit-remaining")
            .and_then(|value| value.to_str().ok())
            .and_then(|value| value.parse().ok())
    } else {
        None
    };
    let body: ErrorBody = response.json().unwrap_or_default();

    Err(HubError::Forge(ForgeError {
        status: status.as_u16(),
        url,
        message: body.message,
        errors: body
            .errors
            .iter()
            .map(ErrorDetail::describe)
            .filter(|e| !e.is_empty())
            .collect(),
        rate_limit_remaining,
    })
    .into())
}

/// Extracts the `rel="next"` target of a `Link` header.
fn next_page_url(headers: &HeaderMap) -> Option<String> {
    let link = headers.get("link")?.to_str().ok()?;

    link.split(',').find_map(|part| {
        let (target, params) = part.split_once(';')?;
        let is_next = params
            .split(';')
            .any(|param| param.trim() == r#"rel="next""#);

        is_next.then(|| {
            target
                .trim()
                .trim_start_matches('<')
                .trim_end_matches('>')
                .to_string()
        })
    })
}
