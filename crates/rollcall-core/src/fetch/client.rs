//! HTTP fetcher used by the cache worker.

use std::future::Future;
use std::time::Duration;

use reqwest::{Client, Url};
use tracing::debug;

use super::{FetchError, Request, ResponseSnapshot};

/// HTTP request timeout in seconds.
/// There is no other timeout layer, so this bounds every fetch.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Something that can perform a request and buffer the response.
///
/// Any `Err` means the network could not produce a response at all. HTTP
/// error statuses are returned as `Ok` snapshots.
pub trait Fetch: Send + Sync {
    fn fetch(&self, request: &Request) -> impl Future<Output = Result<ResponseSnapshot, FetchError>> + Send;
}

/// reqwest-backed fetcher.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new() -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;
        Ok(Self { client })
    }

    async fn fetch_http(&self, request: &Request) -> Result<ResponseSnapshot, FetchError> {
        let mut builder = self.client.request(request.method.clone(), request.url.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }
        if let Some(ref body) = request.body {
            builder = builder.body(body.clone());
        }

        let response = builder.send().await?;
        let status = response.status();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.as_str().to_string(), v.to_string())))
            .collect();
        let body = response.bytes().await?.to_vec();

        debug!(url = %request.url, status = status.as_u16(), bytes = body.len(), "Fetched");

        let mut snapshot = ResponseSnapshot::new(
            status.as_u16(),
            status.canonical_reason().unwrap_or_default(),
            body,
        );
        snapshot.headers = headers;
        Ok(snapshot)
    }
}

impl Fetch for HttpFetcher {
    async fn fetch(&self, request: &Request) -> Result<ResponseSnapshot, FetchError> {
        if request.url.scheme() == "data" {
            return decode_data_url(&request.url);
        }
        self.fetch_http(request).await
    }
}

/// Answer a `data:` URL locally. Only the percent-encoded form is supported.
pub fn decode_data_url(url: &Url) -> Result<ResponseSnapshot, FetchError> {
    let rest = url
        .as_str()
        .strip_prefix("data:")
        .ok_or_else(|| FetchError::InvalidUrl(url.to_string()))?;
    let (media_type, payload) = rest
        .split_once(',')
        .ok_or_else(|| FetchError::InvalidUrl(format!("data URL without payload: {}", url)))?;

    if media_type.ends_with(";base64") {
        return Err(FetchError::UnsupportedDataUrl("base64 payloads are not supported".to_string()));
    }

    let content_type = if media_type.is_empty() {
        "text/plain;charset=US-ASCII".to_string()
    } else {
        String::from_utf8_lossy(&percent_decode(media_type)).into_owned()
    };

    Ok(ResponseSnapshot::new(200, "OK", percent_decode(payload)).with_header("Content-Type", content_type))
}

fn percent_decode(input: &str) -> Vec<u8> {
    let bytes = input.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'%' && i + 2 < bytes.len() {
            let hex = std::str::from_utf8(&bytes[i + 1..i + 3]).ok();
            if let Some(b) = hex.and_then(|h| u8::from_str_radix(h, 16).ok()) {
                out.push(b);
                i += 3;
                continue;
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_data_url_svg() {
        let url = Url::parse(r#"data:image/svg+xml,<svg xmlns="http://www.w3.org/2000/svg"><rect fill="%233498db"/></svg>"#).unwrap();
        let resp = decode_data_url(&url).unwrap();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.header("content-type"), Some("image/svg+xml"));
        assert!(resp.text().contains("#3498db"));
        assert!(resp.text().starts_with("<svg"));
    }

    #[test]
    fn test_decode_data_url_defaults_and_errors() {
        let plain = decode_data_url(&Url::parse("data:,hello%20world").unwrap()).unwrap();
        assert_eq!(plain.text(), "hello world");
        assert_eq!(plain.header("Content-Type"), Some("text/plain;charset=US-ASCII"));

        let b64 = Url::parse("data:text/plain;base64,aGk=").unwrap();
        assert!(matches!(decode_data_url(&b64), Err(FetchError::UnsupportedDataUrl(_))));
    }

    #[test]
    fn test_percent_decode_keeps_malformed_escapes() {
        assert_eq!(percent_decode("100%"), b"100%".to_vec());
        assert_eq!(percent_decode("%zz%41"), b"%zzA".to_vec());
    }
}
