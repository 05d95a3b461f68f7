use super::{check_segment, StorageBackend};

use async_trait::async_trait;
use keybroker::Error;
use reqwest::{Client, Response, StatusCode};
use tracing::debug;

/// Remote key/value backend speaking HTTP against a resource service:
/// `PUT`/`GET`/`DELETE` on `{base}/resources/{addr}/{typ}/{tag}`.
///
/// Transport faults map to `BackendUnavailable`, distinct from the
/// service's own 404 answer which maps to `NotFound`.
#[derive(Debug)]
pub struct RemoteBackend {
    base: String,
    client: Client,
}

impl RemoteBackend {
    pub fn new(base_url: impl Into<String>) -> Self {
        let mut base = base_url.into();
        while base.ends_with('/') {
            base.pop();
        }
        Self {
            base,
            client: Client::new(),
        }
    }

    fn url(&self, addr: &str, typ: &str, tag: &str) -> Result<String, Error> {
        check_segment(addr)?;
        check_segment(typ)?;
        check_segment(tag)?;
        Ok(format!("{}/resources/{addr}/{typ}/{tag}", self.base))
    }

    fn transport_fault(e: reqwest::Error) -> Error {
        Error::BackendUnavailable(e.to_string())
    }

    fn check_status(response: &Response) -> Result<(), Error> {
        match response.status() {
            s if s.is_success() => Ok(()),
            StatusCode::NOT_FOUND => Err(Error::NotFound),
            s => Err(Error::BackendUnavailable(format!(
                "unexpected status {s} from storage service"
            ))),
        }
    }
}

#[async_trait]
impl StorageBackend for RemoteBackend {
    async fn set(&self, addr: &str, typ: &str, tag: &str, data: &[u8]) -> Result<(), Error> {
        let url = self.url(addr, typ, tag)?;
        debug!(target: "keybroker::storage", url, "remote set");
        let response = self
            .client
            .put(&url)
            .body(data.to_vec())
            .send()
            .await
            .map_err(Self::transport_fault)?;
        Self::check_status(&response)
    }

    async fn set_if_absent(
        &self,
        addr: &str,
        typ: &str,
        tag: &str,
        data: &[u8],
    ) -> Result<bool, Error> {
        let url = self.url(addr, typ, tag)?;
        let response = self
            .client
            .put(&url)
            .header("If-None-Match", "*")
            .body(data.to_vec())
            .send()
            .await
            .map_err(Self::transport_fault)?;
        if response.status() == StatusCode::PRECONDITION_FAILED {
            return Ok(false);
        }
        Self::check_status(&response)?;
        Ok(true)
    }

    async fn get(&self, addr: &str, typ: &str, tag: &str) -> Result<Vec<u8>, Error> {
        let url = self.url(addr, typ, tag)?;
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(Self::transport_fault)?;
        Self::check_status(&response)?;
        let body = response.bytes().await.map_err(Self::transport_fault)?;
        Ok(body.to_vec())
    }

    async fn delete(&self, addr: &str, typ: &str, tag: &str) -> Result<(), Error> {
        let url = self.url(addr, typ, tag)?;
        let response = self
            .client
            .delete(&url)
            .send()
            .await
            .map_err(Self::transport_fault)?;
        Self::check_status(&response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urls_are_rooted_under_resources() {
        let backend = RemoteBackend::new("http://kv.internal:9000/");
        assert_eq!(
            backend.url("0xabc", "blobs", "a").unwrap(),
            "http://kv.internal:9000/resources/0xabc/blobs/a"
        );
    }

    #[test]
    fn traversal_keys_are_rejected() {
        let backend = RemoteBackend::new("http://kv.internal:9000");
        assert!(backend.url("..", "blobs", "a").is_err());
    }

    #[tokio::test]
    async fn unreachable_service_is_backend_unavailable() {
        // nothing listens on the reserved port, connect is refused immediately
        let backend = RemoteBackend::new("http://127.0.0.1:1");
        let result = backend.get("tenant", "blobs", "a").await;
        assert!(matches!(result, Err(Error::BackendUnavailable(_))));
    }
}
