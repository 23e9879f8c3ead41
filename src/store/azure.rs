//! Azure-style blob storage backend.
//!
//! Talks to the Blob service REST interface directly with Shared Key
//! authorization: two calls for publishing (create the container if it is
//! missing, PUT each blob) and one for reading back the current manifest.
//! Blobs are block blobs and every publish overwrites the same names, so
//! no block list management is needed.

use anyhow::{Context, Result, bail};
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use chrono::Utc;
use hmac::{Hmac, Mac};
use reqwest::{Method, StatusCode};
use sha2::Sha256;
use tracing::{debug, info};

const API_VERSION: &str = "2021-12-02";

/// One blob container under one storage account, with a blob-name prefix.
pub struct AzureBlobStore {
    account: String,
    key: String,
    container: String,
    prefix: String,
    client: reqwest::Client,
}

impl AzureBlobStore {
    pub(crate) fn new(
        account: impl Into<String>,
        key: impl Into<String>,
        container: impl Into<String>,
        prefix: impl Into<String>,
    ) -> Self {
        let prefix: String = prefix.into();
        Self {
            account: account.into(),
            key: key.into(),
            container: container.into(),
            prefix: prefix.trim_matches('/').to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub(crate) fn describe(&self) -> String {
        format!("{}/{}", self.endpoint(), self.blob_name(""))
    }

    /// Download a blob as text. `Ok(None)` on a 404.
    pub(crate) async fn get_text(&self, name: &str) -> Result<Option<String>> {
        let blob = self.blob_name(name);
        let url = format!("{}/{blob}", self.endpoint());
        let resource = format!("/{}/{}/{blob}", self.account, self.container);

        let response = self
            .request(Method::GET, &url, &resource, Vec::new(), "", &[])
            .await
            .with_context(|| format!("failed to fetch blob {blob}"))?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => Ok(Some(response.text().await?)),
            status => bail!("unexpected status {status} fetching blob {blob}"),
        }
    }

    /// Upload a block blob, overwriting any existing one. Creates the
    /// container first when it does not exist yet.
    pub(crate) async fn put_bytes(
        &self,
        name: &str,
        bytes: Vec<u8>,
        content_type: &str,
    ) -> Result<()> {
        self.ensure_container().await?;

        let blob = self.blob_name(name);
        let url = format!("{}/{blob}", self.endpoint());
        let resource = format!("/{}/{}/{blob}", self.account, self.container);
        let length = bytes.len();

        let response = self
            .request(
                Method::PUT,
                &url,
                &resource,
                bytes,
                content_type,
                &[("x-ms-blob-type", "BlockBlob")],
            )
            .await
            .with_context(|| format!("failed to upload blob {blob}"))?;

        if !response.status().is_success() {
            bail!("unexpected status {} uploading blob {blob}", response.status());
        }
        info!(%blob, bytes = length, "uploaded blob");
        Ok(())
    }

    /// Create the container when missing; an existing container is fine.
    async fn ensure_container(&self) -> Result<()> {
        let url = format!("{}?restype=container", self.endpoint());
        let resource =
            format!("/{}/{}\nrestype:container", self.account, self.container);

        let response = self
            .request(Method::PUT, &url, &resource, Vec::new(), "", &[])
            .await
            .context("failed to create container")?;

        match response.status() {
            StatusCode::CREATED => {
                info!(container = %self.container, "created container");
                Ok(())
            }
            StatusCode::CONFLICT => Ok(()),
            status => bail!("unexpected status {status} creating container"),
        }
    }

    async fn request(
        &self,
        method: Method,
        url: &str,
        canonical_resource: &str,
        body: Vec<u8>,
        content_type: &str,
        extra_headers: &[(&str, &str)],
    ) -> Result<reqwest::Response> {
        let date = Utc::now().format("%a, %d %b %Y %H:%M:%S GMT").to_string();

        let mut ms_headers: Vec<(String, String)> = vec![
            ("x-ms-date".to_string(), date),
            ("x-ms-version".to_string(), API_VERSION.to_string()),
        ];
        for (name, value) in extra_headers {
            ms_headers.push(((*name).to_string(), (*value).to_string()));
        }
        ms_headers.sort();

        let authorization = self.sign(
            method.as_str(),
            body.len(),
            content_type,
            &ms_headers,
            canonical_resource,
        )?;

        debug!(%method, url, "blob store request");
        let mut request = self
            .client
            .request(method, url)
            .header("Authorization", authorization);
        for (name, value) in &ms_headers {
            request = request.header(name.as_str(), value.as_str());
        }
        if !content_type.is_empty() {
            request = request.header("Content-Type", content_type);
        }
        Ok(request.body(body).send().await?)
    }

    /// Shared Key authorization header for one request.
    fn sign(
        &self,
        verb: &str,
        content_length: usize,
        content_type: &str,
        ms_headers: &[(String, String)],
        canonical_resource: &str,
    ) -> Result<String> {
        let string_to_sign = string_to_sign(
            verb,
            content_length,
            content_type,
            ms_headers,
            canonical_resource,
        );

        let key = BASE64
            .decode(&self.key)
            .context("storage account key is not valid base64")?;
        let mut mac = Hmac::<Sha256>::new_from_slice(&key)
            .context("storage account key has an invalid length")?;
        mac.update(string_to_sign.as_bytes());
        let signature = BASE64.encode(mac.finalize().into_bytes());

        Ok(format!("SharedKey {}:{signature}", self.account))
    }

    fn endpoint(&self) -> String {
        format!("https://{}.blob.core.windows.net/{}", self.account, self.container)
    }

    fn blob_name(&self, name: &str) -> String {
        if self.prefix.is_empty() {
            name.to_string()
        } else if name.is_empty() {
            self.prefix.clone()
        } else {
            format!("{}/{name}", self.prefix)
        }
    }
}

/// The canonical string the Shared Key scheme signs. Standard headers the
/// publisher never sends stay as empty lines; a zero content length is an
/// empty field under recent service versions.
fn string_to_sign(
    verb: &str,
    content_length: usize,
    content_type: &str,
    ms_headers: &[(String, String)],
    canonical_resource: &str,
) -> String {
    let content_length =
        if content_length == 0 { String::new() } else { content_length.to_string() };
    let canonical_headers: String = ms_headers
        .iter()
        .map(|(name, value)| format!("{name}:{value}\n"))
        .collect();
    format!(
        "{verb}\n\n\n{content_length}\n\n{content_type}\n\n\n\n\n\n\n{canonical_headers}{canonical_resource}"
    )
}
