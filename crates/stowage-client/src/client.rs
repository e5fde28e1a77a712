//! Typed gateway client

use crate::routes::{ApiRouteTable, FileApi};
use crate::types::{FileInfo, MasterAndSlave};
use crate::{ClientError, Result};
use bytes::Bytes;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder, Response};
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, instrument};

/// Adds the bearer credential to every outgoing request
#[derive(Clone)]
pub struct CredentialInjector {
    token: Option<String>,
}

impl CredentialInjector {
    pub fn new(token: Option<String>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    pub fn apply(&self, request: RequestBuilder) -> RequestBuilder {
        match &self.token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl std::fmt::Debug for CredentialInjector {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialInjector")
            .field("token", &self.token.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

/// Client for one gateway, one method per operation.
///
/// Obtained from a [`crate::TransportFactory`]; cheap to share behind an `Arc`.
#[derive(Debug)]
pub struct FileClient {
    http: Client,
    routes: ApiRouteTable,
    credentials: CredentialInjector,
}

impl FileClient {
    pub(crate) fn new(http: Client, routes: ApiRouteTable, credentials: CredentialInjector) -> Self {
        Self {
            http,
            routes,
            credentials,
        }
    }

    pub fn routes(&self) -> &ApiRouteTable {
        &self.routes
    }

    fn get(&self, api: FileApi) -> RequestBuilder {
        self.credentials.apply(self.http.get(self.routes.url(api).clone()))
    }

    fn post(&self, api: FileApi) -> RequestBuilder {
        self.credentials.apply(self.http.post(self.routes.url(api).clone()))
    }

    /// Upload a file, returning its id
    #[instrument(skip(self, data))]
    pub async fn upload(&self, file_name: &str, data: impl Into<Bytes>) -> Result<String> {
        let request = self.post(FileApi::Upload).multipart(file_form(file_name, data));
        self.send_text(request).await
    }

    /// Upload a slave of `master`; the gateway picks the prefix
    #[instrument(skip(self, data))]
    pub async fn upload_slave(
        &self,
        master: &str,
        file_name: &str,
        data: impl Into<Bytes>,
    ) -> Result<String> {
        let request = self
            .post(FileApi::UploadSlave)
            .query(&[("masterFileId", master)])
            .multipart(file_form(file_name, data));
        self.send_text(request).await
    }

    /// Upload a slave of `master` under `prefix`
    #[instrument(skip(self, data))]
    pub async fn upload_slave_with_prefix(
        &self,
        master: &str,
        prefix: &str,
        file_name: &str,
        data: impl Into<Bytes>,
    ) -> Result<String> {
        let request = self
            .post(FileApi::UploadSlavePrefix)
            .query(&[("masterFileId", master), ("prefixName", prefix)])
            .multipart(file_form(file_name, data));
        self.send_text(request).await
    }

    /// Upload an image and request one thumbnail per `WxH` entry of `cut_size`
    #[instrument(skip(self, data))]
    pub async fn upload_image_and_thumbs(
        &self,
        cut_size: &str,
        file_name: &str,
        data: impl Into<Bytes>,
    ) -> Result<MasterAndSlave> {
        let request = self
            .post(FileApi::UploadImageThumb)
            .query(&[("cutSize", cut_size)])
            .multipart(file_form(file_name, data));
        Ok(self.send(request).await?.json().await?)
    }

    /// Delete a file
    #[instrument(skip(self))]
    pub async fn remove(&self, file_id: &str) -> Result<bool> {
        let request = self.post(FileApi::Remove).query(&[("fileId", file_id)]);
        Ok(self.send(request).await?.json().await?)
    }

    /// Current info of a file
    #[instrument(skip(self))]
    pub async fn info(&self, file_id: &str) -> Result<FileInfo> {
        let request = self.get(FileApi::Info).query(&[("fileId", file_id)]);
        Ok(self.send(request).await?.json().await?)
    }

    /// Stream a whole file into `sink`, returning the number of bytes written
    #[instrument(skip(self, sink))]
    pub async fn download<W>(&self, file_id: &str, sink: &mut W) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let request = self.get(FileApi::Download).query(&[("fileId", file_id)]);
        let response = self.send(request).await?;
        write_body(response, sink).await
    }

    /// Stream `[start, start + len)` of a file into `sink`
    #[instrument(skip(self, sink))]
    pub async fn download_range<W>(
        &self,
        file_id: &str,
        start: u64,
        len: u64,
        sink: &mut W,
    ) -> Result<u64>
    where
        W: AsyncWrite + Unpin + ?Sized,
    {
        let request = self.get(FileApi::DownloadRange).query(&[
            ("fileId", file_id.to_string()),
            ("start", start.to_string()),
            ("len", len.to_string()),
        ]);
        let response = self.send(request).await?;
        write_body(response, sink).await
    }

    async fn send_text(&self, request: RequestBuilder) -> Result<String> {
        Ok(self.send(request).await?.text().await?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        debug!(status = status.as_u16(), url = %response.url(), "Gateway responded");
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            return Err(ClientError::from_error_body(&text, status.as_u16()));
        }
        Ok(response)
    }
}

fn file_form(file_name: &str, data: impl Into<Bytes>) -> Form {
    let data = data.into();
    let len = data.len() as u64;
    let part = Part::stream_with_length(data, len).file_name(file_name.to_string());
    Form::new().part("file", part)
}

async fn write_body<W>(mut response: Response, sink: &mut W) -> Result<u64>
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let mut written = 0u64;
    while let Some(chunk) = response.chunk().await? {
        sink.write_all(&chunk).await?;
        written += chunk.len() as u64;
    }
    sink.flush().await?;
    Ok(written)
}
