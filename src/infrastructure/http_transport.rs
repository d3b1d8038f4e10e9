//! HTTP 传输 - 基础设施层
//!
//! 只暴露"通过某个代理（或直连）发一次请求"的能力，不关心重试和业务

use crate::error::{OcrError, OcrResult};
use crate::models::ProxyEntry;
use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Proxy};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// 上传的文件
#[derive(Debug, Clone)]
pub struct FilePart {
    pub field: String,
    pub file_name: String,
    pub mime: String,
    pub bytes: Arc<Vec<u8>>,
}

/// 请求体
#[derive(Debug, Clone)]
pub enum RequestBody {
    Empty,
    Multipart {
        fields: Vec<(String, String)>,
        file: Option<FilePart>,
    },
}

/// 一次 HTTP 请求的描述，可被重复发送
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub url: String,
    pub body: RequestBody,
    pub timeout: Duration,
}

impl HttpRequest {
    pub fn get(url: impl Into<String>, timeout: Duration) -> Self {
        Self {
            url: url.into(),
            body: RequestBody::Empty,
            timeout,
        }
    }

    pub fn multipart(
        url: impl Into<String>,
        fields: Vec<(String, String)>,
        file: Option<FilePart>,
        timeout: Duration,
    ) -> Self {
        Self {
            url: url.into(),
            body: RequestBody::Multipart { fields, file },
            timeout,
        }
    }
}

/// 响应：状态码 + 文本
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// 发送单次请求的能力
#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// `proxy` 为 None 时直连；传输层失败返回 `NetworkFailure`，非 2xx 作为正常响应返回
    async fn execute(&self, request: &HttpRequest, proxy: Option<&ProxyEntry>)
        -> OcrResult<HttpReply>;
}

/// 基于 reqwest 的实现
///
/// 直连共用一个 `Client` 以复用连接池；经代理的请求按代理单独构建
pub struct ReqwestTransport {
    user_agent: String,
    direct: Client,
}

impl ReqwestTransport {
    pub fn new() -> OcrResult<Self> {
        let user_agent = concat!("ocr_batch/", env!("CARGO_PKG_VERSION")).to_string();
        let direct = Client::builder()
            .user_agent(&user_agent)
            .no_proxy()
            .build()
            .map_err(|e| OcrError::network("direct", e))?;
        Ok(Self { user_agent, direct })
    }

    fn client_for(&self, request: &HttpRequest, proxy: Option<&ProxyEntry>) -> OcrResult<Cow<'_, Client>> {
        let Some(p) = proxy else {
            return Ok(Cow::Borrowed(&self.direct));
        };

        let proxy = Proxy::all(p.url()).map_err(|e| OcrError::network(&request.url, e))?;
        Client::builder()
            .user_agent(&self.user_agent)
            .proxy(proxy)
            .build()
            .map(Cow::Owned)
            .map_err(|e| OcrError::network(&request.url, e))
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn execute(
        &self,
        request: &HttpRequest,
        proxy: Option<&ProxyEntry>,
    ) -> OcrResult<HttpReply> {
        let client = self.client_for(request, proxy)?;

        debug!(
            "HTTP 请求 {} (代理: {})",
            request.url,
            proxy.map(|p| p.address()).unwrap_or_else(|| "直连".to_string())
        );

        let builder = match &request.body {
            RequestBody::Empty => client.get(&request.url),
            RequestBody::Multipart { fields, file } => {
                let mut form = Form::new();
                for (key, value) in fields {
                    form = form.text(key.clone(), value.clone());
                }
                if let Some(file) = file {
                    let part = Part::bytes(file.bytes.as_ref().clone())
                        .file_name(file.file_name.clone())
                        .mime_str(&file.mime)
                        .map_err(|e| OcrError::network(&request.url, e))?;
                    form = form.part(file.field.clone(), part);
                }
                client.post(&request.url).multipart(form)
            }
        };

        let response = builder
            .timeout(request.timeout)
            .send()
            .await
            .map_err(|e| OcrError::network(&request.url, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| OcrError::network(&request.url, e))?;

        Ok(HttpReply { status, body })
    }
}
