//! 单元测试用的传输层替身

use crate::error::{OcrError, OcrResult};
use crate::infrastructure::http_transport::{HttpReply, HttpRequest, HttpTransport, RequestBody};
use crate::models::ProxyEntry;
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Mutex;

/// 按顺序返回预设响应，记录每次调用使用的代理
pub struct ScriptedTransport {
    script: Mutex<VecDeque<OcrResult<HttpReply>>>,
    calls: Mutex<Vec<Option<String>>>,
}

impl ScriptedTransport {
    pub fn new(script: Vec<OcrResult<HttpReply>>) -> Self {
        Self {
            script: Mutex::new(script.into()),
            calls: Mutex::new(Vec::new()),
        }
    }

    /// 每次调用使用的代理地址，直连为 None
    pub fn calls(&self) -> Vec<Option<String>> {
        self.calls.lock().unwrap().clone()
    }
}

pub fn reply(status: u16, body: &str) -> OcrResult<HttpReply> {
    Ok(HttpReply {
        status,
        body: body.to_string(),
    })
}

pub fn refused() -> OcrResult<HttpReply> {
    Err(OcrError::network("http://fake", "connection refused"))
}

#[async_trait]
impl HttpTransport for ScriptedTransport {
    async fn execute(
        &self,
        _request: &HttpRequest,
        proxy: Option<&ProxyEntry>,
    ) -> OcrResult<HttpReply> {
        self.calls.lock().unwrap().push(proxy.map(|p| p.address()));
        self.script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(refused)
    }
}

/// 模拟 OCR 站点：上传返回带下载链接的页面，下载返回 `text of <文件名>`
#[derive(Default)]
pub struct FakeOcrSite {
    calls: Mutex<usize>,
}

impl FakeOcrSite {
    pub fn calls(&self) -> usize {
        *self.calls.lock().unwrap()
    }
}

#[async_trait]
impl HttpTransport for FakeOcrSite {
    async fn execute(
        &self,
        request: &HttpRequest,
        _proxy: Option<&ProxyEntry>,
    ) -> OcrResult<HttpReply> {
        *self.calls.lock().unwrap() += 1;
        match &request.body {
            RequestBody::Multipart {
                file: Some(file), ..
            } => reply(
                200,
                &format!(
                    r#"<html><a class="btn" href="/result/{}.txt">Download</a></html>"#,
                    file.file_name
                ),
            ),
            _ => match request.url.rsplit_once("/result/") {
                Some((_, name)) => reply(200, &format!("text of {}\n", name.trim_end_matches(".txt"))),
                None => reply(404, "not found"),
            },
        }
    }
}
