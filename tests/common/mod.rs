//! 集成测试公共工具：本地模拟的 OCR 站点和代理列表页

#![allow(dead_code)]

use async_trait::async_trait;
use ocr_batch::infrastructure::http_transport::RequestBody;
use ocr_batch::infrastructure::{HttpReply, HttpRequest, HttpTransport};
use ocr_batch::models::ProxyEntry;
use ocr_batch::{Config, OcrError, OcrResult};
use std::path::Path;
use std::sync::Mutex;

pub const OCR_ENDPOINT: &str = "https://ocr.test/upload";
pub const PROXY_SOURCE: &str = "https://proxies.test/list";

/// 一次调用的记录：请求地址 + 使用的代理
#[derive(Debug, Clone)]
pub struct Call {
    pub url: String,
    pub proxy: Option<String>,
}

/// 模拟站点
///
/// - 上传：返回带 `/result/<文件名>.txt` 链接的页面
/// - 下载：返回 `text of <文件名>`
/// - 代理列表页：返回两行 https 代理
#[derive(Default)]
pub struct FakeSite {
    calls: Mutex<Vec<Call>>,
    /// 经代理的请求一律返回 503
    pub reject_proxied: bool,
}

impl FakeSite {
    pub fn rejecting_proxies() -> Self {
        Self {
            reject_proxied: true,
            ..Default::default()
        }
    }

    pub fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    pub fn ocr_calls(&self) -> usize {
        self.calls()
            .iter()
            .filter(|c| !c.url.starts_with(PROXY_SOURCE))
            .count()
    }
}

#[async_trait]
impl HttpTransport for FakeSite {
    async fn execute(&self, request: &HttpRequest, proxy: Option<&ProxyEntry>) -> OcrResult<HttpReply> {
        self.calls.lock().unwrap().push(Call {
            url: request.url.clone(),
            proxy: proxy.map(|p| p.address()),
        });

        if request.url.starts_with(PROXY_SOURCE) {
            return Ok(reply(200, PROXY_TABLE));
        }
        if proxy.is_some() && self.reject_proxied {
            return Ok(reply(503, "proxy blocked"));
        }

        match &request.body {
            RequestBody::Multipart { file: Some(file), .. } => Ok(reply(
                200,
                &format!(r#"<p>done</p><a href="/result/{}.txt">Download</a>"#, file.file_name),
            )),
            _ => match request.url.rsplit_once("/result/") {
                Some((_, name)) => Ok(reply(200, &format!("text of {}\n", name.trim_end_matches(".txt")))),
                None => Err(OcrError::network(&request.url, "no route")),
            },
        }
    }
}

fn reply(status: u16, body: &str) -> HttpReply {
    HttpReply {
        status,
        body: body.to_string(),
    }
}

const PROXY_TABLE: &str = r#"
<table>
<tr><th>IP Address</th><th>Port</th><th>Code</th><th>Country</th><th>Anonymity</th><th>Google</th><th>Https</th><th>Last Checked</th></tr>
<tr><td>10.0.0.1</td><td>8080</td><td>US</td><td>United States</td><td>elite proxy</td><td>no</td><td class="hx">yes</td><td>1 min ago</td></tr>
<tr><td>10.0.0.2</td><td>3128</td><td>DE</td><td>Germany</td><td>anonymous</td><td>no</td><td class="hx">yes</td><td>2 mins ago</td></tr>
<tr><td>10.0.0.3</td><td>80</td><td>FR</td><td>France</td><td>transparent</td><td>no</td><td class="hx">no</td><td>3 mins ago</td></tr>
</table>
"#;

/// 测试用配置：不走代理，无等待
pub fn config(root: &Path, concurrency: usize) -> Config {
    Config {
        root_dir: root.to_path_buf(),
        concurrency,
        batch_delay_ms: 0,
        retry_backoff_ms: 0,
        max_retries: 2,
        use_proxy: false,
        ocr_endpoint: OCR_ENDPOINT.to_string(),
        proxy_source_url: PROXY_SOURCE.to_string(),
        owner_id: "integration-host-1".to_string(),
        ..Default::default()
    }
}

pub fn write_images(root: &Path, names: &[&str]) {
    for name in names {
        let path = root.join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(path, b"\x89PNG fake image").unwrap();
    }
}
