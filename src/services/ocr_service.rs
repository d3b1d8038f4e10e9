//! OCR 服务 - 业务能力层
//!
//! 一次识别分两步，两步都走 `ResilientFetchClient`：
//! 1. 上传图片，从返回页面中找到结果的下载地址
//! 2. 下载识别出的文本
//!
//! 页面解析放在 `ResponseParser` 后面，换一家 OCR 站点只需要换解析器。

use crate::config::Config;
use crate::error::{OcrError, OcrResult};
use crate::infrastructure::http_transport::{FilePart, HttpRequest};
use crate::models::Resource;
use crate::services::fetch_client::ResilientFetchClient;
use regex::Regex;
use reqwest::Url;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

/// 上传响应的解析结果
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LocatorParse {
    Found(String),
    NotFound,
}

/// OCR 站点响应解析器
pub trait ResponseParser: Send + Sync {
    /// 从上传响应中找出结果的下载地址
    fn find_locator(&self, submit_body: &str) -> LocatorParse;

    /// 从下载响应中取出识别文本，没有内容时返回 None
    fn extract_text(&self, result_body: &str) -> Option<String>;
}

/// 基于正则的页面解析器
pub struct MarkupResponseParser {
    locator: Regex,
    textarea: Regex,
}

impl MarkupResponseParser {
    /// 默认匹配页面中指向 `.txt` 的链接
    pub const DEFAULT_LOCATOR_PATTERN: &'static str =
        r#"(?i)href\s*=\s*["']([^"']+\.txt(?:\?[^"']*)?)["']"#;

    pub fn new() -> Self {
        Self::with_pattern(Self::DEFAULT_LOCATOR_PATTERN).expect("default pattern is valid")
    }

    /// 自定义定位符正则，第一个捕获组为下载地址
    pub fn with_pattern(pattern: &str) -> Result<Self, regex::Error> {
        Ok(Self {
            locator: Regex::new(pattern)?,
            textarea: Regex::new(r"(?is)<textarea[^>]*>(.*?)</textarea>")?,
        })
    }
}

impl Default for MarkupResponseParser {
    fn default() -> Self {
        Self::new()
    }
}

impl ResponseParser for MarkupResponseParser {
    fn find_locator(&self, submit_body: &str) -> LocatorParse {
        match self.locator.captures(submit_body).and_then(|c| c.get(1)) {
            Some(m) => LocatorParse::Found(unescape_html(m.as_str())),
            None => LocatorParse::NotFound,
        }
    }

    fn extract_text(&self, result_body: &str) -> Option<String> {
        let text = match self.textarea.captures(result_body) {
            Some(c) => unescape_html(&c[1]),
            None => result_body.to_string(),
        };
        let text = text.trim();
        (!text.is_empty()).then(|| text.to_string())
    }
}

fn unescape_html(s: &str) -> String {
    s.replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&")
}

/// OCR 服务
pub struct OcrService {
    client: ResilientFetchClient,
    parser: Arc<dyn ResponseParser>,
    endpoint: String,
    language: String,
    timeout: Duration,
    max_retries: usize,
}

impl OcrService {
    pub fn new(client: ResilientFetchClient, parser: Arc<dyn ResponseParser>, config: &Config) -> Self {
        Self {
            client,
            parser,
            endpoint: config.ocr_endpoint.clone(),
            language: config.ocr_language.clone(),
            timeout: config.request_timeout(),
            max_retries: config.max_retries,
        }
    }

    /// 识别一个图片文件，返回去掉首尾空白的文本
    pub async fn recognize(&self, resource: &Resource) -> OcrResult<String> {
        let bytes = tokio::fs::read(resource.path())
            .await
            .map_err(|e| OcrError::persistence(resource.path(), e))?;

        debug!("上传 {} ({} 字节)", resource.file_name(), bytes.len());

        let submit = HttpRequest::multipart(
            &self.endpoint,
            vec![("l".to_string(), self.language.clone())],
            Some(FilePart {
                field: "userfile".to_string(),
                file_name: resource.file_name(),
                mime: mime_for(resource.extension().as_deref()).to_string(),
                bytes: Arc::new(bytes),
            }),
            self.timeout,
        );
        let submitted = self
            .client
            .fetch_with_resilience(&submit, self.max_retries)
            .await?;

        let locator = match self.parser.find_locator(&submitted.body) {
            LocatorParse::Found(locator) => locator,
            LocatorParse::NotFound => {
                return Err(OcrError::parse(format!(
                    "上传响应中没有找到结果地址 ({})",
                    resource.file_name()
                )))
            }
        };
        let result_url = self.resolve(&locator)?;
        info!("📥 下载识别结果: {}", result_url);

        let download = HttpRequest::get(result_url, self.timeout);
        let fetched = self
            .client
            .fetch_with_resilience(&download, self.max_retries)
            .await?;

        self.parser
            .extract_text(&fetched.body)
            .ok_or_else(|| OcrError::parse(format!("识别结果为空 ({})", resource.file_name())))
    }

    /// 相对地址按 OCR 接口地址补全
    fn resolve(&self, locator: &str) -> OcrResult<String> {
        let base = Url::parse(&self.endpoint)
            .map_err(|e| OcrError::parse(format!("OCR 接口地址无效 {}: {}", self.endpoint, e)))?;
        base.join(locator)
            .map(|u| u.to_string())
            .map_err(|e| OcrError::parse(format!("结果地址无效 {}: {}", locator, e)))
    }
}

fn mime_for(extension: Option<&str>) -> &'static str {
    match extension {
        Some("jpg") | Some("jpeg") => "image/jpeg",
        Some("png") => "image/png",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("tif") | Some("tiff") => "image/tiff",
        Some("webp") => "image/webp",
        _ => "application/octet-stream",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::fakes::{reply, FakeOcrSite, ScriptedTransport};
    use tempfile::TempDir;

    fn service(transport: Arc<dyn crate::infrastructure::HttpTransport>) -> OcrService {
        let config = Config {
            ocr_endpoint: "https://ocr.example/upload".to_string(),
            max_retries: 0,
            ..Default::default()
        };
        let client = ResilientFetchClient::new(transport, None, Duration::ZERO);
        OcrService::new(client, Arc::new(MarkupResponseParser::new()), &config)
    }

    fn image(dir: &TempDir, name: &str) -> Resource {
        let path = dir.path().join(name);
        std::fs::write(&path, b"\x89PNG fake").unwrap();
        Resource::new(path)
    }

    #[test]
    fn test_find_locator() {
        let parser = MarkupResponseParser::new();
        assert_eq!(
            parser.find_locator(r#"<a href='/files/abc.txt?x=1&amp;y=2'>Download</a>"#),
            LocatorParse::Found("/files/abc.txt?x=1&y=2".to_string())
        );
        assert_eq!(
            parser.find_locator("<html><body>Error: file too large</body></html>"),
            LocatorParse::NotFound
        );
    }

    #[test]
    fn test_extract_text_plain_and_textarea() {
        let parser = MarkupResponseParser::new();
        assert_eq!(
            parser.extract_text("  Hello\nWorld \n").as_deref(),
            Some("Hello\nWorld")
        );
        assert_eq!(
            parser
                .extract_text(r#"<form><textarea id="t">a &lt; b</textarea></form>"#)
                .as_deref(),
            Some("a < b")
        );
        assert_eq!(parser.extract_text(" \n\t"), None);
    }

    #[test]
    fn test_custom_pattern() {
        let parser = MarkupResponseParser::with_pattern(r#"data-result="([^"]+)""#).unwrap();
        assert_eq!(
            parser.find_locator(r#"<div data-result="https://cdn.example/r/9"></div>"#),
            LocatorParse::Found("https://cdn.example/r/9".to_string())
        );
        assert!(MarkupResponseParser::with_pattern("(").is_err());
    }

    #[test]
    fn test_mime_for() {
        assert_eq!(mime_for(Some("jpeg")), "image/jpeg");
        assert_eq!(mime_for(Some("tif")), "image/tiff");
        assert_eq!(mime_for(None), "application/octet-stream");
    }

    #[tokio::test]
    async fn test_recognize_two_step_exchange() {
        let dir = TempDir::new().unwrap();
        let site = Arc::new(FakeOcrSite::default());
        let ocr = service(site.clone());

        let text = ocr.recognize(&image(&dir, "page.png")).await.unwrap();
        assert_eq!(text, "text of page.png");
        assert_eq!(site.calls(), 2);
    }

    #[tokio::test]
    async fn test_missing_locator_is_parse_failure() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![reply(200, "<p>quota exceeded</p>")]));
        let ocr = service(transport.clone());

        let err = ocr.recognize(&image(&dir, "page.png")).await.unwrap_err();
        assert!(matches!(err, OcrError::ResponseParseFailure(_)));
        assert_eq!(transport.calls().len(), 1);
    }

    #[tokio::test]
    async fn test_empty_result_is_parse_failure() {
        let dir = TempDir::new().unwrap();
        let transport = Arc::new(ScriptedTransport::new(vec![
            reply(200, r#"<a href="r/1.txt">x</a>"#),
            reply(200, "   "),
        ]));
        let ocr = service(transport);

        let err = ocr.recognize(&image(&dir, "page.png")).await.unwrap_err();
        assert!(matches!(err, OcrError::ResponseParseFailure(_)));
    }

    #[tokio::test]
    async fn test_unreadable_image_is_persistence_failure() {
        let ocr = service(Arc::new(FakeOcrSite::default()));
        let err = ocr
            .recognize(&Resource::new("/definitely/not/here.png"))
            .await
            .unwrap_err();
        assert!(matches!(err, OcrError::PersistenceFailure { .. }));
    }

    #[test]
    fn test_resolve_relative_locator() {
        let ocr = service(Arc::new(FakeOcrSite::default()));
        assert_eq!(
            ocr.resolve("/result/a.txt").unwrap(),
            "https://ocr.example/result/a.txt"
        );
        assert_eq!(
            ocr.resolve("https://cdn.example/b.txt").unwrap(),
            "https://cdn.example/b.txt"
        );
    }
}
