pub mod fetch_client;
pub mod ocr_service;
pub mod scanner;

#[cfg(test)]
pub(crate) mod fakes;

pub use fetch_client::ResilientFetchClient;
pub use ocr_service::{LocatorParse, MarkupResponseParser, OcrService, ResponseParser};
pub use scanner::ResourceScanner;
