pub mod ocr_flow;

pub use ocr_flow::OcrFlow;
