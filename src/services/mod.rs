pub mod captcha_solver;
pub mod field_extractor;
pub mod portal;
pub mod record_store;
pub mod screenshot_store;

pub use captcha_solver::{CaptchaSolver, TesseractSolver};
pub use field_extractor::FieldExtractor;
pub use portal::{AttemptFault, PanelField, Portal, PortalSession, ResultPanel};
pub use record_store::{JsonRecordStore, RecordStore, SuccessUpdate};
pub use screenshot_store::{ScreenshotStore, StoredScreenshot};
