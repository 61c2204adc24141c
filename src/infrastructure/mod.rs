pub mod chrome_portal;
pub mod js_executor;

pub use chrome_portal::{ChromePortal, ChromePortalOptions, PortalSelectors};
pub use js_executor::JsExecutor;
