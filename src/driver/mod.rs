pub mod api;
#[cfg(test)]
pub mod mock;
pub mod traits;
pub mod web;

pub use api::ApiDriver;
pub use traits::{ActionRequest, PlatformDriver, RawOutcome, SlotCalendar};
pub use web::WebDriver;
