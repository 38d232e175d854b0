pub mod driver;
pub mod manager;

pub use driver::PageDriver;
pub use manager::BrowserManager;
