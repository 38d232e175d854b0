use async_trait::async_trait;

use crate::error::Result;
use crate::semantic::RawElement;

/// The page operations the replay engine needs. `BrowserManager` implements
/// this against Chrome; tests implement it in memory.
#[async_trait]
pub trait PageDriver: Send + Sync {
    async fn navigate(&self, url: &str) -> Result<()>;

    async fn current_url(&self) -> Result<String>;

    /// Snapshot every visible interactive element with its label context.
    async fn snapshot_elements(&self) -> Result<Vec<RawElement>>;

    /// Whether a selector (CSS, or XPath when it starts with `/`) currently
    /// matches an element.
    async fn selector_exists(&self, selector: &str) -> Result<bool>;

    /// Click the element. `force` clicks through the DOM API, bypassing
    /// hit-testing, which is what overlapping styled buttons need.
    async fn click(&self, selector: &str, force: bool) -> Result<()>;

    /// Replace the field's value and fire the input/change events a real
    /// keyboard interaction would fire.
    async fn fill(&self, selector: &str, value: &str) -> Result<()>;

    /// Choose a `<select>` option by its visible label.
    async fn select_option(&self, selector: &str, option_label: &str) -> Result<()>;

    /// Set a radio/checkbox checked state directly.
    async fn set_checked(&self, selector: &str, checked: bool) -> Result<()>;

    async fn press_key(&self, selector: &str, key: &str) -> Result<()>;

    async fn scroll_by(&self, x: i64, y: i64) -> Result<()>;

    /// Current value of a form field, `None` when the selector matches
    /// nothing.
    async fn field_value(&self, selector: &str) -> Result<Option<String>>;

    async fn is_checked(&self, selector: &str) -> Result<Option<bool>>;

    /// Visible label of the currently selected option of a `<select>`.
    async fn selected_label(&self, selector: &str) -> Result<Option<String>>;
}
