use async_trait::async_trait;

use crate::browser::PageDriver;
use crate::error::Result;

/// Post-interaction check deciding whether a step actually took effect.
/// The executor runs this after every interaction and retries the whole
/// step when it reports false.
#[async_trait]
pub trait Verifier: Send + Sync {
    async fn verify(&self, driver: &dyn PageDriver, selector: &str) -> Result<bool>;
}

/// The field now holds exactly this value.
pub struct ValueIs(pub String);

#[async_trait]
impl Verifier for ValueIs {
    async fn verify(&self, driver: &dyn PageDriver, selector: &str) -> Result<bool> {
        Ok(driver.field_value(selector).await?.as_deref() == Some(self.0.as_str()))
    }
}

/// The toggle is now in this checked state.
pub struct CheckedIs(pub bool);

#[async_trait]
impl Verifier for CheckedIs {
    async fn verify(&self, driver: &dyn PageDriver, selector: &str) -> Result<bool> {
        Ok(driver.is_checked(selector).await? == Some(self.0))
    }
}

/// The dropdown now shows this option label.
pub struct SelectedIs(pub String);

#[async_trait]
impl Verifier for SelectedIs {
    async fn verify(&self, driver: &dyn PageDriver, selector: &str) -> Result<bool> {
        Ok(driver.selected_label(selector).await?.as_deref() == Some(self.0.as_str()))
    }
}

/// The page navigated away from the given URL.
pub struct UrlChangedFrom(pub String);

#[async_trait]
impl Verifier for UrlChangedFrom {
    async fn verify(&self, driver: &dyn PageDriver, _selector: &str) -> Result<bool> {
        Ok(driver.current_url().await? != self.0)
    }
}

/// The selector still matches an element.
pub struct ElementPresent;

#[async_trait]
impl Verifier for ElementPresent {
    async fn verify(&self, driver: &dyn PageDriver, selector: &str) -> Result<bool> {
        driver.selector_exists(selector).await
    }
}

/// For interactions with no observable postcondition (plain clicks,
/// key presses).
pub struct AlwaysPass;

#[async_trait]
impl Verifier for AlwaysPass {
    async fn verify(&self, _driver: &dyn PageDriver, _selector: &str) -> Result<bool> {
        Ok(true)
    }
}
