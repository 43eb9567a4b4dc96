//! HTML `<select>` boxes.

use crate::element::WebElementWrapper;
use crate::locator::By;
use crate::result::{SpotError, SpotResult};

/// Façade over a `<select>` element and its options
#[derive(Debug, Clone)]
pub struct SpotSelectElement {
    wrapper: WebElementWrapper,
}

impl SpotSelectElement {
    /// Wrap a `<select>` element
    pub fn new(wrapper: WebElementWrapper) -> SpotResult<Self> {
        let tag = wrapper.tag_name()?;
        if tag != "select" {
            return Err(SpotError::invalid_state(format!(
                "expected a <select> element, found <{tag}>"
            )));
        }
        Ok(Self { wrapper })
    }

    /// Wrapped element
    #[must_use]
    pub const fn wrapper(&self) -> &WebElementWrapper {
        &self.wrapper
    }

    /// All options, in document order
    pub fn options(&self) -> SpotResult<Vec<WebElementWrapper>> {
        self.wrapper.find_elements(&By::tag_name("option"))
    }

    /// Texts of all options
    pub fn option_texts(&self) -> SpotResult<Vec<String>> {
        self.options()?.iter().map(WebElementWrapper::text).collect()
    }

    /// Number of options
    pub fn option_count(&self) -> SpotResult<usize> {
        Ok(self.options()?.len())
    }

    /// Whether several options may be selected
    pub fn is_multiple(&self) -> SpotResult<bool> {
        Ok(self.wrapper.attribute("multiple")?.is_some())
    }

    /// Text of the first selected option
    pub fn selected_option(&self) -> SpotResult<Option<String>> {
        for option in self.options()? {
            if option.is_selected()? {
                return Ok(Some(option.text()?));
            }
        }
        Ok(None)
    }

    /// Texts of all selected options
    pub fn selected_options(&self) -> SpotResult<Vec<String>> {
        let mut selected = Vec::new();
        for option in self.options()? {
            if option.is_selected()? {
                selected.push(option.text()?);
            }
        }
        Ok(selected)
    }

    /// Whether an option shows `text`
    pub fn has_option(&self, text: &str) -> SpotResult<bool> {
        Ok(self.option_texts()?.iter().any(|t| t == text))
    }

    /// Select the option showing `text`
    pub fn select_by_text(&self, text: &str) -> SpotResult<()> {
        let option = self.find_option(text, |option| Ok(option.text()? == text))?;
        self.choose(&option)
    }

    /// Select the option whose `value` is `value`
    pub fn select_by_value(&self, value: &str) -> SpotResult<()> {
        let option = self.find_option(value, |option| {
            Ok(option.attribute("value")?.as_deref() == Some(value))
        })?;
        self.choose(&option)
    }

    /// Select the option at `index`
    pub fn select_by_index(&self, index: usize) -> SpotResult<()> {
        let option = self
            .options()?
            .into_iter()
            .nth(index)
            .ok_or_else(|| SpotError::OptionNotFound {
                option: format!("#{index}"),
            })?;
        self.choose(&option)
    }

    /// Deselect every option of a multiple select
    pub fn deselect_all(&self) -> SpotResult<()> {
        if !self.is_multiple()? {
            return Err(SpotError::invalid_state(
                "only a multiple select can have all options deselected",
            ));
        }
        for option in self.options()? {
            if option.is_selected()? {
                option.click()?;
            }
        }
        let description = format!("{} to have no selection", self.wrapper.locator());
        self.wrapper
            .browser()
            .short_waiter()
            .until_true(&description, || Ok(self.selected_options()?.is_empty()))
            .map(|_| ())
    }

    fn find_option(
        &self,
        label: &str,
        mut matches: impl FnMut(&WebElementWrapper) -> SpotResult<bool>,
    ) -> SpotResult<WebElementWrapper> {
        for option in self.options()? {
            if matches(&option)? {
                return Ok(option);
            }
        }
        Err(SpotError::OptionNotFound {
            option: label.to_string(),
        })
    }

    fn choose(&self, option: &WebElementWrapper) -> SpotResult<()> {
        if option.is_selected()? {
            return Ok(());
        }
        tracing::debug!(select = %self.wrapper.locator(), index = option.index(), "selecting option");
        option.click()?;
        let description = format!("option #{} to be selected", option.index());
        self.wrapper
            .browser()
            .short_waiter()
            .until_true(&description, || option.is_selected())
            .map(|_| ())
    }
}
