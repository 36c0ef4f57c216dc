pub mod skim;

/// Lets the operator pick one of `items`. `Ok(None)` means nothing was chosen.
pub trait SelectItem {
    fn select_item(&self, prompt: &str, items: &[String]) -> anyhow::Result<Option<String>>;

    /// The name the operator asked for up front, if any.
    fn preselected(&self) -> Option<&str> {
        None
    }
}

/// Selects a name given up front, typically from the command line.
pub struct StaticSelector {
    name: String,
}

impl<S: Into<String>> From<S> for StaticSelector {
    fn from(name: S) -> Self {
        StaticSelector { name: name.into() }
    }
}

impl SelectItem for StaticSelector {
    fn select_item(&self, prompt: &str, items: &[String]) -> anyhow::Result<Option<String>> {
        if items.contains(&self.name) {
            Ok(Some(self.name.clone()))
        } else {
            Err(anyhow::anyhow!(
                "{} \"{}\" is not available. candidates:{}",
                prompt,
                self.name,
                items.join(",")
            ))
        }
    }

    fn preselected(&self) -> Option<&str> {
        Some(self.name.as_str())
    }
}
