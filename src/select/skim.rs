use std::io;

use skim::prelude::{SkimItemReader, SkimOptionsBuilder};
use skim::Skim;

use crate::select::SelectItem;

pub struct SkimSelector;

impl SelectItem for SkimSelector {
    fn select_item(&self, prompt: &str, items: &[String]) -> anyhow::Result<Option<String>> {
        let item_reader = SkimItemReader::default();
        let items = item_reader.of_bufread(io::Cursor::new(items.join("\n")));

        let prompt = format!("{}> ", prompt);
        let options = SkimOptionsBuilder::default()
            .prompt(Some(prompt.as_str()))
            .reverse(true)
            .build()?;
        let selected = Skim::run_with(&options, Some(items))
            .and_then(|out| (!out.is_abort).then_some(out.selected_items))
            .unwrap_or_default();

        Ok(selected.into_iter().next().map(|x| x.output().to_string()))
    }
}
