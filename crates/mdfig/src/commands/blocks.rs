//! `mdfig blocks` command implementation.

use std::path::PathBuf;

use clap::Args;
use mdfig_diagrams::{ProcessError, extract_blocks};

use crate::error::CliError;
use crate::output::Output;

/// Arguments for the blocks command.
#[derive(Args)]
pub(crate) struct BlocksArgs {
    /// Markdown file to inspect.
    input: PathBuf,
}

impl BlocksArgs {
    /// Execute the blocks command.
    ///
    /// # Errors
    ///
    /// Returns an error if the input is missing or cannot be read.
    pub(crate) fn execute(self) -> Result<(), CliError> {
        let output = Output::new();

        if !self.input.is_file() {
            return Err(ProcessError::InputMissing(self.input).into());
        }
        let document =
            std::fs::read_to_string(&self.input).map_err(|source| ProcessError::Read {
                path: self.input.clone(),
                source,
            })?;
        let blocks = extract_blocks(&document);

        if blocks.is_empty() {
            output.info(&format!("No Mermaid blocks in {}", self.input.display()));
            return Ok(());
        }

        output.highlight(&format!(
            "{} Mermaid block(s) in {}",
            blocks.len(),
            self.input.display()
        ));
        for block in &blocks {
            output.block(
                block.line,
                block.label.display(),
                &block.label.image_file_name(),
            );
        }

        Ok(())
    }
}
