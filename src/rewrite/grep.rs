//! Grep-style preview of what each expression would touch.
//!
//! Output lines look like `path:LINE:MARK:text`, where `MARK` is one `_`
//! per expression index, so expression 0 has an empty mark.

use crate::error::GsrResult;
use crate::expr::{CompiledExpression, RewriteContext};

use super::lines::LineIndex;

/// One matched line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MatchRecord {
    pub filename: String,
    pub line_number: usize,
    pub expression_index: usize,
    pub line_text: String,
}

impl MatchRecord {
    pub fn render(&self) -> String {
        format!(
            "{}:{}:{}:{}",
            self.filename,
            self.line_number,
            "_".repeat(self.expression_index),
            self.line_text
        )
    }
}

/// Collect rendered match lines for one file, sorted as strings.
///
/// Each expression is matched against the content as left by all earlier
/// expressions, then applied before the next one runs.
pub fn grep_report(
    filename: &str,
    content: &str,
    expressions: &[CompiledExpression],
) -> GsrResult<Vec<String>> {
    let mut current = content.to_owned();
    let mut shown = Vec::new();

    for expression in expressions {
        {
            let index = LineIndex::new(&current);
            for found in expression.pattern.find_iter(&current) {
                let line_number = index.line_number(found.start());
                let record = MatchRecord {
                    filename: filename.to_owned(),
                    line_number,
                    expression_index: expression.index,
                    line_text: index.line(line_number).to_owned(),
                };
                shown.push(record.render());
            }
        }
        current = expression.apply(&current, RewriteContext::Content)?;
    }

    shown.sort();
    Ok(shown)
}
