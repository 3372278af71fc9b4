//! KPC document formatting
//!
//! Indentation follows nesting: module markers at level 0, regions at 1,
//! labels at 2, and everything else one level below the innermost marker.

use super::server::{FormattingOptions, TextEdit};
use crate::resolve::document::Document;

fn indentation(options: &FormattingOptions, level: usize) -> String {
    let unit = if options.insert_spaces {
        " ".repeat(options.tab_size as usize)
    } else {
        "\t".to_string()
    };
    unit.repeat(level)
}

/// Re-indent every line of `document`
pub fn format_text(document: &Document, options: &FormattingOptions) -> String {
    let (mut in_module, mut in_region, mut in_label) = (false, false, false);

    let lines: Vec<String> = document
        .lines()
        .map(|line| {
            let trimmed = line.trim();
            if trimmed.is_empty() {
                return String::new();
            }

            let level = if trimmed.starts_with("*@module") {
                in_module = true;
                in_region = false;
                in_label = false;
                0
            } else if trimmed.starts_with('*') || trimmed.starts_with(".exportregion") {
                in_region = true;
                in_label = false;
                1
            } else if trimmed.starts_with(':') {
                in_label = true;
                2
            } else if in_label {
                3
            } else if in_region {
                2
            } else if in_module {
                1
            } else {
                0
            };

            format!("{}{}", indentation(options, level), trimmed)
        })
        .collect();

    lines.join("\n")
}

/// Formatting edits for `document`: one whole-document replacement, or
/// nothing when it is already formatted
pub fn format_document(document: &Document, options: &FormattingOptions) -> Vec<TextEdit> {
    let formatted = format_text(document, options);
    if formatted == document.text() {
        return Vec::new();
    }
    vec![TextEdit {
        range: document.full_range(),
        new_text: formatted,
    }]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spaces(tab_size: u32) -> FormattingOptions {
        FormattingOptions {
            tab_size,
            insert_spaces: true,
        }
    }

    #[test]
    fn test_format_nesting() {
        let doc = Document::new(
            "file:///f.kpc",
            "*@module Math\n.defnum top 1\n*add\n:loop\naddi $t1 1   \n\n   *sub\nsub $t1 $t2 $t3\n",
        );
        assert_eq!(
            format_text(&doc, &spaces(2)),
            "*@module Math\n  .defnum top 1\n  *add\n    :loop\n      addi $t1 1\n\n  *sub\n    sub $t1 $t2 $t3"
        );
    }

    #[test]
    fn test_format_with_tabs() {
        let doc = Document::new("file:///f.kpc", "*r\n:l\nnop");
        let options = FormattingOptions {
            tab_size: 4,
            insert_spaces: false,
        };
        assert_eq!(format_text(&doc, &options), "\t*r\n\t\t:l\n\t\t\tnop");
    }

    #[test]
    fn test_format_document_single_edit() {
        let doc = Document::new("file:///f.kpc", "*@module M\n*r\nnop\n");
        let edits = format_document(&doc, &spaces(4));
        assert_eq!(edits.len(), 1);
        assert_eq!(edits[0].range, doc.full_range());
        assert_eq!(edits[0].new_text, "*@module M\n    *r\n        nop");
    }

    #[test]
    fn test_already_formatted() {
        let doc = Document::new("file:///f.kpc", "*@module M\n    *r\n        nop\n");
        assert!(format_document(&doc, &spaces(4)).is_empty());
    }
}
