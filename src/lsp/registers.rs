//! KPC registers

use super::server::{CompletionItem, Hover, MarkupContent, TextEdit};
use crate::resolve::document::{Document, Position};
use regex::Regex;
use std::sync::LazyLock;

static REGISTER_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"(?i)\B\$(zero|t4|sp|fp|t1|t2|t3|ass|s1|s2|s3|a1|a2|a3|rt|ra)").expect("register regex")
});
static PREFIX_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\$[A-Za-z0-9_]*").expect("register prefix regex"));

/// A register and its long name
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Register {
    pub mnemonic: &'static str,
    pub full_name: &'static str,
}

const fn reg(mnemonic: &'static str, full_name: &'static str) -> Register {
    Register {
        mnemonic,
        full_name,
    }
}

/// All sixteen registers, in encoding order
pub const REGISTERS: [Register; 16] = [
    reg("$zero", "Zero (readonly)"),
    reg("$t4", "Temporary 4"),
    reg("$sp", "Stack Pointer"),
    reg("$fp", "Frame Pointer"),
    reg("$t1", "Temporary 1"),
    reg("$t2", "Temporary 2"),
    reg("$t3", "Temporary 3"),
    reg("$ass", "Assembly (Reserved)"),
    reg("$s1", "Saved 1"),
    reg("$s2", "Saved 2"),
    reg("$s3", "Saved 3"),
    reg("$a1", "Argument 1"),
    reg("$a2", "Argument 2"),
    reg("$a3", "Argument 3"),
    reg("$rt", "Return (value)"),
    reg("$ra", "Return Address"),
];

/// Look up a register by mnemonic, `$` included, ignoring case
pub fn find_register(mnemonic: &str) -> Option<&'static Register> {
    REGISTERS.iter().find(|r| r.mnemonic.eq_ignore_ascii_case(mnemonic))
}

/// Hover for a register mnemonic under the cursor
pub fn register_hover(document: &Document, position: Position) -> Option<Hover> {
    let range = document.word_range_at(position, &REGISTER_RE)?;
    let register = find_register(document.text_in(range))?;
    Some(Hover {
        contents: MarkupContent::markdown(format!("`\t{}` - {}", register.mnemonic, register.full_name)),
        range: Some(range),
    })
}

/// Registers matching a `$` prefix at the cursor
pub fn register_completions(document: &Document, position: Position) -> Option<Vec<CompletionItem>> {
    let range = document.word_range_at(position, &PREFIX_RE)?;
    let prefix = document.text_in(range).to_lowercase();

    let items = REGISTERS
        .iter()
        .filter(|r| r.mnemonic.starts_with(&prefix))
        .map(|r| CompletionItem {
            label: r.mnemonic.to_string(),
            kind: Some(CompletionItem::VARIABLE),
            detail: Some(r.full_name.to_string()),
            text_edit: Some(TextEdit {
                range,
                new_text: r.mnemonic.to_string(),
            }),
            ..Default::default()
        })
        .collect();
    Some(items)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::resolve::document::Range;

    fn doc(line: &str) -> Document {
        Document::from_lines("file:///r.kpc", [line])
    }

    #[test]
    fn test_register_hover() {
        let hover = register_hover(&doc("  add $t1 $SP $zero"), Position::new(0, 8)).unwrap();
        assert_eq!(hover.contents.value, "`\t$t1` - Temporary 1");
        assert_eq!(hover.range, Some(Range::on_line(0, 6, 9)));

        let upper = register_hover(&doc("  add $t1 $SP $zero"), Position::new(0, 11)).unwrap();
        assert_eq!(upper.contents.value, "`\t$sp` - Stack Pointer");
    }

    #[test]
    fn test_no_hover_off_register() {
        assert!(register_hover(&doc("  add $t9 x"), Position::new(0, 7)).is_none());
        assert!(register_hover(&doc("  add $t1 x"), Position::new(0, 3)).is_none());
    }

    #[test]
    fn test_register_completions() {
        let items = register_completions(&doc("  add $s"), Position::new(0, 8)).unwrap();
        let labels: Vec<&str> = items.iter().map(|i| i.label.as_str()).collect();
        assert_eq!(labels, vec!["$sp", "$s1", "$s2", "$s3"]);
        assert_eq!(items[0].text_edit.as_ref().unwrap().range, Range::on_line(0, 6, 8));

        let all = register_completions(&doc("  add $"), Position::new(0, 7)).unwrap();
        assert_eq!(all.len(), 16);

        assert!(register_completions(&doc("  add t"), Position::new(0, 7)).is_none());
    }
}
