//! KPC instruction, pseudoinstruction and command signatures

use super::server::{Hover, MarkupContent, ParameterInformation, SignatureHelp, SignatureInformation};
use crate::resolve::document::{floor_char_boundary, Document, Position};
use regex::Regex;
use std::sync::LazyLock;

static MNEMONIC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[A-Za-z]+\s+").expect("mnemonic regex"));
static WHITESPACE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"\s+").expect("whitespace regex"));

/// Operand classes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TokenClass {
    None,
    Identifier,
    Register,
    Number,
    Char,
    String,
    Label,
    Region,
    Command,
}

impl TokenClass {
    pub fn as_str(self) -> &'static str {
        match self {
            TokenClass::None => "None",
            TokenClass::Identifier => "Identifier",
            TokenClass::Register => "Register",
            TokenClass::Number => "Number",
            TokenClass::Char => "Char",
            TokenClass::String => "String",
            TokenClass::Label => "Label",
            TokenClass::Region => "Region",
            TokenClass::Command => "Command",
        }
    }
}

/// Signature kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SignatureKind {
    Instruction,
    Pseudoinstruction,
    Command,
}

/// A mnemonic and the classes of its operands
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Signature {
    pub name: &'static str,
    pub kind: SignatureKind,
    pub arguments: &'static [TokenClass],
}

const fn instruction(name: &'static str, arguments: &'static [TokenClass]) -> Signature {
    Signature {
        name,
        kind: SignatureKind::Instruction,
        arguments,
    }
}

const fn pseudo(name: &'static str, arguments: &'static [TokenClass]) -> Signature {
    Signature {
        name,
        kind: SignatureKind::Pseudoinstruction,
        arguments,
    }
}

const fn command(name: &'static str, arguments: &'static [TokenClass]) -> Signature {
    Signature {
        name,
        kind: SignatureKind::Command,
        arguments,
    }
}

use self::TokenClass::{Identifier as Idt, Number as Num, Register as Reg, String as Str};

/// Every known signature
pub static SIGNATURES: &[Signature] = &[
    // instructions
    instruction("Nop", &[]),
    instruction("Irrex", &[Num]),
    instruction("Irrret", &[]),
    instruction("Irren", &[]),
    instruction("Irrdis", &[]),
    instruction("Jr", &[Reg]),
    instruction("Jro", &[Reg, Reg]),
    instruction("Jas", &[Reg, Reg]),
    instruction("JpcaddI", &[Num]),
    instruction("JpcsubI", &[Num]),
    instruction("Lbrom", &[Reg, Reg]),
    instruction("Lbromo", &[Reg, Reg, Reg]),
    instruction("Lwrom", &[Reg, Reg]),
    instruction("Lwromo", &[Reg, Reg, Reg]),
    instruction("Lbram", &[Reg, Reg]),
    instruction("Lbramo", &[Reg, Reg, Reg]),
    instruction("Lwram", &[Reg, Reg]),
    instruction("Lwramo", &[Reg, Reg, Reg]),
    instruction("Popb", &[Reg, Reg]),
    instruction("Popw", &[Reg, Reg]),
    instruction("Lbext", &[Reg, Reg]),
    instruction("Not", &[Reg, Reg, Reg]),
    instruction("Or", &[Reg, Reg, Reg]),
    instruction("And", &[Reg, Reg, Reg]),
    instruction("Xor", &[Reg, Reg, Reg]),
    instruction("Sll", &[Reg, Reg, Reg]),
    instruction("Srl", &[Reg, Reg, Reg]),
    instruction("Add", &[Reg, Reg, Reg]),
    instruction("AddI", &[Reg, Num]),
    instruction("Sub", &[Reg, Reg, Reg]),
    instruction("SubI", &[Reg, Num]),
    instruction("Addw", &[Reg, Reg, Reg]),
    instruction("Negw", &[Reg, Reg]),
    instruction("Set", &[Reg, Reg]),
    instruction("SetI", &[Reg, Num]),
    instruction("Seth", &[Reg, Reg]),
    instruction("SethI", &[Reg, Num]),
    instruction("Setw", &[Reg, Reg]),
    instruction("Setloh", &[Reg, Reg]),
    instruction("Swap", &[Reg, Reg]),
    instruction("Swaph", &[Reg, Reg]),
    instruction("Swapw", &[Reg, Reg]),
    instruction("Swaploh", &[Reg, Reg]),
    instruction("Sbram", &[Reg, Reg]),
    instruction("SbramI", &[Reg, Num]),
    instruction("Sbramo", &[Reg, Reg, Reg]),
    instruction("Swram", &[Reg, Reg]),
    instruction("Swramo", &[Reg, Reg, Reg]),
    instruction("Pushb", &[Reg, Reg]),
    instruction("Pushw", &[Reg, Reg]),
    instruction("Sbext", &[Reg, Reg]),
    instruction("Jwz", &[Reg, Reg]),
    instruction("Jwnotz", &[Reg, Reg]),
    instruction("Jwn", &[Reg, Reg]),
    instruction("Jwnotn", &[Reg, Reg]),
    instruction("Jzf", &[Reg]),
    instruction("Jnf", &[Reg]),
    instruction("Jcf", &[Reg]),
    instruction("Jof", &[Reg]),

    // pseudoinstructions
    pseudo("PushbI", &[Num, Reg]),
    pseudo("PushwI", &[Num, Reg]),
    pseudo("SbextI", &[Reg, Num]),
    pseudo("SbramoI", &[Reg, Reg, Num]),
    pseudo("SwramI", &[Reg, Num]),
    pseudo("SwramoI", &[Reg, Reg, Num]),
    pseudo("Getl", &[Reg, Idt]),
    pseudo("SetwI", &[Reg, Num]),
    pseudo("AddwI", &[Reg, Num]),
    pseudo("AndI", &[Reg, Num]),
    pseudo("AndwI", &[Reg, Num]),
    pseudo("Andw", &[Reg, Reg, Reg]),
    pseudo("CmpAndI", &[Reg, Num]),
    pseudo("CmpOrI", &[Reg, Num]),
    pseudo("CmpSubI", &[Reg, Num]),
    pseudo("CmpXorI", &[Reg, Num]),
    pseudo("Notw", &[Reg, Reg]),
    pseudo("OrI", &[Reg, Num]),
    pseudo("OrwI", &[Reg, Num]),
    pseudo("Orw", &[Reg, Reg, Reg]),
    pseudo("XorI", &[Reg, Num]),
    pseudo("XorwI", &[Reg, Num]),
    pseudo("Xorw", &[Reg, Reg, Reg]),
    pseudo("LbextI", &[Reg, Num]),
    pseudo("LbramI", &[Reg, Num]),
    pseudo("LbramoI", &[Reg, Reg, Num]),
    pseudo("LbromI", &[Reg, Num]),
    pseudo("LbromoI", &[Reg, Reg, Num]),
    pseudo("LwramI", &[Reg, Num]),
    pseudo("LwramoI", &[Reg, Reg, Num]),
    pseudo("LwromI", &[Reg, Num]),
    pseudo("LwromoI", &[Reg, Reg, Num]),
    pseudo("Jasl", &[Idt, Reg]),
    pseudo("Jcfl", &[Idt]),
    pseudo("Jl", &[Idt]),
    pseudo("Jnfl", &[Idt]),
    pseudo("Jofl", &[Idt]),
    pseudo("Jwnl", &[Reg, Idt]),
    pseudo("Jwnotnl", &[Reg, Idt]),
    pseudo("Jwnotzl", &[Reg, Idt]),
    pseudo("Jwzl", &[Reg, Idt]),
    pseudo("Jzfl", &[Idt]),

    // commands
    command("Ascii", &[Idt, Str]),
    command("Asciiz", &[Idt, Str]),
    command("Binfile", &[Idt, Num, Str]),
    command("DebugWrite", &[Str]),
    command("DefcolorHEX", &[Idt, Str]),
    command("DefcolorRGB", &[Idt, Num, Num, Num]),
    command("Defnum", &[Idt, Num]),
    command("Defreg", &[Idt, Reg]),
    command("ExportRegion", &[Idt]),
    command("InsertModule", &[Str]),
    command("SetAddress", &[Num]),
    command("SetModuleAddress", &[Num]),
];

impl Signature {
    /// Name as written in source
    pub fn display_name(&self) -> String {
        match self.kind {
            SignatureKind::Command => format!(".{}", self.name),
            _ => self.name.to_lowercase(),
        }
    }

    /// Placeholder name of argument `i`
    pub fn parameter_name(&self, i: usize) -> String {
        let class = match self.arguments.get(i) {
            Some(class) => *class,
            None => return String::new(),
        };
        let n = i + 1;
        match (self.kind, class) {
            (_, TokenClass::Register) => format!("reg{}", n),
            (SignatureKind::Instruction, TokenClass::Number) => "num".to_string(),
            (_, TokenClass::Number) => format!("num{}", n),
            (SignatureKind::Instruction, _) => format!("{}{}", class.as_str(), n),
            (_, TokenClass::Identifier) => format!("idt{}", n),
            (SignatureKind::Command, TokenClass::Char) => format!("chr{}", n),
            (SignatureKind::Command, TokenClass::String) => format!("str{}", n),
            _ => format!("{}{}", class.as_str(), n),
        }
    }

    /// `name param1 param2`, each parameter wrapped in `style`
    pub fn label(&self, style: &str) -> String {
        let mut parts = vec![self.display_name()];
        parts.extend((0..self.arguments.len()).map(|i| format!("{style}{}{style}", self.parameter_name(i))));
        parts.join(" ")
    }

    /// Long description, paragraphs separated by blank lines
    pub fn description(&self) -> Option<&'static str> {
        let name = self.name.to_lowercase();
        match self.kind {
            SignatureKind::Instruction => instruction_description(&name),
            SignatureKind::Command => command_description(&name),
            SignatureKind::Pseudoinstruction => None,
        }
    }

    /// Short one-line summary
    pub fn summary(&self) -> Option<&'static str> {
        self.description().and_then(|d| d.split("\n\n").next())
    }

    fn parameter_documentation(&self, i: usize) -> String {
        self.description()
            .and_then(|d| d.split("\n\n").nth(i + 2))
            .map(str::to_string)
            .unwrap_or_else(|| {
                let class = self.arguments.get(i).map(|c| c.as_str()).unwrap_or("None");
                format!("`{}` - *{}* parameter", self.parameter_name(i), class)
            })
    }

    fn information(&self, with_documentation: bool) -> SignatureInformation {
        let parameters = (0..self.arguments.len())
            .map(|i| {
                let mut doc = self.parameter_documentation(i);
                if with_documentation {
                    doc.push_str("\n\n***");
                }
                ParameterInformation {
                    label: self.parameter_name(i),
                    documentation: Some(MarkupContent::markdown(doc)),
                }
            })
            .collect();

        let documentation = with_documentation.then(|| {
            let label = self.label("`");
            MarkupContent::markdown(match self.description() {
                Some(details) => format!("### {} - {}", label, details),
                None => format!("### {}", label),
            })
        });

        SignatureInformation {
            label: self.label(""),
            documentation,
            parameters,
        }
    }
}

fn instruction_description(name: &str) -> Option<&'static str> {
    let description = match name {
        "nop" => "No operation\n\nIdles for 16 clock cycles",
        "lbrom" => "Load byte ROM\n\nLoads byte from ROM to a register at a given address\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value",
        "lbromo" => "Load byte ROM offset\n\nLoads byte from ROM to a register at a given address with specified offset\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value\n\n$r3 - Register containing 16-bit offset value",
        "lwrom" => "Load word ROM\n\nLoads word from ROM to a register at a given address\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value",
        "lwromo" => "Load word ROM offset\n\nLoads word from ROM to a register at a given address with specified offset\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value\n\n$r3 - Register containing 16-bit offset value",
        "lbram" => "Load byte RAM\n\nLoads byte from RAM to a register at a given address\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value",
        "lbramo" => "Load byte RAM offset\n\nLoads byte from RAM to a register at a given address with specified offset\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value\n\n$r3 - Register containing 16-bit offset value",
        "lwram" => "Load word RAM\n\nLoads word from RAM to a register at a given address\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value",
        "lwramo" => "Load word RAM offset\n\nLoads word from RAM to a register at a given address with specified offset\n\n$r1 - Destination register\n\n$r2 - Register containing 16-bit address value\n\n$r3 - Register containing 16-bit offset value",
        "popb" => "Pop byte",
        "popw" => "Pop word",
        "lbext" => "Load byte external",
        "sbram" => "Store byte RAM",
        "sbrami" => "Store byte RAM immediate",
        "sbramo" => "Store byte RAM offset",
        "swram" => "Store word RAM",
        "swramo" => "Store word RAM offset",
        "pushb" => "Push byte",
        "pushw" => "Push word",
        "sbext" => "Store byte external",
        "add" => "Add",
        "addi" => "Add immediate",
        "sub" => "Subtract",
        "subi" => "Subtract immediate",
        "addw" => "Add word with carry",
        "negw" => "Negate word with carry",
        "not" => "Bitwise NOT",
        "or" => "Bitwise OR",
        "and" => "Bitwise AND",
        "xor" => "Bitwise XOR",
        "sll" => "Shift left logical",
        "srl" => "Shift right logical",
        "set" => "Set",
        "seti" => "Set low immediate",
        "seth" => "Set high",
        "sethi" => "Set high immediate",
        "setw" => "Set word",
        "setloh" => "Set low to high and high to low",
        "swap" => "Swap low",
        "swaph" => "Swap high",
        "swapw" => "Swap word",
        "swaploh" => "Swap low with high and high with low",
        "jr" => "Jump register",
        "jro" => "Jump register offset",
        "jas" => "Jump and save",
        "jpcaddi" => "Jump program counter add immediate",
        "jpcsubi" => "Jump program counter sub immediate",
        "irrret" => "Interrupt return",
        "irren" => "Interrupt enable",
        "irrdis" => "Interrupt disable",
        "jwz" => "Jump word zero",
        "jwnotz" => "Jump word not zero",
        "jwn" => "Jump word negative",
        "jwnotn" => "Jump word not negative",
        "jzf" => "Jump zero flag (disable interrupts first!)",
        "jnf" => "Jump negative flag (disable interrupts first!)",
        "jcf" => "Jump carry flag (disable interrupts first!)",
        "jof" => "Jump overflow flag (disable interrupts first!)",
        _ => return None,
    };
    Some(description)
}

fn command_description(name: &str) -> Option<&'static str> {
    let description = match name {
        "setaddress" => "Set current ROM write address",
        "reserve" => "(not implemented)",
        "ascii" => "Write ASCII string to current ROM address",
        "asciiz" => "Write null terminated ('\\0') ASCII string to current ROM address",
        "defnum" => "Create an alias for a number",
        "defreg" => "Create an alias for a register",
        "defcolorrgb" => "Create an alias for RGB color value by providing RGB values",
        "defcolorhex" => "Create an alias for RGS color value by HEX code",
        "binfile" => "Write file content to current ROM address",
        "debugwrite" => "Write a debug string to debug console",
        "insertmodule" => "Insert module's source into current ROM address (imports module globally)",
        "exportregion" => "Make region public (visible to other modules)",
        _ => return None,
    };
    Some(description)
}

/// Case-insensitive signature lookup
pub fn find_signature(name: &str) -> Option<&'static Signature> {
    SIGNATURES.iter().find(|s| s.name.eq_ignore_ascii_case(name))
}

/// The signature being written at the cursor and which operand is active
///
/// Computed from the line alone, so completion can be handed the same
/// context signature help sees.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SignatureContext {
    pub signature: &'static Signature,
    pub active_argument: usize,
}

impl SignatureContext {
    /// Signature context for a cursor at `character` on `line`
    pub fn at(line: &str, character: usize) -> Option<Self> {
        let before = &line[..floor_char_boundary(line, character)];
        let mnemonic = MNEMONIC_RE.find(before)?.as_str().trim();
        let signature = find_signature(mnemonic)?;
        let runs = WHITESPACE_RE.find_iter(before.trim_start()).count();
        Some(Self {
            signature,
            active_argument: runs.saturating_sub(1),
        })
    }

    /// Token class the active operand expects, if the signature has one there
    pub fn expected_class(&self) -> Option<TokenClass> {
        self.signature.arguments.get(self.active_argument).copied()
    }

    pub fn help(&self) -> SignatureHelp {
        SignatureHelp {
            signatures: vec![self.signature.information(false)],
            active_signature: 0,
            active_parameter: self.active_argument as u32,
        }
    }
}

/// Signature help at `position`
pub fn signature_help(document: &Document, position: Position) -> Option<SignatureHelp> {
    let line = document.line_at(position.line as usize);
    SignatureContext::at(line, position.character as usize).map(|context| context.help())
}

/// The whitespace-delimited word containing byte `pos`
fn word_at(line: &str, pos: usize) -> Option<&str> {
    let pos = floor_char_boundary(line, pos);
    if line[pos..].chars().next().map_or(true, char::is_whitespace) {
        return None;
    }
    let start = line[..pos]
        .rfind(char::is_whitespace)
        .map(|i| i + line[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);
    let end = line[pos..]
        .find(char::is_whitespace)
        .map(|i| pos + i)
        .unwrap_or(line.len());
    Some(&line[start..end])
}

/// Documentation for the mnemonic or command under the cursor
pub fn signature_hover(document: &Document, position: Position) -> Option<Hover> {
    let line = document.line_at(position.line as usize);
    let word = word_at(line, position.character as usize)?;
    let word = word.strip_prefix('.').unwrap_or(word);
    let signature = find_signature(word)?;
    let documentation = signature.information(true).documentation?;
    Some(Hover {
        contents: documentation,
        range: None,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_table_size() {
        assert_eq!(SIGNATURES.len(), 113);
        let count = |kind| SIGNATURES.iter().filter(|s| s.kind == kind).count();
        assert_eq!(count(SignatureKind::Instruction), 59);
        assert_eq!(count(SignatureKind::Pseudoinstruction), 42);
        assert_eq!(count(SignatureKind::Command), 12);
    }

    #[test]
    fn test_labels() {
        assert_eq!(find_signature("ADDI").unwrap().label(""), "addi reg1 num");
        assert_eq!(find_signature("lbromoi").unwrap().label(""), "lbromoi reg1 reg2 num3");
        assert_eq!(find_signature("jwzl").unwrap().label(""), "jwzl reg1 idt2");
        assert_eq!(find_signature("binfile").unwrap().label(""), ".Binfile idt1 num2 str3");
        assert_eq!(find_signature("defreg").unwrap().label("`"), ".Defreg `idt1` `reg2`");
    }

    #[test]
    fn test_context_active_argument() {
        let ctx = SignatureContext::at("  addi $t1 ", 11).unwrap();
        assert_eq!(ctx.signature.name, "AddI");
        assert_eq!(ctx.active_argument, 1);
        assert_eq!(ctx.expected_class(), Some(TokenClass::Number));

        let first = SignatureContext::at("  jl ", 5).unwrap();
        assert_eq!(first.active_argument, 0);
        assert_eq!(first.expected_class(), Some(TokenClass::Identifier));

        // still typing the mnemonic
        assert!(SignatureContext::at("  add", 5).is_none());
        assert!(SignatureContext::at("  bogus $t1", 11).is_none());
    }

    #[test]
    fn test_context_past_last_argument() {
        let ctx = SignatureContext::at("jr $t1 $t2 ", 11).unwrap();
        assert_eq!(ctx.active_argument, 2);
        assert_eq!(ctx.expected_class(), None);
    }

    #[test]
    fn test_signature_help() {
        let doc = Document::new("file:///s.kpc", "  lbrom $t1 ");
        let help = signature_help(&doc, Position::new(0, 12)).unwrap();
        assert_eq!(help.active_parameter, 1);
        assert_eq!(help.signatures[0].label, "lbrom reg1 reg2");
        let params = &help.signatures[0].parameters;
        assert_eq!(
            params[0].documentation.as_ref().unwrap().value,
            "$r1 - Destination register"
        );
        assert!(help.signatures[0].documentation.is_none());
    }

    #[test]
    fn test_command_hover() {
        let doc = Document::new("file:///s.kpc", ".defnum one 1");
        let hover = signature_hover(&doc, Position::new(0, 2)).unwrap();
        assert_eq!(
            hover.contents.value,
            "### .Defnum `idt1` `num2` - Create an alias for a number"
        );
        assert!(signature_hover(&doc, Position::new(0, 7)).is_none());
    }

    #[test]
    fn test_word_at() {
        assert_eq!(word_at("  addi $t1 one", 3), Some("addi"));
        assert_eq!(word_at("  addi $t1 one", 13), Some("one"));
        assert_eq!(word_at("  addi $t1 one", 1), None);
        assert_eq!(word_at("  addi", 10), None);
    }
}
