use std::collections::BTreeSet;
use std::fmt;

use once_cell::sync::OnceCell;
use regex::Regex;

use crate::SHORT_NAME_LENGTH;

///
/// One function of the disassembly, keyed by its start address.
///
/// `callees` stays empty until `State::analyse` has resolved
/// `call_addresses` after the full pass.
///
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Function
{
    pub name:              String,
    pub short_name:        String,
    pub start_address:     u32,

    /// Bytes of stack the function claims for itself, return address excluded.
    pub stack_used:        i64,
    /// Bytes reserved through stack pointer arithmetic or the save helper.
    pub manually_reserved: i64,

    /// Raw call and tail-jump targets, possibly unresolvable.
    pub call_addresses:    BTreeSet<u32>,
    /// Start addresses of the functions in `call_addresses` that exist.
    pub callees:           BTreeSet<u32>,

    /// Every line consumed while this function was current, label first.
    pub lines:             Vec<String>,
    /// Index of the label line in the buffer the function was parsed from.
    pub line_start:        usize,
}

impl Function
{
    pub fn new(name: &str, start_address: u32, line_start: usize) -> Self
    {
        Function
        {
            name:              name.to_string(),
            short_name:        short_name(name),
            start_address,
            stack_used:        0,
            manually_reserved: 0,
            call_addresses:    BTreeSet::new(),
            callees:           BTreeSet::new(),
            lines:             vec![],
            line_start,
        }
    }
}

impl fmt::Display for Function
{
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result
    {
        write!(
            f,
            "{} (stack: {} start: {:X} length: {})",
            self.name,
            self.stack_used,
            self.start_address,
            self.lines.len()
        )
    }
}


// up to and including the second run of digits
fn length_prefix() -> &'static Regex
{
    static PREFIX: OnceCell<Regex> = OnceCell::new();
    PREFIX.get_or_init(|| Regex::new(r"^([^\d]*\d+){2}").expect("BUG: malformed built-in pattern"))
}

///
/// Display name of at most [`SHORT_NAME_LENGTH`] characters.
///
/// Mangled names are demangled first. Long names lose the prefix up to and
/// including their second run of digits (the length prefixes of the
/// outermost path segments), and are then cut to length.
///
pub fn short_name(name: &str) -> String
{
    let demangled = format!("{:#}", rustc_demangle::demangle(name));
    let chars: Vec<char> = demangled.chars().collect();
    if chars.len() < SHORT_NAME_LENGTH
    {
        return demangled;
    }

    let mut trim_start = length_prefix()
        .find(&demangled)
        .map(|m| demangled[..m.end()].chars().count())
        .unwrap_or(0);
    if trim_start + SHORT_NAME_LENGTH > chars.len()
    {
        trim_start = chars.len() - SHORT_NAME_LENGTH;
    }

    chars[trim_start..trim_start + SHORT_NAME_LENGTH].iter().collect()
}
