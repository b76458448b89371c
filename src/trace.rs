use std::collections::BTreeMap;

use hex::FromHexError;
use log::{info, warn};
use thiserror::Error;

use crate::analyser::{self, Diagnostic};
use crate::classify::Patterns;
use crate::function::Function;
use crate::state::State;
use crate::RETURN_ADDRESS_BYTES;


#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TraceError
{
        #[error("a stack dump needs an even number of characters (2 hex chars per byte), got {0}")]
        OddLength(usize),

        #[error("`{character}` at offset {offset} is not a hex digit")]
        BadHex { offset: usize, character: char },

        #[error("a stack dump of {0} bytes does not hold the stack pointer")]
        Truncated(usize),
}


pub struct TraceConf
{
    /// First address past the end of SRAM; the stack grows down from here.
    pub stack_end: u32,
}

impl TraceConf
{
    pub fn default() -> Self
    {
        TraceConf
        {
            stack_end: 0x900,
        }
    }
}


/// One live call frame, innermost first.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct StackDumpFrame
{
    pub start_address:  u32,
    pub name:           String,
    /// Byte address execution resumes at in this function.
    pub return_address: u32,
    /// Stack the function had claimed when it made the call.
    pub bytes:          i64,
}

#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Trace
{
    pub stack_pointer: u32,
    pub frames:        Vec<StackDumpFrame>,
    /// Return address that fell below every known function; decoding
    /// stopped there.
    pub unresolved:    Option<u32>,
    pub diagnostics:   Vec<Diagnostic>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Reconciliation
{
    pub accounted: i64,
    pub total:     i64,
}

impl Reconciliation
{
    pub fn unaccounted(&self) -> i64
    {
        self.total - self.accounted
    }

    pub fn is_complete(&self) -> bool
    {
        self.accounted == self.total
    }
}

impl Trace
{
    ///
    /// Compares the bytes explained by the frames (their own bytes plus a
    /// return address each) with the distance between the stack pointer and
    /// the end of the stack.
    ///
    pub fn reconcile(&self, conf: &TraceConf) -> Reconciliation
    {
        let accounted = self.frames
            .iter()
            .map(|frame| frame.bytes + RETURN_ADDRESS_BYTES)
            .sum();
        let total = i64::from(conf.stack_end) - i64::from(self.stack_pointer) - 1;
        Reconciliation { accounted, total }
    }
}


/// Two hex characters per byte, surrounding whitespace ignored.
pub fn parse_hex(text: &str) -> Result<Vec<u8>, TraceError>
{
    let text = text.trim();
    hex::decode(text).map_err(|e| match e
    {
        FromHexError::InvalidHexCharacter { c, index } => TraceError::BadHex { offset: index, character: c },
        FromHexError::OddLength
        | FromHexError::InvalidStringLength            => TraceError::OddLength(text.len()),
    })
}

///
/// Walks a raw stack dump.
///
/// The first two bytes are the stack pointer (low, high). Then follow return
/// addresses (high, low, in words) with the bytes each function had pushed or
/// reserved before making its call sitting right above them. A bounded pass
/// over the owning function tells how many of those to skip.
///
pub fn decode(patterns: &Patterns, functions: &BTreeMap<u32, Function>, dump: &[u8])
    -> Result<Trace, TraceError>
{
    if dump.len() < 2
    {
        return Err(TraceError::Truncated(dump.len()));
    }

    let mut trace = Trace
    {
        stack_pointer: u32::from(dump[1]) * 0x100 + u32::from(dump[0]),
        ..Trace::default()
    };

    let mut cur = 2;
    while cur + 2 <= dump.len()
    {
        // program counter is in words
        let return_address = (u32::from(dump[cur]) * 256 + u32::from(dump[cur + 1])) * 2;

        let func = match functions.range(..return_address).next_back()
        {
            Some((_, func)) => func,
            None            =>
            {
                warn!("no function below return address 0x{:04X}; trace stops here", return_address);
                trace.unresolved = Some(return_address);
                break;
            }
        };

        let (part, diagnostics) = analyser::analyse_part(patterns, func, return_address);
        trace.diagnostics.extend(diagnostics);

        info!("frame `{}` : 0x{:04X} ({} bytes)", part.name, return_address, part.stack_used);
        trace.frames.push(StackDumpFrame
        {
            start_address: func.start_address,
            name:          func.name.clone(),
            return_address,
            bytes:         part.stack_used,
        });

        let skipped = usize::try_from(part.stack_used.max(0)).unwrap_or(usize::MAX);
        cur = cur.saturating_add(2).saturating_add(skipped);
    }

    Ok(trace)
}


impl State
{
    pub fn trace(&self, dump: &[u8]) -> Result<Trace, TraceError>
    {
        decode(&self.patterns, &self.functions, dump)
    }

    pub fn trace_hex(&self, text: &str) -> Result<Trace, TraceError>
    {
        self.trace(&parse_hex(text)?)
    }
}


#[cfg(test)]
mod tests
{
    use super::*;

    fn label(address: u32, name: &str) -> String
    {
        format!("{:08x} <{}>:", address, name)
    }

    fn ins(address: u32, text: &str) -> String
    {
        format!("{:8x}:\t00 00       \t{}", address, text)
    }

    fn state(lines: Vec<String>) -> State
    {
        let mut s = State::empty();
        s.analyse(&lines);
        s
    }

    #[test]
    fn hex_text()
    {
        assert_eq!(parse_hex("f0080082").unwrap(), vec![0xf0, 0x08, 0x00, 0x82]);
        assert_eq!(parse_hex("F0\n").unwrap(), vec![0xf0]);
        assert_eq!(parse_hex("  ").unwrap(), Vec::<u8>::new());
        assert_eq!(parse_hex("f00").unwrap_err(), TraceError::OddLength(3));
        assert_eq!(
            parse_hex("f0zz").unwrap_err(),
            TraceError::BadHex { offset: 2, character: 'z' }
        );
        assert_eq!(parse_hex("+1").unwrap_err(), TraceError::BadHex { offset: 0, character: '+' });
        assert_eq!(parse_hex("f0 8").unwrap_err(), TraceError::BadHex { offset: 2, character: ' ' });
    }

    #[test]
    fn single_frame_before_any_push()
    {
        let s = state(vec![
            label(0x100, "a"),
            ins(0x100, "call\t0x200\t; 0x200 <b>"),
            ins(0x104, "push\tr2"),
            label(0x200, "b"),
            ins(0x200, "ret"),
        ]);

        // 0x104 / 2 = 0x82
        let trace = s.trace(&[0xf0, 0x08, 0x00, 0x82]).unwrap();
        assert_eq!(trace.stack_pointer, 0x08f0);
        assert_eq!(trace.frames, vec![StackDumpFrame
        {
            start_address:  0x100,
            name:           "a".to_string(),
            return_address: 0x104,
            bytes:          0,
        }]);
        assert_eq!(trace.unresolved, None);

        // the cataloged function is unchanged by the bounded pass
        assert_eq!(s.function(0x100).unwrap().stack_used, 1);
    }

    #[test]
    fn frames_are_walked_by_their_pushes()
    {
        let s = state(vec![
            label(0x100, "main"),
            ins(0x100, "push\tr28"),
            ins(0x102, "push\tr29"),
            ins(0x104, "call\t0x200\t; 0x200 <worker>"),
            ins(0x108, "rjmp\t.-2      \t; 0x108 <main+0x8>"),
            label(0x200, "worker"),
            ins(0x200, "push\tr16"),
            ins(0x202, "call\t0x300\t; 0x300 <leaf>"),
            ins(0x206, "pop\tr16"),
            ins(0x208, "ret"),
            label(0x300, "leaf"),
            ins(0x300, "ret"),
        ]);

        let dump = parse_hex(concat!(
            "F808",     // SP = 0x08F8
            "0103",     // into worker at 0x206
            "AA",       // r16
            "0084",     // into main at 0x108
            "BBCC",     // r28, r29
        )).unwrap();
        let trace = s.trace(&dump).unwrap();

        let walked: Vec<(&str, u32, i64)> = trace.frames
            .iter()
            .map(|f| (f.name.as_str(), f.return_address, f.bytes))
            .collect();
        assert_eq!(walked, vec![("worker", 0x206, 1), ("main", 0x108, 2)]);

        let r = trace.reconcile(&TraceConf { stack_end: 0x900 });
        assert_eq!(r, Reconciliation { accounted: 7, total: 7 });
        assert!(r.is_complete());
    }

    #[test]
    fn residue_is_reported()
    {
        let s = state(vec![
            label(0x100, "main"),
            ins(0x100, "call\t0x200\t; 0x200 <b>"),
            ins(0x104, "ret"),
        ]);
        let trace = s.trace_hex("F0080082").unwrap();
        let r = trace.reconcile(&TraceConf::default());
        assert_eq!(r.total, 0x900 - 0x8f0 - 1);
        assert_eq!(r.accounted, 2);
        assert_eq!(r.unaccounted(), 13);
        assert!(!r.is_complete());
    }

    #[test]
    fn address_below_every_function_stops_the_walk()
    {
        let s = state(vec![label(0x100, "main"), ins(0x100, "ret")]);
        let trace = s.trace(&[0xf0, 0x08, 0x00, 0x10, 0x00, 0x81]).unwrap();
        assert!(trace.frames.is_empty());
        assert_eq!(trace.unresolved, Some(0x20));
    }

    #[test]
    fn trailing_odd_byte_is_ignored()
    {
        let s = state(vec![label(0x100, "main"), ins(0x100, "ret")]);
        let trace = s.trace(&[0xf0, 0x08, 0x00, 0x81, 0x00]).unwrap();
        assert_eq!(trace.frames.len(), 1);
        assert_eq!(trace.frames[0].return_address, 0x102);
    }

    #[test]
    fn malformed_dumps_are_fatal()
    {
        let s = state(vec![label(0x100, "main"), ins(0x100, "ret")]);
        assert_eq!(s.trace_hex("F0080").unwrap_err(), TraceError::OddLength(5));
        assert_eq!(s.trace(&[0xf0]).unwrap_err(), TraceError::Truncated(1));
    }
}
