/*      █████╗ ███╗   ██╗ █████╗ ██╗  ██╗   ██╗███████╗███████╗██████╗      */
/*     ██╔══██╗████╗  ██║██╔══██╗██║  ╚██╗ ██╔╝██╔════╝██╔════╝██╔══██╗     */
/*     ███████║██╔██╗ ██║███████║██║   ╚████╔╝ ███████╗█████╗  ██████╔╝     */
/*     ██╔══██║██║╚██╗██║██╔══██║██║    ╚██╔╝  ╚════██║██╔══╝  ██╔══██╗     */
/*     ██║  ██║██║ ╚████║██║  ██║███████╗██║   ███████║███████╗██║  ██║     */
/*     ╚═╝  ╚═╝╚═╝  ╚═══╝╚═╝  ╚═╝╚══════╝╚═╝   ╚══════╝╚══════╝╚═╝  ╚═╝     */
/*     ████████████████████████████████████████████████████████████████╗    */
/*     ╚═══════════════════════════════════════════════════════════════╝    */

use std::collections::BTreeMap;
use std::num::ParseIntError;

use log::{trace, warn};
use thiserror::Error;

use crate::classify::{FrameSizeLoad, Patterns, Shape, StackAdjustment, RESTORE_HELPER, SAVE_HELPER};
use crate::function::Function;
use crate::{BIG_FRAME_THRESHOLD, REGISTER_SAVE_BASELINE};


///
/// Something wrong with a single line. The line's effect is dropped and the
/// pass carries on.
///
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LineFault
{
        #[error("malformed number: {0}")]
        Number(#[from] ParseIntError),

        #[error("no frame size load into r26/r27 ahead of the register save helper")]
        MissingFrameSize,

        #[error("reserving {reserved} bytes while {already} bytes are still reserved")]
        DoubleReservation { already: i64, reserved: i64 },

        #[error("function start 0x{0:X} seen twice")]
        DuplicateFunction(u32),
}

/// Anomalies met along the way. All of them are advisory.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Diagnostic
{
    /// `address` is that of the last instruction line seen, for label lines
    /// the one before them.
    LineFault { index: usize, address: u32, line: String, fault: LineFault },
    ReleaseMismatch { function: String, released: i64, reserved: i64 },
    OffsetTailCall { index: usize, function: String, destination: String },
    MissingFunction { caller: String, address: u32 },
}

/// What became of one line.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outcome
{
    Matched,
    Unmatched,
    Faulted(LineFault),
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode
{
    /// Whole listing, epilogues are only seen through the restore helper.
    Full,
    /// One function up to a stop address, releases included.
    Bounded,
}


///
/// Read position over a shared line buffer.
///
#[derive(Clone, Debug)]
pub struct Cursor<'a>
{
    lines:       &'a [String],
    pub index:   usize,
    /// Address of the last instruction line seen.
    pub address: u32,
    /// Exclusive, only set in bounded mode.
    pub stop:    Option<u32>,
}

impl<'a> Cursor<'a>
{
    pub fn new(lines: &'a [String], address: u32, stop: Option<u32>) -> Self
    {
        Cursor { lines, index: 0, address, stop }
    }

    pub fn line(&self) -> &'a str
    {
        &self.lines[self.index]
    }

    pub fn lines(&self) -> &'a [String]
    {
        self.lines
    }

    ///
    /// `Ok(false)` once the buffer is exhausted or the current line's address
    /// reached the stop address. Lines without an address never stop the
    /// cursor.
    ///
    fn can_continue(&mut self, patterns: &Patterns) -> Result<bool, LineFault>
    {
        if self.index >= self.lines.len()
        {
            return Ok(false);
        }
        if let Some(address) = patterns.instruction_address(self.line())?
        {
            self.address = address;
            if let Some(stop) = self.stop
            {
                if address >= stop
                {
                    return Ok(false);
                }
            }
        }
        Ok(true)
    }
}


/// Result of the full pass.
#[derive(Clone, Debug, Default)]
pub struct Catalog
{
    pub functions:   BTreeMap<u32, Function>,
    pub diagnostics: Vec<Diagnostic>,
}


///
/// Sequential, line by line state machine. Owns the function currently being
/// built, every consumed line is appended to it.
///
pub struct Analyser<'a>
{
    patterns:    &'a Patterns,
    mode:        Mode,
    cursor:      Cursor<'a>,
    current:     Option<Function>,
    functions:   BTreeMap<u32, Function>,
    diagnostics: Vec<Diagnostic>,
}

///
/// Full pass over a whole listing.
///
pub fn analyse(patterns: &Patterns, lines: &[String]) -> Catalog
{
    let mut a = Analyser
    {
        patterns,
        mode:        Mode::Full,
        cursor:      Cursor::new(lines, 0, None),
        current:     None,
        functions:   BTreeMap::new(),
        diagnostics: vec![],
    };
    a.run();

    if let Some(last) = a.current.take()
    {
        a.functions.insert(last.start_address, last);
    }

    Catalog
    {
        functions:   a.functions,
        diagnostics: a.diagnostics,
    }
}

///
/// Bounded pass: walks the saved lines of `function` again, releases and pops
/// included, and stops at the first instruction at or past `stop`.
///
/// Returns a fresh snapshot; `function` itself is never touched.
///
pub fn analyse_part(patterns: &Patterns, function: &Function, stop: u32) -> (Function, Vec<Diagnostic>)
{
    let mut a = Analyser
    {
        patterns,
        mode:        Mode::Bounded,
        cursor:      Cursor::new(&function.lines, function.start_address, Some(stop)),
        current:     None,
        functions:   BTreeMap::new(),
        diagnostics: vec![],
    };
    a.run();

    let snapshot = a.current
        .take()
        .unwrap_or_else(|| Function::new(&function.name, function.start_address, 0));
    (snapshot, a.diagnostics)
}

impl<'a> Analyser<'a>
{
    fn run(&mut self)
    {
        while self.step()
        {
            self.cursor.index += 1;
        }
    }

    fn step(&mut self) -> bool
    {
        let outcome = match self.cursor.can_continue(self.patterns)
        {
            Ok(false) => return false,
            Ok(true)  => self.analyse_line(),
            Err(e)    => Outcome::Faulted(e),
        };

        let text = self.cursor.line();
        if let Outcome::Faulted(fault) = outcome
        {
            warn!("line {} (0x{:X}): {} in `{}`", self.cursor.index, self.cursor.address, fault, text);
            self.diagnostics.push(Diagnostic::LineFault
            {
                index:   self.cursor.index,
                address: self.cursor.address,
                line:    text.to_string(),
                fault,
            });
        }

        if let Some(current) = &mut self.current
        {
            current.lines.push(text.to_string());
        }

        true
    }

    pub fn analyse_line(&mut self) -> Outcome
    {
        match self.try_line()
        {
            Ok(true)  => Outcome::Matched,
            Ok(false) => Outcome::Unmatched,
            Err(e)    => Outcome::Faulted(e),
        }
    }

    fn try_line(&mut self) -> Result<bool, LineFault>
    {
        let line = self.patterns.classify(self.cursor.line())?;

        if let Shape::FunctionStart { name } = &line.shape
        {
            return self.function_start(name, line.address.unwrap_or_default());
        }

        let mut current = match self.current.take()
        {
            Some(current) => current,
            None          => return Ok(false),
        };
        let matched = self.apply(&mut current, line.shape);
        self.current = Some(current);
        matched
    }

    fn function_start(&mut self, name: &str, address: u32) -> Result<bool, LineFault>
    {
        let current_start = self.current.as_ref().map(|f| f.start_address);
        if self.functions.contains_key(&address) || current_start == Some(address)
        {
            return Err(LineFault::DuplicateFunction(address));
        }

        if let Some(done) = self.current.take()
        {
            self.functions.insert(done.start_address, done);
        }
        trace!("function `{}` at 0x{:X}", name, address);
        self.current = Some(Function::new(name, address, self.cursor.index));
        Ok(true)
    }

    fn apply(&mut self, current: &mut Function, shape: Shape) -> Result<bool, LineFault>
    {
        let bounded = self.mode == Mode::Bounded;
        match shape
        {
            Shape::Push =>
            {
                current.stack_used += 1;
                Ok(true)
            }
            Shape::SelfCall =>
            {
                // return address only
                current.stack_used += 2;
                Ok(true)
            }
            Shape::SaveHelper { offset } => self.save_helper(current, offset),
            Shape::Call { dest } =>
            {
                current.call_addresses.insert(dest);
                Ok(true)
            }
            Shape::StackPointerLow { .. } => self.stack_pointer_update(current),
            Shape::OutsideJump { dest, name, offset } => Ok(self.outside_jump(current, dest, &name, offset)),
            Shape::Pop if bounded =>
            {
                current.stack_used -= 1;
                Ok(true)
            }
            Shape::RestoreHelper { .. } if bounded =>
            {
                current.stack_used -= current.manually_reserved;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    ///
    /// `ldi r26, lo` / `ldi r27, hi` hold the frame size; the helper pushes
    /// `18 - offset / 2` registers on top of it.
    ///
    fn save_helper(&self, current: &mut Function, offset: u32) -> Result<bool, LineFault>
    {
        let mut low:  Option<u32> = None;
        let mut high: Option<u32> = None;

        // nearest load wins, the label line is skipped
        for text in current.lines.iter().skip(1).rev()
        {
            if low.is_some() && high.is_some()
            {
                break;
            }
            match self.patterns.frame_size_load(text)?
            {
                Some(FrameSizeLoad::Low(n))  if low.is_none()  => low = Some(n),
                Some(FrameSizeLoad::High(n)) if high.is_none() => high = Some(n),
                _ => {}
            }
        }

        let (low, high) = match (low, high)
        {
            (Some(low), Some(high)) => (i64::from(low), i64::from(high)),
            _                       => return Err(LineFault::MissingFrameSize),
        };

        let reserved = low + high * 256 + (REGISTER_SAVE_BASELINE - i64::from(offset) / 2);
        reserve(current, reserved)
    }

    fn stack_pointer_update(&mut self, current: &mut Function) -> Result<bool, LineFault>
    {
        let adjustment = self.patterns.stack_adjustment(
            self.cursor.lines(),
            self.cursor.index,
            self.cursor.stop,
        )?;

        match adjustment
        {
            Some(StackAdjustment::Decrement(amount)) if amount >= BIG_FRAME_THRESHOLD =>
            {
                reserve(current, i64::from(amount))
            }
            Some(StackAdjustment::Increment(amount))
                if self.mode == Mode::Bounded && amount >= BIG_FRAME_THRESHOLD =>
            {
                let released = i64::from(amount);
                if released != current.manually_reserved
                {
                    warn!(
                        "function `{}` released {}, but only reserved {}",
                        current.name, released, current.manually_reserved
                    );
                    self.diagnostics.push(Diagnostic::ReleaseMismatch
                    {
                        function: current.name.clone(),
                        released,
                        reserved: current.manually_reserved,
                    });
                }
                current.stack_used -= released;
                current.manually_reserved = 0;
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    // a jump to another function's label is a tail call
    fn outside_jump(&mut self, current: &mut Function, dest: u32, name: &str, offset: Option<u32>) -> bool
    {
        if name == current.name || name == SAVE_HELPER || name == RESTORE_HELPER
        {
            return false;
        }

        if offset.map_or(false, |o| o != 0)
        {
            warn!(
                "{} : outside jump with offset: {} >> {}",
                self.cursor.index + 1, current.name, name
            );
            self.diagnostics.push(Diagnostic::OffsetTailCall
            {
                index:       self.cursor.index,
                function:    current.name.clone(),
                destination: name.to_string(),
            });
        }

        current.call_addresses.insert(dest);
        true
    }
}

fn reserve(current: &mut Function, amount: i64) -> Result<bool, LineFault>
{
    if current.manually_reserved != 0
    {
        return Err(LineFault::DoubleReservation
        {
            already:  current.manually_reserved,
            reserved: amount,
        });
    }
    current.stack_used += amount;
    current.manually_reserved = amount;
    Ok(true)
}
