/*      ██████╗██╗      █████╗ ███████╗███████╗██╗███████╗██╗   ██╗     */
/*     ██╔════╝██║     ██╔══██╗██╔════╝██╔════╝██║██╔════╝╚██╗ ██╔╝     */
/*     ██║     ██║     ███████║███████╗███████╗██║█████╗   ╚████╔╝      */
/*     ██║     ██║     ██╔══██║╚════██║╚════██║██║██╔══╝    ╚██╔╝       */
/*     ╚██████╗███████╗██║  ██║███████║███████║██║██║        ██║        */
/*      ╚═════╝╚══════╝╚═╝  ╚═╝╚══════╝╚══════╝╚═╝╚═╝        ╚═╝        */
/*     ██████████████████████████████████████████████████████████╗      */
/*     ╚═════════════════════════════════════════════════════════╝      */

use regex::{Captures, Regex};

use crate::analyser::LineFault;
use crate::RELEASE_INVERSION;

/// Name of the runtime helper that pushes the call-saved registers and
/// sets up the frame (`-mcall-prologues`).
pub const SAVE_HELPER: &str = "__prologue_saves__";

/// Mirror of [`SAVE_HELPER`], pops the registers and releases the frame.
pub const RESTORE_HELPER: &str = "__epilogue_restores__";

// `  1a4:	0f 92       	push	r0`
const LINE_START: &str = r"^\s*(?P<address>[\da-fA-F]+):(\s+[\da-fA-F]{2}){2,4}\s+";

// absolute (`0x1f4`) or pc relative (`.+12`, `.-6`) operand
const TARGET: &str = r"((0x[\da-fA-F]+)|(\.[+-]\d+))";


/// What a single line of disassembly turned out to be.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Shape
{
    /// `000001a4 <main>:`
    FunctionStart { name: String },
    Push,
    Pop,
    /// `rcall .+0`, only pushes a return address.
    SelfCall,
    Call { dest: u32 },
    /// Jump into [`SAVE_HELPER`], `offset` is the `+0x..` suffix.
    SaveHelper { offset: u32 },
    RestoreHelper { offset: u32 },
    /// Low byte subtract on the frame pointer, the first instruction of a
    /// stack pointer update. See [`Patterns::stack_adjustment`].
    StackPointerLow { amount: u8 },
    /// Jump to a label belonging to another function.
    OutsideJump { dest: u32, name: String, offset: Option<u32> },
    /// Any other instruction.
    Instruction,
    /// Source, blank lines, section headers; carries no address.
    Text,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Line
{
    /// Instruction address, or the label address of a function start.
    pub address: Option<u32>,
    pub shape:   Shape,
}

/// Load of the frame size into `r26`/`r27` ahead of a [`SAVE_HELPER`] jump.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FrameSizeLoad
{
    Low(u32),
    High(u32),
}

/// A complete two-step, interrupt safe stack pointer update.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum StackAdjustment
{
    /// Frame grows by this many bytes.
    Decrement(u32),
    /// Frame shrinks by this many bytes (already inverted).
    Increment(u32),
}


///
/// Compiled pattern table.
///
/// Build it once and hand out references; classification itself keeps no
/// state between calls.
///
#[derive(Clone, Debug)]
pub struct Patterns
{
    instruction:     Regex,
    function_start:  Regex,
    push:            Regex,
    pop:             Regex,
    self_call:       Regex,
    call:            Regex,
    save_helper:     Regex,
    restore_helper:  Regex,
    frame_size_load: Regex,
    sp_low:          Regex,
    sp_high_carry:   Regex,
    sp_high:         Regex,
    footer:          [Regex; 3],
    outside_jump:    Regex,
}

fn compile(body: &str) -> Regex
{
    Regex::new(&format!("{}{}", LINE_START, body)).expect("BUG: malformed built-in pattern")
}

fn helper_jump(helper: &str) -> Regex
{
    compile(&format!(
        r"r?jmp\s+{}\s*;\s*0x[\da-fA-F]+\s*<{}(\+0x(?P<offset>[\da-fA-F]+))?>",
        TARGET, helper
    ))
}

fn hex(caps: &Captures, group: &str) -> Result<Option<u32>, LineFault>
{
    match caps.name(group)
    {
        Some(m) => Ok(Some(u32::from_str_radix(m.as_str(), 16)?)),
        None    => Ok(None),
    }
}

impl Patterns
{
    pub fn new() -> Self
    {
        Patterns
        {
            instruction:     Regex::new(LINE_START).expect("BUG: malformed built-in pattern"),
            function_start:  Regex::new(r"^(?P<address>[\da-fA-F]+) <(?P<name>[\w\.]+)>:\s*$")
                                .expect("BUG: malformed built-in pattern"),
            push:            compile(r"push\s+r\d+\s*$"),
            pop:             compile(r"pop\s+r\d+\s*$"),
            self_call:       compile(r"rcall\s+\.\+0(\s|$)"),
            call:            compile(&format!(r"r?call\s+{}\s*;\s*0x(?P<dest>[\da-fA-F]+)", TARGET)),
            save_helper:     helper_jump(SAVE_HELPER),
            restore_helper:  helper_jump(RESTORE_HELPER),
            frame_size_load: compile(r"ldi\s+r2((?P<low>6)|(?P<high>7)),\s+0x[\da-fA-F]+\s*;\s*(?P<amount>\d+)"),
            sp_low:          compile(r"su?biw?\s+r28,\s+0x[\da-fA-F]+\s*;\s*(?P<amount>\d+)"),
            sp_high_carry:   compile(r"sbc\s+r29,\s+r1\b"),
            sp_high:         compile(r"sbci\s+r29,\s+0x[\da-fA-F]+\s*;\s*(?P<amount>\d+)"),
            footer:          [
                                 compile(r"in\s+r0,\s+0x3f\b"),
                                 compile(r"cli\b"),
                                 compile(r"out\s+0x3e,\s+r29\b"),
                             ],
            outside_jump:    compile(&format!(
                                 r"r?jmp\s+{}\s*;\s*0x(?P<dest>[\da-fA-F]+)\s*<(?P<name>[\w\.]+)(\+0x(?P<offset>[\da-fA-F]+))?>",
                                 TARGET
                             )),
        }
    }

    /// Address of an instruction line, `None` for labels and free text.
    pub fn instruction_address(&self, text: &str) -> Result<Option<u32>, LineFault>
    {
        match self.instruction.captures(text)
        {
            Some(caps) => hex(&caps, "address"),
            None       => Ok(None),
        }
    }

    ///
    /// Classify one line. The first matching shape wins; the order matters
    /// where shapes overlap (`rcall .+0` is also a call, a helper jump is
    /// also a jump to another function).
    ///
    pub fn classify(&self, text: &str) -> Result<Line, LineFault>
    {
        if let Some(caps) = self.function_start.captures(text)
        {
            return Ok(Line
            {
                address: hex(&caps, "address")?,
                shape:   Shape::FunctionStart { name: caps["name"].to_string() },
            });
        }

        let address = match self.instruction_address(text)?
        {
            Some(address) => address,
            None          => return Ok(Line { address: None, shape: Shape::Text }),
        };

        let shape = if self.push.is_match(text)
        {
            Shape::Push
        }
        else if self.pop.is_match(text)
        {
            Shape::Pop
        }
        else if self.self_call.is_match(text)
        {
            Shape::SelfCall
        }
        else if let Some(caps) = self.call.captures(text)
        {
            Shape::Call { dest: hex(&caps, "dest")?.unwrap_or_default() }
        }
        else if let Some(caps) = self.save_helper.captures(text)
        {
            Shape::SaveHelper { offset: hex(&caps, "offset")?.unwrap_or(0) }
        }
        else if let Some(caps) = self.restore_helper.captures(text)
        {
            Shape::RestoreHelper { offset: hex(&caps, "offset")?.unwrap_or(0) }
        }
        else if let Some(caps) = self.sp_low.captures(text)
        {
            Shape::StackPointerLow { amount: caps["amount"].parse()? }
        }
        else if let Some(caps) = self.outside_jump.captures(text)
        {
            Shape::OutsideJump
            {
                dest:   hex(&caps, "dest")?.unwrap_or_default(),
                name:   caps["name"].to_string(),
                offset: hex(&caps, "offset")?,
            }
        }
        else
        {
            Shape::Instruction
        };

        Ok(Line { address: Some(address), shape })
    }

    pub fn frame_size_load(&self, text: &str) -> Result<Option<FrameSizeLoad>, LineFault>
    {
        let caps = match self.frame_size_load.captures(text)
        {
            Some(caps) => caps,
            None       => return Ok(None),
        };
        let amount: u32 = caps["amount"].parse()?;
        if caps.name("low").is_some()
        {
            Ok(Some(FrameSizeLoad::Low(amount)))
        }
        else
        {
            Ok(Some(FrameSizeLoad::High(amount)))
        }
    }

    ///
    /// Completes a stack pointer update whose first instruction is the
    /// [`Shape::StackPointerLow`] at `lines[idx]`.
    ///
    /// Lines without an address are skipped throughout. After the low byte an
    /// optional high byte follows (`sbc r29, r1` adds nothing, `sbci r29, N`
    /// adds `N * 256`), then the footer `in r0, 0x3f` / `cli` /
    /// `out 0x3e, r29` must follow. Without the footer this is plain
    /// arithmetic on `Y` and `None` is returned. Lines at or past `stop` are
    /// treated as missing.
    ///
    /// Combined values with the top bit set are the two's complement of an
    /// increment.
    ///
    pub fn stack_adjustment(&self, lines: &[String], idx: usize, stop: Option<u32>)
        -> Result<Option<StackAdjustment>, LineFault>
    {
        let low: u32 = match self.sp_low.captures(&lines[idx])
        {
            Some(caps) => u32::from(caps["amount"].parse::<u8>()?),
            None       => return Ok(None),
        };

        let mut i = idx + 1;
        let mut high: u32 = 0;

        i = match self.next_instruction(lines, i, stop)?
        {
            Some(next) => next,
            None       => return Ok(None),
        };
        if self.sp_high_carry.is_match(&lines[i])
        {
            i += 1;
        }
        else if let Some(caps) = self.sp_high.captures(&lines[i])
        {
            high = u32::from(caps["amount"].parse::<u8>()?);
            i += 1;
        }

        for required in &self.footer
        {
            i = match self.next_instruction(lines, i, stop)?
            {
                Some(next) => next,
                None       => return Ok(None),
            };
            if !required.is_match(&lines[i])
            {
                return Ok(None);
            }
            i += 1;
        }

        let combined = low + high * 256;
        if combined & 0x8000 == 0
        {
            Ok(Some(StackAdjustment::Decrement(combined)))
        }
        else
        {
            Ok(Some(StackAdjustment::Increment(RELEASE_INVERSION - combined)))
        }
    }

    // index of the first instruction line at or after `from` that lies before `stop`
    fn next_instruction(&self, lines: &[String], from: usize, stop: Option<u32>)
        -> Result<Option<usize>, LineFault>
    {
        for (i, text) in lines.iter().enumerate().skip(from)
        {
            if let Some(address) = self.instruction_address(text)?
            {
                return match stop
                {
                    Some(stop) if address >= stop => Ok(None),
                    _                             => Ok(Some(i)),
                };
            }
        }
        Ok(None)
    }
}

impl Default for Patterns
{
    fn default() -> Self
    {
        Patterns::new()
    }
}
