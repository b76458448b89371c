//!
//! Worst-case stack depth of AVR firmware from its `avr-objdump -S`
//! listing, and symbolic decoding of raw stack dumps taken after a crash.
//!
//! ```no_run
//! use avr_stack_lib as avr;
//!
//! let lines = avr::input::read_lines("blink.S".as_ref()).unwrap();
//! let mut s = avr::State::empty();
//! s.analyse(&lines);
//! s.output_max_stacks(std::io::stdout().lock(), &avr::output::ReportConf::default()).unwrap();
//!
//! let trace = s.trace_hex("F0080082").unwrap();
//! trace.output_report(std::io::stdout().lock(), &avr::trace::TraceConf::default()).unwrap();
//! ```
//!

pub mod analyser;
pub mod classify;
pub mod function;
pub mod input;
pub mod output;
pub mod paths;
pub mod state;
pub mod trace;

pub use function::Function;
pub use paths::{PathStep, StackPath};
pub use state::State;
pub use trace::{StackDumpFrame, Trace};









/*       ██████╗ ██████╗ ███╗   ██╗███████╗████████╗███████╗     */
/*      ██╔════╝██╔═══██╗████╗  ██║██╔════╝╚══██╔══╝██╔════╝     */
/*      ██║     ██║   ██║██╔██╗ ██║███████╗   ██║   ███████╗     */
/*      ██║     ██║   ██║██║╚██╗██║╚════██║   ██║   ╚════██║     */
/*      ╚██████╗╚██████╔╝██║ ╚████║███████║   ██║   ███████║     */
/*       ╚═════╝ ╚═════╝ ╚═╝  ╚═══╝╚══════╝   ╚═╝   ╚══════╝     */
/*     ██████████████████████████████████████████████████████╗   */
/*     ╚═════════════════════════════════════════════════════╝   */

// The last three are read off avr-gcc's runtime helpers and its two-step
// stack pointer update. Don't tune them without a listing to check against.

/// Bytes a `call`/`rcall` pushes.
pub const RETURN_ADDRESS_BYTES: i64 = 2;

/// Stack pointer updates below this are ordinary arithmetic on `Y`, not a
/// frame reservation.
pub const BIG_FRAME_THRESHOLD: u32 = 1024;

/// Registers `__prologue_saves__` pushes when entered at offset 0. Each
/// skipped register moves the entry point 2 bytes further in.
pub const REGISTER_SAVE_BASELINE: i64 = 18;

/// A release is written as the 16 bit two's complement of the amount.
pub const RELEASE_INVERSION: u32 = 65536;

/// Width of display names in reports.
pub const SHORT_NAME_LENGTH: usize = 30;
