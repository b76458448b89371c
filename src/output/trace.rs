use std::io;

use crate::trace::{Trace, TraceConf};


impl Trace
{
    pub fn output_report(&self, mut writer: impl io::Write, conf: &TraceConf) -> io::Result<()>
    {
        writeln!(writer)?;
        writeln!(writer, " ================== Stack Trace =================")?;
        writeln!(writer, "SP: {:04X} ({})", self.stack_pointer, self.stack_pointer)?;
        writeln!(writer)?;

        for frame in &self.frames
        {
            writeln!(writer, "{} : 0x{:04X}", frame.name, frame.return_address)?;
        }
        if let Some(address) = self.unresolved
        {
            writeln!(writer, "? : 0x{:04X} (no function)", address)?;
        }
        writeln!(writer)?;

        let r = self.reconcile(conf);
        if r.is_complete()
        {
            writeln!(writer, "All stack accounted for ({})", r.total)?;
        }
        else
        {
            writeln!(writer, "Stack accounted: {}", r.accounted)?;
            writeln!(writer, "Total stack    : {}", r.total)?;
            writeln!(writer, "Unaccounted    : {}", r.unaccounted())?;
        }

        writeln!(writer)?;
        writeln!(writer, " ================== =========== =================")?;
        writeln!(writer)?;
        Ok(())
    }
}


#[cfg(test)]
mod tests
{
    use super::*;
    use crate::trace::StackDumpFrame;

    fn frame(name: &str, return_address: u32, bytes: i64) -> StackDumpFrame
    {
        StackDumpFrame
        {
            start_address: 0,
            name:          name.to_string(),
            return_address,
            bytes,
        }
    }

    #[test]
    fn accounted_stack()
    {
        let trace = Trace
        {
            stack_pointer: 0x08F8,
            frames:        vec![frame("worker", 0x206, 1), frame("main", 0x108, 2)],
            ..Trace::default()
        };
        let mut out = Vec::new();
        trace.output_report(&mut out, &TraceConf::default()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("SP: 08F8 (2296)\n"));
        assert!(text.contains("\nworker : 0x0206\nmain : 0x0108\n"));
        assert!(text.contains("All stack accounted for (7)"));
    }

    #[test]
    fn residue()
    {
        let trace = Trace
        {
            stack_pointer: 0x08F0,
            frames:        vec![frame("main", 0x104, 0)],
            unresolved:    Some(0x20),
            ..Trace::default()
        };
        let mut out = Vec::new();
        trace.output_report(&mut out, &TraceConf::default()).unwrap();
        let text = String::from_utf8(out).unwrap();

        assert!(text.contains("? : 0x0020 (no function)"));
        assert!(text.contains("Stack accounted: 2\nTotal stack    : 15\nUnaccounted    : 13\n"));
    }
}
