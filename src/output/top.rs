use std::io;

use crate::function::Function;
use crate::paths::worst_case;
use crate::state::State;


impl State
{
    ///
    /// Worst case over all roots, then every function with its own usage,
    /// heaviest first.
    ///
    pub fn output_top(&self, mut writer: impl io::Write) -> io::Result<()>
    {
        let worst = self.worst_paths();
        if let Some(max) = worst_case(&worst)
        {
            writeln!(writer, "{} MAX", max.total)?;
        }

        writeln!(writer, "Usage Function")?;

        let mut functions: Vec<&Function> = self.by_name();
        functions.sort_by(|a, b| b.stack_used.cmp(&a.stack_used));

        for func in functions
        {
            writeln!(writer, "{} {}", func.stack_used, rustc_demangle::demangle(&func.name))?;
        }
        Ok(())
    }
}


#[cfg(test)]
mod tests
{
    use super::*;

    #[test]
    fn heaviest_first()
    {
        let lines: Vec<String> = [
            "00000100 <main>:",
            "     100:\t0e 94 00 01 \tcall\t0x200\t; 0x200 <b>",
            "00000200 <b>:",
            "     200:\t0f 92       \tpush\tr0",
            "     202:\t0f 92       \tpush\tr1",
            "00000300 <a>:",
            "     300:\t0f 92       \tpush\tr0",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();
        let mut s = State::empty();
        s.analyse(&lines);

        let mut out = Vec::new();
        s.output_top(&mut out).unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "6 MAX\nUsage Function\n2 b\n1 a\n0 main\n"
        );
    }
}
