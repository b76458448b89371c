use std::{
    io,
    io::Write as _, // to get write_fmt, granting writeln!
};

use crate::paths::worst_case;
use crate::state::State;
use crate::output::escaper::Escaper;
use crate::RETURN_ADDRESS_BYTES;



impl State
{
    ///
    /// Graphviz call graph. Roots carry their worst case, functions with
    /// unresolved call targets are dashed, recursion cycles are clustered.
    ///
    pub fn output_dot(&self, mut writer: impl io::Write, dc: DotConf) -> io::Result<()>
    {
        writeln!(writer, "digraph {{")?;
        writeln!(writer, "    node [fontname={} shape=box]", &dc.font)?;

        for func in self.functions.values()
        {
            write!(writer, "    n{:x} [label=\"", func.start_address)?;

            let mut esc = Escaper::new(&mut writer);
            write!(esc, "{:#}", rustc_demangle::demangle(&func.name))?;

            if self.roots.contains(&func.start_address)
            {
                if let Some(max) = worst_case(&self.call_graphs(func.start_address))
                {
                    write!(writer, "\\nmax = {}", max.total)?;
                }
            }

            write!(writer, "\\nlocal = {}\"", func.stack_used + RETURN_ADDRESS_BYTES)?;

            if func.callees.len() != func.call_addresses.len()
            {
                write!(writer, " style=dashed")?;
            }

            writeln!(writer, "]")?;
        }

        for (caller, callee, _) in self.g.all_edges()
        {
            writeln!(writer, "    n{:x} -> n{:x}", caller, callee)?;
        }

        for (i, cycle) in self.cycles.iter().enumerate()
        {
            writeln!(writer, "\n    subgraph cluster_{} {{", i)?;
            writeln!(writer, "        style=dashed")?;
            writeln!(writer, "        fontname={}", &dc.font)?;
            writeln!(writer, "        label=\"SCC{}\"", i)?;

            for node in cycle
            {
                writeln!(writer, "        n{:x}", node)?;
            }

            writeln!(writer, "    }}")?;
        }

        writeln!(writer, "}}")?;

        Ok(())
    }
}



pub struct DotConf
{
    pub font: String,
}

impl DotConf
{
    pub fn default() -> Self
    {
        DotConf
        {
            font: "monospace".to_string(),
        }
    }
}
