use std::io;

use crate::paths::StackPath;
use crate::state::State;


pub struct ReportConf
{
    /// Show the running total after each step.
    pub include_total: bool,
    /// Show each step's own contribution.
    pub include_used:  bool,
    /// One step per line instead of `a >> b >> c`.
    pub multi_line:    bool,
}

impl ReportConf
{
    pub fn default() -> Self
    {
        ReportConf
        {
            include_total: true,
            include_used:  true,
            multi_line:    true,
        }
    }
}


impl StackPath
{
    /// `main (+5 = 5)`, one entry per step, joined per `conf`.
    pub fn describe(&self, conf: &ReportConf) -> String
    {
        let separator = if conf.multi_line { "\n       " } else { " >> " };
        let last = self.steps.len().saturating_sub(1);

        self.steps
            .iter()
            .enumerate()
            .map(|(i, step)|
            {
                let total = if conf.include_total { format!(" = {}", step.running_total) } else { String::new() };
                let used = if conf.include_used { format!(" (+{}{})", step.contribution, total) } else { String::new() };
                let cutoff = if self.recursion && i == last { " <RECURSION>" } else { "" };
                format!("{}{}{}", step.name, used, cutoff)
            })
            .collect::<Vec<_>>()
            .join(separator)
    }
}


fn write_paths(mut writer: impl io::Write, paths: &[StackPath], conf: &ReportConf) -> io::Result<()>
{
    for path in paths
    {
        writeln!(writer, "{} : {}", path.total, path.describe(conf))?;
    }
    Ok(())
}

impl State
{
    /// Worst path per root, largest first.
    pub fn output_max_stacks(&self, writer: impl io::Write, conf: &ReportConf) -> io::Result<()>
    {
        write_paths(writer, &self.worst_paths(), conf)
    }

    /// Every path of every root, largest first.
    pub fn output_detailed(&self, writer: impl io::Write, conf: &ReportConf) -> io::Result<()>
    {
        write_paths(writer, &self.all_paths(), conf)
    }
}
