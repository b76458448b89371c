use std::{
    fs::File,
    io::{self, BufRead as _, BufWriter, Write as _},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use clap::Parser;
use log::info;
use tracing_subscriber::{filter::LevelFilter, EnvFilter};

use avr_stack_lib as avr;
use avr::output::{DotConf, ReportConf};
use avr::trace::TraceConf;


/// AVR gcc stack analyser.
///
/// If --dir is specified, will analyse the most recent .S file in the
/// directory. If no output is specified, the output file will be
/// <source>_maxStacks.txt
#[derive(Parser, Debug)]
#[command(name = "avr-stack", version, about)]
struct Cli
{
    /// The assembly to analyse
    #[arg(value_name = "SOURCE", conflicts_with_all = ["source", "dir"])]
    file: Option<PathBuf>,

    /// The assembly to analyse
    #[arg(long, value_name = "SOURCE")]
    source: Option<PathBuf>,

    /// The directory that contains the file to analyse
    #[arg(long, value_name = "DIR")]
    dir: Option<PathBuf>,

    /// The output filename
    #[arg(long, value_name = "OUT")]
    out: Option<PathBuf>,

    /// The detailed output filename, every path sorted by stack use
    #[arg(long, value_name = "DETAILED")]
    detailed: Option<PathBuf>,

    /// Graphviz call graph output filename
    #[arg(long, value_name = "DOT")]
    dot: Option<PathBuf>,

    /// Print per-function stack usage to stdout
    #[arg(long)]
    top: bool,

    /// Hex stack dump to decode, `-` reads one line from stdin
    #[arg(long, value_name = "HEX")]
    trace: Option<String>,

    /// First address past the end of the stack (hex)
    #[arg(long, value_name = "ADDR", value_parser = parse_address, default_value = "900")]
    stack_end: u32,
}

fn parse_address(s: &str) -> Result<u32, std::num::ParseIntError>
{
    u32::from_str_radix(s.trim_start_matches("0x"), 16)
}


fn main() -> Result<()>
{
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::builder()
                .with_default_directive(LevelFilter::WARN.into())
                .from_env_lossy(),
        )
        .init();

    let cli = Cli::parse();

    let source = avr::input::select_source(cli.file.or(cli.source), cli.dir)?;
    info!("analysing {:?}", source);

    let lines = avr::input::read_lines(&source)
        .with_context(|| format!("reading {:?}", source))?;

    let mut s = avr::State::empty();
    s.analyse(&lines);

    let conf = ReportConf::default();

    let out = cli.out.unwrap_or_else(|| avr::input::default_output_path(&source));
    write_file(&out, |w| s.output_max_stacks(w, &conf))?;

    if let Some(detailed) = &cli.detailed
    {
        write_file(detailed, |w| s.output_detailed(w, &conf))?;
    }

    if let Some(dot) = &cli.dot
    {
        write_file(dot, |w| s.output_dot(w, DotConf::default()))?;
    }

    if cli.top
    {
        s.output_top(io::stdout().lock())?;
    }

    let dump = match cli.trace.as_deref()
    {
        Some("-") =>
        {
            let mut line = String::new();
            io::stdin().lock().read_line(&mut line)?;
            line
        }
        Some(hex) => hex.to_string(),
        None      => String::new(),
    };
    if dump.trim().is_empty()
    {
        return Ok(());
    }

    let trace = s.trace_hex(&dump).context("decoding the stack dump")?;
    trace.output_report(io::stdout().lock(), &TraceConf { stack_end: cli.stack_end })?;

    Ok(())
}

fn write_file(path: &Path, body: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>) -> Result<()>
{
    let file = File::create(path).with_context(|| format!("creating {:?}", path))?;
    let mut w = BufWriter::new(file);
    body(&mut w).with_context(|| format!("writing {:?}", path))?;
    w.flush()?;
    info!("wrote {:?}", path);
    Ok(())
}
