use avr_stack_lib::{
    trace::{Reconciliation, TraceConf},
    State,
};


const BLINK: &str = include_str!("data/blink.S");

fn blink() -> State
{
    let lines: Vec<String> = BLINK.lines().map(str::to_string).collect();
    let mut s = State::empty();
    s.analyse(&lines);
    s
}

// Crash two levels deep in `fill`, reached through
// __ctors_end > main > setup > log_big.
fn crash_dump() -> Vec<u8>
{
    let mut dump = vec![0xE3, 0x04];            // SP = 0x04E3
    dump.extend([0x02, 0x46, 0x11]);            // fill+0xc, r16
    dump.extend([0x02, 0x46, 0x22]);            // fill+0xc, r16
    dump.extend([0x02, 0x0F]);                  // log_big+0x1e
    dump.extend(vec![0x55; 1026]);              //   buffer, r28, r29
    dump.extend([0x00, 0xB8]);                  // setup+0x10
    dump.extend([0x66; 8]);                     //   saved registers and locals
    dump.extend([0x00, 0xA7]);                  // main+0xe
    dump.extend([0x77; 4]);                     //   r28, r29, scratch word
    dump.extend([0x00, 0x3C]);                  // __ctors_end+0x10
    dump
}


#[test]
fn crash_inside_recursion()
{
    let s = blink();
    let trace = s.trace(&crash_dump()).unwrap();

    assert_eq!(trace.stack_pointer, 0x04E3);
    let walked: Vec<(&str, u32, i64)> = trace.frames
        .iter()
        .map(|f| (f.name.as_str(), f.return_address, f.bytes))
        .collect();
    assert_eq!(walked, vec![
        ("fill",        0x48c, 1),
        ("fill",        0x48c, 1),
        ("log_big",     0x41e, 1026),
        ("setup",       0x170, 8),
        ("main",        0x14e, 4),
        ("__ctors_end", 0x78,  0),
    ]);
    assert_eq!(trace.unresolved, None);
    assert!(trace.diagnostics.is_empty());

    let r = trace.reconcile(&TraceConf::default());
    assert_eq!(r, Reconciliation { accounted: 1052, total: 1052 });
}

#[test]
fn hex_dump_report()
{
    let s = blink();
    let hex: String = crash_dump().iter().map(|b| format!("{:02X}", b)).collect();
    let trace = s.trace_hex(&format!("{}\n", hex)).unwrap();

    let mut out = Vec::new();
    trace.output_report(&mut out, &TraceConf::default()).unwrap();
    let text = String::from_utf8(out).unwrap();

    assert!(text.contains("SP: 04E3 (1251)\n"));
    assert!(text.contains(
        "fill : 0x048C\nfill : 0x048C\nlog_big : 0x041E\nsetup : 0x0170\nmain : 0x014E\n__ctors_end : 0x0078\n"
    ));
    assert!(text.contains("All stack accounted for (1052)"));
}

#[test]
fn wrong_stack_end_leaves_residue()
{
    let s = blink();
    let trace = s.trace(&crash_dump()).unwrap();

    let r = trace.reconcile(&TraceConf { stack_end: 0x10FF });
    assert!(!r.is_complete());
    assert_eq!(r.unaccounted(), 0x10FF - 0x900);
}

#[test]
fn truncated_dump_stops_early()
{
    let s = blink();
    let mut dump = crash_dump();
    dump.truncate(2 + 3 + 3 + 2 + 10);

    let trace = s.trace(&dump).unwrap();
    let names: Vec<&str> = trace.frames.iter().map(|f| f.name.as_str()).collect();
    assert_eq!(names, vec!["fill", "fill", "log_big"]);

    let r = trace.reconcile(&TraceConf::default());
    assert_eq!(r.accounted, 3 + 3 + 1028);
    assert_eq!(r.unaccounted(), 1052 - 1034);
}
