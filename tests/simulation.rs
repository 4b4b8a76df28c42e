use std::{fs, process::Command};

use ring_coherence_sim::{SimConfig, Simulator, TraceFile};

const TRACE: &str = "\
P0 R 0
h
P1 R 0
v
P2 W 0
v
P0 R 0
p
";

#[test]
fn replays_trace_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("sharing.txt");
    fs::write(&path, TRACE).unwrap();

    let trace = TraceFile::load(&path).unwrap();
    assert_eq!(trace.name, "sharing.txt");
    assert_eq!(trace.operations(), 4);

    let mut sim = Simulator::new(SimConfig::default()).with_checks(true);
    let mut out = Vec::new();
    let summary = sim.run(&trace, &mut out).unwrap();

    // 31 off-chip, 18 and 17 remote, then P0 re-reads after P2's invalidation
    assert_eq!(summary.off_chip_accesses, 1);
    assert_eq!(summary.remote_accesses, 3);
    assert_eq!(summary.private_accesses, 0);
    assert_eq!(summary.invalidations_sent, 2);
    assert_eq!(summary.coherence_writebacks, 1);
    assert!(!sim.is_verbose());

    let text = String::from_utf8(out).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "Hit-Rate: 0.0%");
    assert_eq!(
        lines[1],
        "A write by processor P2 to word 0 looked for tag 0 in cacheline/block 0, was found in state Invalid (cache miss) in this cache and found in state Shared in the cache of P0 and P1"
    );
    assert_eq!(lines[2], "P0");
    assert!(text.contains("P2\ncache-line: 0  {state: S, tag: 0}\n"));
}

#[test]
fn malformed_trace_is_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.txt");
    fs::write(&path, "P0 R 0\nP1 Q 4\n").unwrap();
    let err = TraceFile::load(&path).unwrap_err();
    assert!(format!("{err:#}").contains("line 2"));
}

#[test]
fn binary_writes_report() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("cold.txt");
    fs::write(&path, "P0 R 0\nP0 R 0\n").unwrap();

    let status = Command::new(env!("CARGO_BIN_EXE_ring-coherence-sim"))
        .arg(&path)
        .arg("--check")
        .status()
        .unwrap();
    assert!(status.success());

    let report = fs::read_to_string(dir.path().join("out_cold.txt")).unwrap();
    let expected = "\
Private-accesses: 1
Remote-accesses: 0
Off-chip-accesses: 1
Total-accesses: 2
Replacement-writebacks: 0
Coherence-writebacks: 0
Invalidations-sent: 0
Average-latency: 16.5
Priv-average-latency: 2.0
Rem-average-latency: 0.0
Off-chip-average-latency: 31.0
Total-latency: 33
";
    assert_eq!(report, expected);
}
