use awgcompiler_backend::*;

fn main() {
    env_logger::init();

    // A small Ramsey-style sequence: two shaped pulses separated by a long wait,
    // with a readout marker over the second pulse.
    let mut tl = Timeline::new(2_000_000);
    tl.add_pulse(0, Pulse::new_gaussian("pi_half", 600, 1.0, 80.0, false).unwrap())
        .unwrap();
    tl.add_pulse(
        1_500_000,
        Pulse::new_sech("probe", 800, 0.5, 120.0, false).unwrap(),
    )
    .unwrap();
    tl.add_marker(MarkerInterval::new("readout", 2_000_000, 1_500_000, 1_500_800))
        .unwrap();

    let program = optimize(&tl, &SeqConstraints::default()).unwrap();
    println!(
        "{} segments, {} stored samples, {} program entries",
        program.waveforms.len(),
        program.stored_samples(),
        program.entries.len()
    );

    let session = SeqWriteSession::new("target/demo_sequence").unwrap();
    let path = session
        .write_sequence(&program, "demo", 1, &JumpOptions::default())
        .unwrap();
    println!("wrote {}", path.display());
}
