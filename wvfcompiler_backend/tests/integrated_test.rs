use ndarray::array;
use wvfcompiler_backend::*;

#[test]
fn single_board_constant_step() {
    let mut exp = Experiment::new();
    exp.add_board("BOARD0", 3).unwrap();
    let written = exp
        .waveform(0, 0, &[WaveformSample::new(1.0, 5.0, 5.0)])
        .unwrap();
    assert_eq!(written, 10);
    assert_eq!(
        exp.channel_program(0),
        vec![0xD0, 0x07, 0x00, 0x80, 0x00, 0x00, 0x00, 0x00, 0xFE, 0xFF]
    );
    assert_eq!(exp.programmed_channels(), vec![0]);
}

#[test]
fn resolve_across_boards() {
    let mut exp = Experiment::new();
    exp.add_board("A", 3).unwrap();
    exp.add_board("B", 2).unwrap();
    assert_eq!(exp.resolve(4).unwrap(), (1, 1));
    assert_eq!(exp.board_channel(1, 1).unwrap(), 4);
    assert!(exp.resolve(5).is_err());
}

#[test]
fn clear_on_empty_store() {
    let mut exp = Experiment::new();
    exp.add_board("BOARD0", 3).unwrap();
    exp.clear(2, ALL);
    assert!(exp.programmed_channels().is_empty());
    assert_eq!(exp.channel_total_length(2), 0);
}

#[test]
fn total_length_accumulates_then_clears() {
    let mut exp = Experiment::new();
    exp.add_board("BOARD0", 3).unwrap();
    let a = exp
        .waveform(
            1,
            0,
            &[
                WaveformSample::new(1.0, 0.0, 2.0),
                WaveformSample::new(2.0, 2.0, 0.0),
            ],
        )
        .unwrap();
    let b = exp.constant(1, 1, 3.3).unwrap();
    assert_eq!(exp.channel_total_length(1), a + b);
    assert_eq!(exp.channel_steps(1), vec![0, 1]);

    exp.clear(1, ALL);
    assert_eq!(exp.channel_total_length(1), 0);
}

#[test]
fn column_input_matches_sample_input() {
    let times = array![1.0, 2.5, 4.0];
    let starts = array![0.0, 5.0, 5.0];
    let ends = array![5.0, 5.0, 0.0];
    let samples = waveform_samples_from_columns(times.view(), starts.view(), ends.view()).unwrap();

    let mut from_columns = Experiment::new();
    from_columns.add_board("BOARD0", 3).unwrap();
    from_columns.waveform(0, 0, &samples).unwrap();

    let mut from_tuples = Experiment::new();
    from_tuples.add_board("BOARD0", 3).unwrap();
    from_tuples
        .waveform(
            0,
            0,
            &[
                WaveformSample::new(1.0, 0.0, 5.0),
                WaveformSample::new(2.5, 5.0, 5.0),
                WaveformSample::new(4.0, 5.0, 0.0),
            ],
        )
        .unwrap();

    assert_eq!(from_columns.channel_program(0), from_tuples.channel_program(0));
}

#[test]
fn logic_and_waveform_on_one_board() {
    let mut exp = Experiment::new();
    exp.add_device_list("DACBRD00 3").unwrap();
    let logic = exp.board_channel(0, 2).unwrap();
    let mask = logic_mask(&["i", "l1"]).unwrap();
    exp.logic(logic, 0, &[LogicSample::new(2.0, mask)]).unwrap();
    exp.constant(0, 0, 1.0).unwrap();

    let program = exp.channel_program(logic);
    assert_eq!(program.len(), 6);
    assert_eq!(program[0], 0b0100_0010);
    assert_eq!(&program[4..], &[0xFE, 0xFF]);
    assert_eq!(exp.programmed_channels(), vec![0, logic]);
}

#[test]
fn config_round_trips_through_json() {
    let config = EncoderConfig::legacy().with_free_run(true);
    let json = serde_json::to_string(&config).unwrap();
    let parsed: EncoderConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    let mut exp = Experiment::with_config(parsed).unwrap();
    exp.add_board("BOARD0", 1).unwrap();
    exp.constant(0, 0, 10.0).unwrap();
    assert_eq!(&exp.channel_program(0)[8..], &[0xFD, 0xFF, 0xFE, 0xFF]);
}
