use cubicle_protocol::{read_terminal, write_terminal, ProtocolError, TerminalState};
use cubicle_terminal::{channel_byte, Terminal, PALETTE_SIZE};

fn busy_terminal() -> Terminal {
    let terminal = Terminal::new(12, 4, true);
    terminal.set_cursor_pos(1, 1);
    terminal.blit("hello", "01234", "fedcb").unwrap();
    terminal.set_text_colour(14);
    terminal.set_background_colour(11);
    terminal.set_cursor_pos(0, 3);
    terminal.write("§ world");
    terminal.set_cursor_pos(5, 2);
    terminal.set_cursor_blink(true);
    terminal
}

fn lines(terminal: &Terminal) -> Vec<(String, String, String)> {
    (0..terminal.height())
        .map(|y| {
            (
                terminal.get_line(y).unwrap().to_string(),
                terminal.get_text_colour_line(y).unwrap().to_string(),
                terminal.get_background_colour_line(y).unwrap().to_string(),
            )
        })
        .collect()
}

fn palette_bytes(terminal: &Terminal) -> Vec<u8> {
    let palette = terminal.palette();
    (0..PALETTE_SIZE)
        .flat_map(|i| palette.get_colour(i).unwrap())
        .map(channel_byte)
        .collect()
}

fn assert_same(actual: &Terminal, expected: &Terminal) {
    assert_eq!(lines(actual), lines(expected));
    assert_eq!(actual.cursor_pos(), expected.cursor_pos());
    assert_eq!(actual.cursor_blink(), expected.cursor_blink());
    assert_eq!(actual.text_colour(), expected.text_colour());
    assert_eq!(actual.background_colour(), expected.background_colour());
    assert_eq!(palette_bytes(actual), palette_bytes(expected));
}

#[test]
fn sync_copies_everything() {
    let source = busy_terminal();
    source.set_palette_colour(3, 0.2, 0.4, 0.6).unwrap();

    let mut wire = Vec::new();
    write_terminal(&source, &mut wire);

    let target = Terminal::new(12, 4, true);
    read_terminal(&target, &mut &wire[..]).unwrap();
    assert_same(&target, &source);
    assert_eq!(target.get_line(1).unwrap().to_string(), " hello      ");
    assert_eq!(target.get_text_colour_line(1).unwrap().to_string(), "001234000000");
}

#[test]
fn palette_channels_are_truncated_to_bytes() {
    let source = Terminal::new(1, 1, true);
    source.set_palette_colour(0, 0.5, 0.3, 0.999).unwrap();
    source.set_palette_colour(1, 1.0, 0.0, 0.1).unwrap();

    let mut wire = Vec::new();
    write_terminal(&source, &mut wire);
    // Cursor, blink and colours take 10 bytes and the single cell 2 more.
    let palette = &wire[12..];
    assert_eq!(palette.len(), PALETTE_SIZE * 3);
    assert_eq!(&palette[..6], &[127, 76, 254, 255, 0, 25]);
    // Untouched slots keep their default colours exactly.
    assert_eq!(&palette[45..], &[0x11, 0x11, 0x11]);
}

#[test]
fn glyphs_outside_latin1_are_truncated() {
    let source = Terminal::new(3, 1, true);
    source.write("a\u{2603}b");

    let mut wire = Vec::new();
    write_terminal(&source, &mut wire);
    let target = Terminal::new(3, 1, true);
    read_terminal(&target, &mut &wire[..]).unwrap();
    assert_eq!(target.get_line(0).unwrap().to_string(), "a\u{3}b");
}

#[test]
fn state_round_trips_with_and_without_compression() {
    let source = busy_terminal();
    for compress in [false, true] {
        let state = TerminalState::from_terminal(Some(&source), compress);
        assert!(state.has_terminal());
        assert_eq!((state.width, state.height, state.colour), (12, 4, true));

        let mut wire = Vec::new();
        state.encode(&mut wire).unwrap();
        let mut input = &wire[..];
        let decoded = TerminalState::decode(&mut input).unwrap();
        assert!(input.is_empty());
        assert_eq!(decoded, state);
        assert_same(&decoded.create().unwrap(), &source);
    }
}

#[test]
fn compression_shrinks_blank_terminals() {
    let source = Terminal::new(51, 19, true);
    let encoded = |compress| {
        let mut wire = Vec::new();
        TerminalState::from_terminal(Some(&source), compress)
            .encode(&mut wire)
            .unwrap();
        wire.len()
    };
    assert!(encoded(true) < encoded(false) / 4);
}

#[test]
fn apply_resizes_the_target() {
    let source = busy_terminal();
    let state = TerminalState::from_terminal(Some(&source), true);

    let target = Terminal::new(3, 3, true);
    state.apply(&target).unwrap();
    assert_eq!((target.width(), target.height()), (12, 4));
    assert_same(&target, &source);
}

#[test]
fn missing_terminal() {
    let state = TerminalState::from_terminal(None, true);
    assert!(!state.has_terminal());
    assert_eq!(state.size(), 0);

    let mut wire = Vec::new();
    state.encode(&mut wire).unwrap();
    assert_eq!(wire, [0, 1, 0]);

    let decoded = TerminalState::decode(&mut &wire[..]).unwrap();
    assert!(!decoded.has_terminal());
    assert!(matches!(decoded.create(), Err(ProtocolError::NoTerminal)));
    assert!(matches!(
        decoded.apply(&Terminal::new(1, 1, true)),
        Err(ProtocolError::NoTerminal)
    ));
}

#[test]
fn payload_must_match_dimensions() {
    let source = Terminal::new(4, 2, false);
    let mut wire = Vec::new();
    TerminalState::from_terminal(Some(&source), false)
        .encode(&mut wire)
        .unwrap();

    // Claim a taller terminal than the payload holds.
    wire[4] = 3;
    assert!(matches!(
        TerminalState::decode(&mut &wire[..]),
        Err(ProtocolError::TerminalSize { .. })
    ));
}

#[test]
fn corrupt_compressed_payload() {
    let source = Terminal::new(4, 2, true);
    let mut wire = Vec::new();
    TerminalState::from_terminal(Some(&source), true)
        .encode(&mut wire)
        .unwrap();
    // Break the gzip trailer's CRC.
    let crc = wire.len() - 8;
    wire[crc] ^= 0xFF;
    assert!(TerminalState::decode(&mut &wire[..]).is_err());
}
