use sixel_kit::*;

#[test]
fn decode_simple_square() {
    let sixel_data = b"\x1bPq\"1;1;2;2\n#0;2;0;0;0#0BB\x1b\\";
    let image = sixel_decode(sixel_data).unwrap();
    assert_eq!((image.width, image.height), (2, 2));
    assert_eq!(image.pixels.len(), 2 * 2 * 4);
    assert_eq!(&image.pixels[0..4], &[0, 0, 0, 255]);
}

#[test]
fn decode_multicolor_row() {
    let sixel_data = b"\x1bPq#0;2;100;0;0#1;2;0;100;0#0~#1~\x1b\\";
    let image = sixel_decode(sixel_data).unwrap();
    assert_eq!((image.width, image.height), (2, 6));
    assert_eq!(&image.pixels[0..3], &[255, 0, 0]);
    assert_eq!(&image.pixels[4..7], &[0, 255, 0]);
}

#[test]
fn decode_repeat_introducer() {
    let image = sixel_decode(b"\x1bPq#2!7~\x1b\\").unwrap();
    assert_eq!(image.width, 7);
    // all seven columns share the register-2 default color
    let first = image.pixels[0..4].to_vec();
    for x in 0..7 {
        assert_eq!(&image.pixels[x * 4..x * 4 + 4], &first[..]);
    }
}

#[test]
fn decode_zero_repeat_counts_as_one() {
    let image = sixel_decode(b"\x1bPq#0!0~\x1b\\").unwrap();
    assert_eq!(image.width, 1);
}

#[test]
fn decode_carriage_return_overlays_colors() {
    // red fills the top three rows, then $ retreats and green fills the
    // bottom three of the same columns
    let sixel_data = b"\x1bPq#1;2;100;0;0FF$#2;2;0;100;0ww\x1b\\";
    let image = sixel_decode(sixel_data).unwrap();
    assert_eq!((image.width, image.height), (2, 6));
    assert_eq!(&image.pixels[0..3], &[255, 0, 0]);
    let bottom = (5 * image.width) * 4;
    assert_eq!(&image.pixels[bottom..bottom + 3], &[0, 255, 0]);
}

#[test]
fn decode_respects_declared_raster_size() {
    let image = sixel_decode(b"\x1bPq\"1;1;10;12\n#1@\x1b\\").unwrap();
    assert_eq!((image.width, image.height), (10, 12));
}

#[test]
fn decode_eight_bit_framing() {
    let mut data = vec![0x90u8];
    data.extend_from_slice(b"q#0;2;0;0;100~~");
    data.push(0x9c);
    let image = sixel_decode(&data).unwrap();
    assert_eq!((image.width, image.height), (2, 6));
    assert_eq!(&image.pixels[0..3], &[0, 0, 255]);
}

#[test]
fn decode_ignores_embedded_whitespace() {
    let with_newlines = sixel_decode(b"\x1bPq#0;2;50;50;50\n~~\r\n~\x1b\\").unwrap();
    let without = sixel_decode(b"\x1bPq#0;2;50;50;50~~~\x1b\\").unwrap();
    assert_eq!(with_newlines.pixels, without.pixels);
}

#[test]
fn decode_aspect_ratio_parameter() {
    let image = sixel_decode(b"\x1bP2q#0~\x1b\\").unwrap();
    assert_eq!(image.aspect_ratio.pan, 5);
    assert!(!image.aspect_ratio.is_square());

    let square = sixel_decode(b"\x1bP7q#0~\x1b\\").unwrap();
    assert!(square.aspect_ratio.is_square());
}

#[test]
fn decode_rejects_oversized_repeat() {
    let mut data = b"\x1bPq#0!9999999".to_vec();
    data.extend_from_slice(b"~\x1b\\");
    assert!(sixel_decode(&data).is_err());
}

#[test]
fn decode_rejects_unterminated_dcs() {
    assert!(sixel_decode(b"\x1bP0;0;0").is_err());
}

#[test]
fn decode_default_palette_register() {
    // register 2 of the VT340 default palette is a dark red
    let image = sixel_decode(b"\x1bPq#2~\x1b\\").unwrap();
    let px = &image.pixels[0..3];
    assert!(px[0] > px[1] && px[0] > px[2], "expected reddish, got {px:?}");
}
