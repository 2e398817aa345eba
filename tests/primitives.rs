use docbatch::primitives::{
    convert_points, format_bytes, hex_to_rgb, page_range_tokens_valid, parse_page_ranges,
    standard_page_name, LengthUnit, Rgb,
};

#[test]
fn page_ranges_mixed_tokens() {
    assert_eq!(parse_page_ranges("1,3-5,7", 10), vec![0, 2, 3, 4, 6]);
}

#[test]
fn page_ranges_blank_selects_everything() {
    assert_eq!(parse_page_ranges("", 4), vec![0, 1, 2, 3]);
    assert_eq!(parse_page_ranges("   ", 2), vec![0, 1]);
    assert!(parse_page_ranges("", 0).is_empty());
}

#[test]
fn page_ranges_drop_out_of_bounds_tokens() {
    assert_eq!(parse_page_ranges("0,1,15,5", 10), vec![0, 4]);
    assert_eq!(parse_page_ranges("8-12", 10), Vec::<u32>::new());
}

#[test]
fn page_ranges_ignore_reversed_and_garbage() {
    assert_eq!(parse_page_ranges("5-3,1-2", 10), vec![0, 1]);
    assert_eq!(parse_page_ranges("abc, 2 , x-y, -3", 5), vec![1]);
    assert_eq!(parse_page_ranges(" 2 - 3 ", 5), vec![1, 2]);
}

#[test]
fn page_ranges_sorted_and_unique() {
    let pages = parse_page_ranges("9,1-3,2,3-4,9", 9);
    assert_eq!(pages, vec![0, 1, 2, 3, 8]);
    assert!(pages.iter().all(|p| *p < 9));
}

#[test]
fn range_tokens_validity() {
    assert!(page_range_tokens_valid(""));
    assert!(page_range_tokens_valid("1,foo"));
    assert!(page_range_tokens_valid("3-1"));
    assert!(!page_range_tokens_valid("foo,bar"));
    assert!(!page_range_tokens_valid(",,"));
}

#[test]
fn bytes_zero_and_small() {
    assert_eq!(format_bytes(0, 2), "0 Bytes");
    assert_eq!(format_bytes(1, 2), "1 Bytes");
    assert_eq!(format_bytes(1023, 2), "1023 Bytes");
}

#[test]
fn bytes_scale_and_trim() {
    assert_eq!(format_bytes(1024, 2), "1 KB");
    assert_eq!(format_bytes(1536, 2), "1.5 KB");
    assert_eq!(format_bytes(1536, 0), "2 KB");
    assert_eq!(format_bytes(5_242_880, 2), "5 MB");
    assert_eq!(format_bytes(1_073_741_824, 2), "1 GB");
    assert_eq!(format_bytes(1_100_000, 2), "1.05 MB");
    assert_eq!(format_bytes(1_100_000, 0), "1 MB");
}

#[test]
fn bytes_huge_precision_is_clamped() {
    assert_eq!(format_bytes(1536, 400), "1.5 KB");
    assert_eq!(format_bytes(5_242_880, usize::MAX), "5 MB");
}

#[test]
fn hex_colors() {
    let grey = hex_to_rgb("#808080");
    assert!((grey.r - 0.502).abs() < 0.001);
    assert!((grey.g - 0.502).abs() < 0.001);
    assert!((grey.b - 0.502).abs() < 0.001);

    let red = hex_to_rgb("ff0000");
    assert_eq!(red, Rgb { r: 1.0, g: 0.0, b: 0.0 });
}

#[test]
fn hex_malformed_is_black() {
    assert_eq!(hex_to_rgb("invalid"), Rgb::default());
    assert_eq!(hex_to_rgb("#fff"), Rgb::default());
    assert_eq!(hex_to_rgb("#12345g"), Rgb::default());
    assert_eq!(hex_to_rgb(""), Rgb { r: 0.0, g: 0.0, b: 0.0 });
}

#[test]
fn page_names_either_orientation() {
    assert_eq!(standard_page_name(595.0, 842.0), "A4");
    assert_eq!(standard_page_name(842.0, 595.0), "A4");
    assert_eq!(standard_page_name(841.89, 595.28), "A4");
    assert_eq!(standard_page_name(612.0, 792.0), "Letter");
    assert_eq!(standard_page_name(1008.0, 612.0), "Legal");
    assert_eq!(standard_page_name(600.0, 800.0), "Custom");
}

#[test]
fn point_conversion() {
    assert_eq!(convert_points(72.0, "in"), "1.00");
    assert_eq!(convert_points(72.0, "mm"), "25.40");
    assert_eq!(convert_points(72.0, "px"), "96.00");
    assert_eq!(convert_points(595.28, "pt"), "595.28");
    assert_eq!(convert_points(10.0, "furlong"), "10.00");
    assert_eq!(LengthUnit::parse_lossy(" MM "), LengthUnit::Mm);
}
