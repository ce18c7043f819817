use std::fs;
use std::path::Path;

use texpaper_core::Parser;

// Every fixture renders to its expected.html.
fn golden_case(path: &Path) -> datatest_stable::Result<()> {
    let input = fs::read_to_string(path)?;

    let fixture_dir = path
        .parent()
        .ok_or("fixture input path should have a parent directory")?;
    let expected = fs::read_to_string(fixture_dir.join("expected.html"))?;

    let result = Parser::default().parse(&input)?;

    pretty_assertions::assert_eq!(result.html, expected.trim_end());
    Ok(())
}

datatest_stable::harness!({
    test = golden_case,
    root = concat!(env!("CARGO_MANIFEST_DIR"), "/tests/fixtures"),
    pattern = r"^[^/]+/input\.tex$",
});
