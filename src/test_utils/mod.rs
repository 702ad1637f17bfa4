//! Shared test helpers: fixtures, tracing setup and a table runner.

pub mod fixtures;
pub mod logging;

/// One row of a table test: a label, the input and the expected output.
pub type Row<'a, I, E> = (&'a str, I, E);

/// Apply `check` to every row and compare against the expected value.
///
/// All rows run before the assertion so one failure report names every
/// mismatching label.
pub fn check_table<I, E, F>(rows: &[Row<'_, I, E>], check: F)
where
    I: std::fmt::Debug + Clone,
    E: std::fmt::Debug + PartialEq,
    F: Fn(I) -> E,
{
    let mismatches: Vec<String> = rows
        .iter()
        .filter_map(|(label, input, expected)| {
            let actual = check(input.clone());
            println!("[TABLE] {label}: {input:?} -> {actual:?}");
            (actual != *expected)
                .then(|| format!("{label}: expected {expected:?}, got {actual:?}"))
        })
        .collect();
    assert!(mismatches.is_empty(), "table rows failed:\n{}", mismatches.join("\n"));
}
