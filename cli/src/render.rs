//! Plain-text rendering of search results.

use std::fmt::Write;

use mentor_retrieval::{IndexStats, PatternCatalog, PatternRecord, SimilarPattern};

const NO_MATCHES: &str = "No similar solutions found.\n";

/// Render ranked matches, best first.
pub fn matches(results: &[SimilarPattern]) -> String {
    if results.is_empty() {
        return NO_MATCHES.to_string();
    }

    let mut out = String::new();
    for (rank, hit) in results.iter().enumerate() {
        let _ = writeln!(
            out,
            "{}. {}  (score {:.3})",
            rank + 1,
            title(&hit.record),
            hit.score
        );
        let _ = writeln!(out, "   {}", hit.record.description);

        let use_cases = hit.record.use_cases();
        if !use_cases.is_empty() {
            let _ = writeln!(out, "   Use cases: {}", use_cases.join(", "));
        }

        out.push('\n');
        for line in hit.record.code.lines() {
            let _ = writeln!(out, "       {line}");
        }
        out.push('\n');
    }
    out
}

/// Render a catalog summary.
pub fn catalog(catalog: &PatternCatalog, stats: &IndexStats) -> String {
    let mut out = String::new();

    if let Some(source) = catalog.source() {
        let _ = writeln!(out, "Catalog:   {}", source.display());
    }
    let _ = writeln!(out, "Patterns:  {}", stats.patterns);
    let _ = writeln!(out, "Provider:  {} ({})", stats.provider, stats.model);
    match stats.dimension {
        Some(dimension) => {
            let _ = writeln!(out, "Dimension: {dimension}");
        }
        None => out.push_str("Dimension: -\n"),
    }

    out.push('\n');
    for (position, record) in catalog.patterns().iter().enumerate() {
        let _ = writeln!(out, "{position:>3}  {}", title(record));
    }
    out
}

/// Short label for a record: its `name` metadata or the first line of the
/// description.
fn title(record: &PatternRecord) -> &str {
    record
        .metadata_str("name")
        .or_else(|| record.description.lines().next())
        .unwrap_or_default()
}
