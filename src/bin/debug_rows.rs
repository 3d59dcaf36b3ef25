//! Debug tool: Print rows as the row builder sees them
//!
//! Usage: debug_rows <pdf_file> [page_number]
//!
//! Shows each page's line pitch and grouping tolerance, then every row with
//! its Y, the gap from the previous row, its header score and footer match.

use statement_inspector::fragment::{line_pitch, row_tolerance};
use statement_inspector::grammar::{footer_match, FooterMatch};
use statement_inspector::header::score_row;
use statement_inspector::{build_rows, extract_fragments, ParseOptions};
use std::env;
use std::process;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 2 {
        eprintln!("Usage: {} <pdf_file> [page_number]", args[0]);
        eprintln!();
        eprintln!("Prints the rows built from each page with pitch and tolerance.");
        eprintln!("If page_number is given, only that page is shown.");
        process::exit(1);
    }

    let pdf_path = &args[1];
    let filter_page: Option<u32> = args.get(2).and_then(|s| s.parse().ok());
    let options = ParseOptions::default();

    let pages = match extract_fragments(pdf_path) {
        Ok(pages) => pages,
        Err(e) => {
            eprintln!("Error extracting fragments: {}", e);
            process::exit(1);
        }
    };

    for page in &pages {
        if filter_page.is_some_and(|fp| fp != page.page_number) {
            continue;
        }

        let mut ys: Vec<f32> = page.fragments.iter().map(|f| f.y).collect();
        ys.sort_by(|a, b| b.total_cmp(a));
        let pitch = line_pitch(&ys, options.gap_noise_floor);
        let tolerance = row_tolerance(pitch, &options);

        println!("=== Page {} ===", page.page_number);
        println!(
            "fragments: {}  pitch: {}  tolerance: {:.2}",
            page.fragments.len(),
            pitch.map_or("-".to_string(), |p| format!("{:.2}", p)),
            tolerance
        );
        println!();

        let rows = build_rows(&page.fragments, &options);
        let mut prev_y: Option<f32> = None;
        for (i, row) in rows.iter().enumerate() {
            let gap = prev_y.map_or("-".to_string(), |py| format!("{:.1}", py - row.y));
            let score = score_row(row);
            let footer = match footer_match(&row.lowercase_text()) {
                FooterMatch::None => "",
                FooterMatch::Metadata => " [meta]",
                FooterMatch::Strict => " [footer]",
            };
            let mut text = row.text();
            if text.chars().count() > 90 {
                text = text.chars().take(87).collect::<String>() + "...";
            }
            println!(
                "{:>4} y={:>7.1} gap={:>6} score={:>3}{} | {}",
                i, row.y, gap, score.score, footer, text
            );
            prev_y = Some(row.y);
        }
        println!();
    }
}
