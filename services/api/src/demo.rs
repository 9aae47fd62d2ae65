use std::path::PathBuf;
use std::sync::Arc;

use bidlens::error::AppError;
use bidlens::workflows::comparison::format::{format_currency, format_pct};
use bidlens::workflows::comparison::{
    ComparisonBackend, ComparisonSession, FlagSeverity, PendingFile, Phase, ScoreWeights,
    SessionConfig, SortKey, SourceKind, TableQuery,
};
use clap::Args;

use crate::infra::InMemoryBackend;

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Worksheet CSV files to compare (two or more). Built-in sample bids
    /// are used when none are supplied.
    #[arg(long)]
    pub(crate) worksheet: Vec<PathBuf>,
    /// Weight applied to the price component (0-100)
    #[arg(long, default_value_t = 40)]
    pub(crate) price_weight: u8,
    /// Weight applied to the completeness component (0-100)
    #[arg(long, default_value_t = 25)]
    pub(crate) completeness_weight: u8,
    /// Weight applied to the risk component (0-100)
    #[arg(long, default_value_t = 25)]
    pub(crate) risk_weight: u8,
    /// Weight applied to the data-quality component (0-100)
    #[arg(long, default_value_t = 10)]
    pub(crate) data_quality_weight: u8,
}

const SAMPLE_BIDS: &[(&str, &str)] = &[
    (
        "acme_systems.xlsx",
        "\
Description,Category,Amount,Quantity,Unit Price,Confidence
Senior Engineer,Labor,\"$100,000.00\",,,0.95
Project Management,Labor,\"$40,000.00\",,,0.9
Workstations,Material,,10,\"$2,500.00\",0.9
Platform License,License,\"$18,000.00\",,,0.85
Onsite Travel,Travel,\"$8,000.00\",4,,0.8
",
    ),
    (
        "globex_corp.xlsx",
        "\
Description,Category,Amount,Quantity,Unit Price,Confidence
Senior Engineer,Labor,\"$150,000.00\",,,0.9
Project Management,Labor,\"$35,000.00\",,,0.95
Workstations,Material,\"$24,000.00\",10,,0.95
Platform License,License,\"$22,000.00\",,,0.9
",
    ),
    (
        "initech_llc.xlsx",
        "\
Description,Category,Amount,Quantity,Unit Price,Confidence
Senior Engineer,Labor,\"$120,000.00\",,,0.6
Project Management,Labor,\"$55,000.00\",,,0.65
Workstations,Material,\"$31,000.00\",,,0.6
Platform License,License,\"$20,000.00\",,,0.55
Site Survey,ODC,\"$9,500.00\",,,0.5
",
    ),
];

pub(crate) fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    let backend = Arc::new(InMemoryBackend::default());
    let mut session = ComparisonSession::new(SessionConfig::default());

    println!("Proposal comparison demo");

    if args.worksheet.is_empty() {
        for (filename, csv) in SAMPLE_BIDS {
            session.add_file(PendingFile::new(
                *filename,
                SourceKind::Xlsx,
                csv.as_bytes().to_vec(),
            ))?;
        }
        println!("Using {} built-in sample bids", SAMPLE_BIDS.len());
    } else {
        for path in &args.worksheet {
            let filename = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_else(|| "worksheet.csv".to_string());
            let contents = std::fs::read(path)?;
            let kind = SourceKind::from_filename(&filename).unwrap_or(SourceKind::Xlsx);
            session.add_file(PendingFile::new(filename, kind, contents))?;
        }
        println!("Comparing {} supplied worksheet(s)", args.worksheet.len());
    }

    // extract
    let files = session.begin_extraction()?;
    let outcomes = backend.upload_and_extract(files, None)?;
    session.complete_extraction(outcomes)?;

    if session.phase() != Phase::Review {
        if let Some(card) = session.error_card() {
            println!("\nExtraction failed: {}", card.message);
        }
        return Ok(());
    }

    println!("\nExtracted proposals");
    for (index, record) in session.store().proposals().iter().enumerate() {
        println!(
            "- [{index}] {} | {} line items | total {}",
            record.display_name(),
            record.line_items.len(),
            record
                .total
                .map(format_currency)
                .unwrap_or_else(|| "unknown".to_string()),
        );
    }
    for failure in session.store().failures() {
        println!("- failed: {} ({})", failure.filename, failure.message);
    }

    // compare
    let proposals = session.begin_compare()?;
    let outcome = backend.compare(&proposals, None);
    session.complete_compare(outcome)?;

    if session.phase() != Phase::Results {
        if let Some(card) = session.error_card() {
            println!("\nComparison failed: {}", card.message);
        }
        return Ok(());
    }

    let weights = ScoreWeights {
        price: args.price_weight,
        completeness: args.completeness_weight,
        risk: args.risk_weight,
        data_quality: args.data_quality_weight,
    };
    session.set_weights(weights, 0)?;
    session.settle_scores();

    render_results(&session);
    Ok(())
}

fn render_results(session: &ComparisonSession) {
    let Some(model) = session.comparison() else {
        return;
    };

    println!("\nVendor scorecard");
    for summary in &model.proposals {
        let Some(score) = model.vendor_scores.get(&summary.id) else {
            continue;
        };
        println!(
            "- {}: overall {} ({}) | price {} | completeness {} | risk {} | data quality {}",
            summary.company.as_deref().unwrap_or(&summary.filename),
            score.overall,
            score.grade.label(),
            score.price_score,
            score.completeness_score,
            score.risk_score,
            score.data_quality_score,
        );
    }

    println!("\nGrand totals");
    for entry in &model.executive_summary.price_ranking {
        println!("- {}: {}", entry.name, format_currency(entry.value));
    }

    let query = TableQuery {
        sort: SortKey::Variance,
        direction: bidlens::workflows::comparison::SortDirection::Desc,
        min_variance_pct: 0.0,
        category: None,
    };
    if let Ok(rows) = session.table_view(&query) {
        println!("\nLine items by variance");
        for row in rows.iter().take(8) {
            let variance = row
                .variance_pct
                .map(format_pct)
                .unwrap_or_else(|| "n/a".to_string());
            println!("- {} | {} vendor(s) | variance {}", row.description, row.amounts.len(), variance);
        }
    }

    if let Ok(tornado) = session.tornado() {
        println!("\nNegotiation focus (largest spreads)");
        for entry in tornado.iter().take(5) {
            println!(
                "- {}: spread {} ({} to {})",
                entry.description,
                format_currency(entry.spread),
                format_currency(entry.low),
                format_currency(entry.high),
            );
        }
    }

    let mut flagged = false;
    for (id, flags) in &model.red_flags {
        let name = model
            .proposals
            .iter()
            .find(|summary| &summary.id == id)
            .map(|summary| summary.company.clone().unwrap_or_else(|| summary.filename.clone()))
            .unwrap_or_else(|| id.0.clone());
        for flag in flags {
            if !flagged {
                println!("\nRed flags");
                flagged = true;
            }
            let marker = match flag.severity {
                FlagSeverity::Critical => "!!",
                FlagSeverity::Warning => "!",
                FlagSeverity::Info => "i",
            };
            println!("- [{marker}] {}: {} ({})", name, flag.title, flag.detail);
        }
    }
    if !flagged {
        println!("\nRed flags: none");
    }

    println!("\nKey findings");
    for finding in &model.executive_summary.key_findings {
        println!("- {finding}");
    }
    for opportunity in &model.executive_summary.negotiation_opportunities {
        println!("- negotiate: {opportunity}");
    }
}
