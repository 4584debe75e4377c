//! Debug CLI: run the pipeline on one PDF and print what it saw.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
use tracing_subscriber::EnvFilter;

use laudoscan::ai::AiSummaryRequest;
use laudoscan::catalog::matcher::normalize_name;
use laudoscan::parse::legacy;
use laudoscan::{LabPipeline, PipelineOptions, ReferenceCatalog};

#[derive(Parser)]
#[command(name = "laudoscan", version, about = "Extract and classify lab results from a report PDF")]
struct Cli {
    /// Lab report PDF.
    pdf: PathBuf,

    /// Reference catalog JSON.
    #[arg(long)]
    references: PathBuf,

    /// Patient gender for gendered reference ranges (M/F).
    #[arg(long)]
    gender: Option<String>,

    /// OCR every page even when the PDF has a text layer.
    #[arg(long)]
    require_ocr: bool,

    /// Maximum number of pages to OCR.
    #[arg(long, default_value_t = 10)]
    max_ocr_pages: usize,

    /// Rasterization DPI for scanned pages.
    #[arg(long, default_value_t = 300)]
    dpi: u32,

    /// Use the catalog-driven line scanner instead of the structured parser.
    #[arg(long)]
    legacy: bool,

    /// Print the payload that would go to the AI summarization service.
    #[arg(long)]
    run_ai: bool,
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .init();

    let cli = Cli::parse();
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<(), Box<dyn std::error::Error>> {
    let options = PipelineOptions {
        require_ocr: cli.require_ocr,
        max_ocr_pages: cli.max_ocr_pages,
        ocr_dpi: cli.dpi,
        ..PipelineOptions::default()
    };
    let pipeline = LabPipeline::standard(options);
    let result = pipeline.run(&cli.pdf, &cli.references, cli.gender.as_deref())?;
    let catalog = ReferenceCatalog::load(&cli.references)?;
    let gender = cli.gender.as_deref().or(result.patient.gender.as_deref());

    if cli.legacy {
        print!(
            "{}",
            legacy::analyze_free_text(&result.artifact.raw_text, &catalog, gender)
        );
        return Ok(());
    }

    println!("== Paciente ==");
    print_field("Nome", &result.patient.name);
    print_field("Médico", &result.patient.doctor);
    print_field("Sexo", &result.patient.gender);
    print_field("Nascimento", &result.patient.birth_date);
    print_field("Telefone", &result.patient.phone);
    print_field("CPF", &result.patient.cpf);

    println!("\n== Resultados ({}) ==", result.results.len());
    for r in &result.results {
        let value = r.value.map(|v| v.to_string()).unwrap_or_else(|| "-".into());
        let unit = r.unit.as_deref().unwrap_or("");
        let reference = r.reference.as_deref().unwrap_or("-");
        let status = r
            .status
            .map(|s| s.to_string())
            .unwrap_or_else(|| "-".into());
        println!("  {}: {value} {unit}  (ideal {reference})  [{status}]", r.test_name);
    }

    let detected: Vec<String> = result
        .results
        .iter()
        .map(|r| normalize_name(&r.test_name))
        .collect();
    let missing: Vec<&str> = catalog
        .entries()
        .iter()
        .filter(|e| !detected.contains(&normalize_name(&e.name)))
        .map(|e| e.name.as_str())
        .collect();
    if !missing.is_empty() {
        println!("\n== Não detectados ==");
        for name in missing {
            println!("  {name}");
        }
    }

    if !result.suggestions.is_empty() {
        println!("\n== Sugestões ==");
        for s in &result.suggestions {
            println!("  {s}");
        }
    }

    if result.artifact.ocr_pages > 0 {
        println!(
            "\n(OCR: {} página(s), confiança média {:.0}%)",
            result.artifact.ocr_pages,
            result.artifact.ocr_confidence.unwrap_or(0.0) * 100.0
        );
    }

    if cli.run_ai {
        let findings = legacy::scan_lines(result.artifact.raw_text.lines(), &catalog, gender);
        let key_lines: Vec<String> = findings
            .values()
            .filter_map(|f| f.source_line.clone())
            .collect();
        let request = AiSummaryRequest::new(
            result.patient.clone(),
            result.results.clone(),
            key_lines,
            &result.artifact.raw_text,
        );
        println!("\n== Payload IA ==");
        println!("{}", serde_json::to_string_pretty(&request)?);
    }

    Ok(())
}

fn print_field(label: &str, value: &Option<String>) {
    println!("  {label}: {}", value.as_deref().unwrap_or("-"));
}
