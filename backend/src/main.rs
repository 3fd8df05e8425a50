//! Rosterload CLI - Convert academic exports into Evolucional tables
//!
//! # Main Commands
//!
//! ```bash
//! rosterload convert relatorio.xlsx --system lyceum --password S3nha  # Write Cadastro/Turmas workbooks
//! rosterload convert relatorio.csv -p S3nha --format csv              # Same, as ';' CSV files
//! rosterload serve                                                  # Start local HTTP server (port 3000)
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! rosterload parse relatorio.csv                    # Decoded rows as JSON
//! rosterload check relatorio.csv --system lyceum    # Required-column check only
//! rosterload systems                                # Supported academic systems
//! ```

use clap::{Parser, Subcommand};
use rosterload::{
    convert, decode_file, validate_schema, write_artifacts, ConversionRequest, DecodeOptions,
    OutputFormat, SourceSystem,
};
use std::fs;
use std::path::{Path, PathBuf};

#[derive(Parser)]
#[command(name = "rosterload")]
#[command(about = "Convert academic-system exports into Evolucional enrollment tables", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Convert an export into enrollment and class files
    Convert {
        /// Input file: spreadsheet (.xlsx, .xls, .ods) or ';' separated CSV
        input: PathBuf,

        /// Academic system that produced the file
        #[arg(short, long, default_value = "lyceum")]
        system: SourceSystem,

        /// Default password assigned to every student
        #[arg(short, long)]
        password: String,

        /// Output directory
        #[arg(short, long, default_value = ".")]
        out_dir: PathBuf,

        /// Domain for generated e-mail addresses
        #[arg(long)]
        email_domain: Option<String>,

        /// Format of the generated tables (xlsx or csv)
        #[arg(short, long, default_value = "xlsx")]
        format: OutputFormat,

        /// CSV delimiter of the input
        #[arg(short, long, default_value = ";")]
        delimiter: char,
    },

    /// Check that a file has the columns a system requires
    Check {
        /// Input file (spreadsheet or CSV)
        input: PathBuf,

        /// Academic system that produced the file
        #[arg(short, long, default_value = "lyceum")]
        system: SourceSystem,

        /// CSV delimiter
        #[arg(short, long, default_value = ";")]
        delimiter: char,
    },

    /// Decode an export and output its rows as JSON
    Parse {
        /// Input file (spreadsheet or CSV)
        input: PathBuf,

        /// CSV delimiter
        #[arg(short, long, default_value = ";")]
        delimiter: char,

        /// Output file (default: stdout)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// List academic systems and whether they are available
    Systems,

    /// Start the local HTTP server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "3000")]
        port: u16,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Convert {
            input,
            system,
            password,
            out_dir,
            email_domain,
            format,
            delimiter,
        } => cmd_convert(&input, system, &password, &out_dir, email_domain, format, delimiter),

        Commands::Check {
            input,
            system,
            delimiter,
        } => cmd_check(&input, system, delimiter),

        Commands::Parse {
            input,
            delimiter,
            output,
        } => cmd_parse(&input, delimiter, output.as_deref()),

        Commands::Systems => cmd_systems(),

        Commands::Serve { port } => cmd_serve(port).await,
    };

    if let Err(e) = result {
        eprintln!("❌ Error: {}", e);
        std::process::exit(1);
    }
}

fn decode_options(delimiter: char) -> DecodeOptions {
    DecodeOptions {
        delimiter,
        ..DecodeOptions::default()
    }
}

fn cmd_convert(
    input: &Path,
    system: SourceSystem,
    password: &str,
    out_dir: &Path,
    email_domain: Option<String>,
    format: OutputFormat,
    delimiter: char,
) -> Result<(), Box<dyn std::error::Error>> {
    if password.trim().is_empty() {
        return Err("A senha padrão é obrigatória.".into());
    }

    eprintln!("📄 Processing: {} ({})", input.display(), system);
    let table = decode_file(input, &decode_options(delimiter))?;

    let mut request = ConversionRequest::new(system, password).with_output_format(format);
    if let Some(domain) = email_domain {
        request = request.with_email_domain(domain);
    }

    let outcome = match convert(&table, &request) {
        Ok(outcome) => outcome,
        Err(e) if e.is_empty_result() => {
            eprintln!("⚠️  {}", e);
            return Ok(());
        }
        Err(e) => return Err(e.into()),
    };

    eprintln!("\n📊 Summary:");
    eprintln!("   Students: {}", outcome.records.len());
    eprintln!("   Classes:  {}", outcome.rosters.len());
    eprintln!("   Dropped:  {}", outcome.dropped);
    for p in &outcome.partitions {
        eprintln!("   🏫 {}: {} students, {} classes", p.name, p.students, p.classes);
    }
    if !outcome.enrollment_check.is_clean() {
        eprintln!(
            "   ⚠️  {} enrollment rows failed validation",
            outcome.enrollment_check.invalid
        );
    }

    let written = write_artifacts(&outcome.artifacts, out_dir)?;
    for path in written {
        eprintln!("💾 Output written to: {}", path.display());
    }

    eprintln!("\n✨ Done!");
    Ok(())
}

fn cmd_check(input: &Path, system: SourceSystem, delimiter: char) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("✔️  Checking: {} ({})", input.display(), system);

    let table = decode_file(input, &decode_options(delimiter))?;
    eprintln!("   Encoding: {}", table.encoding);
    eprintln!("   Columns: {}", table.headers.join(", "));

    validate_schema(&table, system)?;
    eprintln!("✅ All required columns present ({} rows)", table.len());
    Ok(())
}

fn cmd_parse(input: &Path, delimiter: char, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("📄 Parsing: {}", input.display());

    let table = decode_file(input, &decode_options(delimiter))?;
    eprintln!("   Encoding: {}", table.encoding);
    eprintln!("   Columns: {}", table.headers.join(", "));
    eprintln!("✅ Parsed {} records", table.len());

    let json = serde_json::to_string_pretty(&table.records)?;
    write_output(&json, output)?;

    Ok(())
}

fn cmd_systems() -> Result<(), Box<dyn std::error::Error>> {
    for system in SourceSystem::ALL {
        let status = if system.is_available() { "available" } else { "disabled" };
        println!("  {:<8} {}", system.display_name(), status);
        if !system.required_columns().is_empty() {
            println!("           columns: {}", system.required_columns().join(", "));
        }
    }
    Ok(())
}

async fn cmd_serve(port: u16) -> Result<(), Box<dyn std::error::Error>> {
    rosterload::server::start_server(port).await?;
    Ok(())
}

fn write_output(content: &str, path: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    match path {
        Some(p) => {
            fs::write(p, content)?;
            eprintln!("💾 Output written to: {}", p.display());
        }
        None => {
            println!("{}", content);
        }
    }
    Ok(())
}
