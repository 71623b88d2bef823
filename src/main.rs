//! doxyrst — generate reStructuredText from Doxygen XML output.
//!
//! Point it at the XML directory Doxygen produced and it writes one reST
//! page per documented page and namespace, ready for inclusion in a
//! Sphinx source tree:
//!
//! - **directory mode**: `doxyrst -o docs/generated doxygen/xml`
//! - **single-compound mode**: `doxyrst -n Specifics doxygen/xml` (stdout)

mod index;
mod pages;
mod rst;
mod xml;

use anyhow::{Context, Result};
use clap::Parser;
use std::fs;
use std::path::PathBuf;

#[derive(Parser)]
#[command(
    name = "doxyrst",
    about = "Generate reStructuredText pages from a Doxygen XML directory"
)]
struct Cli {
    /// Directory containing Doxygen XML output (compound files + index.xml)
    xml_dir: PathBuf,

    /// Output directory; one .rst file is written per page/module compound
    #[arg(short = 'o', long)]
    output: Option<PathBuf>,

    /// Print a single compound (by fully-qualified name) to stdout
    #[arg(short = 'n', long)]
    name: Option<String>,

    /// Build mode: html, latex, latexpdf. Gates mode-conditional content.
    #[arg(short = 'm', long)]
    mode: Option<String>,

    /// Increase diagnostic output on stderr (repeatable)
    #[arg(short = 'v', long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let mode = match cli.mode.as_deref() {
        Some(name) => rst::BuildMode::from_name(name)?,
        None => rst::BuildMode::Unset,
    };

    let index = index::DoxygenIndex::load(&cli.xml_dir)?;
    if cli.verbose > 0 {
        eprintln!(
            "doxyrst: loaded {} compounds from {}",
            index.compounds().len(),
            cli.xml_dir.display()
        );
    }

    if let Some(ref name) = cli.name {
        let compound = index
            .compound_by_name(name)
            .with_context(|| format!("no compound named \"{}\" in the index", name))?;
        let content = pages::render_compound(compound, &index, mode, cli.verbose)?;
        print!("{}", content);
        return Ok(());
    }

    let output_dir = cli
        .output
        .as_deref()
        .context("one of --output or --name is required")?;
    fs::create_dir_all(output_dir).with_context(|| {
        format!("failed to create output directory: {}", output_dir.display())
    })?;

    let rendered = pages::generate_all(&index, mode, cli.verbose)?;
    if rendered.is_empty() {
        eprintln!("warning: no page or module compounds found; nothing to generate");
    }
    for page in &rendered {
        let out_path = output_dir.join(&page.file_name);
        fs::write(&out_path, &page.content)
            .with_context(|| format!("failed to write {}", out_path.display()))?;
        if cli.verbose > 0 {
            eprintln!("doxyrst: wrote {}", out_path.display());
        }
    }

    Ok(())
}
