use std::path::Path;

use common::{
    output::{OutputFormat, filter_by_image_size, read_records, write_records},
    parser::IncompletePolicy,
    record::Metrics,
    scan::extract_dir,
};
use eyre::Result;
use tracing::{debug, info, warn};

use crate::RunArgs;

pub async fn run_extraction(args: &RunArgs) -> Result<()> {
    let policy = if args.drop_incomplete {
        IncompletePolicy::Drop
    } else {
        IncompletePolicy::Keep
    };
    debug!("Scanning {} ({policy:?})", args.dir.display());

    let records = extract_dir(&args.dir, policy).await?;
    let total = records.len();
    let records = filter_by_image_size(records, args.max_image_size);
    if records.len() < total {
        info!(
            "Left out {} records with image size above {}",
            total - records.len(),
            args.max_image_size
        );
    }
    if records.is_empty() {
        warn!("No records extracted from {}", args.dir.display());
    }

    write_records(&records, &args.output, args.format).await?;
    info!(
        "Wrote {} records to {} ({})",
        records.len(),
        args.output.display(),
        args.format
    );
    Ok(())
}

pub async fn show(input: &Path, format: OutputFormat) -> Result<()> {
    let records = read_records(input, format).await?;
    println!(
        "test\tthreads\timage_size\t{}",
        Metrics::LABELS.join("\t")
    );
    for record in &records {
        println!("{record}");
    }
    debug!("Read {} records from {}", records.len(), input.display());
    Ok(())
}
