//! Post-apply output report.

use std::io::Write;

use terraform_manager::OutputSet;
use tracing::debug;

/// Print non-sensitive outputs as `key = value` lines under a header.
///
/// Sensitive outputs are dropped before anything is written, names included.
/// Returns the number of outputs printed.
pub fn report_outputs<W: Write>(outputs: &OutputSet, out: &mut W) -> std::io::Result<usize> {
    if outputs.is_empty() {
        return Ok(0);
    }

    writeln!(out, "Terraform outputs:")?;

    let mut shown = 0;
    for (key, meta) in outputs.iter().filter(|(_, meta)| !meta.sensitive) {
        writeln!(out, "{} = {}", key, meta.render_value())?;
        shown += 1;
    }

    debug!(
        shown,
        hidden = outputs.len() - shown,
        "Reported Terraform outputs"
    );
    Ok(shown)
}
