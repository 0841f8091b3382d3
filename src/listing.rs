// src/listing.rs

//! Kernelspec listing: run `jupyter kernelspec list` on the kernel, parse
//! its tabular output, and enrich each entry from its descriptor file.
//!
//! The listing output format (optional `Available kernels` header line,
//! whitespace-separated columns, CRLF line endings) is a compatibility
//! contract with the backend and is matched exactly here.

use serde::{Deserialize, Serialize};

use crate::{log_warn, KernelClient, Result};

/// Command whose output [`parse_listing`] understands.
pub const LIST_KERNELSPECS: &str = "jupyter kernelspec list";

/// One installed kernel environment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KernelSpec {
    /// Short name, the first column of the listing.
    pub name: String,

    /// Human-readable name from the environment's `kernel.json`.
    ///
    /// `None` when the descriptor lookup failed or carried no
    /// `display_name`; the record is still valid.
    pub display_name: Option<String>,

    /// Installation path, the second column of the listing.
    pub kernel_path: String,
}

/// Parse the raw output of `jupyter kernelspec list` into records.
///
/// Lines are split on CRLF. The `Available kernels` header line is
/// skipped; every other line is split on whitespace (empty tokens
/// dropped), and lines with at least two tokens yield a record with
/// `name` = token 0 and `kernel_path` = token 1. Lines with fewer tokens
/// produce nothing and are not an error.
///
/// `display_name` is left unset; enrichment happens in
/// [`KernelClient::kernelspecs`] because it needs its own round trips.
pub fn parse_listing(raw: &str) -> Vec<KernelSpec> {
    // ---
    let mut specs = Vec::new();

    for line in raw.split("\r\n") {
        if line.starts_with("Available kernels") {
            continue;
        }

        let mut columns = line.split_whitespace();
        let (Some(name), Some(kernel_path)) = (columns.next(), columns.next()) else {
            continue;
        };

        specs.push(KernelSpec {
            name: name.to_string(),
            display_name: None,
            kernel_path: kernel_path.to_string(),
        });
    }

    specs
}

/// Extract `display_name` from the text of a `kernel.json` descriptor.
fn display_name_from_descriptor(raw: &str) -> Option<String> {
    // ---
    let value: serde_json::Value = serde_json::from_str(raw).ok()?;
    value.get("display_name")?.as_str().map(str::to_string)
}

impl KernelClient {
    /// List the kernel environments installed on the backend.
    ///
    /// Runs [`LIST_KERNELSPECS`], parses its output, then reads each
    /// environment's `kernel.json` with a follow-up request to populate
    /// `display_name`. The follow-ups are sequential because the
    /// connection correlates one request at a time.
    ///
    /// A single environment's descriptor lookup failing is logged and that
    /// record keeps `display_name: None`; it never aborts the listing.
    /// The returned sequence is fully materialized.
    ///
    /// # Errors
    ///
    /// Returns an error only if the listing request itself fails (see
    /// [`execute`](Self::execute) for the possible failures).
    pub async fn kernelspecs(&self) -> Result<Vec<KernelSpec>> {
        // ---
        let listing = self.execute(LIST_KERNELSPECS).await?;
        let mut specs = parse_listing(&listing);

        for spec in &mut specs {
            let command = format!("cat {}/kernel.json", spec.kernel_path);

            match self.execute(&command).await {
                Ok(descriptor) => {
                    spec.display_name = display_name_from_descriptor(&descriptor);
                    if spec.display_name.is_none() {
                        log_warn!(
                            "kernelspec {}: descriptor carried no display_name",
                            spec.name
                        );
                    }
                }
                Err(_err) => {
                    log_warn!("kernelspec {}: descriptor lookup failed: {_err}", spec.name);
                }
            }
        }

        Ok(specs)
    }
}
