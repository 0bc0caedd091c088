#![allow(missing_docs)]
use std::io::{self, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use tracing::{info, warn};

use storeapi_core::{ApiGroup, load_directory, missing_data_envelope};

const USAGE: &str = "\
Derive the operation index of a directory of OpenAPI documents

Usage: storeapi-index [OPTIONS] <DIR>

Documents are grouped by file name: `<name>.v2.yaml`, `<name>.v3.json`, `<name>.sf.yml`.

Options:
  -g, --group <GROUP>  Only print one group: v2, v3, sf or misc
      --json           Print the operation contracts as JSON
      --sniff          List v3 operations whose success body has no `data` envelope
  -h, --help           Print this help
";

fn main() -> Result<ExitCode> {
    tracing_subscriber::fmt().with_writer(io::stderr).init();

    let Some(args) = AppArgs::parse().context("parsing arguments")? else {
        io::stdout().write_all(USAGE.as_bytes())?;
        return Ok(ExitCode::SUCCESS);
    };

    let groups = load_directory(&args.dir)
        .with_context(|| format!("loading documents from '{}'", args.dir.display()))?;
    let selected = groups
        .iter()
        .filter(|(group, _)| args.group.is_none_or(|selected| selected == **group));

    let mut out = io::stdout().lock();
    if args.sniff {
        let Some(v3) = groups.get(&ApiGroup::V3) else {
            warn!("no v3 document found");
            return Ok(ExitCode::SUCCESS);
        };
        let flagged = missing_data_envelope(v3);
        for request_line in &flagged {
            writeln!(out, "{request_line}")?;
        }
        if !flagged.is_empty() {
            warn!(count = flagged.len(), "v3 operations without data envelope");
            return Ok(ExitCode::FAILURE);
        }
        return Ok(ExitCode::SUCCESS);
    }

    if args.json {
        let selected = selected
            .map(|(group, index)| Ok((group.to_string(), serde_json::to_value(index)?)))
            .collect::<Result<serde_json::Map<_, _>, serde_json::Error>>()?;
        serde_json::to_writer_pretty(&mut out, &selected)?;
        writeln!(out)?;
        return Ok(ExitCode::SUCCESS);
    }

    for (group, index) in selected {
        let mut lines = index.request_lines().map(ToString::to_string).collect::<Vec<_>>();
        lines.sort();
        for line in lines {
            writeln!(out, "{group}\t{line}")?;
        }
        info!(%group, operations = index.len(), "index derived");
    }

    Ok(ExitCode::SUCCESS)
}

#[derive(Debug)]
struct AppArgs {
    dir: PathBuf,
    group: Option<ApiGroup>,
    json: bool,
    sniff: bool,
}

impl AppArgs {
    /// Returns `None` when help is requested.
    fn parse() -> Result<Option<Self>> {
        let mut pargs = pico_args::Arguments::from_env();

        if pargs.contains(["-h", "--help"]) {
            return Ok(None);
        }

        let group = pargs
            .opt_value_from_fn(["-g", "--group"], parse_group)
            .context("parsing group argument")?;
        let json = pargs.contains("--json");
        let sniff = pargs.contains("--sniff");
        if json && sniff {
            bail!("--json and --sniff are exclusive");
        }

        let dir = pargs
            .free_from_str::<PathBuf>()
            .context("missing <DIR> argument, see --help")?;

        let remaining = pargs.finish();
        if !remaining.is_empty() {
            warn!(?remaining, "Warning: unused arguments left");
        }

        Ok(Some(Self {
            dir,
            group,
            json,
            sniff,
        }))
    }
}

fn parse_group(name: &str) -> Result<ApiGroup, String> {
    ApiGroup::from_name(name).ok_or_else(|| format!("unknown group '{name}', expected v2, v3, sf or misc"))
}
