//! A minimal reference [`Fetcher`]: resolves `data:` and `file://`/absolute
//! path sources, and verifies a `sha256-`/`sha512-` hash if present. Real
//! deployments fetching over HTTP(S)/S3/etc. supply their own [`Fetcher`];
//! this one only covers the sources a first-boot config realistically embeds
//! inline or stages onto local disk ahead of time.

use std::io;

use anyhow::{bail, Context, Result};
use camino::Utf8Path;
use cap_std_ext::cap_std::fs::Dir;
use cap_std_ext::dirext::CapStdExtDirExt;
use filesstage_config::File as CfgFile;
use filesstage_core::{dataurl, Fetcher};
use sha2::{Digest, Sha256, Sha512};

#[derive(Debug, Default)]
pub struct LocalFetcher;

impl Fetcher for LocalFetcher {
    fn fetch(&self, root: &Dir, file: &CfgFile) -> Result<()> {
        let bytes = resolve(&file.contents.sources)?;
        if let Some(verification) = &file.contents.verification {
            if let Some(hash) = &verification.hash {
                verify(hash, &bytes)?;
            }
        }

        let path = file.node.relative_path();
        if let Some(parent) = Utf8Path::new(path).parent() {
            if !parent.as_str().is_empty() {
                root.create_dir_all(parent.as_str())
                    .with_context(|| format!("creating parent of {path}"))?;
            }
        }

        if file.append {
            let mut existing = match root.read(path) {
                Ok(b) => b,
                Err(e) if e.kind() == io::ErrorKind::NotFound => Vec::new(),
                Err(e) => return Err(e).with_context(|| format!("reading {path}")),
            };
            existing.extend_from_slice(&bytes);
            root.atomic_write(path, existing)
                .with_context(|| format!("appending to {path}"))
        } else {
            root.atomic_write(path, bytes)
                .with_context(|| format!("writing {path}"))
        }
    }
}

fn resolve(sources: &[String]) -> Result<Vec<u8>> {
    for source in sources {
        if let Some(bytes) = dataurl::decode(source) {
            return Ok(bytes);
        }
        if let Some(path) = source.strip_prefix("file://") {
            return std::fs::read(path).with_context(|| format!("reading {path}"));
        }
        if let Some(path) = source.strip_prefix('/') {
            return std::fs::read(format!("/{path}")).with_context(|| format!("reading {source}"));
        }
    }
    bail!("no resolvable source in {sources:?} (only data: and file:/absolute paths are supported)")
}

fn verify(hash: &str, bytes: &[u8]) -> Result<()> {
    let (algo, expected) = hash
        .split_once('-')
        .ok_or_else(|| anyhow::anyhow!("malformed hash {hash:?}, expected <algo>-<hex>"))?;
    let actual = match algo {
        "sha256" => hex(Sha256::digest(bytes)),
        "sha512" => hex(Sha512::digest(bytes)),
        other => bail!("unsupported hash algorithm {other:?}"),
    };
    if !actual.eq_ignore_ascii_case(expected) {
        bail!("hash mismatch: expected {expected}, got {actual}");
    }
    Ok(())
}

fn hex(digest: impl AsRef<[u8]>) -> String {
    digest.as_ref().iter().map(|b| format!("{b:02x}")).collect()
}
