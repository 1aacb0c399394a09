use std::path::PathBuf;

use clap::Parser;

#[derive(Clone, Debug, Parser)]
#[command(
    name = "slipguard",
    version = env!("CARGO_PKG_VERSION"),
    about = "Extract tar.gz and zip archives without zip-slip, symlink escapes or bombs",
    long_about = None,
    after_help = "EXIT STATUS:
    0  extracted (or validated) with nothing rejected
    1  fatal error, nothing further was extracted
    2  completed, but some entries were rejected or the symlink audit
       found links escaping the destination"
)]
pub struct App {
    /// Archive to extract (.tar.gz, .tgz or .zip)
    #[arg(long)]
    pub src: PathBuf,

    /// Destination directory (created if missing)
    #[arg(long)]
    pub dest: PathBuf,

    /// Maximum total uncompressed size (e.g. 100000000, 100M, 1G)
    #[arg(long, alias = "maxSize", value_parser = parse_size)]
    pub max_size: Option<u64>,

    /// Materialize symlinks whose target stays inside the destination
    #[arg(long, alias = "allowSymlinks")]
    pub allow_symlinks: bool,

    /// Run every check without writing anything
    #[arg(long)]
    pub validate: bool,

    /// Re-check extracted symlinks on disk afterwards
    #[arg(long)]
    pub audit_symlinks: bool,

    /// TOML file with default options
    #[arg(long, value_name = "FILE")]
    pub config: Option<PathBuf>,

    /// Log every entry decision
    #[arg(short, long)]
    pub verbose: bool,
}

/// Parse a byte count with an optional K, M or G suffix (powers of 1000).
pub fn parse_size(s: &str) -> Result<u64, String> {
    let s = s.trim();
    let (digits, multiplier) = match s.char_indices().last() {
        Some((i, 'k' | 'K')) => (&s[..i], 1_000),
        Some((i, 'm' | 'M')) => (&s[..i], 1_000_000),
        Some((i, 'g' | 'G')) => (&s[..i], 1_000_000_000),
        _ => (s, 1),
    };

    let value: u64 = digits
        .trim()
        .parse()
        .map_err(|_| format!("invalid size: '{s}'"))?;
    value
        .checked_mul(multiplier)
        .ok_or_else(|| format!("size too large: '{s}'"))
}
