use crate::{
    config::{Config, TomlConfig},
    error::{Context, ResultExt},
};
use clap::{Parser, Subcommand};
use log::debug;
use multibuf::{arch, Arch, Family};
use std::{
    num::NonZeroUsize,
    path::{Path, PathBuf},
};

#[derive(Debug, Parser)]
#[clap(about, author, version = crate::EXPANDED_VERSION)]
#[clap(help_template = r"{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}")]
pub struct Cli {
    #[clap(subcommand)]
    pub subcommand: Command,
    #[clap(short, long)]
    /// path to the configuration file (default=$HOME/.multibuf.toml)
    pub config: Option<PathBuf>,
    #[clap(short, long)]
    /// architecture to use instead of the best supported one
    /// (no-aesni, sse, avx, avx2, avx512)
    pub arch: Option<String>,
    #[clap(short, long)]
    /// lanes per engine (1, 2, 4, 8 or 16; default depends on the architecture)
    pub width: Option<usize>,
    #[clap(short, long)]
    /// order jobs are handed back in (in-order, completion)
    pub retire: Option<String>,
}

#[derive(Debug, Clone, Subcommand)]
pub enum Command {
    /// show CPU features and lane layout
    Info,
    /// run the known-answer tests through the scheduler
    Selftest,
    /// measure throughput
    Bench(BenchArgs),
    /// show version information
    Version,
}

#[derive(Debug, Clone, Parser)]
#[clap(about, author, version = crate::EXPANDED_VERSION)]
#[clap(help_template = r"{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}")]
pub struct BenchArgs {
    /// sha224, sha256, sha384, sha512, hmac-sha{224,256,384,512}, chacha20,
    /// chacha20-hmac-sha{256,512} (default=sha256)
    #[clap(long)]
    pub alg: Option<String>,
    /// message size in bytes (default=1024)
    #[clap(short, long)]
    pub size: Option<usize>,
    /// jobs per thread (default=100000)
    #[clap(short, long)]
    pub jobs: Option<usize>,
    /// worker threads, one manager each (default=1)
    #[clap(short, long)]
    pub threads: Option<NonZeroUsize>,
    /// submit in bursts of this many jobs (0=one at a time)
    #[clap(short, long)]
    pub burst: Option<usize>,
}

impl Cli {
    pub fn run() -> Result<(), Context> {
        Self::parse().execute()
    }

    fn execute(&self) -> Result<(), Context> {
        match self.subcommand {
            Command::Version => {
                println!("{}", crate::EXPANDED_VERSION);
                Ok(())
            }
            Command::Info => info(&self.config()?),
            Command::Selftest => {
                let manager = self
                    .config()?
                    .builder()
                    .self_test(true)
                    .build()
                    .context("self-test failed")?;
                println!(
                    "self-test passed on {} ({})",
                    manager.arch(),
                    manager.features()
                );
                Ok(())
            }
            Command::Bench(_) => crate::bench::run(&self.config()?).context("benchmark failed"),
        }
    }

    /// Settings from the config file, overridden by flags.
    fn config(&self) -> Result<Config, Context> {
        let table = Self::load_config(self.config.as_deref())?;
        let config = Config::new(&TomlConfig::new(table), self).context("invalid configuration")?;
        debug!("{config:?}");
        Ok(config)
    }

    fn load_config(path: Option<&Path>) -> Result<toml::value::Table, Context> {
        let path = match path {
            Some(path) => path.to_path_buf(),
            None => match Self::default_config_file() {
                Some(path) if path.is_file() => path,
                _ => {
                    debug!("no config file, using defaults");
                    return Ok(toml::value::Table::new());
                }
            },
        };
        let text = std::fs::read_to_string(&path).context(format!(
            "while reading config file at '{}'",
            path.display()
        ))?;
        toml::from_str::<toml::value::Table>(&text).context("while parsing config file")
    }

    fn default_config_file() -> Option<PathBuf> {
        std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .filter(|home| !home.is_empty())
            .map(|home| PathBuf::from(home).join(".multibuf.toml"))
    }
}

fn info(config: &Config) -> Result<(), Context> {
    let features = arch::features();
    println!("multibuf {}", crate::EXPANDED_VERSION);
    println!("cpu features: {features}");
    println!("architectures (lanes sha256/sha512/chacha20):");
    for arch in Arch::ALL {
        let lanes = arch.lanes();
        let supported = if arch.supported_by(features) {
            "supported"
        } else {
            "unsupported"
        };
        println!(
            "  {:<9} {}/{}/{}  {supported}",
            arch.name(),
            lanes.sha256,
            lanes.sha512,
            lanes.chacha20
        );
    }
    let manager = config.builder().build().context("while creating a manager")?;
    println!(
        "selected: {}, {} retirement",
        manager.arch(),
        manager.retire_policy().name()
    );
    for family in Family::ALL {
        println!("  {family:?}: {} lanes", manager.lanes(family));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::Cli;
    use clap::Parser;

    const MISSING: &str = "/nonexistent/multibuf.toml";

    #[test]
    fn version_skips_config() {
        let cli = Cli::try_parse_from(["multibuf", "--config", MISSING, "version"]).unwrap();
        assert!(cli.execute().is_ok());
    }

    #[test]
    fn missing_explicit_config_is_an_error() {
        let cli = Cli::try_parse_from(["multibuf", "--config", MISSING, "info"]).unwrap();
        assert!(cli.execute().is_err());
    }
}
