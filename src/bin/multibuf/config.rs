use crate::{
    bench::Alg,
    cli::{Cli, Command},
    error::Error,
};
use multibuf::{Arch, Builder, Retire, MAX_BURST_SIZE};

const DEFAULT_SIZE: usize = 1024;
const DEFAULT_JOBS: usize = 100_000;

#[allow(clippy::module_name_repetitions)]
pub struct TomlConfig {
    table: toml::value::Table,
}

impl TomlConfig {
    pub const fn new(table: toml::value::Table) -> Self {
        Self { table }
    }

    fn string(&self, field: &'static str) -> Result<Option<&str>, Error> {
        match self.table.get(field) {
            Some(toml::Value::String(v)) => Ok(Some(v)),
            Some(_) => Err(Error::InvalidField(field)),
            None => Ok(None),
        }
    }

    pub fn arch(&self) -> Result<Option<Arch>, Error> {
        self.string("arch")?
            .map(|v| v.parse().map_err(|()| Error::InvalidField("arch")))
            .transpose()
    }

    pub fn retire(&self) -> Result<Option<Retire>, Error> {
        self.string("retire")?
            .map(|v| v.parse().map_err(|()| Error::InvalidField("retire")))
            .transpose()
    }

    pub fn width(&self) -> Result<Option<usize>, Error> {
        match self.table.get("width") {
            Some(toml::Value::Integer(v)) => usize::try_from(*v)
                .map(Some)
                .map_err(|_| Error::InvalidField("width")),
            Some(_) => Err(Error::InvalidField("width")),
            None => Ok(None),
        }
    }

    /// A field of the `[bench]` table.
    fn bench(&self, field: &'static str) -> Option<&toml::Value> {
        match self.table.get("bench") {
            Some(toml::Value::Table(t)) => t.get(field.trim_start_matches("bench.")),
            _ => None,
        }
    }

    fn bench_count(&self, field: &'static str) -> Result<Option<usize>, Error> {
        match self.bench(field) {
            Some(toml::Value::Integer(v)) => usize::try_from(*v)
                .map(Some)
                .map_err(|_| Error::InvalidField(field)),
            Some(_) => Err(Error::InvalidField(field)),
            None => Ok(None),
        }
    }

    pub fn bench_alg(&self) -> Result<Option<Alg>, Error> {
        match self.bench("bench.alg") {
            Some(toml::Value::String(v)) => v
                .parse()
                .map(Some)
                .map_err(|()| Error::InvalidField("bench.alg")),
            Some(_) => Err(Error::InvalidField("bench.alg")),
            None => Ok(None),
        }
    }
}

#[derive(Debug, Clone, Copy)]
pub struct Bench {
    pub alg: Alg,
    pub size: usize,
    pub jobs: usize,
    pub threads: usize,
    pub burst: usize,
}

/// Settings after the command line has been layered over the config file.
#[derive(Debug, Clone, Copy)]
pub struct Config {
    arch: Option<Arch>,
    width: Option<usize>,
    retire: Retire,
    bench: Bench,
}

impl Config {
    pub fn new(t: &TomlConfig, c: &Cli) -> Result<Self, Error> {
        let arch = match &c.arch {
            Some(v) => Some(v.parse().map_err(|()| Error::InvalidField("arch"))?),
            None => t.arch()?,
        };
        let retire = match &c.retire {
            Some(v) => v.parse().map_err(|()| Error::InvalidField("retire"))?,
            None => t.retire()?.unwrap_or_default(),
        };
        let args = match &c.subcommand {
            Command::Bench(args) => Some(args),
            _ => None,
        };
        let alg = match args.and_then(|a| a.alg.as_deref()) {
            Some(v) => v.parse().map_err(|()| Error::InvalidField("bench.alg"))?,
            None => t.bench_alg()?.unwrap_or_default(),
        };
        let size = match args.and_then(|a| a.size) {
            Some(size) => size,
            None => t.bench_count("bench.size")?.unwrap_or(DEFAULT_SIZE),
        };
        if size == 0 {
            return Err(Error::InvalidField("bench.size"));
        }
        let threads = match args.and_then(|a| a.threads) {
            Some(threads) => threads.get(),
            None => t.bench_count("bench.threads")?.unwrap_or(1),
        };
        if threads == 0 {
            return Err(Error::InvalidField("bench.threads"));
        }
        let burst = match args.and_then(|a| a.burst) {
            Some(burst) => burst,
            None => t.bench_count("bench.burst")?.unwrap_or(0),
        };
        if burst > MAX_BURST_SIZE {
            return Err(Error::InvalidField("bench.burst"));
        }
        Ok(Self {
            arch,
            width: c.width.map_or_else(|| t.width(), |w| Ok(Some(w)))?,
            retire,
            bench: Bench {
                alg,
                size,
                jobs: match args.and_then(|a| a.jobs) {
                    Some(jobs) => jobs,
                    None => t.bench_count("bench.jobs")?.unwrap_or(DEFAULT_JOBS),
                },
                threads,
                burst,
            },
        })
    }

    pub fn builder(&self) -> Builder {
        let mut builder = Builder::default().retire(self.retire);
        if let Some(arch) = self.arch {
            builder = builder.arch(arch);
        }
        if let Some(width) = self.width {
            builder = builder.width(width);
        }
        builder
    }

    pub const fn bench(&self) -> &Bench {
        &self.bench
    }
}

#[cfg(test)]
mod tests {
    use super::TomlConfig;
    use crate::bench::Alg;
    use multibuf::{Arch, HashAlg, Retire};

    fn parse(text: &str) -> TomlConfig {
        TomlConfig::new(toml::from_str(text).unwrap())
    }

    #[test]
    fn reads_fields() {
        let t = parse(
            r#"
            arch = "avx2"
            retire = "completion"
            width = 8

            [bench]
            alg = "hmac-sha384"
            jobs = 10
            "#,
        );
        assert_eq!(t.arch().unwrap(), Some(Arch::Avx2));
        assert_eq!(t.retire().unwrap(), Some(Retire::Completion));
        assert_eq!(t.width().unwrap(), Some(8));
        assert_eq!(t.bench_alg().unwrap(), Some(Alg::Hash(HashAlg::HmacSha384)));
        assert_eq!(t.bench_count("bench.jobs").unwrap(), Some(10));
        assert_eq!(t.bench_count("bench.size").unwrap(), None);
    }

    #[test]
    fn rejects_bad_values() {
        let t = parse("arch = \"sse5\"\nwidth = -1\n[bench]\nsize = \"big\"");
        assert!(t.arch().is_err());
        assert!(t.width().is_err());
        assert!(t.bench_count("bench.size").is_err());
        assert_eq!(parse("").arch().unwrap(), None);
    }
}
