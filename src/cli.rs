use std::{path::PathBuf, sync::Arc};

use anyhow::Error;
use clap::Parser;
use log::LevelFilter;
use osutils::files_dir::HostFilesDir;

use crate::{
    options::{TranslateBytesOptions, TranslateOptions},
    BUTANE_VERSION,
};

#[derive(Parser, Debug)]
#[clap(version = BUTANE_VERSION, about = "Translate a Butane config into an Ignition config")]
pub struct Cli {
    /// Logging verbosity [OFF, ERROR, WARN, INFO, DEBUG, TRACE]
    #[arg(short, long, default_value_t = LevelFilter::Warn)]
    pub verbosity: LevelFilter,

    /// Fail on any warning
    #[clap(long)]
    pub strict: bool,

    /// Output formatted JSON
    #[clap(short, long)]
    pub pretty: bool,

    /// Directory for embedding local files
    #[clap(short = 'd', long)]
    pub files_dir: Option<PathBuf>,

    /// Don't compress embedded resources automatically
    #[clap(long)]
    pub no_resource_auto_compression: bool,

    /// Output an Ignition config even for variants that wrap it
    #[clap(short, long)]
    pub raw: bool,

    /// Log where every node of the output came from
    #[clap(long, hide = true)]
    pub debug_print_translations: bool,

    /// Write the output here instead of to stdout
    #[clap(short, long)]
    pub output: Option<PathBuf>,

    /// Config to translate; read from stdin if omitted
    #[clap(index = 1)]
    pub input: Option<PathBuf>,
}

impl Cli {
    pub fn translate_options(&self) -> Result<TranslateBytesOptions, Error> {
        let mut translate = TranslateOptions::default()
            .with_no_resource_auto_compression(self.no_resource_auto_compression)
            .with_debug_print_translations(self.debug_print_translations);
        if let Some(dir) = &self.files_dir {
            translate = translate.with_files_dir(Arc::new(HostFilesDir::new(dir)?));
        }
        Ok(TranslateBytesOptions::default()
            .with_translate(translate)
            .with_pretty(self.pretty)
            .with_raw(self.raw)
            .with_strict(self.strict))
    }
}

#[cfg(test)]
mod tests {
    use tempfile::TempDir;

    use super::*;

    #[test]
    fn test_parse() {
        let cli = Cli::parse_from(["butane", "--strict", "-p", "-r", "-o", "out.ign", "in.bu"]);
        assert!(cli.strict);
        assert!(cli.pretty);
        assert!(cli.raw);
        assert_eq!(cli.output, Some(PathBuf::from("out.ign")));
        assert_eq!(cli.input, Some(PathBuf::from("in.bu")));
        assert_eq!(cli.verbosity, LevelFilter::Warn);

        let options = cli.translate_options().unwrap();
        assert!(options.strict && options.pretty && options.raw);
        assert!(options.translate.files_dir.is_none());
    }

    #[test]
    fn test_files_dir() {
        let dir = TempDir::new().unwrap();
        let cli = Cli::parse_from([
            "butane",
            "-d",
            dir.path().to_str().unwrap(),
            "--no-resource-auto-compression",
        ]);
        let options = cli.translate_options().unwrap();
        assert!(options.translate.files_dir.is_some());
        assert!(options.translate.no_resource_auto_compression);

        let cli = Cli::parse_from(["butane", "-d", "/nonexistent/files-dir"]);
        assert!(cli.translate_options().is_err());
    }
}
