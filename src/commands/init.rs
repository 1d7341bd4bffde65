use camino::Utf8PathBuf;
use clap::Parser;
use metagodoc_indexer::Result;
use metagodoc_indexer::config::{CONFIG_FILE_NAME, Config};

#[derive(Parser, Debug)]
pub struct InitArgs {
    /// Output configuration file path
    #[arg(long, value_name = "PATH", default_value = CONFIG_FILE_NAME)]
    pub output: Utf8PathBuf,
}

pub fn init_config(args: &InitArgs) -> Result<()> {
    Config::save_default(&args.output)?;
    println!("Generated default configuration file: {}", args.output);
    Ok(())
}
