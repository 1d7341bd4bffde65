use super::common::{Common, CommonArgs};
use clap::Parser;
use metagodoc_indexer::Result;

#[derive(Parser, Debug)]
pub struct CreateIndexArgs {
    /// Delete the index first if it already exists
    #[arg(long)]
    pub recreate: bool,

    #[command(flatten)]
    pub common: CommonArgs,
}

pub async fn create_index(args: &CreateIndexArgs) -> Result<()> {
    let common = Common::new(&args.common)?;
    let index = common.connect_index().await?;
    index.create_index(args.recreate).await?;
    println!("Created index {}", index.index_name());
    Ok(())
}
