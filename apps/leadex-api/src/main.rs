use clap::Parser;

use leadex_api::Args;

#[tokio::main]
async fn main() -> color_eyre::Result<()> {
	color_eyre::install()?;

	let args = Args::parse();

	leadex_api::run(args).await
}
